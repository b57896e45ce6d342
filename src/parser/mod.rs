// ERAC - A compiler for the ERA language targeting the ERA virtual machine
// Copyright (C) 2026  Marcel Joachim Kloubert <marcel@kloubert.dev>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Parser module for the ERA compiler.
//!
//! This module parses a token stream into the raw syntax tree defined in
//! [`crate::ast`]. It is a plain recursive descent parser; expressions are
//! kept as flat chains and never re-associated here.
//!
//! # Module Structure
//!
//! - `asm` - Assembly block parsing (AsmParser trait)
//! - `expressions` - Operand and chain parsing (ExpressionParser trait)
//! - `helpers` - Token stream navigation and error handling (ParserHelpers trait)
//! - `statements` - Statement parsing (StatementParser trait)
//! - `units` - Units and declarations (UnitParser trait)

pub mod asm;
pub mod expressions;
pub mod helpers;
pub mod statements;
pub mod units;

use helpers::ParserHelpers;
use units::UnitParser;

use crate::ast::Program;
use crate::error::{CompileError, Span};
use crate::lexer::Token;

/// Cursor over a borrowed token slice. The rule traits in the submodules
/// are implemented on this type.
pub struct Parser<'a> {
    pub(crate) tokens: &'a [(Token, Span)],
    pub(crate) position: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [(Token, Span)]) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Units until the tokens run out. The first syntax error aborts.
    pub fn parse(&mut self) -> Result<Program, CompileError> {
        let mut program = Program::new();
        while !self.is_at_end() {
            program.add_unit(self.parse_unit()?);
        }
        Ok(program)
    }
}

/// Parse a whole token stream into a [`Program`].
pub fn parse(tokens: &[(Token, Span)]) -> Result<Program, CompileError> {
    let mut parser = Parser::new(tokens);
    let program = parser.parse()?;
    tracing::debug!(units = program.units.len(), "parsed program");
    Ok(program)
}

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

//! Top-level unit and declaration parsing.
//!
//! Units are `code`, `module`, `data`, `struct`, `routine`, `pragma` and
//! global declarations. Declarations are shared with statements and module
//! members, so their parsing lives here too.

use super::expressions::ExpressionParser;
use super::helpers::ParserHelpers;
use super::statements::StatementParser;
use super::Parser;
use crate::ast::{
    ArrayDef, ConstantDef, DataDef, Declaration, ModuleDef, Param, PragmaItem, RoutineDef,
    StructDef, TypeName, Unit, UnitKind, VariableDef,
};
use crate::error::{CompileError, ErrorCode};
use crate::lexer::Token;

/// Trait for parsing units and declarations.
pub trait UnitParser {
    /// Parse one top-level unit.
    fn parse_unit(&mut self) -> Result<Unit, CompileError>;

    /// Parse `module Name ... end`.
    fn parse_module(&mut self) -> Result<Unit, CompileError>;

    /// Parse `data Name 1, 2, 3 end`.
    fn parse_data(&mut self) -> Result<Unit, CompileError>;

    /// Parse `struct Name ... end`.
    fn parse_struct(&mut self) -> Result<Unit, CompileError>;

    /// Parse `routine name(params) [: type] do ... end`.
    fn parse_routine(&mut self) -> Result<Unit, CompileError>;

    /// Parse `pragma name("arg"), ...;`.
    fn parse_pragma(&mut self) -> Result<Unit, CompileError>;

    /// Parse a type name.
    fn parse_type(&mut self) -> Result<TypeName, CompileError>;

    /// Check whether the upcoming tokens start a declaration.
    fn is_declaration_start(&self) -> bool;

    /// Parse a variable, constant or array declaration.
    fn parse_declaration(&mut self) -> Result<Declaration, CompileError>;
}

impl<'a> UnitParser for Parser<'a> {
    fn parse_unit(&mut self) -> Result<Unit, CompileError> {
        match self.peek() {
            Some(Token::Code) => {
                let start = self.current_span();
                self.advance();
                let body = self.parse_block_until(&[Token::End])?;
                let end = self.expect(&Token::End, "'end' after code block")?;
                Ok(Unit::new(UnitKind::Code(body), start.merge(&end)))
            }
            Some(Token::Module) => self.parse_module(),
            Some(Token::Data) => self.parse_data(),
            Some(Token::Struct) => self.parse_struct(),
            Some(Token::Routine) => self.parse_routine(),
            Some(Token::Pragma) => self.parse_pragma(),
            _ if self.is_declaration_start() => {
                let start = self.current_span();
                let declaration = self.parse_declaration()?;
                Ok(Unit::new(
                    UnitKind::Declaration(declaration),
                    start.merge(&self.previous_span()),
                ))
            }
            _ => Err(self.unexpected(
                ErrorCode::UnexpectedToken,
                "'code', 'module', 'data', 'struct', 'routine', 'pragma' or a declaration",
            )),
        }
    }

    fn parse_module(&mut self) -> Result<Unit, CompileError> {
        let start = self.expect(&Token::Module, "'module'")?;
        let (name, _) = self.expect_identifier("module name")?;

        let mut members = Vec::new();
        while !self.check(&Token::End) {
            let member = match self.peek() {
                Some(Token::Routine) => self.parse_routine()?,
                Some(Token::Data) => self.parse_data()?,
                Some(Token::Struct) => self.parse_struct()?,
                _ if self.is_declaration_start() => {
                    let member_start = self.current_span();
                    let declaration = self.parse_declaration()?;
                    Unit::new(
                        UnitKind::Declaration(declaration),
                        member_start.merge(&self.previous_span()),
                    )
                }
                _ => {
                    return Err(self.unexpected(
                        ErrorCode::UnexpectedToken,
                        "a routine, data block, structure or declaration in module",
                    ))
                }
            };
            members.push(member);
        }
        let end = self.expect(&Token::End, "'end' after module")?;

        let span = start.merge(&end);
        Ok(Unit::new(
            UnitKind::Module(ModuleDef {
                name,
                members,
                span,
            }),
            span,
        ))
    }

    fn parse_data(&mut self) -> Result<Unit, CompileError> {
        let start = self.expect(&Token::Data, "'data'")?;
        let (name, _) = self.expect_identifier("data block name")?;

        let mut values = Vec::new();
        if !self.check(&Token::End) {
            loop {
                let (value, _) = self.expect_literal("integer literal in data block")?;
                values.push(value as i32);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(&Token::End, "'end' after data block")?;

        let span = start.merge(&end);
        Ok(Unit::new(UnitKind::Data(DataDef { name, values, span }), span))
    }

    fn parse_struct(&mut self) -> Result<Unit, CompileError> {
        let start = self.expect(&Token::Struct, "'struct'")?;
        let (name, _) = self.expect_identifier("structure name")?;

        let mut fields = Vec::new();
        while !self.check(&Token::End) {
            if !self.peek().is_some_and(Token::is_type) {
                return Err(self.unexpected(ErrorCode::ExpectedType, "a field type"));
            }
            fields.push(self.parse_declaration()?);
        }
        let end = self.expect(&Token::End, "'end' after structure")?;

        let span = start.merge(&end);
        Ok(Unit::new(
            UnitKind::Struct(StructDef { name, fields, span }),
            span,
        ))
    }

    fn parse_routine(&mut self) -> Result<Unit, CompileError> {
        let start = self.expect(&Token::Routine, "'routine'")?;
        let (name, _) = self.expect_identifier("routine name")?;

        self.expect(&Token::LeftParen, "'(' after routine name")?;
        let mut params = Vec::new();
        if !self.check(&Token::RightParen) {
            loop {
                let param_start = self.current_span();
                let ty = self.parse_type()?;
                let (param_name, name_span) = self.expect_identifier("parameter name")?;
                params.push(Param {
                    ty,
                    name: param_name,
                    span: param_start.merge(&name_span),
                });
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RightParen, "')' after parameters")?;

        let return_type = if self.match_token(&Token::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };

        self.expect(&Token::Do, "'do' before routine body")?;
        let body = self.parse_block_until(&[Token::End])?;
        let end = self.expect(&Token::End, "'end' after routine body")?;

        let span = start.merge(&end);
        Ok(Unit::new(
            UnitKind::Routine(RoutineDef {
                name,
                params,
                return_type,
                body,
                span,
            }),
            span,
        ))
    }

    fn parse_pragma(&mut self) -> Result<Unit, CompileError> {
        let start = self.expect(&Token::Pragma, "'pragma'")?;

        let mut items = Vec::new();
        loop {
            let (name, name_span) = self.expect_identifier("pragma name")?;
            self.expect(&Token::LeftParen, "'(' after pragma name")?;
            let argument = if self.check(&Token::RightParen) {
                None
            } else {
                Some(self.expect_string("pragma argument string")?.0)
            };
            let end = self.expect(&Token::RightParen, "')' after pragma argument")?;
            items.push(PragmaItem {
                name,
                argument,
                span: name_span.merge(&end),
            });
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        let end = self.expect(&Token::Semicolon, "';' after pragma")?;

        Ok(Unit::new(UnitKind::Pragma(items), start.merge(&end)))
    }

    fn parse_type(&mut self) -> Result<TypeName, CompileError> {
        let base = match self.peek() {
            Some(Token::Int) => TypeName::Int,
            Some(Token::Short) => TypeName::Short,
            Some(Token::Byte) => TypeName::Byte,
            Some(Token::Identifier(name)) => TypeName::Named(name.clone()),
            _ => return Err(self.unexpected(ErrorCode::ExpectedType, "a type")),
        };
        self.advance();

        if self.check(&Token::At) {
            if let Some(address) = base.to_address() {
                self.advance();
                return Ok(address);
            }
            return Err(self.error(
                ErrorCode::ExpectedType,
                "Only int, short and byte have address types",
            ));
        }
        Ok(base)
    }

    fn is_declaration_start(&self) -> bool {
        match self.peek() {
            Some(Token::Const) => true,
            Some(token) if token.is_type() => true,
            Some(Token::Identifier(_)) => matches!(self.peek_ahead(1), Some(Token::Identifier(_))),
            _ => false,
        }
    }

    fn parse_declaration(&mut self) -> Result<Declaration, CompileError> {
        if self.match_token(&Token::Const) {
            let mut items = Vec::new();
            loop {
                let (name, name_span) = self.expect_identifier("constant name")?;
                self.expect(&Token::Equal, "'=' after constant name")?;
                let value = self.parse_expression()?;
                let span = name_span.merge(&value.span);
                items.push(ConstantDef { name, value, span });
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::Semicolon, "';' after constant declaration")?;
            return Ok(Declaration::Constant(items));
        }

        let ty = self.parse_type()?;

        if self.match_token(&Token::LeftBracket) {
            self.expect(&Token::RightBracket, "']' in array type")?;
            let mut items = Vec::new();
            loop {
                let (name, name_span) = self.expect_identifier("array name")?;
                self.expect(&Token::LeftBracket, "'[' before array size")?;
                let size = self.parse_expression()?;
                let end = self.expect(&Token::RightBracket, "']' after array size")?;
                items.push(ArrayDef {
                    name,
                    size,
                    span: name_span.merge(&end),
                });
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
            self.expect(&Token::Semicolon, "';' after array declaration")?;
            return Ok(Declaration::Array { element: ty, items });
        }

        let mut items = Vec::new();
        loop {
            let (name, name_span) = self.expect_identifier("variable name")?;
            let initializer = if self.match_token(&Token::Assign) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            let span = initializer
                .as_ref()
                .map_or(name_span, |init| name_span.merge(&init.span));
            items.push(VariableDef {
                name,
                initializer,
                span,
            });
            if !self.match_token(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::Semicolon, "';' after variable declaration")?;
        Ok(Declaration::Variable { ty, items })
    }
}

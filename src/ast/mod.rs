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

//! Raw syntax tree definitions for the ERA compiler.
//!
//! This module defines the data structures produced by the parser. The tree
//! is read-only input to the annotator, which turns it into the annotated
//! tree in [`crate::analyzer`]. Field order mirrors the child order the
//! annotator relies on (an `if` is always condition, then-body, else-body).

mod expr;
mod stmt;
mod types;

pub use expr::*;
pub use stmt::*;
pub use types::*;

use crate::error::Span;

/// A complete ERA program.
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Top-level units in source order.
    pub units: Vec<Unit>,
}

impl Program {
    /// Create a new empty program.
    pub fn new() -> Self {
        Self { units: Vec::new() }
    }

    /// Add a top-level unit to the program.
    pub fn add_unit(&mut self, unit: Unit) {
        self.units.push(unit);
    }

    /// Iterate over the `code` blocks of the program.
    pub fn code_blocks(&self) -> impl Iterator<Item = &Block> {
        self.units.iter().filter_map(|unit| match &unit.kind {
            UnitKind::Code(block) => Some(block),
            _ => None,
        })
    }
}

/// A top-level unit (or a module member).
#[derive(Debug, Clone)]
pub struct Unit {
    pub kind: UnitKind,
    pub span: Span,
}

impl Unit {
    /// Create a new unit.
    pub fn new(kind: UnitKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The kind of top-level unit.
#[derive(Debug, Clone)]
pub enum UnitKind {
    /// `code ... end`, the program entry.
    Code(Block),
    /// `module M ... end`
    Module(ModuleDef),
    /// `data D 1, 2, 3 end`
    Data(DataDef),
    /// `struct S ... end`
    Struct(StructDef),
    /// `routine f(...) do ... end`
    Routine(RoutineDef),
    /// `pragma memory("KB 16");`
    Pragma(Vec<PragmaItem>),
    /// A global declaration.
    Declaration(Declaration),
}

/// A module definition.
#[derive(Debug, Clone)]
pub struct ModuleDef {
    pub name: String,
    /// Declarations, routines, data blocks and structures.
    pub members: Vec<Unit>,
    pub span: Span,
}

/// A data block definition.
#[derive(Debug, Clone)]
pub struct DataDef {
    pub name: String,
    pub values: Vec<i32>,
    pub span: Span,
}

/// A structure definition.
#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<Declaration>,
    pub span: Span,
}

/// A routine definition.
#[derive(Debug, Clone)]
pub struct RoutineDef {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeName>,
    pub body: Block,
    pub span: Span,
}

/// A routine parameter.
#[derive(Debug, Clone)]
pub struct Param {
    pub ty: TypeName,
    pub name: String,
    pub span: Span,
}

/// One `name("argument")` item of a pragma.
#[derive(Debug, Clone)]
pub struct PragmaItem {
    pub name: String,
    pub argument: Option<String>,
    pub span: Span,
}

/// A block of statements.
#[derive(Debug, Clone)]
pub struct Block {
    /// The statements in this block.
    pub statements: Vec<Statement>,
    /// The source span of this block.
    pub span: Span,
}

impl Block {
    /// Create a new block.
    pub fn new(statements: Vec<Statement>, span: Span) -> Self {
        Self { statements, span }
    }

    /// Create an empty block.
    pub fn empty(span: Span) -> Self {
        Self {
            statements: Vec::new(),
            span,
        }
    }

    /// Check if this block is empty.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

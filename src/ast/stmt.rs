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

//! Statement AST nodes for the ERA compiler.

use super::{Block, CallExpr, Expr, Operand, TypeName};
use crate::error::Span;

/// A statement, optionally preceded by a `<label>`.
#[derive(Debug, Clone)]
pub struct Statement {
    /// The label attached to this statement.
    pub label: Option<Label>,
    /// The kind of statement.
    pub kind: StatementKind,
    /// The source span of this statement.
    pub span: Span,
}

impl Statement {
    /// Create a new unlabeled statement.
    pub fn new(kind: StatementKind, span: Span) -> Self {
        Self {
            label: None,
            kind,
            span,
        }
    }

    /// Attach a label.
    pub fn with_label(mut self, label: Label) -> Self {
        self.label = Some(label);
        self
    }
}

/// A statement label `<name>`.
#[derive(Debug, Clone)]
pub struct Label {
    pub name: String,
    pub span: Span,
}

/// The kind of statement.
#[derive(Debug, Clone)]
pub enum StatementKind {
    /// Variable, constant or array declaration.
    Declaration(Declaration),
    /// `target := value;`
    Assignment { target: Operand, value: Expr },
    /// `left <=> right;`
    Swap { left: Operand, right: Operand },
    /// A routine call whose result is not used.
    Call(CallExpr),
    /// `if condition do ... [else ...] end`
    If {
        condition: Expr,
        then_body: Block,
        else_body: Option<Block>,
    },
    /// `for i [from a] [to b] [step c] loop ... end`
    For {
        iterator: String,
        iterator_span: Span,
        from: Option<Expr>,
        to: Option<Expr>,
        step: Option<Expr>,
        body: Block,
    },
    /// `while condition loop ... end`
    While { condition: Expr, body: Block },
    /// `loop ... [while condition] end`
    LoopWhile {
        body: Block,
        condition: Option<Expr>,
    },
    /// `do ... end`
    Block(Block),
    /// `break;`
    Break,
    /// `goto label;`
    Goto(String),
    /// `return [value];`
    Return(Option<Expr>),
    /// `print a, b;`
    Print(Vec<Expr>),
    /// `asm ... end`
    Asm(Vec<AsmStatement>),
}

/// A declaration, usable as a statement, a module member or a global.
#[derive(Debug, Clone)]
pub enum Declaration {
    /// `int a := 1, b;`
    Variable {
        ty: TypeName,
        items: Vec<VariableDef>,
    },
    /// `const n = 10;`
    Constant(Vec<ConstantDef>),
    /// `int[] a[10], b[n];`
    Array {
        element: TypeName,
        items: Vec<ArrayDef>,
    },
}

/// One variable in a variable declaration.
#[derive(Debug, Clone)]
pub struct VariableDef {
    pub name: String,
    pub initializer: Option<Expr>,
    pub span: Span,
}

/// One constant in a constant declaration.
#[derive(Debug, Clone)]
pub struct ConstantDef {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

/// One array in an array declaration.
#[derive(Debug, Clone)]
pub struct ArrayDef {
    pub name: String,
    pub size: Expr,
    pub span: Span,
}

/// A statement inside an `asm ... end` block.
#[derive(Debug, Clone, PartialEq)]
pub struct AsmStatement {
    pub kind: AsmKind,
    pub span: Span,
}

/// Assembly statements map one-to-one onto machine instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsmKind {
    /// `skip`
    Skip,
    /// `stop`
    Stop,
    /// `format 8|16|32`
    Format(i64),
    /// `print Rj`
    Print(u8),
    /// `Ri := ->Rj`
    Load { dst: u8, addr: u8 },
    /// `->Rj := Ri`
    Store { src: u8, addr: u8 },
    /// `Ri := Rj + value`
    LoadAddress { dst: u8, base: u8, offset: i64 },
    /// `Ri := value`
    LoadConstant { dst: u8, value: i64 },
    /// `Rj := Ri`
    Move { dst: u8, src: u8 },
    /// `Rj op= Ri`
    Alu { op: AsmOp, dst: u8, src: u8 },
    /// `if Ri goto Rj`
    Branch { condition: u8, target: u8 },
}

/// Register-to-register operations available in assembly blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmOp {
    /// `+=`
    Add,
    /// `-=`
    Sub,
    /// `>>=`
    Asr,
    /// `<<=`
    Asl,
    /// `|=`
    Or,
    /// `&=`
    And,
    /// `^=`
    Xor,
    /// `<=`
    Lsl,
    /// `>=`
    Lsr,
    /// `?=`
    Cnd,
}

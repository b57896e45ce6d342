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

//! Expression AST nodes for the ERA compiler.
//!
//! Expressions are kept flat as written (`a + b * c` is three operands and
//! two operators). Operator priority is applied later by the annotator.

use crate::error::Span;

/// A flat operand/operator chain.
#[derive(Debug, Clone)]
pub struct Expr {
    /// The operands, one more than there are operators.
    pub operands: Vec<Operand>,
    /// The operators between consecutive operands.
    pub operators: Vec<BinaryOp>,
    /// The source span of this expression.
    pub span: Span,
}

impl Expr {
    /// Create an expression made of a single operand.
    pub fn single(operand: Operand) -> Self {
        let span = operand.span;
        Self {
            operands: vec![operand],
            operators: Vec::new(),
            span,
        }
    }

    /// Create an expression from a chain.
    pub fn chain(operands: Vec<Operand>, operators: Vec<BinaryOp>, span: Span) -> Self {
        debug_assert_eq!(operands.len(), operators.len() + 1);
        Self {
            operands,
            operators,
            span,
        }
    }

    /// The operand if this expression has no operators.
    pub fn as_single(&self) -> Option<&Operand> {
        if self.operators.is_empty() {
            self.operands.first()
        } else {
            None
        }
    }
}

/// A single operand of an expression.
#[derive(Debug, Clone)]
pub struct Operand {
    /// The kind of operand.
    pub kind: OperandKind,
    /// The source span of this operand.
    pub span: Span,
}

impl Operand {
    /// Create a new operand.
    pub fn new(kind: OperandKind, span: Span) -> Self {
        Self { kind, span }
    }
}

/// The kind of operand.
#[derive(Debug, Clone)]
pub enum OperandKind {
    /// An integer literal.
    Literal(i32),
    /// A variable, constant, data block or array name.
    Identifier(String),
    /// A register `R0`..`R31`.
    Register(u8),
    /// `<-name`: the address of a variable.
    Reference(String),
    /// `->operand`: the value stored at the address given by the operand.
    Dereference(Box<Operand>),
    /// `->123`: the value stored at a literal address.
    ExplicitAddress(i32),
    /// `name[index]`: an array or data block element.
    Index { name: String, index: Box<Expr> },
    /// `name.field`: a structure field.
    Field { base: String, field: String },
    /// A routine call used as a value.
    Call(CallExpr),
    /// A parenthesized expression.
    Group(Box<Expr>),
}

/// A routine call, optionally qualified by a module name.
#[derive(Debug, Clone)]
pub struct CallExpr {
    /// The module qualifier (`M` in `M.f(x)`).
    pub module: Option<String>,
    /// The routine name.
    pub name: String,
    /// The argument expressions.
    pub args: Vec<Expr>,
    /// The source span of the call.
    pub span: Span,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `*`
    Mul,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `<=` (logical shift left)
    ShiftLeft,
    /// `>=` (logical shift right)
    ShiftRight,
    /// `>`
    Greater,
    /// `<`
    Less,
    /// `=`
    Equal,
    /// `/=`
    NotEqual,
    /// `&`
    And,
    /// `^`
    Xor,
    /// `|`
    Or,
    /// `?` (three-way compare)
    Compare,
}

impl BinaryOp {
    /// All operators, highest priority first.
    pub const ALL: [BinaryOp; 13] = [
        BinaryOp::Mul,
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::ShiftLeft,
        BinaryOp::ShiftRight,
        BinaryOp::Greater,
        BinaryOp::Less,
        BinaryOp::Equal,
        BinaryOp::NotEqual,
        BinaryOp::And,
        BinaryOp::Xor,
        BinaryOp::Or,
        BinaryOp::Compare,
    ];

    /// Priority tier, 0 binds tightest.
    pub fn tier(self) -> u8 {
        match self {
            BinaryOp::Mul => 0,
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::ShiftLeft | BinaryOp::ShiftRight => 2,
            BinaryOp::Greater | BinaryOp::Less | BinaryOp::Equal | BinaryOp::NotEqual => 3,
            BinaryOp::And => 4,
            BinaryOp::Xor => 5,
            BinaryOp::Or => 6,
            BinaryOp::Compare => 7,
        }
    }

    /// The predicate mask applied to a three-way compare result.
    pub fn compare_mask(self) -> Option<u8> {
        match self {
            BinaryOp::Equal => Some(4),
            BinaryOp::NotEqual => Some(3),
            BinaryOp::Greater => Some(1),
            BinaryOp::Less => Some(2),
            _ => None,
        }
    }

    /// The source symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::ShiftLeft => "<=",
            BinaryOp::ShiftRight => ">=",
            BinaryOp::Greater => ">",
            BinaryOp::Less => "<",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "/=",
            BinaryOp::And => "&",
            BinaryOp::Xor => "^",
            BinaryOp::Or => "|",
            BinaryOp::Compare => "?",
        }
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers_are_ordered() {
        let tiers: Vec<u8> = BinaryOp::ALL.iter().map(|op| op.tier()).collect();
        let mut sorted = tiers.clone();
        sorted.sort();
        assert_eq!(tiers, sorted);
        assert!(BinaryOp::Mul.tier() < BinaryOp::Add.tier());
        assert!(BinaryOp::Or.tier() < BinaryOp::Compare.tier());
    }

    #[test]
    fn test_compare_masks() {
        assert_eq!(BinaryOp::Equal.compare_mask(), Some(4));
        assert_eq!(BinaryOp::NotEqual.compare_mask(), Some(3));
        assert_eq!(BinaryOp::Greater.compare_mask(), Some(1));
        assert_eq!(BinaryOp::Less.compare_mask(), Some(2));
        assert_eq!(BinaryOp::Add.compare_mask(), None);
    }

    #[test]
    fn test_single_expression() {
        let expr = Expr::single(Operand::new(OperandKind::Literal(7), Span::new(0, 1)));
        assert!(matches!(
            expr.as_single().map(|o| &o.kind),
            Some(OperandKind::Literal(7))
        ));
    }
}

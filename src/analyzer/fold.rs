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

//! Constant folding and operator re-association.
//!
//! Both use the same priority tiers (see [`BinaryOp::tier`]): the first
//! operator of the highest tier still present is grouped with its two
//! neighbours until one operand remains.

use crate::ast::BinaryOp;

/// Evaluate one operator on two constants with ERA semantics.
pub fn evaluate(op: BinaryOp, left: i32, right: i32) -> i32 {
    match op {
        BinaryOp::Mul => left.wrapping_mul(right),
        BinaryOp::Add => left.wrapping_add(right),
        BinaryOp::Sub => left.wrapping_sub(right),
        BinaryOp::ShiftLeft => shift_left(left, right),
        BinaryOp::ShiftRight => shift_right(left, right),
        BinaryOp::Greater => (left > right) as i32,
        BinaryOp::Less => (left < right) as i32,
        BinaryOp::Equal => (left == right) as i32,
        BinaryOp::NotEqual => (left != right) as i32,
        BinaryOp::And => left & right,
        BinaryOp::Xor => left ^ right,
        BinaryOp::Or => left | right,
        BinaryOp::Compare => compare(left, right),
    }
}

/// Three-way compare: 1 greater, 4 equal, 2 less.
pub fn compare(left: i32, right: i32) -> i32 {
    match left.cmp(&right) {
        std::cmp::Ordering::Greater => 1,
        std::cmp::Ordering::Equal => 4,
        std::cmp::Ordering::Less => 2,
    }
}

/// Logical left shift; non-positive counts leave the value unchanged.
pub fn shift_left(value: i32, count: i32) -> i32 {
    match count {
        c if c <= 0 => value,
        c if c >= 32 => 0,
        c => ((value as u32) << c) as i32,
    }
}

/// Logical right shift; non-positive counts leave the value unchanged.
pub fn shift_right(value: i32, count: i32) -> i32 {
    match count {
        c if c <= 0 => value,
        c if c >= 32 => 0,
        c => ((value as u32) >> c) as i32,
    }
}

/// Group a flat operand/operator chain by priority.
///
/// `combine` is called once per operator, in grouping order.
pub fn reassociate<T>(
    first: T,
    rest: Vec<(BinaryOp, T)>,
    mut combine: impl FnMut(T, BinaryOp, T) -> T,
) -> T {
    let mut operands = Vec::with_capacity(rest.len() + 1);
    let mut operators = Vec::with_capacity(rest.len());
    operands.push(first);
    for (op, operand) in rest {
        operators.push(op);
        operands.push(operand);
    }

    while !operators.is_empty() {
        let mut best = 0;
        for (i, op) in operators.iter().enumerate().skip(1) {
            if op.tier() < operators[best].tier() {
                best = i;
            }
        }
        let op = operators.remove(best);
        let right = operands.remove(best + 1);
        let left = operands.remove(best);
        operands.insert(best, combine(left, op, right));
    }

    // `operands` always holds exactly one element here.
    operands.remove(0)
}

/// Fold a chain of constants.
pub fn fold_chain(values: &[i32], operators: &[BinaryOp]) -> Option<i32> {
    let (&first, rest) = values.split_first()?;
    if rest.len() != operators.len() {
        return None;
    }
    let rest = operators.iter().copied().zip(rest.iter().copied()).collect();
    Some(reassociate(first, rest, |left, op, right| evaluate(op, left, right)))
}

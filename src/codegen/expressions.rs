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

//! Expression code generation.
//!
//! Every expression constructor returns a [`CodeNode`] whose `result` is a
//! temporary register holding the value. The caller owns that register and
//! releases it once the value has been consumed.
//!
//! The machine has no multiply and no comparison-to-boolean instruction, so:
//! - `*` is a shift-and-add loop
//! - `<=` and `>=` are logical shift loops
//! - `> < = /=` mask the three-way compare result and turn it into 0 or 1

use super::emit::{window, EmitHelpers};
use super::frames::FrameEmitter;
use super::functions::RoutineEmitter;
use super::isa::{AluOp, Instruction};
use super::labels::LabelManager;
use super::node::CodeNode;
use super::registers::RegisterAllocator;
use super::{value_register, CodeGenerator};
use crate::analyzer::{EntityKind, NodeId, NodeKind, VarType};
use crate::ast::BinaryOp;
use crate::error::{CompileError, ErrorCode, Result, Span};

/// Extension trait for expression code generation.
pub trait ExpressionEmitter {
    /// Generate code computing an expression into a fresh temporary.
    fn construct_expr(&mut self, node: NodeId) -> Result<CodeNode>;

    /// Generate code for a binary operation.
    fn construct_binary(&mut self, node: NodeId, op: BinaryOp) -> Result<CodeNode>;

    /// Address of a memory operand (`->x`, `->123`, `a[i]`, `s.f`).
    ///
    /// Returns a temporary pointing at the window word of the value, and the
    /// value width.
    fn operand_address(&mut self, out: &mut CodeNode, node: NodeId) -> Result<(u8, u32)>;
}

impl ExpressionEmitter for CodeGenerator<'_> {
    fn construct_expr(&mut self, node: NodeId) -> Result<CodeNode> {
        let tree = self.tree;
        let span = tree.node(node).span;
        match tree.kind(node) {
            NodeKind::Literal(value) => {
                let mut out = CodeNode::new(format!("literal {}", value));
                let register = self.get_free_register(&mut out, span)?;
                out.load_constant(register, *value);
                Ok(out.with_result(register))
            }
            NodeKind::Identifier(name) => {
                let mut out = CodeNode::new(format!("load {}", name));
                let (key, entity) = self.lookup(node, name)?;
                let register = match &entity.kind {
                    EntityKind::Constant(value) => {
                        let register = self.get_free_register(&mut out, span)?;
                        out.load_constant(register, *value);
                        register
                    }
                    EntityKind::Array | EntityKind::Data(_) => {
                        let register = self.get_free_register(&mut out, span)?;
                        if entity.is_dynamic_array() {
                            self.load_from_memory(&mut out, &key, register)?;
                        } else {
                            self.variable_address(&mut out, &key, register, 0)?;
                        }
                        register
                    }
                    _ if entity.is_variable() => self.load_variable(&mut out, &key, span)?,
                    _ => return Err(not_a_value(name, span)),
                };
                Ok(out.with_result(register))
            }
            NodeKind::Register(source) => {
                let mut out = CodeNode::new(format!("register {}", source));
                let register = self.get_free_register(&mut out, span)?;
                out.emit(Instruction::Mov {
                    dst: register,
                    src: *source,
                });
                Ok(out.with_result(register))
            }
            NodeKind::Reference(name) => {
                let mut out = CodeNode::new(format!("address of {}", name));
                let (key, _) = self.lookup(node, name)?;
                let register = self.get_free_register(&mut out, span)?;
                self.variable_address(&mut out, &key, register, 0)?;
                Ok(out.with_result(register))
            }
            NodeKind::Dereference
            | NodeKind::ExplicitAddress(_)
            | NodeKind::Index(_)
            | NodeKind::Field { .. } => {
                let mut out = CodeNode::new(tree.kind(node).name());
                let (addr, width) = self.operand_address(&mut out, node)?;
                out.load_window(addr, addr, width);
                Ok(out.with_result(addr))
            }
            NodeKind::Binary(op) => self.construct_binary(node, *op),
            NodeKind::Call { .. } => self.construct_call(node),
            other => Err(CompileError::new(
                ErrorCode::NotAValue,
                format!("{} is not an expression", other.name()),
                span,
            )),
        }
    }

    fn construct_binary(&mut self, node: NodeId, op: BinaryOp) -> Result<CodeNode> {
        let tree = self.tree;
        let span = tree.node(node).span;
        let mut out = CodeNode::new(format!("binary {}", op));
        let (Some(left), Some(right)) = (tree.child(node, 0), tree.child(node, 1)) else {
            return Err(CompileError::new(
                ErrorCode::ExpectedExpression,
                format!("operator '{}' needs two operands", op),
                span,
            ));
        };

        let left = self.construct_expr(left)?;
        let a = value_register(&left, span)?;
        out.child(left);
        let right = self.construct_expr(right)?;
        let b = value_register(&right, span)?;
        out.child(right);

        let result = match op {
            BinaryOp::Add => alu(&mut out, AluOp::Add, a, b),
            BinaryOp::Sub => alu(&mut out, AluOp::Sub, a, b),
            BinaryOp::And => alu(&mut out, AluOp::And, a, b),
            BinaryOp::Or => alu(&mut out, AluOp::Or, a, b),
            BinaryOp::Xor => alu(&mut out, AluOp::Xor, a, b),
            BinaryOp::Compare => alu(&mut out, AluOp::Cnd, a, b),
            BinaryOp::Greater | BinaryOp::Less | BinaryOp::Equal | BinaryOp::NotEqual => {
                let mask = op.compare_mask().unwrap_or(4);
                out.emit(Instruction::alu(AluOp::Cnd, a, b));
                out.load_constant(b, mask as i32);
                out.emit(Instruction::alu(AluOp::And, a, b));
                out.load_constant(b, 0);
                out.emit(Instruction::alu(AluOp::Cnd, a, b));
                out.load_constant(b, 1);
                out.emit(Instruction::alu(AluOp::And, a, b));
                a
            }
            BinaryOp::Mul => self.multiply(&mut out, a, b, span)?,
            BinaryOp::ShiftLeft => self.shift(&mut out, a, b, AluOp::Lsl, span)?,
            BinaryOp::ShiftRight => self.shift(&mut out, a, b, AluOp::Lsr, span)?,
        };
        for register in [a, b] {
            if register != result {
                self.release(register);
            }
        }
        Ok(out.with_result(result))
    }

    fn operand_address(&mut self, out: &mut CodeNode, node: NodeId) -> Result<(u8, u32)> {
        let tree = self.tree;
        let span = tree.node(node).span;
        let (addr, width) = match tree.kind(node) {
            NodeKind::Dereference => {
                let Some(pointer) = tree.child(node, 0) else {
                    return Err(CompileError::new(
                        ErrorCode::ExpectedExpression,
                        "dereference without an address",
                        span,
                    ));
                };
                let width = tree
                    .node(pointer)
                    .var_type
                    .pointee()
                    .map_or(4, |pointee| pointee.width());
                let code = self.construct_expr(pointer)?;
                let addr = value_register(&code, span)?;
                out.child(code);
                (addr, width)
            }
            NodeKind::ExplicitAddress(address) => {
                let addr = self.get_free_register(out, span)?;
                out.load_constant(addr, *address);
                (addr, 4)
            }
            NodeKind::Index(name) => {
                let (key, entity) = self.lookup(node, name)?;
                let width = tree.node(node).var_type.width();
                let base = self.get_free_register(out, span)?;
                if entity.is_dynamic_array() {
                    self.load_from_memory(out, &key, base)?;
                } else {
                    self.variable_address(out, &key, base, 0)?;
                }
                let Some(index) = tree.child(node, 0) else {
                    return Err(CompileError::new(
                        ErrorCode::ExpectedExpression,
                        format!("'{}' is indexed without an index", name),
                        span,
                    ));
                };
                let code = self.construct_expr(index)?;
                let offset = value_register(&code, span)?;
                out.child(code);
                out.scale(offset, width);
                out.emit(Instruction::alu(AluOp::Add, base, offset));
                self.release(offset);
                (base, width)
            }
            NodeKind::Field { base, field } => {
                let (key, entity) = self.lookup(node, base)?;
                let VarType::Struct { name: struct_name } = &entity.var_type else {
                    return Err(CompileError::new(
                        ErrorCode::NotAStruct,
                        format!("'{}' is not a structure", base),
                        span,
                    ));
                };
                let field_entity = match tree.lookup(key.0, struct_name).map(|(_, e)| &e.kind) {
                    Some(EntityKind::Struct(scope)) => tree.entity(*scope, field),
                    _ => None,
                }
                .ok_or_else(|| {
                    CompileError::new(
                        ErrorCode::UnknownField,
                        format!("structure '{}' has no field '{}'", struct_name, field),
                        span,
                    )
                })?;
                let width = field_entity.var_type.width();
                let pointer = self.load_variable(out, &key, span)?;
                out.emit(Instruction::Lda {
                    dst: pointer,
                    base: pointer,
                    offset: field_entity.offset as i32 + window(width),
                });
                return Ok((pointer, width));
            }
            other => {
                return Err(CompileError::new(
                    ErrorCode::NotAValue,
                    format!("{} has no address", other.name()),
                    span,
                ))
            }
        };
        if width < 4 {
            out.emit(Instruction::Lda {
                dst: addr,
                base: addr,
                offset: window(width),
            });
        }
        Ok((addr, width))
    }
}

impl CodeGenerator<'_> {
    /// Shift-and-add multiplication of `a` by `b`. Both are clobbered.
    fn multiply(&mut self, out: &mut CodeNode, a: u8, b: u8, span: Span) -> Result<u8> {
        let acc = self.get_free_register(out, span)?;
        let bit = self.get_free_register(out, span)?;
        let mask = self.get_free_register(out, span)?;
        let top = self.make_label("mul");
        let done = self.make_label("mul_done");

        out.load_constant(acc, 0);
        out.label(top.clone());
        // Stop once no bits of the multiplier are left.
        out.emit(Instruction::Mov { dst: bit, src: b });
        out.load_constant(mask, 0);
        out.emit(Instruction::alu(AluOp::Cnd, bit, mask));
        out.load_constant(mask, 4);
        out.emit(Instruction::alu(AluOp::And, bit, mask));
        out.jump_if(bit, done.clone());
        // mask := 0 - (b & 1), all ones when the low bit is set
        out.emit(Instruction::Mov { dst: bit, src: b });
        out.load_constant(mask, 1);
        out.emit(Instruction::alu(AluOp::And, bit, mask));
        out.load_constant(mask, 0);
        out.emit(Instruction::alu(AluOp::Sub, mask, bit));
        out.emit(Instruction::Mov { dst: bit, src: a });
        out.emit(Instruction::alu(AluOp::And, bit, mask));
        out.emit(Instruction::alu(AluOp::Add, acc, bit));
        out.emit(Instruction::alu(AluOp::Asl, a, a));
        out.emit(Instruction::alu(AluOp::Lsr, b, b));
        out.jump(top);
        out.label(done);

        self.release(bit);
        self.release(mask);
        Ok(acc)
    }

    /// Shift `value` by `count` single-bit steps. `count` is clobbered and
    /// capped at 32, after which every further step leaves zero.
    fn shift(
        &mut self,
        out: &mut CodeNode,
        value: u8,
        count: u8,
        op: AluOp,
        span: Span,
    ) -> Result<u8> {
        let test = self.get_free_register(out, span)?;
        let step = self.get_free_register(out, span)?;
        let top = self.make_label("shift");
        let done = self.make_label("shift_done");
        let clamp = self.make_label("shift_clamp");

        out.emit(Instruction::Mov {
            dst: test,
            src: count,
        });
        out.load_constant(step, 32);
        out.emit(Instruction::alu(AluOp::Cnd, test, step));
        out.load_constant(step, 1);
        out.emit(Instruction::alu(AluOp::And, test, step));
        out.jump_if(test, clamp.clone());
        out.jump(top.clone());
        out.label(clamp);
        out.load_constant(count, 32);

        out.label(top.clone());
        // Done when count <= 0: compare result is "less" (2) or "equal" (4).
        out.emit(Instruction::Mov {
            dst: test,
            src: count,
        });
        out.load_constant(step, 0);
        out.emit(Instruction::alu(AluOp::Cnd, test, step));
        out.load_constant(step, 6);
        out.emit(Instruction::alu(AluOp::And, test, step));
        out.jump_if(test, done.clone());
        out.emit(Instruction::alu(op, value, value));
        out.load_constant(step, 1);
        out.emit(Instruction::alu(AluOp::Sub, count, step));
        out.jump(top);
        out.label(done);

        self.release(test);
        self.release(step);
        Ok(value)
    }
}

fn alu(out: &mut CodeNode, op: AluOp, a: u8, b: u8) -> u8 {
    out.emit(Instruction::alu(op, a, b));
    a
}

fn not_a_value(name: &str, span: Span) -> CompileError {
    CompileError::new(
        ErrorCode::NotAValue,
        format!("'{}' cannot be used as a value", name),
        span,
    )
}

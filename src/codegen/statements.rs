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

//! Statement code generation.
//!
//! This module provides code generation for straight-line statements:
//! - Statement framing (user labels, register allocation on entry and exit)
//! - Declarations, including heap allocation of dynamic arrays and structures
//! - Assignments and swaps to every kind of target
//! - `print` and inline assembly
//! - Nested blocks

use super::emit::EmitHelpers;
use super::expressions::ExpressionEmitter;
use super::frames::FrameEmitter;
use super::isa::{registers, AluOp, Format, Instruction};
use super::labels::user_label;
use super::node::CodeNode;
use super::registers::RegisterAllocator;
use super::{value_register, CodeGenerator};
use crate::analyzer::{EntityKind, NodeId, NodeKind, ScopeId, VarType};
use crate::ast::{AsmKind, AsmOp, AsmStatement};
use crate::error::{CompileError, ErrorCode, Result, Span};

/// Extension trait for statement code generation.
pub trait StatementEmitter {
    /// Generate every `Statement` child of `parent` into `out`.
    fn construct_statements(&mut self, out: &mut CodeNode, parent: NodeId) -> Result<()>;

    /// Generate one statement with its label and register bookkeeping.
    fn construct_statement(&mut self, statement: NodeId) -> Result<CodeNode>;

    /// Generate a nested body: enter its context, run it, leave it.
    fn construct_block(&mut self, block: NodeId) -> Result<CodeNode>;

    fn construct_declaration(&mut self, node: NodeId) -> Result<CodeNode>;

    fn construct_assignment(&mut self, node: NodeId) -> Result<CodeNode>;

    fn construct_swap(&mut self, node: NodeId) -> Result<CodeNode>;

    fn construct_print(&mut self, node: NodeId) -> Result<CodeNode>;

    fn construct_asm(&mut self, node: NodeId, statements: &[AsmStatement]) -> Result<CodeNode>;

    /// Store the temporary `value` into an assignment target and release it.
    fn store_to_target(&mut self, out: &mut CodeNode, target: NodeId, value: u8) -> Result<()>;
}

impl StatementEmitter for CodeGenerator<'_> {
    fn construct_statements(&mut self, out: &mut CodeNode, parent: NodeId) -> Result<()> {
        let tree = self.tree;
        for &child in tree.children(parent) {
            if matches!(tree.kind(child), NodeKind::Statement { .. }) {
                let code = self.construct_statement(child)?;
                out.child(code);
            }
        }
        Ok(())
    }

    fn construct_statement(&mut self, statement: NodeId) -> Result<CodeNode> {
        let tree = self.tree;
        let position = tree.node(statement).block_position;
        let mut out = CodeNode::new(format!("statement {}", position));

        if let NodeKind::Statement { label: Some(label) } = tree.kind(statement) {
            // Control may arrive here from anywhere.
            self.deallocate_all(&mut out)?;
            out.label(user_label(label, statement));
        }
        self.allocate_on_entry(&mut out, statement)?;
        if let Some(inner) = tree.child(statement, 0) {
            let code = self.construct(inner)?;
            if let Some(result) = code.result {
                self.release(result);
            }
            out.child(code);
        }
        self.deallocate_on_exit(&mut out, position)?;
        Ok(out)
    }

    fn construct_block(&mut self, block: NodeId) -> Result<CodeNode> {
        let tree = self.tree;
        let scope = tree.resolve(block)?;
        let mut out = CodeNode::new("block");
        self.deallocate_all(&mut out)?;
        self.enter_scope(&mut out, scope)?;
        self.construct_statements(&mut out, block)?;
        self.exit_scope(&mut out, scope)?;
        Ok(out)
    }

    fn construct_declaration(&mut self, node: NodeId) -> Result<CodeNode> {
        let tree = self.tree;
        let mut out = CodeNode::new("declaration");
        let scope = tree.resolve(node)?;
        for &def in tree.children(node) {
            let span = tree.node(def).span;
            match tree.kind(def) {
                NodeKind::VariableDef { name } => {
                    let key = (scope, name.clone());
                    let entity = self.entity_of(&key)?;
                    if entity.is_heap_resident() {
                        let size = self.struct_size(scope, &entity.var_type, span)?;
                        let register = self.get_free_register(&mut out, span)?;
                        out.load_constant(register, size as i32);
                        self.release_for_redeclaration(&mut out, &key)?;
                        self.allocate_heap(&mut out, &key, register, span)?;
                    } else if let Some(init) = tree.child(def, 0) {
                        let code = self.construct_expr(init)?;
                        let value = value_register(&code, span)?;
                        out.child(code);
                        self.store_variable(&mut out, &key, value)?;
                    }
                }
                NodeKind::ArrayDef { name } => {
                    let key = (scope, name.clone());
                    let entity = self.entity_of(&key)?;
                    if !entity.is_dynamic_array() {
                        continue;
                    }
                    let element = entity.var_type.element().map_or(4, |e| e.size());
                    let Some(count) = tree.child(def, 0) else {
                        continue;
                    };
                    let code = self.construct_expr(count)?;
                    let size = value_register(&code, span)?;
                    out.child(code);
                    out.scale(size, element);
                    self.release_for_redeclaration(&mut out, &key)?;
                    self.allocate_heap(&mut out, &key, size, span)?;
                }
                _ => {}
            }
        }
        Ok(out)
    }

    fn construct_assignment(&mut self, node: NodeId) -> Result<CodeNode> {
        let tree = self.tree;
        let span = tree.node(node).span;
        let mut out = CodeNode::new("assignment");
        let (Some(target), Some(value)) = (tree.child(node, 0), tree.child(node, 1)) else {
            return Err(CompileError::new(
                ErrorCode::InvalidAssignmentTarget,
                "assignment needs a target and a value",
                span,
            ));
        };
        let code = self.construct_expr(value)?;
        let register = value_register(&code, span)?;
        out.child(code);
        self.store_to_target(&mut out, target, register)?;
        Ok(out)
    }

    fn construct_swap(&mut self, node: NodeId) -> Result<CodeNode> {
        let tree = self.tree;
        let span = tree.node(node).span;
        let mut out = CodeNode::new("swap");
        let (Some(left), Some(right)) = (tree.child(node, 0), tree.child(node, 1)) else {
            return Err(CompileError::new(
                ErrorCode::InvalidAssignmentTarget,
                "swap needs two targets",
                span,
            ));
        };
        let code = self.construct_expr(left)?;
        let left_value = value_register(&code, span)?;
        out.child(code);
        let code = self.construct_expr(right)?;
        let right_value = value_register(&code, span)?;
        out.child(code);
        self.store_to_target(&mut out, left, right_value)?;
        self.store_to_target(&mut out, right, left_value)?;
        Ok(out)
    }

    fn construct_print(&mut self, node: NodeId) -> Result<CodeNode> {
        let tree = self.tree;
        let mut out = CodeNode::new("print");
        for &value in tree.children(node) {
            let code = self.construct_expr(value)?;
            let register = value_register(&code, tree.node(value).span)?;
            out.child(code);
            out.emit(Instruction::Print(register));
            self.release(register);
        }
        Ok(out)
    }

    fn construct_asm(&mut self, _node: NodeId, statements: &[AsmStatement]) -> Result<CodeNode> {
        let mut out = CodeNode::new("asm");
        // Hand-written code may read or write any register.
        self.deallocate_all(&mut out)?;
        let mut format = Format::Word;
        for statement in statements {
            let instruction = match &statement.kind {
                AsmKind::Skip => Instruction::Skip,
                AsmKind::Stop => Instruction::Stop,
                AsmKind::Format(bits) => {
                    format = Format::from_width(*bits).ok_or_else(|| {
                        asm_out_of_range(
                            format!("format must be 8, 16 or 32, found {}", bits),
                            statement.span,
                        )
                    })?;
                    continue;
                }
                AsmKind::Print(register) => Instruction::Print(*register),
                AsmKind::Load { dst, addr } => Instruction::Ld {
                    dst: *dst,
                    addr: *addr,
                },
                AsmKind::Store { src, addr } => Instruction::St {
                    src: *src,
                    addr: *addr,
                },
                AsmKind::LoadAddress { dst, base, offset } => Instruction::Lda {
                    dst: *dst,
                    base: *base,
                    offset: i32::try_from(*offset).map_err(|_| {
                        asm_out_of_range(
                            format!("offset {} does not fit in 32 bits", offset),
                            statement.span,
                        )
                    })?,
                },
                AsmKind::LoadConstant { dst, value } => {
                    if !(0..=31).contains(value) {
                        return Err(asm_out_of_range(
                            format!("constant {} is outside 0..31", value),
                            statement.span,
                        ));
                    }
                    Instruction::Ldc {
                        dst: *dst,
                        value: *value as u8,
                    }
                }
                AsmKind::Move { dst, src } => Instruction::Mov {
                    dst: *dst,
                    src: *src,
                },
                AsmKind::Alu { op, dst, src } => Instruction::Alu {
                    op: alu_op(*op),
                    format,
                    dst: *dst,
                    src: *src,
                },
                AsmKind::Branch { condition, target } => Instruction::Cbr {
                    cond: *condition,
                    target: *target,
                },
            };
            out.emit(instruction);
        }
        Ok(out)
    }

    fn store_to_target(&mut self, out: &mut CodeNode, target: NodeId, value: u8) -> Result<()> {
        let tree = self.tree;
        let span = tree.node(target).span;
        match tree.kind(target) {
            NodeKind::Identifier(name) => {
                let (key, _) = self.lookup(target, name)?;
                self.store_variable(out, &key, value)
            }
            NodeKind::Register(register) => {
                out.emit(Instruction::Mov {
                    dst: *register,
                    src: value,
                });
                self.release(value);
                Ok(())
            }
            NodeKind::Dereference
            | NodeKind::ExplicitAddress(_)
            | NodeKind::Index(_)
            | NodeKind::Field { .. } => {
                let (addr, width) = self.operand_address(out, target)?;
                let buffer = if width < 4 {
                    self.get_free_register(out, span)?
                } else {
                    registers::SCRATCH
                };
                out.store_window(value, addr, buffer, width);
                for register in [value, addr, buffer] {
                    self.release(register);
                }
                Ok(())
            }
            other => Err(CompileError::new(
                ErrorCode::InvalidAssignmentTarget,
                format!("cannot assign to {}", other.name()),
                span,
            )),
        }
    }
}

impl CodeGenerator<'_> {
    /// Heap block size of a structure variable.
    fn struct_size(
        &self,
        scope: ScopeId,
        var_type: &VarType,
        span: Span,
    ) -> Result<u32> {
        let VarType::Struct { name } = var_type else {
            return Ok(var_type.size());
        };
        match self.tree.lookup(scope, name).map(|(_, e)| &e.kind) {
            Some(EntityKind::Struct(id)) => Ok(self.tree.scope(*id).frame_size),
            _ => Err(CompileError::new(
                ErrorCode::UnknownType,
                format!("unknown structure type '{}'", name),
                span,
            )),
        }
    }
}

fn alu_op(op: AsmOp) -> AluOp {
    match op {
        AsmOp::Add => AluOp::Add,
        AsmOp::Sub => AluOp::Sub,
        AsmOp::Asr => AluOp::Asr,
        AsmOp::Asl => AluOp::Asl,
        AsmOp::Or => AluOp::Or,
        AsmOp::And => AluOp::And,
        AsmOp::Xor => AluOp::Xor,
        AsmOp::Lsl => AluOp::Lsl,
        AsmOp::Lsr => AluOp::Lsr,
        AsmOp::Cnd => AluOp::Cnd,
    }
}

fn asm_out_of_range(message: String, span: Span) -> CompileError {
    CompileError::new(ErrorCode::AsmLiteralOutOfRange, message, span)
}

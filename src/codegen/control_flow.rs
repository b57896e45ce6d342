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

//! Control flow code generation.
//!
//! This module provides code generation for control flow statements:
//! - if/else
//! - for, while and loop-while loops with their heap scratch records
//! - break and goto, unwinding every context they leave
//!
//! Registers are written back before every jump and label, so all paths
//! reaching a label agree that no variable is register-resident there.

use super::emit::EmitHelpers;
use super::expressions::ExpressionEmitter;
use super::frames::FrameEmitter;
use super::isa::{AluOp, Instruction};
use super::labels::{user_label, LabelManager};
use super::node::CodeNode;
use super::registers::RegisterAllocator;
use super::statements::StatementEmitter;
use super::{value_register, CodeGenerator, LoopTarget};
use crate::analyzer::{LoopKind, NodeId, NodeKind, ScopeId, ScopeKind};
use crate::error::{CompileError, ErrorCode, Result};

/// Field offsets of a `for` record.
const FOR_FROM: u32 = 0;
const FOR_TO: u32 = 4;
const FOR_STEP: u32 = 8;

/// Last evaluated condition of `while` and `loop` records.
const LAST_CONDITION: u32 = 0;

/// Compare-result masks selecting when a `for` loop is done.
const DONE_ASCENDING: i32 = 1 | 4;
const DONE_DESCENDING: i32 = 2 | 4;

/// Extension trait for control flow code generation.
pub trait ControlFlowEmitter {
    fn construct_if(&mut self, node: NodeId) -> Result<CodeNode>;

    fn construct_for(&mut self, node: NodeId, iterator: &str) -> Result<CodeNode>;

    fn construct_while(&mut self, node: NodeId) -> Result<CodeNode>;

    fn construct_loop_while(&mut self, node: NodeId) -> Result<CodeNode>;

    fn construct_break(&mut self, node: NodeId) -> Result<CodeNode>;

    fn construct_goto(&mut self, node: NodeId, label: &str) -> Result<CodeNode>;

    /// The labeled statement `label` refers to and the context holding it.
    fn find_label(&self, node: NodeId, label: &str) -> Option<(NodeId, ScopeId)>;
}

impl ControlFlowEmitter for CodeGenerator<'_> {
    fn construct_if(&mut self, node: NodeId) -> Result<CodeNode> {
        let tree = self.tree;
        let span = tree.node(node).span;
        let mut out = CodeNode::new("if");
        let (condition, then_body) = two_children(self, node)?;
        let else_label = self.make_label("if_else");
        let end_label = self.make_label("if_end");

        let code = self.construct_expr(condition)?;
        let value = value_register(&code, span)?;
        out.child(code);
        let scratch = self.get_free_register(&mut out, span)?;
        self.deallocate_all(&mut out)?;
        jump_unless(&mut out, value, scratch, &else_label);
        self.release(value);
        self.release(scratch);

        let code = self.construct_block(then_body)?;
        out.child(code);
        match tree.child(node, 2) {
            Some(else_body) => {
                out.jump(end_label.clone());
                out.label(else_label);
                let code = self.construct_block(else_body)?;
                out.child(code);
                out.label(end_label);
            }
            None => out.label(else_label),
        }
        Ok(out)
    }

    fn construct_for(&mut self, node: NodeId, iterator: &str) -> Result<CodeNode> {
        let tree = self.tree;
        let span = tree.node(node).span;
        let mut out = CodeNode::new(format!("for {}", iterator));
        let children = tree.children(node);
        let [from, to, step, body] = children else {
            return Err(malformed(node, self));
        };
        let body_scope = tree.resolve(*body)?;
        let key = (body_scope, iterator.to_string());
        let kind = LoopKind::For;

        // Bounds are evaluated once, in the enclosing context.
        let mut bounds = Vec::with_capacity(3);
        for &bound in [from, to, step] {
            let code = self.construct_expr(bound)?;
            bounds.push(value_register(&code, span)?);
            out.child(code);
        }
        self.reserve_record(&mut out, kind, span)?;
        let record = self.get_free_register(&mut out, span)?;
        for (&value, field) in bounds.iter().zip([FOR_FROM, FOR_TO, FOR_STEP]) {
            self.record_field(&mut out, record, kind, field);
            out.emit(Instruction::St {
                src: value,
                addr: record,
            });
            self.release(value);
        }
        self.release(record);

        self.deallocate_all(&mut out)?;
        self.enter_scope(&mut out, body_scope)?;
        let start = self.get_free_register(&mut out, span)?;
        self.record_field(&mut out, start, kind, FOR_FROM);
        out.emit(Instruction::Ld {
            dst: start,
            addr: start,
        });
        self.store_variable(&mut out, &key, start)?;

        let head = self.make_label("for_head");
        let exit = self.make_label("for_exit");
        let end = self.make_label("for_end");
        out.label(head.clone());
        let current = self.load_variable(&mut out, &key, span)?;
        let limit = self.get_free_register(&mut out, span)?;
        self.record_field(&mut out, limit, kind, FOR_TO);
        out.emit(Instruction::Ld {
            dst: limit,
            addr: limit,
        });
        let descending = matches!(tree.node(*step).constant, Some(value) if value < 0);
        out.emit(Instruction::alu(AluOp::Cnd, current, limit));
        out.load_constant(
            limit,
            if descending {
                DONE_DESCENDING
            } else {
                DONE_ASCENDING
            },
        );
        out.emit(Instruction::alu(AluOp::And, current, limit));
        out.jump_if(current, exit.clone());
        self.release(current);
        self.release(limit);

        self.loops.push(LoopTarget {
            body: body_scope,
            exit: end.clone(),
        });
        let result = self.construct_statements(&mut out, *body);
        self.loops.pop();
        result?;

        self.deallocate_all(&mut out)?;
        self.free_heap_variables(&mut out, body_scope)?;
        let current = self.load_variable(&mut out, &key, span)?;
        let increment = self.get_free_register(&mut out, span)?;
        self.record_field(&mut out, increment, kind, FOR_STEP);
        out.emit(Instruction::Ld {
            dst: increment,
            addr: increment,
        });
        out.emit(Instruction::alu(AluOp::Add, current, increment));
        self.release(increment);
        self.store_variable(&mut out, &key, current)?;
        out.jump(head);

        out.label(exit);
        self.leave_frame(&mut out, body_scope);
        self.release_record(&mut out, kind, span)?;
        out.label(end);
        Ok(out)
    }

    fn construct_while(&mut self, node: NodeId) -> Result<CodeNode> {
        let span = self.tree.node(node).span;
        let mut out = CodeNode::new("while");
        let (condition, body) = two_children(self, node)?;
        let body_scope = self.tree.resolve(body)?;
        let kind = LoopKind::While;

        self.reserve_record(&mut out, kind, span)?;
        self.deallocate_all(&mut out)?;
        self.enter_scope(&mut out, body_scope)?;

        let head = self.make_label("while_head");
        let exit = self.make_label("while_exit");
        let end = self.make_label("while_end");
        out.label(head.clone());
        let code = self.construct_expr(condition)?;
        let value = value_register(&code, span)?;
        out.child(code);
        let record = self.get_free_register(&mut out, span)?;
        self.record_field(&mut out, record, kind, LAST_CONDITION);
        out.emit(Instruction::St {
            src: value,
            addr: record,
        });
        jump_unless(&mut out, value, record, &exit);
        self.release(value);
        self.release(record);

        self.loops.push(LoopTarget {
            body: body_scope,
            exit: end.clone(),
        });
        let result = self.construct_statements(&mut out, body);
        self.loops.pop();
        result?;

        self.deallocate_all(&mut out)?;
        self.free_heap_variables(&mut out, body_scope)?;
        out.jump(head);

        out.label(exit);
        self.leave_frame(&mut out, body_scope);
        self.release_record(&mut out, kind, span)?;
        out.label(end);
        Ok(out)
    }

    fn construct_loop_while(&mut self, node: NodeId) -> Result<CodeNode> {
        let span = self.tree.node(node).span;
        let mut out = CodeNode::new("loop");
        let (body, condition) = two_children(self, node)?;
        let body_scope = self.tree.resolve(body)?;
        let kind = LoopKind::LoopWhile;

        self.reserve_record(&mut out, kind, span)?;
        self.deallocate_all(&mut out)?;
        self.enter_scope(&mut out, body_scope)?;

        let head = self.make_label("loop_head");
        let end = self.make_label("loop_end");
        out.label(head.clone());
        self.loops.push(LoopTarget {
            body: body_scope,
            exit: end.clone(),
        });
        let result = self.construct_statements(&mut out, body);
        self.loops.pop();
        result?;

        self.deallocate_all(&mut out)?;
        self.free_heap_variables(&mut out, body_scope)?;
        let code = self.construct_expr(condition)?;
        let value = value_register(&code, span)?;
        out.child(code);
        let record = self.get_free_register(&mut out, span)?;
        self.record_field(&mut out, record, kind, LAST_CONDITION);
        out.emit(Instruction::St {
            src: value,
            addr: record,
        });
        self.release(record);
        out.jump_if(value, head);
        self.release(value);

        self.leave_frame(&mut out, body_scope);
        self.release_record(&mut out, kind, span)?;
        out.label(end);
        Ok(out)
    }

    fn construct_break(&mut self, node: NodeId) -> Result<CodeNode> {
        let mut out = CodeNode::new("break");
        let Some(target) = self.loops.last().cloned() else {
            return Err(CompileError::new(
                ErrorCode::BreakOutsideLoop,
                "'break' outside of a loop",
                self.tree.node(node).span,
            ));
        };
        self.deallocate_all(&mut out)?;
        self.unwind(&mut out, target.body, true)?;
        out.jump(target.exit);
        Ok(out)
    }

    fn construct_goto(&mut self, node: NodeId, label: &str) -> Result<CodeNode> {
        let mut out = CodeNode::new(format!("goto {}", label));
        let (statement, scope) = self.find_label(node, label).ok_or_else(|| {
            CompileError::new(
                ErrorCode::LabelNotFound,
                format!("label '{}' is not defined in an enclosing block", label),
                self.tree.node(node).span,
            )
        })?;
        self.deallocate_all(&mut out)?;
        self.unwind(&mut out, scope, false)?;
        out.jump(user_label(label, statement));
        Ok(out)
    }

    fn find_label(&self, node: NodeId, label: &str) -> Option<(NodeId, ScopeId)> {
        let tree = self.tree;
        let mut current = tree.scope_node(node);
        while let Some(scope_node) = current {
            let scope = tree.node(scope_node).scope?;
            let found = tree.children(scope_node).iter().copied().find(|&child| {
                matches!(tree.kind(child), NodeKind::Statement { label: Some(l) } if l == label)
            });
            if let Some(statement) = found {
                return Some((statement, scope));
            }
            if matches!(
                tree.scope(scope).kind,
                ScopeKind::Routine | ScopeKind::Code
            ) {
                return None;
            }
            current = tree.parent(scope_node).and_then(|p| tree.scope_node(p));
        }
        None
    }
}

impl CodeGenerator<'_> {
    /// Pop the frame of a loop body after the loop finished normally.
    fn leave_frame(&mut self, out: &mut CodeNode, scope: ScopeId) {
        let context = self.tree.scope(scope);
        if context.owns_frame() {
            self.pop_frame(out);
        }
        if let Some(parent) = context.parent {
            self.active = parent;
        }
    }
}

/// Jump to `target` when `value` is zero. Clobbers `value` and `scratch`.
fn jump_unless(out: &mut CodeNode, value: u8, scratch: u8, target: &str) {
    out.load_constant(scratch, 0);
    out.emit(Instruction::alu(AluOp::Cnd, value, scratch));
    out.load_constant(scratch, 4);
    out.emit(Instruction::alu(AluOp::And, value, scratch));
    out.jump_if(value, target);
}

fn two_children(generator: &CodeGenerator<'_>, node: NodeId) -> Result<(NodeId, NodeId)> {
    let tree = generator.tree;
    match (tree.child(node, 0), tree.child(node, 1)) {
        (Some(first), Some(second)) => Ok((first, second)),
        _ => Err(malformed(node, generator)),
    }
}

fn malformed(node: NodeId, generator: &CodeGenerator<'_>) -> CompileError {
    let tree = generator.tree;
    CompileError::new(
        ErrorCode::ExpectedStatement,
        format!("malformed {} statement", tree.kind(node).name()),
        tree.node(node).span,
    )
}

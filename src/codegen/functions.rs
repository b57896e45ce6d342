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

//! Routine and call code generation.
//!
//! Calling convention:
//! - the caller saves its live temporaries on the stack
//! - the caller carves the callee frame `[locals][return slot][saved FP]`
//!   below SP, writes the arguments into the parameter slots and links FP
//! - the return address goes to `FP - 4` and the routine is entered through
//!   its entry in the static routine table
//! - results come back in [`registers::RETURN`]

use super::emit::{window, EmitHelpers};
use super::expressions::ExpressionEmitter;
use super::frames::FrameEmitter;
use super::isa::{registers, Instruction};
use super::labels::{routine_label, LabelManager};
use super::node::CodeNode;
use super::registers::{RegisterAllocator, RegisterFile};
use super::statements::StatementEmitter;
use super::{value_register, CodeGenerator};
use crate::analyzer::{Entity, EntityKind, NodeId, NodeKind, ScopeId, ScopeKind};
use crate::error::{CompileError, ErrorCode, Result, Span};
use tracing::debug;

/// Extension trait for routine code generation.
pub trait RoutineEmitter {
    /// Generate a call. The result register is set for routines returning a value.
    fn construct_call(&mut self, node: NodeId) -> Result<CodeNode>;

    fn construct_return(&mut self, node: NodeId) -> Result<CodeNode>;

    /// Generate the body of a routine, entered with its frame already linked.
    fn construct_routine(&mut self, node: NodeId, name: &str) -> Result<CodeNode>;

    /// The routine node and entity a call refers to.
    fn resolve_routine(
        &self,
        node: NodeId,
        module: Option<&str>,
        name: &str,
    ) -> Result<(NodeId, &Entity)>;
}

impl RoutineEmitter for CodeGenerator<'_> {
    fn construct_call(&mut self, node: NodeId) -> Result<CodeNode> {
        let tree = self.tree;
        let span = tree.node(node).span;
        let NodeKind::Call { module, name } = tree.kind(node) else {
            return Err(CompileError::new(
                ErrorCode::NotCallable,
                format!("{} is not a call", tree.kind(node).name()),
                span,
            ));
        };
        let mut out = CodeNode::new(format!("call {}", name));
        let (routine, entity) = self.resolve_routine(node, module.as_deref(), name)?;
        let slot = entity.offset as i32;
        let returns_value = entity.return_type().is_some_and(|t| !t.is_void());
        let routine_scope = tree.resolve(routine)?;
        let frame_size = tree.scope(routine_scope).frame_size as i32;
        let params: Vec<&Entity> = tree
            .children(routine)
            .iter()
            .filter_map(|&child| match tree.kind(child) {
                NodeKind::Parameter { name } => tree.entity(routine_scope, name),
                _ => None,
            })
            .collect();
        debug!(routine = %name, frame_size, params = params.len(), "call");

        self.deallocate_all(&mut out)?;
        let saved = self.registers.temporaries();
        for &register in &saved {
            out.push_register(register);
        }

        out.emit(Instruction::Lda {
            dst: registers::SP,
            base: registers::SP,
            offset: -(frame_size + 8),
        });
        let base = self.get_free_register(&mut out, span)?;
        out.emit(Instruction::Mov {
            dst: base,
            src: registers::SP,
        });

        for (&argument, param) in tree.children(node).iter().zip(&params) {
            let code = self.construct_expr(argument)?;
            let value = value_register(&code, span)?;
            out.child(code);
            let width = param.var_type.width();
            let addr = self.get_free_register(&mut out, span)?;
            out.emit(Instruction::Lda {
                dst: addr,
                base,
                offset: param.offset as i32 + window(width),
            });
            if width >= 4 {
                out.store_window(value, addr, registers::SCRATCH, width);
            } else {
                let buffer = self.get_free_register(&mut out, span)?;
                out.store_window(value, addr, buffer, width);
                self.release(buffer);
            }
            self.release(addr);
            self.release(value);
        }

        out.emit(Instruction::Lda {
            dst: registers::SCRATCH,
            base,
            offset: frame_size + 4,
        });
        out.emit(Instruction::St {
            src: registers::FP,
            addr: registers::SCRATCH,
        });
        out.emit(Instruction::Mov {
            dst: registers::FP,
            src: registers::SCRATCH,
        });
        self.release(base);

        let return_label = self.make_label("call_return");
        let link = self.get_free_register(&mut out, span)?;
        out.address(link, return_label.clone());
        out.emit(Instruction::Lda {
            dst: registers::SCRATCH,
            base: registers::FP,
            offset: -4,
        });
        out.emit(Instruction::St {
            src: link,
            addr: registers::SCRATCH,
        });
        self.release(link);
        out.emit(Instruction::Lda {
            dst: registers::SCRATCH,
            base: registers::SB,
            offset: slot,
        });
        out.emit(Instruction::Ld {
            dst: registers::SCRATCH,
            addr: registers::SCRATCH,
        });
        out.emit(Instruction::Cbr {
            cond: registers::SCRATCH,
            target: registers::SCRATCH,
        });
        out.label(return_label);

        let mut result = None;
        if returns_value {
            if self.registers.is_occupied(registers::RETURN) {
                let register = self.get_free_register(&mut out, span)?;
                out.emit(Instruction::Mov {
                    dst: register,
                    src: registers::RETURN,
                });
                result = Some(register);
            } else {
                self.registers.occupy(registers::RETURN);
                result = Some(registers::RETURN);
            }
        }
        for &register in saved.iter().rev() {
            out.pop_register(register);
        }
        Ok(match result {
            Some(register) => out.with_result(register),
            None => out,
        })
    }

    fn construct_return(&mut self, node: NodeId) -> Result<CodeNode> {
        let tree = self.tree;
        let span = tree.node(node).span;
        let mut out = CodeNode::new("return");
        let routine_scope = self.enclosing_routine(node, span)?;

        self.deallocate_all(&mut out)?;
        if let Some(value_node) = tree.child(node, 0) {
            let code = self.construct_expr(value_node)?;
            let value = value_register(&code, span)?;
            out.child(code);
            if value != registers::RETURN {
                out.emit(Instruction::Mov {
                    dst: registers::RETURN,
                    src: value,
                });
                self.release(value);
                self.registers.occupy(registers::RETURN);
            }
        }
        self.unwind(&mut out, routine_scope, true)?;
        self.release(registers::RETURN);
        emit_epilogue(&mut out);
        Ok(out)
    }

    fn construct_routine(&mut self, node: NodeId, name: &str) -> Result<CodeNode> {
        let scope = self.tree.resolve(node)?;
        let mut out = CodeNode::new(format!("routine {}", name));
        debug!(routine = %name, frame_size = self.tree.scope(scope).frame_size, "routine");

        self.registers = RegisterFile::new();
        self.loops.clear();
        self.active = scope;
        out.label(routine_label(name, node));
        self.zero_heap_slots(&mut out, scope)?;
        self.construct_statements(&mut out, node)?;

        // Falling off the end returns without a value.
        self.deallocate_all(&mut out)?;
        self.unwind(&mut out, scope, true)?;
        emit_epilogue(&mut out);
        Ok(out)
    }

    fn resolve_routine(
        &self,
        node: NodeId,
        module: Option<&str>,
        name: &str,
    ) -> Result<(NodeId, &Entity)> {
        let tree = self.tree;
        let span = tree.node(node).span;
        let found = match module {
            Some(module) => match tree.lookup_from(node, module)? {
                Some((_, Entity {
                    kind: EntityKind::Module(scope),
                    ..
                })) => tree.entity(*scope, name).map(|entity| (*scope, entity)),
                _ => None,
            },
            None => tree.lookup_from(node, name)?,
        };
        let undeclared = || {
            let qualified = match module {
                Some(module) => format!("{}.{}", module, name),
                None => name.to_string(),
            };
            CompileError::new(
                ErrorCode::UndeclaredRoutine,
                format!("routine '{}' is not declared", qualified),
                span,
            )
        };
        let (scope, entity) = found.filter(|(_, e)| e.is_routine()).ok_or_else(undeclared)?;
        let routine = self
            .routines
            .get(&(scope, name.to_string()))
            .copied()
            .ok_or_else(undeclared)?;
        Ok((routine, entity))
    }
}

impl CodeGenerator<'_> {
    fn enclosing_routine(&self, node: NodeId, span: Span) -> Result<ScopeId> {
        let tree = self.tree;
        let mut current = Some(tree.resolve(node)?);
        while let Some(scope) = current {
            if tree.scope(scope).kind == ScopeKind::Routine {
                return Ok(scope);
            }
            current = tree.scope(scope).parent;
        }
        Err(CompileError::new(
            ErrorCode::ReturnOutsideRoutine,
            "'return' outside of a routine",
            span,
        ))
    }
}

/// Restore the caller frame and jump back through the return slot.
fn emit_epilogue(out: &mut CodeNode) {
    out.emit(Instruction::Lda {
        dst: registers::SCRATCH,
        base: registers::FP,
        offset: -4,
    });
    out.emit(Instruction::Ld {
        dst: registers::SCRATCH,
        addr: registers::SCRATCH,
    });
    out.emit(Instruction::Lda {
        dst: registers::SP,
        base: registers::FP,
        offset: 4,
    });
    out.emit(Instruction::Ld {
        dst: registers::FP,
        addr: registers::FP,
    });
    out.emit(Instruction::Cbr {
        cond: registers::SCRATCH,
        target: registers::SCRATCH,
    });
}

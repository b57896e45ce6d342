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

//! Stack frames, variable storage and the heap arena.
//!
//! A frame looks like this, with `S` the frame size of its context:
//!
//! ```text
//! FP      saved FP of the enclosing frame
//! FP-4    return address (routine frames only)
//! FP-4-S  first variable, then upwards in declaration order
//! ```
//!
//! The heap arena grows upwards from the end of the image. Its top is kept
//! in the static word at `SB + 4`. Every block carries a 4-byte size prefix
//! and blocks are released in reverse order of allocation.

use super::emit::{window, EmitHelpers};
use super::isa::{registers, AluOp, Instruction};
use super::labels::LabelManager;
use super::node::CodeNode;
use super::registers::{RegisterAllocator, VarKey};
use super::CodeGenerator;
use crate::analyzer::{LoopKind, ScopeId, ScopeKind};
use crate::error::{CompileError, ErrorCode, Result, Span};

/// Static offset of the heap-top pointer.
pub const HEAP_TOP_OFFSET: i32 = 4;

/// Extension trait for frame, variable and heap code.
pub trait FrameEmitter {
    /// Frames between the active context and the one declaring `scope`.
    fn frame_hops(&self, scope: ScopeId) -> Result<u32>;

    /// `into := address of key + adjust`.
    fn variable_address(
        &mut self,
        out: &mut CodeNode,
        key: &VarKey,
        into: u8,
        adjust: i32,
    ) -> Result<()>;

    /// Load a variable from memory, ignoring any register copy.
    fn load_from_memory(&mut self, out: &mut CodeNode, key: &VarKey, into: u8) -> Result<()>;

    /// Store `value` to the memory of a variable. `value` is masked to the
    /// variable's width.
    fn store_to_memory(&mut self, out: &mut CodeNode, key: &VarKey, value: u8) -> Result<()>;

    /// Copy a variable into a fresh temporary.
    fn load_variable(&mut self, out: &mut CodeNode, key: &VarKey, span: Span) -> Result<u8>;

    /// Assign the temporary `value` to a variable and release it.
    fn store_variable(&mut self, out: &mut CodeNode, key: &VarKey, value: u8) -> Result<()>;

    fn push_frame(&mut self, out: &mut CodeNode, size: u32);

    fn pop_frame(&mut self, out: &mut CodeNode);

    /// Make `scope` active, pushing its frame if it owns one.
    fn enter_scope(&mut self, out: &mut CodeNode, scope: ScopeId) -> Result<()>;

    /// Leave the active `scope`: write back, free its heap blocks, pop its frame.
    fn exit_scope(&mut self, out: &mut CodeNode, scope: ScopeId) -> Result<()>;

    /// Clear the heap pointer slots of `scope`.
    fn zero_heap_slots(&mut self, out: &mut CodeNode, scope: ScopeId) -> Result<()>;

    /// Allocate `size` bytes (a register, consumed) and store the block in `key`.
    fn allocate_heap(&mut self, out: &mut CodeNode, key: &VarKey, size: u8, span: Span)
        -> Result<()>;

    /// Release the heap blocks of `scope` in reverse declaration order.
    fn free_heap_variables(&mut self, out: &mut CodeNode, scope: ScopeId) -> Result<()>;

    /// Release the block held by `key` unless its slot is null, then clear the slot.
    fn release_heap_block(&mut self, out: &mut CodeNode, key: &VarKey) -> Result<()>;

    /// Before `key` is allocated again after a backward `goto`, release its
    /// old block and those of every later heap variable of its scope, newest
    /// first. Scopes without labels cannot repeat a declaration.
    fn release_for_redeclaration(&mut self, out: &mut CodeNode, key: &VarKey) -> Result<()>;

    /// Bump the heap top by the scratch record of a loop.
    fn reserve_record(&mut self, out: &mut CodeNode, kind: LoopKind, span: Span) -> Result<()>;

    /// Give the scratch record of a loop back.
    fn release_record(&mut self, out: &mut CodeNode, kind: LoopKind, span: Span) -> Result<()>;

    /// `into := address of a field of the topmost loop record`.
    fn record_field(&mut self, out: &mut CodeNode, into: u8, kind: LoopKind, field: u32);

    /// Undo heap records, heap blocks and frames from the active context up
    /// to `target`, including `target` itself when `inclusive` is set.
    ///
    /// The active context is unchanged afterwards; the emitted code is always
    /// followed by a jump.
    fn unwind(&mut self, out: &mut CodeNode, target: ScopeId, inclusive: bool) -> Result<()>;
}

impl FrameEmitter for CodeGenerator<'_> {
    fn frame_hops(&self, scope: ScopeId) -> Result<u32> {
        let mut hops = 0;
        let mut current = self.active;
        while current != scope {
            let context = self.tree.scope(current);
            if context.owns_frame() {
                hops += 1;
            }
            current = context.parent.ok_or_else(|| {
                CompileError::new(
                    ErrorCode::NoContext,
                    "variable is not reachable from the active frame",
                    Span::default(),
                )
            })?;
        }
        Ok(hops)
    }

    fn variable_address(
        &mut self,
        out: &mut CodeNode,
        key: &VarKey,
        into: u8,
        adjust: i32,
    ) -> Result<()> {
        let entity = self.entity_of(key)?;
        let context = self.tree.scope(key.0);
        let offset = entity.offset as i32 + adjust;
        if context.is_global() {
            out.emit(Instruction::Lda {
                dst: into,
                base: registers::SB,
                offset,
            });
            return Ok(());
        }

        let mut base = registers::FP;
        for _ in 0..self.frame_hops(key.0)? {
            out.emit(Instruction::Ld {
                dst: into,
                addr: base,
            });
            base = into;
        }
        out.emit(Instruction::Lda {
            dst: into,
            base,
            offset: offset - 4 - context.frame_size as i32,
        });
        Ok(())
    }

    fn load_from_memory(&mut self, out: &mut CodeNode, key: &VarKey, into: u8) -> Result<()> {
        let width = self.entity_of(key)?.var_type.width();
        self.variable_address(out, key, into, window(width))?;
        out.load_window(into, into, width);
        Ok(())
    }

    fn store_to_memory(&mut self, out: &mut CodeNode, key: &VarKey, value: u8) -> Result<()> {
        let width = self.entity_of(key)?.var_type.width();
        if width >= 4 {
            self.variable_address(out, key, registers::SCRATCH, 0)?;
            out.emit(Instruction::St {
                src: value,
                addr: registers::SCRATCH,
            });
            return Ok(());
        }
        self.with_spare(out, &[value], 2, |this, out, spare| {
            let (addr, buffer) = (spare[0], spare[1]);
            this.variable_address(out, key, addr, window(width))?;
            out.store_window(value, addr, buffer, width);
            Ok(())
        })
    }

    fn load_variable(&mut self, out: &mut CodeNode, key: &VarKey, span: Span) -> Result<u8> {
        let register = self.get_free_register(out, span)?;
        match self.registers.register_of(key) {
            Some(resident) => out.emit(Instruction::Mov {
                dst: register,
                src: resident,
            }),
            None => self.load_from_memory(out, key, register)?,
        }
        Ok(register)
    }

    fn store_variable(&mut self, out: &mut CodeNode, key: &VarKey, value: u8) -> Result<()> {
        let width = self.entity_of(key)?.var_type.width();
        match self.registers.register_of(key) {
            Some(resident) => {
                out.emit(Instruction::Mov {
                    dst: resident,
                    src: value,
                });
                out.mask_to_width(resident, width);
            }
            None => self.store_to_memory(out, key, value)?,
        }
        self.release(value);
        Ok(())
    }

    fn push_frame(&mut self, out: &mut CodeNode, size: u32) {
        out.emit(Instruction::Lda {
            dst: registers::SCRATCH,
            base: registers::SP,
            offset: -4,
        });
        out.emit(Instruction::St {
            src: registers::FP,
            addr: registers::SCRATCH,
        });
        out.emit(Instruction::Mov {
            dst: registers::FP,
            src: registers::SCRATCH,
        });
        out.emit(Instruction::Lda {
            dst: registers::SP,
            base: registers::FP,
            offset: -(4 + size as i32),
        });
    }

    fn pop_frame(&mut self, out: &mut CodeNode) {
        out.emit(Instruction::Lda {
            dst: registers::SP,
            base: registers::FP,
            offset: 4,
        });
        out.emit(Instruction::Ld {
            dst: registers::FP,
            addr: registers::FP,
        });
    }

    fn enter_scope(&mut self, out: &mut CodeNode, scope: ScopeId) -> Result<()> {
        let context = self.tree.scope(scope);
        if context.owns_frame() && context.kind != ScopeKind::Routine {
            self.push_frame(out, context.frame_size);
        }
        self.active = scope;
        self.zero_heap_slots(out, scope)
    }

    fn exit_scope(&mut self, out: &mut CodeNode, scope: ScopeId) -> Result<()> {
        self.deallocate_all(out)?;
        self.free_heap_variables(out, scope)?;
        let context = self.tree.scope(scope);
        if context.owns_frame() {
            self.pop_frame(out);
        }
        if let Some(parent) = context.parent {
            self.active = parent;
        }
        Ok(())
    }

    fn zero_heap_slots(&mut self, out: &mut CodeNode, scope: ScopeId) -> Result<()> {
        let names: Vec<String> = self
            .tree
            .scope(scope)
            .heap_variables()
            .into_iter()
            .map(|e| e.name.clone())
            .collect();
        if names.is_empty() {
            return Ok(());
        }
        let zero = self.get_free_register(out, Span::default())?;
        out.load_constant(zero, 0);
        for name in names {
            self.variable_address(out, &(scope, name), registers::SCRATCH, 0)?;
            out.emit(Instruction::St {
                src: zero,
                addr: registers::SCRATCH,
            });
        }
        self.release(zero);
        Ok(())
    }

    fn allocate_heap(
        &mut self,
        out: &mut CodeNode,
        key: &VarKey,
        size: u8,
        span: Span,
    ) -> Result<()> {
        let top = self.get_free_register(out, span)?;
        let end = self.get_free_register(out, span)?;
        out.emit(Instruction::Lda {
            dst: registers::SCRATCH,
            base: registers::SB,
            offset: HEAP_TOP_OFFSET,
        });
        out.emit(Instruction::Ld {
            dst: top,
            addr: registers::SCRATCH,
        });
        out.emit(Instruction::St {
            src: size,
            addr: top,
        });
        out.emit(Instruction::Lda {
            dst: top,
            base: top,
            offset: 4,
        });
        out.emit(Instruction::Mov { dst: end, src: top });
        out.emit(Instruction::alu(AluOp::Add, end, size));
        out.emit(Instruction::St {
            src: end,
            addr: registers::SCRATCH,
        });
        self.release(end);
        self.release(size);

        self.variable_address(out, key, registers::SCRATCH, 0)?;
        out.emit(Instruction::St {
            src: top,
            addr: registers::SCRATCH,
        });
        self.release(top);
        Ok(())
    }

    fn free_heap_variables(&mut self, out: &mut CodeNode, scope: ScopeId) -> Result<()> {
        let names: Vec<String> = self
            .tree
            .scope(scope)
            .heap_variables()
            .into_iter()
            .rev()
            .map(|e| e.name.clone())
            .collect();
        for name in names {
            self.release_heap_block(out, &(scope, name))?;
        }
        Ok(())
    }

    fn release_heap_block(&mut self, out: &mut CodeNode, key: &VarKey) -> Result<()> {
        // Both temporaries are taken before branching so that the two
        // paths agree on register contents.
        let pointer = self.get_free_register(out, Span::default())?;
        let top = self.get_free_register(out, Span::default())?;
        let release = self.make_label("heap_release");
        let keep = self.make_label("heap_keep");

        self.load_from_memory(out, key, pointer)?;
        out.jump_if(pointer, release.clone());
        out.jump(keep.clone());
        out.label(release);
        out.emit(Instruction::Lda {
            dst: pointer,
            base: pointer,
            offset: -4,
        });
        out.emit(Instruction::Ld {
            dst: pointer,
            addr: pointer,
        });
        out.emit(Instruction::Lda {
            dst: registers::SCRATCH,
            base: registers::SB,
            offset: HEAP_TOP_OFFSET,
        });
        out.emit(Instruction::Ld {
            dst: top,
            addr: registers::SCRATCH,
        });
        out.emit(Instruction::alu(AluOp::Sub, top, pointer));
        out.emit(Instruction::Lda {
            dst: top,
            base: top,
            offset: -4,
        });
        out.emit(Instruction::St {
            src: top,
            addr: registers::SCRATCH,
        });
        out.load_constant(top, 0);
        self.variable_address(out, key, registers::SCRATCH, 0)?;
        out.emit(Instruction::St {
            src: top,
            addr: registers::SCRATCH,
        });
        out.label(keep);
        self.release(top);
        self.release(pointer);
        Ok(())
    }

    fn release_for_redeclaration(&mut self, out: &mut CodeNode, key: &VarKey) -> Result<()> {
        let context = self.tree.scope(key.0);
        if !context.declares_labels() {
            return Ok(());
        }
        let names: Vec<String> = context
            .heap_variables()
            .into_iter()
            .map(|e| e.name.clone())
            .skip_while(|name| *name != key.1)
            .collect();
        for name in names.into_iter().rev() {
            self.release_heap_block(out, &(key.0, name))?;
        }
        Ok(())
    }

    fn reserve_record(&mut self, out: &mut CodeNode, kind: LoopKind, span: Span) -> Result<()> {
        bump_heap_top(self, out, kind.record_size() as i32, span)
    }

    fn release_record(&mut self, out: &mut CodeNode, kind: LoopKind, span: Span) -> Result<()> {
        bump_heap_top(self, out, -(kind.record_size() as i32), span)
    }

    fn record_field(&mut self, out: &mut CodeNode, into: u8, kind: LoopKind, field: u32) {
        out.emit(Instruction::Lda {
            dst: into,
            base: registers::SB,
            offset: HEAP_TOP_OFFSET,
        });
        out.emit(Instruction::Ld {
            dst: into,
            addr: into,
        });
        out.emit(Instruction::Lda {
            dst: into,
            base: into,
            offset: field as i32 - kind.record_size() as i32,
        });
    }

    fn unwind(&mut self, out: &mut CodeNode, target: ScopeId, inclusive: bool) -> Result<()> {
        let saved = self.active;
        let mut scope = self.active;
        loop {
            if scope == target && !inclusive {
                break;
            }
            let context = self.tree.scope(scope);
            self.active = scope;
            self.free_heap_variables(out, scope)?;
            // Routine frames are popped by the epilogue.
            if context.owns_frame() && context.kind != ScopeKind::Routine {
                self.pop_frame(out);
            }
            if let Some(kind) = context.loop_kind() {
                self.release_record(out, kind, Span::default())?;
            }
            if scope == target {
                break;
            }
            scope = context.parent.ok_or_else(|| {
                CompileError::new(
                    ErrorCode::NoContext,
                    "jump target is not an enclosing context",
                    Span::default(),
                )
            })?;
        }
        self.active = saved;
        Ok(())
    }
}

fn bump_heap_top(
    generator: &mut CodeGenerator<'_>,
    out: &mut CodeNode,
    delta: i32,
    span: Span,
) -> Result<()> {
    let top = generator.get_free_register(out, span)?;
    out.emit(Instruction::Lda {
        dst: registers::SCRATCH,
        base: registers::SB,
        offset: HEAP_TOP_OFFSET,
    });
    out.emit(Instruction::Ld {
        dst: top,
        addr: registers::SCRATCH,
    });
    out.emit(Instruction::Lda {
        dst: top,
        base: top,
        offset: delta,
    });
    out.emit(Instruction::St {
        src: top,
        addr: registers::SCRATCH,
    });
    generator.release(top);
    Ok(())
}

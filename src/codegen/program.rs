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

//! Program assembly.
//!
//! Lays out the executable image:
//!
//! ```text
//! 0   version, padding
//! 2   static segment address          (4 bytes)
//! 6   static segment length in words  (4 bytes)
//! 10  code segment address            (4 bytes)
//! 14  code segment length in words    (4 bytes)
//! 18  static segment
//! ..  code segment: units table, prologue, code block, routines, SKIP, STOP
//! ```

use std::collections::HashMap;

use super::frames::{FrameEmitter, HEAP_TOP_OFFSET};
use super::functions::RoutineEmitter;
use super::isa::{registers, Instruction};
use super::labels::{link, module_label, routine_label, Linked};
use super::node::CodeNode;
use super::registers::RegisterFile;
use super::statements::StatementEmitter;
use super::CodeGenerator;
use crate::analyzer::{EntityKind, NodeId, NodeKind, ScopeId, VarType};
use crate::error::{CompileError, ErrorCode, Result, Span};
use tracing::debug;

/// Bytes before the static segment.
pub const HEADER_SIZE: u32 = 18;

const HALT_LABEL: &str = "halt";
const PROGRAM_END_LABEL: &str = "program_end";

/// Extension trait for assembling the whole program.
pub trait ProgramAssembler {
    /// Build the static segment with globals, data blocks and struct pointers.
    fn static_segment(&self) -> Result<Vec<u8>>;

    /// Build the code segment tree.
    fn construct_program(&mut self) -> Result<CodeNode>;

    /// Assemble the executable image.
    fn assemble(&mut self) -> Result<Vec<u8>>;
}

impl ProgramAssembler for CodeGenerator<'_> {
    fn static_segment(&self) -> Result<Vec<u8>> {
        let tree = self.tree;
        let root = tree.root_scope();
        let size = tree.scope(root).frame_size;
        let mut data = vec![0u8; (size + size % 2) as usize];
        let initializers = self.global_initializers();

        for scope in self.global_scopes() {
            for entity in tree.scope(scope).entities() {
                let offset = entity.offset as usize;
                match &entity.kind {
                    EntityKind::Data(values) => {
                        for (index, value) in values.iter().enumerate() {
                            let at = offset + 4 * index;
                            write_bytes(&mut data, at, &value.to_be_bytes());
                        }
                    }
                    EntityKind::Variable => {
                        if let VarType::Struct { .. } = entity.var_type {
                            let pointer = HEADER_SIZE + entity.offset + 4;
                            write_bytes(&mut data, offset, &pointer.to_be_bytes());
                        } else if let Some(value) =
                            initializers.get(&(scope, entity.name.clone()))
                        {
                            let width = entity.var_type.width() as usize;
                            let bytes = value.to_be_bytes();
                            write_bytes(&mut data, offset, &bytes[4 - width..]);
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(data)
    }

    fn construct_program(&mut self) -> Result<CodeNode> {
        let tree = self.tree;
        let root = tree.root();
        let mut program = CodeNode::new("program");

        program.child(self.units_table()?);
        program.child(self.prologue()?);

        let code_block = tree
            .children(root)
            .iter()
            .copied()
            .find(|&child| matches!(tree.kind(child), NodeKind::Code));
        match code_block {
            Some(node) => {
                let scope = tree.resolve(node)?;
                let mut out = CodeNode::new("code");
                self.registers = RegisterFile::new();
                self.loops.clear();
                self.enter_scope(&mut out, scope)?;
                self.construct_statements(&mut out, node)?;
                self.exit_scope(&mut out, scope)?;
                out.jump(HALT_LABEL);
                program.child(out);
            }
            None => program.jump(HALT_LABEL),
        }

        for &child in tree.children(root) {
            match tree.kind(child) {
                NodeKind::Routine { name } => {
                    let code = self.construct_routine(child, name)?;
                    program.child(code);
                }
                NodeKind::Module { name } => {
                    let mut out = CodeNode::new(format!("module {}", name));
                    out.label(module_label(name, child));
                    for &member in tree.children(child) {
                        if let NodeKind::Routine { name } = tree.kind(member) {
                            let code = self.construct_routine(member, name)?;
                            out.child(code);
                        }
                    }
                    program.child(out);
                }
                _ => {}
            }
        }

        program.label(HALT_LABEL);
        program.emit(Instruction::Skip);
        program.emit(Instruction::Stop);
        program.label(PROGRAM_END_LABEL);
        Ok(program)
    }

    fn assemble(&mut self) -> Result<Vec<u8>> {
        let _span = tracing::info_span!("codegen").entered();
        let static_data = self.static_segment()?;
        let program = self.construct_program()?;

        let too_large = || {
            CompileError::new(
                ErrorCode::ProgramTooLarge,
                "program does not fit in the address space",
                Span::default(),
            )
        };
        let code_base = u32::try_from(static_data.len())
            .ok()
            .and_then(|len| len.checked_add(HEADER_SIZE))
            .ok_or_else(too_large)?;
        let Linked { bytes: code, labels } = link(&program, code_base)?;
        let code_len = u32::try_from(code.len()).map_err(|_| too_large())?;
        code_base
            .checked_add(code_len)
            .and_then(|end| end.checked_add(self.config.memory_budget))
            .filter(|&end| end <= i32::MAX as u32)
            .ok_or_else(too_large)?;

        let mut image = Vec::with_capacity(HEADER_SIZE as usize + static_data.len() + code.len());
        image.push(self.config.version);
        image.push(0);
        image.extend_from_slice(&HEADER_SIZE.to_be_bytes());
        image.extend_from_slice(&(static_data.len() as u32 / 2).to_be_bytes());
        image.extend_from_slice(&code_base.to_be_bytes());
        image.extend_from_slice(&(code_len / 2).to_be_bytes());
        image.extend_from_slice(&static_data);
        image.extend_from_slice(&code);

        debug!(
            static_bytes = static_data.len(),
            code_bytes = code.len(),
            labels = labels.len(),
            "program assembled"
        );
        Ok(image)
    }
}

impl CodeGenerator<'_> {
    /// Program scope followed by module scopes in declaration order.
    fn global_scopes(&self) -> Vec<ScopeId> {
        let tree = self.tree;
        let root = tree.root_scope();
        let mut scopes = vec![root];
        for entity in tree.scope(root).entities() {
            if let EntityKind::Module(module) = entity.kind {
                scopes.push(module);
            }
        }
        scopes
    }

    /// Folded initializers of global variables.
    fn global_initializers(&self) -> HashMap<(ScopeId, String), i32> {
        let tree = self.tree;
        let mut values = HashMap::new();
        let mut holders = vec![tree.root()];
        holders.extend(
            tree.children(tree.root())
                .iter()
                .copied()
                .filter(|&c| matches!(tree.kind(c), NodeKind::Module { .. })),
        );
        for holder in holders {
            let Some(scope) = tree.node(holder).scope else {
                continue;
            };
            let declarations = tree
                .children(holder)
                .iter()
                .filter(|&&c| matches!(tree.kind(c), NodeKind::Declaration));
            for &declaration in declarations {
                for &def in tree.children(declaration) {
                    let NodeKind::VariableDef { name } = tree.kind(def) else {
                        continue;
                    };
                    let value = tree.child(def, 0).and_then(|init| tree.node(init).constant);
                    if let Some(value) = value {
                        values.insert((scope, name.clone()), value);
                    }
                }
            }
        }
        values
    }

    /// Patch every routine and module slot with its entry address.
    fn units_table(&mut self) -> Result<CodeNode> {
        let tree = self.tree;
        let mut out = CodeNode::new("units");
        let mut entries: Vec<(u32, String)> = Vec::new();
        let module_nodes: HashMap<&str, NodeId> = tree
            .children(tree.root())
            .iter()
            .filter_map(|&c| match tree.kind(c) {
                NodeKind::Module { name } => Some((name.as_str(), c)),
                _ => None,
            })
            .collect();

        for scope in self.global_scopes() {
            for entity in tree.scope(scope).entities() {
                match entity.kind {
                    EntityKind::Routine => {
                        if let Some(&node) = self.routines.get(&(scope, entity.name.clone())) {
                            entries.push((entity.offset, routine_label(&entity.name, node)));
                        }
                    }
                    EntityKind::Module(_) => {
                        if let Some(&node) = module_nodes.get(entity.name.as_str()) {
                            entries.push((entity.offset, module_label(&entity.name, node)));
                        }
                    }
                    _ => {}
                }
            }
        }

        for (slot, label) in entries {
            out.emit(Instruction::Lda {
                dst: registers::RETURN,
                base: registers::SB,
                offset: slot as i32,
            });
            out.address(registers::SCRATCH, label);
            out.emit(Instruction::St {
                src: registers::SCRATCH,
                addr: registers::RETURN,
            });
        }
        Ok(out)
    }

    /// Point the heap at the end of the image and the stack at the end of the budget.
    fn prologue(&self) -> Result<CodeNode> {
        let budget = i32::try_from(self.config.memory_budget).map_err(|_| {
            CompileError::new(
                ErrorCode::ProgramTooLarge,
                format!(
                    "memory budget of {} bytes does not fit in the address space",
                    self.config.memory_budget
                ),
                Span::default(),
            )
        })?;
        let mut out = CodeNode::new("prologue");
        out.address(registers::SCRATCH, PROGRAM_END_LABEL);
        out.emit(Instruction::Lda {
            dst: registers::RETURN,
            base: registers::SB,
            offset: HEAP_TOP_OFFSET,
        });
        out.emit(Instruction::St {
            src: registers::SCRATCH,
            addr: registers::RETURN,
        });
        out.emit(Instruction::Lda {
            dst: registers::SP,
            base: registers::SCRATCH,
            offset: budget,
        });
        out.emit(Instruction::Mov {
            dst: registers::FP,
            src: registers::SP,
        });
        Ok(out)
    }
}

fn write_bytes(data: &mut [u8], at: usize, bytes: &[u8]) {
    if let Some(target) = data.get_mut(at..at + bytes.len()) {
        target.copy_from_slice(bytes);
    }
}

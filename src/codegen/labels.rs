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

//! Label resolution.
//!
//! This module handles:
//! - Unique label names for constructors
//! - Linearizing the emission tree into bytes
//! - Patching jump and address placeholders from the unresolved list

use super::isa::{registers, Instruction};
use super::node::{CodeNode, Fragment};
use super::CodeGenerator;
use crate::analyzer::NodeId;
use crate::error::{CompileError, ErrorCode, Span};
use std::collections::HashMap;
use tracing::debug;

/// Which placeholder an unresolved reference fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    Jump { condition: u8 },
    Address { register: u8 },
}

/// A placeholder waiting for its target address.
#[derive(Debug, Clone)]
pub struct UnresolvedReference {
    /// Byte offset of the placeholder in the linearized output.
    pub offset: usize,
    pub target: String,
    pub kind: ReferenceKind,
}

/// Linearized code with resolved placeholders.
#[derive(Debug, Clone, Default)]
pub struct Linked {
    pub bytes: Vec<u8>,
    /// Absolute address of every label.
    pub labels: HashMap<String, u32>,
}

/// Extension trait for label creation.
pub trait LabelManager {
    /// Generate a unique label with the given prefix.
    fn make_label(&mut self, prefix: &str) -> String;
}

impl LabelManager for CodeGenerator<'_> {
    fn make_label(&mut self, prefix: &str) -> String {
        let label = format!("{}_{}", prefix, self.label_counter);
        self.label_counter += 1;
        label
    }
}

/// Label of a labeled statement. Names may repeat across contexts, so the
/// statement node is part of the label.
pub fn user_label(name: &str, statement: NodeId) -> String {
    format!("label_{}_{}", name, statement.0)
}

/// Entry label of a routine.
pub fn routine_label(name: &str, node: NodeId) -> String {
    format!("routine_{}_{}", name, node.0)
}

/// Label of the first routine region of a module.
pub fn module_label(name: &str, node: NodeId) -> String {
    format!("module_{}_{}", name, node.0)
}

/// Linearize `root`, placing its first byte at absolute address `base`.
pub fn link(root: &CodeNode, base: u32) -> Result<Linked, CompileError> {
    let mut linked = Linked::default();
    let mut references = Vec::new();
    flatten(root, base, &mut linked, &mut references)?;

    for reference in &references {
        let address = *linked.labels.get(&reference.target).ok_or_else(|| {
            CompileError::new(
                ErrorCode::LabelNotFound,
                format!("label '{}' was never placed", reference.target),
                Span::default(),
            )
        })?;
        let mut patch = Vec::with_capacity(8);
        match reference.kind {
            ReferenceKind::Jump { condition } => {
                Instruction::Ldl {
                    dst: registers::SCRATCH,
                    value: address as i32,
                }
                .encode(&mut patch);
                Instruction::Cbr {
                    cond: condition,
                    target: registers::SCRATCH,
                }
                .encode(&mut patch);
            }
            ReferenceKind::Address { register } => {
                Instruction::Ldl {
                    dst: register,
                    value: address as i32,
                }
                .encode(&mut patch);
            }
        }
        linked.bytes[reference.offset..reference.offset + patch.len()].copy_from_slice(&patch);
    }

    debug!(
        labels = linked.labels.len(),
        references = references.len(),
        bytes = linked.bytes.len(),
        "labels resolved"
    );
    Ok(linked)
}

fn flatten(
    node: &CodeNode,
    base: u32,
    linked: &mut Linked,
    references: &mut Vec<UnresolvedReference>,
) -> Result<(), CompileError> {
    for fragment in node.fragments() {
        match fragment {
            Fragment::Bytes(bytes) => linked.bytes.extend_from_slice(bytes),
            Fragment::Node(child) => flatten(child, base, linked, references)?,
            Fragment::Label(name) => {
                let address = base + linked.bytes.len() as u32;
                if linked.labels.insert(name.clone(), address).is_some() {
                    return Err(CompileError::new(
                        ErrorCode::InvalidInstruction,
                        format!("label '{}' placed twice", name),
                        Span::default(),
                    ));
                }
            }
            Fragment::Jump { target, condition } => {
                references.push(UnresolvedReference {
                    offset: linked.bytes.len(),
                    target: target.clone(),
                    kind: ReferenceKind::Jump {
                        condition: *condition,
                    },
                });
                linked.bytes.extend_from_slice(&[0; super::node::JUMP_SIZE]);
            }
            Fragment::Address { target, register } => {
                references.push(UnresolvedReference {
                    offset: linked.bytes.len(),
                    target: target.clone(),
                    kind: ReferenceKind::Address {
                        register: *register,
                    },
                });
                linked.bytes.extend_from_slice(&[0; super::node::ADDRESS_SIZE]);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_and_backward_jumps() {
        let mut body = CodeNode::new("body");
        body.label("top");
        body.emit(Instruction::Skip);
        body.jump("end");
        body.jump_if(3, "top");
        body.label("end");
        body.emit(Instruction::Stop);

        let linked = link(&body, 100).unwrap();
        assert_eq!(linked.labels["top"], 100);
        assert_eq!(linked.labels["end"], 100 + 2 + 8 + 8);

        // Unconditional jump to `end`.
        assert_eq!(
            Instruction::decode(&linked.bytes[2..]),
            Some(Instruction::Ldl {
                dst: registers::SCRATCH,
                value: 118
            })
        );
        assert_eq!(
            Instruction::decode(&linked.bytes[8..]),
            Some(Instruction::Cbr {
                cond: registers::SCRATCH,
                target: registers::SCRATCH
            })
        );
        // Conditional jump back to `top`.
        assert_eq!(
            Instruction::decode(&linked.bytes[10..]),
            Some(Instruction::Ldl {
                dst: registers::SCRATCH,
                value: 100
            })
        );
        assert_eq!(
            Instruction::decode(&linked.bytes[16..]),
            Some(Instruction::Cbr {
                cond: 3,
                target: registers::SCRATCH
            })
        );
    }

    #[test]
    fn test_labels_inside_children() {
        let mut child = CodeNode::new("child");
        child.emit(Instruction::Skip);
        child.label("inner");
        let mut root = CodeNode::new("root");
        root.address(5, "inner");
        root.child(child);

        let linked = link(&root, 0).unwrap();
        assert_eq!(linked.labels["inner"], 8);
        assert_eq!(
            Instruction::decode(&linked.bytes),
            Some(Instruction::Ldl { dst: 5, value: 8 })
        );
    }

    #[test]
    fn test_label_names() {
        assert_eq!(user_label("again", NodeId(12)), "label_again_12");
        assert_eq!(routine_label("sum", NodeId(3)), "routine_sum_3");
        assert_eq!(module_label("M", NodeId(7)), "module_M_7");
    }

    #[test]
    fn test_missing_label() {
        let mut root = CodeNode::new("root");
        root.jump("nowhere");
        let err = link(&root, 0).unwrap_err();
        assert_eq!(err.code, ErrorCode::LabelNotFound);
    }

    #[test]
    fn test_duplicate_label() {
        let mut root = CodeNode::new("root");
        root.label("twice");
        root.label("twice");
        assert!(link(&root, 0).is_err());
    }
}

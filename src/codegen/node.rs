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

//! The emission tree.
//!
//! Constructors build a tree of [`CodeNode`]s. A node holds fragments in
//! emission order: raw instruction bytes, child nodes, label declarations and
//! fixed-size placeholders for jumps and code addresses. Placeholders are
//! filled in by [`super::labels::link`] once the whole tree is known, so the
//! size of every node is final as soon as it is built.

use super::isa::{registers, Instruction};

/// Size of a jump placeholder: `LDL R27 := target` then `CBR cond, R27`.
pub const JUMP_SIZE: usize = 8;

/// Size of an address placeholder: `LDL reg := target`.
pub const ADDRESS_SIZE: usize = 6;

/// One piece of a node's output.
#[derive(Debug, Clone)]
pub enum Fragment {
    Bytes(Vec<u8>),
    Node(CodeNode),
    /// Declares `name` at the current position.
    Label(String),
    /// Jump to `target` when `condition` is non-zero.
    Jump { target: String, condition: u8 },
    /// Load the address of `target` into `register`.
    Address { target: String, register: u8 },
}

impl Fragment {
    pub fn size(&self) -> usize {
        match self {
            Fragment::Bytes(bytes) => bytes.len(),
            Fragment::Node(node) => node.size(),
            Fragment::Label(_) => 0,
            Fragment::Jump { .. } => JUMP_SIZE,
            Fragment::Address { .. } => ADDRESS_SIZE,
        }
    }
}

/// A node of the emission tree.
#[derive(Debug, Clone, Default)]
pub struct CodeNode {
    /// Human-readable description, used in logs and listings only.
    pub tag: String,
    fragments: Vec<Fragment>,
    /// Register holding the value computed by this node, if any.
    pub result: Option<u8>,
}

impl CodeNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            fragments: Vec::new(),
            result: None,
        }
    }

    pub fn with_result(mut self, register: u8) -> Self {
        self.result = Some(register);
        self
    }

    pub fn emit(&mut self, instruction: Instruction) {
        if let Some(Fragment::Bytes(bytes)) = self.fragments.last_mut() {
            instruction.encode(bytes);
        } else {
            self.fragments.push(Fragment::Bytes(instruction.to_bytes()));
        }
    }

    pub fn child(&mut self, node: CodeNode) {
        self.fragments.push(Fragment::Node(node));
    }

    pub fn label(&mut self, name: impl Into<String>) {
        self.fragments.push(Fragment::Label(name.into()));
    }

    /// Jump to `target` if `condition` is non-zero.
    pub fn jump_if(&mut self, condition: u8, target: impl Into<String>) {
        self.fragments.push(Fragment::Jump {
            target: target.into(),
            condition,
        });
    }

    /// Unconditional jump. The scratch register holds the (non-zero) target
    /// address and doubles as the condition.
    pub fn jump(&mut self, target: impl Into<String>) {
        self.jump_if(registers::SCRATCH, target);
    }

    pub fn address(&mut self, register: u8, target: impl Into<String>) {
        self.fragments.push(Fragment::Address {
            target: target.into(),
            register,
        });
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// Total size: own bytes plus all descendants.
    pub fn size(&self) -> usize {
        self.fragments.iter().map(Fragment::size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

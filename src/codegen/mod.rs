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

//! Code generation module for the ERA compiler.
//!
//! This module turns the annotated tree into an executable image for the
//! 32-register ERA machine. It handles:
//! - Instruction encoding
//! - Register allocation
//! - Stack frames and the heap arena
//! - Expressions, statements and control flow
//! - Routines and calls
//! - Program layout and label linking

pub mod disasm;
pub mod isa;
pub mod node;

mod control_flow;
mod emit;
mod expressions;
mod frames;
mod functions;
mod labels;
mod program;
mod registers;
mod statements;

use std::collections::HashMap;

use crate::analyzer::{Aast, Entity, NodeId, NodeKind, ScopeId};
use crate::config::CompilerConfig;
use crate::error::{CompileError, ErrorCode, Result, Span};

use control_flow::ControlFlowEmitter;
use expressions::ExpressionEmitter;
use functions::RoutineEmitter;
use program::ProgramAssembler;
use statements::StatementEmitter;

pub use disasm::{disassemble, Listing};
pub use labels::{link, Linked};
pub use node::CodeNode;
pub use program::HEADER_SIZE;
pub use registers::{RegisterFile, VarKey};

/// The innermost loop a `break` leaves.
#[derive(Debug, Clone)]
pub(crate) struct LoopTarget {
    /// Body context of the loop.
    pub body: ScopeId,
    /// Label just after the loop's cleanup.
    pub exit: String,
}

/// The code generator for the ERA machine.
pub struct CodeGenerator<'t> {
    /// The annotated program.
    pub(crate) tree: &'t Aast,
    pub(crate) config: &'t CompilerConfig,
    /// Register state of the routine being generated.
    pub(crate) registers: RegisterFile,
    /// Label counter for generating unique labels.
    pub(crate) label_counter: u32,
    /// Enclosing loops, innermost last.
    pub(crate) loops: Vec<LoopTarget>,
    /// Context whose frame FP currently points to.
    pub(crate) active: ScopeId,
    /// Routine nodes by declaring context and name.
    pub(crate) routines: HashMap<(ScopeId, String), NodeId>,
}

impl<'t> CodeGenerator<'t> {
    /// Create a new code generator.
    pub fn new(tree: &'t Aast, config: &'t CompilerConfig) -> Self {
        let mut routines = HashMap::new();
        let root = tree.root();
        let mut holders = vec![(tree.root_scope(), root)];
        for &child in tree.children(root) {
            if let (NodeKind::Module { .. }, Some(scope)) = (tree.kind(child), tree.node(child).scope)
            {
                holders.push((scope, child));
            }
        }
        for (scope, holder) in holders {
            for &child in tree.children(holder) {
                if let NodeKind::Routine { name } = tree.kind(child) {
                    routines.insert((scope, name.clone()), child);
                }
            }
        }

        Self {
            tree,
            config,
            registers: RegisterFile::new(),
            label_counter: 0,
            loops: Vec::new(),
            active: tree.root_scope(),
            routines,
        }
    }

    /// Generate the executable image.
    pub fn generate(&mut self) -> Result<Vec<u8>> {
        self.assemble()
    }

    /// The unlinked code segment tree that [`generate`](Self::generate) lays
    /// out after the static segment.
    pub fn emission_tree(&mut self) -> Result<CodeNode> {
        self.construct_program()
    }

    /// The entity a resolved variable key refers to.
    pub(crate) fn entity_of(&self, key: &VarKey) -> Result<&'t Entity> {
        let tree: &'t Aast = self.tree;
        tree.entity(key.0, &key.1).ok_or_else(|| {
            CompileError::new(
                ErrorCode::NoContext,
                format!("'{}' is missing from its context", key.1),
                Span::default(),
            )
        })
    }

    /// Resolve `name` from the context enclosing `node`.
    pub(crate) fn lookup(&self, node: NodeId, name: &str) -> Result<(VarKey, &'t Entity)> {
        let tree: &'t Aast = self.tree;
        match tree.lookup_from(node, name)? {
            Some((scope, entity)) => Ok(((scope, name.to_string()), entity)),
            None => Err(CompileError::new(
                ErrorCode::UndeclaredVariable,
                format!("'{}' is not declared", name),
                tree.node(node).span,
            )),
        }
    }

    /// Generate code for any node.
    pub fn construct(&mut self, node: NodeId) -> Result<CodeNode> {
        let tree = self.tree;
        match tree.kind(node) {
            NodeKind::Statement { .. } => self.construct_statement(node),
            NodeKind::Block => self.construct_block(node),
            NodeKind::Declaration => self.construct_declaration(node),
            NodeKind::Assignment => self.construct_assignment(node),
            NodeKind::Swap => self.construct_swap(node),
            NodeKind::Print => self.construct_print(node),
            NodeKind::Asm(statements) => self.construct_asm(node, statements),
            NodeKind::If => self.construct_if(node),
            NodeKind::For { iterator } => self.construct_for(node, iterator),
            NodeKind::While => self.construct_while(node),
            NodeKind::LoopWhile => self.construct_loop_while(node),
            NodeKind::Break => self.construct_break(node),
            NodeKind::Goto { label } => self.construct_goto(node, label),
            NodeKind::Return => self.construct_return(node),
            NodeKind::Call { .. } => self.construct_call(node),
            kind if kind.is_expression() => self.construct_expr(node),
            kind => {
                let mut out = CodeNode::new(kind.name());
                for &child in tree.children(node) {
                    let code = self.construct(child)?;
                    out.child(code);
                }
                Ok(out)
            }
        }
    }
}

/// The register holding the value of `node`.
pub(crate) fn value_register(node: &CodeNode, span: Span) -> Result<u8> {
    node.result.ok_or_else(|| {
        CompileError::new(
            ErrorCode::VoidInExpression,
            format!("'{}' does not produce a value", node.tag),
            span,
        )
    })
}

/// Generate an executable image from an annotated program.
pub fn generate(tree: &Aast, config: &CompilerConfig) -> Result<Vec<u8>> {
    CodeGenerator::new(tree, config).generate()
}

#[cfg(test)]
mod tests {
    use super::isa::{registers, Instruction};
    use super::*;
    use crate::compile;
    use pretty_assertions::assert_eq;

    fn listing(source: &str) -> Listing {
        let image = compile(source).unwrap();
        disassemble(&image).unwrap()
    }

    fn instructions(source: &str) -> Vec<Instruction> {
        listing(source).code().cloned().collect()
    }

    // ========================================================================
    // Program layout
    // ========================================================================

    #[test]
    fn test_empty_program_layout() {
        let listing = listing("code end");
        assert_eq!(listing.static_base, HEADER_SIZE);
        assert_eq!(listing.static_data.len(), 8);
        assert_eq!(listing.code_base, HEADER_SIZE + 8);
        let code = instructions("code end");
        assert_eq!(&code[code.len() - 2..], &[Instruction::Skip, Instruction::Stop]);
    }

    #[test]
    fn test_program_without_code_block_halts() {
        let code = instructions("int g := 1;");
        assert_eq!(&code[code.len() - 2..], &[Instruction::Skip, Instruction::Stop]);
    }

    #[test]
    fn test_prologue_sets_heap_and_stack() {
        let code = instructions("code end");
        let image_end = {
            let image = compile("code end").unwrap();
            image.len() as i32
        };
        assert_eq!(
            code[0],
            Instruction::Ldl {
                dst: registers::SCRATCH,
                value: image_end,
            }
        );
        assert!(code.contains(&Instruction::Lda {
            dst: registers::SP,
            base: registers::SCRATCH,
            offset: 65536,
        }));
        assert!(code.contains(&Instruction::Mov {
            dst: registers::FP,
            src: registers::SP,
        }));
    }

    #[test]
    fn test_global_initializers_in_static_segment() {
        let listing = listing("int a := 7; short b := 258; byte c := 255; code end");
        assert_eq!(listing.static_word(8), Some(7));
        assert_eq!(&listing.static_data[12..14], &[1, 2]);
        assert_eq!(listing.static_data[14], 255);
    }

    #[test]
    fn test_data_block_in_static_segment() {
        let listing = listing("data d 1, 2, 3 end code end");
        assert_eq!(listing.static_word(8), Some(1));
        assert_eq!(listing.static_word(12), Some(2));
        assert_eq!(listing.static_word(16), Some(3));
    }

    #[test]
    fn test_static_segment_padded_even() {
        let listing = listing("byte b := 1; code end");
        assert_eq!(listing.static_data.len(), 10);
    }

    #[test]
    fn test_routine_slot_patched_by_units_table() {
        let listing = listing("routine f() do end code f(); end");
        let code: Vec<Instruction> = listing.code().cloned().collect();
        assert_eq!(
            code[0],
            Instruction::Lda {
                dst: registers::RETURN,
                base: registers::SB,
                offset: 8,
            }
        );
        assert!(matches!(code[1], Instruction::Ldl { dst: registers::SCRATCH, .. }));
        assert_eq!(
            code[2],
            Instruction::St {
                src: registers::SCRATCH,
                addr: registers::RETURN,
            }
        );
    }

    #[test]
    fn test_deterministic_output() {
        let source = "int x := 3; routine sq(int v): int do return v * v; end \
                      code int i := 0; while i < 4 loop print sq(i); i := i + 1; end end";
        assert_eq!(compile(source).unwrap(), compile(source).unwrap());
    }

    // ========================================================================
    // Statements
    // ========================================================================

    #[test]
    fn test_print_literal() {
        let code = instructions("code print 5; end");
        let position = code
            .iter()
            .position(|i| matches!(i, Instruction::Print(_)))
            .unwrap();
        let Instruction::Print(register) = code[position] else {
            unreachable!()
        };
        assert!(code[..position].contains(&Instruction::Ldc {
            dst: register,
            value: 5,
        }));
    }

    #[test]
    fn test_folded_constant_printed_as_literal() {
        let code = instructions("code print 2 + 3 * 4; end");
        assert!(code.iter().any(|i| matches!(i, Instruction::Ldl { value: 14, .. })
            || matches!(i, Instruction::Ldc { value: 14, .. })));
    }

    #[test]
    fn test_break_outside_loop_rejected_before_codegen() {
        let err = compile("code break; end").unwrap_err();
        assert_eq!(err.code, ErrorCode::BreakOutsideLoop);
    }
}

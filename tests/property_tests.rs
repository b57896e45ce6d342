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


//! Property-based tests for the ERA compiler.
//!
//! These tests check invariants that must hold for every input, using
//! proptest for random input generation.

mod common;

use std::collections::{HashMap, HashSet};

use common::Machine;
use erac::analyzer::{fold, ScopeId};
use erac::ast::BinaryOp;
use erac::codegen::isa::registers::{self, GENERAL_COUNT};
use erac::codegen::isa::Instruction;
use erac::codegen::node::Fragment;
use erac::codegen::{CodeGenerator, CodeNode, RegisterFile, VarKey};
use erac::{lexer, CompilerConfig};
use proptest::prelude::*;

const OPERATORS: &[(&str, BinaryOp)] = &[
    ("+", BinaryOp::Add),
    ("-", BinaryOp::Sub),
    ("*", BinaryOp::Mul),
    ("&", BinaryOp::And),
    ("|", BinaryOp::Or),
    ("^", BinaryOp::Xor),
    (">", BinaryOp::Greater),
    ("<", BinaryOp::Less),
    ("=", BinaryOp::Equal),
    ("/=", BinaryOp::NotEqual),
    ("?", BinaryOp::Compare),
];

/// Literal as it may appear as an operand.
fn operand(value: i32) -> String {
    if value < 0 {
        format!("({})", value)
    } else {
        value.to_string()
    }
}

/// Build a code block of prints, counted loops, conditionals, breaks and
/// dynamic arrays.
fn structured_program(ops: &[(u8, i32)]) -> String {
    let mut body = String::from("int size := 3;\n");
    let mut open: Vec<bool> = Vec::new();
    let mut loops = 0;
    for (index, &(op, value)) in ops.iter().enumerate() {
        match op % 6 {
            1 if open.len() < 3 => {
                body.push_str(&format!("for i{} from 0 to 3 loop\n", index));
                open.push(true);
                loops += 1;
            }
            2 if open.len() < 3 => {
                body.push_str(&format!("if {} > 0 do\n", operand(value)));
                open.push(false);
            }
            3 => {
                if let Some(was_loop) = open.pop() {
                    if was_loop {
                        loops -= 1;
                    }
                    body.push_str("end\n");
                }
            }
            4 if loops > 0 => {
                body.push_str(&format!("if {} > 0 do break; end\n", operand(value)));
            }
            5 => {
                body.push_str(&format!(
                    "int[] a{0}[size + {1}]; a{0}[{1}] := {2}; print a{0}[{1}];\n",
                    index,
                    value.rem_euclid(4),
                    operand(value)
                ));
            }
            _ => body.push_str(&format!("print {};\n", operand(value))),
        }
    }
    for _ in open {
        body.push_str("end\n");
    }
    format!("code\n{}end\n", body)
}

/// Label addresses and placeholder positions of an emission tree, computed
/// by adding up fragment sizes.
#[derive(Default)]
struct Layout {
    end: u32,
    labels: HashMap<String, u32>,
    references: Vec<(u32, String, Fragment)>,
}

impl Layout {
    fn walk(&mut self, node: &CodeNode, base: u32) {
        self.end = base;
        self.visit(node);
    }

    fn visit(&mut self, node: &CodeNode) {
        for fragment in node.fragments() {
            match fragment {
                Fragment::Node(child) => self.visit(child),
                Fragment::Label(name) => {
                    self.labels.insert(name.clone(), self.end);
                }
                Fragment::Jump { target, .. } | Fragment::Address { target, .. } => {
                    self.references.push((self.end, target.clone(), fragment.clone()));
                }
                Fragment::Bytes(_) => {}
            }
            if !matches!(fragment, Fragment::Node(_)) {
                self.end += fragment.size() as u32;
            }
        }
    }
}

/// One step applied to a register file.
#[derive(Debug, Clone)]
enum RegisterOp {
    Bind(u8, u8),
    Unbind(u8),
    Occupy(u8),
    Release(u8),
    /// Take a register for a temporary the way the allocator does, evicting
    /// the lowest variable when none is free.
    Temporary,
}

fn register_op() -> impl Strategy<Value = RegisterOp> {
    let register = 0u8..GENERAL_COUNT;
    prop_oneof![
        (register.clone(), 0u8..40).prop_map(|(r, v)| RegisterOp::Bind(r, v)),
        register.clone().prop_map(RegisterOp::Unbind),
        register.clone().prop_map(RegisterOp::Occupy),
        register.prop_map(RegisterOp::Release),
        Just(RegisterOp::Temporary),
    ]
}

fn variable(index: u8) -> VarKey {
    (ScopeId(1 + u32::from(index % 3)), format!("v{}", index))
}

fn compile_and_run(source: &str) -> (Vec<u8>, Machine) {
    let mut config = CompilerConfig::default();
    let image = erac::compile_with_config(source, &mut config).unwrap();
    let mut machine = Machine::load(&image, config.memory_budget).unwrap();
    machine.run().unwrap();
    (image, machine)
}

// ============================================================================
// Lexer Property Tests
// ============================================================================

proptest! {
    /// Property: token spans are ordered, in bounds and non-overlapping.
    #[test]
    fn prop_lexer_spans(source in "[a-z0-9 +\\-*&|^?=<>:;(),.@\\[\\]\\n]{0,200}") {
        if let Ok(tokens) = lexer::tokenize(&source) {
            for (token, span) in &tokens {
                prop_assert!(span.start < span.end, "empty span for {:?}", token);
                prop_assert!(span.end <= source.len());
            }
            for pair in tokens.windows(2) {
                prop_assert!(pair[0].1.end <= pair[1].1.start);
            }
        }
    }

    /// Property: arbitrary input never panics the compiler.
    #[test]
    fn prop_compile_never_panics(source in "[a-z0-9 +\\-*:;=<>()\\n]{0,120}") {
        let _ = erac::compile(&source);
        let _ = erac::compile(&format!("code {} end", source));
    }
}

// ============================================================================
// Folding Property Tests
// ============================================================================

proptest! {
    /// Property: a folded binary expression equals the value computed by the
    /// generated code for the same operands.
    #[test]
    fn prop_folding_matches_execution(
        left in -1000i32..1000,
        right in -1000i32..1000,
        index in 0..OPERATORS.len(),
    ) {
        let (symbol, op) = OPERATORS[index];
        let folded = common::run(&format!(
            "code print {} {} {}; end",
            operand(left), symbol, operand(right)
        ));
        let computed = common::run(&format!(
            "code int a := {}; int b := {}; print a {} b; end",
            left, right, symbol
        ));
        prop_assert_eq!(&folded, &vec![fold::evaluate(op, left, right)]);
        prop_assert_eq!(folded, computed);
    }

    /// Property: shifts agree between folding and execution.
    #[test]
    fn prop_shift_folding_matches_execution(value in -5000i32..5000, count in 0i32..36) {
        for (symbol, op) in [("<=", BinaryOp::ShiftLeft), (">=", BinaryOp::ShiftRight)] {
            let computed = common::run(&format!(
                "code int a := {}; int b := {}; print a {} b; end",
                value, count, symbol
            ));
            prop_assert_eq!(computed, vec![fold::evaluate(op, value, count)]);
        }
    }

    /// Property: re-association groups operands the same way whether or not
    /// they are constant.
    #[test]
    fn prop_precedence_matches_execution(
        values in prop::array::uniform3(-100i32..100),
        first in 0..OPERATORS.len(),
        second in 0..OPERATORS.len(),
    ) {
        let (s1, _) = OPERATORS[first];
        let (s2, _) = OPERATORS[second];
        let folded = common::run(&format!(
            "code print {} {} {} {} {}; end",
            operand(values[0]), s1, operand(values[1]), s2, operand(values[2])
        ));
        let computed = common::run(&format!(
            "code int a := {}; int b := {}; int c := {}; print a {} b {} c; end",
            values[0], values[1], values[2], s1, s2
        ));
        prop_assert_eq!(folded, computed);
    }
}

// ============================================================================
// Register Allocation Property Tests
// ============================================================================

proptest! {
    /// Property: the variable and register maps stay exact inverses through
    /// any sequence of binds, unbinds, temporaries and evictions.
    #[test]
    fn prop_register_file_stays_bijective(ops in prop::collection::vec(register_op(), 0..200)) {
        let mut file = RegisterFile::new();
        for op in ops {
            match op {
                RegisterOp::Bind(register, index) => {
                    let key = variable(index);
                    file.bind(register, key.clone());
                    prop_assert_eq!(file.register_of(&key), Some(register));
                    prop_assert_eq!(file.variable_in(register), Some(&key));
                }
                RegisterOp::Unbind(register) => {
                    let key = file.unbind(register);
                    if let Some(key) = key {
                        prop_assert_eq!(file.register_of(&key), None);
                    }
                    prop_assert!(!file.is_occupied(register));
                }
                RegisterOp::Occupy(register) => file.occupy(register),
                RegisterOp::Release(register) => {
                    let held = file.variable_in(register).cloned();
                    file.release(register);
                    prop_assert_eq!(file.variable_in(register), held.as_ref());
                }
                RegisterOp::Temporary => {
                    let register = match file.lowest_free() {
                        Some(register) => Some(register),
                        None => file.lowest_variable_register(&[]).map(|register| {
                            file.unbind(register);
                            register
                        }),
                    };
                    if let Some(register) = register {
                        file.occupy(register);
                        prop_assert_eq!(file.variable_in(register), None);
                    }
                }
            }
            prop_assert!(file.is_consistent());
            let resident: HashSet<u8> = file.resident().iter().map(|(r, _)| *r).collect();
            for register in file.temporaries() {
                prop_assert!(!resident.contains(&register));
            }
        }
    }
}

// ============================================================================
// Code Generation Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: compiling the same source twice yields identical images.
    #[test]
    fn prop_compilation_is_deterministic(ops in prop::collection::vec((0u8..6, -50i32..50), 0..30)) {
        let source = structured_program(&ops);
        let first = erac::compile(&source).unwrap();
        let second = erac::compile(&source).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Property: every jump and address load in the image holds the exact
    /// address its label was placed at.
    #[test]
    fn prop_jump_targets_are_label_addresses(ops in prop::collection::vec((0u8..6, -50i32..50), 0..30)) {
        let source = structured_program(&ops);
        let image = erac::compile(&source).unwrap();
        let code_base = u32::from_be_bytes([image[10], image[11], image[12], image[13]]);

        let tree = erac::analyze(&source).unwrap();
        let config = CompilerConfig::default();
        let root = CodeGenerator::new(&tree, &config).emission_tree().unwrap();
        let mut layout = Layout::default();
        layout.walk(&root, code_base);
        prop_assert_eq!(layout.end as usize, image.len());

        for (at, target, kind) in &layout.references {
            let address = layout.labels[target] as i32;
            let at = *at as usize;
            match kind {
                Fragment::Jump { condition, .. } => {
                    prop_assert_eq!(
                        Instruction::decode(&image[at..]),
                        Some(Instruction::Ldl { dst: registers::SCRATCH, value: address })
                    );
                    prop_assert_eq!(
                        Instruction::decode(&image[at + 6..]),
                        Some(Instruction::Cbr { cond: *condition, target: registers::SCRATCH })
                    );
                }
                Fragment::Address { register, .. } => {
                    prop_assert_eq!(
                        Instruction::decode(&image[at..]),
                        Some(Instruction::Ldl { dst: *register, value: address })
                    );
                }
                _ => {}
            }
        }
    }

    /// Property: structured programs stop and give back all heap records,
    /// heap blocks and stack frames.
    #[test]
    fn prop_programs_restore_memory(ops in prop::collection::vec((0u8..6, -50i32..50), 0..30)) {
        let source = structured_program(&ops);
        let (image, machine) = compile_and_run(&source);
        prop_assert_eq!(machine.heap_top() as usize, image.len());
        let top = image.len() as i32 + CompilerConfig::default().memory_budget as i32;
        prop_assert_eq!(machine.registers[erac::codegen::isa::registers::SP as usize], top);
    }
}

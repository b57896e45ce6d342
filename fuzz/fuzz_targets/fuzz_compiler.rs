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


//! Fuzz target for the complete ERA compiler pipeline.
//!
//! Every image the compiler accepts must decode again: the header must
//! describe the segments and the code segment must consist of valid
//! instructions.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_compiler
//!
//! Run for a specific duration:
//!   cargo +nightly fuzz run fuzz_compiler -- -max_total_time=60

#![no_main]

use arbitrary::Arbitrary;
use erac::CompilerConfig;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    source: String,
    /// Compile the text as the body of a code block.
    statements_only: bool,
    memory_budget: u16,
}

fuzz_target!(|input: Input| {
    let source = if input.statements_only {
        format!("code {} end", input.source)
    } else {
        input.source
    };
    let mut config = CompilerConfig::with_memory_budget(u32::from(input.memory_budget) + 64);
    if let Ok(image) = erac::compile_with_config(&source, &mut config) {
        if let Err(err) = erac::codegen::disassemble(&image) {
            panic!("compiled image does not decode: {}", err);
        }
    }
});

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


//! Fuzz target for the ERA parser.
//!
//! Random text is parsed both as a whole program and as the body of a code
//! block, so statement-level input reaches the statement parser.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_parser
//!
//! Run for a specific duration:
//!   cargo +nightly fuzz run fuzz_parser -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    for text in [source.to_string(), format!("code {} end", source)] {
        if let Ok(tokens) = erac::lexer::tokenize(&text) {
            let _ = erac::parser::parse(&tokens);
        }
    }
});

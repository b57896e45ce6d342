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


//! Snapshot tests for the ERA compiler.
//!
//! These tests use the `insta` crate to capture and verify output
//! from various compiler stages.

use erac::{format_error, lexer, Span, Token};

/// Format tokens for snapshot comparison.
fn format_tokens(tokens: &[(Token, Span)]) -> String {
    tokens
        .iter()
        .map(|(token, span)| format!("{:?} @ {}..{}", token, span.start, span.end))
        .collect::<Vec<_>>()
        .join("\n")
}

// ============================================================================
// Lexer Snapshot Tests
// ============================================================================

#[test]
fn test_lexer_snapshot_print() {
    let tokens = lexer::tokenize("code print 1; end").unwrap();
    insta::assert_snapshot!(format_tokens(&tokens), @r###"
Code @ 0..4
Print @ 5..10
Integer(1) @ 11..12
Semicolon @ 12..13
End @ 14..17
"###);
}

#[test]
fn test_lexer_snapshot_asm() {
    let tokens = lexer::tokenize("asm R1 := 7; end").unwrap();
    insta::assert_snapshot!(format_tokens(&tokens), @r###"
Asm @ 0..3
Register(1) @ 4..6
Assign @ 7..9
Integer(7) @ 10..11
Semicolon @ 11..12
End @ 13..16
"###);
}

#[test]
fn test_lexer_snapshot_pointers() {
    let tokens = lexer::tokenize("->p := <-a;").unwrap();
    insta::assert_snapshot!(format_tokens(&tokens), @r###"
Arrow @ 0..2
Identifier("p") @ 2..3
Assign @ 4..6
LeftArrow @ 7..9
Identifier("a") @ 9..10
Semicolon @ 10..11
"###);
}

// ============================================================================
// Error Snapshot Tests
// ============================================================================

#[test]
fn test_error_snapshot_integer_out_of_range() {
    let source = "code\n  print 99999999999;\nend";
    let err = erac::compile(source).unwrap_err();
    insta::assert_snapshot!(format_error(&err, source, Some("test.era")), @r###"
lexical error[E020]: integer literal 99999999999 does not fit in 32 bits
  --> test.era:2:9
  |
2 |   print 99999999999;
  |         ^^^^^^^^^^^
  = hint: integer literals range from 0 to 2147483647
"###);
}

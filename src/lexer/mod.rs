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

//! Lexer module for the ERA compiler.
//!
//! This module tokenizes ERA source code into a stream of tokens using a
//! `logos` generated scanner. It handles:
//! - Keywords and identifiers
//! - Decimal integer literals
//! - Register operands (`R0`..`R31`, `FP`, `SP`, `SB`, `PC`)
//! - Operators and punctuation
//! - Line comments (starting with `//`)

mod tokens;

pub use tokens::Token;

use crate::error::{CompileError, ErrorCode, Span};
use logos::Logos;

/// Tokenize the entire source code.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>, CompileError> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span = Span::from(lexer.span());
        match result {
            Ok(Token::Integer(value)) if value > i32::MAX as i64 => {
                return Err(integer_out_of_range(lexer.slice(), span));
            }
            Ok(token) => tokens.push((token, span)),
            Err(()) => return Err(classify_error(lexer.slice(), span)),
        }
    }

    tracing::trace!(count = tokens.len(), "tokenized source");
    Ok(tokens)
}

fn integer_out_of_range(text: &str, span: Span) -> CompileError {
    CompileError::new(
        ErrorCode::IntegerOutOfRange,
        format!("integer literal {} does not fit in 32 bits", text),
        span,
    )
    .with_hint("integer literals range from 0 to 2147483647")
}

/// Turn a rejected slice into the most specific lexical error.
fn classify_error(text: &str, span: Span) -> CompileError {
    if text.starts_with('"') {
        return CompileError::new(
            ErrorCode::UnterminatedString,
            "unterminated string literal",
            span,
        );
    }
    if text.len() > 1 && text.starts_with('R') && text[1..].bytes().all(|b| b.is_ascii_digit()) {
        return CompileError::new(
            ErrorCode::InvalidRegister,
            format!("invalid register '{}'", text),
            span,
        )
        .with_hint("registers are numbered R0 to R31");
    }
    if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
        return integer_out_of_range(text, span);
    }
    CompileError::new(
        ErrorCode::InvalidCharacter,
        format!("invalid character '{}'", text),
        span,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    // ========================================
    // Basic Token Tests
    // ========================================

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("code int x end"),
            vec![
                Token::Code,
                Token::Int,
                Token::Identifier("x".to_string()),
                Token::End
            ]
        );
    }

    #[test]
    fn test_assignment_operators() {
        assert_eq!(
            kinds(":= += -= >>= <<= |= &= ^= ?= <=>"),
            vec![
                Token::Assign,
                Token::PlusAssign,
                Token::MinusAssign,
                Token::ShiftRightAssign,
                Token::ShiftLeftAssign,
                Token::OrAssign,
                Token::AndAssign,
                Token::XorAssign,
                Token::CompareAssign,
                Token::Swap,
            ]
        );
    }

    #[test]
    fn test_expression_operators() {
        assert_eq!(
            kinds("+ - * & | ^ ? = /= < > <= >= -> <-"),
            vec![
                Token::Plus,
                Token::Minus,
                Token::Star,
                Token::Ampersand,
                Token::Pipe,
                Token::Caret,
                Token::Question,
                Token::Equal,
                Token::NotEqual,
                Token::Less,
                Token::Greater,
                Token::LessEqual,
                Token::GreaterEqual,
                Token::Arrow,
                Token::LeftArrow,
            ]
        );
    }

    #[test]
    fn test_registers() {
        assert_eq!(
            kinds("R0 R26 R31 FP SP SB PC Rx"),
            vec![
                Token::Register(0),
                Token::Register(26),
                Token::Register(31),
                Token::Register(28),
                Token::Register(29),
                Token::Register(30),
                Token::Register(31),
                Token::Identifier("Rx".to_string()),
            ]
        );
    }

    #[test]
    fn test_integers_and_strings() {
        assert_eq!(
            kinds("0 42 2147483647 \"KB 16\""),
            vec![
                Token::Integer(0),
                Token::Integer(42),
                Token::Integer(2147483647),
                Token::Str("KB 16".to_string()),
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("code // the entry point\nend"),
            vec![Token::Code, Token::End]
        );
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize("int  abc").unwrap();
        assert_eq!(tokens[0].1, Span::new(0, 3));
        assert_eq!(tokens[1].1, Span::new(5, 8));
    }

    // ========================================
    // Error Tests
    // ========================================

    #[test]
    fn test_invalid_register() {
        let err = tokenize("R32 := 1;").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRegister);
    }

    #[test]
    fn test_integer_out_of_range() {
        let err = tokenize("2147483648").unwrap_err();
        assert_eq!(err.code, ErrorCode::IntegerOutOfRange);
        let err = tokenize("99999999999999999999999").unwrap_err();
        assert_eq!(err.code, ErrorCode::IntegerOutOfRange);
    }

    #[test]
    fn test_invalid_character() {
        let err = tokenize("int x $ 1;").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCharacter);
        assert_eq!(err.span, Span::new(6, 7));
    }
}

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

//! Cursor over the token vector shared by all parsing rules.
//!
//! Every `expect_*` method consumes on success and leaves the cursor in
//! place on failure, so the caller can report the offending token.

use super::Parser;
use crate::error::{CompileError, ErrorCode, Span};
use crate::lexer::Token;

pub trait ParserHelpers<'a> {
    fn is_at_end(&self) -> bool;

    fn peek(&self) -> Option<&Token>;

    fn peek_span(&self) -> Option<Span>;

    /// Token `n` places after the cursor; `peek_ahead(0)` equals `peek()`.
    fn peek_ahead(&self, n: usize) -> Option<&Token>;

    /// Span of the token before the cursor.
    fn previous_span(&self) -> Span;

    /// Span of the current token, or of the last one at end of input.
    fn current_span(&self) -> Span;

    fn advance(&mut self) -> Option<(Token, Span)>;

    /// Compares variants only, so `Token::Integer(0)` matches any integer.
    fn check(&self, expected: &Token) -> bool;

    fn check_any(&self, expected: &[Token]) -> bool;

    /// Consume the current token if `check` accepts it.
    fn match_token(&mut self, expected: &Token) -> bool;

    /// Consume `expected` and return its span. `message` names what was
    /// wanted in the error.
    fn expect(&mut self, expected: &Token, message: &str) -> Result<Span, CompileError>;

    fn expect_identifier(&mut self, what: &str) -> Result<(String, Span), CompileError>;

    fn expect_string(&mut self, what: &str) -> Result<(String, Span), CompileError>;

    fn expect_register(&mut self, what: &str) -> Result<u8, CompileError>;

    /// Integer literal with an optional leading `-`.
    fn expect_literal(&mut self, what: &str) -> Result<(i64, Span), CompileError>;

    fn error(&self, code: ErrorCode, message: impl Into<String>) -> CompileError;

    /// "Expected X, found Y". At end of input the code becomes
    /// `UnexpectedEndOfFile`.
    fn unexpected(&self, code: ErrorCode, expected: &str) -> CompileError;
}

impl<'a> ParserHelpers<'a> for Parser<'a> {
    fn is_at_end(&self) -> bool {
        self.position >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Option<Span> {
        self.tokens.get(self.position).map(|(_, s)| *s)
    }

    fn peek_ahead(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.position + n).map(|(t, _)| t)
    }

    fn previous_span(&self) -> Span {
        if self.position > 0 {
            self.tokens[self.position - 1].1
        } else if let Some((_, span)) = self.tokens.first() {
            *span
        } else {
            Span::new(0, 0)
        }
    }

    fn current_span(&self) -> Span {
        self.peek_span().unwrap_or_else(|| {
            let previous = self.previous_span();
            Span::new(previous.end, previous.end)
        })
    }

    fn advance(&mut self) -> Option<(Token, Span)> {
        let result = self.tokens.get(self.position).cloned();
        if result.is_some() {
            self.position += 1;
        }
        result
    }

    fn check(&self, expected: &Token) -> bool {
        self.peek()
            .is_some_and(|t| std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    fn check_any(&self, expected: &[Token]) -> bool {
        expected.iter().any(|e| self.check(e))
    }

    fn match_token(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, message: &str) -> Result<Span, CompileError> {
        if self.check(expected) {
            let span = self.current_span();
            self.position += 1;
            Ok(span)
        } else {
            let code = if self.is_at_end() {
                ErrorCode::UnexpectedEndOfFile
            } else {
                ErrorCode::ExpectedToken
            };
            Err(self.unexpected(code, message))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> Result<(String, Span), CompileError> {
        match self.peek() {
            Some(Token::Identifier(name)) => {
                let name = name.clone();
                let span = self.current_span();
                self.position += 1;
                Ok((name, span))
            }
            _ => Err(self.unexpected(ErrorCode::ExpectedIdentifier, what)),
        }
    }

    fn expect_string(&mut self, what: &str) -> Result<(String, Span), CompileError> {
        match self.peek() {
            Some(Token::Str(text)) => {
                let text = text.clone();
                let span = self.current_span();
                self.position += 1;
                Ok((text, span))
            }
            _ => Err(self.unexpected(ErrorCode::ExpectedLiteral, what)),
        }
    }

    fn expect_register(&mut self, what: &str) -> Result<u8, CompileError> {
        match self.peek() {
            Some(Token::Register(number)) => {
                let number = *number;
                self.position += 1;
                Ok(number)
            }
            _ => Err(self.unexpected(ErrorCode::ExpectedToken, what)),
        }
    }

    fn expect_literal(&mut self, what: &str) -> Result<(i64, Span), CompileError> {
        let start = self.current_span();
        let negative = self.match_token(&Token::Minus);
        match self.peek() {
            Some(Token::Integer(value)) => {
                let value = *value;
                let span = start.merge(&self.current_span());
                self.position += 1;
                Ok((if negative { -value } else { value }, span))
            }
            _ => Err(self.unexpected(ErrorCode::ExpectedLiteral, what)),
        }
    }

    fn error(&self, code: ErrorCode, message: impl Into<String>) -> CompileError {
        CompileError::new(code, message, self.current_span())
    }

    fn unexpected(&self, code: ErrorCode, expected: &str) -> CompileError {
        let found = self
            .peek()
            .map_or("end of file".to_string(), |t| t.to_string());
        let code = if self.is_at_end() {
            ErrorCode::UnexpectedEndOfFile
        } else {
            code
        };
        self.error(code, format!("Expected {}, found {}", expected, found))
    }
}

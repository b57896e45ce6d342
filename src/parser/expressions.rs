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

//! Expression parsing.
//!
//! ERA expressions are parsed as flat operand/operator chains. Operator
//! priority is not applied here; the annotator re-associates the chain.

use super::helpers::ParserHelpers;
use super::Parser;
use crate::ast::{BinaryOp, CallExpr, Expr, Operand, OperandKind};
use crate::error::{CompileError, ErrorCode, Span};
use crate::lexer::Token;

/// Trait for expression parsing operations.
pub trait ExpressionParser {
    /// Parse an operand/operator chain.
    fn parse_expression(&mut self) -> Result<Expr, CompileError>;

    /// Parse a single operand.
    fn parse_operand(&mut self) -> Result<Operand, CompileError>;

    /// Parse the argument list of a call, starting at `(`.
    fn parse_call_arguments(&mut self) -> Result<(Vec<Expr>, Span), CompileError>;
}

/// Map a token to the binary operator it denotes.
fn binary_operator(token: &Token) -> Option<BinaryOp> {
    match token {
        Token::Star => Some(BinaryOp::Mul),
        Token::Plus => Some(BinaryOp::Add),
        Token::Minus => Some(BinaryOp::Sub),
        Token::LessEqual => Some(BinaryOp::ShiftLeft),
        Token::GreaterEqual => Some(BinaryOp::ShiftRight),
        Token::Greater => Some(BinaryOp::Greater),
        Token::Less => Some(BinaryOp::Less),
        Token::Equal => Some(BinaryOp::Equal),
        Token::NotEqual => Some(BinaryOp::NotEqual),
        Token::Ampersand => Some(BinaryOp::And),
        Token::Caret => Some(BinaryOp::Xor),
        Token::Pipe => Some(BinaryOp::Or),
        Token::Question => Some(BinaryOp::Compare),
        _ => None,
    }
}

impl<'a> ExpressionParser for Parser<'a> {
    fn parse_expression(&mut self) -> Result<Expr, CompileError> {
        let first = self.parse_operand()?;
        let mut span = first.span;
        let mut operands = vec![first];
        let mut operators = Vec::new();

        while let Some(op) = self.peek().and_then(binary_operator) {
            self.advance();
            let operand = self.parse_operand()?;
            span = span.merge(&operand.span);
            operators.push(op);
            operands.push(operand);
        }

        Ok(Expr::chain(operands, operators, span))
    }

    fn parse_operand(&mut self) -> Result<Operand, CompileError> {
        let start = self.current_span();
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected(ErrorCode::ExpectedExpression, "an expression"));
        };

        match token {
            Token::Integer(_) | Token::Minus => {
                let (value, span) = self.expect_literal("an integer literal")?;
                Ok(Operand::new(OperandKind::Literal(value as i32), span))
            }
            Token::LeftParen => {
                self.advance();
                let inner = self.parse_expression()?;
                let end = self.expect(&Token::RightParen, "')' after expression")?;
                Ok(Operand::new(
                    OperandKind::Group(Box::new(inner)),
                    start.merge(&end),
                ))
            }
            Token::LeftArrow => {
                self.advance();
                let (name, name_span) = self.expect_identifier("variable name after '<-'")?;
                Ok(Operand::new(
                    OperandKind::Reference(name),
                    start.merge(&name_span),
                ))
            }
            Token::Arrow => {
                self.advance();
                if self.check_any(&[Token::Integer(0), Token::Minus]) {
                    let (address, span) = self.expect_literal("an address")?;
                    return Ok(Operand::new(
                        OperandKind::ExplicitAddress(address as i32),
                        start.merge(&span),
                    ));
                }
                let inner = self.parse_operand()?;
                let span = start.merge(&inner.span);
                Ok(Operand::new(OperandKind::Dereference(Box::new(inner)), span))
            }
            Token::Register(number) => {
                self.advance();
                Ok(Operand::new(OperandKind::Register(number), start))
            }
            Token::Identifier(name) => {
                self.advance();
                if self.check(&Token::LeftBracket) {
                    self.advance();
                    let index = self.parse_expression()?;
                    let end = self.expect(&Token::RightBracket, "']' after index")?;
                    return Ok(Operand::new(
                        OperandKind::Index {
                            name,
                            index: Box::new(index),
                        },
                        start.merge(&end),
                    ));
                }
                if self.check(&Token::Dot) {
                    self.advance();
                    let (member, member_span) = self.expect_identifier("member name after '.'")?;
                    if self.check(&Token::LeftParen) {
                        let (args, end) = self.parse_call_arguments()?;
                        let span = start.merge(&end);
                        return Ok(Operand::new(
                            OperandKind::Call(CallExpr {
                                module: Some(name),
                                name: member,
                                args,
                                span,
                            }),
                            span,
                        ));
                    }
                    return Ok(Operand::new(
                        OperandKind::Field {
                            base: name,
                            field: member,
                        },
                        start.merge(&member_span),
                    ));
                }
                if self.check(&Token::LeftParen) {
                    let (args, end) = self.parse_call_arguments()?;
                    let span = start.merge(&end);
                    return Ok(Operand::new(
                        OperandKind::Call(CallExpr {
                            module: None,
                            name,
                            args,
                            span,
                        }),
                        span,
                    ));
                }
                Ok(Operand::new(OperandKind::Identifier(name), start))
            }
            _ => Err(self.unexpected(ErrorCode::ExpectedExpression, "an expression")),
        }
    }

    fn parse_call_arguments(&mut self) -> Result<(Vec<Expr>, Span), CompileError> {
        self.expect(&Token::LeftParen, "'(' before arguments")?;
        let mut args = Vec::new();
        if !self.check(&Token::RightParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.match_token(&Token::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(&Token::RightParen, "')' after arguments")?;
        Ok((args, end))
    }
}

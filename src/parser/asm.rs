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

//! Assembly block parsing.
//!
//! `asm ... end` blocks contain statements that map one-to-one onto machine
//! instructions. Literal range checks are left to code generation.

use super::helpers::ParserHelpers;
use super::Parser;
use crate::ast::{AsmKind, AsmOp, AsmStatement};
use crate::error::{CompileError, ErrorCode};
use crate::lexer::Token;

/// Trait for assembly block parsing.
pub trait AsmParser {
    /// Parse `asm stmt; stmt; ... end`.
    fn parse_asm_block(&mut self) -> Result<Vec<AsmStatement>, CompileError>;

    /// Parse one assembly statement (without its `;`).
    fn parse_asm_statement(&mut self) -> Result<AsmStatement, CompileError>;
}

fn alu_operator(token: &Token) -> Option<AsmOp> {
    match token {
        Token::PlusAssign => Some(AsmOp::Add),
        Token::MinusAssign => Some(AsmOp::Sub),
        Token::ShiftRightAssign => Some(AsmOp::Asr),
        Token::ShiftLeftAssign => Some(AsmOp::Asl),
        Token::OrAssign => Some(AsmOp::Or),
        Token::AndAssign => Some(AsmOp::And),
        Token::XorAssign => Some(AsmOp::Xor),
        Token::LessEqual => Some(AsmOp::Lsl),
        Token::GreaterEqual => Some(AsmOp::Lsr),
        Token::CompareAssign => Some(AsmOp::Cnd),
        _ => None,
    }
}

impl<'a> AsmParser for Parser<'a> {
    fn parse_asm_block(&mut self) -> Result<Vec<AsmStatement>, CompileError> {
        self.expect(&Token::Asm, "'asm'")?;
        let mut statements = Vec::new();
        loop {
            statements.push(self.parse_asm_statement()?);
            self.expect(&Token::Semicolon, "';' after assembly statement")?;
            if self.check(&Token::End) {
                break;
            }
        }
        self.expect(&Token::End, "'end' after assembly block")?;
        Ok(statements)
    }

    fn parse_asm_statement(&mut self) -> Result<AsmStatement, CompileError> {
        let start = self.current_span();
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected(ErrorCode::ExpectedStatement, "an assembly statement"));
        };

        let kind = match token {
            Token::Skip => {
                self.advance();
                AsmKind::Skip
            }
            Token::Stop => {
                self.advance();
                AsmKind::Stop
            }
            Token::Format => {
                self.advance();
                let (width, _) = self.expect_literal("operand width 8, 16 or 32")?;
                AsmKind::Format(width)
            }
            Token::Print => {
                self.advance();
                AsmKind::Print(self.expect_register("register after 'print'")?)
            }
            Token::If => {
                self.advance();
                let condition = self.expect_register("condition register")?;
                self.expect(&Token::Goto, "'goto'")?;
                let target = self.expect_register("target register")?;
                AsmKind::Branch { condition, target }
            }
            Token::Arrow => {
                self.advance();
                let addr = self.expect_register("address register after '->'")?;
                self.expect(&Token::Assign, "':='")?;
                let src = self.expect_register("source register")?;
                AsmKind::Store { src, addr }
            }
            Token::Register(dst) => {
                self.advance();
                if self.match_token(&Token::Assign) {
                    if self.match_token(&Token::Arrow) {
                        let addr = self.expect_register("address register after '->'")?;
                        AsmKind::Load { dst, addr }
                    } else if let Some(Token::Register(src)) = self.peek().cloned() {
                        self.advance();
                        if self.match_token(&Token::Plus) {
                            let (offset, _) = self.expect_literal("address offset")?;
                            AsmKind::LoadAddress {
                                dst,
                                base: src,
                                offset,
                            }
                        } else {
                            AsmKind::Move { dst, src }
                        }
                    } else {
                        let (value, _) = self.expect_literal("a register or literal")?;
                        AsmKind::LoadConstant { dst, value }
                    }
                } else if let Some(op) = self.peek().and_then(alu_operator) {
                    self.advance();
                    let src = self.expect_register("source register")?;
                    AsmKind::Alu { op, dst, src }
                } else {
                    return Err(self.unexpected(
                        ErrorCode::ExpectedToken,
                        "':=' or an operation such as '+='",
                    ));
                }
            }
            _ => {
                return Err(self.unexpected(ErrorCode::ExpectedStatement, "an assembly statement"))
            }
        };

        Ok(AsmStatement {
            kind,
            span: start.merge(&self.previous_span()),
        })
    }
}

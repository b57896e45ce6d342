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

//! Statement parsing.
//!
//! This module handles labels, declarations used as statements, assignments,
//! swaps, calls and every structured statement (`if`, `for`, `while`,
//! `loop`, `do`) as well as `break`, `goto`, `return` and `print`.

use super::asm::AsmParser;
use super::expressions::ExpressionParser;
use super::helpers::ParserHelpers;
use super::units::UnitParser;
use super::Parser;
use crate::ast::{Block, Label, Operand, OperandKind, Statement, StatementKind};
use crate::error::{CompileError, ErrorCode};
use crate::lexer::Token;

/// Trait for statement parsing operations.
pub trait StatementParser {
    /// Parse statements until one of the terminator tokens is next.
    fn parse_block_until(&mut self, terminators: &[Token]) -> Result<Block, CompileError>;

    /// Parse a single (possibly labeled) statement.
    fn parse_statement(&mut self) -> Result<Statement, CompileError>;

    /// Parse an assignment or swap starting at its target.
    fn parse_assignment(&mut self) -> Result<StatementKind, CompileError>;

    /// Parse `if cond do ... [else ...] end`.
    fn parse_if(&mut self) -> Result<StatementKind, CompileError>;

    /// Parse `for i [from a] [to b] [step c] loop ... end`.
    fn parse_for(&mut self) -> Result<StatementKind, CompileError>;

    /// Parse `while cond loop ... end`.
    fn parse_while(&mut self) -> Result<StatementKind, CompileError>;

    /// Parse `loop ... [while cond] end`.
    fn parse_loop(&mut self) -> Result<StatementKind, CompileError>;
}

/// Check that an operand can be assigned to.
fn check_assignable(operand: &Operand) -> Result<(), CompileError> {
    match operand.kind {
        OperandKind::Identifier(_)
        | OperandKind::Register(_)
        | OperandKind::Dereference(_)
        | OperandKind::ExplicitAddress(_)
        | OperandKind::Index { .. }
        | OperandKind::Field { .. } => Ok(()),
        _ => Err(CompileError::new(
            ErrorCode::InvalidAssignmentTarget,
            "Invalid assignment target",
            operand.span,
        )
        .with_hint("assign to a variable, array element, field, register or dereference")),
    }
}

impl<'a> StatementParser for Parser<'a> {
    fn parse_block_until(&mut self, terminators: &[Token]) -> Result<Block, CompileError> {
        let start = self.current_span();
        let mut statements = Vec::new();
        while !self.check_any(terminators) {
            if self.is_at_end() {
                return Err(self.unexpected(ErrorCode::UnexpectedEndOfFile, "'end'"));
            }
            statements.push(self.parse_statement()?);
        }
        let span = start.merge(&self.previous_span());
        Ok(Block::new(statements, span))
    }

    fn parse_statement(&mut self) -> Result<Statement, CompileError> {
        let start = self.current_span();

        let label = if self.check(&Token::Less)
            && matches!(self.peek_ahead(1), Some(Token::Identifier(_)))
            && matches!(self.peek_ahead(2), Some(Token::Greater))
        {
            self.advance();
            let (name, span) = self.expect_identifier("label name")?;
            self.advance();
            Some(Label { name, span })
        } else {
            None
        };

        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected(ErrorCode::ExpectedStatement, "a statement"));
        };

        let kind = match token {
            _ if self.is_declaration_start() => StatementKind::Declaration(self.parse_declaration()?),
            Token::Identifier(_) => {
                let is_call = matches!(self.peek_ahead(1), Some(Token::LeftParen))
                    || (matches!(self.peek_ahead(1), Some(Token::Dot))
                        && matches!(self.peek_ahead(3), Some(Token::LeftParen)));
                if is_call {
                    let operand = self.parse_operand()?;
                    self.expect(&Token::Semicolon, "';' after call")?;
                    match operand.kind {
                        OperandKind::Call(call) => StatementKind::Call(call),
                        _ => return Err(self.error(ErrorCode::ExpectedStatement, "Expected a call")),
                    }
                } else {
                    self.parse_assignment()?
                }
            }
            Token::Register(_) | Token::Arrow => self.parse_assignment()?,
            Token::If => self.parse_if()?,
            Token::For => self.parse_for()?,
            Token::While => self.parse_while()?,
            Token::Loop => self.parse_loop()?,
            Token::Do => {
                self.advance();
                let body = self.parse_block_until(&[Token::End])?;
                self.expect(&Token::End, "'end' after block")?;
                StatementKind::Block(body)
            }
            Token::Break => {
                self.advance();
                self.expect(&Token::Semicolon, "';' after 'break'")?;
                StatementKind::Break
            }
            Token::Goto => {
                self.advance();
                let (name, _) = self.expect_identifier("label name after 'goto'")?;
                self.expect(&Token::Semicolon, "';' after goto")?;
                StatementKind::Goto(name)
            }
            Token::Return => {
                self.advance();
                let value = if self.check(&Token::Semicolon) {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                self.expect(&Token::Semicolon, "';' after return")?;
                StatementKind::Return(value)
            }
            Token::Print => {
                self.advance();
                let mut values = vec![self.parse_expression()?];
                while self.match_token(&Token::Comma) {
                    values.push(self.parse_expression()?);
                }
                self.expect(&Token::Semicolon, "';' after print")?;
                StatementKind::Print(values)
            }
            Token::Asm => StatementKind::Asm(self.parse_asm_block()?),
            _ => return Err(self.unexpected(ErrorCode::ExpectedStatement, "a statement")),
        };

        let statement = Statement::new(kind, start.merge(&self.previous_span()));
        Ok(match label {
            Some(label) => statement.with_label(label),
            None => statement,
        })
    }

    fn parse_assignment(&mut self) -> Result<StatementKind, CompileError> {
        let target = self.parse_operand()?;
        check_assignable(&target)?;

        if self.match_token(&Token::Swap) {
            let other = self.parse_operand()?;
            check_assignable(&other)?;
            self.expect(&Token::Semicolon, "';' after swap")?;
            return Ok(StatementKind::Swap {
                left: target,
                right: other,
            });
        }

        self.expect(&Token::Assign, "':=' or '<=>'")?;
        let value = self.parse_expression()?;
        self.expect(&Token::Semicolon, "';' after assignment")?;
        Ok(StatementKind::Assignment { target, value })
    }

    fn parse_if(&mut self) -> Result<StatementKind, CompileError> {
        self.expect(&Token::If, "'if'")?;
        let condition = self.parse_expression()?;
        self.expect(&Token::Do, "'do' after condition")?;
        let then_body = self.parse_block_until(&[Token::Else, Token::End])?;
        let else_body = if self.match_token(&Token::Else) {
            Some(self.parse_block_until(&[Token::End])?)
        } else {
            None
        };
        self.expect(&Token::End, "'end' after if")?;
        Ok(StatementKind::If {
            condition,
            then_body,
            else_body,
        })
    }

    fn parse_for(&mut self) -> Result<StatementKind, CompileError> {
        self.expect(&Token::For, "'for'")?;
        let (iterator, iterator_span) = self.expect_identifier("loop variable")?;

        let from = if self.match_token(&Token::From) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        let to = if self.match_token(&Token::To) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        let step = if self.match_token(&Token::Step) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        self.expect(&Token::Loop, "'loop' after for header")?;
        let body = self.parse_block_until(&[Token::End])?;
        self.expect(&Token::End, "'end' after for loop")?;
        Ok(StatementKind::For {
            iterator,
            iterator_span,
            from,
            to,
            step,
            body,
        })
    }

    fn parse_while(&mut self) -> Result<StatementKind, CompileError> {
        self.expect(&Token::While, "'while'")?;
        let condition = self.parse_expression()?;
        self.expect(&Token::Loop, "'loop' after condition")?;
        let body = self.parse_block_until(&[Token::End])?;
        self.expect(&Token::End, "'end' after while loop")?;
        Ok(StatementKind::While { condition, body })
    }

    fn parse_loop(&mut self) -> Result<StatementKind, CompileError> {
        let start = self.expect(&Token::Loop, "'loop'")?;
        let mut statements = Vec::new();
        let mut condition = None;

        while !self.check(&Token::End) {
            if self.is_at_end() {
                return Err(self.unexpected(ErrorCode::UnexpectedEndOfFile, "'end'"));
            }
            if self.check(&Token::While) {
                // `while cond end` closes the loop, `while cond loop` nests one.
                let saved = self.position;
                self.advance();
                let expr = self.parse_expression()?;
                if self.check(&Token::End) {
                    condition = Some(expr);
                    break;
                }
                self.position = saved;
            }
            statements.push(self.parse_statement()?);
        }
        self.expect(&Token::End, "'end' after loop")?;

        let body = Block::new(statements, start.merge(&self.previous_span()));
        Ok(StatementKind::LoopWhile { body, condition })
    }
}

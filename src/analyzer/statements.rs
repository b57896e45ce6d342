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

//! Statement annotation.
//!
//! This module provides the statement rules of the annotator:
//! - Declarations of variables, constants and arrays
//! - Assignments, swaps and call statements
//! - Control flow with nested body contexts
//! - Placement checks for `break` and `return`

use super::context::{Entity, EntityKind, LoopKind, ScopeKind};
use super::expressions::ExpressionAnnotator;
use super::tree::{NodeId, NodeKind};
use super::types::VarType;
use super::Annotator;
use crate::ast::{Block, Declaration, Expr, Statement, StatementKind, TypeName};
use crate::error::{CompileError, ErrorCode, Result, Span};

/// Extension trait for statement annotation.
pub trait StatementAnnotator {
    /// Annotate a statement and attach it to `parent`.
    fn annotate_statement(&mut self, stmt: &Statement, parent: NodeId) -> Result<()>;

    /// Annotate a declaration in the current context. Returns a detached node.
    fn annotate_declaration(&mut self, decl: &Declaration, span: Span) -> Result<NodeId>;

    /// Annotate a nested body with a fresh context.
    fn annotate_body(
        &mut self,
        block: &Block,
        kind: ScopeKind,
        iterator: Option<(&str, Span)>,
    ) -> Result<NodeId>;

    /// Fail unless a loop body encloses the current context.
    fn check_in_loop(&self, span: Span) -> Result<()>;

    /// Fail unless a routine encloses the current context.
    fn check_in_routine(&self, span: Span) -> Result<()>;
}

impl StatementAnnotator for Annotator<'_> {
    fn annotate_statement(&mut self, stmt: &Statement, parent: NodeId) -> Result<()> {
        let node = self.tree.add_child(
            parent,
            NodeKind::Statement {
                label: stmt.label.as_ref().map(|l| l.name.clone()),
            },
            stmt.span,
        );
        if let Some(label) = &stmt.label {
            self.declare(Entity::new(
                &label.name,
                EntityKind::Label,
                VarType::NoType,
                label.span,
            ))?;
        }

        let span = stmt.span;
        let child = match &stmt.kind {
            StatementKind::Declaration(decl) => self.annotate_declaration(decl, span)?,
            StatementKind::Assignment { target, value } => {
                let node = self.tree.add_node(NodeKind::Assignment, span);
                let target = self.annotate_target(target)?;
                let value = self.annotate_expr(value)?;
                self.tree.attach(node, target);
                self.tree.attach(node, value);
                node
            }
            StatementKind::Swap { left, right } => {
                let node = self.tree.add_node(NodeKind::Swap, span);
                let left = self.annotate_target(left)?;
                let right = self.annotate_target(right)?;
                self.tree.attach(node, left);
                self.tree.attach(node, right);
                node
            }
            StatementKind::Call(call) => self.annotate_call(call)?,
            StatementKind::If {
                condition,
                then_body,
                else_body,
            } => {
                let node = self.tree.add_node(NodeKind::If, span);
                let condition = self.annotate_expr(condition)?;
                self.tree.attach(node, condition);
                let then_node = self.annotate_body(then_body, ScopeKind::Block, None)?;
                self.tree.attach(node, then_node);
                if let Some(else_body) = else_body {
                    let else_node = self.annotate_body(else_body, ScopeKind::Block, None)?;
                    self.tree.attach(node, else_node);
                }
                node
            }
            StatementKind::For {
                iterator,
                iterator_span,
                from,
                to,
                step,
                body,
            } => {
                let node = self.tree.add_node(
                    NodeKind::For {
                        iterator: iterator.clone(),
                    },
                    span,
                );
                for (clause, default) in [(from, 0), (to, 10), (step, 1)] {
                    let value = self.annotate_optional(clause.as_ref(), default, span)?;
                    self.tree.attach(node, value);
                }
                let body = self.annotate_body(
                    body,
                    ScopeKind::LoopBody(LoopKind::For),
                    Some((iterator.as_str(), *iterator_span)),
                )?;
                self.tree.attach(node, body);
                node
            }
            StatementKind::While { condition, body } => {
                let node = self.tree.add_node(NodeKind::While, span);
                let condition = self.annotate_expr(condition)?;
                self.tree.attach(node, condition);
                let body = self.annotate_body(body, ScopeKind::LoopBody(LoopKind::While), None)?;
                self.tree.attach(node, body);
                node
            }
            StatementKind::LoopWhile { body, condition } => {
                let node = self.tree.add_node(NodeKind::LoopWhile, span);
                let body =
                    self.annotate_body(body, ScopeKind::LoopBody(LoopKind::LoopWhile), None)?;
                self.tree.attach(node, body);
                // A loop without a `while` clause runs until `break` or `goto`.
                let condition = self.annotate_optional(condition.as_ref(), 1, span)?;
                self.tree.attach(node, condition);
                node
            }
            StatementKind::Block(block) => self.annotate_body(block, ScopeKind::Block, None)?,
            StatementKind::Break => {
                self.check_in_loop(span)?;
                self.tree.add_node(NodeKind::Break, span)
            }
            StatementKind::Goto(label) => self.tree.add_node(
                NodeKind::Goto {
                    label: label.clone(),
                },
                span,
            ),
            StatementKind::Return(value) => {
                self.check_in_routine(span)?;
                let node = self.tree.add_node(NodeKind::Return, span);
                if let Some(value) = value {
                    let value = self.annotate_expr(value)?;
                    self.tree.attach(node, value);
                }
                node
            }
            StatementKind::Print(values) => {
                let node = self.tree.add_node(NodeKind::Print, span);
                for value in values {
                    let value = self.annotate_expr(value)?;
                    self.tree.attach(node, value);
                }
                node
            }
            StatementKind::Asm(statements) => {
                self.tree.add_node(NodeKind::Asm(statements.clone()), span)
            }
        };
        self.tree.attach(node, child);
        Ok(())
    }

    fn annotate_declaration(&mut self, decl: &Declaration, span: Span) -> Result<NodeId> {
        let global = self.tree.scope(self.scope).is_global();
        let node = self.tree.add_node(NodeKind::Declaration, span);

        match decl {
            Declaration::Variable { ty, items } => {
                let var_type = VarType::from_type_name(ty);
                for item in items {
                    let def = self.tree.add_child(
                        node,
                        NodeKind::VariableDef {
                            name: item.name.clone(),
                        },
                        item.span,
                    );
                    self.tree.node_mut(def).var_type = var_type.clone();
                    if let Some(init) = &item.initializer {
                        if !var_type.is_scalar() {
                            return Err(CompileError::new(
                                ErrorCode::NotAValue,
                                format!("structure variable '{}' cannot be initialized", item.name),
                                init.span,
                            ));
                        }
                        let value = self.annotate_expr(init)?;
                        if global && self.tree.node(value).constant.is_none() {
                            return Err(constant_required(&item.name, init.span));
                        }
                        self.tree.attach(def, value);
                    }
                    // Declared after the initializer so `x := x` reads an outer `x`.
                    self.declare(Entity::new(
                        &item.name,
                        EntityKind::Variable,
                        var_type.clone(),
                        item.span,
                    ))?;
                }
            }
            Declaration::Constant(items) => {
                for item in items {
                    let value = self
                        .constant_value(&item.value)
                        .ok_or_else(|| constant_required(&item.name, item.value.span))?;
                    let def = self.tree.add_child(
                        node,
                        NodeKind::ConstantDef {
                            name: item.name.clone(),
                        },
                        item.span,
                    );
                    let literal = self.literal(value, item.value.span);
                    self.tree.attach(def, literal);
                    self.declare(Entity::new(
                        &item.name,
                        EntityKind::Constant(value),
                        VarType::Int,
                        item.span,
                    ))?;
                }
            }
            Declaration::Array { element, items } => {
                if !matches!(element, TypeName::Int | TypeName::Short | TypeName::Byte) {
                    return Err(CompileError::new(
                        ErrorCode::UnknownType,
                        format!("array elements must be int, short or byte, found '{}'", element),
                        span,
                    ));
                }
                let element = VarType::from_type_name(element);
                for item in items {
                    let def = self.tree.add_child(
                        node,
                        NodeKind::ArrayDef {
                            name: item.name.clone(),
                        },
                        item.span,
                    );
                    let (var_type, size) = match self.constant_value(&item.size) {
                        Some(length) if length <= 0 => {
                            return Err(CompileError::new(
                                ErrorCode::InvalidArraySize,
                                format!("array '{}' must have a positive size, found {}", item.name, length),
                                item.size.span,
                            ));
                        }
                        Some(length) => (
                            VarType::array(element.clone(), length as u32),
                            self.literal(length, item.size.span),
                        ),
                        None if global => return Err(constant_required(&item.name, item.size.span)),
                        None => (VarType::array(element.clone(), 0), self.annotate_expr(&item.size)?),
                    };
                    self.tree.attach(def, size);
                    self.tree.node_mut(def).var_type = var_type.clone();
                    self.declare(Entity::new(&item.name, EntityKind::Array, var_type, item.span))?;
                }
            }
        }
        Ok(node)
    }

    fn annotate_body(
        &mut self,
        block: &Block,
        kind: ScopeKind,
        iterator: Option<(&str, Span)>,
    ) -> Result<NodeId> {
        let (node, scope) = self.scoped_node(NodeKind::Block, kind, block.span);
        self.in_scope(scope, |this| {
            if let Some((name, span)) = iterator {
                let mut entity = Entity::new(name, EntityKind::Iterator, VarType::Int, span);
                entity.li_start = 1;
                this.declare(entity)?;
            }
            for statement in &block.statements {
                this.annotate_statement(statement, node)?;
            }
            Ok(())
        })?;
        Ok(node)
    }

    fn check_in_loop(&self, span: Span) -> Result<()> {
        let mut current = Some(self.scope);
        while let Some(id) = current {
            let context = self.tree.scope(id);
            match context.kind {
                ScopeKind::LoopBody(_) => return Ok(()),
                ScopeKind::Block => current = context.parent,
                _ => break,
            }
        }
        Err(CompileError::new(
            ErrorCode::BreakOutsideLoop,
            "'break' outside of a loop",
            span,
        ))
    }

    fn check_in_routine(&self, span: Span) -> Result<()> {
        let mut current = Some(self.scope);
        while let Some(id) = current {
            let context = self.tree.scope(id);
            match context.kind {
                ScopeKind::Routine => return Ok(()),
                ScopeKind::Block | ScopeKind::LoopBody(_) => current = context.parent,
                _ => break,
            }
        }
        Err(CompileError::new(
            ErrorCode::ReturnOutsideRoutine,
            "'return' outside of a routine",
            span,
        ))
    }
}

impl Annotator<'_> {
    /// Annotate an optional clause, materializing `default` when absent.
    fn annotate_optional(&mut self, expr: Option<&Expr>, default: i32, span: Span) -> Result<NodeId> {
        match expr {
            Some(expr) => self.annotate_expr(expr),
            None => Ok(self.literal(default, span)),
        }
    }
}

fn constant_required(name: &str, span: Span) -> CompileError {
    CompileError::new(
        ErrorCode::ConstantRequired,
        format!("'{}' needs a constant expression here", name),
        span,
    )
}

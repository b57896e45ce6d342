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

//! Expression annotation.
//!
//! Constant expressions collapse to a single literal. Everything else is
//! re-associated into binary nodes by operator priority, folding any
//! constant sub-expression the grouping produces.

use super::fold;
use super::tree::{Aast, NodeId, NodeKind};
use super::types::VarType;
use super::Annotator;
use crate::ast::{BinaryOp, CallExpr, Expr, Operand, OperandKind};
use crate::error::{Result, Span};

/// Extension trait for expression annotation.
pub trait ExpressionAnnotator {
    /// Annotate an expression. Returns a detached node.
    fn annotate_expr(&mut self, expr: &Expr) -> Result<NodeId>;

    /// Annotate a single operand. Returns a detached node.
    fn annotate_operand(&mut self, operand: &Operand) -> Result<NodeId>;

    /// Annotate the left side of an assignment or swap.
    fn annotate_target(&mut self, operand: &Operand) -> Result<NodeId>;

    /// Annotate a routine call. Returns a detached node.
    fn annotate_call(&mut self, call: &CallExpr) -> Result<NodeId>;

    /// Value of `expr` if every operand is a literal or a named constant.
    fn constant_value(&self, expr: &Expr) -> Option<i32>;

    /// Create a detached literal node.
    fn literal(&mut self, value: i32, span: Span) -> NodeId;
}

impl ExpressionAnnotator for Annotator<'_> {
    fn annotate_expr(&mut self, expr: &Expr) -> Result<NodeId> {
        if let Some(value) = self.constant_value(expr) {
            return Ok(self.literal(value, expr.span));
        }

        let Some((first, rest)) = expr.operands.split_first() else {
            return Ok(self.literal(0, expr.span));
        };
        let first = self.annotate_operand(first)?;
        let mut chain = Vec::with_capacity(rest.len());
        for (op, operand) in expr.operators.iter().zip(rest) {
            chain.push((*op, self.annotate_operand(operand)?));
        }

        let tree = &mut self.tree;
        Ok(fold::reassociate(first, chain, |left, op, right| {
            combine(tree, left, op, right)
        }))
    }

    fn annotate_operand(&mut self, operand: &Operand) -> Result<NodeId> {
        let span = operand.span;
        let node = match &operand.kind {
            OperandKind::Literal(value) => self.literal(*value, span),
            OperandKind::Identifier(name) => {
                let entity = self.tree.lookup(self.scope, name).map(|(_, e)| e);
                if let Some(value) = entity.and_then(|e| e.constant_value()) {
                    return Ok(self.literal(value, span));
                }
                let var_type = entity.map(|e| e.var_type.clone()).unwrap_or_default();
                let node = self.tree.add_node(NodeKind::Identifier(name.clone()), span);
                self.tree.node_mut(node).var_type = var_type;
                node
            }
            OperandKind::Register(register) => {
                let node = self.tree.add_node(NodeKind::Register(*register), span);
                self.tree.node_mut(node).var_type = VarType::Int;
                node
            }
            OperandKind::Reference(name) => {
                let var_type = self
                    .tree
                    .lookup(self.scope, name)
                    .map(|(_, e)| e.var_type.address_of())
                    .unwrap_or(VarType::IntAddr);
                let node = self.tree.add_node(NodeKind::Reference(name.clone()), span);
                self.tree.node_mut(node).var_type = var_type;
                node
            }
            OperandKind::Dereference(inner) => {
                let node = self.tree.add_node(NodeKind::Dereference, span);
                let address = self.annotate_operand(inner)?;
                let var_type = self
                    .tree
                    .node(address)
                    .var_type
                    .pointee()
                    .unwrap_or(VarType::Int);
                self.tree.attach(node, address);
                self.tree.node_mut(node).var_type = var_type;
                node
            }
            OperandKind::ExplicitAddress(address) => {
                let node = self.tree.add_node(NodeKind::ExplicitAddress(*address), span);
                self.tree.node_mut(node).var_type = VarType::Int;
                node
            }
            OperandKind::Index { name, index } => {
                let node = self.tree.add_node(NodeKind::Index(name.clone()), span);
                let index = self.annotate_expr(index)?;
                self.tree.attach(node, index);
                let var_type = self
                    .tree
                    .lookup(self.scope, name)
                    .and_then(|(_, e)| e.var_type.element())
                    .unwrap_or_default();
                self.tree.node_mut(node).var_type = var_type;
                node
            }
            OperandKind::Field { base, field } => self.tree.add_node(
                NodeKind::Field {
                    base: base.clone(),
                    field: field.clone(),
                },
                span,
            ),
            OperandKind::Call(call) => self.annotate_call(call)?,
            OperandKind::Group(expr) => self.annotate_expr(expr)?,
        };
        Ok(node)
    }

    fn annotate_target(&mut self, operand: &Operand) -> Result<NodeId> {
        match &operand.kind {
            // Never fold a target; assigning to a constant is reported later.
            OperandKind::Identifier(name) => {
                let var_type = self
                    .tree
                    .lookup(self.scope, name)
                    .map(|(_, e)| e.var_type.clone())
                    .unwrap_or_default();
                let node = self
                    .tree
                    .add_node(NodeKind::Identifier(name.clone()), operand.span);
                self.tree.node_mut(node).var_type = var_type;
                Ok(node)
            }
            _ => self.annotate_operand(operand),
        }
    }

    fn annotate_call(&mut self, call: &CallExpr) -> Result<NodeId> {
        let node = self.tree.add_node(
            NodeKind::Call {
                module: call.module.clone(),
                name: call.name.clone(),
            },
            call.span,
        );
        for arg in &call.args {
            let arg = self.annotate_expr(arg)?;
            self.tree.attach(node, arg);
        }
        Ok(node)
    }

    fn constant_value(&self, expr: &Expr) -> Option<i32> {
        let values = expr
            .operands
            .iter()
            .map(|operand| self.constant_operand(operand))
            .collect::<Option<Vec<i32>>>()?;
        fold::fold_chain(&values, &expr.operators)
    }

    fn literal(&mut self, value: i32, span: Span) -> NodeId {
        let node = self.tree.add_node(NodeKind::Literal(value), span);
        let data = self.tree.node_mut(node);
        data.var_type = VarType::Int;
        data.constant = Some(value);
        node
    }
}

impl Annotator<'_> {
    fn constant_operand(&self, operand: &Operand) -> Option<i32> {
        match &operand.kind {
            OperandKind::Literal(value) => Some(*value),
            OperandKind::Identifier(name) => self
                .tree
                .lookup(self.scope, name)
                .and_then(|(_, entity)| entity.constant_value()),
            OperandKind::Group(expr) => self.constant_value(expr),
            _ => None,
        }
    }
}

/// Join two operand nodes, folding when both are constant.
fn combine(tree: &mut Aast, left: NodeId, op: BinaryOp, right: NodeId) -> NodeId {
    let span = tree.node(left).span.merge(&tree.node(right).span);
    if let (Some(a), Some(b)) = (tree.node(left).constant, tree.node(right).constant) {
        let value = fold::evaluate(op, a, b);
        let node = tree.add_node(NodeKind::Literal(value), span);
        let data = tree.node_mut(node);
        data.var_type = VarType::Int;
        data.constant = Some(value);
        return node;
    }
    let node = tree.add_node(NodeKind::Binary(op), span);
    tree.attach(node, left);
    tree.attach(node, right);
    tree.node_mut(node).var_type = VarType::Int;
    node
}

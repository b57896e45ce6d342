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

//! The annotated syntax tree (AAST).
//!
//! Nodes and contexts are stored in two arenas owned by [`Aast`]. Parents are
//! plain indices, so navigating outwards (enclosing scope, enclosing routine)
//! never needs shared ownership.

use super::context::{Context, Entity, ScopeId, ScopeKind};
use super::types::VarType;
use crate::ast::{AsmStatement, BinaryOp};
use crate::error::{CompileError, ErrorCode, Result, Span};

/// Index of a node in the node arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Node kinds. Child order per kind is fixed and noted on each variant.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Units in source order.
    Program,
    /// Statements.
    Code,
    /// Declarations, routines, data blocks and structures.
    Module { name: String },
    /// Field declarations.
    Struct { name: String },
    /// Parameters, then statements.
    Routine { name: String },
    Data { name: String },
    Pragma,
    /// Variable, constant or array definitions.
    Declaration,
    /// Optional initializer.
    VariableDef { name: String },
    /// The folded value as a literal.
    ConstantDef { name: String },
    /// Size expression (a literal for static arrays).
    ArrayDef { name: String },
    Parameter { name: String },
    /// Statements of a nested body.
    Block,
    /// Exactly one child: the statement itself.
    Statement { label: Option<String> },
    /// `[target, value]`
    Assignment,
    /// `[left, right]`
    Swap,
    /// Arguments.
    Call { module: Option<String>, name: String },
    /// `[condition, then, else?]`
    If,
    /// `[from, to, step, body]`
    For { iterator: String },
    /// `[condition, body]`
    While,
    /// `[body, condition]`
    LoopWhile,
    Break,
    Goto { label: String },
    /// Optional value.
    Return,
    /// Printed values.
    Print,
    Asm(Vec<AsmStatement>),
    /// `[left, right]`
    Binary(BinaryOp),
    Literal(i32),
    Identifier(String),
    Register(u8),
    Reference(String),
    /// `[address]`
    Dereference,
    ExplicitAddress(i32),
    /// `[index]`
    Index(String),
    Field { base: String, field: String },
}

impl NodeKind {
    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Program => "program",
            NodeKind::Code => "code",
            NodeKind::Module { .. } => "module",
            NodeKind::Struct { .. } => "struct",
            NodeKind::Routine { .. } => "routine",
            NodeKind::Data { .. } => "data",
            NodeKind::Pragma => "pragma",
            NodeKind::Declaration => "declaration",
            NodeKind::VariableDef { .. } => "variable",
            NodeKind::ConstantDef { .. } => "constant",
            NodeKind::ArrayDef { .. } => "array",
            NodeKind::Parameter { .. } => "parameter",
            NodeKind::Block => "block",
            NodeKind::Statement { .. } => "statement",
            NodeKind::Assignment => "assignment",
            NodeKind::Swap => "swap",
            NodeKind::Call { .. } => "call",
            NodeKind::If => "if",
            NodeKind::For { .. } => "for",
            NodeKind::While => "while",
            NodeKind::LoopWhile => "loop",
            NodeKind::Break => "break",
            NodeKind::Goto { .. } => "goto",
            NodeKind::Return => "return",
            NodeKind::Print => "print",
            NodeKind::Asm(_) => "asm",
            NodeKind::Binary(_) => "binary",
            NodeKind::Literal(_) => "literal",
            NodeKind::Identifier(_) => "identifier",
            NodeKind::Register(_) => "register",
            NodeKind::Reference(_) => "reference",
            NodeKind::Dereference => "dereference",
            NodeKind::ExplicitAddress(_) => "explicit address",
            NodeKind::Index(_) => "index",
            NodeKind::Field { .. } => "field",
        }
    }

    pub fn is_expression(&self) -> bool {
        matches!(
            self,
            NodeKind::Binary(_)
                | NodeKind::Literal(_)
                | NodeKind::Identifier(_)
                | NodeKind::Register(_)
                | NodeKind::Reference(_)
                | NodeKind::Dereference
                | NodeKind::ExplicitAddress(_)
                | NodeKind::Index(_)
                | NodeKind::Field { .. }
                | NodeKind::Call { .. }
        )
    }
}

/// A node of the annotated tree.
#[derive(Debug, Clone)]
pub struct AastNode {
    pub kind: NodeKind,
    pub span: Span,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub var_type: VarType,
    /// Present on scope-introducing nodes only.
    pub scope: Option<ScopeId>,
    /// 1-based position among the statements of the enclosing scope.
    pub block_position: u32,
    pub constant: Option<i32>,
}

/// The annotated tree with its scope arena.
#[derive(Debug, Clone)]
pub struct Aast {
    nodes: Vec<AastNode>,
    scopes: Vec<Context>,
}

impl Default for Aast {
    fn default() -> Self {
        Self::new()
    }
}

impl Aast {
    /// Create a tree holding only the program root and its context.
    pub fn new() -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            scopes: Vec::new(),
        };
        let root = tree.add_node(NodeKind::Program, Span::default());
        let scope = tree.add_scope(ScopeKind::Program, None);
        tree.node_mut(root).scope = Some(scope);
        tree
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root_scope(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a detached node. Use [`Aast::attach`] to link it to a parent.
    pub fn add_node(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(AastNode {
            kind,
            span,
            parent: None,
            children: Vec::new(),
            var_type: VarType::NoType,
            scope: None,
            block_position: 0,
            constant: None,
        });
        id
    }

    /// Append `child` to the children of `parent`.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    pub fn add_child(&mut self, parent: NodeId, kind: NodeKind, span: Span) -> NodeId {
        let child = self.add_node(kind, span);
        self.attach(parent, child);
        child
    }

    pub fn add_scope(&mut self, kind: ScopeKind, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Context::new(id, kind, parent));
        id
    }

    pub fn node(&self, id: NodeId) -> &AastNode {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut AastNode {
        &mut self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn child(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.nodes[id.index()].children.get(index).copied()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn scope(&self, id: ScopeId) -> &Context {
        &self.scopes[id.index()]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Context {
        &mut self.scopes[id.index()]
    }

    pub fn scopes(&self) -> &[Context] {
        &self.scopes
    }

    /// The context of the nearest node (including `node` itself) that owns one.
    pub fn resolve(&self, node: NodeId) -> Result<ScopeId> {
        let mut current = Some(node);
        while let Some(id) = current {
            if let Some(scope) = self.node(id).scope {
                return Ok(scope);
            }
            current = self.parent(id);
        }
        Err(CompileError::new(
            ErrorCode::NoContext,
            format!("no enclosing context for {} node", self.kind(node).name()),
            self.node(node).span,
        ))
    }

    /// The nearest node (including `node` itself) that owns a context.
    pub fn scope_node(&self, node: NodeId) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(id) = current {
            if self.node(id).scope.is_some() {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    /// Look `name` up from `scope` outwards, nearest scope first.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, &Entity)> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let context = self.scope(id);
            if let Some(entity) = context.get(name) {
                return Some((id, entity));
            }
            current = context.parent;
        }
        None
    }

    /// Look `name` up from the nearest context enclosing `node`.
    pub fn lookup_from(&self, node: NodeId, name: &str) -> Result<Option<(ScopeId, &Entity)>> {
        let scope = self.resolve(node)?;
        Ok(self.lookup(scope, name))
    }

    pub fn entity(&self, scope: ScopeId, name: &str) -> Option<&Entity> {
        self.scope(scope).get(name)
    }

    pub fn entity_mut(&mut self, scope: ScopeId, name: &str) -> Option<&mut Entity> {
        self.scope_mut(scope).get_mut(name)
    }

    /// Whether `scope` is `ancestor` or nested inside it.
    pub fn is_within(&self, scope: ScopeId, ancestor: ScopeId) -> bool {
        let mut current = Some(scope);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.scope(id).parent;
        }
        false
    }

    /// The statement whose enclosing scope is `scope` and that contains `node`.
    pub fn statement_in_scope(&self, node: NodeId, scope: ScopeId) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(id) = current {
            if matches!(self.kind(id), NodeKind::Statement { .. }) {
                if let Some(parent) = self.parent(id) {
                    if self.node(parent).scope == Some(scope) {
                        return Some(id);
                    }
                }
            }
            current = self.parent(id);
        }
        None
    }

    /// Names used as variables anywhere under `node`, resolved and deduplicated
    /// in first-use order.
    pub fn used_variables(&self, node: NodeId) -> Vec<(ScopeId, String)> {
        let mut used = Vec::new();
        self.collect_used(node, &mut used);
        used
    }

    fn collect_used(&self, node: NodeId, used: &mut Vec<(ScopeId, String)>) {
        let name = match self.kind(node) {
            NodeKind::Identifier(name) | NodeKind::Reference(name) | NodeKind::Index(name) => {
                Some(name.as_str())
            }
            NodeKind::Field { base, .. } => Some(base.as_str()),
            _ => None,
        };
        if let Some(name) = name {
            if let Ok(Some((scope, entity))) = self.lookup_from(node, name) {
                if entity.is_variable() || entity.is_array() {
                    let key = (scope, name.to_string());
                    if !used.contains(&key) {
                        used.push(key);
                    }
                }
            }
        }
        for &child in self.children(node) {
            self.collect_used(child, used);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::context::EntityKind;

    #[test]
    fn test_new_tree_has_root_scope() {
        let tree = Aast::new();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.resolve(tree.root()).unwrap(), tree.root_scope());
        assert_eq!(tree.scope(tree.root_scope()).kind, ScopeKind::Program);
    }

    #[test]
    fn test_resolve_walks_to_nearest_scope() {
        let mut tree = Aast::new();
        let code = tree.add_child(tree.root(), NodeKind::Code, Span::default());
        let scope = tree.add_scope(ScopeKind::Code, Some(tree.root_scope()));
        tree.node_mut(code).scope = Some(scope);
        let stmt = tree.add_child(code, NodeKind::Statement { label: None }, Span::default());
        let print = tree.add_child(stmt, NodeKind::Print, Span::default());
        assert_eq!(tree.resolve(print).unwrap(), scope);
        assert_eq!(tree.statement_in_scope(print, scope), Some(stmt));
    }

    #[test]
    fn test_resolve_detached_node_fails() {
        let mut tree = Aast::new();
        let orphan = tree.add_node(NodeKind::Literal(1), Span::new(3, 4));
        let err = tree.resolve(orphan).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoContext);
    }

    #[test]
    fn test_lookup_nearest_scope_wins() {
        let mut tree = Aast::new();
        let root = tree.root_scope();
        let inner = tree.add_scope(ScopeKind::Block, Some(root));
        tree.scope_mut(root)
            .declare(Entity::new("x", EntityKind::Variable, VarType::Int, Span::new(0, 1)))
            .unwrap();
        tree.scope_mut(inner)
            .declare(Entity::new("x", EntityKind::Variable, VarType::Byte, Span::new(5, 6)))
            .unwrap();
        let (scope, entity) = tree.lookup(inner, "x").unwrap();
        assert_eq!(scope, inner);
        assert_eq!(entity.var_type, VarType::Byte);
        let (scope, _) = tree.lookup(root, "x").unwrap();
        assert_eq!(scope, root);
        assert!(tree.lookup(inner, "y").is_none());
        assert!(tree.is_within(inner, root));
        assert!(!tree.is_within(root, inner));
    }
}

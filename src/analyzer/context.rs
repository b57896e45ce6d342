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

//! Scopes of the annotated tree.
//!
//! Every scope-introducing node (program, module, structure, code, routine,
//! nested block bodies) owns one [`Context`]: a name table plus the index of
//! its parent context. Contexts live in the arena of [`super::Aast`] and are
//! addressed by [`ScopeId`].

use super::types::VarType;
use crate::error::{CompileError, ErrorCode, Result, Span};
use std::collections::HashMap;

/// Index of a context in the scope arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// The loop construct a loop body belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    For,
    While,
    LoopWhile,
}

impl LoopKind {
    /// Bytes of heap scratch record reserved while the loop runs.
    pub fn record_size(self) -> u32 {
        match self {
            LoopKind::For => 16,
            LoopKind::While => 12,
            LoopKind::LoopWhile => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Program,
    Module,
    Struct,
    Code,
    Routine,
    Block,
    LoopBody(LoopKind),
}

/// What a declared name stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    Variable,
    Parameter,
    /// Implicit `for` loop variable.
    Iterator,
    Constant(i32),
    Array,
    Data(Vec<i32>),
    Label,
    Routine,
    Module(ScopeId),
    Struct(ScopeId),
}

/// A declared name.
#[derive(Debug, Clone)]
pub struct Entity {
    pub name: String,
    pub kind: EntityKind,
    pub var_type: VarType,
    pub span: Span,
    /// Byte offset inside the frame (locals) or the static segment (globals).
    pub offset: u32,
    /// First statement position at which the variable holds a value.
    pub li_start: u32,
    /// Last statement position of the owning scope that uses the variable.
    pub li_end: u32,
    /// Set when `<-name` appears anywhere; such variables never live in registers.
    pub address_taken: bool,
}

impl Entity {
    pub fn new(name: impl Into<String>, kind: EntityKind, var_type: VarType, span: Span) -> Self {
        Self {
            name: name.into(),
            kind,
            var_type,
            span,
            offset: 0,
            li_start: 0,
            li_end: 0,
            address_taken: false,
        }
    }

    /// Variables, parameters and loop iterators.
    pub fn is_variable(&self) -> bool {
        matches!(
            self.kind,
            EntityKind::Variable | EntityKind::Parameter | EntityKind::Iterator
        )
    }

    /// Scalar variables that may be kept in a register.
    pub fn is_register_candidate(&self) -> bool {
        self.is_variable() && self.var_type.is_scalar() && !self.address_taken
    }

    pub fn constant_value(&self) -> Option<i32> {
        match self.kind {
            EntityKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind, EntityKind::Array)
    }

    pub fn is_dynamic_array(&self) -> bool {
        self.is_array() && self.var_type.is_dynamic_array()
    }

    pub fn is_struct_variable(&self) -> bool {
        self.is_variable() && matches!(self.var_type, VarType::Struct { .. })
    }

    /// Variables whose storage is a heap pointer released at scope exit.
    pub fn is_heap_resident(&self) -> bool {
        self.is_dynamic_array() || (self.is_struct_variable() && self.kind == EntityKind::Variable)
    }

    pub fn is_routine(&self) -> bool {
        matches!(self.kind, EntityKind::Routine)
    }

    /// Bytes of storage in the owning frame or static segment.
    pub fn storage_size(&self) -> u32 {
        match self.kind {
            EntityKind::Constant(_) | EntityKind::Label | EntityKind::Struct(_) => 0,
            EntityKind::Module(_) => 4,
            _ => self.var_type.size(),
        }
    }

    pub fn return_type(&self) -> Option<&VarType> {
        match &self.var_type {
            VarType::Routine { returns, .. } => Some(returns),
            _ => None,
        }
    }
}

/// A lexical scope.
#[derive(Debug, Clone)]
pub struct Context {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    entities: HashMap<String, Entity>,
    order: Vec<String>,
    /// Bytes of frame storage (locals) or structure size (structs).
    pub frame_size: u32,
    /// Number of statements directly inside the scope.
    pub statement_count: u32,
}

impl Context {
    pub fn new(id: ScopeId, kind: ScopeKind, parent: Option<ScopeId>) -> Self {
        Self {
            id,
            kind,
            parent,
            entities: HashMap::new(),
            order: Vec::new(),
            frame_size: 0,
            statement_count: 0,
        }
    }

    /// Declare a name, failing if it already exists in this scope.
    pub fn declare(&mut self, entity: Entity) -> Result<()> {
        if let Some(previous) = self.entities.get(&entity.name) {
            return Err(CompileError::new(
                ErrorCode::DuplicateDeclaration,
                format!("'{}' is already declared in this scope", entity.name),
                entity.span,
            )
            .with_hint(format!(
                "first declared at {}..{}",
                previous.span.start, previous.span.end
            )));
        }
        self.order.push(entity.name.clone());
        self.entities.insert(entity.name.clone(), entity);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Entity> {
        self.entities.get_mut(name)
    }

    /// Entities in declaration order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.order.iter().filter_map(|name| self.entities.get(name))
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Program and module scopes hold globals addressed through `SB`.
    pub fn is_global(&self) -> bool {
        matches!(self.kind, ScopeKind::Program | ScopeKind::Module)
    }

    pub fn loop_kind(&self) -> Option<LoopKind> {
        match self.kind {
            ScopeKind::LoopBody(kind) => Some(kind),
            _ => None,
        }
    }

    /// Whether entering the scope pushes a stack frame.
    pub fn owns_frame(&self) -> bool {
        match self.kind {
            ScopeKind::Code | ScopeKind::Routine => true,
            ScopeKind::Block | ScopeKind::LoopBody(_) => self.frame_size > 0,
            _ => false,
        }
    }

    /// Heap-resident variables in declaration order.
    pub fn heap_variables(&self) -> Vec<&Entity> {
        self.entities().filter(|e| e.is_heap_resident()).collect()
    }

    pub fn declares_labels(&self) -> bool {
        self.entities().any(|e| e.kind == EntityKind::Label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable(name: &str, start: usize) -> Entity {
        Entity::new(name, EntityKind::Variable, VarType::Int, Span::new(start, start + 1))
    }

    #[test]
    fn test_declare_and_get() {
        let mut context = Context::new(ScopeId(0), ScopeKind::Block, None);
        context.declare(variable("a", 0)).unwrap();
        context.declare(variable("b", 4)).unwrap();
        assert!(context.get("a").is_some());
        assert!(context.get("c").is_none());
        let names: Vec<&str> = context.entities().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_declaration() {
        let mut context = Context::new(ScopeId(0), ScopeKind::Block, None);
        context.declare(variable("a", 0)).unwrap();
        let err = context.declare(variable("a", 10)).unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateDeclaration);
        assert_eq!(err.span, Span::new(10, 11));
        assert!(err.hint.unwrap().contains("0..1"));
    }

    #[test]
    fn test_frame_ownership() {
        let mut block = Context::new(ScopeId(1), ScopeKind::Block, Some(ScopeId(0)));
        assert!(!block.owns_frame());
        block.frame_size = 4;
        assert!(block.owns_frame());
        let routine = Context::new(ScopeId(2), ScopeKind::Routine, Some(ScopeId(0)));
        assert!(routine.owns_frame());
        let module = Context::new(ScopeId(3), ScopeKind::Module, Some(ScopeId(0)));
        assert!(module.is_global());
        assert!(!module.owns_frame());
    }

    #[test]
    fn test_entity_classification() {
        let mut entity = variable("x", 0);
        assert!(entity.is_register_candidate());
        entity.address_taken = true;
        assert!(!entity.is_register_candidate());

        let array = Entity::new("a", EntityKind::Array, VarType::array(VarType::Int, 0), Span::default());
        assert!(array.is_dynamic_array());
        assert!(array.is_heap_resident());
        assert_eq!(array.storage_size(), 4);

        let constant = Entity::new("n", EntityKind::Constant(3), VarType::Int, Span::default());
        assert_eq!(constant.constant_value(), Some(3));
        assert_eq!(constant.storage_size(), 0);
    }

    #[test]
    fn test_loop_record_sizes() {
        assert_eq!(LoopKind::For.record_size(), 16);
        assert_eq!(LoopKind::While.record_size(), 12);
        assert_eq!(LoopKind::LoopWhile.record_size(), 4);
    }
}

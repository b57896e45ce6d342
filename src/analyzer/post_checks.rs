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

//! Post-checks over the finished annotated tree.
//!
//! A single top-down walk that needs the whole tree to exist:
//! - Name resolution of identifiers, indexing, fields and calls
//! - Call arity and return value placement
//! - Statement numbering and live intervals
//! - Frame offsets per scope and static offsets for globals

use super::context::{EntityKind, ScopeId, ScopeKind};
use super::tree::{Aast, NodeId, NodeKind};
use super::types::VarType;
use crate::error::{CompileError, ErrorCode, Result, Span};
use tracing::debug;

/// First static byte available to globals; the words below hold the
/// interpreter-reserved word and the heap-top pointer.
pub const STATIC_GLOBALS_START: u32 = 8;

/// Run every post-check and fill in positions and offsets.
pub fn run(tree: &mut Aast) -> Result<()> {
    let mut checker = PostChecker { tree };
    checker.check_code_blocks()?;
    let root = checker.tree.root();
    checker.visit(root)?;
    checker.layout_static()?;
    Ok(())
}

struct PostChecker<'t> {
    tree: &'t mut Aast,
}

impl PostChecker<'_> {
    fn check_code_blocks(&self) -> Result<()> {
        let root = self.tree.root();
        let mut code_blocks = self
            .tree
            .children(root)
            .iter()
            .filter(|&&child| matches!(self.tree.kind(child), NodeKind::Code));
        code_blocks.next();
        if let Some(&duplicate) = code_blocks.next() {
            return Err(CompileError::new(
                ErrorCode::DuplicateCodeBlock,
                "a program may contain only one 'code' block",
                self.tree.node(duplicate).span,
            ));
        }
        Ok(())
    }

    fn visit(&mut self, node: NodeId) -> Result<()> {
        if let Some(scope) = self.tree.node(node).scope {
            self.layout_scope(node, scope)?;
        }
        self.check_node(node)?;
        let children = self.tree.children(node).to_vec();
        for child in children {
            self.visit(child)?;
        }
        Ok(())
    }

    // ========================================================================
    // Positions and offsets
    // ========================================================================

    fn layout_scope(&mut self, node: NodeId, scope: ScopeId) -> Result<()> {
        let statements: Vec<NodeId> = self
            .tree
            .children(node)
            .iter()
            .copied()
            .filter(|&c| matches!(self.tree.kind(c), NodeKind::Statement { .. }))
            .collect();

        for (index, &statement) in statements.iter().enumerate() {
            let position = index as u32 + 1;
            self.tree.node_mut(statement).block_position = position;
            let Some(inner) = self.tree.child(statement, 0) else {
                continue;
            };
            if matches!(self.tree.kind(inner), NodeKind::Declaration) {
                for def in self.tree.children(inner).to_vec() {
                    if let Some(name) = defined_name(self.tree.kind(def)) {
                        if let Some(entity) = self.tree.entity_mut(scope, &name) {
                            entity.li_start = position;
                        }
                    }
                }
            }
        }

        let count = statements.len() as u32;
        let context = self.tree.scope_mut(scope);
        context.statement_count = count;
        let names = context.names().to_vec();
        let global = context.is_global();

        // Parameters and iterators stay live for the whole body.
        for name in &names {
            if let Some(entity) = self.tree.entity_mut(scope, name) {
                if matches!(entity.kind, EntityKind::Parameter | EntityKind::Iterator) {
                    entity.li_end = count;
                }
            }
        }

        for name in &names {
            let Some(entity) = self.tree.entity(scope, name) else {
                continue;
            };
            if let VarType::Struct { name: struct_name } = &entity.var_type {
                if self.struct_scope(scope, struct_name).is_none() {
                    return Err(CompileError::new(
                        ErrorCode::UnknownType,
                        format!("unknown structure type '{}'", struct_name),
                        entity.span,
                    ));
                }
            }
        }

        if !global {
            let mut offset = 0;
            for name in &names {
                if let Some(entity) = self.tree.entity_mut(scope, name) {
                    entity.offset = offset;
                    offset += entity.storage_size();
                }
            }
            self.tree.scope_mut(scope).frame_size = offset;
        }
        Ok(())
    }

    /// Assign static offsets to globals; module members follow their slot.
    fn layout_static(&mut self) -> Result<()> {
        let root = self.tree.root_scope();
        let mut offset = STATIC_GLOBALS_START;
        for name in self.tree.scope(root).names().to_vec() {
            offset = self.place_global(root, &name, offset)?;
            let module = match self.tree.entity(root, &name).map(|e| &e.kind) {
                Some(EntityKind::Module(module)) => *module,
                _ => continue,
            };
            for member in self.tree.scope(module).names().to_vec() {
                offset = self.place_global(module, &member, offset)?;
            }
        }
        self.tree.scope_mut(root).frame_size = offset;
        debug!(static_size = offset, "static segment laid out");
        Ok(())
    }

    fn place_global(&mut self, scope: ScopeId, name: &str, offset: u32) -> Result<u32> {
        let Some(entity) = self.tree.entity(scope, name) else {
            return Ok(offset);
        };
        let mut size = entity.storage_size();
        // Global structures are stored inline after their pointer slot.
        if let (EntityKind::Variable, VarType::Struct { name: struct_name }) =
            (&entity.kind, &entity.var_type)
        {
            if let Some(struct_scope) = self.struct_scope(scope, struct_name) {
                size += self.tree.scope(struct_scope).frame_size;
            }
        }
        if let Some(entity) = self.tree.entity_mut(scope, name) {
            entity.offset = offset;
        }
        offset
            .checked_add(size)
            .filter(|&end| end <= i32::MAX as u32)
            .ok_or_else(|| {
                CompileError::new(
                    ErrorCode::ProgramTooLarge,
                    "static data does not fit in the address space",
                    Span::default(),
                )
            })
    }

    fn struct_scope(&self, scope: ScopeId, name: &str) -> Option<ScopeId> {
        match self.tree.lookup(scope, name).map(|(_, e)| &e.kind) {
            Some(EntityKind::Struct(id)) => Some(*id),
            _ => None,
        }
    }

    // ========================================================================
    // Node checks
    // ========================================================================

    fn check_node(&mut self, node: NodeId) -> Result<()> {
        let span = self.tree.node(node).span;
        match self.tree.kind(node).clone() {
            NodeKind::Identifier(name) => {
                let (scope, kind) = self.resolve_variable(node, &name)?;
                if matches!(
                    kind,
                    EntityKind::Routine
                        | EntityKind::Label
                        | EntityKind::Module(_)
                        | EntityKind::Struct(_)
                ) {
                    return Err(not_a_value(&name, span));
                }
                self.check_declared_before(node, scope, &name)?;
                self.copy_type(node, scope, &name);
            }
            NodeKind::Reference(name) => {
                let (scope, _) = self.resolve_variable(node, &name)?;
                let entity = self.tree.entity_mut(scope, &name);
                match entity {
                    Some(entity) if entity.is_variable() && entity.var_type.is_scalar() => {
                        entity.address_taken = true;
                    }
                    _ => return Err(not_a_value(&name, span)),
                }
                self.check_declared_before(node, scope, &name)?;
            }
            NodeKind::Index(name) => self.check_index(node, &name, span)?,
            NodeKind::Field { base, field } => self.check_field(node, &base, &field, span)?,
            NodeKind::Call { module, name } => {
                self.check_call(node, module.as_deref(), &name, span)?
            }
            NodeKind::Assignment => {
                if let Some(target) = self.tree.child(node, 0) {
                    self.check_assignable(target)?;
                }
            }
            NodeKind::Swap => {
                for target in self.tree.children(node).to_vec() {
                    self.check_assignable(target)?;
                }
            }
            NodeKind::Return => self.check_return(node, span)?,
            NodeKind::Statement { .. } => self.extend_live_intervals(node)?,
            _ => {}
        }
        Ok(())
    }

    fn resolve_variable(&self, node: NodeId, name: &str) -> Result<(ScopeId, EntityKind)> {
        match self.tree.lookup_from(node, name)? {
            Some((scope, entity)) => Ok((scope, entity.kind.clone())),
            None => Err(CompileError::new(
                ErrorCode::UndeclaredVariable,
                format!("'{}' is not declared", name),
                self.tree.node(node).span,
            )),
        }
    }

    /// A local may not be used by a statement that precedes its declaration.
    fn check_declared_before(&self, node: NodeId, scope: ScopeId, name: &str) -> Result<()> {
        let Some(entity) = self.tree.entity(scope, name) else {
            return Ok(());
        };
        if self.tree.scope(scope).is_global()
            || !matches!(entity.kind, EntityKind::Variable | EntityKind::Array)
        {
            return Ok(());
        }
        if let Some(statement) = self.tree.statement_in_scope(node, scope) {
            if self.tree.node(statement).block_position < entity.li_start {
                return Err(CompileError::new(
                    ErrorCode::UndeclaredVariable,
                    format!("'{}' is used before its declaration", name),
                    self.tree.node(node).span,
                ));
            }
        }
        Ok(())
    }

    fn copy_type(&mut self, node: NodeId, scope: ScopeId, name: &str) {
        if let Some(entity) = self.tree.entity(scope, name) {
            let var_type = entity.var_type.clone();
            self.tree.node_mut(node).var_type = var_type;
        }
    }

    fn check_index(&mut self, node: NodeId, name: &str, span: Span) -> Result<()> {
        let (scope, kind) = self.resolve_variable(node, name)?;
        if !matches!(kind, EntityKind::Array | EntityKind::Data(_)) {
            return Err(CompileError::new(
                ErrorCode::NotAnArray,
                format!("'{}' is not an array", name),
                span,
            ));
        }
        self.check_declared_before(node, scope, name)?;

        let var_type = self
            .tree
            .entity(scope, name)
            .map(|e| e.var_type.clone())
            .unwrap_or_default();
        let index = self
            .tree
            .child(node, 0)
            .and_then(|child| self.tree.node(child).constant);
        if let (Some(index), Some(length)) = (index, var_type.static_length()) {
            if index < 0 || index as u32 >= length {
                return Err(CompileError::new(
                    ErrorCode::ArrayIndexOutOfRange,
                    format!("index {} is out of range for '{}' of length {}", index, name, length),
                    span,
                ));
            }
        }
        self.tree.node_mut(node).var_type = var_type.element().unwrap_or_default();
        Ok(())
    }

    fn check_field(&mut self, node: NodeId, base: &str, field: &str, span: Span) -> Result<()> {
        let (scope, _) = self.resolve_variable(node, base)?;
        let struct_name = match self.tree.entity(scope, base) {
            Some(entity) if entity.is_variable() => match &entity.var_type {
                VarType::Struct { name } => name.clone(),
                _ => {
                    return Err(CompileError::new(
                        ErrorCode::NotAStruct,
                        format!("'{}' is not a structure", base),
                        span,
                    ))
                }
            },
            _ => {
                return Err(CompileError::new(
                    ErrorCode::NotAStruct,
                    format!("'{}' is not a structure", base),
                    span,
                ))
            }
        };
        self.check_declared_before(node, scope, base)?;
        let struct_scope = self.struct_scope(scope, &struct_name).ok_or_else(|| {
            CompileError::new(
                ErrorCode::UnknownType,
                format!("unknown structure type '{}'", struct_name),
                span,
            )
        })?;
        let var_type = self
            .tree
            .entity(struct_scope, field)
            .map(|e| e.var_type.clone())
            .ok_or_else(|| {
                CompileError::new(
                    ErrorCode::UnknownField,
                    format!("structure '{}' has no field '{}'", struct_name, field),
                    span,
                )
            })?;
        self.tree.node_mut(node).var_type = var_type;
        Ok(())
    }

    fn check_call(
        &mut self,
        node: NodeId,
        module: Option<&str>,
        name: &str,
        span: Span,
    ) -> Result<()> {
        let (params, returns) = routine_signature(self.tree, node, module, name, span)?;

        let args = self.tree.children(node).len();
        if args != params.len() {
            return Err(CompileError::new(
                ErrorCode::ArityMismatch,
                format!(
                    "'{}' takes {} argument(s) but {} were given",
                    name,
                    params.len(),
                    args
                ),
                span,
            ));
        }

        let as_statement = self
            .tree
            .parent(node)
            .is_some_and(|parent| matches!(self.tree.kind(parent), NodeKind::Statement { .. }));
        if as_statement && !returns.is_void() {
            return Err(CompileError::new(
                ErrorCode::UnusedReturnValue,
                format!("the value returned by '{}' is not used", name),
                span,
            ));
        }
        if !as_statement && returns.is_void() {
            return Err(CompileError::new(
                ErrorCode::VoidInExpression,
                format!("'{}' does not return a value", name),
                span,
            ));
        }
        self.tree.node_mut(node).var_type = returns;
        Ok(())
    }

    fn check_assignable(&self, target: NodeId) -> Result<()> {
        let NodeKind::Identifier(name) = self.tree.kind(target) else {
            return Ok(());
        };
        let span = self.tree.node(target).span;
        match self.tree.lookup_from(target, name)?.map(|(_, e)| &e.kind) {
            Some(EntityKind::Constant(_)) => Err(CompileError::new(
                ErrorCode::AssignToConstant,
                format!("cannot assign to constant '{}'", name),
                span,
            )),
            Some(EntityKind::Variable | EntityKind::Parameter | EntityKind::Iterator) => Ok(()),
            _ => Err(not_a_value(name, span)),
        }
    }

    fn check_return(&self, node: NodeId, span: Span) -> Result<()> {
        let mut scope = Some(self.tree.resolve(node)?);
        while let Some(id) = scope {
            if self.tree.scope(id).kind == ScopeKind::Routine {
                break;
            }
            scope = self.tree.scope(id).parent;
        }
        let Some(routine) = scope else {
            return Err(CompileError::new(
                ErrorCode::ReturnOutsideRoutine,
                "'return' outside of a routine",
                span,
            ));
        };

        let returns = self.routine_return_type(routine);
        let has_value = !self.tree.children(node).is_empty();
        match (returns.is_void(), has_value) {
            (true, true) => Err(CompileError::new(
                ErrorCode::ReturnValueMismatch,
                "this routine does not return a value",
                span,
            )),
            (false, false) => Err(CompileError::new(
                ErrorCode::ReturnValueMismatch,
                format!("this routine must return a value of type {}", returns),
                span,
            )),
            _ => Ok(()),
        }
    }

    fn routine_return_type(&self, routine: ScopeId) -> VarType {
        let owner = (0..self.tree.len() as u32)
            .map(NodeId)
            .find(|&id| self.tree.node(id).scope == Some(routine));
        match owner.map(|id| &self.tree.node(id).var_type) {
            Some(VarType::Routine { returns, .. }) => (**returns).clone(),
            _ => VarType::NoType,
        }
    }

    /// Extend the live interval of every same-scope variable the statement uses.
    fn extend_live_intervals(&mut self, statement: NodeId) -> Result<()> {
        let Some(parent) = self.tree.parent(statement) else {
            return Ok(());
        };
        let scope = self.tree.resolve(parent)?;
        let position = self.tree.node(statement).block_position;
        for (owner, name) in self.tree.used_variables(statement) {
            if owner != scope {
                continue;
            }
            if let Some(entity) = self.tree.entity_mut(owner, &name) {
                entity.li_end = entity.li_end.max(position);
            }
        }
        Ok(())
    }
}

/// Parameter types and return type of the routine a call refers to.
pub(crate) fn routine_signature(
    tree: &Aast,
    node: NodeId,
    module: Option<&str>,
    name: &str,
    span: Span,
) -> Result<(Vec<VarType>, VarType)> {
    let undeclared = || {
        CompileError::new(
            ErrorCode::UndeclaredRoutine,
            format!("routine '{}' is not declared", name),
            span,
        )
    };
    let entity = match module {
        Some(module) => {
            let module_scope = match tree.lookup_from(node, module)?.map(|(_, e)| &e.kind) {
                Some(EntityKind::Module(id)) => *id,
                _ => return Err(undeclared().with_hint(format!("'{}' is not a module", module))),
            };
            tree.entity(module_scope, name).ok_or_else(undeclared)?
        }
        None => tree.lookup_from(node, name)?.map(|(_, e)| e).ok_or_else(undeclared)?,
    };
    match &entity.var_type {
        VarType::Routine { params, returns } if entity.is_routine() => {
            Ok((params.clone(), (**returns).clone()))
        }
        _ => Err(CompileError::new(
            ErrorCode::NotCallable,
            format!("'{}' is not a routine", name),
            span,
        )),
    }
}

fn defined_name(kind: &NodeKind) -> Option<String> {
    match kind {
        NodeKind::VariableDef { name }
        | NodeKind::ConstantDef { name }
        | NodeKind::ArrayDef { name } => Some(name.clone()),
        _ => None,
    }
}

fn not_a_value(name: &str, span: Span) -> CompileError {
    CompileError::new(
        ErrorCode::NotAValue,
        format!("'{}' cannot be used as a value", name),
        span,
    )
}

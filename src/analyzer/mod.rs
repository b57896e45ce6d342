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

//! Semantic annotation for the ERA compiler.
//!
//! This module turns the raw syntax tree into the annotated tree:
//! - Scope contexts and declared entities
//! - Resolved types and folded constants
//! - Operator re-association by priority
//! - Post-checks, statement numbering, frame and static offsets

mod context;
mod expressions;
pub mod fold;
mod post_checks;
mod statements;
mod tree;
mod types;

pub use context::{Context, Entity, EntityKind, LoopKind, ScopeId, ScopeKind};
pub use tree::{Aast, AastNode, NodeId, NodeKind};
pub use types::VarType;

use crate::ast::{self, DataDef, ModuleDef, PragmaItem, Program, RoutineDef, StructDef, UnitKind};
use crate::config::CompilerConfig;
use crate::error::{CompileError, ErrorCode, Result, Span};
use statements::StatementAnnotator;
use tracing::{debug, warn};

/// Builds the annotated tree from a raw program.
///
/// Annotation runs in two passes. The first pass declares every unit-level
/// name (routines, modules, data blocks, structures, globals) so bodies can
/// refer to routines declared further down. The second pass annotates the
/// bodies of `code` and all routines.
pub struct Annotator<'c> {
    pub(crate) tree: Aast,
    pub(crate) config: &'c mut CompilerConfig,
    /// Context new declarations go into.
    pub(crate) scope: ScopeId,
}

impl<'c> Annotator<'c> {
    pub fn new(config: &'c mut CompilerConfig) -> Self {
        let tree = Aast::new();
        let scope = tree.root_scope();
        Self {
            tree,
            config,
            scope,
        }
    }

    /// Annotate a whole program. Post-checks are not run.
    pub fn annotate(mut self, program: &Program) -> Result<Aast> {
        let root = self.tree.root();
        for unit in &program.units {
            self.declare_unit(&unit.kind, unit.span, root)?;
        }

        let units: Vec<NodeId> = self.tree.children(root).to_vec();
        for (unit, node) in program.units.iter().zip(units) {
            self.annotate_unit_body(&unit.kind, node)?;
        }

        debug!(
            nodes = self.tree.len(),
            scopes = self.tree.scopes().len(),
            "annotation finished"
        );
        Ok(self.tree)
    }

    /// Run `f` with `scope` as the current context.
    pub(crate) fn in_scope<T>(
        &mut self,
        scope: ScopeId,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let outer = std::mem::replace(&mut self.scope, scope);
        let result = f(self);
        self.scope = outer;
        result
    }

    /// Declare a name in the current context.
    pub(crate) fn declare(&mut self, entity: Entity) -> Result<()> {
        let scope = self.scope;
        self.tree.scope_mut(scope).declare(entity)
    }

    /// Create a scope node of `kind` under the current context.
    pub(crate) fn scoped_node(
        &mut self,
        node_kind: NodeKind,
        scope_kind: ScopeKind,
        span: Span,
    ) -> (NodeId, ScopeId) {
        let node = self.tree.add_node(node_kind, span);
        let scope = self.tree.add_scope(scope_kind, Some(self.scope));
        self.tree.node_mut(node).scope = Some(scope);
        (node, scope)
    }

    // ========================================================================
    // First pass: unit-level declarations
    // ========================================================================

    fn declare_unit(&mut self, unit: &UnitKind, span: Span, parent: NodeId) -> Result<()> {
        let node = match unit {
            UnitKind::Code(block) => {
                let (node, _) = self.scoped_node(NodeKind::Code, ScopeKind::Code, block.span);
                node
            }
            UnitKind::Routine(def) => self.declare_routine(def)?,
            UnitKind::Module(def) => self.declare_module(def)?,
            UnitKind::Data(def) => self.declare_data(def)?,
            UnitKind::Struct(def) => self.declare_struct(def)?,
            UnitKind::Pragma(items) => self.annotate_pragma(items, span)?,
            UnitKind::Declaration(decl) => self.annotate_declaration(decl, span)?,
        };
        self.tree.attach(parent, node);
        Ok(())
    }

    fn declare_routine(&mut self, def: &RoutineDef) -> Result<NodeId> {
        let params: Vec<VarType> = def
            .params
            .iter()
            .map(|p| VarType::from_type_name(&p.ty))
            .collect();
        let returns = def
            .return_type
            .as_ref()
            .map(VarType::from_type_name)
            .unwrap_or(VarType::NoType);
        let var_type = VarType::Routine {
            params,
            returns: Box::new(returns),
        };
        self.declare(Entity::new(
            &def.name,
            EntityKind::Routine,
            var_type.clone(),
            def.span,
        ))?;

        let (node, scope) = self.scoped_node(
            NodeKind::Routine {
                name: def.name.clone(),
            },
            ScopeKind::Routine,
            def.span,
        );
        self.tree.node_mut(node).var_type = var_type;

        self.in_scope(scope, |this| {
            for param in &def.params {
                let var_type = VarType::from_type_name(&param.ty);
                let mut entity =
                    Entity::new(&param.name, EntityKind::Parameter, var_type.clone(), param.span);
                entity.li_start = 1;
                this.declare(entity)?;
                let param_node = this.tree.add_child(
                    node,
                    NodeKind::Parameter {
                        name: param.name.clone(),
                    },
                    param.span,
                );
                this.tree.node_mut(param_node).var_type = var_type;
            }
            Ok(())
        })?;
        Ok(node)
    }

    fn declare_module(&mut self, def: &ModuleDef) -> Result<NodeId> {
        let (node, scope) = self.scoped_node(
            NodeKind::Module {
                name: def.name.clone(),
            },
            ScopeKind::Module,
            def.span,
        );
        self.declare(Entity::new(
            &def.name,
            EntityKind::Module(scope),
            VarType::NoType,
            def.span,
        ))?;

        self.in_scope(scope, |this| {
            for member in &def.members {
                this.declare_unit(&member.kind, member.span, node)?;
            }
            Ok(())
        })?;
        Ok(node)
    }

    fn declare_data(&mut self, def: &DataDef) -> Result<NodeId> {
        let var_type = VarType::Data {
            length: def.values.len() as u32,
        };
        self.declare(Entity::new(
            &def.name,
            EntityKind::Data(def.values.clone()),
            var_type.clone(),
            def.span,
        ))?;
        let node = self.tree.add_node(
            NodeKind::Data {
                name: def.name.clone(),
            },
            def.span,
        );
        self.tree.node_mut(node).var_type = var_type;
        Ok(node)
    }

    fn declare_struct(&mut self, def: &StructDef) -> Result<NodeId> {
        let (node, scope) = self.scoped_node(
            NodeKind::Struct {
                name: def.name.clone(),
            },
            ScopeKind::Struct,
            def.span,
        );
        self.declare(Entity::new(
            &def.name,
            EntityKind::Struct(scope),
            VarType::NoType,
            def.span,
        ))?;

        self.in_scope(scope, |this| {
            for field in &def.fields {
                let ast::Declaration::Variable { ty, items } = field else {
                    return Err(CompileError::new(
                        ErrorCode::NotAValue,
                        format!("structure '{}' may only declare variable fields", def.name),
                        def.span,
                    ));
                };
                let var_type = VarType::from_type_name(ty);
                if !var_type.is_scalar() {
                    return Err(CompileError::new(
                        ErrorCode::UnknownType,
                        format!("field type '{}' is not a scalar type", ty),
                        def.span,
                    ));
                }
                let decl = this.tree.add_child(node, NodeKind::Declaration, def.span);
                for item in items {
                    if let Some(init) = &item.initializer {
                        return Err(CompileError::new(
                            ErrorCode::ConstantRequired,
                            format!("field '{}' cannot have an initializer", item.name),
                            init.span,
                        ));
                    }
                    this.declare(Entity::new(
                        &item.name,
                        EntityKind::Variable,
                        var_type.clone(),
                        item.span,
                    ))?;
                    let def_node = this.tree.add_child(
                        decl,
                        NodeKind::VariableDef {
                            name: item.name.clone(),
                        },
                        item.span,
                    );
                    this.tree.node_mut(def_node).var_type = var_type.clone();
                }
            }
            Ok(())
        })?;
        Ok(node)
    }

    fn annotate_pragma(&mut self, items: &[PragmaItem], span: Span) -> Result<NodeId> {
        for item in items {
            match item.name.as_str() {
                "memory" => {
                    let Some(argument) = &item.argument else {
                        return Err(CompileError::new(
                            ErrorCode::InvalidPragma,
                            "pragma 'memory' needs an argument such as \"KB 64\"",
                            item.span,
                        ));
                    };
                    self.config.apply_memory_pragma(argument, item.span)?;
                    debug!(budget = self.config.memory_budget, "memory pragma applied");
                }
                other => warn!(pragma = other, "ignoring unknown pragma"),
            }
        }
        Ok(self.tree.add_node(NodeKind::Pragma, span))
    }

    // ========================================================================
    // Second pass: bodies
    // ========================================================================

    fn annotate_unit_body(&mut self, unit: &UnitKind, node: NodeId) -> Result<()> {
        match unit {
            UnitKind::Code(block) => self.annotate_statements(&block.statements, node),
            UnitKind::Routine(def) => self.annotate_statements(&def.body.statements, node),
            UnitKind::Module(def) => {
                let members: Vec<NodeId> = self.tree.children(node).to_vec();
                for (member, member_node) in def.members.iter().zip(members) {
                    self.annotate_unit_body(&member.kind, member_node)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Annotate `statements` inside the scope owned by `node`.
    pub(crate) fn annotate_statements(
        &mut self,
        statements: &[ast::Statement],
        node: NodeId,
    ) -> Result<()> {
        let scope = self.tree.resolve(node)?;
        self.in_scope(scope, |this| {
            for statement in statements {
                this.annotate_statement(statement, node)?;
            }
            Ok(())
        })
    }
}

/// Annotate a program and run the post-checks.
pub fn analyze(program: &Program, config: &mut CompilerConfig) -> Result<Aast> {
    let _span = tracing::info_span!("analyze").entered();
    let mut tree = Annotator::new(config).annotate(program)?;
    post_checks::run(&mut tree)?;
    Ok(tree)
}

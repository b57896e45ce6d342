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

//! Register allocation.
//!
//! Variables live in memory and are cached in general purpose registers while
//! statements use them. [`RegisterFile`] keeps the occupancy set and the two
//! inverse maps between variables and registers; [`RegisterAllocator`]
//! implements the protocol the constructors follow:
//! - allocate on entry to a statement, never evicting
//! - release after the last statement of a live interval
//! - write everything back before control leaves straight-line code
//! - evict the lowest variable register when temporaries run out

use super::emit::EmitHelpers;
use super::frames::FrameEmitter;
use super::isa::registers::GENERAL_COUNT;
use super::node::CodeNode;
use super::CodeGenerator;
use crate::analyzer::{EntityKind, NodeId, ScopeId};
use crate::error::{CompileError, ErrorCode, Result, Span};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// A variable identified by its declaring context and name.
pub type VarKey = (ScopeId, String);

/// Occupancy of the general purpose registers.
#[derive(Debug, Clone, Default)]
pub struct RegisterFile {
    occupied: [bool; GENERAL_COUNT as usize],
    by_register: BTreeMap<u8, VarKey>,
    by_variable: HashMap<VarKey, u8>,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_occupied(&self, register: u8) -> bool {
        self.occupied
            .get(register as usize)
            .copied()
            .unwrap_or(true)
    }

    /// The lowest register holding neither a variable nor a temporary.
    pub fn lowest_free(&self) -> Option<u8> {
        (0..GENERAL_COUNT).find(|&r| !self.occupied[r as usize])
    }

    /// The lowest register holding a variable, skipping `exclude`.
    pub fn lowest_variable_register(&self, exclude: &[u8]) -> Option<u8> {
        self.by_register
            .keys()
            .copied()
            .find(|r| !exclude.contains(r))
    }

    /// Make `register` hold `key`.
    pub fn bind(&mut self, register: u8, key: VarKey) {
        if let Some(previous) = self.by_register.remove(&register) {
            self.by_variable.remove(&previous);
        }
        if let Some(previous) = self.by_variable.remove(&key) {
            self.by_register.remove(&previous);
            self.occupied[previous as usize] = false;
        }
        self.occupied[register as usize] = true;
        self.by_register.insert(register, key.clone());
        self.by_variable.insert(key, register);
    }

    /// Forget the variable held by `register` and free it.
    pub fn unbind(&mut self, register: u8) -> Option<VarKey> {
        let key = self.by_register.remove(&register)?;
        self.by_variable.remove(&key);
        self.occupied[register as usize] = false;
        Some(key)
    }

    /// Mark `register` as holding a temporary.
    pub fn occupy(&mut self, register: u8) {
        if let Some(slot) = self.occupied.get_mut(register as usize) {
            *slot = true;
        }
    }

    /// Free a temporary. Registers holding variables are left alone.
    pub fn release(&mut self, register: u8) {
        if self.by_register.contains_key(&register) {
            return;
        }
        if let Some(slot) = self.occupied.get_mut(register as usize) {
            *slot = false;
        }
    }

    pub fn register_of(&self, key: &VarKey) -> Option<u8> {
        self.by_variable.get(key).copied()
    }

    pub fn variable_in(&self, register: u8) -> Option<&VarKey> {
        self.by_register.get(&register)
    }

    /// Registers holding variables, lowest first.
    pub fn resident(&self) -> Vec<(u8, VarKey)> {
        self.by_register
            .iter()
            .map(|(&r, key)| (r, key.clone()))
            .collect()
    }

    /// Occupied registers that hold no variable, lowest first.
    pub fn temporaries(&self) -> Vec<u8> {
        (0..GENERAL_COUNT)
            .filter(|&r| self.occupied[r as usize] && !self.by_register.contains_key(&r))
            .collect()
    }

    /// Whether the two maps are exact inverses and every bound register is occupied.
    pub fn is_consistent(&self) -> bool {
        self.by_register.len() == self.by_variable.len()
            && self.by_register.iter().all(|(&r, key)| {
                self.by_variable.get(key) == Some(&r) && self.occupied[r as usize]
            })
    }
}

fn out_of_registers(span: Span) -> CompileError {
    CompileError::new(
        ErrorCode::OutOfRegisters,
        "expression needs more registers than the machine has",
        span,
    )
    .with_hint("split the expression into smaller statements")
}

/// Extension trait for the register allocation protocol.
pub trait RegisterAllocator {
    /// Hand out a register for a temporary, evicting a variable if needed.
    fn get_free_register(&mut self, out: &mut CodeNode, span: Span) -> Result<u8>;

    /// Free a temporary.
    fn release(&mut self, register: u8);

    /// Run `f` with `count` registers it may clobber.
    ///
    /// Free registers are used first; occupied ones are saved on the stack
    /// around `f` and restored afterwards. Nothing is evicted.
    fn with_spare<T>(
        &mut self,
        out: &mut CodeNode,
        exclude: &[u8],
        count: usize,
        f: impl FnOnce(&mut Self, &mut CodeNode, &[u8]) -> Result<T>,
    ) -> Result<T>;

    /// Load the variables used by `statement` into free registers.
    fn allocate_on_entry(&mut self, out: &mut CodeNode, statement: NodeId) -> Result<()>;

    /// Write back variables of the active context whose interval ends at `position`.
    fn deallocate_on_exit(&mut self, out: &mut CodeNode, position: u32) -> Result<()>;

    /// Write back and release every register-resident variable.
    fn deallocate_all(&mut self, out: &mut CodeNode) -> Result<()>;

    /// Store `register` to the memory of `key` and release it.
    fn write_back(&mut self, out: &mut CodeNode, register: u8, key: &VarKey) -> Result<()>;
}

impl RegisterAllocator for CodeGenerator<'_> {
    fn get_free_register(&mut self, out: &mut CodeNode, span: Span) -> Result<u8> {
        if let Some(register) = self.registers.lowest_free() {
            self.registers.occupy(register);
            return Ok(register);
        }
        let register = self
            .registers
            .lowest_variable_register(&[])
            .ok_or_else(|| out_of_registers(span))?;
        let key = self
            .registers
            .variable_in(register)
            .cloned()
            .ok_or_else(|| out_of_registers(span))?;
        debug!(register, variable = %key.1, "spilling variable");
        self.write_back(out, register, &key)?;
        self.registers.occupy(register);
        Ok(register)
    }

    fn release(&mut self, register: u8) {
        self.registers.release(register);
    }

    fn with_spare<T>(
        &mut self,
        out: &mut CodeNode,
        exclude: &[u8],
        count: usize,
        f: impl FnOnce(&mut Self, &mut CodeNode, &[u8]) -> Result<T>,
    ) -> Result<T> {
        let mut spare: Vec<u8> = (0..GENERAL_COUNT)
            .filter(|&r| !self.registers.is_occupied(r) && !exclude.contains(&r))
            .take(count)
            .collect();
        let free = spare.clone();
        let mut borrowed = Vec::new();
        for register in 0..GENERAL_COUNT {
            if spare.len() == count {
                break;
            }
            if !exclude.contains(&register) && !spare.contains(&register) {
                out.push_register(register);
                borrowed.push(register);
                spare.push(register);
            }
        }
        if spare.len() < count {
            return Err(out_of_registers(Span::default()));
        }

        for &register in &free {
            self.registers.occupy(register);
        }
        let result = f(self, out, &spare);
        for &register in &free {
            self.registers.release(register);
        }
        for &register in borrowed.iter().rev() {
            out.pop_register(register);
        }
        result
    }

    fn allocate_on_entry(&mut self, out: &mut CodeNode, statement: NodeId) -> Result<()> {
        let tree = self.tree;
        let position = tree.node(statement).block_position;
        for key in tree.used_variables(statement) {
            let Some(entity) = tree.entity(key.0, &key.1) else {
                continue;
            };
            if !entity.is_register_candidate()
                || !tree.is_within(self.active, key.0)
                || self.registers.register_of(&key).is_some()
            {
                continue;
            }
            let passed = match entity.kind {
                EntityKind::Variable => key.0 != self.active || entity.li_start < position,
                _ => true,
            };
            if !passed {
                continue;
            }
            let Some(register) = self.registers.lowest_free() else {
                break;
            };
            self.load_from_memory(out, &key, register)?;
            self.registers.bind(register, key);
        }
        Ok(())
    }

    fn deallocate_on_exit(&mut self, out: &mut CodeNode, position: u32) -> Result<()> {
        for (register, key) in self.registers.resident() {
            if key.0 != self.active {
                continue;
            }
            let ended = self
                .tree
                .entity(key.0, &key.1)
                .map_or(true, |entity| entity.li_end <= position);
            if ended {
                self.write_back(out, register, &key)?;
            }
        }
        Ok(())
    }

    fn deallocate_all(&mut self, out: &mut CodeNode) -> Result<()> {
        for (register, key) in self.registers.resident() {
            self.write_back(out, register, &key)?;
        }
        Ok(())
    }

    fn write_back(&mut self, out: &mut CodeNode, register: u8, key: &VarKey) -> Result<()> {
        self.store_to_memory(out, key, register)?;
        self.registers.unbind(register);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> VarKey {
        (ScopeId(1), name.to_string())
    }

    #[test]
    fn test_lowest_free_skips_occupied() {
        let mut file = RegisterFile::new();
        assert_eq!(file.lowest_free(), Some(0));
        file.occupy(0);
        file.bind(1, key("a"));
        assert_eq!(file.lowest_free(), Some(2));
        assert_eq!(file.temporaries(), vec![0]);
        assert_eq!(file.resident(), vec![(1, key("a"))]);
    }

    #[test]
    fn test_bind_and_unbind_keep_maps_inverse() {
        let mut file = RegisterFile::new();
        file.bind(3, key("a"));
        file.bind(4, key("b"));
        assert!(file.is_consistent());
        assert_eq!(file.register_of(&key("b")), Some(4));

        // Rebinding a variable moves it.
        file.bind(5, key("a"));
        assert!(file.is_consistent());
        assert!(!file.is_occupied(3));
        assert_eq!(file.register_of(&key("a")), Some(5));

        assert_eq!(file.unbind(4), Some(key("b")));
        assert!(file.is_consistent());
        assert!(!file.is_occupied(4));
        assert_eq!(file.unbind(4), None);
    }

    #[test]
    fn test_release_ignores_variable_registers() {
        let mut file = RegisterFile::new();
        file.bind(2, key("a"));
        file.release(2);
        assert!(file.is_occupied(2));
        file.occupy(7);
        file.release(7);
        assert!(!file.is_occupied(7));
    }

    #[test]
    fn test_exhaustion() {
        let mut file = RegisterFile::new();
        for register in 0..GENERAL_COUNT {
            file.occupy(register);
        }
        assert_eq!(file.lowest_free(), None);
        assert_eq!(file.lowest_variable_register(&[]), None);
        file.bind(9, key("v"));
        assert_eq!(file.lowest_variable_register(&[]), Some(9));
        assert_eq!(file.lowest_variable_register(&[9]), None);
    }

    #[test]
    fn test_reserved_registers_are_never_free() {
        let file = RegisterFile::new();
        assert!(file.is_occupied(27));
        assert!(file.is_occupied(31));
    }
}

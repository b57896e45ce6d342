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

//! Resolved types of the annotated tree.

use crate::ast::TypeName;

/// A resolved type.
///
/// Sizes are in bytes. Arrays with `length == 0` are dynamic: their storage
/// lives in the heap arena and the variable itself is a 4-byte pointer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VarType {
    Int,
    Short,
    Byte,
    IntAddr,
    ShortAddr,
    ByteAddr,
    Array { element: Box<VarType>, length: u32 },
    Data { length: u32 },
    Routine { params: Vec<VarType>, returns: Box<VarType> },
    Struct { name: String },
    #[default]
    NoType,
}

impl VarType {
    /// Map a source type name onto a resolved type.
    ///
    /// Structure names are not checked here; unknown names are reported
    /// once the whole program has been annotated.
    pub fn from_type_name(name: &TypeName) -> Self {
        match name {
            TypeName::Int => VarType::Int,
            TypeName::Short => VarType::Short,
            TypeName::Byte => VarType::Byte,
            TypeName::IntAddr => VarType::IntAddr,
            TypeName::ShortAddr => VarType::ShortAddr,
            TypeName::ByteAddr => VarType::ByteAddr,
            TypeName::Named(name) => VarType::Struct { name: name.clone() },
        }
    }

    pub fn array(element: VarType, length: u32) -> Self {
        VarType::Array {
            element: Box::new(element),
            length,
        }
    }

    /// Bytes of storage a declaration of this type occupies.
    pub fn size(&self) -> u32 {
        match self {
            VarType::Int | VarType::IntAddr | VarType::ShortAddr | VarType::ByteAddr => 4,
            VarType::Short => 2,
            VarType::Byte => 1,
            VarType::Array { length: 0, .. } => 4,
            VarType::Array { element, length } => element.size() * length,
            VarType::Data { length } => 4 * length,
            VarType::Routine { .. } | VarType::Struct { .. } => 4,
            VarType::NoType => 0,
        }
    }

    /// Width in bytes of a value of this type when it is loaded or stored.
    pub fn width(&self) -> u32 {
        match self {
            VarType::Short => 2,
            VarType::Byte => 1,
            VarType::NoType => 0,
            _ => 4,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            VarType::Int
                | VarType::Short
                | VarType::Byte
                | VarType::IntAddr
                | VarType::ShortAddr
                | VarType::ByteAddr
        )
    }

    pub fn is_address(&self) -> bool {
        matches!(self, VarType::IntAddr | VarType::ShortAddr | VarType::ByteAddr)
    }

    pub fn is_dynamic_array(&self) -> bool {
        matches!(self, VarType::Array { length: 0, .. })
    }

    pub fn is_void(&self) -> bool {
        matches!(self, VarType::NoType)
    }

    /// Type of the value an address type points to.
    pub fn pointee(&self) -> Option<VarType> {
        match self {
            VarType::IntAddr => Some(VarType::Int),
            VarType::ShortAddr => Some(VarType::Short),
            VarType::ByteAddr => Some(VarType::Byte),
            _ => None,
        }
    }

    /// Type of `<-x` for a variable of this type.
    pub fn address_of(&self) -> VarType {
        match self {
            VarType::Short => VarType::ShortAddr,
            VarType::Byte => VarType::ByteAddr,
            _ => VarType::IntAddr,
        }
    }

    /// Element type of arrays and data blocks.
    pub fn element(&self) -> Option<VarType> {
        match self {
            VarType::Array { element, .. } => Some((**element).clone()),
            VarType::Data { .. } => Some(VarType::Int),
            _ => None,
        }
    }

    /// Number of elements of statically sized arrays and data blocks.
    pub fn static_length(&self) -> Option<u32> {
        match self {
            VarType::Array { length, .. } if *length > 0 => Some(*length),
            VarType::Data { length } => Some(*length),
            _ => None,
        }
    }
}

impl std::fmt::Display for VarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VarType::Int => write!(f, "int"),
            VarType::Short => write!(f, "short"),
            VarType::Byte => write!(f, "byte"),
            VarType::IntAddr => write!(f, "int@"),
            VarType::ShortAddr => write!(f, "short@"),
            VarType::ByteAddr => write!(f, "byte@"),
            VarType::Array { element, length: 0 } => write!(f, "{}[]", element),
            VarType::Array { element, length } => write!(f, "{}[{}]", element, length),
            VarType::Data { length } => write!(f, "data[{}]", length),
            VarType::Routine { params, returns } => {
                let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "routine({})", params.join(", "))?;
                if !returns.is_void() {
                    write!(f, ": {}", returns)?;
                }
                Ok(())
            }
            VarType::Struct { name } => write!(f, "{}", name),
            VarType::NoType => write!(f, "no type"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_sizes() {
        assert_eq!(VarType::Int.size(), 4);
        assert_eq!(VarType::Short.size(), 2);
        assert_eq!(VarType::Byte.size(), 1);
        assert_eq!(VarType::ByteAddr.size(), 4);
        assert_eq!(VarType::NoType.size(), 0);
    }

    #[test]
    fn test_array_sizes() {
        assert_eq!(VarType::array(VarType::Short, 5).size(), 10);
        assert_eq!(VarType::array(VarType::Int, 3).size(), 12);
        // Dynamic arrays only hold a heap pointer.
        assert_eq!(VarType::array(VarType::Int, 0).size(), 4);
        assert_eq!(VarType::Data { length: 3 }.size(), 12);
    }

    #[test]
    fn test_address_types() {
        assert_eq!(VarType::Byte.address_of(), VarType::ByteAddr);
        assert_eq!(VarType::ShortAddr.pointee(), Some(VarType::Short));
        assert_eq!(VarType::Int.pointee(), None);
        assert!(VarType::IntAddr.is_address());
        assert!(!VarType::Int.is_address());
    }

    #[test]
    fn test_display() {
        let routine = VarType::Routine {
            params: vec![VarType::Int, VarType::Byte],
            returns: Box::new(VarType::Int),
        };
        assert_eq!(routine.to_string(), "routine(int, byte): int");
        assert_eq!(VarType::array(VarType::Byte, 0).to_string(), "byte[]");
    }
}

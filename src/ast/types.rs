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

//! Type names as written in ERA source.

/// A type as it appears in a declaration or signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeName {
    /// `int` - 32-bit integer.
    Int,
    /// `short` - 16-bit unsigned integer.
    Short,
    /// `byte` - 8-bit unsigned integer.
    Byte,
    /// `int@` - address of an int.
    IntAddr,
    /// `short@` - address of a short.
    ShortAddr,
    /// `byte@` - address of a byte.
    ByteAddr,
    /// A structure type name.
    Named(String),
}

impl TypeName {
    /// Turn a scalar type into its address variant.
    pub fn to_address(&self) -> Option<TypeName> {
        match self {
            TypeName::Int => Some(TypeName::IntAddr),
            TypeName::Short => Some(TypeName::ShortAddr),
            TypeName::Byte => Some(TypeName::ByteAddr),
            _ => None,
        }
    }
}

impl std::fmt::Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeName::Int => write!(f, "int"),
            TypeName::Short => write!(f, "short"),
            TypeName::Byte => write!(f, "byte"),
            TypeName::IntAddr => write!(f, "int@"),
            TypeName::ShortAddr => write!(f, "short@"),
            TypeName::ByteAddr => write!(f, "byte@"),
            TypeName::Named(name) => write!(f, "{}", name),
        }
    }
}

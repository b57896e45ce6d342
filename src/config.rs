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

//! Compiler configuration.
//!
//! A [`CompilerConfig`] is created by the caller (usually the CLI), passed by
//! reference through annotation, where the `memory` pragma may change it, and
//! then read by code generation.

use crate::error::{CompileError, ErrorCode, Result, Span};

/// Default stack plus heap budget in bytes.
pub const DEFAULT_MEMORY_BUDGET: u32 = 64 * 1024;

/// Binary format version written into the header.
pub const FORMAT_VERSION: u8 = 1;

/// Settings that influence the generated program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Bytes reserved after the image for the heap arena and the stack.
    pub memory_budget: u32,
    /// Version byte of the executable header.
    pub version: u8,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            memory_budget: DEFAULT_MEMORY_BUDGET,
            version: FORMAT_VERSION,
        }
    }
}

impl CompilerConfig {
    /// Create a configuration with the given memory budget.
    pub fn with_memory_budget(memory_budget: u32) -> Self {
        Self {
            memory_budget,
            ..Self::default()
        }
    }

    /// Apply a `memory("<unit> <count>")` pragma argument.
    pub fn apply_memory_pragma(&mut self, argument: &str, span: Span) -> Result<()> {
        self.memory_budget = parse_memory_amount(argument, span)?;
        Ok(())
    }
}

/// Size of one memory unit in bytes.
fn unit_size(unit: &str) -> Option<u64> {
    match unit.to_ascii_uppercase().as_str() {
        "B" => Some(1),
        "W" => Some(2),
        "KB" => Some(1024),
        "KW" => Some(2048),
        "MB" => Some(1024 * 1024),
        _ => None,
    }
}

/// Parse a memory amount such as `"KB 16"` into a byte count.
pub fn parse_memory_amount(argument: &str, span: Span) -> Result<u32> {
    let parts: Vec<&str> = argument.split_whitespace().collect();
    let [unit, count] = parts.as_slice() else {
        return Err(CompileError::new(
            ErrorCode::InvalidPragma,
            format!("malformed memory amount \"{}\"", argument),
            span,
        )
        .with_hint("expected \"<unit> <count>\", e.g. \"KB 16\""));
    };

    let size = unit_size(unit).ok_or_else(|| {
        CompileError::new(
            ErrorCode::InvalidPragma,
            format!("unknown memory unit '{}'", unit),
            span,
        )
        .with_hint("valid units are B, W, KB, KW and MB")
    })?;

    let count: u64 = count.parse().map_err(|_| {
        CompileError::new(
            ErrorCode::InvalidPragma,
            format!("invalid memory count '{}'", count),
            span,
        )
    })?;

    let total = count.saturating_mul(size);
    if total == 0 || total > i32::MAX as u64 {
        return Err(CompileError::new(
            ErrorCode::InvalidPragma,
            format!("memory amount of {} bytes is out of range", total),
            span,
        ));
    }

    Ok(total as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CompilerConfig::default();
        assert_eq!(config.memory_budget, 65536);
        assert_eq!(config.version, 1);
    }

    #[test]
    fn test_parse_memory_units() {
        let span = Span::new(0, 0);
        assert_eq!(parse_memory_amount("B 100", span).unwrap(), 100);
        assert_eq!(parse_memory_amount("W 100", span).unwrap(), 200);
        assert_eq!(parse_memory_amount("kb 2", span).unwrap(), 2048);
        assert_eq!(parse_memory_amount("KW 1", span).unwrap(), 2048);
        assert_eq!(parse_memory_amount("MB 1", span).unwrap(), 1048576);
    }

    #[test]
    fn test_parse_memory_errors() {
        let span = Span::new(0, 0);
        for bad in ["", "KB", "16 KB", "XB 4", "KB -1", "KB 0", "MB 4096", "KB 1 2"] {
            let err = parse_memory_amount(bad, span).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidPragma, "input {:?}", bad);
        }
    }

    #[test]
    fn test_apply_memory_pragma() {
        let mut config = CompilerConfig::default();
        config.apply_memory_pragma("KB 16", Span::new(0, 5)).unwrap();
        assert_eq!(config.memory_budget, 16384);
    }
}

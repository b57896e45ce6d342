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

//! ERA Compiler Library
//!
//! This library provides all the components needed to compile ERA source code
//! into executable images for the 32-register ERA virtual machine.
//!
//! # Modules
//!
//! - [`error`] - Error types and error reporting
//! - [`config`] - Compiler configuration and the `memory` pragma
//! - [`lexer`] - Tokenization of source code
//! - [`parser`] - Parsing tokens into a syntax tree
//! - [`ast`] - Syntax tree definitions
//! - [`analyzer`] - Scopes, types, constant folding and post-checks
//! - [`codegen`] - Register allocation and ERA machine code generation
//! - [`output`] - Executable and listing writers
//!
//! # Example
//!
//! ```no_run
//! use erac::{analyzer, codegen, lexer, output, parser, CompilerConfig};
//! use std::path::Path;
//!
//! fn compile(source: &str, output_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = CompilerConfig::default();
//!
//!     // Tokenize
//!     let tokens = lexer::tokenize(source)?;
//!
//!     // Parse
//!     let program = parser::parse(&tokens)?;
//!
//!     // Analyze
//!     let tree = analyzer::analyze(&program, &mut config)?;
//!
//!     // Generate code
//!     let image = codegen::generate(&tree, &config)?;
//!
//!     // Write output
//!     output::write_bin(&image, output_path)?;
//!
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod ast;
pub mod codegen;
pub mod config;
pub mod error;
pub mod lexer;
pub mod output;
pub mod parser;

// Re-export commonly used types
pub use analyzer::{Aast, VarType};
pub use ast::{Program, TypeName};
pub use config::CompilerConfig;
pub use error::{format_error, CompileError, ErrorCode, ErrorKind, Result, SourceLocation, Span};
pub use lexer::Token;

/// The version of the ERA compiler.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of the compiler.
pub const NAME: &str = "erac";

/// Compile source code to an executable image.
///
/// This is the main entry point for compiling ERA source code.
/// It performs all compilation stages: lexing, parsing, analysis, and code generation.
///
/// # Example
///
/// ```
/// let image = erac::compile("code print 42; end").unwrap();
/// assert_eq!(image[0], 1);
/// ```
pub fn compile(source: &str) -> Result<Vec<u8>> {
    let mut config = CompilerConfig::default();
    compile_with_config(source, &mut config)
}

/// Compile with an explicit configuration.
///
/// `memory` pragmas in the source update `config`.
pub fn compile_with_config(source: &str, config: &mut CompilerConfig) -> Result<Vec<u8>> {
    let tree = analyze_with_config(source, config)?;
    codegen::generate(&tree, config)
}

/// Lex, parse and annotate `source` without generating code.
pub fn analyze(source: &str) -> Result<Aast> {
    let mut config = CompilerConfig::default();
    analyze_with_config(source, &mut config)
}

fn analyze_with_config(source: &str, config: &mut CompilerConfig) -> Result<Aast> {
    let tokens = lexer::tokenize(source)?;
    let program = parser::parse(&tokens)?;
    analyzer::analyze(&program, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "erac");
    }

    #[test]
    fn test_compile_reports_first_error() {
        let err = compile("code print x; end").unwrap_err();
        assert_eq!(err.code, ErrorCode::UndeclaredVariable);
    }

    #[test]
    fn test_memory_pragma_updates_config() {
        let mut config = CompilerConfig::default();
        compile_with_config("pragma memory(\"KB 16\"); code end", &mut config).unwrap();
        assert_eq!(config.memory_budget, 16 * 1024);
    }

    #[test]
    fn test_analyze_builds_tree() {
        let tree = analyze("int g; code g := 1; end").unwrap();
        assert!(tree.len() > 1);
    }
}

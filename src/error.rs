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

//! Error types for the ERA compiler.
//!
//! Every stage of the pipeline fails fast with a single [`CompileError`]
//! carrying an [`ErrorCode`], the offending source span and an optional hint.
//! Codes are grouped by [`ErrorKind`]:
//!
//! - `E0xx` lexical errors
//! - `E1xx` syntax errors
//! - `E2xx` scope errors
//! - `E3xx` type errors
//! - `E4xx` placement errors
//! - `E5xx` layout errors
//! - `E6xx` configuration errors

use std::ops::Range;
use thiserror::Error;

/// Byte range `start..end` of a token or construct in the source text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Number of source bytes covered.
    pub fn width(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Smallest span covering both `self` and `other`.
    pub fn merge(&self, other: &Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

/// The broad category of a compile error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntax,
    Scope,
    Type,
    Placement,
    Layout,
    Config,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Lexical => "lexical error",
            ErrorKind::Syntax => "syntax error",
            ErrorKind::Scope => "scope error",
            ErrorKind::Type => "type error",
            ErrorKind::Placement => "placement error",
            ErrorKind::Layout => "layout error",
            ErrorKind::Config => "configuration error",
        };
        write!(f, "{}", name)
    }
}

/// Every error the compiler can report. The string codes are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Lexical errors (E001-E021)
    InvalidCharacter,
    UnterminatedString,
    IntegerOutOfRange,
    InvalidRegister,

    // Syntax errors (E100-E109)
    UnexpectedToken,
    UnexpectedEndOfFile,
    ExpectedToken,
    ExpectedExpression,
    ExpectedStatement,
    ExpectedIdentifier,
    ExpectedType,
    ExpectedLiteral,
    InvalidAssignmentTarget,

    // Scope errors (E200-E204)
    DuplicateDeclaration,
    UndeclaredVariable,
    UndeclaredRoutine,
    UnknownType,
    NoContext,

    // Type errors (E300-E331)
    NotAStruct,
    UnknownField,
    NotAnArray,
    NotCallable,
    ArityMismatch,
    UnusedReturnValue,
    VoidInExpression,
    ReturnValueMismatch,
    ConstantRequired,
    InvalidArraySize,
    ArrayIndexOutOfRange,
    AssignToConstant,
    NotAValue,

    // Placement errors (E400-E402)
    ReturnOutsideRoutine,
    BreakOutsideLoop,
    DuplicateCodeBlock,

    // Layout errors (E500-E504)
    OutOfRegisters,
    LabelNotFound,
    AsmLiteralOutOfRange,
    ProgramTooLarge,
    InvalidInstruction,

    // Configuration errors (E600)
    InvalidPragma,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Lexical errors
            ErrorCode::InvalidCharacter => "E001",
            ErrorCode::UnterminatedString => "E010",
            ErrorCode::IntegerOutOfRange => "E020",
            ErrorCode::InvalidRegister => "E021",

            // Syntax errors
            ErrorCode::UnexpectedToken => "E100",
            ErrorCode::UnexpectedEndOfFile => "E101",
            ErrorCode::ExpectedToken => "E102",
            ErrorCode::ExpectedExpression => "E103",
            ErrorCode::ExpectedStatement => "E104",
            ErrorCode::ExpectedIdentifier => "E105",
            ErrorCode::ExpectedType => "E106",
            ErrorCode::ExpectedLiteral => "E107",
            ErrorCode::InvalidAssignmentTarget => "E109",

            // Scope errors
            ErrorCode::DuplicateDeclaration => "E200",
            ErrorCode::UndeclaredVariable => "E201",
            ErrorCode::UndeclaredRoutine => "E202",
            ErrorCode::UnknownType => "E203",
            ErrorCode::NoContext => "E204",

            // Type errors
            ErrorCode::NotAStruct => "E300",
            ErrorCode::UnknownField => "E301",
            ErrorCode::NotAnArray => "E302",
            ErrorCode::NotCallable => "E303",
            ErrorCode::ArityMismatch => "E310",
            ErrorCode::UnusedReturnValue => "E311",
            ErrorCode::VoidInExpression => "E312",
            ErrorCode::ReturnValueMismatch => "E313",
            ErrorCode::ConstantRequired => "E320",
            ErrorCode::InvalidArraySize => "E321",
            ErrorCode::ArrayIndexOutOfRange => "E322",
            ErrorCode::AssignToConstant => "E330",
            ErrorCode::NotAValue => "E331",

            // Placement errors
            ErrorCode::ReturnOutsideRoutine => "E400",
            ErrorCode::BreakOutsideLoop => "E401",
            ErrorCode::DuplicateCodeBlock => "E402",

            // Layout errors
            ErrorCode::OutOfRegisters => "E500",
            ErrorCode::LabelNotFound => "E501",
            ErrorCode::AsmLiteralOutOfRange => "E502",
            ErrorCode::ProgramTooLarge => "E503",
            ErrorCode::InvalidInstruction => "E504",

            // Configuration errors
            ErrorCode::InvalidPragma => "E600",
        }
    }

    /// Get the category this code belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ErrorCode::InvalidCharacter
            | ErrorCode::UnterminatedString
            | ErrorCode::IntegerOutOfRange
            | ErrorCode::InvalidRegister => ErrorKind::Lexical,

            ErrorCode::UnexpectedToken
            | ErrorCode::UnexpectedEndOfFile
            | ErrorCode::ExpectedToken
            | ErrorCode::ExpectedExpression
            | ErrorCode::ExpectedStatement
            | ErrorCode::ExpectedIdentifier
            | ErrorCode::ExpectedType
            | ErrorCode::ExpectedLiteral
            | ErrorCode::InvalidAssignmentTarget => ErrorKind::Syntax,

            ErrorCode::DuplicateDeclaration
            | ErrorCode::UndeclaredVariable
            | ErrorCode::UndeclaredRoutine
            | ErrorCode::UnknownType
            | ErrorCode::NoContext => ErrorKind::Scope,

            ErrorCode::NotAStruct
            | ErrorCode::UnknownField
            | ErrorCode::NotAnArray
            | ErrorCode::NotCallable
            | ErrorCode::ArityMismatch
            | ErrorCode::UnusedReturnValue
            | ErrorCode::VoidInExpression
            | ErrorCode::ReturnValueMismatch
            | ErrorCode::ConstantRequired
            | ErrorCode::InvalidArraySize
            | ErrorCode::ArrayIndexOutOfRange
            | ErrorCode::AssignToConstant
            | ErrorCode::NotAValue => ErrorKind::Type,

            ErrorCode::ReturnOutsideRoutine
            | ErrorCode::BreakOutsideLoop
            | ErrorCode::DuplicateCodeBlock => ErrorKind::Placement,

            ErrorCode::OutOfRegisters
            | ErrorCode::LabelNotFound
            | ErrorCode::AsmLiteralOutOfRange
            | ErrorCode::ProgramTooLarge
            | ErrorCode::InvalidInstruction => ErrorKind::Layout,

            ErrorCode::InvalidPragma => ErrorKind::Config,
        }
    }
}

/// The single error every stage fails with.
#[derive(Debug, Error)]
#[error("[{code}] {message}")]
pub struct CompileError {
    pub code: ErrorCode,
    pub message: String,
    pub span: Span,
    /// Suggestion shown below the source excerpt.
    pub hint: Option<String>,
}

impl CompileError {
    pub fn new(code: ErrorCode, message: impl Into<String>, span: Span) -> Self {
        Self {
            code,
            message: message.into(),
            span,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Stable code such as `E201`.
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;

/// 1-based line and column of a byte offset, with the text of that line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    pub line_content: String,
}

impl SourceLocation {
    pub fn from_offset(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let head = &source[..offset];
        let line_start = head.rfind('\n').map_or(0, |i| i + 1);
        let line_end = source[offset..]
            .find('\n')
            .map_or(source.len(), |i| offset + i);

        Self {
            line: head.matches('\n').count() + 1,
            column: head[line_start..].chars().count() + 1,
            line_content: source[line_start..line_end].to_string(),
        }
    }
}

/// Render an error as plain text: headline, location, the offending line
/// with carets under the span, and the hint if there is one.
pub fn format_error(error: &CompileError, source: &str, filename: Option<&str>) -> String {
    let location = SourceLocation::from_offset(source, error.span.start);
    let number = location.line.to_string();
    let gutter = " ".repeat(number.len());

    let indent = location.column - 1;
    let room = location.line_content.len().saturating_sub(indent).max(1);
    let carets = "^".repeat(error.span.width().clamp(1, room));

    let mut lines = vec![
        format!("{}[{}]: {}", error.kind(), error.code_str(), error.message),
        format!(
            "  --> {}:{}:{}",
            filename.unwrap_or("<input>"),
            location.line,
            location.column
        ),
        format!("{} |", gutter),
        format!("{} | {}", number, location.line_content),
        format!("{} | {}{}", gutter, " ".repeat(indent), carets),
    ];
    if let Some(hint) = &error.hint {
        lines.push(format!("{} = hint: {}", gutter, hint));
    }

    let mut output = lines.join("\n");
    output.push('\n');
    output
}

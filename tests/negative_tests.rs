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


//! Programs the compiler must reject, with the error it reports.

use erac::{CompileError, CompilerConfig, ErrorCode, ErrorKind};
use test_case::test_case;

fn compile_error(source: &str) -> CompileError {
    match erac::compile(source) {
        Ok(image) => panic!("expected an error, got {} bytes", image.len()),
        Err(err) => err,
    }
}

// ============================================================================
// Lexical and Syntax Errors
// ============================================================================

#[test_case("code int x $ 1; end", ErrorCode::InvalidCharacter; "invalid character")]
#[test_case("code asm R32 := 1; end end", ErrorCode::InvalidRegister; "register out of range")]
#[test_case("code print 2147483648; end", ErrorCode::IntegerOutOfRange; "literal too large")]
#[test_case("code print 1;", ErrorCode::UnexpectedEndOfFile; "missing end")]
#[test_case("code int x := 1 end", ErrorCode::ExpectedToken; "missing semicolon")]
#[test_case("print 1;", ErrorCode::UnexpectedToken; "statement outside code")]
#[test_case("code 5 := 3; end", ErrorCode::ExpectedStatement; "literal target")]
fn test_front_end_errors(source: &str, expected: ErrorCode) {
    let err = compile_error(source);
    assert_eq!(err.code, expected, "{}", err);
    assert!(matches!(err.kind(), ErrorKind::Lexical | ErrorKind::Syntax));
}

// ============================================================================
// Scope Errors
// ============================================================================

#[test_case("code print y; end", ErrorCode::UndeclaredVariable; "undeclared variable")]
#[test_case("code print y; int y; end", ErrorCode::UndeclaredVariable; "use before declaration")]
#[test_case("code do int y; end print y; end", ErrorCode::UndeclaredVariable; "out of block")]
#[test_case("code int x; int x; end", ErrorCode::DuplicateDeclaration; "duplicate local")]
#[test_case("routine f() do end routine f() do end code end", ErrorCode::DuplicateDeclaration; "duplicate routine")]
#[test_case("code g(); end", ErrorCode::UndeclaredRoutine; "undeclared routine")]
#[test_case("code Q q; end", ErrorCode::UnknownType; "unknown type")]
fn test_scope_errors(source: &str, expected: ErrorCode) {
    assert_eq!(compile_error(source).code, expected);
}

// ============================================================================
// Type Errors
// ============================================================================

#[test_case("int g; code g(); end", ErrorCode::NotCallable; "variable called")]
#[test_case("routine f(int a) do end code f(); end", ErrorCode::ArityMismatch; "missing argument")]
#[test_case("routine f() : int do return 1; end code f(); end", ErrorCode::UnusedReturnValue; "dropped result")]
#[test_case("routine f() do end code int x := f(); end", ErrorCode::VoidInExpression; "void value")]
#[test_case("routine f() do return 1; end code end", ErrorCode::ReturnValueMismatch; "value from void routine")]
#[test_case("routine f() : int do return; end code end", ErrorCode::ReturnValueMismatch; "missing value")]
#[test_case("code int a; a.x := 1; end", ErrorCode::NotAStruct; "field of scalar")]
#[test_case("struct P int x; end code P p; p.y := 1; end", ErrorCode::UnknownField; "unknown field")]
#[test_case("code int a; a[0] := 1; end", ErrorCode::NotAnArray; "index of scalar")]
#[test_case("code int[] a[3]; a[3] := 1; end", ErrorCode::ArrayIndexOutOfRange; "constant index past end")]
#[test_case("code int[] a[0]; end", ErrorCode::InvalidArraySize; "empty array")]
#[test_case("const c = 1; code c := 2; end", ErrorCode::AssignToConstant; "constant target")]
#[test_case("int g := 1; int h := g; code end", ErrorCode::ConstantRequired; "global from variable")]
#[test_case("code int n := 3; const c = n; end", ErrorCode::ConstantRequired; "constant from variable")]
fn test_type_errors(source: &str, expected: ErrorCode) {
    assert_eq!(compile_error(source).code, expected);
}

// ============================================================================
// Placement Errors
// ============================================================================

#[test_case("code break; end", ErrorCode::BreakOutsideLoop; "break in code")]
#[test_case("code return; end", ErrorCode::ReturnOutsideRoutine; "return in code")]
#[test_case("code end code end", ErrorCode::DuplicateCodeBlock; "two code blocks")]
fn test_placement_errors(source: &str, expected: ErrorCode) {
    let err = compile_error(source);
    assert_eq!(err.code, expected);
    assert_eq!(err.kind(), ErrorKind::Placement);
}

// ============================================================================
// Code Generation and Configuration Errors
// ============================================================================

#[test_case("code goto nowhere; end", ErrorCode::LabelNotFound; "missing label")]
#[test_case("code asm R1 := 32; end end", ErrorCode::AsmLiteralOutOfRange; "constant too wide")]
#[test_case("code asm format 12; end end", ErrorCode::AsmLiteralOutOfRange; "unknown format")]
#[test_case("pragma memory(\"XB 1\"); code end", ErrorCode::InvalidPragma; "unknown unit")]
#[test_case("pragma memory(\"KB 0\"); code end", ErrorCode::InvalidPragma; "zero memory")]
fn test_late_errors(source: &str, expected: ErrorCode) {
    assert_eq!(compile_error(source).code, expected);
}

#[test]
fn test_error_has_location() {
    let source = "code\n  print y;\nend";
    let err = compile_error(source);
    let location = erac::SourceLocation::from_offset(source, err.span.start);
    assert_eq!(location.line, 2);
    let message = erac::format_error(&err, source, Some("bad.era"));
    assert!(message.contains(err.code.code()));
}

#[test]
fn test_memory_budget_too_large() {
    let mut config = CompilerConfig::with_memory_budget(u32::MAX);
    let err = erac::compile_with_config("code end", &mut config).unwrap_err();
    assert_eq!(err.code, ErrorCode::ProgramTooLarge);
}

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


//! End-to-end CLI integration tests.

use std::fs;
use std::process::Command;

fn cargo_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_erac"))
}

const HELLO: &str = "code print 42; end\n";

/// Test --help flag.
#[test]
fn test_help_flag() {
    let output = cargo_bin()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("erac"));
    assert!(stdout.contains("--output"));
    assert!(stdout.contains("--format"));
    assert!(stdout.contains("--memory"));
}

/// Test --version flag.
#[test]
fn test_version_flag() {
    let output = cargo_bin()
        .arg("--version")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("erac"));
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

/// Without -o the image lands next to the input.
#[test]
fn test_compile_to_default_path() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("hello.era");
    fs::write(&source, HELLO).unwrap();

    let output = cargo_bin()
        .arg(&source)
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Compiled hello.era"));
    let image = fs::read(dir.path().join("hello.bin")).unwrap();
    assert_eq!(image, erac::compile(HELLO).unwrap());
}

#[test]
fn test_compile_to_explicit_bin() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("hello.era");
    let target = dir.path().join("out.bin");
    fs::write(&source, HELLO).unwrap();

    let output = cargo_bin()
        .arg(&source)
        .arg("-o")
        .arg(&target)
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let image = fs::read(&target).unwrap();
    assert_eq!(image[0], erac::config::FORMAT_VERSION);
}

/// The listing format is inferred from the output extension.
#[test]
fn test_compile_to_listing() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("hello.era");
    let target = dir.path().join("hello.lst");
    fs::write(&source, HELLO).unwrap();

    let output = cargo_bin()
        .arg(&source)
        .arg("-o")
        .arg(&target)
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let text = fs::read_to_string(&target).unwrap();
    assert!(text.starts_with("; version"));
    assert!(text.contains("PRINT"));
}

/// An explicit format wins over the extension.
#[test]
fn test_format_flag_overrides_extension() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("hello.era");
    let target = dir.path().join("hello.out");
    fs::write(&source, HELLO).unwrap();

    let output = cargo_bin()
        .arg(&source)
        .args(["-f", "lst", "-o"])
        .arg(&target)
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    assert!(fs::read_to_string(&target).unwrap().starts_with("; version"));
}

#[test]
fn test_memory_flag() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("hello.era");
    fs::write(&source, HELLO).unwrap();

    let output = cargo_bin()
        .arg(&source)
        .args(["--memory", "4096", "-v"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Memory budget: 4096 bytes"));
}

/// A compile error exits with status 1 and writes nothing.
#[test]
fn test_compile_error_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("broken.era");
    fs::write(&source, "code print y; end\n").unwrap();

    let output = cargo_bin()
        .arg(&source)
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("E201"));
    assert!(!dir.path().join("broken.bin").exists());
}

#[test]
fn test_missing_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = cargo_bin()
        .arg(dir.path().join("missing.era"))
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Cannot read"));
}

#[test]
fn test_missing_argument() {
    let output = cargo_bin().output().expect("Failed to execute command");
    assert!(!output.status.success());
}

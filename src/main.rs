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

//! ERA Compiler CLI
//!
//! Compiles ERA source files into executable images for the ERA virtual machine.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use ariadne::{Color, Label, Report, ReportKind, Source};
use tracing_subscriber::EnvFilter;

use erac::output::{format_from_extension, write_output, OutputFormat};
use erac::{CompileError, CompilerConfig};

/// erac - A compiler for the ERA language
#[derive(Parser, Debug)]
#[command(name = "erac")]
#[command(version)]
#[command(about = "A compiler for the ERA language targeting the ERA virtual machine")]
#[command(long_about = r#"
erac compiles ERA source files into executable images for the
32-register ERA virtual machine.

The output can be either:
  - BIN files (.bin) - Executable images
  - LST files (.lst) - Disassembly listings

Example usage:
  erac hello.era
  erac hello.era -o hello.bin
  erac hello.era -o hello.lst
  erac hello.era -f lst --memory 16384

Set ERAC_LOG (e.g. ERAC_LOG=debug) to trace the compiler stages.
"#)]
struct Cli {
    /// Source file to compile (.era)
    input: PathBuf,

    /// Output file (defaults to the input name with the format's extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format (inferred from the output extension when omitted)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Memory budget in bytes for the heap and the stack
    #[arg(long)]
    memory: Option<u32>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("erac=debug")
    } else {
        EnvFilter::try_from_env("ERAC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Print an error report with the offending source span.
fn report(error: &CompileError, source: &str, filename: &str) {
    let start = error.span.start.min(source.len());
    let end = error.span.end.clamp(start, source.len());
    let mut builder = Report::build(ReportKind::Error, filename, start)
        .with_code(error.code_str())
        .with_message(format!("{}: {}", error.kind(), error.message))
        .with_label(
            Label::new((filename, start..end))
                .with_message(&error.message)
                .with_color(Color::Red),
        );
    if let Some(hint) = &error.hint {
        builder = builder.with_help(hint);
    }
    if builder
        .finish()
        .eprint((filename, Source::from(source)))
        .is_err()
    {
        eprint!("{}", erac::format_error(error, source, Some(filename)));
    }
}

fn output_target(cli: &Cli) -> (PathBuf, OutputFormat) {
    let format = cli
        .format
        .or_else(|| cli.output.as_deref().and_then(format_from_extension))
        .unwrap_or(OutputFormat::Bin);
    let path = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension(format.extension()));
    (path, format)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "<input>".to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (output_path, format) = output_target(&cli);
    let filename = file_name(&cli.input);

    let source = match std::fs::read_to_string(&cli.input) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error: Cannot read {}: {}", cli.input.display(), e);
            return ExitCode::from(1);
        }
    };

    let mut config = match cli.memory {
        Some(memory) => CompilerConfig::with_memory_budget(memory),
        None => CompilerConfig::default(),
    };
    let image = match erac::compile_with_config(&source, &mut config) {
        Ok(image) => image,
        Err(e) => {
            report(&e, &source, &filename);
            return ExitCode::from(1);
        }
    };

    if cli.verbose {
        println!("Generated {} bytes", image.len());
        println!("Memory budget: {} bytes", config.memory_budget);
    }

    if let Err(e) = write_output(&image, &output_path, format) {
        eprintln!("Error: Cannot write {}: {}", output_path.display(), e);
        return ExitCode::from(1);
    }

    println!("Compiled {} -> {}", filename, output_path.display());
    ExitCode::SUCCESS
}

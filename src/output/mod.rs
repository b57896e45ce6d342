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

//! Output module for the ERA compiler.
//!
//! This module handles writing compiled programs to disk in various formats:
//! - BIN files (the executable image)
//! - LST files (a disassembly listing of the image)

mod bin;
mod listing;

pub use bin::{read_bin, write_bin};
pub use listing::{render_listing, write_listing};

use std::path::Path;

/// Determine the output format from a file extension.
pub fn format_from_extension(path: &Path) -> Option<OutputFormat> {
    match path.extension()?.to_str()?.to_lowercase().as_str() {
        "bin" => Some(OutputFormat::Bin),
        "lst" => Some(OutputFormat::Lst),
        _ => None,
    }
}

/// The output format for compiled programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Executable image.
    Bin,
    /// Disassembly listing.
    Lst,
}

impl OutputFormat {
    /// File extension used for this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Bin => "bin",
            OutputFormat::Lst => "lst",
        }
    }
}

/// Write compiled code to a file in the specified format.
pub fn write_output(image: &[u8], path: &Path, format: OutputFormat) -> std::io::Result<()> {
    match format {
        OutputFormat::Bin => write_bin(image, path),
        OutputFormat::Lst => write_listing(image, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(
            format_from_extension(Path::new("test.bin")),
            Some(OutputFormat::Bin)
        );
        assert_eq!(
            format_from_extension(Path::new("test.lst")),
            Some(OutputFormat::Lst)
        );
        assert_eq!(
            format_from_extension(Path::new("test.BIN")),
            Some(OutputFormat::Bin)
        );
        assert_eq!(format_from_extension(Path::new("test.txt")), None);
        assert_eq!(format_from_extension(Path::new("noext")), None);
    }

    #[test]
    fn test_extension() {
        assert_eq!(OutputFormat::Bin.extension(), "bin");
        assert_eq!(OutputFormat::Lst.extension(), "lst");
    }

    #[test]
    fn test_write_output_formats() {
        let dir = tempfile::tempdir().unwrap();
        let image = crate::compile("code end").unwrap();

        let bin = dir.path().join("a.bin");
        write_output(&image, &bin, OutputFormat::Bin).unwrap();
        assert_eq!(std::fs::read(&bin).unwrap(), image);

        let lst = dir.path().join("a.lst");
        write_output(&image, &lst, OutputFormat::Lst).unwrap();
        assert!(std::fs::read_to_string(&lst).unwrap().contains("SKIP"));
    }
}

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

//! Disassembly listing writer.

use std::fs;
use std::io;
use std::path::Path;

use crate::codegen::disassemble;

/// Render an executable image as a listing.
pub fn render_listing(image: &[u8]) -> io::Result<String> {
    let listing = disassemble(image)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    Ok(listing.to_string())
}

/// Write the disassembly listing of an executable image.
pub fn write_listing(image: &[u8], path: &Path) -> io::Result<()> {
    fs::write(path, render_listing(image)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_listing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program.lst");
        let image = crate::compile("code print 7; end").unwrap();

        write_listing(&image, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("; version 1"));
        assert!(text.contains("PRINT"));
        assert!(text.trim_end().ends_with("STOP"));
    }

    #[test]
    fn test_render_listing_rejects_garbage() {
        let err = render_listing(&[0xFF; 4]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}

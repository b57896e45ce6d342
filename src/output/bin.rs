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

//! Executable image writer.
//!
//! The image is written as produced by the assembler: an 18-byte header
//! followed by the static and code segments.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::codegen::HEADER_SIZE;

/// Write an executable image.
pub fn write_bin(image: &[u8], path: &Path) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(image)?;
    Ok(())
}

/// Read an executable image back, checking that it holds a full header.
pub fn read_bin(path: &Path) -> io::Result<Vec<u8>> {
    let data = std::fs::read(path)?;
    if data.len() < HEADER_SIZE as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "image shorter than its header",
        ));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read_bin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("program.bin");
        let image = crate::compile("code print 1; end").unwrap();

        write_bin(&image, &path).unwrap();

        assert_eq!(read_bin(&path).unwrap(), image);
    }

    #[test]
    fn test_read_short_bin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bin");
        std::fs::write(&path, [1, 0, 0]).unwrap();

        let err = read_bin(&path).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}

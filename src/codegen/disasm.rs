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

//! Disassembler for executable images.
//!
//! Used for `.lst` output and by tests that inspect generated code.

use std::fmt;

use super::isa::Instruction;
use super::program::HEADER_SIZE;
use crate::error::{CompileError, ErrorCode, Result, Span};

/// A decoded executable image.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing {
    pub version: u8,
    pub static_base: u32,
    pub static_data: Vec<u8>,
    pub code_base: u32,
    /// Instructions with their absolute addresses.
    pub instructions: Vec<(u32, Instruction)>,
}

impl Listing {
    /// Instructions without their addresses.
    pub fn code(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter().map(|(_, instruction)| instruction)
    }

    /// Read the big-endian word at `offset` of the static segment.
    pub fn static_word(&self, offset: usize) -> Option<i32> {
        let bytes = self.static_data.get(offset..offset + 4)?;
        Some(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

fn invalid(message: impl Into<String>) -> CompileError {
    CompileError::new(ErrorCode::InvalidInstruction, message, Span::default())
}

fn header_field(bytes: &[u8], at: usize) -> Result<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| invalid("truncated header"))
}

fn segment<'a>(bytes: &'a [u8], base: u32, words: u32, what: &str) -> Result<&'a [u8]> {
    let start = base as usize;
    let end = start
        .checked_add(words as usize * 2)
        .ok_or_else(|| invalid(format!("{} segment out of range", what)))?;
    bytes
        .get(start..end)
        .ok_or_else(|| invalid(format!("{} segment exceeds the image", what)))
}

/// Decode an executable image.
pub fn disassemble(bytes: &[u8]) -> Result<Listing> {
    if bytes.len() < HEADER_SIZE as usize {
        return Err(invalid(format!(
            "image of {} bytes is shorter than its header",
            bytes.len()
        )));
    }
    let version = bytes[0];
    let static_base = header_field(bytes, 2)?;
    let static_words = header_field(bytes, 6)?;
    let code_base = header_field(bytes, 10)?;
    let code_words = header_field(bytes, 14)?;

    let static_data = segment(bytes, static_base, static_words, "static")?.to_vec();
    let code = segment(bytes, code_base, code_words, "code")?;

    let mut instructions = Vec::new();
    let mut offset = 0;
    while offset < code.len() {
        let address = code_base + offset as u32;
        let instruction = Instruction::decode(&code[offset..])
            .ok_or_else(|| invalid(format!("invalid instruction at {:08X}", address)))?;
        offset += instruction.size();
        instructions.push((address, instruction));
    }

    Ok(Listing {
        version,
        static_base,
        static_data,
        code_base,
        instructions,
    })
}

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; version {}", self.version)?;
        writeln!(
            f,
            "; static segment at {:08X}, {} bytes",
            self.static_base,
            self.static_data.len()
        )?;
        writeln!(
            f,
            "; code segment at {:08X}, {} instructions",
            self.code_base,
            self.instructions.len()
        )?;
        writeln!(f)?;

        for (row, chunk) in self.static_data.chunks(16).enumerate() {
            let hex: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
            writeln!(
                f,
                "{:08X}  {}",
                self.static_base as usize + row * 16,
                hex.join(" ")
            )?;
        }
        if !self.static_data.is_empty() {
            writeln!(f)?;
        }

        for (address, instruction) in &self.instructions {
            let hex: Vec<String> = instruction
                .to_bytes()
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect();
            writeln!(f, "{:08X}  {:<17}  {}", address, hex.join(" "), instruction)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::isa::registers;

    fn image(static_data: &[u8], code: &[Instruction]) -> Vec<u8> {
        let mut code_bytes = Vec::new();
        for instruction in code {
            instruction.encode(&mut code_bytes);
        }
        let code_base = HEADER_SIZE + static_data.len() as u32;
        let mut bytes = vec![1, 0];
        bytes.extend_from_slice(&HEADER_SIZE.to_be_bytes());
        bytes.extend_from_slice(&(static_data.len() as u32 / 2).to_be_bytes());
        bytes.extend_from_slice(&code_base.to_be_bytes());
        bytes.extend_from_slice(&(code_bytes.len() as u32 / 2).to_be_bytes());
        bytes.extend_from_slice(static_data);
        bytes.extend_from_slice(&code_bytes);
        bytes
    }

    // ========================================================================
    // Decoding
    // ========================================================================

    #[test]
    fn test_disassemble_image() {
        let code = [
            Instruction::Ldl {
                dst: 3,
                value: -70000,
            },
            Instruction::Print(3),
            Instruction::Skip,
            Instruction::Stop,
        ];
        let listing = disassemble(&image(&[0, 0, 0, 0, 0, 0, 0, 42], &code)).unwrap();
        assert_eq!(listing.version, 1);
        assert_eq!(listing.static_base, 18);
        assert_eq!(listing.code_base, 26);
        assert_eq!(listing.static_word(4), Some(42));
        let addresses: Vec<u32> = listing.instructions.iter().map(|(a, _)| *a).collect();
        assert_eq!(addresses, vec![26, 32, 34, 36]);
        assert_eq!(listing.code().cloned().collect::<Vec<_>>(), code.to_vec());
    }

    #[test]
    fn test_disassemble_rejects_short_image() {
        let err = disassemble(&[1, 0, 0]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInstruction);
    }

    #[test]
    fn test_disassemble_rejects_truncated_immediate() {
        let mut bytes = image(&[], &[Instruction::Lda {
            dst: 1,
            base: registers::SB,
            offset: 4,
        }]);
        // Claim one word of code only.
        bytes[17] = 1;
        bytes.truncate(HEADER_SIZE as usize + 2);
        let err = disassemble(&bytes).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInstruction);
    }

    #[test]
    fn test_disassemble_rejects_segment_past_end() {
        let mut bytes = image(&[], &[Instruction::Stop]);
        bytes[17] = 9;
        assert!(disassemble(&bytes).is_err());
    }

    // ========================================================================
    // Listing
    // ========================================================================

    #[test]
    fn test_listing_display() {
        let listing = disassemble(&image(&[0xAB, 0xCD], &[Instruction::Print(2)])).unwrap();
        let text = listing.to_string();
        assert!(text.contains("; version 1"));
        assert!(text.contains("00000012  AB CD"));
        assert!(text.contains("PRINT R2"));
    }
}

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

//! Emit helper methods for code generation.
//!
//! This module provides the instruction idioms shared by all constructors:
//! - Constant loading (short and long forms)
//! - Width masks and sub-word windows
//! - Merging stores for byte and short values
//! - Stack pushes and pops of single registers

use super::isa::{registers, AluOp, Instruction};
use super::node::CodeNode;

/// Mask selecting the low `width` bytes of a word.
pub fn width_mask(width: u32) -> i32 {
    match width {
        1 => 0xFF,
        2 => 0xFFFF,
        _ => -1,
    }
}

/// Offset from a value's address to the 32-bit word that ends with it.
pub fn window(width: u32) -> i32 {
    width.min(4) as i32 - 4
}

/// Extension trait for emitting common instruction sequences.
pub trait EmitHelpers {
    /// Load `value` into `register` using `LDC` when it fits.
    fn load_constant(&mut self, register: u8, value: i32);

    /// Clear everything above the low `width` bytes of `register`.
    fn mask_to_width(&mut self, register: u8, width: u32);

    /// `dst := ->addr`, masked to `width`. `addr` points at the window word.
    fn load_window(&mut self, dst: u8, addr: u8, width: u32);

    /// Store the low `width` bytes of `value` through the window word at `addr`.
    ///
    /// Sub-word stores read the word, replace its low bytes and write it back,
    /// which needs `buffer`. Both `value` and `buffer` are clobbered.
    fn store_window(&mut self, value: u8, addr: u8, buffer: u8, width: u32);

    /// Multiply `register` by an element size of 1, 2 or 4.
    fn scale(&mut self, register: u8, size: u32);

    /// Save `register` below the stack pointer.
    fn push_register(&mut self, register: u8);

    /// Restore `register` from the top of the stack.
    fn pop_register(&mut self, register: u8);
}

impl EmitHelpers for CodeNode {
    fn load_constant(&mut self, register: u8, value: i32) {
        if (0..=31).contains(&value) {
            self.emit(Instruction::Ldc {
                dst: register,
                value: value as u8,
            });
        } else {
            self.emit(Instruction::Ldl {
                dst: register,
                value,
            });
        }
    }

    fn mask_to_width(&mut self, register: u8, width: u32) {
        if width >= 4 {
            return;
        }
        self.emit(Instruction::Ldl {
            dst: registers::SCRATCH,
            value: width_mask(width),
        });
        self.emit(Instruction::alu(AluOp::And, register, registers::SCRATCH));
    }

    fn load_window(&mut self, dst: u8, addr: u8, width: u32) {
        self.emit(Instruction::Ld { dst, addr });
        self.mask_to_width(dst, width);
    }

    fn store_window(&mut self, value: u8, addr: u8, buffer: u8, width: u32) {
        if width >= 4 {
            self.emit(Instruction::St { src: value, addr });
            return;
        }
        let mask = width_mask(width);
        self.emit(Instruction::Ld { dst: buffer, addr });
        self.emit(Instruction::Ldl {
            dst: registers::SCRATCH,
            value: !mask,
        });
        self.emit(Instruction::alu(AluOp::And, buffer, registers::SCRATCH));
        self.mask_to_width(value, width);
        self.emit(Instruction::alu(AluOp::Or, buffer, value));
        self.emit(Instruction::St { src: buffer, addr });
    }

    fn scale(&mut self, register: u8, size: u32) {
        let shifts = match size {
            4 => 2,
            2 => 1,
            _ => 0,
        };
        for _ in 0..shifts {
            self.emit(Instruction::alu(AluOp::Asl, register, register));
        }
    }

    fn push_register(&mut self, register: u8) {
        self.emit(Instruction::Lda {
            dst: registers::SP,
            base: registers::SP,
            offset: -4,
        });
        self.emit(Instruction::St {
            src: register,
            addr: registers::SP,
        });
    }

    fn pop_register(&mut self, register: u8) {
        self.emit(Instruction::Ld {
            dst: register,
            addr: registers::SP,
        });
        self.emit(Instruction::Lda {
            dst: registers::SP,
            base: registers::SP,
            offset: 4,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(node: &CodeNode) -> Vec<Instruction> {
        let mut bytes = Vec::new();
        for fragment in node.fragments() {
            if let super::super::node::Fragment::Bytes(chunk) = fragment {
                bytes.extend_from_slice(chunk);
            }
        }
        let mut instructions = Vec::new();
        let mut offset = 0;
        while offset < bytes.len() {
            let instruction = Instruction::decode(&bytes[offset..]).unwrap();
            offset += instruction.size();
            instructions.push(instruction);
        }
        instructions
    }

    #[test]
    fn test_load_constant_forms() {
        let mut node = CodeNode::new("constants");
        node.load_constant(1, 31);
        node.load_constant(2, 32);
        node.load_constant(3, -1);
        assert_eq!(
            decode_all(&node),
            vec![
                Instruction::Ldc { dst: 1, value: 31 },
                Instruction::Ldl { dst: 2, value: 32 },
                Instruction::Ldl { dst: 3, value: -1 },
            ]
        );
    }

    #[test]
    fn test_window_offsets() {
        assert_eq!(window(4), 0);
        assert_eq!(window(2), -2);
        assert_eq!(window(1), -3);
        assert_eq!(width_mask(1), 0xFF);
        assert_eq!(width_mask(2), 0xFFFF);
        assert_eq!(width_mask(4), -1);
    }

    #[test]
    fn test_word_store_is_plain() {
        let mut node = CodeNode::new("store");
        node.store_window(1, 2, 3, 4);
        assert_eq!(decode_all(&node), vec![Instruction::St { src: 1, addr: 2 }]);
    }

    #[test]
    fn test_byte_store_merges() {
        let mut node = CodeNode::new("store");
        node.store_window(1, 2, 3, 1);
        let scratch = registers::SCRATCH;
        assert_eq!(
            decode_all(&node),
            vec![
                Instruction::Ld { dst: 3, addr: 2 },
                Instruction::Ldl {
                    dst: scratch,
                    value: !0xFF
                },
                Instruction::alu(AluOp::And, 3, scratch),
                Instruction::Ldl {
                    dst: scratch,
                    value: 0xFF
                },
                Instruction::alu(AluOp::And, 1, scratch),
                Instruction::alu(AluOp::Or, 3, 1),
                Instruction::St { src: 3, addr: 2 },
            ]
        );
    }

    #[test]
    fn test_scale_by_element_size() {
        let mut node = CodeNode::new("scale");
        node.scale(4, 1);
        assert!(node.is_empty());
        node.scale(4, 4);
        assert_eq!(
            decode_all(&node),
            vec![
                Instruction::alu(AluOp::Asl, 4, 4),
                Instruction::alu(AluOp::Asl, 4, 4)
            ]
        );
    }

    #[test]
    fn test_push_pop_are_balanced() {
        let mut node = CodeNode::new("stack");
        node.push_register(5);
        node.pop_register(5);
        let instructions = decode_all(&node);
        assert_eq!(instructions.len(), 4);
        assert_eq!(
            instructions[1],
            Instruction::St {
                src: 5,
                addr: registers::SP
            }
        );
        assert_eq!(
            instructions[2],
            Instruction::Ld {
                dst: 5,
                addr: registers::SP
            }
        );
    }
}

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

//! ERA instruction set encoding.
//!
//! Every instruction starts with a 16-bit big-endian word:
//!
//! ```text
//!  15 14 | 13 12 11 10 | 9 8 7 6 5 | 4 3 2 1 0
//! format |   opcode    |    regI   |   regJ
//! ```
//!
//! `LDA` and `LDL` are followed by a 4-byte big-endian immediate.

/// Register numbers with a fixed role.
pub mod registers {
    /// Number of general purpose registers (R0 to R26).
    pub const GENERAL_COUNT: u8 = 27;
    /// Holds routine results.
    pub const RETURN: u8 = 26;
    /// Compiler scratch register, never allocated.
    pub const SCRATCH: u8 = 27;
    /// Frame pointer.
    pub const FP: u8 = 28;
    /// Stack pointer.
    pub const SP: u8 = 29;
    /// Static base.
    pub const SB: u8 = 30;
    /// Program counter.
    pub const PC: u8 = 31;

    /// Assembly name of a register.
    pub fn name(register: u8) -> String {
        match register {
            FP => "FP".to_string(),
            SP => "SP".to_string(),
            SB => "SB".to_string(),
            PC => "PC".to_string(),
            r => format!("R{}", r),
        }
    }
}

/// Opcode numbers.
pub mod opcodes {
    pub const STOP: u8 = 0;
    pub const LD: u8 = 1;
    pub const LDA: u8 = 2;
    pub const ST: u8 = 3;
    pub const MOV: u8 = 4;
    pub const ADD: u8 = 5;
    pub const SUB: u8 = 6;
    pub const ASR: u8 = 7;
    pub const ASL: u8 = 8;
    pub const OR: u8 = 9;
    pub const AND: u8 = 10;
    pub const XOR: u8 = 11;
    pub const LSL: u8 = 12;
    pub const LSR: u8 = 13;
    pub const CND: u8 = 14;
    pub const CBR: u8 = 15;
}

/// Operand width selector of the instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Byte = 0,
    Short = 1,
    Literal = 2,
    Word = 3,
}

impl Format {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Format::Byte,
            1 => Format::Short,
            2 => Format::Literal,
            _ => Format::Word,
        }
    }

    /// Format for an assembly `format` directive.
    pub fn from_width(bits: i64) -> Option<Self> {
        match bits {
            8 => Some(Format::Byte),
            16 => Some(Format::Short),
            32 => Some(Format::Word),
            _ => None,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Format::Byte => 8,
            Format::Short => 16,
            Format::Literal | Format::Word => 32,
        }
    }
}

/// Two-register arithmetic and logic operations (`Rj op= Ri`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AluOp {
    Add,
    Sub,
    Asr,
    Asl,
    Or,
    And,
    Xor,
    Lsl,
    Lsr,
    Cnd,
}

impl AluOp {
    pub fn opcode(self) -> u8 {
        match self {
            AluOp::Add => opcodes::ADD,
            AluOp::Sub => opcodes::SUB,
            AluOp::Asr => opcodes::ASR,
            AluOp::Asl => opcodes::ASL,
            AluOp::Or => opcodes::OR,
            AluOp::And => opcodes::AND,
            AluOp::Xor => opcodes::XOR,
            AluOp::Lsl => opcodes::LSL,
            AluOp::Lsr => opcodes::LSR,
            AluOp::Cnd => opcodes::CND,
        }
    }

    pub fn from_opcode(opcode: u8) -> Option<Self> {
        Some(match opcode {
            opcodes::ADD => AluOp::Add,
            opcodes::SUB => AluOp::Sub,
            opcodes::ASR => AluOp::Asr,
            opcodes::ASL => AluOp::Asl,
            opcodes::OR => AluOp::Or,
            opcodes::AND => AluOp::And,
            opcodes::XOR => AluOp::Xor,
            opcodes::LSL => AluOp::Lsl,
            opcodes::LSR => AluOp::Lsr,
            opcodes::CND => AluOp::Cnd,
            _ => return None,
        })
    }

    /// Assembly operator.
    pub fn symbol(self) -> &'static str {
        match self {
            AluOp::Add => "+=",
            AluOp::Sub => "-=",
            AluOp::Asr => ">>=",
            AluOp::Asl => "<<=",
            AluOp::Or => "|=",
            AluOp::And => "&=",
            AluOp::Xor => "^=",
            AluOp::Lsl => "<=",
            AluOp::Lsr => ">=",
            AluOp::Cnd => "?=",
        }
    }
}

/// A single machine instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Stop,
    Skip,
    /// Print the value of a register.
    Print(u8),
    /// `dst := ->addr`
    Ld { dst: u8, addr: u8 },
    /// `dst := base + offset`
    Lda { dst: u8, base: u8, offset: i32 },
    /// `dst := value` for `value` in `0..=31`.
    Ldc { dst: u8, value: u8 },
    /// `dst := value`
    Ldl { dst: u8, value: i32 },
    /// `->addr := src`
    St { src: u8, addr: u8 },
    /// `dst := src`
    Mov { dst: u8, src: u8 },
    /// `dst op= src`
    Alu {
        op: AluOp,
        format: Format,
        dst: u8,
        src: u8,
    },
    /// `if cond goto target`
    Cbr { cond: u8, target: u8 },
}

/// Build the 16-bit instruction word.
pub fn word(format: Format, opcode: u8, i: u8, j: u8) -> [u8; 2] {
    [
        ((format as u8) << 6) | ((opcode & 0x0F) << 2) | ((i >> 3) & 0x03),
        ((i & 0x07) << 5) | (j & 0x1F),
    ]
}

impl Instruction {
    /// Shorthand for a 32-bit ALU instruction.
    pub fn alu(op: AluOp, dst: u8, src: u8) -> Self {
        Instruction::Alu {
            op,
            format: Format::Word,
            dst,
            src,
        }
    }

    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        match self {
            Instruction::Lda { .. } | Instruction::Ldl { .. } => 6,
            _ => 2,
        }
    }

    /// Append the encoding to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let (bytes, immediate) = match *self {
            Instruction::Stop => (word(Format::Byte, opcodes::STOP, 0, 0), None),
            Instruction::Skip => (word(Format::Short, opcodes::STOP, 0, 0), None),
            Instruction::Print(register) => {
                (word(Format::Literal, opcodes::STOP, 0, register), None)
            }
            Instruction::Ld { dst, addr } => (word(Format::Word, opcodes::LD, dst, addr), None),
            Instruction::Lda { dst, base, offset } => {
                (word(Format::Word, opcodes::LDA, dst, base), Some(offset))
            }
            Instruction::Ldc { dst, value } => (word(Format::Byte, opcodes::LDA, dst, value), None),
            Instruction::Ldl { dst, value } => {
                (word(Format::Literal, opcodes::LDA, dst, 0), Some(value))
            }
            Instruction::St { src, addr } => (word(Format::Word, opcodes::ST, src, addr), None),
            Instruction::Mov { dst, src } => (word(Format::Word, opcodes::MOV, src, dst), None),
            Instruction::Alu {
                op,
                format,
                dst,
                src,
            } => (word(format, op.opcode(), src, dst), None),
            Instruction::Cbr { cond, target } => {
                (word(Format::Word, opcodes::CBR, cond, target), None)
            }
        };
        out.extend_from_slice(&bytes);
        if let Some(immediate) = immediate {
            out.extend_from_slice(&immediate.to_be_bytes());
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size());
        self.encode(&mut out);
        out
    }

    /// Decode the instruction at the start of `bytes`.
    ///
    /// Returns `None` for truncated input and for format/opcode pairs that
    /// have no meaning.
    pub fn decode(bytes: &[u8]) -> Option<Instruction> {
        let (&b0, &b1) = (bytes.first()?, bytes.get(1)?);
        let format = Format::from_bits(b0 >> 6);
        let opcode = (b0 >> 2) & 0x0F;
        let i = ((b0 & 0x03) << 3) | (b1 >> 5);
        let j = b1 & 0x1F;
        let immediate = || {
            bytes
                .get(2..6)
                .map(|imm| i32::from_be_bytes([imm[0], imm[1], imm[2], imm[3]]))
        };

        let instruction = match (opcode, format) {
            (opcodes::STOP, Format::Byte) => Instruction::Stop,
            (opcodes::STOP, Format::Short) => Instruction::Skip,
            (opcodes::STOP, Format::Literal) => Instruction::Print(j),
            (opcodes::LD, Format::Word) => Instruction::Ld { dst: i, addr: j },
            (opcodes::LDA, Format::Word) => Instruction::Lda {
                dst: i,
                base: j,
                offset: immediate()?,
            },
            (opcodes::LDA, Format::Byte) => Instruction::Ldc { dst: i, value: j },
            (opcodes::LDA, Format::Literal) => Instruction::Ldl {
                dst: i,
                value: immediate()?,
            },
            (opcodes::ST, Format::Word) => Instruction::St { src: i, addr: j },
            (opcodes::MOV, Format::Word) => Instruction::Mov { dst: j, src: i },
            (opcodes::CBR, Format::Word) => Instruction::Cbr { cond: i, target: j },
            (op, format) if format != Format::Literal => Instruction::Alu {
                op: AluOp::from_opcode(op)?,
                format,
                dst: j,
                src: i,
            },
            _ => return None,
        };
        Some(instruction)
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use registers::name;
        match *self {
            Instruction::Stop => write!(f, "STOP"),
            Instruction::Skip => write!(f, "SKIP"),
            Instruction::Print(r) => write!(f, "PRINT {}", name(r)),
            Instruction::Ld { dst, addr } => write!(f, "{} := ->{}", name(dst), name(addr)),
            Instruction::Lda { dst, base, offset } => {
                write!(f, "{} := {} + {}", name(dst), name(base), offset)
            }
            Instruction::Ldc { dst, value } => write!(f, "{} := {}", name(dst), value),
            Instruction::Ldl { dst, value } => write!(f, "{} := {}", name(dst), value),
            Instruction::St { src, addr } => write!(f, "->{} := {}", name(addr), name(src)),
            Instruction::Mov { dst, src } => write!(f, "{} := {}", name(dst), name(src)),
            Instruction::Alu {
                op,
                format,
                dst,
                src,
            } => {
                write!(f, "{} {} {}", name(dst), op.symbol(), name(src))?;
                if format != Format::Word {
                    write!(f, " ({}-bit)", format.bits())?;
                }
                Ok(())
            }
            Instruction::Cbr { cond, target } => {
                write!(f, "if {} goto {}", name(cond), name(target))
            }
        }
    }
}

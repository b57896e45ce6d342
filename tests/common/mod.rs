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

//! A small ERA machine used to execute compiled images in tests.

#![allow(dead_code)]

use erac::codegen::isa::{registers, AluOp, Format, Instruction};
use erac::codegen::HEADER_SIZE;
use thiserror::Error;

/// Instructions executed before a run is considered stuck.
pub const STEP_LIMIT: u64 = 5_000_000;

#[derive(Debug, Error, PartialEq)]
pub enum MachineError {
    #[error("image is not a valid executable")]
    BadImage,
    #[error("memory access at {0:#010X} is out of range")]
    MemoryOutOfRange(i64),
    #[error("invalid instruction at {0:#010X}")]
    InvalidInstruction(i32),
    #[error("step limit exceeded")]
    StepLimit,
}

/// Machine state after loading an image.
pub struct Machine {
    pub registers: [i32; 32],
    pub memory: Vec<u8>,
    pub output: Vec<i32>,
    pub steps: u64,
}

fn header_word(image: &[u8], at: usize) -> Result<u32, MachineError> {
    image
        .get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(MachineError::BadImage)
}

impl Machine {
    /// Load `image` at address 0 with `memory` spare bytes after it.
    pub fn load(image: &[u8], memory: u32) -> Result<Self, MachineError> {
        if image.len() < HEADER_SIZE as usize {
            return Err(MachineError::BadImage);
        }
        let mut machine = Machine {
            registers: [0; 32],
            memory: vec![0; image.len() + memory as usize + 16],
            output: Vec::new(),
            steps: 0,
        };
        machine.memory[..image.len()].copy_from_slice(image);
        machine.registers[registers::SB as usize] = header_word(image, 2)? as i32;
        machine.registers[registers::PC as usize] = header_word(image, 10)? as i32;
        Ok(machine)
    }

    fn check(&self, address: i32) -> Result<usize, MachineError> {
        let start = address as i64;
        if start < 0 || start as usize + 4 > self.memory.len() {
            return Err(MachineError::MemoryOutOfRange(start));
        }
        Ok(start as usize)
    }

    pub fn read_word(&self, address: i32) -> Result<i32, MachineError> {
        let at = self.check(address)?;
        let b = &self.memory[at..at + 4];
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn write_word(&mut self, address: i32, value: i32) -> Result<(), MachineError> {
        let at = self.check(address)?;
        self.memory[at..at + 4].copy_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Current heap top pointer from the static segment.
    pub fn heap_top(&self) -> i32 {
        self.read_word(self.registers[registers::SB as usize] + 4)
            .unwrap_or(-1)
    }

    /// Execute one instruction. Returns `false` once the machine stopped.
    pub fn step(&mut self) -> Result<bool, MachineError> {
        let pc = self.registers[registers::PC as usize];
        let at = usize::try_from(pc).map_err(|_| MachineError::InvalidInstruction(pc))?;
        let instruction = self
            .memory
            .get(at..)
            .and_then(Instruction::decode)
            .ok_or(MachineError::InvalidInstruction(pc))?;
        self.registers[registers::PC as usize] = pc + instruction.size() as i32;
        self.steps += 1;

        let r = |machine: &Machine, index: u8| machine.registers[index as usize];
        match instruction {
            Instruction::Stop => return Ok(false),
            Instruction::Skip => {}
            Instruction::Print(j) => {
                let value = r(self, j);
                self.output.push(value);
            }
            Instruction::Ld { dst, addr } => {
                self.registers[dst as usize] = self.read_word(r(self, addr))?;
            }
            Instruction::Lda { dst, base, offset } => {
                self.registers[dst as usize] = r(self, base).wrapping_add(offset);
            }
            Instruction::Ldc { dst, value } => self.registers[dst as usize] = value as i32,
            Instruction::Ldl { dst, value } => self.registers[dst as usize] = value,
            Instruction::St { src, addr } => {
                let value = r(self, src);
                self.write_word(r(self, addr), value)?;
            }
            Instruction::Mov { dst, src } => self.registers[dst as usize] = r(self, src),
            Instruction::Alu {
                op,
                format,
                dst,
                src,
            } => {
                let (a, b) = (r(self, dst), r(self, src));
                let value = match op {
                    AluOp::Add => a.wrapping_add(b),
                    AluOp::Sub => a.wrapping_sub(b),
                    AluOp::Asr => b >> 1,
                    AluOp::Asl | AluOp::Lsl => b.wrapping_shl(1),
                    AluOp::Lsr => ((b as u32) >> 1) as i32,
                    AluOp::Or => a | b,
                    AluOp::And => a & b,
                    AluOp::Xor => a ^ b,
                    AluOp::Cnd => match a.cmp(&b) {
                        std::cmp::Ordering::Greater => 1,
                        std::cmp::Ordering::Less => 2,
                        std::cmp::Ordering::Equal => 4,
                    },
                };
                self.registers[dst as usize] = match format {
                    Format::Byte => value & 0xFF,
                    Format::Short => value & 0xFFFF,
                    Format::Word | Format::Literal => value,
                };
            }
            Instruction::Cbr { cond, target } => {
                if r(self, cond) != 0 {
                    self.registers[registers::PC as usize] = r(self, target);
                }
            }
        }
        Ok(true)
    }

    /// Run until `STOP`.
    pub fn run(&mut self) -> Result<(), MachineError> {
        while self.step()? {
            if self.steps > STEP_LIMIT {
                return Err(MachineError::StepLimit);
            }
        }
        Ok(())
    }
}

/// Compile `source`, run it and return the machine after it stopped.
pub fn execute(source: &str) -> Machine {
    let mut config = erac::CompilerConfig::default();
    let image = erac::compile_with_config(source, &mut config)
        .unwrap_or_else(|e| panic!("compilation failed: {}", e));
    let mut machine = Machine::load(&image, config.memory_budget).expect("load image");
    machine
        .run()
        .unwrap_or_else(|e| panic!("execution failed: {}", e));
    machine
}

/// Compile and run `source`, returning the printed values.
pub fn run(source: &str) -> Vec<i32> {
    execute(source).output
}

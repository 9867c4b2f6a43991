use std::collections::BTreeSet;

use log::warn;

use super::opcodes::{self, OpCategory};
use crate::error::RevEngineError;

/// One normalized JVM instruction.
///
/// `index` is the byte offset of the instruction (of the `wide` prefix when present),
/// `opcode` is the effective opcode (the one following `wide`), and `args` holds the
/// operand bytes, including the alignment padding of switch instructions. Successor and
/// predecessor are found through the owning slice: the next instruction starts at
/// [`Instruction::next_index`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub index: usize,
    pub opcode: u8,
    pub args: Vec<u8>,
    pub wide: bool,
    pub length: usize,
}

/// Decoded `tableswitch`/`lookupswitch` operands with absolute targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwitchTable {
    pub default: usize,
    pub cases: Vec<(i32, usize)>,
}

impl SwitchTable {
    /// Distinct targets in ascending order, default included.
    pub fn targets(&self) -> Vec<usize> {
        let set: BTreeSet<usize> = self
            .cases
            .iter()
            .map(|(_, t)| *t)
            .chain(std::iter::once(self.default))
            .collect();
        set.into_iter().collect()
    }
}

impl Instruction {
    pub fn next_index(&self) -> usize {
        self.index + self.length
    }

    pub fn mnemonic(&self) -> &'static str {
        opcodes::mnemonic(self.opcode).unwrap_or("<invalid>")
    }

    pub fn category(&self) -> OpCategory {
        opcodes::category(self.opcode)
    }

    /// Argument bytes `[start, end)` relative to the instruction's first operand byte.
    pub fn arg_bytes(&self, start: usize, end: usize) -> Result<&[u8], RevEngineError> {
        self.args
            .get(start..end)
            .ok_or(RevEngineError::TruncatedInstruction { pc: self.index })
    }

    pub fn u8_at(&self, at: usize) -> Result<u8, RevEngineError> {
        Ok(self.arg_bytes(at, at + 1)?[0])
    }

    pub fn u16_at(&self, at: usize) -> Result<u16, RevEngineError> {
        let b = self.arg_bytes(at, at + 2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn i16_at(&self, at: usize) -> Result<i16, RevEngineError> {
        let b = self.arg_bytes(at, at + 2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    pub fn i32_at(&self, at: usize) -> Result<i32, RevEngineError> {
        let b = self.arg_bytes(at, at + 4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Constant pool index operand (`ldc` is the only one-byte form).
    pub fn pool_index(&self) -> Result<u16, RevEngineError> {
        if self.opcode == 0x12 {
            Ok(u16::from(self.u8_at(0)?))
        } else {
            self.u16_at(0)
        }
    }

    /// Absolute target of a jump, `goto`, or `jsr`, in its short or wide form.
    pub fn target_pc(&self) -> Option<usize> {
        let offset = match self.category() {
            OpCategory::ConditionalJump => i64::from(self.i16_at(0).ok()?),
            OpCategory::Goto | OpCategory::Subroutine if self.opcode != opcodes::RET => {
                if self.length == 5 {
                    i64::from(self.i32_at(0).ok()?)
                } else {
                    i64::from(self.i16_at(0).ok()?)
                }
            }
            _ => return None,
        };
        usize::try_from(self.index as i64 + offset).ok()
    }

    /// Local variable slot touched by a load, store, `iinc` or `ret`.
    pub fn local_slot(&self) -> Option<u16> {
        match self.opcode {
            0x15..=0x19 | 0x36..=0x3a | opcodes::IINC | opcodes::RET => {
                if self.wide {
                    self.u16_at(0).ok()
                } else {
                    self.u8_at(0).ok().map(u16::from)
                }
            }
            0x1a..=0x2d => Some(u16::from((self.opcode - 0x1a) % 4)),
            0x3b..=0x4e => Some(u16::from((self.opcode - 0x3b) % 4)),
            _ => None,
        }
    }

    pub fn is_return(&self) -> bool {
        self.category() == OpCategory::Return
    }

    pub fn switch_table(&self) -> Result<SwitchTable, RevEngineError> {
        let pad = switch_padding(self.index);
        let base = self.index as i64;
        let abs = |offset: i32| -> Result<usize, RevEngineError> {
            usize::try_from(base + i64::from(offset))
                .map_err(|_| RevEngineError::TruncatedInstruction { pc: self.index })
        };
        let default = abs(self.i32_at(pad)?)?;
        let mut cases = Vec::new();
        match self.opcode {
            opcodes::TABLESWITCH => {
                let low = self.i32_at(pad + 4)?;
                let high = self.i32_at(pad + 8)?;
                for (n, key) in (low..=high).enumerate() {
                    cases.push((key, abs(self.i32_at(pad + 12 + n * 4)?)?));
                }
            }
            opcodes::LOOKUPSWITCH => {
                let npairs = self.i32_at(pad + 4)?.max(0) as usize;
                for n in 0..npairs {
                    let at = pad + 8 + n * 8;
                    cases.push((self.i32_at(at)?, abs(self.i32_at(at + 4)?)?));
                }
            }
            opcode => {
                return Err(RevEngineError::InvalidOpcode {
                    pc: self.index,
                    opcode,
                })
            }
        }
        Ok(SwitchTable { default, cases })
    }
}

/// Padding bytes after a switch opcode so its operands start on a 4-byte boundary.
pub fn switch_padding(index: usize) -> usize {
    (4 - (index + 1) % 4) % 4
}

fn read_i32(code: &[u8], at: usize) -> Option<i64> {
    let b = code.get(at..at + 4)?;
    Some(i64::from(i32::from_be_bytes([b[0], b[1], b[2], b[3]])))
}

fn switch_length(code: &[u8], pc: usize, opcode: u8) -> usize {
    let base = pc + 1 + switch_padding(pc);
    let body = match opcode {
        opcodes::TABLESWITCH => match (read_i32(code, base + 4), read_i32(code, base + 8)) {
            (Some(low), Some(high)) if high >= low => 12 + 4 * (high - low + 1),
            _ => 12,
        },
        _ => match read_i32(code, base + 4) {
            Some(npairs) if npairs > 0 => 8 + 8 * npairs,
            _ => 8,
        },
    };
    (base - pc) + usize::try_from(body).unwrap_or(usize::MAX / 2)
}

/// Splits a method's code array into instructions.
///
/// An operand range that runs past the end of the array is clamped to the array end;
/// reading the missing operand later reports a [`RevEngineError::TruncatedInstruction`]
/// for that method only.
pub fn normalize(code: &[u8]) -> Result<Vec<Instruction>, RevEngineError> {
    let mut instructions = Vec::new();
    let mut pc = 0;
    while pc < code.len() {
        let first = code[pc];
        let (opcode, wide, length) = match first {
            opcodes::WIDE => {
                let opcode = *code
                    .get(pc + 1)
                    .ok_or(RevEngineError::TruncatedInstruction { pc })?;
                let length = match opcode {
                    opcodes::IINC => 6,
                    0x15..=0x19 | 0x36..=0x3a | opcodes::RET => 4,
                    _ => return Err(RevEngineError::InvalidOpcode { pc, opcode }),
                };
                (opcode, true, length)
            }
            opcodes::TABLESWITCH | opcodes::LOOKUPSWITCH => {
                (first, false, switch_length(code, pc, first))
            }
            _ => {
                let length = opcodes::fixed_length(first)
                    .ok_or(RevEngineError::InvalidOpcode { pc, opcode: first })?;
                (first, false, length)
            }
        };
        let mut end = pc.saturating_add(length);
        if end > code.len() {
            warn!(
                "{} at pc {} needs {} bytes but only {} remain",
                opcodes::mnemonic(opcode).unwrap_or("?"),
                pc,
                length,
                code.len() - pc
            );
            end = code.len();
        }
        let arg_start = (pc + if wide { 2 } else { 1 }).min(end);
        instructions.push(Instruction {
            index: pc,
            opcode,
            args: code[arg_start..end].to_vec(),
            wide,
            length: end - pc,
        });
        pc = end;
    }
    Ok(instructions)
}

//! Plain bytecode listing, used when a caller asks for disassembly instead of source and
//! as the fallback shown under a method that failed to decompile.

use crate::class_info::ExceptionEntry;
use crate::code_attribute::opcodes::{self, OpCategory};
use crate::code_attribute::Instruction;
use crate::constant_info::ConstantPool;
use crate::error::RevEngineError;

use super::descriptor::{internal_to_source_name, newarray_type};

/// One line per instruction, `pc: mnemonic operands`. Switch tables continue on the
/// following lines, one per case.
pub fn disassemble(instructions: &[Instruction], pool: &ConstantPool) -> Result<Vec<String>, RevEngineError> {
    let mut lines = Vec::with_capacity(instructions.len());
    for ins in instructions {
        let operands = operands(ins, pool).map_err(|e| e.at(ins.index))?;
        let mnemonic = if ins.wide {
            format!("wide {}", ins.mnemonic())
        } else {
            ins.mnemonic().to_string()
        };
        if operands.is_empty() {
            lines.push(format!("{}: {}", ins.index, mnemonic));
        } else {
            lines.push(format!("{}: {} {}", ins.index, mnemonic, operands));
        }
        if ins.category() == OpCategory::Switch {
            let table = ins.switch_table()?;
            for (key, target) in &table.cases {
                lines.push(format!("    {}: {}", key, target));
            }
            lines.push(format!("    default: {}", table.default));
        }
    }
    Ok(lines)
}

/// Comment lines describing an exception table.
pub fn exception_table(exceptions: &[ExceptionEntry]) -> Vec<String> {
    exceptions
        .iter()
        .map(|e| {
            let catch = e
                .catch_type
                .as_deref()
                .map_or_else(|| "any".to_string(), internal_to_source_name);
            format!(
                "// exception [{}, {}) -> {} {}",
                e.start_pc, e.end_pc, e.handler_pc, catch
            )
        })
        .collect()
}

fn operands(ins: &Instruction, pool: &ConstantPool) -> Result<String, RevEngineError> {
    let text = match ins.opcode {
        0x10 => (ins.u8_at(0)? as i8).to_string(),
        0x11 => ins.i16_at(0)?.to_string(),
        0x12..=0x14 => {
            let index = ins.pool_index()?;
            format!("#{} // {}", index, pool.literal(index)?.to_source())
        }
        0x15..=0x19 | 0x36..=0x3a | opcodes::RET => slot(ins)?,
        opcodes::IINC => {
            let delta = if ins.wide {
                ins.i16_at(2)?
            } else {
                i16::from(ins.u8_at(1)? as i8)
            };
            format!("{} {}", slot(ins)?, delta)
        }
        0xb2..=0xb9 => {
            let index = ins.pool_index()?;
            let member = pool.member_ref(index)?;
            let mut text = format!(
                "#{} // {}.{}:{}",
                index,
                internal_to_source_name(&member.class),
                member.name,
                member.descriptor
            );
            if ins.opcode == 0xb9 {
                text = format!("{}, {}", text, ins.u8_at(2)?);
            }
            text
        }
        0xba => {
            let index = ins.pool_index()?;
            format!("#{}", index)
        }
        0xbb | 0xbd | 0xc0 | 0xc1 => {
            let index = ins.pool_index()?;
            format!("#{} // {}", index, internal_to_source_name(pool.class_name(index)?))
        }
        0xc5 => {
            let index = ins.pool_index()?;
            format!(
                "#{}, {} // {}",
                index,
                ins.u8_at(2)?,
                internal_to_source_name(pool.class_name(index)?)
            )
        }
        0xbc => {
            let ty = newarray_type(ins.u8_at(0)?);
            ty.primitive_name().unwrap_or("?").to_string()
        }
        _ => match ins.target_pc() {
            Some(target) => target.to_string(),
            None => String::new(),
        },
    };
    Ok(text)
}

fn slot(ins: &Instruction) -> Result<String, RevEngineError> {
    ins.local_slot()
        .map(|s| s.to_string())
        .ok_or(RevEngineError::TruncatedInstruction { pc: ins.index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code_attribute::normalize;

    #[test]
    fn test_plain_listing() {
        // iload_1, bipush -3, if_icmpge +7, iinc 1 1, goto -8, return
        let code = [0x1b, 0x10, 0xfd, 0xa2, 0x00, 0x07, 0x84, 0x01, 0x01, 0xa7, 0xff, 0xf8, 0xb1];
        let list = normalize(&code).unwrap();
        let lines = disassemble(&list, &ConstantPool::default()).unwrap();
        assert_eq!(
            lines,
            vec![
                "0: iload_1",
                "1: bipush -3",
                "3: if_icmpge 10",
                "6: iinc 1 1",
                "9: goto 1",
                "12: return",
            ]
        );
    }

    #[test]
    fn test_switch_listing() {
        let mut code = vec![0x1a, 0xab, 0, 0];
        code.extend_from_slice(&19i32.to_be_bytes());
        code.extend_from_slice(&1i32.to_be_bytes());
        code.extend_from_slice(&7i32.to_be_bytes());
        code.extend_from_slice(&19i32.to_be_bytes());
        code.push(0xb1);
        let list = normalize(&code).unwrap();
        let lines = disassemble(&list, &ConstantPool::default()).unwrap();
        assert_eq!(lines[1], "1: lookupswitch");
        assert_eq!(lines[2], "    7: 20");
        assert_eq!(lines[3], "    default: 20");
        assert_eq!(lines[4], "20: return");
    }

    #[test]
    fn test_exception_comments() {
        let table = vec![
            ExceptionEntry {
                start_pc: 0,
                end_pc: 8,
                handler_pc: 11,
                catch_type: Some("java/io/IOException".into()),
            },
            ExceptionEntry {
                start_pc: 0,
                end_pc: 8,
                handler_pc: 20,
                catch_type: None,
            },
        ];
        assert_eq!(
            exception_table(&table),
            vec![
                "// exception [0, 8) -> 11 java.io.IOException",
                "// exception [0, 8) -> 20 any",
            ]
        );
    }
}

use crate::code_attribute::{opcodes, Instruction, SwitchTable};
use crate::error::RevEngineError;

use super::descriptor::{newarray_type, JvmType};

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add, Sub, Mul, Div, Rem,
    Shl, Shr, Ushr,
    And, Or, Xor,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Ushr => ">>>",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
        }
    }
}

/// Comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq, Ne, Lt, Ge, Gt, Le,
}

impl CompareOp {
    /// Returns the negated comparison.
    pub fn negate(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Ne,
            CompareOp::Ne => CompareOp::Eq,
            CompareOp::Lt => CompareOp::Ge,
            CompareOp::Ge => CompareOp::Lt,
            CompareOp::Gt => CompareOp::Le,
            CompareOp::Le => CompareOp::Gt,
        }
    }

    /// Java source token for this operator.
    pub fn as_str(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
        }
    }

    pub fn is_equality(self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Ne)
    }
}

/// Method invocation kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Special,
    Static,
    Interface,
}

/// What a conditional jump compares its popped operand(s) against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IfOperands {
    /// `ifeq` .. `ifle`: one int against zero.
    Zero,
    /// `ifnull`/`ifnonnull`.
    Null,
    /// `if_icmpxx`/`if_acmpxx`: two operands.
    Pair,
}

/// An instruction decoded into the shape the decompiler works with. Pool indices are
/// kept unresolved; jump targets are absolute.
#[derive(Clone, Debug, PartialEq)]
pub enum Op {
    Nop,
    AconstNull,
    Iconst(i32),
    Lconst(i64),
    Fconst(f32),
    Dconst(f64),
    Ldc(u16),
    Load(JvmType, u16),
    Store(JvmType, u16),
    ArrayLoad(JvmType),
    ArrayStore(JvmType),
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    Binary(BinOp, JvmType),
    Neg(JvmType),
    Iinc(u16, i16),
    Convert(JvmType),
    Compare(JvmType),
    If {
        cmp: CompareOp,
        operands: IfOperands,
        target: usize,
    },
    Goto(usize),
    Jsr(usize),
    Ret(u16),
    Switch(SwitchTable),
    Return(Option<JvmType>),
    GetStatic(u16),
    PutStatic(u16),
    GetField(u16),
    PutField(u16),
    Invoke(InvokeKind, u16),
    InvokeDynamic(u16),
    New(u16),
    NewArray(JvmType),
    ANewArray(u16),
    MultiANewArray(u16, u8),
    ArrayLength,
    Athrow,
    CheckCast(u16),
    InstanceOf(u16),
    MonitorEnter,
    MonitorExit,
}

/// Type of the typed load/store/return families, indexed int, long, float, double, ref.
fn family_type(n: u8) -> JvmType {
    match n {
        0 => JvmType::Int,
        1 => JvmType::Long,
        2 => JvmType::Float,
        3 => JvmType::Double,
        _ => JvmType::object(),
    }
}

fn array_element(n: u8) -> JvmType {
    match n {
        0 => JvmType::Int,
        1 => JvmType::Long,
        2 => JvmType::Float,
        3 => JvmType::Double,
        4 => JvmType::object(),
        5 => JvmType::Byte,
        6 => JvmType::Char,
        _ => JvmType::Short,
    }
}

const COMPARISONS: [CompareOp; 6] = [
    CompareOp::Eq,
    CompareOp::Ne,
    CompareOp::Lt,
    CompareOp::Ge,
    CompareOp::Gt,
    CompareOp::Le,
];

pub fn decode(ins: &Instruction) -> Result<Op, RevEngineError> {
    let pc = ins.index;
    let target = || ins.target_pc().ok_or(RevEngineError::TruncatedInstruction { pc });
    let slot = || ins.local_slot().ok_or(RevEngineError::TruncatedInstruction { pc });
    Ok(match ins.opcode {
        0x00 => Op::Nop,
        0x01 => Op::AconstNull,
        op @ 0x02..=0x08 => Op::Iconst(i32::from(op) - 3),
        op @ 0x09..=0x0a => Op::Lconst(i64::from(op - 0x09)),
        op @ 0x0b..=0x0d => Op::Fconst(f32::from(op - 0x0b)),
        op @ 0x0e..=0x0f => Op::Dconst(f64::from(op - 0x0e)),
        0x10 => Op::Iconst(i32::from(ins.u8_at(0)? as i8)),
        0x11 => Op::Iconst(i32::from(ins.i16_at(0)?)),
        0x12..=0x14 => Op::Ldc(ins.pool_index()?),
        op @ 0x15..=0x19 => Op::Load(family_type(op - 0x15), slot()?),
        op @ 0x1a..=0x2d => Op::Load(family_type((op - 0x1a) / 4), slot()?),
        op @ 0x2e..=0x35 => Op::ArrayLoad(array_element(op - 0x2e)),
        op @ 0x36..=0x3a => Op::Store(family_type(op - 0x36), slot()?),
        op @ 0x3b..=0x4e => Op::Store(family_type((op - 0x3b) / 4), slot()?),
        op @ 0x4f..=0x56 => Op::ArrayStore(array_element(op - 0x4f)),
        0x57 => Op::Pop,
        0x58 => Op::Pop2,
        0x59 => Op::Dup,
        0x5a => Op::DupX1,
        0x5b => Op::DupX2,
        0x5c => Op::Dup2,
        0x5d => Op::Dup2X1,
        0x5e => Op::Dup2X2,
        0x5f => Op::Swap,
        op @ 0x60..=0x73 => {
            let bin = [BinOp::Add, BinOp::Sub, BinOp::Mul, BinOp::Div, BinOp::Rem]
                [usize::from((op - 0x60) / 4)];
            Op::Binary(bin, family_type((op - 0x60) % 4))
        }
        op @ 0x74..=0x77 => Op::Neg(family_type(op - 0x74)),
        op @ 0x78..=0x7d => {
            let bin = [BinOp::Shl, BinOp::Shr, BinOp::Ushr][usize::from((op - 0x78) / 2)];
            Op::Binary(bin, family_type((op - 0x78) % 2))
        }
        op @ 0x7e..=0x83 => {
            let bin = [BinOp::And, BinOp::Or, BinOp::Xor][usize::from((op - 0x7e) / 2)];
            Op::Binary(bin, family_type((op - 0x7e) % 2))
        }
        opcodes::IINC => {
            if ins.wide {
                Op::Iinc(ins.u16_at(0)?, ins.i16_at(2)?)
            } else {
                Op::Iinc(u16::from(ins.u8_at(0)?), i16::from(ins.u8_at(1)? as i8))
            }
        }
        op @ 0x85..=0x93 => Op::Convert(match op {
            0x88 | 0x8b | 0x8e => JvmType::Int,
            0x85 | 0x8c | 0x8f => JvmType::Long,
            0x86 | 0x89 | 0x90 => JvmType::Float,
            0x87 | 0x8a | 0x8d => JvmType::Double,
            0x91 => JvmType::Byte,
            0x92 => JvmType::Char,
            _ => JvmType::Short,
        }),
        0x94 => Op::Compare(JvmType::Long),
        0x95 | 0x96 => Op::Compare(JvmType::Float),
        0x97 | 0x98 => Op::Compare(JvmType::Double),
        op @ 0x99..=0x9e => Op::If {
            cmp: COMPARISONS[usize::from(op - 0x99)],
            operands: IfOperands::Zero,
            target: target()?,
        },
        op @ 0x9f..=0xa4 => Op::If {
            cmp: COMPARISONS[usize::from(op - 0x9f)],
            operands: IfOperands::Pair,
            target: target()?,
        },
        op @ 0xa5..=0xa6 => Op::If {
            cmp: COMPARISONS[usize::from(op - 0xa5)],
            operands: IfOperands::Pair,
            target: target()?,
        },
        op @ 0xc6..=0xc7 => Op::If {
            cmp: COMPARISONS[usize::from(op - 0xc6)],
            operands: IfOperands::Null,
            target: target()?,
        },
        opcodes::GOTO | opcodes::GOTO_W => Op::Goto(target()?),
        opcodes::JSR | opcodes::JSR_W => Op::Jsr(target()?),
        opcodes::RET => Op::Ret(slot()?),
        opcodes::TABLESWITCH | opcodes::LOOKUPSWITCH => Op::Switch(ins.switch_table()?),
        op @ 0xac..=0xb0 => Op::Return(Some(family_type(op - 0xac))),
        0xb1 => Op::Return(None),
        0xb2 => Op::GetStatic(ins.u16_at(0)?),
        0xb3 => Op::PutStatic(ins.u16_at(0)?),
        0xb4 => Op::GetField(ins.u16_at(0)?),
        0xb5 => Op::PutField(ins.u16_at(0)?),
        0xb6 => Op::Invoke(InvokeKind::Virtual, ins.u16_at(0)?),
        0xb7 => Op::Invoke(InvokeKind::Special, ins.u16_at(0)?),
        0xb8 => Op::Invoke(InvokeKind::Static, ins.u16_at(0)?),
        0xb9 => Op::Invoke(InvokeKind::Interface, ins.u16_at(0)?),
        0xba => Op::InvokeDynamic(ins.u16_at(0)?),
        0xbb => Op::New(ins.u16_at(0)?),
        0xbc => Op::NewArray(newarray_type(ins.u8_at(0)?)),
        0xbd => Op::ANewArray(ins.u16_at(0)?),
        0xbe => Op::ArrayLength,
        0xbf => Op::Athrow,
        0xc0 => Op::CheckCast(ins.u16_at(0)?),
        0xc1 => Op::InstanceOf(ins.u16_at(0)?),
        0xc2 => Op::MonitorEnter,
        0xc3 => Op::MonitorExit,
        0xc5 => Op::MultiANewArray(ins.u16_at(0)?, ins.u8_at(2)?),
        opcode => return Err(RevEngineError::InvalidOpcode { pc, opcode }),
    })
}

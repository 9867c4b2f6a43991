//! Opcode table: mnemonics, fixed lengths and categories.

pub const IINC: u8 = 0x84;
pub const GOTO: u8 = 0xa7;
pub const JSR: u8 = 0xa8;
pub const RET: u8 = 0xa9;
pub const TABLESWITCH: u8 = 0xaa;
pub const LOOKUPSWITCH: u8 = 0xab;
pub const WIDE: u8 = 0xc4;
pub const GOTO_W: u8 = 0xc8;
pub const JSR_W: u8 = 0xc9;

#[rustfmt::skip]
const MNEMONICS: [&str; 202] = [
    // 0x00
    "nop", "aconst_null", "iconst_m1", "iconst_0", "iconst_1", "iconst_2", "iconst_3", "iconst_4",
    "iconst_5", "lconst_0", "lconst_1", "fconst_0", "fconst_1", "fconst_2", "dconst_0", "dconst_1",
    // 0x10
    "bipush", "sipush", "ldc", "ldc_w", "ldc2_w", "iload", "lload", "fload",
    "dload", "aload", "iload_0", "iload_1", "iload_2", "iload_3", "lload_0", "lload_1",
    // 0x20
    "lload_2", "lload_3", "fload_0", "fload_1", "fload_2", "fload_3", "dload_0", "dload_1",
    "dload_2", "dload_3", "aload_0", "aload_1", "aload_2", "aload_3", "iaload", "laload",
    // 0x30
    "faload", "daload", "aaload", "baload", "caload", "saload", "istore", "lstore",
    "fstore", "dstore", "astore", "istore_0", "istore_1", "istore_2", "istore_3", "lstore_0",
    // 0x40
    "lstore_1", "lstore_2", "lstore_3", "fstore_0", "fstore_1", "fstore_2", "fstore_3", "dstore_0",
    "dstore_1", "dstore_2", "dstore_3", "astore_0", "astore_1", "astore_2", "astore_3", "iastore",
    // 0x50
    "lastore", "fastore", "dastore", "aastore", "bastore", "castore", "sastore", "pop",
    "pop2", "dup", "dup_x1", "dup_x2", "dup2", "dup2_x1", "dup2_x2", "swap",
    // 0x60
    "iadd", "ladd", "fadd", "dadd", "isub", "lsub", "fsub", "dsub",
    "imul", "lmul", "fmul", "dmul", "idiv", "ldiv", "fdiv", "ddiv",
    // 0x70
    "irem", "lrem", "frem", "drem", "ineg", "lneg", "fneg", "dneg",
    "ishl", "lshl", "ishr", "lshr", "iushr", "lushr", "iand", "land",
    // 0x80
    "ior", "lor", "ixor", "lxor", "iinc", "i2l", "i2f", "i2d",
    "l2i", "l2f", "l2d", "f2i", "f2l", "f2d", "d2i", "d2l",
    // 0x90
    "d2f", "i2b", "i2c", "i2s", "lcmp", "fcmpl", "fcmpg", "dcmpl",
    "dcmpg", "ifeq", "ifne", "iflt", "ifge", "ifgt", "ifle", "if_icmpeq",
    // 0xa0
    "if_icmpne", "if_icmplt", "if_icmpge", "if_icmpgt", "if_icmple", "if_acmpeq", "if_acmpne", "goto",
    "jsr", "ret", "tableswitch", "lookupswitch", "ireturn", "lreturn", "freturn", "dreturn",
    // 0xb0
    "areturn", "return", "getstatic", "putstatic", "getfield", "putfield", "invokevirtual", "invokespecial",
    "invokestatic", "invokeinterface", "invokedynamic", "new", "newarray", "anewarray", "arraylength", "athrow",
    // 0xc0
    "checkcast", "instanceof", "monitorenter", "monitorexit", "wide", "multianewarray", "ifnull", "ifnonnull",
    "goto_w", "jsr_w",
];

/// Mnemonic of an opcode, or `None` for reserved/unassigned values.
pub fn mnemonic(opcode: u8) -> Option<&'static str> {
    MNEMONICS.get(usize::from(opcode)).copied()
}

/// Total instruction length including the opcode byte. `None` for the variable-length
/// switch instructions, the `wide` prefix and unassigned opcodes.
pub fn fixed_length(opcode: u8) -> Option<usize> {
    match opcode {
        0x10 | 0x12 | 0x15..=0x19 | 0x36..=0x3a | 0xa9 | 0xbc => Some(2),
        0x11 | 0x13 | 0x14 | 0x84 | 0x99..=0xa8 | 0xb2..=0xb8 | 0xbb | 0xbd | 0xc0 | 0xc1
        | 0xc6 | 0xc7 => Some(3),
        0xc5 => Some(4),
        0xb9 | 0xba | 0xc8 | 0xc9 => Some(5),
        TABLESWITCH | LOOKUPSWITCH | WIDE => None,
        0x00..=0xc9 => Some(1),
        _ => None,
    }
}

/// Coarse classification of an opcode, the basis for block and statement decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpCategory {
    Nop,
    Constant,
    Load,
    Store,
    ArrayLoad,
    ArrayStore,
    Stack,
    Arithmetic,
    Increment,
    Conversion,
    Comparison,
    ConditionalJump,
    Goto,
    Subroutine,
    Switch,
    Return,
    Field,
    Invoke,
    Allocation,
    Throw,
    TypeCheck,
    Monitor,
    Wide,
    Reserved,
}

pub fn category(opcode: u8) -> OpCategory {
    match opcode {
        0x00 => OpCategory::Nop,
        0x01..=0x14 => OpCategory::Constant,
        0x15..=0x2d => OpCategory::Load,
        0x2e..=0x35 | 0xbe => OpCategory::ArrayLoad,
        0x36..=0x4e => OpCategory::Store,
        0x4f..=0x56 => OpCategory::ArrayStore,
        0x57..=0x5f => OpCategory::Stack,
        0x60..=0x83 => OpCategory::Arithmetic,
        0x84 => OpCategory::Increment,
        0x85..=0x93 => OpCategory::Conversion,
        0x94..=0x98 => OpCategory::Comparison,
        0x99..=0xa6 | 0xc6 | 0xc7 => OpCategory::ConditionalJump,
        GOTO | GOTO_W => OpCategory::Goto,
        JSR | RET | JSR_W => OpCategory::Subroutine,
        TABLESWITCH | LOOKUPSWITCH => OpCategory::Switch,
        0xac..=0xb1 => OpCategory::Return,
        0xb2..=0xb5 => OpCategory::Field,
        0xb6..=0xba => OpCategory::Invoke,
        0xbb..=0xbd | 0xc5 => OpCategory::Allocation,
        0xbf => OpCategory::Throw,
        0xc0 | 0xc1 => OpCategory::TypeCheck,
        0xc2 | 0xc3 => OpCategory::Monitor,
        WIDE => OpCategory::Wide,
        _ => OpCategory::Reserved,
    }
}

use binrw::{binread, BinRead, BinResult};

/// One slot of the constant pool. `Unusable` fills the slot after a `Long` or `Double`.
#[derive(Clone, Debug)]
#[binread]
pub enum ConstantInfo {
    #[br(magic = 1u8)]
    Utf8(Utf8Constant),
    #[br(magic = 3u8)]
    Integer(IntegerConstant),
    #[br(magic = 4u8)]
    Float(FloatConstant),
    #[br(magic = 5u8)]
    Long(LongConstant),
    #[br(magic = 6u8)]
    Double(DoubleConstant),
    #[br(magic = 7u8)]
    Class(ClassConstant),
    #[br(magic = 8u8)]
    String(StringConstant),
    #[br(magic = 9u8)]
    FieldRef(FieldRefConstant),
    #[br(magic = 10u8)]
    MethodRef(MethodRefConstant),
    #[br(magic = 11u8)]
    InterfaceMethodRef(InterfaceMethodRefConstant),
    #[br(magic = 12u8)]
    NameAndType(NameAndTypeConstant),
    #[br(magic = 15u8)]
    MethodHandle(MethodHandleConstant),
    #[br(magic = 16u8)]
    MethodType(MethodTypeConstant),
    #[br(magic = 17u8)]
    Dynamic(InvokeDynamicConstant),
    #[br(magic = 18u8)]
    InvokeDynamic(InvokeDynamicConstant),
    #[br(magic = 19u8)]
    Module(ClassConstant),
    #[br(magic = 20u8)]
    Package(ClassConstant),
    #[br(pre_assert(false))]
    Unusable,
}

#[derive(Clone, Debug)]
#[binread]
pub struct Utf8Constant {
    #[br(parse_with = modified_utf8_parser)]
    pub utf8_string: String,
}

#[derive(Clone, Debug)]
#[binread]
pub struct IntegerConstant {
    pub value: i32,
}

#[derive(Clone, Debug)]
#[binread]
pub struct FloatConstant {
    pub value: f32,
}

#[derive(Clone, Debug)]
#[binread]
pub struct LongConstant {
    pub value: i64,
}

#[derive(Clone, Debug)]
#[binread]
pub struct DoubleConstant {
    pub value: f64,
}

#[derive(Clone, Debug)]
#[binread]
pub struct ClassConstant {
    pub name_index: u16,
}

#[derive(Clone, Debug)]
#[binread]
pub struct StringConstant {
    pub string_index: u16,
}

#[derive(Clone, Debug)]
#[binread]
pub struct FieldRefConstant {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug)]
#[binread]
pub struct MethodRefConstant {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug)]
#[binread]
pub struct InterfaceMethodRefConstant {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug)]
#[binread]
pub struct NameAndTypeConstant {
    pub name_index: u16,
    pub descriptor_index: u16,
}

#[derive(Clone, Debug)]
#[binread]
pub struct MethodHandleConstant {
    pub reference_kind: u8,
    pub reference_index: u16,
}

#[derive(Clone, Debug)]
#[binread]
pub struct MethodTypeConstant {
    pub descriptor_index: u16,
}

#[derive(Clone, Debug)]
#[binread]
pub struct InvokeDynamicConstant {
    pub bootstrap_method_attr_index: u16,
    pub name_and_type_index: u16,
}

/// Reads `count - 1` pool slots, inserting an `Unusable` slot after every 8-byte constant.
#[binrw::parser(reader, endian)]
pub fn constant_pool_parser(count: u16) -> BinResult<Vec<ConstantInfo>> {
    let slots = usize::from(count).saturating_sub(1);
    let mut pool = Vec::with_capacity(slots);
    while pool.len() < slots {
        let entry = ConstantInfo::read_options(reader, endian, ())?;
        let wide = matches!(entry, ConstantInfo::Long(_) | ConstantInfo::Double(_));
        pool.push(entry);
        if wide {
            pool.push(ConstantInfo::Unusable);
        }
    }
    Ok(pool)
}

#[binrw::parser(reader, endian)]
fn modified_utf8_parser() -> BinResult<String> {
    let length = u16::read_options(reader, endian, ())?;
    let mut bytes = vec![0u8; usize::from(length)];
    reader.read_exact(&mut bytes)?;
    Ok(decode_modified_utf8(&bytes))
}

/// Decodes the JVM's modified UTF-8: two-byte nulls and surrogate pairs encoded as
/// two three-byte sequences.
pub fn decode_modified_utf8(bytes: &[u8]) -> String {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xE0 == 0xC0 && i + 1 < bytes.len() {
            units.push((u16::from(b & 0x1F) << 6) | u16::from(bytes[i + 1] & 0x3F));
            i += 2;
        } else if b & 0xF0 == 0xE0 && i + 2 < bytes.len() {
            units.push(
                (u16::from(b & 0x0F) << 12)
                    | (u16::from(bytes[i + 1] & 0x3F) << 6)
                    | u16::from(bytes[i + 2] & 0x3F),
            );
            i += 3;
        } else {
            units.push(0xFFFD);
            i += 1;
        }
    }
    String::from_utf16_lossy(&units)
}

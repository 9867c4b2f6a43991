mod types;

pub use self::types::*;

use thiserror::Error;

use crate::error::{ClassParserError, RevEngineError};

/// A pool index that did not point at the expected kind of constant.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("constant pool entry #{index} is not a {expected}")]
pub struct BadConstant {
    pub index: u16,
    pub expected: &'static str,
}

impl From<BadConstant> for ClassParserError {
    fn from(e: BadConstant) -> Self {
        ClassParserError::ConstantPool {
            index: e.index,
            expected: e.expected,
        }
    }
}

impl From<BadConstant> for RevEngineError {
    fn from(e: BadConstant) -> Self {
        RevEngineError::ConstantPool {
            index: e.index,
            expected: e.expected,
        }
    }
}

/// A field, method or interface-method reference resolved to strings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberRef {
    pub class: String,
    pub name: String,
    pub descriptor: String,
    pub interface: bool,
}

/// A loadable constant (`ldc`, `ConstantValue`).
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    Class(String),
}

/// Indexed access to the constant pool with 1-based JVM indices.
#[derive(Clone, Debug, Default)]
pub struct ConstantPool {
    entries: Vec<ConstantInfo>,
}

impl ConstantPool {
    pub fn new(entries: Vec<ConstantInfo>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: u16) -> Option<&ConstantInfo> {
        self.entries.get(usize::from(index).checked_sub(1)?)
    }

    pub fn entries(&self) -> &[ConstantInfo] {
        &self.entries
    }

    pub fn utf8(&self, index: u16) -> Result<&str, BadConstant> {
        match self.get(index) {
            Some(ConstantInfo::Utf8(u)) => Ok(&u.utf8_string),
            _ => Err(BadConstant {
                index,
                expected: "Utf8",
            }),
        }
    }

    /// Internal (slash separated) name of a `Class` constant.
    pub fn class_name(&self, index: u16) -> Result<&str, BadConstant> {
        match self.get(index) {
            Some(ConstantInfo::Class(c)) => self.utf8(c.name_index),
            _ => Err(BadConstant {
                index,
                expected: "Class",
            }),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str), BadConstant> {
        match self.get(index) {
            Some(ConstantInfo::NameAndType(nat)) => {
                Ok((self.utf8(nat.name_index)?, self.utf8(nat.descriptor_index)?))
            }
            _ => Err(BadConstant {
                index,
                expected: "NameAndType",
            }),
        }
    }

    pub fn member_ref(&self, index: u16) -> Result<MemberRef, BadConstant> {
        let (class_index, nat_index, interface) = match self.get(index) {
            Some(ConstantInfo::FieldRef(r)) => (r.class_index, r.name_and_type_index, false),
            Some(ConstantInfo::MethodRef(r)) => (r.class_index, r.name_and_type_index, false),
            Some(ConstantInfo::InterfaceMethodRef(r)) => {
                (r.class_index, r.name_and_type_index, true)
            }
            _ => {
                return Err(BadConstant {
                    index,
                    expected: "member reference",
                })
            }
        };
        let (name, descriptor) = self.name_and_type(nat_index)?;
        Ok(MemberRef {
            class: self.class_name(class_index)?.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            interface,
        })
    }

    pub fn literal(&self, index: u16) -> Result<Literal, BadConstant> {
        Ok(match self.get(index) {
            Some(ConstantInfo::Integer(c)) => Literal::Int(c.value),
            Some(ConstantInfo::Float(c)) => Literal::Float(c.value),
            Some(ConstantInfo::Long(c)) => Literal::Long(c.value),
            Some(ConstantInfo::Double(c)) => Literal::Double(c.value),
            Some(ConstantInfo::String(c)) => Literal::String(self.utf8(c.string_index)?.to_string()),
            Some(ConstantInfo::Class(c)) => Literal::Class(self.utf8(c.name_index)?.to_string()),
            _ => {
                return Err(BadConstant {
                    index,
                    expected: "loadable constant",
                })
            }
        })
    }

    /// Every class name and every descriptor the pool mentions, in pool order.
    pub fn referenced_types(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for entry in &self.entries {
            match entry {
                ConstantInfo::Class(c) => {
                    if let Ok(name) = self.utf8(c.name_index) {
                        out.push(name);
                    }
                }
                ConstantInfo::NameAndType(nat) => {
                    if let Ok(desc) = self.utf8(nat.descriptor_index) {
                        out.push(desc);
                    }
                }
                _ => {}
            }
        }
        out
    }
}

impl Literal {
    /// Java source spelling of the constant.
    pub fn to_source(&self) -> String {
        match self {
            Literal::Int(v) => v.to_string(),
            Literal::Long(v) => format!("{}L", v),
            Literal::Float(v) => {
                if v.is_nan() {
                    "Float.NaN".into()
                } else if v.is_infinite() {
                    if *v > 0.0 { "Float.POSITIVE_INFINITY" } else { "Float.NEGATIVE_INFINITY" }.into()
                } else {
                    format!("{}F", with_fraction(v.to_string()))
                }
            }
            Literal::Double(v) => {
                if v.is_nan() {
                    "Double.NaN".into()
                } else if v.is_infinite() {
                    if *v > 0.0 { "Double.POSITIVE_INFINITY" } else { "Double.NEGATIVE_INFINITY" }.into()
                } else {
                    with_fraction(v.to_string())
                }
            }
            Literal::String(s) => quote(s),
            Literal::Class(name) => format!("{}.class", name.replace('/', ".")),
        }
    }
}

fn with_fraction(mut text: String) -> String {
    if !text.contains(['.', 'e', 'E']) {
        text.push_str(".0");
    }
    text
}

/// Quotes and escapes a string for Java source.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

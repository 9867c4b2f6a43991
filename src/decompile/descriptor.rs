/// JVM type descriptor and method descriptor parser.

/// Represents a JVM type from a descriptor string.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum JvmType {
    Int,
    Long,
    Float,
    Double,
    Byte,
    Char,
    Short,
    Boolean,
    Void,
    Reference(String),
    Array(Box<JvmType>),
    Null,
    /// Return address pushed by `jsr`.
    Address,
    Unknown,
}

impl JvmType {
    pub fn object() -> Self {
        JvmType::Reference("java/lang/Object".into())
    }

    /// Returns true if this type occupies two slots on the JVM stack.
    pub fn is_wide(&self) -> bool {
        matches!(self, JvmType::Long | JvmType::Double)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, JvmType::Reference(_) | JvmType::Array(_) | JvmType::Null)
    }

    pub fn is_primitive(&self) -> bool {
        !self.is_reference() && !matches!(self, JvmType::Void | JvmType::Address | JvmType::Unknown)
    }

    /// Types the JVM computes with as `int`.
    pub fn is_int_like(&self) -> bool {
        matches!(
            self,
            JvmType::Int | JvmType::Byte | JvmType::Char | JvmType::Short | JvmType::Boolean
        )
    }

    /// Whether a value of type `other` can live in a variable of this type without a
    /// separate declaration.
    pub fn is_compatible(&self, other: &JvmType) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (a, b) if a.is_int_like() && b.is_int_like() => true,
            (a, b) if a.is_reference() && b.is_reference() => true,
            (JvmType::Unknown, _) | (_, JvmType::Unknown) => true,
            _ => false,
        }
    }

    /// True if `self` says less about the value than `other` does.
    pub fn is_less_specific_than(&self, other: &JvmType) -> bool {
        match (self, other) {
            (JvmType::Unknown, o) => *o != JvmType::Unknown,
            (JvmType::Null, o) => o.is_reference() && *o != JvmType::Null,
            (JvmType::Reference(name), JvmType::Reference(o)) => {
                name == "java/lang/Object" && o != "java/lang/Object"
            }
            (JvmType::Reference(name), JvmType::Array(_)) => name == "java/lang/Object",
            (JvmType::Int, o) => o.is_int_like() && *o != JvmType::Int,
            _ => false,
        }
    }

    /// Returns the JVM descriptor string for this type.
    pub fn to_descriptor(&self) -> String {
        match self {
            JvmType::Int => "I".into(),
            JvmType::Long => "J".into(),
            JvmType::Float => "F".into(),
            JvmType::Double => "D".into(),
            JvmType::Byte => "B".into(),
            JvmType::Char => "C".into(),
            JvmType::Short => "S".into(),
            JvmType::Boolean => "Z".into(),
            JvmType::Void => "V".into(),
            JvmType::Reference(name) => format!("L{};", name),
            JvmType::Array(inner) => format!("[{}", inner.to_descriptor()),
            JvmType::Null | JvmType::Address | JvmType::Unknown => "Ljava/lang/Object;".into(),
        }
    }

    /// Java keyword for primitive types.
    pub fn primitive_name(&self) -> Option<&'static str> {
        Some(match self {
            JvmType::Int => "int",
            JvmType::Long => "long",
            JvmType::Float => "float",
            JvmType::Double => "double",
            JvmType::Byte => "byte",
            JvmType::Char => "char",
            JvmType::Short => "short",
            JvmType::Boolean => "boolean",
            JvmType::Void => "void",
            _ => return None,
        })
    }

    /// Returns the simple (unqualified) name for display.
    pub fn simple_name(&self) -> String {
        match self {
            JvmType::Reference(name) => simple_class_name(name).to_string(),
            JvmType::Array(inner) => format!("{}[]", inner.simple_name()),
            JvmType::Null | JvmType::Address | JvmType::Unknown => "Object".into(),
            primitive => primitive.primitive_name().unwrap_or("Object").to_string(),
        }
    }
}

/// Parse a single type descriptor starting at position `pos` in `desc`.
/// Returns (JvmType, next_position).
pub fn parse_type_at(desc: &str, pos: usize) -> Option<(JvmType, usize)> {
    let bytes = desc.as_bytes();
    if pos >= bytes.len() {
        return None;
    }
    match bytes[pos] {
        b'B' => Some((JvmType::Byte, pos + 1)),
        b'C' => Some((JvmType::Char, pos + 1)),
        b'D' => Some((JvmType::Double, pos + 1)),
        b'F' => Some((JvmType::Float, pos + 1)),
        b'I' => Some((JvmType::Int, pos + 1)),
        b'J' => Some((JvmType::Long, pos + 1)),
        b'S' => Some((JvmType::Short, pos + 1)),
        b'Z' => Some((JvmType::Boolean, pos + 1)),
        b'V' => Some((JvmType::Void, pos + 1)),
        b'L' => {
            let semi = desc[pos + 1..].find(';')?;
            let class_name = &desc[pos + 1..pos + 1 + semi];
            Some((JvmType::Reference(class_name.to_string()), pos + 1 + semi + 1))
        }
        b'[' => {
            let (inner, next) = parse_type_at(desc, pos + 1)?;
            Some((JvmType::Array(Box::new(inner)), next))
        }
        _ => None,
    }
}

/// Parse a full type descriptor string.
pub fn parse_type_descriptor(desc: &str) -> Option<JvmType> {
    let (ty, _) = parse_type_at(desc, 0)?;
    Some(ty)
}

/// Parse a method descriptor, e.g. "(II)V" -> ([Int, Int], Void)
pub fn parse_method_descriptor(desc: &str) -> Option<(Vec<JvmType>, JvmType)> {
    if !desc.starts_with('(') {
        return None;
    }
    let close = desc.find(')')?;
    let mut params = Vec::new();
    let mut pos = 1;
    while pos < close {
        let (ty, next) = parse_type_at(desc, pos)?;
        params.push(ty);
        pos = next;
    }
    let (ret, _) = parse_type_at(desc, close + 1)?;
    Some((params, ret))
}

/// Type named by a `Class` constant: an internal name or, for arrays, a descriptor.
pub fn class_constant_type(name: &str) -> JvmType {
    if name.starts_with('[') {
        parse_type_descriptor(name).unwrap_or(JvmType::Unknown)
    } else {
        JvmType::Reference(name.to_string())
    }
}

/// Convert internal class name to source name.
pub fn internal_to_source_name(name: &str) -> String {
    name.replace(['/', '$'], ".")
}

/// Get just the simple class name from an internal name.
pub fn simple_class_name(name: &str) -> &str {
    let name = match name.rfind('/') {
        Some(pos) => &name[pos + 1..],
        None => name,
    };
    match name.rfind('$') {
        Some(pos) if pos + 1 < name.len() => &name[pos + 1..],
        _ => name,
    }
}

/// Get the package from an internal name.
pub fn package_name(name: &str) -> Option<&str> {
    match name.rfind('/') {
        Some(pos) => Some(&name[..pos]),
        None => None,
    }
}

/// Convert a newarray type code to JvmType.
pub fn newarray_type(atype: u8) -> JvmType {
    match atype {
        4 => JvmType::Boolean,
        5 => JvmType::Char,
        6 => JvmType::Float,
        7 => JvmType::Double,
        8 => JvmType::Byte,
        9 => JvmType::Short,
        10 => JvmType::Int,
        11 => JvmType::Long,
        _ => JvmType::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives() {
        assert_eq!(parse_type_descriptor("I"), Some(JvmType::Int));
        assert_eq!(parse_type_descriptor("J"), Some(JvmType::Long));
        assert_eq!(parse_type_descriptor("V"), Some(JvmType::Void));
        assert_eq!(parse_type_descriptor("Q"), None);
    }

    #[test]
    fn test_parse_array() {
        assert_eq!(
            parse_type_descriptor("[[Ljava/lang/Object;"),
            Some(JvmType::Array(Box::new(JvmType::Array(Box::new(
                JvmType::object()
            )))))
        );
        assert_eq!(
            class_constant_type("[I"),
            JvmType::Array(Box::new(JvmType::Int))
        );
    }

    #[test]
    fn test_parse_method_descriptor() {
        let (params, ret) = parse_method_descriptor("(Ljava/lang/String;JI)[B").unwrap();
        assert_eq!(
            params,
            vec![JvmType::Reference("java/lang/String".into()), JvmType::Long, JvmType::Int]
        );
        assert_eq!(ret, JvmType::Array(Box::new(JvmType::Byte)));
        assert!(parse_method_descriptor("II)V").is_none());
    }

    #[test]
    fn test_names() {
        assert_eq!(internal_to_source_name("java/util/Map$Entry"), "java.util.Map.Entry");
        assert_eq!(simple_class_name("java/util/Map$Entry"), "Entry");
        assert_eq!(package_name("java/lang/String"), Some("java/lang"));
        assert_eq!(package_name("NoPackage"), None);
    }

    #[test]
    fn test_specificity() {
        let list = JvmType::Reference("java/util/List".into());
        assert!(JvmType::object().is_less_specific_than(&list));
        assert!(JvmType::Null.is_less_specific_than(&list));
        assert!(!list.is_less_specific_than(&JvmType::object()));
        assert!(JvmType::Int.is_compatible(&JvmType::Boolean));
        assert!(!JvmType::Int.is_compatible(&JvmType::Long));
    }
}

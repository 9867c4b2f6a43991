use std::collections::{BTreeMap, BTreeSet};

use super::descriptor::{package_name, parse_type_descriptor, JvmType};
use crate::constant_info::ConstantPool;

/// The import list of one class and the spelling of every class it refers to.
///
/// Built once from the constant pool before any method is rendered, so every method
/// sees the same names. Classes in `java.lang` and in the class's own package are never
/// imported. When two classes share a simple name, the one registered later is spelled
/// fully qualified.
#[derive(Clone, Debug, Default)]
pub struct Imports {
    this_package: Option<String>,
    display: BTreeMap<String, String>,
    claimed: BTreeMap<String, String>,
    imported: BTreeSet<String>,
}

impl Imports {
    pub fn new(this_class: &str) -> Self {
        let mut imports = Imports {
            this_package: package_name(this_class).map(str::to_string),
            ..Default::default()
        };
        imports.register(this_class);
        imports
    }

    /// Registers every class named by `pool` plus the given extra descriptors or names.
    pub fn from_pool<'a>(
        this_class: &str,
        pool: &'a ConstantPool,
        extra: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut imports = Imports::new(this_class);
        let mut names = BTreeSet::new();
        for text in pool.referenced_types().into_iter().chain(extra) {
            collect_class_names(text, &mut names);
        }
        // names that never need an import claim their simple name first
        let (quiet, loud): (Vec<String>, Vec<String>) =
            names.into_iter().partition(|n| imports.is_implicit(n));
        for name in quiet.iter().chain(loud.iter()) {
            imports.register(name);
        }
        imports
    }

    fn is_implicit(&self, internal: &str) -> bool {
        match package_name(internal) {
            None => true,
            Some("java/lang") => true,
            Some(pkg) => self.this_package.as_deref() == Some(pkg),
        }
    }

    fn register(&mut self, internal: &str) {
        if self.display.contains_key(internal) {
            return;
        }
        let (pkg, rest) = match internal.rfind('/') {
            Some(pos) => (Some(&internal[..pos]), &internal[pos + 1..]),
            None => (None, internal),
        };
        let top = rest.split('$').next().unwrap_or(rest);
        let top_internal = match pkg {
            Some(pkg) => format!("{}/{}", pkg, top),
            None => top.to_string(),
        };
        let nested = rest.replace('$', ".");
        let spelled = match self.claimed.get(top) {
            Some(owner) if *owner != top_internal => internal.replace(['/', '$'], "."),
            _ => {
                self.claimed.insert(top.to_string(), top_internal.clone());
                if !self.is_implicit(internal) {
                    self.imported.insert(top_internal.replace('/', "."));
                }
                nested
            }
        };
        self.display.insert(internal.to_string(), spelled);
    }

    /// Source spelling of an internal class name.
    pub fn class_name(&self, internal: &str) -> String {
        match self.display.get(internal) {
            Some(name) => name.clone(),
            None => internal.replace(['/', '$'], "."),
        }
    }

    /// Source spelling of a type.
    pub fn type_name(&self, ty: &JvmType) -> String {
        match ty {
            JvmType::Reference(name) => self.class_name(name),
            JvmType::Array(inner) => format!("{}[]", self.type_name(inner)),
            JvmType::Null | JvmType::Address | JvmType::Unknown => "Object".into(),
            primitive => primitive.primitive_name().unwrap_or("Object").to_string(),
        }
    }

    /// Fully qualified names to import, sorted.
    pub fn imported(&self) -> impl Iterator<Item = &str> {
        self.imported.iter().map(String::as_str)
    }
}

/// Adds every class named in an internal name or a (field or method) descriptor.
fn collect_class_names(text: &str, out: &mut BTreeSet<String>) {
    if text.starts_with('(') || text.starts_with('[') || (text.starts_with('L') && text.ends_with(';')) {
        let bytes = text.as_bytes();
        let mut pos = 0;
        while pos < bytes.len() {
            if bytes[pos] == b'L' {
                match text[pos + 1..].find(';') {
                    Some(len) => {
                        out.insert(text[pos + 1..pos + 1 + len].to_string());
                        pos += len + 2;
                    }
                    None => break,
                }
            } else {
                pos += 1;
            }
        }
    } else if text.len() > 1
        && parse_type_descriptor(text).map_or(true, |t| matches!(t, JvmType::Reference(_)))
    {
        out.insert(text.to_string());
    }
}

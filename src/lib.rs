//! Reverse engineers [Java Classfiles](https://docs.oracle.com/javase/specs/jvms/se10/html/jvms-4.html)
//! into Java-like source, or into annotated bytecode listings.

#[macro_use]
extern crate bitflags;

pub mod attribute_info;
pub mod class_info;
pub mod code_attribute;
pub mod constant_info;
pub mod decompile;
pub mod error;
pub mod field_info;
pub mod method_info;
pub mod source;
pub mod types;

use std::path::Path;

pub use class_info::{ClassInfo, Code, ExceptionEntry, Field, LocalVariable, Method};
pub use decompile::method::{MethodBody, MethodDecompiler};
pub use decompile::serializer::{serialize, ClassSerializer, DecompileOptions};
pub use error::{ClassParserError, Error, Result, RevEngineError};
pub use types::{ClassAccessFlags, ClassFile};

/// Decompile a class file held in memory.
///
/// ```rust
/// let result = jreverse::decompile_bytes(b"this_will_be_parsed_as_classfile", &Default::default());
/// assert!(result.is_err());
/// ```
pub fn decompile_bytes(bytes: &[u8], options: &DecompileOptions) -> Result<String> {
    let class = source::load_bytes(bytes)?;
    Ok(serialize(&class, options))
}

/// Decompile the class file at `path`.
pub fn decompile_file(path: impl AsRef<Path>, options: &DecompileOptions) -> Result<String> {
    let class = source::load_path(path)?;
    Ok(serialize(&class, options))
}

/// Decompile a class given by URL, see [`source::load_url`].
pub fn decompile_url(url: &str, options: &DecompileOptions) -> Result<String> {
    let class = source::load_url(url)?;
    Ok(serialize(&class, options))
}

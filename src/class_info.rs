use std::cell::OnceCell;
use std::io::Cursor;

use binrw::BinRead;
use log::debug;

use crate::attribute_info::{
    code_attribute_parser, constant_value_attribute_parser, exceptions_attribute_parser,
    interpret, local_variable_table_attribute_parser, sourcefile_attribute_parser, AttributeInfo,
    CodeAttribute,
};
use crate::code_attribute::{normalize, Instruction};
use crate::constant_info::{ConstantPool, Literal};
use crate::decompile::descriptor::{
    package_name, parse_method_descriptor, parse_type_descriptor, simple_class_name, JvmType,
};
use crate::error::{ClassParserError, RevEngineError};
use crate::field_info::{FieldAccessFlags, FieldInfo};
use crate::method_info::{MethodAccessFlags, MethodInfo};
use crate::types::{ClassAccessFlags, ClassFile};

/// A parsed class with every constant-pool reference it needs resolved.
#[derive(Clone, Debug)]
pub struct ClassInfo {
    /// Internal name, e.g. `java/util/ArrayList`.
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub access_flags: ClassAccessFlags,
    pub major_version: u16,
    pub minor_version: u16,
    pub source_file: Option<String>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub pool: ConstantPool,
}

#[derive(Clone, Debug)]
pub struct Field {
    pub access_flags: FieldAccessFlags,
    pub name: String,
    pub descriptor: String,
    pub ty: JvmType,
    /// Initializer from the `ConstantValue` attribute.
    pub constant_value: Option<Literal>,
}

/// A method and its code. Instructions are normalized on first use and cached.
#[derive(Clone, Debug)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name: String,
    pub descriptor: String,
    pub params: Vec<JvmType>,
    pub return_type: JvmType,
    pub code: Option<Code>,
    /// Classes named by the `Exceptions` attribute.
    pub throws: Vec<String>,
    instructions: OnceCell<Vec<Instruction>>,
}

#[derive(Clone, Debug)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub bytes: Vec<u8>,
    pub exceptions: Vec<ExceptionEntry>,
    pub local_variables: Vec<LocalVariable>,
}

/// One exception-table row. `catch_type` is `None` for a catch-all handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExceptionEntry {
    pub start_pc: usize,
    pub end_pc: usize,
    pub handler_pc: usize,
    pub catch_type: Option<String>,
}

/// One `LocalVariableTable` row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalVariable {
    pub start_pc: usize,
    pub length: usize,
    pub name: String,
    pub ty: JvmType,
    pub slot: u16,
}

impl ClassInfo {
    pub fn parse(bytes: &[u8]) -> Result<Self, ClassParserError> {
        let raw = ClassFile::read(&mut Cursor::new(bytes))?;
        ClassInfo::from_raw(raw)
    }

    pub fn from_raw(raw: ClassFile) -> Result<Self, ClassParserError> {
        let pool = ConstantPool::new(raw.const_pool);
        let this_class = pool.class_name(raw.this_class)?.to_string();
        let super_class = match raw.super_class {
            0 => None,
            index => Some(pool.class_name(index)?.to_string()),
        };
        let interfaces = raw
            .interfaces
            .iter()
            .map(|&i| pool.class_name(i).map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?;
        let mut source_file = None;
        if let Some(attr) = find_attribute(&pool, &raw.attributes, "SourceFile") {
            let parsed = interpret(&attr.info, "SourceFile", sourcefile_attribute_parser)?;
            source_file = Some(pool.utf8(parsed.sourcefile_index)?.to_string());
        }
        let fields = raw
            .fields
            .iter()
            .map(|f| Field::from_raw(&pool, f))
            .collect::<Result<Vec<_>, _>>()?;
        let methods = raw
            .methods
            .iter()
            .map(|m| Method::from_raw(&pool, m))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "parsed {}: {} fields, {} methods, {} constants",
            this_class,
            fields.len(),
            methods.len(),
            pool.len()
        );
        Ok(ClassInfo {
            this_class,
            super_class,
            interfaces,
            access_flags: raw.access_flags,
            major_version: raw.major_version,
            minor_version: raw.minor_version,
            source_file,
            fields,
            methods,
            pool,
        })
    }

    pub fn is_interface(&self) -> bool {
        self.access_flags.contains(ClassAccessFlags::INTERFACE)
    }

    pub fn package(&self) -> Option<&str> {
        package_name(&self.this_class)
    }

    pub fn simple_name(&self) -> &str {
        simple_class_name(&self.this_class)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }
}

fn find_attribute<'r>(
    pool: &ConstantPool,
    attributes: &'r [AttributeInfo],
    name: &str,
) -> Option<&'r AttributeInfo> {
    attributes
        .iter()
        .find(|a| pool.utf8(a.attribute_name_index).is_ok_and(|n| n == name))
}

impl Field {
    fn from_raw(pool: &ConstantPool, raw: &FieldInfo) -> Result<Self, ClassParserError> {
        let name = pool.utf8(raw.name_index)?.to_string();
        let descriptor = pool.utf8(raw.descriptor_index)?.to_string();
        let ty = parse_type_descriptor(&descriptor)
            .ok_or_else(|| ClassParserError::Descriptor(descriptor.clone()))?;
        let constant_value = match find_attribute(pool, &raw.attributes, "ConstantValue") {
            Some(attr) => {
                let parsed = interpret(&attr.info, "ConstantValue", constant_value_attribute_parser)?;
                Some(pool.literal(parsed.constant_value_index)?)
            }
            None => None,
        };
        Ok(Field {
            access_flags: raw.access_flags,
            name,
            descriptor,
            ty,
            constant_value,
        })
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(FieldAccessFlags::STATIC)
    }
}

impl Method {
    fn from_raw(pool: &ConstantPool, raw: &MethodInfo) -> Result<Self, ClassParserError> {
        let name = pool.utf8(raw.name_index)?.to_string();
        let descriptor = pool.utf8(raw.descriptor_index)?.to_string();
        let (params, return_type) = parse_method_descriptor(&descriptor)
            .ok_or_else(|| ClassParserError::Descriptor(descriptor.clone()))?;
        let code = match find_attribute(pool, &raw.attributes, "Code") {
            Some(attr) => Some(Code::from_raw(
                pool,
                interpret(&attr.info, "Code", code_attribute_parser)?,
            )?),
            None => None,
        };
        let throws = match find_attribute(pool, &raw.attributes, "Exceptions") {
            Some(attr) => interpret(&attr.info, "Exceptions", exceptions_attribute_parser)?
                .exception_table
                .iter()
                .map(|&i| pool.class_name(i).map(str::to_string))
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        Ok(Method {
            access_flags: raw.access_flags,
            name,
            descriptor,
            params,
            return_type,
            code,
            throws,
            instructions: OnceCell::new(),
        })
    }

    /// A method built directly rather than read from a class file.
    pub fn new(access_flags: MethodAccessFlags, name: &str, descriptor: &str, code: Option<Code>) -> Option<Self> {
        let (params, return_type) = parse_method_descriptor(descriptor)?;
        Some(Method {
            access_flags,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            params,
            return_type,
            code,
            throws: Vec::new(),
            instructions: OnceCell::new(),
        })
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    pub fn is_abstract(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::ABSTRACT)
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_static_initializer(&self) -> bool {
        self.name == "<clinit>"
    }

    /// The normalized instruction list; empty for methods without code.
    pub fn instructions(&self) -> Result<&[Instruction], RevEngineError> {
        if let Some(list) = self.instructions.get() {
            return Ok(list);
        }
        let list = match &self.code {
            Some(code) => normalize(&code.bytes)?,
            None => Vec::new(),
        };
        debug!("{}{}: {} instructions", self.name, self.descriptor, list.len());
        Ok(self.instructions.get_or_init(|| list))
    }
}

impl Code {
    fn from_raw(pool: &ConstantPool, raw: CodeAttribute) -> Result<Self, ClassParserError> {
        let exceptions = raw
            .exception_table
            .iter()
            .map(|e| {
                let catch_type = match e.catch_type {
                    0 => None,
                    index => Some(pool.class_name(index)?.to_string()),
                };
                Ok(ExceptionEntry {
                    start_pc: usize::from(e.start_pc),
                    end_pc: usize::from(e.end_pc),
                    handler_pc: usize::from(e.handler_pc),
                    catch_type,
                })
            })
            .collect::<Result<Vec<_>, ClassParserError>>()?;
        let mut local_variables = Vec::new();
        if let Some(attr) = find_attribute(pool, &raw.attributes, "LocalVariableTable") {
            let table = interpret(&attr.info, "LocalVariableTable", local_variable_table_attribute_parser)?;
            for item in table.items {
                local_variables.push(LocalVariable {
                    start_pc: usize::from(item.start_pc),
                    length: usize::from(item.length),
                    name: pool.utf8(item.name_index)?.to_string(),
                    ty: parse_type_descriptor(pool.utf8(item.descriptor_index)?)
                        .unwrap_or(JvmType::Unknown),
                    slot: item.index,
                });
            }
        }
        Ok(Code {
            max_stack: raw.max_stack,
            max_locals: raw.max_locals,
            bytes: raw.code,
            exceptions,
            local_variables,
        })
    }
}

//! Assembles small class files for the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_ABSTRACT: u16 = 0x0400;

/// Body of a `Code` attribute. Class and type names are resolved into the pool when
/// the method is added.
pub struct CodeSpec {
    max_stack: u16,
    max_locals: u16,
    code: Vec<u8>,
    catches: Vec<(u16, u16, u16, Option<String>)>,
    locals: Vec<(u16, u16, String, String, u16)>,
}

impl CodeSpec {
    pub fn new(max_stack: u16, max_locals: u16, code: &[u8]) -> Self {
        CodeSpec {
            max_stack,
            max_locals,
            code: code.to_vec(),
            catches: Vec::new(),
            locals: Vec::new(),
        }
    }

    pub fn catch(mut self, start: u16, end: u16, handler: u16, class: Option<&str>) -> Self {
        self.catches.push((start, end, handler, class.map(str::to_string)));
        self
    }

    pub fn local(mut self, start: u16, length: u16, name: &str, descriptor: &str, slot: u16) -> Self {
        self.locals
            .push((start, length, name.to_string(), descriptor.to_string(), slot));
        self
    }
}

pub struct ClassBuilder {
    pool: Vec<Vec<u8>>,
    known: HashMap<String, u16>,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<Vec<u8>>,
    methods: Vec<Vec<u8>>,
    attributes: Vec<Vec<u8>>,
}

fn u16_bytes(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn u32_bytes(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

impl ClassBuilder {
    pub fn new(this_class: &str, super_class: &str) -> Self {
        let mut builder = ClassBuilder {
            pool: Vec::new(),
            known: HashMap::new(),
            access_flags: ACC_PUBLIC | ACC_SUPER,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        };
        builder.this_class = builder.class(this_class);
        builder.super_class = builder.class(super_class);
        builder
    }

    pub fn access_flags(mut self, flags: u16) -> Self {
        self.access_flags = flags;
        self
    }

    fn constant(&mut self, key: String, bytes: Vec<u8>) -> u16 {
        if let Some(&index) = self.known.get(&key) {
            return index;
        }
        self.pool.push(bytes);
        let index = self.pool.len() as u16;
        self.known.insert(key, index);
        index
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        let mut bytes = vec![1];
        u16_bytes(&mut bytes, text.len() as u16);
        bytes.extend_from_slice(text.as_bytes());
        self.constant(format!("utf8:{}", text), bytes)
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        let mut bytes = vec![3];
        bytes.extend_from_slice(&value.to_be_bytes());
        self.constant(format!("int:{}", value), bytes)
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        let mut bytes = vec![7];
        u16_bytes(&mut bytes, name_index);
        self.constant(format!("class:{}", name), bytes)
    }

    pub fn string(&mut self, text: &str) -> u16 {
        let utf8 = self.utf8(text);
        let mut bytes = vec![8];
        u16_bytes(&mut bytes, utf8);
        self.constant(format!("string:{}", text), bytes)
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut bytes = vec![12];
        u16_bytes(&mut bytes, name_index);
        u16_bytes(&mut bytes, descriptor_index);
        self.constant(format!("nat:{}:{}", name, descriptor), bytes)
    }

    fn member(&mut self, tag: u8, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class);
        let nat = self.name_and_type(name, descriptor);
        let mut bytes = vec![tag];
        u16_bytes(&mut bytes, class_index);
        u16_bytes(&mut bytes, nat);
        self.constant(format!("member{}:{}.{}:{}", tag, class, name, descriptor), bytes)
    }

    pub fn field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.member(9, class, name, descriptor)
    }

    pub fn method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.member(10, class, name, descriptor)
    }

    pub fn interface_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        self.member(11, class, name, descriptor)
    }

    pub fn interface(mut self, name: &str) -> Self {
        let index = self.class(name);
        self.interfaces.push(index);
        self
    }

    fn attribute(&mut self, name: &str, info: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        u16_bytes(&mut out, self.utf8(name));
        u32_bytes(&mut out, info.len() as u32);
        out.extend_from_slice(info);
        out
    }

    pub fn source_file(mut self, name: &str) -> Self {
        let mut info = Vec::new();
        u16_bytes(&mut info, self.utf8(name));
        let attr = self.attribute("SourceFile", &info);
        self.attributes.push(attr);
        self
    }

    pub fn field(&mut self, flags: u16, name: &str, descriptor: &str, constant: Option<u16>) {
        let mut out = Vec::new();
        u16_bytes(&mut out, flags);
        u16_bytes(&mut out, self.utf8(name));
        u16_bytes(&mut out, self.utf8(descriptor));
        match constant {
            Some(index) => {
                u16_bytes(&mut out, 1);
                let attr = self.attribute("ConstantValue", &index.to_be_bytes());
                out.extend(attr);
            }
            None => u16_bytes(&mut out, 0),
        }
        self.fields.push(out);
    }

    pub fn method(&mut self, flags: u16, name: &str, descriptor: &str, code: Option<CodeSpec>) {
        self.method_throws(flags, name, descriptor, code, &[]);
    }

    pub fn method_throws(
        &mut self,
        flags: u16,
        name: &str,
        descriptor: &str,
        code: Option<CodeSpec>,
        throws: &[&str],
    ) {
        let mut out = Vec::new();
        u16_bytes(&mut out, flags);
        u16_bytes(&mut out, self.utf8(name));
        u16_bytes(&mut out, self.utf8(descriptor));
        let mut attributes = Vec::new();
        if let Some(code) = code {
            attributes.push(self.code_attribute(code));
        }
        if !throws.is_empty() {
            let mut info = Vec::new();
            u16_bytes(&mut info, throws.len() as u16);
            for class in throws {
                u16_bytes(&mut info, self.class(class));
            }
            attributes.push(self.attribute("Exceptions", &info));
        }
        u16_bytes(&mut out, attributes.len() as u16);
        for attr in attributes {
            out.extend(attr);
        }
        self.methods.push(out);
    }

    fn code_attribute(&mut self, code: CodeSpec) -> Vec<u8> {
        let mut info = Vec::new();
        u16_bytes(&mut info, code.max_stack);
        u16_bytes(&mut info, code.max_locals);
        u32_bytes(&mut info, code.code.len() as u32);
        info.extend_from_slice(&code.code);
        u16_bytes(&mut info, code.catches.len() as u16);
        for (start, end, handler, class) in &code.catches {
            u16_bytes(&mut info, *start);
            u16_bytes(&mut info, *end);
            u16_bytes(&mut info, *handler);
            let catch_type = match class {
                Some(class) => self.class(class),
                None => 0,
            };
            u16_bytes(&mut info, catch_type);
        }
        if code.locals.is_empty() {
            u16_bytes(&mut info, 0);
        } else {
            u16_bytes(&mut info, 1);
            let mut table = Vec::new();
            u16_bytes(&mut table, code.locals.len() as u16);
            for (start, length, name, descriptor, slot) in &code.locals {
                u16_bytes(&mut table, *start);
                u16_bytes(&mut table, *length);
                u16_bytes(&mut table, self.utf8(name));
                u16_bytes(&mut table, self.utf8(descriptor));
                u16_bytes(&mut table, *slot);
            }
            let attr = self.attribute("LocalVariableTable", &table);
            info.extend(attr);
        }
        self.attribute("Code", &info)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0xca, 0xfe, 0xba, 0xbe];
        u16_bytes(&mut out, 0);
        u16_bytes(&mut out, 52);
        u16_bytes(&mut out, self.pool.len() as u16 + 1);
        for entry in &self.pool {
            out.extend_from_slice(entry);
        }
        u16_bytes(&mut out, self.access_flags);
        u16_bytes(&mut out, self.this_class);
        u16_bytes(&mut out, self.super_class);
        u16_bytes(&mut out, self.interfaces.len() as u16);
        for index in &self.interfaces {
            u16_bytes(&mut out, *index);
        }
        for section in [&self.fields, &self.methods, &self.attributes] {
            u16_bytes(&mut out, section.len() as u16);
            for item in section.iter() {
                out.extend_from_slice(item);
            }
        }
        out
    }
}

use log::{debug, warn};

use crate::class_info::{ClassInfo, Field, Method};
use crate::error::RevEngineError;
use crate::field_info::FieldAccessFlags;
use crate::method_info::MethodAccessFlags;
use crate::types::ClassAccessFlags;

use super::descriptor::JvmType;
use super::disassembler::{disassemble, exception_table};
use super::imports::Imports;
use super::method::{MethodBody, MethodDecompiler};
use super::operand::Operand;

/// Instructions listed under a method that failed to decompile.
const FAILURE_LISTING_LIMIT: usize = 20;

/// Options controlling how a class is written out.
#[derive(Clone, Debug)]
pub struct DecompileOptions {
    /// Write bytecode listings instead of decompiled bodies.
    pub get_bytecode: bool,
    /// Add max locals, max stack and exception-table comments to every method.
    pub include_metadata: bool,
    /// Append the bytecode range each statement came from.
    pub annotate_offsets: bool,
    pub indent: String,
    /// List the bytecode of a method that failed to decompile.
    pub fallback_to_bytecode: bool,
}

impl Default for DecompileOptions {
    fn default() -> Self {
        Self {
            get_bytecode: false,
            include_metadata: false,
            annotate_offsets: false,
            indent: "    ".into(),
            fallback_to_bytecode: true,
        }
    }
}

/// Writes one class: header comment, package, imports, declaration, fields and methods.
pub struct ClassSerializer<'a> {
    class: &'a ClassInfo,
    options: &'a DecompileOptions,
    imports: Imports,
    output: String,
}

impl<'a> ClassSerializer<'a> {
    pub fn new(class: &'a ClassInfo, options: &'a DecompileOptions) -> Self {
        let mut extra = Vec::new();
        extra.extend(class.super_class.iter().cloned());
        extra.extend(class.interfaces.iter().cloned());
        extra.extend(class.fields.iter().map(|f| f.descriptor.clone()));
        for method in &class.methods {
            extra.push(method.descriptor.clone());
            extra.extend(method.throws.iter().cloned());
            if let Some(code) = &method.code {
                extra.extend(code.exceptions.iter().filter_map(|e| e.catch_type.clone()));
                extra.extend(code.local_variables.iter().map(|v| v.ty.to_descriptor()));
            }
        }
        let imports = Imports::from_pool(&class.this_class, &class.pool, extra.iter().map(String::as_str));
        Self {
            class,
            options,
            imports,
            output: String::new(),
        }
    }

    pub fn serialize(mut self) -> String {
        self.write_header();
        self.write_declaration();
        let class = self.class;
        let fields: Vec<&Field> = class
            .fields
            .iter()
            .filter(|f| !f.access_flags.contains(FieldAccessFlags::SYNTHETIC))
            .collect();
        for field in &fields {
            let line = self.field_declaration(field);
            self.writeln(1, &line);
        }
        let methods = class
            .methods
            .iter()
            .filter(|m| !m.access_flags.contains(MethodAccessFlags::SYNTHETIC));
        for (i, method) in methods.enumerate() {
            if i > 0 || !fields.is_empty() {
                self.newline();
            }
            self.write_method(method);
        }
        self.writeln(0, "}");
        self.output
    }

    fn writeln(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.output.push_str(&self.options.indent);
        }
        self.output.push_str(text);
        self.output.push('\n');
    }

    fn newline(&mut self) {
        self.output.push('\n');
    }

    fn write_header(&mut self) {
        let class = self.class;
        self.writeln(0, &format!("// Decompiled by jreverse {}", env!("CARGO_PKG_VERSION")));
        self.writeln(
            0,
            &format!("// Class version: {}.{}", class.major_version, class.minor_version),
        );
        if let Some(source) = &class.source_file {
            self.writeln(0, &format!("// Source file: {}", source));
        }
        self.newline();
        if let Some(package) = class.package() {
            self.writeln(0, &format!("package {};", package.replace('/', ".")));
            self.newline();
        }
        let imports: Vec<String> = self.imports.imported().map(str::to_string).collect();
        if !imports.is_empty() {
            for import in &imports {
                self.writeln(0, &format!("import {};", import));
            }
            self.newline();
        }
    }

    fn write_declaration(&mut self) {
        let class = self.class;
        let flags = class.access_flags;
        let mut decl = String::new();
        if flags.contains(ClassAccessFlags::PUBLIC) {
            decl.push_str("public ");
        }
        if class.is_interface() {
            decl.push_str("interface ");
        } else {
            if flags.contains(ClassAccessFlags::ABSTRACT) {
                decl.push_str("abstract ");
            }
            if flags.contains(ClassAccessFlags::FINAL) {
                decl.push_str("final ");
            }
            decl.push_str("class ");
        }
        decl.push_str(class.simple_name());

        let interfaces: Vec<String> = class
            .interfaces
            .iter()
            .map(|i| self.imports.class_name(i))
            .collect();
        if class.is_interface() {
            if !interfaces.is_empty() {
                decl.push_str(" extends ");
                decl.push_str(&interfaces.join(", "));
            }
        } else {
            if let Some(parent) = class
                .super_class
                .as_deref()
                .filter(|s| *s != "java/lang/Object")
            {
                decl.push_str(" extends ");
                decl.push_str(&self.imports.class_name(parent));
            }
            if !interfaces.is_empty() {
                decl.push_str(" implements ");
                decl.push_str(&interfaces.join(", "));
            }
        }
        decl.push_str(" {");
        self.writeln(0, &decl);
        self.newline();
    }

    fn field_declaration(&self, field: &Field) -> String {
        let flags = field.access_flags;
        let mut decl = String::new();
        for (flag, word) in [
            (FieldAccessFlags::PUBLIC, "public "),
            (FieldAccessFlags::PRIVATE, "private "),
            (FieldAccessFlags::PROTECTED, "protected "),
            (FieldAccessFlags::STATIC, "static "),
            (FieldAccessFlags::FINAL, "final "),
            (FieldAccessFlags::TRANSIENT, "transient "),
            (FieldAccessFlags::VOLATILE, "volatile "),
        ] {
            if flags.contains(flag) {
                decl.push_str(word);
            }
        }
        decl.push_str(&self.imports.type_name(&field.ty));
        decl.push(' ');
        decl.push_str(&field.name);
        if let Some(value) = &field.constant_value {
            let init = Operand::atom(value.to_source(), JvmType::Int).coerced(&field.ty);
            decl.push_str(" = ");
            decl.push_str(&init);
        }
        decl.push(';');
        decl
    }

    fn method_declaration(&self, method: &Method, params: &[String]) -> String {
        if method.is_static_initializer() {
            return "static".into();
        }
        let flags = method.access_flags;
        let mut decl = String::new();
        for (flag, word) in [
            (MethodAccessFlags::PUBLIC, "public "),
            (MethodAccessFlags::PRIVATE, "private "),
            (MethodAccessFlags::PROTECTED, "protected "),
            (MethodAccessFlags::ABSTRACT, "abstract "),
            (MethodAccessFlags::STATIC, "static "),
            (MethodAccessFlags::FINAL, "final "),
            (MethodAccessFlags::SYNCHRONIZED, "synchronized "),
            (MethodAccessFlags::NATIVE, "native "),
        ] {
            if flag == MethodAccessFlags::ABSTRACT && self.class.is_interface() {
                continue;
            }
            if flags.contains(flag) {
                decl.push_str(word);
            }
        }
        if method.is_constructor() {
            decl.push_str(self.class.simple_name());
        } else {
            decl.push_str(&self.imports.type_name(&method.return_type));
            decl.push(' ');
            decl.push_str(&method.name);
        }

        let varargs = flags.contains(MethodAccessFlags::VARARGS);
        let args: Vec<String> = method
            .params
            .iter()
            .zip(params)
            .enumerate()
            .map(|(i, (ty, name))| match ty {
                JvmType::Array(elem) if varargs && i + 1 == method.params.len() => {
                    format!("{}... {}", self.imports.type_name(elem), name)
                }
                _ => format!("{} {}", self.imports.type_name(ty), name),
            })
            .collect();
        decl.push('(');
        decl.push_str(&args.join(", "));
        decl.push(')');
        if !method.throws.is_empty() {
            let throws: Vec<String> = method
                .throws
                .iter()
                .map(|t| self.imports.class_name(t))
                .collect();
            decl.push_str(" throws ");
            decl.push_str(&throws.join(", "));
        }
        decl
    }

    fn write_method(&mut self, method: &Method) {
        let decompiler = MethodDecompiler::new(self.class, &self.imports);
        let body = if self.options.get_bytecode || method.code.is_none() {
            Ok(MethodBody {
                params: decompiler.arguments(method),
                lines: Vec::new(),
            })
        } else {
            decompiler.decompile(method)
        };
        let params = match &body {
            Ok(body) => body.params.clone(),
            Err(_) => decompiler.arguments(method),
        };
        let decl = self.method_declaration(method, &params);
        if method.code.is_none() {
            self.writeln(1, &format!("{};", decl));
            return;
        }
        self.writeln(1, &format!("{} {{", decl));
        if self.options.include_metadata {
            self.write_metadata(method);
        }
        match body {
            Ok(_) if self.options.get_bytecode => self.write_listing(method, None),
            Ok(body) => {
                for line in &body.lines {
                    let text = if self.options.annotate_offsets && line.text.ends_with(';') {
                        format!("{} // pc {}-{}", line.text, line.start_pc, line.end_pc)
                    } else {
                        line.text.clone()
                    };
                    self.writeln(line.depth + 2, &text);
                }
            }
            Err(err) => {
                warn!(
                    "failed to decompile {}.{}{}: {}",
                    self.class.this_class, method.name, method.descriptor, err
                );
                self.writeln(2, &format!("// decompilation failed: {}", err));
                if self.options.fallback_to_bytecode {
                    self.write_listing(method, Some(FAILURE_LISTING_LIMIT));
                }
            }
        }
        self.writeln(1, "}");
    }

    fn write_metadata(&mut self, method: &Method) {
        let Some(code) = &method.code else {
            return;
        };
        self.writeln(
            2,
            &format!("// max_locals: {}, max_stack: {}", code.max_locals, code.max_stack),
        );
        for line in exception_table(&code.exceptions) {
            self.writeln(2, &line);
        }
    }

    /// Bytecode listing of a method, commented out when it is limited.
    fn write_listing(&mut self, method: &Method, limit: Option<usize>) {
        let listing = method
            .instructions()
            .and_then(|list| disassemble(list, &self.class.pool));
        let lines = match listing {
            Ok(lines) => lines,
            Err(err) => {
                self.disassembly_failed(method, err);
                return;
            }
        };
        debug!("{}: {} listing lines", method.name, lines.len());
        match limit {
            None => {
                for line in &lines {
                    self.writeln(2, line);
                }
            }
            Some(limit) => {
                for line in lines.iter().take(limit) {
                    self.writeln(2, &format!("// {}", line));
                }
                if lines.len() > limit {
                    self.writeln(2, &format!("// ... ({} more lines)", lines.len() - limit));
                }
            }
        }
    }

    fn disassembly_failed(&mut self, method: &Method, err: RevEngineError) {
        warn!(
            "failed to disassemble {}.{}{}: {}",
            self.class.this_class, method.name, method.descriptor, err
        );
        self.writeln(2, &format!("// disassembly failed: {}", err));
    }
}

/// Writes `class` as Java-like source, or as a bytecode listing with
/// [`DecompileOptions::get_bytecode`].
pub fn serialize(class: &ClassInfo, options: &DecompileOptions) -> String {
    ClassSerializer::new(class, options).serialize()
}

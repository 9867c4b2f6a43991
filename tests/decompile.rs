mod common;

use common::*;
use jreverse::decompile::branch::{BranchEntry, BranchKind};
use jreverse::decompile::branch_builder::BranchAnalysis;
use jreverse::decompile::imports::Imports;
use jreverse::decompile::symtab::SymbolTable;
use jreverse::{decompile_bytes, ClassInfo, DecompileOptions, Error, MethodDecompiler};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn split(index: u16) -> (u8, u8) {
    let [hi, lo] = index.to_be_bytes();
    (hi, lo)
}

/// `com.acme.Sample`: constants, a constructor and one method per control-flow shape.
fn sample_class() -> Vec<u8> {
    let mut b = ClassBuilder::new("com/acme/Sample", "java/lang/Object").source_file("Sample.java");
    let limit = b.integer(10);
    b.field(ACC_PUBLIC | ACC_STATIC | ACC_FINAL, "LIMIT", "I", Some(limit));
    let one = b.integer(1);
    b.field(ACC_STATIC | ACC_FINAL, "DEBUG", "Z", Some(one));
    b.field(0x0002, "name", "Ljava/lang/String;", None);

    let (hi, lo) = split(b.method_ref("java/lang/Object", "<init>", "()V"));
    b.method(
        ACC_PUBLIC,
        "<init>",
        "()V",
        Some(CodeSpec::new(1, 1, &[0x2a, 0xb7, hi, lo, 0xb1])),
    );

    // return i + j
    b.method(
        ACC_PUBLIC | ACC_STATIC,
        "add",
        "(II)I",
        Some(CodeSpec::new(2, 2, &[0x1a, 0x1b, 0x60, 0xac])),
    );

    // return a > b ? a : b
    b.method(
        ACC_PUBLIC | ACC_STATIC,
        "max",
        "(II)I",
        Some(
            CodeSpec::new(
                2,
                2,
                &[0x1a, 0x1b, 0xa4, 0x00, 0x07, 0x1a, 0xa7, 0x00, 0x04, 0x1b, 0xac],
            )
            .local(0, 11, "a", "I", 0)
            .local(0, 11, "b", "I", 1),
        ),
    );

    // if (x > 0) r = 1; else r = -1; return r;
    b.method(
        ACC_PUBLIC | ACC_STATIC,
        "sign",
        "(I)I",
        Some(
            CodeSpec::new(
                1,
                2,
                &[0x1a, 0x9e, 0x00, 0x08, 0x04, 0x3c, 0xa7, 0x00, 0x05, 0x02, 0x3c, 0x1b, 0xac],
            )
            .local(0, 13, "x", "I", 0),
        ),
    );

    // loop test at the top, closed by a backward goto
    b.method(
        ACC_PUBLIC | ACC_STATIC,
        "sum",
        "(I)I",
        Some(
            CodeSpec::new(
                2,
                3,
                &[
                    0x03, 0x3c, 0x03, 0x3d, 0x1c, 0x1a, 0xa2, 0x00, 0x0d, 0x1b, 0x1c, 0x60, 0x3c,
                    0x84, 0x02, 0x01, 0xa7, 0xff, 0xf4, 0x1b, 0xac,
                ],
            )
            .local(0, 21, "n", "I", 0)
            .local(2, 19, "s", "I", 1)
            .local(4, 17, "k", "I", 2),
        ),
    );

    // loop entered through a goto to the test at the bottom
    b.method(
        ACC_PUBLIC | ACC_STATIC,
        "spin",
        "(I)V",
        Some(
            CodeSpec::new(
                2,
                2,
                &[0x03, 0x3c, 0xa7, 0x00, 0x06, 0x84, 0x01, 0x01, 0x1b, 0x1a, 0xa1, 0xff, 0xfb, 0xb1],
            )
            .local(0, 14, "n", "I", 0)
            .local(2, 12, "k", "I", 1),
        ),
    );

    b.method_throws(
        ACC_PUBLIC | ACC_STATIC,
        "work",
        "()V",
        Some(CodeSpec::new(0, 0, &[0xb1])),
        &["java/io/IOException"],
    );

    let (whi, wlo) = split(b.method_ref("com/acme/Sample", "work", "()V"));
    let (phi, plo) = split(b.method_ref("java/io/IOException", "printStackTrace", "()V"));
    b.method(
        ACC_PUBLIC | ACC_STATIC,
        "risky",
        "()V",
        Some(
            CodeSpec::new(
                1,
                1,
                &[0xb8, whi, wlo, 0xa7, 0x00, 0x08, 0x4b, 0x2a, 0xb6, phi, plo, 0xb1],
            )
            .catch(0, 3, 6, Some("java/io/IOException"))
            .local(7, 4, "e", "Ljava/io/IOException;", 0),
        ),
    );

    // switch (k) { case 1: return 10; case 2: return 20; } return 0;
    let mut pick = vec![0x1a, 0xaa, 0x00, 0x00];
    for word in [29i32, 1, 2, 23, 26] {
        pick.extend_from_slice(&word.to_be_bytes());
    }
    pick.extend_from_slice(&[0x10, 0x0a, 0xac, 0x10, 0x14, 0xac, 0x03, 0xac]);
    b.method(
        ACC_PUBLIC | ACC_STATIC,
        "pick",
        "(I)I",
        Some(CodeSpec::new(1, 1, &pick).local(0, 32, "k", "I", 0)),
    );

    // pops an empty stack
    b.method(
        ACC_PUBLIC | ACC_STATIC,
        "broken",
        "()V",
        Some(CodeSpec::new(1, 0, &[0x57, 0xb1])),
    );

    // two handlers storing into the same slot
    let (rhi, rlo) = split(b.method_ref("java/lang/RuntimeException", "printStackTrace", "()V"));
    let recover = [
        0xb8, whi, wlo, 0xa7, 0x00, 0x10, 0x4b, 0x2a, 0xb6, phi, plo, 0xa7, 0x00, 0x08, 0x4b, 0x2a,
        0xb6, rhi, rlo, 0xb1,
    ];
    b.method(
        ACC_PUBLIC | ACC_STATIC,
        "recover",
        "()V",
        Some(
            CodeSpec::new(1, 1, &recover)
                .catch(0, 3, 6, Some("java/io/IOException"))
                .catch(0, 3, 14, Some("java/lang/RuntimeException"))
                .local(7, 4, "e", "Ljava/io/IOException;", 0)
                .local(15, 4, "e", "Ljava/lang/RuntimeException;", 0),
        ),
    );
    b.method(
        ACC_PUBLIC | ACC_STATIC,
        "recoverQuietly",
        "()V",
        Some(
            CodeSpec::new(1, 1, &recover)
                .catch(0, 3, 6, Some("java/io/IOException"))
                .catch(0, 3, 14, Some("java/lang/RuntimeException")),
        ),
    );

    // one handler for two exception types
    b.method(
        ACC_PUBLIC | ACC_STATIC,
        "either",
        "()V",
        Some(
            CodeSpec::new(
                1,
                1,
                &[0xb8, whi, wlo, 0xa7, 0x00, 0x08, 0x4b, 0x2a, 0xb6, phi, plo, 0xb1],
            )
            .catch(0, 3, 6, Some("java/io/IOException"))
            .catch(0, 3, 6, Some("java/lang/RuntimeException"))
            .local(7, 4, "e", "Ljava/lang/Exception;", 0),
        ),
    );

    // int r; if (x > 10) r = 2; else if (x > 0) r = 1; else r = 0; return r;
    b.method(
        ACC_PUBLIC | ACC_STATIC,
        "grade",
        "(I)I",
        Some(
            CodeSpec::new(
                2,
                2,
                &[
                    0x1a, 0x10, 0x0a, 0xa4, 0x00, 0x08, 0x05, 0x3c, 0xa7, 0x00, 0x0e, 0x1a, 0x9e,
                    0x00, 0x08, 0x04, 0x3c, 0xa7, 0x00, 0x05, 0x03, 0x3c, 0x1b, 0xac,
                ],
            )
            .local(0, 24, "x", "I", 0),
        ),
    );

    b.method(
        ACC_PUBLIC | ACC_STATIC,
        "scan",
        "(I)I",
        Some(
            CodeSpec::new(
                2,
                2,
                &[
                    0x03, 0x3c, 0x1b, 0x1a, 0xa2, 0x00, 0x1a, 0x84, 0x01, 0x01, 0x1b, 0x06, 0xa0,
                    0x00, 0x06, 0xa7, 0xff, 0xf3, 0x1b, 0x10, 0x07, 0xa0, 0x00, 0x06, 0xa7, 0x00,
                    0x06, 0xa7, 0xff, 0xe7, 0x1b, 0xac,
                ],
            )
            .local(0, 32, "n", "I", 0)
            .local(2, 30, "k", "I", 1),
        ),
    );

    // no goto into the test, so the loop keeps its do-while form
    b.method(
        ACC_PUBLIC | ACC_STATIC,
        "countUp",
        "(I)I",
        Some(
            CodeSpec::new(
                2,
                2,
                &[0x03, 0x3c, 0x84, 0x01, 0x01, 0x1b, 0x1a, 0xa1, 0xff, 0xfb, 0x1b, 0xac],
            )
            .local(0, 12, "n", "I", 0)
            .local(2, 10, "k", "I", 1),
        ),
    );

    b.method(
        ACC_PUBLIC | ACC_STATIC,
        "locked",
        "(Ljava/lang/Object;)V",
        Some(
            CodeSpec::new(
                2,
                3,
                &[
                    0x2a, 0x59, 0x4c, 0xc2, 0xb8, whi, wlo, 0x2b, 0xc3, 0xa7, 0x00, 0x08, 0x4d,
                    0x2b, 0xc3, 0x2c, 0xbf, 0xb1,
                ],
            )
            .catch(4, 9, 12, None)
            .catch(12, 15, 12, None)
            .local(0, 18, "lock", "Ljava/lang/Object;", 0),
        ),
    );

    // try { work(); } finally { done(); } as compiled with jsr/ret
    b.method(ACC_PUBLIC | ACC_STATIC, "done", "()V", Some(CodeSpec::new(0, 0, &[0xb1])));
    let (dhi, dlo) = split(b.method_ref("com/acme/Sample", "done", "()V"));
    b.method(
        ACC_PUBLIC | ACC_STATIC,
        "guarded",
        "()V",
        Some(
            CodeSpec::new(
                1,
                2,
                &[
                    0xb8, whi, wlo, 0xa8, 0x00, 0x0c, 0xa7, 0x00, 0x0f, 0x4b, 0xa8, 0x00, 0x05,
                    0x2a, 0xbf, 0x4c, 0xb8, dhi, dlo, 0xa9, 0x01, 0xb1,
                ],
            )
            .catch(0, 3, 9, None),
        ),
    );

    // int j; switch (i) { case 1: j = 10; break; case 2: j = 20; break; default: j = 0; }
    let mut choose = vec![0x1a, 0xaa, 0x00, 0x00];
    for word in [35i32, 1, 2, 23, 29] {
        choose.extend_from_slice(&word.to_be_bytes());
    }
    choose.extend_from_slice(&[
        0x10, 0x0a, 0x3c, 0xa7, 0x00, 0x0b, 0x10, 0x14, 0x3c, 0xa7, 0x00, 0x05, 0x03, 0x3c, 0x1b,
        0xac,
    ]);
    b.method(
        ACC_PUBLIC | ACC_STATIC,
        "choose",
        "(I)I",
        Some(CodeSpec::new(1, 2, &choose).local(0, 40, "i", "I", 0)),
    );

    b.method(ACC_PUBLIC | ACC_STATIC, "idle", "()V", Some(CodeSpec::new(0, 0, &[])));
    b.build()
}

fn parse(bytes: &[u8]) -> ClassInfo {
    ClassInfo::parse(bytes).expect("class should parse")
}

/// Body lines of one method, indented four spaces per nesting level.
fn body(class: &ClassInfo, name: &str) -> Vec<String> {
    let imports = Imports::from_pool(&class.this_class, &class.pool, std::iter::empty());
    let method = class
        .method(name)
        .unwrap_or_else(|| panic!("no method {name}"));
    MethodDecompiler::new(class, &imports)
        .decompile(method)
        .unwrap_or_else(|e| panic!("{name} failed: {e}"))
        .lines
        .iter()
        .map(|l| format!("{}{}", "    ".repeat(l.depth), l.text))
        .collect()
}

/// Symbol table and collated branch table of one method.
fn analyze(class: &ClassInfo, name: &str) -> (SymbolTable, BranchAnalysis) {
    let imports = Imports::from_pool(&class.this_class, &class.pool, std::iter::empty());
    let method = class
        .method(name)
        .unwrap_or_else(|| panic!("no method {name}"));
    MethodDecompiler::new(class, &imports)
        .analyze(method)
        .unwrap_or_else(|e| panic!("{name} failed: {e}"))
}

fn of_kind(analysis: &BranchAnalysis, kind: BranchKind) -> Vec<&BranchEntry> {
    analysis
        .table
        .entries()
        .iter()
        .filter(|e| e.kind == kind)
        .collect()
}

// ---- Class model ----

#[test]
fn test_class_info() {
    let class = parse(&sample_class());
    assert_eq!(class.this_class, "com/acme/Sample");
    assert_eq!(class.super_class.as_deref(), Some("java/lang/Object"));
    assert_eq!(class.package(), Some("com/acme"));
    assert_eq!(class.simple_name(), "Sample");
    assert_eq!(class.source_file.as_deref(), Some("Sample.java"));
    assert_eq!((class.major_version, class.minor_version), (52, 0));
    assert_eq!(class.fields.len(), 3);
    assert!(class.fields[0].is_static());

    let work = class.method("work").unwrap();
    assert_eq!(work.throws, vec!["java/io/IOException".to_string()]);
    let risky = class.method("risky").unwrap();
    let code = risky.code.as_ref().unwrap();
    assert_eq!(code.exceptions[0].catch_type.as_deref(), Some("java/io/IOException"));
    assert_eq!(code.exceptions[0].handler_pc, 6);
    assert_eq!(code.local_variables[0].name, "e");
    assert_eq!(risky.instructions().unwrap().len(), 6);
}

#[test]
fn test_bad_magic_is_rejected() {
    let mut bytes = sample_class();
    bytes[0] = 0;
    assert!(matches!(
        decompile_bytes(&bytes, &DecompileOptions::default()),
        Err(Error::Parser(_))
    ));
}

// ---- Method bodies ----

#[test]
fn test_straight_line_code() {
    let class = parse(&sample_class());
    assert_eq!(body(&class, "add"), vec!["return i + j;"]);
    assert!(body(&class, "<init>").is_empty());
    assert!(body(&class, "work").is_empty());
}

#[test]
fn test_ternary_expression() {
    let class = parse(&sample_class());
    assert_eq!(body(&class, "max"), vec!["return a > b ? a : b;"]);
}

#[test]
fn test_if_else_with_hoisted_declaration() {
    let class = parse(&sample_class());
    assert_eq!(
        body(&class, "sign"),
        vec![
            "int i;",
            "if (x > 0) {",
            "    i = 1;",
            "} else {",
            "    i = -1;",
            "}",
            "return i;",
        ]
    );
}

#[test]
fn test_while_loop_with_top_test() {
    let class = parse(&sample_class());
    assert_eq!(
        body(&class, "sum"),
        vec![
            "int s = 0;",
            "int k = 0;",
            "while (k < n) {",
            "    s = s + k;",
            "    k++;",
            "}",
            "return s;",
        ]
    );
}

#[test]
fn test_while_loop_with_bottom_test() {
    let class = parse(&sample_class());
    assert_eq!(
        body(&class, "spin"),
        vec!["int k = 0;", "while (k < n) {", "    k++;", "}"]
    );
}

#[test]
fn test_try_catch() {
    init_logging();
    let class = parse(&sample_class());
    assert_eq!(
        body(&class, "risky"),
        vec![
            "try {",
            "    work();",
            "} catch (IOException e) {",
            "    e.printStackTrace();",
            "}",
        ]
    );
}

#[test]
fn test_switch() {
    init_logging();
    let class = parse(&sample_class());
    assert_eq!(
        body(&class, "pick"),
        vec![
            "switch (k) {",
            "    case 1:",
            "        return 10;",
            "    case 2:",
            "        return 20;",
            "}",
            "return 0;",
        ]
    );
}

#[test]
fn test_catches_sharing_a_slot() {
    init_logging();
    let class = parse(&sample_class());
    let lines = body(&class, "recover");
    assert_eq!(
        lines,
        vec![
            "try {",
            "    work();",
            "} catch (IOException e) {",
            "    e.printStackTrace();",
            "} catch (RuntimeException e) {",
            "    e.printStackTrace();",
            "}",
        ]
    );
    assert!(lines.iter().all(|l| !l.contains("Object")));

    assert_eq!(
        body(&class, "recoverQuietly"),
        vec![
            "try {",
            "    work();",
            "} catch (IOException ioexception) {",
            "    ioexception.printStackTrace();",
            "} catch (RuntimeException runtimeexception) {",
            "    runtimeexception.printStackTrace();",
            "}",
        ]
    );
}

#[test]
fn test_catch_with_several_types() {
    let class = parse(&sample_class());
    assert_eq!(
        body(&class, "either"),
        vec![
            "try {",
            "    work();",
            "} catch (IOException | RuntimeException e) {",
            "    e.printStackTrace();",
            "}",
        ]
    );
}

#[test]
fn test_else_if_chain() {
    let class = parse(&sample_class());
    assert_eq!(
        body(&class, "grade"),
        vec![
            "int i;",
            "if (x > 10) {",
            "    i = 2;",
            "} else if (x > 0) {",
            "    i = 1;",
            "} else {",
            "    i = 0;",
            "}",
            "return i;",
        ]
    );
}

#[test]
fn test_break_and_continue() {
    let class = parse(&sample_class());
    assert_eq!(
        body(&class, "scan"),
        vec![
            "int k = 0;",
            "while (k < n) {",
            "    k++;",
            "    if (k == 3) {",
            "        continue;",
            "    }",
            "    if (k == 7) {",
            "        break;",
            "    }",
            "}",
            "return k;",
        ]
    );
}

#[test]
fn test_do_while_without_entry_goto() {
    let class = parse(&sample_class());
    assert_eq!(
        body(&class, "countUp"),
        vec!["int k = 0;", "do {", "    k++;", "} while (k < n);", "return k;"]
    );
}

#[test]
fn test_synchronized_block() {
    let class = parse(&sample_class());
    assert_eq!(
        body(&class, "locked"),
        vec!["synchronized (lock) {", "    work();", "}"]
    );
}

#[test]
fn test_finally_subroutine() {
    init_logging();
    let class = parse(&sample_class());
    assert_eq!(
        body(&class, "guarded"),
        vec!["try {", "    work();", "} finally {", "    done();", "}"]
    );
}

#[test]
fn test_switch_with_breaks_and_default() {
    let class = parse(&sample_class());
    assert_eq!(
        body(&class, "choose"),
        vec![
            "int j;",
            "switch (i) {",
            "    case 1:",
            "        j = 10;",
            "        break;",
            "    case 2:",
            "        j = 20;",
            "        break;",
            "    default:",
            "        j = 0;",
            "}",
            "return j;",
        ]
    );
}

// ---- Branch tables ----

#[test]
fn test_straight_line_code_has_no_blocks() {
    let class = parse(&sample_class());
    let (_, analysis) = analyze(&class, "add");
    assert!(analysis.table.is_empty());
}

#[test]
fn test_else_pairs_with_its_if() {
    let class = parse(&sample_class());
    let (_, analysis) = analyze(&class, "sign");
    let ifs = of_kind(&analysis, BranchKind::If);
    let elses = of_kind(&analysis, BranchKind::Else);
    assert_eq!((ifs.len(), elses.len()), (1, 1));
    assert_eq!(elses[0].start, ifs[0].end);
    assert!(elses[0].end > elses[0].start);
    assert_eq!(analysis.table.len(), 2);
}

#[test]
fn test_try_ends_where_catch_starts() {
    let class = parse(&sample_class());
    let (_, analysis) = analyze(&class, "risky");
    let tries = of_kind(&analysis, BranchKind::Try);
    let catches = of_kind(&analysis, BranchKind::Catch);
    assert_eq!((tries.len(), catches.len()), (1, 1));
    assert_eq!((tries[0].start, tries[0].end), (0, 6));
    assert_eq!((catches[0].start, catches[0].end), (6, 11));
    assert_eq!(catches[0].labels, vec!["IOException e".to_string()]);

    let (_, analysis) = analyze(&class, "recover");
    let catches = of_kind(&analysis, BranchKind::Catch);
    assert_eq!(catches.len(), 2);
    assert_eq!(of_kind(&analysis, BranchKind::Try)[0].end, catches[0].start);
    assert_eq!(catches[0].end, catches[1].start);
}

#[test]
fn test_handler_variables_stay_out_of_outer_scope() {
    let class = parse(&sample_class());
    let (symtab, _) = analyze(&class, "recover");
    let handlers: Vec<_> = symtab.entries().iter().filter(|e| e.slot == 0).collect();
    assert_eq!(handlers.len(), 2);
    assert!(handlers.iter().all(|e| e.is_handler && e.name == "e"));
    assert!(symtab.escaping(0, 19).is_empty());
}

#[test]
fn test_empty_code() {
    let class = parse(&sample_class());
    let method = class.method("idle").unwrap();
    assert!(method.instructions().unwrap().is_empty());
    let (symtab, analysis) = analyze(&class, "idle");
    assert!(analysis.table.is_empty());
    assert!(analysis.gotos.is_empty());
    assert!(symtab.entries().is_empty());
    assert!(body(&class, "idle").is_empty());
}

#[test]
fn test_statement_offsets() {
    let class = parse(&sample_class());
    let imports = Imports::from_pool(&class.this_class, &class.pool, std::iter::empty());
    let decompiled = MethodDecompiler::new(&class, &imports)
        .decompile(class.method("sum").unwrap())
        .unwrap();
    assert_eq!(decompiled.params, vec!["n".to_string()]);
    let update = decompiled
        .lines
        .iter()
        .find(|l| l.text == "s = s + k;")
        .unwrap();
    assert_eq!((update.start_pc, update.end_pc), (9, 12));
}

// ---- Class output ----

#[test]
fn test_class_header_and_members() {
    let out = decompile_bytes(&sample_class(), &DecompileOptions::default()).unwrap();
    let expected_head = format!(
        "// Decompiled by jreverse {}\n\
         // Class version: 52.0\n\
         // Source file: Sample.java\n\
         \n\
         package com.acme;\n\
         \n\
         import java.io.IOException;\n\
         \n\
         public class Sample {{\n\
         \n    public static final int LIMIT = 10;\n\
         \x20   static final boolean DEBUG = true;\n\
         \x20   private String name;\n\
         \n    public Sample() {{\n\
         \x20   }}\n",
        env!("CARGO_PKG_VERSION")
    );
    assert!(out.starts_with(&expected_head), "unexpected output:\n{out}");
    assert!(out.contains("    public static int add(int i, int j) {\n        return i + j;\n    }\n"));
    assert!(out.contains("    public static int max(int a, int b) {\n"));
    assert!(out.contains("    public static void work() throws IOException {\n    }\n"));
    assert!(out.ends_with("}\n"));
}

#[test]
fn test_failed_method_is_isolated() {
    init_logging();
    let out = decompile_bytes(&sample_class(), &DecompileOptions::default()).unwrap();
    assert!(out.contains(
        "    public static void broken() {\n\
         \x20       // decompilation failed: operand stack underflow at pc 0\n\
         \x20       // 0: pop\n\
         \x20       // 1: return\n\
         \x20   }\n"
    ));
    // methods after the broken one are still decompiled
    assert!(out.contains("        return a > b ? a : b;\n"));
}

#[test]
fn test_failed_method_without_listing() {
    let options = DecompileOptions {
        fallback_to_bytecode: false,
        ..Default::default()
    };
    let out = decompile_bytes(&sample_class(), &options).unwrap();
    assert!(out.contains("// decompilation failed"));
    assert!(!out.contains("// 0: pop"));
}

#[test]
fn test_bytecode_listing() {
    let options = DecompileOptions {
        get_bytecode: true,
        ..Default::default()
    };
    let out = decompile_bytes(&sample_class(), &options).unwrap();
    assert!(out.contains(
        "    public static int add(int i, int j) {\n\
         \x20       0: iload_0\n\
         \x20       1: iload_1\n\
         \x20       2: iadd\n\
         \x20       3: ireturn\n\
         \x20   }\n"
    ));
    assert!(out.contains("        0: pop\n"));
    assert!(!out.contains("return i + j;"));
}

#[test]
fn test_metadata_comments() {
    let options = DecompileOptions {
        include_metadata: true,
        ..Default::default()
    };
    let out = decompile_bytes(&sample_class(), &options).unwrap();
    assert!(out.contains("        // max_locals: 1, max_stack: 1\n"));
    assert!(out.contains("        // exception [0, 3) -> 6 java.io.IOException\n"));
}

#[test]
fn test_offset_annotations() {
    let options = DecompileOptions {
        annotate_offsets: true,
        ..Default::default()
    };
    let out = decompile_bytes(&sample_class(), &options).unwrap();
    assert!(out.contains("        return i + j; // pc 0-3\n"));
    assert!(out.contains("        while (k < n) {\n"));
}

#[test]
fn test_decompilation_is_repeatable() {
    let bytes = sample_class();
    let options = DecompileOptions::default();
    let first = decompile_bytes(&bytes, &options).unwrap();
    let second = decompile_bytes(&bytes, &options).unwrap();
    assert_eq!(first, second);

    let class = parse(&bytes);
    assert_eq!(body(&class, "sign"), body(&class, "sign"));
}

#[test]
fn test_abstract_class() {
    let mut b = ClassBuilder::new("Shape", "java/lang/Object")
        .access_flags(ACC_PUBLIC | ACC_SUPER | ACC_ABSTRACT);
    b.method(ACC_PUBLIC | ACC_ABSTRACT, "area", "()D", None);
    let out = decompile_bytes(&b.build(), &DecompileOptions::default()).unwrap();
    assert!(out.ends_with(
        "public abstract class Shape {\n\
         \n    public abstract double area();\n\
         }\n"
    ));
    assert!(!out.contains("package"));
}

#[test]
fn test_interface() {
    let mut b = ClassBuilder::new("com/acme/Runner", "java/lang/Object")
        .access_flags(ACC_PUBLIC | 0x0200 | ACC_ABSTRACT)
        .interface("java/lang/Runnable");
    b.method(ACC_PUBLIC | ACC_ABSTRACT, "start", "(Ljava/util/List;)V", None);
    let out = decompile_bytes(&b.build(), &DecompileOptions::default()).unwrap();
    assert!(out.contains("import java.util.List;\n"));
    assert!(out.contains(
        "public interface Runner extends Runnable {\n\
         \n    public void start(List list);\n\
         }\n"
    ));
}

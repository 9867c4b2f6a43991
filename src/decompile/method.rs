use std::collections::BTreeMap;

use log::debug;

use crate::class_info::{ClassInfo, ExceptionEntry, LocalVariable, Method};
use crate::code_attribute::Instruction;
use crate::error::RevEngineError;

use super::branch_builder::{self, entry_placeholders, BranchAnalysis};
use super::collate::collate;
use super::context::{render, Line};
use super::frame::RunTimeFrame;
use super::imports::Imports;
use super::op::{self, Op};
use super::operand::Operand;
use super::symtab::{self, SymbolTable};

/// Everything the three passes read about one method. Built once per decompilation and
/// never mutated, so each pass starts from the same instruction list.
pub struct MethodCode<'a> {
    pub class: &'a ClassInfo,
    pub method: &'a Method,
    pub imports: &'a Imports,
    pub instructions: &'a [Instruction],
    pub ops: Vec<Op>,
    pub exceptions: &'a [ExceptionEntry],
    pub local_variables: &'a [LocalVariable],
    /// Stack contents at handler and subroutine entry points.
    pub placeholders: BTreeMap<usize, Operand>,
    /// Pc one past the last instruction.
    pub code_end: usize,
}

impl<'a> MethodCode<'a> {
    pub fn new(
        class: &'a ClassInfo,
        method: &'a Method,
        imports: &'a Imports,
    ) -> Result<Self, RevEngineError> {
        let instructions = method.instructions()?;
        let ops = instructions
            .iter()
            .map(op::decode)
            .collect::<Result<Vec<_>, _>>()?;
        let (exceptions, local_variables) = match &method.code {
            Some(code) => (&code.exceptions[..], &code.local_variables[..]),
            None => (&[][..], &[][..]),
        };
        let placeholders = entry_placeholders(instructions, &ops, exceptions);
        Ok(MethodCode {
            class,
            method,
            imports,
            instructions,
            ops,
            exceptions,
            local_variables,
            placeholders,
            code_end: instructions.last().map_or(0, Instruction::next_index),
        })
    }

    /// A fresh frame with an empty operand stack.
    pub fn frame(&self) -> RunTimeFrame<'a> {
        RunTimeFrame::new(
            &self.class.pool,
            self.imports,
            &self.class.this_class,
            self.method.return_type.clone(),
        )
    }

    pub fn steps(&self) -> impl Iterator<Item = (&Instruction, &Op)> {
        self.instructions.iter().zip(self.ops.iter())
    }

    pub fn at(&self, pc: usize) -> Option<(&Instruction, &Op)> {
        let i = self
            .instructions
            .binary_search_by_key(&pc, |ins| ins.index)
            .ok()?;
        Some((&self.instructions[i], &self.ops[i]))
    }

    /// The instruction that ends right before `pc`. `pc` may be `code_end`.
    pub fn before(&self, pc: usize) -> Option<(&Instruction, &Op)> {
        let i = self
            .instructions
            .partition_point(|ins| ins.index < pc)
            .checked_sub(1)?;
        Some((&self.instructions[i], &self.ops[i]))
    }

    pub fn exceptions(&self) -> &'a [ExceptionEntry] {
        self.exceptions
    }

    pub fn local_variables(&self) -> &'a [LocalVariable] {
        self.local_variables
    }
}

/// A decompiled method: argument names in declaration order and the body lines.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MethodBody {
    pub params: Vec<String>,
    pub lines: Vec<Line>,
}

/// Runs the symbol-table, branch-table and rendering passes over a method.
pub struct MethodDecompiler<'a> {
    class: &'a ClassInfo,
    imports: &'a Imports,
}

impl<'a> MethodDecompiler<'a> {
    pub fn new(class: &'a ClassInfo, imports: &'a Imports) -> Self {
        MethodDecompiler { class, imports }
    }

    pub fn decompile(&self, method: &'a Method) -> Result<MethodBody, RevEngineError> {
        let code = MethodCode::new(self.class, method, self.imports)?;
        if code.instructions.is_empty() {
            return Ok(MethodBody {
                params: self.arguments(method),
                lines: Vec::new(),
            });
        }

        let (symtab, analysis) = passes(&code)?;
        let params = param_names(&symtab);
        let mut lines = render(&code, symtab, analysis)?;
        if method.is_constructor()
            && lines
                .first()
                .is_some_and(|l| l.depth == 0 && l.text == "super();")
        {
            lines.remove(0);
        }
        debug!("{}{}: {} lines", method.name, method.descriptor, lines.len());
        Ok(MethodBody { params, lines })
    }

    /// The symbol table and the collated branch table, stopping short of rendering.
    /// Code without instructions yields only the argument entries and no branches.
    pub fn analyze(
        &self,
        method: &'a Method,
    ) -> Result<(SymbolTable, BranchAnalysis), RevEngineError> {
        let code = MethodCode::new(self.class, method, self.imports)?;
        if code.instructions.is_empty() {
            return Ok((self.argument_table(method), BranchAnalysis::default()));
        }
        passes(&code)
    }

    /// Argument names without running any pass over the code.
    pub fn arguments(&self, method: &Method) -> Vec<String> {
        param_names(&self.argument_table(method))
    }

    fn argument_table(&self, method: &Method) -> SymbolTable {
        let debug_names = method
            .code
            .as_ref()
            .map_or(&[][..], |c| &c.local_variables[..]);
        let mut table = SymbolTable::with_arguments(
            &self.class.this_class,
            &method.params,
            method.is_static(),
            debug_names,
        );
        table.assign_names();
        table
    }
}

fn passes(code: &MethodCode<'_>) -> Result<(SymbolTable, BranchAnalysis), RevEngineError> {
    let symtab = symtab::build(code)?;
    let mut analysis = branch_builder::build(code, &symtab)?;
    collate(&mut analysis, code)?;
    Ok((symtab, analysis))
}

fn param_names(table: &SymbolTable) -> Vec<String> {
    table
        .args()
        .filter(|e| e.name != "this")
        .map(|e| e.name.clone())
        .collect()
}

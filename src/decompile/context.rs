use log::debug;

use crate::error::RevEngineError;

use super::branch::{BranchEntry, BranchKind};
use super::branch_builder::{merge_arms, BranchAnalysis};
use super::frame::{Effect, RunTimeFrame};
use super::method::MethodCode;
use super::op::Op;
use super::operand::{prec, Operand, OperandKind};
use super::symtab::{LocalEntry, Names, SymbolTable};

/// One line of a method body. `depth` counts enclosing blocks; `start_pc..=end_pc`
/// are the instructions the line was built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line {
    pub depth: usize,
    pub text: String,
    pub start_pc: usize,
    pub end_pc: usize,
}

/// Writes the statements of a method: executes every instruction once more while
/// opening and closing the blocks of the collated branch table around them.
pub struct RunTimeContext<'c, 'a> {
    code: &'c MethodCode<'a>,
    symtab: SymbolTable,
    analysis: BranchAnalysis,
    frame: RunTimeFrame<'a>,
    /// Indices of the open blocks, innermost last.
    open: Vec<usize>,
    lines: Vec<Line>,
    stmt_start: usize,
}

impl<'c, 'a> RunTimeContext<'c, 'a> {
    pub fn new(code: &'c MethodCode<'a>, symtab: SymbolTable, analysis: BranchAnalysis) -> Self {
        RunTimeContext {
            code,
            symtab,
            analysis,
            frame: code.frame(),
            open: Vec::new(),
            lines: Vec::new(),
            stmt_start: 0,
        }
    }

    pub fn run(mut self) -> Result<Vec<Line>, RevEngineError> {
        let code = self.code;
        for (ins, op) in code.steps() {
            let pc = ins.index;
            self.close_blocks(pc);
            self.open_blocks(pc);
            if self.analysis.consumed.contains(&pc) || self.analysis.is_hidden(pc) {
                continue;
            }
            if let Some(placeholder) = code.placeholders.get(&pc) {
                self.frame.stack.clear();
                self.frame.stack.push(placeholder.clone());
            }
            if let Some(else_starts) = self.analysis.merges.get(&pc) {
                merge_arms(&mut self.frame.stack, &self.analysis.table, pc, else_starts)?;
            }
            if self.frame.stack.is_empty() {
                self.stmt_start = pc;
            }
            let effect = self.frame.execute(pc, op, &mut Names(&self.symtab))?;
            self.apply(pc, ins.next_index(), effect);
        }
        self.close_blocks(usize::MAX);
        if self
            .lines
            .last()
            .is_some_and(|l| l.depth == 0 && l.text == "return;")
        {
            self.lines.pop();
        }
        Ok(self.lines)
    }

    fn depth(&self) -> usize {
        self.open.len()
    }

    fn entry(&self, index: usize) -> &BranchEntry {
        &self.analysis.table.entries()[index]
    }

    fn emit(&mut self, text: String, start_pc: usize, end_pc: usize) {
        self.lines.push(Line {
            depth: self.depth(),
            text,
            start_pc,
            end_pc,
        });
    }

    fn statement(&mut self, text: String, pc: usize) {
        let start = self.stmt_start.min(pc);
        self.emit(text, start, pc);
    }

    fn close_blocks(&mut self, pc: usize) {
        while let Some(&top) = self.open.last() {
            let entry = self.entry(top);
            if entry.end > pc {
                break;
            }
            let text = match entry.kind {
                BranchKind::Case => None,
                BranchKind::DoWhile => Some(format!("}} while ({});", entry.condition())),
                _ => Some("}".to_string()),
            };
            let end = entry.end;
            self.open.pop();
            if let Some(text) = text {
                self.emit(text, end, end);
            }
        }
    }

    fn open_blocks(&mut self, pc: usize) {
        let starting: Vec<usize> = (0..self.analysis.table.len())
            .filter(|&i| {
                let e = self.entry(i);
                e.start == pc && !e.written && !e.ternary
            })
            .collect();
        for index in starting {
            if !self.entry(index).kind.continues_previous() {
                self.declare_escaping(index);
            }
            self.write_header(index);
            self.open.push(index);
            if let Some(entry) = self.analysis.table.get_mut(index) {
                entry.written = true;
            }
        }
    }

    fn write_header(&mut self, index: usize) {
        let entry = self.entry(index).clone();
        let header = match entry.kind {
            BranchKind::Case => {
                for label in entry.labels {
                    self.emit(label, entry.start, entry.start);
                }
                return;
            }
            BranchKind::If => format!("if ({}) {{", entry.condition()),
            BranchKind::ElseIf => format!("else if ({}) {{", entry.condition()),
            BranchKind::Else => "else {".to_string(),
            BranchKind::While => format!("while ({}) {{", entry.condition()),
            BranchKind::DoWhile => "do {".to_string(),
            BranchKind::Switch => format!("switch ({}) {{", entry.condition()),
            BranchKind::Try | BranchKind::TryAny => "try {".to_string(),
            BranchKind::Catch | BranchKind::CatchAny => {
                format!("catch ({}) {{", entry.labels.join(", "))
            }
            BranchKind::Sync => format!("synchronized ({}) {{", entry.condition()),
            BranchKind::Jsr => "finally {".to_string(),
        };
        let depth = self.depth();
        if entry.kind.continues_previous() {
            if let Some(last) = self.lines.last_mut() {
                if last.depth == depth && last.text == "}" {
                    last.text = format!("}} {}", header);
                    last.end_pc = entry.start;
                    return;
                }
            }
        }
        self.emit(header, entry.start, entry.start);
    }

    /// Blocks written one after another as a unit: an `if` with its `else` parts, a
    /// `try` with its handlers.
    fn sibling_chain(&self, lead: usize) -> Vec<(usize, usize)> {
        let first = self.entry(lead);
        let mut ranges = vec![(first.start, first.end)];
        if first.kind.is_loop() && first.cond_pc > first.start {
            ranges.push((first.start, first.cond_pc));
        }
        let mut end = first.end;
        loop {
            let resume = self
                .analysis
                .hidden
                .iter()
                .find(|(start, _)| *start == end)
                .map_or(end, |(_, hidden_end)| *hidden_end);
            let next = self.analysis.table.entries().iter().find(|e| {
                e.kind.continues_previous() && !e.written && (e.start == end || e.start == resume)
            });
            match next {
                Some(e) if e.end > end => {
                    ranges.push((e.start, e.end));
                    end = e.end;
                }
                _ => break,
            }
        }
        ranges
    }

    /// Declares, ahead of a block, every variable first stored inside one of the
    /// block's parts and still used after that part ends.
    fn declare_escaping(&mut self, lead: usize) {
        let mut escaping: Vec<LocalEntry> = Vec::new();
        for (start, end) in self.sibling_chain(lead) {
            for entry in self.symtab.escaping(start, end) {
                if !escaping.iter().any(|e| e.slot == entry.slot && e.store_pc == entry.store_pc) {
                    escaping.push(entry.clone());
                }
            }
        }
        escaping.sort_by_key(|e| (e.store_pc, e.slot));
        let start = self.entry(lead).start;
        for entry in escaping {
            let text = format!("{} {};", self.code.imports.type_name(&entry.ty), entry.name);
            self.emit(text, start, start);
            self.symtab.declare_entry(&entry);
        }
    }

    fn apply(&mut self, pc: usize, next_pc: usize, effect: Effect) {
        match effect {
            Effect::Statement(text) => self.statement(text, pc),
            Effect::Store { slot, value, .. } => self.store(pc, slot, value),
            Effect::Iinc { slot, delta } => self.increment(pc, slot, delta),
            Effect::Goto(target) => self.break_or_continue(pc, next_pc, target),
            Effect::MonitorEnter(lock) => {
                self.statement(format!("// monitorenter({})", lock.value), pc)
            }
            Effect::None
            | Effect::Condition(_)
            | Effect::Switch(_)
            | Effect::Jsr(_)
            | Effect::Ret(_)
            | Effect::MonitorExit => {}
        }
    }

    fn store(&mut self, pc: usize, slot: u16, value: Operand) {
        if matches!(value.kind, OperandKind::Exception | OperandKind::ReturnAddress) {
            self.symtab.declare(slot, pc);
            return;
        }
        let Some(entry) = self.symtab.lookup(slot, pc).cloned() else {
            self.statement(format!("v{} = {};", slot, value.value), pc);
            return;
        };
        let rhs = value.coerced(&entry.ty);
        if entry.declared {
            self.statement(format!("{} = {};", entry.name, rhs), pc);
        } else {
            let ty = self.code.imports.type_name(&entry.ty);
            self.statement(format!("{} {} = {};", ty, entry.name, rhs), pc);
            self.symtab.declare(slot, pc);
        }
    }

    fn increment(&mut self, pc: usize, slot: u16, delta: i16) {
        let name = match self.symtab.resolve(slot, pc) {
            Some(entry) => entry.name.clone(),
            None => format!("v{}", slot),
        };
        // a copy of the old value already on the stack makes this a postfix operator
        if delta == 1 || delta == -1 {
            let pending = (0..self.frame.stack.len()).find_map(|depth| {
                self.frame
                    .stack
                    .peek(depth)
                    .filter(|o| o.kind == OperandKind::Local(slot) && o.value == name)
                    .map(|_| depth)
            });
            if let Some(depth) = pending {
                if let Some(operand) = self.frame.stack.peek_mut(depth) {
                    let op = if delta == 1 { "++" } else { "--" };
                    operand.value = format!("{}{}", name, op);
                    operand.prec = prec::UNARY;
                    operand.kind = OperandKind::Plain;
                    return;
                }
            }
        }
        let text = match delta {
            1 => format!("{}++;", name),
            -1 => format!("{}--;", name),
            d if d < 0 => format!("{} -= {};", name, -i32::from(d)),
            d => format!("{} += {};", name, d),
        };
        self.statement(text, pc);
    }

    /// A `goto` left after structuring is a `break` or `continue` of the innermost
    /// loop or switch.
    fn break_or_continue(&mut self, pc: usize, next_pc: usize, target: usize) {
        if self.analysis.silent.contains(&pc) {
            return;
        }
        let innermost_loop = self
            .open
            .iter()
            .rev()
            .map(|&i| self.entry(i))
            .find(|e| e.kind.is_loop())
            .cloned();
        if let Some(lp) = &innermost_loop {
            if lp.continue_pc == Some(target) || lp.start == target {
                if next_pc != lp.end && next_pc != target {
                    self.statement("continue;".into(), pc);
                }
                return;
            }
            if self.reaches_loop_test(target, lp) {
                self.statement("continue;".into(), pc);
                return;
            }
        }
        let breakable = self
            .open
            .iter()
            .rev()
            .map(|&i| self.entry(i))
            .find(|e| e.kind.is_loop() || e.kind == BranchKind::Switch)
            .and_then(|e| e.break_pc);
        if breakable == Some(target) {
            self.statement("break;".into(), pc);
            return;
        }
        debug!("goto at {} to {} has no structured form", pc, target);
    }

    /// True if `target` starts straight-line code that only leads back to the test of
    /// `lp`, like the update part of a `for` loop.
    fn reaches_loop_test(&self, target: usize, lp: &BranchEntry) -> bool {
        if target <= lp.start || target >= lp.end {
            return false;
        }
        let tail: Vec<&Op> = self
            .code
            .steps()
            .filter(|(i, _)| i.index >= target && i.index < lp.end)
            .map(|(_, op)| op)
            .collect();
        let straight = |ops: &[&Op]| {
            ops.iter().all(|op| {
                !matches!(
                    op,
                    Op::Goto(_)
                        | Op::If { .. }
                        | Op::Switch(_)
                        | Op::Return(_)
                        | Op::Athrow
                        | Op::Jsr(_)
                        | Op::Ret(_)
                )
            })
        };
        match lp.continue_pc {
            Some(test) if test > lp.start => {
                let before_test: Vec<&Op> = self
                    .code
                    .steps()
                    .filter(|(i, _)| i.index >= target && i.index < test)
                    .map(|(_, op)| op)
                    .collect();
                target < test && straight(&before_test)
            }
            _ => match tail.split_last() {
                Some((Op::Goto(back), body)) => *back == lp.start && straight(body),
                _ => false,
            },
        }
    }
}

/// Renders the body of a method from its collated branch table.
pub fn render(
    code: &MethodCode<'_>,
    symtab: SymbolTable,
    analysis: BranchAnalysis,
) -> Result<Vec<Line>, RevEngineError> {
    RunTimeContext::new(code, symtab, analysis).run()
}

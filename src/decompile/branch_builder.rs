use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use crate::class_info::ExceptionEntry;
use crate::code_attribute::{Instruction, SwitchTable};
use crate::error::RevEngineError;

use super::branch::{BranchEntry, BranchKind, BranchTable};
use super::descriptor::{simple_class_name, JvmType};
use super::frame::Effect;
use super::method::MethodCode;
use super::op::Op;
use super::operand::{conditional, Condition, Operand, OperandKind, OperandStack};
use super::symtab::{Names, SymbolTable};

const THROWABLE: &str = "java/lang/Throwable";

/// How far into a catch-all handler a `jsr` to the finally subroutine may appear.
const FINALLY_JSR_WINDOW: usize = 4;

/// Everything the branch pass learns about a method.
#[derive(Clone, Debug, Default)]
pub struct BranchAnalysis {
    pub table: BranchTable,
    /// Every `goto`, by pc, with its target.
    pub gotos: BTreeMap<usize, usize>,
    /// Gotos that only glue blocks together and never render as `break`/`continue`.
    pub silent: BTreeSet<usize>,
    /// Instructions folded into a block header.
    pub consumed: BTreeSet<usize>,
    /// Compiler-generated regions that are not rendered at all.
    pub hidden: Vec<(usize, usize)>,
    /// Join pcs of `?:` expressions, with the pc where each false arm starts.
    pub merges: BTreeMap<usize, BTreeSet<usize>>,
}

impl BranchAnalysis {
    pub fn is_hidden(&self, pc: usize) -> bool {
        self.hidden.iter().any(|(start, end)| *start <= pc && pc < *end)
    }
}

/// Operand-stack entries that exist at handler and subroutine entry points.
pub fn entry_placeholders(
    instructions: &[Instruction],
    ops: &[Op],
    exceptions: &[ExceptionEntry],
) -> BTreeMap<usize, Operand> {
    let mut catch_types: BTreeMap<usize, Option<&str>> = BTreeMap::new();
    for entry in exceptions {
        let ty = entry.catch_type.as_deref();
        catch_types
            .entry(entry.handler_pc)
            .and_modify(|known| {
                if *known != ty {
                    *known = None;
                }
            })
            .or_insert(ty);
    }
    let mut placeholders: BTreeMap<usize, Operand> = catch_types
        .into_iter()
        .map(|(pc, ty)| {
            let class = ty.unwrap_or(THROWABLE);
            let name = simple_class_name(class).to_lowercase();
            let ty = JvmType::Reference(class.to_string());
            (pc, Operand::atom(name, ty).with_kind(OperandKind::Exception))
        })
        .collect();
    for (ins, op) in instructions.iter().zip(ops) {
        if let Op::Jsr(target) = op {
            placeholders.entry(*target).or_insert_with(|| {
                Operand::atom(format!("ret{}", ins.index), JvmType::Address)
                    .with_kind(OperandKind::ReturnAddress)
            });
        }
    }
    placeholders
}

/// Rejoins the arms of every `?:` whose join point is `pc`, innermost first. Returns the
/// pc where the outermost merged expression starts.
pub fn merge_arms(
    stack: &mut OperandStack,
    table: &BranchTable,
    pc: usize,
    else_starts: &BTreeSet<usize>,
) -> Result<Option<usize>, RevEngineError> {
    let mut start = None;
    for else_start in else_starts.iter().rev() {
        let Some(entry) = table.ternary_for(*else_start) else {
            continue;
        };
        let b = stack.pop(pc)?;
        let a = stack.pop(pc)?;
        let cond = entry
            .expr
            .clone()
            .unwrap_or_else(|| Operand::atom("true", JvmType::Boolean));
        stack.push(conditional(&cond, &a, &b));
        start = Some(entry.start);
    }
    Ok(start)
}

struct PendingSwitch {
    pc: usize,
    cond_pc: usize,
    key: Operand,
    table: SwitchTable,
}

struct Builder<'c, 'a> {
    code: &'c MethodCode<'a>,
    symtab: &'c SymbolTable,
    out: BranchAnalysis,
    /// Pc of the instruction that last ran with the operand stack at each depth: the
    /// start of the expression occupying that stack position.
    depth_marks: BTreeMap<usize, usize>,
    /// Gotos that end the true arm of a possible `?:`, with the candidate entries and
    /// the stack depth right after their jump.
    ternary_checks: BTreeMap<usize, Vec<(usize, usize)>>,
    switches: Vec<PendingSwitch>,
    used_handlers: BTreeSet<usize>,
}

/// Runs the branch pass: re-executes the method with the final variable names and
/// records every conditional jump, goto, switch, try region, synchronized block and
/// `?:` join.
pub fn build(code: &MethodCode<'_>, symtab: &SymbolTable) -> Result<BranchAnalysis, RevEngineError> {
    let mut builder = Builder {
        code,
        symtab,
        out: BranchAnalysis::default(),
        depth_marks: BTreeMap::new(),
        ternary_checks: BTreeMap::new(),
        switches: Vec::new(),
        used_handlers: BTreeSet::new(),
    };
    builder.walk()?;
    builder.finish_switches();
    builder.build_try_blocks();
    debug!(
        "{}: {} branch entries before collation",
        code.method.name,
        builder.out.table.len()
    );
    Ok(builder.out)
}

impl Builder<'_, '_> {
    fn walk(&mut self) -> Result<(), RevEngineError> {
        let code = self.code;
        let mut frame = code.frame();
        for (ins, op) in code.steps() {
            let pc = ins.index;
            if let Some(placeholder) = code.placeholders.get(&pc) {
                frame.stack.clear();
                frame.stack.push(placeholder.clone());
            }
            if let Some(else_starts) = self.out.merges.get(&pc) {
                if let Some(start) = merge_arms(&mut frame.stack, &self.out.table, pc, else_starts)? {
                    self.depth_marks.insert(frame.stack.len() - 1, start);
                }
            }
            self.depth_marks.insert(frame.stack.len(), pc);
            if let Op::Goto(target) = op {
                self.check_ternary(ins, *target, frame.stack.len());
            }
            match frame.execute(pc, op, &mut Names(self.symtab))? {
                Effect::Condition(cond) => self.conditional_jump(ins, op, cond, frame.stack.len()),
                Effect::Goto(target) => {
                    self.out.gotos.insert(pc, target);
                }
                Effect::Switch(key) => {
                    if let Op::Switch(table) = op {
                        self.switches.push(PendingSwitch {
                            pc,
                            cond_pc: self.cond_pc(frame.stack.len(), pc),
                            key,
                            table: table.clone(),
                        });
                    }
                }
                Effect::MonitorEnter(lock) => self.synchronized(ins, lock, frame.stack.len()),
                _ => {}
            }
        }
        Ok(())
    }

    fn cond_pc(&self, depth: usize, pc: usize) -> usize {
        self.depth_marks.get(&depth).copied().unwrap_or(pc)
    }

    fn conditional_jump(&mut self, ins: &Instruction, op: &Op, cond: Condition, depth: usize) {
        let Op::If { target, .. } = op else {
            return;
        };
        let (pc, target) = (ins.index, *target);
        let kind = if target > pc {
            BranchKind::If
        } else {
            BranchKind::DoWhile
        };
        let mut entry = match kind {
            BranchKind::If => BranchEntry::new(kind, self.cond_pc(depth, pc), target),
            _ => BranchEntry::new(kind, target, ins.next_index()),
        };
        entry.cond_pc = self.cond_pc(depth, pc);
        entry.jump_pc = pc;
        entry.next_pc = ins.next_index();
        entry.target = target;
        let taken = cond.to_operand();
        let not_taken = cond.negate().to_operand();
        entry.expr = Some(match kind {
            BranchKind::If => not_taken.clone(),
            _ => taken.clone(),
        });
        if kind.is_loop() {
            entry.continue_pc = Some(entry.cond_pc);
            entry.break_pc = Some(entry.end);
        }
        entry.taken = Some(taken);
        entry.not_taken = Some(not_taken);
        let index = self.out.table.add(entry);
        if kind == BranchKind::If {
            let code = self.code;
            if let Some((before, Op::Goto(_))) = code.before(target) {
                if before.index > pc {
                    self.ternary_checks
                        .entry(before.index)
                        .or_default()
                        .push((index, depth));
                }
            }
        }
    }

    /// A goto closing the true arm of an `if` that left a value on the stack makes that
    /// `if` a `?:`.
    fn check_ternary(&mut self, ins: &Instruction, target: usize, depth: usize) {
        let Some(checks) = self.ternary_checks.remove(&ins.index) else {
            return;
        };
        if target <= ins.index {
            return;
        }
        let mut found = false;
        for (index, depth_after) in checks {
            if depth > depth_after {
                if let Some(entry) = self.out.table.get_mut(index) {
                    entry.ternary = true;
                    found = true;
                }
            }
        }
        if found {
            self.out
                .merges
                .entry(target)
                .or_default()
                .insert(ins.next_index());
            self.out.silent.insert(ins.index);
        }
    }

    /// `monitorenter` guarded by a catch-all region starting right after it.
    fn synchronized(&mut self, ins: &Instruction, lock: Operand, depth: usize) {
        let code = self.code;
        let next = ins.next_index();
        let Some(handler) = code
            .exceptions()
            .iter()
            .find(|e| e.catch_type.is_none() && e.start_pc == next)
            .map(|e| e.handler_pc)
        else {
            return;
        };
        let start = self.cond_pc(depth, ins.index);
        let end = match code.before(handler) {
            Some((goto, Op::Goto(target))) if *target > handler => {
                self.out.silent.insert(goto.index);
                *target
            }
            _ => self.after_athrow(handler),
        };
        let mut entry = BranchEntry::new(BranchKind::Sync, start, end);
        entry.expr = Some(lock);
        self.out.table.add(entry);
        let header = code
            .instructions
            .iter()
            .map(|i| i.index)
            .filter(|pc| (start..=ins.index).contains(pc));
        self.out.consumed.extend(header);
        self.out.hidden.push((handler, end));
        self.used_handlers.insert(handler);
    }

    fn after_athrow(&self, from: usize) -> usize {
        self.code
            .steps()
            .find(|(i, op)| i.index >= from && matches!(op, Op::Athrow))
            .map_or(self.code.code_end, |(i, _)| i.next_index())
    }

    fn finish_switches(&mut self) {
        for switch in std::mem::take(&mut self.switches) {
            let targets = switch.table.targets();
            let Some(&last) = targets.last().filter(|&&t| t > switch.pc) else {
                continue;
            };
            let breaks = self
                .out
                .gotos
                .range(switch.pc + 1..last)
                .map(|(_, t)| *t)
                .filter(|t| *t >= last)
                .max();
            let end = match breaks {
                Some(end) => end,
                None if switch.table.default == last => last,
                None => self.code.code_end,
            };
            let starts: Vec<usize> = targets.into_iter().filter(|t| *t < end).collect();
            for (i, start) in starts.iter().enumerate() {
                let case_end = starts.get(i + 1).copied().unwrap_or(end);
                let mut case = BranchEntry::new(BranchKind::Case, *start, case_end);
                case.labels = switch
                    .table
                    .cases
                    .iter()
                    .filter(|(_, t)| t == start)
                    .map(|(key, _)| {
                        let key = Operand::atom(key.to_string(), JvmType::Int);
                        format!("case {}:", key.coerced(&switch.key.ty))
                    })
                    .collect();
                if switch.table.default == *start {
                    case.labels.push("default:".into());
                }
                self.out.table.add(case);
            }
            let mut entry = BranchEntry::new(BranchKind::Switch, switch.cond_pc, end);
            entry.jump_pc = switch.pc;
            entry.expr = Some(switch.key);
            entry.break_pc = Some(end);
            self.out.table.add(entry);
        }
    }

    /// Turns the exception table into try/catch blocks, one group per protected range.
    fn build_try_blocks(&mut self) {
        let code = self.code;
        let mut groups: BTreeMap<(usize, Reverse<usize>), Vec<&ExceptionEntry>> = BTreeMap::new();
        for entry in code.exceptions() {
            if !self.used_handlers.contains(&entry.handler_pc) {
                groups
                    .entry((entry.start_pc, Reverse(entry.end_pc)))
                    .or_default()
                    .push(entry);
            }
        }
        let mut regions: Vec<(usize, usize)> = Vec::new();
        for ((start, _), group) in groups {
            let catch_all = group.iter().all(|e| e.catch_type.is_none());
            if catch_all && regions.iter().any(|(s, e)| *s <= start && start < *e) {
                continue;
            }
            let mut handlers: BTreeMap<usize, Vec<Option<&str>>> = BTreeMap::new();
            for entry in &group {
                handlers
                    .entry(entry.handler_pc)
                    .or_default()
                    .push(entry.catch_type.as_deref());
            }
            let Some(&first) = handlers.keys().next() else {
                continue;
            };
            if first <= start {
                continue;
            }
            let region_end = match code.before(first) {
                Some((goto, Op::Goto(target))) if *target > first => {
                    self.out.silent.insert(goto.index);
                    *target
                }
                _ => code.code_end,
            };
            let kind = if catch_all {
                BranchKind::TryAny
            } else {
                BranchKind::Try
            };
            self.out.table.add(BranchEntry::new(kind, start, first));

            let pcs: Vec<usize> = handlers.keys().copied().collect();
            for (i, handler) in pcs.iter().enumerate() {
                let end = pcs.get(i + 1).copied().unwrap_or(region_end);
                let types = &handlers[handler];
                let any = types.iter().any(Option::is_none);
                if any {
                    if let Some((sub_start, sub_end)) = self.finally_subroutine(*handler) {
                        self.out.hidden.push((*handler, sub_start));
                        let mut finally = BranchEntry::new(BranchKind::Jsr, sub_start, sub_end);
                        finally.labels.push("finally".into());
                        self.out.table.add(finally);
                        continue;
                    }
                }
                if let Some((goto, Op::Goto(target))) = code.before(end) {
                    if *target == region_end && goto.index >= *handler {
                        self.out.silent.insert(goto.index);
                    }
                }
                let type_text = if any {
                    code.imports.class_name(THROWABLE)
                } else {
                    types
                        .iter()
                        .flatten()
                        .map(|t| code.imports.class_name(t))
                        .collect::<Vec<_>>()
                        .join(" | ")
                };
                let kind = if any {
                    BranchKind::CatchAny
                } else {
                    BranchKind::Catch
                };
                let mut catch = BranchEntry::new(kind, *handler, end);
                catch
                    .labels
                    .push(format!("{} {}", type_text, self.exception_name(*handler, any, types)));
                self.out.table.add(catch);
            }
            regions.push((first, region_end));
        }
    }

    /// Name of the variable a handler stores its exception into.
    fn exception_name(&self, handler: usize, any: bool, types: &[Option<&str>]) -> String {
        if let Some((_, Op::Store(_, slot))) = self.code.at(handler) {
            if let Some(entry) = self.symtab.lookup(*slot, handler) {
                return entry.name.clone();
            }
        }
        let class = match (any, types.first()) {
            (false, Some(Some(class))) => *class,
            _ => THROWABLE,
        };
        simple_class_name(class).to_lowercase()
    }

    /// `jsr` near the start of a catch-all handler: the `[start, end)` of the
    /// subroutine it calls, ending after its `ret`.
    fn finally_subroutine(&self, handler: usize) -> Option<(usize, usize)> {
        let target = self
            .code
            .steps()
            .skip_while(|(i, _)| i.index < handler)
            .take(FINALLY_JSR_WINDOW)
            .find_map(|(_, op)| match op {
                Op::Jsr(target) => Some(*target),
                _ => None,
            })?;
        let end = self
            .code
            .steps()
            .find(|(i, op)| i.index >= target && matches!(op, Op::Ret(_)))
            .map_or(self.code.code_end, |(i, _)| i.next_index());
        Some((target, end))
    }
}

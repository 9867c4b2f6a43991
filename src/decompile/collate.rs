//! The collating table: turns the raw entries of the branch pass into properly nested
//! blocks.
//!
//! Conditional jumps chained through their targets become one `&&`/`||` expression,
//! loops are recognised in both javac shapes, `goto`s over a following block become
//! `else`/`else if`, and the result is sorted and checked for crossing ranges.

use log::debug;

use crate::error::RevEngineError;

use super::branch::{BranchEntry, BranchKind};
use super::branch_builder::BranchAnalysis;
use super::method::MethodCode;
use super::op::Op;
use super::operand::{logical, Operand};

pub fn collate(analysis: &mut BranchAnalysis, code: &MethodCode<'_>) -> Result<(), RevEngineError> {
    let (conditions, mut others): (Vec<BranchEntry>, Vec<BranchEntry>) = analysis
        .table
        .entries()
        .iter()
        .cloned()
        .partition(|e| e.kind.is_conditional() && e.taken.is_some());
    others.extend(fold_conditions(conditions)?);
    analysis.table.retain(|_| false);
    for entry in others {
        analysis.table.add(entry);
    }
    promote_loops(analysis, code);
    add_infinite_loops(analysis, code);
    add_else_blocks(analysis, code);
    analysis.table.sort_and_verify()?;
    debug!(
        "{}: {} branch entries after collation",
        code.method.name,
        analysis.table.len()
    );
    Ok(())
}

/// Pcs the jump goes to when the whole condition holds, and when it does not.
fn truth_targets(entry: &BranchEntry) -> (usize, usize) {
    match entry.kind {
        BranchKind::DoWhile => (entry.target, entry.next_pc),
        _ => (entry.next_pc, entry.target),
    }
}

/// Merges runs of adjacent conditional jumps that jump into each other's true or false
/// targets into one entry carrying the combined boolean expression.
pub fn fold_conditions(mut entries: Vec<BranchEntry>) -> Result<Vec<BranchEntry>, RevEngineError> {
    entries.sort_by_key(|e| e.jump_pc);
    let mut folded = Vec::with_capacity(entries.len());
    let mut end = entries.len();
    while end > 0 {
        let last = end - 1;
        let (t, f) = truth_targets(&entries[last]);
        let mut first = last;
        while first > 0 {
            let pred = &entries[first - 1];
            if pred.next_pc != entries[first].cond_pc || pred.target == pred.next_pc {
                break;
            }
            let joins = pred.target == t
                || pred.target == f
                || entries[first..=last].iter().any(|e| e.cond_pc == pred.target);
            if !joins {
                break;
            }
            first -= 1;
        }
        if first == last {
            folded.push(entries[last].clone());
        } else {
            folded.push(merge_chain(&entries[first..=last], t, f)?);
        }
        end = first;
    }
    folded.reverse();
    Ok(folded)
}

fn merge_chain(chain: &[BranchEntry], t: usize, f: usize) -> Result<BranchEntry, RevEngineError> {
    let expr = combine(chain, t, f)?;
    let head = &chain[0];
    let mut merged = chain[chain.len() - 1].clone();
    merged.cond_pc = head.cond_pc;
    if merged.kind == BranchKind::DoWhile {
        merged.continue_pc = Some(head.cond_pc);
    } else {
        merged.start = head.start;
    }
    merged.ternary = chain.iter().any(|e| e.ternary);
    merged.expr = Some(expr);
    debug!(
        "folded {} jumps at {}..{} into `{}`",
        chain.len(),
        head.jump_pc,
        merged.jump_pc,
        merged.condition()
    );
    Ok(merged)
}

fn taken(entry: &BranchEntry) -> Result<Operand, RevEngineError> {
    entry
        .taken
        .clone()
        .ok_or_else(|| RevEngineError::Collation(format!("no condition at {}", entry.jump_pc)))
}

fn not_taken(entry: &BranchEntry) -> Result<Operand, RevEngineError> {
    entry
        .not_taken
        .clone()
        .ok_or_else(|| RevEngineError::Collation(format!("no condition at {}", entry.jump_pc)))
}

/// The expression under which control reaches `t` rather than `f`.
fn combine(chain: &[BranchEntry], t: usize, f: usize) -> Result<Operand, RevEngineError> {
    let Some((first, rest)) = chain.split_first() else {
        return Err(RevEngineError::Collation("empty condition chain".into()));
    };
    if rest.is_empty() {
        return match first.target {
            target if target == t => taken(first),
            target if target == f => not_taken(first),
            target => Err(RevEngineError::Collation(format!(
                "jump at {} to {} leaves the condition",
                first.jump_pc, target
            ))),
        };
    }
    if first.target == f {
        return Ok(logical(&not_taken(first)?, "&&", &combine(rest, t, f)?));
    }
    if first.target == t {
        return Ok(logical(&taken(first)?, "||", &combine(rest, t, f)?));
    }
    let split = chain
        .iter()
        .position(|e| e.cond_pc == first.target)
        .filter(|k| *k > 0)
        .ok_or_else(|| {
            RevEngineError::Collation(format!(
                "jump at {} to {} is not part of the condition",
                first.jump_pc, first.target
            ))
        })?;
    let (group, rest) = chain.split_at(split);
    let inner = rest[0].cond_pc;
    match group[group.len() - 1].target {
        target if target == f => Ok(logical(&combine(group, inner, f)?, "&&", &combine(rest, t, f)?)),
        target if target == t => Ok(logical(&combine(group, t, inner)?, "||", &combine(rest, t, f)?)),
        target => Err(RevEngineError::Collation(format!(
            "condition group ending at {} jumps to {}",
            group[group.len() - 1].jump_pc,
            target
        ))),
    }
}

/// Both javac loop shapes become `while`: a bottom test entered through a leading
/// `goto`, and a top test closed by a backward `goto`.
fn promote_loops(analysis: &mut BranchAnalysis, code: &MethodCode<'_>) {
    let gotos = &analysis.gotos;
    for entry in analysis.table.entries_mut() {
        match entry.kind {
            BranchKind::DoWhile => {
                let entry_goto = gotos.iter().find(|(pc, target)| {
                    **target == entry.cond_pc
                        && code.at(**pc).is_some_and(|(i, _)| i.next_index() == entry.start)
                });
                if let Some((&goto, _)) = entry_goto {
                    entry.kind = BranchKind::While;
                    entry.start = goto;
                    analysis.silent.insert(goto);
                }
            }
            BranchKind::If if !entry.ternary => {
                if let Some((back, Op::Goto(target))) = code.before(entry.target) {
                    if *target == entry.start && back.index > entry.jump_pc {
                        entry.kind = BranchKind::While;
                        entry.end = entry.target;
                        entry.continue_pc = Some(entry.start);
                        entry.break_pc = Some(entry.target);
                        analysis.silent.insert(back.index);
                    }
                }
            }
            _ => {}
        }
    }
}

/// A backward `goto` that does not continue an enclosing loop closes a `while (true)`.
fn add_infinite_loops(analysis: &mut BranchAnalysis, code: &MethodCode<'_>) {
    let back_gotos: Vec<(usize, usize)> = analysis
        .gotos
        .iter()
        .filter(|&(pc, target)| target <= pc && !analysis.silent.contains(pc))
        .map(|(pc, target)| (*pc, *target))
        .collect();
    for (pc, target) in back_gotos {
        let continues = analysis.table.entries().iter().any(|e| {
            e.kind.is_loop()
                && e.contains(pc)
                && (e.continue_pc == Some(target) || e.start == target)
        });
        if continues {
            continue;
        }
        let Some((goto, _)) = code.at(pc) else {
            continue;
        };
        let end = goto.next_index();
        let mut entry = BranchEntry::new(BranchKind::While, target, end);
        entry.continue_pc = Some(target);
        entry.break_pc = Some(end);
        analysis.table.add(entry);
        analysis.silent.insert(pc);
    }
}

/// Innermost loop or switch containing `pc`.
fn breakable_at(entries: &[BranchEntry], pc: usize) -> Option<&BranchEntry> {
    entries
        .iter()
        .filter(|e| (e.kind.is_loop() || e.kind == BranchKind::Switch) && e.contains(pc))
        .min_by_key(|e| e.end - e.start)
}

/// Innermost block other than `inner` itself that contains all of `inner`.
fn enclosing<'e>(entries: &'e [BranchEntry], inner: &BranchEntry) -> Option<&'e BranchEntry> {
    entries
        .iter()
        .filter(|e| !e.ternary && e != &inner)
        .filter(|e| e.start <= inner.start && inner.end <= e.end)
        .filter(|e| (e.start, e.end) != (inner.start, inner.end) || e.kind < inner.kind)
        .min_by_key(|e| e.end - e.start)
}

/// A `goto` ending the body of an `if` jumps over the `else` part.
fn add_else_blocks(analysis: &mut BranchAnalysis, code: &MethodCode<'_>) {
    let mut order: Vec<usize> = (0..analysis.table.len())
        .filter(|&i| {
            let e = &analysis.table.entries()[i];
            matches!(e.kind, BranchKind::If | BranchKind::ElseIf) && !e.ternary
        })
        .collect();
    order.sort_by_key(|&i| analysis.table.entries()[i].start);
    for index in order {
        let entry = analysis.table.entries()[index].clone();
        let Some((goto, Op::Goto(target))) = code.before(entry.target) else {
            continue;
        };
        let (goto_pc, else_start, mut else_end) = (goto.index, goto.next_index(), *target);
        if goto_pc <= entry.jump_pc || else_end <= goto_pc || else_end == else_start {
            continue;
        }
        if analysis.silent.contains(&goto_pc) {
            continue;
        }
        let entries = analysis.table.entries();
        if let Some(outer) = breakable_at(entries, goto_pc) {
            if outer.break_pc == Some(else_end) || outer.continue_pc == Some(else_end) {
                continue;
            }
        }
        if entries
            .iter()
            .any(|e| e.kind == BranchKind::Case && e.start == else_start)
        {
            continue;
        }
        if let Some(outer) = enclosing(entries, &entry) {
            if else_end > outer.end {
                if outer.kind.is_loop() || outer.kind == BranchKind::Switch {
                    continue;
                }
                else_end = outer.end;
            }
        }
        let follower = entries.iter().position(|e| {
            e.kind == BranchKind::If
                && !e.ternary
                && e.start == else_start
                && (e.target == else_end
                    || matches!(code.before(e.target), Some((_, Op::Goto(t))) if *t == else_end))
        });
        match follower {
            Some(follower) => {
                if let Some(e) = analysis.table.get_mut(follower) {
                    e.kind = BranchKind::ElseIf;
                }
            }
            None => {
                analysis
                    .table
                    .add(BranchEntry::new(BranchKind::Else, else_start, else_end));
            }
        }
        analysis.silent.insert(goto_pc);
    }
}

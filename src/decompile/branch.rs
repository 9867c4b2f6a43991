use std::fmt;

use crate::error::RevEngineError;

use super::operand::Operand;

/// Kind of a structured block. Declaration order is the tie-break when two blocks
/// share a range: outer constructs first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BranchKind {
    Try,
    TryAny,
    Sync,
    Jsr,
    While,
    DoWhile,
    Switch,
    Case,
    Catch,
    CatchAny,
    Else,
    ElseIf,
    If,
}

impl BranchKind {
    pub fn is_loop(self) -> bool {
        matches!(self, BranchKind::While | BranchKind::DoWhile)
    }

    /// Blocks created by a conditional jump.
    pub fn is_conditional(self) -> bool {
        matches!(self, BranchKind::If | BranchKind::ElseIf | BranchKind::DoWhile)
    }

    pub fn is_try(self) -> bool {
        matches!(self, BranchKind::Try | BranchKind::TryAny)
    }

    pub fn is_catch(self) -> bool {
        matches!(self, BranchKind::Catch | BranchKind::CatchAny)
    }

    /// Blocks written as a continuation of the block that closes right before them.
    pub fn continues_previous(self) -> bool {
        matches!(
            self,
            BranchKind::Else
                | BranchKind::ElseIf
                | BranchKind::Catch
                | BranchKind::CatchAny
                | BranchKind::Jsr
        )
    }
}

/// One structured region of a method's bytecode, `[start, end)` in pcs.
///
/// Conditional entries also remember the jump they came from: `cond_pc` is where the
/// condition's code starts, `jump_pc` the jump itself, `next_pc` the instruction after
/// it and `target` where it goes when taken.
#[derive(Clone, Debug, PartialEq)]
pub struct BranchEntry {
    pub kind: BranchKind,
    pub start: usize,
    pub end: usize,
    pub cond_pc: usize,
    pub jump_pc: usize,
    pub next_pc: usize,
    pub target: usize,
    /// Jump condition when taken.
    pub taken: Option<Operand>,
    /// Jump condition when not taken.
    pub not_taken: Option<Operand>,
    /// Header expression: the condition, switch key or lock.
    pub expr: Option<Operand>,
    /// Case labels, or the `Type name` declaration of a catch block.
    pub labels: Vec<String>,
    pub ternary: bool,
    pub break_pc: Option<usize>,
    pub continue_pc: Option<usize>,
    pub written: bool,
}

impl BranchEntry {
    pub fn new(kind: BranchKind, start: usize, end: usize) -> Self {
        BranchEntry {
            kind,
            start,
            end,
            cond_pc: start,
            jump_pc: start,
            next_pc: start,
            target: end,
            taken: None,
            not_taken: None,
            expr: None,
            labels: Vec::new(),
            ternary: false,
            break_pc: None,
            continue_pc: None,
            written: false,
        }
    }

    pub fn contains(&self, pc: usize) -> bool {
        self.start <= pc && pc < self.end
    }

    /// Condition text of the header, `true` for unconditional loops.
    pub fn condition(&self) -> &str {
        self.expr.as_ref().map_or("true", |e| e.value.as_str())
    }
}

impl fmt::Display for BranchEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} [{}, {})", self.kind, self.start, self.end)
    }
}

/// All structured regions of one method.
#[derive(Clone, Debug, Default)]
pub struct BranchTable {
    entries: Vec<BranchEntry>,
}

impl BranchTable {
    pub fn add(&mut self, entry: BranchEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub fn entries(&self) -> &[BranchEntry] {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut [BranchEntry] {
        &mut self.entries
    }

    pub fn get(&self, index: usize) -> Option<&BranchEntry> {
        self.entries.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut BranchEntry> {
        self.entries.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn retain(&mut self, keep: impl FnMut(&BranchEntry) -> bool) {
        self.entries.retain(keep);
    }

    /// The ternary entry whose false arm starts at `else_start`.
    pub fn ternary_for(&self, else_start: usize) -> Option<&BranchEntry> {
        self.entries
            .iter()
            .filter(|e| e.ternary && e.target == else_start)
            .max_by_key(|e| e.jump_pc)
    }

    fn sort(&mut self) {
        self.entries
            .sort_by(|a, b| (a.start, b.end, a.kind).cmp(&(b.start, a.end, b.kind)));
    }

    /// Orders entries outermost first and checks that every pair is either disjoint or
    /// nested. A catch block reaching past its enclosing block is cut back to it, and an
    /// enclosing try or catch is stretched over a try that starts inside it and ends
    /// after it. Any other crossing is an error.
    pub fn sort_and_verify(&mut self) -> Result<(), RevEngineError> {
        self.sort();
        let mut open: Vec<usize> = Vec::new();
        for index in 0..self.entries.len() {
            if self.entries[index].ternary {
                continue;
            }
            let start = self.entries[index].start;
            while open.last().is_some_and(|&top| self.entries[top].end <= start) {
                open.pop();
            }
            if let Some(&parent) = open.last() {
                if self.entries[index].end > self.entries[parent].end {
                    self.repair(&open, index)?;
                }
            }
            open.push(index);
        }
        self.sort();
        Ok(())
    }

    fn repair(&mut self, open: &[usize], index: usize) -> Result<(), RevEngineError> {
        let parent = open[open.len() - 1];
        let inner_kind = self.entries[index].kind;
        let parent_kind = self.entries[parent].kind;
        if inner_kind.is_catch() {
            self.entries[index].end = self.entries[parent].end;
            return Ok(());
        }
        if inner_kind.is_try() && (parent_kind.is_try() || parent_kind.is_catch()) {
            let end = self.entries[index].end;
            if let Some(&grandparent) = open.len().checked_sub(2).and_then(|i| open.get(i)) {
                if end > self.entries[grandparent].end {
                    return Err(self.overlap(grandparent, index));
                }
            }
            self.entries[parent].end = end;
            return Ok(());
        }
        Err(self.overlap(parent, index))
    }

    fn overlap(&self, outer: usize, inner: usize) -> RevEngineError {
        RevEngineError::BlockOverlap {
            outer: self.entries[outer].to_string(),
            inner: self.entries[inner].to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(table: &BranchTable) -> Vec<(BranchKind, usize, usize)> {
        table.entries().iter().map(|e| (e.kind, e.start, e.end)).collect()
    }

    #[test]
    fn test_nesting_order() {
        let mut table = BranchTable::default();
        table.add(BranchEntry::new(BranchKind::If, 10, 20));
        table.add(BranchEntry::new(BranchKind::While, 2, 30));
        table.add(BranchEntry::new(BranchKind::Try, 2, 30));
        table.add(BranchEntry::new(BranchKind::Else, 20, 28));
        table.sort_and_verify().unwrap();
        assert_eq!(
            kinds(&table),
            vec![
                (BranchKind::Try, 2, 30),
                (BranchKind::While, 2, 30),
                (BranchKind::If, 10, 20),
                (BranchKind::Else, 20, 28),
            ]
        );
    }

    #[test]
    fn test_crossing_blocks_fail() {
        let mut table = BranchTable::default();
        table.add(BranchEntry::new(BranchKind::If, 0, 20));
        table.add(BranchEntry::new(BranchKind::While, 10, 30));
        let err = table.sort_and_verify().unwrap_err();
        assert!(matches!(err, RevEngineError::BlockOverlap { .. }));
        assert_eq!(
            err.to_string(),
            "block While [10, 30) overlaps block If [0, 20)"
        );
    }

    #[test]
    fn test_catch_is_clamped_to_parent() {
        let mut table = BranchTable::default();
        table.add(BranchEntry::new(BranchKind::If, 0, 40));
        table.add(BranchEntry::new(BranchKind::Catch, 30, 50));
        table.sort_and_verify().unwrap();
        assert_eq!(kinds(&table)[1], (BranchKind::Catch, 30, 40));
    }

    #[test]
    fn test_enclosing_catch_swallows_nested_try() {
        let mut table = BranchTable::default();
        table.add(BranchEntry::new(BranchKind::Catch, 20, 30));
        table.add(BranchEntry::new(BranchKind::Try, 25, 45));
        table.sort_and_verify().unwrap();
        assert_eq!(kinds(&table)[0], (BranchKind::Catch, 20, 45));
    }

    #[test]
    fn test_ternary_entries_are_ignored() {
        let mut table = BranchTable::default();
        table.add(BranchEntry::new(BranchKind::If, 0, 20));
        let mut ternary = BranchEntry::new(BranchKind::If, 15, 25);
        ternary.ternary = true;
        table.add(ternary);
        assert!(table.sort_and_verify().is_ok());
        assert_eq!(table.ternary_for(25).map(|e| e.start), Some(15));
    }
}

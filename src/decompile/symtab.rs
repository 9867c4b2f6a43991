use std::collections::BTreeSet;

use log::debug;

use crate::class_info::LocalVariable;
use crate::error::RevEngineError;

use super::descriptor::{parse_method_descriptor, simple_class_name, JvmType};
use super::frame::{Effect, LocalResolver};
use super::method::MethodCode;
use super::op::{InvokeKind, Op};
use super::operand::OperandKind;

const KEYWORDS: &[&str] = &[
    "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class",
    "const", "continue", "default", "do", "double", "else", "enum", "extends", "false",
    "final", "finally", "float", "for", "goto", "if", "implements", "import", "instanceof",
    "int", "interface", "long", "native", "new", "null", "package", "private", "protected",
    "public", "return", "short", "static", "strictfp", "super", "switch", "synchronized",
    "this", "throw", "throws", "transient", "true", "try", "var", "void", "volatile", "while",
];

/// One live range of a local variable slot.
#[derive(Clone, Debug, PartialEq)]
pub struct LocalEntry {
    pub slot: u16,
    /// Pc of the store that starts the live range (0 for arguments).
    pub store_pc: usize,
    pub ty: JvmType,
    pub name: String,
    /// Set once a declaration has been written (arguments start declared).
    pub declared: bool,
    /// Highest pc that reads or writes the variable.
    pub last_ref: usize,
    pub is_arg: bool,
    /// Holds the exception or return address a handler or subroutine starts with.
    pub is_handler: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
enum InterfaceUse {
    #[default]
    None,
    Only(String),
    Mixed,
}

#[derive(Clone, Debug, Default)]
struct Usage {
    loads: usize,
    interface_calls: usize,
    interface: InterfaceUse,
    from_debug_info: bool,
}

/// Types and names of every local variable of a method.
///
/// A slot may hold several entries with different live ranges. Lookup by (slot, pc)
/// picks the entry with the greatest store pc not after the query pc.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    entries: Vec<LocalEntry>,
    usage: Vec<Usage>,
    debug_names: Vec<LocalVariable>,
    named: bool,
}

impl SymbolTable {
    /// Table holding just the pre-declared arguments (and `this`).
    pub fn with_arguments(
        this_class: &str,
        params: &[JvmType],
        is_static: bool,
        debug_names: &[LocalVariable],
    ) -> Self {
        let mut table = SymbolTable {
            debug_names: debug_names.to_vec(),
            ..Default::default()
        };
        let mut slot = 0u16;
        if !is_static {
            table.push_arg(0, JvmType::Reference(this_class.to_string()), Some("this".into()));
            slot = 1;
        }
        for ty in params {
            let name = table
                .debug_names
                .iter()
                .find(|v| v.slot == slot && v.start_pc == 0)
                .map(|v| v.name.clone());
            table.push_arg(slot, ty.clone(), name);
            slot += if ty.is_wide() { 2 } else { 1 };
        }
        table
    }

    fn push_arg(&mut self, slot: u16, ty: JvmType, name: Option<String>) {
        let from_debug_info = name.is_some();
        self.entries.push(LocalEntry {
            slot,
            store_pc: 0,
            ty,
            name: name.unwrap_or_default(),
            declared: true,
            last_ref: 0,
            is_arg: true,
            is_handler: false,
        });
        self.usage.push(Usage {
            from_debug_info,
            ..Default::default()
        });
    }

    pub fn entries(&self) -> &[LocalEntry] {
        &self.entries
    }

    pub fn args(&self) -> impl Iterator<Item = &LocalEntry> {
        self.entries.iter().filter(|e| e.is_arg)
    }

    fn lookup_index(&self, slot: u16, pc: usize) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.slot == slot && e.store_pc <= pc)
            .max_by_key(|(i, e)| (e.store_pc, *i))
            .map(|(i, _)| i)
    }

    /// The entry live at `pc` for `slot`, if the slot has been stored by then.
    pub fn lookup(&self, slot: u16, pc: usize) -> Option<&LocalEntry> {
        self.lookup_index(slot, pc).map(|i| &self.entries[i])
    }

    /// Like [`SymbolTable::lookup`], falling back to the first entry of the slot when
    /// the read precedes every store in code order.
    fn resolve_index(&self, slot: u16, pc: usize) -> Option<usize> {
        self.lookup_index(slot, pc).or_else(|| {
            self.entries
                .iter()
                .enumerate()
                .filter(|(_, e)| e.slot == slot)
                .min_by_key(|(_, e)| e.store_pc)
                .map(|(i, _)| i)
        })
    }

    pub fn resolve(&self, slot: u16, pc: usize) -> Option<&LocalEntry> {
        self.resolve_index(slot, pc).map(|i| &self.entries[i])
    }

    fn debug_name(&self, slot: u16, live_from: usize) -> Option<&LocalVariable> {
        self.debug_names.iter().find(|v| {
            v.slot == slot && v.start_pc <= live_from && live_from <= v.start_pc + v.length
        })
    }

    /// Records a store of a `ty` value into `slot` at `pc`, reusing the live entry when
    /// its type is compatible. Returns the entry index.
    pub fn record_store(&mut self, slot: u16, pc: usize, next_pc: usize, ty: JvmType) -> usize {
        let debug = self.debug_name(slot, next_pc).cloned();
        let ty = match &debug {
            Some(var) if var.ty != JvmType::Unknown => var.ty.clone(),
            _ => ty,
        };
        if let Some(index) = self.lookup_index(slot, pc) {
            let same_variable = match &debug {
                Some(var) => var.name == self.entries[index].name || !self.usage[index].from_debug_info,
                None => true,
            };
            let entry = &mut self.entries[index];
            if same_variable && entry.ty.is_compatible(&ty) {
                entry.last_ref = entry.last_ref.max(pc);
                if !entry.declared && !entry.is_arg {
                    if entry.ty.is_less_specific_than(&ty) {
                        entry.ty = ty;
                    } else if entry.ty != ty
                        && !ty.is_less_specific_than(&entry.ty)
                        && entry.ty.is_reference()
                    {
                        // two unrelated classes share the variable
                        entry.ty = JvmType::object();
                    }
                }
                return index;
            }
        }
        self.push_local(slot, pc, ty, debug, false)
    }

    /// Records the store that saves a handler's exception (or a subroutine's return
    /// address). It always starts a live range of its own, declared by the block header.
    pub fn record_handler_store(&mut self, slot: u16, pc: usize, next_pc: usize, ty: JvmType) -> usize {
        let debug = self.debug_name(slot, next_pc).cloned();
        let ty = match &debug {
            Some(var) if var.ty != JvmType::Unknown => var.ty.clone(),
            _ => ty,
        };
        self.push_local(slot, pc, ty, debug, true)
    }

    fn push_local(
        &mut self,
        slot: u16,
        pc: usize,
        ty: JvmType,
        debug: Option<LocalVariable>,
        is_handler: bool,
    ) -> usize {
        let from_debug_info = debug.is_some();
        self.entries.push(LocalEntry {
            slot,
            store_pc: pc,
            ty,
            name: debug.map(|v| v.name).unwrap_or_default(),
            declared: false,
            last_ref: pc,
            is_arg: false,
            is_handler,
        });
        self.usage.push(Usage {
            from_debug_info,
            ..Default::default()
        });
        self.entries.len() - 1
    }

    /// Marks `slot` as read or written at `pc`.
    pub fn record_ref(&mut self, slot: u16, pc: usize) {
        if let Some(index) = self.resolve_index(slot, pc) {
            let entry = &mut self.entries[index];
            entry.last_ref = entry.last_ref.max(pc);
        }
    }

    fn record_load(&mut self, slot: u16, pc: usize) {
        self.record_ref(slot, pc);
        if let Some(index) = self.resolve_index(slot, pc) {
            self.usage[index].loads += 1;
        }
    }

    fn record_interface_call(&mut self, slot: u16, pc: usize, owner: &str) {
        if let Some(index) = self.resolve_index(slot, pc) {
            let usage = &mut self.usage[index];
            usage.interface_calls += 1;
            usage.interface = match &usage.interface {
                InterfaceUse::None => InterfaceUse::Only(owner.to_string()),
                InterfaceUse::Only(o) if o == owner => InterfaceUse::Only(owner.to_string()),
                _ => InterfaceUse::Mixed,
            };
        }
    }

    /// Retypes the variable live at (`slot`, `pc`) to `ty` and renames it to match.
    /// Only variables whose declaration has not been written yet can change.
    pub fn touch_variable(&mut self, slot: u16, pc: usize, ty: JvmType) -> bool {
        let Some(index) = self.lookup_index(slot, pc) else {
            return false;
        };
        let entry = &self.entries[index];
        if entry.declared || entry.is_arg || !entry.ty.is_compatible(&ty) || entry.ty == ty {
            return false;
        }
        debug!("retyping local {} from {:?} to {:?}", entry.name, entry.ty, ty);
        self.entries[index].ty = ty;
        if self.named && !self.usage[index].from_debug_info {
            self.entries[index].name.clear();
            self.assign_name(index);
        }
        true
    }

    /// Marks an entry as declared.
    pub fn declare(&mut self, slot: u16, pc: usize) {
        if let Some(index) = self.resolve_index(slot, pc) {
            self.entries[index].declared = true;
        }
    }

    /// Entries that have not been declared yet, first stored in `[start, end)` and
    /// still referenced at or after `end`.
    pub fn escaping(&self, start: usize, end: usize) -> Vec<&LocalEntry> {
        self.entries
            .iter()
            .filter(|e| !e.declared && !e.is_arg && !e.is_handler)
            .filter(|e| e.store_pc >= start && e.store_pc < end && e.last_ref >= end)
            .collect()
    }

    pub fn declare_entry(&mut self, entry: &LocalEntry) {
        if let Some(found) = self
            .entries
            .iter_mut()
            .find(|e| e.slot == entry.slot && e.store_pc == entry.store_pc && !e.is_arg)
        {
            found.declared = true;
        }
    }

    /// Narrows variables whose every use is an `invokeinterface` on one interface.
    fn retype_interface_locals(&mut self) {
        for index in 0..self.entries.len() {
            let usage = &self.usage[index];
            let InterfaceUse::Only(owner) = &usage.interface else {
                continue;
            };
            if usage.loads == 0 || usage.loads != usage.interface_calls || usage.from_debug_info {
                continue;
            }
            if !matches!(&self.entries[index].ty, JvmType::Reference(name) if name != owner) {
                continue;
            }
            let owner = owner.clone();
            let (slot, store_pc) = (self.entries[index].slot, self.entries[index].store_pc);
            self.touch_variable(slot, store_pc, JvmType::Reference(owner));
        }
    }

    /// Gives every unnamed entry a unique generated name.
    pub fn assign_names(&mut self) {
        for index in 0..self.entries.len() {
            if self.entries[index].name.is_empty() {
                self.assign_name(index);
            }
        }
        self.named = true;
    }

    fn assign_name(&mut self, index: usize) {
        let taken: BTreeSet<&str> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .map(|(_, e)| e.name.as_str())
            .filter(|n| !n.is_empty())
            .collect();
        let entry = &self.entries[index];
        let name = generate_name(&entry.ty, entry.slot, entry.store_pc, &taken);
        self.entries[index].name = name;
    }
}

fn base_name(ty: &JvmType) -> Option<String> {
    match ty {
        JvmType::Reference(name) => Some(simple_class_name(name).to_lowercase()),
        JvmType::Array(inner) => {
            let mut elem = inner.as_ref();
            while let JvmType::Array(next) = elem {
                elem = next;
            }
            let elem_name = match elem.primitive_name() {
                Some(p) => p.to_string(),
                None => base_name(elem).unwrap_or_else(|| "object".into()),
            };
            Some(format!("{}Arr", elem_name))
        }
        JvmType::Null | JvmType::Unknown => Some("object".into()),
        JvmType::Address => Some("ret".into()),
        _ => None,
    }
}

fn generate_name(ty: &JvmType, slot: u16, store_pc: usize, taken: &BTreeSet<&str>) -> String {
    let free = |n: &str| !taken.contains(n) && !KEYWORDS.contains(&n);
    match base_name(ty) {
        None => ('i'..='z')
            .chain('a'..='h')
            .map(String::from)
            .find(|n| free(n))
            .unwrap_or_else(|| format!("v{}", slot)),
        Some(base) => [
            base.clone(),
            format!("{}{}", base, slot),
            format!("{}{}_{}", base, slot, store_pc),
        ]
        .into_iter()
        .find(|n| free(n))
        .unwrap_or_else(|| format!("v{}_{}", slot, store_pc)),
    }
}

/// Read-only resolver over a named table.
pub struct Names<'t>(pub &'t SymbolTable);

impl LocalResolver for Names<'_> {
    fn load(&mut self, slot: u16, pc: usize, ty: &JvmType) -> (String, JvmType) {
        match self.0.resolve(slot, pc) {
            Some(entry) => (entry.name.clone(), entry.ty.clone()),
            None => (format!("v{}", slot), ty.clone()),
        }
    }
}

/// Resolver used while the table is being built: every read is recorded, and a read
/// of a slot nothing has stored yet creates the entry.
struct Recorder<'t> {
    table: &'t mut SymbolTable,
}

impl LocalResolver for Recorder<'_> {
    fn load(&mut self, slot: u16, pc: usize, ty: &JvmType) -> (String, JvmType) {
        if self.table.resolve_index(slot, pc).is_none() {
            self.table.record_store(slot, pc, pc, ty.clone());
        }
        self.table.record_load(slot, pc);
        Names(&*self.table).load(slot, pc, ty)
    }
}

/// Runs the symbol-table pass over a method: a type-only walk of the instructions that
/// records every store, read and `invokeinterface` receiver, then names the entries.
pub fn build(code: &MethodCode<'_>) -> Result<SymbolTable, RevEngineError> {
    let mut table = SymbolTable::with_arguments(
        &code.class.this_class,
        &code.method.params,
        code.method.is_static(),
        code.local_variables(),
    );
    let mut frame = code.frame();
    for (ins, op) in code.steps() {
        let pc = ins.index;
        if let Some(placeholder) = code.placeholders.get(&pc) {
            frame.stack.clear();
            frame.stack.push(placeholder.clone());
        }
        if let Op::Invoke(InvokeKind::Interface, index) = op {
            if let Ok(member) = code.class.pool.member_ref(*index) {
                let argc = parse_method_descriptor(&member.descriptor).map_or(0, |(p, _)| p.len());
                if let Some(OperandKind::Local(slot)) = frame.stack.peek(argc).map(|o| &o.kind) {
                    table.record_interface_call(*slot, pc, &member.class);
                }
            }
        }
        let effect = frame.execute(pc, op, &mut Recorder { table: &mut table })?;
        match effect {
            Effect::Store { slot, ty, value } => {
                if matches!(value.kind, OperandKind::Exception | OperandKind::ReturnAddress) {
                    table.record_handler_store(slot, pc, ins.next_index(), ty);
                } else {
                    table.record_store(slot, pc, ins.next_index(), ty);
                }
            }
            Effect::Iinc { slot, .. } | Effect::Ret(slot) => table.record_ref(slot, pc),
            _ => {}
        }
    }
    table.assign_names();
    table.retype_interface_locals();
    debug!(
        "{}: {} symbol table entries",
        code.method.name,
        table.entries.len()
    );
    Ok(table)
}

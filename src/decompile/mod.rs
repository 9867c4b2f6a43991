//! Reverse engineering of method bodies.
//!
//! Each method goes through three passes over the same normalized instruction list:
//! the symbol-table pass ([`symtab`]) types and names local variables, the branch pass
//! ([`branch_builder`] then [`collate`]) builds the nested block table, and the
//! rendering pass ([`context`]) writes statements inside those blocks.

pub mod branch;
pub mod branch_builder;
pub mod collate;
pub mod context;
pub mod descriptor;
pub mod disassembler;
pub mod frame;
pub mod imports;
pub mod method;
pub mod op;
pub mod operand;
pub mod serializer;
pub mod symtab;

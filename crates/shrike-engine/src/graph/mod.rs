//! Program graph
//!
//! Interned items, definitions, method bodies and the class hierarchy that
//! every optimization pass reads and rewrites.

pub mod access;
pub mod class;
pub mod code;
pub mod hierarchy;
pub mod items;
pub mod program;

pub use access::AccessFlags;
pub use class::{ClassDef, ClassKind, EncodedField, EncodedMethod};
pub use code::{Code, Label, LogicalOp, ReferenceTable, RegisterCode, StackInstr, StackKind};
pub use hierarchy::Hierarchy;
pub use items::{
    FieldId, FieldRef, ItemFactory, KnownItems, MethodId, MethodRef, MethodSignature, Proto,
    ProtoId, Symbol, TypeId,
};
pub use program::{FieldResolution, Program, SuperChain};

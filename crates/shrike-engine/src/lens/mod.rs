//! Graph lenses
//!
//! A lens answers "what is this original reference called now, and what
//! happened to it on the way" after any number of passes. Each pass
//! publishes one immutable [`LensLevel`]; a [`GraphLens`] is the chain of
//! levels, newest first, shared cheaply between readers.
//!
//! Resolution is a pure function over the chain. Lookups descend from the
//! newest level to the oldest and rewrites apply on the way back up, so a
//! level sees the references produced by the levels before it. Each level
//! rewrites the current reference at most once, and the walk repeats until
//! no level that has not yet been applied has an entry for the current
//! reference.

mod builder;
pub mod rewrite;

pub use builder::{LensBuilder, LensError};

use crate::graph::{FieldId, MethodId};
use rustc_hash::FxHashMap;
use shrike_bytecode::InvokeKind;
use std::hash::Hash;
use std::sync::Arc;

/// What a lens entry did to a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Change {
    /// The member got a new name or holder
    Renamed = 1 << 0,
    /// A private instance method was made public and final
    Publicized = 1 << 1,
    /// References were redirected to another member
    Retargeted = 1 << 2,
}

/// Set of [`Change`]s accumulated along a resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChangeSet(u8);

impl ChangeSet {
    /// No changes
    pub const fn empty() -> Self {
        ChangeSet(0)
    }

    /// Add a change
    pub fn insert(&mut self, change: Change) {
        self.0 |= change as u8;
    }

    /// Whether `change` is in the set
    pub fn contains(self, change: Change) -> bool {
        self.0 & change as u8 != 0
    }

    /// Whether nothing happened
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl From<Change> for ChangeSet {
    fn from(change: Change) -> Self {
        ChangeSet(change as u8)
    }
}

/// One recorded rewrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LensEntry<T> {
    /// The reference after this level
    pub target: T,
    /// What happened
    pub change: Change,
}

/// The rewrites published by one pass
#[derive(Debug, Default)]
pub struct LensLevel {
    name: String,
    methods: FxHashMap<MethodId, LensEntry<MethodId>>,
    fields: FxHashMap<FieldId, LensEntry<FieldId>>,
}

impl LensLevel {
    /// Name of the pass that produced this level
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of method entries
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Number of field entries
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Method entry for an exact reference
    pub fn method_entry(&self, method: MethodId) -> Option<LensEntry<MethodId>> {
        self.methods.get(&method).copied()
    }

    /// Field entry for an exact reference
    pub fn field_entry(&self, field: FieldId) -> Option<LensEntry<FieldId>> {
        self.fields.get(&field).copied()
    }
}

/// Result of resolving a method with its history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodLookup {
    /// The current reference
    pub method: MethodId,
    /// Everything that happened to it
    pub changes: ChangeSet,
}

impl MethodLookup {
    /// Invoke kind to use for a call site originally compiled with `kind`.
    ///
    /// Publicized methods are public instance methods now, so direct calls
    /// become virtual. Static calls are unaffected.
    pub fn rewrite_invoke(&self, kind: InvokeKind) -> InvokeKind {
        match kind {
            InvokeKind::Direct if self.changes.contains(Change::Publicized) => InvokeKind::Virtual,
            other => other,
        }
    }
}

/// Result of resolving a field with its history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLookup {
    /// The current reference
    pub field: FieldId,
    /// Everything that happened to it
    pub changes: ChangeSet,
}

/// An immutable chain of lens levels
#[derive(Debug, Clone, Default)]
pub struct GraphLens {
    /// Oldest first
    levels: Vec<Arc<LensLevel>>,
}

impl GraphLens {
    /// The empty chain: every reference resolves to itself
    pub fn identity() -> Self {
        Self::default()
    }

    /// Whether the chain has no levels
    pub fn is_identity(&self) -> bool {
        self.levels.is_empty()
    }

    /// Number of levels
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Levels, newest first
    pub fn levels(&self) -> impl Iterator<Item = &LensLevel> {
        self.levels.iter().rev().map(|level| level.as_ref())
    }

    /// This chain with `level` as its newest level
    pub(crate) fn extend(&self, level: LensLevel) -> GraphLens {
        let mut levels = self.levels.clone();
        levels.push(Arc::new(level));
        GraphLens { levels }
    }

    /// The current reference for an original method
    pub fn resolve_method(&self, method: MethodId) -> MethodId {
        self.lookup_method(method).method
    }

    /// The current reference for an original field
    pub fn resolve_field(&self, field: FieldId) -> FieldId {
        self.lookup_field(field).field
    }

    /// Resolve a method and report what happened to it
    pub fn lookup_method(&self, method: MethodId) -> MethodLookup {
        let (method, changes) = self.resolve(method, |level| &level.methods);
        MethodLookup { method, changes }
    }

    /// Resolve a field and report what happened to it
    pub fn lookup_field(&self, field: FieldId) -> FieldLookup {
        let (field, changes) = self.resolve(field, |level| &level.fields);
        FieldLookup { field, changes }
    }

    fn resolve<T, F>(&self, original: T, table: F) -> (T, ChangeSet)
    where
        T: Copy + Eq + Hash,
        F: Fn(&LensLevel) -> &FxHashMap<T, LensEntry<T>>,
    {
        let mut current = original;
        let mut changes = ChangeSet::empty();
        let mut applied: Vec<bool> = Vec::new();

        loop {
            let mut progressed = false;
            for (index, level) in self.levels.iter().enumerate() {
                if applied.get(index).copied().unwrap_or(false) {
                    continue;
                }
                if let Some(entry) = table(level).get(&current) {
                    if applied.is_empty() {
                        applied = vec![false; self.levels.len()];
                    }
                    applied[index] = true;
                    current = entry.target;
                    changes.insert(entry.change);
                    progressed = true;
                }
            }
            if !progressed {
                return (current, changes);
            }
        }
    }
}

use super::{Change, GraphLens, LensEntry, LensLevel};
use crate::graph::{FieldId, ItemFactory, MethodId};
use rustc_hash::{FxHashMap, FxHashSet};
use std::hash::Hash;
use thiserror::Error;

/// Inconsistent lens entries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LensError {
    /// The same original was recorded twice in one level
    #[error("Pass '{pass}' recorded {member} twice")]
    DuplicateEntry {
        /// Pass name
        pass: String,
        /// The original reference
        member: String,
    },

    /// A rewrite whose target is rewritten again in the same level
    #[error("Pass '{pass}' chains {member} through {target} within one level")]
    ChainedEntry {
        /// Pass name
        pass: String,
        /// The original reference
        member: String,
        /// The target that is also rewritten
        target: String,
    },

    /// Constructors and class initializers keep their identity
    #[error("Pass '{pass}' cannot rewrite initializer {member}")]
    ProtectedMember {
        /// Pass name
        pass: String,
        /// The initializer
        member: String,
    },
}

/// Collects the rewrites of one pass and publishes them as a lens level.
///
/// A builder is owned by exactly one pass; nothing can observe its entries
/// until [`LensBuilder::build`] returns the extended chain.
#[derive(Debug)]
pub struct LensBuilder {
    name: String,
    methods: EntryTable<MethodId>,
    fields: EntryTable<FieldId>,
}

#[derive(Debug)]
struct EntryTable<T> {
    entries: FxHashMap<T, LensEntry<T>>,
    /// Targets of entries that move a reference
    moved_targets: FxHashSet<T>,
}

enum Rejection {
    Duplicate,
    Chained,
}

impl<T: Copy + Eq + Hash> EntryTable<T> {
    fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            moved_targets: FxHashSet::default(),
        }
    }

    fn insert(&mut self, original: T, target: T, change: Change) -> Result<(), Rejection> {
        if self.entries.contains_key(&original) {
            return Err(Rejection::Duplicate);
        }
        if original != target {
            let target_moves = self
                .entries
                .get(&target)
                .map_or(false, |entry| entry.target != target);
            if target_moves || self.moved_targets.contains(&original) {
                return Err(Rejection::Chained);
            }
            self.moved_targets.insert(target);
        }
        self.entries.insert(original, LensEntry { target, change });
        Ok(())
    }
}

impl LensBuilder {
    /// Create a builder for the pass named `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: EntryTable::new(),
            fields: EntryTable::new(),
        }
    }

    /// Pass name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.methods.entries.is_empty() && self.fields.entries.is_empty()
    }

    /// Number of recorded method entries
    pub fn method_count(&self) -> usize {
        self.methods.entries.len()
    }

    /// Record that `original` is now `target`
    pub fn record_method(
        &mut self,
        items: &ItemFactory,
        original: MethodId,
        target: MethodId,
        change: Change,
    ) -> Result<(), LensError> {
        for member in [original, target] {
            if items.is_initializer(member) {
                return Err(LensError::ProtectedMember {
                    pass: self.name.clone(),
                    member: items.method_to_string(member),
                });
            }
        }
        self.methods
            .insert(original, target, change)
            .map_err(|rejection| match rejection {
                Rejection::Duplicate => LensError::DuplicateEntry {
                    pass: self.name.clone(),
                    member: items.method_to_string(original),
                },
                Rejection::Chained => LensError::ChainedEntry {
                    pass: self.name.clone(),
                    member: items.method_to_string(original),
                    target: items.method_to_string(target),
                },
            })
    }

    /// Record that field `original` is now `target`
    pub fn record_field(
        &mut self,
        items: &ItemFactory,
        original: FieldId,
        target: FieldId,
        change: Change,
    ) -> Result<(), LensError> {
        self.fields
            .insert(original, target, change)
            .map_err(|rejection| match rejection {
                Rejection::Duplicate => LensError::DuplicateEntry {
                    pass: self.name.clone(),
                    member: items.field_to_string(original),
                },
                Rejection::Chained => LensError::ChainedEntry {
                    pass: self.name.clone(),
                    member: items.field_to_string(original),
                    target: items.field_to_string(target),
                },
            })
    }

    /// Publish the recorded entries as the newest level on top of `previous`
    pub fn build(self, previous: &GraphLens) -> GraphLens {
        tracing::debug!(
            pass = %self.name,
            methods = self.methods.entries.len(),
            fields = self.fields.entries.len(),
            "publishing lens level"
        );
        previous.extend(LensLevel {
            name: self.name,
            methods: self.methods.entries,
            fields: self.fields.entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_entry_rejected() {
        let mut items = ItemFactory::new();
        let a = items.parse_method("LA;->a()V").unwrap();
        let b = items.parse_method("LA;->b()V").unwrap();

        let mut builder = LensBuilder::new("test");
        builder.record_method(&items, a, b, Change::Renamed).unwrap();
        let err = builder
            .record_method(&items, a, a, Change::Publicized)
            .unwrap_err();
        assert!(matches!(err, LensError::DuplicateEntry { .. }));
    }

    #[test]
    fn test_chained_entry_rejected() {
        let mut items = ItemFactory::new();
        let a = items.parse_method("LA;->a()V").unwrap();
        let b = items.parse_method("LA;->b()V").unwrap();
        let c = items.parse_method("LA;->c()V").unwrap();

        let mut builder = LensBuilder::new("test");
        builder.record_method(&items, a, b, Change::Renamed).unwrap();
        assert!(matches!(
            builder.record_method(&items, b, c, Change::Renamed),
            Err(LensError::ChainedEntry { .. })
        ));

        let mut builder = LensBuilder::new("test");
        builder.record_method(&items, b, c, Change::Renamed).unwrap();
        assert!(matches!(
            builder.record_method(&items, a, b, Change::Renamed),
            Err(LensError::ChainedEntry { .. })
        ));
    }

    #[test]
    fn test_identity_entries_do_not_chain() {
        let mut items = ItemFactory::new();
        let a = items.parse_method("LA;->a()V").unwrap();
        let b = items.parse_method("LA;->b()V").unwrap();

        let mut builder = LensBuilder::new("test");
        builder.record_method(&items, b, b, Change::Publicized).unwrap();
        builder.record_method(&items, a, b, Change::Retargeted).unwrap();
        assert_eq!(builder.method_count(), 2);
    }

    #[test]
    fn test_initializers_are_protected() {
        let mut items = ItemFactory::new();
        let init = items.parse_method("LA;-><init>()V").unwrap();
        let clinit = items.parse_method("LA;-><clinit>()V").unwrap();
        let other = items.parse_method("LA;->other()V").unwrap();

        let mut builder = LensBuilder::new("test");
        for (original, target) in [(init, init), (clinit, other), (other, init)] {
            assert!(matches!(
                builder.record_method(&items, original, target, Change::Publicized),
                Err(LensError::ProtectedMember { .. })
            ));
        }
        assert!(builder.is_empty());
    }

    #[test]
    fn test_field_entries() {
        let mut items = ItemFactory::new();
        let x = items.parse_field("LA;->x:I").unwrap();
        let y = items.parse_field("LB;->x:I").unwrap();

        let mut builder = LensBuilder::new("fields");
        builder.record_field(&items, x, y, Change::Renamed).unwrap();
        let lens = builder.build(&GraphLens::identity());

        let lookup = lens.lookup_field(x);
        assert_eq!(lookup.field, y);
        assert!(lookup.changes.contains(Change::Renamed));
        assert_eq!(lens.resolve_field(y), y);
    }
}

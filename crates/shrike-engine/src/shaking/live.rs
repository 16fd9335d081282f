//! Live set and analysis feedback produced by the enqueuer

use crate::graph::{FieldId, MethodId, TypeId};
use rustc_hash::FxHashSet;

/// Entities proven reachable. Only ever grows during a trace.
#[derive(Debug, Clone, Default)]
pub struct LiveSet {
    classes: FxHashSet<TypeId>,
    instantiated: FxHashSet<TypeId>,
    methods: FxHashSet<MethodId>,
    fields: FxHashSet<FieldId>,
}

impl LiveSet {
    /// Create an empty live set
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mark_class(&mut self, ty: TypeId) -> bool {
        self.classes.insert(ty)
    }

    pub(crate) fn mark_instantiated(&mut self, ty: TypeId) -> bool {
        self.instantiated.insert(ty)
    }

    pub(crate) fn mark_method(&mut self, method: MethodId) -> bool {
        self.methods.insert(method)
    }

    pub(crate) fn mark_field(&mut self, field: FieldId) -> bool {
        self.fields.insert(field)
    }

    /// Whether the class is live
    pub fn is_live_class(&self, ty: TypeId) -> bool {
        self.classes.contains(&ty)
    }

    /// Whether instances of the class may exist
    pub fn is_instantiated(&self, ty: TypeId) -> bool {
        self.instantiated.contains(&ty)
    }

    /// Whether the method definition is live
    pub fn is_live_method(&self, method: MethodId) -> bool {
        self.methods.contains(&method)
    }

    /// Whether the field definition is live
    pub fn is_live_field(&self, field: FieldId) -> bool {
        self.fields.contains(&field)
    }

    /// Live classes
    pub fn classes(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.classes.iter().copied()
    }

    /// Instantiated classes
    pub fn instantiated(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.instantiated.iter().copied()
    }

    /// Live fields
    pub fn fields(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.fields.iter().copied()
    }

    /// Live methods
    pub fn methods(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.methods.iter().copied()
    }

    /// Total number of live entities
    pub fn len(&self) -> usize {
        self.classes.len() + self.instantiated.len() + self.methods.len() + self.fields.len()
    }

    /// Whether nothing is live
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Facts recorded by enqueuer analyses for later passes
#[derive(Debug, Clone, Default)]
pub struct OptimizationFeedback {
    initializers_enabling_assertions: FxHashSet<MethodId>,
}

impl OptimizationFeedback {
    /// Create empty feedback
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a class initializer computes the assertion status
    pub fn set_initializer_enabling_assertions(&mut self, method: MethodId) {
        self.initializers_enabling_assertions.insert(method);
    }

    /// Whether a class initializer was found to compute the assertion status
    pub fn is_initializer_enabling_assertions(&self, method: MethodId) -> bool {
        self.initializers_enabling_assertions.contains(&method)
    }

    /// Class initializers that compute the assertion status
    pub fn initializers_enabling_assertions(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.initializers_enabling_assertions.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ItemFactory;

    #[test]
    fn test_marking_reports_novelty() {
        let mut items = ItemFactory::new();
        let ty = items.create_type("LA;");
        let mut live = LiveSet::new();

        assert!(live.mark_class(ty));
        assert!(!live.mark_class(ty));
        assert!(live.is_live_class(ty));
        assert!(!live.is_instantiated(ty));
        assert_eq!(live.len(), 1);
    }
}

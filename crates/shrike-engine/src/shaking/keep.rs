//! Keep rules: the members that must survive and keep their names

use crate::config::{ConfigError, KeepOptions};
use crate::graph::{FieldId, ItemFactory, MethodId, TypeId};
use rustc_hash::FxHashSet;

/// Answers whether keep rules pin a method
pub trait KeepOracle: Sync {
    /// The method must not be removed or have its signature changed
    fn is_pinned_against_shrinking(&self, method: MethodId) -> bool;

    /// The method must keep its name
    fn is_pinned_against_renaming(&self, method: MethodId) -> bool;
}

/// Members selected by keep rules. Seeds the enqueuer.
#[derive(Debug, Clone, Default)]
pub struct RootSet {
    /// Classes kept live and treated as instantiated
    pub classes: Vec<TypeId>,
    /// Methods kept live
    pub methods: Vec<MethodId>,
    /// Fields kept live
    pub fields: Vec<FieldId>,
    no_shrinking: FxHashSet<MethodId>,
    no_obfuscation: FxHashSet<MethodId>,
}

impl RootSet {
    /// Create an empty root set
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep a class live and instantiated
    pub fn keep_class(&mut self, ty: TypeId) {
        if !self.classes.contains(&ty) {
            self.classes.push(ty);
        }
    }

    /// Keep a method live and pin it against shrinking
    pub fn keep_method(&mut self, method: MethodId) {
        if self.no_shrinking.insert(method) {
            self.methods.push(method);
        }
    }

    /// Keep a field live
    pub fn keep_field(&mut self, field: FieldId) {
        if !self.fields.contains(&field) {
            self.fields.push(field);
        }
    }

    /// Pin a method against renaming
    pub fn pin_name(&mut self, method: MethodId) {
        self.no_obfuscation.insert(method);
    }

    /// Build a root set from keep options, interning the named members
    pub fn from_options(options: &KeepOptions, items: &mut ItemFactory) -> Result<Self, ConfigError> {
        let mut roots = RootSet::new();
        for class in &options.classes {
            roots.keep_class(items.create_type(class));
        }
        for method in &options.methods {
            let id = items
                .parse_method(method)
                .ok_or_else(|| ConfigError::InvalidMember(method.clone()))?;
            roots.keep_method(id);
        }
        for field in &options.fields {
            let id = items
                .parse_field(field)
                .ok_or_else(|| ConfigError::InvalidMember(field.clone()))?;
            roots.keep_field(id);
        }
        for method in &options.no_obfuscation {
            let id = items
                .parse_method(method)
                .ok_or_else(|| ConfigError::InvalidMember(method.clone()))?;
            roots.pin_name(id);
        }
        Ok(roots)
    }
}

impl KeepOracle for RootSet {
    fn is_pinned_against_shrinking(&self, method: MethodId) -> bool {
        self.no_shrinking.contains(&method)
    }

    fn is_pinned_against_renaming(&self, method: MethodId) -> bool {
        self.no_obfuscation.contains(&method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_options() {
        let options = KeepOptions {
            classes: vec!["LMain;".into()],
            methods: vec!["LMain;->main([Ljava/lang/String;)V".into()],
            fields: vec!["LMain;->DEBUG:Z".into()],
            no_obfuscation: vec!["LApi;->call()V".into()],
        };
        let mut items = ItemFactory::new();
        let roots = RootSet::from_options(&options, &mut items).unwrap();

        let main = items.parse_method("LMain;->main([Ljava/lang/String;)V").unwrap();
        let call = items.parse_method("LApi;->call()V").unwrap();
        assert_eq!(roots.classes.len(), 1);
        assert_eq!(roots.fields.len(), 1);
        assert!(roots.is_pinned_against_shrinking(main));
        assert!(!roots.is_pinned_against_renaming(main));
        assert!(roots.is_pinned_against_renaming(call));
        assert!(!roots.is_pinned_against_shrinking(call));
    }

    #[test]
    fn test_keep_method_is_idempotent() {
        let mut items = ItemFactory::new();
        let m = items.parse_method("LA;->m()V").unwrap();
        let mut roots = RootSet::new();
        roots.keep_method(m);
        roots.keep_method(m);
        assert_eq!(roots.methods, vec![m]);
    }
}

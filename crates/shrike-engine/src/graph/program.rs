//! The whole program: items, class definitions and their hierarchy

use super::class::{ClassDef, EncodedField, EncodedMethod};
use super::hierarchy::Hierarchy;
use super::items::{FieldId, ItemFactory, MethodId, TypeId};
use crate::error::{EngineError, EngineResult};
use rustc_hash::{FxHashMap, FxHashSet};

/// Result of resolving a field reference against the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldResolution {
    /// The class that declares the resolved field
    pub holder: TypeId,
    /// The declared field reference
    pub field: FieldId,
    /// Whether the declaring class is a program class
    pub is_program: bool,
}

/// A program under optimization
#[derive(Debug, Clone)]
pub struct Program {
    items: ItemFactory,
    classes: Vec<ClassDef>,
    index: FxHashMap<TypeId, usize>,
    hierarchy: Hierarchy,
}

impl Program {
    /// Create an empty program with a fresh item factory
    pub fn new() -> Self {
        Self::with_items(ItemFactory::new())
    }

    /// Create an empty program over an existing item factory
    pub fn with_items(items: ItemFactory) -> Self {
        let hierarchy = Hierarchy::new(items.known().object_type);
        Self {
            items,
            classes: Vec::new(),
            index: FxHashMap::default(),
            hierarchy,
        }
    }

    /// The item factory
    pub fn items(&self) -> &ItemFactory {
        &self.items
    }

    /// The item factory, for interning new items
    pub fn items_mut(&mut self) -> &mut ItemFactory {
        &mut self.items
    }

    /// The class hierarchy
    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Add a class definition.
    ///
    /// Fails when the type is already defined or when two members of the
    /// class share a reference.
    pub fn add_class(&mut self, class: ClassDef) -> EngineResult<()> {
        if self.index.contains_key(&class.ty) {
            return Err(EngineError::DuplicateClass(
                self.items.type_descriptor(class.ty).to_string(),
            ));
        }

        let mut seen_methods = FxHashSet::default();
        for method in class.methods() {
            if !seen_methods.insert(method.method) {
                return Err(EngineError::DuplicateMember {
                    holder: self.items.type_descriptor(class.ty).to_string(),
                    member: self.items.method_to_string(method.method),
                });
            }
        }
        let mut seen_fields = FxHashSet::default();
        for field in &class.fields {
            if !seen_fields.insert(field.field) {
                return Err(EngineError::DuplicateMember {
                    holder: self.items.type_descriptor(class.ty).to_string(),
                    member: self.items.field_to_string(field.field),
                });
            }
        }

        self.hierarchy.add_class(&class);
        self.index.insert(class.ty, self.classes.len());
        self.classes.push(class);
        Ok(())
    }

    /// The definition of a type, if any
    pub fn definition_for(&self, ty: TypeId) -> Option<&ClassDef> {
        self.index.get(&ty).map(|&i| &self.classes[i])
    }

    /// The mutable definition of a type together with the item factory
    pub fn definition_and_items_mut(&mut self, ty: TypeId) -> Option<(&mut ClassDef, &ItemFactory)> {
        let i = *self.index.get(&ty)?;
        Some((&mut self.classes[i], &self.items))
    }

    /// All definitions in insertion order
    pub fn classes(&self) -> &[ClassDef] {
        &self.classes
    }

    /// Program (non-library) definitions in insertion order
    pub fn program_classes(&self) -> impl Iterator<Item = &ClassDef> {
        self.classes.iter().filter(|c| c.is_program_class())
    }

    /// Whether `ty` is defined as an interface
    pub fn is_interface(&self, ty: TypeId) -> bool {
        self.definition_for(ty).map_or(false, ClassDef::is_interface)
    }

    /// The definition declared for an exact method reference
    pub fn method_definition(&self, method: MethodId) -> Option<(&ClassDef, &EncodedMethod)> {
        let holder = self.definition_for(self.items.method(method).holder)?;
        let definition = holder.lookup_method(method)?;
        Some((holder, definition))
    }

    /// `ty` followed by its defined superclasses
    pub fn super_chain(&self, ty: TypeId) -> SuperChain<'_> {
        SuperChain {
            program: self,
            next: Some(ty),
            seen: FxHashSet::default(),
        }
    }

    /// Whether `sub` is `sup` or inherits from it through classes or interfaces
    pub fn is_subtype_of(&self, sub: TypeId, sup: TypeId) -> bool {
        let mut worklist = vec![sub];
        let mut visited = FxHashSet::default();
        while let Some(ty) = worklist.pop() {
            if ty == sup {
                return true;
            }
            if !visited.insert(ty) {
                continue;
            }
            if let Some(class) = self.definition_for(ty) {
                worklist.extend(class.super_type);
                worklist.extend(class.interfaces.iter().copied());
            }
        }
        false
    }

    /// Resolve a method reference to the definition it dispatches to
    /// statically: the holder's superclass chain first, then interfaces.
    pub fn resolve_method(&self, method: MethodId) -> Option<(&ClassDef, &EncodedMethod)> {
        let holder = self.items.method(method).holder;
        self.lookup_method_from(holder, method)
    }

    /// Find the definition of `method`'s signature visible from `ty`
    pub fn lookup_method_from(
        &self,
        ty: TypeId,
        method: MethodId,
    ) -> Option<(&ClassDef, &EncodedMethod)> {
        self.lookup_signature(ty, method, false)
    }

    /// Find the virtual method a call of `method` on a receiver of exact type
    /// `ty` dispatches to. Private and static methods on the superclass chain
    /// never take part in dispatch and are skipped.
    pub fn dispatch_method(
        &self,
        ty: TypeId,
        method: MethodId,
    ) -> Option<(&ClassDef, &EncodedMethod)> {
        self.lookup_signature(ty, method, true)
    }

    fn lookup_signature(
        &self,
        ty: TypeId,
        method: MethodId,
        virtual_only: bool,
    ) -> Option<(&ClassDef, &EncodedMethod)> {
        let signature = self.items.signature(method);
        let matches = |m: &&EncodedMethod| self.items.signature(m.method) == signature;

        for class in self.super_chain(ty) {
            let found = if virtual_only {
                class.virtual_methods.iter().find(matches)
            } else {
                class.methods().find(matches)
            };
            if let Some(found) = found {
                return Some((class, found));
            }
        }

        let mut worklist: Vec<TypeId> = self
            .super_chain(ty)
            .flat_map(|c| c.interfaces.iter().copied())
            .collect();
        let mut visited = FxHashSet::default();
        while let Some(interface) = worklist.pop() {
            if !visited.insert(interface) {
                continue;
            }
            if let Some(class) = self.definition_for(interface) {
                if let Some(found) = class.virtual_methods.iter().find(matches) {
                    return Some((class, found));
                }
                worklist.extend(class.interfaces.iter().copied());
            }
        }
        None
    }

    /// Resolve a field reference: the holder, its interfaces, then the
    /// superclass chain.
    pub fn resolve_field(&self, field: FieldId) -> Option<FieldResolution> {
        let target = *self.items.field(field);
        let matches = |f: &&EncodedField| {
            let candidate = self.items.field(f.field);
            candidate.name == target.name && candidate.ty == target.ty
        };

        for class in self.super_chain(target.holder) {
            let mut candidates = vec![class.ty];
            let mut visited = FxHashSet::default();
            while let Some(ty) = candidates.pop() {
                if !visited.insert(ty) {
                    continue;
                }
                let Some(definition) = self.definition_for(ty) else {
                    continue;
                };
                if let Some(found) = definition.fields.iter().find(matches) {
                    return Some(FieldResolution {
                        holder: definition.ty,
                        field: found.field,
                        is_program: definition.is_program_class(),
                    });
                }
                candidates.extend(definition.interfaces.iter().rev().copied());
            }
        }
        None
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a type and its defined superclasses
pub struct SuperChain<'a> {
    program: &'a Program,
    next: Option<TypeId>,
    seen: FxHashSet<TypeId>,
}

impl<'a> Iterator for SuperChain<'a> {
    type Item = &'a ClassDef;

    fn next(&mut self) -> Option<&'a ClassDef> {
        let ty = self.next.take()?;
        if !self.seen.insert(ty) {
            return None;
        }
        let class = self.program.definition_for(ty)?;
        self.next = class.super_type;
        Some(class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::AccessFlags;

    fn sample() -> (Program, TypeId, TypeId, FieldId, MethodId) {
        let mut program = Program::new();
        let items = program.items_mut();
        let object = items.known().object_type;
        let a = items.create_type("LA;");
        let b = items.create_type("LB;");
        let field = items.parse_field("LA;->count:I").unwrap();
        let run = items.parse_method("LA;->run()V").unwrap();

        program.add_class(ClassDef::library(object)).unwrap();
        program
            .add_class(
                ClassDef::program(a)
                    .extends(object)
                    .field(EncodedField::new(field, AccessFlags::STATIC))
                    .method(EncodedMethod::new(run, AccessFlags::PUBLIC)),
            )
            .unwrap();
        program
            .add_class(ClassDef::program(b).extends(a))
            .unwrap();
        (program, a, b, field, run)
    }

    #[test]
    fn test_duplicate_class_rejected() {
        let (mut program, a, ..) = sample();
        let err = program.add_class(ClassDef::program(a)).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateClass(name) if name == "LA;"));
    }

    #[test]
    fn test_duplicate_member_rejected() {
        let mut program = Program::new();
        let items = program.items_mut();
        let c = items.create_type("LC;");
        let m = items.parse_method("LC;->m()V").unwrap();
        let class = ClassDef::program(c)
            .method(EncodedMethod::new(m, AccessFlags::PUBLIC))
            .method(EncodedMethod::new(m, AccessFlags::PRIVATE));
        assert!(matches!(
            program.add_class(class),
            Err(EngineError::DuplicateMember { .. })
        ));
    }

    #[test]
    fn test_resolve_through_super_chain() {
        let (mut program, a, b, field, run) = sample();
        let via_b = program.items_mut().parse_field("LB;->count:I").unwrap();
        let run_b = program.items_mut().parse_method("LB;->run()V").unwrap();

        let resolution = program.resolve_field(via_b).unwrap();
        assert_eq!(resolution.holder, a);
        assert_eq!(resolution.field, field);
        assert!(resolution.is_program);

        let (holder, method) = program.resolve_method(run_b).unwrap();
        assert_eq!(holder.ty, a);
        assert_eq!(method.method, run);

        assert!(program.is_subtype_of(b, a));
        assert!(!program.is_subtype_of(a, b));
        assert_eq!(program.super_chain(b).count(), 3);
    }

    #[test]
    fn test_missing_field_does_not_resolve() {
        let (mut program, ..) = sample();
        let missing = program.items_mut().parse_field("LB;->count:J").unwrap();
        assert!(program.resolve_field(missing).is_none());
    }
}

//! Subtype relations between defined classes

use super::class::ClassDef;
use super::items::TypeId;
use rustc_hash::{FxHashMap, FxHashSet};

/// Class hierarchy index.
///
/// Edges are recorded for every superclass and interface reference, even when
/// the referenced type has no definition, so traversal from the root object
/// type also reaches classes below undefined library types.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    object_type: TypeId,
    extends_subtypes: FxHashMap<TypeId, Vec<TypeId>>,
    implementors: FxHashMap<TypeId, Vec<TypeId>>,
    interfaces: Vec<TypeId>,
    defined: FxHashSet<TypeId>,
}

impl Hierarchy {
    /// Create an empty hierarchy rooted at `object_type`
    pub fn new(object_type: TypeId) -> Self {
        Self {
            object_type,
            extends_subtypes: FxHashMap::default(),
            implementors: FxHashMap::default(),
            interfaces: Vec::new(),
            defined: FxHashSet::default(),
        }
    }

    /// Record the edges contributed by one definition
    pub fn add_class(&mut self, class: &ClassDef) {
        self.defined.insert(class.ty);

        match class.super_type {
            Some(super_type) => {
                self.add_edge(super_type, class.ty);
                // An undefined supertype hangs off the root until it is defined.
                if super_type != self.object_type && !self.defined.contains(&super_type) {
                    self.attach_orphan(super_type);
                }
            }
            None if class.ty != self.object_type => {
                self.add_edge(self.object_type, class.ty);
            }
            None => {}
        }
        self.detach_orphan(class);

        for &interface in &class.interfaces {
            self.implementors.entry(interface).or_default().push(class.ty);
        }

        if class.is_interface() {
            if let Err(pos) = self.interfaces.binary_search(&class.ty) {
                self.interfaces.insert(pos, class.ty);
            }
        }
    }

    fn add_edge(&mut self, parent: TypeId, child: TypeId) {
        let children = self.extends_subtypes.entry(parent).or_default();
        if !children.contains(&child) {
            children.push(child);
        }
    }

    fn attach_orphan(&mut self, ty: TypeId) {
        self.add_edge(self.object_type, ty);
    }

    fn detach_orphan(&mut self, class: &ClassDef) {
        // A definition that shows up after being referenced as an undefined
        // supertype now hangs off its real superclass.
        if class.super_type.map_or(true, |s| s == self.object_type) {
            return;
        }
        if let Some(children) = self.extends_subtypes.get_mut(&self.object_type) {
            children.retain(|&child| child != class.ty);
        }
    }

    /// The root object type
    pub fn object_type(&self) -> TypeId {
        self.object_type
    }

    /// Types whose superclass is `ty`, in insertion order
    pub fn extends_subtypes(&self, ty: TypeId) -> &[TypeId] {
        self.extends_subtypes
            .get(&ty)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Types that list `interface` among their direct interfaces
    pub fn implementors(&self, interface: TypeId) -> &[TypeId] {
        self.implementors
            .get(&interface)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Direct subtypes: subclasses followed by implementors
    pub fn direct_subtypes(&self, ty: TypeId) -> impl Iterator<Item = TypeId> + '_ {
        self.extends_subtypes(ty)
            .iter()
            .chain(self.implementors(ty).iter())
            .copied()
    }

    /// All defined interfaces, sorted by type id
    pub fn all_interfaces(&self) -> &[TypeId] {
        &self.interfaces
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AccessFlags, ItemFactory};

    #[test]
    fn test_edges() {
        let mut items = ItemFactory::new();
        let object = items.known().object_type;
        let a = items.create_type("LA;");
        let b = items.create_type("LB;");
        let i = items.create_type("LI;");

        let mut hierarchy = Hierarchy::new(object);
        hierarchy.add_class(&ClassDef::library(object));
        hierarchy.add_class(
            &ClassDef::program(i)
                .with_access(AccessFlags::INTERFACE | AccessFlags::ABSTRACT)
                .extends(object),
        );
        hierarchy.add_class(&ClassDef::program(a).extends(object).implements(i));
        hierarchy.add_class(&ClassDef::program(b).extends(a));

        assert_eq!(hierarchy.extends_subtypes(object), &[i, a]);
        assert_eq!(hierarchy.extends_subtypes(a), &[b]);
        assert_eq!(hierarchy.implementors(i), &[a]);
        assert_eq!(hierarchy.all_interfaces(), &[i]);
        assert_eq!(hierarchy.direct_subtypes(a).collect::<Vec<_>>(), vec![b]);
    }

    #[test]
    fn test_undefined_supertype_hangs_off_root() {
        let mut items = ItemFactory::new();
        let object = items.known().object_type;
        let lib = items.create_type("Landroid/app/Activity;");
        let main = items.create_type("LMain;");

        let mut hierarchy = Hierarchy::new(object);
        hierarchy.add_class(&ClassDef::program(main).extends(lib));

        assert_eq!(hierarchy.extends_subtypes(object), &[lib]);
        assert_eq!(hierarchy.extends_subtypes(lib), &[main]);
    }
}

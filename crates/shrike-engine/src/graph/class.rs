//! Class, field and method definitions

use super::access::AccessFlags;
use super::code::Code;
use super::items::{FieldId, MethodId, TypeId};
use rustc_hash::FxHashSet;

/// Where a class definition comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// Part of the program being optimized
    Program,
    /// Provided by the platform or a library; never modified
    Library,
}

/// A field definition
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedField {
    /// The field reference this definition declares
    pub field: FieldId,
    /// Access flags
    pub access: AccessFlags,
}

impl EncodedField {
    /// Create a field definition
    pub fn new(field: FieldId, access: AccessFlags) -> Self {
        Self { field, access }
    }
}

/// A method definition
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedMethod {
    /// The method reference this definition declares
    pub method: MethodId,
    /// Access flags
    pub access: AccessFlags,
    /// Body, absent for abstract and native methods
    pub code: Option<Code>,
    /// Set when a private instance method was made public and final
    pub publicized: bool,
}

impl EncodedMethod {
    /// Create a method definition without a body
    pub fn new(method: MethodId, access: AccessFlags) -> Self {
        Self {
            method,
            access,
            code: None,
            publicized: false,
        }
    }

    /// Attach a body
    pub fn with_code(mut self, code: Code) -> Self {
        self.code = Some(code);
        self
    }

    /// Whether this definition belongs in the direct method list
    pub fn is_direct(&self) -> bool {
        self.access.is_private() || self.access.is_static() || self.access.is_constructor()
    }

    /// Mark as publicized: public, final, no longer private
    pub fn publicize(&mut self) {
        self.access.unset_private();
        self.access.unset_protected();
        self.access.set_public();
        self.access.set_final();
        self.publicized = true;
    }
}

/// A class definition
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    /// The defined type
    pub ty: TypeId,
    /// Program or library
    pub kind: ClassKind,
    /// Access flags
    pub access: AccessFlags,
    /// Superclass, `None` only for the root object type
    pub super_type: Option<TypeId>,
    /// Directly implemented interfaces
    pub interfaces: Vec<TypeId>,
    /// Static and instance fields
    pub fields: Vec<EncodedField>,
    /// Private, static and constructor methods
    pub direct_methods: Vec<EncodedMethod>,
    /// Dispatchable methods
    pub virtual_methods: Vec<EncodedMethod>,
}

impl ClassDef {
    /// Create an empty definition
    pub fn new(ty: TypeId, kind: ClassKind) -> Self {
        Self {
            ty,
            kind,
            access: AccessFlags::empty(),
            super_type: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            direct_methods: Vec::new(),
            virtual_methods: Vec::new(),
        }
    }

    /// Create an empty program class
    pub fn program(ty: TypeId) -> Self {
        Self::new(ty, ClassKind::Program)
    }

    /// Create an empty library class
    pub fn library(ty: TypeId) -> Self {
        Self::new(ty, ClassKind::Library)
    }

    /// Set access flags
    pub fn with_access(mut self, access: AccessFlags) -> Self {
        self.access = access;
        self
    }

    /// Set the superclass
    pub fn extends(mut self, super_type: TypeId) -> Self {
        self.super_type = Some(super_type);
        self
    }

    /// Add an implemented interface
    pub fn implements(mut self, interface: TypeId) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Add a field
    pub fn field(mut self, field: EncodedField) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a method to the direct or virtual list according to its flags
    pub fn method(mut self, method: EncodedMethod) -> Self {
        if method.is_direct() {
            self.direct_methods.push(method);
        } else {
            self.virtual_methods.push(method);
        }
        self
    }

    /// Whether this class is part of the program
    pub fn is_program_class(&self) -> bool {
        self.kind == ClassKind::Program
    }

    /// Whether this is an interface
    pub fn is_interface(&self) -> bool {
        self.access.is_interface()
    }

    /// Direct methods followed by virtual methods
    pub fn methods(&self) -> impl Iterator<Item = &EncodedMethod> {
        self.direct_methods.iter().chain(self.virtual_methods.iter())
    }

    /// Mutable direct methods followed by virtual methods
    pub fn methods_mut(&mut self) -> impl Iterator<Item = &mut EncodedMethod> {
        self.direct_methods
            .iter_mut()
            .chain(self.virtual_methods.iter_mut())
    }

    /// Find a method definition by reference
    pub fn lookup_method(&self, method: MethodId) -> Option<&EncodedMethod> {
        self.methods().find(|m| m.method == method)
    }

    /// Find a field definition by reference
    pub fn lookup_field(&self, field: FieldId) -> Option<&EncodedField> {
        self.fields.iter().find(|f| f.field == field)
    }

    /// Move the named direct methods to the virtual list.
    ///
    /// Relative order is kept in both lists; moved methods are appended in
    /// their direct-list order.
    pub fn virtualize_methods(&mut self, methods: &FxHashSet<MethodId>) {
        if methods.is_empty() {
            return;
        }
        let (moved, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.direct_methods)
            .into_iter()
            .partition(|m| methods.contains(&m.method));
        self.direct_methods = kept;
        self.virtual_methods.extend(moved);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ItemFactory;

    #[test]
    fn test_method_placement() {
        let mut items = ItemFactory::new();
        let ty = items.create_type("LA;");
        let private = items.parse_method("LA;->a()V").unwrap();
        let public = items.parse_method("LA;->b()V").unwrap();
        let init = items.parse_method("LA;-><init>()V").unwrap();

        let class = ClassDef::program(ty)
            .method(EncodedMethod::new(private, AccessFlags::PRIVATE))
            .method(EncodedMethod::new(public, AccessFlags::PUBLIC))
            .method(EncodedMethod::new(
                init,
                AccessFlags::PUBLIC | AccessFlags::CONSTRUCTOR,
            ));

        assert_eq!(class.direct_methods.len(), 2);
        assert_eq!(class.virtual_methods.len(), 1);
        assert_eq!(
            class.methods().map(|m| m.method).collect::<Vec<_>>(),
            vec![private, init, public]
        );
    }

    #[test]
    fn test_virtualize_keeps_order() {
        let mut items = ItemFactory::new();
        let ty = items.create_type("LA;");
        let ids: Vec<_> = ["a", "b", "c", "d"]
            .iter()
            .map(|name| items.parse_method(&format!("LA;->{}()V", name)).unwrap())
            .collect();

        let mut class = ClassDef::program(ty);
        for &id in &ids {
            class = class.method(EncodedMethod::new(id, AccessFlags::PRIVATE));
        }

        let moved: FxHashSet<_> = [ids[3], ids[1]].into_iter().collect();
        class.virtualize_methods(&moved);

        let direct: Vec<_> = class.direct_methods.iter().map(|m| m.method).collect();
        let virtuals: Vec<_> = class.virtual_methods.iter().map(|m| m.method).collect();
        assert_eq!(direct, vec![ids[0], ids[2]]);
        assert_eq!(virtuals, vec![ids[1], ids[3]]);
    }

    #[test]
    fn test_publicize() {
        let mut items = ItemFactory::new();
        let m = items.parse_method("LA;->a()V").unwrap();
        let mut method = EncodedMethod::new(m, AccessFlags::PRIVATE);
        method.publicize();
        assert!(method.publicized);
        assert!(method.access.is_public());
        assert!(method.access.is_final());
        assert!(!method.access.is_private());
    }
}

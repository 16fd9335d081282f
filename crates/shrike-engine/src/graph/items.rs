//! Interned program items
//!
//! Every name, type descriptor and member reference in a program is interned
//! once by the [`ItemFactory`] and referred to by a small copyable id. Equal
//! structural references always map to the same id, so identity comparisons
//! are integer comparisons.

use rustc_hash::FxHashMap;
use std::num::NonZeroU32;

/// An interned string (names and descriptors).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(NonZeroU32);

impl Symbol {
    #[inline]
    fn from_index(index: usize) -> Self {
        let raw = u32::try_from(index).unwrap_or(u32::MAX - 1);
        Symbol(NonZeroU32::MIN.saturating_add(raw))
    }

    #[inline]
    fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

macro_rules! item_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Raw index of this id in its factory table
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

item_id!(
    /// Interned type reference
    TypeId
);
item_id!(
    /// Interned prototype (parameter and return types)
    ProtoId
);
item_id!(
    /// Interned method reference
    MethodId
);
item_id!(
    /// Interned field reference
    FieldId
);

/// A method prototype
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Proto {
    /// Return type
    pub return_type: TypeId,
    /// Parameter types in declaration order
    pub parameters: Vec<TypeId>,
}

/// A method reference: holder, name and prototype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodRef {
    /// Declaring (or referenced) type
    pub holder: TypeId,
    /// Simple name
    pub name: Symbol,
    /// Prototype
    pub proto: ProtoId,
}

/// A field reference: holder, name and type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef {
    /// Declaring (or referenced) type
    pub holder: TypeId,
    /// Simple name
    pub name: Symbol,
    /// Field type
    pub ty: TypeId,
}

/// Holder-agnostic method equivalence key.
///
/// Two methods with equal signatures would collide if placed in the same
/// virtual dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodSignature {
    /// Simple name
    pub name: Symbol,
    /// Prototype
    pub proto: ProtoId,
}

/// Items the optimizer core refers to by identity.
#[derive(Debug, Clone, Copy)]
pub struct KnownItems {
    /// `java.lang.Object`
    pub object_type: TypeId,
    /// `java.lang.Class`
    pub class_type: TypeId,
    /// `boolean`
    pub boolean_type: TypeId,
    /// `void`
    pub void_type: TypeId,
    /// `<init>`
    pub constructor_name: Symbol,
    /// `<clinit>`
    pub class_initializer_name: Symbol,
    /// `$assertionsDisabled`
    pub assertions_disabled_name: Symbol,
    /// `ENABLED`
    pub enabled_name: Symbol,
    /// `java.lang.Class.desiredAssertionStatus()Z`
    pub desired_assertion_status: MethodId,
    /// `kotlin._Assertions`
    pub kotlin_assertions_type: TypeId,
    /// `kotlin._Assertions.ENABLED:Z`
    pub kotlin_assertions_enabled: FieldId,
}

/// Interning factory for names, types and member references.
#[derive(Debug, Clone)]
pub struct ItemFactory {
    symbol_map: FxHashMap<String, Symbol>,
    strings: Vec<String>,

    type_map: FxHashMap<Symbol, TypeId>,
    types: Vec<Symbol>,

    proto_map: FxHashMap<Proto, ProtoId>,
    protos: Vec<Proto>,

    method_map: FxHashMap<MethodRef, MethodId>,
    methods: Vec<MethodRef>,

    field_map: FxHashMap<FieldRef, FieldId>,
    fields: Vec<FieldRef>,

    known: Option<KnownItems>,
}

impl ItemFactory {
    /// Create a factory with the well-known items pre-interned
    pub fn new() -> Self {
        let mut factory = Self {
            symbol_map: FxHashMap::default(),
            strings: Vec::new(),
            type_map: FxHashMap::default(),
            types: Vec::new(),
            proto_map: FxHashMap::default(),
            protos: Vec::new(),
            method_map: FxHashMap::default(),
            methods: Vec::new(),
            field_map: FxHashMap::default(),
            fields: Vec::new(),
            known: None,
        };

        let object_type = factory.create_type("Ljava/lang/Object;");
        let class_type = factory.create_type("Ljava/lang/Class;");
        let boolean_type = factory.create_type("Z");
        let void_type = factory.create_type("V");
        let constructor_name = factory.intern("<init>");
        let class_initializer_name = factory.intern("<clinit>");
        let assertions_disabled_name = factory.intern("$assertionsDisabled");
        let enabled_name = factory.intern("ENABLED");
        let status_proto = factory.create_proto(boolean_type, Vec::new());
        let status_name = factory.intern("desiredAssertionStatus");
        let desired_assertion_status = factory.create_method(class_type, status_name, status_proto);
        let kotlin_assertions_type = factory.create_type("Lkotlin/_Assertions;");
        let kotlin_assertions_enabled =
            factory.create_field(kotlin_assertions_type, enabled_name, boolean_type);

        factory.known = Some(KnownItems {
            object_type,
            class_type,
            boolean_type,
            void_type,
            constructor_name,
            class_initializer_name,
            assertions_disabled_name,
            enabled_name,
            desired_assertion_status,
            kotlin_assertions_type,
            kotlin_assertions_enabled,
        });
        factory
    }

    /// The pre-interned well-known items
    pub fn known(&self) -> KnownItems {
        match self.known {
            Some(known) => known,
            None => unreachable!("ItemFactory::new always populates known items"),
        }
    }

    // ========================================================================
    // Symbols
    // ========================================================================

    /// Intern a string
    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.symbol_map.get(s) {
            return sym;
        }
        let sym = Symbol::from_index(self.strings.len());
        self.strings.push(s.to_string());
        self.symbol_map.insert(s.to_string(), sym);
        sym
    }

    /// Resolve a symbol to its string
    pub fn symbol_str(&self, sym: Symbol) -> &str {
        &self.strings[sym.index()]
    }

    // ========================================================================
    // Types and prototypes
    // ========================================================================

    /// Intern a type by descriptor (`I`, `Lpkg/Name;`, `[J`)
    pub fn create_type(&mut self, descriptor: &str) -> TypeId {
        let sym = self.intern(descriptor);
        if let Some(&id) = self.type_map.get(&sym) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(sym);
        self.type_map.insert(sym, id);
        id
    }

    /// Descriptor of a type
    pub fn type_descriptor(&self, ty: TypeId) -> &str {
        self.symbol_str(self.types[ty.index()])
    }

    /// Intern a prototype
    pub fn create_proto(&mut self, return_type: TypeId, parameters: Vec<TypeId>) -> ProtoId {
        let proto = Proto {
            return_type,
            parameters,
        };
        if let Some(&id) = self.proto_map.get(&proto) {
            return id;
        }
        let id = ProtoId(self.protos.len() as u32);
        self.protos.push(proto.clone());
        self.proto_map.insert(proto, id);
        id
    }

    /// Intern a prototype from a method descriptor such as `(I[Ljava/lang/String;)V`
    pub fn create_proto_from_descriptor(&mut self, descriptor: &str) -> Option<ProtoId> {
        let (parameters, return_type) = split_method_descriptor(descriptor)?;
        let parameters = parameters.iter().map(|p| self.create_type(p)).collect();
        let return_type = self.create_type(return_type);
        Some(self.create_proto(return_type, parameters))
    }

    /// Get a prototype
    pub fn proto(&self, id: ProtoId) -> &Proto {
        &self.protos[id.index()]
    }

    /// Render a prototype as a method descriptor
    pub fn proto_descriptor(&self, id: ProtoId) -> String {
        let proto = self.proto(id);
        let mut out = String::from("(");
        for &param in &proto.parameters {
            out.push_str(self.type_descriptor(param));
        }
        out.push(')');
        out.push_str(self.type_descriptor(proto.return_type));
        out
    }

    // ========================================================================
    // Members
    // ========================================================================

    /// Intern a method reference
    pub fn create_method(&mut self, holder: TypeId, name: Symbol, proto: ProtoId) -> MethodId {
        let method = MethodRef {
            holder,
            name,
            proto,
        };
        if let Some(&id) = self.method_map.get(&method) {
            return id;
        }
        let id = MethodId(self.methods.len() as u32);
        self.methods.push(method);
        self.method_map.insert(method, id);
        id
    }

    /// Intern a method from strings: holder descriptor, name and method descriptor
    pub fn create_method_from_descriptor(
        &mut self,
        holder: &str,
        name: &str,
        descriptor: &str,
    ) -> Option<MethodId> {
        let proto = self.create_proto_from_descriptor(descriptor)?;
        let holder = self.create_type(holder);
        let name = self.intern(name);
        Some(self.create_method(holder, name, proto))
    }

    /// Get a method reference
    pub fn method(&self, id: MethodId) -> &MethodRef {
        &self.methods[id.index()]
    }

    /// Holder-agnostic signature of a method
    pub fn signature(&self, id: MethodId) -> MethodSignature {
        let method = self.method(id);
        MethodSignature {
            name: method.name,
            proto: method.proto,
        }
    }

    /// Whether the method is an instance constructor (`<init>`)
    pub fn is_constructor(&self, id: MethodId) -> bool {
        self.method(id).name == self.known().constructor_name
    }

    /// Whether the method is a class initializer (`<clinit>`)
    pub fn is_class_initializer(&self, id: MethodId) -> bool {
        self.method(id).name == self.known().class_initializer_name
    }

    /// Whether the method is a constructor or class initializer
    pub fn is_initializer(&self, id: MethodId) -> bool {
        self.is_constructor(id) || self.is_class_initializer(id)
    }

    /// Intern a field reference
    pub fn create_field(&mut self, holder: TypeId, name: Symbol, ty: TypeId) -> FieldId {
        let field = FieldRef { holder, name, ty };
        if let Some(&id) = self.field_map.get(&field) {
            return id;
        }
        let id = FieldId(self.fields.len() as u32);
        self.fields.push(field);
        self.field_map.insert(field, id);
        id
    }

    /// Intern a field from strings: holder descriptor, name and type descriptor
    pub fn create_field_from_descriptor(&mut self, holder: &str, name: &str, ty: &str) -> FieldId {
        let holder = self.create_type(holder);
        let name = self.intern(name);
        let ty = self.create_type(ty);
        self.create_field(holder, name, ty)
    }

    /// Get a field reference
    pub fn field(&self, id: FieldId) -> &FieldRef {
        &self.fields[id.index()]
    }

    /// Number of interned methods
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    /// Render a method as `Lholder;->name(params)ret`
    pub fn method_to_string(&self, id: MethodId) -> String {
        let method = self.method(id);
        format!(
            "{}->{}{}",
            self.type_descriptor(method.holder),
            self.symbol_str(method.name),
            self.proto_descriptor(method.proto)
        )
    }

    /// Render a field as `Lholder;->name:type`
    pub fn field_to_string(&self, id: FieldId) -> String {
        let field = self.field(id);
        format!(
            "{}->{}:{}",
            self.type_descriptor(field.holder),
            self.symbol_str(field.name),
            self.type_descriptor(field.ty)
        )
    }

    /// Parse and intern a method written as `Lholder;->name(params)ret`
    pub fn parse_method(&mut self, text: &str) -> Option<MethodId> {
        let (holder, member) = text.split_once("->")?;
        let paren = member.find('(')?;
        let (name, descriptor) = member.split_at(paren);
        if !is_type_descriptor(holder) || name.is_empty() {
            return None;
        }
        self.create_method_from_descriptor(holder, name, descriptor)
    }

    /// Parse and intern a field written as `Lholder;->name:type`
    pub fn parse_field(&mut self, text: &str) -> Option<FieldId> {
        let (holder, member) = text.split_once("->")?;
        let (name, ty) = member.split_once(':')?;
        if !is_type_descriptor(holder) || name.is_empty() || !is_type_descriptor(ty) {
            return None;
        }
        Some(self.create_field_from_descriptor(holder, name, ty))
    }
}

impl Default for ItemFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Split `(params)ret` into parameter descriptors and the return descriptor
fn split_method_descriptor(descriptor: &str) -> Option<(Vec<&str>, &str)> {
    let rest = descriptor.strip_prefix('(')?;
    let close = rest.find(')')?;
    let (mut params, ret) = (&rest[..close], &rest[close + 1..]);
    if !is_type_descriptor(ret) {
        return None;
    }

    let mut parameters = Vec::new();
    while !params.is_empty() {
        let len = type_descriptor_len(params)?;
        if &params[..len] == "V" {
            return None;
        }
        parameters.push(&params[..len]);
        params = &params[len..];
    }
    Some((parameters, ret))
}

fn type_descriptor_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut dims = 0;
    while bytes.get(dims) == Some(&b'[') {
        dims += 1;
    }
    match *bytes.get(dims)? {
        b'Z' | b'B' | b'S' | b'C' | b'I' | b'J' | b'F' | b'D' => Some(dims + 1),
        b'V' if dims == 0 => Some(1),
        b'L' => match s[dims..].find(';')? {
            1 => None,
            end => Some(dims + end + 1),
        },
        _ => None,
    }
}

/// Whether `s` is a single field type descriptor such as `I` or `[Lpkg/Name;`
pub fn is_type_descriptor(s: &str) -> bool {
    type_descriptor_len(s) == Some(s.len())
}

/// Whether `s` is a method descriptor such as `(IJ)V`
pub fn is_method_descriptor(s: &str) -> bool {
    split_method_descriptor(s).is_some()
}

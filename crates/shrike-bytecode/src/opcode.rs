//! Register instruction opcodes
//!
//! Every instruction starts with a 16-bit unit holding the opcode in the low
//! byte. The opcode determines the instruction [`Format`], which fixes the
//! number of units and the operand layout:
//!
//! - 10x:  `ØØ|op`
//! - 10t:  `AA|op`                 (signed branch offset)
//! - 11n:  `B|A|op`                (signed 4-bit literal)
//! - 11x:  `AA|op`
//! - 12x:  `B|A|op`
//! - 20t:  `ØØ|op AAAA`
//! - 21c:  `AA|op BBBB`            (pool index)
//! - 21s:  `AA|op BBBB`            (signed literal)
//! - 21t:  `AA|op BBBB`            (signed branch offset)
//! - 22b:  `AA|op CC|BB`           (signed 8-bit literal)
//! - 22c:  `B|A|op CCCC`           (pool index)
//! - 22s:  `B|A|op CCCC`           (signed literal)
//! - 22t:  `B|A|op CCCC`           (signed branch offset)
//! - 23x:  `AA|op CC|BB`
//! - 35c:  `A|G|op BBBB F|E|D|C`   (pool index, up to five registers)
//! - 3rc:  `AA|op BBBB CCCC`       (pool index, register range)

/// Opcode enumeration
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Opcode {
    // ===== Moves & Returns (0x00-0x11) =====
    /// No operation
    Nop = 0x00,
    /// vA = vB
    Move = 0x01,
    /// vAA = result of the preceding invoke
    MoveResult = 0x0A,
    /// return
    ReturnVoid = 0x0E,
    /// return vAA
    Return = 0x0F,

    // ===== Constants (0x12-0x1C) =====
    /// vA = #B (4-bit literal)
    Const4 = 0x12,
    /// vAA = #BBBB (16-bit literal)
    Const16 = 0x13,
    /// vAA = strings[BBBB]
    ConstString = 0x1A,
    /// vAA = types[BBBB]
    ConstClass = 0x1C,

    // ===== Objects (0x22-0x27) =====
    /// vAA = new types[BBBB]
    NewInstance = 0x22,
    /// throw vAA
    Throw = 0x27,

    // ===== Control Flow (0x28-0x3D) =====
    /// PC += AA
    Goto = 0x28,
    /// PC += AAAA
    Goto16 = 0x29,
    /// if vA == vB then PC += CCCC
    IfEq = 0x32,
    /// if vA != vB then PC += CCCC
    IfNe = 0x33,
    /// if vA < vB then PC += CCCC
    IfLt = 0x34,
    /// if vA >= vB then PC += CCCC
    IfGe = 0x35,
    /// if vA > vB then PC += CCCC
    IfGt = 0x36,
    /// if vA <= vB then PC += CCCC
    IfLe = 0x37,
    /// if vAA == 0 then PC += BBBB
    IfEqz = 0x38,
    /// if vAA != 0 then PC += BBBB
    IfNez = 0x39,
    /// if vAA < 0 then PC += BBBB
    IfLtz = 0x3A,
    /// if vAA >= 0 then PC += BBBB
    IfGez = 0x3B,
    /// if vAA > 0 then PC += BBBB
    IfGtz = 0x3C,
    /// if vAA <= 0 then PC += BBBB
    IfLez = 0x3D,

    // ===== Arrays (0x44-0x4E) =====
    /// vAA = vBB[vCC]
    Aget = 0x44,
    /// vBB[vCC] = vAA
    Aput = 0x4B,
    /// vBB[vCC] = vAA (boolean)
    AputBoolean = 0x4E,

    // ===== Fields (0x52-0x6A) =====
    /// vA = vB.fields[CCCC]
    Iget = 0x52,
    /// vA = vB.fields[CCCC] (boolean)
    IgetBoolean = 0x55,
    /// vB.fields[CCCC] = vA
    Iput = 0x59,
    /// vB.fields[CCCC] = vA (boolean)
    IputBoolean = 0x5C,
    /// vAA = fields[BBBB]
    Sget = 0x60,
    /// vAA = fields[BBBB] (boolean)
    SgetBoolean = 0x63,
    /// fields[BBBB] = vAA
    Sput = 0x67,
    /// fields[BBBB] = vAA (boolean)
    SputBoolean = 0x6A,

    // ===== Invokes (0x6E-0x78) =====
    /// methods[BBBB](vC..vG) with virtual dispatch
    InvokeVirtual = 0x6E,
    /// methods[BBBB](vC..vG) on the superclass
    InvokeSuper = 0x6F,
    /// methods[BBBB](vC..vG) without dispatch (private, constructors)
    InvokeDirect = 0x70,
    /// methods[BBBB](vC..vG) static
    InvokeStatic = 0x71,
    /// methods[BBBB](vC..vG) through an interface
    InvokeInterface = 0x72,
    /// methods[BBBB](vCCCC..) with virtual dispatch
    InvokeVirtualRange = 0x74,
    /// methods[BBBB](vCCCC..) on the superclass
    InvokeSuperRange = 0x75,
    /// methods[BBBB](vCCCC..) without dispatch
    InvokeDirectRange = 0x76,
    /// methods[BBBB](vCCCC..) static
    InvokeStaticRange = 0x77,
    /// methods[BBBB](vCCCC..) through an interface
    InvokeInterfaceRange = 0x78,

    // ===== Integer Arithmetic (0x90-0x97) =====
    /// vAA = vBB + vCC
    AddInt = 0x90,
    /// vAA = vBB - vCC
    SubInt = 0x91,
    /// vAA = vBB * vCC
    MulInt = 0x92,
    /// vAA = vBB / vCC
    DivInt = 0x93,
    /// vAA = vBB & vCC
    AndInt = 0x95,
    /// vAA = vBB | vCC
    OrInt = 0x96,
    /// vAA = vBB ^ vCC
    XorInt = 0x97,

    // ===== Literal Arithmetic (0xD0-0xE2) =====
    /// vA = vB + #CCCC
    AddIntLit16 = 0xD0,
    /// vA = #CCCC - vB
    RsubInt = 0xD1,
    /// vA = vB * #CCCC
    MulIntLit16 = 0xD2,
    /// vAA = vBB + #CC
    AddIntLit8 = 0xD8,
    /// vAA = #CC - vBB
    RsubIntLit8 = 0xD9,
    /// vAA = vBB * #CC
    MulIntLit8 = 0xDA,
    /// vAA = vBB / #CC
    DivIntLit8 = 0xDB,
    /// vAA = vBB % #CC
    RemIntLit8 = 0xDC,
    /// vAA = vBB & #CC
    AndIntLit8 = 0xDD,
    /// vAA = vBB | #CC
    OrIntLit8 = 0xDE,
    /// vAA = vBB ^ #CC
    XorIntLit8 = 0xDF,
    /// vAA = vBB << #CC
    ShlIntLit8 = 0xE0,
    /// vAA = vBB >> #CC
    ShrIntLit8 = 0xE1,
    /// vAA = vBB >>> #CC
    UshrIntLit8 = 0xE2,
}

/// Instruction format identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Format {
    /// `ØØ|op`
    F10x,
    /// `AA|op`, signed offset
    F10t,
    /// `B|A|op`, signed 4-bit literal
    F11n,
    /// `AA|op`
    F11x,
    /// `B|A|op`
    F12x,
    /// `ØØ|op AAAA`
    F20t,
    /// `AA|op BBBB`, pool index
    F21c,
    /// `AA|op BBBB`, signed literal
    F21s,
    /// `AA|op BBBB`, signed offset
    F21t,
    /// `AA|op CC|BB`, signed 8-bit literal
    F22b,
    /// `B|A|op CCCC`, pool index
    F22c,
    /// `B|A|op CCCC`, signed literal
    F22s,
    /// `B|A|op CCCC`, signed offset
    F22t,
    /// `AA|op CC|BB`
    F23x,
    /// `A|G|op BBBB F|E|D|C`
    F35c,
    /// `AA|op BBBB CCCC`
    F3rc,
}

impl Format {
    /// Size of an instruction of this format, in 16-bit code units
    pub fn size_in_units(self) -> usize {
        match self {
            Self::F10x | Self::F10t | Self::F11n | Self::F11x | Self::F12x => 1,
            Self::F20t
            | Self::F21c
            | Self::F21s
            | Self::F21t
            | Self::F22b
            | Self::F22c
            | Self::F22s
            | Self::F22t
            | Self::F23x => 2,
            Self::F35c | Self::F3rc => 3,
        }
    }

    /// Identity mixed into operand hashes so that equal operands in
    /// different formats hash differently
    pub fn discriminant(self) -> i32 {
        // Spread the small ordinal over the high bits the operand packing
        // leaves mostly unused.
        (self as i32 + 1).wrapping_mul(0x2F0B_3C4D)
    }

    /// Format name as used in the instruction set documentation
    pub fn name(self) -> &'static str {
        match self {
            Self::F10x => "10x",
            Self::F10t => "10t",
            Self::F11n => "11n",
            Self::F11x => "11x",
            Self::F12x => "12x",
            Self::F20t => "20t",
            Self::F21c => "21c",
            Self::F21s => "21s",
            Self::F21t => "21t",
            Self::F22b => "22b",
            Self::F22c => "22c",
            Self::F22s => "22s",
            Self::F22t => "22t",
            Self::F23x => "23x",
            Self::F35c => "35c",
            Self::F3rc => "3rc",
        }
    }
}

/// Kind of pool entry an index operand refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceKind {
    /// String pool
    String,
    /// Type pool
    Type,
    /// Field pool
    Field,
    /// Method pool
    Method,
}

/// How an invoke opcode dispatches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvokeKind {
    /// Virtual dispatch on the receiver
    Virtual,
    /// Superclass implementation
    Super,
    /// No dispatch (private methods and constructors)
    Direct,
    /// Static method
    Static,
    /// Interface dispatch
    Interface,
}

impl Opcode {
    /// Convert byte to opcode
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Nop),
            0x01 => Some(Self::Move),
            0x0A => Some(Self::MoveResult),
            0x0E => Some(Self::ReturnVoid),
            0x0F => Some(Self::Return),
            0x12 => Some(Self::Const4),
            0x13 => Some(Self::Const16),
            0x1A => Some(Self::ConstString),
            0x1C => Some(Self::ConstClass),
            0x22 => Some(Self::NewInstance),
            0x27 => Some(Self::Throw),
            0x28 => Some(Self::Goto),
            0x29 => Some(Self::Goto16),
            0x32 => Some(Self::IfEq),
            0x33 => Some(Self::IfNe),
            0x34 => Some(Self::IfLt),
            0x35 => Some(Self::IfGe),
            0x36 => Some(Self::IfGt),
            0x37 => Some(Self::IfLe),
            0x38 => Some(Self::IfEqz),
            0x39 => Some(Self::IfNez),
            0x3A => Some(Self::IfLtz),
            0x3B => Some(Self::IfGez),
            0x3C => Some(Self::IfGtz),
            0x3D => Some(Self::IfLez),
            0x44 => Some(Self::Aget),
            0x4B => Some(Self::Aput),
            0x4E => Some(Self::AputBoolean),
            0x52 => Some(Self::Iget),
            0x55 => Some(Self::IgetBoolean),
            0x59 => Some(Self::Iput),
            0x5C => Some(Self::IputBoolean),
            0x60 => Some(Self::Sget),
            0x63 => Some(Self::SgetBoolean),
            0x67 => Some(Self::Sput),
            0x6A => Some(Self::SputBoolean),
            0x6E => Some(Self::InvokeVirtual),
            0x6F => Some(Self::InvokeSuper),
            0x70 => Some(Self::InvokeDirect),
            0x71 => Some(Self::InvokeStatic),
            0x72 => Some(Self::InvokeInterface),
            0x74 => Some(Self::InvokeVirtualRange),
            0x75 => Some(Self::InvokeSuperRange),
            0x76 => Some(Self::InvokeDirectRange),
            0x77 => Some(Self::InvokeStaticRange),
            0x78 => Some(Self::InvokeInterfaceRange),
            0x90 => Some(Self::AddInt),
            0x91 => Some(Self::SubInt),
            0x92 => Some(Self::MulInt),
            0x93 => Some(Self::DivInt),
            0x95 => Some(Self::AndInt),
            0x96 => Some(Self::OrInt),
            0x97 => Some(Self::XorInt),
            0xD0 => Some(Self::AddIntLit16),
            0xD1 => Some(Self::RsubInt),
            0xD2 => Some(Self::MulIntLit16),
            0xD8 => Some(Self::AddIntLit8),
            0xD9 => Some(Self::RsubIntLit8),
            0xDA => Some(Self::MulIntLit8),
            0xDB => Some(Self::DivIntLit8),
            0xDC => Some(Self::RemIntLit8),
            0xDD => Some(Self::AndIntLit8),
            0xDE => Some(Self::OrIntLit8),
            0xDF => Some(Self::XorIntLit8),
            0xE0 => Some(Self::ShlIntLit8),
            0xE1 => Some(Self::ShrIntLit8),
            0xE2 => Some(Self::UshrIntLit8),
            _ => None,
        }
    }

    /// Convert opcode to byte
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Get the instruction format for this opcode
    pub fn format(self) -> Format {
        match self {
            Self::Nop | Self::ReturnVoid => Format::F10x,
            Self::Goto => Format::F10t,
            Self::Const4 => Format::F11n,
            Self::MoveResult | Self::Return | Self::Throw => Format::F11x,
            Self::Move => Format::F12x,
            Self::Goto16 => Format::F20t,
            Self::ConstString
            | Self::ConstClass
            | Self::NewInstance
            | Self::Sget
            | Self::SgetBoolean
            | Self::Sput
            | Self::SputBoolean => Format::F21c,
            Self::Const16 => Format::F21s,
            Self::IfEqz | Self::IfNez | Self::IfLtz | Self::IfGez | Self::IfGtz | Self::IfLez => {
                Format::F21t
            }
            Self::AddIntLit8
            | Self::RsubIntLit8
            | Self::MulIntLit8
            | Self::DivIntLit8
            | Self::RemIntLit8
            | Self::AndIntLit8
            | Self::OrIntLit8
            | Self::XorIntLit8
            | Self::ShlIntLit8
            | Self::ShrIntLit8
            | Self::UshrIntLit8 => Format::F22b,
            Self::Iget | Self::IgetBoolean | Self::Iput | Self::IputBoolean => Format::F22c,
            Self::AddIntLit16 | Self::RsubInt | Self::MulIntLit16 => Format::F22s,
            Self::IfEq | Self::IfNe | Self::IfLt | Self::IfGe | Self::IfGt | Self::IfLe => {
                Format::F22t
            }
            Self::Aget
            | Self::Aput
            | Self::AputBoolean
            | Self::AddInt
            | Self::SubInt
            | Self::MulInt
            | Self::DivInt
            | Self::AndInt
            | Self::OrInt
            | Self::XorInt => Format::F23x,
            Self::InvokeVirtual
            | Self::InvokeSuper
            | Self::InvokeDirect
            | Self::InvokeStatic
            | Self::InvokeInterface => Format::F35c,
            Self::InvokeVirtualRange
            | Self::InvokeSuperRange
            | Self::InvokeDirectRange
            | Self::InvokeStaticRange
            | Self::InvokeInterfaceRange => Format::F3rc,
        }
    }

    /// Pool the index operand of this opcode refers to, if any
    pub fn reference_kind(self) -> Option<ReferenceKind> {
        match self {
            Self::ConstString => Some(ReferenceKind::String),
            Self::ConstClass | Self::NewInstance => Some(ReferenceKind::Type),
            Self::Sget
            | Self::SgetBoolean
            | Self::Sput
            | Self::SputBoolean
            | Self::Iget
            | Self::IgetBoolean
            | Self::Iput
            | Self::IputBoolean => Some(ReferenceKind::Field),
            _ if self.invoke_kind().is_some() => Some(ReferenceKind::Method),
            _ => None,
        }
    }

    /// Dispatch kind of an invoke opcode
    pub fn invoke_kind(self) -> Option<InvokeKind> {
        match self {
            Self::InvokeVirtual | Self::InvokeVirtualRange => Some(InvokeKind::Virtual),
            Self::InvokeSuper | Self::InvokeSuperRange => Some(InvokeKind::Super),
            Self::InvokeDirect | Self::InvokeDirectRange => Some(InvokeKind::Direct),
            Self::InvokeStatic | Self::InvokeStaticRange => Some(InvokeKind::Static),
            Self::InvokeInterface | Self::InvokeInterfaceRange => Some(InvokeKind::Interface),
            _ => None,
        }
    }

    /// Invoke opcode of the same shape (plain or range) with another
    /// dispatch kind
    pub fn with_invoke_kind(self, kind: InvokeKind) -> Option<Self> {
        let range = self.format() == Format::F3rc;
        self.invoke_kind()?;
        Some(match (kind, range) {
            (InvokeKind::Virtual, false) => Self::InvokeVirtual,
            (InvokeKind::Super, false) => Self::InvokeSuper,
            (InvokeKind::Direct, false) => Self::InvokeDirect,
            (InvokeKind::Static, false) => Self::InvokeStatic,
            (InvokeKind::Interface, false) => Self::InvokeInterface,
            (InvokeKind::Virtual, true) => Self::InvokeVirtualRange,
            (InvokeKind::Super, true) => Self::InvokeSuperRange,
            (InvokeKind::Direct, true) => Self::InvokeDirectRange,
            (InvokeKind::Static, true) => Self::InvokeStaticRange,
            (InvokeKind::Interface, true) => Self::InvokeInterfaceRange,
        })
    }

    /// Check if this opcode reads a static field
    pub fn is_static_get(self) -> bool {
        matches!(self, Self::Sget | Self::SgetBoolean)
    }

    /// Check if this opcode writes a static field
    pub fn is_static_put(self) -> bool {
        matches!(self, Self::Sput | Self::SputBoolean)
    }

    /// Check if this opcode reads an instance field
    pub fn is_instance_get(self) -> bool {
        matches!(self, Self::Iget | Self::IgetBoolean)
    }

    /// Check if this opcode is a jump instruction
    pub fn is_jump(self) -> bool {
        matches!(
            self.format(),
            Format::F10t | Format::F20t | Format::F21t | Format::F22t
        )
    }

    /// Get the opcode mnemonic
    pub fn name(self) -> &'static str {
        match self {
            Self::Nop => "nop",
            Self::Move => "move",
            Self::MoveResult => "move-result",
            Self::ReturnVoid => "return-void",
            Self::Return => "return",
            Self::Const4 => "const/4",
            Self::Const16 => "const/16",
            Self::ConstString => "const-string",
            Self::ConstClass => "const-class",
            Self::NewInstance => "new-instance",
            Self::Throw => "throw",
            Self::Goto => "goto",
            Self::Goto16 => "goto/16",
            Self::IfEq => "if-eq",
            Self::IfNe => "if-ne",
            Self::IfLt => "if-lt",
            Self::IfGe => "if-ge",
            Self::IfGt => "if-gt",
            Self::IfLe => "if-le",
            Self::IfEqz => "if-eqz",
            Self::IfNez => "if-nez",
            Self::IfLtz => "if-ltz",
            Self::IfGez => "if-gez",
            Self::IfGtz => "if-gtz",
            Self::IfLez => "if-lez",
            Self::Aget => "aget",
            Self::Aput => "aput",
            Self::AputBoolean => "aput-boolean",
            Self::Iget => "iget",
            Self::IgetBoolean => "iget-boolean",
            Self::Iput => "iput",
            Self::IputBoolean => "iput-boolean",
            Self::Sget => "sget",
            Self::SgetBoolean => "sget-boolean",
            Self::Sput => "sput",
            Self::SputBoolean => "sput-boolean",
            Self::InvokeVirtual => "invoke-virtual",
            Self::InvokeSuper => "invoke-super",
            Self::InvokeDirect => "invoke-direct",
            Self::InvokeStatic => "invoke-static",
            Self::InvokeInterface => "invoke-interface",
            Self::InvokeVirtualRange => "invoke-virtual/range",
            Self::InvokeSuperRange => "invoke-super/range",
            Self::InvokeDirectRange => "invoke-direct/range",
            Self::InvokeStaticRange => "invoke-static/range",
            Self::InvokeInterfaceRange => "invoke-interface/range",
            Self::AddInt => "add-int",
            Self::SubInt => "sub-int",
            Self::MulInt => "mul-int",
            Self::DivInt => "div-int",
            Self::AndInt => "and-int",
            Self::OrInt => "or-int",
            Self::XorInt => "xor-int",
            Self::AddIntLit16 => "add-int/lit16",
            Self::RsubInt => "rsub-int",
            Self::MulIntLit16 => "mul-int/lit16",
            Self::AddIntLit8 => "add-int/lit8",
            Self::RsubIntLit8 => "rsub-int/lit8",
            Self::MulIntLit8 => "mul-int/lit8",
            Self::DivIntLit8 => "div-int/lit8",
            Self::RemIntLit8 => "rem-int/lit8",
            Self::AndIntLit8 => "and-int/lit8",
            Self::OrIntLit8 => "or-int/lit8",
            Self::XorIntLit8 => "xor-int/lit8",
            Self::ShlIntLit8 => "shl-int/lit8",
            Self::ShrIntLit8 => "shr-int/lit8",
            Self::UshrIntLit8 => "ushr-int/lit8",
        }
    }

    /// All opcodes in byte order
    pub fn all() -> impl Iterator<Item = Opcode> {
        (0..=u8::MAX).filter_map(Opcode::from_u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip_all() {
        let mut count = 0;
        for op in Opcode::all() {
            assert_eq!(Opcode::from_u8(op.to_u8()), Some(op));
            count += 1;
        }
        assert_eq!(count, 67);
    }

    #[test]
    fn test_invalid_opcode_bytes() {
        assert_eq!(Opcode::from_u8(0x02), None);
        assert_eq!(Opcode::from_u8(0xFF), None);
    }

    #[test]
    fn test_lit8_family_is_22b() {
        for op in [Opcode::AddIntLit8, Opcode::RsubIntLit8, Opcode::UshrIntLit8] {
            assert_eq!(op.format(), Format::F22b);
            assert_eq!(op.format().size_in_units(), 2);
            assert_eq!(op.reference_kind(), None);
        }
    }

    #[test]
    fn test_reference_kinds() {
        assert_eq!(Opcode::ConstString.reference_kind(), Some(ReferenceKind::String));
        assert_eq!(Opcode::NewInstance.reference_kind(), Some(ReferenceKind::Type));
        assert_eq!(Opcode::SgetBoolean.reference_kind(), Some(ReferenceKind::Field));
        assert_eq!(Opcode::Iput.reference_kind(), Some(ReferenceKind::Field));
        assert_eq!(Opcode::InvokeDirectRange.reference_kind(), Some(ReferenceKind::Method));
        assert_eq!(Opcode::AddInt.reference_kind(), None);
    }

    #[test]
    fn test_invoke_kind_switch_keeps_shape() {
        assert_eq!(
            Opcode::InvokeDirect.with_invoke_kind(InvokeKind::Virtual),
            Some(Opcode::InvokeVirtual)
        );
        assert_eq!(
            Opcode::InvokeDirectRange.with_invoke_kind(InvokeKind::Virtual),
            Some(Opcode::InvokeVirtualRange)
        );
        assert_eq!(Opcode::AddInt.with_invoke_kind(InvokeKind::Virtual), None);
    }

    #[test]
    fn test_jumps() {
        assert!(Opcode::Goto.is_jump());
        assert!(Opcode::Goto16.is_jump());
        assert!(Opcode::IfNez.is_jump());
        assert!(Opcode::IfLe.is_jump());
        assert!(!Opcode::ReturnVoid.is_jump());
    }

    #[test]
    fn test_format_discriminants_differ() {
        assert_ne!(Format::F22b.discriminant(), Format::F23x.discriminant());
    }
}

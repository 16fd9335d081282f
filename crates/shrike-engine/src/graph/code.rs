//! Method bodies
//!
//! A body is either symbolic stack code (as read from class files) or
//! register code made of encoded-format [`Instruction`]s whose pool indices
//! point into a per-method [`ReferenceTable`].

use super::items::{FieldId, MethodId, TypeId};
use shrike_bytecode::{Instruction, InvokeKind};

/// Jump target label within a stack body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

/// Logical binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    /// `&`
    And,
    /// `|`
    Or,
    /// `^`
    Xor,
}

/// Stack machine instruction with symbolic references
#[derive(Debug, Clone, PartialEq)]
pub enum StackInstr {
    /// Jump target marker
    Label(Label),
    /// Stack map frame
    Frame,
    /// Source position marker
    Position { line: u32 },
    /// Push a numeric constant
    ConstNumber(i64),
    /// Push a string constant
    ConstString(String),
    /// Push a class literal
    ConstClass(TypeId),
    /// Load a local slot
    Load { slot: u16 },
    /// Store to a local slot
    Store { slot: u16 },
    /// Logical binary operation on the two topmost values
    LogicalBinop(LogicalOp),
    /// Store into an array element
    ArrayStore,
    /// Conditional branch
    If { target: Label },
    /// Unconditional branch
    Goto { target: Label },
    /// Method invocation
    Invoke { kind: InvokeKind, method: MethodId },
    /// Read a static field
    StaticGet(FieldId),
    /// Write a static field
    StaticPut(FieldId),
    /// Read an instance field
    InstanceGet(FieldId),
    /// Write an instance field
    InstancePut(FieldId),
    /// Allocate an instance
    New(TypeId),
    /// Duplicate the top of stack
    Dup,
    /// Discard the top of stack
    Pop,
    /// Return from the method
    Return,
    /// Throw the top of stack
    Throw,
}

/// Operand-free shape of a [`StackInstr`], used for sequence matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackKind {
    #[allow(missing_docs)]
    Label,
    #[allow(missing_docs)]
    Frame,
    #[allow(missing_docs)]
    Position,
    /// Any constant push
    Const,
    #[allow(missing_docs)]
    Load,
    #[allow(missing_docs)]
    Store,
    #[allow(missing_docs)]
    LogicalBinop,
    #[allow(missing_docs)]
    ArrayStore,
    #[allow(missing_docs)]
    If,
    #[allow(missing_docs)]
    Goto,
    #[allow(missing_docs)]
    Invoke,
    #[allow(missing_docs)]
    StaticGet,
    #[allow(missing_docs)]
    StaticPut,
    #[allow(missing_docs)]
    InstanceGet,
    #[allow(missing_docs)]
    InstancePut,
    #[allow(missing_docs)]
    New,
    /// Any other stack manipulation or terminator
    Other,
}

impl StackInstr {
    /// Operand-free shape of this instruction
    pub fn kind(&self) -> StackKind {
        match self {
            StackInstr::Label(_) => StackKind::Label,
            StackInstr::Frame => StackKind::Frame,
            StackInstr::Position { .. } => StackKind::Position,
            StackInstr::ConstNumber(_) | StackInstr::ConstString(_) | StackInstr::ConstClass(_) => {
                StackKind::Const
            }
            StackInstr::Load { .. } => StackKind::Load,
            StackInstr::Store { .. } => StackKind::Store,
            StackInstr::LogicalBinop(_) => StackKind::LogicalBinop,
            StackInstr::ArrayStore => StackKind::ArrayStore,
            StackInstr::If { .. } => StackKind::If,
            StackInstr::Goto { .. } => StackKind::Goto,
            StackInstr::Invoke { .. } => StackKind::Invoke,
            StackInstr::StaticGet(_) => StackKind::StaticGet,
            StackInstr::StaticPut(_) => StackKind::StaticPut,
            StackInstr::InstanceGet(_) => StackKind::InstanceGet,
            StackInstr::InstancePut(_) => StackKind::InstancePut,
            StackInstr::New(_) => StackKind::New,
            StackInstr::Dup | StackInstr::Pop | StackInstr::Return | StackInstr::Throw => {
                StackKind::Other
            }
        }
    }

    /// Labels, frames and positions do not execute
    pub fn is_marker(&self) -> bool {
        matches!(
            self,
            StackInstr::Label(_) | StackInstr::Frame | StackInstr::Position { .. }
        )
    }

    /// Whether this instruction transfers control to a label
    pub fn is_jump(&self) -> bool {
        matches!(self, StackInstr::If { .. } | StackInstr::Goto { .. })
    }

    /// The field written by a `putstatic`
    pub fn static_put_field(&self) -> Option<FieldId> {
        match self {
            StackInstr::StaticPut(field) => Some(*field),
            _ => None,
        }
    }
}

/// Per-method constant pool for register code
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceTable {
    /// String constants
    pub strings: Vec<String>,
    /// Type references
    pub types: Vec<TypeId>,
    /// Field references
    pub fields: Vec<FieldId>,
    /// Method references
    pub methods: Vec<MethodId>,
}

/// Register machine body
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterCode {
    /// Number of registers used by the body
    pub registers: u16,
    /// Instructions in layout order
    pub instructions: Vec<Instruction>,
    /// Pool referenced by the instructions
    pub refs: ReferenceTable,
}

impl RegisterCode {
    /// Create a register body
    pub fn new(registers: u16, instructions: Vec<Instruction>, refs: ReferenceTable) -> Self {
        Self {
            registers,
            instructions,
            refs,
        }
    }

    /// Size of the body in code units
    pub fn size_in_units(&self) -> usize {
        self.instructions.iter().map(Instruction::size_in_units).sum()
    }
}

/// A method body
#[derive(Debug, Clone, PartialEq)]
pub enum Code {
    /// Class-file style stack code
    Stack(Vec<StackInstr>),
    /// Register code in the fixed-width encoding
    Register(RegisterCode),
}

impl Code {
    /// Stack instructions, if this is stack code
    pub fn as_stack(&self) -> Option<&[StackInstr]> {
        match self {
            Code::Stack(instructions) => Some(instructions),
            Code::Register(_) => None,
        }
    }

    /// Register body, if this is register code
    pub fn as_register(&self) -> Option<&RegisterCode> {
        match self {
            Code::Register(code) => Some(code),
            Code::Stack(_) => None,
        }
    }
}

//! Instructions, opcodes and opcode properties.
//!
//! Instructions are modelled as one tagged variant per opcode family
//! ([`InstKind`]) plus an ordered operand list. Operand layouts:
//!
//! | Family | Operands |
//! |--------|----------|
//! | `ret` | `[]` or `[value]` |
//! | `br` | `[target]` or `[cond, then, else]` |
//! | binary / compare | `[lhs, rhs]` |
//! | `alloca` | `[]` |
//! | `load` | `[ptr]` |
//! | `store` | `[value, ptr]` |
//! | `phi` | `[v0, bb0, v1, bb1, ...]` |
//! | `call` | `[callee, arg0, arg1, ...]` |
//! | `getelementptr` | `[ptr, idx0, idx1, ...]` |
//! | casts | `[value]` |
//!
//! Keeping every operand in one list lets the def-use machinery treat all
//! instructions uniformly while pattern matching on [`InstKind`] stays exhaustive.

use bitflags::bitflags;
use strum::{Display, EnumCount, EnumIter, IntoStaticStr};

use crate::ir::{BlockId, TypeId, Use, Value};

/// Flat opcode of an instruction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum Opcode {
    Ret,
    Br,
    Add,
    Sub,
    Mul,
    SDiv,
    FAdd,
    FSub,
    FMul,
    FDiv,
    Alloca,
    Load,
    Store,
    #[strum(serialize = "icmp eq")]
    ICmpEq,
    #[strum(serialize = "icmp ne")]
    ICmpNe,
    #[strum(serialize = "icmp sgt")]
    ICmpGt,
    #[strum(serialize = "icmp sge")]
    ICmpGe,
    #[strum(serialize = "icmp slt")]
    ICmpLt,
    #[strum(serialize = "icmp sle")]
    ICmpLe,
    #[strum(serialize = "fcmp ueq")]
    FCmpEq,
    #[strum(serialize = "fcmp une")]
    FCmpNe,
    #[strum(serialize = "fcmp ugt")]
    FCmpGt,
    #[strum(serialize = "fcmp uge")]
    FCmpGe,
    #[strum(serialize = "fcmp ult")]
    FCmpLt,
    #[strum(serialize = "fcmp ule")]
    FCmpLe,
    Phi,
    Call,
    GetElementPtr,
    ZExt,
    FpToSi,
    SiToFp,
}

bitflags! {
    /// Static properties of an opcode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct OpcodeFlags: u16 {
        /// Ends a basic block.
        const TERMINATOR = 0x0001;
        /// Lives in the front segment of a block (alloca, phi).
        const FRONT_SEGMENT = 0x0002;
        /// Reads memory through a pointer operand.
        const READS_MEMORY = 0x0004;
        /// Writes memory through a pointer operand.
        const WRITES_MEMORY = 0x0008;
        /// Transfers control to another function.
        const CALL = 0x0010;
        /// Produces an `i1` comparison result.
        const COMPARE = 0x0020;
        /// Integer or float arithmetic.
        const ARITHMETIC = 0x0040;
        /// Converts between scalar types.
        const CAST = 0x0080;
    }
}

impl Opcode {
    /// Returns the static properties of this opcode.
    #[must_use]
    pub fn flags(self) -> OpcodeFlags {
        match self {
            Opcode::Ret | Opcode::Br => OpcodeFlags::TERMINATOR,
            Opcode::Alloca | Opcode::Phi => OpcodeFlags::FRONT_SEGMENT,
            Opcode::Load => OpcodeFlags::READS_MEMORY,
            Opcode::Store => OpcodeFlags::WRITES_MEMORY,
            Opcode::Call => OpcodeFlags::CALL,
            Opcode::Add
            | Opcode::Sub
            | Opcode::Mul
            | Opcode::SDiv
            | Opcode::FAdd
            | Opcode::FSub
            | Opcode::FMul
            | Opcode::FDiv => OpcodeFlags::ARITHMETIC,
            Opcode::ICmpEq
            | Opcode::ICmpNe
            | Opcode::ICmpGt
            | Opcode::ICmpGe
            | Opcode::ICmpLt
            | Opcode::ICmpLe
            | Opcode::FCmpEq
            | Opcode::FCmpNe
            | Opcode::FCmpGt
            | Opcode::FCmpGe
            | Opcode::FCmpLt
            | Opcode::FCmpLe => OpcodeFlags::COMPARE,
            Opcode::ZExt | Opcode::FpToSi | Opcode::SiToFp => OpcodeFlags::CAST,
            Opcode::GetElementPtr => OpcodeFlags::empty(),
        }
    }

    /// Returns true for `ret` and `br`.
    #[must_use]
    pub fn is_terminator(self) -> bool {
        self.flags().contains(OpcodeFlags::TERMINATOR)
    }

    /// Returns true for opcodes placed in a block's front segment.
    #[must_use]
    pub fn is_front_segment(self) -> bool {
        self.flags().contains(OpcodeFlags::FRONT_SEGMENT)
    }
}

/// Integer arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum IntBinaryOp {
    Add,
    Sub,
    Mul,
    SDiv,
}

/// Float arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum FloatBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Comparison predicates, shared by integer (signed) and float compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum CmpPredicate {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// Scalar conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum CastOp {
    ZExt,
    FpToSi,
    SiToFp,
}

/// The opcode family and static payload of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstKind {
    /// Function return, with or without a value.
    Ret,
    /// Unconditional or conditional branch.
    Br,
    /// `i32` arithmetic.
    IntBinary(IntBinaryOp),
    /// `float` arithmetic.
    FloatBinary(FloatBinaryOp),
    /// Stack slot allocation; the allocated type is the result's pointee.
    Alloca,
    /// Memory read.
    Load,
    /// Memory write.
    Store,
    /// Signed `i32` comparison.
    ICmp(CmpPredicate),
    /// `float` comparison.
    FCmp(CmpPredicate),
    /// SSA join.
    Phi,
    /// Direct function call.
    Call,
    /// Address computation.
    GetElementPtr,
    /// Scalar conversion.
    Cast(CastOp),
}

impl InstKind {
    /// Returns the flat opcode for this kind.
    #[must_use]
    pub fn opcode(self) -> Opcode {
        match self {
            InstKind::Ret => Opcode::Ret,
            InstKind::Br => Opcode::Br,
            InstKind::IntBinary(op) => match op {
                IntBinaryOp::Add => Opcode::Add,
                IntBinaryOp::Sub => Opcode::Sub,
                IntBinaryOp::Mul => Opcode::Mul,
                IntBinaryOp::SDiv => Opcode::SDiv,
            },
            InstKind::FloatBinary(op) => match op {
                FloatBinaryOp::Add => Opcode::FAdd,
                FloatBinaryOp::Sub => Opcode::FSub,
                FloatBinaryOp::Mul => Opcode::FMul,
                FloatBinaryOp::Div => Opcode::FDiv,
            },
            InstKind::Alloca => Opcode::Alloca,
            InstKind::Load => Opcode::Load,
            InstKind::Store => Opcode::Store,
            InstKind::ICmp(pred) => match pred {
                CmpPredicate::Eq => Opcode::ICmpEq,
                CmpPredicate::Ne => Opcode::ICmpNe,
                CmpPredicate::Gt => Opcode::ICmpGt,
                CmpPredicate::Ge => Opcode::ICmpGe,
                CmpPredicate::Lt => Opcode::ICmpLt,
                CmpPredicate::Le => Opcode::ICmpLe,
            },
            InstKind::FCmp(pred) => match pred {
                CmpPredicate::Eq => Opcode::FCmpEq,
                CmpPredicate::Ne => Opcode::FCmpNe,
                CmpPredicate::Gt => Opcode::FCmpGt,
                CmpPredicate::Ge => Opcode::FCmpGe,
                CmpPredicate::Lt => Opcode::FCmpLt,
                CmpPredicate::Le => Opcode::FCmpLe,
            },
            InstKind::Phi => Opcode::Phi,
            InstKind::Call => Opcode::Call,
            InstKind::GetElementPtr => Opcode::GetElementPtr,
            InstKind::Cast(op) => match op {
                CastOp::ZExt => Opcode::ZExt,
                CastOp::FpToSi => Opcode::FpToSi,
                CastOp::SiToFp => Opcode::SiToFp,
            },
        }
    }
}

/// An instruction stored in the module arena.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub(crate) kind: InstKind,
    pub(crate) ty: TypeId,
    pub(crate) operands: Vec<Value>,
    pub(crate) parent: BlockId,
    pub(crate) name: Option<String>,
    pub(crate) uses: Vec<Use>,
}

impl Instruction {
    /// The opcode family.
    #[must_use]
    pub fn kind(&self) -> InstKind {
        self.kind
    }

    /// The flat opcode.
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        self.kind.opcode()
    }

    /// The result type (`void` for instructions without a result).
    #[must_use]
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// All operands in slot order.
    #[must_use]
    pub fn operands(&self) -> &[Value] {
        &self.operands
    }

    /// The operand in slot `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    #[must_use]
    pub fn operand(&self, index: usize) -> Value {
        self.operands[index]
    }

    /// Number of operand slots.
    #[must_use]
    pub fn num_operands(&self) -> usize {
        self.operands.len()
    }

    /// The block containing this instruction.
    #[must_use]
    pub fn parent(&self) -> BlockId {
        self.parent
    }

    /// The instruction's name, if one was assigned.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Operand slots currently referring to this instruction's result.
    #[must_use]
    pub fn uses(&self) -> &[Use] {
        &self.uses
    }

    /// Returns true for `ret` and `br`.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        self.opcode().is_terminator()
    }

    /// Returns true for `br`.
    #[must_use]
    pub fn is_br(&self) -> bool {
        self.kind == InstKind::Br
    }

    /// Returns true for `ret`.
    #[must_use]
    pub fn is_ret(&self) -> bool {
        self.kind == InstKind::Ret
    }

    /// Returns true for `phi`.
    #[must_use]
    pub fn is_phi(&self) -> bool {
        self.kind == InstKind::Phi
    }

    /// Returns true for `alloca`.
    #[must_use]
    pub fn is_alloca(&self) -> bool {
        self.kind == InstKind::Alloca
    }

    /// Returns true for `load`.
    #[must_use]
    pub fn is_load(&self) -> bool {
        self.kind == InstKind::Load
    }

    /// Returns true for `store`.
    #[must_use]
    pub fn is_store(&self) -> bool {
        self.kind == InstKind::Store
    }

    /// Returns true for `call`.
    #[must_use]
    pub fn is_call(&self) -> bool {
        self.kind == InstKind::Call
    }

    /// Returns true for `getelementptr`.
    #[must_use]
    pub fn is_gep(&self) -> bool {
        self.kind == InstKind::GetElementPtr
    }

    /// Branch targets in operand order (empty for non-branches).
    #[must_use]
    pub fn branch_targets(&self) -> Vec<BlockId> {
        if !self.is_br() {
            return Vec::new();
        }
        self.operands.iter().filter_map(|op| op.as_block()).collect()
    }

    /// Incoming `(value, block)` pairs of a phi (empty for non-phis).
    #[must_use]
    pub fn phi_incoming(&self) -> Vec<(Value, BlockId)> {
        if !self.is_phi() {
            return Vec::new();
        }
        self.operands
            .chunks_exact(2)
            .filter_map(|pair| pair[1].as_block().map(|bb| (pair[0], bb)))
            .collect()
    }

    /// The callee of a call instruction.
    #[must_use]
    pub fn callee(&self) -> Option<crate::ir::FuncId> {
        if !self.is_call() {
            return None;
        }
        self.operands.first().and_then(|op| op.as_func())
    }

    /// The actual arguments of a call instruction.
    #[must_use]
    pub fn call_args(&self) -> &[Value] {
        if self.is_call() && !self.operands.is_empty() {
            &self.operands[1..]
        } else {
            &[]
        }
    }
}

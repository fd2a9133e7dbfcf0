//! Operand handles and def-use records.
//!
//! A [`Value`] names anything that can appear in an operand slot. A [`User`]
//! names anything that owns operand slots. Each value carries a list of
//! [`Use`] records, one per operand slot that currently refers to it; the
//! [`Module`](crate::ir::Module) keeps both directions in sync on every edit.

use crate::ir::{ArgId, BlockId, ConstId, FuncId, GlobalId, InstId};

/// Anything that can be referenced from an operand slot.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Value {
    /// The result of an instruction.
    Inst(InstId),
    /// A formal argument of a function.
    Arg(ArgId),
    /// An interned constant.
    Const(ConstId),
    /// The address of a global variable.
    Global(GlobalId),
    /// A basic block, used as a branch target or phi incoming block.
    Block(BlockId),
    /// A function, used as the callee of a call.
    Func(FuncId),
}

impl Value {
    /// Returns the instruction handle if this value is an instruction result.
    #[must_use]
    pub fn as_inst(self) -> Option<InstId> {
        match self {
            Value::Inst(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the argument handle if this value is a formal argument.
    #[must_use]
    pub fn as_arg(self) -> Option<ArgId> {
        match self {
            Value::Arg(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the constant handle if this value is a constant.
    #[must_use]
    pub fn as_const(self) -> Option<ConstId> {
        match self {
            Value::Const(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the global handle if this value is a global variable.
    #[must_use]
    pub fn as_global(self) -> Option<GlobalId> {
        match self {
            Value::Global(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the block handle if this value is a basic block.
    #[must_use]
    pub fn as_block(self) -> Option<BlockId> {
        match self {
            Value::Block(id) => Some(id),
            _ => None,
        }
    }

    /// Returns the function handle if this value is a function.
    #[must_use]
    pub fn as_func(self) -> Option<FuncId> {
        match self {
            Value::Func(id) => Some(id),
            _ => None,
        }
    }
}

impl From<InstId> for Value {
    fn from(id: InstId) -> Self {
        Value::Inst(id)
    }
}

impl From<ArgId> for Value {
    fn from(id: ArgId) -> Self {
        Value::Arg(id)
    }
}

impl From<ConstId> for Value {
    fn from(id: ConstId) -> Self {
        Value::Const(id)
    }
}

impl From<GlobalId> for Value {
    fn from(id: GlobalId) -> Self {
        Value::Global(id)
    }
}

impl From<BlockId> for Value {
    fn from(id: BlockId) -> Self {
        Value::Block(id)
    }
}

impl From<FuncId> for Value {
    fn from(id: FuncId) -> Self {
        Value::Func(id)
    }
}

/// An entity that owns operand slots.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum User {
    /// An instruction's operands.
    Inst(InstId),
    /// The elements of an array constant.
    Const(ConstId),
    /// The initializer of a global variable.
    Global(GlobalId),
}

/// One def-use record: `user`'s operand at `index` refers to the value owning
/// this record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Use {
    /// The entity holding the operand slot.
    pub user: User,
    /// Position of the operand slot within the user.
    pub index: usize,
}

impl Use {
    /// Creates a use record.
    #[must_use]
    pub const fn new(user: User, index: usize) -> Self {
        Self { user, index }
    }

    /// Returns the using instruction, if the user is an instruction.
    #[must_use]
    pub fn inst(&self) -> Option<InstId> {
        match self.user {
            User::Inst(id) => Some(id),
            _ => None,
        }
    }
}

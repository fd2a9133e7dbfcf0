//! Functions and their formal arguments.

use crate::ir::{ArgId, BlockId, FuncId, NameTable, TypeId, Use};

/// A function stored in the module arena.
///
/// A function without blocks is a declaration: an external routine whose body
/// is not available (library I/O, runtime helpers).
#[derive(Debug, Clone)]
pub struct Function {
    pub(crate) name: String,
    pub(crate) ty: TypeId,
    pub(crate) ret_ty: TypeId,
    pub(crate) args: Vec<ArgId>,
    pub(crate) blocks: Vec<BlockId>,
    pub(crate) uses: Vec<Use>,
    pub(crate) block_names: NameTable,
    pub(crate) value_names: NameTable,
}

impl Function {
    pub(crate) fn new(name: String, ty: TypeId, ret_ty: TypeId) -> Self {
        Self {
            name,
            ty,
            ret_ty,
            args: Vec::new(),
            blocks: Vec::new(),
            uses: Vec::new(),
            block_names: NameTable::new("label", ""),
            value_names: NameTable::new("op", ""),
        }
    }

    /// The function's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The function type.
    #[must_use]
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// The return type.
    #[must_use]
    pub fn return_type(&self) -> TypeId {
        self.ret_ty
    }

    /// Formal arguments in declaration order.
    #[must_use]
    pub fn args(&self) -> &[ArgId] {
        &self.args
    }

    /// Basic blocks in creation order; the first is the entry block.
    #[must_use]
    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    /// The entry block, if the function has a body.
    #[must_use]
    pub fn entry_block(&self) -> Option<BlockId> {
        self.blocks.first().copied()
    }

    /// Returns true if the function has no body.
    #[must_use]
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Call sites referring to this function.
    #[must_use]
    pub fn uses(&self) -> &[Use] {
        &self.uses
    }
}

/// A formal argument of a function.
#[derive(Debug, Clone)]
pub struct Argument {
    pub(crate) name: Option<String>,
    pub(crate) ty: TypeId,
    pub(crate) parent: FuncId,
    pub(crate) arg_no: usize,
    pub(crate) uses: Vec<Use>,
}

impl Argument {
    /// The argument's name, if one was assigned.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The argument's type.
    #[must_use]
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// The owning function.
    #[must_use]
    pub fn parent(&self) -> FuncId {
        self.parent
    }

    /// Zero-based position in the parameter list.
    #[must_use]
    pub fn arg_no(&self) -> usize {
        self.arg_no
    }

    /// Operand slots currently referring to this argument.
    #[must_use]
    pub fn uses(&self) -> &[Use] {
        &self.uses
    }
}

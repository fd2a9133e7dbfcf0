//! Module-level global variables.

use crate::ir::{ConstId, TypeId, Use};

/// A global variable stored in the module arena.
///
/// As an operand a global stands for its address, so its value type is a
/// pointer to [`value_type`](GlobalVariable::value_type).
#[derive(Debug, Clone)]
pub struct GlobalVariable {
    pub(crate) name: String,
    pub(crate) value_ty: TypeId,
    pub(crate) ptr_ty: TypeId,
    pub(crate) is_const: bool,
    pub(crate) init: Option<ConstId>,
    pub(crate) uses: Vec<Use>,
}

impl GlobalVariable {
    /// The global's unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type of the stored value.
    #[must_use]
    pub fn value_type(&self) -> TypeId {
        self.value_ty
    }

    /// Type of the global as an operand (pointer to the value type).
    #[must_use]
    pub fn pointer_type(&self) -> TypeId {
        self.ptr_ty
    }

    /// Returns true for read-only globals.
    #[must_use]
    pub fn is_const(&self) -> bool {
        self.is_const
    }

    /// The initializer, if any.
    #[must_use]
    pub fn initializer(&self) -> Option<ConstId> {
        self.init
    }

    /// Operand slots currently referring to this global.
    #[must_use]
    pub fn uses(&self) -> &[Use] {
        &self.uses
    }
}

//! Interned constants.
//!
//! Constants are immutable leaf values shared by every user in the module.
//! They are keyed by their structural content, with floats compared by bit
//! pattern so that the key is `Eq + Hash`.

use crate::ir::{ConstId, TypeId, Use};

/// The structural content of a constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    /// A 32-bit integer.
    Int(i32),
    /// A 1-bit boolean.
    Bool(bool),
    /// A 32-bit float, stored as its IEEE-754 bit pattern.
    Float(u32),
    /// The all-zero value of a type.
    Zero(TypeId),
    /// An array of constants.
    Array {
        /// The array type
        ty: TypeId,
        /// Element constants in order
        elements: Vec<ConstId>,
    },
}

impl Constant {
    /// Builds a float constant from its value.
    #[must_use]
    pub fn from_f32(value: f32) -> Self {
        Constant::Float(value.to_bits())
    }

    /// Returns the integer payload of an `Int` constant.
    #[must_use]
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Constant::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the payload of a `Bool` constant.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Constant::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the payload of a `Float` constant.
    #[must_use]
    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Constant::Float(bits) => Some(f32::from_bits(*bits)),
            _ => None,
        }
    }

    /// Returns true if this constant is a zero of its type.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Constant::Int(value) => *value == 0,
            Constant::Bool(value) => !*value,
            Constant::Float(bits) => f32::from_bits(*bits) == 0.0,
            Constant::Zero(_) => true,
            Constant::Array { .. } => false,
        }
    }
}

/// A constant stored in the module's constant table.
#[derive(Debug, Clone)]
pub struct ConstantData {
    pub(crate) kind: Constant,
    pub(crate) ty: TypeId,
    pub(crate) uses: Vec<Use>,
}

impl ConstantData {
    /// The constant's content.
    #[must_use]
    pub fn kind(&self) -> &Constant {
        &self.kind
    }

    /// The constant's type.
    #[must_use]
    pub fn ty(&self) -> TypeId {
        self.ty
    }

    /// Operand slots currently referring to this constant.
    #[must_use]
    pub fn uses(&self) -> &[Use] {
        &self.uses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_bits_key() {
        assert_eq!(Constant::from_f32(1.5), Constant::from_f32(1.5));
        assert_ne!(Constant::from_f32(0.0), Constant::from_f32(-0.0));
        assert_eq!(Constant::from_f32(2.25).as_f32(), Some(2.25));
    }

    #[test]
    fn test_zero_detection() {
        assert!(Constant::Int(0).is_zero());
        assert!(!Constant::Int(3).is_zero());
        assert!(Constant::Bool(false).is_zero());
        assert!(Constant::from_f32(0.0).is_zero());
        assert!(Constant::Zero(TypeId::new(3)).is_zero());
    }
}

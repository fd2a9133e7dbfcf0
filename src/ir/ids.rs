//! Strongly-typed handles for IR entities.
//!
//! Every entity owned by a [`Module`](crate::ir::Module) is addressed by a
//! newtype wrapper around its arena index. The wrappers keep handles of
//! different kinds from being mixed up and make per-entity side tables cheap
//! (`Vec` indexed by [`index`](InstId::index) or hash maps keyed by the handle).
//!
//! Handles stay valid for the lifetime of the module. Removing an entity frees
//! its arena slot without reusing the index, so a stale handle is detected on
//! access instead of silently aliasing a newer entity.

use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub(crate) usize);

        impl $name {
            /// Creates a handle from a raw arena index.
            ///
            /// Intended for tests and side tables; handles are normally
            /// obtained from the [`Module`](crate::ir::Module) factories.
            #[must_use]
            #[inline]
            pub const fn new(index: usize) -> Self {
                $name(index)
            }

            /// Returns the raw arena index of this handle.
            #[must_use]
            #[inline]
            pub const fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<usize> for $name {
            fn from(index: usize) -> Self {
                $name(index)
            }
        }

        impl From<$name> for usize {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Handle of an interned [`Type`](crate::ir::Type).
    ///
    /// Types are interned per module, so two `TypeId`s are equal exactly when
    /// the types they name are structurally equal.
    TypeId,
    "ty"
);

define_id!(
    /// Handle of an interned constant.
    ConstId,
    "c"
);

define_id!(
    /// Handle of a module-level global variable.
    GlobalId,
    "@g"
);

define_id!(
    /// Handle of a function (definition or declaration).
    FuncId,
    "@f"
);

define_id!(
    /// Handle of a basic block.
    BlockId,
    "bb"
);

define_id!(
    /// Handle of an instruction.
    InstId,
    "%"
);

define_id!(
    /// Handle of a formal function argument.
    ArgId,
    "%arg"
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_id_roundtrip() {
        let id = InstId::new(7);
        assert_eq!(id.index(), 7);
        assert_eq!(usize::from(id), 7);
        assert_eq!(InstId::from(7usize), id);
    }

    #[test]
    fn test_id_formatting() {
        assert_eq!(format!("{:?}", BlockId::new(3)), "BlockId(3)");
        assert_eq!(format!("{}", BlockId::new(3)), "bb3");
        assert_eq!(format!("{}", InstId::new(12)), "%12");
        assert_eq!(format!("{}", GlobalId::new(0)), "@g0");
    }

    #[test]
    fn test_id_ordering_and_hashing() {
        let a = FuncId::new(1);
        let b = FuncId::new(2);
        assert!(a < b);

        let set: HashSet<FuncId> = [a, b, FuncId::new(1)].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}

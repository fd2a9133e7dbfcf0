//! The IR type system and its per-module interning table.
//!
//! Types are structural and interned: [`TypeTable::intern`] returns the same
//! [`TypeId`] for structurally equal types, so handle equality is type
//! equality. The primitive types are interned up front at fixed indices.

use std::collections::HashMap;

use crate::ir::TypeId;

/// A structural IR type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// No value (result of `ret`, `br`, `store` and void calls).
    Void,
    /// The type of basic blocks.
    Label,
    /// A two's complement integer, 1 or 32 bits wide.
    Integer(u32),
    /// A 32-bit IEEE-754 float.
    Float,
    /// A pointer to a value of the element type.
    Pointer(TypeId),
    /// A fixed-length array.
    Array(TypeId, usize),
    /// A function signature.
    Function {
        /// Return type
        ret: TypeId,
        /// Parameter types in declaration order
        params: Vec<TypeId>,
    },
}

impl Type {
    /// Returns true for integer types of any width.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Integer(_))
    }

    /// Returns true for the float type.
    #[must_use]
    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float)
    }

    /// Returns true for pointer types.
    #[must_use]
    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    /// Returns true for array types.
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(..))
    }

    /// Returns true for the void type.
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    /// Returns true for function types.
    #[must_use]
    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function { .. })
    }

    /// Returns the bit width of an integer type.
    #[must_use]
    pub fn int_bits(&self) -> Option<u32> {
        match self {
            Type::Integer(bits) => Some(*bits),
            _ => None,
        }
    }
}

pub(crate) const VOID: TypeId = TypeId(0);
pub(crate) const LABEL: TypeId = TypeId(1);
pub(crate) const INT1: TypeId = TypeId(2);
pub(crate) const INT32: TypeId = TypeId(3);
pub(crate) const FLOAT: TypeId = TypeId(4);

/// Interning table mapping structural types to stable handles.
#[derive(Debug, Clone)]
pub struct TypeTable {
    types: Vec<Type>,
    interned: HashMap<Type, TypeId>,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    /// Creates a table holding the primitive types.
    #[must_use]
    pub fn new() -> Self {
        let mut table = Self {
            types: Vec::new(),
            interned: HashMap::new(),
        };
        for ty in [
            Type::Void,
            Type::Label,
            Type::Integer(1),
            Type::Integer(32),
            Type::Float,
        ] {
            table.intern(ty);
        }
        table
    }

    /// Returns the handle for `ty`, interning it on first sight.
    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.interned.get(&ty) {
            return id;
        }
        let id = TypeId(self.types.len());
        self.types.push(ty.clone());
        self.interned.insert(ty, id);
        id
    }

    /// Returns the structural type behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not belong to this table.
    #[must_use]
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    /// Returns the number of distinct types interned so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Always false; the primitive types are present from construction on.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Renders a type in the conventional textual syntax (`i32`, `float*`, `[4 x i32]`).
    #[must_use]
    pub fn render(&self, id: TypeId) -> String {
        match self.get(id) {
            Type::Void => "void".to_string(),
            Type::Label => "label".to_string(),
            Type::Integer(bits) => format!("i{}", bits),
            Type::Float => "float".to_string(),
            Type::Pointer(elem) => format!("{}*", self.render(*elem)),
            Type::Array(elem, count) => format!("[{} x {}]", count, self.render(*elem)),
            Type::Function { ret, params } => {
                let params: Vec<String> = params.iter().map(|p| self.render(*p)).collect();
                format!("{} ({})", self.render(*ret), params.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitives_preinterned() {
        let table = TypeTable::new();
        assert_eq!(table.get(VOID), &Type::Void);
        assert_eq!(table.get(LABEL), &Type::Label);
        assert_eq!(table.get(INT1), &Type::Integer(1));
        assert_eq!(table.get(INT32), &Type::Integer(32));
        assert_eq!(table.get(FLOAT), &Type::Float);
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn test_structural_interning() {
        let mut table = TypeTable::new();
        let p1 = table.intern(Type::Pointer(INT32));
        let p2 = table.intern(Type::Pointer(INT32));
        assert_eq!(p1, p2);

        let a1 = table.intern(Type::Array(INT32, 4));
        let a2 = table.intern(Type::Array(INT32, 5));
        assert_ne!(a1, a2);

        let f1 = table.intern(Type::Function {
            ret: VOID,
            params: vec![INT32, p1],
        });
        let f2 = table.intern(Type::Function {
            ret: VOID,
            params: vec![INT32, p2],
        });
        assert_eq!(f1, f2);
    }

    #[test]
    fn test_render() {
        let mut table = TypeTable::new();
        let arr = table.intern(Type::Array(FLOAT, 3));
        let ptr = table.intern(Type::Pointer(arr));
        assert_eq!(table.render(ptr), "[3 x float]*");

        let func = table.intern(Type::Function {
            ret: INT32,
            params: vec![INT32, ptr],
        });
        assert_eq!(table.render(func), "i32 (i32, [3 x float]*)");
    }
}

//! The module: owner of every IR entity.
//!
//! A [`Module`] holds arenas for functions, globals, blocks, instructions and
//! arguments, plus the interning tables for types and constants. Entities are
//! addressed by the typed handles from [`ids`](crate::ir::ids); the module is
//! the only place where def-use records and control-flow edges are edited, so
//! both directions of every edge stay consistent.
//!
//! This file holds creation, lookup and queries. Graph editing (operand
//! mutation, use replacement, erasure) lives in `edit.rs` as a second
//! `impl Module` block.

use std::collections::HashMap;

use crate::{
    ir::{
        types::{FLOAT, INT1, INT32, LABEL, VOID},
        ArgId, Argument, BasicBlock, BlockId, ConstId, Constant, ConstantData, FuncId, Function,
        GlobalId, GlobalVariable, InstId, Instruction, NameTable, Type, TypeId, TypeTable, Use,
        User, Value,
    },
    Result,
};

/// Looks up a live arena slot, panicking on a stale or foreign handle.
fn slot<'a, T>(arena: &'a [Option<T>], index: usize, what: &str) -> &'a T {
    match arena.get(index).and_then(Option::as_ref) {
        Some(item) => item,
        None => panic!("dangling {} handle {}", what, index),
    }
}

fn slot_mut<'a, T>(arena: &'a mut [Option<T>], index: usize, what: &str) -> &'a mut T {
    match arena.get_mut(index).and_then(Option::as_mut) {
        Some(item) => item,
        None => panic!("dangling {} handle {}", what, index),
    }
}

/// A compilation unit: functions, globals and the interned types and constants
/// they refer to.
///
/// # Examples
///
/// ```rust
/// use midend::ir::Module;
///
/// let mut module = Module::new();
/// let i32_ty = module.int32_type();
/// let ptr_a = module.pointer_type(i32_ty);
/// let ptr_b = module.pointer_type(i32_ty);
/// assert_eq!(ptr_a, ptr_b);
///
/// let zero = module.const_int(0);
/// let counter = module.add_global("counter", i32_ty, false, Some(zero))?;
/// assert_eq!(module.global(counter).name(), "counter");
/// # Ok::<(), midend::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Module {
    pub(crate) types: TypeTable,
    pub(crate) constants: Vec<ConstantData>,
    pub(crate) constant_keys: HashMap<Constant, ConstId>,
    pub(crate) globals: Vec<Option<GlobalVariable>>,
    pub(crate) global_order: Vec<GlobalId>,
    pub(crate) functions: Vec<Option<Function>>,
    pub(crate) function_order: Vec<FuncId>,
    pub(crate) blocks: Vec<Option<BasicBlock>>,
    pub(crate) insts: Vec<Option<Instruction>>,
    pub(crate) args: Vec<Option<Argument>>,
    pub(crate) names: NameTable,
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

impl Module {
    /// Creates an empty module.
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: TypeTable::new(),
            constants: Vec::new(),
            constant_keys: HashMap::new(),
            globals: Vec::new(),
            global_order: Vec::new(),
            functions: Vec::new(),
            function_order: Vec::new(),
            blocks: Vec::new(),
            insts: Vec::new(),
            args: Vec::new(),
            names: NameTable::new("global", ""),
        }
    }

    // Types

    /// The `void` type.
    #[must_use]
    pub fn void_type(&self) -> TypeId {
        VOID
    }

    /// The `label` type of basic blocks.
    #[must_use]
    pub fn label_type(&self) -> TypeId {
        LABEL
    }

    /// The `i1` boolean type.
    #[must_use]
    pub fn int1_type(&self) -> TypeId {
        INT1
    }

    /// The `i32` integer type.
    #[must_use]
    pub fn int32_type(&self) -> TypeId {
        INT32
    }

    /// The `float` type.
    #[must_use]
    pub fn float_type(&self) -> TypeId {
        FLOAT
    }

    /// Interns a pointer to `elem`.
    pub fn pointer_type(&mut self, elem: TypeId) -> TypeId {
        self.types.intern(Type::Pointer(elem))
    }

    /// Interns an array of `count` elements of type `elem`.
    pub fn array_type(&mut self, elem: TypeId, count: usize) -> TypeId {
        self.types.intern(Type::Array(elem, count))
    }

    /// Interns a function signature.
    pub fn function_type(&mut self, ret: TypeId, params: Vec<TypeId>) -> TypeId {
        self.types.intern(Type::Function { ret, params })
    }

    /// Returns the structural type behind a handle.
    #[must_use]
    pub fn ty(&self, id: TypeId) -> &Type {
        self.types.get(id)
    }

    /// The module's type table.
    #[must_use]
    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    /// Renders a type for diagnostics.
    #[must_use]
    pub fn type_name(&self, id: TypeId) -> String {
        self.types.render(id)
    }

    /// Element type of a pointer type.
    #[must_use]
    pub fn pointer_element(&self, ty: TypeId) -> Option<TypeId> {
        match self.ty(ty) {
            Type::Pointer(elem) => Some(*elem),
            _ => None,
        }
    }

    // Constants

    fn intern_constant(&mut self, kind: Constant, ty: TypeId) -> ConstId {
        if let Some(&id) = self.constant_keys.get(&kind) {
            return id;
        }
        let id = ConstId(self.constants.len());
        let elements = match &kind {
            Constant::Array { elements, .. } => elements.clone(),
            _ => Vec::new(),
        };
        self.constants.push(ConstantData {
            kind: kind.clone(),
            ty,
            uses: Vec::new(),
        });
        self.constant_keys.insert(kind, id);
        for (index, element) in elements.into_iter().enumerate() {
            self.add_use(Value::Const(element), Use::new(User::Const(id), index));
        }
        id
    }

    /// Interns an `i32` constant.
    pub fn const_int(&mut self, value: i32) -> ConstId {
        self.intern_constant(Constant::Int(value), INT32)
    }

    /// Interns an `i1` constant.
    pub fn const_bool(&mut self, value: bool) -> ConstId {
        self.intern_constant(Constant::Bool(value), INT1)
    }

    /// Interns a `float` constant.
    pub fn const_float(&mut self, value: f32) -> ConstId {
        self.intern_constant(Constant::from_f32(value), FLOAT)
    }

    /// Interns the zero value of `ty`.
    pub fn const_zero(&mut self, ty: TypeId) -> ConstId {
        self.intern_constant(Constant::Zero(ty), ty)
    }

    /// Interns an array constant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`](crate::Error::TypeMismatch) if `ty` is not an
    /// array type, the element count differs, or an element has the wrong type.
    pub fn const_array(&mut self, ty: TypeId, elements: Vec<ConstId>) -> Result<ConstId> {
        let (elem_ty, count) = match self.ty(ty) {
            Type::Array(elem, count) => (*elem, *count),
            _ => {
                return Err(type_error!(
                    "array constant needs an array type, got {}",
                    self.type_name(ty)
                ))
            }
        };
        if elements.len() != count {
            return Err(type_error!(
                "array constant of {} has {} elements",
                self.type_name(ty),
                elements.len()
            ));
        }
        if let Some(bad) = elements.iter().find(|c| self.constant(**c).ty != elem_ty) {
            return Err(type_error!(
                "array element {} has type {}, expected {}",
                bad,
                self.type_name(self.constant(*bad).ty),
                self.type_name(elem_ty)
            ));
        }
        Ok(self.intern_constant(Constant::Array { ty, elements }, ty))
    }

    /// Returns a constant by handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not belong to this module.
    #[must_use]
    pub fn constant(&self, id: ConstId) -> &ConstantData {
        &self.constants[id.index()]
    }

    // Globals

    /// Adds a global variable holding a value of type `value_ty`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`](crate::Error::TypeMismatch) if the value type is
    /// not storable or the initializer's type differs from it.
    pub fn add_global(
        &mut self,
        name: &str,
        value_ty: TypeId,
        is_const: bool,
        init: Option<ConstId>,
    ) -> Result<GlobalId> {
        if matches!(
            self.ty(value_ty),
            Type::Void | Type::Label | Type::Function { .. }
        ) {
            return Err(type_error!(
                "global {} cannot hold a value of type {}",
                name,
                self.type_name(value_ty)
            ));
        }
        if let Some(init) = init {
            let init_ty = self.constant(init).ty;
            if init_ty != value_ty {
                return Err(type_error!(
                    "initializer of global {} has type {}, expected {}",
                    name,
                    self.type_name(init_ty),
                    self.type_name(value_ty)
                ));
            }
        }

        let ptr_ty = self.pointer_type(value_ty);
        let id = GlobalId(self.globals.len());
        let name = self.names.unique(name);
        self.globals.push(Some(GlobalVariable {
            name,
            value_ty,
            ptr_ty,
            is_const,
            init,
            uses: Vec::new(),
        }));
        self.global_order.push(id);
        if let Some(init) = init {
            self.add_use(Value::Const(init), Use::new(User::Global(id), 0));
        }
        Ok(id)
    }

    /// Returns a global by handle.
    #[must_use]
    pub fn global(&self, id: GlobalId) -> &GlobalVariable {
        slot(&self.globals, id.index(), "global")
    }

    /// Global variables in insertion order.
    pub fn globals(&self) -> impl Iterator<Item = GlobalId> + '_ {
        self.global_order.iter().copied()
    }

    /// Looks up a global by name.
    #[must_use]
    pub fn global_by_name(&self, name: &str) -> Option<GlobalId> {
        self.globals().find(|g| self.global(*g).name == name)
    }

    // Functions

    /// Adds a function with the given signature. Arguments are created from the
    /// parameter types; the function stays a declaration until a block is added.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`](crate::Error::TypeMismatch) if `fn_ty` is not a
    /// function type.
    pub fn add_function(&mut self, name: &str, fn_ty: TypeId) -> Result<FuncId> {
        let (ret, params) = match self.ty(fn_ty) {
            Type::Function { ret, params } => (*ret, params.clone()),
            _ => {
                return Err(type_error!(
                    "function {} needs a function type, got {}",
                    name,
                    self.type_name(fn_ty)
                ))
            }
        };

        let id = FuncId(self.functions.len());
        let name = self.names.unique(name);
        let mut function = Function::new(name, fn_ty, ret);
        for (arg_no, ty) in params.into_iter().enumerate() {
            let arg = ArgId(self.args.len());
            self.args.push(Some(Argument {
                name: None,
                ty,
                parent: id,
                arg_no,
                uses: Vec::new(),
            }));
            function.args.push(arg);
        }
        self.functions.push(Some(function));
        self.function_order.push(id);
        Ok(id)
    }

    /// Returns a function by handle.
    #[must_use]
    pub fn function(&self, id: FuncId) -> &Function {
        slot(&self.functions, id.index(), "function")
    }

    pub(crate) fn function_mut(&mut self, id: FuncId) -> &mut Function {
        slot_mut(&mut self.functions, id.index(), "function")
    }

    /// Functions in insertion order.
    pub fn functions(&self) -> impl Iterator<Item = FuncId> + '_ {
        self.function_order.iter().copied()
    }

    /// Functions that have a body, in insertion order.
    pub fn defined_functions(&self) -> impl Iterator<Item = FuncId> + '_ {
        self.functions()
            .filter(|f| !self.function(*f).is_declaration())
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn function_by_name(&self, name: &str) -> Option<FuncId> {
        self.functions().find(|f| self.function(*f).name == name)
    }

    /// Returns an argument by handle.
    #[must_use]
    pub fn arg(&self, id: ArgId) -> &Argument {
        slot(&self.args, id.index(), "argument")
    }

    /// Returns the `index`-th formal argument of a function.
    #[must_use]
    pub fn function_arg(&self, func: FuncId, index: usize) -> Option<ArgId> {
        self.function(func).args.get(index).copied()
    }

    // Blocks

    /// Appends a new, empty block to `func`. The first block added becomes the entry.
    pub fn add_block(&mut self, func: FuncId, name: &str) -> BlockId {
        let id = BlockId(self.blocks.len());
        let function = self.function_mut(func);
        let name = function.block_names.unique(name);
        function.blocks.push(id);
        self.blocks.push(Some(BasicBlock::new(name, func)));
        id
    }

    /// Returns a block by handle.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &BasicBlock {
        slot(&self.blocks, id.index(), "block")
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        slot_mut(&mut self.blocks, id.index(), "block")
    }

    /// Returns true if the handle refers to a block that has not been removed.
    #[must_use]
    pub fn contains_block(&self, id: BlockId) -> bool {
        matches!(self.blocks.get(id.index()), Some(Some(_)))
    }

    /// The block's terminator, if its last instruction is one.
    #[must_use]
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        let last = *self.block(block).insts.last()?;
        self.inst(last).is_terminator().then_some(last)
    }

    /// Returns true if the block ends in `ret` or `br`.
    #[must_use]
    pub fn is_terminated(&self, block: BlockId) -> bool {
        self.terminator(block).is_some()
    }

    // Instructions

    /// Returns an instruction by handle.
    #[must_use]
    pub fn inst(&self, id: InstId) -> &Instruction {
        slot(&self.insts, id.index(), "instruction")
    }

    pub(crate) fn inst_mut(&mut self, id: InstId) -> &mut Instruction {
        slot_mut(&mut self.insts, id.index(), "instruction")
    }

    /// Returns the instruction if the handle has not been erased.
    #[must_use]
    pub fn try_inst(&self, id: InstId) -> Option<&Instruction> {
        self.insts.get(id.index()).and_then(Option::as_ref)
    }

    /// Returns true if the handle refers to a live instruction.
    #[must_use]
    pub fn contains_inst(&self, id: InstId) -> bool {
        self.try_inst(id).is_some()
    }

    /// The function an instruction belongs to.
    #[must_use]
    pub fn inst_function(&self, id: InstId) -> FuncId {
        self.block(self.inst(id).parent).parent
    }

    /// All instructions of a function, block by block.
    #[must_use]
    pub fn function_instructions(&self, func: FuncId) -> Vec<InstId> {
        self.function(func)
            .blocks
            .iter()
            .flat_map(|bb| self.block(*bb).insts.iter().copied())
            .collect()
    }

    /// The callee of a call instruction.
    #[must_use]
    pub fn call_target(&self, call: InstId) -> Option<FuncId> {
        self.inst(call).callee()
    }

    // Values

    /// The type of a value as an operand.
    #[must_use]
    pub fn value_type(&self, value: Value) -> TypeId {
        match value {
            Value::Inst(id) => self.inst(id).ty,
            Value::Arg(id) => self.arg(id).ty,
            Value::Const(id) => self.constant(id).ty,
            Value::Global(id) => self.global(id).ptr_ty,
            Value::Block(_) => LABEL,
            Value::Func(id) => self.function(id).ty,
        }
    }

    /// Operand slots currently referring to `value`.
    #[must_use]
    pub fn uses_of(&self, value: Value) -> &[Use] {
        match value {
            Value::Inst(id) => &self.inst(id).uses,
            Value::Arg(id) => &self.arg(id).uses,
            Value::Const(id) => &self.constant(id).uses,
            Value::Global(id) => &self.global(id).uses,
            Value::Block(id) => &self.block(id).uses,
            Value::Func(id) => &self.function(id).uses,
        }
    }

    pub(crate) fn uses_mut(&mut self, value: Value) -> &mut Vec<Use> {
        match value {
            Value::Inst(id) => &mut self.inst_mut(id).uses,
            Value::Arg(id) => &mut slot_mut(&mut self.args, id.index(), "argument").uses,
            Value::Const(id) => &mut self.constants[id.index()].uses,
            Value::Global(id) => &mut slot_mut(&mut self.globals, id.index(), "global").uses,
            Value::Block(id) => &mut self.block_mut(id).uses,
            Value::Func(id) => &mut self.function_mut(id).uses,
        }
    }

    /// Operands held by a user.
    #[must_use]
    pub fn user_operands(&self, user: User) -> Vec<Value> {
        match user {
            User::Inst(id) => self.inst(id).operands.clone(),
            User::Const(id) => match &self.constant(id).kind {
                Constant::Array { elements, .. } => {
                    elements.iter().map(|c| Value::Const(*c)).collect()
                }
                _ => Vec::new(),
            },
            User::Global(id) => self
                .global(id)
                .init
                .map(|c| vec![Value::Const(c)])
                .unwrap_or_default(),
        }
    }

    /// Assigns a unique name to an instruction or argument and returns it.
    ///
    /// Other values are named at creation and are left untouched.
    pub fn set_name(&mut self, value: Value, name: &str) -> Option<String> {
        match value {
            Value::Inst(id) => {
                let func = self.inst_function(id);
                let unique = self.function_mut(func).value_names.unique(name);
                self.inst_mut(id).name = Some(unique.clone());
                Some(unique)
            }
            Value::Arg(id) => {
                let func = self.arg(id).parent;
                let unique = self.function_mut(func).value_names.unique(name);
                slot_mut(&mut self.args, id.index(), "argument").name = Some(unique.clone());
                Some(unique)
            }
            _ => None,
        }
    }

    /// A short human-readable rendering of a value for diagnostics.
    #[must_use]
    pub fn value_name(&self, value: Value) -> String {
        match value {
            Value::Inst(id) => match self.inst(id).name() {
                Some(name) => format!("%{}", name),
                None => id.to_string(),
            },
            Value::Arg(id) => match self.arg(id).name() {
                Some(name) => format!("%{}", name),
                None => format!("%arg{}", self.arg(id).arg_no),
            },
            Value::Const(id) => match &self.constant(id).kind {
                Constant::Int(v) => v.to_string(),
                Constant::Bool(v) => v.to_string(),
                Constant::Float(bits) => format!("{:?}", f32::from_bits(*bits)),
                Constant::Zero(_) => "zeroinitializer".to_string(),
                Constant::Array { .. } => format!("array{}", id),
            },
            Value::Global(id) => format!("@{}", self.global(id).name),
            Value::Block(id) => format!("%{}", self.block(id).name),
            Value::Func(id) => format!("@{}", self.function(id).name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_interning() {
        let mut module = Module::new();
        let a = module.const_int(5);
        let b = module.const_int(5);
        let c = module.const_int(6);
        assert_eq!(a, b);
        assert_ne!(a, c);

        let f = module.const_float(1.0);
        assert_eq!(module.constant(f).ty(), module.float_type());
        assert_eq!(module.const_bool(true), module.const_bool(true));
        let no = module.const_bool(false);
        assert_eq!(module.constant(no).ty(), module.int1_type());
    }

    #[test]
    fn test_array_constant() {
        let mut module = Module::new();
        let i32_ty = module.int32_type();
        let arr = module.array_type(i32_ty, 2);
        let one = module.const_int(1);
        let two = module.const_int(2);

        let c = module.const_array(arr, vec![one, two]).unwrap();
        assert_eq!(module.uses_of(Value::Const(one)).len(), 1);
        assert_eq!(module.uses_of(Value::Const(two))[0], Use::new(User::Const(c), 1));

        // Interning does not register element uses twice
        let again = module.const_array(arr, vec![one, two]).unwrap();
        assert_eq!(c, again);
        assert_eq!(module.uses_of(Value::Const(one)).len(), 1);

        assert!(module.const_array(arr, vec![one]).is_err());
        let f = module.const_float(0.5);
        assert!(module.const_array(arr, vec![one, f]).is_err());
    }

    #[test]
    fn test_globals() {
        let mut module = Module::new();
        let i32_ty = module.int32_type();
        let init = module.const_int(3);
        let g = module.add_global("g", i32_ty, false, Some(init)).unwrap();
        let h = module.add_global("g", i32_ty, true, None).unwrap();

        assert_eq!(module.global(g).name(), "g");
        assert_eq!(module.global(h).name(), "g1");
        assert!(module.global(h).is_const());
        let ptr = module.pointer_type(i32_ty);
        assert_eq!(module.value_type(Value::Global(g)), ptr);
        assert_eq!(module.uses_of(Value::Const(init)), &[Use::new(User::Global(g), 0)]);
        assert_eq!(module.globals().collect::<Vec<_>>(), vec![g, h]);

        let f = module.const_float(1.0);
        assert!(module.add_global("bad", i32_ty, false, Some(f)).is_err());
    }

    #[test]
    fn test_functions_and_blocks() {
        let mut module = Module::new();
        let i32_ty = module.int32_type();
        let fn_ty = module.function_type(i32_ty, vec![i32_ty, i32_ty]);
        let f = module.add_function("add", fn_ty).unwrap();

        assert!(module.function(f).is_declaration());
        assert_eq!(module.function(f).args().len(), 2);
        let second = module.function_arg(f, 1).unwrap();
        assert_eq!(module.arg(second).arg_no(), 1);

        let entry = module.add_block(f, "entry");
        let next = module.add_block(f, "entry");
        assert_eq!(module.function(f).entry_block(), Some(entry));
        assert_eq!(module.block(next).name(), "entry1");
        assert!(!module.function(f).is_declaration());
        assert_eq!(module.defined_functions().collect::<Vec<_>>(), vec![f]);
        assert_eq!(module.function_by_name("add"), Some(f));

        assert!(module.add_function("bad", i32_ty).is_err());
    }

    #[test]
    fn test_names() {
        let mut module = Module::new();
        let i32_ty = module.int32_type();
        let fn_ty = module.function_type(i32_ty, vec![i32_ty]);
        let f = module.add_function("f", fn_ty).unwrap();
        let arg = module.function_arg(f, 0).unwrap();

        assert_eq!(module.value_name(Value::Arg(arg)), "%arg0");
        assert_eq!(module.set_name(Value::Arg(arg), "n"), Some("n".to_string()));
        assert_eq!(module.value_name(Value::Arg(arg)), "%n");
        assert_eq!(module.value_name(Value::Func(f)), "@f");
    }
}

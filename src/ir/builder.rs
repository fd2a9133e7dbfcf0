//! Type-checked instruction construction.
//!
//! [`Builder`] is the front-end's only way to create instructions. Every
//! method validates operand types first and returns
//! [`Error::TypeMismatch`](crate::Error::TypeMismatch) without touching the
//! module when they do not line up; on success the instruction is placed in the
//! builder's block according to its [`InsertPosition`].
//!
//! # Examples
//!
//! ```rust
//! use midend::ir::{Builder, CmpPredicate, Module};
//!
//! let mut module = Module::new();
//! let i32_ty = module.int32_type();
//! let fn_ty = module.function_type(i32_ty, vec![i32_ty]);
//! let abs = module.add_function("abs", fn_ty)?;
//! let entry = module.add_block(abs, "entry");
//! let negate = module.add_block(abs, "negate");
//! let done = module.add_block(abs, "done");
//! let n = module.function_arg(abs, 0).unwrap();
//! let zero = module.const_int(0);
//!
//! let mut builder = Builder::at_end(&mut module, entry);
//! let is_negative = builder.icmp(CmpPredicate::Lt, n, zero)?;
//! builder.cond_br(is_negative, negate, done)?;
//!
//! builder.position_at_end(negate);
//! let negated = builder.sub(zero, n)?;
//! builder.br(done)?;
//!
//! builder.position_at_end(done);
//! let result = builder.phi(i32_ty, &[(negated.into(), negate), (n.into(), entry)])?;
//! builder.ret(Some(result.into()))?;
//!
//! assert!(builder.module().is_terminated(done));
//! # Ok::<(), midend::Error>(())
//! ```

use crate::{
    ir::{
        types::{FLOAT, INT1, INT32, VOID},
        BlockId, CastOp, CmpPredicate, FloatBinaryOp, FuncId, InsertPosition, InstId, InstKind,
        IntBinaryOp, Module, Type, TypeId, Value,
    },
    Result,
};

/// Creates instructions in one block of a module.
pub struct Builder<'m> {
    module: &'m mut Module,
    block: BlockId,
    position: InsertPosition,
}

impl<'m> Builder<'m> {
    /// Creates a builder inserting into `block` at `position`.
    pub fn new(module: &'m mut Module, block: BlockId, position: InsertPosition) -> Self {
        Self {
            module,
            block,
            position,
        }
    }

    /// Creates a builder appending to `block`.
    pub fn at_end(module: &'m mut Module, block: BlockId) -> Self {
        Self::new(module, block, InsertPosition::Append)
    }

    /// Creates a builder inserting at the beginning of each segment of `block`.
    pub fn at_begin(module: &'m mut Module, block: BlockId) -> Self {
        Self::new(module, block, InsertPosition::Begin)
    }

    /// Creates a builder inserting right before the terminator of `block`.
    pub fn before_terminator(module: &'m mut Module, block: BlockId) -> Self {
        Self::new(module, block, InsertPosition::BeforeTerminator)
    }

    /// Switches to appending into another block.
    pub fn position_at_end(&mut self, block: BlockId) {
        self.block = block;
        self.position = InsertPosition::Append;
    }

    /// Switches block and position.
    pub fn position(&mut self, block: BlockId, position: InsertPosition) {
        self.block = block;
        self.position = position;
    }

    /// The block instructions are inserted into.
    #[must_use]
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// The underlying module.
    pub fn module(&mut self) -> &mut Module {
        self.module
    }

    fn insert(&mut self, kind: InstKind, ty: TypeId, operands: Vec<Value>) -> Result<InstId> {
        self.module
            .insert_instruction(self.block, kind, ty, operands, self.position)
    }

    fn type_of(&self, value: Value) -> TypeId {
        self.module.value_type(value)
    }

    fn expect_type(&self, what: &str, value: Value, expected: TypeId) -> Result<()> {
        let actual = self.type_of(value);
        if actual != expected {
            return Err(type_error!(
                "{} operand {} has type {}, expected {}",
                what,
                self.module.value_name(value),
                self.module.type_name(actual),
                self.module.type_name(expected)
            ));
        }
        Ok(())
    }

    // Terminators

    /// `ret` with an optional value matching the function's return type.
    ///
    /// # Errors
    ///
    /// Returns an error if the value does not match the return type or the block
    /// is already terminated.
    pub fn ret(&mut self, value: Option<Value>) -> Result<InstId> {
        let func = self.module.block(self.block).parent();
        let ret_ty = self.module.function(func).return_type();
        let operands = match value {
            Some(value) => {
                self.expect_type("ret", value, ret_ty)?;
                vec![value]
            }
            None if ret_ty == VOID => Vec::new(),
            None => {
                return Err(type_error!(
                    "ret without a value in function returning {}",
                    self.module.type_name(ret_ty)
                ))
            }
        };
        self.insert(InstKind::Ret, VOID, operands)
    }

    /// Unconditional branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the block is already terminated.
    pub fn br(&mut self, target: BlockId) -> Result<InstId> {
        self.insert(InstKind::Br, VOID, vec![Value::Block(target)])
    }

    /// Conditional branch on an `i1` value.
    ///
    /// # Errors
    ///
    /// Returns an error if the condition is not `i1` or the block is already terminated.
    pub fn cond_br(
        &mut self,
        cond: impl Into<Value>,
        then_block: BlockId,
        else_block: BlockId,
    ) -> Result<InstId> {
        let cond = cond.into();
        self.expect_type("br condition", cond, INT1)?;
        self.insert(
            InstKind::Br,
            VOID,
            vec![cond, Value::Block(then_block), Value::Block(else_block)],
        )
    }

    // Arithmetic

    /// `i32` arithmetic.
    ///
    /// # Errors
    ///
    /// Returns an error if either operand is not `i32`.
    pub fn int_binary(
        &mut self,
        op: IntBinaryOp,
        lhs: impl Into<Value>,
        rhs: impl Into<Value>,
    ) -> Result<InstId> {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        self.expect_type(&op.to_string(), lhs, INT32)?;
        self.expect_type(&op.to_string(), rhs, INT32)?;
        self.insert(InstKind::IntBinary(op), INT32, vec![lhs, rhs])
    }

    /// `add`
    ///
    /// # Errors
    ///
    /// See [`int_binary`](Builder::int_binary).
    pub fn add(&mut self, lhs: impl Into<Value>, rhs: impl Into<Value>) -> Result<InstId> {
        self.int_binary(IntBinaryOp::Add, lhs, rhs)
    }

    /// `sub`
    ///
    /// # Errors
    ///
    /// See [`int_binary`](Builder::int_binary).
    pub fn sub(&mut self, lhs: impl Into<Value>, rhs: impl Into<Value>) -> Result<InstId> {
        self.int_binary(IntBinaryOp::Sub, lhs, rhs)
    }

    /// `mul`
    ///
    /// # Errors
    ///
    /// See [`int_binary`](Builder::int_binary).
    pub fn mul(&mut self, lhs: impl Into<Value>, rhs: impl Into<Value>) -> Result<InstId> {
        self.int_binary(IntBinaryOp::Mul, lhs, rhs)
    }

    /// `sdiv`
    ///
    /// # Errors
    ///
    /// See [`int_binary`](Builder::int_binary).
    pub fn sdiv(&mut self, lhs: impl Into<Value>, rhs: impl Into<Value>) -> Result<InstId> {
        self.int_binary(IntBinaryOp::SDiv, lhs, rhs)
    }

    /// `float` arithmetic.
    ///
    /// # Errors
    ///
    /// Returns an error if either operand is not `float`.
    pub fn float_binary(
        &mut self,
        op: FloatBinaryOp,
        lhs: impl Into<Value>,
        rhs: impl Into<Value>,
    ) -> Result<InstId> {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        let what = format!("f{}", op);
        self.expect_type(&what, lhs, FLOAT)?;
        self.expect_type(&what, rhs, FLOAT)?;
        self.insert(InstKind::FloatBinary(op), FLOAT, vec![lhs, rhs])
    }

    /// `fadd`
    ///
    /// # Errors
    ///
    /// See [`float_binary`](Builder::float_binary).
    pub fn fadd(&mut self, lhs: impl Into<Value>, rhs: impl Into<Value>) -> Result<InstId> {
        self.float_binary(FloatBinaryOp::Add, lhs, rhs)
    }

    /// `fsub`
    ///
    /// # Errors
    ///
    /// See [`float_binary`](Builder::float_binary).
    pub fn fsub(&mut self, lhs: impl Into<Value>, rhs: impl Into<Value>) -> Result<InstId> {
        self.float_binary(FloatBinaryOp::Sub, lhs, rhs)
    }

    /// `fmul`
    ///
    /// # Errors
    ///
    /// See [`float_binary`](Builder::float_binary).
    pub fn fmul(&mut self, lhs: impl Into<Value>, rhs: impl Into<Value>) -> Result<InstId> {
        self.float_binary(FloatBinaryOp::Mul, lhs, rhs)
    }

    /// `fdiv`
    ///
    /// # Errors
    ///
    /// See [`float_binary`](Builder::float_binary).
    pub fn fdiv(&mut self, lhs: impl Into<Value>, rhs: impl Into<Value>) -> Result<InstId> {
        self.float_binary(FloatBinaryOp::Div, lhs, rhs)
    }

    // Comparisons

    /// Signed `i32` comparison producing `i1`.
    ///
    /// # Errors
    ///
    /// Returns an error if either operand is not `i32`.
    pub fn icmp(
        &mut self,
        pred: CmpPredicate,
        lhs: impl Into<Value>,
        rhs: impl Into<Value>,
    ) -> Result<InstId> {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        self.expect_type("icmp", lhs, INT32)?;
        self.expect_type("icmp", rhs, INT32)?;
        self.insert(InstKind::ICmp(pred), INT1, vec![lhs, rhs])
    }

    /// `float` comparison producing `i1`.
    ///
    /// # Errors
    ///
    /// Returns an error if either operand is not `float`.
    pub fn fcmp(
        &mut self,
        pred: CmpPredicate,
        lhs: impl Into<Value>,
        rhs: impl Into<Value>,
    ) -> Result<InstId> {
        let (lhs, rhs) = (lhs.into(), rhs.into());
        self.expect_type("fcmp", lhs, FLOAT)?;
        self.expect_type("fcmp", rhs, FLOAT)?;
        self.insert(InstKind::FCmp(pred), INT1, vec![lhs, rhs])
    }

    // Memory

    /// Stack slot for a value of type `ty`; the result is a pointer to `ty`.
    ///
    /// # Errors
    ///
    /// Returns an error unless `ty` is an integer, float, array or pointer type.
    pub fn alloca(&mut self, ty: TypeId) -> Result<InstId> {
        match self.module.ty(ty) {
            Type::Integer(_) | Type::Float | Type::Array(..) | Type::Pointer(_) => {}
            _ => {
                return Err(type_error!(
                    "cannot allocate a slot of type {}",
                    self.module.type_name(ty)
                ))
            }
        }
        let ptr = self.module.pointer_type(ty);
        self.insert(InstKind::Alloca, ptr, Vec::new())
    }

    /// Reads the value behind a pointer to an integer, float or pointer.
    ///
    /// # Errors
    ///
    /// Returns an error if the operand is not such a pointer.
    pub fn load(&mut self, ptr: impl Into<Value>) -> Result<InstId> {
        let ptr = ptr.into();
        let ptr_ty = self.type_of(ptr);
        let elem = match self.module.pointer_element(ptr_ty) {
            Some(elem)
                if matches!(
                    self.module.ty(elem),
                    Type::Integer(_) | Type::Float | Type::Pointer(_)
                ) =>
            {
                elem
            }
            _ => {
                return Err(type_error!(
                    "cannot load through {} of type {}",
                    self.module.value_name(ptr),
                    self.module.type_name(ptr_ty)
                ))
            }
        };
        self.insert(InstKind::Load, elem, vec![ptr])
    }

    /// Writes `value` through `ptr`.
    ///
    /// # Errors
    ///
    /// Returns an error unless `ptr` points to the type of `value`.
    pub fn store(&mut self, value: impl Into<Value>, ptr: impl Into<Value>) -> Result<InstId> {
        let (value, ptr) = (value.into(), ptr.into());
        let ptr_ty = self.type_of(ptr);
        let value_ty = self.type_of(value);
        if self.module.pointer_element(ptr_ty) != Some(value_ty) {
            return Err(type_error!(
                "cannot store {} into {} of type {}",
                self.module.type_name(value_ty),
                self.module.value_name(ptr),
                self.module.type_name(ptr_ty)
            ));
        }
        self.insert(InstKind::Store, VOID, vec![value, ptr])
    }

    /// Address computation.
    ///
    /// The first index steps over the pointer itself; every further index
    /// descends one array level.
    ///
    /// # Errors
    ///
    /// Returns an error if `ptr` is not a pointer to an array, integer or float,
    /// an index is not an integer, or an index descends into a non-array.
    pub fn gep(&mut self, ptr: impl Into<Value>, indices: &[Value]) -> Result<InstId> {
        let ptr = ptr.into();
        let ptr_ty = self.type_of(ptr);
        let mut current = match self.module.pointer_element(ptr_ty) {
            Some(elem)
                if matches!(
                    self.module.ty(elem),
                    Type::Array(..) | Type::Integer(_) | Type::Float
                ) =>
            {
                elem
            }
            _ => {
                return Err(type_error!(
                    "getelementptr base {} has type {}",
                    self.module.value_name(ptr),
                    self.module.type_name(ptr_ty)
                ))
            }
        };
        if indices.is_empty() {
            return Err(type_error!("getelementptr needs at least one index"));
        }
        for (position, index) in indices.iter().enumerate() {
            if !self.module.ty(self.type_of(*index)).is_integer() {
                return Err(type_error!(
                    "getelementptr index {} is not an integer",
                    self.module.value_name(*index)
                ));
            }
            if position == 0 {
                continue;
            }
            current = match self.module.ty(current) {
                Type::Array(elem, _) => *elem,
                _ => {
                    return Err(type_error!(
                        "getelementptr index {} descends into non-array {}",
                        position,
                        self.module.type_name(current)
                    ))
                }
            };
        }

        let result = self.module.pointer_type(current);
        let mut operands = Vec::with_capacity(indices.len() + 1);
        operands.push(ptr);
        operands.extend_from_slice(indices);
        self.insert(InstKind::GetElementPtr, result, operands)
    }

    // SSA and calls

    /// A phi of type `ty` with the given incoming pairs.
    ///
    /// # Errors
    ///
    /// Returns an error if an incoming value's type differs from `ty`.
    pub fn phi(&mut self, ty: TypeId, incoming: &[(Value, BlockId)]) -> Result<InstId> {
        for (value, _) in incoming {
            self.expect_type("phi", *value, ty)?;
        }
        let operands = incoming
            .iter()
            .flat_map(|(value, block)| [*value, Value::Block(*block)])
            .collect();
        self.insert(InstKind::Phi, ty, operands)
    }

    /// Direct call; the result type is the callee's return type.
    ///
    /// # Errors
    ///
    /// Returns an error if the argument count or any argument type differs from
    /// the callee's signature.
    pub fn call(&mut self, callee: FuncId, args: &[Value]) -> Result<InstId> {
        let fn_ty = self.module.function(callee).ty();
        let (ret, params) = match self.module.ty(fn_ty) {
            Type::Function { ret, params } => (*ret, params.clone()),
            _ => unreachable!("functions always carry a function type"),
        };
        if params.len() != args.len() {
            return Err(type_error!(
                "call to {} passes {} arguments, expected {}",
                self.module.value_name(Value::Func(callee)),
                args.len(),
                params.len()
            ));
        }
        for (arg, param) in args.iter().zip(params) {
            self.expect_type("call", *arg, param)?;
        }
        let mut operands = Vec::with_capacity(args.len() + 1);
        operands.push(Value::Func(callee));
        operands.extend_from_slice(args);
        self.insert(InstKind::Call, ret, operands)
    }

    // Casts

    /// Zero-extends an integer to a wider integer type.
    ///
    /// # Errors
    ///
    /// Returns an error unless both types are integers and `ty` is wider.
    pub fn zext(&mut self, value: impl Into<Value>, ty: TypeId) -> Result<InstId> {
        let value = value.into();
        let from = self.type_of(value);
        match (self.module.ty(from).int_bits(), self.module.ty(ty).int_bits()) {
            (Some(src), Some(dst)) if src < dst => {}
            _ => {
                return Err(type_error!(
                    "cannot zext {} to {}",
                    self.module.type_name(from),
                    self.module.type_name(ty)
                ))
            }
        }
        self.insert(InstKind::Cast(CastOp::ZExt), ty, vec![value])
    }

    /// Converts a float to `i32`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operand is not `float`.
    pub fn fptosi(&mut self, value: impl Into<Value>) -> Result<InstId> {
        let value = value.into();
        self.expect_type("fptosi", value, FLOAT)?;
        self.insert(InstKind::Cast(CastOp::FpToSi), INT32, vec![value])
    }

    /// Converts an integer to `float`.
    ///
    /// # Errors
    ///
    /// Returns an error if the operand is not an integer.
    pub fn sitofp(&mut self, value: impl Into<Value>) -> Result<InstId> {
        let value = value.into();
        let from = self.type_of(value);
        if !self.module.ty(from).is_integer() {
            return Err(type_error!(
                "cannot convert {} to float",
                self.module.type_name(from)
            ));
        }
        self.insert(InstKind::Cast(CastOp::SiToFp), FLOAT, vec![value])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ir::Opcode, Error};

    fn setup() -> (Module, FuncId, BlockId) {
        let mut module = Module::new();
        let i32_ty = module.int32_type();
        let float_ty = module.float_type();
        let fn_ty = module.function_type(i32_ty, vec![i32_ty, float_ty]);
        let f = module.add_function("f", fn_ty).unwrap();
        let entry = module.add_block(f, "entry");
        (module, f, entry)
    }

    #[test]
    fn test_arithmetic_type_checks() {
        let (mut module, f, entry) = setup();
        let n = module.function_arg(f, 0).unwrap();
        let x = module.function_arg(f, 1).unwrap();
        let mut builder = Builder::at_end(&mut module, entry);

        let sum = builder.add(n, n).unwrap();
        assert_eq!(builder.module().inst(sum).opcode(), Opcode::Add);
        assert!(matches!(builder.add(n, x), Err(Error::TypeMismatch { .. })));
        assert!(matches!(builder.fmul(n, x), Err(Error::TypeMismatch { .. })));
        let product = builder.fmul(x, x).unwrap();
        assert_eq!(builder.module().inst(product).ty(), FLOAT);

        let cmp = builder.fcmp(CmpPredicate::Gt, x, x).unwrap();
        assert_eq!(builder.module().inst(cmp).ty(), INT1);
        assert!(builder.icmp(CmpPredicate::Eq, x, n).is_err());
        // Failed constructions leave nothing behind
        assert_eq!(builder.module().block(entry).len(), 3);
    }

    #[test]
    fn test_memory_type_checks() {
        let (mut module, f, entry) = setup();
        let n = module.function_arg(f, 0).unwrap();
        let x = module.function_arg(f, 1).unwrap();
        let i32_ty = module.int32_type();
        let arr_ty = module.array_type(i32_ty, 4);
        let zero = module.const_int(0);
        let mut builder = Builder::at_end(&mut module, entry);

        let slot = builder.alloca(i32_ty).unwrap();
        builder.store(n, slot).unwrap();
        assert!(builder.store(x, slot).is_err());
        let value = builder.load(slot).unwrap();
        assert_eq!(builder.module().inst(value).ty(), i32_ty);

        let array = builder.alloca(arr_ty).unwrap();
        // Arrays are addressed, never loaded whole
        assert!(builder.load(array).is_err());
        let element = builder.gep(array, &[zero.into(), n.into()]).unwrap();
        let ptr_i32 = builder.module().pointer_type(i32_ty);
        assert_eq!(builder.module().inst(element).ty(), ptr_i32);
        assert!(builder.gep(slot, &[zero.into(), zero.into()]).is_err());
        assert!(builder.gep(array, &[x.into()]).is_err());

        let void_ty = builder.module().void_type();
        assert!(builder.alloca(void_ty).is_err());
    }

    #[test]
    fn test_call_and_ret_checks() {
        let (mut module, f, entry) = setup();
        let n = module.function_arg(f, 0).unwrap();
        let x = module.function_arg(f, 1).unwrap();
        let void_ty = module.void_type();
        let i32_ty = module.int32_type();
        let put_ty = module.function_type(void_ty, vec![i32_ty]);
        let putint = module.add_function("putint", put_ty).unwrap();
        let mut builder = Builder::at_end(&mut module, entry);

        let call = builder.call(putint, &[n.into()]).unwrap();
        assert_eq!(builder.module().inst(call).ty(), void_ty);
        assert_eq!(builder.module().inst(call).callee(), Some(putint));
        assert!(builder.call(putint, &[]).is_err());
        assert!(builder.call(putint, &[x.into()]).is_err());

        assert!(builder.ret(None).is_err());
        assert!(builder.ret(Some(x.into())).is_err());
        builder.ret(Some(n.into())).unwrap();
        assert!(matches!(builder.ret(Some(n.into())), Err(Error::BlockTerminated(_))));
    }

    #[test]
    fn test_casts() {
        let (mut module, f, entry) = setup();
        let n = module.function_arg(f, 0).unwrap();
        let x = module.function_arg(f, 1).unwrap();
        let i1 = module.int1_type();
        let i32_ty = module.int32_type();
        let mut builder = Builder::at_end(&mut module, entry);

        let cmp = builder.icmp(CmpPredicate::Ne, n, n).unwrap();
        let wide = builder.zext(cmp, i32_ty).unwrap();
        assert_eq!(builder.module().inst(wide).ty(), i32_ty);
        assert!(builder.zext(n, i1).is_err());
        assert!(builder.zext(n, i32_ty).is_err());

        assert!(builder.fptosi(x).is_ok());
        assert!(builder.fptosi(n).is_err());
        assert!(builder.sitofp(n).is_ok());
        assert!(builder.sitofp(x).is_err());
    }

    #[test]
    fn test_cond_br_requires_i1() {
        let (mut module, f, entry) = setup();
        let n = module.function_arg(f, 0).unwrap();
        let then_block = module.add_block(f, "then");
        let else_block = module.add_block(f, "else");
        let mut builder = Builder::at_end(&mut module, entry);

        assert!(builder.cond_br(n, then_block, else_block).is_err());
        let cmp = builder.icmp(CmpPredicate::Gt, n, n).unwrap();
        builder.cond_br(cmp, then_block, else_block).unwrap();
        assert_eq!(module.block(entry).successors(), &[then_block, else_block]);
    }
}

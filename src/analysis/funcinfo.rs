//! Interprocedural memory effects and purity.
//!
//! For every function the analysis records the *locations* it may read or
//! write, where a location is a mutable global variable or one of the
//! function's own pointer parameters:
//!
//! 1. Each location is traced forward through its uses. Loads and stores
//!    through the traced pointer are attributed to the location; `getelementptr`
//!    and `phi` results derived from it are traced further.
//! 2. Callee effects flow into callers over a worklist until nothing grows.
//!    Global accesses are copied unchanged. An access to a callee parameter is
//!    mapped to every location the actual argument can reach in the caller
//!    (through `getelementptr` and every `phi` input). Local stack slots are
//!    dropped.
//! 3. "Calls a declaration" flows from callees to callers the same way.
//!
//! An access through a pointer that cannot be followed back to a global, a
//! parameter or a stack slot (a pointer read from memory, a call result) has no
//! location. It is recorded as an opaque load or store instead, and opaque
//! accesses also flow from callees to callers.
//!
//! A defined function is pure when it calls no declaration (directly or
//! transitively), both of its sets are empty and it has no opaque access.
//! Declarations are never pure.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::ir::{FuncId, InstId, InstKind, Module, Value};

/// Memory effects of one function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionEffects {
    /// Globals and own parameters the function may read through
    pub loads: BTreeSet<Value>,
    /// Globals and own parameters the function may write through
    pub stores: BTreeSet<Value>,
    /// The function calls a declaration, directly or through callees
    pub uses_library: bool,
    /// The function has no body
    pub is_declaration: bool,
    /// The function may read through a pointer with no known location
    pub opaque_loads: bool,
    /// The function may write through a pointer with no known location
    pub opaque_stores: bool,
}

impl FunctionEffects {
    /// Returns true for a defined function without memory effects or library calls.
    #[must_use]
    pub fn is_pure(&self) -> bool {
        !self.is_declaration
            && !self.uses_library
            && self.loads.is_empty()
            && self.stores.is_empty()
            && !self.opaque_loads
            && !self.opaque_stores
    }

    /// Returns true if calling the function may perform input or output.
    #[must_use]
    pub fn uses_io(&self) -> bool {
        self.is_declaration || self.uses_library
    }

    /// Grows monotonically while effects are merged in.
    fn access_count(&self) -> usize {
        self.loads.len()
            + self.stores.len()
            + usize::from(self.opaque_loads)
            + usize::from(self.opaque_stores)
    }
}

/// Module-wide effect analysis.
///
/// # Examples
///
/// ```rust
/// use midend::analysis::FuncInfo;
/// use midend::ir::{Builder, Module, Value};
///
/// let mut module = Module::new();
/// let i32_ty = module.int32_type();
/// let zero = module.const_int(0);
/// let counter = module.add_global("counter", i32_ty, false, Some(zero))?;
/// let fn_ty = module.function_type(i32_ty, vec![]);
/// let read = module.add_function("read", fn_ty)?;
/// let entry = module.add_block(read, "entry");
/// let mut b = Builder::at_end(&mut module, entry);
/// let value = b.load(counter)?;
/// b.ret(Some(value.into()))?;
///
/// let info = FuncInfo::compute(&module);
/// assert!(!info.is_pure(read));
/// assert!(info.loads(read).contains(&Value::Global(counter)));
/// # Ok::<(), midend::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct FuncInfo {
    effects: HashMap<FuncId, FunctionEffects>,
}

impl FuncInfo {
    /// Runs the analysis over every function of the module.
    #[must_use]
    pub fn compute(module: &Module) -> Self {
        let mut info = FuncInfo::default();
        for func in module.functions() {
            info.effects.insert(
                func,
                FunctionEffects {
                    is_declaration: module.function(func).is_declaration(),
                    ..FunctionEffects::default()
                },
            );
        }

        info.trace_locations(module);
        info.propagate_calls(module);
        info.propagate_library_use(module);

        for func in module.functions() {
            let effects = info.effects(func);
            if effects.is_declaration {
                continue;
            }
            log::info!(
                "{} is pure? {} ({} loads, {} stores, opaque: {}, library: {})",
                module.function(func).name(),
                effects.is_pure(),
                effects.loads.len(),
                effects.stores.len(),
                effects.opaque_loads || effects.opaque_stores,
                effects.uses_library
            );
        }
        info
    }

    fn entry(&mut self, func: FuncId) -> &mut FunctionEffects {
        self.effects.entry(func).or_default()
    }

    /// Attributes direct loads and stores to the global or parameter they go through.
    fn trace_locations(&mut self, module: &Module) {
        let mut roots: Vec<Value> = module
            .globals()
            .filter(|g| !module.global(*g).is_const())
            .map(Value::Global)
            .collect();
        for func in module.defined_functions() {
            for &arg in module.function(func).args() {
                if module.ty(module.arg(arg).ty()).is_pointer() {
                    roots.push(Value::Arg(arg));
                }
            }
        }

        for root in roots {
            let mut seen: HashSet<Value> = HashSet::from([root]);
            let mut queue: VecDeque<Value> = VecDeque::from([root]);
            while let Some(pointer) = queue.pop_front() {
                for record in module.uses_of(pointer) {
                    let Some(user) = record.inst() else { continue };
                    let func = module.inst_function(user);
                    match module.inst(user).kind() {
                        InstKind::Load => {
                            self.entry(func).loads.insert(root);
                        }
                        InstKind::Store if record.index == 1 => {
                            self.entry(func).stores.insert(root);
                        }
                        InstKind::GetElementPtr if record.index == 0 => {
                            if seen.insert(Value::Inst(user)) {
                                queue.push_back(Value::Inst(user));
                            }
                        }
                        InstKind::Phi => {
                            if seen.insert(Value::Inst(user)) {
                                queue.push_back(Value::Inst(user));
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        for func in module.defined_functions() {
            for inst in module.function_instructions(func) {
                let data = module.inst(inst);
                let pointer = match data.kind() {
                    InstKind::Load => data.operand(0),
                    InstKind::Store => data.operand(1),
                    _ => continue,
                };
                if Self::trace_roots(module, pointer).is_some() {
                    continue;
                }
                let effects = self.entry(func);
                if data.is_load() {
                    effects.opaque_loads = true;
                } else {
                    effects.opaque_stores = true;
                }
            }
        }
    }

    /// Pushes callee effects into callers until no set grows.
    fn propagate_calls(&mut self, module: &Module) {
        let mut worklist: VecDeque<FuncId> = module.defined_functions().collect();
        let mut queued: HashSet<FuncId> = worklist.iter().copied().collect();

        while let Some(callee) = worklist.pop_front() {
            queued.remove(&callee);
            let callee_effects = self.effects(callee).clone();

            for call in call_sites(module, callee) {
                let caller = module.inst_function(call);
                let before = self.effects(caller).access_count();

                let mut loads = BTreeSet::new();
                let mut stores = BTreeSet::new();
                let mut opaque_loads = callee_effects.opaque_loads;
                let mut opaque_stores = callee_effects.opaque_stores;
                for location in &callee_effects.loads {
                    match map_location(module, call, *location) {
                        Some(mapped) => loads.extend(mapped),
                        None => opaque_loads = true,
                    }
                }
                for location in &callee_effects.stores {
                    match map_location(module, call, *location) {
                        Some(mapped) => stores.extend(mapped),
                        None => opaque_stores = true,
                    }
                }
                let effects = self.entry(caller);
                effects.loads.extend(loads);
                effects.stores.extend(stores);
                effects.opaque_loads |= opaque_loads;
                effects.opaque_stores |= opaque_stores;

                if effects.access_count() != before && queued.insert(caller) {
                    worklist.push_back(caller);
                }
            }
        }
    }

    /// Marks every function that reaches a declaration through calls.
    fn propagate_library_use(&mut self, module: &Module) {
        let mut worklist: VecDeque<FuncId> = VecDeque::new();
        for func in module.functions() {
            if !module.function(func).is_declaration() {
                continue;
            }
            for call in call_sites(module, func) {
                let caller = module.inst_function(call);
                let effects = self.entry(caller);
                if !effects.uses_library {
                    effects.uses_library = true;
                    worklist.push_back(caller);
                }
            }
        }

        while let Some(func) = worklist.pop_front() {
            for call in call_sites(module, func) {
                let caller = module.inst_function(call);
                let effects = self.entry(caller);
                if !effects.uses_library {
                    effects.uses_library = true;
                    worklist.push_back(caller);
                }
            }
        }
    }

    /// Effects of a function; empty for functions the analysis has not seen.
    #[must_use]
    pub fn effects(&self, func: FuncId) -> &FunctionEffects {
        static EMPTY: FunctionEffects = FunctionEffects {
            loads: BTreeSet::new(),
            stores: BTreeSet::new(),
            uses_library: false,
            is_declaration: false,
            opaque_loads: false,
            opaque_stores: false,
        };
        self.effects.get(&func).unwrap_or(&EMPTY)
    }

    /// Returns true if `func` is defined and has no observable side effect.
    #[must_use]
    pub fn is_pure(&self, func: FuncId) -> bool {
        self.effects(func).is_pure()
    }

    /// Returns true if `func` is a declaration or calls one.
    #[must_use]
    pub fn uses_io(&self, func: FuncId) -> bool {
        self.effects(func).uses_io()
    }

    /// Locations `func` may read.
    #[must_use]
    pub fn loads(&self, func: FuncId) -> &BTreeSet<Value> {
        &self.effects(func).loads
    }

    /// Locations `func` may write.
    #[must_use]
    pub fn stores(&self, func: FuncId) -> &BTreeSet<Value> {
        &self.effects(func).stores
    }

    /// All pure functions, in module order.
    #[must_use]
    pub fn pure_functions(&self, module: &Module) -> Vec<FuncId> {
        module.functions().filter(|f| self.is_pure(*f)).collect()
    }

    /// Follows a pointer back through `getelementptr` and `phi` to the global,
    /// argument or `alloca` it addresses.
    ///
    /// Returns `None` when the pointer comes from somewhere else (a load or a
    /// call result) or when a phi merges different roots.
    #[must_use]
    pub fn trace_pointer(module: &Module, pointer: Value) -> Option<Value> {
        let roots = Self::trace_roots(module, pointer)?;
        match roots.len() {
            1 => roots.into_iter().next(),
            _ => None,
        }
    }

    /// Every global, argument or `alloca` a pointer may address, following
    /// `getelementptr` bases and all `phi` inputs.
    ///
    /// Returns `None` if any path ends somewhere else.
    #[must_use]
    pub fn trace_roots(module: &Module, pointer: Value) -> Option<BTreeSet<Value>> {
        let mut roots = BTreeSet::new();
        let mut seen = HashSet::new();
        let mut pending = vec![pointer];
        while let Some(value) = pending.pop() {
            if !seen.insert(value) {
                continue;
            }
            match value {
                Value::Global(_) | Value::Arg(_) => {
                    roots.insert(value);
                }
                Value::Inst(inst) => {
                    let data = module.inst(inst);
                    match data.kind() {
                        InstKind::Alloca => {
                            roots.insert(value);
                        }
                        InstKind::GetElementPtr => pending.push(data.operand(0)),
                        InstKind::Phi => {
                            pending.extend(data.phi_incoming().into_iter().map(|(v, _)| v));
                        }
                        _ => return None,
                    }
                }
                _ => return None,
            }
        }
        Some(roots)
    }

    /// The location a `load` reads, if it can be traced.
    #[must_use]
    pub fn load_location(module: &Module, load: InstId) -> Option<Value> {
        let data = module.inst(load);
        debug_assert!(data.is_load());
        Self::trace_pointer(module, data.operand(0))
    }

    /// The location a `store` writes, if it can be traced.
    #[must_use]
    pub fn store_location(module: &Module, store: InstId) -> Option<Value> {
        let data = module.inst(store);
        debug_assert!(data.is_store());
        Self::trace_pointer(module, data.operand(1))
    }

    /// Locations a call may read, seen from the calling function.
    ///
    /// The callee's globals plus every root of the actual argument of each
    /// parameter the callee reads through. `None` if such an argument cannot be
    /// traced or the callee reads through an opaque pointer. Calls to
    /// declarations report no locations.
    #[must_use]
    pub fn call_loads(&self, module: &Module, call: InstId) -> Option<BTreeSet<Value>> {
        let effects = self.effects(module.call_target(call)?);
        if effects.opaque_loads {
            return None;
        }
        self.call_locations(module, call, &effects.loads)
    }

    /// Locations a call may write, seen from the calling function.
    ///
    /// See [`call_loads`](FuncInfo::call_loads).
    #[must_use]
    pub fn call_stores(&self, module: &Module, call: InstId) -> Option<BTreeSet<Value>> {
        let effects = self.effects(module.call_target(call)?);
        if effects.opaque_stores {
            return None;
        }
        self.call_locations(module, call, &effects.stores)
    }

    fn call_locations(
        &self,
        module: &Module,
        call: InstId,
        locations: &BTreeSet<Value>,
    ) -> Option<BTreeSet<Value>> {
        let mut result = BTreeSet::new();
        for location in locations {
            match location {
                Value::Arg(arg) => {
                    let actual = *module.inst(call).call_args().get(module.arg(*arg).arg_no())?;
                    result.extend(Self::trace_roots(module, actual)?);
                }
                other => {
                    result.insert(*other);
                }
            }
        }
        Some(result)
    }
}

/// Call instructions targeting `callee`.
fn call_sites(module: &Module, callee: FuncId) -> Vec<InstId> {
    module
        .uses_of(Value::Func(callee))
        .iter()
        .filter(|record| record.index == 0)
        .filter_map(|record| record.inst())
        .filter(|inst| module.inst(*inst).is_call())
        .collect()
}

/// Maps a callee location into the caller of `call`.
///
/// Globals carry over. A parameter becomes every root of the matching actual
/// argument that is a mutable global or a parameter of the caller. `None` when
/// the argument cannot be traced.
fn map_location(module: &Module, call: InstId, location: Value) -> Option<Vec<Value>> {
    let Value::Arg(arg) = location else {
        return Some(vec![location]);
    };
    let actual = *module.inst(call).call_args().get(module.arg(arg).arg_no())?;
    let roots = FuncInfo::trace_roots(module, actual)?;
    Some(
        roots
            .into_iter()
            .filter(|root| match root {
                Value::Arg(_) => true,
                Value::Global(g) => !module.global(*g).is_const(),
                _ => false,
            })
            .collect(),
    )
}

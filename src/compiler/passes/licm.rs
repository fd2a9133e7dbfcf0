//! Loop-invariant code motion.
//!
//! Moves computations that produce the same value on every iteration into the
//! loop's preheader.
//!
//! # Algorithm
//!
//! Loops are visited outer before inner, so a preheader inserted for an outer
//! loop never invalidates the inner loops found before it.
//!
//! 1. Collect the memory locations the loop may write: traced `store`
//!    pointers and the store sets of called functions.
//! 2. Classify every instruction of the loop as variant, invariant or unknown
//!    until nothing changes:
//!    - `store`, `ret`, `br` and `phi` are variant;
//!    - a call is variant if its callee does I/O, writes memory, or reads a
//!      location the loop writes;
//!    - a load is variant if it reads a location the loop writes;
//!    - anything else is variant if an operand defined in the loop is
//!      variant, unknown while such an operand is unknown, and invariant
//!      otherwise.
//! 3. If anything is invariant, make sure the loop has a preheader: reuse the
//!    single outside predecessor of the header when it branches only to the
//!    header, otherwise synthesise a block and split the header phis.
//! 4. Move the invariant instructions, in dominance order, in front of the
//!    preheader's terminator.
//!
//! # Example
//!
//! ```text
//! // Before LICM
//! entry:
//!     br header
//! header:
//!     %i = phi [0, entry], [%i2, body]
//!     br %c, body, exit
//! body:
//!     %h = load @h           // @h is never stored in the loop
//!     %i2 = add %i, %h
//!     br header
//!
//! // After LICM
//! entry:
//!     %h = load @h
//!     br header
//! ```

use std::collections::{BTreeSet, HashMap};

use crate::{
    analysis::{Dominators, FuncInfo, Loop, LoopForest},
    compiler::{EventKind, EventLog, Pass, PipelineConfig},
    ir::{BlockId, Builder, FuncId, InsertPosition, InstId, InstKind, Module, Value},
    Result,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Unknown,
    Variant,
    Invariant,
}

/// Memory written somewhere in a loop.
struct LoopStores {
    locations: BTreeSet<Value>,
    /// Some write goes through a pointer that could not be traced.
    untraceable: bool,
}

impl LoopStores {
    fn collect(module: &Module, info: &FuncInfo, insts: &[InstId]) -> Self {
        let mut stores = LoopStores {
            locations: BTreeSet::new(),
            untraceable: false,
        };
        for inst in insts {
            let data = module.inst(*inst);
            let written = if data.is_store() {
                FuncInfo::store_location(module, *inst).map(|loc| BTreeSet::from([loc]))
            } else if data.is_call() {
                info.call_stores(module, *inst)
            } else {
                continue;
            };
            match written {
                Some(locations) => stores.locations.extend(locations),
                None => stores.untraceable = true,
            }
        }
        stores
    }

    /// Returns true if reading `location` may observe a write of the loop.
    fn clobbers(&self, location: Option<Value>) -> bool {
        match location {
            Some(loc) => self.untraceable || self.locations.contains(&loc),
            None => true,
        }
    }

    fn is_empty(&self) -> bool {
        self.locations.is_empty() && !self.untraceable
    }
}

/// Loop-invariant code motion pass.
#[derive(Debug, Clone)]
pub struct LicmPass {
    max_iterations: usize,
}

impl Default for LicmPass {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl LicmPass {
    /// Creates a new LICM pass.
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
        }
    }

    /// Classifies the instructions of a loop.
    fn classify(
        &self,
        module: &Module,
        info: &FuncInfo,
        insts: &[InstId],
        events: &EventLog,
    ) -> HashMap<InstId, Class> {
        let stores = LoopStores::collect(module, info, insts);
        let mut class: HashMap<InstId, Class> =
            insts.iter().map(|inst| (*inst, Class::Unknown)).collect();

        for round in 0.. {
            if round == self.max_iterations {
                log::warn!("licm: classification did not settle after {} rounds", round);
                events.warn(format!("licm classification stopped after {} rounds", round));
                break;
            }

            let mut progress = false;
            for inst in insts {
                if class[inst] != Class::Unknown {
                    continue;
                }
                let decided = classify_one(module, info, &stores, &class, *inst);
                if decided != Class::Unknown {
                    class.insert(*inst, decided);
                    progress = true;
                }
            }
            if !progress {
                break;
            }
        }
        class
    }

    /// Classifies and hoists one loop, returning the preheader if anything moved.
    fn run_on_loop(
        &self,
        module: &mut Module,
        func: FuncId,
        lp: &Loop,
        order: &HashMap<BlockId, usize>,
        info: &FuncInfo,
        events: &EventLog,
    ) -> Result<Option<BlockId>> {
        let mut blocks: Vec<BlockId> = lp.blocks().to_vec();
        blocks.sort_by_key(|bb| order.get(bb).copied().unwrap_or(usize::MAX));
        let insts: Vec<InstId> = blocks
            .iter()
            .flat_map(|bb| module.block(*bb).instructions().to_vec())
            .collect();

        let class = self.classify(module, info, &insts, events);
        let invariant: Vec<InstId> = insts
            .into_iter()
            .filter(|i| class[i] == Class::Invariant)
            .collect();
        if invariant.is_empty() {
            return Ok(None);
        }

        let Some(preheader) = ensure_preheader(module, func, lp, events)? else {
            return Ok(None);
        };

        let func_name = module.function(func).name().to_string();
        let target = module.block(preheader).name().to_string();
        for inst in invariant {
            events
                .record(EventKind::InstructionHoisted)
                .function(func_name.as_str())
                .block(module.block(module.inst(inst).parent()).name())
                .pass("licm")
                .message(format!("{} to {}", module.value_name(Value::Inst(inst)), target));
            module.move_before_terminator(inst, preheader);
        }
        Ok(Some(preheader))
    }
}

fn classify_one(
    module: &Module,
    info: &FuncInfo,
    stores: &LoopStores,
    class: &HashMap<InstId, Class>,
    inst: InstId,
) -> Class {
    let data = module.inst(inst);
    match data.kind() {
        InstKind::Store | InstKind::Ret | InstKind::Br | InstKind::Phi => return Class::Variant,
        InstKind::Call => {
            let Some(callee) = data.callee() else {
                return Class::Variant;
            };
            if info.uses_io(callee) {
                return Class::Variant;
            }
            match info.call_stores(module, inst) {
                Some(written) if written.is_empty() => {}
                _ => return Class::Variant,
            }
            match info.call_loads(module, inst) {
                Some(read) => {
                    if read.iter().any(|loc| stores.clobbers(Some(*loc))) {
                        return Class::Variant;
                    }
                }
                None if !stores.is_empty() => return Class::Variant,
                None => {}
            }
        }
        InstKind::Load => {
            if stores.clobbers(FuncInfo::load_location(module, inst)) {
                return Class::Variant;
            }
        }
        _ => {}
    }

    let mut undecided = false;
    for operand in data.operands() {
        if let Value::Inst(def) = operand {
            match class.get(def) {
                Some(Class::Variant) => return Class::Variant,
                Some(Class::Unknown) => undecided = true,
                Some(Class::Invariant) | None => {}
            }
        }
    }
    if undecided {
        Class::Unknown
    } else {
        Class::Invariant
    }
}

/// Returns the block invariant code of `lp` can be moved to, creating it if needed.
///
/// An existing predecessor is reused when it is the only one outside the loop
/// and branches nowhere but the header. Otherwise a new block is placed between
/// the outside predecessors and the header, and the header phis are split.
/// `None` if the header has no predecessor outside the loop.
fn ensure_preheader(
    module: &mut Module,
    func: FuncId,
    lp: &Loop,
    events: &EventLog,
) -> Result<Option<BlockId>> {
    let header = lp.header();
    let outside: Vec<BlockId> = module
        .block(header)
        .predecessors()
        .iter()
        .copied()
        .filter(|pred| !lp.is_latch(*pred))
        .collect();

    match outside.as_slice() {
        [] => return Ok(None),
        [single] if module.block(*single).successors() == [header] => return Ok(Some(*single)),
        _ => {}
    }

    let preheader = module.add_block(func, "preheader");
    let header_phis: Vec<InstId> = module
        .block(header)
        .instructions()
        .iter()
        .copied()
        .take_while(|i| module.inst(*i).is_phi())
        .collect();
    for phi in header_phis {
        let (entering, back): (Vec<_>, Vec<_>) = module
            .inst(phi)
            .phi_incoming()
            .into_iter()
            .partition(|(_, bb)| !lp.is_latch(*bb));
        let ty = module.inst(phi).ty();
        let outer = module.insert_instruction(
            preheader,
            InstKind::Phi,
            ty,
            Vec::new(),
            InsertPosition::Append,
        )?;
        for (value, block) in entering {
            module.add_phi_incoming(outer, value, block);
        }
        module.remove_all_operands(phi);
        for (value, block) in back {
            module.add_phi_incoming(phi, value, block);
        }
        module.add_phi_incoming(phi, Value::Inst(outer), preheader);
    }

    for pred in &outside {
        if let Some(br) = module.terminator(*pred) {
            module.replace_branch_target(br, header, preheader);
        }
    }
    Builder::at_end(module, preheader).br(header)?;

    let func_name = module.function(func).name().to_string();
    log::debug!(
        "{}: created preheader for loop at {}",
        func_name,
        module.block(header).name()
    );
    events
        .record(EventKind::PreheaderCreated)
        .function(func_name)
        .block(module.block(preheader).name())
        .pass("licm")
        .message(format!("for loop at {}", module.block(header).name()));
    Ok(Some(preheader))
}

impl Pass for LicmPass {
    fn name(&self) -> &'static str {
        "licm"
    }

    fn description(&self) -> &'static str {
        "Moves loop-invariant computations to loop preheaders"
    }

    fn run(&mut self, module: &mut Module, events: &EventLog) -> Result<bool> {
        let info = FuncInfo::compute(module);
        let mut changed = false;

        let functions: Vec<FuncId> = module.defined_functions().collect();
        for func in functions {
            let dom = Dominators::compute(module, func)?;
            let mut forest = LoopForest::from_dominators(&dom);
            if forest.is_empty() {
                continue;
            }
            let order: HashMap<BlockId, usize> = dom
                .preorder()
                .into_iter()
                .enumerate()
                .map(|(index, bb)| (bb, index))
                .collect();

            for id in forest.loops_outer_first() {
                let lp = forest.get(id).clone();
                if lp.header() == dom.entry() {
                    log::debug!(
                        "licm: skipping loop at entry block of {}",
                        module.function(func).name()
                    );
                    continue;
                }
                if let Some(preheader) =
                    self.run_on_loop(module, func, &lp, &order, &info, events)?
                {
                    forest.set_preheader(id, preheader);
                    changed = true;
                }
            }
        }

        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{verify_function, verify_uses, CmpPredicate},
        test::{build_global_loop, build_nested_loops},
    };

    #[test]
    fn test_load_of_unstored_global_hoisted() {
        //   entry
        //     |
        //   header <---+
        //    /  \      |
        // exit   body -+
        let mut fixture = build_global_loop();
        let events = EventLog::new();
        assert!(LicmPass::default().run(&mut fixture.module, &events).unwrap());

        let module = &fixture.module;
        let entry = fixture.block("entry");
        assert_eq!(module.inst(fixture.inst("load_h")).parent(), entry);
        assert_eq!(module.inst(fixture.inst("load_g")).parent(), fixture.block("body"));
        assert_eq!(module.inst(fixture.inst("sum")).parent(), fixture.block("body"));
        assert_eq!(module.inst(fixture.inst("next")).parent(), fixture.block("body"));

        // Hoisted in front of the entry's branch, which stays last.
        let entry_insts = module.block(entry).instructions();
        assert_eq!(entry_insts[0], fixture.inst("load_h"));
        assert!(module.inst(entry_insts[1]).is_br());

        assert_eq!(events.count_kind(EventKind::InstructionHoisted), 1);
        assert!(!events.has(EventKind::PreheaderCreated));
        verify_function(module, fixture.func).unwrap();
    }

    /// A loop entered from two blocks, with `%sq = mul %n, %n` in its body.
    ///
    /// ```text
    ///     entry
    ///     /   \
    ///    a     b
    ///     \   /
    ///     header <--+
    ///      /  \     |
    ///   exit   body-+
    /// ```
    fn two_entry_loop() -> (Module, FuncId, HashMap<&'static str, BlockId>, InstId, InstId) {
        let mut module = Module::new();
        let i32_ty = module.int32_type();
        let fn_ty = module.function_type(i32_ty, vec![i32_ty]);
        let f = module.add_function("main", fn_ty).unwrap();
        let n = module.function_arg(f, 0).unwrap();
        let zero = module.const_int(0);
        let one = module.const_int(1);
        let names = ["entry", "a", "b", "header", "body", "exit"];
        let blocks: HashMap<&'static str, BlockId> = names
            .iter()
            .map(|name| (*name, module.add_block(f, name)))
            .collect();

        let mut b = Builder::at_end(&mut module, blocks["entry"]);
        let c = b.icmp(CmpPredicate::Gt, n, zero).unwrap();
        b.cond_br(c, blocks["a"], blocks["b"]).unwrap();
        b.position_at_end(blocks["a"]);
        b.br(blocks["header"]).unwrap();
        b.position_at_end(blocks["b"]);
        b.br(blocks["header"]).unwrap();
        b.position_at_end(blocks["header"]);
        let i = b
            .phi(i32_ty, &[(zero.into(), blocks["a"]), (one.into(), blocks["b"])])
            .unwrap();
        let cond = b.icmp(CmpPredicate::Lt, i, n).unwrap();
        b.cond_br(cond, blocks["body"], blocks["exit"]).unwrap();
        b.position_at_end(blocks["body"]);
        let sq = b.mul(n, n).unwrap();
        let next = b.add(i, sq).unwrap();
        b.br(blocks["header"]).unwrap();
        b.position_at_end(blocks["exit"]);
        b.ret(Some(i.into())).unwrap();
        module.add_phi_incoming(i, next.into(), blocks["body"]);

        (module, f, blocks, i, sq)
    }

    #[test]
    fn test_preheader_synthesised_and_phis_split() {
        let (mut module, f, blocks, i, sq) = two_entry_loop();
        let events = EventLog::new();
        assert!(LicmPass::default().run(&mut module, &events).unwrap());

        let preheader = module.inst(sq).parent();
        assert!(!blocks.values().any(|bb| *bb == preheader));
        assert_eq!(module.block(preheader).successors(), &[blocks["header"]]);
        let mut preds = module.block(preheader).predecessors().to_vec();
        preds.sort();
        assert_eq!(preds, vec![blocks["a"], blocks["b"]]);

        let mut header_preds = module.block(blocks["header"]).predecessors().to_vec();
        header_preds.sort();
        let mut expected = vec![preheader, blocks["body"]];
        expected.sort();
        assert_eq!(header_preds, expected);

        // The header phi keeps the back edge and takes the outside values through
        // a new phi in the preheader.
        let incoming = module.inst(i).phi_incoming();
        assert_eq!(incoming.len(), 2);
        let (outer, from) = incoming[1];
        assert_eq!(from, preheader);
        let outer = outer.as_inst().unwrap();
        assert_eq!(module.inst(outer).parent(), preheader);
        assert_eq!(module.inst(outer).phi_incoming().len(), 2);

        assert_eq!(events.count_kind(EventKind::PreheaderCreated), 1);
        verify_function(&module, f).unwrap();
        verify_uses(&module).unwrap();
    }

    #[test]
    fn test_entry_header_loop_skipped() {
        //   entry <-+
        //    |  \___|
        //   exit
        let mut module = Module::new();
        let i32_ty = module.int32_type();
        let fn_ty = module.function_type(i32_ty, vec![i32_ty]);
        let f = module.add_function("main", fn_ty).unwrap();
        let n = module.function_arg(f, 0).unwrap();
        let zero = module.const_int(0);
        let entry = module.add_block(f, "entry");
        let exit = module.add_block(f, "exit");

        let mut b = Builder::at_end(&mut module, entry);
        let sq = b.mul(n, n).unwrap();
        let c = b.icmp(CmpPredicate::Gt, sq, zero).unwrap();
        b.cond_br(c, entry, exit).unwrap();
        b.position_at_end(exit);
        b.ret(Some(sq.into())).unwrap();

        assert!(!LicmPass::default().run(&mut module, &EventLog::new()).unwrap());
        assert_eq!(module.inst(sq).parent(), entry);
    }

    /// `main` loops calling `callee(n)`; returns the call for inspection.
    fn loop_calling(callee_io: bool) -> (Module, InstId, BlockId) {
        let mut module = Module::new();
        let i32_ty = module.int32_type();
        let unary = module.function_type(i32_ty, vec![i32_ty]);
        let callee = module.add_function("callee", unary).unwrap();
        if !callee_io {
            let body = module.add_block(callee, "entry");
            let x = module.function_arg(callee, 0).unwrap();
            let mut b = Builder::at_end(&mut module, body);
            let sq = b.mul(x, x).unwrap();
            b.ret(Some(sq.into())).unwrap();
        }

        let main = module.add_function("main", unary).unwrap();
        let n = module.function_arg(main, 0).unwrap();
        let zero = module.const_int(0);
        let entry = module.add_block(main, "entry");
        let header = module.add_block(main, "header");
        let body = module.add_block(main, "body");
        let exit = module.add_block(main, "exit");

        let mut b = Builder::at_end(&mut module, entry);
        b.br(header).unwrap();
        b.position_at_end(header);
        let i = b.phi(i32_ty, &[(zero.into(), entry)]).unwrap();
        let c = b.icmp(CmpPredicate::Lt, i, n).unwrap();
        b.cond_br(c, body, exit).unwrap();
        b.position_at_end(body);
        let call = b.call(callee, &[n.into()]).unwrap();
        let next = b.add(i, call).unwrap();
        b.br(header).unwrap();
        b.position_at_end(exit);
        b.ret(Some(i.into())).unwrap();
        b.module().add_phi_incoming(i, next.into(), body);

        (module, call, entry)
    }

    #[test]
    fn test_pure_call_hoisted_io_call_kept() {
        let (mut module, call, entry) = loop_calling(false);
        LicmPass::default().run(&mut module, &EventLog::new()).unwrap();
        assert_eq!(module.inst(call).parent(), entry);

        let (mut module, call, entry) = loop_calling(true);
        assert!(!LicmPass::default().run(&mut module, &EventLog::new()).unwrap());
        assert_ne!(module.inst(call).parent(), entry);
    }

    #[test]
    fn test_nested_invariant_leaves_both_loops() {
        let mut fixture = build_nested_loops();
        let n = fixture.module.function_arg(fixture.func, 0).unwrap();
        let ibody = fixture.block("ibody");
        let mut b = Builder::before_terminator(&mut fixture.module, ibody);
        let sq = b.mul(n, n).unwrap();
        let two = b.module().const_int(2);
        let twice = b.mul(sq, two).unwrap();

        let events = EventLog::new();
        assert!(LicmPass::default().run(&mut fixture.module, &events).unwrap());

        // The outer loop's preheader is the entry block, which branches only to it.
        let entry = fixture.block("entry");
        assert_eq!(fixture.module.inst(sq).parent(), entry);
        assert_eq!(fixture.module.inst(twice).parent(), entry);
        let entry_insts = fixture.module.block(entry).instructions();
        let pos = |inst| entry_insts.iter().position(|i| *i == inst).unwrap();
        assert!(pos(sq) < pos(twice));
        assert_eq!(events.count_kind(EventKind::InstructionHoisted), 2);
        verify_function(&fixture.module, fixture.func).unwrap();
    }

    /// `main` loops ten times reading `h`. With `opaque_store`, each iteration
    /// also writes through the pointer held in the global `slot`.
    fn opaque_store_loop(opaque_store: bool) -> (Module, FuncId, BlockId, InstId) {
        let mut module = Module::new();
        let i32_ty = module.int32_type();
        let ptr_ty = module.pointer_type(i32_ty);
        let fn_ty = module.function_type(i32_ty, vec![]);
        let f = module.add_function("main", fn_ty).unwrap();
        let zero = module.const_int(0);
        let ten = module.const_int(10);
        let h = module.add_global("h", i32_ty, false, Some(zero)).unwrap();
        let slot = module.add_global("slot", ptr_ty, false, None).unwrap();
        let entry = module.add_block(f, "entry");
        let header = module.add_block(f, "header");
        let body = module.add_block(f, "body");
        let exit = module.add_block(f, "exit");

        let mut b = Builder::at_end(&mut module, entry);
        b.br(header).unwrap();
        b.position_at_end(header);
        let i = b.phi(i32_ty, &[(zero.into(), entry)]).unwrap();
        let c = b.icmp(CmpPredicate::Lt, i, ten).unwrap();
        b.cond_br(c, body, exit).unwrap();
        b.position_at_end(body);
        if opaque_store {
            let target = b.load(slot).unwrap();
            b.store(i, target).unwrap();
        }
        let load_h = b.load(h).unwrap();
        let next = b.add(i, load_h).unwrap();
        b.br(header).unwrap();
        b.position_at_end(exit);
        b.ret(Some(i.into())).unwrap();
        b.module().add_phi_incoming(i, next.into(), body);

        (module, f, entry, load_h)
    }

    #[test]
    fn test_untraceable_store_pins_every_load() {
        let (mut module, _, entry, load_h) = opaque_store_loop(false);
        assert!(LicmPass::default().run(&mut module, &EventLog::new()).unwrap());
        assert_eq!(module.inst(load_h).parent(), entry);

        let (mut module, f, entry, load_h) = opaque_store_loop(true);
        let body = module.inst(load_h).parent();
        let events = EventLog::new();
        assert!(!LicmPass::default().run(&mut module, &events).unwrap());
        assert_ne!(module.inst(load_h).parent(), entry);
        assert_eq!(module.inst(load_h).parent(), body);
        assert!(module.block(entry).instructions().iter().all(|i| module.inst(*i).is_br()));
        assert_eq!(events.count_kind(EventKind::InstructionHoisted), 0);
        verify_function(&module, f).unwrap();
    }
}

//! Promotion of stack slots to SSA values.
//!
//! Front-ends emit every local variable as an `alloca` with loads and stores.
//! This pass rewrites scalar slots into direct value references, placing phis
//! where control flow joins.
//!
//! # Algorithm
//!
//! 1. **Phi placement**: for every promotable slot, the blocks storing to it
//!    seed a worklist over dominance frontiers. Each frontier block gets one
//!    phi per slot, and a block that receives a new phi becomes a definition
//!    site itself (iterated dominance frontier).
//! 2. **Renaming**: a preorder walk of the dominator tree keeps one value stack
//!    per slot. Loads take the top of the stack, stores and the slot's phis
//!    replace it, and every successor's slot phis receive the top as the
//!    incoming value for the current block. Leaving a block pops its entries
//!    and erases the loads, stores and allocas it made redundant.
//!
//! A slot that is read before any store reads the zero value of its type.
//!
//! # Example
//!
//! ```text
//! // Before
//! entry:
//!     %x = alloca i32
//!     br %c, left, right
//! left:
//!     store 1, %x
//!     br join
//! right:
//!     store 2, %x
//!     br join
//! join:
//!     %v = load %x
//!     ret %v
//!
//! // After
//! join:
//!     %v = phi i32 [1, left], [2, right]
//!     ret %v
//! ```

use std::collections::{HashMap, HashSet};

use crate::{
    analysis::Dominators,
    compiler::{EventKind, EventLog, Pass},
    ir::{BlockId, FuncId, InsertPosition, InstId, InstKind, Module, Type, TypeId, User, Value},
    Error, Result,
};

/// SSA construction pass.
#[derive(Debug, Default)]
pub struct Mem2RegPass;

impl Mem2RegPass {
    /// Creates a new SSA construction pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for Mem2RegPass {
    fn name(&self) -> &'static str {
        "mem2reg"
    }

    fn description(&self) -> &'static str {
        "Promotes scalar stack slots to SSA values"
    }

    fn run(&mut self, module: &mut Module, events: &EventLog) -> Result<bool> {
        let functions: Vec<FuncId> = module.defined_functions().collect();
        let mut changed = false;
        for func in functions {
            changed |= promote_function(module, func, events)?;
        }
        Ok(changed)
    }
}

/// A stack slot being promoted.
struct Slot {
    alloca: InstId,
    elem_ty: TypeId,
}

/// Returns true if every use of the alloca is a load from it or a store into it.
fn is_promotable(module: &Module, alloca: InstId) -> bool {
    let ty = module.inst(alloca).ty();
    match module.pointer_element(ty) {
        Some(elem) if !module.ty(elem).is_array() => {}
        _ => return false,
    }
    module.uses_of(Value::Inst(alloca)).iter().all(|u| match u.user {
        User::Inst(user) => match module.inst(user).kind() {
            InstKind::Load => u.index == 0,
            InstKind::Store => u.index == 1,
            _ => false,
        },
        _ => false,
    })
}

fn zero_value(module: &mut Module, ty: TypeId) -> Value {
    let zero = match module.ty(ty).clone() {
        Type::Integer(1) => module.const_bool(false),
        Type::Integer(_) => module.const_int(0),
        Type::Float => module.const_float(0.0),
        _ => module.const_zero(ty),
    };
    Value::Const(zero)
}

/// Promotes all promotable slots of one function.
///
/// Returns true if at least one slot was promoted.
fn promote_function(module: &mut Module, func: FuncId, events: &EventLog) -> Result<bool> {
    let func_name = module.function(func).name().to_string();
    let dom = Dominators::compute(module, func)?;
    if !dom.unreachable_blocks().is_empty() {
        return Err(Error::UnreachableBlocks(func_name));
    }
    let entry = dom.entry();
    if !module.block(entry).predecessors().is_empty() {
        return Err(malformed_error!(
            "entry block of {} has predecessors",
            func_name
        ));
    }

    let slots: Vec<Slot> = module
        .function_instructions(func)
        .into_iter()
        .filter(|i| module.inst(*i).is_alloca() && is_promotable(module, *i))
        .filter_map(|alloca| {
            module
                .pointer_element(module.inst(alloca).ty())
                .map(|elem_ty| Slot { alloca, elem_ty })
        })
        .collect();
    if slots.is_empty() {
        return Ok(false);
    }
    let slot_of: HashMap<InstId, usize> = slots
        .iter()
        .enumerate()
        .map(|(index, slot)| (slot.alloca, index))
        .collect();

    for slot in &slots {
        log::debug!(
            "{}: promoting {}",
            func_name,
            module.value_name(Value::Inst(slot.alloca))
        );
        events
            .record(EventKind::MemoryPromoted)
            .function(func_name.as_str())
            .pass("mem2reg")
            .message(format!(
                "{} of type {}",
                module.value_name(Value::Inst(slot.alloca)),
                module.type_name(slot.elem_ty)
            ));
    }

    let phi_slot = place_phis(module, &dom, &slots, &func_name, events)?;
    rename(module, &dom, &slots, &slot_of, &phi_slot);
    Ok(true)
}

/// Inserts the phis for every slot, returning the slot each new phi belongs to.
fn place_phis(
    module: &mut Module,
    dom: &Dominators,
    slots: &[Slot],
    func_name: &str,
    events: &EventLog,
) -> Result<HashMap<InstId, usize>> {
    let mut phi_slot = HashMap::new();

    for (index, slot) in slots.iter().enumerate() {
        let mut worklist: Vec<BlockId> = Vec::new();
        for u in module.uses_of(Value::Inst(slot.alloca)) {
            if let User::Inst(user) = u.user {
                let user = module.inst(user);
                if user.is_store() && !worklist.contains(&user.parent()) {
                    worklist.push(user.parent());
                }
            }
        }

        let mut has_phi: HashSet<BlockId> = HashSet::new();
        while let Some(block) = worklist.pop() {
            for frontier in dom.frontier(block) {
                if !has_phi.insert(frontier) {
                    continue;
                }
                let phi = module.insert_instruction(
                    frontier,
                    InstKind::Phi,
                    slot.elem_ty,
                    Vec::new(),
                    InsertPosition::Begin,
                )?;
                phi_slot.insert(phi, index);
                events
                    .record(EventKind::PhiInserted)
                    .function(func_name)
                    .block(module.block(frontier).name())
                    .pass("mem2reg");
                worklist.push(frontier);
            }
        }
    }

    Ok(phi_slot)
}

enum Visit {
    Enter(BlockId),
    Leave(BlockId),
}

/// Rewrites loads and stores of the slots along the dominator tree.
fn rename(
    module: &mut Module,
    dom: &Dominators,
    slots: &[Slot],
    slot_of: &HashMap<InstId, usize>,
    phi_slot: &HashMap<InstId, usize>,
) {
    let mut stacks: Vec<Vec<Value>> = slots
        .iter()
        .map(|slot| vec![zero_value(module, slot.elem_ty)])
        .collect();
    let mut redundant: HashMap<BlockId, Vec<InstId>> = HashMap::new();
    let slot_at = |pointer: Value| pointer.as_inst().and_then(|i| slot_of.get(&i).copied());

    let mut visits = vec![Visit::Enter(dom.entry())];
    while let Some(visit) = visits.pop() {
        match visit {
            Visit::Enter(block) => {
                for stack in &mut stacks {
                    let top = stack[stack.len() - 1];
                    stack.push(top);
                }

                let mut dead = Vec::new();
                for inst in module.block(block).instructions().to_vec() {
                    let (kind, operands) = {
                        let data = module.inst(inst);
                        (data.kind(), data.operands().to_vec())
                    };
                    match kind {
                        InstKind::Load => {
                            if let Some(slot) = slot_at(operands[0]) {
                                let top = stacks[slot][stacks[slot].len() - 1];
                                module.replace_all_uses_with(Value::Inst(inst), top);
                                dead.push(inst);
                            }
                        }
                        InstKind::Store => {
                            if let Some(slot) = slot_at(operands[1]) {
                                let len = stacks[slot].len();
                                stacks[slot][len - 1] = operands[0];
                                dead.push(inst);
                            }
                        }
                        InstKind::Phi => {
                            if let Some(&slot) = phi_slot.get(&inst) {
                                let len = stacks[slot].len();
                                stacks[slot][len - 1] = Value::Inst(inst);
                            }
                        }
                        InstKind::Alloca if slot_of.contains_key(&inst) => dead.push(inst),
                        _ => {}
                    }
                }

                for succ in module.block(block).successors().to_vec() {
                    for phi in module.block(succ).instructions().to_vec() {
                        if !module.inst(phi).is_phi() {
                            break;
                        }
                        if let Some(&slot) = phi_slot.get(&phi) {
                            let top = stacks[slot][stacks[slot].len() - 1];
                            module.add_phi_incoming(phi, top, block);
                        }
                    }
                }

                redundant.insert(block, dead);
                visits.push(Visit::Leave(block));
                for child in dom.children(block).into_iter().rev() {
                    visits.push(Visit::Enter(child));
                }
            }
            Visit::Leave(block) => {
                for stack in &mut stacks {
                    stack.pop();
                }
                if let Some(dead) = redundant.remove(&block) {
                    module.erase_instructions(&dead);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{verify_function, verify_uses, Builder, CmpPredicate},
        test::{build_counting_loop, build_diamond, build_unreachable_phi},
    };

    fn memory_ops(module: &Module, func: FuncId) -> usize {
        module
            .function_instructions(func)
            .into_iter()
            .filter(|i| {
                let inst = module.inst(*i);
                inst.is_load() || inst.is_store() || inst.is_alloca()
            })
            .count()
    }

    #[test]
    fn test_straight_line() {
        // %x = alloca i32; store 0, %x; %a = load %x; %b = add %a, 1; store %b, %x;
        // %c = load %x; ret %c
        let mut module = Module::new();
        let i32_ty = module.int32_type();
        let fn_ty = module.function_type(i32_ty, vec![]);
        let main = module.add_function("main", fn_ty).unwrap();
        let entry = module.add_block(main, "entry");
        let zero = module.const_int(0);
        let one = module.const_int(1);

        let mut b = Builder::at_end(&mut module, entry);
        let x = b.alloca(i32_ty).unwrap();
        b.store(zero, x).unwrap();
        let a = b.load(x).unwrap();
        let sum = b.add(a, one).unwrap();
        b.store(sum, x).unwrap();
        let c = b.load(x).unwrap();
        let ret = b.ret(Some(c.into())).unwrap();

        let events = EventLog::new();
        assert!(Mem2RegPass::new().run(&mut module, &events).unwrap());

        assert_eq!(memory_ops(&module, main), 0);
        assert_eq!(module.inst(sum).operands(), &[Value::Const(zero), Value::Const(one)]);
        assert_eq!(module.inst(ret).operand(0), Value::Inst(sum));
        assert_eq!(events.count_kind(EventKind::MemoryPromoted), 1);
        assert_eq!(events.count_kind(EventKind::PhiInserted), 0);
        verify_function(&module, main).unwrap();
        verify_uses(&module).unwrap();
    }

    #[test]
    fn test_diamond_join_phi() {
        //        entry
        //        /   \
        //     left   right
        //        \   /
        //         join
        let mut fixture = build_diamond();
        let events = EventLog::new();
        assert!(Mem2RegPass::new().run(&mut fixture.module, &events).unwrap());

        let join = fixture.block("join");
        let left = fixture.block("left");
        let right = fixture.block("right");
        let one = Value::Const(fixture.module.const_int(1));
        let two = Value::Const(fixture.module.const_int(2));
        let module = &fixture.module;
        let phis: Vec<InstId> = module
            .block(join)
            .instructions()
            .iter()
            .copied()
            .filter(|i| module.inst(*i).is_phi())
            .collect();
        assert_eq!(phis.len(), 1);

        let mut incoming = module.inst(phis[0]).phi_incoming();
        incoming.sort_by_key(|(_, bb)| *bb);
        assert_eq!(incoming, vec![(one, left), (two, right)]);

        let ret = module.terminator(join).unwrap();
        assert_eq!(module.inst(ret).operand(0), Value::Inst(phis[0]));
        assert_eq!(memory_ops(module, fixture.func), 0);
        verify_function(module, fixture.func).unwrap();
    }

    #[test]
    fn test_loop_header_phi() {
        //   entry
        //     |
        //   header <---+
        //    /  \      |
        // exit   body -+
        let mut fixture = build_counting_loop();
        let events = EventLog::new();
        Mem2RegPass::new().run(&mut fixture.module, &events).unwrap();

        let header = fixture.block("header");
        let zero = fixture.module.const_int(0);
        let module = &fixture.module;
        let phi = module.block(header).instructions()[0];
        assert!(module.inst(phi).is_phi());

        let mut incoming = module.inst(phi).phi_incoming();
        incoming.sort_by_key(|(_, bb)| *bb);
        assert_eq!(
            incoming,
            vec![
                (Value::Const(zero), fixture.block("entry")),
                (Value::Inst(fixture.inst("next")), fixture.block("body")),
            ]
        );

        // The increment now reads the phi directly.
        assert_eq!(module.inst(fixture.inst("next")).operand(0), Value::Inst(phi));
        assert_eq!(memory_ops(module, fixture.func), 0);
        assert!(events.count_kind(EventKind::PhiInserted) >= 1);
        verify_function(module, fixture.func).unwrap();
        verify_uses(module).unwrap();
    }

    #[test]
    fn test_uninitialized_slot_reads_zero() {
        let mut module = Module::new();
        let float = module.float_type();
        let fn_ty = module.function_type(float, vec![]);
        let f = module.add_function("f", fn_ty).unwrap();
        let entry = module.add_block(f, "entry");

        let mut b = Builder::at_end(&mut module, entry);
        let x = b.alloca(float).unwrap();
        let v = b.load(x).unwrap();
        let ret = b.ret(Some(v.into())).unwrap();

        Mem2RegPass::new().run(&mut module, &EventLog::new()).unwrap();
        let zero = module.const_float(0.0);
        assert_eq!(module.inst(ret).operand(0), Value::Const(zero));
    }

    #[test]
    fn test_array_and_escaping_slots_kept() {
        let mut module = Module::new();
        let i32_ty = module.int32_type();
        let arr_ty = module.array_type(i32_ty, 4);
        let ptr_ty = module.pointer_type(i32_ty);
        let void = module.void_type();
        let sink_ty = module.function_type(void, vec![ptr_ty]);
        let sink = module.add_function("sink", sink_ty).unwrap();
        let fn_ty = module.function_type(void, vec![]);
        let f = module.add_function("f", fn_ty).unwrap();
        let entry = module.add_block(f, "entry");
        let zero = module.const_int(0);

        let mut b = Builder::at_end(&mut module, entry);
        let array = b.alloca(arr_ty).unwrap();
        let elem = b.gep(array, &[zero.into(), zero.into()]).unwrap();
        b.store(zero, elem).unwrap();
        let escaping = b.alloca(i32_ty).unwrap();
        b.call(sink, &[escaping.into()]).unwrap();
        b.ret(None).unwrap();

        assert!(!Mem2RegPass::new().run(&mut module, &EventLog::new()).unwrap());
        assert!(module.contains_inst(array));
        assert!(module.contains_inst(escaping));
    }

    #[test]
    fn test_unreachable_blocks_rejected() {
        let mut fixture = build_unreachable_phi();
        let result = Mem2RegPass::new().run(&mut fixture.module, &EventLog::new());
        assert!(matches!(result, Err(Error::UnreachableBlocks(name)) if name == "main"));
    }

    #[test]
    fn test_nested_diamonds_single_phi_per_join() {
        //       entry
        //       /   \
        //      a     b
        //     / \    |
        //   a1   a2  |
        //     \ /    |
        //     amid   |
        //        \   /
        //        join
        let mut module = Module::new();
        let i32_ty = module.int32_type();
        let fn_ty = module.function_type(i32_ty, vec![i32_ty]);
        let f = module.add_function("f", fn_ty).unwrap();
        let n = module.function_arg(f, 0).unwrap();
        let names = ["entry", "a", "a1", "a2", "amid", "b", "join"];
        let bb: Vec<BlockId> = names.iter().map(|name| module.add_block(f, name)).collect();
        let (entry, a, a1, a2, amid, b_bb, join) =
            (bb[0], bb[1], bb[2], bb[3], bb[4], bb[5], bb[6]);
        let zero = module.const_int(0);
        let one = module.const_int(1);
        let two = module.const_int(2);

        let mut b = Builder::at_end(&mut module, entry);
        let x = b.alloca(i32_ty).unwrap();
        let c = b.icmp(CmpPredicate::Gt, n, zero).unwrap();
        b.cond_br(c, a, b_bb).unwrap();
        b.position_at_end(a);
        b.cond_br(c, a1, a2).unwrap();
        b.position_at_end(a1);
        b.store(one, x).unwrap();
        b.br(amid).unwrap();
        b.position_at_end(a2);
        b.store(two, x).unwrap();
        b.br(amid).unwrap();
        b.position_at_end(amid);
        b.br(join).unwrap();
        b.position_at_end(b_bb);
        b.br(join).unwrap();
        b.position_at_end(join);
        let v = b.load(x).unwrap();
        b.ret(Some(v.into())).unwrap();

        Mem2RegPass::new().run(&mut module, &EventLog::new()).unwrap();

        let phis_in = |block: BlockId| {
            module
                .block(block)
                .instructions()
                .iter()
                .filter(|i| module.inst(**i).is_phi())
                .count()
        };
        assert_eq!(phis_in(amid), 1);
        assert_eq!(phis_in(join), 1);
        assert_eq!(phis_in(a), 0);
        verify_function(&module, f).unwrap();
        verify_uses(&module).unwrap();
    }
}

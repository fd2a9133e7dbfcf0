//! Graph editing on [`Module`].
//!
//! Every mutation of operand lists goes through here so that def-use records
//! and block edges never drift from the operands they mirror:
//!
//! - setting, adding or removing an operand updates the referenced value's use
//!   list (and the indices of the shifted slots)
//! - editing a `br` unlinks the old successor edges first and relinks the new
//!   targets afterwards
//! - erasure only succeeds on values nobody uses any more
//!
//! Precondition failures coming from user input are reported as
//! [`Error`](crate::Error) values; broken internal invariants panic.

use std::collections::HashSet;

use crate::{
    ir::{
        BlockId, FuncId, GlobalId, InstId, InstKind, Instruction, Module, TypeId, Use, User, Value,
    },
    Error, Result,
};

/// Where a new instruction is placed within its block.
///
/// Front-segment instructions (`alloca`, `phi`) always end up in the front
/// segment whatever the position; the position only orders them relative to
/// their peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    /// After the last instruction of its segment.
    Append,
    /// At the beginning of its segment.
    Begin,
    /// Immediately before the block's terminator, or appended if there is none.
    BeforeTerminator,
}

impl Module {
    // Def-use primitives

    pub(crate) fn add_use(&mut self, value: Value, record: Use) {
        self.uses_mut(value).push(record);
    }

    pub(crate) fn remove_use(&mut self, value: Value, record: Use) {
        let uses = self.uses_mut(value);
        match uses.iter().position(|u| *u == record) {
            Some(pos) => {
                uses.swap_remove(pos);
            }
            None => panic!("def-use chain out of sync: {:?} not recorded on {:?}", record, value),
        }
    }

    fn retarget_use(&mut self, value: Value, record: Use, new_index: usize) {
        let uses = self.uses_mut(value);
        match uses.iter_mut().find(|u| **u == record) {
            Some(slot) => slot.index = new_index,
            None => panic!("def-use chain out of sync: {:?} not recorded on {:?}", record, value),
        }
    }

    // Control-flow edges

    fn add_edge(&mut self, from: BlockId, to: BlockId) {
        let source = self.block_mut(from);
        if !source.succs.contains(&to) {
            source.succs.push(to);
        }
        let target = self.block_mut(to);
        if !target.preds.contains(&from) {
            target.preds.push(from);
        }
    }

    fn remove_edge(&mut self, from: BlockId, to: BlockId) {
        self.block_mut(from).succs.retain(|b| *b != to);
        self.block_mut(to).preds.retain(|b| *b != from);
    }

    fn link_branch(&mut self, br: InstId) {
        let block = self.inst(br).parent;
        for target in self.inst(br).branch_targets() {
            self.add_edge(block, target);
        }
    }

    fn unlink_branch(&mut self, br: InstId) {
        let block = self.inst(br).parent;
        for target in self.inst(br).branch_targets() {
            self.remove_edge(block, target);
        }
    }

    // Creation

    /// Slot index a new instruction would occupy, or an error if the block is closed.
    fn placement_index(
        &self,
        block: BlockId,
        front: bool,
        terminator: bool,
        position: InsertPosition,
    ) -> Result<usize> {
        let insts = &self.block(block).insts;
        let front_end = insts
            .iter()
            .position(|i| !self.inst(*i).opcode().is_front_segment())
            .unwrap_or(insts.len());
        let terminated = self.is_terminated(block);

        if front {
            return Ok(match position {
                InsertPosition::Begin => 0,
                InsertPosition::Append | InsertPosition::BeforeTerminator => front_end,
            });
        }
        match position {
            InsertPosition::Begin if !terminator => Ok(front_end),
            InsertPosition::BeforeTerminator if !terminator => Ok(if terminated {
                insts.len() - 1
            } else {
                insts.len()
            }),
            _ if terminated => Err(Error::BlockTerminated(self.block(block).name.clone())),
            _ => Ok(insts.len()),
        }
    }

    /// Creates an instruction in `block`, registering its operand uses and, for
    /// branches, the successor edges. Operands are assumed to be type-checked.
    pub(crate) fn insert_instruction(
        &mut self,
        block: BlockId,
        kind: InstKind,
        ty: TypeId,
        operands: Vec<Value>,
        position: InsertPosition,
    ) -> Result<InstId> {
        let opcode = kind.opcode();
        let index = self.placement_index(
            block,
            opcode.is_front_segment(),
            opcode.is_terminator(),
            position,
        )?;

        let id = InstId(self.insts.len());
        self.insts.push(Some(Instruction {
            kind,
            ty,
            operands: operands.clone(),
            parent: block,
            name: None,
            uses: Vec::new(),
        }));
        for (slot, operand) in operands.into_iter().enumerate() {
            self.add_use(operand, Use::new(User::Inst(id), slot));
        }
        self.block_mut(block).insts.insert(index, id);
        if kind == InstKind::Br {
            self.link_branch(id);
        }
        Ok(id)
    }

    // Operand mutation

    /// Replaces the operand in slot `index` of `inst`.
    pub fn set_operand(&mut self, inst: InstId, index: usize, value: Value) {
        let old = self.inst(inst).operands[index];
        if old == value {
            return;
        }
        let is_br = self.inst(inst).is_br();
        if is_br {
            self.unlink_branch(inst);
        }
        self.remove_use(old, Use::new(User::Inst(inst), index));
        self.inst_mut(inst).operands[index] = value;
        self.add_use(value, Use::new(User::Inst(inst), index));
        if is_br {
            self.link_branch(inst);
        }
    }

    /// Appends an operand slot to `inst`.
    pub fn add_operand(&mut self, inst: InstId, value: Value) {
        let is_br = self.inst(inst).is_br();
        if is_br {
            self.unlink_branch(inst);
        }
        let index = self.inst(inst).operands.len();
        self.inst_mut(inst).operands.push(value);
        self.add_use(value, Use::new(User::Inst(inst), index));
        if is_br {
            self.link_branch(inst);
        }
    }

    /// Removes the operand slot `index` of `inst`; later slots shift down by one.
    pub fn remove_operand(&mut self, inst: InstId, index: usize) {
        let is_br = self.inst(inst).is_br();
        if is_br {
            self.unlink_branch(inst);
        }
        let operands = self.inst(inst).operands.clone();
        self.remove_use(operands[index], Use::new(User::Inst(inst), index));
        for (slot, operand) in operands.iter().enumerate().skip(index + 1) {
            self.retarget_use(*operand, Use::new(User::Inst(inst), slot), slot - 1);
        }
        self.inst_mut(inst).operands.remove(index);
        if is_br {
            self.link_branch(inst);
        }
    }

    /// Drops every operand of `inst`, unlinking successor edges of a branch.
    pub fn remove_all_operands(&mut self, inst: InstId) {
        if self.inst(inst).is_br() {
            self.unlink_branch(inst);
        }
        let operands = std::mem::take(&mut self.inst_mut(inst).operands);
        for (slot, operand) in operands.into_iter().enumerate() {
            self.remove_use(operand, Use::new(User::Inst(inst), slot));
        }
    }

    /// Redirects every instruction use of `from` to `to`.
    ///
    /// Uses held by constants and global initializers are left alone; they can
    /// only refer to constants, which are never replaced.
    pub fn replace_all_uses_with(&mut self, from: Value, to: Value) {
        self.replace_uses_with_if(from, to, |_, _| true);
    }

    /// Redirects the instruction uses of `from` for which `predicate` returns true.
    pub fn replace_uses_with_if<F>(&mut self, from: Value, to: Value, mut predicate: F)
    where
        F: FnMut(&Module, Use) -> bool,
    {
        if from == to {
            return;
        }
        let snapshot: Vec<Use> = self.uses_of(from).to_vec();
        for record in snapshot {
            let Some(user) = record.inst() else { continue };
            if predicate(self, record) {
                self.set_operand(user, record.index, to);
            }
        }
    }

    // Phi and branch helpers

    /// Appends an incoming `(value, block)` pair to a phi.
    pub fn add_phi_incoming(&mut self, phi: InstId, value: Value, block: BlockId) {
        assert!(self.inst(phi).is_phi(), "{} is not a phi", phi);
        self.add_operand(phi, value);
        self.add_operand(phi, Value::Block(block));
    }

    /// Removes every incoming pair of `phi` that arrives from `block`.
    ///
    /// Returns true if at least one pair was removed.
    pub fn remove_phi_incoming(&mut self, phi: InstId, block: BlockId) -> bool {
        assert!(self.inst(phi).is_phi(), "{} is not a phi", phi);
        let mut removed = false;
        let mut pair = 0;
        while 2 * pair + 1 < self.inst(phi).operands.len() {
            if self.inst(phi).operands[2 * pair + 1] == Value::Block(block) {
                self.remove_operand(phi, 2 * pair + 1);
                self.remove_operand(phi, 2 * pair);
                removed = true;
            } else {
                pair += 1;
            }
        }
        removed
    }

    /// Retargets every edge of a branch from `old` to `new`.
    ///
    /// Returns true if the branch referred to `old`.
    pub fn replace_branch_target(&mut self, br: InstId, old: BlockId, new: BlockId) -> bool {
        let slots: Vec<usize> = self
            .inst(br)
            .operands
            .iter()
            .enumerate()
            .filter(|(_, op)| **op == Value::Block(old))
            .map(|(slot, _)| slot)
            .collect();
        for slot in &slots {
            self.set_operand(br, *slot, Value::Block(new));
        }
        !slots.is_empty()
    }

    // Placement

    /// Moves `inst` out of its block and in front of `target`'s terminator.
    ///
    /// Front-segment instructions land at the end of the target's front segment.
    ///
    /// # Panics
    ///
    /// Panics if `inst` is a terminator.
    pub fn move_before_terminator(&mut self, inst: InstId, target: BlockId) {
        let opcode = self.inst(inst).opcode();
        assert!(!opcode.is_terminator(), "cannot move terminator {}", inst);

        let source = self.inst(inst).parent;
        self.block_mut(source).insts.retain(|i| *i != inst);
        let index = match self.placement_index(
            target,
            opcode.is_front_segment(),
            false,
            InsertPosition::BeforeTerminator,
        ) {
            Ok(index) => index,
            Err(_) => unreachable!("non-terminators can always be placed before a terminator"),
        };
        self.block_mut(target).insts.insert(index, inst);
        self.inst_mut(inst).parent = target;
    }

    // Erasure

    /// Erases an instruction that has no remaining uses.
    ///
    /// # Panics
    ///
    /// Panics if the instruction is still used.
    pub fn erase_instruction(&mut self, inst: InstId) {
        assert!(
            self.inst(inst).uses.is_empty(),
            "erasing {} which still has {} uses",
            inst,
            self.inst(inst).uses.len()
        );
        self.remove_all_operands(inst);
        let parent = self.inst(inst).parent;
        self.block_mut(parent).insts.retain(|i| *i != inst);
        self.insts[inst.index()] = None;
    }

    /// Erases a set of instructions that may refer to each other.
    ///
    /// All operands are dropped first, then every instruction must be unused.
    pub fn erase_instructions(&mut self, insts: &[InstId]) {
        let mut seen = HashSet::new();
        let batch: Vec<InstId> = insts.iter().copied().filter(|i| seen.insert(*i)).collect();
        for inst in &batch {
            self.remove_all_operands(*inst);
        }
        for inst in batch {
            self.erase_instruction(inst);
        }
    }

    /// Removes a set of blocks together with their instructions.
    ///
    /// Edges between removed blocks are dropped first. Afterwards no remaining
    /// block may branch into a removed one, and no phi may name one.
    ///
    /// # Panics
    ///
    /// Panics if a removed block or instruction is still referenced.
    pub fn remove_blocks(&mut self, blocks: &[BlockId]) {
        let doomed: HashSet<BlockId> = blocks.iter().copied().collect();
        let insts: Vec<InstId> = blocks
            .iter()
            .flat_map(|bb| self.block(*bb).insts.clone())
            .collect();
        self.erase_instructions(&insts);

        for block in &doomed {
            let data = self.block(*block);
            assert!(
                data.preds.is_empty() && data.uses.is_empty(),
                "removing block {} which is still referenced",
                data.name
            );
            let func = data.parent;
            self.function_mut(func).blocks.retain(|b| b != block);
            self.blocks[block.index()] = None;
        }
    }

    /// Removes a function and its body.
    ///
    /// # Panics
    ///
    /// Panics if the function is still called.
    pub fn remove_function(&mut self, func: FuncId) {
        assert!(
            self.function(func).uses.is_empty(),
            "removing function {} which is still called",
            self.function(func).name
        );
        let blocks = self.function(func).blocks.clone();
        self.remove_blocks(&blocks);
        for arg in self.function(func).args.clone() {
            self.args[arg.index()] = None;
        }
        self.function_order.retain(|f| *f != func);
        self.functions[func.index()] = None;
    }

    /// Removes a global variable.
    ///
    /// # Panics
    ///
    /// Panics if the global is still referenced.
    pub fn remove_global(&mut self, global: GlobalId) {
        assert!(
            self.global(global).uses.is_empty(),
            "removing global {} which is still referenced",
            self.global(global).name
        );
        if let Some(init) = self.global(global).init {
            self.remove_use(Value::Const(init), Use::new(User::Global(global), 0));
        }
        self.global_order.retain(|g| *g != global);
        self.globals[global.index()] = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Builder;

    fn counting_module() -> (Module, FuncId, [BlockId; 3]) {
        let mut module = Module::new();
        let i32_ty = module.int32_type();
        let fn_ty = module.function_type(i32_ty, vec![i32_ty]);
        let f = module.add_function("f", fn_ty).unwrap();
        let entry = module.add_block(f, "entry");
        let left = module.add_block(f, "left");
        let right = module.add_block(f, "right");
        (module, f, [entry, left, right])
    }

    #[test]
    fn test_branch_edges_follow_operands() {
        let (mut module, _, [entry, left, right]) = counting_module();
        let br = Builder::at_end(&mut module, entry).br(left).unwrap();
        assert_eq!(module.block(entry).successors(), &[left]);
        assert_eq!(module.block(left).predecessors(), &[entry]);

        assert!(module.replace_branch_target(br, left, right));
        assert_eq!(module.block(entry).successors(), &[right]);
        assert!(module.block(left).predecessors().is_empty());
        assert_eq!(module.block(right).predecessors(), &[entry]);
        assert!(module.block(left).uses().is_empty());
    }

    #[test]
    fn test_remove_operand_shifts_uses() {
        let (mut module, f, [entry, left, right]) = counting_module();
        let arg = module.function_arg(f, 0).unwrap();
        let i32_ty = module.int32_type();
        let one = module.const_int(1);
        let phi = Builder::at_end(&mut module, entry)
            .phi(i32_ty, &[(arg.into(), left), (one.into(), right)])
            .unwrap();

        module.remove_operand(phi, 0);
        module.remove_operand(phi, 0);
        assert!(module.arg(arg).uses().is_empty());
        assert_eq!(module.uses_of(Value::Const(one)), &[Use::new(User::Inst(phi), 0)]);
        assert_eq!(module.block(right).uses(), &[Use::new(User::Inst(phi), 1)]);
    }

    #[test]
    fn test_phi_incoming_helpers() {
        let (mut module, f, [entry, left, right]) = counting_module();
        let arg = module.function_arg(f, 0).unwrap();
        let i32_ty = module.int32_type();
        let phi = Builder::at_end(&mut module, entry).phi(i32_ty, &[]).unwrap();
        module.add_phi_incoming(phi, arg.into(), left);
        module.add_phi_incoming(phi, arg.into(), right);

        assert_eq!(module.arg(arg).uses().len(), 2);
        assert!(module.remove_phi_incoming(phi, left));
        assert!(!module.remove_phi_incoming(phi, left));
        assert_eq!(module.inst(phi).phi_incoming(), vec![(Value::Arg(arg), right)]);
        assert_eq!(module.arg(arg).uses(), &[Use::new(User::Inst(phi), 0)]);
    }

    #[test]
    fn test_replace_all_uses() {
        let (mut module, f, [entry, ..]) = counting_module();
        let arg = module.function_arg(f, 0).unwrap();
        let two = module.const_int(2);
        let mut builder = Builder::at_end(&mut module, entry);
        let sum = builder.add(arg, arg).unwrap();
        let product = builder.mul(sum, sum).unwrap();
        builder.ret(Some(product.into())).unwrap();

        module.replace_all_uses_with(sum.into(), two.into());
        assert!(module.inst(sum).uses().is_empty());
        assert_eq!(module.inst(product).operands(), &[Value::Const(two), Value::Const(two)]);

        module.replace_uses_with_if(two.into(), arg.into(), |_, u| u.index == 1);
        assert_eq!(module.inst(product).operands(), &[Value::Const(two), Value::Arg(arg)]);
    }

    #[test]
    fn test_erase_instructions_batch() {
        let (mut module, f, [entry, ..]) = counting_module();
        let arg = module.function_arg(f, 0).unwrap();
        let mut builder = Builder::at_end(&mut module, entry);
        let a = builder.add(arg, arg).unwrap();
        let b = builder.add(a, a).unwrap();
        builder.ret(Some(arg.into())).unwrap();

        module.erase_instructions(&[a, b]);
        assert!(!module.contains_inst(a));
        assert!(!module.contains_inst(b));
        assert_eq!(module.block(entry).len(), 1);
        assert_eq!(module.arg(arg).uses().len(), 1);
    }

    #[test]
    #[should_panic(expected = "still has")]
    fn test_erase_used_instruction_panics() {
        let (mut module, f, [entry, ..]) = counting_module();
        let arg = module.function_arg(f, 0).unwrap();
        let mut builder = Builder::at_end(&mut module, entry);
        let a = builder.add(arg, arg).unwrap();
        builder.ret(Some(a.into())).unwrap();
        module.erase_instruction(a);
    }

    #[test]
    fn test_front_segment_placement() {
        let (mut module, f, [entry, ..]) = counting_module();
        let arg = module.function_arg(f, 0).unwrap();
        let i32_ty = module.int32_type();
        let mut builder = Builder::at_end(&mut module, entry);
        let sum = builder.add(arg, arg).unwrap();
        let slot = builder.alloca(i32_ty).unwrap();
        builder.ret(Some(sum.into())).unwrap();
        assert_eq!(module.block(entry).instructions()[0], slot);

        // Appending after the terminator is rejected; inserting before it is not
        let mut builder = Builder::at_end(&mut module, entry);
        assert!(matches!(builder.add(arg, arg), Err(Error::BlockTerminated(_))));
        let late = Builder::new(&mut module, entry, InsertPosition::BeforeTerminator)
            .add(arg, arg)
            .unwrap();
        let insts = module.block(entry).instructions();
        assert_eq!(insts[insts.len() - 2], late);
        // A rejected insertion leaves no trace
        assert_eq!(module.arg(arg).uses().len(), 4);
    }

    #[test]
    fn test_move_before_terminator() {
        let (mut module, f, [entry, left, _]) = counting_module();
        let arg = module.function_arg(f, 0).unwrap();
        Builder::at_end(&mut module, entry).br(left).unwrap();
        let mut builder = Builder::at_end(&mut module, left);
        let sum = builder.add(arg, arg).unwrap();
        builder.ret(Some(sum.into())).unwrap();

        module.move_before_terminator(sum, entry);
        assert_eq!(module.inst(sum).parent(), entry);
        assert_eq!(module.block(entry).instructions()[0], sum);
        assert_eq!(module.block(left).len(), 1);
    }

    #[test]
    fn test_remove_blocks_and_function() {
        let (mut module, f, [entry, left, right]) = counting_module();
        let arg = module.function_arg(f, 0).unwrap();
        Builder::at_end(&mut module, entry).ret(Some(arg.into())).unwrap();
        Builder::at_end(&mut module, left).br(right).unwrap();
        Builder::at_end(&mut module, right).br(left).unwrap();

        module.remove_blocks(&[left, right]);
        assert_eq!(module.function(f).blocks(), &[entry]);
        assert!(!module.contains_block(left));

        module.remove_function(f);
        assert_eq!(module.functions().count(), 0);
    }

    #[test]
    fn test_remove_global_releases_initializer() {
        let mut module = Module::new();
        let i32_ty = module.int32_type();
        let seven = module.const_int(7);
        let g = module.add_global("g", i32_ty, false, Some(seven)).unwrap();
        module.remove_global(g);
        assert!(module.uses_of(Value::Const(seven)).is_empty());
        assert_eq!(module.globals().count(), 0);
    }
}

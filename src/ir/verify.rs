//! Structural validation.
//!
//! The verifier is a test and debugging aid; passes never call it on the hot
//! path. It checks the block-level invariants every pass must preserve and,
//! separately, that def-use records mirror operand lists exactly.

use std::collections::HashMap;

use crate::{
    ir::{FuncId, Module, Use, User, Value},
    Result,
};

/// Checks the structural invariants of one function.
///
/// - every block names the function as its parent
/// - no block is empty, and each ends in exactly one terminator
/// - the front segment holds only `alloca` and `phi`
/// - every instruction names its block as parent
/// - successor lists equal the branch targets, predecessor lists mirror them,
///   and all edges stay within the function
/// - blocks ending in `ret` have no successors
///
/// Declarations trivially pass.
///
/// # Errors
///
/// Returns [`Error::Malformed`](crate::Error::Malformed) describing the first violation found.
pub fn verify_function(module: &Module, func: FuncId) -> Result<()> {
    let function = module.function(func);
    for &bb in function.blocks() {
        let block = module.block(bb);
        let name = &block.name;
        if block.parent != func {
            return Err(malformed_error!(
                "block {} in {} claims another parent",
                name,
                function.name()
            ));
        }
        let Some(&last) = block.insts.last() else {
            return Err(malformed_error!("block {} in {} is empty", name, function.name()));
        };

        let mut in_front = true;
        for (position, &inst) in block.insts.iter().enumerate() {
            let Some(data) = module.try_inst(inst) else {
                return Err(malformed_error!("block {} holds erased {}", name, inst));
            };
            if data.parent != bb {
                return Err(malformed_error!("{} in block {} claims another parent", inst, name));
            }
            let front = data.opcode().is_front_segment();
            if front && !in_front {
                return Err(malformed_error!(
                    "{} {} follows the front segment of block {}",
                    data.opcode(),
                    inst,
                    name
                ));
            }
            in_front &= front;
            if data.is_terminator() && position + 1 != block.insts.len() {
                return Err(malformed_error!("terminator {} is not last in block {}", inst, name));
            }
        }

        let terminator = module.inst(last);
        if !terminator.is_terminator() {
            return Err(malformed_error!("block {} has no terminator", name));
        }

        let mut targets = terminator.branch_targets();
        targets.dedup();
        let mut targets_sorted = targets.clone();
        targets_sorted.sort();
        targets_sorted.dedup();
        let mut succs = block.succs.clone();
        succs.sort();
        if succs != targets_sorted || succs.len() != block.succs.len() {
            return Err(malformed_error!(
                "successors of block {} do not match its branch targets",
                name
            ));
        }
        if terminator.is_ret() && !block.succs.is_empty() {
            return Err(malformed_error!("ret block {} has successors", name));
        }

        for &succ in &block.succs {
            if !module.contains_block(succ) || module.block(succ).parent != func {
                return Err(malformed_error!("block {} branches out of {}", name, function.name()));
            }
            if !module.block(succ).preds.contains(&bb) {
                return Err(malformed_error!(
                    "block {} is missing predecessor {}",
                    module.block(succ).name,
                    name
                ));
            }
        }
        for &pred in &block.preds {
            if !module.contains_block(pred) || !module.block(pred).succs.contains(&bb) {
                return Err(malformed_error!(
                    "block {} lists a predecessor that does not branch to it",
                    name
                ));
            }
        }
    }
    Ok(())
}

/// Runs [`verify_function`] on every function of the module.
///
/// # Errors
///
/// Returns the first violation found.
pub fn verify_module(module: &Module) -> Result<()> {
    for func in module.functions() {
        verify_function(module, func)?;
    }
    Ok(())
}

/// Checks that every operand slot has exactly one matching use record and
/// every use record points back at an operand slot holding its value.
///
/// # Errors
///
/// Returns [`Error::Malformed`](crate::Error::Malformed) on the first mismatch.
pub fn verify_uses(module: &Module) -> Result<()> {
    let mut expected: HashMap<(Value, Use), usize> = HashMap::new();
    let mut users = Vec::new();
    for func in module.functions() {
        for inst in module.function_instructions(func) {
            users.push(User::Inst(inst));
        }
    }
    users.extend(module.globals().map(User::Global));
    users.extend((0..module.constants.len()).map(|c| User::Const(c.into())));

    let mut values = Vec::new();
    for user in users {
        for (index, operand) in module.user_operands(user).into_iter().enumerate() {
            *expected.entry((operand, Use::new(user, index))).or_insert(0) += 1;
            values.push(operand);
        }
    }
    for (&(value, record), &count) in &expected {
        let recorded = module.uses_of(value).iter().filter(|u| **u == record).count();
        if recorded != count {
            return Err(malformed_error!(
                "{} is used by {:?} slot {} but {} records exist",
                module.value_name(value),
                record.user,
                record.index,
                recorded
            ));
        }
    }

    values.sort();
    values.dedup();
    for value in values {
        for record in module.uses_of(value) {
            if !expected.contains_key(&(value, *record)) {
                return Err(malformed_error!(
                    "{} records a stale use by {:?} slot {}",
                    module.value_name(value),
                    record.user,
                    record.index
                ));
            }
        }
    }
    Ok(())
}

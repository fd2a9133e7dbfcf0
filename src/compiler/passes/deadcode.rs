//! Mark-sweep dead code elimination.
//!
//! Nothing is assumed to be needed until proven otherwise:
//!
//! 1. **Prune**: blocks not reachable from the entry are removed, together
//!    with the phi incoming pairs that named them.
//! 2. **Mark**: branches, returns, stores and calls to functions with side
//!    effects are critical; every instruction defining an operand of a marked
//!    instruction is marked as well.
//! 3. **Sweep**: every unmarked instruction is erased.
//!
//! The three steps repeat over all defined functions until a round changes
//! nothing. A final global sweep removes functions nobody calls (except the
//! entry point) and globals nobody references.
//!
//! Calls to pure functions are ordinary instructions here: when their result
//! is unused they disappear like any other dead computation.

use std::collections::HashSet;

use crate::{
    analysis::{FuncInfo, FunctionCfg},
    compiler::{EventKind, EventLog, Pass, PipelineConfig},
    ir::{BlockId, FuncId, InstId, Module, Value},
    utils::graph::{algorithms::bfs, RootedGraph},
    Result,
};

/// Dead code elimination pass.
#[derive(Debug, Clone)]
pub struct DeadCodePass {
    remove_unreachable_blocks: bool,
    max_iterations: usize,
    entry_point: String,
}

impl Default for DeadCodePass {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl DeadCodePass {
    /// Creates a dead code pass configured from `config`.
    #[must_use]
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            remove_unreachable_blocks: config.remove_unreachable_blocks,
            max_iterations: config.max_iterations,
            entry_point: config.entry_point.clone(),
        }
    }

    /// Removes the blocks of `func` that the entry cannot reach.
    fn prune_unreachable(&self, module: &mut Module, func: FuncId, events: &EventLog) -> bool {
        let Ok(cfg) = FunctionCfg::from_function(module, func) else {
            return false;
        };
        let reachable: HashSet<BlockId> = bfs(&cfg, cfg.entry()).map(|n| cfg.block(n)).collect();

        let dead: Vec<BlockId> = module
            .function(func)
            .blocks()
            .iter()
            .copied()
            .filter(|bb| !reachable.contains(bb))
            .collect();
        if dead.is_empty() {
            return false;
        }

        let func_name = module.function(func).name().to_string();
        for block in &dead {
            for succ in module.block(*block).successors().to_vec() {
                if !reachable.contains(&succ) {
                    continue;
                }
                let phis: Vec<InstId> = module
                    .block(succ)
                    .instructions()
                    .iter()
                    .copied()
                    .take_while(|i| module.inst(*i).is_phi())
                    .collect();
                for phi in phis {
                    if module.remove_phi_incoming(phi, *block) {
                        events
                            .record(EventKind::PhiIncomingPruned)
                            .function(func_name.as_str())
                            .block(module.block(succ).name())
                            .pass("dce")
                            .message(format!(
                                "{} lost incoming from {}",
                                module.value_name(Value::Inst(phi)),
                                module.block(*block).name()
                            ));
                    }
                }
            }
        }

        for block in &dead {
            log::debug!(
                "{}: removing unreachable block {}",
                func_name,
                module.block(*block).name()
            );
            events
                .record(EventKind::BlockRemoved)
                .function(func_name.as_str())
                .block(module.block(*block).name())
                .pass("dce");
        }
        module.remove_blocks(&dead);
        true
    }

    /// Erases every instruction of `func` that no critical instruction depends on.
    fn sweep_function(
        &self,
        module: &mut Module,
        func: FuncId,
        info: &FuncInfo,
        events: &EventLog,
    ) -> bool {
        let insts = module.function_instructions(func);

        let mut marked: HashSet<InstId> = HashSet::new();
        let mut worklist: Vec<InstId> = Vec::new();
        for inst in &insts {
            let data = module.inst(*inst);
            let critical = data.is_br()
                || data.is_ret()
                || data.is_store()
                || (data.is_call() && !data.callee().is_some_and(|f| info.is_pure(f)));
            if critical && marked.insert(*inst) {
                worklist.push(*inst);
            }
        }

        while let Some(inst) = worklist.pop() {
            for operand in module.inst(inst).operands() {
                if let Value::Inst(def) = operand {
                    if marked.insert(*def) {
                        worklist.push(*def);
                    }
                }
            }
        }

        let dead: Vec<InstId> = insts.into_iter().filter(|i| !marked.contains(i)).collect();
        if dead.is_empty() {
            return false;
        }

        let func_name = module.function(func).name();
        for inst in &dead {
            events
                .record(EventKind::InstructionRemoved)
                .function(func_name)
                .block(module.block(module.inst(*inst).parent()).name())
                .pass("dce")
                .message(format!(
                    "{} ({})",
                    module.value_name(Value::Inst(*inst)),
                    module.inst(*inst).opcode()
                ));
        }
        log::debug!("{}: erasing {} dead instructions", func_name, dead.len());
        module.erase_instructions(&dead);
        true
    }

    /// Removes unreferenced functions and globals until none is left.
    fn sweep_globals(&self, module: &mut Module, events: &EventLog) -> bool {
        let mut changed = false;
        loop {
            let mut removed = false;

            let functions: Vec<FuncId> = module.functions().collect();
            for func in functions {
                let data = module.function(func);
                if data.name() == self.entry_point || !data.uses().is_empty() {
                    continue;
                }
                let name = data.name().to_string();
                log::debug!("removing unused function {}", name);
                module.remove_function(func);
                events
                    .record(EventKind::FunctionRemoved)
                    .function(name)
                    .pass("dce");
                removed = true;
            }

            let globals: Vec<_> = module.globals().collect();
            for global in globals {
                if !module.global(global).uses().is_empty() {
                    continue;
                }
                let name = module.global(global).name().to_string();
                log::debug!("removing unused global {}", name);
                module.remove_global(global);
                events
                    .record(EventKind::GlobalRemoved)
                    .pass("dce")
                    .message(format!("@{}", name));
                removed = true;
            }

            if !removed {
                return changed;
            }
            changed = true;
        }
    }
}

impl Pass for DeadCodePass {
    fn name(&self) -> &'static str {
        "dce"
    }

    fn description(&self) -> &'static str {
        "Removes unreachable blocks, unused instructions, functions and globals"
    }

    fn run(&mut self, module: &mut Module, events: &EventLog) -> Result<bool> {
        let mut changed = false;
        let mut rounds = 0;
        let mut info = FuncInfo::compute(module);

        loop {
            if rounds == self.max_iterations {
                log::warn!("dce: no fixpoint after {} rounds", rounds);
                events.warn(format!("dce stopped after {} rounds", rounds));
                break;
            }
            rounds += 1;

            let mut round_changed = false;
            let functions: Vec<FuncId> = module.defined_functions().collect();
            for func in functions {
                if self.remove_unreachable_blocks {
                    round_changed |= self.prune_unreachable(module, func, events);
                }
                round_changed |= self.sweep_function(module, func, &info, events);
            }

            if !round_changed {
                break;
            }
            changed = true;
            info = FuncInfo::compute(module);
        }

        for func in info.pure_functions(module) {
            events
                .record(EventKind::PureFunctionIdentified)
                .function(module.function(func).name())
                .pass("dce");
        }

        changed |= self.sweep_globals(module, events);
        Ok(changed)
    }
}

//! Analysis passes.
//!
//! These run an analysis over every defined function and report what they
//! found. They never change the module; consumers recompute the analyses they
//! need, so running these is only useful for diagnostics.

use crate::{
    analysis::{Dominators, LoopForest},
    compiler::{EventKind, EventLog, Pass},
    ir::Module,
    Result,
};

/// Computes dominator trees and reports unreachable blocks.
#[derive(Debug, Default)]
pub struct DominatorsPass;

impl DominatorsPass {
    /// Creates a new dominators pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for DominatorsPass {
    fn name(&self) -> &'static str {
        "dominators"
    }

    fn description(&self) -> &'static str {
        "Computes dominator trees and dominance frontiers"
    }

    fn run(&mut self, module: &mut Module, events: &EventLog) -> Result<bool> {
        let functions: Vec<_> = module.defined_functions().collect();
        for func in functions {
            let dom = Dominators::compute(module, func)?;
            let unreachable = dom.unreachable_blocks();
            if !unreachable.is_empty() {
                let name = module.function(func).name().to_string();
                let blocks: Vec<&str> = unreachable
                    .iter()
                    .map(|bb| module.block(*bb).name())
                    .collect();
                log::debug!("{}: unreachable blocks {}", name, blocks.join(", "));
                events
                    .record(EventKind::Info)
                    .function(name)
                    .pass(self.name())
                    .message(format!("{} unreachable blocks", unreachable.len()));
            }
        }
        Ok(false)
    }
}

/// Detects natural loops and reports the loop forest of each function.
#[derive(Debug, Default)]
pub struct LoopDetectionPass;

impl LoopDetectionPass {
    /// Creates a new loop detection pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Pass for LoopDetectionPass {
    fn name(&self) -> &'static str {
        "loops"
    }

    fn description(&self) -> &'static str {
        "Detects natural loops and their nesting"
    }

    fn run(&mut self, module: &mut Module, events: &EventLog) -> Result<bool> {
        let functions: Vec<_> = module.defined_functions().collect();
        for func in functions {
            let forest = LoopForest::compute(module, func)?;
            if forest.is_empty() {
                continue;
            }
            let max_depth = forest.iter().map(|(_, l)| l.depth()).max().unwrap_or(0);
            events
                .record(EventKind::Info)
                .function(module.function(func).name())
                .pass(self.name())
                .message(format!(
                    "{} loops, {} top-level, nesting depth {}",
                    forest.len(),
                    forest.top_level().len(),
                    max_depth
                ));
        }
        Ok(false)
    }
}

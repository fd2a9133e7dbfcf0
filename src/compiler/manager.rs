//! Sequential pass pipeline.
//!
//! The `PassManager` owns an ordered list of passes and runs each of them once
//! over the module. Every pass is bracketed by `PassStarted`/`PassCompleted`
//! events; the first failing pass aborts the pipeline.

use crate::{
    compiler::{
        DeadCodePass, DominatorsPass, EventKind, EventLog, LicmPass, LoopDetectionPass,
        Mem2RegPass, Pass, PipelineConfig, PipelineStats,
    },
    ir::{verify_module, Module},
    Error, Result,
};

/// Runs passes over a module in insertion order.
///
/// # Example
///
/// ```rust
/// use midend::compiler::{PassManager, PipelineConfig};
/// use midend::ir::{Builder, Module};
///
/// let mut module = Module::new();
/// let void = module.void_type();
/// let fn_ty = module.function_type(void, vec![]);
/// let main = module.add_function("main", fn_ty)?;
/// let entry = module.add_block(main, "entry");
/// Builder::at_end(&mut module, entry).ret(None)?;
///
/// let mut manager = PassManager::standard(&PipelineConfig::default());
/// assert_eq!(manager.pass_names(), ["dominators", "loops", "mem2reg", "dce", "licm", "dce"]);
/// manager.run(&mut module)?;
/// assert_eq!(manager.stats().passes_run, 6);
/// # Ok::<(), midend::Error>(())
/// ```
pub struct PassManager {
    config: PipelineConfig,
    passes: Vec<Box<dyn Pass>>,
    events: EventLog,
}

impl Default for PassManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PassManager {
    /// Creates an empty pipeline with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(PipelineConfig::default())
    }

    /// Creates an empty pipeline with the given configuration.
    #[must_use]
    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            config,
            passes: Vec::new(),
            events: EventLog::new(),
        }
    }

    /// Creates the standard pipeline.
    ///
    /// Dominators, loop detection, SSA construction and dead code elimination,
    /// followed by loop-invariant code motion and a second dead code
    /// elimination when `config.enable_licm` is set.
    #[must_use]
    pub fn standard(config: &PipelineConfig) -> Self {
        let mut manager = Self::with_config(config.clone());
        manager.add_pass(DominatorsPass::new());
        manager.add_pass(LoopDetectionPass::new());
        manager.add_pass(Mem2RegPass::new());
        manager.add_pass(DeadCodePass::new(config));
        if config.enable_licm {
            manager.add_pass(LicmPass::new(config));
            manager.add_pass(DeadCodePass::new(config));
        }
        manager
    }

    /// Appends a pass to the pipeline.
    pub fn add_pass<P: Pass + 'static>(&mut self, pass: P) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Names of the registered passes, in execution order.
    #[must_use]
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Returns the number of registered passes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Returns true if no pass is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Events recorded by all runs of this manager so far.
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Counters derived from [`events`](Self::events).
    #[must_use]
    pub fn stats(&self) -> PipelineStats {
        PipelineStats::from_log(&self.events)
    }

    /// Runs every pass once, in order.
    ///
    /// Returns `true` if any pass changed the module.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PassFailed`] naming the first pass that failed, or the
    /// verifier's error when `verify_after_each_pass` is set and a pass left
    /// the module malformed.
    pub fn run(&mut self, module: &mut Module) -> Result<bool> {
        let mut any_changed = false;

        for pass in &mut self.passes {
            let name = pass.name();
            log::debug!("running pass {}: {}", name, pass.description());
            self.events.record(EventKind::PassStarted).pass(name);

            let changed = match pass.run(module, &self.events) {
                Ok(changed) => changed,
                Err(error) => {
                    log::warn!("pass {} failed: {}", name, error);
                    return Err(Error::PassFailed {
                        pass: name,
                        message: error.to_string(),
                    });
                }
            };

            if self.config.verify_after_each_pass {
                verify_module(module)?;
            }

            self.events
                .record(EventKind::PassCompleted)
                .pass(name)
                .message(if changed { "changed" } else { "unchanged" });
            log::debug!(
                "pass {} finished ({})",
                name,
                if changed { "changed" } else { "unchanged" }
            );
            any_changed |= changed;
        }

        log::info!("pipeline finished: {}", self.stats());
        Ok(any_changed)
    }
}

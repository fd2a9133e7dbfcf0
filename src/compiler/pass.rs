//! The interface every pipeline stage implements.

use crate::{compiler::EventLog, ir::Module, Result};

/// A pass that operates on a whole module.
///
/// Passes receive exclusive access to the module for the duration of
/// [`run`](Pass::run) and record what they changed in the shared event log.
/// Analyses needed by a pass are computed inside `run`; nothing survives from
/// one pass to the next except the module itself.
///
/// # Example
///
/// ```rust
/// use midend::compiler::{EventLog, Pass};
/// use midend::ir::Module;
///
/// struct CountFunctions;
///
/// impl Pass for CountFunctions {
///     fn name(&self) -> &'static str {
///         "count-functions"
///     }
///
///     fn run(&mut self, module: &mut Module, events: &EventLog) -> midend::Result<bool> {
///         events.info(format!("{} functions", module.functions().count()));
///         Ok(false)
///     }
/// }
/// ```
pub trait Pass {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Runs the pass.
    ///
    /// Returns `true` if the module was changed, `false` otherwise. Changes
    /// should be recorded in `events`.
    ///
    /// # Errors
    ///
    /// Returns an error if a precondition of the pass does not hold for the
    /// module, for example a function with unreachable blocks handed to SSA
    /// construction.
    fn run(&mut self, module: &mut Module, events: &EventLog) -> Result<bool>;
}

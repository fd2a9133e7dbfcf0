//! Configuration for the pass pipeline.

/// Configuration for [`PassManager`](crate::compiler::PassManager) and the
/// standard passes.
///
/// # Example
///
/// ```rust
/// use midend::compiler::PipelineConfig;
///
/// let config = PipelineConfig {
///     enable_licm: false,
///     ..PipelineConfig::default()
/// };
/// assert!(config.remove_unreachable_blocks);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Let dead code elimination delete blocks unreachable from the entry (default: true).
    pub remove_unreachable_blocks: bool,

    /// Include loop-invariant code motion and a second dead code
    /// elimination in the standard pipeline (default: true).
    pub enable_licm: bool,

    /// Maximum rounds of any fixpoint loop inside a pass (default: 100).
    ///
    /// Reaching the limit is reported as a warning event.
    pub max_iterations: usize,

    /// Run the structural verifier after every pass (default: false).
    pub verify_after_each_pass: bool,

    /// Function kept by the global sweep even if nothing calls it (default: `main`).
    pub entry_point: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            remove_unreachable_blocks: true,
            enable_licm: true,
            max_iterations: 100,
            verify_after_each_pass: false,
            entry_point: "main".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration that verifies the module after every pass.
    ///
    /// Intended for tests and for debugging new passes.
    #[must_use]
    pub fn checked() -> Self {
        Self {
            verify_after_each_pass: true,
            ..Self::default()
        }
    }

    /// Creates a configuration that only builds SSA form and removes dead code.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            enable_licm: false,
            ..Self::default()
        }
    }

    /// Sets the entry point name.
    #[must_use]
    pub fn with_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = name.into();
        self
    }
}

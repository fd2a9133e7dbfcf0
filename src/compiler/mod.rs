//! Transformation passes and the infrastructure that runs them.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         Pass Pipeline                            │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  PipelineConfig              Knobs shared by the manager and     │
//! │                              the standard passes                 │
//! │                                                                  │
//! │  PassManager                 Sequential execution                │
//! │    ├─ dominators              (analysis, reports only)           │
//! │    ├─ loops                   (analysis, reports only)           │
//! │    ├─ mem2reg                 SSA construction                   │
//! │    ├─ dce                     Mark-sweep dead code elimination   │
//! │    ├─ licm                    Loop-invariant code motion         │
//! │    └─ dce                     Cleanup after hoisting             │
//! │    Each pass: PassStarted → run → (verify) → PassCompleted       │
//! │                                                                  │
//! │  Pass trait                  Interface for all passes            │
//! │    └─ run(&mut Module, &EventLog) -> Result<bool>                │
//! │                                                                  │
//! │  EventLog                    Change tracking and diagnostics     │
//! │  PipelineStats               Counters derived from the log       │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Passes share nothing but the module and the event log. Every analysis a
//! pass consults is computed inside its `run`, after the previous pass has
//! finished mutating the IR.

mod config;
mod events;
mod manager;
mod pass;
mod passes;

pub use config::PipelineConfig;
pub use events::{Event, EventBuilder, EventKind, EventLog, EventLogIter, PipelineStats};
pub use manager::PassManager;
pub use pass::Pass;
pub use passes::{DeadCodePass, DominatorsPass, LicmPass, LoopDetectionPass, Mem2RegPass};

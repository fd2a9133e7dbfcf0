//! Read-only analyses over the IR.
//!
//! # Architecture
//!
//! ```text
//! Module ──► FunctionCfg ──► Dominators ──► LoopForest
//!    │            (utils::graph::algorithms)
//!    └─────► FuncInfo (whole module, interprocedural)
//! ```
//!
//! - [`FunctionCfg`] - Dense snapshot of one function's block graph, implementing
//!   the [`crate::utils::graph`] traits
//! - [`Dominators`] - Dominator tree, frontiers and O(1) dominance queries
//! - [`LoopForest`] - Natural loops, latches and nesting
//! - [`FuncInfo`] - Per-function load/store locations, library use and purity
//!
//! Every analysis is a snapshot of the IR at the time it was computed. Passes
//! recompute what they need after mutating the module; nothing is cached
//! across edits.

mod cfg;
mod dominators;
mod funcinfo;
mod loops;

pub use cfg::FunctionCfg;
pub use dominators::Dominators;
pub use funcinfo::{FuncInfo, FunctionEffects};
pub use loops::{Loop, LoopForest, LoopId};

//! Graph abstractions for control-flow analysis.
//!
//! The analyses never walk IR blocks directly. Instead a function's control-flow
//! graph is exposed through a small set of traits, and the algorithms in
//! [`algorithms`] are written against those traits only:
//!
//! - [`GraphBase`] - Node count and node enumeration
//! - [`Successors`] / [`Predecessors`] - Edge traversal in either direction
//! - [`RootedGraph`] - A designated entry node
//!
//! Nodes are dense [`NodeId`] indices so that per-node results can be stored in
//! plain vectors.
//!
//! # Examples
//!
//! ```rust
//! use midend::analysis::FunctionCfg;
//! use midend::ir::{Builder, Module};
//! use midend::utils::graph::{algorithms, RootedGraph};
//!
//! let mut module = Module::new();
//! let void = module.void_type();
//! let fn_ty = module.function_type(void, vec![]);
//! let f = module.add_function("f", fn_ty)?;
//! let entry = module.add_block(f, "entry");
//! let exit = module.add_block(f, "exit");
//! Builder::at_end(&mut module, entry).br(exit)?;
//! Builder::at_end(&mut module, exit).ret(None)?;
//!
//! let cfg = FunctionCfg::from_function(&module, f)?;
//! let order = algorithms::reverse_postorder(&cfg, cfg.entry());
//! assert_eq!(order.len(), 2);
//! # Ok::<(), midend::Error>(())
//! ```

pub mod algorithms;
mod node;
mod traits;

pub use node::NodeId;
pub use traits::{GraphBase, Predecessors, RootedGraph, Successors};

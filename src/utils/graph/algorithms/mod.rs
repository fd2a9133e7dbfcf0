//! Graph algorithms for control-flow analysis.
//!
//! # Available Algorithms
//!
//! ## Traversal
//!
//! - [`bfs`] - Breadth-first search traversal
//! - [`postorder`] - Postorder traversal
//! - [`reverse_postorder`] - Reverse postorder traversal (forward data flow order)
//!
//! ## Dominator Analysis
//!
//! - [`compute_dominators`] - Iterative dominator tree with interval numbering
//! - [`compute_dominance_frontiers`] - Dominance frontiers for phi placement
//! - [`DominatorTree`] - Result of dominator computation
//!
//! | Algorithm | Time Complexity | Use Case |
//! |-----------|-----------------|----------|
//! | BFS | O(V + E) | Reachability |
//! | Dominators | O(V + E) per round | SSA construction, loop analysis |
//! | Frontiers | O(V + E + size of result) | Phi placement |

mod dominators;
mod traversal;

pub use dominators::{
    compute_dominance_frontiers, compute_dominators, DominatorIterator, DominatorTree,
};
pub use traversal::{bfs, postorder, reverse_postorder, BfsIterator};

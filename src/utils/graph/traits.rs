//! Trait definitions for graph abstractions.
//!
//! The hierarchy is deliberately small. Algorithms ask only for the
//! capabilities they use: traversals need [`Successors`], dominator
//! computation needs a [`RootedGraph`].

use crate::utils::graph::NodeId;

/// Core graph properties: how many nodes there are and what their ids are.
pub trait GraphBase {
    /// Returns the number of nodes. Node ids are `0..node_count()`.
    fn node_count(&self) -> usize;

    /// Returns an iterator over all node ids in ascending order.
    fn node_ids(&self) -> impl Iterator<Item = NodeId>;
}

/// Forward edge traversal.
pub trait Successors: GraphBase {
    /// Returns the targets of the edges leaving `node`.
    ///
    /// # Panics
    ///
    /// May panic if `node` is not a node of the graph.
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// Backward edge traversal.
pub trait Predecessors: GraphBase {
    /// Returns the sources of the edges entering `node`.
    ///
    /// # Panics
    ///
    /// May panic if `node` is not a node of the graph.
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId>;
}

/// A graph with a single designated entry node.
///
/// For a control-flow graph the entry is the function's first block. Nodes not
/// reachable from the entry are still part of the graph; algorithms that care
/// about reachability (dominators) exclude them explicitly.
pub trait RootedGraph: Successors + Predecessors {
    /// Returns the entry node.
    fn entry(&self) -> NodeId;
}

//! Control-flow graph view of a function.
//!
//! [`FunctionCfg`] snapshots the block structure of one function into dense
//! [`NodeId`] indices so the generic algorithms in
//! [`crate::utils::graph::algorithms`] can run on it. Node `i` is the `i`-th
//! block of the function in layout order, which makes node 0 the entry block.
//!
//! The snapshot does not follow later edits of the function.

use std::collections::HashMap;

use crate::{
    ir::{BlockId, FuncId, Module},
    utils::graph::{GraphBase, NodeId, Predecessors, RootedGraph, Successors},
    Error, Result,
};

/// Dense adjacency snapshot of a function's control-flow graph.
#[derive(Debug, Clone)]
pub struct FunctionCfg {
    /// Blocks in layout order; the position is the node index
    blocks: Vec<BlockId>,
    /// Reverse mapping from block handle to node
    index: HashMap<BlockId, NodeId>,
    successors: Vec<Vec<NodeId>>,
    predecessors: Vec<Vec<NodeId>>,
}

impl FunctionCfg {
    /// Builds the graph of `func`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Declaration`] if the function has no blocks.
    pub fn from_function(module: &Module, func: FuncId) -> Result<Self> {
        let function = module.function(func);
        if function.is_declaration() {
            return Err(Error::Declaration(function.name().to_string()));
        }

        let blocks = function.blocks().to_vec();
        let index: HashMap<BlockId, NodeId> = blocks
            .iter()
            .enumerate()
            .map(|(i, bb)| (*bb, NodeId::new(i)))
            .collect();

        let map = |list: &[BlockId]| -> Vec<NodeId> {
            list.iter().filter_map(|bb| index.get(bb).copied()).collect()
        };
        let successors = blocks
            .iter()
            .map(|bb| map(module.block(*bb).successors()))
            .collect();
        let predecessors = blocks
            .iter()
            .map(|bb| map(module.block(*bb).predecessors()))
            .collect();

        Ok(FunctionCfg {
            blocks,
            index,
            successors,
            predecessors,
        })
    }

    /// Returns the block behind a node.
    ///
    /// # Panics
    ///
    /// Panics if the node is out of range.
    #[must_use]
    pub fn block(&self, node: NodeId) -> BlockId {
        self.blocks[node.index()]
    }

    /// Returns the node of a block, if the block belongs to this function.
    #[must_use]
    pub fn node(&self, block: BlockId) -> Option<NodeId> {
        self.index.get(&block).copied()
    }

    /// All blocks in layout order.
    #[must_use]
    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    /// The entry block.
    #[must_use]
    pub fn entry_block(&self) -> BlockId {
        self.blocks[0]
    }
}

impl GraphBase for FunctionCfg {
    fn node_count(&self) -> usize {
        self.blocks.len()
    }

    fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.blocks.len()).map(NodeId::new)
    }
}

impl Successors for FunctionCfg {
    fn successors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.successors[node.index()].iter().copied()
    }
}

impl Predecessors for FunctionCfg {
    fn predecessors(&self, node: NodeId) -> impl Iterator<Item = NodeId> {
        self.predecessors[node.index()].iter().copied()
    }
}

impl RootedGraph for FunctionCfg {
    fn entry(&self) -> NodeId {
        NodeId::new(0)
    }
}

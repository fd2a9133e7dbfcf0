//! Dominator analysis of a single function.
//!
//! [`Dominators`] bundles the CFG snapshot, the dominator tree and the
//! dominance frontiers of one function and answers every query in terms of
//! [`BlockId`]s. The computation itself is the generic one from
//! [`crate::utils::graph::algorithms`].
//!
//! Blocks that cannot be reached from the entry are left out of every table:
//! they have no immediate dominator, no frontier and no interval, they never
//! dominate and are never dominated. Passes that need all blocks covered must
//! remove unreachable blocks first.

use std::collections::BTreeSet;

use crate::{
    analysis::FunctionCfg,
    ir::{BlockId, FuncId, Module},
    utils::graph::{
        algorithms::{compute_dominance_frontiers, compute_dominators, DominatorTree},
        NodeId,
    },
    Result,
};

/// Dominator tree, frontiers and interval numbering of one function.
///
/// # Examples
///
/// ```rust
/// use midend::analysis::Dominators;
/// use midend::ir::{Builder, Module};
///
/// let mut module = Module::new();
/// let void = module.void_type();
/// let fn_ty = module.function_type(void, vec![]);
/// let f = module.add_function("f", fn_ty)?;
/// let entry = module.add_block(f, "entry");
/// let exit = module.add_block(f, "exit");
/// Builder::at_end(&mut module, entry).br(exit)?;
/// Builder::at_end(&mut module, exit).ret(None)?;
///
/// let dom = Dominators::compute(&module, f)?;
/// assert_eq!(dom.idom(exit), Some(entry));
/// assert!(dom.dominates(entry, exit));
/// # Ok::<(), midend::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Dominators {
    cfg: FunctionCfg,
    tree: DominatorTree,
    frontiers: Vec<BTreeSet<NodeId>>,
}

impl Dominators {
    /// Runs the analysis on `func`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Declaration`](crate::Error::Declaration) if the function has no blocks.
    pub fn compute(module: &Module, func: FuncId) -> Result<Self> {
        let cfg = FunctionCfg::from_function(module, func)?;
        let tree = compute_dominators(&cfg);
        let frontiers = compute_dominance_frontiers(&cfg, &tree);
        log::debug!(
            "dominators of {}: {} of {} blocks reachable",
            module.function(func).name(),
            tree.preorder().len(),
            cfg.blocks().len()
        );
        Ok(Dominators {
            cfg,
            tree,
            frontiers,
        })
    }

    /// The CFG snapshot the analysis ran on.
    #[must_use]
    pub fn cfg(&self) -> &FunctionCfg {
        &self.cfg
    }

    /// The underlying node-level dominator tree.
    #[must_use]
    pub fn tree(&self) -> &DominatorTree {
        &self.tree
    }

    /// The entry block.
    #[must_use]
    pub fn entry(&self) -> BlockId {
        self.cfg.entry_block()
    }

    fn blocks_of<'a>(&'a self, nodes: impl IntoIterator<Item = &'a NodeId>) -> Vec<BlockId> {
        nodes.into_iter().map(|n| self.cfg.block(*n)).collect()
    }

    /// Immediate dominator of `block`; the entry is its own immediate dominator.
    ///
    /// `None` for unreachable blocks and blocks of other functions.
    #[must_use]
    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        let node = self.cfg.node(block)?;
        self.tree
            .immediate_dominator(node)
            .map(|n| self.cfg.block(n))
    }

    /// Returns true if `block` is reachable from the entry.
    #[must_use]
    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.cfg
            .node(block)
            .is_some_and(|n| self.tree.is_reachable(n))
    }

    /// Dominance frontier of `block`, in layout order.
    #[must_use]
    pub fn frontier(&self, block: BlockId) -> Vec<BlockId> {
        match self.cfg.node(block) {
            Some(node) => self.blocks_of(&self.frontiers[node.index()]),
            None => Vec::new(),
        }
    }

    /// Children of `block` in the dominator tree.
    #[must_use]
    pub fn children(&self, block: BlockId) -> Vec<BlockId> {
        match self.cfg.node(block) {
            Some(node) => self.blocks_of(self.tree.children(node)),
            None => Vec::new(),
        }
    }

    /// Returns true if every path from the entry to `b` passes through `a`.
    ///
    /// Reflexive on reachable blocks, false whenever either block is unreachable.
    #[must_use]
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        match (self.cfg.node(a), self.cfg.node(b)) {
            (Some(a), Some(b)) => self.tree.dominates(a, b),
            _ => false,
        }
    }

    /// Returns true if `a` dominates `b` and `a != b`.
    #[must_use]
    pub fn strictly_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a != b && self.dominates(a, b)
    }

    /// Preorder interval `(L, R)` of the dominator subtree rooted at `block`.
    #[must_use]
    pub fn interval(&self, block: BlockId) -> Option<(usize, usize)> {
        self.cfg.node(block).and_then(|n| self.tree.interval(n))
    }

    /// Reachable blocks in dominator tree preorder.
    #[must_use]
    pub fn preorder(&self) -> Vec<BlockId> {
        self.blocks_of(self.tree.preorder())
    }

    /// Reachable blocks in dominator tree postorder.
    #[must_use]
    pub fn postorder(&self) -> Vec<BlockId> {
        self.blocks_of(self.tree.postorder())
    }

    /// Reachable blocks in reverse postorder of the CFG.
    #[must_use]
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        self.blocks_of(self.tree.reverse_postorder())
    }

    /// Blocks not reachable from the entry, in layout order.
    #[must_use]
    pub fn unreachable_blocks(&self) -> Vec<BlockId> {
        self.cfg
            .blocks()
            .iter()
            .copied()
            .filter(|bb| !self.is_reachable(*bb))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test::{build_counting_loop, build_diamond, build_nested_loops, build_unreachable_phi},
        Error,
    };

    #[test]
    fn test_diamond() {
        //        entry
        //        /   \
        //     left   right
        //        \   /
        //         join
        let fixture = build_diamond();
        let dom = Dominators::compute(&fixture.module, fixture.func).unwrap();
        let (entry, left, right, join) = (
            fixture.block("entry"),
            fixture.block("left"),
            fixture.block("right"),
            fixture.block("join"),
        );

        assert_eq!(dom.idom(entry), Some(entry));
        assert_eq!(dom.idom(left), Some(entry));
        assert_eq!(dom.idom(join), Some(entry));
        assert_eq!(dom.frontier(left), vec![join]);
        assert_eq!(dom.frontier(right), vec![join]);
        assert!(dom.frontier(entry).is_empty());
        assert!(dom.frontier(join).is_empty());

        let mut children = dom.children(entry);
        children.sort();
        assert_eq!(children, vec![left, right, join]);
        assert!(!dom.dominates(left, join));
        assert!(dom.strictly_dominates(entry, join));
    }

    #[test]
    fn test_loop_frontier_contains_header() {
        //   entry
        //     |
        //   header <---+
        //    /  \      |
        // exit   body -+
        let fixture = build_counting_loop();
        let dom = Dominators::compute(&fixture.module, fixture.func).unwrap();
        let header = fixture.block("header");
        let body = fixture.block("body");

        assert_eq!(dom.frontier(body), vec![header]);
        assert_eq!(dom.frontier(header), vec![header]);
        assert!(dom.dominates(header, body));
        assert!(!dom.dominates(body, header));
    }

    #[test]
    fn test_orders_and_intervals() {
        let fixture = build_nested_loops();
        let dom = Dominators::compute(&fixture.module, fixture.func).unwrap();

        let preorder = dom.preorder();
        let postorder = dom.postorder();
        assert_eq!(preorder.len(), 6);
        assert_eq!(preorder[0], fixture.block("entry"));
        assert_eq!(postorder.last(), Some(&fixture.block("entry")));
        assert_eq!(dom.reverse_postorder()[0], fixture.block("entry"));

        for &a in &preorder {
            for &b in &preorder {
                let (l_a, r_a) = dom.interval(a).unwrap();
                let (l_b, _) = dom.interval(b).unwrap();
                assert_eq!(dom.dominates(a, b), l_a <= l_b && l_b <= r_a);
                if a != b && dom.dominates(a, b) {
                    assert!(!dom.dominates(b, a));
                }
            }
        }
    }

    #[test]
    fn test_unreachable_block_excluded() {
        //   entry    dead
        //      \     /
        //       join
        let fixture = build_unreachable_phi();
        let dom = Dominators::compute(&fixture.module, fixture.func).unwrap();
        let dead = fixture.block("dead");
        let join = fixture.block("join");

        assert!(!dom.is_reachable(dead));
        assert_eq!(dom.idom(dead), None);
        assert_eq!(dom.interval(dead), None);
        assert!(!dom.dominates(dead, join));
        assert!(!dom.dominates(fixture.block("entry"), dead));
        assert_eq!(dom.idom(join), Some(fixture.block("entry")));
        assert!(dom.frontier(fixture.block("entry")).is_empty());
        assert_eq!(dom.unreachable_blocks(), vec![dead]);
    }

    #[test]
    fn test_declaration_rejected() {
        let mut module = Module::new();
        let void = module.void_type();
        let fn_ty = module.function_type(void, vec![]);
        let f = module.add_function("external", fn_ty).unwrap();
        assert!(matches!(
            Dominators::compute(&module, f),
            Err(Error::Declaration(_))
        ));
    }
}

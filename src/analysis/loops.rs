//! Natural loop detection.
//!
//! # Loop Structure
//!
//! ```text
//!     [preheader]     <- Single non-loop predecessor of the header (optional)
//!          |
//!          v
//!     [header] <------+  <- Dominates every block of the loop
//!          |          |
//!          v          |
//!     [body ...]      |
//!          |          |
//!          v          |
//!     [latch] --------+  <- Source of a back edge
//! ```
//!
//! # Algorithm
//!
//! Blocks are visited in dominator-tree postorder, so inner headers are seen
//! before the headers enclosing them. A block `h` with a predecessor `p` that
//! `h` dominates is a header and `p` a latch. The body is collected by walking
//! predecessors backwards from the latches. When the walk reaches a block that
//! already belongs to another loop, the outermost loop enclosing that block is
//! attached as a child of the current one, its blocks are merged in and the walk
//! continues from the predecessors of the child's header.
//!
//! Headers without a dominance relation between them end up as sibling roots
//! of the [`LoopForest`].

use std::{collections::HashMap, fmt};

use crate::{
    analysis::Dominators,
    ir::{BlockId, FuncId, Module},
    utils::graph::{Predecessors, Successors},
    Result,
};

/// Handle of a loop within its [`LoopForest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoopId(usize);

impl LoopId {
    /// Position of the loop in detection order.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loop{}", self.0)
    }
}

/// A natural loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loop {
    header: BlockId,
    /// Header first, then the rest of the body including nested loops
    blocks: Vec<BlockId>,
    latches: Vec<BlockId>,
    parent: Option<LoopId>,
    children: Vec<LoopId>,
    preheader: Option<BlockId>,
    depth: usize,
}

impl Loop {
    fn new(header: BlockId) -> Self {
        Loop {
            header,
            blocks: vec![header],
            latches: Vec::new(),
            parent: None,
            children: Vec::new(),
            preheader: None,
            depth: 1,
        }
    }

    /// The single entry block.
    #[must_use]
    pub fn header(&self) -> BlockId {
        self.header
    }

    /// Every block of the loop, header first. Blocks of nested loops are included.
    #[must_use]
    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    /// Sources of the back edges into the header.
    #[must_use]
    pub fn latches(&self) -> &[BlockId] {
        &self.latches
    }

    /// Returns true if `block` is a latch of this loop.
    #[must_use]
    pub fn is_latch(&self, block: BlockId) -> bool {
        self.latches.contains(&block)
    }

    /// The innermost loop enclosing this one.
    #[must_use]
    pub fn parent(&self) -> Option<LoopId> {
        self.parent
    }

    /// Loops directly nested in this one.
    #[must_use]
    pub fn children(&self) -> &[LoopId] {
        &self.children
    }

    /// The preheader, if the header has one.
    ///
    /// A preheader is the header's only non-latch predecessor, and the header is
    /// its only successor.
    #[must_use]
    pub fn preheader(&self) -> Option<BlockId> {
        self.preheader
    }

    /// Nesting depth; top-level loops have depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// All natural loops of one function and their nesting.
#[derive(Debug, Clone, Default)]
pub struct LoopForest {
    /// Loops in detection order (inner before outer)
    loops: Vec<Loop>,
    /// Innermost loop of every block that belongs to one
    innermost: HashMap<BlockId, LoopId>,
    /// Top-level loops ordered by header position in the dominator tree
    roots: Vec<LoopId>,
}

impl LoopForest {
    /// Computes dominators for `func` and detects its loops.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Declaration`](crate::Error::Declaration) for a declaration.
    pub fn compute(module: &Module, func: FuncId) -> Result<Self> {
        let dominators = Dominators::compute(module, func)?;
        let forest = Self::from_dominators(&dominators);
        for id in forest.loops_outer_first() {
            let l = forest.get(id);
            log::debug!(
                "{}: {} header {} with {} blocks, {} latches, {} children",
                module.function(func).name(),
                id,
                module.block(l.header).name(),
                l.blocks.len(),
                l.latches.len(),
                l.children.len()
            );
        }
        Ok(forest)
    }

    /// Detects the loops described by an existing dominator analysis.
    #[must_use]
    pub fn from_dominators(dominators: &Dominators) -> Self {
        let cfg = dominators.cfg();
        let predecessors = |block: BlockId| -> Vec<BlockId> {
            cfg.node(block)
                .map(|n| {
                    cfg.predecessors(n)
                        .map(|p| cfg.block(p))
                        .filter(|p| dominators.is_reachable(*p))
                        .collect()
                })
                .unwrap_or_default()
        };

        let mut forest = LoopForest::default();
        for header in dominators.postorder() {
            let latches: Vec<BlockId> = predecessors(header)
                .into_iter()
                .filter(|p| dominators.dominates(header, *p))
                .collect();
            if latches.is_empty() {
                continue;
            }

            let id = LoopId(forest.loops.len());
            let mut current = Loop::new(header);
            current.latches.clone_from(&latches);
            forest.loops.push(current);
            forest.innermost.insert(header, id);
            forest.discover_body(id, latches, &predecessors);
        }

        let preorder: HashMap<BlockId, usize> = dominators
            .preorder()
            .into_iter()
            .enumerate()
            .map(|(i, bb)| (bb, i))
            .collect();
        forest.roots = (0..forest.loops.len())
            .map(LoopId)
            .filter(|id| forest.loops[id.0].parent.is_none())
            .collect();
        forest
            .roots
            .sort_by_key(|id| preorder.get(&forest.loops[id.0].header).copied());

        for id in forest.loops_outer_first() {
            if let Some(parent) = forest.loops[id.0].parent {
                forest.loops[id.0].depth = forest.loops[parent.0].depth + 1;
            }
        }
        for l in &mut forest.loops {
            let entries: Vec<BlockId> = predecessors(l.header)
                .into_iter()
                .filter(|p| !l.latches.contains(p))
                .collect();
            if let [single] = entries.as_slice() {
                let succs = cfg
                    .node(*single)
                    .map_or(0, |n| cfg.successors(n).count());
                if succs == 1 {
                    l.preheader = Some(*single);
                }
            }
        }
        forest
    }

    fn discover_body<F>(&mut self, id: LoopId, latches: Vec<BlockId>, predecessors: &F)
    where
        F: Fn(BlockId) -> Vec<BlockId>,
    {
        let mut worklist = latches;
        let mut queued: Vec<BlockId> = worklist.clone();

        while let Some(block) = worklist.pop() {
            queued.retain(|b| *b != block);

            let Some(&owner) = self.innermost.get(&block) else {
                self.loops[id.0].blocks.push(block);
                self.innermost.insert(block, id);
                for pred in predecessors(block) {
                    if !queued.contains(&pred) {
                        queued.push(pred);
                        worklist.push(pred);
                    }
                }
                continue;
            };
            if owner == id {
                continue;
            }

            let mut child = owner;
            while let Some(parent) = self.loops[child.0].parent {
                child = parent;
            }
            if child == id {
                continue;
            }
            self.loops[child.0].parent = Some(id);
            self.loops[id.0].children.push(child);
            let merged = self.loops[child.0].blocks.clone();
            self.loops[id.0].blocks.extend(merged);
            for pred in predecessors(self.loops[child.0].header) {
                if !queued.contains(&pred) {
                    queued.push(pred);
                    worklist.push(pred);
                }
            }
        }
    }

    /// Number of loops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    /// Returns true if the function has no loops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Returns a loop by handle.
    ///
    /// # Panics
    ///
    /// Panics if the handle belongs to another forest.
    #[must_use]
    pub fn get(&self, id: LoopId) -> &Loop {
        &self.loops[id.0]
    }

    /// All loops in detection order, inner loops before the loops enclosing them.
    pub fn iter(&self) -> impl Iterator<Item = (LoopId, &Loop)> {
        self.loops.iter().enumerate().map(|(i, l)| (LoopId(i), l))
    }

    /// Top-level loops.
    #[must_use]
    pub fn top_level(&self) -> &[LoopId] {
        &self.roots
    }

    /// Every loop, each one before the loops nested in it.
    #[must_use]
    pub fn loops_outer_first(&self) -> Vec<LoopId> {
        let mut order = Vec::with_capacity(self.loops.len());
        let mut stack: Vec<LoopId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.loops[id.0].children.iter().rev());
        }
        order
    }

    /// The innermost loop containing `block`.
    #[must_use]
    pub fn loop_of(&self, block: BlockId) -> Option<LoopId> {
        self.innermost.get(&block).copied()
    }

    /// The loop headed by `block`.
    #[must_use]
    pub fn loop_with_header(&self, block: BlockId) -> Option<LoopId> {
        self.loop_of(block)
            .filter(|id| self.loops[id.0].header == block)
    }

    /// Returns true if `block` belongs to `id` or to a loop nested in it.
    #[must_use]
    pub fn contains(&self, id: LoopId, block: BlockId) -> bool {
        let mut current = self.loop_of(block);
        while let Some(l) = current {
            if l == id {
                return true;
            }
            current = self.loops[l.0].parent;
        }
        false
    }

    /// Nesting depth of `block`: 0 outside every loop.
    #[must_use]
    pub fn depth(&self, block: BlockId) -> usize {
        self.loop_of(block).map_or(0, |id| self.loops[id.0].depth)
    }

    pub(crate) fn set_preheader(&mut self, id: LoopId, block: BlockId) {
        self.loops[id.0].preheader = Some(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{Builder, CmpPredicate},
        test::{build_counting_loop, build_diamond, build_nested_loops},
    };

    #[test]
    fn test_single_loop() {
        //   entry
        //     |
        //   header <---+
        //    /  \      |
        // exit   body -+
        let fixture = build_counting_loop();
        let forest = LoopForest::compute(&fixture.module, fixture.func).unwrap();
        let header = fixture.block("header");
        let body = fixture.block("body");

        assert_eq!(forest.len(), 1);
        let id = forest.top_level()[0];
        let l = forest.get(id);
        assert_eq!(l.header(), header);
        assert_eq!(l.blocks(), &[header, body]);
        assert_eq!(l.latches(), &[body]);
        assert_eq!(l.parent(), None);
        assert_eq!(l.preheader(), Some(fixture.block("entry")));
        assert_eq!(forest.loop_of(body), Some(id));
        assert_eq!(forest.loop_of(fixture.block("exit")), None);
        assert_eq!(forest.depth(body), 1);
        assert!(forest.contains(id, header));
        assert!(!forest.contains(id, fixture.block("entry")));
    }

    #[test]
    fn test_nested_loops() {
        //   entry
        //     |
        //   outer <--------+
        //    |   \         |
        //    |   inner <-+ |
        //    |    |   \  | |
        //    |    |   ibody
        //    |    |        |
        //    |   latch ----+
        //    |
        //   exit
        let fixture = build_nested_loops();
        let forest = LoopForest::compute(&fixture.module, fixture.func).unwrap();
        let outer = fixture.block("outer");
        let inner = fixture.block("inner");
        let ibody = fixture.block("ibody");
        let latch = fixture.block("latch");

        assert_eq!(forest.len(), 2);
        assert_eq!(forest.top_level().len(), 1);
        let root = forest.top_level()[0];
        let child = forest.get(root).children()[0];
        assert_eq!(forest.get(root).header(), outer);
        assert_eq!(forest.get(child).header(), inner);
        assert_eq!(forest.get(child).parent(), Some(root));
        assert_eq!(forest.get(child).depth(), 2);

        let mut outer_blocks = forest.get(root).blocks().to_vec();
        outer_blocks.sort();
        assert_eq!(outer_blocks, vec![outer, inner, ibody, latch]);
        assert_eq!(forest.get(root).blocks()[0], outer);
        assert_eq!(forest.get(child).blocks(), &[inner, ibody]);

        assert_eq!(forest.loop_of(ibody), Some(child));
        assert_eq!(forest.loop_of(latch), Some(root));
        assert!(forest.contains(root, ibody));
        assert!(!forest.contains(child, latch));
        assert_eq!(forest.loops_outer_first(), vec![root, child]);
        assert_eq!(forest.loop_with_header(inner), Some(child));
        assert_eq!(forest.loop_with_header(ibody), None);
    }

    #[test]
    fn test_no_loops() {
        let fixture = build_diamond();
        let forest = LoopForest::compute(&fixture.module, fixture.func).unwrap();
        assert!(forest.is_empty());
        assert!(forest.top_level().is_empty());
    }

    #[test]
    fn test_sibling_loops_and_missing_preheader() {
        //   entry ---+
        //     |      |
        //     a <-+  |
        //     |\  |  |
        //     | a_body
        //     |      |
        //     b <----+
        //     |\ <-+
        //     | b_body
        //     |
        //   exit
        let mut module = Module::new();
        let i32_ty = module.int32_type();
        let fn_ty = module.function_type(i32_ty, vec![i32_ty]);
        let f = module.add_function("f", fn_ty).unwrap();
        let n = module.function_arg(f, 0).unwrap();
        let zero = module.const_int(0);
        let entry = module.add_block(f, "entry");
        let a = module.add_block(f, "a");
        let a_body = module.add_block(f, "a_body");
        let b = module.add_block(f, "b");
        let b_body = module.add_block(f, "b_body");
        let exit = module.add_block(f, "exit");

        let mut builder = Builder::at_end(&mut module, entry);
        let cond = builder.icmp(CmpPredicate::Gt, n, zero).unwrap();
        builder.cond_br(cond, a, b).unwrap();
        builder.position_at_end(a);
        builder.cond_br(cond, a_body, b).unwrap();
        builder.position_at_end(a_body);
        builder.br(a).unwrap();
        builder.position_at_end(b);
        builder.cond_br(cond, b_body, exit).unwrap();
        builder.position_at_end(b_body);
        builder.br(b).unwrap();
        builder.position_at_end(exit);
        builder.ret(Some(n.into())).unwrap();

        let forest = LoopForest::compute(&module, f).unwrap();
        assert_eq!(forest.len(), 2);
        let roots: Vec<BlockId> = forest
            .top_level()
            .iter()
            .map(|id| forest.get(*id).header())
            .collect();
        assert_eq!(roots, vec![a, b]);
        let loop_a = forest.loop_with_header(a).unwrap();
        let loop_b = forest.loop_with_header(b).unwrap();
        assert_eq!(forest.get(loop_a).preheader(), None);
        assert_eq!(forest.get(loop_b).preheader(), None);
        assert_eq!(forest.get(loop_b).blocks(), &[b, b_body]);
    }
}

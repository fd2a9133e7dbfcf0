//! Basic blocks.

use crate::ir::{BlockId, FuncId, InstId, Use};

/// A basic block stored in the module arena.
///
/// The instruction list is split into a front segment holding only `alloca`
/// and `phi` instructions followed by the remaining instructions, the last of
/// which is the terminator once the block is complete. Predecessor and
/// successor lists are de-duplicated and always mirror the targets of the
/// terminating branch; they are maintained by the
/// [`Module`](crate::ir::Module), never edited directly.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub(crate) name: String,
    pub(crate) parent: FuncId,
    pub(crate) insts: Vec<InstId>,
    pub(crate) preds: Vec<BlockId>,
    pub(crate) succs: Vec<BlockId>,
    pub(crate) uses: Vec<Use>,
}

impl BasicBlock {
    pub(crate) fn new(name: String, parent: FuncId) -> Self {
        Self {
            name,
            parent,
            insts: Vec::new(),
            preds: Vec::new(),
            succs: Vec::new(),
            uses: Vec::new(),
        }
    }

    /// The block's unique (per function) name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The owning function.
    #[must_use]
    pub fn parent(&self) -> FuncId {
        self.parent
    }

    /// Instructions in order: front segment, then the rest.
    #[must_use]
    pub fn instructions(&self) -> &[InstId] {
        &self.insts
    }

    /// Returns true if the block holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.insts.len()
    }

    /// Control-flow predecessors.
    #[must_use]
    pub fn predecessors(&self) -> &[BlockId] {
        &self.preds
    }

    /// Control-flow successors.
    #[must_use]
    pub fn successors(&self) -> &[BlockId] {
        &self.succs
    }

    /// Operand slots currently referring to this block (branch targets, phi incoming blocks).
    #[must_use]
    pub fn uses(&self) -> &[Use] {
        &self.uses
    }
}

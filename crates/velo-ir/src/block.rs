//! Basic blocks: an ordered instruction list plus the predecessor set.
//!
//! A block is a maximal straight-line sequence; the terminator, when
//! present, is the last instruction. Successors are a view over the
//! terminator's targets; predecessors are maintained eagerly by branch
//! insertion/removal (see [`Function`](crate::Function)) and iterate sorted
//! by block id so that textual output stays stable.

use std::collections::BTreeSet;

use crate::id::{BlockId, InstId};
use crate::inst::{Instruction, SuccessorList};
use crate::list::{EntityList, Keys};

/// A basic block. All mutation goes through the owning `Function` so that
/// use-lists and predecessor sets stay consistent across blocks.
#[derive(Debug)]
pub struct BasicBlock {
    id: BlockId,
    insts: EntityList<InstId, Instruction>,
    preds: BTreeSet<BlockId>,
}

impl BasicBlock {
    pub(crate) fn new(id: BlockId) -> Self {
        BasicBlock {
            id,
            insts: EntityList::new(),
            preds: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    pub fn get(&self, inst: InstId) -> Option<&Instruction> {
        self.insts.get(inst)
    }

    pub(crate) fn get_mut(&mut self, inst: InstId) -> Option<&mut Instruction> {
        self.insts.get_mut(inst)
    }

    pub fn contains(&self, inst: InstId) -> bool {
        self.insts.contains(inst)
    }

    /// Instruction ids in block order.
    pub fn insts(&self) -> Keys<'_, InstId, Instruction> {
        self.insts.keys()
    }

    /// `(id, instruction)` pairs in block order.
    pub fn iter_insts(&self) -> impl Iterator<Item = (InstId, &Instruction)> + '_ {
        self.insts.iter()
    }

    pub fn first(&self) -> Option<InstId> {
        self.insts.front()
    }

    pub fn last(&self) -> Option<InstId> {
        self.insts.back()
    }

    pub fn next(&self, inst: InstId) -> Option<InstId> {
        self.insts.next(inst)
    }

    pub fn prev(&self, inst: InstId) -> Option<InstId> {
        self.insts.prev(inst)
    }

    /// The last instruction, iff it is a terminator.
    pub fn terminator(&self) -> Option<InstId> {
        let last = self.insts.back()?;
        if self.insts.get(last)?.is_terminator() {
            Some(last)
        } else {
            None
        }
    }

    /// Targets of the terminator; empty when the block has none.
    pub fn successors(&self) -> SuccessorList {
        self.terminator()
            .and_then(|t| self.insts.get(t))
            .map(|inst| inst.successor_blocks())
            .unwrap_or_default()
    }

    /// Predecessor blocks, sorted by block id.
    pub fn predecessors(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.preds.iter().copied()
    }

    pub fn predecessors_count(&self) -> usize {
        self.preds.len()
    }

    pub fn has_predecessor(&self, block: BlockId) -> bool {
        self.preds.contains(&block)
    }

    pub(crate) fn insts_mut(&mut self) -> &mut EntityList<InstId, Instruction> {
        &mut self.insts
    }

    pub(crate) fn preds_mut(&mut self) -> &mut BTreeSet<BlockId> {
        &mut self.preds
    }
}

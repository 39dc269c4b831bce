//! Instructions: a common header plus a payload variant per opcode category.
//!
//! Every instruction carries the same bookkeeping -- opcode, result type and
//! the **use-list** (the set of instructions currently referencing it as an
//! operand) -- with the per-opcode operand slots living in [`InstKind`].
//! Operand slots and use-list entries are non-owning [`InstRef`] handles;
//! the mutation protocol on [`Function`](crate::Function) is the only path
//! that updates them, keeping both directions of every use/def edge in sync.

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

use crate::id::{BlockId, InstRef};
use crate::ops::{CmpKind, Opcode};
use crate::types::Type;

/// Operand slots of one instruction, inline up to the common two.
pub type OperandList = SmallVec<[InstRef; 2]>;

/// Successor blocks named by one instruction.
pub type SuccessorList = SmallVec<[BlockId; 2]>;

/// Per-opcode operand payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstKind {
    /// Function parameter at `index`; no operands.
    Arg { index: usize },
    /// Integer constant; the magnitude fits the declared type's width.
    Const { value: u64 },
    /// Two-operand arithmetic/bitwise operation; the opcode in the header
    /// picks which one.
    Binary { lhs: InstRef, rhs: InstRef },
    /// Integer comparison producing `i1`.
    ICmp {
        kind: CmpKind,
        lhs: InstRef,
        rhs: InstRef,
    },
    /// Control transfer to one target (unconditional, `cond` empty) or a
    /// choice of two (`cond` is an `i1` def).
    Branch {
        cond: Option<InstRef>,
        then_block: BlockId,
        else_block: Option<BlockId>,
    },
    /// Function exit, with a value unless the function returns `void`.
    Ret { value: Option<InstRef> },
    /// Per-predecessor value selection; keys are predecessor blocks.
    Phi { incoming: IndexMap<BlockId, InstRef> },
}

/// One instruction: common header plus payload.
#[derive(Debug)]
pub struct Instruction {
    opcode: Opcode,
    ty: Type,
    users: IndexSet<InstRef>,
    kind: InstKind,
}

impl Instruction {
    pub(crate) fn new(opcode: Opcode, ty: Type, kind: InstKind) -> Self {
        Instruction {
            opcode,
            ty,
            users: IndexSet::new(),
            kind,
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Result type. `None` for control-transfer instructions.
    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn kind(&self) -> &InstKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut InstKind {
        &mut self.kind
    }

    pub fn is_terminator(&self) -> bool {
        self.opcode.is_terminator()
    }

    /// Users in registration order.
    pub fn users(&self) -> impl Iterator<Item = InstRef> + '_ {
        self.users.iter().copied()
    }

    pub fn users_count(&self) -> usize {
        self.users.len()
    }

    pub fn has_user(&self, user: InstRef) -> bool {
        self.users.contains(&user)
    }

    pub(crate) fn add_user(&mut self, user: InstRef) {
        self.users.insert(user);
    }

    pub(crate) fn remove_user(&mut self, user: InstRef) {
        self.users.shift_remove(&user);
    }

    /// The constant's magnitude, for `Const` instructions.
    pub fn const_value(&self) -> Option<u64> {
        match self.kind {
            InstKind::Const { value } => Some(value),
            _ => None,
        }
    }

    /// Every operand slot, in slot order. A value referenced from two slots
    /// appears twice.
    pub fn operands(&self) -> OperandList {
        match &self.kind {
            InstKind::Arg { .. } | InstKind::Const { .. } => OperandList::new(),
            InstKind::Binary { lhs, rhs } | InstKind::ICmp { lhs, rhs, .. } => {
                SmallVec::from_slice(&[*lhs, *rhs])
            }
            InstKind::Branch { cond, .. } => cond.iter().copied().collect(),
            InstKind::Ret { value } => value.iter().copied().collect(),
            InstKind::Phi { incoming } => incoming.values().copied().collect(),
        }
    }

    /// Successor blocks, for terminators that transfer control to one.
    pub fn successor_blocks(&self) -> SuccessorList {
        match &self.kind {
            InstKind::Branch {
                then_block,
                else_block,
                ..
            } => {
                let mut targets = SuccessorList::new();
                targets.push(*then_block);
                if let Some(else_block) = else_block {
                    targets.push(*else_block);
                }
                targets
            }
            _ => SuccessorList::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::InstId;

    fn r(block: u32, inst: u32) -> InstRef {
        InstRef::new(BlockId(block), InstId(inst))
    }

    #[test]
    fn user_registration_is_a_set() {
        let mut inst = Instruction::new(Opcode::Const, Type::I64, InstKind::Const { value: 1 });
        inst.add_user(r(0, 1));
        inst.add_user(r(0, 1));
        inst.add_user(r(0, 2));
        assert_eq!(inst.users_count(), 2);
        assert!(inst.has_user(r(0, 1)));
        inst.remove_user(r(0, 1));
        assert_eq!(inst.users_count(), 1);
        assert!(!inst.has_user(r(0, 1)));
    }

    #[test]
    fn operands_follow_slot_order() {
        let inst = Instruction::new(
            Opcode::Sub,
            Type::I32,
            InstKind::Binary {
                lhs: r(0, 3),
                rhs: r(0, 1),
            },
        );
        assert_eq!(inst.operands().as_slice(), &[r(0, 3), r(0, 1)]);
    }

    #[test]
    fn branch_successors() {
        let uncond = Instruction::new(
            Opcode::Br,
            Type::None,
            InstKind::Branch {
                cond: None,
                then_block: BlockId(1),
                else_block: None,
            },
        );
        assert_eq!(uncond.successor_blocks().as_slice(), &[BlockId(1)]);
        assert!(uncond.operands().is_empty());

        let cond = Instruction::new(
            Opcode::Br,
            Type::None,
            InstKind::Branch {
                cond: Some(r(0, 0)),
                then_block: BlockId(1),
                else_block: Some(BlockId(2)),
            },
        );
        assert_eq!(cond.successor_blocks().as_slice(), &[BlockId(1), BlockId(2)]);
        assert_eq!(cond.operands().as_slice(), &[r(0, 0)]);
    }

    #[test]
    fn phi_operands_are_incoming_values() {
        let mut incoming = IndexMap::new();
        incoming.insert(BlockId(1), r(1, 0));
        incoming.insert(BlockId(2), r(2, 4));
        let phi = Instruction::new(Opcode::Phi, Type::I64, InstKind::Phi { incoming });
        assert_eq!(phi.operands().as_slice(), &[r(1, 0), r(2, 4)]);
    }
}

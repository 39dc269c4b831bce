//! Functions: the owning container for blocks and the single mutation path
//! for everything that crosses block boundaries.
//!
//! A function owns its blocks; each block owns its instructions. All
//! cross-references -- operand slots, use-lists, predecessor sets, branch
//! targets, phi incoming records -- are non-owning handles, and every
//! operation that touches them lives here so both directions of each edge
//! are updated together. Builders validate first and leave the function
//! unchanged on failure.
//!
//! Block and instruction ids come from the entity lists' monotone key
//! allocation: unique within their scope, stable under non-removing
//! mutation, never reused.

use crate::block::BasicBlock;
use crate::error::IrError;
use crate::id::{BlockId, InstId, InstRef};
use crate::inst::{InstKind, Instruction};
use crate::list::{EntityList, Keys};
use crate::ops::{CmpKind, Opcode};
use crate::types::Type;

/// A function under construction or transformation.
#[derive(Debug)]
pub struct Function {
    name: String,
    return_type: Type,
    params: Vec<Type>,
    blocks: EntityList<BlockId, BasicBlock>,
}

impl Function {
    pub fn new(name: impl Into<String>, return_type: Type, params: Vec<Type>) -> Self {
        Function {
            name: name.into(),
            return_type,
            params,
            blocks: EntityList::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn return_type(&self) -> Type {
        self.return_type
    }

    /// Parameter types in declaration order.
    pub fn params(&self) -> &[Type] {
        &self.params
    }

    // -----------------------------------------------------------------------
    // Blocks
    // -----------------------------------------------------------------------

    /// Appends a new empty block and returns its id.
    pub fn append_block(&mut self) -> BlockId {
        let id = self.blocks.next_key();
        self.blocks.push_back(BasicBlock::new(id))
    }

    /// Creates a new empty block immediately before `pos`.
    pub fn insert_block_before(&mut self, pos: BlockId) -> Result<BlockId, IrError> {
        if !self.blocks.contains(pos) {
            return Err(IrError::BlockNotFound { id: pos });
        }
        let id = self.blocks.next_key();
        Ok(self.blocks.insert_before(pos, BasicBlock::new(id)))
    }

    /// Destroys a block and its instructions in order.
    ///
    /// Use-list edges into surviving instructions and predecessor links from
    /// surviving branch targets are retracted. Phi records in other blocks
    /// keyed by the removed block are left to the client (`phi_remove_path`).
    pub fn remove_block(&mut self, id: BlockId) -> Result<(), IrError> {
        let block = self.blocks.get(id).ok_or(IrError::BlockNotFound { id })?;
        let inst_ids: Vec<InstId> = block.insts().collect();
        for inst_id in inst_ids {
            let r = InstRef::new(id, inst_id);
            let Some(inst) = self.get_inst(r) else { continue };
            let operands = inst.operands();
            let targets = inst.successor_blocks();
            for op in operands {
                if op.block == id {
                    continue; // dies with this block
                }
                if let Some(def) = self.inst_mut(op) {
                    def.remove_user(r);
                }
            }
            for target in targets {
                if target == id {
                    continue;
                }
                if let Some(tb) = self.blocks.get_mut(target) {
                    tb.preds_mut().remove(&id);
                }
            }
        }
        self.blocks.remove(id);
        Ok(())
    }

    pub fn get_block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id)
    }

    /// First block, by convention the entry of the flow graph.
    pub fn entry_block(&self) -> Option<BlockId> {
        self.blocks.front()
    }

    /// Block ids in list order.
    pub fn blocks(&self) -> Keys<'_, BlockId, BasicBlock> {
        self.blocks.keys()
    }

    /// `(id, block)` pairs in list order.
    pub fn iter_blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> + '_ {
        self.blocks.iter()
    }

    pub fn blocks_count(&self) -> usize {
        self.blocks.len()
    }

    // -----------------------------------------------------------------------
    // Instruction lookup and navigation
    // -----------------------------------------------------------------------

    pub fn get_inst(&self, r: InstRef) -> Option<&Instruction> {
        self.blocks.get(r.block)?.get(r.inst)
    }

    fn inst_mut(&mut self, r: InstRef) -> Option<&mut Instruction> {
        self.blocks.get_mut(r.block)?.get_mut(r.inst)
    }

    pub(crate) fn operand_type(&self, r: InstRef) -> Result<Type, IrError> {
        self.get_inst(r)
            .map(|inst| inst.ty())
            .ok_or(IrError::InstructionNotFound { inst: r })
    }

    /// Instruction after `r` within its block.
    pub fn next_inst(&self, r: InstRef) -> Option<InstRef> {
        let next = self.blocks.get(r.block)?.next(r.inst)?;
        Some(InstRef::new(r.block, next))
    }

    /// Instruction before `r` within its block.
    pub fn prev_inst(&self, r: InstRef) -> Option<InstRef> {
        let prev = self.blocks.get(r.block)?.prev(r.inst)?;
        Some(InstRef::new(r.block, prev))
    }

    // -----------------------------------------------------------------------
    // Instruction builders
    // -----------------------------------------------------------------------

    /// Appends an `arg [index]` instruction typed as the parameter at `index`.
    pub fn append_arg(&mut self, block: BlockId, index: usize) -> Result<InstRef, IrError> {
        let ty = *self
            .params
            .get(index)
            .ok_or(IrError::ArgOutOfRange {
                index,
                count: self.params.len(),
            })?;
        self.attach(
            block,
            None,
            Instruction::new(Opcode::Arg, ty, InstKind::Arg { index }),
        )
    }

    /// Appends an integer constant of `ty` holding `value`.
    pub fn append_const(
        &mut self,
        block: BlockId,
        ty: Type,
        value: u64,
    ) -> Result<InstRef, IrError> {
        self.insert_const(block, None, ty, value)
    }

    /// Inserts an integer constant immediately before `pos`.
    pub fn insert_const_before(
        &mut self,
        pos: InstRef,
        ty: Type,
        value: u64,
    ) -> Result<InstRef, IrError> {
        self.check_pos(pos)?;
        self.insert_const(pos.block, Some(pos.inst), ty, value)
    }

    fn insert_const(
        &mut self,
        block: BlockId,
        before: Option<InstId>,
        ty: Type,
        value: u64,
    ) -> Result<InstRef, IrError> {
        let max = ty.max_value().ok_or(IrError::InvalidConstantType { ty })?;
        if value > max {
            return Err(IrError::ConstantOutOfRange { ty, value });
        }
        self.attach(
            block,
            before,
            Instruction::new(Opcode::Const, ty, InstKind::Const { value }),
        )
    }

    /// Appends a binary operation; operands must share one integer type.
    pub fn append_binary(
        &mut self,
        block: BlockId,
        opcode: Opcode,
        lhs: InstRef,
        rhs: InstRef,
    ) -> Result<InstRef, IrError> {
        self.insert_binary(block, None, opcode, lhs, rhs)
    }

    /// Inserts a binary operation immediately before `pos`.
    pub fn insert_binary_before(
        &mut self,
        pos: InstRef,
        opcode: Opcode,
        lhs: InstRef,
        rhs: InstRef,
    ) -> Result<InstRef, IrError> {
        self.check_pos(pos)?;
        self.insert_binary(pos.block, Some(pos.inst), opcode, lhs, rhs)
    }

    fn insert_binary(
        &mut self,
        block: BlockId,
        before: Option<InstId>,
        opcode: Opcode,
        lhs: InstRef,
        rhs: InstRef,
    ) -> Result<InstRef, IrError> {
        if !opcode.is_binary_op() {
            return Err(IrError::InvalidBinaryOperatorOpcode { opcode });
        }
        let ty = self.common_operand_type(lhs, rhs)?;
        self.attach(
            block,
            before,
            Instruction::new(opcode, ty, InstKind::Binary { lhs, rhs }),
        )
    }

    /// Appends an integer comparison producing `i1`.
    pub fn append_icmp(
        &mut self,
        block: BlockId,
        kind: CmpKind,
        lhs: InstRef,
        rhs: InstRef,
    ) -> Result<InstRef, IrError> {
        self.common_operand_type(lhs, rhs)?;
        self.attach(
            block,
            None,
            Instruction::new(Opcode::ICmp, Type::I1, InstKind::ICmp { kind, lhs, rhs }),
        )
    }

    /// Appends an unconditional branch; `block` becomes a predecessor of
    /// `target`.
    pub fn append_br(&mut self, block: BlockId, target: BlockId) -> Result<InstRef, IrError> {
        if !self.blocks.contains(target) {
            return Err(IrError::BlockNotFound { id: target });
        }
        self.attach(
            block,
            None,
            Instruction::new(
                Opcode::Br,
                Type::None,
                InstKind::Branch {
                    cond: None,
                    then_block: target,
                    else_block: None,
                },
            ),
        )
    }

    /// Appends a conditional branch; `block` becomes a predecessor of both
    /// targets. The condition must be `i1`.
    pub fn append_cond_br(
        &mut self,
        block: BlockId,
        cond: InstRef,
        then_block: BlockId,
        else_block: BlockId,
    ) -> Result<InstRef, IrError> {
        let cond_ty = self.operand_type(cond)?;
        if cond_ty != Type::I1 {
            return Err(IrError::InvalidConditionType { found: cond_ty });
        }
        for target in [then_block, else_block] {
            if !self.blocks.contains(target) {
                return Err(IrError::BlockNotFound { id: target });
            }
        }
        self.attach(
            block,
            None,
            Instruction::new(
                Opcode::Br,
                Type::None,
                InstKind::Branch {
                    cond: Some(cond),
                    then_block,
                    else_block: Some(else_block),
                },
            ),
        )
    }

    /// Appends a return. The operand type (or `void` when absent) must
    /// match the function's return type.
    pub fn append_ret(
        &mut self,
        block: BlockId,
        value: Option<InstRef>,
    ) -> Result<InstRef, IrError> {
        let found = match value {
            Some(v) => self.operand_type(v)?,
            None => Type::Void,
        };
        if found != self.return_type {
            return Err(IrError::InvalidReturnType {
                expected: self.return_type,
                found,
            });
        }
        self.attach(
            block,
            None,
            Instruction::new(Opcode::Ret, Type::None, InstKind::Ret { value }),
        )
    }

    /// Appends a phi of `ty` with no incoming records yet.
    pub fn append_phi(&mut self, block: BlockId, ty: Type) -> Result<InstRef, IrError> {
        self.attach(
            block,
            None,
            Instruction::new(
                Opcode::Phi,
                ty,
                InstKind::Phi {
                    incoming: Default::default(),
                },
            ),
        )
    }

    // -----------------------------------------------------------------------
    // Instruction mutation
    // -----------------------------------------------------------------------

    /// Unlinks and destroys `r`, retracting it from each operand's use-list.
    /// Removing a branch also retracts this block from its targets'
    /// predecessor sets.
    pub fn remove_inst(&mut self, r: InstRef) -> Result<(), IrError> {
        let inst = self
            .get_inst(r)
            .ok_or(IrError::InstructionNotFound { inst: r })?;
        debug_assert_eq!(
            inst.users_count(),
            0,
            "removing {r} while it still has users"
        );
        let operands = inst.operands();
        let targets = inst.successor_blocks();
        self.blocks
            .get_mut(r.block)
            .ok_or(IrError::InstructionNotFound { inst: r })?
            .insts_mut()
            .remove(r.inst);
        for op in operands {
            if let Some(def) = self.inst_mut(op) {
                def.remove_user(r);
            }
        }
        for target in targets {
            if let Some(tb) = self.blocks.get_mut(target) {
                tb.preds_mut().remove(&r.block);
            }
        }
        Ok(())
    }

    /// Redirects every user of `of` to reference `with` instead. Each slot
    /// is rewritten through the per-opcode typing rules; afterwards `of` has
    /// an empty use-list.
    pub fn replace_uses(&mut self, of: InstRef, with: InstRef) -> Result<(), IrError> {
        if of == with {
            return Ok(());
        }
        if self.get_inst(with).is_none() {
            return Err(IrError::InstructionNotFound { inst: with });
        }
        let users: Vec<InstRef> = self
            .get_inst(of)
            .ok_or(IrError::InstructionNotFound { inst: of })?
            .users()
            .collect();
        for user in users {
            self.rewrite_operand(user, of, with)?;
        }
        Ok(())
    }

    /// `replace_uses(at, with)` followed by removal of `at`.
    pub fn replace_inst(&mut self, at: InstRef, with: InstRef) -> Result<(), IrError> {
        self.replace_uses(at, with)?;
        self.remove_inst(at)
    }

    /// Rewrites both operand slots of a binary operation, re-checking types
    /// and maintaining use-lists.
    pub fn set_binary_operands(
        &mut self,
        r: InstRef,
        new_lhs: InstRef,
        new_rhs: InstRef,
    ) -> Result<(), IrError> {
        let inst = self
            .get_inst(r)
            .ok_or(IrError::InstructionNotFound { inst: r })?;
        let ty = inst.ty();
        let (old_lhs, old_rhs) = match inst.kind() {
            InstKind::Binary { lhs, rhs } => (*lhs, *rhs),
            _ => {
                return Err(IrError::UnexpectedOpcode {
                    inst: r,
                    found: inst.opcode(),
                })
            }
        };
        let lhs_ty = self.operand_type(new_lhs)?;
        let rhs_ty = self.operand_type(new_rhs)?;
        if lhs_ty != ty || rhs_ty != ty {
            return Err(IrError::OperandsTypeMismatch {
                lhs: lhs_ty,
                rhs: rhs_ty,
            });
        }
        if let Some(inst) = self.inst_mut(r) {
            if let InstKind::Binary { lhs, rhs } = inst.kind_mut() {
                *lhs = new_lhs;
                *rhs = new_rhs;
            }
        }
        for op in [new_lhs, new_rhs] {
            if let Some(def) = self.inst_mut(op) {
                def.add_user(r);
            }
        }
        for old in [old_lhs, old_rhs] {
            if old != new_lhs && old != new_rhs {
                if let Some(def) = self.inst_mut(old) {
                    def.remove_user(r);
                }
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Phi records
    // -----------------------------------------------------------------------

    /// Adds (or replaces) the incoming record for `pred`. The value must
    /// share the phi's declared type.
    pub fn phi_add_path(
        &mut self,
        phi: InstRef,
        pred: BlockId,
        value: InstRef,
    ) -> Result<(), IrError> {
        if !self.blocks.contains(pred) {
            return Err(IrError::BlockNotFound { id: pred });
        }
        let value_ty = self.operand_type(value)?;
        let phi_ty = self.expect_phi(phi)?;
        if value_ty != phi_ty {
            return Err(IrError::PhiTypeMismatch {
                expected: phi_ty,
                found: value_ty,
            });
        }
        let mut replaced = None;
        if let Some(inst) = self.inst_mut(phi) {
            if let InstKind::Phi { incoming } = inst.kind_mut() {
                replaced = incoming.insert(pred, value);
            }
        }
        if let Some(def) = self.inst_mut(value) {
            def.add_user(phi);
        }
        if let Some(old) = replaced {
            if old != value {
                self.phi_retract_user(phi, old);
            }
        }
        Ok(())
    }

    /// Removes the incoming record for `pred`, if present.
    pub fn phi_remove_path(&mut self, phi: InstRef, pred: BlockId) -> Result<(), IrError> {
        self.expect_phi(phi)?;
        let mut removed = None;
        if let Some(inst) = self.inst_mut(phi) {
            if let InstKind::Phi { incoming } = inst.kind_mut() {
                removed = incoming.shift_remove(&pred);
            }
        }
        if let Some(value) = removed {
            self.phi_retract_user(phi, value);
        }
        Ok(())
    }

    /// The value flowing in from `pred`, if recorded.
    pub fn phi_value_for(&self, phi: InstRef, pred: BlockId) -> Option<InstRef> {
        match self.get_inst(phi)?.kind() {
            InstKind::Phi { incoming } => incoming.get(&pred).copied(),
            _ => None,
        }
    }

    /// All `(predecessor, value)` records of a phi, in record order.
    pub fn phi_records(&self, phi: InstRef) -> Vec<(BlockId, InstRef)> {
        match self.get_inst(phi).map(Instruction::kind) {
            Some(InstKind::Phi { incoming }) => {
                incoming.iter().map(|(b, v)| (*b, *v)).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Rewrites every record holding `from` to hold `to`.
    pub fn phi_replace_value(
        &mut self,
        phi: InstRef,
        from: InstRef,
        to: InstRef,
    ) -> Result<(), IrError> {
        self.expect_phi(phi)?;
        self.rewrite_operand(phi, from, to)
    }

    fn expect_phi(&self, phi: InstRef) -> Result<Type, IrError> {
        let inst = self
            .get_inst(phi)
            .ok_or(IrError::InstructionNotFound { inst: phi })?;
        match inst.kind() {
            InstKind::Phi { .. } => Ok(inst.ty()),
            _ => Err(IrError::UnexpectedOpcode {
                inst: phi,
                found: inst.opcode(),
            }),
        }
    }

    /// Drops the `phi -> value` use edge unless another record still
    /// references `value`.
    fn phi_retract_user(&mut self, phi: InstRef, value: InstRef) {
        let still_referenced = match self.get_inst(phi).map(Instruction::kind) {
            Some(InstKind::Phi { incoming }) => incoming.values().any(|&v| v == value),
            _ => false,
        };
        if !still_referenced {
            if let Some(def) = self.inst_mut(value) {
                def.remove_user(phi);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn check_pos(&self, pos: InstRef) -> Result<(), IrError> {
        if self.get_inst(pos).is_none() {
            return Err(IrError::InstructionNotFound { inst: pos });
        }
        Ok(())
    }

    fn common_operand_type(&self, lhs: InstRef, rhs: InstRef) -> Result<Type, IrError> {
        let lhs_ty = self.operand_type(lhs)?;
        let rhs_ty = self.operand_type(rhs)?;
        if lhs_ty != rhs_ty || !lhs_ty.is_integer() {
            return Err(IrError::OperandsTypeMismatch {
                lhs: lhs_ty,
                rhs: rhs_ty,
            });
        }
        Ok(lhs_ty)
    }

    /// Links a fully validated instruction into `block` and registers its
    /// use/predecessor edges.
    fn attach(
        &mut self,
        block: BlockId,
        before: Option<InstId>,
        inst: Instruction,
    ) -> Result<InstRef, IrError> {
        let operands = inst.operands();
        let targets = inst.successor_blocks();
        let bb = self
            .blocks
            .get_mut(block)
            .ok_or(IrError::BlockNotFound { id: block })?;
        let inst_id = match before {
            Some(pos) => {
                if !bb.contains(pos) {
                    return Err(IrError::InstructionNotFound {
                        inst: InstRef::new(block, pos),
                    });
                }
                bb.insts_mut().insert_before(pos, inst)
            }
            None => bb.insts_mut().push_back(inst),
        };
        let r = InstRef::new(block, inst_id);
        for op in operands {
            if let Some(def) = self.inst_mut(op) {
                def.add_user(r);
            }
        }
        for target in targets {
            if let Some(tb) = self.blocks.get_mut(target) {
                tb.preds_mut().insert(block);
            }
        }
        Ok(r)
    }

    /// Rewrites every operand slot of `user` equal to `from` so it holds
    /// `to`, re-checking the slot's typing rule and updating use-lists.
    fn rewrite_operand(
        &mut self,
        user: InstRef,
        from: InstRef,
        to: InstRef,
    ) -> Result<(), IrError> {
        let to_ty = self.operand_type(to)?;
        let inst = self
            .get_inst(user)
            .ok_or(IrError::InstructionNotFound { inst: user })?;
        match inst.kind() {
            InstKind::Arg { .. } | InstKind::Const { .. } => return Ok(()),
            InstKind::Binary { .. } => {
                if to_ty != inst.ty() {
                    return Err(IrError::OperandsTypeMismatch {
                        lhs: inst.ty(),
                        rhs: to_ty,
                    });
                }
            }
            InstKind::ICmp { lhs, rhs, .. } => {
                let other = if *lhs == from { *rhs } else { *lhs };
                let expected = if other == from {
                    self.operand_type(from)?
                } else {
                    self.operand_type(other)?
                };
                if to_ty != expected {
                    return Err(IrError::OperandsTypeMismatch {
                        lhs: expected,
                        rhs: to_ty,
                    });
                }
            }
            InstKind::Ret { .. } => {
                if to_ty != self.return_type {
                    return Err(IrError::InvalidReturnType {
                        expected: self.return_type,
                        found: to_ty,
                    });
                }
            }
            InstKind::Branch { .. } => {
                if to_ty != Type::I1 {
                    return Err(IrError::InvalidConditionType { found: to_ty });
                }
            }
            InstKind::Phi { .. } => {
                if to_ty != inst.ty() {
                    return Err(IrError::PhiTypeMismatch {
                        expected: inst.ty(),
                        found: to_ty,
                    });
                }
            }
        }
        let mut changed = false;
        if let Some(inst) = self.inst_mut(user) {
            match inst.kind_mut() {
                InstKind::Binary { lhs, rhs } | InstKind::ICmp { lhs, rhs, .. } => {
                    if *lhs == from {
                        *lhs = to;
                        changed = true;
                    }
                    if *rhs == from {
                        *rhs = to;
                        changed = true;
                    }
                }
                InstKind::Ret { value } => {
                    if *value == Some(from) {
                        *value = Some(to);
                        changed = true;
                    }
                }
                InstKind::Branch { cond, .. } => {
                    if *cond == Some(from) {
                        *cond = Some(to);
                        changed = true;
                    }
                }
                InstKind::Phi { incoming } => {
                    for slot in incoming.values_mut() {
                        if *slot == from {
                            *slot = to;
                            changed = true;
                        }
                    }
                }
                InstKind::Arg { .. } | InstKind::Const { .. } => {}
            }
        }
        if changed {
            if let Some(def) = self.inst_mut(to) {
                def.add_user(user);
            }
            if let Some(def) = self.inst_mut(from) {
                def.remove_user(user);
            }
        }
        Ok(())
    }
}

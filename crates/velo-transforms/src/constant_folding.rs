//! Constant folding.
//!
//! Walks blocks in reverse post-order and instructions front to back. A
//! binary operation or comparison whose operands are both constants is
//! computed at its declared bit width and replaced by a fresh constant
//! inserted immediately before it; the original instruction's users are
//! redirected to the new constant and the original is erased.
//!
//! Arithmetic wraps on overflow in the declared width. The signed
//! operations (`SDiv`, `SRem`, `ShrA` and the signed comparison kinds)
//! sign-extend the stored bit pattern from the declared width. Division or
//! remainder by zero and shifts by at least the operand width are left
//! unchanged.

use tracing::debug;

use velo_ir::{CmpKind, Function, InstKind, InstRef, IrError, Opcode, Type};

use crate::pass::{reverse_post_order, Pass};

/// The constant-folding pass.
#[derive(Debug, Default)]
pub struct ConstantFolding;

impl Pass for ConstantFolding {
    fn name(&self) -> &'static str {
        "constant-folding"
    }

    fn run(&mut self, func: &mut Function) -> Result<(), IrError> {
        let mut folded = 0usize;
        for block in reverse_post_order(func) {
            let mut cur = func
                .get_block(block)
                .and_then(|bb| bb.first())
                .map(|inst| InstRef::new(block, inst));
            while let Some(r) = cur {
                match try_fold(func, r) {
                    Some((ty, value)) => {
                        let constant = func.insert_const_before(r, ty, value)?;
                        func.replace_inst(r, constant)?;
                        folded += 1;
                        cur = func.next_inst(constant);
                    }
                    None => cur = func.next_inst(r),
                }
            }
        }
        debug!(function = func.name(), folded, "constant folding finished");
        Ok(())
    }
}

/// The replacement constant for `r`, when both operands are constants and
/// the operation is defined on them.
fn try_fold(func: &Function, r: InstRef) -> Option<(Type, u64)> {
    let inst = func.get_inst(r)?;
    match inst.kind() {
        InstKind::Binary { lhs, rhs } => {
            let lhs = func.get_inst(*lhs)?.const_value()?;
            let rhs = func.get_inst(*rhs)?.const_value()?;
            let value = eval_binary(inst.opcode(), inst.ty(), lhs, rhs)?;
            Some((inst.ty(), value))
        }
        InstKind::ICmp { kind, lhs, rhs } => {
            let operand_ty = func.get_inst(*lhs)?.ty();
            let lhs = func.get_inst(*lhs)?.const_value()?;
            let rhs = func.get_inst(*rhs)?.const_value()?;
            let value = eval_icmp(*kind, operand_ty, lhs, rhs)?;
            Some((Type::I1, value as u64))
        }
        _ => None,
    }
}

/// Evaluates a binary opcode over two in-range magnitudes of `ty`.
/// `None` when the operation is not folded (division by zero, oversized
/// shift count).
pub(crate) fn eval_binary(opcode: Opcode, ty: Type, lhs: u64, rhs: u64) -> Option<u64> {
    let width = ty.bit_width()?;
    let mask = ty.max_value()?;
    let trunc = |v: u64| v & mask;
    match opcode {
        Opcode::Add => Some(trunc(lhs.wrapping_add(rhs))),
        Opcode::Sub => Some(trunc(lhs.wrapping_sub(rhs))),
        Opcode::Mul => Some(trunc(lhs.wrapping_mul(rhs))),
        Opcode::UDiv => (rhs != 0).then(|| lhs / rhs),
        Opcode::URem => (rhs != 0).then(|| lhs % rhs),
        Opcode::SDiv => (rhs != 0)
            .then(|| trunc(sign_extend(lhs, width).wrapping_div(sign_extend(rhs, width)) as u64)),
        Opcode::SRem => (rhs != 0)
            .then(|| trunc(sign_extend(lhs, width).wrapping_rem(sign_extend(rhs, width)) as u64)),
        Opcode::Shl => (rhs < width as u64).then(|| trunc(lhs << (rhs as u32))),
        Opcode::ShrL => (rhs < width as u64).then(|| lhs >> (rhs as u32)),
        Opcode::ShrA => {
            (rhs < width as u64).then(|| trunc((sign_extend(lhs, width) >> (rhs as u32)) as u64))
        }
        Opcode::And => Some(lhs & rhs),
        Opcode::Or => Some(lhs | rhs),
        Opcode::Xor => Some(lhs ^ rhs),
        _ => None,
    }
}

/// Evaluates a comparison over two in-range magnitudes of `ty`.
pub(crate) fn eval_icmp(kind: CmpKind, ty: Type, lhs: u64, rhs: u64) -> Option<bool> {
    if kind.is_signed() {
        let width = ty.bit_width()?;
        let (lhs, rhs) = (sign_extend(lhs, width), sign_extend(rhs, width));
        match kind {
            CmpKind::Sgt => Some(lhs > rhs),
            CmpKind::Sge => Some(lhs >= rhs),
            CmpKind::Slt => Some(lhs < rhs),
            CmpKind::Sle => Some(lhs <= rhs),
            _ => None,
        }
    } else {
        match kind {
            CmpKind::Eq => Some(lhs == rhs),
            CmpKind::Ne => Some(lhs != rhs),
            CmpKind::Ugt => Some(lhs > rhs),
            CmpKind::Uge => Some(lhs >= rhs),
            CmpKind::Ult => Some(lhs < rhs),
            CmpKind::Ule => Some(lhs <= rhs),
            _ => None,
        }
    }
}

/// Reinterprets the low `width` bits of `v` as a two's-complement value.
fn sign_extend(v: u64, width: u32) -> i64 {
    let shift = 64 - width;
    ((v << shift) as i64) >> shift
}

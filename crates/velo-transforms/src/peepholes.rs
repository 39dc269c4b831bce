//! Peephole simplifications.
//!
//! Walks blocks in reverse post-order, dispatching on opcode. The rules:
//!
//! * `and`: zero annihilates, all-ones is identity, `x & x = x`, and two
//!   constants threaded through chained `and`s merge into one.
//! * `or`: zero is identity, all-ones annihilates, `x | x = x`, constant
//!   chain merging.
//! * `xor`: zero is identity, `x ^ x` becomes a fresh zero constant,
//!   constant chain merging.
//! * `add`: zero is identity; `x + (0 - w)` is rewritten to `x - w`.
//! * `shrl`: shift by zero yields the operand, shifting zero yields zero.
//!
//! Chain merging turns `k1 op (k2 op v)` (any rotation of the constant and
//! the inner instruction) into `v op k` with `k = k1 op k2` held by a new
//! constant inserted just before the rewritten instruction. After any
//! rewrite the walk resumes at the successor of the rewritten position.

use tracing::debug;

use velo_ir::{Function, InstKind, InstRef, IrError, Opcode};

use crate::pass::{reverse_post_order, Pass};

/// The peephole-simplification pass.
#[derive(Debug, Default)]
pub struct Peephole;

impl Pass for Peephole {
    fn name(&self) -> &'static str {
        "peepholes"
    }

    fn run(&mut self, func: &mut Function) -> Result<(), IrError> {
        let mut rewritten = 0usize;
        for block in reverse_post_order(func) {
            let mut cur = func
                .get_block(block)
                .and_then(|bb| bb.first())
                .map(|inst| InstRef::new(block, inst));
            while let Some(r) = cur {
                let next = func.next_inst(r);
                let changed = match func.get_inst(r).map(|inst| inst.opcode()) {
                    Some(Opcode::And) => process_and(func, r)?,
                    Some(Opcode::Or) => process_or(func, r)?,
                    Some(Opcode::Xor) => process_xor(func, r)?,
                    Some(Opcode::Add) => process_add(func, r)?,
                    Some(Opcode::ShrL) => process_shrl(func, r)?,
                    _ => false,
                };
                if changed {
                    rewritten += 1;
                }
                cur = next;
            }
        }
        debug!(function = func.name(), rewritten, "peepholes finished");
        Ok(())
    }
}

fn process_and(func: &mut Function, r: InstRef) -> Result<bool, IrError> {
    let Some((lhs, rhs)) = binary_operands(func, r) else {
        return Ok(false);
    };
    let all_ones = func.get_inst(r).and_then(|inst| inst.ty().max_value());
    if let Some(value) = const_value(func, lhs) {
        if value == 0 {
            // 0 & x -> 0
            func.replace_inst(r, lhs)?;
        } else if Some(value) == all_ones {
            // 1..1 & x -> x
            func.replace_inst(r, rhs)?;
        } else {
            return try_merge_chain(func, r, Opcode::And);
        }
    } else if let Some(value) = const_value(func, rhs) {
        if value == 0 {
            // x & 0 -> 0
            func.replace_inst(r, rhs)?;
        } else if Some(value) == all_ones {
            // x & 1..1 -> x
            func.replace_inst(r, lhs)?;
        } else {
            return try_merge_chain(func, r, Opcode::And);
        }
    } else if lhs == rhs {
        // x & x -> x
        func.replace_inst(r, lhs)?;
    } else {
        return Ok(false);
    }
    Ok(true)
}

fn process_or(func: &mut Function, r: InstRef) -> Result<bool, IrError> {
    let Some((lhs, rhs)) = binary_operands(func, r) else {
        return Ok(false);
    };
    let all_ones = func.get_inst(r).and_then(|inst| inst.ty().max_value());
    if let Some(value) = const_value(func, lhs) {
        if value == 0 {
            // 0 | x -> x
            func.replace_inst(r, rhs)?;
        } else if Some(value) == all_ones {
            // 1..1 | x -> 1..1
            func.replace_inst(r, lhs)?;
        } else {
            return try_merge_chain(func, r, Opcode::Or);
        }
    } else if let Some(value) = const_value(func, rhs) {
        if value == 0 {
            // x | 0 -> x
            func.replace_inst(r, lhs)?;
        } else if Some(value) == all_ones {
            // x | 1..1 -> 1..1
            func.replace_inst(r, rhs)?;
        } else {
            return try_merge_chain(func, r, Opcode::Or);
        }
    } else if lhs == rhs {
        // x | x -> x
        func.replace_inst(r, lhs)?;
    } else {
        return Ok(false);
    }
    Ok(true)
}

fn process_xor(func: &mut Function, r: InstRef) -> Result<bool, IrError> {
    let Some((lhs, rhs)) = binary_operands(func, r) else {
        return Ok(false);
    };
    if let Some(value) = const_value(func, lhs) {
        if value == 0 {
            // 0 ^ x -> x
            func.replace_inst(r, rhs)?;
            return Ok(true);
        }
        return try_merge_chain(func, r, Opcode::Xor);
    }
    if let Some(value) = const_value(func, rhs) {
        if value == 0 {
            // x ^ 0 -> x
            func.replace_inst(r, lhs)?;
            return Ok(true);
        }
        return try_merge_chain(func, r, Opcode::Xor);
    }
    if lhs == rhs {
        // x ^ x -> 0
        let ty = func
            .get_inst(r)
            .ok_or(IrError::InstructionNotFound { inst: r })?
            .ty();
        let zero = func.insert_const_before(r, ty, 0)?;
        func.replace_inst(r, zero)?;
        return Ok(true);
    }
    Ok(false)
}

fn process_add(func: &mut Function, r: InstRef) -> Result<bool, IrError> {
    let Some((lhs, rhs)) = binary_operands(func, r) else {
        return Ok(false);
    };
    if const_value(func, lhs) == Some(0) {
        // 0 + x -> x
        func.replace_inst(r, rhs)?;
        return Ok(true);
    }
    if const_value(func, rhs) == Some(0) {
        // x + 0 -> x
        func.replace_inst(r, lhs)?;
        return Ok(true);
    }
    // x + (0 - w) -> x - w
    if let Some(w) = negated_operand(func, rhs) {
        let sub = func.insert_binary_before(r, Opcode::Sub, lhs, w)?;
        func.replace_inst(r, sub)?;
        return Ok(true);
    }
    if let Some(w) = negated_operand(func, lhs) {
        let sub = func.insert_binary_before(r, Opcode::Sub, rhs, w)?;
        func.replace_inst(r, sub)?;
        return Ok(true);
    }
    Ok(false)
}

fn process_shrl(func: &mut Function, r: InstRef) -> Result<bool, IrError> {
    let Some((lhs, rhs)) = binary_operands(func, r) else {
        return Ok(false);
    };
    if const_value(func, rhs) == Some(0) {
        // x >> 0 -> x
        func.replace_inst(r, lhs)?;
        return Ok(true);
    }
    if const_value(func, lhs) == Some(0) {
        // 0 >> y -> 0
        func.replace_inst(r, lhs)?;
        return Ok(true);
    }
    Ok(false)
}

/// Merges `k1 op (k2 op v)` (in any rotation) into `v op (k1 op k2)`.
fn try_merge_chain(func: &mut Function, r: InstRef, op: Opcode) -> Result<bool, IrError> {
    let Some((lhs, rhs)) = binary_operands(func, r) else {
        return Ok(false);
    };
    let merged = match (const_value(func, lhs), const_value(func, rhs)) {
        (Some(k1), None) => inner_chain(func, rhs, op).map(|(v, k2)| (v, k1, k2)),
        (None, Some(k1)) => inner_chain(func, lhs, op).map(|(v, k2)| (v, k1, k2)),
        _ => None,
    };
    let Some((kept, k1, k2)) = merged else {
        return Ok(false);
    };
    let folded = match op {
        Opcode::And => k1 & k2,
        Opcode::Or => k1 | k2,
        Opcode::Xor => k1 ^ k2,
        _ => return Ok(false),
    };
    let ty = func
        .get_inst(r)
        .ok_or(IrError::InstructionNotFound { inst: r })?
        .ty();
    let constant = func.insert_const_before(r, ty, folded)?;
    func.set_binary_operands(r, kept, constant)?;
    Ok(true)
}

/// For an inner instruction of the chained opcode with exactly one constant
/// operand, the non-constant operand and the constant's value.
fn inner_chain(func: &Function, x: InstRef, op: Opcode) -> Option<(InstRef, u64)> {
    let inst = func.get_inst(x)?;
    if inst.opcode() != op {
        return None;
    }
    let InstKind::Binary { lhs, rhs } = inst.kind() else {
        return None;
    };
    if let Some(k) = const_value(func, *lhs) {
        return Some((*rhs, k));
    }
    if let Some(k) = const_value(func, *rhs) {
        return Some((*lhs, k));
    }
    None
}

/// `Some(w)` iff `x` is `0 - w`.
fn negated_operand(func: &Function, x: InstRef) -> Option<InstRef> {
    let inst = func.get_inst(x)?;
    if inst.opcode() != Opcode::Sub {
        return None;
    }
    let InstKind::Binary { lhs, rhs } = inst.kind() else {
        return None;
    };
    if const_value(func, *lhs) == Some(0) {
        Some(*rhs)
    } else {
        None
    }
}

fn binary_operands(func: &Function, r: InstRef) -> Option<(InstRef, InstRef)> {
    match func.get_inst(r)?.kind() {
        InstKind::Binary { lhs, rhs } => Some((*lhs, *rhs)),
        _ => None,
    }
}

fn const_value(func: &Function, r: InstRef) -> Option<u64> {
    func.get_inst(r)?.const_value()
}

//! Textual form of functions.
//!
//! ```text
//! <ret_type> <name>(<arg_type>, ...):
//! %bb<N>: preds: %bb<P1>, %bb<P2>
//!     %<B>.<I> = <type> <mnemonic> <operands...> ; used by: %<B>.<I>, ...
//! ```
//!
//! Instructions producing no value (terminators) drop the `= <type>` part.
//! Output is deterministic: predecessors print sorted by block id, use-lists
//! and phi records in registration order.

use std::fmt;

use crate::error::IrError;
use crate::function::Function;
use crate::id::InstRef;
use crate::inst::{InstKind, Instruction};

impl Function {
    /// Renders the whole function.
    ///
    /// Fails with [`IrError::InsufficientPhiRecords`] if a phi has fewer
    /// than two incoming records, and with a lookup error if an operand
    /// handle has gone stale.
    pub fn dump(&self) -> Result<String, IrError> {
        let mut out = String::new();
        let params: Vec<String> = self.params().iter().map(|t| t.to_string()).collect();
        out.push_str(&format!(
            "{} {}({}):\n",
            self.return_type(),
            self.name(),
            params.join(", ")
        ));
        for (block_id, block) in self.iter_blocks() {
            out.push_str(&format!("%bb{block_id}:"));
            if block.predecessors_count() > 0 {
                let preds: Vec<String> = block
                    .predecessors()
                    .map(|p| format!("%bb{p}"))
                    .collect();
                out.push_str(&format!(" preds: {}", preds.join(", ")));
            }
            out.push('\n');
            for (inst_id, inst) in block.iter_insts() {
                let r = InstRef::new(block_id, inst_id);
                out.push_str("    ");
                out.push_str(&self.inst_text(r, inst)?);
                out.push('\n');
            }
        }
        Ok(out)
    }

    fn inst_text(&self, r: InstRef, inst: &Instruction) -> Result<String, IrError> {
        let users = users_suffix(inst);
        let text = match inst.kind() {
            InstKind::Arg { index } => {
                format!("{r} = {} arg [{index}]{users}", inst.ty())
            }
            InstKind::Const { value } => {
                format!("{r} = {} constant {value}{users}", inst.ty())
            }
            InstKind::Binary { lhs, rhs } => {
                format!(
                    "{r} = {} {} {lhs}, {rhs}{users}",
                    inst.ty(),
                    inst.opcode()
                )
            }
            InstKind::ICmp { kind, lhs, rhs } => {
                let operand_ty = self.operand_type(*lhs)?;
                format!("{r} = icmp {kind} {operand_ty} {lhs}, {rhs}{users}")
            }
            InstKind::Branch {
                cond: None,
                then_block,
                ..
            } => {
                format!("{r} br label %bb{then_block}{users}")
            }
            InstKind::Branch {
                cond: Some(cond),
                then_block,
                else_block,
            } => {
                let else_block = else_block.unwrap_or(*then_block);
                format!("{r} br i1 {cond}, label %bb{then_block}, label %bb{else_block}{users}")
            }
            InstKind::Ret { value: Some(value) } => {
                let value_ty = self.operand_type(*value)?;
                format!("{r} ret {value_ty} {value}")
            }
            InstKind::Ret { value: None } => {
                format!("{r} ret void")
            }
            InstKind::Phi { incoming } => {
                if incoming.len() < 2 {
                    return Err(IrError::InsufficientPhiRecords { inst: r });
                }
                let records: Vec<String> = incoming
                    .iter()
                    .map(|(pred, value)| format!("[{value}, %bb{pred}]"))
                    .collect();
                format!("{r} = phi {} {}{users}", inst.ty(), records.join(", "))
            }
        };
        Ok(text)
    }
}

fn users_suffix(inst: &Instruction) -> String {
    if inst.users_count() == 0 {
        return String::new();
    }
    let list: Vec<String> = inst.users().map(|u| u.to_string()).collect();
    format!(" ; used by: {}", list.join(", "))
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dump() {
            Ok(text) => f.write_str(&text),
            Err(_) => Err(fmt::Error),
        }
    }
}

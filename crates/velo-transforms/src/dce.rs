//! Dead-code elimination.
//!
//! Phase 1 removes every block the entry DFS never reaches; block removal
//! retracts predecessor links from surviving successors and use-list edges
//! into surviving instructions. Phase 2 removes value-producing
//! instructions with empty use-lists, iterating to a fixpoint so that
//! def-use chains whose heads die first are fully cleaned up. Terminators
//! and other `none`-typed instructions are never removed.

use tracing::debug;

use velo_graphs::Dfs;
use velo_ir::{Function, InstRef, IrError};

use crate::pass::Pass;

/// The dead-code-elimination pass.
#[derive(Debug, Default)]
pub struct Dce;

impl Pass for Dce {
    fn name(&self) -> &'static str {
        "dce"
    }

    fn run(&mut self, func: &mut Function) -> Result<(), IrError> {
        let blocks_removed = remove_unreachable_blocks(func)?;
        let insts_removed = remove_unused_instructions(func)?;
        debug!(
            function = func.name(),
            blocks_removed, insts_removed, "dce finished"
        );
        Ok(())
    }
}

fn remove_unreachable_blocks(func: &mut Function) -> Result<usize, IrError> {
    let Some(entry) = func.entry_block() else {
        return Ok(0);
    };
    let dfs = Dfs::new(&*func, entry, &[]);
    let dead: Vec<_> = func.blocks().filter(|&b| !dfs.contains(b)).collect();
    for block in &dead {
        func.remove_block(*block)?;
    }
    Ok(dead.len())
}

fn remove_unused_instructions(func: &mut Function) -> Result<usize, IrError> {
    let mut removed = 0usize;
    loop {
        let mut removed_this_round = false;
        let blocks: Vec<_> = func.blocks().collect();
        for block in blocks {
            let insts: Vec<_> = match func.get_block(block) {
                Some(bb) => bb.insts().collect(),
                None => continue,
            };
            for inst_id in insts {
                let r = InstRef::new(block, inst_id);
                let dead = func
                    .get_inst(r)
                    .map_or(false, |inst| inst.ty().is_integer() && inst.users_count() == 0);
                if dead {
                    func.remove_inst(r)?;
                    removed += 1;
                    removed_this_round = true;
                }
            }
        }
        if !removed_this_round {
            return Ok(removed);
        }
    }
}

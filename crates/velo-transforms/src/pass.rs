//! The pass interface and shared walking order.

use velo_graphs::Dfs;
use velo_ir::{BlockId, Function, IrError};

/// A function-level rewrite. Passes run to completion; a failure reports an
/// IR error and may leave the function partially rewritten but consistent
/// (every individual mutation preserves the invariants).
pub trait Pass {
    fn name(&self) -> &'static str;

    fn run(&mut self, func: &mut Function) -> Result<(), IrError>;
}

/// Blocks in reverse post-order from the entry: every block after all of its
/// non-back-edge predecessors. Empty for a function with no blocks.
pub(crate) fn reverse_post_order(func: &Function) -> Vec<BlockId> {
    match func.entry_block() {
        Some(entry) => {
            let dfs = Dfs::new(func, entry, &[]);
            dfs.post_order().iter().rev().copied().collect()
        }
        None => Vec::new(),
    }
}

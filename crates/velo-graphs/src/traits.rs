//! Uniform view over directed flow graphs.
//!
//! Any graph exposing vertices, successor/predecessor adjacency and a
//! distinguished entry vertex can feed the analyses in this crate.
//! [`Reversed`] adapts a graph by swapping the two adjacency directions
//! while keeping the entry, which is how the loop tree walks a CFG
//! backwards from a latch.

use std::fmt::Debug;
use std::hash::Hash;

use velo_ir::{BlockId, Function};

/// A directed graph with a distinguished entry (source) vertex.
pub trait FlowGraph {
    /// Cheap vertex handle; copyable, hashable, totally ordered.
    type Vertex: Copy + Eq + Hash + Ord + Debug;

    fn vertex_count(&self) -> usize;

    fn vertices(&self) -> impl Iterator<Item = Self::Vertex> + '_;

    /// Vertices `u` with an edge `v -> u`.
    fn successors(&self, v: Self::Vertex) -> impl Iterator<Item = Self::Vertex> + '_;

    /// Vertices `u` with an edge `u -> v`.
    fn predecessors(&self, v: Self::Vertex) -> impl Iterator<Item = Self::Vertex> + '_;

    /// The entry vertex every path starts from.
    fn entry(&self) -> Self::Vertex;
}

/// View of a graph with every edge turned around. The entry stays the
/// underlying graph's entry; it is the caller's business to start traversals
/// from a meaningful vertex.
pub struct Reversed<'g, G>(pub &'g G);

impl<G: FlowGraph> FlowGraph for Reversed<'_, G> {
    type Vertex = G::Vertex;

    fn vertex_count(&self) -> usize {
        self.0.vertex_count()
    }

    fn vertices(&self) -> impl Iterator<Item = Self::Vertex> + '_ {
        self.0.vertices()
    }

    fn successors(&self, v: Self::Vertex) -> impl Iterator<Item = Self::Vertex> + '_ {
        self.0.predecessors(v)
    }

    fn predecessors(&self, v: Self::Vertex) -> impl Iterator<Item = Self::Vertex> + '_ {
        self.0.successors(v)
    }

    fn entry(&self) -> Self::Vertex {
        self.0.entry()
    }
}

/// A function's CFG: vertices are block ids, edges follow terminators.
impl FlowGraph for Function {
    type Vertex = BlockId;

    fn vertex_count(&self) -> usize {
        self.blocks_count()
    }

    fn vertices(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks()
    }

    fn successors(&self, v: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.get_block(v)
            .map(|b| b.successors())
            .unwrap_or_default()
            .into_iter()
    }

    fn predecessors(&self, v: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.get_block(v).into_iter().flat_map(|b| b.predecessors())
    }

    /// Panics on a function with no blocks; analyses require an entry.
    fn entry(&self) -> BlockId {
        self.entry_block()
            .expect("a flow graph needs an entry block")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use velo_ir::Type;

    #[test]
    fn function_cfg_adjacency() {
        let mut f = Function::new("g", Type::Void, vec![]);
        let b0 = f.append_block();
        let b1 = f.append_block();
        let b2 = f.append_block();
        let cond = f.append_const(b0, Type::I1, 0).unwrap();
        f.append_cond_br(b0, cond, b1, b2).unwrap();
        f.append_br(b1, b2).unwrap();

        assert_eq!(f.vertex_count(), 3);
        assert_eq!(f.entry(), b0);
        let succs: Vec<BlockId> = f.successors(b0).collect();
        assert_eq!(succs, vec![b1, b2]);
        let preds: Vec<BlockId> = f.predecessors(b2).collect();
        assert_eq!(preds, vec![b0, b1]);
    }

    #[test]
    fn reversed_swaps_directions() {
        let mut f = Function::new("g", Type::Void, vec![]);
        let b0 = f.append_block();
        let b1 = f.append_block();
        f.append_br(b0, b1).unwrap();

        let rev = Reversed(&f);
        assert_eq!(rev.entry(), b0);
        let succs: Vec<BlockId> = rev.successors(b1).collect();
        assert_eq!(succs, vec![b0]);
        let preds: Vec<BlockId> = rev.predecessors(b0).collect();
        assert_eq!(preds, vec![b1]);
    }
}

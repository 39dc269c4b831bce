//! Dominator tree via the Lengauer–Tarjan semidominator algorithm.
//!
//! For every vertex except the entry, computes the immediate dominator: the
//! nearest strict dominator. Three passes over the DFS of the graph:
//!
//! 1. Reverse pre-order (entry excluded): `sdom(w)` is the minimum, by
//!    discovery time, over (a) predecessors discovered before `w` and
//!    (b) `sdom(u)` of every already-processed `u` that is a spanning-tree
//!    ancestor of some predecessor of `w`.
//! 2. Reverse pre-order: walk the spanning tree from `w` up to (excluding)
//!    `sdom(w)`, taking the vertex `u` minimizing `sdom(u)`'s time; if
//!    `sdom(u) = sdom(w)` the idom is `sdom(w)`, otherwise tentatively `u`.
//! 3. Forward pre-order: wherever the tentative idom differs from the
//!    semidominator, replace it with its own (already final) idom.
//!
//! Predecessors the DFS never reached contribute nothing: a path through an
//! unreachable vertex is not a path from the entry.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::dfs::Dfs;
use crate::traits::FlowGraph;

/// Immediate-dominator map of a flow graph. The entry vertex is absent.
pub struct DominatorTree<V> {
    idom: HashMap<V, V>,
}

#[derive(Clone, Copy)]
struct SemiDom<V> {
    vertex: V,
    time: usize,
}

impl<V: Copy + Eq + Hash + Debug> DominatorTree<V> {
    /// Runs a fresh DFS from the graph's entry and computes the tree.
    pub fn new<G: FlowGraph<Vertex = V>>(g: &G) -> Self {
        let dfs = Dfs::new(g, g.entry(), &[]);
        Self::with_dfs(g, &dfs)
    }

    /// Computes the tree over an existing entry DFS of `g`.
    pub fn with_dfs<G: FlowGraph<Vertex = V>>(g: &G, dfs: &Dfs<V>) -> Self {
        let sdom = Self::semidominators(g, dfs);
        let idom = Self::idoms(dfs, &sdom);
        DominatorTree { idom }
    }

    pub fn contains(&self, v: V) -> bool {
        self.idom.contains_key(&v)
    }

    /// The immediate dominator of `v`; `None` for the entry and for
    /// vertices outside the graph.
    pub fn idom(&self, v: V) -> Option<V> {
        self.idom.get(&v).copied()
    }

    /// `(vertex, idom)` pairs, iteration order unspecified.
    pub fn iter(&self) -> impl Iterator<Item = (V, V)> + '_ {
        self.idom.iter().map(|(v, d)| (*v, *d))
    }

    /// `true` iff `v` dominates `u`: every path from the entry to `u`
    /// passes through `v`. Reflexive; walks `u`'s idom chain.
    pub fn is_dominator_of(&self, v: V, u: V) -> bool {
        let mut cur = u;
        loop {
            if cur == v {
                return true;
            }
            match self.idom.get(&cur) {
                Some(&d) => cur = d,
                None => return false,
            }
        }
    }

    fn semidominators<G: FlowGraph<Vertex = V>>(
        g: &G,
        dfs: &Dfs<V>,
    ) -> HashMap<V, SemiDom<V>> {
        let mut sdom: HashMap<V, SemiDom<V>> = HashMap::with_capacity(dfs.len());
        let mut processed: Vec<V> = Vec::with_capacity(dfs.len());

        for &w in dfs.pre_order().iter().skip(1).rev() {
            let w_time = dfs.disc(w);
            let mut best: Option<SemiDom<V>> = None;

            // (a) predecessors discovered before w.
            for v in g.predecessors(w) {
                if !dfs.contains(v) {
                    continue;
                }
                let v_time = dfs.disc(v);
                if v_time < w_time && best.map_or(true, |b| v_time < b.time) {
                    best = Some(SemiDom {
                        vertex: v,
                        time: v_time,
                    });
                }
            }

            // (b) semidominators of processed vertices sitting above some
            // predecessor of w in the spanning tree.
            for &u in &processed {
                let anchored = g
                    .predecessors(w)
                    .any(|v| dfs.contains(v) && dfs.is_ancestor_of(v, u));
                if anchored {
                    let candidate = sdom[&u];
                    if best.map_or(true, |b| candidate.time < b.time) {
                        best = Some(candidate);
                    }
                }
            }

            // The spanning-tree parent of w is a predecessor discovered
            // earlier, so the candidate set is never empty.
            let found = best.expect("reachable non-entry vertex has a semidominator");
            sdom.insert(w, found);
            processed.push(w);
        }

        sdom
    }

    fn idoms(dfs: &Dfs<V>, sdom: &HashMap<V, SemiDom<V>>) -> HashMap<V, V> {
        let mut idom: HashMap<V, V> = HashMap::with_capacity(dfs.len());

        for &w in dfs.pre_order().iter().skip(1).rev() {
            let sdom_w = sdom[&w];
            // Minimum of sdom(x).time over the spanning-tree path from w
            // (inclusive) to sdom(w) (exclusive); first minimum wins.
            let mut u_best: Option<(V, usize)> = None;
            for x in dfs.ancestors(w) {
                if x == sdom_w.vertex {
                    break;
                }
                let x_time = sdom[&x].time;
                if u_best.map_or(true, |(_, t)| x_time < t) {
                    u_best = Some((x, x_time));
                }
            }
            let (u, _) = u_best.expect("path to the semidominator starts at w itself");
            if sdom[&u].vertex == sdom_w.vertex {
                idom.insert(w, sdom_w.vertex);
            } else {
                idom.insert(w, u);
            }
        }

        for &w in dfs.pre_order().iter().skip(1) {
            let current = idom[&w];
            if current != sdom[&w].vertex {
                let hoisted = idom[&current];
                idom.insert(w, hoisted);
            }
        }

        idom
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use velo_ir::{BlockId, Function, Type};

    fn flow_graph(n: usize, edges: &[(usize, &[usize])]) -> (Function, Vec<BlockId>) {
        let mut f = Function::new("g", Type::Void, vec![]);
        let blocks: Vec<BlockId> = (0..n).map(|_| f.append_block()).collect();
        let cond = f.append_const(blocks[0], Type::I1, 0).unwrap();
        for &(src, succs) in edges {
            match *succs {
                [t] => {
                    f.append_br(blocks[src], blocks[t]).unwrap();
                }
                [t, e] => {
                    f.append_cond_br(blocks[src], cond, blocks[t], blocks[e]).unwrap();
                }
                _ => {}
            }
        }
        (f, blocks)
    }

    fn assert_idoms(dom: &DominatorTree<BlockId>, b: &[BlockId], expected: &[(usize, usize)]) {
        for &(v, d) in expected {
            assert_eq!(dom.idom(b[v]), Some(b[d]), "idom of vertex {v}");
        }
    }

    // A -> B -> {C, F}; C -> D; F -> {E, G}; E -> D; G -> D.
    #[test]
    fn diamond_over_two_levels() {
        let (f, b) = flow_graph(
            7,
            &[
                (0, &[1]),
                (1, &[2, 5]),
                (2, &[3]),
                (4, &[3]),
                (5, &[4, 6]),
                (6, &[3]),
            ],
        );
        let dom = DominatorTree::new(&f);

        assert!(!dom.contains(b[0]));
        assert_idoms(&dom, &b, &[(1, 0), (2, 1), (3, 1), (4, 5), (5, 1), (6, 5)]);
    }

    // The ten-vertex example with back edges D->C, F->E, H->B:
    // A -> B -> {C, J}; C -> D; D -> {C, E}; E -> F; F -> {E, G};
    // G -> {H, I}; H -> B; I -> K; J -> C.
    #[test]
    fn chain_with_three_back_edges() {
        let (f, b) = flow_graph(
            11,
            &[
                (0, &[1]),
                (1, &[2, 9]),
                (2, &[3]),
                (3, &[2, 4]),
                (4, &[5]),
                (5, &[4, 6]),
                (6, &[7, 8]),
                (7, &[1]),
                (8, &[10]),
                (9, &[2]),
            ],
        );
        let dom = DominatorTree::new(&f);

        assert!(!dom.contains(b[0]));
        assert_idoms(
            &dom,
            &b,
            &[
                (1, 0),
                (2, 1),
                (3, 2),
                (4, 3),
                (5, 4),
                (6, 5),
                (7, 6),
                (8, 6),
                (9, 1),
                (10, 8),
            ],
        );
    }

    // Overlapping cycles:
    // A -> B -> {E, C}; C -> D; D -> G; E -> {F, D}; F -> {B, H};
    // G -> {C, I}; H -> {G, I}.
    #[test]
    fn overlapping_cycles() {
        let (f, b) = flow_graph(
            9,
            &[
                (0, &[1]),
                (1, &[4, 2]),
                (2, &[3]),
                (3, &[6]),
                (4, &[5, 3]),
                (5, &[1, 7]),
                (6, &[2, 8]),
                (7, &[6, 8]),
            ],
        );
        let dom = DominatorTree::new(&f);

        assert!(!dom.contains(b[0]));
        assert_idoms(
            &dom,
            &b,
            &[
                (1, 0),
                (2, 1),
                (3, 1),
                (4, 1),
                (5, 4),
                (6, 1),
                (7, 5),
                (8, 1),
            ],
        );
    }

    #[test]
    fn every_idom_actually_dominates() {
        let (f, b) = flow_graph(
            9,
            &[
                (0, &[1]),
                (1, &[4, 2]),
                (2, &[3]),
                (3, &[6]),
                (4, &[5, 3]),
                (5, &[1, 7]),
                (6, &[2, 8]),
                (7, &[6, 8]),
            ],
        );
        let dom = DominatorTree::new(&f);

        for (v, d) in dom.iter() {
            assert!(dom.is_dominator_of(d, v));
            assert!(!dom.is_dominator_of(v, d), "{v:?} cannot dominate its idom");
        }
        // The entry dominates everything.
        for &v in &b {
            assert!(dom.is_dominator_of(b[0], v));
        }
    }

    #[test]
    fn dominance_is_reflexive_and_respects_unreachable_vertices() {
        let (f, b) = flow_graph(3, &[(0, &[1])]);
        let dom = DominatorTree::new(&f);
        assert!(dom.is_dominator_of(b[1], b[1]));
        assert!(!dom.is_dominator_of(b[1], b[2]));
        assert!(!dom.contains(b[2]));
    }
}

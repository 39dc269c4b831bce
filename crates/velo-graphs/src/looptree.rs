//! Natural loops and their nesting.
//!
//! A CFG edge `latch -> header` is a back edge iff the header dominates the
//! latch. The natural loop of a back edge is the header plus every vertex
//! that reaches the latch without passing through the header -- found here by
//! a DFS over the reversed graph starting at the latch with the header
//! fenced off. Back edges are processed in DFS pre-order of the latch, so a
//! loop built later can only be an enclosing one: whenever a traversal
//! discovers the header of an already-built top-level loop, that loop is
//! re-parented into the new one.

use std::fmt::Debug;
use std::hash::Hash;

use indexmap::{IndexMap, IndexSet};

use crate::dfs::Dfs;
use crate::domtree::DominatorTree;
use crate::traits::{FlowGraph, Reversed};

/// One natural loop: header, body vertices, owned inner loops.
pub struct Loop<V> {
    header: V,
    vertices: IndexSet<V>,
    parent: Option<V>,
    inner: IndexMap<V, Loop<V>>,
}

impl<V: Copy + Eq + Hash + Debug> Loop<V> {
    fn new(header: V) -> Self {
        let mut vertices = IndexSet::new();
        vertices.insert(header);
        Loop {
            header,
            vertices,
            parent: None,
            inner: IndexMap::new(),
        }
    }

    pub fn header(&self) -> V {
        self.header
    }

    /// Header of the enclosing loop; `None` for a top-level loop.
    pub fn parent_header(&self) -> Option<V> {
        self.parent
    }

    pub fn vertices_count(&self) -> usize {
        self.vertices.len()
    }

    /// Body vertices, header included; insertion order.
    pub fn vertices(&self) -> impl Iterator<Item = V> + '_ {
        self.vertices.iter().copied()
    }

    pub fn contains_vertex(&self, v: V) -> bool {
        self.vertices.contains(&v)
    }

    pub fn inner_loops_count(&self) -> usize {
        self.inner.len()
    }

    pub fn inner_loops(&self) -> impl Iterator<Item = &Loop<V>> + '_ {
        self.inner.values()
    }

    pub fn get_inner_loop(&self, header: V) -> Option<&Loop<V>> {
        self.inner.get(&header)
    }
}

/// The nested hierarchy of natural loops of a flow graph.
pub struct LoopTree<V> {
    top_level: IndexMap<V, Loop<V>>,
}

impl<V: Copy + Eq + Hash + Debug> LoopTree<V> {
    pub fn new<G: FlowGraph<Vertex = V>>(g: &G) -> Self {
        let dfs = Dfs::new(g, g.entry(), &[]);
        let dom = DominatorTree::with_dfs(g, &dfs);

        let mut back_edges: Vec<(V, V)> = Vec::new();
        for &latch in dfs.pre_order() {
            for header in g.successors(latch) {
                if dom.is_dominator_of(header, latch) {
                    back_edges.push((latch, header));
                }
            }
        }

        let mut top_level: IndexMap<V, Loop<V>> = IndexMap::new();
        for (latch, header) in back_edges {
            let body = Dfs::new(&Reversed(g), latch, &[header]);
            let mut lp = Loop::new(header);
            for &v in body.post_order() {
                lp.vertices.insert(v);
                if let Some(mut inner) = top_level.shift_remove(&v) {
                    inner.parent = Some(header);
                    lp.inner.insert(v, inner);
                }
            }
            // A second back edge into an already-mapped header adds nothing.
            top_level.entry(header).or_insert(lp);
        }

        LoopTree { top_level }
    }

    /// Number of top-level loops.
    pub fn loops_count(&self) -> usize {
        self.top_level.len()
    }

    /// Top-level loops; iteration order unspecified.
    pub fn loops(&self) -> impl Iterator<Item = &Loop<V>> + '_ {
        self.top_level.values()
    }

    /// The top-level loop headed by `header`, if any.
    pub fn get_loop(&self, header: V) -> Option<&Loop<V>> {
        self.top_level.get(&header)
    }
}

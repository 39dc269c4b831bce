//! Iterative depth-first search with discovery/finish times.
//!
//! The traversal runs on an explicit frame stack -- no recursion -- so graphs
//! as large as the input permits can be walked without overflowing the call
//! stack. A single monotone counter is bumped on every discovery and every
//! finish (the source is discovered at time 1); the resulting `[disc, fin]`
//! intervals nest exactly along the spanning tree, which is what the
//! ancestor test relies on.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use crate::traits::FlowGraph;

/// Per-vertex traversal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DfsInfo<V> {
    /// Time the vertex was first reached.
    pub discovery: usize,
    /// Time the vertex's subtree was exhausted.
    pub finish: usize,
    /// Spanning-tree parent; `None` for the source.
    pub parent: Option<V>,
}

/// A completed depth-first traversal from one source vertex.
pub struct Dfs<V> {
    source: V,
    info: HashMap<V, DfsInfo<V>>,
    pre_order: Vec<V>,
    post_order: Vec<V>,
}

struct Frame<V> {
    vertex: V,
    succs: Vec<V>,
    next: usize,
}

impl<V: Copy + Eq + Hash + Debug> Dfs<V> {
    /// Traverses `g` from `source`, treating `already_visited` as virtually
    /// discovered: those vertices are excluded from the orders and from the
    /// spanning tree. A source listed there yields an empty traversal.
    pub fn new<G: FlowGraph<Vertex = V>>(g: &G, source: V, already_visited: &[V]) -> Self {
        let mut dfs = Dfs {
            source,
            info: HashMap::new(),
            pre_order: Vec::new(),
            post_order: Vec::new(),
        };

        let mut visited: HashSet<V> = already_visited.iter().copied().collect();
        if !visited.insert(source) {
            return dfs;
        }

        let mut time = 0usize;
        let mut stack: Vec<Frame<V>> = Vec::new();

        time += 1;
        dfs.info.insert(
            source,
            DfsInfo {
                discovery: time,
                finish: 0,
                parent: None,
            },
        );
        dfs.pre_order.push(source);
        stack.push(Frame {
            vertex: source,
            succs: g.successors(source).collect(),
            next: 0,
        });

        while let Some(frame) = stack.last_mut() {
            if frame.next < frame.succs.len() {
                let w = frame.succs[frame.next];
                frame.next += 1;
                let parent = frame.vertex;
                if visited.insert(w) {
                    time += 1;
                    dfs.info.insert(
                        w,
                        DfsInfo {
                            discovery: time,
                            finish: 0,
                            parent: Some(parent),
                        },
                    );
                    dfs.pre_order.push(w);
                    let succs = g.successors(w).collect();
                    stack.push(Frame {
                        vertex: w,
                        succs,
                        next: 0,
                    });
                }
            } else {
                let v = frame.vertex;
                stack.pop();
                time += 1;
                if let Some(info) = dfs.info.get_mut(&v) {
                    info.finish = time;
                }
                dfs.post_order.push(v);
            }
        }

        dfs
    }

    pub fn source(&self) -> V {
        self.source
    }

    /// Number of vertices the traversal reached.
    pub fn len(&self) -> usize {
        self.info.len()
    }

    pub fn is_empty(&self) -> bool {
        self.info.is_empty()
    }

    pub fn contains(&self, v: V) -> bool {
        self.info.contains_key(&v)
    }

    pub fn info(&self, v: V) -> Option<&DfsInfo<V>> {
        self.info.get(&v)
    }

    /// Vertices in discovery order.
    pub fn pre_order(&self) -> &[V] {
        &self.pre_order
    }

    /// Vertices in finish order.
    pub fn post_order(&self) -> &[V] {
        &self.post_order
    }

    /// Spanning-tree path from `v` to the source, both inclusive. Empty if
    /// the traversal never reached `v`.
    pub fn ancestors(&self, v: V) -> Ancestors<'_, V> {
        Ancestors {
            dfs: self,
            cur: if self.contains(v) { Some(v) } else { None },
        }
    }

    /// `true` iff `u`'s `[disc, fin]` interval contains `v`'s -- that is,
    /// `u` is a spanning-tree ancestor of `v` (or `v` itself).
    pub fn is_ancestor_of(&self, v: V, u: V) -> bool {
        let (Some(v_info), Some(u_info)) = (self.info.get(&v), self.info.get(&u)) else {
            return false;
        };
        u_info.discovery <= v_info.discovery && v_info.finish <= u_info.finish
    }

    pub fn is_proper_ancestor_of(&self, v: V, u: V) -> bool {
        v != u && self.is_ancestor_of(v, u)
    }

    pub(crate) fn disc(&self, v: V) -> usize {
        self.info[&v].discovery
    }
}

/// Forward iterator over spanning-tree ancestors, starting at the queried
/// vertex and ending at the source.
pub struct Ancestors<'a, V> {
    dfs: &'a Dfs<V>,
    cur: Option<V>,
}

impl<V: Copy + Eq + Hash + Debug> Iterator for Ancestors<'_, V> {
    type Item = V;

    fn next(&mut self) -> Option<V> {
        let v = self.cur?;
        self.cur = self.dfs.info(v).and_then(|info| info.parent);
        Some(v)
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

    #[test]
    fn orders_cover_reachable_vertices_once() {
        // Diamond with a join: 0 -> {1, 2}, 1 -> 3, 2 -> 3.
        let (f, b) = flow_graph(4, &[(0, &[1, 2]), (1, &[3]), (2, &[3])]);
        let dfs = Dfs::new(&f, b[0], &[]);

        assert_eq!(dfs.len(), 4);
        assert_eq!(dfs.pre_order(), &[b[0], b[1], b[3], b[2]]);
        assert_eq!(dfs.post_order(), &[b[3], b[1], b[2], b[0]]);
        for v in &b {
            assert_eq!(dfs.pre_order().iter().filter(|x| *x == v).count(), 1);
            assert_eq!(dfs.post_order().iter().filter(|x| *x == v).count(), 1);
        }
    }

    #[test]
    fn unreachable_vertices_are_not_visited() {
        let (f, b) = flow_graph(3, &[(0, &[1])]);
        let dfs = Dfs::new(&f, b[0], &[]);
        assert!(dfs.contains(b[1]));
        assert!(!dfs.contains(b[2]));
        assert_eq!(dfs.len(), 2);
    }

    #[test]
    fn times_form_nested_intervals() {
        let (f, b) = flow_graph(4, &[(0, &[1, 2]), (1, &[3]), (2, &[3])]);
        let dfs = Dfs::new(&f, b[0], &[]);

        let info = |v| *dfs.info(v).unwrap();
        assert_eq!(info(b[0]).discovery, 1);
        assert_eq!(info(b[0]).finish, 8);
        // b3 discovered under b1; its interval nests inside b1's.
        assert!(dfs.is_ancestor_of(b[3], b[1]));
        assert!(dfs.is_ancestor_of(b[3], b[0]));
        assert!(!dfs.is_ancestor_of(b[2], b[1]));
        // Reflexive, proper version is not.
        assert!(dfs.is_ancestor_of(b[1], b[1]));
        assert!(!dfs.is_proper_ancestor_of(b[1], b[1]));
    }

    #[test]
    fn spanning_tree_parents_and_ancestor_path() {
        let (f, b) = flow_graph(4, &[(0, &[1, 2]), (1, &[3]), (2, &[3])]);
        let dfs = Dfs::new(&f, b[0], &[]);

        assert_eq!(dfs.info(b[0]).unwrap().parent, None);
        assert_eq!(dfs.info(b[3]).unwrap().parent, Some(b[1]));

        let path: Vec<BlockId> = dfs.ancestors(b[3]).collect();
        assert_eq!(path, vec![b[3], b[1], b[0]]);
        let source_only: Vec<BlockId> = dfs.ancestors(b[0]).collect();
        assert_eq!(source_only, vec![b[0]]);
    }

    #[test]
    fn already_visited_vertices_are_fenced_off() {
        // 0 -> 1 -> 2 and 0 -> 2: fencing 1 leaves only the direct path.
        let (f, b) = flow_graph(3, &[(0, &[1, 2]), (1, &[2])]);
        let dfs = Dfs::new(&f, b[0], &[b[1]]);

        assert!(!dfs.contains(b[1]));
        assert_eq!(dfs.pre_order(), &[b[0], b[2]]);

        // A fenced-off source produces an empty traversal.
        let empty = Dfs::new(&f, b[0], &[b[0]]);
        assert!(empty.is_empty());
        assert_eq!(empty.pre_order(), &[] as &[BlockId]);
    }

    #[test]
    fn traversal_from_an_inner_vertex() {
        let (f, b) = flow_graph(4, &[(0, &[1]), (1, &[2, 3])]);
        let dfs = Dfs::new(&f, b[1], &[]);
        assert!(!dfs.contains(b[0]));
        assert_eq!(dfs.source(), b[1]);
        assert_eq!(dfs.len(), 3);
    }
}

//! Post-dominator trees.
//!
//! Post-dominance of a CFG is dominance of the reversed CFG rooted at the
//! exit, so the dataflow below intersects over CFG successors instead of
//! materializing the reversed graph.

use crate::base::{BaseGraph, GraphKind, NodeIndex};
use crate::errors::{GraphError, GraphResult};
use crate::vertex::Vertex;
use fixedbitset::FixedBitSet;
use std::collections::{HashMap, VecDeque};

/// Tree-shaped graph whose edges point from each vertex's immediate
/// post-dominator to the vertex. The root is the CFG exit. Immutable after
/// construction.
#[derive(Debug)]
pub struct PostDominatorTree {
    graph: BaseGraph,
}

impl PostDominatorTree {
    pub fn build(cfg: &BaseGraph) -> GraphResult<Self> {
        let nodes: Vec<NodeIndex> = cfg.node_indices().collect();
        let dense: HashMap<NodeIndex, usize> =
            nodes.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let n = nodes.len();
        let root = cfg.exit_index();

        // classical iterative fixpoint, sets shrink monotonically
        let mut full = FixedBitSet::with_capacity(n);
        full.insert_range(..);
        let mut doms: Vec<FixedBitSet> = vec![full; n];
        let mut root_only = FixedBitSet::with_capacity(n);
        root_only.insert(dense[&root]);
        doms[dense[&root]] = root_only;

        let mut changed = true;
        while changed {
            changed = false;
            for (i, id) in nodes.iter().enumerate() {
                if *id == root {
                    continue;
                }
                let mut inter = FixedBitSet::with_capacity(n);
                inter.insert_range(..);
                for s in cfg.successors(*id) {
                    inter.intersect_with(&doms[dense[&s]]);
                }
                inter.insert(i);
                if inter != doms[i] {
                    doms[i] = inter;
                    changed = true;
                }
            }
        }
        log::debug!(
            "post-dominator fixpoint reached for {} ({n} vertices)",
            cfg.method_name()
        );

        // strict dominators
        for (i, dom) in doms.iter_mut().enumerate() {
            dom.set(i, false);
        }

        let mut graph = BaseGraph::with_bounds(
            GraphKind::Pdt,
            cfg.method_name(),
            cfg.entry().clone(),
            cfg.exit().clone(),
        );
        for id in &nodes {
            graph.add_vertex(cfg.vertex(*id).clone());
        }

        // top-down BFS from the root: a vertex hangs below the first
        // processed ancestor whose removal empties its remaining set
        let mut placed = vec![false; n];
        placed[dense[&root]] = true;
        let mut queue = VecDeque::from([root]);
        while let Some(w) = queue.pop_front() {
            let wi = dense[&w];
            let parent = Self::tree_node(&graph, cfg.vertex(w))?;
            for (i, id) in nodes.iter().enumerate() {
                if placed[i] || !doms[i].contains(wi) {
                    continue;
                }
                doms[i].set(wi, false);
                if doms[i].is_clear() {
                    placed[i] = true;
                    let child = Self::tree_node(&graph, cfg.vertex(*id))?;
                    graph.add_edge(parent, child);
                    queue.push_back(*id);
                }
            }
        }
        if let Some(i) = placed.iter().position(|p| !p) {
            log::warn!(
                "vertex unreachable from exit, absent from tree: {}",
                cfg.vertex(nodes[i])
            );
        }

        Ok(Self { graph })
    }

    fn tree_node(graph: &BaseGraph, vertex: &Vertex) -> GraphResult<NodeIndex> {
        graph
            .node_of(vertex)
            .ok_or_else(|| GraphError::Internal(format!("vertex lost during tree build: {vertex}")))
    }

    #[inline]
    #[must_use]
    pub fn graph(&self) -> &BaseGraph {
        &self.graph
    }

    /// The tree root, i.e. the CFG exit.
    #[inline]
    #[must_use]
    pub fn root(&self) -> NodeIndex {
        self.graph.exit_index()
    }

    #[must_use]
    pub fn node_of(&self, vertex: &Vertex) -> Option<NodeIndex> {
        self.graph.node_of(vertex)
    }

    /// Immediate post-dominator; `None` for the root.
    #[must_use]
    pub fn parent(&self, id: NodeIndex) -> Option<NodeIndex> {
        self.graph.predecessors(id).first().copied()
    }

    /// Whether `a` is a proper tree-ancestor of `b`, i.e. `a` strictly
    /// post-dominates `b`.
    #[must_use]
    pub fn is_ancestor(&self, a: NodeIndex, b: NodeIndex) -> bool {
        let mut cur = b;
        while let Some(p) = self.parent(cur) {
            if p == a {
                return true;
            }
            cur = p;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use crate::intra::{IntraCfg, Mode};

    fn fixture_pdt() -> (IntraCfg, PostDominatorTree) {
        let body = fixture::nested_branch_loop();
        let cfg = IntraCfg::build(&body, Mode::Instruction).unwrap();
        let pdt = PostDominatorTree::build(cfg.graph()).unwrap();
        (cfg, pdt)
    }

    fn node_at(pdt: &PostDominatorTree, index: u32) -> NodeIndex {
        pdt.graph()
            .node_indices()
            .find(|id| pdt.graph().vertex(*id).statement().contains_index(index))
            .unwrap()
    }

    #[test]
    fn fixture_tree_shape() {
        let (_, pdt) = fixture_pdt();
        let g = pdt.graph();
        assert_eq!(g.vertex_count(), 19);
        assert_eq!(g.edge_count(), 18);

        // exit is the root
        assert!(g.predecessors(pdt.root()).is_empty());
        assert_eq!(g.successors(pdt.root()).len(), 1);
        // entry is a leaf with one parent
        assert!(g.successors(g.entry_index()).is_empty());
        assert_eq!(g.predecessors(g.entry_index()).len(), 1);

        // a tree: every non-root vertex has exactly one parent
        for id in g.node_indices() {
            if id != pdt.root() {
                assert_eq!(g.predecessors(id).len(), 1);
            }
        }
    }

    #[test]
    fn fixture_immediate_post_dominators() {
        let (_, pdt) = fixture_pdt();
        // the join of the outer conditional
        assert_eq!(pdt.parent(node_at(&pdt, 1)), Some(node_at(&pdt, 13)));
        // the join of the nested conditional
        assert_eq!(pdt.parent(node_at(&pdt, 3)), Some(node_at(&pdt, 8)));
        // the loop header post-dominates the loop body
        assert_eq!(pdt.parent(node_at(&pdt, 12)), Some(node_at(&pdt, 10)));
        assert_eq!(pdt.parent(node_at(&pdt, 10)), Some(node_at(&pdt, 13)));
    }

    #[test]
    fn ancestor_queries() {
        let (_, pdt) = fixture_pdt();
        assert!(pdt.is_ancestor(node_at(&pdt, 13), node_at(&pdt, 1)));
        assert!(pdt.is_ancestor(pdt.root(), pdt.graph().entry_index()));
        assert!(!pdt.is_ancestor(node_at(&pdt, 1), node_at(&pdt, 13)));
    }
}

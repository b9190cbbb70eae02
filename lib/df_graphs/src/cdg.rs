//! Control dependence graphs.

use crate::base::{BaseGraph, GraphKind, NodeIndex};
use crate::dominator::PostDominatorTree;
use crate::errors::{GraphError, GraphResult};

/// Derived from a CFG and its post-dominator tree; an edge u -> w means
/// execution of w is decided at u. Immutable after construction. Every CFG
/// vertex is carried over whether or not it gains edges.
#[derive(Debug)]
pub struct ControlDependenceGraph {
    graph: BaseGraph,
}

impl ControlDependenceGraph {
    pub fn build(cfg: &BaseGraph, pdt: &PostDominatorTree) -> GraphResult<Self> {
        let mut graph = BaseGraph::with_bounds(
            GraphKind::Cdg,
            cfg.method_name(),
            cfg.entry().clone(),
            cfg.exit().clone(),
        );
        for id in cfg.node_indices() {
            graph.add_vertex(cfg.vertex(id).clone());
        }

        for (u, v) in cfg.edges() {
            let pu = Self::mapped(pdt.node_of(cfg.vertex(u)), cfg, u)?;
            let pv = Self::mapped(pdt.node_of(cfg.vertex(v)), cfg, v)?;
            // no dependence when v post-dominates u
            if pu == pv || pdt.is_ancestor(pv, pu) {
                continue;
            }
            let lca = pdt
                .graph()
                .least_common_ancestor(pu, pv)
                .ok_or_else(|| {
                    GraphError::Internal(format!(
                        "no common post-dominator for {} and {}",
                        cfg.vertex(u),
                        cfg.vertex(v)
                    ))
                })?;

            let src = Self::mapped(graph.node_of(cfg.vertex(u)), cfg, u)?;
            let mut w = pv;
            while w != lca {
                let dst = Self::mapped(graph.node_of(pdt.graph().vertex(w)), cfg, u)?;
                graph.add_edge(src, dst);
                w = pdt.parent(w).ok_or_else(|| {
                    GraphError::Internal(format!(
                        "reached tree root before the common ancestor of {}",
                        cfg.vertex(u)
                    ))
                })?;
            }
            // the branch decides its own re-execution: a loop condition
            if lca == pu {
                graph.add_edge(src, src);
            }
        }

        Ok(Self { graph })
    }

    fn mapped(id: Option<NodeIndex>, cfg: &BaseGraph, witness: NodeIndex) -> GraphResult<NodeIndex> {
        id.ok_or_else(|| {
            GraphError::Internal(format!("vertex missing from derivation: {}", cfg.vertex(witness)))
        })
    }

    #[inline]
    #[must_use]
    pub fn graph(&self) -> &BaseGraph {
        &self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use crate::intra::{IntraCfg, Mode};
    use std::collections::BTreeSet;

    fn fixture_cdg() -> ControlDependenceGraph {
        let body = fixture::nested_branch_loop();
        let cfg = IntraCfg::build(&body, Mode::Instruction).unwrap();
        let pdt = PostDominatorTree::build(cfg.graph()).unwrap();
        ControlDependenceGraph::build(cfg.graph(), &pdt).unwrap()
    }

    fn edge_indices(cdg: &ControlDependenceGraph) -> BTreeSet<(u32, u32)> {
        cdg.graph()
            .edges()
            .map(|(a, b)| {
                let index = |id| {
                    cdg.graph()
                        .vertex(id)
                        .statement()
                        .instruction()
                        .unwrap()
                        .index()
                };
                (index(a), index(b))
            })
            .collect()
    }

    #[test]
    fn fixture_dependence_edges() {
        let cdg = fixture_cdg();
        assert_eq!(cdg.graph().vertex_count(), 19);
        assert_eq!(cdg.graph().edge_count(), 12);
        assert_eq!(
            edge_indices(&cdg),
            BTreeSet::from([
                // outer conditional decides both arms and the loop
                (1, 2),
                (1, 3),
                (1, 8),
                (1, 9),
                (1, 10),
                // nested conditional decides its arms and their join jumps
                (3, 4),
                (3, 5),
                (3, 6),
                (3, 7),
                // the loop condition decides the body and itself
                (10, 11),
                (10, 12),
                (10, 10),
            ])
        );
    }

    #[test]
    fn loop_condition_depends_on_itself() {
        let cdg = fixture_cdg();
        let header = cdg
            .graph()
            .node_indices()
            .find(|id| cdg.graph().vertex(*id).statement().contains_index(10))
            .unwrap();
        assert!(cdg.graph().successors(header).contains(&header));
    }

    #[test]
    fn construction_is_deterministic() {
        let a = edge_indices(&fixture_cdg());
        let b = edge_indices(&fixture_cdg());
        assert_eq!(a, b);
    }

    #[test]
    fn straight_line_code_has_no_dependences() {
        use df_instr::InstrKind::{Plain, Return};
        let body = fixture::stream(
            "com.example.Fixture->straight()V",
            &[
                (0, "const/4", Plain, &[1]),
                (1, "move", Plain, &[2]),
                (2, "return-void", Return, &[]),
            ],
        );
        let cfg = IntraCfg::build(&body, Mode::Instruction).unwrap();
        let pdt = PostDominatorTree::build(cfg.graph()).unwrap();
        let cdg = ControlDependenceGraph::build(cfg.graph(), &pdt).unwrap();
        assert_eq!(cdg.graph().vertex_count(), cfg.graph().vertex_count());
        assert_eq!(cdg.graph().edge_count(), 0);
    }
}

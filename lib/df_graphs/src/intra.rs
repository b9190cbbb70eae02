//! Intra-procedural control flow graph construction.
//!
//! Consumes one method's decoded instruction stream and produces a
//! [`BaseGraph`], either with one vertex per instruction or coarsened into
//! basic blocks.

use crate::base::{BaseGraph, GraphKind, NodeIndex};
use crate::errors::GraphResult;
use crate::statement::Statement;
use crate::vertex::Vertex;
use df_instr::{Instr, MethodBody};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Construction granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Instruction,
    Block,
}

#[derive(Debug)]
pub struct IntraCfg {
    graph: BaseGraph,
}

impl IntraCfg {
    pub fn build(body: &MethodBody, mode: Mode) -> GraphResult<Self> {
        let method = body.sig().to_string();
        let mut graph = BaseGraph::new(GraphKind::Intra, &method);
        match mode {
            Mode::Instruction => build_instruction_level(&mut graph, body),
            Mode::Block => build_block_level(&mut graph, body),
        }
        if graph.vertex_count() == 2 {
            // method without instructions
            graph.add_edge(graph.entry_index(), graph.exit_index());
        }
        ensure_exit_reachable(&mut graph);
        Ok(Self { graph })
    }

    #[inline]
    #[must_use]
    pub fn graph(&self) -> &BaseGraph {
        &self.graph
    }

    #[must_use]
    pub fn into_graph(self) -> BaseGraph {
        self.graph
    }

    #[inline]
    #[must_use]
    pub fn method_name(&self) -> &str {
        self.graph.method_name()
    }
}

/// Whether some predecessor of `instr` is a branching instruction.
fn is_branch_target(body: &MethodBody, instr: &Instr) -> bool {
    instr
        .preds()
        .any(|p| body.instr_at(p).is_some_and(Instr::is_branching))
}

fn build_instruction_level(graph: &mut BaseGraph, body: &MethodBody) {
    let method = body.sig().to_string();
    let mut ids: BTreeMap<u32, NodeIndex> = BTreeMap::new();

    for instr in body.iter_instructions().filter(|i| !i.is_skippable()) {
        let stmt = Statement::Basic {
            method: method.clone(),
            instr: instr.clone(),
        };
        let id = graph.add_vertex(Vertex::with_branch_target(
            stmt,
            is_branch_target(body, instr),
        ));
        ids.insert(instr.index(), id);
    }

    for beginning in body.beginnings() {
        if let Some(id) = ids.get(&beginning) {
            graph.add_edge(graph.entry_index(), *id);
        }
    }

    for instr in body.iter_instructions().filter(|i| !i.is_skippable()) {
        let src = ids[&instr.index()];
        if instr.nb_succs() == 0 {
            // return or throw (skippable instructions are already gone)
            graph.add_edge(src, graph.exit_index());
            continue;
        }
        for s in instr.succs() {
            match ids.get(&s) {
                Some(dst) => graph.add_edge(src, *dst),
                None => log::trace!("skipping edge {} -> {s}: no vertex", instr.index()),
            }
        }
    }
}

/// Block leaders: the first instruction, try-handler entries, direct
/// successors of jump instructions, and every successor of an instruction
/// with more than one successor.
pub(crate) fn compute_leaders(body: &MethodBody) -> BTreeSet<u32> {
    let mut leaders = body.beginnings();
    leaders.extend(body.handlers().iter().copied());
    for instr in body.iter_instructions().filter(|i| !i.is_skippable()) {
        if instr.is_jump() || instr.nb_succs() > 1 {
            leaders.extend(instr.succs());
        }
    }
    leaders.retain(|i| body.instr_at(*i).is_some_and(|x| !x.is_skippable()));
    leaders
}

fn split_into_blocks(body: &MethodBody, leaders: &BTreeSet<u32>) -> Vec<Vec<Instr>> {
    let mut blocks = Vec::new();
    let mut current: Vec<Instr> = Vec::new();
    for instr in body.iter_instructions().filter(|i| !i.is_skippable()) {
        if leaders.contains(&instr.index()) && !current.is_empty() {
            blocks.push(std::mem::take(&mut current));
        }
        current.push(instr.clone());
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}

fn build_block_level(graph: &mut BaseGraph, body: &MethodBody) {
    let method = body.sig().to_string();
    let leaders = compute_leaders(body);
    let blocks = split_into_blocks(body, &leaders);

    let mut ids: BTreeMap<u32, NodeIndex> = BTreeMap::new();
    let mut owner: BTreeMap<u32, u32> = BTreeMap::new();
    for block in &blocks {
        let first = &block[0];
        let stmts = block
            .iter()
            .map(|instr| Statement::Basic {
                method: method.clone(),
                instr: instr.clone(),
            })
            .collect();
        let stmt = Statement::Block {
            method: method.clone(),
            stmts,
        };
        let id = graph.add_vertex(Vertex::with_branch_target(
            stmt,
            is_branch_target(body, first),
        ));
        ids.insert(first.index(), id);
        for instr in block {
            owner.insert(instr.index(), first.index());
        }
    }

    for beginning in body.beginnings() {
        if let Some(leader) = owner.get(&beginning) {
            graph.add_edge(graph.entry_index(), ids[leader]);
        }
    }

    for block in &blocks {
        let src = ids[&owner[&block[0].index()]];
        let last = block.last().unwrap();
        if last.nb_succs() == 0 {
            graph.add_edge(src, graph.exit_index());
            continue;
        }
        for s in last.succs() {
            match owner.get(&s) {
                Some(leader) => graph.add_edge(src, ids[leader]),
                None => log::trace!("skipping edge {} -> {s}: no vertex", last.index()),
            }
        }
    }
}

/// Dominance computations assume the exit is reachable from every vertex.
/// A method ending in an unconditional infinite loop breaks that, so a
/// synthetic edge is attached from a discovered loop header (or, failing
/// that, any reachable vertex) to the exit. The chosen source depends on
/// traversal order; this is a documented approximation.
fn ensure_exit_reachable(graph: &mut BaseGraph) {
    let exit = graph.exit_index();
    if !graph.predecessors(exit).is_empty() {
        return;
    }
    let entry = graph.entry_index();

    let mut header = None;
    let mut last_visited = None;
    let mut visited: HashSet<NodeIndex> = HashSet::from([entry]);
    let mut on_path: HashSet<NodeIndex> = HashSet::from([entry]);
    let mut stack: Vec<(NodeIndex, Vec<NodeIndex>)> = vec![(entry, graph.successors(entry))];
    while !stack.is_empty() {
        let (n, next) = {
            let top = stack.last_mut().unwrap();
            (top.0, top.1.pop())
        };
        match next {
            Some(s) if on_path.contains(&s) => {
                header = Some(s);
                break;
            }
            Some(s) => {
                if visited.insert(s) {
                    on_path.insert(s);
                    last_visited = Some(s);
                    stack.push((s, graph.successors(s)));
                }
            }
            None => {
                on_path.remove(&n);
                stack.pop();
            }
        }
    }

    match header.or(last_visited) {
        Some(source) => {
            log::warn!(
                "no path to exit in {}, attaching synthetic edge from {}",
                graph.method_name(),
                graph.vertex(source)
            );
            graph.add_edge(source, exit);
        }
        None => graph.add_edge(entry, exit),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use df_instr::InstrKind;

    #[test]
    fn instruction_level_invariants() {
        let body = fixture::nested_branch_loop();
        let cfg = IntraCfg::build(&body, Mode::Instruction).unwrap();
        let g = cfg.graph();

        assert_eq!(g.vertex_count(), 19);
        assert!(g.predecessors(g.entry_index()).is_empty());
        assert!(g.successors(g.exit_index()).is_empty());

        for id in g.node_indices() {
            let v = g.vertex(id);
            if v.is_entry() || v.is_exit() {
                continue;
            }
            assert!(!g.predecessors(id).is_empty(), "no predecessor for {v}");
            let is_terminal = v
                .statement()
                .instruction()
                .is_some_and(df_instr::Instr::is_terminal);
            if !is_terminal {
                assert!(!g.successors(id).is_empty(), "no successor for {v}");
            }
        }

        // the single return instruction is the only exit predecessor
        let exit_preds = g.predecessors(g.exit_index());
        assert_eq!(exit_preds.len(), 1);
        assert!(g.vertex(exit_preds[0]).statement().contains_index(16));
    }

    #[test]
    fn branch_targets_are_flagged() {
        let body = fixture::nested_branch_loop();
        let cfg = IntraCfg::build(&body, Mode::Instruction).unwrap();
        let g = cfg.graph();
        let flagged: Vec<u32> = g
            .iter_vertices()
            .filter(|v| v.is_branch_target())
            .map(|v| v.statement().instruction().unwrap().index())
            .collect();
        // direct successors of the three conditionals
        let mut flagged = flagged;
        flagged.sort_unstable();
        assert_eq!(flagged, vec![2, 4, 6, 9, 11, 13]);
    }

    #[test]
    fn block_level_partition() {
        let body = fixture::nested_branch_loop();
        let leaders = compute_leaders(&body);
        assert_eq!(
            leaders,
            BTreeSet::from([0, 2, 4, 6, 8, 9, 10, 11, 13])
        );

        let cfg = IntraCfg::build(&body, Mode::Block).unwrap();
        let g = cfg.graph();
        assert_eq!(g.vertex_count(), 11); // 9 blocks + entry + exit
        assert_eq!(g.edge_count(), 13);
    }

    #[test]
    fn leader_computation_is_idempotent() {
        let body = fixture::nested_branch_loop();
        let leaders = compute_leaders(&body);
        let blocks = split_into_blocks(&body, &leaders);

        // re-partitioning the already-partitioned stream yields the same
        // boundaries
        let flattened: Vec<df_instr::Instr> =
            blocks.iter().flat_map(|b| b.iter().cloned()).collect();
        let rebuilt = df_instr::MethodBody::new(body.sig().clone(), flattened);
        let again = compute_leaders(&rebuilt);
        assert_eq!(leaders, again);
        let boundaries: Vec<u32> = blocks.iter().map(|b| b[0].index()).collect();
        let boundaries_again: Vec<u32> = split_into_blocks(&rebuilt, &again)
            .iter()
            .map(|b| b[0].index())
            .collect();
        assert_eq!(boundaries, boundaries_again);
    }

    #[test]
    fn payload_instructions_become_no_vertex() {
        use InstrKind::{Payload, Plain, Return, Switch};
        let body = fixture::stream(
            "com.example.Fixture->sw()V",
            &[
                (0, "packed-switch", Switch, &[1, 2]),
                (1, "const/4", Plain, &[3]),
                (2, "const/16", Plain, &[3]),
                (3, "return-void", Return, &[]),
                (4, "packed-switch-payload", Payload, &[]),
            ],
        );
        let cfg = IntraCfg::build(&body, Mode::Instruction).unwrap();
        assert_eq!(cfg.graph().vertex_count(), 6); // entry, exit, 4 instructions
    }

    #[test]
    fn infinite_loop_gets_synthetic_exit_edge() {
        use InstrKind::{Goto, Plain};
        let body = fixture::stream(
            "com.example.Fixture->spin()V",
            &[(0, "nop", Plain, &[1]), (1, "goto", Goto, &[0])],
        );
        let cfg = IntraCfg::build(&body, Mode::Instruction).unwrap();
        let g = cfg.graph();
        let exit_preds = g.predecessors(g.exit_index());
        assert_eq!(exit_preds.len(), 1);
        // the discovered loop header is instruction 0
        assert!(g.vertex(exit_preds[0]).statement().contains_index(0));
    }

    #[test]
    fn empty_method_connects_entry_to_exit() {
        let body = fixture::stream("com.example.Fixture->empty()V", &[]);
        let cfg = IntraCfg::build(&body, Mode::Instruction).unwrap();
        let g = cfg.graph();
        assert_eq!(g.vertex_count(), 2);
        assert_eq!(g.successors(g.entry_index()), vec![g.exit_index()]);
    }
}

//! The graph primitive layer: a directed graph of statement vertices with
//! one designated entry and one designated exit.
//!
//! All graph kinds of the engine (intra- and inter-procedural CFGs,
//! post-dominator trees, control dependence graphs, dummy stubs) share this
//! one type, tagged with a [`GraphKind`]; the kind-specific lookup behavior
//! lives on the wrapper types that own a `BaseGraph`. Vertices are arena
//! slots addressed by stable integer handles ([`NodeIndex`]), so copying a
//! graph is a structural re-insertion of handles, never a deep clone of
//! shared instruction data.
//!
//! Duplicate `(source, target)` pairs are de-duplicated: [`BaseGraph::add_edge`]
//! is idempotent and logs already-present edges at trace level.

use crate::statement::Statement;
use crate::vertex::Vertex;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fmt::Write;

pub use petgraph::graph::NodeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphKind {
    Intra,
    Inter,
    Pdt,
    Cdg,
    Dummy,
}

impl fmt::Display for GraphKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Intra => write!(f, "intra-cfg"),
            Self::Inter => write!(f, "inter-cfg"),
            Self::Pdt => write!(f, "post-dominator-tree"),
            Self::Cdg => write!(f, "control-dependence-graph"),
            Self::Dummy => write!(f, "dummy-cfg"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BaseGraph {
    kind: GraphKind,
    method_name: String,
    inner: StableDiGraph<Vertex, ()>,
    node_ids: HashMap<Vertex, NodeIndex>,
    entry: NodeIndex,
    exit: NodeIndex,
    invokes: Vec<NodeIndex>,
}

impl BaseGraph {
    /// Creates a graph with fresh entry and exit vertices for `method_name`.
    pub fn new(kind: GraphKind, method_name: &str) -> Self {
        let entry = Vertex::new(Statement::Entry {
            method: method_name.to_string(),
        });
        let exit = Vertex::new(Statement::Exit {
            method: method_name.to_string(),
        });
        Self::with_bounds(kind, method_name, entry, exit)
    }

    /// Creates a graph whose designated entry/exit are the given vertices.
    /// Used by derivations that keep referring to the bounds of the graph
    /// they were derived from.
    pub fn with_bounds(kind: GraphKind, method_name: &str, entry: Vertex, exit: Vertex) -> Self {
        let mut graph = Self {
            kind,
            method_name: method_name.to_string(),
            inner: StableDiGraph::new(),
            node_ids: HashMap::new(),
            entry: NodeIndex::end(),
            exit: NodeIndex::end(),
            invokes: Vec::new(),
        };
        graph.entry = graph.add_vertex(entry);
        graph.exit = graph.add_vertex(exit);
        graph
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> GraphKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    #[inline]
    #[must_use]
    pub fn entry_index(&self) -> NodeIndex {
        self.entry
    }

    #[inline]
    #[must_use]
    pub fn exit_index(&self) -> NodeIndex {
        self.exit
    }

    #[must_use]
    pub fn entry(&self) -> &Vertex {
        &self.inner[self.entry]
    }

    #[must_use]
    pub fn exit(&self) -> &Vertex {
        &self.inner[self.exit]
    }

    /// Adds a vertex. Re-adding an existing vertex is a no-op returning the
    /// existing handle.
    pub fn add_vertex(&mut self, vertex: Vertex) -> NodeIndex {
        if let Some(id) = self.node_ids.get(&vertex) {
            log::trace!("vertex already in {}: {vertex}", self.kind);
            return *id;
        }
        let is_invoke = vertex.is_invoke();
        let id = self.inner.add_node(vertex.clone());
        self.node_ids.insert(vertex, id);
        if is_invoke {
            self.invokes.push(id);
        }
        id
    }

    /// Removes a vertex and its incident edges. Absent vertices are ignored.
    pub fn remove_vertex(&mut self, vertex: &Vertex) {
        if let Some(id) = self.node_ids.get(vertex).copied() {
            self.remove_node(id);
        }
    }

    pub fn remove_node(&mut self, id: NodeIndex) {
        if let Some(vertex) = self.inner.remove_node(id) {
            self.node_ids.remove(&vertex);
            self.invokes.retain(|i| *i != id);
        }
    }

    #[must_use]
    pub fn contains(&self, vertex: &Vertex) -> bool {
        self.node_ids.contains_key(vertex)
    }

    #[must_use]
    pub fn node_of(&self, vertex: &Vertex) -> Option<NodeIndex> {
        self.node_ids.get(vertex).copied()
    }

    #[must_use]
    pub fn vertex(&self, id: NodeIndex) -> &Vertex {
        &self.inner[id]
    }

    /// Adds an edge unless the same `(source, target)` pair is already
    /// present.
    pub fn add_edge(&mut self, source: NodeIndex, target: NodeIndex) {
        if self.inner.find_edge(source, target).is_some() {
            log::trace!(
                "edge already in {}: {} -> {}",
                self.kind,
                self.inner[source],
                self.inner[target]
            );
            return;
        }
        self.inner.add_edge(source, target, ());
    }

    /// Removes a batch of edges. The edge handles are snapshotted before any
    /// removal so the mutation never iterates the collection it mutates.
    pub fn remove_edges(&mut self, pairs: &[(NodeIndex, NodeIndex)]) {
        let ids: Vec<_> = pairs
            .iter()
            .filter_map(|(a, b)| self.inner.find_edge(*a, *b))
            .collect();
        for id in ids {
            self.inner.remove_edge(id);
        }
    }

    /// Outgoing edges of a vertex, snapshotted as `(source, target)` pairs.
    #[must_use]
    pub fn outgoing_edges(&self, id: NodeIndex) -> Vec<(NodeIndex, NodeIndex)> {
        self.inner
            .edges_directed(id, Direction::Outgoing)
            .map(|e| (e.source(), e.target()))
            .collect()
    }

    #[must_use]
    pub fn successors(&self, id: NodeIndex) -> Vec<NodeIndex> {
        self.inner
            .neighbors_directed(id, Direction::Outgoing)
            .collect()
    }

    #[must_use]
    pub fn predecessors(&self, id: NodeIndex) -> Vec<NodeIndex> {
        self.inner
            .neighbors_directed(id, Direction::Incoming)
            .collect()
    }

    /// Transitive successor closure, excluding the start vertex unless a
    /// cycle leads back to it. Explicit worklist, no recursion.
    #[must_use]
    pub fn transitive_successors(&self, id: NodeIndex) -> HashSet<NodeIndex> {
        self.transitive(id, Direction::Outgoing)
    }

    #[must_use]
    pub fn transitive_predecessors(&self, id: NodeIndex) -> HashSet<NodeIndex> {
        self.transitive(id, Direction::Incoming)
    }

    fn transitive(&self, id: NodeIndex, dir: Direction) -> HashSet<NodeIndex> {
        let mut visited = HashSet::new();
        let mut stack: Vec<NodeIndex> = self.inner.neighbors_directed(id, dir).collect();
        while let Some(n) = stack.pop() {
            if visited.insert(n) {
                stack.extend(self.inner.neighbors_directed(n, dir));
            }
        }
        visited
    }

    /// Reverses the graph into a new instance.
    ///
    /// The reversed graph's declared entry/exit still reference the
    /// ORIGINAL entry and exit statements: `reversed.entry()` names the same
    /// program point as `self.entry()`, even though it is now the structural
    /// sink. Callers relying on structural bounds must not use the declared
    /// ones on a reversed graph.
    #[must_use]
    pub fn reverse(&self) -> Self {
        let mut reversed = Self::with_bounds(
            self.kind,
            &self.method_name,
            self.entry().clone(),
            self.exit().clone(),
        );
        for vertex in self.inner.node_weights() {
            reversed.add_vertex(vertex.clone());
        }
        for edge in self.inner.edge_references() {
            let src = reversed.node_ids[&self.inner[edge.target()]];
            let dst = reversed.node_ids[&self.inner[edge.source()]];
            reversed.add_edge(src, dst);
        }
        reversed
    }

    /// Shortest distance in edges, if any path exists.
    #[must_use]
    pub fn distance(&self, source: NodeIndex, target: NodeIndex) -> Option<usize> {
        self.shortest_path(source, target).map(|p| p.len() - 1)
    }

    /// Unweighted shortest path via bidirectional breadth-first search.
    #[must_use]
    pub fn shortest_path(&self, source: NodeIndex, target: NodeIndex) -> Option<Vec<NodeIndex>> {
        if source == target {
            return Some(vec![source]);
        }
        let mut fwd_parent: HashMap<NodeIndex, NodeIndex> = HashMap::from([(source, source)]);
        let mut bwd_parent: HashMap<NodeIndex, NodeIndex> = HashMap::from([(target, target)]);
        let mut fwd_front = vec![source];
        let mut bwd_front = vec![target];

        loop {
            if fwd_front.is_empty() || bwd_front.is_empty() {
                return None;
            }
            let forward = fwd_front.len() <= bwd_front.len();
            let (front, parents, others, dir) = if forward {
                (
                    &mut fwd_front,
                    &mut fwd_parent,
                    &bwd_parent,
                    Direction::Outgoing,
                )
            } else {
                (
                    &mut bwd_front,
                    &mut bwd_parent,
                    &fwd_parent,
                    Direction::Incoming,
                )
            };

            let mut next = Vec::new();
            let mut meet = None;
            'expand: for &n in front.iter() {
                for s in self.inner.neighbors_directed(n, dir) {
                    if parents.contains_key(&s) {
                        continue;
                    }
                    parents.insert(s, n);
                    if others.contains_key(&s) {
                        meet = Some(s);
                        break 'expand;
                    }
                    next.push(s);
                }
            }
            *front = next;

            if let Some(m) = meet {
                return Some(Self::stitch_path(m, &fwd_parent, &bwd_parent, source, target));
            }
        }
    }

    fn stitch_path(
        meet: NodeIndex,
        fwd_parent: &HashMap<NodeIndex, NodeIndex>,
        bwd_parent: &HashMap<NodeIndex, NodeIndex>,
        source: NodeIndex,
        target: NodeIndex,
    ) -> Vec<NodeIndex> {
        let mut path = vec![meet];
        let mut cur = meet;
        while cur != source {
            cur = fwd_parent[&cur];
            path.push(cur);
        }
        path.reverse();
        cur = meet;
        while cur != target {
            cur = bwd_parent[&cur];
            path.push(cur);
        }
        path
    }

    /// Least common ancestor of two vertices, assuming an acyclic graph.
    ///
    /// Walks the predecessor chain of `a` upward until the candidate's
    /// transitive successor closure contains both vertices. Calling this on
    /// a cyclic graph is a precondition violation: the walk is bounded to
    /// the vertex count and returns `None` instead of looping, but the
    /// result is meaningless. In practice only post-dominator trees are
    /// queried.
    #[must_use]
    pub fn least_common_ancestor(&self, a: NodeIndex, b: NodeIndex) -> Option<NodeIndex> {
        let mut candidate = a;
        for _ in 0..=self.inner.node_count() {
            let mut closure = self.transitive_successors(candidate);
            closure.insert(candidate);
            if closure.contains(&a) && closure.contains(&b) {
                return Some(candidate);
            }
            candidate = self
                .inner
                .neighbors_directed(candidate, Direction::Incoming)
                .next()?;
        }
        None
    }

    /// Registry of vertices whose statement contains a call instruction,
    /// maintained incrementally as vertices are added.
    #[must_use]
    pub fn invoke_vertices(&self) -> &[NodeIndex] {
        &self.invokes
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.inner.node_indices()
    }

    pub fn iter_vertices(&self) -> impl Iterator<Item = &Vertex> {
        self.inner.node_weights()
    }

    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex)> + '_ {
        self.inner.edge_references().map(|e| (e.source(), e.target()))
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.inner.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut res = String::new();
        res.push_str("digraph {\n");
        res.push_str("  rankdir=TB;\n");
        for id in self.inner.node_indices() {
            let vertex = &self.inner[id];
            let color = if vertex.is_entry() || vertex.is_exit() {
                "blue"
            } else if vertex.is_if() || vertex.is_switch() {
                "darkorange"
            } else if vertex.is_invoke() {
                "purple"
            } else if vertex.is_return() {
                "gray"
            } else {
                "black"
            };
            writeln!(
                res,
                "  n{} [shape=box,color={},label=\"{}\"]",
                id.index(),
                color,
                html_escape::encode_text(&vertex.to_string())
            )
            .unwrap();
        }
        for edge in self.inner.edge_references() {
            writeln!(
                res,
                "  n{} -> n{}",
                edge.source().index(),
                edge.target().index()
            )
            .unwrap();
        }
        res.push('}');
        res
    }
}

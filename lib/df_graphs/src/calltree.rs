//! Method-level call tree.
//!
//! Projects an inter-procedural graph onto one vertex per method name and
//! answers unweighted path queries over it. Queries are cached by
//! `(source, target)` behind a read-write lock, the only mutable state that
//! outlives construction.

use crate::base::NodeIndex;
use crate::inter::{InterCfg, GLOBAL_ENTRY};
use petgraph::graph::DiGraph;
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::Write;
use std::sync::RwLock;

#[derive(Debug)]
pub struct CallTree {
    graph: DiGraph<String, ()>,
    ids: HashMap<String, NodeIndex>,
    root: NodeIndex,
    cache: RwLock<HashMap<(String, String), Option<Vec<String>>>>,
}

fn is_callbacks(method: &str) -> bool {
    method.ends_with("->callbacks()V")
}

fn is_static_initializer(method: &str) -> bool {
    method.contains("-><clinit>(")
}

fn simple_name(method: &str) -> &str {
    method
        .split("->")
        .nth(1)
        .and_then(|m| m.split('(').next())
        .unwrap_or("")
}

impl CallTree {
    pub fn build(inter: &InterCfg) -> Self {
        let mut tree = Self {
            graph: DiGraph::new(),
            ids: HashMap::new(),
            root: NodeIndex::end(),
            cache: RwLock::new(HashMap::new()),
        };
        tree.root = tree.intern(GLOBAL_ENTRY);
        for method in inter.methods() {
            tree.intern(method);
        }
        for (a, b) in inter.graph().edges() {
            let (va, vb) = (inter.graph().vertex(a), inter.graph().vertex(b));
            // control coming back from a call is not a new call
            if vb.is_return() {
                continue;
            }
            let (ma, mb) = (va.method(), vb.method());
            if ma == mb || Self::skip_projection(ma, mb) {
                continue;
            }
            let (sa, sb) = (tree.intern(ma), tree.intern(mb));
            if tree.graph.find_edge(sa, sb).is_none() {
                tree.graph.add_edge(sa, sb, ());
            }
        }
        log::debug!(
            "call tree built: {} methods, {} call edges",
            tree.graph.node_count(),
            tree.graph.edge_count()
        );
        tree
    }

    /// The callbacks loop is entered only through the resume method, and
    /// static initializers only from the root.
    fn skip_projection(ma: &str, mb: &str) -> bool {
        if is_callbacks(mb) && simple_name(ma) != "onResume" {
            return true;
        }
        if is_static_initializer(mb) && ma != GLOBAL_ENTRY {
            return true;
        }
        false
    }

    fn intern(&mut self, method: &str) -> NodeIndex {
        if let Some(id) = self.ids.get(method) {
            return *id;
        }
        let id = self.graph.add_node(method.to_string());
        self.ids.insert(method.to_string(), id);
        id
    }

    #[inline]
    #[must_use]
    pub fn root(&self) -> &str {
        GLOBAL_ENTRY
    }

    #[must_use]
    pub fn contains(&self, method: &str) -> bool {
        self.ids.contains_key(method)
    }

    #[must_use]
    pub fn nb_methods(&self) -> usize {
        self.graph.node_count()
    }

    /// Unweighted shortest path, cached per `(source, target)` pair.
    #[must_use]
    pub fn shortest_path(&self, source: &str, target: &str) -> Option<Vec<String>> {
        let key = (source.to_string(), target.to_string());
        if let Ok(cache) = self.cache.read() {
            if let Some(hit) = cache.get(&key) {
                return hit.clone();
            }
        }
        let path = self.bfs(source, target);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, path.clone());
        }
        path
    }

    #[must_use]
    pub fn shortest_path_from_root(&self, target: &str) -> Option<Vec<String>> {
        self.shortest_path(GLOBAL_ENTRY, target)
    }

    /// Shortest path from the root through every stop in order. A leg whose
    /// forward direction is unreachable may reuse the reverse of a leg
    /// already walked in this query, so revisiting a stop never fails just
    /// because the graph only encodes one direction of the round trip.
    #[must_use]
    pub fn shortest_path_with_stops(&self, stops: &[&str]) -> Option<Vec<String>> {
        let mut current = GLOBAL_ENTRY.to_string();
        let mut full = vec![current.clone()];
        let mut resolved: HashMap<(String, String), Vec<String>> = HashMap::new();
        for stop in stops {
            let leg = match self.shortest_path(&current, stop) {
                Some(leg) => leg,
                None => {
                    let mut back = resolved.get(&((*stop).to_string(), current.clone()))?.clone();
                    back.reverse();
                    back
                }
            };
            resolved.insert((current.clone(), (*stop).to_string()), leg.clone());
            full.extend(leg.into_iter().skip(1));
            current = (*stop).to_string();
        }
        Some(full)
    }

    /// Methods reachable from the root, the root included.
    #[must_use]
    pub fn reachable(&self) -> HashSet<String> {
        let mut visited = HashSet::from([self.root]);
        let mut queue = VecDeque::from([self.root]);
        while let Some(id) = queue.pop_front() {
            for s in self.graph.neighbors_directed(id, Direction::Outgoing) {
                if visited.insert(s) {
                    queue.push_back(s);
                }
            }
        }
        visited.into_iter().map(|id| self.graph[id].clone()).collect()
    }

    #[must_use]
    pub fn unreachable(&self) -> HashSet<String> {
        let reachable = self.reachable();
        self.ids
            .keys()
            .filter(|m| !reachable.contains(*m))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn to_dot(&self) -> String {
        let mut res = String::new();
        res.push_str("digraph {\n");
        res.push_str("  rankdir=LR;\n");
        for id in self.graph.node_indices() {
            let color = if id == self.root { "blue" } else { "black" };
            writeln!(
                res,
                "  n{} [shape=box,color={},label=\"{}\"]",
                id.index(),
                color,
                html_escape::encode_text(&self.graph[id])
            )
            .unwrap();
        }
        for edge in self.graph.edge_references() {
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

    fn bfs(&self, source: &str, target: &str) -> Option<Vec<String>> {
        let s = *self.ids.get(source)?;
        let t = *self.ids.get(target)?;
        if s == t {
            return Some(vec![source.to_string()]);
        }
        let mut parents: HashMap<NodeIndex, NodeIndex> = HashMap::from([(s, s)]);
        let mut queue = VecDeque::from([s]);
        while let Some(id) = queue.pop_front() {
            for n in self.graph.neighbors_directed(id, Direction::Outgoing) {
                if parents.contains_key(&n) {
                    continue;
                }
                parents.insert(n, id);
                if n == t {
                    let mut path = vec![n];
                    let mut cur = n;
                    while cur != s {
                        cur = parents[&cur];
                        path.push(cur);
                    }
                    path.reverse();
                    return Some(path.into_iter().map(|id| self.graph[id].clone()).collect());
                }
                queue.push_back(n);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use crate::hierarchy::Hierarchy;
    use crate::inter::{callbacks_method, Options};
    use df_components::{Component, ComponentKind, ComponentModel, LifecycleConfig};
    use df_instr::{ClassDef, CodeModel, InstrKind::*};

    fn demo_tree() -> CallTree {
        let mut main = ClassDef::new("com.example.Main", Some("android.app.Activity"));
        main.push_method(fixture::stream(
            "com.example.Main-><init>()V",
            &[(0, "return-void", Return, &[])],
        ));
        main.push_method(fixture::stream(
            "com.example.Main->onCreate(Landroid.os.Bundle;)V",
            &[
                (0, "invoke-static com.example.Util->helper()V", Invoke, &[1]),
                (1, "return-void", Return, &[]),
            ],
        ));
        main.push_method(fixture::stream(
            "com.example.Main->onResume()V",
            &[(0, "return-void", Return, &[])],
        ));
        main.push_method(fixture::stream(
            "com.example.Main->onPause()V",
            &[(0, "return-void", Return, &[])],
        ));
        let mut util = ClassDef::new("com.example.Util", Some("java.lang.Object"));
        util.push_method(fixture::stream(
            "com.example.Util-><clinit>()V",
            &[(0, "return-void", Return, &[])],
        ));
        util.push_method(fixture::stream(
            "com.example.Util->helper()V",
            &[
                (0, "const/4", Plain, &[1]),
                (1, "return-void", Return, &[]),
            ],
        ));
        let model = CodeModel::new(vec![main, util]);
        let mut components = ComponentModel::new("com.example", Some("com.example.Main"));
        components.push(Component::new("com.example.Main", ComponentKind::Activity));
        let hierarchy = Hierarchy::build(&model);
        let inter = crate::inter::InterCfg::build(
            &model,
            &hierarchy,
            &components,
            &LifecycleConfig::default(),
            &Options::default(),
        )
        .unwrap();
        CallTree::build(&inter)
    }

    #[test]
    fn root_to_root_is_a_zero_length_path() {
        let tree = demo_tree();
        assert_eq!(
            tree.shortest_path(GLOBAL_ENTRY, GLOBAL_ENTRY),
            Some(vec![GLOBAL_ENTRY.to_string()])
        );
    }

    #[test]
    fn path_from_root_follows_the_lifecycle() {
        let tree = demo_tree();
        let path = tree
            .shortest_path_from_root("com.example.Util->helper()V")
            .unwrap();
        assert_eq!(path.first().map(String::as_str), Some(GLOBAL_ENTRY));
        assert!(path.contains(&"com.example.Main->onCreate(Landroid.os.Bundle;)V".to_string()));
        assert_eq!(
            path.last().map(String::as_str),
            Some("com.example.Util->helper()V")
        );
    }

    #[test]
    fn virtual_returns_do_not_become_back_edges() {
        let tree = demo_tree();
        assert!(tree
            .shortest_path(
                "com.example.Util->helper()V",
                "com.example.Main->onCreate(Landroid.os.Bundle;)V"
            )
            .is_none());
    }

    #[test]
    fn stops_may_reuse_a_reversed_leg() {
        let tree = demo_tree();
        let on_create = "com.example.Main->onCreate(Landroid.os.Bundle;)V";
        let helper = "com.example.Util->helper()V";
        // helper -> onCreate is unreachable, yet the round trip succeeds
        // because the first leg covers it forward
        assert!(tree
            .shortest_path_with_stops(&[on_create, helper, on_create])
            .is_some());
        // no forward leg anywhere: the query fails
        assert!(tree
            .shortest_path_with_stops(&[helper, on_create, helper])
            .is_none());
    }

    #[test]
    fn callbacks_are_entered_through_resume_only() {
        let tree = demo_tree();
        let path = tree
            .shortest_path_from_root("com.example.Main->onPause()V")
            .unwrap();
        let cb = callbacks_method("com.example.Main");
        assert!(path.contains(&cb));
        let resume_pos = path
            .iter()
            .position(|m| m == "com.example.Main->onResume()V")
            .unwrap();
        let cb_pos = path.iter().position(|m| *m == cb).unwrap();
        assert!(resume_pos < cb_pos);
    }

    #[test]
    fn static_initializers_hang_below_the_root() {
        let tree = demo_tree();
        let path = tree
            .shortest_path_from_root("com.example.Util-><clinit>()V")
            .unwrap();
        assert_eq!(path.len(), 2);
    }

    #[test]
    fn everything_in_the_demo_is_reachable() {
        let tree = demo_tree();
        assert!(tree.unreachable().is_empty(), "{:?}", tree.unreachable());
    }
}

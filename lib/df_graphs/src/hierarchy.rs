//! The class hierarchy context.
//!
//! Built once from the provider model and passed explicitly into every
//! stitching function, so several analyses can run side by side in one
//! process.

use df_instr::{CodeModel, MethodSig};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// Kind of an inheritance link, from subtype to supertype.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inheritance {
    Extends,
    Implements,
}

/// Inheritance links of every class the provider knows about, including
/// supertypes that have no decoded body of their own (framework classes).
#[derive(Debug)]
pub struct Hierarchy {
    graph: DiGraph<String, Inheritance>,
    ids: HashMap<String, NodeIndex>,
}

impl Hierarchy {
    pub fn build(model: &CodeModel) -> Self {
        let mut hierarchy = Self {
            graph: DiGraph::new(),
            ids: HashMap::new(),
        };
        for class in model.iter_classes() {
            let id = hierarchy.intern(class.name());
            if let Some(superclass) = class.superclass() {
                let sup = hierarchy.intern(superclass);
                hierarchy.link(id, sup, Inheritance::Extends);
            }
            for interface in class.interfaces() {
                let itf = hierarchy.intern(interface);
                hierarchy.link(id, itf, Inheritance::Implements);
            }
        }
        hierarchy
    }

    fn intern(&mut self, name: &str) -> NodeIndex {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = self.graph.add_node(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    fn link(&mut self, sub: NodeIndex, sup: NodeIndex, kind: Inheritance) {
        if self.graph.find_edge(sub, sup).is_none() {
            self.graph.add_edge(sub, sup, kind);
        }
    }

    #[must_use]
    pub fn contains(&self, class: &str) -> bool {
        self.ids.contains_key(class)
    }

    /// Transitive subtypes of `class`, the class itself excluded.
    #[must_use]
    pub fn subtypes(&self, class: &str) -> HashSet<String> {
        self.closure(class, Direction::Incoming)
    }

    /// Transitive supertypes of `class`, the class itself excluded.
    #[must_use]
    pub fn supertypes(&self, class: &str) -> HashSet<String> {
        self.closure(class, Direction::Outgoing)
    }

    #[must_use]
    pub fn is_subtype_of(&self, sub: &str, sup: &str) -> bool {
        sub == sup || self.supertypes(sub).contains(sup)
    }

    fn closure(&self, class: &str, dir: Direction) -> HashSet<String> {
        let mut found = HashSet::new();
        let Some(start) = self.ids.get(class) else {
            return found;
        };
        let mut visited = HashSet::from([*start]);
        let mut stack: Vec<NodeIndex> = self.graph.neighbors_directed(*start, dir).collect();
        while let Some(n) = stack.pop() {
            if visited.insert(n) {
                found.insert(self.graph[n].clone());
                stack.extend(self.graph.neighbors_directed(n, dir));
            }
        }
        found
    }

    /// Virtual-dispatch resolution set for a call with nominal target
    /// `target`: every decoded method carrying the target's member name on
    /// the declared receiver class or one of its subtypes. Dispatch
    /// ambiguity is kept as over-approximation, all candidates are returned.
    #[must_use]
    pub fn resolution_set(&self, model: &CodeModel, target: &MethodSig) -> Vec<MethodSig> {
        let mut candidates = Vec::new();
        if model.method(target).is_some() {
            candidates.push(target.clone());
        }
        let mut subtypes: Vec<String> = self.subtypes(target.class_name()).into_iter().collect();
        subtypes.sort_unstable();
        for subtype in subtypes {
            let overriding = target.on_class(&subtype);
            if model.method(&overriding).is_some() {
                candidates.push(overriding);
            }
        }
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use df_instr::{ClassDef, Instr, InstrKind, MethodBody};

    fn body(sig: &str) -> MethodBody {
        let instrs = vec![
            Instr::new(0, "const/4", InstrKind::Plain).with_flow([], [1]),
            Instr::new(1, "return-void", InstrKind::Return).with_flow([0], []),
        ];
        MethodBody::new(sig.parse().unwrap(), instrs)
    }

    fn model() -> CodeModel {
        let mut base = ClassDef::new("com.example.Base", Some("java.lang.Object"))
            .with_interfaces(["com.example.Doer".to_string()]);
        base.push_method(body("com.example.Base->doIt()V"));
        let mut mid = ClassDef::new("com.example.Mid", Some("com.example.Base"));
        mid.push_method(body("com.example.Mid->doIt()V"));
        let leaf = ClassDef::new("com.example.Leaf", Some("com.example.Mid"));
        CodeModel::new(vec![base, mid, leaf])
    }

    #[test]
    fn subtype_and_supertype_closures() {
        let h = Hierarchy::build(&model());
        assert_eq!(
            h.subtypes("com.example.Base"),
            HashSet::from(["com.example.Mid".to_string(), "com.example.Leaf".to_string()])
        );
        assert!(h.supertypes("com.example.Leaf").contains("java.lang.Object"));
        assert!(h.is_subtype_of("com.example.Leaf", "com.example.Doer"));
        assert!(!h.is_subtype_of("com.example.Base", "com.example.Leaf"));
    }

    #[test]
    fn resolution_includes_overrides_only_when_decoded() {
        let model = model();
        let h = Hierarchy::build(&model);
        let target: MethodSig = "com.example.Base->doIt()V".parse().unwrap();
        let set = h.resolution_set(&model, &target);
        // Leaf has no doIt body of its own, so only Base and Mid resolve
        assert_eq!(
            set,
            vec![
                "com.example.Base->doIt()V".parse().unwrap(),
                "com.example.Mid->doIt()V".parse().unwrap(),
            ]
        );
    }

    #[test]
    fn unknown_class_resolves_to_nothing() {
        let model = model();
        let h = Hierarchy::build(&model);
        let target: MethodSig = "com.example.Ghost->doIt()V".parse().unwrap();
        assert!(h.resolution_set(&model, &target).is_empty());
    }
}

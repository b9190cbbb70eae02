//! Inter-procedural control flow graph construction.
//!
//! Stitches every method's intra-procedural graph into one application-wide
//! graph, in five phases: intra construction, call-site resolution, call
//! block splitting, lifecycle synthesis, pruning.

mod lifecycle;
mod resolve;

use crate::base::{BaseGraph, GraphKind, NodeIndex};
use crate::errors::{GraphError, GraphResult};
use crate::hierarchy::Hierarchy;
use crate::intra::{IntraCfg, Mode};
use crate::statement::Statement;
use crate::vertex::Vertex;
use df_components::{ComponentModel, LifecycleConfig};
use df_instr::{CodeModel, MethodBody, MethodSig};
use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use std::collections::HashMap;

pub use lifecycle::callbacks_method;

/// Method name of the synthetic root everything reachable hangs below.
pub const GLOBAL_ENTRY: &str = "<global>";

lazy_static! {
    static ref DEFAULT_EXCLUDES: Vec<Regex> = [
        r"^android\.",
        r"^androidx\.",
        r"^com\.android\.",
        r"^com\.google\.",
        r"^java\.",
        r"^javax\.",
        r"^kotlin\.",
        r"^kotlinx\.",
        r"^dalvik\.",
        r"^junit\.",
        r"^org\.junit\.",
        r"^org\.json\.",
        r"^sun\.",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect();
}

/// Framework and runtime namespaces excluded from construction by default.
#[must_use]
pub fn default_excludes() -> Vec<Regex> {
    DEFAULT_EXCLUDES.clone()
}

#[derive(Debug, Clone)]
pub struct Options {
    pub mode: Mode,
    /// Classes matching any of these are not built; calls into them resolve
    /// to dummy stubs.
    pub excludes: Vec<Regex>,
    /// Build the per-method graphs in parallel, merge sequentially.
    pub parallel: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            mode: Mode::Block,
            excludes: default_excludes(),
            parallel: false,
        }
    }
}

/// Entry and exit handles of one method inside the composite graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stub {
    pub entry: NodeIndex,
    pub exit: NodeIndex,
}

/// The application-wide control flow graph plus its method table.
///
/// The method table maps every live method name to its entry/exit stub; it
/// is trimmed together with the graph during pruning, so a lookup of a dead
/// method fails instead of returning a stale handle.
#[derive(Debug)]
pub struct InterCfg {
    graph: BaseGraph,
    stubs: HashMap<String, Stub>,
    mode: Mode,
}

impl InterCfg {
    pub fn build(
        model: &CodeModel,
        hierarchy: &Hierarchy,
        components: &ComponentModel,
        lifecycle: &LifecycleConfig,
        options: &Options,
    ) -> GraphResult<Self> {
        let mut graph = BaseGraph::new(GraphKind::Inter, GLOBAL_ENTRY);
        let mut stubs: HashMap<String, Stub> = HashMap::new();

        // phase A: per-method intra graphs, merged into the composite
        let bodies: Vec<&MethodBody> = model
            .iter_methods()
            .filter(|b| !is_excluded(b.sig().class_name(), &options.excludes))
            .collect();
        log::debug!("building {} intra-procedural graphs", bodies.len());
        let intras: Vec<IntraCfg> = if options.parallel {
            bodies
                .par_iter()
                .map(|b| IntraCfg::build(b, options.mode))
                .collect::<GraphResult<Vec<_>>>()?
        } else {
            bodies
                .iter()
                .map(|b| IntraCfg::build(b, options.mode))
                .collect::<GraphResult<Vec<_>>>()?
        };
        for intra in &intras {
            merge_into(&mut graph, &mut stubs, intra);
        }

        // phases B and C: resolve call sites, splitting their vertices
        let invoke_ids = graph.invoke_vertices().to_vec();
        log::debug!("stitching {} call sites", invoke_ids.len());
        let mut pending = Vec::new();
        for id in invoke_ids {
            stitch_call_site(
                &mut graph,
                &mut stubs,
                model,
                hierarchy,
                components,
                id,
                &mut pending,
            )?;
        }

        // phase D
        lifecycle::synthesize(&mut graph, &mut stubs, model, components, lifecycle, &pending);

        // phase E
        prune(&mut graph, &mut stubs);

        Ok(Self {
            graph,
            stubs,
            mode: options.mode,
        })
    }

    #[inline]
    #[must_use]
    pub fn graph(&self) -> &BaseGraph {
        &self.graph
    }

    #[inline]
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Stub of a live method; fails for methods never built or pruned away.
    pub fn stub(&self, method: &str) -> GraphResult<Stub> {
        self.stubs
            .get(method)
            .copied()
            .ok_or_else(|| GraphError::MethodNotFound(method.to_string()))
    }

    #[must_use]
    pub fn contains_method(&self, method: &str) -> bool {
        self.stubs.contains_key(method)
    }

    pub fn methods(&self) -> impl Iterator<Item = &str> {
        self.stubs.keys().map(String::as_str)
    }

    #[must_use]
    pub fn nb_methods(&self) -> usize {
        self.stubs.len()
    }

    #[must_use]
    pub fn to_dot(&self) -> String {
        self.graph.to_dot()
    }
}

fn is_excluded(class: &str, excludes: &[Regex]) -> bool {
    excludes.iter().any(|re| re.is_match(class))
}

/// Re-inserts one intra graph into the composite and records its stub.
fn merge_into(graph: &mut BaseGraph, stubs: &mut HashMap<String, Stub>, intra: &IntraCfg) {
    let src = intra.graph();
    let mut map: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    for id in src.node_indices() {
        map.insert(id, graph.add_vertex(src.vertex(id).clone()));
    }
    for (a, b) in src.edges() {
        graph.add_edge(map[&a], map[&b]);
    }
    stubs.insert(
        src.method_name().to_string(),
        Stub {
            entry: map[&src.entry_index()],
            exit: map[&src.exit_index()],
        },
    );
}

/// Replaces one invoke vertex by its split pieces and wires every call it
/// carried through the resolved callees.
fn stitch_call_site(
    graph: &mut BaseGraph,
    stubs: &mut HashMap<String, Stub>,
    model: &CodeModel,
    hierarchy: &Hierarchy,
    components: &ComponentModel,
    id: NodeIndex,
    pending: &mut Vec<(String, MethodSig)>,
) -> GraphResult<()> {
    let vertex = graph.vertex(id).clone();
    let caller = vertex.method().to_string();
    let pieces = split_after_invokes(&caller, vertex.statement());

    let succs_with_self = graph.successors(id);
    let self_loop = succs_with_self.contains(&id);
    let preds: Vec<NodeIndex> = graph
        .predecessors(id)
        .into_iter()
        .filter(|p| *p != id)
        .collect();
    let succs: Vec<NodeIndex> = succs_with_self.into_iter().filter(|s| *s != id).collect();
    graph.remove_node(id);

    let mut piece_ids = Vec::with_capacity(pieces.len());
    for (k, (stmt, _)) in pieces.iter().enumerate() {
        let branch_target = k == 0 && vertex.is_branch_target();
        piece_ids.push(graph.add_vertex(Vertex::with_branch_target(stmt.clone(), branch_target)));
    }
    let (first, last) = match (piece_ids.first(), piece_ids.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => {
            return Err(GraphError::Internal(format!(
                "invoke vertex split into nothing: {vertex}"
            )))
        }
    };
    for p in preds {
        graph.add_edge(p, first);
    }
    for s in succs {
        graph.add_edge(last, s);
    }
    // a self-referencing call block loops from its last piece to its first
    if self_loop {
        graph.add_edge(last, first);
    }

    for (k, (_, call)) in pieces.iter().enumerate() {
        if let Some((target, _)) = call {
            // a trailing call always has a continuation piece behind it
            let to = piece_ids.get(k + 1).copied().ok_or_else(|| {
                GraphError::Internal(format!("call without continuation in {caller}"))
            })?;
            wire_call(
                graph, stubs, model, hierarchy, components, &caller, target, piece_ids[k], to,
                pending,
            );
        }
    }
    Ok(())
}

/// Cuts a statement after each invoke instruction it carries. Every
/// continuation piece starts with a virtual `Return` marker for the call
/// ending the previous piece. Returned alongside each piece is its trailing
/// call, if any.
#[allow(clippy::type_complexity)]
fn split_after_invokes(
    method: &str,
    stmt: &Statement,
) -> Vec<(Statement, Option<(MethodSig, u32)>)> {
    let elements: Vec<Statement> = match stmt {
        Statement::Block { stmts, .. } => stmts.clone(),
        other => vec![other.clone()],
    };
    let mut pieces = Vec::new();
    let mut current: Vec<Statement> = Vec::new();
    for element in elements {
        let call = element
            .instruction()
            .filter(|i| i.is_invoke())
            .and_then(|i| i.target().map(|t| (t.clone(), i.index())));
        current.push(element);
        if let Some((target, index)) = call {
            if let Some(piece) = Statement::block(method, std::mem::take(&mut current)) {
                pieces.push((piece, Some((target.clone(), index))));
            }
            current.push(Statement::Return {
                method: method.to_string(),
                callee: target.to_string(),
                call_index: index,
            });
        }
    }
    if let Some(piece) = Statement::block(method, current) {
        pieces.push((piece, None));
    }
    pieces
}

fn wire_call(
    graph: &mut BaseGraph,
    stubs: &mut HashMap<String, Stub>,
    model: &CodeModel,
    hierarchy: &Hierarchy,
    components: &ComponentModel,
    caller: &str,
    target: &MethodSig,
    from: NodeIndex,
    to: NodeIndex,
    pending: &mut Vec<(String, MethodSig)>,
) {
    let caller_class = caller.split("->").next().unwrap_or(caller);
    let ctx = resolve::DetectCtx {
        model,
        hierarchy,
        components,
        caller_class,
    };
    match resolve::resolve(&ctx, target) {
        resolve::Resolution::Targets(sigs) if sigs.is_empty() => {
            log::warn!("unresolved call target {target} in {caller}, using a dummy stub");
            let stub = ensure_stub(graph, stubs, &target.to_string());
            graph.add_edge(from, stub.entry);
            graph.add_edge(stub.exit, to);
        }
        resolve::Resolution::Targets(sigs) => {
            for sig in sigs {
                let stub = ensure_stub(graph, stubs, &sig.to_string());
                graph.add_edge(from, stub.entry);
                graph.add_edge(stub.exit, to);
            }
        }
        resolve::Resolution::Chain(sigs) => {
            let mut cur = from;
            for sig in sigs {
                match stubs.get(&sig.to_string()).copied() {
                    Some(stub) => {
                        graph.add_edge(cur, stub.entry);
                        cur = stub.exit;
                    }
                    None => log::trace!("chain member without body skipped: {sig}"),
                }
            }
            graph.add_edge(cur, to);
        }
        resolve::Resolution::Callback(sig) => {
            log::trace!("callback registration in {caller}: {sig}");
            pending.push((caller_class.to_string(), sig));
            graph.add_edge(from, to);
        }
    }
}

/// Known stub, or a fresh dummy (entry connected straight to exit) recorded
/// under the requested name.
fn ensure_stub(graph: &mut BaseGraph, stubs: &mut HashMap<String, Stub>, method: &str) -> Stub {
    if let Some(stub) = stubs.get(method) {
        return *stub;
    }
    log::debug!("creating dummy stub for {method}");
    let entry = graph.add_vertex(Vertex::new(Statement::Entry {
        method: method.to_string(),
    }));
    let exit = graph.add_vertex(Vertex::new(Statement::Exit {
        method: method.to_string(),
    }));
    graph.add_edge(entry, exit);
    let stub = Stub { entry, exit };
    stubs.insert(method.to_string(), stub);
    stub
}

/// Deletes everything unreachable from the global entry, the designated exit
/// excepted, and drops the dead methods from the table.
fn prune(graph: &mut BaseGraph, stubs: &mut HashMap<String, Stub>) {
    let entry = graph.entry_index();
    let mut keep = graph.transitive_successors(entry);
    keep.insert(entry);
    keep.insert(graph.exit_index());
    let dead: Vec<NodeIndex> = graph
        .node_indices()
        .filter(|id| !keep.contains(id))
        .collect();
    if !dead.is_empty() {
        log::debug!("pruning {} unreachable vertices", dead.len());
    }
    for id in dead {
        graph.remove_node(id);
    }
    stubs.retain(|name, stub| {
        let live = keep.contains(&stub.entry) && keep.contains(&stub.exit);
        if !live {
            log::trace!("dropping pruned method {name}");
        }
        live
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture;
    use df_components::{Component, ComponentKind};
    use df_instr::{ClassDef, InstrKind};

    use InstrKind::{If, Invoke, Plain, Return};

    fn class(name: &str, superclass: &str, bodies: Vec<MethodBody>) -> ClassDef {
        let mut class = ClassDef::new(name, Some(superclass));
        for body in bodies {
            class.push_method(body);
        }
        class
    }

    fn demo_model() -> (CodeModel, ComponentModel) {
        let main = class(
            "com.example.Main",
            "android.app.Activity",
            vec![
                fixture::stream(
                    "com.example.Main-><init>()V",
                    &[(0, "return-void", Return, &[])],
                ),
                fixture::stream(
                    "com.example.Main->onCreate(Landroid.os.Bundle;)V",
                    &[
                        (0, "const/4", Plain, &[1]),
                        (1, "invoke-static com.example.Util->helper()V", Invoke, &[2]),
                        (2, "invoke-static android.util.Log->d(Ljava.lang.String;)I", Invoke, &[3]),
                        (3, "return-void", Return, &[]),
                    ],
                ),
                fixture::stream(
                    "com.example.Main->onPause()V",
                    &[(0, "return-void", Return, &[])],
                ),
            ],
        );
        let util = class(
            "com.example.Util",
            "java.lang.Object",
            vec![fixture::stream(
                "com.example.Util->helper()V",
                &[
                    (0, "const/4", Plain, &[1]),
                    (1, "return-void", Return, &[]),
                ],
            )],
        );
        let dead = class(
            "com.example.Dead",
            "java.lang.Object",
            vec![fixture::stream(
                "com.example.Dead->unused()V",
                &[(0, "return-void", Return, &[])],
            )],
        );
        let model = CodeModel::new(vec![main, util, dead]);
        let mut components = ComponentModel::new("com.example", Some("com.example.Main"));
        components.push(Component::new("com.example.Main", ComponentKind::Activity));
        (model, components)
    }

    fn build(model: &CodeModel, components: &ComponentModel, options: &Options) -> InterCfg {
        let hierarchy = Hierarchy::build(model);
        InterCfg::build(
            model,
            &hierarchy,
            components,
            &LifecycleConfig::default(),
            options,
        )
        .unwrap()
    }

    #[test]
    fn stitching_connects_callees_and_prunes_dead_code() {
        let (model, components) = demo_model();
        let options = Options {
            mode: Mode::Instruction,
            ..Options::default()
        };
        let inter = build(&model, &components, &options);

        // live methods kept, dead ones pruned together with their stubs
        let helper = inter.stub("com.example.Util->helper()V").unwrap();
        assert!(inter.stub("com.example.Dead->unused()V").is_err());

        // the lifecycle makes the callee reachable from the global entry
        let g = inter.graph();
        assert!(g.distance(g.entry_index(), helper.entry).is_some());

        // the excluded framework call got a dummy stub
        let dummy = inter
            .stub("android.util.Log->d(Ljava.lang.String;)I")
            .unwrap();
        assert_eq!(g.successors(dummy.entry), vec![dummy.exit]);

        // control comes back through a virtual return marker
        assert!(g.iter_vertices().any(|v| {
            v.is_return() && v.method() == "com.example.Main->onCreate(Landroid.os.Bundle;)V"
        }));
    }

    #[test]
    fn lifecycle_chain_runs_through_the_callbacks_loop() {
        let (model, components) = demo_model();
        let inter = build(&model, &components, &Options::default());
        let g = inter.graph();

        let ctor = inter.stub("com.example.Main-><init>()V").unwrap();
        let on_create = inter
            .stub("com.example.Main->onCreate(Landroid.os.Bundle;)V")
            .unwrap();
        let cb = inter
            .stub(&callbacks_method("com.example.Main"))
            .unwrap();
        let on_pause = inter.stub("com.example.Main->onPause()V").unwrap();

        assert_eq!(g.successors(g.entry_index()), vec![ctor.entry]);
        assert!(g.successors(ctor.exit).contains(&on_create.entry));
        assert!(g.successors(on_create.exit).contains(&cb.entry));
        // the interactive phase loops on itself
        assert!(g.successors(cb.entry).contains(&cb.entry));
        assert!(g.successors(cb.entry).contains(&on_pause.entry));
        // teardown ends at the global exit
        assert!(g.distance(on_pause.exit, g.exit_index()).is_some());
    }

    #[test]
    fn block_mode_splits_after_each_invoke() {
        let (model, components) = demo_model();
        let inter = build(&model, &components, &Options::default());
        let g = inter.graph();

        // the continuation after the helper call starts with its marker
        let marker = g
            .iter_vertices()
            .find(|v| match v.statement().first() {
                Statement::Return { callee, .. } => callee == "com.example.Util->helper()V",
                _ => false,
            })
            .expect("no continuation piece");
        let helper = inter.stub("com.example.Util->helper()V").unwrap();
        let marker_id = g.node_of(marker).unwrap();
        assert!(g.predecessors(marker_id).contains(&helper.exit));
    }

    #[test]
    fn self_referencing_call_block_keeps_its_loop() {
        let body = fixture::stream(
            "com.example.Loop->spin()V",
            &[
                (0, "invoke-static com.example.Loop->tick()V", Invoke, &[1]),
                (1, "if-eqz", If, &[0, 2]),
                (2, "return-void", Return, &[]),
            ],
        );
        let tick = fixture::stream(
            "com.example.Loop->tick()V",
            &[(0, "return-void", Return, &[])],
        );
        let model = CodeModel::new(vec![class(
            "com.example.Loop",
            "java.lang.Object",
            vec![body, tick],
        )]);
        let components = ComponentModel::new("com.example", None);
        let inter = build(&model, &components, &Options::default());
        let g = inter.graph();

        let call_piece = g
            .node_indices()
            .find(|id| {
                let v = g.vertex(*id);
                v.method() == "com.example.Loop->spin()V" && v.statement().contains_index(0)
            })
            .unwrap();
        let branch_piece = g
            .node_indices()
            .find(|id| {
                let v = g.vertex(*id);
                v.method() == "com.example.Loop->spin()V" && v.statement().contains_index(1)
            })
            .unwrap();
        assert!(g.successors(branch_piece).contains(&call_piece));
    }

    #[test]
    fn thread_start_resolves_to_run() {
        let worker = class(
            "com.example.Worker",
            "java.lang.Thread",
            vec![fixture::stream(
                "com.example.Worker->run()V",
                &[(0, "return-void", Return, &[])],
            )],
        );
        let main = class(
            "com.example.Main",
            "android.app.Activity",
            vec![
                fixture::stream(
                    "com.example.Main-><init>()V",
                    &[(0, "return-void", Return, &[])],
                ),
                fixture::stream(
                    "com.example.Main->onCreate(Landroid.os.Bundle;)V",
                    &[
                        (0, "invoke-virtual com.example.Worker->start()V", Invoke, &[1]),
                        (1, "return-void", Return, &[]),
                    ],
                ),
            ],
        );
        let model = CodeModel::new(vec![worker, main]);
        let mut components = ComponentModel::new("com.example", Some("com.example.Main"));
        components.push(Component::new("com.example.Main", ComponentKind::Activity));
        let inter = build(&model, &components, &Options::default());

        let run = inter.stub("com.example.Worker->run()V").unwrap();
        let g = inter.graph();
        assert!(!g.predecessors(run.entry).is_empty());
        assert!(g.distance(g.entry_index(), run.entry).is_some());
        // the nominal start() body never got a stub of its own
        assert!(inter.stub("com.example.Worker->start()V").is_err());
    }

    #[test]
    fn parallel_build_matches_sequential() {
        let (model, components) = demo_model();
        let sequential = build(&model, &components, &Options::default());
        let parallel = build(
            &model,
            &components,
            &Options {
                parallel: true,
                ..Options::default()
            },
        );
        assert_eq!(sequential.graph().vertex_count(), parallel.graph().vertex_count());
        assert_eq!(sequential.graph().edge_count(), parallel.graph().edge_count());
        let methods = |i: &InterCfg| {
            let mut names: Vec<String> = i.methods().map(str::to_string).collect();
            names.sort_unstable();
            names
        };
        assert_eq!(methods(&sequential), methods(&parallel));
    }
}

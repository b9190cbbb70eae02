use crate::inputs;
use crate::prelude::*;
use clap::ArgMatches;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Above this vertex count a graph without a forced output format is
/// written as json rather than dot.
const DEFAULT_DOT_THRESHOLD: usize = 2000;

pub fn run(args: &ArgMatches) -> DfResult<()> {
    init_logger(args);

    let model = inputs::code_model(args)?;
    let options = inputs::graph_options(args)?;

    if let Some(method) = args.get_one::<String>("method") {
        let sig: MethodSig = method.parse()?;
        let body = model.require_method(&sig)?;
        let cfg = IntraCfg::build(body, options.mode)?;
        log::info!(
            "cfg for {sig}: {} vertices, {} edges",
            cfg.graph().vertex_count(),
            cfg.graph().edge_count()
        );

        if args.get_flag("post-dominators") {
            let pdt = PostDominatorTree::build(cfg.graph())?;
            return export(args, pdt.graph());
        }
        if args.get_flag("dependence") {
            let pdt = PostDominatorTree::build(cfg.graph())?;
            let cdg = ControlDependenceGraph::build(cfg.graph(), &pdt)?;
            return export(args, cdg.graph());
        }
        return export(args, cfg.graph());
    }

    let components = inputs::component_model(args)?;
    let hierarchy = Hierarchy::build(&model);
    let inter = InterCfg::build(
        &model,
        &hierarchy,
        &components,
        &LifecycleConfig::default(),
        &options,
    )?;
    log::info!(
        "inter-procedural graph: {} methods, {} vertices, {} edges",
        inter.nb_methods(),
        inter.graph().vertex_count(),
        inter.graph().edge_count()
    );
    export(args, inter.graph())
}

fn export(args: &ArgMatches, graph: &BaseGraph) -> DfResult<()> {
    let Some(fname) = args.get_one::<String>("output") else {
        println!("{} vertices, {} edges", graph.vertex_count(), graph.edge_count());
        return Ok(());
    };
    let threshold = args
        .get_one::<usize>("dot-threshold")
        .copied()
        .unwrap_or(DEFAULT_DOT_THRESHOLD);
    let as_json = match Path::new(fname).extension().and_then(|e| e.to_str()) {
        Some("json") => true,
        Some("dot") => false,
        // no forced format: dot stays readable only for small graphs
        _ => graph.vertex_count() > threshold,
    };
    let mut file = File::create(fname)?;
    if as_json {
        serde_json::to_writer_pretty(&mut file, &json_value(graph))?;
    } else {
        file.write_all(graph.to_dot().as_bytes())?;
    }
    log::info!("graph written in {fname:?}");
    Ok(())
}

fn json_value(graph: &BaseGraph) -> serde_json::Value {
    let vertices: Vec<serde_json::Value> = graph
        .node_indices()
        .map(|id| {
            let vertex = graph.vertex(id);
            serde_json::json!({
                "id": id.index(),
                "method": vertex.method(),
                "label": vertex.to_string(),
            })
        })
        .collect();
    let edges: Vec<serde_json::Value> = graph
        .edges()
        .map(|(a, b)| serde_json::json!([a.index(), b.index()]))
        .collect();
    serde_json::json!({
        "entry": graph.entry_index().index(),
        "exit": graph.exit_index().index(),
        "vertices": vertices,
        "edges": edges,
    })
}

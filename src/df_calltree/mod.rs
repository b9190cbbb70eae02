use crate::inputs;
use crate::prelude::*;
use clap::ArgMatches;
use std::fs::File;
use std::io::Write;

pub fn run(args: &ArgMatches) -> DfResult<()> {
    init_logger(args);

    let model = inputs::code_model(args)?;
    let components = inputs::component_model(args)?;
    let options = inputs::graph_options(args)?;
    let hierarchy = Hierarchy::build(&model);
    let inter = InterCfg::build(
        &model,
        &hierarchy,
        &components,
        &LifecycleConfig::default(),
        &options,
    )?;
    let tree = CallTree::build(&inter);
    log::info!("call tree contains {} methods", tree.nb_methods());

    if let Some(target) = args.get_one::<String>("target") {
        match tree.shortest_path_from_root(target) {
            Some(path) => print_path(&path),
            None => log::warn!("no path from the root to {target}"),
        }
    }

    if let Some(stops) = args.get_many::<String>("stops") {
        let stops: Vec<&str> = stops.map(String::as_str).collect();
        match tree.shortest_path_with_stops(&stops) {
            Some(path) => print_path(&path),
            None => log::warn!("no path through {stops:?}"),
        }
    }

    if args.get_flag("unreachable") {
        let mut methods: Vec<String> = tree.unreachable().into_iter().collect();
        methods.sort();
        log::info!("{} methods unreachable from the root", methods.len());
        for method in methods {
            println!("{method}");
        }
    }

    if let Some(dot_filename) = &args.get_one::<String>("output") {
        let mut file = File::create(dot_filename)?;
        file.write_all(tree.to_dot().as_bytes())?;
        log::info!("dot output written in {dot_filename:?}");
    }

    Ok(())
}

fn print_path(path: &[String]) {
    for (i, method) in path.iter().enumerate() {
        println!("{i:4}: {method}");
    }
}

use crate::inputs;
use crate::prelude::*;
use clap::ArgMatches;

pub fn run(args: &ArgMatches) -> DfResult<()> {
    init_logger(args);

    let model = inputs::code_model(args)?;
    let options = inputs::graph_options(args)?;
    let traces: Vec<Trace> = args
        .get_many::<String>("trace")
        .ok_or_else(|| DfError::BadArguments("--trace needed".to_string()))?
        .map(|s| s.parse::<Trace>())
        .collect::<Result<_, _>>()?;

    if args.get_one::<String>("components").is_some() {
        let components = inputs::component_model(args)?;
        let hierarchy = Hierarchy::build(&model);
        let inter = InterCfg::build(
            &model,
            &hierarchy,
            &components,
            &LifecycleConfig::default(),
            &options,
        )?;
        for trace in &traces {
            let id = inter.lookup(trace)?;
            println!("{trace} => {}", inter.graph().vertex(id));
        }
        return Ok(());
    }

    for trace in &traces {
        let body = model.require_method(trace.sig())?;
        let cfg = IntraCfg::build(body, options.mode)?;
        let id = cfg.lookup(trace)?;
        println!("{trace} => {}", cfg.graph().vertex(id));
    }
    Ok(())
}

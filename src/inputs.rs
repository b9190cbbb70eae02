//! Provider file loading and graph option decoding shared by the
//! subcommands.

use crate::prelude::*;
use clap::ArgMatches;
use regex::Regex;

pub fn code_model(args: &ArgMatches) -> DfResult<CodeModel> {
    let fname = args
        .get_one::<String>("input")
        .ok_or_else(|| DfError::BadArguments("--input needed".to_string()))?;
    let model = CodeModel::open(fname)?;
    log::info!(
        "code model loaded: {} classes, {} methods",
        model.nb_classes(),
        model.nb_methods()
    );
    Ok(model)
}

pub fn component_model(args: &ArgMatches) -> DfResult<ComponentModel> {
    let fname = args
        .get_one::<String>("components")
        .ok_or_else(|| DfError::BadArguments("--components needed".to_string()))?;
    let components = ComponentModel::open(fname)?;
    log::info!(
        "component model loaded: package {}, {} components",
        components.package(),
        components.iter().count()
    );
    Ok(components)
}

pub fn graph_options(args: &ArgMatches) -> DfResult<GraphOptions> {
    let mode = if args.get_flag("instruction") {
        Mode::Instruction
    } else {
        Mode::Block
    };
    let excludes = match args.get_many::<String>("exclude") {
        Some(patterns) => patterns
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?,
        None => default_excludes(),
    };
    Ok(GraphOptions {
        mode,
        excludes,
        parallel: args.get_flag("parallel"),
    })
}

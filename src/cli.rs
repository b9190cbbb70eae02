//! Main `DexFlow` binary command line arguments options.
//!
//! This module declares a function to build `clap` command line arguments
//! parser, so that it can be used from other places than the main binary,
//! such as from bash completion file generator.

use clap::{value_parser, Arg, ArgAction, Command};
use clap_complete::Shell;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");
const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

fn arg_debug() -> Arg {
    Arg::new("debug")
        .short('d')
        .long("debug")
        .action(ArgAction::SetTrue)
        .help("Activate debug mode")
}

fn arg_verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .long("verbose")
        .action(ArgAction::SetTrue)
        .help("Activate verbose mode")
}

fn arg_ecslog() -> Arg {
    Arg::new("ecslog")
        .short('e')
        .long("ecslog")
        .action(ArgAction::SetTrue)
        .help("Output logs in ECS format")
}

fn arg_input() -> Arg {
    Arg::new("input")
        .short('i')
        .long("input")
        .action(ArgAction::Set)
        .required(true)
        .help("Code model input file (json)")
}

fn arg_components() -> Arg {
    Arg::new("components")
        .short('c')
        .long("components")
        .action(ArgAction::Set)
        .help("Component model input file (json)")
}

fn arg_output(help: &str) -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .action(ArgAction::Set)
        .help(help.to_string())
}

fn arg_method() -> Arg {
    Arg::new("method")
        .short('m')
        .long("method")
        .action(ArgAction::Set)
        .help("Method signature (class->name(proto))")
}

fn arg_instruction() -> Arg {
    Arg::new("instruction")
        .long("instruction")
        .action(ArgAction::SetTrue)
        .help("Build instruction-level graphs (instead of block-level graphs)")
}

fn arg_parallel() -> Arg {
    Arg::new("parallel")
        .short('p')
        .long("parallel")
        .action(ArgAction::SetTrue)
        .help("Build per-method graphs in parallel")
}

fn arg_exclude() -> Arg {
    Arg::new("exclude")
        .long("exclude")
        .action(ArgAction::Append)
        .help("Class(es) regex to exclude (replaces the stock framework list)")
}

#[must_use]
pub fn dexflow() -> Command {
    Command::new(NAME)
        .version(VERSION)
        .author(AUTHORS)
        .about(DESCRIPTION)
        .subcommand(calltree())
        .subcommand(cfg())
        .subcommand(lookup())
        .subcommand(
            Command::new("gen-completions")
                .about("Generates completions file")
                .arg(
                    Arg::new("shell")
                        .short('s')
                        .long("shell")
                        .action(ArgAction::Set)
                        .value_parser(value_parser!(Shell))
                        .required(true)
                        .help("Shell type for completion generation"),
                ),
        )
}

#[must_use]
pub fn cfg() -> Command {
    Command::new("cfg")
        .bin_name("df-cfg")
        .version(VERSION)
        .author(AUTHORS)
        .about("Builds control flow graphs and their derived graphs")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_components())
        .arg(arg_method())
        .arg(arg_instruction())
        .arg(arg_parallel())
        .arg(arg_exclude())
        .arg(arg_output("Output dot or json file"))
        .arg(
            Arg::new("dot-threshold")
                .long("dot-threshold")
                .action(ArgAction::Set)
                .value_parser(value_parser!(usize))
                .help("Vertex count above which json output is preferred over dot"),
        )
        .arg(
            Arg::new("post-dominators")
                .long("post-dominators")
                .action(ArgAction::SetTrue)
                .requires("method")
                .conflicts_with("dependence")
                .help("Output the post-dominator tree of the method graph"),
        )
        .arg(
            Arg::new("dependence")
                .long("dependence")
                .action(ArgAction::SetTrue)
                .requires("method")
                .help("Output the control dependence graph of the method graph"),
        )
}

#[must_use]
pub fn calltree() -> Command {
    Command::new("calltree")
        .bin_name("df-calltree")
        .version(VERSION)
        .author(AUTHORS)
        .about("Builds the method call tree and answers path queries over it")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_components().required(true))
        .arg(arg_instruction())
        .arg(arg_parallel())
        .arg(arg_exclude())
        .arg(arg_output("Output dot file"))
        .arg(
            Arg::new("target")
                .short('t')
                .long("target")
                .action(ArgAction::Set)
                .help("Print a shortest path from the root to this method"),
        )
        .arg(
            Arg::new("stops")
                .long("stop")
                .action(ArgAction::Append)
                .conflicts_with("target")
                .help("Print a shortest path from the root through these methods in order"),
        )
        .arg(
            Arg::new("unreachable")
                .short('u')
                .long("unreachable")
                .action(ArgAction::SetTrue)
                .help("Print the methods unreachable from the root"),
        )
}

#[must_use]
pub fn lookup() -> Command {
    Command::new("lookup")
        .bin_name("df-lookup")
        .version(VERSION)
        .author(AUTHORS)
        .about("Resolves coverage traces to graph vertices")
        .arg(arg_debug())
        .arg(arg_verbose())
        .arg(arg_ecslog())
        .arg(arg_input())
        .arg(arg_components())
        .arg(arg_instruction())
        .arg(arg_parallel())
        .arg(arg_exclude())
        .arg(
            Arg::new("trace")
                .short('t')
                .long("trace")
                .action(ArgAction::Append)
                .required(true)
                .help("Coverage trace (class->method->entry|exit|index)"),
        )
}

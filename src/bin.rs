use clap::ArgMatches;
use clap_complete::{generate, Shell};
use dexflow::prelude::*;
use dexflow::{cli, df_calltree, df_cfg, df_lookup};
use std::io;

fn main() -> DfResult<()> {
    let args = cli::dexflow().get_matches();

    match &args.subcommand() {
        Some(("calltree", cmd_args)) => df_calltree::run(cmd_args),
        Some(("cfg", cmd_args)) => df_cfg::run(cmd_args),
        Some(("lookup", cmd_args)) => df_lookup::run(cmd_args),
        Some(("gen-completions", sub_args)) => subcommand_gen_completions(sub_args),
        Some((subcommand, _)) => Err(DfError::BadArguments(format!(
            "unknown subcommand '{subcommand}'"
        ))),
        None => Err(DfError::BadArguments("missing subcommand".to_string())),
    }
}

fn subcommand_gen_completions(sub_args: &ArgMatches) -> DfResult<()> {
    let generator = *sub_args
        .get_one::<Shell>("shell")
        .ok_or_else(|| DfError::BadArguments("--shell needed".to_string()))?;
    let mut cmd = cli::dexflow();
    let cmd_name = cmd.get_name().to_string();
    generate(generator, &mut cmd, cmd_name, &mut io::stdout());
    Ok(())
}

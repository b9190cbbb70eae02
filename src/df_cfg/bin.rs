use dexflow::prelude::DfResult;
use dexflow::{cli, df_cfg};

fn main() -> DfResult<()> {
    let args = cli::cfg().get_matches();
    df_cfg::run(&args)
}

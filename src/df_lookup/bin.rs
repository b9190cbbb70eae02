use dexflow::prelude::DfResult;
use dexflow::{cli, df_lookup};

fn main() -> DfResult<()> {
    let args = cli::lookup().get_matches();
    df_lookup::run(&args)
}

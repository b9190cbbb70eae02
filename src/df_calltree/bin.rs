use dexflow::prelude::DfResult;
use dexflow::{cli, df_calltree};

fn main() -> DfResult<()> {
    let args = cli::calltree().get_matches();
    df_calltree::run(&args)
}

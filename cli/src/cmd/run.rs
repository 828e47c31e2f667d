use pcu_core::action;

use super::{GlobalArgs, SubcmdResult};

/// Compile, then judge test cases
#[derive(Debug, clap::Args)]
pub struct Args {
    pub problem: String,

    /// Test ids to run [default: all]
    pub test_ids: Vec<String>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let s = global_args.session()?;
    action::run(&s, &args.problem, &args.test_ids, args.json).await?;
    Ok(())
}

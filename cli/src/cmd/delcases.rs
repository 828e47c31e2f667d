use pcu_core::action;

use super::{GlobalArgs, SubcmdResult};

/// Delete test cases
#[derive(Debug, clap::Args)]
pub struct Args {
    pub problem: String,

    /// Test ids to delete [default: all]
    pub test_ids: Vec<String>,
}

pub fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let s = global_args.session()?;
    action::delete_cases(&s, &args.problem, &args.test_ids)?;
    Ok(())
}

use pcu_core::action;

use super::{GlobalArgs, SubcmdResult};

/// Delete a problem with all its test cases
#[derive(Debug, clap::Args)]
pub struct Args {
    pub problem: String,
}

pub fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let s = global_args.session()?;
    action::delete_problem(&s, &args.problem)
}

use pcu_core::action;

use super::{GlobalArgs, SubcmdResult};

/// Show a problem's environment, resolved commands and test cases
#[derive(Debug, clap::Args)]
pub struct Args {
    pub problem: String,
}

pub fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let s = global_args.session()?;
    action::info(&s, &args.problem)
}

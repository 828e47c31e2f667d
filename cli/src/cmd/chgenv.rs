use pcu_core::action;

use super::{GlobalArgs, SubcmdResult};

/// Switch a problem to another environment, keeping its overrides
#[derive(Debug, clap::Args)]
pub struct Args {
    pub problem: String,
    pub env: String,
}

pub fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let s = global_args.session()?;
    action::change_env(&s, &args.problem, &args.env)
}

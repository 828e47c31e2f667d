use pcu_core::action;

use super::{GlobalArgs, SubcmdResult};

/// List environments (`*` marks the default)
#[derive(Debug, clap::Args)]
pub struct Args {}

pub fn exec(_args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let s = global_args.session()?;
    action::list_envs(&s.cfg);
    Ok(())
}

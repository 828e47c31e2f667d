use pcu_core::action;

use super::{GlobalArgs, SubcmdResult};

/// Delete every problem
#[derive(Debug, clap::Args)]
pub struct Args {
    /// Do not ask for confirmation
    #[arg(short = 'y', long)]
    pub yes: bool,
}

pub fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let s = global_args.session()?;
    action::delete_all_problems(&s, !args.yes)?;
    Ok(())
}

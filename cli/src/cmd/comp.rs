use pcu_core::action;

use super::{GlobalArgs, SubcmdResult};

/// Compile the problem's source file
#[derive(Debug, clap::Args)]
pub struct Args {
    pub problem: String,

    /// Build in ./<problem>_compiled/ and keep it
    #[arg(short, long)]
    pub local: bool,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let s = global_args.session()?;
    action::comp(&s, &args.problem, args.local).await?;
    Ok(())
}

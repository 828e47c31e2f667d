use pcu_core::action::{self, MakeOptions};

use super::{GlobalArgs, SubcmdResult};

/// Create a problem (or reset it) and write its source template
#[derive(Debug, clap::Args)]
pub struct Args {
    pub problem: String,

    /// Environment name or alias [default: `default_env` of settings]
    #[arg(short, long)]
    pub env: Option<String>,

    /// Do not write the source template
    #[arg(short = 'S', long)]
    pub nosrc: bool,

    /// Keep existing test cases and settings of the problem
    #[arg(short = 'C', long)]
    pub noclean: bool,

    /// Overwrite an existing source file
    #[arg(long)]
    pub force: bool,
}

pub fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let s = global_args.session()?;
    let opts = MakeOptions {
        env: args.env.as_deref(),
        write_source: !args.nosrc,
        keep_data: args.noclean,
        force: args.force,
    };
    action::make(&s, &args.problem, &opts)?;
    Ok(())
}

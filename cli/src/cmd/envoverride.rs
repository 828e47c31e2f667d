use pcu_core::action;

use super::{GlobalArgs, SubcmdResult};

/// Override one environment field for a problem; omit the value to remove the override
#[derive(Debug, clap::Args)]
pub struct Args {
    pub problem: String,

    /// Field name, e.g. run_timelimit_msec
    pub key: String,

    /// TOML value; anything that does not parse is taken as a string
    pub value: Option<String>,
}

pub fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let s = global_args.session()?;
    action::env_override(&s, &args.problem, &args.key, args.value.as_deref())
}

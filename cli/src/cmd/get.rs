use std::io::Write as _;

use anyhow::Context as _;
use pcu_core::{action, storage::TestSlot};

use super::{GlobalArgs, SubcmdResult};

/// Print one file of a test case
#[derive(Debug, clap::Args)]
pub struct Args {
    pub problem: String,
    pub test_id: String,
}

pub fn exec(args: &Args, global_args: &GlobalArgs, slot: TestSlot) -> SubcmdResult {
    let s = global_args.session()?;
    let data = action::get_slot(&s, &args.problem, &args.test_id, slot)?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&data)
        .and_then(|_| stdout.flush())
        .context("Failed to write to stdout")
}

use std::io::{IsTerminal as _, Read as _};

use anyhow::Context as _;
use colored::Colorize as _;
use pcu_core::{action, storage::TestSlot};

use super::{GlobalArgs, SubcmdResult};

/// Read a file of a test case from stdin
#[derive(Debug, clap::Args)]
pub struct Args {
    pub problem: String,
    pub test_id: String,
}

pub fn exec(args: &Args, global_args: &GlobalArgs, slot: TestSlot) -> SubcmdResult {
    let s = global_args.session()?;

    let mut stdin = std::io::stdin().lock();
    if stdin.is_terminal() {
        eprintln!(
            "{}",
            format!("Enter the {} of '{}', then Ctrl-D:", slot.describe(), args.test_id).cyan()
        );
    }
    let mut data = Vec::new();
    stdin
        .read_to_end(&mut data)
        .context("Failed to read from stdin")?;

    action::set_slot(&s, &args.problem, &args.test_id, slot, &data)
}

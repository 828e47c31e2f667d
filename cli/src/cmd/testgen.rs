use std::path::PathBuf;

use pcu_core::{action, testing::DEFAULT_TEST_ID_PREFIX};

use super::{GlobalArgs, SubcmdResult};

/// Generate test cases with a generator executable.
///
/// The generator is run as `<executable> <seq> <seed>`; its stdout becomes the
/// input and its stderr the answer.
#[derive(Debug, clap::Args)]
pub struct Args {
    pub problem: String,
    pub executable: PathBuf,

    /// Number of test cases
    #[arg(short, default_value_t = 1)]
    pub n: usize,

    /// Prefix of the generated test ids
    #[arg(short, long, default_value = DEFAULT_TEST_ID_PREFIX)]
    pub prefix: String,
}

pub async fn exec(args: &Args, global_args: &GlobalArgs) -> SubcmdResult {
    let s = global_args.session()?;
    action::testgen(&s, &args.problem, &args.executable, args.n, &args.prefix).await?;
    Ok(())
}

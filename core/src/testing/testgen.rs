use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context as _};
use indicatif::ProgressBar;
use rand::{rngs::OsRng, Rng as _};

use crate::{
    errors::EngineError,
    storage::{is_valid_identifier, Problem, TestSlot},
};

use super::process::{Termination, TimedCommand};

pub const DEFAULT_TEST_ID_PREFIX: &str = "gen";

/// Seeds handed to generators are in `[0, 2^31)`.
const SEED_UPPER_BOUND: u32 = 1 << 31;

/// Picks the first `n` ids of the form `<prefix><6 digits>` not in `taken`.
///
/// ```
/// use std::collections::BTreeSet;
/// use pcu_core::testing::allocate_test_ids;
///
/// let taken: BTreeSet<String> = ["gen000001".to_owned()].into();
/// assert_eq!(
///     allocate_test_ids(&taken, "gen", 3),
///     vec!["gen000000", "gen000002", "gen000003"],
/// );
/// ```
pub fn allocate_test_ids(taken: &BTreeSet<String>, prefix: &str, n: usize) -> Vec<String> {
    (0..)
        .map(|i: u64| format!("{}{:06}", prefix, i))
        .filter(|id| !taken.contains(id))
        .take(n)
        .collect()
}

/// Runs `executable <seq> <seed>` `n` times, storing stdout as the input and
/// stderr as the answer of a fresh test case each time.
///
/// Stops at the first failing run; cases generated before it are kept and nothing
/// is written for the failing one.
pub async fn generate(
    problem: &Problem<'_>,
    executable: &Path,
    n: usize,
    prefix: &str,
    progress: &ProgressBar,
) -> anyhow::Result<Vec<String>> {
    ensure!(
        is_valid_identifier(&format!("{}0", prefix)),
        "Invalid test id prefix '{}'",
        prefix
    );
    if !fsutil::is_executable_file(executable) {
        return Err(EngineError::GeneratorNotExecutable(executable.to_owned()).into());
    }
    let executable = absolute(executable)?;

    let taken: BTreeSet<String> = problem.list_test_ids()?.into_iter().collect();
    let ids = allocate_test_ids(&taken, prefix, n);

    progress.set_length(ids.len() as u64);
    let mut generated = Vec::with_capacity(ids.len());
    for (seq, id) in ids.into_iter().enumerate() {
        progress.set_message(id.clone());
        generate_one(problem, &executable, seq, &id).await?;
        generated.push(id);
        progress.inc(1);
    }
    Ok(generated)
}

async fn generate_one(
    problem: &Problem<'_>,
    executable: &Path,
    seq: usize,
    test_id: &str,
) -> anyhow::Result<()> {
    let seed = OsRng.gen_range(0..SEED_UPPER_BOUND);
    let workdir = tempfile::tempdir().context("Failed to create generator working directory")?;

    let run = TimedCommand::new(executable)
        .arg(seq.to_string())
        .arg(seed.to_string())
        .current_dir(workdir.path())
        .time_limit(problem.config().generator_time_limit())
        .run()
        .await?;

    let failure = |reason: String| EngineError::GeneratorFailure {
        test_id: test_id.to_owned(),
        reason,
    };
    match run.termination {
        Termination::Exited(0) => {}
        Termination::TimedOut => {
            return Err(failure(format!(
                "time limit ({} msec) exceeded",
                problem.config().generator_timelimit_msec
            ))
            .into())
        }
        other => {
            let stderr = String::from_utf8_lossy(&run.stderr);
            let reason = match stderr.trim() {
                "" => other.to_string(),
                msg => format!("{}\n{}", other, msg),
            };
            return Err(failure(reason).into());
        }
    }

    fsutil::write(problem.test_path(test_id, TestSlot::Input), &run.stdout)?;
    if run.stderr.is_empty() {
        log::warn!(
            "Generator wrote nothing to stderr for '{}': the case has no answer",
            test_id
        );
        fsutil::remove_file_if_exists(problem.test_path(test_id, TestSlot::Answer))?;
    } else {
        fsutil::write(problem.test_path(test_id, TestSlot::Answer), &run.stderr)?;
    }
    log::debug!("Generated '{}' (seq={}, seed={})", test_id, seq, seed);
    Ok(())
}

fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_owned());
    }
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(cwd.join(path))
}

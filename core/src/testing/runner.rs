use std::path::Path;

use crate::{
    environment::{InputTarget, OutputTarget, Strictness},
    storage::{Problem, TestSlot},
};

use super::{
    process::{ProcessReport, StdinSource, TimedCommand},
    result::*,
};

/// Removes every ASCII whitespace byte. Other bytes are kept as they are,
/// so outputs that are not valid UTF-8 still compare exactly.
///
/// ```
/// use pcu_core::testing::strip_ws;
///
/// assert_eq!(strip_ws(b"1 2\n3\t\n"), b"123");
/// assert_eq!(strip_ws(b"4\n"), strip_ws(b"4"));
/// assert_ne!(strip_ws(b"\xff\n"), strip_ws(b"\xfe"));
/// ```
pub fn strip_ws(s: &[u8]) -> Vec<u8> {
    s.iter().copied().filter(|b| !b.is_ascii_whitespace()).collect()
}

/// Classifies one run. The first matching rule wins:
/// timeout, non-zero exit, no output, no answer, then the comparison itself.
pub fn classify(
    run: &ProcessReport,
    output: &[u8],
    answer: Option<&[u8]>,
    strictness: Strictness,
) -> RunOutcome {
    if run.timed_out() {
        return RunOutcome::TimeLimitExceeded;
    }
    if !run.success() {
        return RunOutcome::RuntimeError;
    }
    if output.is_empty() {
        return RunOutcome::NoOutputProduced;
    }
    let Some(answer) = answer else {
        return RunOutcome::NoAnswerProvided;
    };

    if output == answer {
        return RunOutcome::Correct;
    }
    if strip_ws(output) != strip_ws(answer) {
        return RunOutcome::WrongAnswer;
    }
    match strictness {
        Strictness::Lax => RunOutcome::Correct,
        Strictness::Strict => RunOutcome::PresentationError,
    }
}

/// Runs the program in `build_dir` against each test id, in sorted order.
///
/// Every id is checked before anything runs. Produced output and stderr are
/// stored back into the test case's slots unless the run produced no output.
pub async fn judge<S: AsRef<str>>(
    problem: &Problem<'_>,
    build_dir: &Path,
    test_ids: &[S],
) -> anyhow::Result<JudgeReport> {
    problem.ensure_tests_exist(test_ids)?;

    let mut ids: Vec<&str> = test_ids.iter().map(AsRef::as_ref).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut cases = Vec::with_capacity(ids.len());
    let mut summary = Summary::default();
    for id in ids {
        let case = run_test(problem, build_dir, id).await?;
        log::debug!("{}: {}", id, case.outcome);
        summary.add(case.outcome);
        cases.push(case);
    }

    Ok(JudgeReport {
        problem: problem.name().to_owned(),
        env_name: problem.env_name().to_owned(),
        score: summary.score(),
        cases,
        summary,
    })
}

pub async fn run_test(
    problem: &Problem<'_>,
    build_dir: &Path,
    test_id: &str,
) -> anyhow::Result<CaseReport> {
    let resolved = problem.resolved();
    let input = fsutil::read(problem.test_path(test_id, TestSlot::Input))?;

    let mut cmd = TimedCommand::shell(&problem.config().shell, &resolved.run_command)
        .current_dir(build_dir)
        .time_limit(resolved.run_time_limit());

    match resolved.input_target() {
        InputTarget::Stdin => cmd = cmd.stdin(StdinSource::Bytes(input)),
        InputTarget::File(file) => {
            let path = build_dir.join(file);
            fsutil::remove_file_if_exists(&path)?;
            fsutil::write_with_mkdir(&path, &input)?;
        }
    }
    if let OutputTarget::File(file) = resolved.output_target() {
        fsutil::remove_file_if_exists(build_dir.join(file))?;
    }

    let run = cmd.run().await?;

    let output = match resolved.output_target() {
        OutputTarget::Stdout => run.stdout.clone(),
        OutputTarget::File(file) => fsutil::read_if_exists(build_dir.join(file))?.unwrap_or_default(),
    };
    let answer = fsutil::read_if_exists(problem.test_path(test_id, TestSlot::Answer))?;
    let outcome = classify(&run, &output, answer.as_deref(), resolved.strictness());

    // without output nothing of this run is kept, only the stale slots go
    let stderr: &[u8] = if output.is_empty() { &[] } else { &run.stderr };
    store_artifact(problem, test_id, TestSlot::Output, &output)?;
    store_artifact(problem, test_id, TestSlot::Error, stderr)?;

    Ok(CaseReport {
        test_id: test_id.to_owned(),
        outcome,
        elapsed: run.elapsed,
        termination: run.termination,
        output,
        stderr: run.stderr,
        answer,
    })
}

/// Replaces the slot with `data`; an empty `data` just clears the stale slot.
fn store_artifact(
    problem: &Problem<'_>,
    test_id: &str,
    slot: TestSlot,
    data: &[u8],
) -> fsutil::Result<()> {
    let path = problem.test_path(test_id, slot);
    fsutil::remove_file_if_exists(&path)?;
    if !data.is_empty() {
        fsutil::write(&path, data)?;
    }
    Ok(())
}

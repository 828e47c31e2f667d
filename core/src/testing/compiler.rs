use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;

use crate::{
    errors::{CompileFailure, CompileFailureKind, EngineError},
    storage::Problem,
};

use super::process::{Termination, TimedCommand};

/// Directory the source is copied to, compiled in, and run from.
#[derive(Debug)]
pub enum BuildDir {
    /// Removed when dropped.
    Temp(tempfile::TempDir),
    /// Kept after the run (`comp --local`).
    Local(PathBuf),
}

impl BuildDir {
    pub fn temp() -> anyhow::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("pcu-build-")
            .tempdir()
            .context("Failed to create temporary build directory")?;
        Ok(Self::Temp(dir))
    }

    /// Recreates `dir` from scratch.
    pub fn local(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fsutil::remove_all_if_exists(&dir)?;
        fsutil::mkdir_all(&dir)?;
        Ok(Self::Local(dir))
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Temp(dir) => dir.path(),
            Self::Local(dir) => dir,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileReport {
    /// `None` when the environment has no compile step.
    pub command: Option<String>,
    pub elapsed: Duration,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CompileReport {
    pub fn has_warnings(&self) -> bool {
        !self.stdout.is_empty() || !self.stderr.is_empty()
    }

    pub fn diagnostics(&self) -> String {
        let mut s = String::from_utf8_lossy(&self.stderr).into_owned();
        s += &String::from_utf8_lossy(&self.stdout);
        s
    }
}

/// Copies the problem's source file from `src_dir` into `build_dir` and runs the
/// compile command there.
///
/// Warnings never fail the build; a non-zero exit or a timeout does.
pub async fn compile(
    problem: &Problem<'_>,
    src_dir: &Path,
    build_dir: &BuildDir,
) -> anyhow::Result<CompileReport> {
    let resolved = problem.resolved();
    let source = src_dir.join(&resolved.source_file);
    if !source.is_file() {
        return Err(EngineError::SourceMissing(source).into());
    }

    let dest = build_dir.path().join(&resolved.source_file);
    if let Some(parent) = dest.parent() {
        fsutil::mkdir_all(parent)?;
    }
    fsutil::copy_file(&source, &dest)?;

    let Some(command) = &resolved.compile_command else {
        log::debug!("No compile step for '{}'", problem.env_name());
        return Ok(CompileReport {
            command: None,
            elapsed: Duration::ZERO,
            stdout: Vec::new(),
            stderr: Vec::new(),
        });
    };

    log::info!("Compiling: {}", command);
    let report = TimedCommand::shell(&problem.config().shell, command)
        .current_dir(build_dir.path())
        .time_limit(resolved.compile_time_limit())
        .run()
        .await?;

    let kind = match report.termination {
        Termination::Exited(0) => {
            let ok = CompileReport {
                command: Some(command.clone()),
                elapsed: report.elapsed,
                stdout: report.stdout,
                stderr: report.stderr,
            };
            if ok.has_warnings() {
                log::warn!("Compiler output:\n{}", ok.diagnostics().trim_end());
            }
            return Ok(ok);
        }
        Termination::Exited(code) => CompileFailureKind::NonZeroExit(Some(code)),
        Termination::Signaled(_) => CompileFailureKind::NonZeroExit(None),
        Termination::TimedOut => CompileFailureKind::TimedOut(resolved.compile_time_limit()),
    };
    Err(EngineError::CompileFailure(CompileFailure {
        kind,
        stdout: report.stdout,
        stderr: report.stderr,
    })
    .into())
}

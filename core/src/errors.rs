use std::{fmt, path::PathBuf, time::Duration};

/// Failures of the engine's core operations.
///
/// Judging verdicts (wrong answer, time limit, ...) are never errors; they are
/// reported through [`crate::testing::RunOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(
        "Lock '{}' is already acquired: make sure no other pcu process is running on problem '{problem}'",
        .lock_path.to_string_lossy()
    )]
    LockContention { problem: String, lock_path: PathBuf },

    #[error("Problem '{0}' has no environment on record. Create it with `pcu make {0}` first")]
    UninitializedProblem(String),

    #[error("Invalid problem name '{0}' (use only letters, digits, '_', '-' and '.')")]
    InvalidProblemName(String),

    #[error("Unknown environment '{0}' (see `pcu envs`)")]
    UnknownEnvironment(String),

    #[error("Invalid environment '{name}': {reason}")]
    InvalidEnvironment { name: String, reason: String },

    #[error("Source file '{}' not found", .0.to_string_lossy())]
    SourceMissing(PathBuf),

    #[error("{0}")]
    CompileFailure(CompileFailure),

    #[error("Generator failed on test case '{test_id}': {reason}")]
    GeneratorFailure { test_id: String, reason: String },

    #[error("'{}' is not an executable file", .0.to_string_lossy())]
    GeneratorNotExecutable(PathBuf),

    #[error("Test case '{test_id}' not found for problem '{problem}'")]
    UnknownTestId { problem: String, test_id: String },

    #[error("No {slot} file for test case '{test_id}' in problem '{problem}'")]
    TestSlotMissing {
        problem: String,
        test_id: String,
        slot: &'static str,
    },

    #[error("Template '{name}' was not found: add it to '{}'", .templates_dir.to_string_lossy())]
    TemplateNotFound { name: String, templates_dir: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileFailureKind {
    NonZeroExit(Option<i32>),
    TimedOut(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileFailure {
    pub kind: CompileFailureKind,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl fmt::Display for CompileFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            CompileFailureKind::NonZeroExit(Some(code)) => {
                write!(f, "Compile failed with exit code {}", code)
            }
            CompileFailureKind::NonZeroExit(None) => {
                write!(f, "Compile failed: compiler was terminated by a signal")
            }
            CompileFailureKind::TimedOut(limit) => {
                write!(f, "Compile time limit ({} msec) exceeded", limit.as_millis())
            }
        }
    }
}

impl std::error::Error for CompileFailure {}

impl CompileFailure {
    /// Compiler diagnostics, stderr first.
    pub fn diagnostics(&self) -> String {
        let mut s = String::from_utf8_lossy(&self.stderr).into_owned();
        s += &String::from_utf8_lossy(&self.stdout);
        s
    }
}

impl EngineError {
    /// Process exit status the binary should use for this error.
    pub fn exit_code(&self) -> i32 {
        use EngineError::*;
        match self {
            LockContention { .. }
            | UninitializedProblem(_)
            | InvalidProblemName(_)
            | UnknownEnvironment(_) => 3,
            _ => 4,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn workspace_errors_use_distinct_exit_code() {
        let lock = EngineError::LockContention {
            problem: "a".into(),
            lock_path: "/tmp/x.lock".into(),
        };
        assert_eq!(lock.exit_code(), 3);
        assert_eq!(EngineError::UninitializedProblem("a".into()).exit_code(), 3);
        assert_eq!(EngineError::SourceMissing("a.cpp".into()).exit_code(), 4);
    }

    #[test]
    fn compile_failure_message() {
        let e = CompileFailure {
            kind: CompileFailureKind::TimedOut(Duration::from_millis(1500)),
            stdout: b"out".to_vec(),
            stderr: b"err\n".to_vec(),
        };
        assert_eq!(e.to_string(), "Compile time limit (1500 msec) exceeded");
        assert_eq!(e.diagnostics(), "err\nout");
    }
}

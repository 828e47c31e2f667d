use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

use maplit::btreemap;
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::str_interp::interp;

/// `input_file` value meaning "feed the test input through stdin".
pub const STDIN_SENTINEL: &str = "PCU_STDIN";
/// `output_file` value meaning "judge what the program writes to stdout".
pub const STDOUT_SENTINEL: &str = "PCU_STDOUT";

/// Placeholder names usable as `#{name}` in environment patterns and templates.
pub mod placeholder {
    pub const USER: &str = "user";
    pub const DATETIME: &str = "datetime";
    pub const PROBLEM_NAME: &str = "problemName";
    pub const ENV_NAME: &str = "envName";
    pub const COMPILE_TIME_LIMIT_MS: &str = "compileTimeLimitMs";
    pub const RUN_TIME_LIMIT_MS: &str = "runTimeLimitMs";
    pub const FORMAT_STRICTNESS: &str = "formatStrictness";
    pub const SOURCE_FILE: &str = "sourceFile";
    pub const SOURCE_FILE_STEM: &str = "sourceFileStem";
    pub const COMPILE_COMMAND: &str = "compileCommand";
    pub const RUN_COMMAND: &str = "runCommand";
    pub const INPUT_FILE: &str = "inputFile";
    pub const OUTPUT_FILE: &str = "outputFile";
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Strictness {
    /// Whitespace-only differences are accepted as correct.
    #[serde(alias = "LAX")]
    Lax,
    /// Whitespace-only differences are a presentation error.
    #[default]
    #[serde(alias = "STRICT")]
    Strict,
}

/// Per-problem overrides, shallow-merged over an [`Environment`]'s fields.
pub type EnvOverrides = BTreeMap<String, toml::Value>;

/// A toolchain profile. The string fields are patterns; see [`ResolvedEnvironment`]
/// for their per-problem values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Environment {
    #[serde(skip)]
    pub name: String,

    #[serde(default)]
    pub aliases: BTreeSet<String>,

    pub template_file: String,
    pub source_file: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile_command: Option<String>,

    pub run_command: String,

    #[serde(default = "Environment::default_input_file")]
    pub input_file: String,

    #[serde(default = "Environment::default_output_file")]
    pub output_file: String,

    #[serde(default = "Environment::default_compile_timelimit_msec")]
    pub compile_timelimit_msec: u64,

    #[serde(default = "Environment::default_run_timelimit_msec")]
    pub run_timelimit_msec: u64,

    #[serde(default)]
    pub format_strictness: Strictness,
}

/// Values every resolution depends on besides the environment itself.
#[derive(Debug, Clone, Copy)]
pub struct ResolveContext<'a> {
    pub problem_name: &'a str,
    pub user: &'a str,
    pub timestamp: &'a str,
}

/// Where a program's test input comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputTarget<'a> {
    Stdin,
    File(&'a str),
}

/// Where a program's answer is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget<'a> {
    Stdout,
    File(&'a str),
}

/// An environment with overrides applied and every pattern materialized for one problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEnvironment {
    pub env: Environment,
    pub mapping: BTreeMap<&'static str, String>,
    pub source_file: String,
    pub compile_command: Option<String>,
    pub run_command: String,
    pub input_file: String,
    pub output_file: String,
}

impl Environment {
    fn default_input_file() -> String {
        STDIN_SENTINEL.to_owned()
    }

    fn default_output_file() -> String {
        STDOUT_SENTINEL.to_owned()
    }

    fn default_compile_timelimit_msec() -> u64 {
        60_000
    }

    fn default_run_timelimit_msec() -> u64 {
        5_000
    }

    fn invalid(&self, reason: impl ToString) -> EngineError {
        EngineError::InvalidEnvironment {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.compile_timelimit_msec == 0 || self.run_timelimit_msec == 0 {
            return Err(self.invalid("time limits must be positive"));
        }
        if self.source_file.trim().is_empty() {
            return Err(self.invalid("source_file must not be empty"));
        }
        if self.run_command.trim().is_empty() {
            return Err(self.invalid("run_command must not be empty"));
        }
        Ok(())
    }

    /// Shallow field-level merge of `overrides` over this environment.
    /// The merged result goes through the same validation as a freshly loaded one.
    pub fn with_overrides(&self, overrides: &EnvOverrides) -> Result<Self, EngineError> {
        if overrides.is_empty() {
            return Ok(self.clone());
        }

        let mut value = toml::Value::try_from(self).map_err(|e| self.invalid(e))?;
        if let toml::Value::Table(table) = &mut value {
            table.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let mut merged: Environment = value.try_into().map_err(|e| self.invalid(e))?;
        merged.name = self.name.clone();
        merged.validate()?;
        Ok(merged)
    }

    /// Applies `overrides`, then materializes every pattern for the problem in `ctx`.
    ///
    /// The source file resolves first since every later pattern may refer to it.
    pub fn resolve(
        &self,
        ctx: &ResolveContext,
        overrides: &EnvOverrides,
    ) -> Result<ResolvedEnvironment, EngineError> {
        use placeholder::*;

        let env = self.with_overrides(overrides)?;

        let mut mapping = btreemap! {
            USER => ctx.user.to_owned(),
            DATETIME => ctx.timestamp.to_owned(),
            PROBLEM_NAME => ctx.problem_name.to_owned(),
            ENV_NAME => env.name.clone(),
            COMPILE_TIME_LIMIT_MS => env.compile_timelimit_msec.to_string(),
            RUN_TIME_LIMIT_MS => env.run_timelimit_msec.to_string(),
            FORMAT_STRICTNESS => env.format_strictness.to_string(),
        };

        let source_file = interp(&env.source_file, &mapping);
        mapping.insert(SOURCE_FILE, source_file.clone());
        mapping.insert(SOURCE_FILE_STEM, strip_extension(&source_file).to_owned());

        let compile_command = env
            .compile_command
            .as_deref()
            .map(|p| interp(p, &mapping))
            .filter(|cmd| !cmd.trim().is_empty());
        mapping.insert(COMPILE_COMMAND, compile_command.clone().unwrap_or_default());

        let run_command = interp(&env.run_command, &mapping);
        mapping.insert(RUN_COMMAND, run_command.clone());

        let input_file = interp(&env.input_file, &mapping);
        mapping.insert(INPUT_FILE, input_file.clone());

        let output_file = interp(&env.output_file, &mapping);
        mapping.insert(OUTPUT_FILE, output_file.clone());

        Ok(ResolvedEnvironment {
            env,
            mapping,
            source_file,
            compile_command,
            run_command,
            input_file,
            output_file,
        })
    }
}

impl ResolvedEnvironment {
    /// Substitutes this problem's placeholders into `s`.
    pub fn sub_params(&self, s: &str) -> String {
        interp(s, &self.mapping)
    }

    pub fn input_target(&self) -> InputTarget {
        match self.input_file.as_str() {
            STDIN_SENTINEL => InputTarget::Stdin,
            file => InputTarget::File(file),
        }
    }

    pub fn output_target(&self) -> OutputTarget {
        match self.output_file.as_str() {
            STDOUT_SENTINEL => OutputTarget::Stdout,
            file => OutputTarget::File(file),
        }
    }

    pub fn compile_time_limit(&self) -> Duration {
        Duration::from_millis(self.env.compile_timelimit_msec)
    }

    pub fn run_time_limit(&self) -> Duration {
        Duration::from_millis(self.env.run_timelimit_msec)
    }

    pub fn strictness(&self) -> Strictness {
        self.env.format_strictness
    }
}

/// Drops the last extension of the file name part, keeping any directory.
///
/// ```
/// use pcu_core::environment::strip_extension;
///
/// assert_eq!(strip_extension("main.cpp"), "main");
/// assert_eq!(strip_extension("src/a.tar.gz"), "src/a.tar");
/// assert_eq!(strip_extension("Makefile"), "Makefile");
/// assert_eq!(strip_extension(".bashrc"), ".bashrc");
/// assert_eq!(strip_extension("v1.2/run"), "v1.2/run");
/// ```
pub fn strip_extension(path: &str) -> &str {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    let name = &path[name_start..];
    match name.rfind('.') {
        Some(dot) if name[..dot].chars().any(|c| c != '.') => &path[..name_start + dot],
        _ => path,
    }
}

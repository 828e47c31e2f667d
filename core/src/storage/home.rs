use std::path::{Path, PathBuf};

use super::error::Result;

/// Root of everything pcu persists (`~/.pcu` unless overridden).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcuHome {
    base: PathBuf,
}

impl PcuHome {
    const SETTINGS_FILENAME: &str = "settings.toml";
    const TEMPLATES_DIR_NAME: &str = "templates";
    const PROBLEMS_DIR_NAME: &str = "problems";
    const LOCKS_DIR_NAME: &str = ".locks";

    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn settings_file(&self) -> PathBuf {
        self.base.join(Self::SETTINGS_FILENAME)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.base.join(Self::TEMPLATES_DIR_NAME)
    }

    pub fn template_file(&self, template_file: &str) -> PathBuf {
        self.templates_dir().join(template_file)
    }

    pub fn problems_dir(&self) -> PathBuf {
        self.base.join(Self::PROBLEMS_DIR_NAME)
    }

    pub fn problem_dir(&self, problem_name: &str) -> PathBuf {
        self.problems_dir().join(problem_name)
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.base.join(Self::LOCKS_DIR_NAME)
    }

    pub fn lock_file(&self, lock_name: &str) -> PathBuf {
        self.locks_dir().join(format!("{}.lock", lock_name))
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fsutil::mkdir_all(self.templates_dir())?;
        fsutil::mkdir_all(self.problems_dir())?;
        fsutil::mkdir_all(self.locks_dir())
    }

    /// Names of every problem directory, sorted.
    pub fn problem_names(&self) -> Result<Vec<String>> {
        let dir = self.problems_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = fsutil::read_dir(&dir)?
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }
}

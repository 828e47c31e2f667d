use std::path::{Path, PathBuf};

use anyhow::Context as _;
use pcu_core::EngineError;

pub fn current_dir() -> anyhow::Result<PathBuf> {
    std::env::current_dir().context("Failed to get current dir")
}

pub fn replace_homedir_to_tilde(path: impl Into<PathBuf>) -> PathBuf {
    let path = path.into();
    let Some(home_dir) = ::dirs::home_dir() else {
        return path
    };
    path.strip_prefix(home_dir)
        .map(|path| Path::new("~").join(path))
        .unwrap_or(path)
}

/// Exit status for a failed command: the engine's own code when an [`EngineError`]
/// is anywhere in the chain, otherwise 1.
pub fn exit_code(e: &anyhow::Error) -> i32 {
    e.chain()
        .find_map(|cause| cause.downcast_ref::<EngineError>())
        .map_or(1, EngineError::exit_code)
}

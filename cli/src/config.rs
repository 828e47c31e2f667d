use std::path::PathBuf;

use anyhow::Context as _;
use pcu_core::storage::PcuHome;
use serde::Deserialize;

use crate::cmd::GlobalArgs;

pub const APP_DIR_NAME: &str = ".pcu";

/// `PCU_*` environment variables.
#[derive(Debug, Clone, Default, Deserialize)]
struct EnvVars {
    home: Option<PathBuf>,
}

impl EnvVars {
    const PREFIX: &str = "PCU_";

    fn from_env() -> anyhow::Result<Self> {
        envy::prefixed(Self::PREFIX)
            .from_env::<Self>()
            .context("Invalid PCU_* environment variable")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalConfig {
    pub home: PathBuf,
}

impl GlobalConfig {
    pub fn default_home() -> anyhow::Result<PathBuf> {
        let dir = dirs::home_dir().context("Failed to get user's home dir path")?;
        Ok(dir.join(APP_DIR_NAME))
    }

    /// `--home` wins over `$PCU_HOME`, which wins over `~/.pcu`.
    pub fn from_env_and_args(args: &GlobalArgs) -> anyhow::Result<Self> {
        let home = match &args.home {
            Some(dir) => dir.clone(),
            None => match EnvVars::from_env()?.home {
                Some(dir) => dir,
                None => Self::default_home()?,
            },
        };
        Ok(Self { home })
    }

    pub fn pcu_home(&self) -> PcuHome {
        PcuHome::new(&self.home)
    }
}

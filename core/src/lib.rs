pub mod action;
pub mod color;
pub mod config;
pub mod environment;
pub mod errors;
pub mod interactive;
pub mod storage;
pub mod str_interp;
pub mod style;
pub mod testing;

pub use crate::config::Config;
pub use crate::errors::EngineError;

pub mod error {
    #[allow(unused_imports)]
    pub(crate) use anyhow::{anyhow, bail, ensure, Context as _};
    pub use anyhow::{Error, Result};
}

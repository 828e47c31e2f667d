pub mod chgenv;
pub mod comp;
pub mod delcases;
pub mod delprob;
pub mod delprobs;
pub mod envoverride;
pub mod envs;
pub mod get;
pub mod info;
pub mod make;
pub mod run;
pub mod set;
pub mod testgen;

use std::path::PathBuf;

use pcu_core::{action::Session, storage::TestSlot};

use crate::{config::GlobalConfig, util};

#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct GlobalArgs {
    #[command(subcommand)]
    pub subcmd: Subcommand,

    /// Base directory of pcu data [env: PCU_HOME] [default: ~/.pcu]
    #[arg(long, global = true)]
    pub home: Option<PathBuf>,

    /// Print debug logs
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, clap::Subcommand)]
pub enum Subcommand {
    Make(make::Args),
    Comp(comp::Args),

    #[command(alias("r"))]
    Run(run::Args),

    /// Print the input of a test case
    Getin(get::Args),
    /// Print the answer of a test case
    Getans(get::Args),
    /// Print the output of the last run of a test case
    Getout(get::Args),
    /// Print the stderr of the last run of a test case
    Geterr(get::Args),

    /// Read the input of a test case from stdin
    Setin(set::Args),
    /// Read the answer of a test case from stdin
    Setans(set::Args),

    Delcases(delcases::Args),
    Delprob(delprob::Args),
    Delprobs(delprobs::Args),
    Chgenv(chgenv::Args),
    Envoverride(envoverride::Args),
    Info(info::Args),
    Envs(envs::Args),
    Testgen(testgen::Args),
}

pub type SubcmdResult = anyhow::Result<()>;

impl GlobalArgs {
    pub async fn exec_subcmd(&self) -> SubcmdResult {
        use Subcommand::*;
        match &self.subcmd {
            Make(args) => make::exec(args, self),
            Comp(args) => comp::exec(args, self).await,
            Run(args) => run::exec(args, self).await,
            Getin(args) => get::exec(args, self, TestSlot::Input),
            Getans(args) => get::exec(args, self, TestSlot::Answer),
            Getout(args) => get::exec(args, self, TestSlot::Output),
            Geterr(args) => get::exec(args, self, TestSlot::Error),
            Setin(args) => set::exec(args, self, TestSlot::Input),
            Setans(args) => set::exec(args, self, TestSlot::Answer),
            Delcases(args) => delcases::exec(args, self),
            Delprob(args) => delprob::exec(args, self),
            Delprobs(args) => delprobs::exec(args, self),
            Chgenv(args) => chgenv::exec(args, self),
            Envoverride(args) => envoverride::exec(args, self),
            Info(args) => info::exec(args, self),
            Envs(args) => envs::exec(args, self),
            Testgen(args) => testgen::exec(args, self).await,
        }
    }

    /// Loads settings from the resolved home and binds the current directory.
    pub fn session(&self) -> anyhow::Result<Session> {
        let cfg = GlobalConfig::from_env_and_args(self)?;
        log::debug!("Home: {:?}", util::replace_homedir_to_tilde(&cfg.home));
        Session::load(cfg.pcu_home(), util::current_dir()?)
    }
}

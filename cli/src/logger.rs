use std::io::Write as _;

use colored::Colorize as _;
use pcu_core::color::{self, DefaultPalette, SemanticColor as _};

const DEFAULT_FILTER: &str = "warn,pcu=info,pcu_cli=info,pcu_core=info";
const VERBOSE_FILTER: &str = "warn,pcu=debug,pcu_cli=debug,pcu_core=debug";

/// Initializes `env_logger`; `RUST_LOG` still takes precedence.
pub fn init(verbose: bool) {
    let default_filter = if verbose {
        VERBOSE_FILTER
    } else {
        DEFAULT_FILTER
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format(|buf, record| {
            let level = record.level();
            writeln!(
                buf,
                "{} {}",
                color::level_tag(level).color(DefaultPalette.level(level)).bold(),
                record.args()
            )
        })
        .init();
}

use clap::Parser;
use colored::Colorize as _;
use pcu_cli::{cmd::GlobalArgs, logger, util};

#[tokio::main]
async fn main() {
    let app = GlobalArgs::parse();
    logger::init(app.verbose);

    app.exec_subcmd().await.unwrap_or_else(|e| {
        eprintln!("{} {:?}", "Error:".bright_red().bold(), e);
        std::process::exit(util::exit_code(&e));
    });
}

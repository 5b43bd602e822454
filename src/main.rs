use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

fn main() -> ExitCode {
    if let Err(err) = try_main() {
        eprintln!("{err:#}");
        return storypack::error::exit_code_for(&err);
    }

    ExitCode::SUCCESS
}

fn try_main() -> anyhow::Result<()> {
    let cli = storypack::cli::Cli::parse();
    storypack::logging::init(&cli.global.log_file).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    storypack::app::run(cli)
}

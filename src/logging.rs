use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context as _;
use tracing_subscriber::Layer as _;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Target used for the progress journal; events on it go to the log file only.
pub const JOURNAL_TARGET: &str = "storypack::journal";

/// Installs two layers: diagnostics on stderr (filtered by `RUST_LOG`, default `info`)
/// and the journal appended to `log_file` without ANSI styling.
pub fn init(log_file: &Path) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new("info"))
        .context("build log filter")?
        .add_directive(
            format!("{JOURNAL_TARGET}=off")
                .parse()
                .context("build journal directive")?,
        );

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("open log file: {}", log_file.display()))?;

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(filter);
    let journal = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_level(false)
        .with_writer(Mutex::new(file))
        .with_filter(Targets::new().with_target(JOURNAL_TARGET, LevelFilter::INFO));

    tracing_subscriber::registry()
        .with(console)
        .with(journal)
        .try_init()
        .map_err(|err| anyhow::anyhow!("initialize tracing subscriber: {err}"))?;

    Ok(())
}

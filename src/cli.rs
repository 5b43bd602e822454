use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Directory holding stylesheets and other bundled resources.
    #[arg(long, global = true, env = "STORYPACK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Append-only log of every story downloaded.
    #[arg(
        long,
        global = true,
        env = "STORYPACK_LOG_FILE",
        default_value = "storypack.log"
    )]
    pub log_file: PathBuf,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download stories from supported sites.
    Download(DownloadArgs),
    /// Assemble a story from loose HTML pages, one chapter per URL.
    Html(HtmlArgs),
    /// Fetch new chapters into books written earlier.
    Update(UpdateArgs),
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    /// File with one URL per line; `#` starts a comment line.
    #[arg(short = 'f', long = "from")]
    pub from: Option<PathBuf>,

    /// Show per-chapter progress.
    #[arg(short, long)]
    pub verbose: bool,

    /// Use this site's adapter instead of the one the host name selects.
    #[arg(long)]
    pub site: Option<String>,

    /// Story URLs.
    pub urls: Vec<String>,
}

#[derive(Debug, Args)]
pub struct HtmlArgs {
    #[arg(short, long)]
    pub author: String,

    #[arg(short, long)]
    pub title: String,

    /// File with one URL per line; `#` starts a comment line.
    #[arg(short = 'f', long = "from")]
    pub from: Option<PathBuf>,

    /// Show per-chapter progress.
    #[arg(short, long)]
    pub verbose: bool,

    /// Chapter URLs, in reading order.
    pub urls: Vec<String>,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Fetch every chapter again instead of reusing the packaged ones.
    #[arg(short, long)]
    pub force: bool,

    /// Copy each book to `<file>.bck` before rewriting it.
    #[arg(short, long)]
    pub backup: bool,

    /// Show per-chapter progress.
    #[arg(short, long)]
    pub verbose: bool,

    /// Use this site's adapter instead of the one the host name selects.
    #[arg(long)]
    pub site: Option<String>,

    /// Books written by an earlier download.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

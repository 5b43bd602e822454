//! Command dispatch: turns parsed arguments into story runs.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use url::Url;

use crate::cli::{Cli, Command, DownloadArgs, HtmlArgs, UpdateArgs};
use crate::fields::list2text;
use crate::http::HttpClient;
use crate::journal::Journal;
use crate::resources::{self, Resources};
use crate::sites::{self, Adapter, HtmlStory};
use crate::story::{self, Previous, Session};

pub fn run(cli: Cli) -> anyhow::Result<()> {
    let root = match cli.global.data_dir {
        Some(dir) => dir,
        None => resources::default_root()?,
    };
    let resources = resources::ensure_data(&root)
        .with_context(|| format!("prepare data directory: {}", root.display()))?;
    tracing::debug!(root = %resources.root.display(), styles = resources.styles.len(), "resources ready");

    let client = HttpClient::new()?;
    match cli.command {
        Command::Download(args) => download(&client, &resources, args).context("download"),
        Command::Html(args) => html(&client, &resources, args).context("html"),
        Command::Update(args) => update(&client, &resources, args).context("update"),
    }
}

fn download(client: &HttpClient, resources: &Resources, args: DownloadArgs) -> anyhow::Result<()> {
    let session = Session {
        fetch: client,
        journal: Journal::new(args.verbose),
        resources,
    };
    let site = forced_site(args.site.as_deref())?;

    for raw in collect_urls(args.from.as_deref(), args.urls)? {
        let url = match Url::parse(&raw) {
            Ok(url) => url,
            Err(err) => {
                session.journal.problem(&format!("{raw} is not a valid URL: {err}"));
                continue;
            }
        };
        let Some(adapter) = site.or_else(|| sites::resolve(&url)) else {
            session.journal.record(&unsupported_site());
            continue;
        };
        story::run(&session, adapter, url, None)?;
    }
    Ok(())
}

fn html(client: &HttpClient, resources: &Resources, args: HtmlArgs) -> anyhow::Result<()> {
    let chapters = collect_urls(args.from.as_deref(), args.urls)?;
    let Some(first) = chapters.first() else {
        anyhow::bail!("You must provide at least one URL to download.");
    };
    let start = Url::parse(first).with_context(|| format!("parse first chapter url: {first}"))?;

    let session = Session {
        fetch: client,
        journal: Journal::new(args.verbose),
        resources,
    };
    let adapter = HtmlStory {
        author: args.author,
        title: args.title,
        chapters,
    };
    story::run(&session, &adapter, start, None)?;
    Ok(())
}

fn update(client: &HttpClient, resources: &Resources, args: UpdateArgs) -> anyhow::Result<()> {
    let session = Session {
        fetch: client,
        journal: Journal::new(args.verbose),
        resources,
    };
    let site = forced_site(args.site.as_deref())?;

    for file in &args.files {
        if !file.is_file() {
            session
                .journal
                .problem(&format!("File {} doesn't exist.", file.display()));
            continue;
        }

        let previous = Previous::open(file)?;
        let Some(url) = previous.document.source_url.clone() else {
            session.journal.problem(&format!(
                "File {} doesn't contain requested information.",
                file.display()
            ));
            continue;
        };
        let Some(adapter) = site.or_else(|| sites::resolve(&url)) else {
            session.journal.record(&unsupported_site());
            continue;
        };

        if args.backup {
            let backup = backup_path(file);
            fs::copy(file, &backup)
                .with_context(|| format!("back up {} to {}", file.display(), backup.display()))?;
            session
                .journal
                .note(format!("Backed up into {}", backup.display()));
        }

        let previous = if args.force {
            previous.forget_chapters()
        } else {
            previous
        };
        story::run(&session, adapter, url, Some(previous))?;
    }
    Ok(())
}

fn forced_site(key: Option<&str>) -> anyhow::Result<Option<&'static (dyn Adapter + Sync)>> {
    let Some(key) = key else {
        return Ok(None);
    };
    match sites::by_key(key) {
        Some(adapter) => Ok(Some(adapter)),
        None => anyhow::bail!(
            "unknown site {key:?}; expected one of {}",
            list2text(&sites::supported_sites())
        ),
    }
}

fn unsupported_site() -> String {
    format!(
        "storypack is currently only able to download from {}.",
        list2text(&sites::supported_sites())
    )
}

/// URLs from `from` (one per line, `#` comments and blank lines skipped) followed by
/// those given on the command line.
fn collect_urls(from: Option<&Path>, urls: Vec<String>) -> anyhow::Result<Vec<String>> {
    let mut out = Vec::new();
    if let Some(path) = from {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read url list: {}", path.display()))?;
        out.extend(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_owned),
        );
    }
    out.extend(
        urls.into_iter()
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty()),
    );
    Ok(out)
}

fn backup_path(file: &Path) -> PathBuf {
    let mut name = OsString::from(file.as_os_str());
    name.push(".bck");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_lists_skip_comments_and_blanks() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let list = temp.path().join("urls.txt");
        fs::write(
            &list,
            "# favourites\nhttps://www.fanfiction.net/s/1/1/\n\n   \n  https://archiveofourown.org/works/2  \n#https://skipped.test/\n",
        )?;

        let urls = collect_urls(Some(&list), vec!["https://tthfanfic.org/Story-3".to_owned()])?;
        assert_eq!(
            urls,
            vec![
                "https://www.fanfiction.net/s/1/1/",
                "https://archiveofourown.org/works/2",
                "https://tthfanfic.org/Story-3",
            ]
        );
        Ok(())
    }

    #[test]
    fn missing_url_list_is_an_error() {
        let err = collect_urls(Some(Path::new("/nonexistent/urls.txt")), Vec::new())
            .expect_err("missing file");
        assert!(format!("{err:#}").contains("read url list"));
    }

    #[test]
    fn backups_keep_the_full_name() {
        assert_eq!(
            backup_path(Path::new("books/A - B.epub")),
            PathBuf::from("books/A - B.epub.bck")
        );
    }

    #[test]
    fn unsupported_message_names_every_site() {
        let message = unsupported_site();
        assert!(message.starts_with("storypack is currently only able to download from "));
        assert!(message.contains("fanfiction.net"));
        assert!(message.ends_with(", and tthfanfic.org."));
    }

    #[test]
    fn forced_site_must_exist() {
        assert!(matches!(forced_site(None), Ok(None)));
        assert!(matches!(forced_site(Some("archiveofourown.org")), Ok(Some(_))));
        assert!(forced_site(Some("example.com")).is_err());
    }
}

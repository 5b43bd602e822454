//! One story, start to finish: main page, details, chapters, packaged document.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use url::Url;

use crate::cover::Cover;
use crate::epub::{self, Book, PackagedDocument};
use crate::http::Fetch;
use crate::journal::Journal;
use crate::metadata::{self, Metadata};
use crate::resources::Resources;
use crate::sites::Adapter;
use crate::walker;

/// What every story in a run shares.
pub struct Session<'a> {
    pub fetch: &'a dyn Fetch,
    pub journal: Journal,
    pub resources: &'a Resources,
}

/// A book written by an earlier run that this run rewrites in place.
#[derive(Debug)]
pub struct Previous {
    pub path: PathBuf,
    pub document: PackagedDocument,
}

impl Previous {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let document = PackagedDocument::open(path)
            .with_context(|| format!("read packaged document: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            document,
        })
    }

    /// Drops the stored chapter bodies so every chapter is fetched again.
    pub fn forget_chapters(mut self) -> Self {
        self.document.chapters.clear();
        self
    }
}

/// Downloads the story at `url` and writes it out; returns the path written.
///
/// Without `previous` the book goes to the default file name in the working
/// directory. With it, chapters already packaged are reused and the same file is
/// overwritten.
pub fn run(
    session: &Session<'_>,
    adapter: &dyn Adapter,
    url: Url,
    previous: Option<Previous>,
) -> anyhow::Result<PathBuf> {
    session.journal.record(&format!("Downloading {url}"));
    tracing::debug!(site = adapter.name(), url = %url, "opening story");

    let page = adapter.open(session.fetch, url)?;
    let details = adapter
        .make_title_page(&page, session.fetch)
        .with_context(|| format!("read story details: {}", page.url))?;
    let chapters = adapter
        .get_chapters(&page, &details)
        .with_context(|| format!("read chapter list: {}", page.url))?;
    let metadata = Metadata::new(adapter.source_url(&page), details, chapters, metadata::now());
    session.journal.note(format!(
        "{} by {}, {} chapter(s)",
        metadata.details.title,
        metadata.details.author.name,
        metadata.chapters.len()
    ));

    let (out_path, existing, cover) = match previous {
        Some(previous) => (
            previous.path,
            previous.document.chapters,
            previous.document.cover,
        ),
        None => (
            PathBuf::from(metadata.filename(adapter.is_adult())),
            Vec::new(),
            None,
        ),
    };
    let cover = cover.unwrap_or_else(|| {
        Cover::generate(&metadata.details.title, &metadata.details.author.name)
    });
    if !existing.is_empty() {
        tracing::debug!(count = existing.len(), "reusing packaged chapters");
    }

    let chapters = walker::step_through_chapters(
        adapter,
        session.fetch,
        &session.journal,
        &metadata,
        &page.url,
        &existing,
    )?;

    session.journal.written(&out_path);
    epub::write(
        &Book {
            metadata: &metadata,
            chapters: &chapters,
            cover: &cover,
            styles: &session.resources.styles,
        },
        &out_path,
    )
    .with_context(|| format!("write packaged document: {}", out_path.display()))?;

    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::stub::StubFetch;
    use crate::resources::Stylesheet;
    use crate::sites::HtmlStory;

    fn resources() -> Resources {
        Resources {
            root: PathBuf::new(),
            styles: vec![Stylesheet {
                name: "style.css".to_owned(),
                content: String::new(),
            }],
        }
    }

    fn leaves(count: usize) -> HtmlStory {
        HtmlStory {
            author: "Anon".to_owned(),
            title: "Leaves".to_owned(),
            chapters: (1..=count)
                .map(|n| format!("https://pages.test/leaf{n}.html"))
                .collect(),
        }
    }

    fn fetch(count: usize) -> StubFetch {
        (1..=count).fold(StubFetch::default(), |fetch, n| {
            fetch.page(
                &format!("https://pages.test/leaf{n}.html"),
                format!("<html><body><p>Leaf number {n}.</p></body></html>"),
            )
        })
    }

    #[test]
    fn previous_book_is_extended_in_place() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let resources = resources();
        let path = temp.path().join("Anon - Leaves.epub");
        let start = Url::parse("https://pages.test/leaf1.html")?;

        let first = fetch(2);
        let session = Session {
            fetch: &first,
            journal: Journal::default(),
            resources: &resources,
        };
        let placeholder = Previous {
            path: path.clone(),
            document: PackagedDocument::default(),
        };
        run(&session, &leaves(2), start.clone(), Some(placeholder))?;
        let before = PackagedDocument::open(&path)?;
        assert_eq!(before.chapters.len(), 2);
        assert!(before.source_url.is_none());

        let second = fetch(3);
        let session = Session {
            fetch: &second,
            journal: Journal::default(),
            resources: &resources,
        };
        let written = run(&session, &leaves(3), start, Some(Previous::open(&path)?))?;
        assert_eq!(written, path);
        assert_eq!(second.requested(), vec!["https://pages.test/leaf3.html"]);

        let after = PackagedDocument::open(&path)?;
        assert_eq!(after.chapters.len(), 3);
        assert_eq!(after.chapters[..2], before.chapters[..]);
        assert_eq!(after.cover, before.cover);
        assert!(after.chapters[2].contains("Leaf number 3."));
        Ok(())
    }

    #[test]
    fn forgetting_chapters_fetches_everything() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let resources = resources();
        let path = temp.path().join("book.epub");
        let start = Url::parse("https://pages.test/leaf1.html")?;
        let fetch = fetch(2);
        let session = Session {
            fetch: &fetch,
            journal: Journal::default(),
            resources: &resources,
        };
        let placeholder = Previous {
            path: path.clone(),
            document: PackagedDocument::default(),
        };
        run(&session, &leaves(2), start.clone(), Some(placeholder))?;
        run(
            &session,
            &leaves(2),
            start,
            Some(Previous::open(&path)?.forget_chapters()),
        )?;
        assert_eq!(fetch.requested().len(), 4);
        Ok(())
    }
}

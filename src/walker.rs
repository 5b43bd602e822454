use anyhow::Context as _;
use url::Url;

use crate::http::Fetch;
use crate::journal::Journal;
use crate::metadata::Metadata;
use crate::normalize::clean_text;
use crate::sites::Adapter;
use crate::xhtml::xml_escape;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Zero-padded 1-based position, e.g. `"07"`.
    pub number: String,
    pub title: String,
    /// Normalized XHTML body.
    pub content: String,
}

impl Chapter {
    pub fn stem(&self) -> String {
        format!("chapter{}", self.number)
    }
}

/// Width chapter numbers are padded to: the digit count of `count`, at least two.
pub fn chapter_padding(count: usize) -> usize {
    count.to_string().len().max(2)
}

/// Produces every chapter of the story in order.
///
/// Bodies in `existing` (from a previously packaged book, in chapter order) are
/// reused for the chapters they cover; only later chapters are fetched. A chapter
/// the adapter cannot address gets empty content.
pub fn step_through_chapters(
    adapter: &dyn Adapter,
    fetch: &dyn Fetch,
    journal: &Journal,
    metadata: &Metadata,
    base_url: &Url,
    existing: &[String],
) -> anyhow::Result<Vec<Chapter>> {
    let width = chapter_padding(metadata.chapters.len());
    let mut chapters = Vec::with_capacity(metadata.chapters.len());

    for (index, entry) in metadata.chapters.iter().enumerate() {
        let position = index + 1;
        let number = format!("{position:0width$}");
        let title = entry.title().to_owned();

        if let Some(body) = existing.get(index) {
            tracing::debug!(chapter = %number, "reusing packaged chapter");
            chapters.push(Chapter {
                number,
                title,
                content: body.clone(),
            });
            continue;
        }

        let Some(url) = adapter.make_new_chapter_url(base_url, &entry.url_value(position)) else {
            tracing::debug!(chapter = %number, "chapter has no address");
            chapters.push(Chapter {
                number,
                title,
                content: String::new(),
            });
            continue;
        };

        journal.chapter(&number, &title);
        let response = fetch
            .get(&url)
            .with_context(|| format!("fetch chapter {number}: {url}"))?;
        if !response.is_success() {
            anyhow::bail!("chapter {number} returned HTTP {}: {url}", response.status);
        }
        let raw = adapter
            .get_raw_text(&response)
            .with_context(|| format!("extract chapter {number}: {url}"))?;

        let heading = format!("<h1>{}</h1>", xml_escape(&title));
        let content = clean_text(std::iter::once(heading).chain(raw));
        chapters.push(Chapter {
            number,
            title,
            content,
        });
    }

    Ok(chapters)
}

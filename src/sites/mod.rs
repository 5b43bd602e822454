//! Site adapters: one per supported fiction site, plus loose HTML pages.

mod adult_fanfiction;
mod archive_of_our_own;
mod fanfiction_net;
mod html_story;
mod tgstorytime;
mod twisting_the_hellmouth;

use std::sync::LazyLock;

use anyhow::Context as _;
use regex::Regex;
use scraper::{ElementRef, Html};
use url::Url;

use crate::dom;
use crate::error::FatalError;
use crate::http::{Fetch, Response};
use crate::metadata::{ChapterEntry, StoryDetails};

pub use adult_fanfiction::AdultFanFiction;
pub use archive_of_our_own::ArchiveOfOurOwn;
pub use fanfiction_net::FanFictionNet;
pub use html_story::HtmlStory;
pub use tgstorytime::TgStorytime;
pub use twisting_the_hellmouth::TwistingTheHellmouth;

static CHAPTER_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s+").expect("valid chapter number regex"));

/// A story's main page, fetched once and shared by the adapter's extraction steps.
pub struct StoryPage {
    /// Normalized URL chapter addresses are derived from.
    pub url: Url,
    pub document: Html,
}

impl StoryPage {
    /// Fetches `url`; anything but a 2xx answer aborts the run.
    pub fn fetch(fetch: &dyn Fetch, url: Url) -> anyhow::Result<Self> {
        let response = fetch.get(&url)?;
        Self::from_response(url, response)
    }

    pub fn from_response(url: Url, response: Response) -> anyhow::Result<Self> {
        if !response.is_success() {
            return Err(FatalError::MainPage {
                url: url.to_string(),
                status: response.status,
            }
            .into());
        }
        Ok(Self {
            url,
            document: response.document(),
        })
    }

    pub fn root(&self) -> ElementRef<'_> {
        self.document.root_element()
    }
}

pub trait Adapter {
    fn name(&self) -> &'static str;

    /// Adult sites get an `[ADULT] ` filename prefix.
    fn is_adult(&self) -> bool {
        false
    }

    fn open(&self, fetch: &dyn Fetch, url: Url) -> anyhow::Result<StoryPage> {
        StoryPage::fetch(fetch, url)
    }

    /// URL recorded in the book. `None` when the story has no single home page.
    fn source_url(&self, page: &StoryPage) -> Option<Url> {
        Some(page.url.clone())
    }

    fn make_title_page(&self, page: &StoryPage, fetch: &dyn Fetch)
    -> anyhow::Result<StoryDetails>;

    /// Selector for the chapter list entries, if the site has one.
    fn chapter_select(&self) -> Option<&'static str> {
        None
    }

    fn chapter_parser(&self, entry: ElementRef<'_>) -> anyhow::Result<ChapterEntry> {
        Ok(ChapterEntry::Title(strip_chapter_number(&dom::text(entry))))
    }

    /// Chapter list in reading order. A page without a list is a one-shot
    /// whose only chapter carries the story title.
    fn get_chapters(
        &self,
        page: &StoryPage,
        details: &StoryDetails,
    ) -> anyhow::Result<Vec<ChapterEntry>> {
        let entries = match self.chapter_select() {
            Some(css) => dom::select_all(page.root(), css)?,
            None => Vec::new(),
        };
        if entries.is_empty() {
            return Ok(vec![ChapterEntry::Title(details.title.clone())]);
        }
        entries
            .into_iter()
            .map(|entry| self.chapter_parser(entry))
            .collect()
    }

    /// URL of the chapter addressed by `value`; `None` when it has no page.
    fn make_new_chapter_url(&self, base: &Url, value: &str) -> Option<Url>;

    /// Raw body fragments of a fetched chapter page, in order.
    fn get_raw_text(&self, response: &Response) -> anyhow::Result<Vec<String>>;
}

/// Registered sites keyed by the last two labels of their host name.
pub static SITES: &[(&str, &(dyn Adapter + Sync))] = &[
    ("adult-fanfiction.org", &AdultFanFiction),
    ("archiveofourown.org", &ArchiveOfOurOwn),
    ("fanfiction.net", &FanFictionNet),
    ("fictionpress.com", &FanFictionNet),
    ("tgstorytime.com", &TgStorytime),
    ("tthfanfic.org", &TwistingTheHellmouth),
];

/// `www.fanfiction.net` and `m.fanfiction.net` both become `fanfiction.net`.
pub fn site_key(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    let start = labels.len().saturating_sub(2);
    Some(labels[start..].join("."))
}

pub fn by_key(key: &str) -> Option<&'static (dyn Adapter + Sync)> {
    SITES
        .iter()
        .find(|(site, _)| site.eq_ignore_ascii_case(key))
        .map(|(_, adapter)| *adapter)
}

pub fn resolve(url: &Url) -> Option<&'static (dyn Adapter + Sync)> {
    by_key(&site_key(url)?)
}

pub fn supported_sites() -> Vec<&'static str> {
    SITES.iter().map(|(site, _)| *site).collect()
}

pub fn strip_chapter_number(title: &str) -> String {
    CHAPTER_NUMBER.replace(title.trim(), "").into_owned()
}

/// Copy of `url` with `key` set to `value`, replacing any existing value.
pub fn with_query(url: &Url, key: &str, value: &str) -> Url {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let mut out = url.clone();
    {
        let mut query = out.query_pairs_mut();
        query.clear();
        query.extend_pairs(&pairs);
        query.append_pair(key, value);
    }
    out
}

pub fn path_segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|segments| {
            segments
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

pub fn with_path_segments(url: &Url, segments: &[String]) -> Url {
    let mut out = url.clone();
    out.set_path(&format!("/{}", segments.join("/")));
    out
}

/// Makes sure the path ends in `chapters/<id>`, using `placeholder` when no
/// chapter is named.
pub fn ensure_chapter_path(url: &Url, placeholder: &str) -> Url {
    let mut segments = path_segments(url);
    if !segments.iter().any(|s| s == "chapters") {
        segments.push("chapters".to_owned());
    }
    if segments.last().is_some_and(|s| s == "chapters") {
        segments.push(placeholder.to_owned());
    }
    with_path_segments(url, &segments)
}

/// Page that is one `<a>` link away from `page`, resolved against its URL.
pub fn join_link(page: &Url, element: ElementRef<'_>) -> anyhow::Result<Url> {
    let href = dom::attr(element, "href")?;
    page.join(href)
        .with_context(|| format!("resolve link {href:?} against {page}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).expect("url")
    }

    #[test]
    fn resolves_by_last_two_host_labels() {
        let adapter = resolve(&url("https://www.fanfiction.net/s/1/1/")).expect("ffn");
        assert_eq!(adapter.name(), "FanFiction.Net");
        let adapter = resolve(&url("https://m.fictionpress.com/s/1/1/")).expect("fp");
        assert_eq!(adapter.name(), "FanFiction.Net");
        let adapter = resolve(&url("https://archiveofourown.org/works/1")).expect("ao3");
        assert_eq!(adapter.name(), "Archive of Our Own");
        let adapter = resolve(&url("https://hp.adult-fanfiction.org/story.php?no=1")).expect("aff");
        assert!(adapter.is_adult());
    }

    #[test]
    fn unknown_hosts_do_not_resolve() {
        assert!(resolve(&url("https://example.com/story")).is_none());
        assert!(resolve(&url("file:///tmp/story.html")).is_none());
    }

    #[test]
    fn chapter_numbers_are_stripped() {
        assert_eq!(strip_chapter_number("12. The End"), "The End");
        assert_eq!(strip_chapter_number("1984"), "1984");
    }

    #[test]
    fn query_values_are_replaced() {
        let out = with_query(&url("https://x.org/story.php?no=5&chapter=1"), "chapter", "3");
        assert_eq!(out.as_str(), "https://x.org/story.php?no=5&chapter=3");
    }

    #[test]
    fn chapter_path_is_completed() {
        assert_eq!(
            ensure_chapter_path(&url("https://x.org/works/9"), "1").path(),
            "/works/9/chapters/1"
        );
        assert_eq!(
            ensure_chapter_path(&url("https://x.org/works/9/chapters/"), "1").path(),
            "/works/9/chapters/1"
        );
        assert_eq!(
            ensure_chapter_path(&url("https://x.org/works/9/chapters/77"), "1").path(),
            "/works/9/chapters/77"
        );
    }
}

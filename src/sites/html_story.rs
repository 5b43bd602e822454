use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use url::Url;

use super::{Adapter, StoryPage};
use crate::dom;
use crate::http::{Fetch, Response};
use crate::metadata::{Author, ChapterEntry, StoryDetails};
use crate::xhtml;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static PARAGRAPH_EDGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*(</?p>)\s*").expect("valid paragraph regex"));
static BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<br\s*/?>").expect("valid br regex"));
static EMPTY_PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<p>\s*</p>").expect("valid empty paragraph regex"));

/// A story assembled from loose pages, one chapter per URL, with the author
/// and title given on the command line.
pub struct HtmlStory {
    pub author: String,
    pub title: String,
    pub chapters: Vec<String>,
}

impl Adapter for HtmlStory {
    fn name(&self) -> &'static str {
        "HTML pages"
    }

    /// Nothing to fetch: there is no main page.
    fn open(&self, _fetch: &dyn Fetch, url: Url) -> anyhow::Result<StoryPage> {
        Ok(StoryPage {
            url,
            document: Html::new_document(),
        })
    }

    fn source_url(&self, _page: &StoryPage) -> Option<Url> {
        None
    }

    fn make_title_page(
        &self,
        _page: &StoryPage,
        _fetch: &dyn Fetch,
    ) -> anyhow::Result<StoryDetails> {
        Ok(StoryDetails {
            title: self.title.clone(),
            author: Author {
                name: self.author.clone(),
                url: None,
            },
            language: "English".to_owned(),
            ..StoryDetails::default()
        })
    }

    fn get_chapters(
        &self,
        _page: &StoryPage,
        _details: &StoryDetails,
    ) -> anyhow::Result<Vec<ChapterEntry>> {
        Ok(self
            .chapters
            .iter()
            .map(|chapter| ChapterEntry::Identified {
                id: chapter.clone(),
                title: title_from_url(chapter),
            })
            .collect())
    }

    fn make_new_chapter_url(&self, _base: &Url, value: &str) -> Option<Url> {
        Url::parse(value).ok()
    }

    fn get_raw_text(&self, response: &Response) -> anyhow::Result<Vec<String>> {
        let document = response.document();
        let body = dom::require(document.root_element(), "body")?;
        let html = WHITESPACE.replace_all(&xhtml::inner_html(body), " ").into_owned();
        let html = PARAGRAPH_EDGE.replace_all(&html, "$1").into_owned();
        let html = BREAK.replace_all(&html, "</p><p>").into_owned();
        let html = EMPTY_PARAGRAPH.replace_all(&html, "").into_owned();

        let cleaned = Html::parse_fragment(&html);
        Ok(dom::select_all(cleaned.root_element(), "p")?
            .into_iter()
            .filter(|p| !dom::text(*p).is_empty() || p.children().any(|c| c.value().is_element()))
            .map(xhtml::outer_html)
            .collect())
    }
}

/// `https://host/stories/the_end.html` gives `The_end`.
fn title_from_url(chapter: &str) -> String {
    let file = Url::parse(chapter)
        .ok()
        .and_then(|url| {
            url.path_segments()?
                .rfind(|s| !s.is_empty())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| chapter.to_owned());
    let stem = file.split('.').next().unwrap_or(&file);
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

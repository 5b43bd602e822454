use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};
use url::Url;

use super::{Adapter, StoryPage, join_link, with_query};
use crate::dom;
use crate::error::FatalError;
use crate::fields;
use crate::http::{Fetch, Response};
use crate::metadata::{self, Author, ChapterEntry, StoryDetails};
use crate::xhtml;

/// Listing pages searched for a story before giving up.
pub const LISTING_PAGE_LIMIT: u32 = 20;

const DATE_FORMATS: &[&str] = &["%B %d, %Y %I:%M %p", "%B %d, %Y"];

static BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<br\s*/?>").expect("valid br regex"));

pub struct AdultFanFiction;

impl Adapter for AdultFanFiction {
    fn name(&self) -> &'static str {
        "Adult-FanFiction.org"
    }

    fn is_adult(&self) -> bool {
        true
    }

    /// Dates are not on the story page; they come from the story's row in the
    /// author's paginated listing.
    fn make_title_page(&self, page: &StoryPage, fetch: &dyn Fetch) -> anyhow::Result<StoryDetails> {
        let table = dom::require(page.root(), "table")?;
        let cells = dom::select_all(table, "td")?;
        let [title_cell, author_cell, ..] = cells.as_slice() else {
            anyhow::bail!("story header has fewer than two cells");
        };
        let title = dom::text(*title_cell);
        let author_link = dom::require(*author_cell, "a")?;
        let author_url = join_link(&page.url, author_link)?;

        let row = find_listing_row(fetch, &author_url, &title)?;
        let info = fields::turn_into_dictionary(&row);
        let date = |key: &str| {
            info.text(key)
                .map(|value| metadata::parse_date(value, DATE_FORMATS))
                .transpose()
        };

        Ok(StoryDetails {
            published: date("Published")?,
            updated: date("Updated")?,
            words: info.int("Words").unwrap_or(0),
            category: category(*author_cell),
            title,
            author: Author {
                name: dom::text(author_link),
                url: Some(author_url),
            },
            language: "English".to_owned(),
            ..StoryDetails::default()
        })
    }

    fn chapter_select(&self) -> Option<&'static str> {
        Some(".dropdown-content > li > a")
    }

    // "Chapter 3 - The Title"
    fn chapter_parser(&self, entry: ElementRef<'_>) -> anyhow::Result<ChapterEntry> {
        let text = dom::text(entry);
        let title = text.rsplit('-').next().unwrap_or(&text).trim().to_owned();
        Ok(ChapterEntry::Title(title))
    }

    fn make_new_chapter_url(&self, base: &Url, value: &str) -> Option<Url> {
        Some(with_query(base, "chapter", value))
    }

    fn get_raw_text(&self, response: &Response) -> anyhow::Result<Vec<String>> {
        let document = Html::parse_document(&response.body.replace("<p></p>", "</p><p>"));
        let contents = dom::require(
            document.root_element(),
            "div#contentdata > ul > li:nth-of-type(7)",
        )?;
        let paragraphs = dom::select_all(contents, "p")?;
        if !paragraphs.is_empty() {
            return Ok(paragraphs.into_iter().map(xhtml::outer_html).collect());
        }
        let html = xhtml::inner_html(contents).replace("td>", "p>");
        let html = BREAK.replace_all(&html, "</p><p>").replace("<p></p>", "");
        Ok(vec![html])
    }
}

/// Text after the first line break of the author cell, minus its label.
fn category(author_cell: ElementRef<'_>) -> Option<String> {
    let html = xhtml::inner_html(author_cell);
    let after = Html::parse_fragment(BREAK.splitn(&html, 2).nth(1)?);
    let text = dom::text(after.root_element());
    let text = text.strip_prefix("Category:").unwrap_or(&text).trim();
    (!text.is_empty()).then(|| text.to_owned())
}

/// Pages through the author's listing until a text node equal to `title`
/// turns up, and returns the cell texts of the table section holding it.
fn find_listing_row(fetch: &dyn Fetch, author_url: &Url, title: &str) -> anyhow::Result<Vec<String>> {
    for page in 1..=LISTING_PAGE_LIMIT {
        let url = with_query(author_url, "page", &page.to_string());
        let response = fetch.get(&url)?;
        if !response.is_success() {
            tracing::debug!(%url, status = response.status, "listing page unavailable");
            continue;
        }
        let document = response.document();
        let section = document
            .root_element()
            .descendants()
            .filter(|node| node.value().as_text().is_some_and(|text| text.trim() == title))
            .find_map(|node| {
                node.ancestors()
                    .filter_map(ElementRef::wrap)
                    .find(|element| element.value().name() == "tbody")
            });
        if let Some(section) = section {
            return Ok(dom::select_all(section, "td")?
                .into_iter()
                .map(dom::text)
                .collect());
        }
    }
    Err(FatalError::ListingPagesExhausted {
        title: title.to_owned(),
        pages: LISTING_PAGE_LIMIT,
    }
    .into())
}

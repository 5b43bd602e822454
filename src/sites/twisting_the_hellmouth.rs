use scraper::ElementRef;
use url::Url;

use super::archive_of_our_own::{
    DATE_FORMATS, WorkMeta, chapters_complete, parse_chapter_option, replace_last_segment,
};
use super::{Adapter, StoryPage, ensure_chapter_path, join_link};
use crate::dom;
use crate::http::{Fetch, Response};
use crate::metadata::{self, Author, ChapterEntry, StoryDetails};
use crate::xhtml;

// Any chapter id brings up the story page.
const PLACEHOLDER_CHAPTER: &str = "123456";

pub struct TwistingTheHellmouth;

impl Adapter for TwistingTheHellmouth {
    fn name(&self) -> &'static str {
        "Twisting the Hellmouth"
    }

    fn open(&self, fetch: &dyn Fetch, url: Url) -> anyhow::Result<StoryPage> {
        StoryPage::fetch(fetch, ensure_chapter_path(&url, PLACEHOLDER_CHAPTER))
    }

    // Every entry is required here; a page without them is not a story page.
    fn make_title_page(
        &self,
        page: &StoryPage,
        _fetch: &dyn Fetch,
    ) -> anyhow::Result<StoryDetails> {
        let meta = WorkMeta::find(page.root())?;
        let title = dom::text(dom::require(page.root(), "h2.title.heading")?);
        let author_link = dom::require(page.root(), "a[rel=author]")?;
        let words = meta.require("words")?;

        Ok(StoryDetails {
            title,
            author: Author {
                name: dom::text(author_link),
                url: Some(join_link(&page.url, author_link)?),
            },
            complete: chapters_complete(&meta.require("chapters")?),
            published: Some(metadata::parse_date(
                &meta.require("published")?,
                DATE_FORMATS,
            )?),
            updated: Some(metadata::parse_date(&meta.require("status")?, DATE_FORMATS)?),
            language: meta.require("language")?,
            category: Some(meta.strings("fandom").join(", ")),
            characters: meta.characters(),
            words: words
                .replace(',', "")
                .parse()
                .map_err(|err| anyhow::anyhow!("word count {words:?}: {err}"))?,
            rating: Some(meta.require("rating")?),
            tags: meta.strings("freeform"),
            ..StoryDetails::default()
        })
    }

    fn chapter_select(&self) -> Option<&'static str> {
        Some("select#selected_id option")
    }

    fn chapter_parser(&self, entry: ElementRef<'_>) -> anyhow::Result<ChapterEntry> {
        parse_chapter_option(entry)
    }

    fn make_new_chapter_url(&self, base: &Url, value: &str) -> Option<Url> {
        replace_last_segment(base, value)
    }

    /// The chapter is the first non-empty paragraph, with `<br>` pairs as breaks.
    fn get_raw_text(&self, response: &Response) -> anyhow::Result<Vec<String>> {
        let document = response.document();
        let body = dom::require(document.root_element(), "div.userstuff.module")?;
        let paragraph = dom::select_all(body, "p")?
            .into_iter()
            .find(|p| p.children().next().is_some())
            .ok_or_else(|| anyhow::anyhow!("chapter body has no text"))?;
        Ok(xhtml::child_fragments(paragraph))
    }
}

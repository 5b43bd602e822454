use scraper::ElementRef;
use url::Url;

use super::{
    Adapter, StoryPage, ensure_chapter_path, join_link, path_segments, strip_chapter_number,
    with_path_segments, with_query,
};
use crate::dom;
use crate::fields::Characters;
use crate::http::{Fetch, Response};
use crate::metadata::{self, Author, ChapterEntry, StoryDetails, Timestamp};
use crate::xhtml;

pub(super) const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d %b %Y", "%d %B %Y"];

pub struct ArchiveOfOurOwn;

impl Adapter for ArchiveOfOurOwn {
    fn name(&self) -> &'static str {
        "Archive of Our Own"
    }

    fn open(&self, fetch: &dyn Fetch, url: Url) -> anyhow::Result<StoryPage> {
        let url = ensure_chapter_path(&with_query(&url, "view_adult", "true"), "1");
        StoryPage::fetch(fetch, url)
    }

    fn make_title_page(
        &self,
        page: &StoryPage,
        _fetch: &dyn Fetch,
    ) -> anyhow::Result<StoryDetails> {
        let meta = WorkMeta::find(page.root())?;
        let title = dom::text(dom::require(page.root(), "h2.title.heading")?);
        let author_link = dom::require(page.root(), "a[rel=author]")?;

        Ok(StoryDetails {
            title,
            author: Author {
                name: dom::text(author_link),
                url: Some(join_link(&page.url, author_link)?),
            },
            complete: meta.single("chapters").is_some_and(|c| chapters_complete(&c)),
            published: meta.date("published")?,
            updated: meta.date("status")?,
            language: meta
                .single("language")
                .unwrap_or_else(|| "English".to_owned()),
            category: Some(meta.strings("fandom").join(", ")).filter(|c| !c.is_empty()),
            characters: meta.characters(),
            words: meta
                .single("words")
                .and_then(|w| w.replace(',', "").parse().ok())
                .unwrap_or(0),
            rating: meta.single("rating"),
            tags: meta.strings("freeform"),
            summary: dom::find(page.root(), "div.summary blockquote.userstuff")?
                .map(dom::text)
                .filter(|s| !s.is_empty()),
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

    fn get_raw_text(&self, response: &Response) -> anyhow::Result<Vec<String>> {
        let document = response.document();
        let body = dom::require(document.root_element(), "div.userstuff")?;
        Ok(dom::select_all(body, "p, h1, h2, h3, h4, h5, h6, hr")?
            .into_iter()
            .filter(|tag| dom::text(*tag) != "Chapter Text" && !dom::has_class(*tag, "title"))
            .map(xhtml::outer_html)
            .collect())
    }
}

/// `<option value="123">4. Title</option>` as used by the archive-style chapter menus.
pub(super) fn parse_chapter_option(entry: ElementRef<'_>) -> anyhow::Result<ChapterEntry> {
    Ok(ChapterEntry::Identified {
        id: dom::attr(entry, "value")?.trim().to_owned(),
        title: strip_chapter_number(&dom::text(entry)),
    })
}

pub(super) fn replace_last_segment(base: &Url, value: &str) -> Option<Url> {
    let mut segments = path_segments(base);
    *segments.last_mut()? = value.to_owned();
    Some(with_path_segments(base, &segments))
}

/// `"3/3"` is complete, `"3/?"` or `"2/5"` are not.
pub(super) fn chapters_complete(chapters: &str) -> bool {
    match chapters.split_once('/') {
        Some((done, total)) => {
            let total = total.trim();
            !total.is_empty() && total.chars().all(|c| c.is_ascii_digit()) && done.trim() == total
        }
        None => false,
    }
}

/// The `<dl class="work meta group">` block of archive-style work pages.
pub(super) struct WorkMeta<'a> {
    list: ElementRef<'a>,
}

impl<'a> WorkMeta<'a> {
    pub(super) fn find(root: ElementRef<'a>) -> anyhow::Result<Self> {
        Ok(Self {
            list: dom::require(root, "dl.work.meta.group")?,
        })
    }

    /// Entries of one `dd` class; a class the work does not use is empty.
    pub(super) fn strings(&self, class: &str) -> Vec<String> {
        match dom::find(self.list, &format!("dd.{class}")) {
            Ok(Some(dd)) => dom::stripped_strings(dd),
            _ => Vec::new(),
        }
    }

    pub(super) fn single(&self, class: &str) -> Option<String> {
        self.strings(class).into_iter().next()
    }

    pub(super) fn require(&self, class: &str) -> anyhow::Result<String> {
        self.single(class)
            .ok_or_else(|| anyhow::anyhow!("work metadata has no {class:?} entry"))
    }

    pub(super) fn date(&self, class: &str) -> anyhow::Result<Option<Timestamp>> {
        self.single(class)
            .map(|value| metadata::parse_date(&value, DATE_FORMATS))
            .transpose()
    }

    /// Relationship tags `A/B` become couples; characters in no couple stay single.
    pub(super) fn characters(&self) -> Characters {
        let characters = self.strings("character");
        if characters.is_empty() {
            return Characters::default();
        }
        let couples: Vec<Vec<String>> = self
            .strings("relationship")
            .iter()
            .map(|pair| pair.split('/').map(|name| name.trim().to_owned()).collect())
            .collect();
        let singles = characters
            .into_iter()
            .filter(|name| !couples.iter().flatten().any(|paired| paired == name))
            .collect();
        Characters { singles, couples }
    }
}

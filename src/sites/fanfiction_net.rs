use url::Url;

use super::{Adapter, StoryPage, join_link, path_segments, with_path_segments};
use crate::dom;
use crate::fields::{self, FieldValue};
use crate::http::{Fetch, Response};
use crate::metadata::{self, Author, ChapterEntry, StoryDetails};
use crate::xhtml;

/// fanfiction.net and its sister site fictionpress.com.
pub struct FanFictionNet;

impl Adapter for FanFictionNet {
    fn name(&self) -> &'static str {
        "FanFiction.Net"
    }

    fn make_title_page(
        &self,
        page: &StoryPage,
        _fetch: &dyn Fetch,
    ) -> anyhow::Result<StoryDetails> {
        let header = dom::require(page.root(), "#profile_top")?;

        let title = dom::text(dom::require(header, "b")?);
        let author_link = dom::require(header, "a[href^='/u/']")?;
        let author = Author {
            name: dom::text(author_link),
            url: Some(join_link(&page.url, author_link)?),
        };
        let summary = dom::find(header, "div.xcontrast_txt")?
            .map(dom::text)
            .filter(|s| !s.is_empty());
        let category = dom::find(page.root(), "#pre_story_links a")?.map(dom::text);

        let tag_line = xhtml::inner_html(dom::require(header, ".xgray")?);
        let tokens: Vec<&str> = tag_line.split(" - ").collect();
        let mut info = fields::turn_into_dictionary(&tokens);

        let rating = info
            .remove("Rated")
            .map(|value| dom::collapse_whitespace(&strip_tags(&value.to_string())));
        let language = info
            .remove("Language")
            .map(|value| value.to_string())
            .unwrap_or_else(|| "English".to_owned());
        let genres = match info.remove("Genres") {
            Some(FieldValue::List(genres)) => genres,
            _ => Vec::new(),
        };
        let characters = match info.remove("Characters") {
            Some(FieldValue::Characters(characters)) => characters,
            _ => Default::default(),
        };
        let words = info.int("Words").unwrap_or(0);
        let complete = info.text("Status") == Some(fields::STATUS_COMPLETE);
        let published = info
            .text("Published")
            .and_then(fields::extract_xutime)
            .and_then(metadata::from_unix);
        let updated = info
            .text("Updated")
            .and_then(fields::extract_xutime)
            .and_then(metadata::from_unix);

        Ok(StoryDetails {
            title,
            author,
            complete,
            published,
            updated,
            language,
            category,
            genres,
            characters,
            words,
            rating,
            summary,
            ..StoryDetails::default()
        })
    }

    // The chapter list is repeated at the bottom of the page; only the first one counts.
    fn get_chapters(
        &self,
        page: &StoryPage,
        details: &StoryDetails,
    ) -> anyhow::Result<Vec<ChapterEntry>> {
        let Some(select) = dom::find(page.root(), "select#chap_select")? else {
            return Ok(vec![ChapterEntry::Title(details.title.clone())]);
        };
        dom::select_all(select, "option")?
            .into_iter()
            .map(|option| self.chapter_parser(option))
            .collect()
    }

    // /s/<id>/<chapter>/<slug>
    fn make_new_chapter_url(&self, base: &Url, value: &str) -> Option<Url> {
        let mut segments = path_segments(base);
        if segments.len() < 2 || segments[0] != "s" {
            return None;
        }
        if segments.len() == 2 {
            segments.push(value.to_owned());
        } else {
            segments[2] = value.to_owned();
        }
        Some(with_path_segments(base, &segments))
    }

    fn get_raw_text(&self, response: &Response) -> anyhow::Result<Vec<String>> {
        let document = response.document();
        let story = dom::require(document.root_element(), "div#storytext")?;
        Ok(xhtml::child_fragments(story))
    }
}

fn strip_tags(html: &str) -> String {
    let fragment = scraper::Html::parse_fragment(html);
    fragment.root_element().text().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::stub::StubFetch;

    const STORY_URL: &str = "https://www.fanfiction.net/s/42/1/The-Long-Road";

    fn story_page(chapters: usize) -> String {
        let options: String = (1..=chapters)
            .map(|n| format!("<option value=\"{n}\">{n}. Part {n}</option>"))
            .collect();
        format!(
            r#"<html><body>
<div id="pre_story_links"><span class="lc-left"><a class="xcontrast_txt" href="/book/">Books</a> <a class="xcontrast_txt" href="/book/Harry-Potter/">Harry Potter</a></span></div>
<div id="profile_top">
<b class="xcontrast_txt">The Long Road</b>
<span class="xcontrast_txt">By:</span> <a class="xcontrast_txt" href="/u/12345/Some-Author">Some Author</a>
<div style="margin-top:2px" class="xcontrast_txt">A story about a long road.</div>
<span class="xgray xcontrast_txt">Rated: <a class="xcontrast_txt" href="https://www.fictionratings.com/" target="rating">Fiction  T</a> - English - Romance/Hurt/Comfort - Harry P., [Hermione G., Ron W.] - Chapters: {chapters} - Words: 4,213 - Reviews: <a href="/r/42/">10</a> - Favs: 5 - Updated: <span data-xutime="1553112000">Mar 20, 2019</span> - Published: <span data-xutime="1550000000">Feb 12, 2019</span> - Status: Complete - id: 42</span>
</div>
<select id="chap_select" title="Chapter Navigation">{options}</select>
<div id="storytext" class="storytext"><p>It was a long road.</p><p>The end .</p></div>
<select id="chap_select" title="Chapter Navigation">{options}</select>
</body></html>"#
        )
    }

    fn open(body: String) -> StoryPage {
        let fetch = StubFetch::default().page(STORY_URL, body);
        FanFictionNet
            .open(&fetch, Url::parse(STORY_URL).expect("url"))
            .expect("open")
    }

    #[test]
    fn title_page_reads_header_and_tag_line() {
        let page = open(story_page(3));
        let details = FanFictionNet
            .make_title_page(&page, &StubFetch::default())
            .expect("details");

        assert_eq!(details.title, "The Long Road");
        assert_eq!(details.author.name, "Some Author");
        assert_eq!(
            details.author.url.as_ref().map(Url::as_str),
            Some("https://www.fanfiction.net/u/12345/Some-Author")
        );
        assert_eq!(details.summary.as_deref(), Some("A story about a long road."));
        assert_eq!(details.category.as_deref(), Some("Books"));
        assert_eq!(details.rating.as_deref(), Some("Fiction T"));
        assert_eq!(details.language, "English");
        assert_eq!(details.genres, vec!["Romance", "Hurt/Comfort"]);
        assert_eq!(details.characters.singles, vec!["Harry P."]);
        assert_eq!(
            details.characters.couples,
            vec![vec!["Hermione G.", "Ron W."]]
        );
        assert_eq!(details.words, 4213);
        assert!(details.complete);
        assert_eq!(
            details.published.map(|d| d.timestamp()),
            Some(1_550_000_000)
        );
        assert_eq!(details.updated.map(|d| d.timestamp()), Some(1_553_112_000));
    }

    #[test]
    fn title_page_is_idempotent() {
        let page = open(story_page(3));
        let fetch = StubFetch::default();
        let first = FanFictionNet.make_title_page(&page, &fetch).expect("first");
        let second = FanFictionNet.make_title_page(&page, &fetch).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn chapters_come_from_the_first_select_only() {
        let page = open(story_page(3));
        let details = StoryDetails::default();
        let chapters = FanFictionNet.get_chapters(&page, &details).expect("chapters");
        assert_eq!(
            chapters,
            vec![
                ChapterEntry::Title("Part 1".to_owned()),
                ChapterEntry::Title("Part 2".to_owned()),
                ChapterEntry::Title("Part 3".to_owned()),
            ]
        );
    }

    #[test]
    fn oneshot_uses_story_title() {
        let page = open(story_page(0).replace("chap_select", "nothing"));
        let details = StoryDetails {
            title: "The Long Road".to_owned(),
            ..StoryDetails::default()
        };
        let chapters = FanFictionNet.get_chapters(&page, &details).expect("chapters");
        assert_eq!(chapters, vec![ChapterEntry::Title("The Long Road".to_owned())]);
    }

    #[test]
    fn chapter_urls_replace_the_chapter_segment() {
        let base = Url::parse(STORY_URL).expect("url");
        let url = FanFictionNet.make_new_chapter_url(&base, "7").expect("url");
        assert_eq!(url.as_str(), "https://www.fanfiction.net/s/42/7/The-Long-Road");

        let short = Url::parse("https://www.fanfiction.net/s/42").expect("url");
        let url = FanFictionNet.make_new_chapter_url(&short, "2").expect("url");
        assert_eq!(url.as_str(), "https://www.fanfiction.net/s/42/2");
    }

    #[test]
    fn raw_text_is_storytext_children() {
        let response = Response {
            url: Url::parse(STORY_URL).expect("url"),
            status: 200,
            body: story_page(1),
        };
        let raw = FanFictionNet.get_raw_text(&response).expect("raw");
        assert_eq!(raw, vec!["<p>It was a long road.</p>", "<p>The end .</p>"]);
    }

    #[test]
    fn missing_main_page_is_fatal() {
        let fetch = StubFetch::default().status(STORY_URL, 404);
        let err = FanFictionNet
            .open(&fetch, Url::parse(STORY_URL).expect("url"))
            .err()
            .expect("error");
        assert!(matches!(
            err.downcast_ref::<crate::error::FatalError>(),
            Some(crate::error::FatalError::MainPage { status: 404, .. })
        ));
    }
}

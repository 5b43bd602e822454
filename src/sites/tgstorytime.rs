use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html};
use url::Url;

use super::archive_of_our_own::parse_chapter_option;
use super::{Adapter, StoryPage, join_link, with_query};
use crate::dom;
use crate::fields::{self, FieldValue, Fields};
use crate::http::{Fetch, Response};
use crate::metadata::{self, Author, ChapterEntry, Extra, StoryDetails};
use crate::xhtml;

const DATE_FORMATS: &[&str] = &["%m/%d/%y"];

static LABEL_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s?</span>").expect("valid label regex"));

pub struct TgStorytime;

impl Adapter for TgStorytime {
    fn name(&self) -> &'static str {
        "TG Storytime"
    }

    /// Stories behind the age warning are fetched again with consent given.
    fn open(&self, fetch: &dyn Fetch, url: Url) -> anyhow::Result<StoryPage> {
        let page = StoryPage::fetch(fetch, url)?;
        if dom::find(page.root(), ".bigblock .errormsg")?.is_none() {
            return Ok(page);
        }
        tracing::debug!(url = %page.url, "age warning; retrying with consent");
        StoryPage::fetch(fetch, with_query(&page.url, "ageconsent", "ok"))
    }

    fn make_title_page(
        &self,
        page: &StoryPage,
        _fetch: &dyn Fetch,
    ) -> anyhow::Result<StoryDetails> {
        let header = dom::require(page.root(), ".boxtop")?;
        let title = dom::text(dom::require(header, "#pagetitle > a:first-of-type")?);
        let author_link = dom::require(header, "#pagetitle > a:last-of-type")?;
        let summary = dom::find(header, ".summarytext")?
            .map(|summary| dom::stripped_strings(summary).join("\n"))
            .filter(|s| !s.is_empty());

        let mut content = labelled_content(dom::require(header, ".content")?);
        content.remove("Read");
        content.remove("Chapters");

        let complete = content
            .remove("Completed")
            .is_some_and(|value| matches!(value.to_string().as_str(), "Completed Story" | "Yes"));
        let updated = content
            .remove("Updated")
            .map(|value| metadata::parse_date(&value.to_string(), DATE_FORMATS))
            .transpose()?;
        let published = content
            .remove("Published")
            .ok_or_else(|| anyhow::anyhow!("story info has no \"Published\" entry"))?;
        let published = metadata::parse_date(&published.to_string(), DATE_FORMATS)?;
        let category = content
            .remove("Categories")
            .ok_or_else(|| anyhow::anyhow!("story info has no \"Categories\" entry"))?
            .to_string();
        let words = match content.remove("Word count") {
            Some(FieldValue::Int(words)) => words,
            Some(other) => anyhow::bail!("word count is not a number: {other}"),
            None => anyhow::bail!("story info has no \"Word count\" entry"),
        };

        Ok(StoryDetails {
            title,
            author: Author {
                name: dom::text(author_link),
                url: Some(join_link(&page.url, author_link)?),
            },
            complete,
            published: Some(published),
            updated,
            category: Some(category),
            words,
            summary,
            extras: content
                .into_iter()
                .map(|(name, value)| Extra { name, value })
                .collect(),
            ..StoryDetails::default()
        })
    }

    fn chapter_select(&self) -> Option<&'static str> {
        Some("select.textbox[name=chapter] option")
    }

    fn chapter_parser(&self, entry: ElementRef<'_>) -> anyhow::Result<ChapterEntry> {
        parse_chapter_option(entry)
    }

    fn make_new_chapter_url(&self, base: &Url, value: &str) -> Option<Url> {
        Some(with_query(base, "chapter", value))
    }

    fn get_raw_text(&self, response: &Response) -> anyhow::Result<Vec<String>> {
        let document = response.document();
        let story = dom::require(document.root_element(), "#story span")?;
        Ok(xhtml::child_fragments(story))
    }
}

/// Splits the info block, a run of `<span class="label">Name:</span> value`
/// pairs, into fields. Linked values are joined with commas.
fn labelled_content(content: ElementRef<'_>) -> Fields {
    let joined = xhtml::child_fragments(content)
        .into_iter()
        .map(|fragment| fragment.trim().to_owned())
        .filter(|fragment| !fragment.is_empty() && !fragment.starts_with("<br"))
        .collect::<Vec<_>>()
        .join(" ");
    let joined = LABEL_END.replace_all(&joined, "");

    let mut out = Fields::default();
    for entry in joined.split("<span class=\"label\">") {
        let Some((name, value)) = entry.trim().split_once(':') else {
            continue;
        };
        let value = Html::parse_fragment(value);
        let value = dom::stripped_strings(value.root_element())
            .into_iter()
            .filter(|s| s != ",")
            .collect::<Vec<_>>()
            .join(", ");
        out.insert(name.trim(), fields::coerce(&value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::stub::StubFetch;

    const STORY_URL: &str = "https://tgstorytime.com/viewstory.php?sid=42";

    const WARNING_PAGE: &str =
        r#"<html><body><div class="bigblock"><div class="errormsg">Age consent required</div></div></body></html>"#;

    const STORY_PAGE: &str = r#"<html><body>
<div class="boxtop">
  <div id="pagetitle"><a href="viewstory.php?sid=42">Changing Tides</a> by <a href="viewuser.php?uid=7">Tide Writer</a></div>
  <div class="summarytext">A quiet story.<br/>With two lines.</div>
  <div class="content">
    <span class="label">Categories:</span> <a href="browse.php?type=categories&amp;id=1">Transformation</a>, <a href="browse.php?type=categories&amp;id=2">Magic</a><br/>
    <span class="label">Characters: </span> None<br/>
    <span class="label">Chapters: </span> 2 <br/>
    <span class="label">Completed:</span> Completed Story <br/>
    <span class="label">Word count:</span> 1,234 <br/>
    <span class="label">Read:</span> 5000 <br/>
    <span class="label">Published: </span>03/14/19 <br/>
    <span class="label">Updated:</span> 04/01/19
  </div>
</div>
<select class="textbox" name="chapter"><option value="1">1. Low Tide</option><option value="2">2. High Tide</option></select>
<div id="story"><span><p>Waves.</p><p>More waves.</p></span></div>
</body></html>"#;

    fn open() -> (StubFetch, StoryPage) {
        let fetch = StubFetch::default()
            .page(STORY_URL, WARNING_PAGE)
            .page(&format!("{STORY_URL}&ageconsent=ok"), STORY_PAGE);
        let page = TgStorytime
            .open(&fetch, Url::parse(STORY_URL).expect("url"))
            .expect("open");
        (fetch, page)
    }

    #[test]
    fn age_warning_is_accepted() {
        let (fetch, page) = open();
        assert_eq!(fetch.requested().len(), 2);
        assert!(page.url.as_str().ends_with("ageconsent=ok"));
    }

    #[test]
    fn title_page_reads_labelled_info() {
        let (fetch, page) = open();
        let details = TgStorytime.make_title_page(&page, &fetch).expect("details");

        assert_eq!(details.title, "Changing Tides");
        assert_eq!(details.author.name, "Tide Writer");
        assert_eq!(
            details.author.url.as_ref().map(Url::as_str),
            Some("https://tgstorytime.com/viewuser.php?uid=7")
        );
        assert_eq!(details.summary.as_deref(), Some("A quiet story.\nWith two lines."));
        assert_eq!(details.category.as_deref(), Some("Transformation, Magic"));
        assert_eq!(details.words, 1234);
        assert!(details.complete);
        assert_eq!(
            details.published.map(|d| d.to_rfc3339()).as_deref(),
            Some("2019-03-14T00:00:00+00:00")
        );
        assert_eq!(
            details.extras,
            vec![Extra {
                name: "Characters".to_owned(),
                value: FieldValue::Text("None".to_owned()),
            }]
        );
    }

    #[test]
    fn chapters_and_urls() {
        let (_, page) = open();
        let chapters = TgStorytime
            .get_chapters(&page, &StoryDetails::default())
            .expect("chapters");
        assert_eq!(chapters[1].title(), "High Tide");
        let url = TgStorytime
            .make_new_chapter_url(&page.url, &chapters[1].url_value(2))
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://tgstorytime.com/viewstory.php?sid=42&ageconsent=ok&chapter=2"
        );
    }

    #[test]
    fn raw_text_is_story_span_children() {
        let response = Response {
            url: Url::parse(STORY_URL).expect("url"),
            status: 200,
            body: STORY_PAGE.to_owned(),
        };
        let raw = TgStorytime.get_raw_text(&response).expect("raw");
        assert_eq!(raw, vec!["<p>Waves.</p>", "<p>More waves.</p>"]);
    }
}

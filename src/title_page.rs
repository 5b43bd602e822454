use chrono::SecondsFormat;

use crate::metadata::{Metadata, Timestamp};
use crate::xhtml::xml_escape;

/// Element id of the source URL entry; updates read the story URL back from it.
pub const STORY_URL_ID: &str = "story-url";

/// One labelled line of the title page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datum {
    pub name: String,
    pub id: String,
    pub value: String,
    pub link: bool,
}

impl Datum {
    fn text(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_owned(),
            id: slug(name),
            value: value.into(),
            link: false,
        }
    }

    fn link(name: &str, id: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_owned(),
            id: id.to_owned(),
            value: value.into(),
            link: true,
        }
    }

    fn render(&self) -> String {
        let value = if self.link {
            format!(
                "<a href=\"{0}\">{0}</a>",
                xml_escape(&self.value)
            )
        } else {
            xml_escape(&self.value)
        };
        format!(
            "  <div id=\"{}\"><strong>{}:</strong> {value}</div>\n",
            xml_escape(&self.id),
            xml_escape(&self.name)
        )
    }
}

fn slug(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

fn timestamp(value: &Timestamp) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Every populated field of `metadata`, in display order.
pub fn data(metadata: &Metadata) -> Vec<Datum> {
    let details = &metadata.details;
    let mut out = vec![
        Datum::text("Story", details.title.as_str()),
        Datum::text("Author", details.author.name.as_str()),
    ];
    if let Some(url) = &metadata.url {
        out.push(Datum::link("URL", STORY_URL_ID, url.as_str()));
    }
    if let Some(url) = &details.author.url {
        out.push(Datum::link("Author URL", "author-url", url.as_str()));
    }
    out.push(Datum::text("Language", details.language.as_str()));
    if let Some(rating) = &details.rating {
        out.push(Datum::text("Rating", rating.as_str()));
    }
    if let Some(category) = &details.category {
        out.push(Datum::text("Category", category.as_str()));
    }
    out.push(Datum::text("Genres", details.genres.join("/")));
    out.push(Datum::text("Characters", details.characters.to_string()));
    if let Some(published) = &details.published {
        out.push(Datum::text("Published", timestamp(published)));
    }
    if let Some(updated) = &details.updated {
        out.push(Datum::text("Updated", timestamp(updated)));
    }
    out.push(Datum::text("Downloaded", timestamp(&metadata.downloaded)));
    if details.words > 0 {
        out.push(Datum::text("Words", details.words.to_string()));
    }
    out.push(Datum::text("Tags", details.tags.join(", ")));
    out.push(Datum::text("Chapters", metadata.chapter_status()));
    for extra in &details.extras {
        out.push(Datum::text(&extra.name, extra.value.to_string()));
    }

    out.retain(|datum| !datum.value.trim().is_empty());
    out
}

/// Body markup of the title page.
pub fn render(metadata: &Metadata) -> String {
    let details = &metadata.details;
    let mut out = String::new();
    out.push_str("<div class=\"header\">\n");
    out.push_str(&format!(
        "  <h1>{}</h1>\n  <h2>by {}</h2>\n",
        xml_escape(&details.title),
        xml_escape(&details.author.name)
    ));
    out.push_str("</div>\n");
    out.push_str("<div class=\"titlepage\">\n");
    for datum in data(metadata) {
        out.push_str(&datum.render());
    }
    if let Some(summary) = &details.summary {
        out.push_str("  <div id=\"summary\"><strong>Summary:</strong>\n");
        for line in summary.lines().filter(|line| !line.trim().is_empty()) {
            out.push_str(&format!("    <p>{}</p>\n", xml_escape(line.trim())));
        }
        out.push_str("  </div>\n");
    }
    out.push_str("</div>");
    out
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::fields::FieldValue;
    use crate::metadata::{Author, ChapterEntry, Extra, StoryDetails};

    fn sample() -> Metadata {
        Metadata::new(
            Url::parse("https://www.fanfiction.net/s/42/1/").ok(),
            StoryDetails {
                title: "Tom & Jerry".to_owned(),
                author: Author {
                    name: "Someone".to_owned(),
                    url: Url::parse("https://www.fanfiction.net/u/1/").ok(),
                },
                summary: Some("Line one\nLine two".to_owned()),
                extras: vec![Extra {
                    name: "Series".to_owned(),
                    value: FieldValue::Text("Cartoons".to_owned()),
                }],
                ..StoryDetails::default()
            },
            vec![ChapterEntry::Title("Only".to_owned())],
            crate::metadata::now(),
        )
    }

    #[test]
    fn urls_are_links_with_stable_ids() {
        let html = render(&sample());
        assert!(html.contains(
            "<div id=\"story-url\"><strong>URL:</strong> <a href=\"https://www.fanfiction.net/s/42/1/\">"
        ));
        assert!(html.contains("<div id=\"author-url\">"));
        assert!(html.contains("<h1>Tom &amp; Jerry</h1>"));
    }

    #[test]
    fn empty_fields_are_omitted() {
        let names: Vec<String> = data(&sample()).into_iter().map(|d| d.name).collect();
        assert!(!names.contains(&"Genres".to_owned()));
        assert!(!names.contains(&"Words".to_owned()));
        assert!(!names.contains(&"Rating".to_owned()));
        assert!(names.contains(&"Chapters".to_owned()));
        assert_eq!(names.last().map(String::as_str), Some("Series"));
    }

    #[test]
    fn summary_lines_become_paragraphs() {
        let html = render(&sample());
        assert!(html.contains("<p>Line one</p>"));
        assert!(html.contains("<p>Line two</p>"));
    }
}

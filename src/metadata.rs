use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone as _, Utc};
use regex::Regex;
use url::Url;

use crate::fields::{Characters, FieldValue};
use crate::language;

pub type Timestamp = DateTime<FixedOffset>;

static ILLEGAL_FILENAME_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?]"#).expect("valid filename regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub url: Option<Url>,
}

/// One entry of a story's chapter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterEntry {
    /// Addressed by its 1-based position.
    Title(String),
    /// Addressed by a site-specific identifier.
    Identified { id: String, title: String },
}

impl ChapterEntry {
    pub fn title(&self) -> &str {
        match self {
            Self::Title(title) | Self::Identified { title, .. } => title,
        }
    }

    /// Value handed to the adapter when building this chapter's URL.
    pub fn url_value(&self, index: usize) -> String {
        match self {
            Self::Title(_) => index.to_string(),
            Self::Identified { id, .. } => id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extra {
    pub name: String,
    pub value: FieldValue,
}

/// Everything an adapter learns from a story's main page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryDetails {
    pub title: String,
    pub author: Author,
    pub complete: bool,
    pub published: Option<Timestamp>,
    pub updated: Option<Timestamp>,
    pub language: String,
    pub category: Option<String>,
    pub genres: Vec<String>,
    pub characters: Characters,
    pub words: u64,
    pub rating: Option<String>,
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub extras: Vec<Extra>,
}

impl Default for StoryDetails {
    fn default() -> Self {
        Self {
            title: String::new(),
            author: Author::default(),
            complete: false,
            published: None,
            updated: None,
            language: "English".to_owned(),
            category: None,
            genres: Vec::new(),
            characters: Characters::default(),
            words: 0,
            rating: None,
            tags: Vec::new(),
            summary: None,
            extras: Vec::new(),
        }
    }
}

impl StoryDetails {
    /// Drops `updated` when it carries no information beyond `published`.
    pub fn finish(mut self) -> Self {
        if self.updated == self.published {
            self.updated = None;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Canonical story URL; `None` for stories assembled from loose pages.
    pub url: Option<Url>,
    pub details: StoryDetails,
    pub chapters: Vec<ChapterEntry>,
    pub downloaded: Timestamp,
}

impl Metadata {
    pub fn new(
        url: Option<Url>,
        details: StoryDetails,
        chapters: Vec<ChapterEntry>,
        downloaded: Timestamp,
    ) -> Self {
        Self {
            url,
            details: details.finish(),
            chapters,
            downloaded,
        }
    }

    /// `"N/N"` for complete stories, `"N/??"` otherwise.
    pub fn chapter_status(&self) -> String {
        let count = self.chapters.len();
        if self.details.complete {
            format!("{count}/{count}")
        } else {
            format!("{count}/??")
        }
    }

    pub fn lang_tag(&self) -> String {
        language::lang_tag(&self.details.language)
    }

    /// `"<author> - <title>.epub"`, prefixed with `[ADULT] ` for adult sites.
    ///
    /// Both names are sanitized, so the result is always a single path component.
    pub fn filename(&self, adult: bool) -> String {
        let name = format!(
            "{} - {}.epub",
            self.details.author.name, self.details.title
        );
        let name = ILLEGAL_FILENAME_CHARS.replace_all(&name, "_");
        if adult {
            format!("[ADULT] {name}")
        } else {
            name.into_owned()
        }
    }
}

pub fn now() -> Timestamp {
    chrono::Local::now().fixed_offset()
}

pub fn from_unix(seconds: i64) -> Option<Timestamp> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .map(|dt| dt.fixed_offset())
}

/// Date without a time of day, taken as midnight UTC.
pub fn from_date(date: NaiveDate) -> Timestamp {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
        .fixed_offset()
}

pub fn from_naive(datetime: NaiveDateTime) -> Timestamp {
    Utc.from_utc_datetime(&datetime).fixed_offset()
}

/// Parses a date in any of `formats`; date-only formats land at midnight UTC.
pub fn parse_date(value: &str, formats: &[&str]) -> anyhow::Result<Timestamp> {
    let value = value.trim();
    for format in formats {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(from_naive(datetime));
        }
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Ok(from_date(date));
        }
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Ok(datetime);
    }
    anyhow::bail!("unrecognised date {value:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(details: StoryDetails, chapters: usize) -> Metadata {
        Metadata::new(
            None,
            details,
            (1..=chapters)
                .map(|n| ChapterEntry::Title(format!("Chapter {n}")))
                .collect(),
            now(),
        )
    }

    #[test]
    fn filename_replaces_illegal_characters() {
        let details = StoryDetails {
            title: "What? A <Story>: Part 1/2".to_owned(),
            author: Author {
                name: "Some|Author".to_owned(),
                url: None,
            },
            ..StoryDetails::default()
        };
        let metadata = metadata(details, 1);
        assert_eq!(
            metadata.filename(false),
            "Some_Author - What_ A _Story__ Part 1_2.epub"
        );
        assert!(metadata.filename(true).starts_with("[ADULT] Some_Author"));
    }

    #[test]
    fn author_names_cannot_leave_the_directory() {
        let details = StoryDetails {
            title: "Songs".to_owned(),
            author: Author {
                name: "../AC/DC".to_owned(),
                url: None,
            },
            ..StoryDetails::default()
        };
        let name = metadata(details, 1).filename(false);
        assert_eq!(name, ".._AC_DC - Songs.epub");
        assert_eq!(std::path::Path::new(&name).components().count(), 1);
    }

    #[test]
    fn updated_equal_to_published_is_dropped() {
        let published = parse_date("2019-03-14", &["%Y-%m-%d"]).expect("date");
        let details = StoryDetails {
            published: Some(published),
            updated: Some(published),
            ..StoryDetails::default()
        };
        assert_eq!(metadata(details, 1).details.updated, None);
    }

    #[test]
    fn chapter_status_reflects_completion() {
        let mut details = StoryDetails::default();
        assert_eq!(metadata(details.clone(), 3).chapter_status(), "3/??");
        details.complete = true;
        assert_eq!(metadata(details, 3).chapter_status(), "3/3");
    }

    #[test]
    fn dates_parse_in_several_shapes() {
        let date = parse_date("03/14/19", &["%m/%d/%y"]).expect("us date");
        assert_eq!(date.to_rfc3339(), "2019-03-14T00:00:00+00:00");

        let date = parse_date("January 5, 2019", &["%B %d, %Y"]).expect("long date");
        assert_eq!(date.to_rfc3339(), "2019-01-05T00:00:00+00:00");

        let stamp = from_unix(1_550_000_000).expect("unix");
        assert_eq!(stamp.to_rfc3339(), "2019-02-12T19:33:20+00:00");

        assert!(parse_date("soon", &["%Y-%m-%d"]).is_err());
    }
}

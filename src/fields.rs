//! Classification of the loose `"Name: value"` tokens found in story headers.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::language;

/// Genre labels recognised inside a slash-separated genre token.
pub const GENRES: &[&str] = &[
    "Adventure",
    "Angst",
    "Crime",
    "Drama",
    "Family",
    "Fantasy",
    "Friendship",
    "General",
    "Horror",
    "Humor",
    "Hurt/Comfort",
    "Mystery",
    "Parody",
    "Poetry",
    "Romance",
    "Sci-Fi",
    "Spiritual",
    "Supernatural",
    "Suspense",
    "Tragedy",
    "Western",
];

/// Marker some sites use for "original character" in place of a character list.
pub const ORIGINAL_CHARACTER: &str = "OC";

pub const STATUS_COMPLETE: &str = "Complete";

static COUPLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\[\]]+)\]").expect("valid couple regex"));
static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}(,\d{3})*$|^\d+$").expect("valid number regex"));
static XUTIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"xutime=["']?(\d+)"#).expect("valid xutime regex"));

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Characters {
    pub singles: Vec<String>,
    pub couples: Vec<Vec<String>>,
}

impl Characters {
    /// Parses `"A, [B, C], D"`: bracketed groups are couples, everything else singles.
    pub fn parse(text: &str) -> Self {
        let couples = COUPLE
            .captures_iter(text)
            .map(|caps| split_names(&caps[1]))
            .filter(|couple| !couple.is_empty())
            .collect();
        let singles = split_names(&COUPLE.replace_all(text, ","));
        Self { singles, couples }
    }

    pub fn is_empty(&self) -> bool {
        self.singles.is_empty() && self.couples.is_empty()
    }

    pub fn extend(&mut self, other: Characters) {
        self.singles.extend(other.singles);
        self.couples.extend(other.couples);
    }
}

impl fmt::Display for Characters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let couples = self
            .couples
            .iter()
            .map(|couple| format!("[{}]", couple.join(", ")))
            .collect::<Vec<_>>()
            .join(" ");
        f.write_str(&couples)?;
        if !couples.is_empty() && !self.singles.is_empty() {
            f.write_str(" ")?;
        }
        f.write_str(&self.singles.join(", "))
    }
}

fn split_names(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Int(u64),
    Text(String),
    List(Vec<String>),
    Characters(Characters),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<u64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(text) => f.write_str(text),
            Self::List(items) => f.write_str(&items.join(", ")),
            Self::Characters(characters) => characters.fmt(f),
        }
    }
}

/// Insertion-ordered field map. Inserting an existing key replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    entries: Vec<(String, FieldValue)>,
}

impl Fields {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_text)
    }

    pub fn int(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(FieldValue::as_int)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: FieldValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(name, _)| *name == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<FieldValue> {
        let index = self.entries.iter().position(|(name, _)| name == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Fields {
    type Item = (String, FieldValue);
    type IntoIter = std::vec::IntoIter<(String, FieldValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Builds a field map out of header tokens.
///
/// Tokens of the form `Name: value` become `Name` with the value coerced to an
/// integer when it is a (comma-grouped) number. Bare tokens are classified as a
/// language, a genre list, the completion marker, or a character list.
pub fn turn_into_dictionary<S: AsRef<str>>(tokens: &[S]) -> Fields {
    let mut fields = Fields::default();
    for token in tokens {
        let token = token.as_ref().trim();
        if token.is_empty() {
            continue;
        }
        let (key, value) = classify(token);
        if let FieldValue::Characters(characters) = &value
            && let Some(FieldValue::Characters(existing)) = fields.remove(&key)
        {
            let mut merged = existing;
            merged.extend(characters.clone());
            fields.insert(key, FieldValue::Characters(merged));
            continue;
        }
        fields.insert(key, value);
    }
    fields
}

fn classify(token: &str) -> (String, FieldValue) {
    if let Some((key, value)) = token.split_once(':') {
        return (key.trim().to_owned(), coerce(value.trim()));
    }
    if language::is_language(token) {
        return ("Language".to_owned(), FieldValue::Text(token.to_owned()));
    }
    if token == STATUS_COMPLETE {
        return ("Status".to_owned(), FieldValue::Text(token.to_owned()));
    }
    if let Some(genres) = split_genres(token) {
        return ("Genres".to_owned(), FieldValue::List(genres));
    }
    let characters = if token == ORIGINAL_CHARACTER {
        Characters {
            singles: vec![ORIGINAL_CHARACTER.to_owned()],
            couples: Vec::new(),
        }
    } else {
        Characters::parse(token)
    };
    ("Characters".to_owned(), FieldValue::Characters(characters))
}

/// Integer when the text is a plain or comma-grouped number, text otherwise.
pub fn coerce(value: &str) -> FieldValue {
    if NUMBER.is_match(value)
        && let Ok(n) = value.replace(',', "").parse::<u64>()
    {
        return FieldValue::Int(n);
    }
    FieldValue::Text(value.to_owned())
}

/// Splits `Romance/Hurt/Comfort` into genres, keeping `Hurt/Comfort` whole.
/// Returns `None` unless every part is a known genre.
pub fn split_genres(token: &str) -> Option<Vec<String>> {
    let parts: Vec<&str> = token.split('/').map(str::trim).collect();
    let mut genres = Vec::new();
    let mut i = 0;
    while i < parts.len() {
        if parts[i] == "Hurt" && parts.get(i + 1) == Some(&"Comfort") {
            genres.push("Hurt/Comfort".to_owned());
            i += 2;
            continue;
        }
        if !GENRES.contains(&parts[i]) || parts[i] == "Hurt/Comfort" {
            return None;
        }
        genres.push(parts[i].to_owned());
        i += 1;
    }
    (!genres.is_empty()).then_some(genres)
}

/// Pulls the Unix timestamp out of markup like `<span data-xutime="1553112000">`.
pub fn extract_xutime(value: &str) -> Option<i64> {
    XUTIME.captures(value)?.get(1)?.as_str().parse().ok()
}

/// `["a", "b", "c"]` becomes `"a, b, and c"`.
pub fn list2text<S: AsRef<str>>(items: &[S]) -> String {
    match items {
        [] => String::new(),
        [only] => only.as_ref().to_owned(),
        [first, second] => format!("{} and {}", first.as_ref(), second.as_ref()),
        [rest @ .., last] => format!(
            "{}, and {}",
            rest.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(", "),
            last.as_ref()
        ),
    }
}

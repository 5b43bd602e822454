use std::fmt::Display;
use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

use crate::xhtml::{self, Edit};

struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

fn rule(pattern: &str, replacement: &'static str) -> Rule {
    Rule {
        pattern: Regex::new(pattern).expect("valid cleanup regex"),
        replacement,
    }
}

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid blank-run regex"));

// Applied in order to the joined, paragraph-wrapped markup.
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        // Text directly after a heading starts a paragraph.
        rule(r"(</h\d>)\s*([^<\s])", "$1<p>$2"),
        // Two or more line breaks end a paragraph.
        rule(r"\s*(<br\s*/?>\s*){2,}\s*", "</p><p>"),
        rule(r"<p>\s*</p>", ""),
        rule(r"</p>\s*</p>", "</p>"),
        rule(r"<p>\s*(<p[\s>])", "$1"),
        // FanFiction.Net scene break: the wrapped rule and its trailing break open a paragraph.
        rule(
            r"\s*(?:<p>\s*)?<div class=.hr.>\s*<hr\s*/?>\s*</div>\s*(?:<br\s*/?>\s*)?",
            "<hr />\n<p>",
        ),
        // One blank line between blocks.
        rule(r"(</p>|</h\d>)", "$1\n\n"),
        rule(r"(<p[\s>]|<h\d[\s>]|<hr)", "\n\n$1"),
        rule(r"\n(\s*\n)+", "\n\n"),
        rule(r"^\s+", ""),
        rule(r"\s+(</p>|</h\d>)", "$1"),
        // No space before punctuation.
        rule(r"\s+([,!?]|\.[^0-9])", "$1"),
        rule(r"\.{3,}", "&hellip;"),
        // Text trailing a scene break gets its own paragraph.
        rule(r"(<hr[^>]*>)\s*([^<\s][^\n]*)", "$1\n\n<p>$2</p>"),
    ]
});

/// Normalizes scraped chapter fragments into clean XHTML body markup.
///
/// Fragments are whitespace-collapsed and joined with single spaces, so
/// `clean_text(0..10)` yields `<p>0 1 2 3 4 5 6 7 8 9</p>`.
pub fn clean_text<I>(fragments: I) -> String
where
    I: IntoIterator,
    I::Item: Display,
{
    let joined = fragments
        .into_iter()
        .map(|fragment| {
            WHITESPACE
                .replace_all(&fragment.to_string(), " ")
                .trim()
                .to_owned()
        })
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let mut text = format!("<p>{joined}</p>");
    for rule in RULES.iter() {
        text = rule
            .pattern
            .replace_all(&text, rule.replacement)
            .into_owned();
    }

    let rendered = xhtml::rewrite_fragment(&text, &cosmetic);
    BLANK_RUNS
        .replace_all(&rendered, "\n\n")
        .trim()
        .to_owned()
}

fn cosmetic(element: ElementRef<'_>) -> Edit {
    match element.value().name() {
        "hr" => Edit::Class("center"),
        "p" => {
            let has_elements = element.children().any(|child| child.value().is_element());
            let text = element.text().collect::<String>();
            let text = text.trim();
            if text.is_empty() && !has_elements {
                Edit::Drop
            } else if !has_elements && is_scene_break(text) {
                Edit::Class("center")
            } else {
                Edit::Keep
            }
        }
        _ => Edit::Keep,
    }
}

/// A paragraph made of one repeated character, like `~~~~` or `***`.
fn is_scene_break(text: &str) -> bool {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    !first.is_whitespace() && text.chars().count() >= 2 && chars.all(|c| c == first)
}

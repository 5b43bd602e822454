//! Small helpers over `scraper` for the site adapters.
//!
//! Required lookups fail loudly with the selector in the message; optional
//! ones return `None` or an empty list.

use scraper::{ElementRef, Selector};

pub fn selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow::anyhow!("parse selector {css:?}: {err}"))
}

pub fn find<'a>(scope: ElementRef<'a>, css: &str) -> anyhow::Result<Option<ElementRef<'a>>> {
    Ok(scope.select(&selector(css)?).next())
}

pub fn require<'a>(scope: ElementRef<'a>, css: &str) -> anyhow::Result<ElementRef<'a>> {
    find(scope, css)?.ok_or_else(|| anyhow::anyhow!("page has no element matching {css:?}"))
}

pub fn select_all<'a>(scope: ElementRef<'a>, css: &str) -> anyhow::Result<Vec<ElementRef<'a>>> {
    Ok(scope.select(&selector(css)?).collect())
}

pub fn attr<'a>(element: ElementRef<'a>, name: &str) -> anyhow::Result<&'a str> {
    element.value().attr(name).ok_or_else(|| {
        anyhow::anyhow!(
            "<{}> element has no {name:?} attribute",
            element.value().name()
        )
    })
}

/// All text below `element`, whitespace collapsed and trimmed.
pub fn text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Non-empty trimmed text nodes below `element`, in document order.
pub fn stripped_strings(element: ElementRef<'_>) -> Vec<String> {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

pub fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

pub fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

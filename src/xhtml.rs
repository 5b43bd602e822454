//! Serializes parsed HTML back out as XHTML that an EPUB reader accepts.

use scraper::{ElementRef, Node};

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// What to do with an element while serializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    Keep,
    Drop,
    /// Keep, replacing any `class` attribute.
    Class(&'static str),
}

pub fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn escape_text(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub fn outer_html(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    write_element(&mut out, element, &|_| Edit::Keep);
    out
}

pub fn inner_html(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    write_children(&mut out, element, &|_| Edit::Keep);
    out
}

/// Each child node (text included) of `parent`, serialized on its own.
pub fn child_fragments(parent: ElementRef<'_>) -> Vec<String> {
    parent
        .children()
        .filter_map(|child| match child.value() {
            Node::Text(text) => Some(escape_text(text)),
            Node::Element(_) => ElementRef::wrap(child).map(outer_html),
            _ => None,
        })
        .collect()
}

pub fn write_children(
    out: &mut String,
    parent: ElementRef<'_>,
    edit: &dyn Fn(ElementRef<'_>) -> Edit,
) {
    for child in parent.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&escape_text(text)),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    write_element(out, element, edit);
                }
            }
            _ => {}
        }
    }
}

pub fn write_element(
    out: &mut String,
    element: ElementRef<'_>,
    edit: &dyn Fn(ElementRef<'_>) -> Edit,
) {
    let decision = edit(element);
    if decision == Edit::Drop {
        return;
    }

    let name = element.value().name();
    out.push('<');
    out.push_str(name);
    for (attr, value) in element.value().attrs() {
        if attr == "class" && matches!(decision, Edit::Class(_)) {
            continue;
        }
        out.push_str(&format!(" {attr}=\"{}\"", xml_escape(value)));
    }
    if let Edit::Class(class) = decision {
        out.push_str(&format!(" class=\"{class}\""));
    }

    if VOID_TAGS.contains(&name) {
        out.push_str(" />");
        return;
    }
    out.push('>');
    write_children(out, element, edit);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Parses an HTML fragment and writes its top-level nodes back out through `edit`.
pub fn rewrite_fragment(html: &str, edit: &dyn Fn(ElementRef<'_>) -> Edit) -> String {
    let fragment = scraper::Html::parse_fragment(html);
    let mut out = String::new();
    write_children(&mut out, fragment.root_element(), edit);
    out
}

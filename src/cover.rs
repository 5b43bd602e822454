use crate::xhtml::xml_escape;

const WIDTH: u32 = 600;
const HEIGHT: u32 = 800;
const LINE_CHARS: usize = 18;

const PALETTE: &[(&str, &str)] = &[
    ("#264653", "#e9c46a"),
    ("#3d405b", "#f2cc8f"),
    ("#5f0f40", "#fb8b24"),
    ("#003049", "#fcbf49"),
    ("#283618", "#fefae0"),
    ("#22223b", "#c9ada7"),
];

/// Cover image stored in the book, generated or carried over from an earlier copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cover {
    /// File name under `OEBPS/`.
    pub file_name: String,
    pub media_type: String,
    pub data: Vec<u8>,
}

impl Cover {
    pub fn generate(title: &str, author: &str) -> Self {
        Self {
            file_name: "cover.svg".to_owned(),
            media_type: "image/svg+xml".to_owned(),
            data: render_svg(title, author).into_bytes(),
        }
    }
}

fn render_svg(title: &str, author: &str) -> String {
    let seed = title.bytes().map(usize::from).sum::<usize>();
    let (background, ink) = PALETTE[seed % PALETTE.len()];

    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" version=\"1.1\" width=\"{WIDTH}\" height=\"{HEIGHT}\" viewBox=\"0 0 {WIDTH} {HEIGHT}\">\n"
    ));
    out.push_str(&format!(
        "  <rect width=\"{WIDTH}\" height=\"{HEIGHT}\" fill=\"{background}\" />\n"
    ));
    out.push_str(&format!(
        "  <rect x=\"30\" y=\"30\" width=\"{}\" height=\"{}\" fill=\"none\" stroke=\"{ink}\" stroke-width=\"4\" />\n",
        WIDTH - 60,
        HEIGHT - 60
    ));
    for (i, line) in wrap(title, LINE_CHARS).iter().enumerate() {
        out.push_str(&format!(
            "  <text x=\"{}\" y=\"{}\" fill=\"{ink}\" font-family=\"serif\" font-size=\"48\" text-anchor=\"middle\">{}</text>\n",
            WIDTH / 2,
            220 + 60 * i,
            xml_escape(line)
        ));
    }
    out.push_str(&format!(
        "  <text x=\"{}\" y=\"{}\" fill=\"{ink}\" font-family=\"serif\" font-size=\"32\" font-style=\"italic\" text-anchor=\"middle\">{}</text>\n",
        WIDTH / 2,
        HEIGHT - 120,
        xml_escape(author)
    ));
    out.push_str("</svg>\n");
    out
}

/// Greedy word wrap; words longer than `width` get a line of their own.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for word in text.split_whitespace() {
        match lines.last_mut() {
            Some(line) if line.chars().count() + 1 + word.chars().count() <= width => {
                line.push(' ');
                line.push_str(word);
            }
            _ => lines.push(word.to_owned()),
        }
    }
    lines
}

use std::fs::{self, File};
use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Context as _;
use chrono::Utc;
use regex::Regex;
use scraper::Html;
use url::Url;
use zip::write::SimpleFileOptions;

use crate::cover::Cover;
use crate::dom;
use crate::metadata::Metadata;
use crate::resources::Stylesheet;
use crate::title_page::{self, STORY_URL_ID};
use crate::walker::Chapter;
use crate::xhtml::xml_escape;

const BODY_OPEN: &str = "<body>\n";
const BODY_CLOSE: &str = "\n</body>";

static CHAPTER_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^OEBPS/chapter(\d+)\.xhtml$").expect("valid chapter entry regex")
});
static COVER_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<item id="cover-image" href="([^"]+)" media-type="([^"]+)""#)
        .expect("valid cover item regex")
});

/// Everything that goes into one packaged story.
#[derive(Debug)]
pub struct Book<'a> {
    pub metadata: &'a Metadata,
    pub chapters: &'a [Chapter],
    pub cover: &'a Cover,
    pub styles: &'a [Stylesheet],
}

/// Writes the book to `out_path`, replacing any existing file only once the
/// new one is complete.
pub fn write(book: &Book<'_>, out_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create epub parent dir: {}", parent.display()))?;
    }

    let partial = partial_path(out_path);
    let out_file = File::create(&partial)
        .with_context(|| format!("open epub output: {}", partial.display()))?;
    let written = write_archive(book, out_file).and_then(|()| {
        fs::rename(&partial, out_path)
            .with_context(|| format!("move epub into place: {}", out_path.display()))
    });
    if written.is_err() {
        let _ = fs::remove_file(&partial);
    }
    written
}

fn partial_path(out_path: &Path) -> PathBuf {
    let mut name = out_path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    out_path.with_file_name(name)
}

fn write_archive(book: &Book<'_>, out_file: File) -> anyhow::Result<()> {
    let metadata = book.metadata;
    let title = metadata.details.title.as_str();
    let lang = metadata.lang_tag();
    let uuid = uuid::Uuid::new_v4();
    let modified = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    let mut zip = zip::ZipWriter::new(out_file);

    // `mimetype` must come first, uncompressed.
    let stored = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);
    zip.start_file("mimetype", stored)
        .context("epub start_file mimetype")?;
    zip.write_all(b"application/epub+zip")
        .context("epub write mimetype")?;

    let deflated = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);
    let mut add = |name: &str, bytes: &[u8]| -> anyhow::Result<()> {
        zip.start_file(name, deflated)
            .with_context(|| format!("epub start_file {name}"))?;
        zip.write_all(bytes)
            .with_context(|| format!("epub write {name}"))?;
        Ok(())
    };

    add("META-INF/container.xml", CONTAINER_XML.as_bytes())?;
    add(
        "OEBPS/content.opf",
        render_content_opf(book, &lang, uuid, &modified).as_bytes(),
    )?;
    add(
        "OEBPS/nav.xhtml",
        render_nav_xhtml(title, &lang, book).as_bytes(),
    )?;
    add(
        "OEBPS/toc.ncx",
        render_toc_ncx(title, uuid, book.chapters).as_bytes(),
    )?;
    for style in book.styles {
        add(&format!("OEBPS/style/{}", style.name), style.content.as_bytes())?;
    }
    add(&format!("OEBPS/{}", book.cover.file_name), &book.cover.data)?;

    let cover_body = format!(
        "<div class=\"cover\"><img src=\"{}\" alt=\"Cover\" /></div>",
        xml_escape(&book.cover.file_name)
    );
    add(
        "OEBPS/cover.xhtml",
        wrap_xhtml_document("Cover", &lang, book.styles, &cover_body).as_bytes(),
    )?;
    add(
        "OEBPS/title.xhtml",
        wrap_xhtml_document(title, &lang, book.styles, &title_page::render(metadata)).as_bytes(),
    )?;
    for chapter in book.chapters {
        let xhtml = wrap_xhtml_document(&chapter.title, &lang, book.styles, &chapter.content);
        add(&format!("OEBPS/{}.xhtml", chapter.stem()), xhtml.as_bytes())?;
    }

    zip.finish().context("epub finish zip")?;
    Ok(())
}

const CONTAINER_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

fn render_nav_xhtml(title: &str, lang: &str, book: &Book<'_>) -> String {
    let mut body = String::new();
    body.push_str(&format!("  <h1>{}</h1>\n", xml_escape(title)));
    body.push_str("  <nav epub:type=\"toc\" id=\"toc\">\n");
    body.push_str("    <ol>\n");
    body.push_str("      <li><a href=\"title.xhtml\">Title Page</a></li>\n");
    for ch in book.chapters {
        body.push_str(&format!(
            "      <li><a href=\"{}.xhtml\">{}</a></li>\n",
            xml_escape(&ch.stem()),
            xml_escape(&ch.title)
        ));
    }
    body.push_str("    </ol>\n");
    body.push_str("  </nav>");

    wrap_xhtml_document(title, lang, book.styles, &body).replacen(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\"",
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\"",
        1,
    )
}

fn render_toc_ncx(title: &str, uuid: uuid::Uuid, chapters: &[Chapter]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(
        "<!DOCTYPE ncx PUBLIC \"-//NISO//DTD ncx 2005-1//EN\" \"http://www.daisy.org/z3986/2005/ncx-2005-1.dtd\">\n",
    );
    out.push_str("<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n");
    out.push_str("  <head>\n");
    out.push_str(&format!(
        "    <meta name=\"dtb:uid\" content=\"urn:uuid:{uuid}\" />\n"
    ));
    out.push_str("    <meta name=\"dtb:depth\" content=\"1\" />\n");
    out.push_str("    <meta name=\"dtb:totalPageCount\" content=\"0\" />\n");
    out.push_str("    <meta name=\"dtb:maxPageNumber\" content=\"0\" />\n");
    out.push_str("  </head>\n");
    out.push_str(&format!(
        "  <docTitle><text>{}</text></docTitle>\n",
        xml_escape(title)
    ));
    out.push_str("  <navMap>\n");
    for (idx, ch) in chapters.iter().enumerate() {
        let play = idx + 1;
        out.push_str(&format!(
            "    <navPoint id=\"navPoint-{play}\" playOrder=\"{play}\">\n"
        ));
        out.push_str(&format!(
            "      <navLabel><text>{}</text></navLabel>\n",
            xml_escape(&ch.title)
        ));
        out.push_str(&format!(
            "      <content src=\"{}.xhtml\" />\n",
            xml_escape(&ch.stem())
        ));
        out.push_str("    </navPoint>\n");
    }
    out.push_str("  </navMap>\n");
    out.push_str("</ncx>\n");
    out
}

fn render_content_opf(book: &Book<'_>, lang: &str, uuid: uuid::Uuid, modified: &str) -> String {
    let details = &book.metadata.details;
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(&format!(
        "<package xmlns=\"http://www.idpf.org/2007/opf\" unique-identifier=\"bookid\" version=\"3.0\" xml:lang=\"{}\">\n",
        xml_escape(lang)
    ));
    out.push_str("  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n");
    out.push_str(&format!(
        "    <dc:identifier id=\"bookid\">urn:uuid:{uuid}</dc:identifier>\n"
    ));
    out.push_str(&format!(
        "    <dc:title>{}</dc:title>\n",
        xml_escape(&details.title)
    ));
    out.push_str(&format!(
        "    <dc:language>{}</dc:language>\n",
        xml_escape(lang)
    ));
    out.push_str(&format!(
        "    <dc:creator>{}</dc:creator>\n",
        xml_escape(&details.author.name)
    ));
    if let Some(url) = &book.metadata.url {
        out.push_str(&format!(
            "    <dc:source>{}</dc:source>\n",
            xml_escape(url.as_str())
        ));
    }
    if let Some(summary) = &details.summary {
        out.push_str(&format!(
            "    <dc:description>{}</dc:description>\n",
            xml_escape(summary)
        ));
    }
    out.push_str(&format!(
        "    <meta property=\"dcterms:modified\">{}</meta>\n",
        xml_escape(modified)
    ));
    out.push_str("    <meta name=\"cover\" content=\"cover-image\" />\n");
    out.push_str("  </metadata>\n");

    out.push_str("  <manifest>\n");
    out.push_str(
        "    <item id=\"nav\" href=\"nav.xhtml\" media-type=\"application/xhtml+xml\" properties=\"nav\" />\n",
    );
    out.push_str(
        "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\" />\n",
    );
    for (idx, style) in book.styles.iter().enumerate() {
        out.push_str(&format!(
            "    <item id=\"style-{}\" href=\"style/{}\" media-type=\"text/css\" />\n",
            idx + 1,
            xml_escape(&style.name)
        ));
    }
    out.push_str(&format!(
        "    <item id=\"cover-image\" href=\"{}\" media-type=\"{}\" properties=\"cover-image\" />\n",
        xml_escape(&book.cover.file_name),
        xml_escape(&book.cover.media_type)
    ));
    out.push_str(
        "    <item id=\"cover\" href=\"cover.xhtml\" media-type=\"application/xhtml+xml\" />\n",
    );
    out.push_str(
        "    <item id=\"title\" href=\"title.xhtml\" media-type=\"application/xhtml+xml\" />\n",
    );
    for ch in book.chapters {
        out.push_str(&format!(
            "    <item id=\"{0}\" href=\"{0}.xhtml\" media-type=\"application/xhtml+xml\" />\n",
            xml_escape(&ch.stem())
        ));
    }
    out.push_str("  </manifest>\n");

    out.push_str("  <spine toc=\"ncx\">\n");
    out.push_str("    <itemref idref=\"cover\" />\n");
    out.push_str("    <itemref idref=\"title\" />\n");
    for ch in book.chapters {
        out.push_str(&format!(
            "    <itemref idref=\"{}\" />\n",
            xml_escape(&ch.stem())
        ));
    }
    out.push_str("    <itemref idref=\"nav\" />\n");
    out.push_str("  </spine>\n");
    out.push_str("</package>\n");
    out
}

/// The body is framed by exact `<body>\n` / `\n</body>` markers so it can be read
/// back byte for byte.
fn wrap_xhtml_document(title: &str, lang: &str, styles: &[Stylesheet], body: &str) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str("<!DOCTYPE html>\n");
    out.push_str(&format!(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" lang=\"{0}\" xml:lang=\"{0}\">\n",
        xml_escape(lang)
    ));
    out.push_str("<head>\n");
    out.push_str(&format!("  <title>{}</title>\n", xml_escape(title)));
    out.push_str("  <meta charset=\"utf-8\" />\n");
    for style in styles {
        out.push_str(&format!(
            "  <link rel=\"stylesheet\" type=\"text/css\" href=\"style/{}\" />\n",
            xml_escape(&style.name)
        ));
    }
    out.push_str("</head>\n");
    out.push_str(BODY_OPEN);
    out.push_str(body.trim());
    out.push_str(BODY_CLOSE);
    out.push_str("\n</html>\n");
    out
}

/// What an update needs back from a previously written book.
#[derive(Debug, Clone, Default)]
pub struct PackagedDocument {
    pub source_url: Option<Url>,
    pub cover: Option<Cover>,
    /// Chapter bodies ordered by chapter number.
    pub chapters: Vec<String>,
}

impl PackagedDocument {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("open epub: {}", path.display()))?;
        let mut archive =
            zip::ZipArchive::new(file).with_context(|| format!("read epub: {}", path.display()))?;

        let source_url = match read_entry(&mut archive, "OEBPS/title.xhtml")? {
            Some(bytes) => find_source_url(&String::from_utf8_lossy(&bytes)),
            None => None,
        };

        let cover = match read_entry(&mut archive, "OEBPS/content.opf")? {
            Some(opf) => {
                let opf = String::from_utf8_lossy(&opf).into_owned();
                match COVER_ITEM.captures(&opf) {
                    Some(caps) => {
                        let file_name = caps[1].to_owned();
                        read_entry(&mut archive, &format!("OEBPS/{file_name}"))?.map(|data| {
                            Cover {
                                file_name,
                                media_type: caps[2].to_owned(),
                                data,
                            }
                        })
                    }
                    None => None,
                }
            }
            None => None,
        };

        let mut numbered: Vec<(u64, String)> = archive
            .file_names()
            .filter_map(|name| {
                let number = CHAPTER_ENTRY.captures(name)?.get(1)?.as_str().parse().ok()?;
                Some((number, name.to_owned()))
            })
            .collect();
        numbered.sort_by_key(|(number, _)| *number);

        let mut chapters = Vec::with_capacity(numbered.len());
        for (_, name) in numbered {
            let bytes = read_entry(&mut archive, &name)?
                .with_context(|| format!("epub entry vanished: {name}"))?;
            chapters.push(extract_body(&String::from_utf8_lossy(&bytes)));
        }

        Ok(Self {
            source_url,
            cover,
            chapters,
        })
    }
}

fn read_entry(archive: &mut zip::ZipArchive<File>, name: &str) -> anyhow::Result<Option<Vec<u8>>> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("open epub entry: {name}")),
    };
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .with_context(|| format!("read epub entry: {name}"))?;
    Ok(Some(bytes))
}

/// The URL entry of the title page, or failing that its first link.
fn find_source_url(title_page: &str) -> Option<Url> {
    let document = Html::parse_document(title_page);
    let root = document.root_element();
    let link = dom::find(root, &format!("#{STORY_URL_ID} a[href]"))
        .ok()
        .flatten()
        .or_else(|| dom::find(root, "a[href]").ok().flatten())?;
    Url::parse(link.value().attr("href")?).ok()
}

fn extract_body(document: &str) -> String {
    let start = document.find(BODY_OPEN).map(|i| i + BODY_OPEN.len());
    let end = document.rfind(BODY_CLOSE);
    match (start, end) {
        (Some(start), Some(end)) if start <= end => document[start..end].to_owned(),
        _ => {
            let parsed = Html::parse_document(document);
            dom::find(parsed.root_element(), "body")
                .ok()
                .flatten()
                .map(crate::xhtml::inner_html)
                .unwrap_or_default()
                .trim()
                .to_owned()
        }
    }
}

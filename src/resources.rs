use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

const DEFAULT_STYLE: &str = r#"@charset "utf-8";

html { font-family: serif; }
body { margin: 0; padding: 0 1.2em; line-height: 1.5; }
h1 { text-align: center; margin: 1.5em 0 1em; }
p { text-indent: 1.5em; margin: 0 0 0.4em; }
.center { text-align: center; text-indent: 0; }
hr.center { width: 30%; margin: 1.5em auto; }
.header { text-align: center; margin-bottom: 2em; }
.header h2 { font-weight: normal; font-style: italic; }
.titlepage div { margin: 0.3em 0; }
.titlepage p { text-indent: 0; }
"#;

/// Files written into the data directory on first use. Existing copies are never
/// overwritten, so local edits survive.
const BUNDLED: &[(&str, &str)] = &[("styles/style.css", DEFAULT_STYLE)];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stylesheet {
    /// File name, e.g. `style.css`.
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct Resources {
    pub root: PathBuf,
    pub styles: Vec<Stylesheet>,
}

pub fn default_root() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir().context("no per-user data directory on this platform")?;
    Ok(base.join("storypack"))
}

/// Makes sure the bundled resources exist under `root` and loads every stylesheet.
pub fn ensure_data(root: &Path) -> anyhow::Result<Resources> {
    for (rel, contents) in BUNDLED {
        let path = root.join(rel);
        if path.exists() {
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create data dir: {}", parent.display()))?;
        }
        fs::write(&path, contents)
            .with_context(|| format!("write bundled resource: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "installed bundled resource");
    }

    let styles_dir = root.join("styles");
    let mut styles = Vec::new();
    for entry in fs::read_dir(&styles_dir)
        .with_context(|| format!("read styles dir: {}", styles_dir.display()))?
    {
        let entry = entry.with_context(|| format!("list styles dir: {}", styles_dir.display()))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("css") {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let content = fs::read_to_string(&path)
            .with_context(|| format!("read stylesheet: {}", path.display()))?;
        styles.push(Stylesheet { name, content });
    }
    styles.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Resources {
        root: root.to_path_buf(),
        styles,
    })
}

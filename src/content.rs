//! Path → file bytes resolution and extension-based classification.
use std::borrow::Cow;
use std::io;
use std::path::Path;

use serde::Serialize;

use crate::error::ViewerError;
use crate::extractor::ExtractedRepository;

// ── Classification ───────────────────────────────────────────────────

/// Extensions rendered with syntax highlighting.
const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "html", "css", "java", "cpp", "hpp", "c", "h", "go", "rs",
    "php", "rb", "kt", "swift", "cs",
];

/// Extensions rendered as plain or structured text.
const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "json", "xml", "yml", "yaml", "toml", "ini", "cfg", "csv", "rst", "sh", "sql",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Text,
    Code,
    Binary,
}

fn extension(path: &str) -> Option<String> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Classify `path` by its extension alone. Unknown extensions are binary.
#[must_use]
pub fn classify(path: &str) -> Category {
    match extension(path) {
        Some(ext) if CODE_EXTENSIONS.contains(&ext.as_str()) => Category::Code,
        Some(ext) if TEXT_EXTENSIONS.contains(&ext.as_str()) => Category::Text,
        _ => Category::Binary,
    }
}

/// How a presentation layer should show a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RenderHint {
    /// Syntax-highlighted, `language` is the lowercase extension.
    Code { language: String },
    Markdown,
    Json,
    Plain,
    /// Offer a download; never render inline.
    DownloadOnly,
    Empty,
}

// ── Content ──────────────────────────────────────────────────────────

/// Bytes of one file, copied out of the extracted tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub path: String,
    pub category: Category,
    bytes: Vec<u8>,
}

impl FileContent {
    #[must_use]
    pub fn new(path: &str, bytes: Vec<u8>) -> Self {
        Self {
            path: path.to_string(),
            category: classify(path),
            bytes,
        }
    }

    /// Raw, unmodified bytes. Use these for downloads.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// A zero-length file. This is a successful read, not an error.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Best-effort UTF-8 decoding; invalid sequences become U+FFFD.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Decoded text for the text and code render paths, `None` for binary.
    #[must_use]
    pub fn display_text(&self) -> Option<Cow<'_, str>> {
        match self.category {
            Category::Text | Category::Code => Some(self.text()),
            Category::Binary => None,
        }
    }

    #[must_use]
    pub fn render_hint(&self) -> RenderHint {
        if self.is_empty() {
            return RenderHint::Empty;
        }
        match self.category {
            Category::Binary => RenderHint::DownloadOnly,
            Category::Code => RenderHint::Code {
                language: extension(&self.path).unwrap_or_default(),
            },
            Category::Text => match extension(&self.path).as_deref() {
                Some("md") => RenderHint::Markdown,
                Some("json") => RenderHint::Json,
                _ => RenderHint::Plain,
            },
        }
    }
}

/// Read the file at `path` from `repo`.
///
/// Only paths listed as files in the repository index resolve; directories,
/// metadata and anything outside the tree are `NotFound`. Symlinks resolve to
/// their target path, as Git stores them.
pub fn read_file(repo: &ExtractedRepository, path: &str) -> Result<FileContent, ViewerError> {
    let path = path.trim_start_matches('/');
    let entry = repo
        .index()
        .get(path)
        .filter(|e| e.is_file())
        .ok_or_else(|| ViewerError::not_found(repo.cid(), path))?;

    let full = repo.tree().join(&entry.path);
    let metadata =
        std::fs::symlink_metadata(&full).map_err(|e| read_error(repo.cid(), path, &e))?;

    let bytes = if metadata.file_type().is_symlink() {
        std::fs::read_link(&full).map(|target| target.into_os_string().into_encoded_bytes())
    } else {
        std::fs::read(&full)
    }
    .map_err(|e| read_error(repo.cid(), path, &e))?;

    Ok(FileContent::new(&entry.path, bytes))
}

/// A vanished file is `NotFound`; anything else keeps its diagnostic.
fn read_error(cid: &str, path: &str, err: &io::Error) -> ViewerError {
    match err.kind() {
        io::ErrorKind::NotFound => ViewerError::not_found(cid, path),
        _ => ViewerError::read(cid, path, err.to_string()),
    }
}

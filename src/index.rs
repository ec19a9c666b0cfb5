//! In-memory file listing of an extracted repository.
//!
//! The index is built once per extraction by walking the unpacked tree and is
//! then queried many times. Containment is derived from `/`-separated path
//! prefixes; entries carry no parent or child links.
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;

use ignore::WalkBuilder;
use serde::Serialize;

/// Version-control metadata directory, skipped at every depth.
pub const METADATA_DIR: &str = ".git";

/// Ordering matters: directories sort before files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Last path component.
    pub name: String,
    /// Forward-slash path relative to the repository root.
    pub path: String,
    /// Zero for directories.
    pub size_bytes: u64,
    pub kind: EntryKind,
}

impl FileEntry {
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    fn is_top_level(&self) -> bool {
        !self.path.contains('/')
    }
}

/// Ordered, deduplicated listing of one extracted tree.
#[derive(Debug, Clone, Default)]
pub struct FileIndex {
    entries: Vec<FileEntry>,
    by_path: HashMap<String, usize>,
}

impl FileIndex {
    /// Walk `root` recursively and index every file and directory under it.
    pub fn build(root: &Path) -> io::Result<Self> {
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .filter_entry(|entry| entry.file_name() != METADATA_DIR)
            .build();

        let mut entries = Vec::new();
        for result in walker {
            let entry = result.map_err(io::Error::other)?;
            if entry.depth() == 0 {
                continue;
            }

            let rel = entry
                .path()
                .strip_prefix(root)
                .map_err(io::Error::other)?;
            let path = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let name = entry.file_name().to_string_lossy().to_string();

            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            let (kind, size_bytes) = if is_dir {
                (EntryKind::Directory, 0)
            } else {
                // Symlinks are recorded as files sized by their target path.
                let metadata = entry.metadata().map_err(io::Error::other)?;
                (EntryKind::File, metadata.len())
            };

            entries.push(FileEntry {
                name,
                path,
                size_bytes,
                kind,
            });
        }

        Ok(Self::from_entries(entries))
    }

    /// Index a prepared set of entries, sorting them into listing order.
    /// Later duplicates of an already seen path are dropped.
    #[must_use]
    pub fn from_entries(entries: Vec<FileEntry>) -> Self {
        let mut seen = HashSet::with_capacity(entries.len());
        let mut entries: Vec<FileEntry> = entries
            .into_iter()
            .filter(|e| seen.insert(e.path.clone()))
            .collect();

        entries.sort_by(|a, b| {
            a.kind
                .cmp(&b.kind)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.path.cmp(&b.path))
        });

        let by_path = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.path.clone(), i))
            .collect();

        Self { entries, by_path }
    }

    /// Every entry, in listing order.
    #[must_use]
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&FileEntry> {
        self.by_path.get(path).map(|&i| &self.entries[i])
    }

    /// Entries directly at the repository root.
    #[must_use]
    pub fn list_root(&self) -> Vec<FileEntry> {
        self.entries
            .iter()
            .filter(|e| e.is_top_level())
            .cloned()
            .collect()
    }

    /// Entries directly inside the directory named by `prefix`.
    ///
    /// `"src"` and `"src/"` are equivalent; an empty prefix is the root view.
    #[must_use]
    pub fn list_under_prefix(&self, prefix: &str) -> Vec<FileEntry> {
        let dir = prefix.trim_matches('/');
        if dir.is_empty() {
            return self.list_root();
        }

        let prefix = format!("{dir}/");
        self.entries
            .iter()
            .filter(|e| {
                e.path
                    .strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .cloned()
            .collect()
    }

    /// Every entry whose path starts with `prefix`, at any depth.
    #[must_use]
    pub fn descendants(&self, prefix: &str) -> Vec<FileEntry> {
        self.entries
            .iter()
            .filter(|e| e.path.starts_with(prefix))
            .cloned()
            .collect()
    }
}

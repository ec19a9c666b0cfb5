//! Bundle extraction into private, cache-owned storage.
//!
//! An [`ExtractedRepository`] exclusively owns one temporary directory
//! holding the raw bundle and its unpacked working tree. The directory is
//! deleted when the last handle to the repository is dropped, which happens
//! after cache eviction once no reader still holds it.
pub mod cache;
pub mod git;

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tracing::{debug, info};

use crate::BoxFuture;
use crate::content::{self, FileContent};
use crate::error::ViewerError;
use crate::identifier;
use crate::index::{FileEntry, FileIndex};

pub use cache::RepositoryCache;
pub use git::GitUnpacker;

const BUNDLE_FILE: &str = "source.bundle";
const TREE_DIR: &str = "tree";

// ── Unpacker seam ────────────────────────────────────────────────────

/// Materializes a bundle file into a working tree at `dest`.
///
/// `dest` does not exist yet; implementations create it. Errors carry the
/// underlying tool's diagnostic.
pub trait Unpacker: Send + Sync {
    fn unpack<'a>(&'a self, bundle: &'a Path, dest: &'a Path) -> BoxFuture<'a, anyhow::Result<()>>;
}

// ── Extracted repository ─────────────────────────────────────────────

pub struct ExtractedRepository {
    cid: String,
    storage: TempDir,
    tree: PathBuf,
    bundle_path: PathBuf,
    extracted_at: DateTime<Utc>,
    index: FileIndex,
}

impl ExtractedRepository {
    #[must_use]
    pub fn cid(&self) -> &str {
        &self.cid
    }

    /// Storage location owned by this extraction.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.storage.path()
    }

    /// Unpacked working tree.
    #[must_use]
    pub fn tree(&self) -> &Path {
        &self.tree
    }

    #[must_use]
    pub fn extracted_at(&self) -> DateTime<Utc> {
        self.extracted_at
    }

    #[must_use]
    pub fn index(&self) -> &FileIndex {
        &self.index
    }

    /// Every entry in listing order.
    #[must_use]
    pub fn list(&self) -> &[FileEntry] {
        self.index.entries()
    }

    #[must_use]
    pub fn list_under_prefix(&self, prefix: &str) -> Vec<FileEntry> {
        self.index.list_under_prefix(prefix)
    }

    pub fn read_file(&self, path: &str) -> Result<FileContent, ViewerError> {
        content::read_file(self, path)
    }

    /// Raw bundle bytes as fetched.
    pub fn bundle_bytes(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.bundle_path)
    }

    /// Repository backed by an empty scratch tree and a prebuilt index.
    #[cfg(test)]
    pub(crate) fn from_index(cid: &str, index: FileIndex) -> Result<Self, ViewerError> {
        let storage = tempfile::tempdir()
            .map_err(|e| ViewerError::extraction(cid, e.to_string(), false))?;
        let tree = storage.path().join(TREE_DIR);
        let bundle_path = storage.path().join(BUNDLE_FILE);
        Ok(Self {
            cid: cid.to_string(),
            storage,
            tree,
            bundle_path,
            extracted_at: Utc::now(),
            index,
        })
    }
}

impl std::fmt::Debug for ExtractedRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractedRepository")
            .field("cid", &self.cid)
            .field("root", &self.storage.path())
            .field("extracted_at", &self.extracted_at)
            .field("entries", &self.index.len())
            .finish()
    }
}

impl Drop for ExtractedRepository {
    fn drop(&mut self) {
        debug!(
            "reclaiming storage of {} at {}",
            self.cid,
            self.storage.path().display()
        );
    }
}

/// Give up a handle. If it was the last one, the storage is deleted on a
/// blocking thread before this returns.
pub async fn release(repo: Arc<ExtractedRepository>) {
    if let Some(repo) = Arc::into_inner(repo) {
        let _ = tokio::task::spawn_blocking(move || drop(repo)).await;
    }
}

// ── Extractor ────────────────────────────────────────────────────────

/// Unpacks bundles once per identifier and serves later requests from the
/// repository cache.
pub struct BundleExtractor {
    unpacker: Arc<dyn Unpacker>,
    cache: RepositoryCache,
    work_dir: PathBuf,
    timeout: Duration,
}

impl BundleExtractor {
    pub fn new(
        unpacker: Arc<dyn Unpacker>,
        cache: RepositoryCache,
        work_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            unpacker,
            cache,
            work_dir: work_dir.into(),
            timeout,
        }
    }

    /// Extract `bytes` as the bundle for `cid`, or return the live extraction
    /// if one exists. Concurrent calls for one identifier unpack once.
    pub async fn extract(
        &self,
        cid: &str,
        bytes: Vec<u8>,
    ) -> Result<Arc<ExtractedRepository>, ViewerError> {
        self.extract_with(cid, || async move { Ok(bytes) }).await
    }

    /// Like [`extract`](Self::extract), but the bundle bytes are only loaded
    /// when no cached or in-flight extraction exists.
    pub async fn extract_with<F, Fut>(
        &self,
        cid: &str,
        load: F,
    ) -> Result<Arc<ExtractedRepository>, ViewerError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, ViewerError>>,
    {
        let cid = identifier::validate(cid)?;
        self.cache
            .get_or_extract(cid, || async move {
                let bytes = load().await?;
                self.materialize(cid, bytes).await.map(Arc::new)
            })
            .await
    }

    /// Live extraction for `cid`, without extracting.
    pub async fn cached(&self, cid: &str) -> Option<Arc<ExtractedRepository>> {
        self.cache.get(cid.trim()).await
    }

    /// Drop the cached extraction of `cid`; the next request re-extracts.
    pub async fn evict(&self, cid: &str) -> bool {
        self.cache.evict(cid.trim()).await
    }

    /// Release every cached extraction.
    pub async fn shutdown(&self) -> usize {
        self.cache.clear().await
    }

    #[must_use]
    pub fn cache(&self) -> &RepositoryCache {
        &self.cache
    }

    async fn materialize(&self, cid: &str, bytes: Vec<u8>) -> Result<ExtractedRepository, ViewerError> {
        let started = Instant::now();
        info!(bytes = bytes.len(), "extracting {cid}");

        tokio::fs::create_dir_all(&self.work_dir).await.map_err(|e| {
            ViewerError::extraction(
                cid,
                format!("cannot create work dir {}: {e}", self.work_dir.display()),
                false,
            )
        })?;
        let storage = tempfile::Builder::new()
            .prefix("bundle-")
            .tempdir_in(&self.work_dir)
            .map_err(|e| ViewerError::extraction(cid, format!("cannot allocate storage: {e}"), true))?;

        let bundle_path = storage.path().join(BUNDLE_FILE);
        let tree = storage.path().join(TREE_DIR);
        tokio::fs::write(&bundle_path, &bytes)
            .await
            .map_err(|e| ViewerError::extraction(cid, format!("cannot write bundle: {e}"), true))?;
        drop(bytes);

        match tokio::time::timeout(self.timeout, self.unpacker.unpack(&bundle_path, &tree)).await {
            Err(_) => {
                return Err(ViewerError::extraction(
                    cid,
                    format!("unpack timed out after {}s", self.timeout.as_secs_f32()),
                    true,
                ));
            }
            Ok(Err(e)) => return Err(ViewerError::extraction(cid, format!("{e:#}"), false)),
            Ok(Ok(())) => {}
        }

        let walk_root = tree.clone();
        let index = tokio::task::spawn_blocking(move || FileIndex::build(&walk_root))
            .await
            .map_err(|e| ViewerError::extraction(cid, format!("indexing task failed: {e}"), true))?
            .map_err(|e| ViewerError::extraction(cid, format!("cannot index tree: {e}"), false))?;

        info!(
            entries = index.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "extracted {cid}"
        );

        Ok(ExtractedRepository {
            cid: cid.to_string(),
            storage,
            tree,
            bundle_path,
            extracted_at: Utc::now(),
            index,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────

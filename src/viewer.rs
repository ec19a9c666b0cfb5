//! Facade tying the store, extractor, index and content layers together.
//!
//! A repository is fetched and unpacked on first access to its identifier,
//! and every later listing or read is served from the cached extraction.
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::Config;
use crate::content::FileContent;
use crate::error::ViewerError;
use crate::extractor::{self, BundleExtractor, ExtractedRepository, GitUnpacker, RepositoryCache};
use crate::identifier;
use crate::index::FileEntry;
use crate::store::{BundleStore, PinnedRepository, ReqwestTransport};
use crate::view::ViewState;

pub struct Viewer {
    store: BundleStore,
    extractor: BundleExtractor,
}

impl Viewer {
    pub fn new(store: BundleStore, extractor: BundleExtractor) -> Self {
        Self { store, extractor }
    }

    /// Wire the gateway transport, git unpacker and cache from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(config.fetch_timeout())?);
        let store = BundleStore::new(
            transport,
            &config.gateway_url,
            &config.api_url,
            config.credentials(),
        );
        let extractor = BundleExtractor::new(
            Arc::new(GitUnpacker::new(config.git_binary.clone())),
            RepositoryCache::new(config.cache.capacity, config.cache_ttl()),
            config.work_dir(),
            config.extract_timeout(),
        );
        Ok(Self::new(store, extractor))
    }

    #[must_use]
    pub fn store(&self) -> &BundleStore {
        &self.store
    }

    #[must_use]
    pub fn extractor(&self) -> &BundleExtractor {
        &self.extractor
    }

    /// The extraction of `cid`, fetching and unpacking it if not cached.
    pub async fn open(&self, cid: &str) -> Result<Arc<ExtractedRepository>, ViewerError> {
        let cid = identifier::validate(cid)?;
        self.extractor
            .extract_with(cid, || self.store.fetch(cid))
            .await
    }

    /// Entries shown for `view`: the root listing or one directory's children.
    pub async fn list(&self, view: &ViewState) -> Result<Vec<FileEntry>, ViewerError> {
        let repo = self.open(&view.cid).await?;
        let entries = repo.list_under_prefix(&view.prefix);
        extractor::release(repo).await;
        Ok(entries)
    }

    /// Every entry whose path starts with `prefix`, at any depth.
    pub async fn descendants(&self, cid: &str, prefix: &str) -> Result<Vec<FileEntry>, ViewerError> {
        let repo = self.open(cid).await?;
        let entries = repo.index().descendants(prefix);
        extractor::release(repo).await;
        Ok(entries)
    }

    /// Bytes of the file at `path`, copied out of the extracted tree.
    pub async fn read_file(&self, cid: &str, path: &str) -> Result<FileContent, ViewerError> {
        let repo = self.open(cid).await?;
        let content = repo.read_file(path);
        extractor::release(repo).await;
        content
    }

    /// Raw bundle bytes for download. Works even if the bundle does not
    /// extract.
    pub async fn download_bundle(&self, cid: &str) -> Result<Vec<u8>, ViewerError> {
        let cid = identifier::validate(cid)?;
        if let Some(repo) = self.extractor.cached(cid).await {
            let bytes = repo.bundle_bytes();
            extractor::release(repo).await;
            match bytes {
                Ok(bytes) => {
                    debug!("serving bundle of {cid} from extraction storage");
                    return Ok(bytes);
                }
                Err(e) => warn!("cached bundle of {cid} unreadable, refetching: {e}"),
            }
        }
        self.store.fetch(cid).await
    }

    pub async fn list_pins(&self) -> Result<Vec<PinnedRepository>, ViewerError> {
        self.store.list_pins().await
    }

    /// Drop the cached extraction of `cid`.
    pub async fn evict(&self, cid: &str) -> bool {
        self.extractor.evict(cid).await
    }

    /// Release all extraction storage.
    pub async fn shutdown(&self) -> usize {
        self.extractor.shutdown().await
    }
}

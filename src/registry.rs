//! In-memory list of repositories the user has added.
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::ViewerError;
use crate::identifier;

/// A registered bundle: content identifier plus optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleHandle {
    pub cid: String,
    pub name: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl BundleHandle {
    /// Validate `cid` and build a handle. Blank names count as absent.
    pub fn new(cid: &str, name: Option<&str>) -> Result<Self, ViewerError> {
        let cid = identifier::validate(cid)?;
        Ok(Self {
            cid: cid.to_string(),
            name: name
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(str::to_string),
            added_at: Utc::now(),
        })
    }

    #[must_use]
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| identifier::default_display_name(&self.cid))
    }

    /// Name safe to use as a file or directory name.
    #[must_use]
    pub fn file_stem(&self) -> String {
        let stem: String = self
            .display_name()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '-' })
            .collect();
        let stem = stem.trim_matches(|c| c == '-' || c == '.').to_string();
        if stem.is_empty() { self.cid.clone() } else { stem }
    }

    /// How to obtain a local clone of this repository.
    #[must_use]
    pub fn clone_instructions(&self, gateway_url: &str) -> String {
        let cid = &self.cid;
        let name = self.file_stem();
        let url = format!("{}/ipfs/{cid}", gateway_url.trim_end_matches('/'));
        format!(
            "Using git-pinata:\n  git-pinata clone {cid} {name}\n\n\
             Manual:\n  curl -o {name}.bundle \"{url}\"\n  git clone {name}.bundle {name}\n\n\
             Using an IPFS client:\n  ipfs get {cid}\n\n\
             Gateway URL: {url}\n"
        )
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    handles: Vec<BundleHandle>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `cid`. Returns `Ok(false)` if it is already registered.
    pub fn add(&mut self, cid: &str, name: Option<&str>) -> Result<bool, ViewerError> {
        let handle = BundleHandle::new(cid, name)?;
        if self.get(&handle.cid).is_some() {
            return Ok(false);
        }
        self.handles.push(handle);
        Ok(true)
    }

    /// Remove `cid`, returning its handle if it was registered.
    pub fn remove(&mut self, cid: &str) -> Option<BundleHandle> {
        let pos = self.handles.iter().position(|h| h.cid == cid.trim())?;
        Some(self.handles.remove(pos))
    }

    #[must_use]
    pub fn get(&self, cid: &str) -> Option<&BundleHandle> {
        self.handles.iter().find(|h| h.cid == cid.trim())
    }

    /// Handles in insertion order.
    #[must_use]
    pub fn list(&self) -> &[BundleHandle] {
        &self.handles
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CID: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";
    const OTHER: &str = "QmT78zSuBmuS4z925WZfrqQ1qHaJ56DQaTfyMUF7F8ff5o";

    #[test]
    fn test_add_remove() {
        let mut registry = Registry::new();
        assert!(registry.add(CID, Some("demo")).unwrap());
        assert!(!registry.add(CID, None).unwrap(), "duplicates are rejected");
        assert!(registry.add(OTHER, Some("  ")).unwrap());
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.get(CID).unwrap().display_name(), "demo");
        assert_eq!(registry.get(OTHER).unwrap().display_name(), "Repo QmT78zSu...");

        assert_eq!(registry.remove(CID).unwrap().cid, CID);
        assert!(registry.remove(CID).is_none());
        assert_eq!(registry.list()[0].cid, OTHER);
    }

    #[test]
    fn test_invalid_cid_not_registered() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.add("Qm-too-short", None),
            Err(ViewerError::InvalidIdentifier(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_file_stem() {
        let handle = BundleHandle::new(CID, Some("my awesome/repo")).unwrap();
        assert_eq!(handle.file_stem(), "my-awesome-repo");

        let unnamed = BundleHandle::new(CID, None).unwrap();
        assert_eq!(unnamed.file_stem(), "Repo-QmYwAPJz");
    }

    #[test]
    fn test_clone_instructions() {
        let handle = BundleHandle::new(CID, Some("demo")).unwrap();
        let text = handle.clone_instructions("https://gateway.pinata.cloud/");
        assert!(text.contains(&format!("git-pinata clone {CID} demo")));
        assert!(text.contains(&format!(
            "curl -o demo.bundle \"https://gateway.pinata.cloud/ipfs/{CID}\""
        )));
        assert!(text.contains("git clone demo.bundle demo"));
        assert!(text.contains(&format!("ipfs get {CID}")));
    }
}

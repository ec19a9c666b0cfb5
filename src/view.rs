//! Per-session view state: which repository and which directory is shown.
//!
//! The state is an explicit value owned by each session and passed to the
//! viewer, so independent sessions never share ambient "current" fields.
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub label: String,
    /// Prefix to navigate to, always ending in `/`.
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub cid: String,
    /// Empty for the repository root, otherwise a directory path ending in `/`.
    pub prefix: String,
}

impl ViewState {
    /// View of the root of `cid`.
    #[must_use]
    pub fn root(cid: &str) -> Self {
        Self {
            cid: cid.trim().to_string(),
            prefix: String::new(),
        }
    }

    /// View of the directory `prefix` in `cid`. `"src"`, `"src/"` and
    /// `"/src/"` all name the same directory.
    #[must_use]
    pub fn at(cid: &str, prefix: &str) -> Self {
        Self {
            cid: cid.trim().to_string(),
            prefix: normalize_prefix(prefix),
        }
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.prefix.is_empty()
    }

    /// Descend into the directory whose full path is `dir_path`.
    #[must_use]
    pub fn enter(&self, dir_path: &str) -> Self {
        Self::at(&self.cid, dir_path)
    }

    /// Parent directory; the root stays at the root.
    #[must_use]
    pub fn go_up(&self) -> Self {
        let trimmed = self.prefix.trim_end_matches('/');
        let parent = trimmed.rsplit_once('/').map_or("", |(parent, _)| parent);
        Self::at(&self.cid, parent)
    }

    /// One crumb per directory level of the current prefix.
    #[must_use]
    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        let mut prefix = String::new();
        self.prefix
            .split('/')
            .filter(|part| !part.is_empty())
            .map(|part| {
                prefix.push_str(part);
                prefix.push('/');
                Breadcrumb {
                    label: part.to_string(),
                    prefix: prefix.clone(),
                }
            })
            .collect()
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let parts: Vec<&str> = prefix.split('/').filter(|p| !p.is_empty()).collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!("{}/", parts.join("/"))
    }
}

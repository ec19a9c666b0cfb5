//! Error taxonomy shared by the store, extractor and content layers.
use thiserror::Error;

/// Errors surfaced by repository viewing operations.
///
/// Every variant names the identifier it concerns so callers can render a
/// message without extra context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ViewerError {
    #[error("invalid content identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("fetch of {cid} failed: {message}")]
    Fetch {
        cid: String,
        message: String,
        retryable: bool,
    },

    #[error("extraction of {cid} failed: {message}")]
    Extraction {
        cid: String,
        message: String,
        retryable: bool,
    },

    #[error("{path} not found in {cid}")]
    NotFound { cid: String, path: String },

    #[error("reading {path} from {cid} failed: {message}")]
    Read {
        cid: String,
        path: String,
        message: String,
    },
}

impl ViewerError {
    pub(crate) fn fetch(cid: &str, message: impl Into<String>, retryable: bool) -> Self {
        Self::Fetch {
            cid: cid.to_string(),
            message: message.into(),
            retryable,
        }
    }

    pub(crate) fn extraction(cid: &str, message: impl Into<String>, retryable: bool) -> Self {
        Self::Extraction {
            cid: cid.to_string(),
            message: message.into(),
            retryable,
        }
    }

    pub(crate) fn not_found(cid: &str, path: &str) -> Self {
        Self::NotFound {
            cid: cid.to_string(),
            path: path.to_string(),
        }
    }

    pub(crate) fn read(cid: &str, path: &str, message: impl Into<String>) -> Self {
        Self::Read {
            cid: cid.to_string(),
            path: path.to_string(),
            message: message.into(),
        }
    }

    /// Whether retrying the same call may succeed (timeouts, transport hiccups).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Fetch { retryable, .. } | Self::Extraction { retryable, .. } => *retryable,
            Self::InvalidIdentifier(_) | Self::NotFound { .. } | Self::Read { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_identifier() {
        let err = ViewerError::fetch("QmAbc", "gateway returned 404 Not Found", false);
        assert_eq!(
            err.to_string(),
            "fetch of QmAbc failed: gateway returned 404 Not Found"
        );

        let err = ViewerError::not_found("QmAbc", "src/missing.rs");
        assert_eq!(err.to_string(), "src/missing.rs not found in QmAbc");
    }

    #[test]
    fn test_retryable() {
        assert!(ViewerError::fetch("c", "timed out", true).is_retryable());
        assert!(!ViewerError::extraction("c", "not a bundle", false).is_retryable());
        assert!(!ViewerError::InvalidIdentifier("x".into()).is_retryable());
        assert!(!ViewerError::not_found("c", "p").is_retryable());
    }
}

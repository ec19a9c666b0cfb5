//! Bundle retrieval from an IPFS pinning-service gateway.
//!
//! Requests are first sent with the pinning-service credential headers so
//! private pins resolve; a 401/403 answer triggers exactly one anonymous
//! retry for content that is publicly reachable. Any other non-success
//! status is terminal.
pub mod http;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::BoxFuture;
use crate::error::ViewerError;
use crate::identifier;

pub use http::ReqwestTransport;

const API_KEY_HEADER: &str = "pinata_api_key";
const SECRET_KEY_HEADER: &str = "pinata_secret_api_key";

// ── Transport seam ───────────────────────────────────────────────────

/// Status and body of a completed HTTP GET.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl GatewayResponse {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn is_auth_failure(&self) -> bool {
        matches!(self.status, 401 | 403)
    }
}

/// Errors raised before any HTTP status was received.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Request(String),
}

/// Minimal HTTP GET abstraction so the retry policy can be exercised
/// without a network.
pub trait Transport: Send + Sync {
    fn get<'a>(
        &'a self,
        url: &'a str,
        headers: &'a [(&'static str, String)],
    ) -> BoxFuture<'a, Result<GatewayResponse, TransportError>>;
}

// ── Store ────────────────────────────────────────────────────────────

/// Pinning-service API credentials.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub secret_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("secret_api_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            (API_KEY_HEADER, self.api_key.clone()),
            (SECRET_KEY_HEADER, self.secret_api_key.clone()),
        ]
    }
}

/// A repository pin reported by the pinning-service API.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PinnedRepository {
    pub cid: String,
    pub name: String,
    pub date_pinned: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct PinList {
    #[serde(default)]
    rows: Vec<PinRow>,
}

#[derive(Deserialize)]
struct PinRow {
    ipfs_pin_hash: String,
    #[serde(default)]
    date_pinned: Option<DateTime<Utc>>,
    #[serde(default)]
    metadata: PinMetadata,
}

#[derive(Deserialize, Default)]
struct PinMetadata {
    #[serde(default)]
    name: Option<String>,
}

/// Fetches raw bundle bytes by content identifier.
#[derive(Clone)]
pub struct BundleStore {
    transport: Arc<dyn Transport>,
    gateway_url: String,
    api_url: String,
    credentials: Option<Credentials>,
}

impl BundleStore {
    pub fn new(
        transport: Arc<dyn Transport>,
        gateway_url: &str,
        api_url: &str,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            transport,
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Gateway URL serving the object `cid`.
    #[must_use]
    pub fn object_url(&self, cid: &str) -> String {
        format!("{}/ipfs/{cid}", self.gateway_url)
    }

    /// Fetch the raw bytes of `cid`.
    pub async fn fetch(&self, cid: &str) -> Result<Vec<u8>, ViewerError> {
        let cid = identifier::validate(cid)?;
        let url = self.object_url(cid);
        info!("Fetching {cid} from gateway");

        let mut response = match &self.credentials {
            Some(creds) => self.send(cid, &url, &creds.headers()).await?,
            None => self.send(cid, &url, &[]).await?,
        };

        if self.credentials.is_some() && response.is_auth_failure() {
            debug!(
                status = response.status,
                "authenticated fetch of {cid} rejected, retrying anonymously"
            );
            response = self.send(cid, &url, &[]).await?;
        }

        if !response.is_success() {
            return Err(ViewerError::fetch(
                cid,
                format!("gateway returned status {}", response.status),
                response.status >= 500,
            ));
        }

        debug!(bytes = response.body.len(), "fetched {cid}");
        Ok(response.body)
    }

    /// List pins tagged with a `repo` metadata key.
    pub async fn list_pins(&self) -> Result<Vec<PinnedRepository>, ViewerError> {
        const LABEL: &str = "pin list";

        let Some(creds) = &self.credentials else {
            return Err(ViewerError::fetch(
                LABEL,
                "pinning-service credentials are not configured",
                false,
            ));
        };

        let url = format!(
            "{}/data/pinList?status=pinned&metadata[keyvalues][repo]={{\"value\":\"*\",\"op\":\"ne\"}}",
            self.api_url
        );
        let response = self.send(LABEL, &url, &creds.headers()).await?;
        if !response.is_success() {
            return Err(ViewerError::fetch(
                LABEL,
                format!("pinning API returned status {}", response.status),
                response.status >= 500,
            ));
        }

        parse_pin_list(&response.body)
            .map_err(|e| ViewerError::fetch(LABEL, format!("invalid pin list: {e}"), false))
    }

    async fn send(
        &self,
        cid: &str,
        url: &str,
        headers: &[(&'static str, String)],
    ) -> Result<GatewayResponse, ViewerError> {
        self.transport
            .get(url, headers)
            .await
            .map_err(|e| ViewerError::fetch(cid, e.to_string(), true))
    }
}

fn parse_pin_list(body: &[u8]) -> Result<Vec<PinnedRepository>, serde_json::Error> {
    let list: PinList = serde_json::from_slice(body)?;
    Ok(list
        .rows
        .into_iter()
        .map(|row| {
            let name = row
                .metadata
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| identifier::default_display_name(&row.ipfs_pin_hash));
            PinnedRepository {
                cid: row.ipfs_pin_hash,
                name,
                date_pinned: row.date_pinned,
            }
        })
        .collect())
}

// ── Tests ────────────────────────────────────────────────────────────

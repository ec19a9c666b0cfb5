//! `reqwest`-backed [`Transport`] used against real gateways.
use std::time::Duration;

use anyhow::{Context, Result};

use super::{GatewayResponse, Transport, TransportError};
use crate::BoxFuture;

const USER_AGENT: &str = concat!("ipfs-git-viewer/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("HTTP client build failed")?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn get<'a>(
        &'a self,
        url: &'a str,
        headers: &'a [(&'static str, String)],
    ) -> BoxFuture<'a, Result<GatewayResponse, TransportError>> {
        Box::pin(async move {
            let mut request = self.client.get(url);
            for (name, value) in headers {
                request = request.header(*name, value.as_str());
            }

            let resp = request.send().await.map_err(map_err)?;
            let status = resp.status().as_u16();
            let body = resp.bytes().await.map_err(map_err)?;

            Ok(GatewayResponse {
                status,
                body: body.to_vec(),
            })
        })
    }
}

fn map_err(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Request(e.to_string())
    }
}

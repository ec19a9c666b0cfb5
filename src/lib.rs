//! # ipfs-git-viewer — browse Git bundles stored on IPFS
//!
//! Fetches a Git bundle by content identifier through a pinning-service
//! gateway, unpacks it once into private storage, and serves a navigable
//! file listing plus individual file contents.
//!
//! ## Architecture
//!
//! - **[`store`]** — Gateway fetch with authenticated-then-anonymous fallback
//! - **[`extractor`]** — Single-flight bundle unpacking and the bounded repository cache
//! - **[`index`]** — Ordered file listing built once per extraction
//! - **[`content`]** — File reads and extension-based classification
//! - **[`viewer`]** — Facade wiring the layers together
//! - **[`registry`]** / **[`view`]** — Registered repositories and per-session view state
//! - **[`mcp`]** — MCP server exposing the viewer as tools (stdio transport via rmcp)
//! - **[`config`]** — Configuration loading and validation

use std::future::Future;
use std::pin::Pin;

pub mod config;
pub mod content;
pub mod error;
pub mod extractor;
pub mod identifier;
pub mod index;
pub mod mcp;
pub mod registry;
pub mod store;
pub mod view;
pub mod viewer;

pub use error::ViewerError;

/// Boxed future returned by the object-safe async seams of this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

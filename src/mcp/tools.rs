/// MCP Tool handlers for the viewer.
///
/// 1. list_repositories  – registered repositories
/// 2. add_repository     – register a CID with an optional name
/// 3. remove_repository  – unregister a CID and release its extraction
/// 4. list_pins          – repository pins from the pinning service
/// 5. browse             – directory listing with breadcrumbs
/// 6. read_file          – file contents with category and render hint
/// 7. download_bundle    – write the raw bundle to disk
/// 8. download_file      – write one file's raw bytes to disk
/// 9. clone_instructions – how to clone a repository locally
/// 10. evict_repository  – drop a cached extraction
use crate::content::FileContent;
use crate::index::FileEntry;
use crate::mcp::server::McpContext;
use crate::registry::BundleHandle;
use crate::view::ViewState;
use rmcp::handler::server::ServerHandler;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{ErrorData as McpError, handler::server::tool::ToolRouter, model::*, tool, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::PathBuf;

// ── Parameter structs ────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct CidParam {
    /// IPFS content identifier of the bundle (Qm... or bafy...)
    cid: String,
}

#[derive(Deserialize, JsonSchema)]
struct AddRepositoryParams {
    /// IPFS content identifier of the bundle
    cid: String,
    /// Display name (optional)
    name: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
struct BrowseParams {
    /// IPFS content identifier of the bundle
    cid: String,
    /// Directory to list (e.g. 'src/'); repository root if omitted
    path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
struct FileParams {
    /// IPFS content identifier of the bundle
    cid: String,
    /// File path relative to the repository root (e.g. 'src/main.py')
    path: String,
}

#[derive(Deserialize, JsonSchema)]
struct DownloadBundleParams {
    /// IPFS content identifier of the bundle
    cid: String,
    /// Destination file (default: '<name>.bundle' in the working directory)
    output_path: Option<String>,
}

#[derive(Deserialize, JsonSchema)]
struct DownloadFileParams {
    /// IPFS content identifier of the bundle
    cid: String,
    /// File path relative to the repository root
    path: String,
    /// Destination file (default: the file's name in the working directory)
    output_path: Option<String>,
}

// ── Response helpers ─────────────────────────────────────────────────

fn json_result(value: serde_json::Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(&value).unwrap_or_default(),
    )]))
}

fn error_result(msg: &str) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(msg.to_string())]))
}

fn entries_json(entries: &[FileEntry]) -> Vec<serde_json::Value> {
    entries
        .iter()
        .map(|e| {
            serde_json::json!({
                "name": e.name,
                "path": e.path,
                "kind": e.kind,
                "size_bytes": e.size_bytes,
            })
        })
        .collect()
}

fn content_json(content: &FileContent) -> serde_json::Value {
    let mut obj = serde_json::json!({
        "path": content.path,
        "category": content.category,
        "render": content.render_hint(),
        "size_bytes": content.size_bytes(),
        "empty": content.is_empty(),
    });
    if let Some(text) = content.display_text() {
        obj["text"] = serde_json::json!(text);
    }
    obj
}

/// Last path component, falling back to `fallback` for odd paths.
fn file_name_of(path: &str, fallback: &str) -> String {
    path.rsplit('/')
        .find(|p| !p.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

// ── Tool implementations ─────────────────────────────────────────────

#[derive(Clone)]
pub struct AppTools {
    pub ctx: McpContext,
    pub tool_router: ToolRouter<Self>,
}

impl ServerHandler for AppTools {}

#[tool_router]
impl AppTools {
    pub fn new(ctx: McpContext) -> Self {
        Self {
            ctx,
            tool_router: Self::tool_router(),
        }
    }

    /// Registered handle for `cid`, or an unnamed one.
    async fn handle_for(&self, cid: &str) -> Result<BundleHandle, crate::ViewerError> {
        let registry = self.ctx.registry.lock().await;
        match registry.get(cid) {
            Some(handle) => Ok(handle.clone()),
            None => BundleHandle::new(cid, None),
        }
    }

    // ── Tool 1: list_repositories ───────────────────────────────────

    #[tool(description = "List registered Git bundle repositories")]
    async fn list_repositories(&self) -> Result<CallToolResult, McpError> {
        let registry = self.ctx.registry.lock().await;
        let repos: Vec<serde_json::Value> = registry
            .list()
            .iter()
            .map(|h| {
                serde_json::json!({
                    "cid": h.cid,
                    "name": h.display_name(),
                    "added_at": h.added_at.to_rfc3339(),
                })
            })
            .collect();

        json_result(serde_json::json!({ "repositories": repos }))
    }

    // ── Tool 2: add_repository ──────────────────────────────────────

    #[tool(description = "Register a Git bundle repository by its IPFS CID")]
    async fn add_repository(
        &self,
        params: Parameters<AddRepositoryParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let mut registry = self.ctx.registry.lock().await;
        match registry.add(&p.cid, p.name.as_deref()) {
            Ok(true) => json_result(serde_json::json!({
                "success": true,
                "message": "Repository added",
            })),
            Ok(false) => json_result(serde_json::json!({
                "success": false,
                "message": "Repository already registered",
            })),
            Err(e) => error_result(&e.to_string()),
        }
    }

    // ── Tool 3: remove_repository ───────────────────────────────────

    #[tool(description = "Unregister a repository and release its extracted files")]
    async fn remove_repository(
        &self,
        params: Parameters<CidParam>,
    ) -> Result<CallToolResult, McpError> {
        let cid = params.0.cid;
        let removed = self.ctx.registry.lock().await.remove(&cid);
        if removed.is_none() {
            return error_result(&format!("repository not registered: {cid}"));
        }
        self.ctx.viewer.evict(&cid).await;

        json_result(serde_json::json!({
            "success": true,
            "message": "Repository removed",
        }))
    }

    // ── Tool 4: list_pins ───────────────────────────────────────────

    #[tool(description = "List Git repositories pinned on the pinning service")]
    async fn list_pins(&self) -> Result<CallToolResult, McpError> {
        match self.ctx.viewer.list_pins().await {
            Ok(pins) => json_result(serde_json::json!({ "pins": pins })),
            Err(e) => error_result(&e.to_string()),
        }
    }

    // ── Tool 5: browse ──────────────────────────────────────────────

    #[tool(
        description = "List a directory of a repository. Directories come first, then files, each sorted by name."
    )]
    async fn browse(&self, params: Parameters<BrowseParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let view = ViewState::at(&p.cid, p.path.as_deref().unwrap_or(""));

        let entries = match self.ctx.viewer.list(&view).await {
            Ok(entries) => entries,
            Err(e) => return error_result(&format!("Error loading repository: {e}")),
        };

        let parent = (!view.is_root()).then(|| view.go_up().prefix);
        json_result(serde_json::json!({
            "cid": view.cid,
            "path": view.prefix,
            "parent": parent,
            "breadcrumbs": view.breadcrumbs(),
            "entries": entries_json(&entries),
            "count": entries.len(),
        }))
    }

    // ── Tool 6: read_file ───────────────────────────────────────────

    #[tool(
        description = "Read a file from a repository. Text and code files include decoded text; binary files only report metadata."
    )]
    async fn read_file(&self, params: Parameters<FileParams>) -> Result<CallToolResult, McpError> {
        let p = params.0;
        match self.ctx.viewer.read_file(&p.cid, &p.path).await {
            Ok(content) => json_result(content_json(&content)),
            Err(e) => error_result(&format!("Error reading file: {e}")),
        }
    }

    // ── Tool 7: download_bundle ─────────────────────────────────────

    #[tool(description = "Download the raw Git bundle of a repository to a local file")]
    async fn download_bundle(
        &self,
        params: Parameters<DownloadBundleParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let handle = match self.handle_for(&p.cid).await {
            Ok(h) => h,
            Err(e) => return error_result(&e.to_string()),
        };
        let bytes = match self.ctx.viewer.download_bundle(&handle.cid).await {
            Ok(bytes) => bytes,
            Err(e) => return error_result(&format!("Download failed: {e}")),
        };

        let dest = p
            .output_path
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("{}.bundle", handle.file_stem())));
        tokio::fs::write(&dest, &bytes).await.map_err(|e| {
            McpError::internal_error(format!("write {} failed: {e}", dest.display()), None)
        })?;

        json_result(serde_json::json!({
            "success": true,
            "file": dest.to_string_lossy(),
            "size_bytes": bytes.len(),
        }))
    }

    // ── Tool 8: download_file ───────────────────────────────────────

    #[tool(description = "Download a single file of a repository, byte for byte, to a local file")]
    async fn download_file(
        &self,
        params: Parameters<DownloadFileParams>,
    ) -> Result<CallToolResult, McpError> {
        let p = params.0;
        let content = match self.ctx.viewer.read_file(&p.cid, &p.path).await {
            Ok(content) => content,
            Err(e) => return error_result(&format!("File not available: {e}")),
        };

        let dest = p
            .output_path
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(file_name_of(&content.path, "download")));
        tokio::fs::write(&dest, content.bytes()).await.map_err(|e| {
            McpError::internal_error(format!("write {} failed: {e}", dest.display()), None)
        })?;

        json_result(serde_json::json!({
            "success": true,
            "file": dest.to_string_lossy(),
            "size_bytes": content.size_bytes(),
        }))
    }

    // ── Tool 9: clone_instructions ──────────────────────────────────

    #[tool(description = "Show how to clone a repository locally from its IPFS bundle")]
    async fn clone_instructions(
        &self,
        params: Parameters<CidParam>,
    ) -> Result<CallToolResult, McpError> {
        let handle = match self.handle_for(&params.0.cid).await {
            Ok(h) => h,
            Err(e) => return error_result(&e.to_string()),
        };

        json_result(serde_json::json!({
            "cid": handle.cid,
            "name": handle.display_name(),
            "gateway_url": self.ctx.viewer.store().object_url(&handle.cid),
            "instructions": handle.clone_instructions(&self.ctx.config.gateway_url),
        }))
    }

    // ── Tool 10: evict_repository ───────────────────────────────────

    #[tool(description = "Release the cached extraction of a repository; it is re-fetched on next access")]
    async fn evict_repository(
        &self,
        params: Parameters<CidParam>,
    ) -> Result<CallToolResult, McpError> {
        let evicted = self.ctx.viewer.evict(&params.0.cid).await;
        json_result(serde_json::json!({
            "success": true,
            "evicted": evicted,
        }))
    }
}

/// End-to-end integration tests for the viewer pipeline.
///
/// Tests the complete flow:
///   Gateway fetch → Extraction → Index → Listing → File read → Eviction
use ipfs_git_viewer::BoxFuture;
use ipfs_git_viewer::ViewerError;
use ipfs_git_viewer::content::{Category, RenderHint};
use ipfs_git_viewer::extractor::{BundleExtractor, GitUnpacker, RepositoryCache, Unpacker};
use ipfs_git_viewer::index::EntryKind;
use ipfs_git_viewer::store::{BundleStore, Credentials, GatewayResponse, Transport, TransportError};
use ipfs_git_viewer::view::ViewState;
use ipfs_git_viewer::viewer::Viewer;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

const CID: &str = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";
const OTHER_CID: &str = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi";

// ── Fakes ────────────────────────────────────────────────────────────

/// Serves fixed bodies per URL suffix. Requests carrying credentials get
/// `auth_status` when it is set.
#[derive(Default)]
struct FakeGateway {
    bodies: HashMap<String, Vec<u8>>,
    auth_status: Option<u16>,
    requests: AtomicUsize,
    authenticated: AtomicUsize,
}

impl FakeGateway {
    fn with(mut self, cid: &str, body: &[u8]) -> Self {
        self.bodies.insert(cid.to_string(), body.to_vec());
        self
    }
}

impl Transport for FakeGateway {
    fn get<'a>(
        &'a self,
        url: &'a str,
        headers: &'a [(&'static str, String)],
    ) -> BoxFuture<'a, Result<GatewayResponse, TransportError>> {
        Box::pin(async move {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if !headers.is_empty() {
                self.authenticated.fetch_add(1, Ordering::SeqCst);
                if let Some(status) = self.auth_status {
                    return Ok(GatewayResponse {
                        status,
                        body: Vec::new(),
                    });
                }
            }
            let cid = url.rsplit('/').next().unwrap_or_default();
            Ok(match self.bodies.get(cid) {
                Some(body) => GatewayResponse {
                    status: 200,
                    body: body.clone(),
                },
                None => GatewayResponse {
                    status: 404,
                    body: b"not found".to_vec(),
                },
            })
        })
    }
}

/// Writes the sample repository tree; payloads starting with `bad` fail.
#[derive(Default)]
struct SampleUnpacker {
    calls: AtomicUsize,
    delay: Duration,
}

impl Unpacker for SampleUnpacker {
    fn unpack<'a>(&'a self, bundle: &'a Path, dest: &'a Path) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if fs::read(bundle)?.starts_with(b"bad") {
                anyhow::bail!("not a bundle");
            }
            write_sample_tree(dest)?;
            Ok(())
        })
    }
}

fn write_sample_tree(root: &Path) -> std::io::Result<()> {
    fs::create_dir_all(root.join("docs"))?;
    fs::create_dir_all(root.join("src/lib"))?;
    fs::write(root.join("docs/.gitkeep"), "")?;
    fs::write(root.join("README.md"), "Hello world\n")?;
    fs::write(root.join("src/main.py"), "print('hi')\n")?;
    fs::write(root.join("src/lib/util.py"), "")?;
    Ok(())
}

fn viewer(
    gateway: Arc<FakeGateway>,
    unpacker: Arc<dyn Unpacker>,
    credentials: Option<Credentials>,
    work: &Path,
) -> Viewer {
    let store = BundleStore::new(gateway, "https://gateway.test", "https://api.test", credentials);
    let extractor = BundleExtractor::new(
        unpacker,
        RepositoryCache::new(4, None),
        work,
        Duration::from_secs(30),
    );
    Viewer::new(store, extractor)
}

fn paths(entries: &[ipfs_git_viewer::index::FileEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.path.as_str()).collect()
}

// ── Scenarios ────────────────────────────────────────────────────────

/// Full pipeline: fetch → extract → list root → list directory → read file
#[tokio::test]
async fn test_browse_and_read() {
    let work = tempdir().unwrap();
    let gateway = Arc::new(FakeGateway::default().with(CID, b"bundle"));
    let unpacker = Arc::new(SampleUnpacker::default());
    let viewer = viewer(gateway.clone(), unpacker.clone(), None, work.path());

    // 1. Root listing: directories first, then files
    let root = viewer.list(&ViewState::root(CID)).await.unwrap();
    assert_eq!(paths(&root), vec!["docs", "src", "README.md"]);
    assert_eq!(root[0].kind, EntryKind::Directory);
    assert_eq!(root[2].kind, EntryKind::File);

    // 2. Directory listing
    let src = viewer.list(&ViewState::at(CID, "src/")).await.unwrap();
    assert_eq!(paths(&src), vec!["src/lib", "src/main.py"]);

    // 3. Literal prefix filter reaches every depth
    let below = viewer.descendants(CID, "src/").await.unwrap();
    assert!(paths(&below).contains(&"src/lib/util.py"));

    // 4. File read
    let readme = viewer.read_file(CID, "README.md").await.unwrap();
    assert_eq!(readme.category, Category::Text);
    assert_eq!(readme.text(), "Hello world\n");
    assert_eq!(readme.size_bytes(), 12);
    assert_eq!(readme.render_hint(), RenderHint::Markdown);

    let main = viewer.read_file(CID, "src/main.py").await.unwrap();
    assert_eq!(main.category, Category::Code);

    let empty = viewer.read_file(CID, "src/lib/util.py").await.unwrap();
    assert!(empty.is_empty());

    // 5. Everything above used one fetch and one extraction
    assert_eq!(gateway.requests.load(Ordering::SeqCst), 1);
    assert_eq!(unpacker.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_listed_sizes_match_read_lengths() {
    let work = tempdir().unwrap();
    let gateway = Arc::new(FakeGateway::default().with(CID, b"bundle"));
    let viewer = viewer(gateway, Arc::new(SampleUnpacker::default()), None, work.path());

    let files = viewer.descendants(CID, "").await.unwrap();
    assert_eq!(files, viewer.descendants(CID, "").await.unwrap());
    for entry in files.iter().filter(|e| e.is_file()) {
        let content = viewer.read_file(CID, &entry.path).await.unwrap();
        assert_eq!(content.size_bytes(), entry.size_bytes, "{}", entry.path);
    }
}

#[tokio::test]
async fn test_missing_paths_are_not_found() {
    let work = tempdir().unwrap();
    let gateway = Arc::new(FakeGateway::default().with(CID, b"bundle"));
    let viewer = viewer(gateway, Arc::new(SampleUnpacker::default()), None, work.path());

    for path in ["src", "nope.txt", "../etc/passwd"] {
        let err = viewer.read_file(CID, path).await.unwrap_err();
        assert!(matches!(err, ViewerError::NotFound { .. }), "{path}: {err}");
        assert!(!err.is_retryable());
    }
}

#[tokio::test]
async fn test_concurrent_sessions_share_one_extraction() {
    let work = tempdir().unwrap();
    let gateway = Arc::new(FakeGateway::default().with(CID, b"bundle"));
    let unpacker = Arc::new(SampleUnpacker {
        delay: Duration::from_millis(50),
        ..Default::default()
    });
    let viewer = Arc::new(viewer(gateway.clone(), unpacker.clone(), None, work.path()));

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let viewer = viewer.clone();
            tokio::spawn(async move { viewer.read_file(CID, "README.md").await })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap().text(), "Hello world\n");
    }

    assert_eq!(unpacker.calls.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_eviction_reclaims_and_reextracts() {
    let work = tempdir().unwrap();
    let gateway = Arc::new(FakeGateway::default().with(CID, b"bundle"));
    let unpacker = Arc::new(SampleUnpacker::default());
    let viewer = viewer(gateway, unpacker.clone(), None, work.path());

    let root = viewer.open(CID).await.unwrap().root().to_path_buf();
    assert!(root.exists());

    assert!(viewer.evict(CID).await);
    assert!(!root.exists(), "storage should be removed once unreferenced");

    viewer.list(&ViewState::root(CID)).await.unwrap();
    assert_eq!(unpacker.calls.load(Ordering::SeqCst), 2);

    assert_eq!(viewer.shutdown().await, 1);
}

#[tokio::test]
async fn test_download_does_not_need_extraction() {
    let work = tempdir().unwrap();
    let gateway = Arc::new(FakeGateway::default().with(CID, b"bad bundle"));
    let viewer = viewer(gateway, Arc::new(SampleUnpacker::default()), None, work.path());

    let err = viewer.list(&ViewState::root(CID)).await.unwrap_err();
    assert!(matches!(err, ViewerError::Extraction { .. }));

    let bytes = viewer.download_bundle(CID).await.unwrap();
    assert_eq!(bytes, b"bad bundle");
}

#[tokio::test]
async fn test_auth_rejection_falls_back_to_anonymous() {
    let work = tempdir().unwrap();
    let gateway = Arc::new(FakeGateway {
        auth_status: Some(403),
        ..FakeGateway::default().with(CID, b"bundle")
    });
    let credentials = Some(Credentials {
        api_key: "key".into(),
        secret_api_key: "secret".into(),
    });
    let viewer = viewer(
        gateway.clone(),
        Arc::new(SampleUnpacker::default()),
        credentials,
        work.path(),
    );

    let root = viewer.list(&ViewState::root(CID)).await.unwrap();
    assert_eq!(root.len(), 3);
    assert_eq!(gateway.requests.load(Ordering::SeqCst), 2);
    assert_eq!(gateway.authenticated.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_content_is_a_fetch_error() {
    let work = tempdir().unwrap();
    let viewer = viewer(
        Arc::new(FakeGateway::default()),
        Arc::new(SampleUnpacker::default()),
        None,
        work.path(),
    );

    let err = viewer.read_file(OTHER_CID, "README.md").await.unwrap_err();
    assert!(matches!(err, ViewerError::Fetch { retryable: false, .. }), "{err}");

    let err = viewer.list(&ViewState::root("not-a-cid")).await.unwrap_err();
    assert!(matches!(err, ViewerError::InvalidIdentifier(_)));
}

// ── Real git ─────────────────────────────────────────────────────────

fn git(dir: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .args([
            "-c",
            "user.name=Viewer Test",
            "-c",
            "user.email=viewer@example.com",
            "-c",
            "commit.gpgsign=false",
            "-c",
            "init.defaultBranch=main",
        ])
        .args(args)
        .current_dir(dir)
        .output()
        .is_ok_and(|o| o.status.success())
}

/// Build a bundle with the git CLI and browse it through the real unpacker.
#[tokio::test]
async fn test_real_git_bundle() {
    let scratch = tempdir().unwrap();
    let repo = scratch.path().join("repo");
    fs::create_dir_all(&repo).unwrap();
    write_sample_tree(&repo).unwrap();

    if !git(&repo, &["init", "--quiet"]) {
        eprintln!("git not available, skipping");
        return;
    }
    assert!(git(&repo, &["add", "-A"]));
    assert!(git(&repo, &["commit", "--quiet", "-m", "initial"]));
    assert!(git(&repo, &["bundle", "create", "../repo.bundle", "--all"]));
    let bundle = fs::read(scratch.path().join("repo.bundle")).unwrap();

    let work = tempdir().unwrap();
    let gateway = Arc::new(FakeGateway::default().with(CID, &bundle));
    let viewer = viewer(gateway, Arc::new(GitUnpacker::default()), None, work.path());

    let root = viewer.list(&ViewState::root(CID)).await.unwrap();
    assert_eq!(paths(&root), vec!["docs", "src", "README.md"]);

    let src = viewer.list(&ViewState::at(CID, "src")).await.unwrap();
    assert_eq!(paths(&src), vec!["src/lib", "src/main.py"]);

    let readme = viewer.read_file(CID, "README.md").await.unwrap();
    assert_eq!(readme.bytes(), b"Hello world\n");

    assert_eq!(viewer.download_bundle(CID).await.unwrap(), bundle);
}

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use ipfs_git_viewer::config::Config;
use ipfs_git_viewer::content::Category;
use ipfs_git_viewer::index::FileEntry;
use ipfs_git_viewer::mcp::server::{McpContext, McpServer};
use ipfs_git_viewer::registry::BundleHandle;
use ipfs_git_viewer::view::ViewState;
use ipfs_git_viewer::viewer::Viewer;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ── CLI ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "ipfs-git-viewer",
    version,
    about = "Browse Git bundles stored on IPFS"
)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "config.json", global = true)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the viewer as MCP tools over stdio.
    Serve,
    /// List a directory of a repository.
    Ls {
        cid: String,
        /// Directory to list, e.g. `src/`.
        #[arg(default_value = "")]
        prefix: String,
        /// List every entry below the prefix instead of direct children.
        #[arg(short, long)]
        recursive: bool,
    },
    /// Print a text file, or save any file with `--output`.
    Cat {
        cid: String,
        path: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Save the raw bundle of a repository.
    Download {
        cid: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Display name used for the default file name.
        #[arg(long)]
        name: Option<String>,
    },
    /// List Git repositories pinned on the pinning service.
    Pins,
    /// Show how to clone a repository locally.
    Instructions {
        cid: String,
        #[arg(long)]
        name: Option<String>,
    },
}

// ── Helpers ──────────────────────────────────────────────────────────

/// Run `fut` behind a spinner on stderr.
async fn with_spinner<T, F>(message: &str, fut: F) -> T
where
    F: Future<Output = T>,
{
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    let out = fut.await;
    pb.finish_and_clear();
    out
}

fn print_entries(entries: &[FileEntry]) {
    for entry in entries {
        if entry.is_dir() {
            println!("{:>10}  {}/", "-", entry.path);
        } else {
            println!("{:>10}  {}", entry.size_bytes, entry.path);
        }
    }
}

async fn run(command: Command, config: Arc<Config>, viewer: Arc<Viewer>) -> Result<()> {
    match command {
        Command::Serve => {
            let ctx = McpContext::new(viewer, config);
            McpServer::new(ctx).start().await?;
        }
        Command::Ls {
            cid,
            prefix,
            recursive,
        } => {
            let entries = if recursive {
                with_spinner("Loading repository", viewer.descendants(&cid, &prefix)).await?
            } else {
                let view = ViewState::at(&cid, &prefix);
                with_spinner("Loading repository", viewer.list(&view)).await?
            };
            print_entries(&entries);
        }
        Command::Cat { cid, path, output } => {
            let content = with_spinner("Loading repository", viewer.read_file(&cid, &path)).await?;
            match output {
                Some(dest) => {
                    tokio::fs::write(&dest, content.bytes())
                        .await
                        .with_context(|| format!("failed to write {}", dest.display()))?;
                    eprintln!("Saved {} ({} bytes)", dest.display(), content.size_bytes());
                }
                None if content.category == Category::Binary => {
                    bail!(
                        "{} is a binary file ({} bytes); use --output to save it",
                        content.path,
                        content.size_bytes()
                    );
                }
                None => print!("{}", content.text()),
            }
        }
        Command::Download { cid, output, name } => {
            let handle = BundleHandle::new(&cid, name.as_deref())?;
            let bytes = with_spinner("Downloading bundle", viewer.download_bundle(&handle.cid)).await?;
            let dest =
                output.unwrap_or_else(|| PathBuf::from(format!("{}.bundle", handle.file_stem())));
            tokio::fs::write(&dest, &bytes)
                .await
                .with_context(|| format!("failed to write {}", dest.display()))?;
            eprintln!("Saved {} ({} bytes)", dest.display(), bytes.len());
        }
        Command::Pins => {
            let pins = with_spinner("Listing pins", viewer.list_pins()).await?;
            for pin in pins {
                let date = pin
                    .date_pinned
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default();
                println!("{}  {:<10}  {}", pin.cid, date, pin.name);
            }
        }
        Command::Instructions { cid, name } => {
            let handle = BundleHandle::new(&cid, name.as_deref())?;
            println!("{}", handle.clone_instructions(&config.gateway_url));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the MCP protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // 1. Load config
    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;
    let config = Arc::new(config);

    // 2. Build the viewer
    let viewer = Arc::new(Viewer::from_config(&config)?);
    info!(
        "gateway {}, work dir {}",
        config.gateway_url,
        config.work_dir().display()
    );

    // 3. Run the command, then release extraction storage
    let result = run(cli.command, config, viewer.clone()).await;
    let released = viewer.shutdown().await;
    if released > 0 {
        info!("released {released} cached extraction(s)");
    }
    result
}

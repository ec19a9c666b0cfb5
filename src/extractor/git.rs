//! [`Unpacker`] that shells out to the system `git` binary.
//!
//! `git clone <bundle> <dest>` verifies the bundle, unpacks its objects and
//! checks out the bundle's `HEAD` in one step.
use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tracing::{debug, instrument};

use super::Unpacker;
use crate::BoxFuture;

#[derive(Debug, Clone)]
pub struct GitUnpacker {
    git: String,
}

impl GitUnpacker {
    pub fn new(git: impl Into<String>) -> Self {
        Self { git: git.into() }
    }

    #[instrument(skip_all, fields(bundle = %bundle.display(), dest = %dest.display()))]
    async fn clone_bundle(&self, bundle: &Path, dest: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.git);
        cmd.arg("-c")
            .arg("advice.detachedHead=false")
            .arg("clone")
            .arg("--quiet")
            .arg("--")
            .arg(bundle)
            .arg(dest);

        cmd.env("GIT_TERMINAL_PROMPT", "0");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        debug!("spawning git clone from bundle");

        let output = cmd
            .output()
            .await
            .with_context(|| format!("failed to spawn {} clone", self.git))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "git clone failed (status {}): {}",
                output.status,
                stderr.trim(),
            );
        }

        debug!("git clone from bundle succeeded");
        Ok(())
    }
}

impl Default for GitUnpacker {
    fn default() -> Self {
        Self::new("git")
    }
}

impl Unpacker for GitUnpacker {
    fn unpack<'a>(&'a self, bundle: &'a Path, dest: &'a Path) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.clone_bundle(bundle, dest))
    }
}

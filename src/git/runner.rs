//! Git command runner with optional result memoization.
//!
//! Uses the git CLI directly (rather than libgit2) so that hooks, credential
//! helpers and the user's git configuration behave exactly as on the terminal.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::cache::CacheStore;

/// Exit code reported when the git process could not be spawned at all.
pub const SPAWN_FAILURE_CODE: i32 = -1;

/// Outcome of a single git invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    /// A successful result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    /// A failed result with the given stderr and exit code.
    pub fn failed(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Stderr if present, otherwise stdout. Git writes progress to either.
    pub fn output(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }
}

/// Executes git processes. Implemented by [`SystemGit`] and by the in-memory
/// [`FakeGit`](crate::git::FakeGit) used in tests.
#[async_trait]
pub trait GitExecutor: Send + Sync {
    /// Run git with `args` in `cwd`. Never fails: spawn errors are folded into
    /// an unsuccessful [`CommandResult`].
    async fn exec(&self, args: &[&str], cwd: &Path) -> CommandResult;
}

/// Runs the real `git` binary found on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct SystemGit;

#[async_trait]
impl GitExecutor for SystemGit {
    async fn exec(&self, args: &[&str], cwd: &Path) -> CommandResult {
        let output = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => CommandResult {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code().unwrap_or(SPAWN_FAILURE_CODE),
            },
            Err(e) => {
                warn!(?args, error = %e, "Failed to spawn git");
                CommandResult::failed(
                    format!("failed to execute git: {e}"),
                    SPAWN_FAILURE_CODE,
                )
            }
        }
    }
}

/// Runs git against one repository, memoizing successful results on request.
#[derive(Clone)]
pub struct GitRunner {
    executor: Arc<dyn GitExecutor>,
    repo_path: PathBuf,
    cache: Arc<CacheStore<CommandResult>>,
}

impl GitRunner {
    pub fn new(
        executor: Arc<dyn GitExecutor>,
        repo_path: impl Into<PathBuf>,
        cache: Arc<CacheStore<CommandResult>>,
    ) -> Self {
        Self {
            executor,
            repo_path: repo_path.into(),
            cache,
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn cache(&self) -> &Arc<CacheStore<CommandResult>> {
        &self.cache
    }

    /// Run git without caching.
    pub async fn run(&self, args: &[&str]) -> CommandResult {
        self.run_cached(args, None, Duration::ZERO).await
    }

    /// Run git, serving from and storing into the cache under `cache_key`.
    ///
    /// A live entry is returned without spawning a process. Only successful
    /// results are stored, and a zero `ttl` stores nothing. A result is also
    /// dropped when the cache was invalidated while git was running.
    pub async fn run_cached(
        &self,
        args: &[&str],
        cache_key: Option<&str>,
        ttl: Duration,
    ) -> CommandResult {
        if let Some(key) = cache_key {
            if let Some(hit) = self.cache.get(key) {
                return hit;
            }
        }

        let generation = self.cache.generation();
        let result = self.exec(args).await;

        if let Some(key) = cache_key {
            if result.success
                && !self
                    .cache
                    .set_if_generation(key, result.clone(), ttl, generation)
            {
                debug!(key, "Cache invalidated while git ran, result not stored");
            }
        }

        result
    }

    #[instrument(skip_all, fields(cmd = args.first().copied().unwrap_or_default()))]
    async fn exec(&self, args: &[&str]) -> CommandResult {
        debug!(?args, cwd = %self.repo_path.display(), "Running git command");
        let result = self.executor.exec(args, &self.repo_path).await;
        if !result.success {
            debug!(
                ?args,
                code = result.exit_code,
                stderr = %result.stderr.trim(),
                "Git command failed"
            );
        }
        result
    }
}

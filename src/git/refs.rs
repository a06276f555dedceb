//! Typed reads of the repository's refs.
//!
//! All ref listings use `git for-each-ref` with full ref names and a NUL
//! field separator, so branch names are never split on a delimiter that
//! could legally appear inside them.

use std::time::Duration;

use tracing::instrument;

use crate::git::runner::{CommandResult, GitRunner};
use crate::git::GitError;

/// Cache key for the local branch listing.
pub const LOCAL_REFS_KEY: &str = "branches_local_refs";
/// Cache key for the checked-out branch.
pub const CURRENT_BRANCH_KEY: &str = "branches_current";
/// Cache key for the remote-tracking ref listing.
pub const REMOTE_REFS_KEY: &str = "remote_refs";
/// Cache key for `git status --porcelain`.
pub const STATUS_KEY: &str = "status";

const HEADS_PREFIX: &str = "refs/heads/";
const REMOTES_PREFIX: &str = "refs/remotes/";

/// Whether a read may be served from the command cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    Cached,
    /// Always spawn git. Used for reads that decide a mutation's input.
    Fresh,
}

/// A local branch and its configured upstream, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRef {
    /// Short name, e.g. `feature/a`.
    pub name: String,
    /// Full upstream ref, e.g. `refs/remotes/origin/feature/a`.
    pub upstream: Option<String>,
}

/// A remote-tracking ref as listed under `refs/remotes/<remote>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRef {
    /// Name relative to `refs/remotes/`, e.g. `origin/feature/a`.
    pub name: String,
    /// True for symbolic refs such as `origin/HEAD`.
    pub symbolic: bool,
}

/// Reads refs of one repository through a [`GitRunner`].
#[derive(Clone)]
pub struct GitRefs {
    runner: GitRunner,
    remote: String,
    ttl: Duration,
    status_ttl: Duration,
}

impl GitRefs {
    pub fn new(runner: GitRunner, remote: impl Into<String>, ttl: Duration) -> Self {
        Self {
            runner,
            remote: remote.into(),
            ttl,
            status_ttl: ttl,
        }
    }

    /// Use a separate, usually much shorter, TTL for working tree status.
    pub fn with_status_ttl(mut self, ttl: Duration) -> Self {
        self.status_ttl = ttl;
        self
    }

    pub fn runner(&self) -> &GitRunner {
        &self.runner
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    async fn read(
        &self,
        args: &[&str],
        key: &str,
        ttl: Duration,
        mode: ReadMode,
    ) -> Result<CommandResult, GitError> {
        let result = match mode {
            ReadMode::Cached => self.runner.run_cached(args, Some(key), ttl).await,
            ReadMode::Fresh => self.runner.run(args).await,
        };
        if result.success {
            Ok(result)
        } else {
            Err(GitError::new(args, result))
        }
    }

    /// Local branches with their configured upstream.
    #[instrument(skip(self))]
    pub async fn local_branches(&self, mode: ReadMode) -> Result<Vec<LocalRef>, GitError> {
        let result = self
            .read(
                &[
                    "for-each-ref",
                    "--format=%(refname)%00%(upstream)",
                    HEADS_PREFIX,
                ],
                LOCAL_REFS_KEY,
                self.ttl,
                mode,
            )
            .await?;
        Ok(parse_local_refs(&result.stdout))
    }

    /// Remote-tracking refs of the configured remote, symbolic refs included.
    #[instrument(skip(self))]
    pub async fn remote_branches(&self, mode: ReadMode) -> Result<Vec<RemoteRef>, GitError> {
        let namespace = format!("{REMOTES_PREFIX}{}/", self.remote);
        let result = self
            .read(
                &["for-each-ref", "--format=%(refname)%00%(symref)", namespace.as_str()],
                REMOTE_REFS_KEY,
                self.ttl,
                mode,
            )
            .await?;
        Ok(parse_remote_refs(&result.stdout))
    }

    /// The checked-out branch, or `None` on a detached HEAD.
    #[instrument(skip(self))]
    pub async fn current_branch(&self, mode: ReadMode) -> Result<Option<String>, GitError> {
        let args = ["symbolic-ref", "--quiet", "--short", "HEAD"];
        let result = match mode {
            ReadMode::Cached => {
                self.runner
                    .run_cached(&args, Some(CURRENT_BRANCH_KEY), self.ttl)
                    .await
            }
            ReadMode::Fresh => self.runner.run(&args).await,
        };
        if result.success {
            let name = result.stdout.trim();
            return Ok((!name.is_empty()).then(|| name.to_string()));
        }
        // Exit 1 with no message means HEAD is detached.
        if result.exit_code == 1 && result.stderr.trim().is_empty() {
            return Ok(None);
        }
        Err(GitError::new(&args, result))
    }

    /// Commit SHA of HEAD.
    pub async fn head_commit(&self) -> Result<String, GitError> {
        let args = ["rev-parse", "HEAD"];
        let result = self.runner.run(&args).await;
        if result.success {
            Ok(result.stdout.trim().to_string())
        } else {
            Err(GitError::new(&args, result))
        }
    }

    /// Whether `refs/heads/<name>` exists. Always reads fresh.
    pub async fn local_branch_exists(&self, name: &str) -> bool {
        let refname = format!("{HEADS_PREFIX}{name}");
        self.runner
            .run(&["show-ref", "--verify", "--quiet", refname.as_str()])
            .await
            .success
    }

    /// Whether `refs/remotes/<remote>/<name>` exists. Always reads fresh.
    pub async fn remote_branch_exists(&self, name: &str) -> bool {
        let refname = format!("{REMOTES_PREFIX}{}/{name}", self.remote);
        self.runner
            .run(&["show-ref", "--verify", "--quiet", refname.as_str()])
            .await
            .success
    }

    /// `git status --porcelain` output.
    pub async fn status(&self, mode: ReadMode) -> Result<CommandResult, GitError> {
        self.read(
            &["status", "--porcelain"],
            STATUS_KEY,
            self.status_ttl,
            mode,
        )
        .await
    }
}

/// Parse `for-each-ref --format=%(refname)%00%(upstream)` output.
pub fn parse_local_refs(stdout: &str) -> Vec<LocalRef> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let (refname, upstream) = line.split_once('\0').unwrap_or((line, ""));
            let name = refname.strip_prefix(HEADS_PREFIX)?;
            let upstream = upstream.trim();
            Some(LocalRef {
                name: name.to_string(),
                upstream: (!upstream.is_empty()).then(|| upstream.to_string()),
            })
        })
        .collect()
}

/// Parse `for-each-ref --format=%(refname)%00%(symref)` output.
pub fn parse_remote_refs(stdout: &str) -> Vec<RemoteRef> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let (refname, symref) = line.split_once('\0').unwrap_or((line, ""));
            let name = refname.strip_prefix(REMOTES_PREFIX)?;
            Some(RemoteRef {
                name: name.to_string(),
                symbolic: !symref.trim().is_empty(),
            })
        })
        .collect()
}

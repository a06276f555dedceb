//! Branch service: the object request handlers talk to.
//!
//! Owns the command cache, the mutation serializer and the timestamp of the
//! last background remote refresh. One instance per repository, created at
//! startup and shared through the HTTP state.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::branches::error::{validate_branch_name, BranchError};
use crate::branches::page::{paginate, search, Page};
use crate::branches::reconcile::{BranchRef, Reconciler, RemoteBranchRef};
use crate::cache::CacheStore;
use crate::config::Config;
use crate::git::{
    CommandResult, GitExecutor, GitRefs, GitRunner, MutationSerializer, ReadMode,
    SerializerState,
};

/// Settings the service needs, usually derived from [`Config`].
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub repo_path: PathBuf,
    pub remote: String,
    /// Branches never removed by cleanup, in sort priority order.
    pub protected: Vec<String>,
    pub cache_ttl: Duration,
    pub status_ttl: Duration,
    /// Minimum spacing between background fetches. `None` disables them.
    pub background_interval: Option<Duration>,
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            repo_path: config.repository_path(),
            remote: config.remote.clone(),
            protected: config.protected_branches.clone(),
            cache_ttl: Duration::from_secs(config.cache.ttl_secs),
            status_ttl: Duration::from_secs(config.cache.status_ttl_secs),
            background_interval: (config.background_update_secs > 0)
                .then(|| Duration::from_secs(config.background_update_secs)),
        }
    }
}

/// A mutation that git accepted.
#[derive(Debug, Clone)]
pub struct MutationOutcome {
    pub message: String,
    pub result: CommandResult,
}

/// Per-branch outcome of a bulk update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchUpdate {
    pub branch: String,
    pub success: bool,
    pub output: String,
}

#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub results: Vec<BranchUpdate>,
    /// Whether the originally checked-out branch was restored.
    pub restored: bool,
}

impl UpdateReport {
    pub fn overall_success(&self) -> bool {
        self.restored && self.results.iter().all(|r| r.success)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    /// Deleted branches, each with its outcome message.
    pub deleted: Vec<BranchUpdate>,
    pub failed: Vec<BranchUpdate>,
}

pub struct BranchService {
    refs: GitRefs,
    reconciler: Reconciler,
    serializer: MutationSerializer,
    background_interval: Option<Duration>,
    last_background_update: Mutex<Option<Instant>>,
}

impl BranchService {
    pub fn new(executor: Arc<dyn GitExecutor>, settings: ServiceSettings) -> Self {
        let cache = Arc::new(CacheStore::new());
        let runner = GitRunner::new(executor, settings.repo_path, cache);
        let refs = GitRefs::new(runner, settings.remote.clone(), settings.cache_ttl)
            .with_status_ttl(settings.status_ttl);

        Self {
            refs,
            reconciler: Reconciler::new(settings.remote, settings.protected),
            serializer: MutationSerializer::new(),
            background_interval: settings.background_interval,
            last_background_update: Mutex::new(None),
        }
    }

    pub fn cache(&self) -> &Arc<CacheStore<CommandResult>> {
        self.refs.runner().cache()
    }

    pub fn serializer_state(&self) -> SerializerState {
        self.serializer.state()
    }

    pub fn queued_mutations(&self) -> usize {
        self.serializer.queued()
    }

    fn runner(&self) -> &GitRunner {
        self.refs.runner()
    }

    fn invalidate(&self, patterns: &[&str]) {
        for pattern in patterns {
            self.cache().invalidate(Some(pattern));
        }
    }

    // ─── Reads ───────────────────────────────────────────────────────────────

    /// Reconciled local branches, sorted protected-first.
    #[instrument(skip(self))]
    pub async fn local_branches(&self, mode: ReadMode) -> Result<Vec<BranchRef>, BranchError> {
        let (local, remote, current) = tokio::try_join!(
            self.refs.local_branches(mode),
            self.refs.remote_branches(mode),
            self.refs.current_branch(mode),
        )?;
        Ok(self
            .reconciler
            .reconcile_refs(&local, &remote, current.as_deref()))
    }

    /// Branches advertised by the remote, without symbolic refs.
    #[instrument(skip(self))]
    pub async fn remote_branches(
        &self,
        mode: ReadMode,
    ) -> Result<Vec<RemoteBranchRef>, BranchError> {
        let remote = self.refs.remote_branches(mode).await?;
        Ok(self.reconciler.reconcile_remote(&remote))
    }

    /// A page of local branches. `skip_refresh` re-reads git and refreshes the cache.
    pub async fn list_local(
        &self,
        page: usize,
        limit: usize,
        skip_refresh: bool,
    ) -> Result<Page<BranchRef>, BranchError> {
        if skip_refresh {
            self.invalidate(&["branches", "remote"]);
        }
        let branches = self.local_branches(ReadMode::Cached).await?;
        Ok(paginate(&branches, page, limit))
    }

    pub async fn list_remote(
        &self,
        page: usize,
        limit: usize,
        skip_refresh: bool,
    ) -> Result<Page<RemoteBranchRef>, BranchError> {
        if skip_refresh {
            self.invalidate(&["remote"]);
        }
        let branches = self.remote_branches(ReadMode::Cached).await?;
        Ok(paginate(&branches, page, limit))
    }

    pub async fn search_remote(
        &self,
        query: &str,
        page: usize,
        limit: usize,
    ) -> Result<Page<RemoteBranchRef>, BranchError> {
        let branches = self.remote_branches(ReadMode::Cached).await?;
        Ok(paginate(&search(&branches, query), page, limit))
    }

    /// Porcelain status of the working tree.
    pub async fn status(&self) -> Result<String, BranchError> {
        let result = self.refs.status(ReadMode::Cached).await?;
        Ok(result.stdout)
    }

    // ─── Mutations ───────────────────────────────────────────────────────────

    /// Switch to `branch`, creating a tracking branch if it only exists remotely.
    #[instrument(skip(self))]
    pub async fn checkout(&self, branch: &str) -> Result<MutationOutcome, BranchError> {
        let branch = validate_branch_name(branch)?;
        self.serializer
            .run("checkout", self.checkout_locked(branch))
            .await
    }

    async fn checkout_locked(&self, branch: &str) -> Result<MutationOutcome, BranchError> {
        self.invalidate(&["branches"]);

        // Existence is re-read here: an earlier listing may be stale by now.
        let result = if self.refs.local_branch_exists(branch).await {
            self.runner().run(&["checkout", branch]).await
        } else if self.refs.remote_branch_exists(branch).await {
            let start = format!("{}/{branch}", self.refs.remote());
            self.runner()
                .run(&["checkout", "-b", branch, "--track", start.as_str()])
                .await
        } else {
            return Err(BranchError::NotFound(format!(
                "Branch '{branch}' not found locally or remotely"
            )));
        };

        self.invalidate(&["branches", "status"]);

        if result.success {
            info!(%branch, "Switched branch");
            Ok(MutationOutcome {
                message: format!("Switched to branch '{branch}'"),
                result,
            })
        } else {
            Err(BranchError::Rejected {
                message: format!(
                    "Failed to switch to branch '{branch}': {}",
                    result.stderr.trim()
                ),
                result,
            })
        }
    }

    /// Delete a local branch, forcing the delete if git refuses the safe one.
    #[instrument(skip(self))]
    pub async fn delete_branch(&self, branch: &str) -> Result<MutationOutcome, BranchError> {
        let branch = validate_branch_name(branch)?;
        self.serializer
            .run("delete-branch", self.delete_branch_locked(branch))
            .await
    }

    async fn delete_branch_locked(&self, branch: &str) -> Result<MutationOutcome, BranchError> {
        self.invalidate(&["branches"]);

        let current = self.refs.current_branch(ReadMode::Fresh).await?;
        if current.as_deref() == Some(branch) {
            return Err(BranchError::DeleteCurrent);
        }
        if !self.refs.local_branch_exists(branch).await {
            return Err(BranchError::NotFound(format!(
                "Branch '{branch}' not found locally"
            )));
        }

        let outcome = self.delete_one(branch).await;
        self.invalidate(&["branches"]);
        outcome
    }

    /// `branch -d`, then `branch -D` if that was refused. Caller holds the gate.
    async fn delete_one(&self, branch: &str) -> Result<MutationOutcome, BranchError> {
        let safe = self.runner().run(&["branch", "-d", branch]).await;
        if safe.success {
            return Ok(MutationOutcome {
                message: format!("Deleted branch {branch}"),
                result: safe,
            });
        }

        debug!(%branch, stderr = %safe.stderr.trim(), "Safe delete refused, forcing");
        let forced = self.runner().run(&["branch", "-D", branch]).await;
        if forced.success {
            Ok(MutationOutcome {
                message: format!("Force deleted branch {branch}"),
                result: forced,
            })
        } else {
            let message = match forced.stderr.trim() {
                "" => format!("Failed to delete branch {branch}"),
                stderr => stderr.to_string(),
            };
            Err(BranchError::Rejected {
                message,
                result: forced,
            })
        }
    }

    /// Pull the checked-out branch from its upstream.
    #[instrument(skip(self))]
    pub async fn pull(&self) -> Result<MutationOutcome, BranchError> {
        self.serializer
            .run("pull", async {
                let result = self.runner().run(&["pull"]).await;
                self.invalidate(&["branches", "remote", "status"]);

                if result.success {
                    let message = match result.stdout.trim() {
                        "" => "Already up to date.".to_string(),
                        out => out.to_string(),
                    };
                    Ok(MutationOutcome { message, result })
                } else {
                    let message = match result.stderr.trim() {
                        "" => "Pull failed".to_string(),
                        err => err.to_string(),
                    };
                    Err(BranchError::Rejected { message, result })
                }
            })
            .await
    }

    /// Checkout and pull every local branch that has a live upstream, then
    /// return to the branch (or commit) that was checked out before.
    #[instrument(skip(self))]
    pub async fn update_all(&self) -> Result<UpdateReport, BranchError> {
        self.serializer
            .run("update-all-branches", self.update_all_locked())
            .await
    }

    async fn update_all_locked(&self) -> Result<UpdateReport, BranchError> {
        self.invalidate(&["branches"]);

        let branches = self.local_branches(ReadMode::Fresh).await?;
        let original = match branches.iter().find(|b| b.is_current) {
            Some(current) => current.name.clone(),
            None => self.refs.head_commit().await?,
        };

        let targets: Vec<String> = branches
            .into_iter()
            .filter(|b| b.has_remote)
            .map(|b| b.name)
            .collect();
        info!(count = targets.len(), "Updating branches with upstreams");

        let mut results = Vec::with_capacity(targets.len());
        for branch in targets {
            let checkout = self.runner().run(&["checkout", branch.as_str()]).await;
            if !checkout.success {
                warn!(%branch, "Checkout failed, skipping pull");
                results.push(BranchUpdate {
                    output: format!("Failed to checkout branch: {}", checkout.output()),
                    branch,
                    success: false,
                });
                continue;
            }

            let pull = self.runner().run(&["pull"]).await;
            let output = match pull.output() {
                "" => "No output".to_string(),
                out => out.to_string(),
            };
            results.push(BranchUpdate {
                branch,
                success: pull.success,
                output,
            });
        }

        let restored = if results.is_empty() {
            true
        } else {
            let restore = self.runner().run(&["checkout", original.as_str()]).await;
            if !restore.success {
                warn!(%original, stderr = %restore.stderr.trim(), "Failed to restore original branch");
            }
            restore.success
        };

        self.invalidate(&["branches", "remote", "status"]);
        Ok(UpdateReport { results, restored })
    }

    /// Delete local branches whose upstream is missing or gone, except the
    /// current branch and protected branches. One failure never stops the rest.
    #[instrument(skip(self))]
    pub async fn cleanup(&self) -> Result<CleanupReport, BranchError> {
        self.serializer.run("cleanup", self.cleanup_locked()).await
    }

    async fn cleanup_locked(&self) -> Result<CleanupReport, BranchError> {
        self.invalidate(&["branches"]);

        let branches = self.local_branches(ReadMode::Fresh).await?;
        let candidates: Vec<String> = branches
            .into_iter()
            .filter(|b| !b.has_remote && !b.is_current && !self.reconciler.is_protected(&b.name))
            .map(|b| b.name)
            .collect();

        let mut report = CleanupReport::default();
        for branch in candidates {
            match self.delete_one(&branch).await {
                Ok(outcome) => report.deleted.push(BranchUpdate {
                    branch,
                    success: true,
                    output: outcome.message,
                }),
                Err(err) => {
                    warn!(%branch, error = %err, "Failed to delete deprecated branch");
                    report.failed.push(BranchUpdate {
                        branch,
                        success: false,
                        output: err.to_string(),
                    });
                }
            }
        }

        self.invalidate(&["branches"]);
        info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "Cleanup finished"
        );
        Ok(report)
    }

    // ─── Background refresh ──────────────────────────────────────────────────

    /// Claim the next background refresh slot if the interval has elapsed.
    fn claim_background_refresh(&self) -> bool {
        let Some(interval) = self.background_interval else {
            return false;
        };
        let mut last = self
            .last_background_update
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let now = Instant::now();
        match *last {
            Some(at) if now.duration_since(at) < interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Start a background fetch if one is due. Returns without waiting for it.
    pub fn trigger_background_refresh(self: &Arc<Self>) -> bool {
        if !self.claim_background_refresh() {
            return false;
        }
        let service = Arc::clone(self);
        tokio::spawn(async move {
            service.refresh_remote().await;
        });
        true
    }

    /// Fetch from the remote with pruning and drop cached ref listings.
    ///
    /// Runs through the serializer since fetch rewrites refs. Failures are
    /// logged only.
    pub async fn refresh_remote(&self) -> bool {
        let remote = self.refs.remote().to_string();
        self.serializer
            .run("fetch", async {
                let result = self
                    .runner()
                    .run(&["fetch", remote.as_str(), "--prune", "--quiet"])
                    .await;
                if result.success {
                    self.invalidate(&["branches", "remote"]);
                    info!(%remote, "Background repository update completed");
                } else {
                    warn!(%remote, stderr = %result.stderr.trim(), "Background repository update failed");
                }
                result.success
            })
            .await
    }

    /// Run the startup refresh after `delay`, claiming the interval slot.
    pub async fn initial_refresh(self: Arc<Self>, delay: Duration) {
        tokio::time::sleep(delay).await;
        if self.claim_background_refresh() {
            self.refresh_remote().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{FakeEvent, FakeGit};

    fn settings() -> ServiceSettings {
        ServiceSettings {
            repo_path: PathBuf::from("/repo"),
            remote: "origin".to_string(),
            protected: vec!["main".into(), "master".into(), "develop".into()],
            cache_ttl: Duration::from_secs(300),
            status_ttl: Duration::from_secs(10),
            background_interval: Some(Duration::from_secs(900)),
        }
    }

    fn service(fake: FakeGit) -> (Arc<FakeGit>, Arc<BranchService>) {
        let fake = Arc::new(fake);
        let service = Arc::new(BranchService::new(fake.clone(), settings()));
        (fake, service)
    }

    fn names(branches: &[BranchRef]) -> Vec<&str> {
        branches.iter().map(|b| b.name.as_str()).collect()
    }

    /// Answers from the repository state at call time but returns late, like
    /// a slow `for-each-ref` racing a mutation.
    struct LaggingRefs {
        inner: Arc<FakeGit>,
        lag: Duration,
    }

    #[async_trait::async_trait]
    impl GitExecutor for LaggingRefs {
        async fn exec(&self, args: &[&str], cwd: &std::path::Path) -> CommandResult {
            let result = self.inner.exec(args, cwd).await;
            if args.first() == Some(&"for-each-ref") && args.last() == Some(&"refs/heads/") {
                tokio::time::sleep(self.lag).await;
            }
            result
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_in_flight_during_delete_is_not_cached() {
        let fake = Arc::new(FakeGit::new("main").with_local("feature/a"));
        let executor = LaggingRefs {
            inner: fake.clone(),
            lag: Duration::from_millis(100),
        };
        let service = Arc::new(BranchService::new(Arc::new(executor), settings()));

        let reader = Arc::clone(&service);
        let in_flight = tokio::spawn(async move { reader.list_local(0, 10, false).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        service.delete_branch("feature/a").await.unwrap();
        in_flight.await.unwrap().unwrap();

        tokio::time::sleep(Duration::from_secs(120)).await;
        let page = service.list_local(0, 10, false).await.unwrap();

        assert_eq!(fake.local_branches(), vec!["main"]);
        assert_eq!(names(&page.items), vec!["main"]);
    }

    #[tokio::test]
    async fn test_list_local_annotates_and_sorts() {
        let (_fake, service) = service(
            FakeGit::new("feature/a")
                .with_tracked("main")
                .with_tracked("feature/b")
                .with_stale_upstream("feature/gone"),
        );

        let page = service.list_local(0, 10, false).await.unwrap();

        assert_eq!(
            names(&page.items),
            vec!["main", "feature/a", "feature/b", "feature/gone"]
        );
        let by_name = |n: &str| page.items.iter().find(|b| b.name == n).unwrap().clone();
        assert!(by_name("feature/a").is_current);
        assert!(by_name("main").has_remote);
        assert!(by_name("feature/b").has_remote);
        assert!(!by_name("feature/gone").has_remote);
        assert!(!by_name("feature/a").has_remote);
        assert_eq!(page.pagination.total, 4);
    }

    #[tokio::test]
    async fn test_list_local_is_cached_until_skip_refresh() {
        let (fake, service) = service(FakeGit::new("main"));

        service.list_local(0, 10, false).await.unwrap();
        let after_first = fake.invocations().len();
        service.list_local(0, 10, false).await.unwrap();
        assert_eq!(fake.invocations().len(), after_first);

        service.list_local(0, 10, true).await.unwrap();
        assert_eq!(fake.invocations().len(), after_first * 2);
    }

    #[tokio::test]
    async fn test_remote_listing_and_search() {
        let (_fake, service) = service(
            FakeGit::new("main")
                .with_tracked("main")
                .with_remote("Feature/X")
                .with_remote("release/1.0"),
        );

        let all = service.list_remote(0, 10, false).await.unwrap();
        let all_names: Vec<&str> = all.items.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(all_names, vec!["Feature/X", "main", "release/1.0"]);

        let found = service.search_remote("feature", 0, 10).await.unwrap();
        assert_eq!(found.items.len(), 1);
        assert_eq!(found.items[0].name, "Feature/X");

        let everything = service.search_remote("", 0, 2).await.unwrap();
        assert_eq!(everything.pagination.total, 3);
        assert!(everything.pagination.has_more);
    }

    #[tokio::test]
    async fn test_checkout_remote_only_branch_creates_tracking_branch() {
        let (fake, service) = service(
            FakeGit::new("main")
                .with_tracked("main")
                .with_remote("release/1.0"),
        );
        // Prime the cache so the listing after checkout proves invalidation.
        service.list_local(0, 10, false).await.unwrap();

        let outcome = service.checkout("release/1.0").await.unwrap();

        assert_eq!(outcome.message, "Switched to branch 'release/1.0'");
        assert!(fake
            .invocations()
            .contains(&"checkout -b release/1.0 --track origin/release/1.0".to_string()));

        let page = service.list_local(0, 10, false).await.unwrap();
        let created = page.items.iter().find(|b| b.name == "release/1.0").unwrap();
        assert!(created.is_current);
        assert!(created.has_remote);
        assert_eq!(page.items.iter().filter(|b| b.is_current).count(), 1);
    }

    #[tokio::test]
    async fn test_checkout_unknown_branch_is_not_found() {
        let (_fake, service) = service(FakeGit::new("main"));

        let err = service.checkout("nope").await.unwrap_err();

        assert!(matches!(err, BranchError::NotFound(_)));
        assert_eq!(err.to_string(), "Branch 'nope' not found locally or remotely");
    }

    #[tokio::test]
    async fn test_checkout_rejects_option_like_names() {
        let (fake, service) = service(FakeGit::new("main"));

        let err = service.checkout("--orphan").await.unwrap_err();

        assert!(matches!(err, BranchError::InvalidBranch(_)));
        assert!(fake.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_failure_carries_git_output() {
        let (fake, service) = service(FakeGit::new("main").with_local("dirty"));
        fake.fail("checkout dirty", "error: Your local changes would be overwritten");

        let err = service.checkout("dirty").await.unwrap_err();

        match err {
            BranchError::Rejected { message, result } => {
                assert!(message.starts_with("Failed to switch to branch 'dirty'"));
                assert!(result.stderr.contains("local changes"));
                assert_eq!(result.exit_code, 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_current_branch_is_refused() {
        let (fake, service) = service(FakeGit::new("main").with_local("feature/a"));

        let err = service.delete_branch("main").await.unwrap_err();

        assert!(matches!(err, BranchError::DeleteCurrent));
        assert_eq!(fake.local_branches(), vec!["feature/a", "main"]);
    }

    #[tokio::test]
    async fn test_delete_falls_back_to_force() {
        let (fake, service) = service(
            FakeGit::new("main")
                .with_local("wip")
                .with_unmerged("wip"),
        );

        let outcome = service.delete_branch("wip").await.unwrap();

        assert_eq!(outcome.message, "Force deleted branch wip");
        assert_eq!(fake.local_branches(), vec!["main"]);
    }

    #[tokio::test]
    async fn test_delete_missing_branch_is_not_found() {
        let (_fake, service) = service(FakeGit::new("main"));
        let err = service.delete_branch("ghost").await.unwrap_err();
        assert!(matches!(err, BranchError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_pull_reports_git_output() {
        let (_fake, service) = service(FakeGit::new("main").with_tracked("main"));

        let outcome = service.pull().await.unwrap();

        assert_eq!(outcome.message, "Already up to date.");
    }

    #[tokio::test]
    async fn test_cleanup_deletes_only_branches_without_live_remote() {
        let (fake, service) = service(
            FakeGit::new("main")
                .with_tracked("main")
                .with_local("feature/a")
                .with_tracked("feature/b"),
        );

        let report = service.cleanup().await.unwrap();

        let deleted: Vec<&str> = report.deleted.iter().map(|d| d.branch.as_str()).collect();
        assert_eq!(deleted, vec!["feature/a"]);
        assert!(report.failed.is_empty());
        assert_eq!(fake.local_branches(), vec!["feature/b", "main"]);
    }

    #[tokio::test]
    async fn test_cleanup_skips_current_and_protected_and_continues_after_failure() {
        let (fake, service) = service(
            FakeGit::new("current-work")
                .with_local("develop")
                .with_local("old-1")
                .with_local("old-2")
                .with_stale_upstream("old-3"),
        );
        fake.fail("branch -d old-1", "error: locked");
        fake.fail("branch -D old-1", "error: locked");

        let report = service.cleanup().await.unwrap();

        let deleted: Vec<&str> = report.deleted.iter().map(|d| d.branch.as_str()).collect();
        assert_eq!(deleted, vec!["old-2", "old-3"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].branch, "old-1");
        assert_eq!(fake.local_branches(), vec!["current-work", "develop", "old-1"]);
    }

    #[tokio::test]
    async fn test_update_all_restores_original_branch() {
        let (fake, service) = service(
            FakeGit::new("feature/local")
                .with_tracked("main")
                .with_tracked("develop")
                .with_stale_upstream("feature/gone"),
        );

        let report = service.update_all().await.unwrap();

        let updated: Vec<&str> = report.results.iter().map(|r| r.branch.as_str()).collect();
        assert_eq!(updated, vec!["main", "develop"]);
        assert!(report.overall_success());
        assert_eq!(fake.head().as_deref(), Some("feature/local"));
        assert_eq!(
            fake.invocations().last().map(String::as_str),
            Some("checkout feature/local")
        );
    }

    #[tokio::test]
    async fn test_update_all_skips_pull_when_checkout_fails() {
        let (fake, service) = service(
            FakeGit::new("main")
                .with_tracked("main")
                .with_tracked("develop"),
        );
        fake.fail("checkout develop", "error: untracked files would be overwritten");

        let report = service.update_all().await.unwrap();

        let develop = report.results.iter().find(|r| r.branch == "develop").unwrap();
        assert!(!develop.success);
        assert!(develop.output.starts_with("Failed to checkout branch:"));
        assert!(!report.overall_success());

        // Exactly one pull ran: the one for main.
        let pulls = fake.invocations().iter().filter(|c| *c == "pull").count();
        assert_eq!(pulls, 1);
        assert_eq!(fake.head().as_deref(), Some("main"));
    }

    #[tokio::test]
    async fn test_update_all_from_detached_head_restores_commit() {
        let fake = FakeGit::new("main").with_tracked("main");
        let (fake, service) = service(fake);
        // Detach by checking out the commit directly.
        fake.exec(
            &["checkout", "0123456789abcdef0123456789abcdef01234567"],
            std::path::Path::new("/"),
        )
        .await;

        let report = service.update_all().await.unwrap();

        assert!(report.restored);
        assert_eq!(fake.head(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_mutations_never_interleave() {
        let (fake, service) = service(
            FakeGit::new("main")
                .with_tracked("main")
                .with_tracked("develop")
                .with_local("feature/a"),
        );
        fake.delay("checkout", Duration::from_millis(50));
        fake.delay("pull", Duration::from_millis(30));

        let a = {
            let service = service.clone();
            tokio::spawn(async move { service.update_all().await })
        };
        let b = {
            let service = service.clone();
            tokio::spawn(async move { service.checkout("feature/a").await })
        };
        let c = {
            let service = service.clone();
            tokio::spawn(async move { service.pull().await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();
        c.await.unwrap().unwrap();

        // Every git call must finish before the next one starts.
        let events = fake.events();
        for pair in events.chunks(2) {
            match pair {
                [FakeEvent::Start(s), FakeEvent::Finish(f)] => assert_eq!(s, f),
                other => panic!("interleaved git calls: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_status_is_cached_briefly() {
        let (fake, service) = service(FakeGit::new("main").with_status(" M src/lib.rs\n"));

        assert_eq!(service.status().await.unwrap(), " M src/lib.rs\n");
        service.status().await.unwrap();

        let status_calls = fake
            .invocations()
            .iter()
            .filter(|c| c.starts_with("status"))
            .count();
        assert_eq!(status_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_refresh_runs_at_most_once_per_interval() {
        let (fake, service) = service(FakeGit::new("main"));

        assert!(service.trigger_background_refresh());
        assert!(!service.trigger_background_refresh());
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(901)).await;
        assert!(service.trigger_background_refresh());
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let fetches = fake
            .invocations()
            .iter()
            .filter(|c| c.starts_with("fetch origin --prune"))
            .count();
        assert_eq!(fetches, 2);
    }

    #[tokio::test]
    async fn test_refresh_remote_invalidates_listings() {
        let (fake, service) = service(FakeGit::new("main").with_tracked("main"));
        service.list_local(0, 10, false).await.unwrap();
        assert!(!service.cache().is_empty());

        fake.remove_remote("main");
        assert!(service.refresh_remote().await);

        let page = service.list_local(0, 10, false).await.unwrap();
        assert!(!page.items[0].has_remote);
    }
}

//! In-memory stand-in for the git binary.
//!
//! Understands exactly the invocations this crate issues and keeps a small
//! repository model (local branches with upstreams, remote branches, HEAD)
//! so service and HTTP tests can assert on end-to-end behaviour without a
//! real repository. Every call is recorded with start/finish markers.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::git::runner::{CommandResult, GitExecutor};

#[derive(Debug, Default)]
struct FakeRepo {
    /// Local branch name -> configured upstream (full ref) if any.
    local: BTreeMap<String, Option<String>>,
    /// Branch names present under `refs/remotes/<remote>/`.
    remote: BTreeSet<String>,
    /// Remote name used for upstream refs.
    remote_name: String,
    head: Option<String>,
    unmerged: HashSet<String>,
    status: String,
}

/// Recorded invocation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    Start(String),
    Finish(String),
}

/// Scriptable fake git repository.
#[derive(Debug)]
pub struct FakeGit {
    repo: Mutex<FakeRepo>,
    events: Mutex<Vec<FakeEvent>>,
    delays: Mutex<HashMap<String, Duration>>,
    failures: Mutex<HashMap<String, String>>,
}

impl FakeGit {
    /// A repository with a single local branch `head` checked out and no remote.
    pub fn new(head: &str) -> Self {
        let mut local = BTreeMap::new();
        local.insert(head.to_string(), None);
        Self {
            repo: Mutex::new(FakeRepo {
                local,
                remote: BTreeSet::new(),
                remote_name: "origin".to_string(),
                head: Some(head.to_string()),
                unmerged: HashSet::new(),
                status: String::new(),
            }),
            events: Mutex::new(Vec::new()),
            delays: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    fn repo(&self) -> MutexGuard<'_, FakeRepo> {
        self.repo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a local branch without an upstream.
    pub fn with_local(self, name: &str) -> Self {
        self.repo().local.insert(name.to_string(), None);
        self
    }

    /// Add a branch on the remote and a local branch tracking it.
    pub fn with_tracked(self, name: &str) -> Self {
        {
            let mut repo = self.repo();
            let upstream = format!("refs/remotes/{}/{name}", repo.remote_name);
            repo.local.insert(name.to_string(), Some(upstream));
            repo.remote.insert(name.to_string());
        }
        self
    }

    /// Add a local branch whose configured upstream no longer exists remotely.
    pub fn with_stale_upstream(self, name: &str) -> Self {
        {
            let mut repo = self.repo();
            let upstream = format!("refs/remotes/{}/{name}", repo.remote_name);
            repo.local.insert(name.to_string(), Some(upstream));
        }
        self
    }

    /// Add a branch that exists only on the remote.
    pub fn with_remote(self, name: &str) -> Self {
        self.repo().remote.insert(name.to_string());
        self
    }

    /// Mark a branch as not fully merged, so `branch -d` refuses it.
    pub fn with_unmerged(self, name: &str) -> Self {
        self.repo().unmerged.insert(name.to_string());
        self
    }

    pub fn with_status(self, status: &str) -> Self {
        self.repo().status = status.to_string();
        self
    }

    /// Delay every invocation whose joined args start with `prefix`.
    pub fn delay(&self, prefix: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(prefix.to_string(), delay);
    }

    /// Fail every invocation whose joined args start with `prefix`.
    pub fn fail(&self, prefix: &str, stderr: &str) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(prefix.to_string(), stderr.to_string());
    }

    pub fn local_branches(&self) -> Vec<String> {
        self.repo().local.keys().cloned().collect()
    }

    pub fn head(&self) -> Option<String> {
        self.repo().head.clone()
    }

    /// Drop a branch from the remote side only (simulates someone else deleting it).
    pub fn remove_remote(&self, name: &str) {
        self.repo().remote.remove(name);
    }

    pub fn events(&self) -> Vec<FakeEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Joined command lines in the order they started.
    pub fn invocations(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                FakeEvent::Start(cmd) => Some(cmd),
                FakeEvent::Finish(_) => None,
            })
            .collect()
    }

    fn matching<T: Clone>(map: &Mutex<HashMap<String, T>>, cmd: &str) -> Option<T> {
        map.lock().unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(prefix, _)| cmd.starts_with(prefix.as_str()))
            .map(|(_, value)| value.clone())
    }

    fn handle(&self, args: &[&str]) -> CommandResult {
        let mut repo = self.repo();
        let remote = repo.remote_name.clone();
        match args {
            ["for-each-ref", format, "refs/heads/"] if format.contains("%(upstream)") => {
                let out: String = repo
                    .local
                    .iter()
                    .map(|(name, upstream)| {
                        format!("refs/heads/{name}\0{}\n", upstream.as_deref().unwrap_or(""))
                    })
                    .collect();
                CommandResult::ok(out)
            }
            ["for-each-ref", _, namespace] if namespace.starts_with("refs/remotes/") => {
                let mut out = String::new();
                if !repo.remote.is_empty() {
                    out.push_str(&format!(
                        "refs/remotes/{remote}/HEAD\0refs/remotes/{remote}/main\n"
                    ));
                }
                for name in &repo.remote {
                    out.push_str(&format!("refs/remotes/{remote}/{name}\0\n"));
                }
                CommandResult::ok(out)
            }
            ["symbolic-ref", "--quiet", "--short", "HEAD"] => match &repo.head {
                Some(head) => CommandResult::ok(format!("{head}\n")),
                None => CommandResult::failed("", 1),
            },
            ["rev-parse", "HEAD"] => CommandResult::ok("0123456789abcdef0123456789abcdef01234567\n"),
            ["show-ref", "--verify", "--quiet", refname] => {
                let exists = if let Some(name) = refname.strip_prefix("refs/heads/") {
                    repo.local.contains_key(name)
                } else if let Some(name) = refname
                    .strip_prefix("refs/remotes/")
                    .and_then(|rest| rest.strip_prefix(&format!("{remote}/")))
                {
                    repo.remote.contains(name)
                } else {
                    false
                };
                if exists {
                    CommandResult::ok("")
                } else {
                    CommandResult::failed("", 1)
                }
            }
            ["checkout", "-b", name, "--track", start] => {
                let remote_branch = start.strip_prefix(&format!("{remote}/")).unwrap_or(*start);
                if repo.local.contains_key(*name) {
                    return CommandResult::failed(
                        format!("fatal: a branch named '{name}' already exists\n"),
                        128,
                    );
                }
                if !repo.remote.contains(remote_branch) {
                    return CommandResult::failed(
                        format!("fatal: '{start}' is not a commit\n"),
                        128,
                    );
                }
                let upstream = format!("refs/remotes/{remote}/{remote_branch}");
                repo.local.insert((*name).to_string(), Some(upstream));
                repo.head = Some((*name).to_string());
                CommandResult {
                    success: true,
                    stdout: format!("branch '{name}' set up to track '{start}'.\n"),
                    stderr: format!("Switched to a new branch '{name}'\n"),
                    exit_code: 0,
                }
            }
            ["checkout", target] => {
                if repo.local.contains_key(*target) {
                    repo.head = Some((*target).to_string());
                    CommandResult {
                        success: true,
                        stdout: String::new(),
                        stderr: format!("Switched to branch '{target}'\n"),
                        exit_code: 0,
                    }
                } else if target.len() == 40 && target.chars().all(|c| c.is_ascii_hexdigit()) {
                    repo.head = None;
                    CommandResult::ok("")
                } else {
                    CommandResult::failed(
                        format!("error: pathspec '{target}' did not match any file(s) known to git\n"),
                        1,
                    )
                }
            }
            ["branch", flag @ ("-d" | "-D"), name] => {
                if repo.head.as_deref() == Some(*name) {
                    return CommandResult::failed(
                        format!("error: cannot delete branch '{name}' checked out\n"),
                        1,
                    );
                }
                if !repo.local.contains_key(*name) {
                    return CommandResult::failed(
                        format!("error: branch '{name}' not found\n"),
                        1,
                    );
                }
                if *flag == "-d" && repo.unmerged.contains(*name) {
                    return CommandResult::failed(
                        format!("error: the branch '{name}' is not fully merged\n"),
                        1,
                    );
                }
                repo.local.remove(*name);
                CommandResult::ok(format!("Deleted branch {name} (was 0123456).\n"))
            }
            ["pull", ..] => match &repo.head {
                Some(_) => CommandResult::ok("Already up to date.\n"),
                None => CommandResult::failed(
                    "You are not currently on a branch.\n",
                    1,
                ),
            },
            ["fetch", ..] => CommandResult::ok(""),
            ["status", "--porcelain"] => CommandResult::ok(repo.status.clone()),
            _ => CommandResult::failed(
                format!("fake git: unsupported invocation {args:?}\n"),
                129,
            ),
        }
    }
}

#[async_trait]
impl GitExecutor for FakeGit {
    async fn exec(&self, args: &[&str], _cwd: &Path) -> CommandResult {
        let cmd = args.join(" ");
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(FakeEvent::Start(cmd.clone()));

        if let Some(delay) = Self::matching(&self.delays, &cmd) {
            tokio::time::sleep(delay).await;
        }

        let result = match Self::matching(&self.failures, &cmd) {
            Some(stderr) => CommandResult::failed(stderr, 1),
            None => self.handle(args),
        };

        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(FakeEvent::Finish(cmd));
        result
    }
}

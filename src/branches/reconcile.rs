//! Combines raw ref listings into the annotated branch views.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::git::{LocalRef, RemoteRef};

/// A local branch as presented to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchRef {
    pub name: String,
    pub is_current: bool,
    /// Upstream configured *and* still advertised by the remote.
    pub has_remote: bool,
}

/// A branch on the remote, without the remote-name prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBranchRef {
    pub name: String,
}

/// Anything that can be searched by name.
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for BranchRef {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for RemoteBranchRef {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Annotates local branches and applies the protected-first sort order.
#[derive(Debug, Clone)]
pub struct Reconciler {
    remote: String,
    protected: Vec<String>,
}

impl Reconciler {
    /// `protected` is in priority order; those branches sort before everything else.
    pub fn new(remote: impl Into<String>, protected: Vec<String>) -> Self {
        Self {
            remote: remote.into(),
            protected,
        }
    }

    pub fn is_protected(&self, name: &str) -> bool {
        self.protected.iter().any(|p| p == name)
    }

    /// Strip `refs/remotes/<remote>/` from an upstream ref.
    ///
    /// Upstreams on another remote or on a local branch yield `None`.
    fn upstream_branch<'a>(&self, upstream: &'a str) -> Option<&'a str> {
        upstream
            .strip_prefix("refs/remotes/")?
            .strip_prefix(self.remote.as_str())?
            .strip_prefix('/')
    }

    /// Whether `name`'s configured upstream is present in `remote_set`.
    pub fn has_remote(
        &self,
        name: &str,
        tracking: &HashMap<String, String>,
        remote_set: &HashSet<String>,
    ) -> bool {
        tracking
            .get(name)
            .and_then(|upstream| self.upstream_branch(upstream))
            .is_some_and(|branch| remote_set.contains(branch))
    }

    /// Build the local branch view.
    pub fn reconcile_local(
        &self,
        local_refs: &[String],
        tracking: &HashMap<String, String>,
        remote_set: &HashSet<String>,
        current: Option<&str>,
    ) -> Vec<BranchRef> {
        let mut branches: Vec<BranchRef> = local_refs
            .iter()
            .map(|name| BranchRef {
                name: name.clone(),
                is_current: current == Some(name.as_str()),
                has_remote: self.has_remote(name, tracking, remote_set),
            })
            .collect();
        branches.sort_by(|a, b| self.compare(&a.name, &b.name));
        branches
    }

    /// Convenience over [`reconcile_local`](Self::reconcile_local) for parsed refs.
    pub fn reconcile_refs(
        &self,
        local: &[LocalRef],
        remote: &[RemoteRef],
        current: Option<&str>,
    ) -> Vec<BranchRef> {
        let names: Vec<String> = local.iter().map(|r| r.name.clone()).collect();
        let tracking: HashMap<String, String> = local
            .iter()
            .filter_map(|r| Some((r.name.clone(), r.upstream.clone()?)))
            .collect();
        let remote_set: HashSet<String> = self
            .reconcile_remote(remote)
            .into_iter()
            .map(|r| r.name)
            .collect();
        self.reconcile_local(&names, &tracking, &remote_set, current)
    }

    /// Drop symbolic refs (`origin/HEAD`) and strip the remote prefix.
    pub fn reconcile_remote(&self, remote_refs: &[RemoteRef]) -> Vec<RemoteBranchRef> {
        remote_refs
            .iter()
            .filter(|r| !r.symbolic)
            .filter_map(|r| {
                let name = r
                    .name
                    .strip_prefix(self.remote.as_str())?
                    .strip_prefix('/')?;
                (name != "HEAD").then(|| RemoteBranchRef {
                    name: name.to_string(),
                })
            })
            .collect()
    }

    /// Protected branches first in priority order, then alphabetical.
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        let rank = |name: &str| self.protected.iter().position(|p| p == name);
        match (rank(a), rank(b)) {
            (Some(ra), Some(rb)) => ra.cmp(&rb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        }
    }
}

//! Git access layer - command runner, typed ref reads and mutation gate.
//!
//! Nothing outside this module touches raw git output:
//! - [`GitRunner`] spawns git and memoizes results in the [`CacheStore`](crate::cache::CacheStore)
//! - [`GitRefs`] turns `for-each-ref` output into typed refs
//! - [`MutationSerializer`] keeps mutations from racing on git's lock files

mod fake;
mod refs;
mod runner;
mod serializer;

use thiserror::Error;

pub use fake::{FakeEvent, FakeGit};
pub use refs::{
    parse_local_refs, parse_remote_refs, GitRefs, LocalRef, ReadMode, RemoteRef,
    CURRENT_BRANCH_KEY, LOCAL_REFS_KEY, REMOTE_REFS_KEY, STATUS_KEY,
};
pub use runner::{CommandResult, GitExecutor, GitRunner, SystemGit, SPAWN_FAILURE_CODE};
pub use serializer::{MutationSerializer, SerializerState};

/// A git invocation that exited unsuccessfully.
#[derive(Debug, Error)]
#[error("git {command} failed: {}", .result.output())]
pub struct GitError {
    /// The joined argument list, e.g. `for-each-ref refs/heads/`.
    pub command: String,
    pub result: CommandResult,
}

impl GitError {
    pub fn new(args: &[&str], result: CommandResult) -> Self {
        Self {
            command: args.join(" "),
            result,
        }
    }
}

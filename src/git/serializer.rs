//! One-at-a-time execution of repository mutations.
//!
//! Git guards the index and refs with lock files and fails (rather than
//! waits) when a second writer shows up. Every mutating operation therefore
//! runs inside [`MutationSerializer::run`], which queues callers in arrival
//! order on a fair async mutex.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Serializer state as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializerState {
    Idle,
    Busy,
}

/// FIFO gate for mutations against a single repository.
///
/// `tokio::sync::Mutex` hands the lock to waiters in the order they called
/// `lock`, which gives the arrival-order guarantee.
#[derive(Debug, Default)]
pub struct MutationSerializer {
    gate: Mutex<()>,
    waiting: AtomicUsize,
}

impl MutationSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `op` once every earlier mutation has completed.
    ///
    /// The gate is held until `op` resolves, success or failure.
    #[instrument(skip_all, fields(op = label))]
    pub async fn run<F, T>(&self, label: &str, op: F) -> T
    where
        F: Future<Output = T>,
    {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let _guard = self.gate.lock().await;
        self.waiting.fetch_sub(1, Ordering::SeqCst);
        debug!("Mutation started");
        let out = op.await;
        debug!("Mutation finished");
        out
    }

    pub fn state(&self) -> SerializerState {
        match self.gate.try_lock() {
            Ok(_) => SerializerState::Idle,
            Err(_) => SerializerState::Busy,
        }
    }

    /// Number of mutations queued behind the running one.
    pub fn queued(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

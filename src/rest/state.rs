//! API state management for the REST server.

use std::sync::Arc;

use crate::branches::{BranchService, ServiceSettings};
use crate::config::Config;
use crate::git::{GitExecutor, SystemGit};

/// Shared state for the REST API
#[derive(Clone)]
pub struct ApiState {
    /// Branch service for the configured repository
    pub service: Arc<BranchService>,
    /// Application configuration
    pub config: Arc<Config>,
}

impl ApiState {
    /// Create API state that runs the system `git` binary
    pub fn new(config: Config) -> Self {
        Self::with_executor(config, Arc::new(SystemGit))
    }

    /// Create API state around a specific git executor
    pub fn with_executor(config: Config, executor: Arc<dyn GitExecutor>) -> Self {
        let service = BranchService::new(executor, ServiceSettings::from_config(&config));
        Self {
            service: Arc::new(service),
            config: Arc::new(config),
        }
    }
}

//! Branch views and operations built on top of the git layer.

mod error;
mod page;
mod reconcile;
mod service;

pub use error::{validate_branch_name, BranchError};
pub use page::{paginate, search, Page, Pagination, DEFAULT_LIMIT};
pub use reconcile::{BranchRef, Named, Reconciler, RemoteBranchRef};
pub use service::{
    BranchService, BranchUpdate, CleanupReport, MutationOutcome, ServiceSettings, UpdateReport,
};

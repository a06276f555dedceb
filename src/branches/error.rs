//! Errors raised by branch operations.

use thiserror::Error;

use crate::git::{CommandResult, GitError};

#[derive(Debug, Error)]
pub enum BranchError {
    /// The request did not name a branch, or named one git would misread.
    #[error("{0}")]
    InvalidBranch(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Cannot delete the current branch")]
    DeleteCurrent,

    /// A mutation ran and git rejected it. `message` is for display,
    /// `result` carries the raw output.
    #[error("{message}")]
    Rejected {
        message: String,
        result: CommandResult,
    },

    /// A read needed to carry out the request failed.
    #[error(transparent)]
    Git(#[from] GitError),
}

/// Reject names that are empty or that git would parse as something else.
///
/// Commands are never run through a shell, so this only guards against
/// option injection (`-D`), revision syntax and unprintable input.
pub fn validate_branch_name(name: &str) -> Result<&str, BranchError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(BranchError::InvalidBranch(
            "Branch name is required".to_string(),
        ));
    }
    if name.starts_with('-') {
        return Err(BranchError::InvalidBranch(format!(
            "Invalid branch name '{name}': must not start with '-'"
        )));
    }
    if name.contains("..")
        || name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\'))
    {
        return Err(BranchError::InvalidBranch(format!(
            "Invalid branch name '{name}'"
        )));
    }
    Ok(name)
}

//! Data Transfer Objects for the REST API.
//!
//! Field names are camelCase to match what the browser UI already expects.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::branches::{
    BranchRef, BranchUpdate, CleanupReport, MutationOutcome, Page, Pagination, RemoteBranchRef,
    UpdateReport, DEFAULT_LIMIT,
};
use crate::config::PublicConfig;

// =============================================================================
// Query and request bodies
// =============================================================================

/// Paging parameters for branch listings.
///
/// Values are kept as strings and parsed leniently: anything that is not a
/// number falls back to the default instead of rejecting the request.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Zero-indexed page (default 0)
    pub page: Option<String>,
    /// Page size (default 10; 0 also means 10)
    pub limit: Option<String>,
    /// `true` bypasses cached git output and skips the background fetch trigger
    pub skip_refresh: Option<String>,
}

impl ListQuery {
    pub fn page_and_limit(&self) -> (usize, usize) {
        page_and_limit(self.page.as_deref(), self.limit.as_deref())
    }

    /// Only the literal `true` enables it.
    pub fn skip_refresh(&self) -> bool {
        self.skip_refresh.as_deref() == Some("true")
    }
}

/// Search parameters for remote branches
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Case-insensitive substring to match
    pub q: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl SearchQuery {
    pub fn page_and_limit(&self) -> (usize, usize) {
        page_and_limit(self.page.as_deref(), self.limit.as_deref())
    }
}

/// Leading decimal digits of `raw`, ignoring surrounding whitespace.
fn parse_count(raw: &str) -> Option<usize> {
    let raw = raw.trim();
    let end = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    raw[..end].parse().ok()
}

/// Resolve page/limit defaults shared by every listing endpoint.
pub fn page_and_limit(page: Option<&str>, limit: Option<&str>) -> (usize, usize) {
    let limit = match limit.and_then(parse_count) {
        Some(0) | None => DEFAULT_LIMIT,
        Some(limit) => limit,
    };
    (page.and_then(parse_count).unwrap_or(0), limit)
}

/// Body of checkout and delete requests
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct BranchRequest {
    #[serde(default)]
    pub branch: Option<String>,
}

// =============================================================================
// Branch listings
// =============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResponse {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub has_more: bool,
}

impl From<Pagination> for PaginationResponse {
    fn from(p: Pagination) -> Self {
        Self {
            page: p.page,
            limit: p.limit,
            total: p.total,
            has_more: p.has_more,
        }
    }
}

/// A local branch
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BranchResponse {
    pub name: String,
    pub is_current: bool,
    pub has_remote: bool,
}

impl From<BranchRef> for BranchResponse {
    fn from(b: BranchRef) -> Self {
        Self {
            name: b.name,
            is_current: b.is_current,
            has_remote: b.has_remote,
        }
    }
}

/// A branch on the remote
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RemoteBranchResponse {
    pub name: String,
}

impl From<RemoteBranchRef> for RemoteBranchResponse {
    fn from(b: RemoteBranchRef) -> Self {
        Self { name: b.name }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BranchListResponse {
    pub branches: Vec<BranchResponse>,
    pub pagination: PaginationResponse,
}

impl From<Page<BranchRef>> for BranchListResponse {
    fn from(page: Page<BranchRef>) -> Self {
        Self {
            branches: page.items.into_iter().map(BranchResponse::from).collect(),
            pagination: page.pagination.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RemoteBranchListResponse {
    pub branches: Vec<RemoteBranchResponse>,
    pub pagination: PaginationResponse,
}

impl From<Page<RemoteBranchRef>> for RemoteBranchListResponse {
    fn from(page: Page<RemoteBranchRef>) -> Self {
        Self {
            branches: page
                .items
                .into_iter()
                .map(RemoteBranchResponse::from)
                .collect(),
            pagination: page.pagination.into(),
        }
    }
}

// =============================================================================
// Operation envelopes
// =============================================================================

/// Result of a single git operation. Also the body of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OperationResponse {
    pub success: bool,
    pub message: String,
    pub stdout: String,
    pub stderr: String,
    /// Exit code of the failed git process
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<i32>,
}

impl From<MutationOutcome> for OperationResponse {
    fn from(outcome: MutationOutcome) -> Self {
        Self {
            success: true,
            message: outcome.message,
            stdout: outcome.result.stdout,
            stderr: outcome.result.stderr,
            code: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BranchUpdateResponse {
    pub branch: String,
    pub success: bool,
    pub output: String,
}

impl From<BranchUpdate> for BranchUpdateResponse {
    fn from(u: BranchUpdate) -> Self {
        Self {
            branch: u.branch,
            success: u.success,
            output: u.output,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAllResponse {
    pub success: bool,
    pub overall_success: bool,
    pub results: Vec<BranchUpdateResponse>,
}

impl From<UpdateReport> for UpdateAllResponse {
    fn from(report: UpdateReport) -> Self {
        Self {
            success: true,
            overall_success: report.overall_success(),
            results: report
                .results
                .into_iter()
                .map(BranchUpdateResponse::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CleanupResponse {
    pub success: bool,
    pub message: String,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

impl From<CleanupReport> for CleanupResponse {
    fn from(report: CleanupReport) -> Self {
        if report.deleted.is_empty() && report.failed.is_empty() {
            let message = "No deprecated branches to remove.".to_string();
            return Self {
                success: true,
                stdout: message.clone(),
                message,
                stderr: String::new(),
                warnings: None,
            };
        }

        let message = if report.deleted.is_empty() {
            "No branches were removed.".to_string()
        } else {
            let mut lines: Vec<String> = report
                .deleted
                .iter()
                .map(|d| format!("Deleted branch {}", d.branch))
                .collect();
            lines.push(format!(
                "{} deprecated branches removed.",
                report.deleted.len()
            ));
            lines.join("\n")
        };

        let warnings: Vec<String> = report
            .failed
            .iter()
            .map(|f| format!("Failed to delete {}: {}", f.branch, f.output))
            .collect();

        Self {
            success: true,
            stdout: message.clone(),
            message,
            stderr: warnings.join("\n"),
            warnings: (!warnings.is_empty()).then_some(warnings),
        }
    }
}

// =============================================================================
// Service info
// =============================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub success: bool,
    /// `git status --porcelain` output
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Whether a mutation is running right now
    pub busy: bool,
    pub queued_mutations: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub header_link: String,
    pub api_base_url: String,
    pub base_path: String,
}

impl From<PublicConfig> for ConfigResponse {
    fn from(c: PublicConfig) -> Self {
        Self {
            header_link: c.header_link,
            api_base_url: c.api_base_url,
            base_path: c.base_path,
        }
    }
}

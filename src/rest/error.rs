//! API error types and responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::branches::BranchError;
use crate::git::SPAWN_FAILURE_CODE;
use crate::rest::dto::OperationResponse;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Missing or invalid parameter, or a request the repository state forbids
    BadRequest(String),
    /// Resource not found
    NotFound(String),
    /// Git ran and exited non-zero; output is passed through verbatim
    CommandFailed {
        message: String,
        stdout: String,
        stderr: String,
        code: i32,
    },
    /// Internal server error
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, plain(msg, None)),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, plain(msg, None)),
            ApiError::CommandFailed {
                message,
                stdout,
                stderr,
                code,
            } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                OperationResponse {
                    success: false,
                    message,
                    stdout,
                    stderr,
                    code: Some(code),
                },
            ),
            ApiError::InternalError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, plain(msg, Some(1)))
            }
        };

        (status, Json(body)).into_response()
    }
}

/// Error envelope whose stderr repeats the message.
fn plain(message: String, code: Option<i32>) -> OperationResponse {
    OperationResponse {
        success: false,
        stdout: String::new(),
        stderr: message.clone(),
        message,
        code,
    }
}

impl From<BranchError> for ApiError {
    fn from(err: BranchError) -> Self {
        match err {
            BranchError::InvalidBranch(msg) => ApiError::BadRequest(msg),
            BranchError::NotFound(msg) => ApiError::NotFound(msg),
            BranchError::DeleteCurrent => ApiError::BadRequest(err.to_string()),
            BranchError::Rejected { message, result } => ApiError::CommandFailed {
                message,
                stdout: result.stdout,
                stderr: result.stderr,
                code: result.exit_code,
            },
            BranchError::Git(git) if git.result.exit_code == SPAWN_FAILURE_CODE => {
                ApiError::InternalError(git.result.stderr)
            }
            BranchError::Git(git) => ApiError::CommandFailed {
                message: git.to_string(),
                stdout: git.result.stdout,
                stderr: git.result.stderr,
                code: git.result.exit_code,
            },
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{CommandResult, GitError};
    use http_body_util::BodyExt;

    async fn body_of(response: Response) -> OperationResponse {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_not_found_response() {
        let error = ApiError::NotFound("Branch 'x' not found locally or remotely".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let json = body_of(response).await;
        assert!(!json.success);
        assert_eq!(json.stderr, json.message);
        assert!(json.code.is_none());
    }

    #[tokio::test]
    async fn test_delete_current_is_bad_request() {
        let response = ApiError::from(BranchError::DeleteCurrent).into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(response).await.message, "Cannot delete the current branch");
    }

    #[tokio::test]
    async fn test_rejected_passes_git_output_through() {
        let result = CommandResult {
            success: false,
            stdout: "partial\n".to_string(),
            stderr: "fatal: Not possible to fast-forward\n".to_string(),
            exit_code: 128,
        };
        let error = ApiError::from(BranchError::Rejected {
            message: "Not possible to fast-forward".to_string(),
            result,
        });
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_of(response).await;
        assert_eq!(json.stdout, "partial\n");
        assert_eq!(json.stderr, "fatal: Not possible to fast-forward\n");
        assert_eq!(json.code, Some(128));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_internal_error() {
        let git = GitError::new(
            &["status"],
            CommandResult::failed("failed to execute git: No such file", SPAWN_FAILURE_CODE),
        );
        let response = ApiError::from(BranchError::Git(git)).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_of(response).await;
        assert!(json.message.contains("failed to execute git"));
        assert_eq!(json.code, Some(1));
    }
}

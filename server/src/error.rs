//! Mapping of submission failures onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use probe_common::protocol::StatusResponse;
use probe_common::SubmissionError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Handler error.  Only a missing payload is the client's fault; anything
/// else is reported as a generic 500 and logged in full.
#[derive(Debug)]
pub struct ApiError(SubmissionError);

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            SubmissionError::MissingPayload(_) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            err => {
                error!("Submission failed: {err}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(StatusResponse::new(message))).into_response()
    }
}

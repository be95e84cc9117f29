//! Errors raised while handling a single submission.

use crate::submission::SubmissionKind;

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// The request carried no payload for this kind (field absent, null or empty).
    #[error("No {} data received", .0.noun())]
    MissingPayload(SubmissionKind),

    #[error("Malformed data URI: no ',' separating metadata from payload")]
    MalformedDataUri,

    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type SubmissionResult<T> = Result<T, SubmissionError>;

//! Data-URI decoding (`data:<mime>;base64,<payload>`).

use base64::{engine::general_purpose, Engine as _};

use crate::error::{SubmissionError, SubmissionResult};

/// Split a data URI on its first comma and return the payload part.
///
/// The metadata prefix is not inspected; whatever precedes the comma is
/// discarded.
pub fn payload(uri: &str) -> SubmissionResult<&str> {
    uri.split_once(',')
        .map(|(_, data)| data)
        .ok_or(SubmissionError::MalformedDataUri)
}

/// Decode the base64 payload of a data URI into raw bytes.
///
/// ASCII whitespace anywhere in the payload (MIME line wrapping) is skipped.
pub fn decode(uri: &str) -> SubmissionResult<Vec<u8>> {
    let data: String = payload(uri)?
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    Ok(general_purpose::STANDARD.decode(data)?)
}

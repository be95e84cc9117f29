//! Submission naming and persistence.
//!
//! A submission lives only for the duration of a request; the file it
//! produces is the sole record.  File names encode the client address, the
//! second the request arrived and the kind of payload.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{SubmissionError, SubmissionResult};
use crate::media;

/// Timestamp layout embedded in every file name (second resolution).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// What a submission carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionKind {
    DeviceInfo,
    Image,
    Audio,
}

impl SubmissionKind {
    /// Word used in status messages, e.g. "No image data received".
    pub fn noun(&self) -> &'static str {
        match self {
            Self::DeviceInfo => "device info",
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }
}

/// One client request, ready to be written to disk.
#[derive(Debug, Clone)]
pub struct Submission {
    pub kind: SubmissionKind,
    pub client: String,
    pub timestamp: String,
}

impl Submission {
    /// A submission from `client` stamped with the current local time.
    pub fn new(kind: SubmissionKind, client: IpAddr) -> Self {
        Self::at(kind, client, Local::now().naive_local())
    }

    pub fn at(kind: SubmissionKind, client: IpAddr, when: NaiveDateTime) -> Self {
        Self {
            kind,
            client: client.to_canonical().to_string(),
            timestamp: when.format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// File name for this submission.
    ///
    /// `attempt` 0 is the plain name; later attempts insert `-<n>` right
    /// after the timestamp so same-second submissions do not overwrite
    /// each other.
    pub fn file_name(&self, attempt: u32) -> String {
        let stamp = if attempt == 0 {
            self.timestamp.clone()
        } else {
            format!("{}-{attempt}", self.timestamp)
        };
        match self.kind {
            SubmissionKind::DeviceInfo => format!("device_info-{}-{stamp}.json", self.client),
            SubmissionKind::Image => format!("{}-{stamp}-image.jpg", self.client),
            SubmissionKind::Audio => format!("{}-{stamp}-audio.wav", self.client),
        }
    }
}

/// Write `bytes` to a fresh file in `dir` named after `submission`.
///
/// Existing files are never overwritten; returns the path written.
pub fn persist(dir: &Path, submission: &Submission, bytes: &[u8]) -> SubmissionResult<PathBuf> {
    let mut attempt = 0;
    loop {
        let path = dir.join(submission.file_name(attempt));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                file.write_all(bytes)?;
                file.flush()?;
                info!(
                    "Stored {} from {} ({} bytes) → {}",
                    submission.kind.noun(),
                    submission.client,
                    bytes.len(),
                    path.display()
                );
                return Ok(path);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("{} exists, trying next suffix", path.display());
                attempt += 1;
            }
            Err(e) => return Err(SubmissionError::Io(e)),
        }
    }
}

/// Store an arbitrary JSON document, pretty-printed with a 4-space indent.
pub fn store_device_info(
    dir: &Path,
    submission: &Submission,
    info: &serde_json::Value,
) -> SubmissionResult<PathBuf> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    info.serialize(&mut ser)?;
    persist(dir, submission, &buf)
}

/// Decode an image of any supported format and store it as JPEG.
pub fn store_image(
    dir: &Path,
    submission: &Submission,
    raw: &[u8],
    quality: u8,
) -> SubmissionResult<PathBuf> {
    let jpeg = media::to_jpeg(raw, quality)?;
    persist(dir, submission, &jpeg)
}

/// Store audio bytes exactly as received.
pub fn store_audio(dir: &Path, submission: &Submission, raw: &[u8]) -> SubmissionResult<PathBuf> {
    match media::probe_wav(raw) {
        Some(wav) => debug!("Audio from {} is {wav}", submission.client),
        None => debug!("Audio from {} is not RIFF/WAVE, storing as-is", submission.client),
    }
    persist(dir, submission, raw)
}

//! Shared building blocks for the probe server: configuration, wire types,
//! data-URI decoding and submission storage.

pub mod config;
pub mod datauri;
pub mod error;
pub mod media;
pub mod protocol;
pub mod submission;

pub use error::{SubmissionError, SubmissionResult};
pub use submission::{Submission, SubmissionKind};

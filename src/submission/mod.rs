//! Final submission: record assembly, the network seam and the attempt state machine

pub mod aggregator;
pub mod client;
pub mod device;
pub mod record;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub use aggregator::{
    BlockReason, Captcha, FailureReason, SubmissionAggregator, SubmissionState, SubmitOutcome,
};
pub use client::{parse_submission_response, HttpSubmitter, SubmissionResponse, Submitter};
pub use device::DeviceDescriptor;
pub use record::{AudioFile, RecordContext, SubmissionRecord};

/// One-shot state handed to the confirmation step after a successful submit.
///
/// Lives only for a single transition and is never written to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    pub submission_id: String,
}

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Failed to read audio file {path}: {source}")]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Non-success status code: {0} (expected 2xx)")]
    Status(u16),

    #[error("Invalid response body: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

//! The single network call: multipart POST of the submission record

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::record::SubmissionRecord;
use super::SubmissionError;
use crate::config::SubmissionConfig;

/// Response body of the submission endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SubmissionResponse {
    #[serde(rename = "submissionId", default)]
    pub submission_id: Option<String>,
}

/// Sends a submission record somewhere and reports what came back
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, record: &SubmissionRecord)
        -> Result<SubmissionResponse, SubmissionError>;
}

/// Posts multipart/form-data to the configured endpoint
pub struct HttpSubmitter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSubmitter {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self, SubmissionError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("survey-wizard/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &SubmissionConfig) -> Result<Self, SubmissionError> {
        Self::new(config.endpoint.clone(), config.timeout_secs)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn build_form(record: &SubmissionRecord) -> Result<Form, SubmissionError> {
        let mut form = Form::new();
        for (name, value) in &record.fields {
            form = form.text(name.clone(), value.clone());
        }
        for attachment in &record.attachments {
            let bytes = tokio::fs::read(&attachment.path).await.map_err(|source| {
                SubmissionError::Attachment {
                    path: attachment.path.clone(),
                    source,
                }
            })?;
            let part = Part::bytes(bytes)
                .file_name(attachment.file_name.clone())
                .mime_str("audio/wav")?;
            form = form.part(attachment.part, part);
        }
        Ok(form)
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(
        &self,
        record: &SubmissionRecord,
    ) -> Result<SubmissionResponse, SubmissionError> {
        let form = Self::build_form(record).await?;
        debug!(
            endpoint = %self.endpoint,
            fields = record.fields.len(),
            attachments = record.attachments.len(),
            "Posting submission"
        );

        let response = self.client.post(&self.endpoint).multipart(form).send().await?;
        let status = response.status();
        let body = response.text().await?;

        parse_submission_response(status, &body)
    }
}

/// Check the status and decode the body.
///
/// A 2xx body without `submissionId` still parses; whether that counts as
/// success is up to the caller.
pub fn parse_submission_response(
    status: StatusCode,
    body: &str,
) -> Result<SubmissionResponse, SubmissionError> {
    if !status.is_success() {
        return Err(SubmissionError::Status(status.as_u16()));
    }
    if body.trim().is_empty() {
        return Ok(SubmissionResponse::default());
    }
    Ok(serde_json::from_str(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::submission::record::Attachment;
    use std::path::PathBuf;

    #[test]
    fn test_parse_success_with_id() {
        let response =
            parse_submission_response(StatusCode::OK, r#"{"submissionId":"abc123"}"#).unwrap();
        assert_eq!(response.submission_id.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_parse_success_without_id() {
        let response = parse_submission_response(StatusCode::OK, r#"{"ok":true}"#).unwrap();
        assert_eq!(response.submission_id, None);

        let empty = parse_submission_response(StatusCode::CREATED, "  ").unwrap();
        assert_eq!(empty.submission_id, None);
    }

    #[test]
    fn test_parse_non_2xx() {
        let err = parse_submission_response(StatusCode::BAD_GATEWAY, "").unwrap_err();
        assert!(matches!(err, SubmissionError::Status(502)));
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn test_parse_garbage_body() {
        let err = parse_submission_response(StatusCode::OK, "<html>").unwrap_err();
        assert!(matches!(err, SubmissionError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_missing_audio_file_fails_before_network() {
        let record = SubmissionRecord {
            fields: vec![("language".to_string(), "en".to_string())],
            attachments: vec![Attachment {
                part: "cough",
                path: PathBuf::from("/nonexistent/survey-wizard/cough.wav"),
                file_name: "filename.wav".to_string(),
            }],
        };
        let submitter = HttpSubmitter::new("http://127.0.0.1:9/saveClinre", 1).unwrap();
        let err = submitter.submit(&record).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Attachment { .. }));
    }
}

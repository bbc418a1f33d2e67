//! Submission attempt state machine.
//!
//! An attempt is split into [`SubmissionAggregator::begin`], which runs the
//! gates and builds the record, and [`SubmissionAggregator::complete`], which
//! applies the server outcome. Between the two the aggregator is
//! `Submitting` and any further `begin` is ignored.

use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::client::{SubmissionResponse, Submitter};
use super::device::DeviceDescriptor;
use super::record::{RecordContext, SubmissionRecord};
use super::{NavigationState, SubmissionError};
use crate::config::Config;
use crate::store::StateStore;
use crate::validation::{FormState, ValidationResult};

/// Message shown for any failed attempt
pub const FAILURE_MESSAGE: &str = "Something went wrong submitting your answers. Please try again.";

/// Where the aggregator is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
    Succeeded(String),
    Failed(FailureReason),
}

/// Challenge widget status at submit time
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Captcha {
    Token(String),
    /// Widget loaded but not solved
    Pending,
    /// Widget failed to load; the gate is relaxed
    Unavailable,
}

impl Captcha {
    fn token(&self) -> Option<String> {
        match self {
            Captcha::Token(t) if !t.is_empty() => Some(t.clone()),
            _ => None,
        }
    }
}

/// Local gates that stop an attempt before it starts
#[derive(Debug, Clone, PartialEq)]
pub enum BlockReason {
    Invalid(ValidationResult),
    CaptchaRequired,
}

/// Why an attempt failed; all of these are retryable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    MissingField(String),
    AudioUnreadable(String),
    Transport(String),
    Status(u16),
    InvalidResponse,
    MissingSubmissionId,
}

impl FailureReason {
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::MissingField(_) => "missingField",
            FailureReason::AudioUnreadable(_) => "audioUnreadable",
            FailureReason::Transport(_) => "transport",
            FailureReason::Status(_) => "httpStatus",
            FailureReason::InvalidResponse => "invalidResponse",
            FailureReason::MissingSubmissionId => "missingSubmissionId",
        }
    }

    pub fn user_message(&self) -> &'static str {
        FAILURE_MESSAGE
    }
}

impl From<&SubmissionError> for FailureReason {
    fn from(err: &SubmissionError) -> Self {
        match err {
            SubmissionError::MissingField(field) => FailureReason::MissingField(field.clone()),
            SubmissionError::Attachment { path, .. } => {
                FailureReason::AudioUnreadable(path.display().to_string())
            }
            SubmissionError::Http(e) => FailureReason::Transport(e.to_string()),
            SubmissionError::Status(code) => FailureReason::Status(*code),
            SubmissionError::InvalidResponse(_) => FailureReason::InvalidResponse,
        }
    }
}

/// Result of one call to submit
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// An attempt is already in flight
    Ignored,
    Blocked(BlockReason),
    Succeeded(NavigationState),
    Failed(FailureReason),
}

/// A started attempt, carried from `begin` to `complete`
#[derive(Debug)]
pub struct Attempt {
    pub id: Uuid,
    pub record: SubmissionRecord,
}

pub struct SubmissionAggregator {
    state: SubmissionState,
    captcha_required: bool,
    device: String,
    source: Option<String>,
}

impl SubmissionAggregator {
    pub fn new(captcha_required: bool, source: Option<String>) -> Self {
        let device = DeviceDescriptor::current()
            .to_json()
            .unwrap_or_else(|_| "{}".to_string());
        Self {
            state: SubmissionState::Idle,
            captcha_required,
            device,
            source,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.captcha.required, config.submission.source.clone())
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn is_submitting(&self) -> bool {
        self.state == SubmissionState::Submitting
    }

    /// Run the gates and build the record, moving to `Submitting`.
    ///
    /// The store is only read here.
    pub fn begin<S: StateStore>(
        &mut self,
        store: &S,
        form: &FormState,
        captcha: &Captcha,
    ) -> Result<Attempt, SubmitOutcome> {
        if self.is_submitting() {
            return Err(SubmitOutcome::Ignored);
        }
        if !form.can_advance() {
            return Err(SubmitOutcome::Blocked(BlockReason::Invalid(
                form.result().clone(),
            )));
        }
        if self.captcha_required && *captcha != Captcha::Unavailable && captcha.token().is_none() {
            return Err(SubmitOutcome::Blocked(BlockReason::CaptchaRequired));
        }

        let ctx = RecordContext {
            device: self.device.clone(),
            source: self.source.clone(),
            captcha: captcha.token(),
        };
        match SubmissionRecord::build(&store.snapshot(), form.values(), &ctx) {
            Ok(record) => {
                self.state = SubmissionState::Submitting;
                Ok(Attempt {
                    id: Uuid::new_v4(),
                    record,
                })
            }
            Err(e) => {
                warn!(error = %e, "Submission record incomplete");
                let reason = FailureReason::from(&e);
                self.state = SubmissionState::Failed(reason.clone());
                Err(SubmitOutcome::Failed(reason))
            }
        }
    }

    /// Apply the server outcome of a started attempt.
    ///
    /// Only a response carrying a submission id clears the store.
    pub fn complete<S: StateStore>(
        &mut self,
        store: &mut S,
        attempt: Attempt,
        result: Result<SubmissionResponse, SubmissionError>,
    ) -> SubmitOutcome {
        let reason = match result {
            Ok(SubmissionResponse {
                submission_id: Some(id),
            }) if !id.is_empty() => {
                if let Err(e) = store.reset() {
                    warn!(attempt = %attempt.id, error = %e, "Submitted but failed to clear answers");
                }
                info!(attempt = %attempt.id, submission_id = %id, "Submission accepted");
                self.state = SubmissionState::Succeeded(id.clone());
                return SubmitOutcome::Succeeded(NavigationState { submission_id: id });
            }
            Ok(_) => FailureReason::MissingSubmissionId,
            Err(e) => FailureReason::from(&e),
        };

        warn!(attempt = %attempt.id, reason = reason.code(), "Submission failed");
        self.state = SubmissionState::Failed(reason.clone());
        SubmitOutcome::Failed(reason)
    }

    /// Full attempt: gates, record, network call, outcome
    pub async fn submit<S, T>(
        &mut self,
        store: &mut S,
        submitter: &T,
        form: &FormState,
        captcha: Captcha,
    ) -> SubmitOutcome
    where
        S: StateStore,
        T: Submitter + ?Sized,
    {
        let attempt = match self.begin(store, form, &captcha) {
            Ok(attempt) => attempt,
            Err(outcome) => return outcome,
        };

        let span = info_span!("submission", attempt = %attempt.id);
        let result = submitter.submit(&attempt.record).instrument(span).await;
        self.complete(store, attempt, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Document, MemoryStore, SUBMIT_GROUP, WELCOME_GROUP};
    use crate::validation::schema_for;
    use crate::wizard::definitions::survey_steps;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeSubmitter {
        response: Mutex<Option<Result<SubmissionResponse, SubmissionError>>>,
        calls: AtomicUsize,
    }

    impl FakeSubmitter {
        fn returning(result: Result<SubmissionResponse, SubmissionError>) -> Self {
            Self {
                response: Mutex::new(Some(result)),
                calls: AtomicUsize::new(0),
            }
        }

        fn with_id(id: &str) -> Self {
            Self::returning(Ok(SubmissionResponse {
                submission_id: Some(id.to_string()),
            }))
        }
    }

    #[async_trait]
    impl Submitter for FakeSubmitter {
        async fn submit(
            &self,
            _record: &SubmissionRecord,
        ) -> Result<SubmissionResponse, SubmissionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Ok(SubmissionResponse::default()))
        }
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn filled_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .update(
                WELCOME_GROUP,
                doc(json!({
                    "language": "en",
                    "agreedConsentTerms": true,
                    "agreedPolicyTerms": true,
                    "agreedCovidCollection": true,
                    "agreedCovidDetection": true,
                    "agreedTrainingArtificial": true,
                    "agreedBiometric": true,
                })),
            )
            .unwrap();
        store
            .update(
                SUBMIT_GROUP,
                doc(json!({
                    "recordYourCough": {"recordingFile": {"path": "/tmp/c.wav"}},
                    "recordYourBreath": {"recordingFile": {"path": "/tmp/b.wav"}},
                    "recordYourSpeech": {"recordingFile": {"path": "/tmp/s.wav"}},
                })),
            )
            .unwrap();
        store
    }

    fn final_form(values: Value) -> FormState {
        let step8 = survey_steps()
            .into_iter()
            .find(|s| s.path == "/submit-steps/questionary/step8")
            .unwrap();
        FormState::new(schema_for(&step8), Some(&doc(values)))
    }

    #[tokio::test]
    async fn test_success_clears_store_and_yields_id() {
        let mut store = filled_store();
        let mut aggregator = SubmissionAggregator::new(false, None);
        let submitter = FakeSubmitter::with_id("abc123");

        let outcome = aggregator
            .submit(
                &mut store,
                &submitter,
                &final_form(json!({"currentMedicalCondition": ["none"]})),
                Captcha::Unavailable,
            )
            .await;

        assert_eq!(
            outcome,
            SubmitOutcome::Succeeded(NavigationState {
                submission_id: "abc123".to_string()
            })
        );
        assert!(store.snapshot().is_empty());
        assert_eq!(
            aggregator.state(),
            &SubmissionState::Succeeded("abc123".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_id_keeps_store_and_allows_retry() {
        let mut store = filled_store();
        let before = store.snapshot();
        let mut aggregator = SubmissionAggregator::new(false, None);
        let form = final_form(json!({"currentMedicalCondition": ["none"]}));

        let submitter = FakeSubmitter::returning(Ok(SubmissionResponse::default()));
        let outcome = aggregator
            .submit(&mut store, &submitter, &form, Captcha::Unavailable)
            .await;
        assert_eq!(
            outcome,
            SubmitOutcome::Failed(FailureReason::MissingSubmissionId)
        );
        assert_eq!(store.snapshot(), before);

        let retry = FakeSubmitter::with_id("second");
        let outcome = aggregator
            .submit(&mut store, &retry, &form, Captcha::Unavailable)
            .await;
        assert!(matches!(outcome, SubmitOutcome::Succeeded(_)));
    }

    #[tokio::test]
    async fn test_http_error_keeps_store() {
        let mut store = filled_store();
        let before = store.snapshot();
        let mut aggregator = SubmissionAggregator::new(false, None);
        let submitter = FakeSubmitter::returning(Err(SubmissionError::Status(500)));

        let outcome = aggregator
            .submit(
                &mut store,
                &submitter,
                &final_form(json!({"currentMedicalCondition": ["none"]})),
                Captcha::Unavailable,
            )
            .await;

        match outcome {
            SubmitOutcome::Failed(reason) => {
                assert_eq!(reason, FailureReason::Status(500));
                assert_eq!(reason.user_message(), FAILURE_MESSAGE);
            }
            other => panic!("Expected failure, got {other:?}"),
        }
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_invalid_final_step_blocks_without_network() {
        let mut store = filled_store();
        let mut aggregator = SubmissionAggregator::new(false, None);
        let submitter = FakeSubmitter::with_id("never");

        let outcome = aggregator
            .submit(&mut store, &submitter, &final_form(json!({})), Captcha::Unavailable)
            .await;

        assert!(matches!(
            outcome,
            SubmitOutcome::Blocked(BlockReason::Invalid(_))
        ));
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 0);
        assert_eq!(aggregator.state(), &SubmissionState::Idle);
    }

    #[tokio::test]
    async fn test_captcha_gate() {
        let mut store = filled_store();
        let mut aggregator = SubmissionAggregator::new(true, None);
        let form = final_form(json!({"currentMedicalCondition": ["none"]}));
        let submitter = FakeSubmitter::with_id("abc");

        let outcome = aggregator
            .submit(&mut store, &submitter, &form, Captcha::Pending)
            .await;
        assert_eq!(outcome, SubmitOutcome::Blocked(BlockReason::CaptchaRequired));
        assert_eq!(submitter.calls.load(Ordering::SeqCst), 0);

        // Widget failed to load: submission goes through without a token
        let outcome = aggregator
            .submit(&mut store, &submitter, &form, Captcha::Unavailable)
            .await;
        assert!(matches!(outcome, SubmitOutcome::Succeeded(_)));
    }

    #[test]
    fn test_second_begin_while_submitting_is_ignored() {
        let mut store = filled_store();
        let mut aggregator = SubmissionAggregator::new(false, None);
        let form = final_form(json!({"currentMedicalCondition": ["none"]}));

        let attempt = aggregator
            .begin(&store, &form, &Captcha::Token("t".into()))
            .unwrap();
        assert_eq!(attempt.record.field("captchaValue"), Some("t"));
        assert!(aggregator.is_submitting());

        let second = aggregator
            .begin(&store, &form, &Captcha::Token("t".into()))
            .unwrap_err();
        assert_eq!(second, SubmitOutcome::Ignored);

        let outcome = aggregator.complete(
            &mut store,
            attempt,
            Err(SubmissionError::Status(503)),
        );
        assert!(matches!(outcome, SubmitOutcome::Failed(_)));
        assert!(!aggregator.is_submitting());
    }

    #[test]
    fn test_incomplete_store_fails_without_touching_it() {
        let mut store = MemoryStore::new();
        store
            .update(WELCOME_GROUP, doc(json!({"language": "en"})))
            .unwrap();
        let before = store.snapshot();
        let mut aggregator = SubmissionAggregator::new(false, None);
        let form = final_form(json!({"currentMedicalCondition": ["none"]}));

        let outcome = aggregator
            .begin(&store, &form, &Captcha::Unavailable)
            .unwrap_err();
        assert_eq!(
            outcome,
            SubmitOutcome::Failed(FailureReason::MissingField(
                "agreedConsentTerms".to_string()
            ))
        );
        assert_eq!(store.snapshot(), before);
    }
}

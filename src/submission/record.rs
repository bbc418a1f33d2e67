//! Flattening the whole store into the submission payload

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use super::SubmissionError;
use crate::store::{Document, WizardDocument, SUBMIT_GROUP, WELCOME_GROUP};
use crate::validation::parse_date;
use crate::wizard::definitions::{BREATH_LOGIC, COUGH_LOGIC, SPEECH_LOGIC};

/// Consent flags copied verbatim from the welcome group
pub const CONSENT_FLAGS: &[&str] = &[
    "agreedConsentTerms",
    "agreedPolicyTerms",
    "agreedCovidCollection",
    "agreedCovidDetection",
    "agreedTrainingArtificial",
    "agreedBiometric",
];

/// Optional scalar answers from the submit-steps group, sent as-is when present
const OPTIONAL_SCALARS: &[&str] = &[
    "pcrTestResult",
    "doses",
    "gender",
    "biologicalSex",
    "smokeLastSixMonths",
    "symptomsStartedDate",
];

/// List answers sent comma-joined when non-empty
const LIST_FIELDS: &[&str] = &["ethnicity", "currentSymptoms", "currentMedicalCondition"];

/// Free-text companions of the "other" list entries
const FREE_TEXT_FIELDS: &[&str] = &["otherSymptoms", "otherMedicalConditions"];

/// `(store slot, multipart part, default filename)` for each recording
const AUDIO_PARTS: &[(&str, &str, &str)] = &[
    (COUGH_LOGIC, "cough", "filename.wav"),
    (BREATH_LOGIC, "breath", "filename_breath.wav"),
    (SPEECH_LOGIC, "voice", "filename_voice.wav"),
];

/// Reference to an audio file produced upstream, as persisted in a recording slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFile {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// One binary part of the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Multipart field name (`cough`, `breath`, `voice`)
    pub part: &'static str,
    pub path: PathBuf,
    pub file_name: String,
}

/// Values that come from outside the store
#[derive(Debug, Clone, Default)]
pub struct RecordContext {
    /// JSON-encoded device descriptor
    pub device: String,
    /// Campaign tag
    pub source: Option<String>,
    /// Challenge token
    pub captcha: Option<String>,
}

/// The flattened payload, built once per attempt and never persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub fields: Vec<(String, String)>,
    pub attachments: Vec<Attachment>,
}

impl SubmissionRecord {
    /// Build the record from the full store, with the final step's values
    /// merged over the submit-steps group.
    pub fn build(
        snapshot: &WizardDocument,
        final_values: &Document,
        ctx: &RecordContext,
    ) -> Result<Self, SubmissionError> {
        let empty = Document::new();
        let welcome = snapshot.get(WELCOME_GROUP).unwrap_or(&empty);
        let mut answers = snapshot.get(SUBMIT_GROUP).cloned().unwrap_or_default();
        for (k, v) in final_values {
            answers.insert(k.clone(), v.clone());
        }

        let mut fields = Vec::new();
        let mut push = |name: &str, value: String| fields.push((name.to_string(), value));

        push("device", ctx.device.clone());

        let language = scalar(welcome.get("language"))
            .ok_or_else(|| SubmissionError::MissingField("language".to_string()))?;
        push("language", language);

        if let Some(region) = scalar(welcome.get("region")) {
            push("region", region);
        }
        if let Some(source) = ctx.source.as_ref().filter(|s| !s.is_empty()) {
            push("source", source.clone());
        }

        for flag in CONSENT_FLAGS {
            let value = welcome
                .get(*flag)
                .and_then(Value::as_bool)
                .ok_or_else(|| SubmissionError::MissingField((*flag).to_string()))?;
            push(*flag, value.to_string());
        }

        if let Some(date) = answers.get("pcrTestDate").and_then(parse_date) {
            push(
                "pcrTestDate",
                date.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            );
        }

        for name in OPTIONAL_SCALARS {
            if let Some(value) = scalar(answers.get(*name)) {
                push(*name, value);
            }
        }

        for name in LIST_FIELDS {
            if let Some(joined) = joined_list(answers.get(*name)) {
                push(*name, joined);
            }
        }

        for name in FREE_TEXT_FIELDS {
            if let Some(value) = scalar(answers.get(*name)) {
                push(*name, value);
            }
        }

        if let Some(captcha) = ctx.captcha.as_ref().filter(|c| !c.is_empty()) {
            push("captchaValue", captcha.clone());
        }

        let mut attachments = Vec::with_capacity(AUDIO_PARTS.len());
        for (slot, part, default_name) in AUDIO_PARTS {
            let file = audio_file(answers.get(*slot))
                .ok_or_else(|| SubmissionError::MissingField((*slot).to_string()))?;
            let file_name = file
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| (*default_name).to_string());
            attachments.push(Attachment {
                part: *part,
                path: PathBuf::from(file.path),
                file_name,
            });
        }

        Ok(Self {
            fields,
            attachments,
        })
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attachment(&self, part: &str) -> Option<&Attachment> {
        self.attachments.iter().find(|a| a.part == part)
    }
}

/// Non-empty string, number or bool rendered as text
fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn joined_list(value: Option<&Value>) -> Option<String> {
    let items: Vec<&str> = value?.as_array()?.iter().filter_map(Value::as_str).collect();
    if items.is_empty() {
        None
    } else {
        Some(items.join(","))
    }
}

/// Recorded file takes precedence over an uploaded one
fn audio_file(slot: Option<&Value>) -> Option<AudioFile> {
    let slot = slot?;
    ["recordingFile", "uploadedFile"]
        .iter()
        .filter_map(|key| slot.get(key))
        .filter_map(|v| serde_json::from_value::<AudioFile>(v.clone()).ok())
        .find(|f| !f.path.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn complete_store() -> WizardDocument {
        let mut snapshot = WizardDocument::new();
        snapshot.insert(
            WELCOME_GROUP.to_string(),
            doc(json!({
                "language": "en",
                "region": "CA",
                "agreedConsentTerms": true,
                "agreedPolicyTerms": true,
                "agreedCovidCollection": true,
                "agreedCovidDetection": true,
                "agreedTrainingArtificial": false,
                "agreedBiometric": true,
            })),
        );
        snapshot.insert(
            SUBMIT_GROUP.to_string(),
            doc(json!({
                "recordYourCough": {"recordingFile": {"path": "/tmp/cough.wav", "name": "c.wav"}},
                "recordYourBreath": {
                    "recordingFile": {"path": "/tmp/breath-rec.wav"},
                    "uploadedFile": {"path": "/tmp/breath-up.wav", "name": "up.wav"}
                },
                "recordYourSpeech": {"uploadedFile": {"path": "/tmp/voice.wav"}},
                "pcrTestResult": "negative",
                "currentSymptoms": ["none"],
                "ethnicity": ["asian", "white"],
                "currentMedicalCondition": [],
            })),
        );
        snapshot
    }

    #[test]
    fn test_scalars_lists_and_optional_omission() {
        let record =
            SubmissionRecord::build(&complete_store(), &Document::new(), &RecordContext::default())
                .unwrap();

        assert_eq!(record.field("language"), Some("en"));
        assert_eq!(record.field("region"), Some("CA"));
        assert_eq!(record.field("pcrTestResult"), Some("negative"));
        assert_eq!(record.field("currentSymptoms"), Some("none"));
        assert_eq!(record.field("ethnicity"), Some("asian,white"));
        assert_eq!(record.field("agreedTrainingArtificial"), Some("false"));
        assert_eq!(record.field("pcrTestDate"), None);
        assert_eq!(record.field("currentMedicalCondition"), None);
        assert_eq!(record.field("source"), None);
        assert_eq!(record.field("captchaValue"), None);
    }

    #[test]
    fn test_recorded_file_wins_and_default_names_apply() {
        let record =
            SubmissionRecord::build(&complete_store(), &Document::new(), &RecordContext::default())
                .unwrap();

        assert_eq!(record.attachments.len(), 3);
        assert_eq!(record.attachment("cough").unwrap().file_name, "c.wav");

        let breath = record.attachment("breath").unwrap();
        assert_eq!(breath.path, PathBuf::from("/tmp/breath-rec.wav"));
        assert_eq!(breath.file_name, "filename_breath.wav");

        assert_eq!(record.attachment("voice").unwrap().file_name, "filename_voice.wav");
    }

    #[test]
    fn test_final_values_override_store() {
        let final_values = doc(json!({"currentMedicalCondition": ["asthma", "reflux"]}));
        let record =
            SubmissionRecord::build(&complete_store(), &final_values, &RecordContext::default())
                .unwrap();
        assert_eq!(record.field("currentMedicalCondition"), Some("asthma,reflux"));
    }

    #[test]
    fn test_pcr_date_serialized_as_utc_millis() {
        let final_values = doc(json!({"pcrTestDate": "2021-02-03"}));
        let record =
            SubmissionRecord::build(&complete_store(), &final_values, &RecordContext::default())
                .unwrap();
        assert_eq!(record.field("pcrTestDate"), Some("2021-02-03T00:00:00.000Z"));
    }

    #[test]
    fn test_context_fields() {
        let ctx = RecordContext {
            device: r#"{"os":"linux"}"#.to_string(),
            source: Some("spring-campaign".to_string()),
            captcha: Some("token-1".to_string()),
        };
        let record = SubmissionRecord::build(&complete_store(), &Document::new(), &ctx).unwrap();
        assert_eq!(record.field("device"), Some(r#"{"os":"linux"}"#));
        assert_eq!(record.field("source"), Some("spring-campaign"));
        assert_eq!(record.field("captchaValue"), Some("token-1"));
    }

    #[test]
    fn test_missing_language_is_reported() {
        let mut snapshot = complete_store();
        snapshot
            .get_mut(WELCOME_GROUP)
            .unwrap()
            .remove("language");
        let err =
            SubmissionRecord::build(&snapshot, &Document::new(), &RecordContext::default())
                .unwrap_err();
        assert!(matches!(err, SubmissionError::MissingField(ref f) if f == "language"));
    }

    #[test]
    fn test_missing_audio_is_reported() {
        let mut snapshot = complete_store();
        snapshot
            .get_mut(SUBMIT_GROUP)
            .unwrap()
            .remove("recordYourSpeech");
        let err =
            SubmissionRecord::build(&snapshot, &Document::new(), &RecordContext::default())
                .unwrap_err();
        assert!(matches!(err, SubmissionError::MissingField(ref f) if f == "recordYourSpeech"));
    }
}

//! Step records making up the wizard graph

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name selecting one of a step's alternate successors
pub type BranchKey = String;

/// Alternate successor taken when a recording step was skipped in favour of a file upload
pub const MANUAL_UPLOAD_BRANCH: &str = "manualUploadStep";
/// Alternate successor taken when the captured cough is too short to use
pub const SHORT_AUDIO_BRANCH: &str = "isShortAudioStep";
/// Alternate successor taken when any symptom other than "none" was reported
pub const COVID_SYMPTOMS_BRANCH: &str = "covidSymptomsStep";

/// One screen of the wizard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Route key, unique within the graph
    pub path: String,
    /// Presentation binding; opaque to navigation
    pub component_path: String,
    pub props: StepProps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepProps {
    /// Store group this step reads its defaults from and writes to
    pub store_key: String,
    /// Absent means "go back in history"
    #[serde(default)]
    pub previous_step: Option<String>,
    #[serde(default)]
    pub next_step: Option<String>,
    /// Named alternate successors
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub other_steps: BTreeMap<BranchKey, String>,
    #[serde(default)]
    pub metadata: StepMetadata,
    /// Query parameter name to field name, applied over store defaults on entry
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub prefill: BTreeMap<String, String>,
    /// Forward action sends the whole survey instead of following `next_step`
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub submits: bool,
}

/// Progress counters and branch context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_current: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_total: Option<u32>,
    /// Recording slot (e.g. `recordYourCough`) the step works on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_logic: Option<String>,
}

impl StepMetadata {
    /// `(current, total)` when the step shows a progress indicator
    pub fn progress(&self) -> Option<(u32, u32)> {
        match (self.current, self.total) {
            (Some(current), Some(total)) => Some((current, total)),
            _ => None,
        }
    }
}

impl Step {
    pub fn new(path: impl Into<String>, component_path: impl Into<String>, store_key: &str) -> Self {
        Self {
            path: path.into(),
            component_path: component_path.into(),
            props: StepProps {
                store_key: store_key.to_string(),
                previous_step: None,
                next_step: None,
                other_steps: BTreeMap::new(),
                metadata: StepMetadata::default(),
                prefill: BTreeMap::new(),
                submits: false,
            },
        }
    }

    pub fn previous(mut self, path: impl Into<String>) -> Self {
        self.props.previous_step = Some(path.into());
        self
    }

    pub fn next(mut self, path: impl Into<String>) -> Self {
        self.props.next_step = Some(path.into());
        self
    }

    pub fn other(mut self, key: &str, path: impl Into<String>) -> Self {
        self.props.other_steps.insert(key.to_string(), path.into());
        self
    }

    pub fn metadata(mut self, metadata: StepMetadata) -> Self {
        self.props.metadata = metadata;
        self
    }

    pub fn prefill(mut self, param: &str, field: &str) -> Self {
        self.props.prefill.insert(param.to_string(), field.to_string());
        self
    }

    /// Mark the step whose forward action is the final submission
    pub fn submits(mut self) -> Self {
        self.props.submits = true;
        self
    }

    pub fn store_key(&self) -> &str {
        &self.props.store_key
    }

    /// Recording slot for recording steps
    pub fn current_logic(&self) -> Option<&str> {
        self.props.metadata.current_logic.as_deref()
    }

    /// Every path this step links to, with the link's label
    pub fn links(&self) -> Vec<(String, &str)> {
        let mut links = Vec::new();
        if let Some(ref prev) = self.props.previous_step {
            links.push(("previous_step".to_string(), prev.as_str()));
        }
        if let Some(ref next) = self.props.next_step {
            links.push(("next_step".to_string(), next.as_str()));
        }
        for (key, target) in &self.props.other_steps {
            links.push((format!("other_steps.{key}"), target.as_str()));
        }
        links
    }
}

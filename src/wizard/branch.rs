//! Branch selection from a step's just-submitted answers.
//!
//! Decisions are made once, on forward submission, and never re-evaluated on
//! the target step.

use serde_json::Value;

use super::definitions::{INTRODUCTION_COMPONENT, LISTEN_COMPONENT};
use super::graph::Signal;
use super::step::{Step, COVID_SYMPTOMS_BRANCH, MANUAL_UPLOAD_BRANCH, SHORT_AUDIO_BRANCH};
use crate::store::Document;
use crate::validation::schemas::SHORT_AUDIO_FIELD;

/// Sentinel meaning "no symptoms"
const NO_SYMPTOMS: &str = "none";

/// True when any entry other than the "none" sentinel was selected
pub fn has_symptom(answers: &Document) -> bool {
    answers
        .get("currentSymptoms")
        .and_then(Value::as_array)
        .is_some_and(|items| items.iter().any(|v| v.as_str() != Some(NO_SYMPTOMS)))
}

fn has_recording(answers: &Document, slot: &str) -> bool {
    answers
        .get(slot)
        .and_then(|s| s.get("recordingFile"))
        .is_some_and(|f| !f.is_null())
}

/// Pick the successor signal for `step` given the values it just submitted.
///
/// A branch is only chosen when the step actually declares it, so the
/// result always resolves against the graph.
pub fn decide(step: &Step, answers: &Document) -> Signal {
    let branch = match step.component_path.as_str() {
        INTRODUCTION_COMPONENT => step
            .current_logic()
            .filter(|slot| !has_recording(answers, slot))
            .map(|_| MANUAL_UPLOAD_BRANCH),
        LISTEN_COMPONENT => answers
            .get(SHORT_AUDIO_FIELD)
            .and_then(Value::as_bool)
            .filter(|short| *short)
            .map(|_| SHORT_AUDIO_BRANCH),
        "SubmitSteps/Questionary/Step7a" => has_symptom(answers).then_some(COVID_SYMPTOMS_BRANCH),
        _ => None,
    };

    match branch {
        Some(key) if step.props.other_steps.contains_key(key) => Signal::Branch(key.to_string()),
        _ => Signal::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::definitions::survey_steps;
    use serde_json::json;

    fn step(path: &str) -> Step {
        survey_steps()
            .into_iter()
            .find(|s| s.path == path)
            .unwrap()
    }

    fn answers(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_any_real_symptom_branches_to_detail() {
        let step7a = step("/submit-steps/questionary/step7a");
        let signal = decide(&step7a, &answers(json!({"currentSymptoms": ["weakness"]})));
        assert_eq!(signal, Signal::Branch(COVID_SYMPTOMS_BRANCH.to_string()));
    }

    #[test]
    fn test_none_only_continues() {
        let step7a = step("/submit-steps/questionary/step7a");
        let signal = decide(&step7a, &answers(json!({"currentSymptoms": ["none"]})));
        assert_eq!(signal, Signal::Default);
    }

    #[test]
    fn test_intro_without_recording_goes_to_manual_upload() {
        let intro = step("/submit-steps/step-record/breath");
        assert_eq!(
            decide(&intro, &Document::new()),
            Signal::Branch(MANUAL_UPLOAD_BRANCH.to_string())
        );

        let recorded = answers(json!({
            "recordYourBreath": {"recordingFile": {"path": "/tmp/breath.wav"}}
        }));
        assert_eq!(decide(&intro, &recorded), Signal::Default);
    }

    #[test]
    fn test_short_cough_ends_early() {
        let listen = step("/submit-steps/step-listen/cough");
        let signal = decide(&listen, &answers(json!({"isShortAudio": true})));
        assert_eq!(signal, Signal::Branch(SHORT_AUDIO_BRANCH.to_string()));
    }

    #[test]
    fn test_branch_not_declared_falls_back_to_default() {
        // Breath listen-back has no short-audio successor
        let listen = step("/submit-steps/step-listen/breath");
        let signal = decide(&listen, &answers(json!({"isShortAudio": true})));
        assert_eq!(signal, Signal::Default);
    }

    #[test]
    fn test_other_steps_never_branch() {
        let step6 = step("/submit-steps/questionary/step6");
        let signal = decide(&step6, &answers(json!({"currentSymptoms": ["weakness"]})));
        assert_eq!(signal, Signal::Default);
    }
}

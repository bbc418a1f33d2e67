//! The survey's step table: welcome, three recordings, questionnaire, confirmation

use super::step::{
    Step, StepMetadata, COVID_SYMPTOMS_BRANCH, MANUAL_UPLOAD_BRANCH, SHORT_AUDIO_BRANCH,
};
use crate::store::{SUBMIT_GROUP, WELCOME_GROUP};

pub const WELCOME_URL: &str = "/welcome";
pub const SUBMIT_URL: &str = "/submit-steps";

/// Terminal confirmation step
pub const THANK_YOU_PATH: &str = "/submit-steps/thank-you";
/// Last questionnaire step, whose submit sends the whole survey
pub const FINAL_STEP_PATH: &str = "/submit-steps/questionary/step8";

/// Recording slots written by the three recording stages
pub const COUGH_LOGIC: &str = "recordYourCough";
pub const BREATH_LOGIC: &str = "recordYourBreath";
pub const SPEECH_LOGIC: &str = "recordYourSpeech";

pub const INTRODUCTION_COMPONENT: &str = "SubmitSteps/RecordingsSteps/Introduction";
pub const MANUAL_UPLOAD_COMPONENT: &str = "SubmitSteps/RecordingsSteps/RecordManualUpload";
pub const LISTEN_COMPONENT: &str = "SubmitSteps/RecordingsSteps/ListenAudio";
pub const THANK_YOU_COMPONENT: &str = "SubmitSteps/Submission/ThankYou";

const QUESTIONARY_TOTAL: u32 = 8;

fn welcome(path: &str) -> String {
    format!("{WELCOME_URL}{path}")
}

fn submit(path: &str) -> String {
    format!("{SUBMIT_URL}{path}")
}

fn recording_logic(logic: &str) -> StepMetadata {
    StepMetadata {
        current_logic: Some(logic.to_string()),
        ..Default::default()
    }
}

fn questionary_progress(current: Option<u32>) -> StepMetadata {
    StepMetadata {
        current,
        total: Some(QUESTIONARY_TOTAL),
        progress_current: Some(QUESTIONARY_TOTAL),
        progress_total: Some(QUESTIONARY_TOTAL),
        current_logic: None,
    }
}

fn welcome_steps() -> Vec<Step> {
    vec![
        Step::new(welcome(""), "Welcome/Step1", WELCOME_GROUP).next(welcome("/step-2")),
        Step::new(welcome("/step-2"), "Welcome/Step2", WELCOME_GROUP)
            .previous(welcome(""))
            .next(welcome("/step-3")),
        Step::new(welcome("/step-3"), "Welcome/Step3", WELCOME_GROUP)
            .previous(welcome("/step-2"))
            .next(welcome("/step-4")),
        Step::new(welcome("/step-4"), "Welcome/Step4", WELCOME_GROUP)
            .previous(welcome("/step-3"))
            .next(welcome("/step-5")),
        Step::new(welcome("/step-5"), "Welcome/Step5", WELCOME_GROUP)
            .previous(welcome("/step-4"))
            .next(submit("/step-record/cough")),
    ]
}

/// Record, optional manual upload, then listen-back for one recording kind
fn recording_steps(kind: &str, logic: &str, previous: String, next: String) -> Vec<Step> {
    let record = submit(&format!("/step-record/{kind}"));
    let upload = submit(&format!("/step-manual-upload/{kind}"));
    let listen = submit(&format!("/step-listen/{kind}"));

    vec![
        Step::new(record.clone(), INTRODUCTION_COMPONENT, SUBMIT_GROUP)
            .previous(previous)
            .next(listen.clone())
            .other(MANUAL_UPLOAD_BRANCH, upload.clone())
            .metadata(recording_logic(logic)),
        Step::new(upload, MANUAL_UPLOAD_COMPONENT, SUBMIT_GROUP)
            .previous(record.clone())
            .next(listen.clone())
            .metadata(recording_logic(logic)),
        Step::new(listen, LISTEN_COMPONENT, SUBMIT_GROUP)
            .previous(record)
            .next(next)
            .metadata(recording_logic(logic)),
    ]
}

fn questionary_steps() -> Vec<Step> {
    let q = |n: &str| submit(&format!("/questionary/{n}"));
    let component = |n: &str| format!("SubmitSteps/Questionary/{n}");

    vec![
        Step::new(q("step1"), component("Step1"), SUBMIT_GROUP)
            .previous(submit("/step-listen/speech"))
            .next(q("step2"))
            .metadata(questionary_progress(Some(1)))
            .prefill("pcrresult", "pcrTestResult"),
        Step::new(q("step2"), component("Step2"), SUBMIT_GROUP)
            .previous(q("step1"))
            .next(q("step3"))
            .metadata(questionary_progress(Some(2))),
        Step::new(q("step3"), component("Step3"), SUBMIT_GROUP)
            .previous(q("step2"))
            .next(q("step4"))
            .metadata(questionary_progress(Some(3))),
        Step::new(q("step4"), component("Step4"), SUBMIT_GROUP)
            .previous(q("step3"))
            .next(q("step5"))
            .metadata(questionary_progress(Some(4))),
        Step::new(q("step5"), component("Step5"), SUBMIT_GROUP)
            .previous(q("step4"))
            .next(q("step6"))
            .metadata(questionary_progress(Some(5))),
        Step::new(q("step6"), component("Step6"), SUBMIT_GROUP)
            .previous(q("step5"))
            .next(q("step7a"))
            .metadata(questionary_progress(Some(6))),
        Step::new(q("step7a"), component("Step7a"), SUBMIT_GROUP)
            .previous(q("step6"))
            .next(q("step8"))
            .other(COVID_SYMPTOMS_BRANCH, q("step7b"))
            .metadata(questionary_progress(Some(7))),
        // Detail page has no own progress position
        Step::new(q("step7b"), component("Step7b"), SUBMIT_GROUP)
            .previous(q("step7a"))
            .next(q("step8"))
            .metadata(questionary_progress(None)),
        Step::new(q("step8"), component("Step8"), SUBMIT_GROUP)
            .previous(q("step7a"))
            .next(THANK_YOU_PATH)
            .submits()
            .metadata(questionary_progress(Some(8))),
    ]
}

/// Full step table in display order
pub fn survey_steps() -> Vec<Step> {
    let mut steps = welcome_steps();

    let mut cough = recording_steps(
        "cough",
        COUGH_LOGIC,
        welcome("/step-5"),
        submit("/step-record/breath"),
    );
    // A cough too short to analyse ends the session early
    if let Some(listen) = cough.last_mut() {
        listen
            .props
            .other_steps
            .insert(SHORT_AUDIO_BRANCH.to_string(), THANK_YOU_PATH.to_string());
    }
    steps.extend(cough);

    steps.extend(recording_steps(
        "breath",
        BREATH_LOGIC,
        submit("/step-listen/cough"),
        submit("/step-record/speech"),
    ));
    steps.extend(recording_steps(
        "speech",
        SPEECH_LOGIC,
        submit("/step-listen/breath"),
        submit("/questionary/step1"),
    ));
    steps.extend(questionary_steps());

    steps.push(
        Step::new(THANK_YOU_PATH, THANK_YOU_COMPONENT, SUBMIT_GROUP)
            .previous(submit("/questionary/step8"))
            .next(WELCOME_URL),
    );

    steps
}

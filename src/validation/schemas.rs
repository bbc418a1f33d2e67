//! Schemas declared by each step component

use super::{FieldKind, FieldRule, Schema};
use crate::wizard::definitions::{
    INTRODUCTION_COMPONENT, LISTEN_COMPONENT, MANUAL_UPLOAD_COMPONENT,
};
use crate::wizard::step::Step;

/// Languages the survey is offered in; the first is the fallback
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "es", "ar", "ur"];

pub const PCR_RESULTS: &[&str] = &["positive", "negative", "pending", "unsure"];

pub const DOSES: &[&str] = &["0", "1", "2", "3", "4+"];

pub const ETHNICITIES: &[&str] = &[
    "asian",
    "nativeAmericanOrArab",
    "blackOrAfrican",
    "hispanicOrLatin",
    "nativeHawaiianOrPacific",
    "white",
    "decline",
];

pub const GENDERS: &[&str] = &["female", "male", "other", "decline"];

pub const BIOLOGICAL_SEXES: &[&str] = &["female", "male", "intersex", "decline"];

pub const YES_NO: &[&str] = &["true", "false"];

pub const SYMPTOMS: &[&str] = &[
    "none",
    "bodyAches",
    "dryCough",
    "wetCough",
    "feverChillsSweating",
    "headaches",
    "lossTasteAndOrSmell",
    "newOrWorseCough",
    "runnyNose",
    "breathShortness",
    "soreThroat",
    "chestTightness",
    "vomitingAndDiarrhea",
    "weakness",
    "other",
];

pub const MEDICAL_CONDITIONS: &[&str] = &[
    "none",
    "allergies",
    "asthma",
    "bronchitis",
    "congestiveHeartFailure",
    "copdEmphysema",
    "extremeObesity",
    "heartDisease",
    "hivAidsOrImpairedImmuneSystem",
    "lungCancer",
    "otherChronic",
    "pneumonia",
    "pulmonaryFibrosis",
    "reflux",
    "sinusitis",
    "tuberculosis",
    "other",
];

/// Flag a listen-back step sets when the captured audio is too short
pub const SHORT_AUDIO_FIELD: &str = "isShortAudio";

fn accepted(names: &[&str]) -> Schema {
    Schema::new(
        names
            .iter()
            .map(|name| FieldRule::new(*name, FieldKind::Accepted))
            .collect(),
    )
}

/// Schema for a step, keyed by its component (and recording slot where relevant)
pub fn schema_for(step: &Step) -> Schema {
    let slot = step.current_logic().unwrap_or_default();

    match step.component_path.as_str() {
        "Welcome/Step1" => Schema::new(vec![
            FieldRule::new("language", FieldKind::Choice(SUPPORTED_LANGUAGES)),
            FieldRule::new("region", FieldKind::Text).missing("regionRequired"),
        ]),
        "Welcome/Step3" => accepted(&["agreedConsentTerms", "agreedPolicyTerms"]),
        "Welcome/Step4" => accepted(&["agreedCovidCollection", "agreedCovidDetection"]),
        "Welcome/Step5" => accepted(&["agreedTrainingArtificial", "agreedBiometric"]),

        INTRODUCTION_COMPONENT => {
            Schema::new(vec![FieldRule::new(slot, FieldKind::OptionalAudio)])
        }
        MANUAL_UPLOAD_COMPONENT => Schema::new(vec![FieldRule::new(slot, FieldKind::Audio)]),
        LISTEN_COMPONENT => Schema::new(vec![
            FieldRule::new(slot, FieldKind::Audio),
            FieldRule::new(SHORT_AUDIO_FIELD, FieldKind::OptionalFlag),
        ]),

        "SubmitSteps/Questionary/Step1" => Schema::new(vec![
            FieldRule::new("pcrTestDate", FieldKind::Date),
            FieldRule::new("pcrTestResult", FieldKind::Choice(PCR_RESULTS)),
        ]),
        "SubmitSteps/Questionary/Step2" => {
            Schema::new(vec![FieldRule::new("doses", FieldKind::Choice(DOSES))])
        }
        "SubmitSteps/Questionary/Step3" => Schema::new(vec![FieldRule::new(
            "ethnicity",
            FieldKind::List {
                options: ETHNICITIES,
                exclusive: Some("decline"),
            },
        )
        .missing("ethnicityRequired")]),
        "SubmitSteps/Questionary/Step4" => {
            Schema::new(vec![FieldRule::new("gender", FieldKind::Choice(GENDERS))])
        }
        "SubmitSteps/Questionary/Step5" => Schema::new(vec![FieldRule::new(
            "biologicalSex",
            FieldKind::Choice(BIOLOGICAL_SEXES),
        )]),
        "SubmitSteps/Questionary/Step6" => Schema::new(vec![FieldRule::new(
            "smokeLastSixMonths",
            FieldKind::Choice(YES_NO),
        )]),
        "SubmitSteps/Questionary/Step7a" => Schema::new(vec![
            FieldRule::new(
                "currentSymptoms",
                FieldKind::List {
                    options: SYMPTOMS,
                    exclusive: Some("none"),
                },
            ),
            FieldRule::new("otherSymptoms", FieldKind::OptionalText),
        ]),
        "SubmitSteps/Questionary/Step7b" => {
            Schema::new(vec![FieldRule::new("symptomsStartedDate", FieldKind::Date)])
        }
        "SubmitSteps/Questionary/Step8" => Schema::new(vec![
            FieldRule::new(
                "currentMedicalCondition",
                FieldKind::List {
                    options: MEDICAL_CONDITIONS,
                    exclusive: Some("none"),
                },
            ),
            FieldRule::new("otherMedicalConditions", FieldKind::OptionalText),
        ]),

        // Informational screens and the confirmation page collect nothing
        _ => Schema::default(),
    }
}

//! Per-step validation gate.
//!
//! Each step declares a [`Schema`]; [`FormState`] holds the step's local
//! values and recomputes the [`ValidationResult`] on every field change, so
//! the forward action can be disabled while the form is invalid.

pub mod schemas;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::store::Document;

pub use schemas::schema_for;

/// Shown whenever a reason has no user-facing text of its own
pub const FALLBACK_MESSAGE: &str = "Please select an option";

/// Why a field failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    Required,
    InvalidOption,
    InvalidDate,
    /// Date falls after the end of the current day
    FutureDate,
    MustAccept,
    /// An exclusive sentinel ("none", "decline") was combined with other entries
    SelectOne,
    /// Step-specific reason code (e.g. `regionRequired`)
    Custom(&'static str),
}

impl Reason {
    pub fn code(&self) -> &str {
        match self {
            Reason::Required => "required",
            Reason::InvalidOption => "invalidOption",
            Reason::InvalidDate => "invalidDate",
            Reason::FutureDate => "futureDate",
            Reason::MustAccept => "mustAccept",
            Reason::SelectOne => "selectOne",
            Reason::Custom(code) => code,
        }
    }

    /// User-facing text, substituting [`FALLBACK_MESSAGE`] for raw reasons
    pub fn message(&self) -> &'static str {
        match self.code() {
            "selectOne" => "Please select one option",
            "invalidDate" => "Please enter a valid date",
            "futureDate" => "Date cannot be in the future",
            "mustAccept" => "You must accept to continue",
            "regionRequired" => "Please select a region",
            "ethnicityRequired" => "Please select at least one option",
            _ => FALLBACK_MESSAGE,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Constraint on a single field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Non-empty string
    Text,
    /// One of a fixed set of strings
    Choice(&'static [&'static str]),
    /// `YYYY-MM-DD` or RFC 3339 timestamp, no later than the end of today
    Date,
    /// Boolean that must be `true`
    Accepted,
    /// Non-empty list of strings; `exclusive` may not be combined with other entries
    List {
        options: &'static [&'static str],
        exclusive: Option<&'static str>,
    },
    /// Recording slot holding a `recordingFile` or `uploadedFile`
    Audio,
    /// Free text, may be absent
    OptionalText,
    /// Boolean, may be absent
    OptionalFlag,
    /// Recording slot that may be absent
    OptionalAudio,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRule {
    pub name: String,
    pub kind: FieldKind,
    /// Replaces the generic "required" reason when the field is missing
    pub missing_reason: Option<&'static str>,
}

impl FieldRule {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            missing_reason: None,
        }
    }

    pub fn missing(mut self, reason: &'static str) -> Self {
        self.missing_reason = Some(reason);
        self
    }

    fn is_optional(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::OptionalText | FieldKind::OptionalFlag | FieldKind::OptionalAudio
        )
    }

    fn missing_error(&self) -> Reason {
        match self.missing_reason {
            Some(code) => Reason::Custom(code),
            None => Reason::Required,
        }
    }

    /// Check one value; `None` means the field is absent
    pub fn check(&self, value: Option<&Value>) -> Result<(), Reason> {
        let value = match value {
            None | Some(Value::Null) => {
                return if self.is_optional() {
                    Ok(())
                } else {
                    Err(self.missing_error())
                };
            }
            Some(v) => v,
        };

        match &self.kind {
            FieldKind::Text => match value.as_str() {
                Some(s) if !s.trim().is_empty() => Ok(()),
                _ => Err(self.missing_error()),
            },
            FieldKind::OptionalText => match value {
                Value::String(_) => Ok(()),
                _ => Err(Reason::InvalidOption),
            },
            FieldKind::Choice(options) => match value.as_str() {
                Some("") => Err(self.missing_error()),
                Some(s) if options.contains(&s) => Ok(()),
                _ => Err(Reason::InvalidOption),
            },
            FieldKind::Date => {
                if let Some(date) = parse_date(value) {
                    if date > end_of_day(Utc::now()) {
                        Err(Reason::FutureDate)
                    } else {
                        Ok(())
                    }
                } else if value.as_str() == Some("") {
                    Err(self.missing_error())
                } else {
                    Err(Reason::InvalidDate)
                }
            }
            FieldKind::Accepted => match value.as_bool() {
                Some(true) => Ok(()),
                _ => Err(Reason::MustAccept),
            },
            FieldKind::OptionalFlag => match value {
                Value::Bool(_) => Ok(()),
                _ => Err(Reason::InvalidOption),
            },
            FieldKind::List { options, exclusive } => check_list(value, options, *exclusive)
                .map_err(|e| {
                    if e == Reason::Required {
                        self.missing_error()
                    } else {
                        e
                    }
                }),
            FieldKind::Audio => {
                if has_audio(value) {
                    Ok(())
                } else {
                    Err(self.missing_error())
                }
            }
            FieldKind::OptionalAudio => {
                if value.is_object() {
                    Ok(())
                } else {
                    Err(Reason::InvalidOption)
                }
            }
        }
    }
}

fn check_list(
    value: &Value,
    options: &[&str],
    exclusive: Option<&str>,
) -> Result<(), Reason> {
    let items = value.as_array().ok_or(Reason::InvalidOption)?;
    if items.is_empty() {
        return Err(Reason::Required);
    }

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        match item.as_str() {
            Some(s) if options.contains(&s) => entries.push(s),
            _ => return Err(Reason::InvalidOption),
        }
    }

    if let Some(sentinel) = exclusive {
        if entries.len() > 1 && entries.contains(&sentinel) {
            return Err(Reason::SelectOne);
        }
    }
    Ok(())
}

/// A recording slot counts when either of its file references has a path
pub fn has_audio(value: &Value) -> bool {
    ["recordingFile", "uploadedFile"].iter().any(|key| {
        value
            .get(key)
            .and_then(|file| file.get("path"))
            .and_then(Value::as_str)
            .is_some_and(|p| !p.is_empty())
    })
}

/// Parse a date field stored either as `YYYY-MM-DD` or an RFC 3339 timestamp
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Last representable instant of `now`'s day
pub fn end_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_milli_opt(23, 59, 59, 999)
        .map(|naive| naive.and_utc())
        .unwrap_or(now)
}

/// Field requirements for one step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub fields: Vec<FieldRule>,
}

impl Schema {
    pub fn new(fields: Vec<FieldRule>) -> Self {
        Self { fields }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Validate the step's own fields; anything else in `values` is ignored
    pub fn validate(&self, values: &Document) -> ValidationResult {
        let mut errors = BTreeMap::new();
        for rule in &self.fields {
            if let Err(reason) = rule.check(values.get(&rule.name)) {
                errors.insert(rule.name.clone(), reason);
            }
        }
        ValidationResult { errors }
    }
}

/// Field errors for one step; valid when empty
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    pub errors: BTreeMap<String, Reason>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn reason(&self, field: &str) -> Option<&Reason> {
        self.errors.get(field)
    }

    /// `(field, user-facing message)` pairs
    pub fn messages(&self) -> Vec<(String, &'static str)> {
        self.errors
            .iter()
            .map(|(field, reason)| (field.clone(), reason.message()))
            .collect()
    }
}

/// Local form values of the mounted step
#[derive(Debug, Clone)]
pub struct FormState {
    schema: Schema,
    values: Document,
    result: ValidationResult,
}

impl FormState {
    /// Seed the form from store defaults, keeping only the step's own fields
    pub fn new(schema: Schema, defaults: Option<&Document>) -> Self {
        let mut values = Document::new();
        if let Some(defaults) = defaults {
            for name in schema.field_names() {
                if let Some(v) = defaults.get(name) {
                    values.insert(name.to_string(), v.clone());
                }
            }
        }
        let result = schema.validate(&values);
        Self {
            schema,
            values,
            result,
        }
    }

    /// Change a field and recompute validity
    pub fn set_field(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
        self.result = self.schema.validate(&self.values);
    }

    pub fn clear_field(&mut self, name: &str) {
        self.values.remove(name);
        self.result = self.schema.validate(&self.values);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn values(&self) -> &Document {
        &self.values
    }

    pub fn into_values(self) -> Document {
        self.values
    }

    pub fn result(&self) -> &ValidationResult {
        &self.result
    }

    /// Whether the forward action is enabled
    pub fn can_advance(&self) -> bool {
        self.result.is_valid()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

//! Format check for chat fine-tuning JSONL.
//!
//! Every line must be a `{"messages": [...]}` object whose messages carry a
//! known `role`, a non-empty string `content` and nothing beyond the optional
//! `name`, `function_call` and `weight` keys. Defects are counted per
//! category; the check never repairs anything.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const ALLOWED_KEYS: [&str; 5] = ["role", "content", "name", "function_call", "weight"];
pub const ROLES: [&str; 4] = ["system", "user", "assistant", "function"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefectCategory {
    DataType,
    MissingMessagesList,
    MessageMissingKey,
    MessageUnrecognizedKey,
    UnrecognizedRole,
    MissingContent,
    ExampleMissingAssistantMessage,
}

impl DefectCategory {
    pub const ALL: [DefectCategory; 7] = [
        DefectCategory::DataType,
        DefectCategory::MissingMessagesList,
        DefectCategory::MessageMissingKey,
        DefectCategory::MessageUnrecognizedKey,
        DefectCategory::UnrecognizedRole,
        DefectCategory::MissingContent,
        DefectCategory::ExampleMissingAssistantMessage,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DefectCategory::DataType => "data_type",
            DefectCategory::MissingMessagesList => "missing_messages_list",
            DefectCategory::MessageMissingKey => "message_missing_key",
            DefectCategory::MessageUnrecognizedKey => "message_unrecognized_key",
            DefectCategory::UnrecognizedRole => "unrecognized_role",
            DefectCategory::MissingContent => "missing_content",
            DefectCategory::ExampleMissingAssistantMessage => "example_missing_assistant_message",
        }
    }
}

impl fmt::Display for DefectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Defect counts keyed by category. Categories never observed are absent,
/// so an empty value means the input passed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormatErrors(BTreeMap<DefectCategory, usize>);

impl FormatErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&mut self, category: DefectCategory) {
        *self.0.entry(category).or_insert(0) += 1;
    }

    pub fn get(&self, category: DefectCategory) -> Option<usize> {
        self.0.get(&category).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DefectCategory, usize)> + '_ {
        self.0.iter().map(|(k, v)| (*k, *v))
    }
}

impl FromIterator<(DefectCategory, usize)> for FormatErrors {
    fn from_iter<I: IntoIterator<Item = (DefectCategory, usize)>>(iter: I) -> Self {
        let mut errors = FormatErrors::new();
        for (category, count) in iter {
            if count > 0 {
                *errors.0.entry(category).or_insert(0) += count;
            }
        }
        errors
    }
}

impl fmt::Display for FormatErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("No errors found");
        }
        for (category, count) in self.iter() {
            writeln!(f, "- {category}: {count}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum FormatCheckError {
    #[error("line {line} is not valid JSON: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Validate newline-delimited fine-tuning records.
///
/// The text is split on `'\n'` as is, so a trailing newline leaves an empty
/// last line that fails to decode. The first undecodable line aborts the run.
pub fn check_format(jsonl: &str) -> Result<FormatErrors, FormatCheckError> {
    let mut errors = FormatErrors::new();

    for (idx, line) in jsonl.split('\n').enumerate() {
        let record: Value = serde_json::from_str(line)
            .map_err(|source| FormatCheckError::Decode { line: idx + 1, source })?;
        check_record(&record, &mut errors);
    }

    Ok(errors)
}

/// Text to hand to [`check_format`] for a file read from disk: drops the one
/// newline that terminates a text file unless asked to keep it.
pub fn trim_terminating_newline(text: &str, keep_trailing_newline: bool) -> &str {
    if keep_trailing_newline {
        return text;
    }
    text.strip_suffix('\n').unwrap_or(text)
}

/// Count the defects of one decoded record into `errors`.
pub fn check_record(record: &Value, errors: &mut FormatErrors) {
    let Some(obj) = record.as_object() else {
        errors.bump(DefectCategory::DataType);
        return;
    };

    // an absent or non-array list ends the record here, assistant check included
    let Some(messages) = obj.get("messages").and_then(Value::as_array) else {
        errors.bump(DefectCategory::MissingMessagesList);
        return;
    };

    for message in messages {
        check_message(message, errors);
    }

    if !messages.iter().any(|m| role_of(m.as_object()) == Some("assistant")) {
        errors.bump(DefectCategory::ExampleMissingAssistantMessage);
    }
}

// a non-object message has no role or content
fn check_message(message: &Value, errors: &mut FormatErrors) {
    let fields = message.as_object();
    let role = fields.and_then(|m| m.get("role"));
    let content = fields.and_then(|m| m.get("content"));

    if !is_truthy(role) || !is_truthy(content) {
        errors.bump(DefectCategory::MessageMissingKey);
    }

    if has_unrecognized_key(message) {
        errors.bump(DefectCategory::MessageUnrecognizedKey);
    }

    if !role.and_then(Value::as_str).is_some_and(|r| ROLES.contains(&r)) {
        errors.bump(DefectCategory::UnrecognizedRole);
    }

    if !is_truthy(content) || !content.is_some_and(Value::is_string) {
        errors.bump(DefectCategory::MissingContent);
    }
}

/// Non-empty arrays and strings carry index keys ("0", "1", ..), none of
/// them allowed. Scalars, `null` and empty arrays or strings have no keys.
fn has_unrecognized_key(message: &Value) -> bool {
    match message {
        Value::Object(m) => m.keys().any(|k| !ALLOWED_KEYS.contains(&k.as_str())),
        Value::Array(a) => !a.is_empty(),
        Value::String(s) => !s.is_empty(),
        Value::Null | Value::Bool(_) | Value::Number(_) => false,
    }
}

fn role_of(message: Option<&Map<String, Value>>) -> Option<&str> {
    message.and_then(|m| m.get("role")).and_then(Value::as_str)
}

/// Loose truthiness: absent, `null`, `false`, zero and `""` count as missing.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

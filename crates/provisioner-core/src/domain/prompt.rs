//! Installer prompts
//!
//! While installing, the server may pause and ask the user a question.
//! Prompts of type `choice` carry their question and options as a JSON
//! document encoded inside `message`; see [`ChoicePayload`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Prompt type whose `message` is itself JSON-encoded
pub const CHOICE_PROMPT: &str = "choice";

/// A question the installer is waiting on
///
/// Text fields accept numbers and `null`; `resolved` accepts any JSON value
/// and counts `null`, `false`, `0` and `""` as unresolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallPrompt {
    #[serde(default, deserialize_with = "text_or_empty")]
    pub id: String,
    /// Free-form tag: "choice", "yes_no", "file", "input", ...
    #[serde(rename = "type", default, deserialize_with = "text_or_empty")]
    pub kind: String,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, deserialize_with = "truthy")]
    pub resolved: bool,
    /// Any other prompt attributes (input values, file info, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InstallPrompt {
    pub fn is_choice(&self) -> bool {
        self.kind == CHOICE_PROMPT
    }

    /// Replaces the encoded message with the decoded question and options
    pub fn apply_choice(&mut self, choice: ChoicePayload) {
        self.message = choice.message;
        self.options = Some(choice.options);
    }
}

fn text_or_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => false,
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// Inner contract of a choice prompt's `message`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoicePayload {
    pub message: String,
    #[serde(default)]
    pub options: Vec<String>,
}

impl ChoicePayload {
    pub fn decode(encoded: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(encoded)
    }
}

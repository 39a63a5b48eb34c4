//! Action protocol between the model and the agent
//!
//! Every model response must be a single JSON object describing exactly one
//! of three actions. Parsing is strict: an [`Action`] is only built once every
//! required field for its discriminator has been confirmed present.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Number of characters of offending input quoted in an InvalidJson error
const DIAGNOSTIC_PREFIX_CHARS: usize = 100;

/// One validated instruction from the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Run a shell command in the working directory
    RunCommand { cmd: String, reasoning: Option<String> },

    /// Apply a unified diff to a file
    EditFile {
        file: String,
        patch: String,
        reasoning: Option<String>,
    },

    /// The goal is complete
    Done { summary: String },
}

impl Action {
    /// Lowercase wire discriminator
    pub fn kind(&self) -> &'static str {
        match self {
            Action::RunCommand { .. } => "run",
            Action::EditFile { .. } => "edit",
            Action::Done { .. } => "done",
        }
    }

    pub fn reasoning(&self) -> Option<&str> {
        match self {
            Action::RunCommand { reasoning, .. } | Action::EditFile { reasoning, .. } => reasoning.as_deref(),
            Action::Done { .. } => None,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Action::Done { .. })
    }

    /// Wire form of the action, `action` key first, absent reasoning omitted
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("action".into(), json!(self.kind()));
        match self {
            Action::RunCommand { cmd, reasoning } => {
                map.insert("cmd".into(), json!(cmd));
                if let Some(reasoning) = reasoning {
                    map.insert("reasoning".into(), json!(reasoning));
                }
            }
            Action::EditFile { file, patch, reasoning } => {
                map.insert("file".into(), json!(file));
                map.insert("patch".into(), json!(patch));
                if let Some(reasoning) = reasoning {
                    map.insert("reasoning".into(), json!(reasoning));
                }
            }
            Action::Done { summary } => {
                map.insert("summary".into(), json!(summary));
            }
        }
        Value::Object(map)
    }

    /// Compact JSON used both as the memory entry and the stall-detection key
    pub fn canonical(&self) -> String {
        self.to_json().to_string()
    }
}

/// The model broke the response contract
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Invalid JSON response from LLM: {0}")]
    InvalidJson(String),

    #[error("Missing or invalid 'action' field in LLM response")]
    MissingAction,

    #[error("Action requires '{0}' field with string value")]
    MissingField(&'static str),

    #[error("Unknown action type: {0}")]
    UnknownAction(String),
}

/// Outcome of a single tool execution, fed back to the model
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
            exit_code: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
            exit_code: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }
}

/// Parse raw model text into a validated [`Action`].
///
/// Tolerates surrounding whitespace and one layer of markdown code fencing.
pub fn parse_action(raw: &str) -> Result<Action, ProtocolError> {
    let content = strip_code_fence(raw);

    let json: Value = serde_json::from_str(content)
        .map_err(|_| ProtocolError::InvalidJson(content.chars().take(DIAGNOSTIC_PREFIX_CHARS).collect()))?;

    let discriminator = json
        .get("action")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(ProtocolError::MissingAction)?
        .to_lowercase();

    match discriminator.as_str() {
        "run" => Ok(Action::RunCommand {
            cmd: required_str(&json, "cmd")?,
            reasoning: optional_str(&json, "reasoning"),
        }),
        "edit" => Ok(Action::EditFile {
            file: required_str(&json, "file")?,
            patch: required_str(&json, "patch")?,
            reasoning: optional_str(&json, "reasoning"),
        }),
        "done" => Ok(Action::Done {
            summary: required_str(&json, "summary")?,
        }),
        _ => Err(ProtocolError::UnknownAction(discriminator)),
    }
}

/// Render a tool result as the text the model sees next turn
pub fn format_result(result: &ToolResult) -> String {
    if result.success {
        format!("Exit Code: {}\nOutput:\n{}", result.exit_code.unwrap_or(0), result.output)
    } else {
        format!(
            "Error: {}\nOutput:\n{}",
            result.error.as_deref().unwrap_or("Unknown error"),
            result.output
        )
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Info string runs to the end of the opening line, e.g. ```json5 or ```jsonc
    let body = match rest.split_once('\n') {
        Some((info, body)) if !info.trim_start().starts_with('{') => body,
        _ => rest,
    };
    let body = body.trim_end();
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn required_str(json: &Value, field: &'static str) -> Result<String, ProtocolError> {
    json.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(ProtocolError::MissingField(field))
}

fn optional_str(json: &Value, field: &str) -> Option<String> {
    json.get(field).and_then(Value::as_str).map(str::to_string)
}

//! Ingress normalization: raw hook JSON → [`InvocationRequest`].

use serde_json::Value;

/// Keys accepted for the tool identifier, in lookup order.
const TOOL_KEYS: [&str; 2] = ["tool_name", "tool"];
/// Keys accepted for the tool payload, in lookup order.
const INPUT_KEYS: [&str; 2] = ["tool_input", "input"];

/// A normalized request: which tool, and the command text it would run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InvocationRequest {
    pub tool_kind: String,
    /// May be empty.
    pub command_text: String,
}

/// Why an ingress record could not be interpreted.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("no input received")]
    Empty,
    #[error("input is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("input is not a JSON object")]
    NotAnObject,
}

impl InvocationRequest {
    pub fn new(tool_kind: impl Into<String>, command_text: impl Into<String>) -> Self {
        Self {
            tool_kind: tool_kind.into(),
            command_text: command_text.into(),
        }
    }

    /// Parse and normalize a raw hook payload.
    pub fn from_json(raw: &str) -> Result<Self, RequestError> {
        if raw.trim().is_empty() {
            return Err(RequestError::Empty);
        }
        let value: Value = serde_json::from_str(raw)?;
        Self::from_value(&value)
    }

    /// Normalize an already-deserialized payload.
    ///
    /// Missing or non-string fields become empty strings; only a non-object
    /// top level is rejected.
    pub fn from_value(value: &Value) -> Result<Self, RequestError> {
        let Value::Object(map) = value else {
            return Err(RequestError::NotAnObject);
        };

        let tool_kind = TOOL_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_str))
            .unwrap_or_default();

        let command_text = INPUT_KEYS
            .iter()
            .find_map(|k| map.get(*k))
            .and_then(|input| input.get("command"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        Ok(Self::new(tool_kind, command_text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claude_code_field_names() {
        let req = InvocationRequest::from_json(
            r#"{"tool_name":"Bash","tool_input":{"command":"ls -la"}}"#,
        )
        .unwrap();
        assert_eq!(req, InvocationRequest::new("Bash", "ls -la"));
    }

    #[test]
    fn short_field_names() {
        let req =
            InvocationRequest::from_json(r#"{"tool":"Bash","input":{"command":"reboot"}}"#)
                .unwrap();
        assert_eq!(req, InvocationRequest::new("Bash", "reboot"));
    }

    #[test]
    fn missing_command_is_empty() {
        let req = InvocationRequest::from_json(r#"{"tool_name":"Bash","tool_input":{}}"#).unwrap();
        assert_eq!(req.command_text, "");
    }

    #[test]
    fn missing_input_is_empty() {
        let req = InvocationRequest::from_json(r#"{"tool_name":"Bash"}"#).unwrap();
        assert_eq!(req.command_text, "");
    }

    #[test]
    fn non_string_command_is_empty() {
        let req =
            InvocationRequest::from_json(r#"{"tool_name":"Bash","tool_input":{"command":42}}"#)
                .unwrap();
        assert_eq!(req.command_text, "");
    }

    #[test]
    fn missing_tool_is_empty() {
        let req = InvocationRequest::from_json(r#"{"tool_input":{"command":"reboot"}}"#).unwrap();
        assert_eq!(req.tool_kind, "");
        assert_eq!(req.command_text, "reboot");
    }

    #[test]
    fn extra_fields_are_ignored() {
        let req = InvocationRequest::from_json(
            r#"{"session_id":"abc","hook_event_name":"PreToolUse","tool_name":"Read","tool_input":{"file_path":"/x"}}"#,
        )
        .unwrap();
        assert_eq!(req, InvocationRequest::new("Read", ""));
    }

    #[test]
    fn blank_input_is_empty_error() {
        assert!(matches!(
            InvocationRequest::from_json("  \n"),
            Err(RequestError::Empty)
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            InvocationRequest::from_json("{not json"),
            Err(RequestError::Malformed(_))
        ));
    }

    #[test]
    fn array_is_not_an_object() {
        assert!(matches!(
            InvocationRequest::from_json("[1,2]"),
            Err(RequestError::NotAnObject)
        ));
    }
}

//! Claude Messages API request types (client-facing side).

use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeRequest {
    pub model: String,
    pub messages: Vec<ClaudeMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemPrompt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ClaudeToolDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ClaudeRequest {
    pub fn tools(&self) -> &[ClaudeToolDefinition] {
        self.tools.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeMessage {
    pub role: ClaudeRole,
    pub content: ClaudeContent,
}

impl ClaudeMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ClaudeRole::User,
            content: ClaudeContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ClaudeRole::Assistant,
            content: ClaudeContent::Text(text.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaudeRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaudeContent {
    Text(String),
    Blocks(Vec<ClaudeContentBlock>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClaudeContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
    /// Images, documents, thinking blocks: carried but contribute no text.
    #[serde(other)]
    Unsupported,
}

/// Renders a `tool_result` payload as plain text: strings verbatim, text
/// blocks concatenated, anything else as JSON.
pub fn tool_result_text(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item.get("text").and_then(Value::as_str) {
                Some(text) => text.to_string(),
                None => item.to_string(),
            })
            .collect::<Vec<_>>()
            .join(""),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SystemPrompt {
    Text(String),
    Blocks(Vec<ClaudeContentBlock>),
}

impl SystemPrompt {
    /// Text blocks joined without separator.
    pub fn text(&self) -> String {
        match self {
            SystemPrompt::Text(s) => s.clone(),
            SystemPrompt::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ClaudeContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}

/// Tool definition as declared by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeToolDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_schema")]
    pub input_schema: ToolInputSchema,
}

/// Loosely typed schema. Malformed `properties` or `required` values read as
/// empty, so a bad schema renders sparse instead of failing the request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(default, deserialize_with = "lenient_object")]
    pub properties: Map<String, Value>,
    #[serde(default, deserialize_with = "lenient_names")]
    pub required: Vec<String>,
    /// `type`, `additionalProperties`, `$schema` and friends.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn lenient_schema<'de, D>(deserializer: D) -> Result<ToolInputSchema, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        object @ Value::Object(_) => serde_json::from_value(object).map_err(de::Error::custom),
        _ => Ok(ToolInputSchema::default()),
    }
}

fn lenient_object<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => map,
        _ => Map::new(),
    })
}

/// Keeps the string entries of an array; anything else reads as empty.
fn lenient_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(name) => Some(name),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_with_mixed_content_deserializes() {
        let req: ClaudeRequest = serde_json::from_value(json!({
            "model": "claude-sonnet-4",
            "max_tokens": 1024,
            "system": [{"type": "text", "text": "Be brief."}],
            "messages": [
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": [
                    {"type": "text", "text": "checking"},
                    {"type": "tool_use", "id": "toolu_1", "name": "ls", "input": {"path": "."}}
                ]},
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "toolu_1", "content": "a.txt"},
                    {"type": "image", "source": {"type": "base64", "data": "AAAA"}}
                ]}
            ],
            "tools": [{"name": "ls", "input_schema": {"type": "object", "properties": {"path": {"type": "string"}}}}]
        }))
        .unwrap();

        assert_eq!(req.messages.len(), 3);
        assert_eq!(req.system.as_ref().unwrap().text(), "Be brief.");
        assert_eq!(req.tools().len(), 1);
        assert_eq!(req.tools()[0].input_schema.extra["type"], "object");
        match &req.messages[2].content {
            ClaudeContent::Blocks(blocks) => {
                assert!(matches!(blocks[1], ClaudeContentBlock::Unsupported))
            }
            _ => panic!("expected blocks"),
        }
    }

    #[test]
    fn test_tool_result_text_shapes() {
        assert_eq!(tool_result_text(&json!("ok")), "ok");
        assert_eq!(
            tool_result_text(&json!([{"type": "text", "text": "a"}, {"type": "text", "text": "b"}])),
            "ab"
        );
        assert_eq!(tool_result_text(&json!({"n": 1})), r#"{"n":1}"#);
        assert_eq!(tool_result_text(&Value::Null), "");
    }
}

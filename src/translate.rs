//! Claude Messages request → OpenAI chat request.
//!
//! Everything is flattened to text. Earlier tool calls are replayed in the
//! same `<invoke>` grammar the injected prompt teaches, so the model sees its
//! own past calls in the form it is expected to produce.

use crate::config::ProxyConfig;
use crate::types::claude::tool_result_text;
use crate::types::{
    ClaudeContent, ClaudeContentBlock, ClaudeMessage, ClaudeRequest, ClaudeRole,
    OpenAIChatMessage, OpenAIChatRequest,
};
use serde_json::Value;

pub fn to_openai_request(request: &ClaudeRequest, config: &ProxyConfig) -> OpenAIChatRequest {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = &request.system {
        let text = system.text();
        if !text.is_empty() {
            messages.push(OpenAIChatMessage::system(text));
        }
    }

    for message in &request.messages {
        messages.extend(translate_message(message));
    }

    OpenAIChatRequest {
        model: config
            .upstream_model_override
            .clone()
            .unwrap_or_else(|| request.model.clone()),
        messages,
        stream: true,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        top_p: request.top_p,
        stop: request.stop_sequences.clone(),
    }
}

fn translate_message(message: &ClaudeMessage) -> Vec<OpenAIChatMessage> {
    let role = match message.role {
        ClaudeRole::User => "user",
        ClaudeRole::Assistant => "assistant",
    };

    let blocks = match &message.content {
        ClaudeContent::Text(text) => {
            return vec![OpenAIChatMessage {
                role: role.to_string(),
                content: text.clone(),
            }]
        }
        ClaudeContent::Blocks(blocks) => blocks,
    };

    // Tool results become their own user turn after the message's other text.
    let mut text = String::new();
    let mut results = Vec::new();
    for block in blocks {
        match block {
            ClaudeContentBlock::Text { text: t } => text.push_str(t),
            ClaudeContentBlock::ToolUse { name, input, .. } => {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str(&render_invoke(name, input));
            }
            ClaudeContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                let status = if is_error.unwrap_or(false) {
                    " status=\"error\""
                } else {
                    ""
                };
                results.push(format!(
                    "<tool_result id=\"{}\"{}>{}</tool_result>",
                    tool_use_id,
                    status,
                    tool_result_text(content)
                ));
            }
            ClaudeContentBlock::Unsupported => {}
        }
    }

    let mut out = Vec::new();
    if !text.is_empty() {
        out.push(OpenAIChatMessage {
            role: role.to_string(),
            content: text,
        });
    }
    if !results.is_empty() {
        out.push(OpenAIChatMessage::user(results.join("\n")));
    }
    out
}

/// `<invoke name="..">` with one JSON-encoded `<parameter>` per input field.
pub fn render_invoke(name: &str, input: &Value) -> String {
    let mut out = format!("<invoke name=\"{}\">\n", name);
    if let Value::Object(fields) = input {
        for (key, value) in fields {
            let rendered = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.push_str(&format!(
                "<parameter name=\"{}\">{}</parameter>\n",
                key, rendered
            ));
        }
    }
    out.push_str("</invoke>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn claude(value: Value) -> ClaudeRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_system_and_plain_messages() {
        let req = claude(json!({
            "model": "claude-sonnet-4",
            "max_tokens": 512,
            "system": "Be brief.",
            "stop_sequences": ["END"],
            "messages": [{"role": "user", "content": "hi"}, {"role": "assistant", "content": "hello"}]
        }));
        let out = to_openai_request(&req, &ProxyConfig::default());
        assert_eq!(out.model, "claude-sonnet-4");
        assert!(out.stream);
        assert_eq!(out.max_tokens, Some(512));
        assert_eq!(out.stop, Some(vec!["END".to_string()]));
        assert_eq!(
            out.messages,
            vec![
                OpenAIChatMessage::system("Be brief."),
                OpenAIChatMessage::user("hi"),
                OpenAIChatMessage::assistant("hello"),
            ]
        );
    }

    #[test]
    fn test_model_override() {
        let req = claude(json!({"model": "claude-x", "messages": []}));
        let cfg = ProxyConfig {
            upstream_model_override: Some("llama-3-70b".to_string()),
            ..ProxyConfig::default()
        };
        assert_eq!(to_openai_request(&req, &cfg).model, "llama-3-70b");
    }

    #[test]
    fn test_tool_use_and_result_are_flattened() {
        let req = claude(json!({
            "model": "m",
            "messages": [
                {"role": "assistant", "content": [
                    {"type": "text", "text": "Let me look."},
                    {"type": "tool_use", "id": "toolu_1", "name": "ls", "input": {"path": "/tmp", "depth": 2}}
                ]},
                {"role": "user", "content": [
                    {"type": "tool_result", "tool_use_id": "toolu_1", "content": "a.txt"}
                ]}
            ]
        }));
        let out = to_openai_request(&req, &ProxyConfig::default());
        assert_eq!(out.messages.len(), 2);
        assert_eq!(out.messages[0].role, "assistant");
        assert_eq!(
            out.messages[0].content,
            "Let me look.\n<invoke name=\"ls\">\n<parameter name=\"path\">/tmp</parameter>\n<parameter name=\"depth\">2</parameter>\n</invoke>"
        );
        assert_eq!(
            out.messages[1],
            OpenAIChatMessage::user("<tool_result id=\"toolu_1\">a.txt</tool_result>")
        );
    }
}

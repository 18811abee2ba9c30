//! Input-token estimation for Claude requests.

use super::counter::{utf16_len, CharacterEstimator};
use super::registry::{self, TokenizerRegistry};
use crate::config::TokenMultiplier;
use crate::types::claude::tool_result_text;
use crate::types::{ClaudeContent, ClaudeContentBlock, ClaudeMessage, ClaudeRequest};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCountResult {
    pub input_tokens: u64,
}

/// Textual surface of the messages, one line per message. Tool calls are
/// rendered back as `<invoke>` fragments so they weigh what the model saw.
pub fn extract_text_from_messages(messages: &[ClaudeMessage]) -> String {
    messages
        .iter()
        .map(|message| match &message.content {
            ClaudeContent::Text(text) => text.clone(),
            ClaudeContent::Blocks(blocks) => blocks
                .iter()
                .map(|block| match block {
                    ClaudeContentBlock::Text { text } => text.clone(),
                    ClaudeContentBlock::ToolUse { name, input, .. } => {
                        format!("<invoke name=\"{}\">{}</invoke>", name, input)
                    }
                    ClaudeContentBlock::ToolResult { content, .. } => {
                        format!("<tool_result>{}</tool_result>", tool_result_text(content))
                    }
                    ClaudeContentBlock::Unsupported => String::new(),
                })
                .collect::<String>(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Estimate with the process-wide tokenizer registry.
pub fn estimate_input_tokens(
    request: &ClaudeRequest,
    multiplier: TokenMultiplier,
    request_id: &str,
) -> TokenCountResult {
    estimate_input_tokens_with(&registry::shared(), request, multiplier, request_id)
}

/// [`estimate_input_tokens`] on the blocking pool, for callers on an async
/// runtime. The first count for a model builds its BPE tables.
pub async fn estimate_input_tokens_blocking(
    request: &ClaudeRequest,
    multiplier: TokenMultiplier,
    request_id: &str,
) -> TokenCountResult {
    let owned = request.clone();
    let id = request_id.to_string();
    match tokio::task::spawn_blocking(move || estimate_input_tokens(&owned, multiplier, &id)).await
    {
        Ok(result) => result,
        Err(e) => {
            warn!(request_id, error = %e, "token estimation task failed, using character heuristic");
            let text = extract_text_from_messages(&request.messages);
            TokenCountResult {
                input_tokens: multiplier.apply(CharacterEstimator::new().estimate(&text) as u64),
            }
        }
    }
}

/// `ceil((messages + system + tools) × multiplier)`, each part counted with
/// the request model's tokenizer.
pub fn estimate_input_tokens_with(
    registry: &TokenizerRegistry,
    request: &ClaudeRequest,
    multiplier: TokenMultiplier,
    request_id: &str,
) -> TokenCountResult {
    let model = request.model.as_str();
    let text = extract_text_from_messages(&request.messages);
    let mut estimated = registry.count(&text, model);

    if let Some(system) = &request.system {
        estimated += registry.count(&system.text(), model);
    }

    if let Some(tools) = request.tools.as_ref().filter(|t| !t.is_empty()) {
        if let Ok(schema) = serde_json::to_string(tools) {
            estimated += registry.count(&schema, model);
        }
    }

    let adjusted = multiplier.apply(estimated as u64);

    debug!(
        request_id,
        text_length = utf16_len(&text),
        estimated_tokens = estimated,
        multiplier = multiplier.value(),
        adjusted_tokens = adjusted,
        "local token estimation"
    );

    TokenCountResult {
        input_tokens: adjusted,
    }
}

/// Handler body for `count_tokens` requests.
pub fn count_tokens(
    request: &ClaudeRequest,
    multiplier: TokenMultiplier,
    request_id: &str,
) -> TokenCountResult {
    debug!(
        request_id,
        model = request.model.as_str(),
        message_count = request.messages.len(),
        "counting tokens locally"
    );
    estimate_input_tokens(request, multiplier, request_id)
}

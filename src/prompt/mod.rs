//! Prompt injection for prompt-level tool calling.
//!
//! Backends without native function calling are taught a textual convention:
//! a per-request trigger signal followed by `<invoke>` XML. The system
//! message built here carries the tool catalogue and that convention; the
//! trigger returned in [`PromptInjection`] is what the output parser scans for.

pub mod template;
pub mod tools_xml;

pub use tools_xml::{build_tools_xml, escape_text};

use crate::ids::IdGenerator;
use crate::types::{ClaudeToolDefinition, OpenAIChatMessage, OpenAIChatRequest};

/// Result of [`inject_prompt`].
#[derive(Debug, Clone)]
pub struct PromptInjection {
    pub messages: Vec<OpenAIChatMessage>,
    /// `None` when no tools were supplied.
    pub trigger_signal: Option<String>,
}

/// Prepends the tool-calling system message to `request.messages`.
///
/// With no tools this is a pure pass-through. `trigger_signal` pins the
/// marker (replays, tests); otherwise a fresh one is drawn from `ids`.
pub fn inject_prompt(
    request: &OpenAIChatRequest,
    tools: &[ClaudeToolDefinition],
    trigger_signal: Option<&str>,
    ids: &dyn IdGenerator,
) -> PromptInjection {
    if tools.is_empty() {
        return PromptInjection {
            messages: request.messages.clone(),
            trigger_signal: None,
        };
    }

    let signal = trigger_signal
        .map(str::to_string)
        .unwrap_or_else(|| ids.trigger_signal());
    let system_prompt = template::render(&build_tools_xml(tools), &signal);

    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    messages.push(OpenAIChatMessage::system(system_prompt));
    messages.extend(request.messages.iter().cloned());

    tracing::debug!(
        tool_count = tools.len(),
        trigger_signal = signal.as_str(),
        "injected tool-calling system prompt"
    );

    PromptInjection {
        messages,
        trigger_signal: Some(signal),
    }
}

/// Applies [`inject_prompt`] in place, returning the trigger signal.
pub fn inject_into(
    request: &mut OpenAIChatRequest,
    tools: &[ClaudeToolDefinition],
    trigger_signal: Option<&str>,
    ids: &dyn IdGenerator,
) -> Option<String> {
    let injection = inject_prompt(request, tools, trigger_signal, ids);
    request.messages = injection.messages;
    injection.trigger_signal
}

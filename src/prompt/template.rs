//! Tool-calling instruction template.
//!
//! Placeholders: `{tools_list}` (substituted once) and `{trigger_signal}`
//! (every occurrence). Edit by appending; models have been tuned against the
//! existing wording.

pub const TOOLS_LIST_PLACEHOLDER: &str = "{tools_list}";
pub const TRIGGER_SIGNAL_PLACEHOLDER: &str = "{trigger_signal}";

pub const TOOL_CALL_TEMPLATE: &str = r#"
You can call tools in this conversation to answer the user's request.

Whenever you call a tool you MUST follow the format below exactly.

**1. Available tools**
These are the only tools available to you. Do not call, invent or assume any tool that is not listed here.
<tools>
{tools_list}
</tools>

**2. How to call a tool**
To call a tool, first print this trigger signal exactly: {trigger_signal}
The trigger signal MUST sit on a line of its own, with no other text, spaces or characters on that line.
You may explain your reasoning before the trigger signal, but once you decide to call a tool, {trigger_signal} comes first.
Print {trigger_signal} ONLY ONCE per response. Never repeat it.

Directly after the trigger signal, write the call inside <invoke> XML tags.

**3. Invocation format**
This is the only accepted format. Any deviation makes the call fail.

<format>
{trigger_signal}
<invoke name="Write">
<parameter name="file_path">/tmp/notes/weather.css</parameter>
<parameter name="content">body { background-color: lightblue; }</parameter>
</invoke>
</format>

RULES:
  - Reasoning or explanation is allowed before the trigger signal.
  - Before any tool call, print {trigger_signal} on its own line.
  - The trigger signal appears at most once per response.
  - Use the <invoke name="..."> and <parameter name="..."> tags exactly as shown, right after the trigger signal.
  - Write nothing after the closing </invoke> tag.
  - Keep parameter names exactly as declared, including punctuation and leading hyphens.
  - JSON-encode arrays and objects before placing them inside <parameter>.
  - Keep answers short when no tool is needed.
  - Each call returns a result; wait for that result before making the next call.
"#;

/// Substitutes the trigger everywhere, then the tool list once.
pub fn render(tools_xml: &str, trigger_signal: &str) -> String {
    TOOL_CALL_TEMPLATE
        .replace(TRIGGER_SIGNAL_PLACEHOLDER, trigger_signal)
        .replacen(TOOLS_LIST_PLACEHOLDER, tools_xml, 1)
}

//! Renders tool definitions into the XML catalogue embedded in the system prompt.

use crate::types::ClaudeToolDefinition;
use serde_json::Value;

pub const EMPTY_TOOL_LIST: &str = "<function_list>None</function_list>";

/// Escapes `<` and `>` so tool metadata cannot open or close tags.
pub fn escape_text(text: &str) -> String {
    text.replace('<', "&lt;").replace('>', "&gt;")
}

/// One `<tool id="N">` entry per definition, numbered from 1.
pub fn build_tools_xml(tools: &[ClaudeToolDefinition]) -> String {
    if tools.is_empty() {
        return EMPTY_TOOL_LIST.to_string();
    }

    let items: Vec<String> = tools
        .iter()
        .enumerate()
        .map(|(i, tool)| render_tool(i + 1, tool))
        .collect();
    format!("<function_list>\n{}\n</function_list>", items.join("\n"))
}

fn render_tool(id: usize, tool: &ClaudeToolDefinition) -> String {
    let schema = &tool.input_schema;

    let required_xml = if schema.required.is_empty() {
        "    <param>None</param>".to_string()
    } else {
        schema
            .required
            .iter()
            .map(|r| format!("    <param>{}</param>", escape_text(r)))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let parameters: Vec<String> = schema
        .properties
        .iter()
        .map(|(name, info)| render_parameter(name, info, schema.required.contains(name)))
        .collect();
    let parameters_xml = if parameters.is_empty() {
        "    <parameters>None</parameters>".to_string()
    } else {
        format!("    <parameters>\n{}\n    </parameters>", parameters.join("\n"))
    };

    [
        format!("  <tool id=\"{}\">", id),
        format!("    <name>{}</name>", escape_text(&tool.name)),
        format!(
            "    <description>{}</description>",
            escape_text(tool.description.as_deref().unwrap_or("None"))
        ),
        "    <required>".to_string(),
        required_xml,
        "    </required>".to_string(),
        parameters_xml,
        "  </tool>".to_string(),
    ]
    .join("\n")
}

fn render_parameter(name: &str, info: &Value, required: bool) -> String {
    let param_type = match info.get("type") {
        None | Some(Value::Null) => "any".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    let mut lines = vec![
        format!("    <parameter name=\"{}\">", escape_text(name)),
        format!("      <type>{}</type>", escape_text(&param_type)),
        format!("      <required>{}</required>", required),
    ];

    let description = match info.get("description") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    if !description.is_empty() {
        lines.push(format!(
            "      <description>{}</description>",
            escape_text(&description)
        ));
    }

    if let Some(values) = info.get("enum").filter(|v| !v.is_null()) {
        lines.push(format!("      <enum>{}</enum>", escape_text(&values.to_string())));
    }

    lines.push("    </parameter>".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(value: serde_json::Value) -> ClaudeToolDefinition {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_empty_list_placeholder() {
        assert_eq!(build_tools_xml(&[]), EMPTY_TOOL_LIST);
    }

    #[test]
    fn test_full_tool_rendering() {
        let xml = build_tools_xml(&[tool(json!({
            "name": "get_weather",
            "description": "Weather for <city>",
            "input_schema": {
                "type": "object",
                "properties": {
                    "city": {"type": "string", "description": "City name"},
                    "unit": {"type": "string", "enum": ["c", "f"]}
                },
                "required": ["city"]
            }
        }))]);

        let expected = r#"<function_list>
  <tool id="1">
    <name>get_weather</name>
    <description>Weather for &lt;city&gt;</description>
    <required>
    <param>city</param>
    </required>
    <parameters>
    <parameter name="city">
      <type>string</type>
      <required>true</required>
      <description>City name</description>
    </parameter>
    <parameter name="unit">
      <type>string</type>
      <required>false</required>
      <enum>["c","f"]</enum>
    </parameter>
    </parameters>
  </tool>
</function_list>"#;
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_sparse_tool_uses_none_sentinels() {
        let xml = build_tools_xml(&[tool(json!({"name": "noop"})), tool(json!({"name": "b"}))]);
        assert!(xml.contains("<description>None</description>"));
        assert!(xml.contains("<param>None</param>"));
        assert!(xml.contains("<parameters>None</parameters>"));
        assert!(xml.contains("<tool id=\"2\">"));
    }

    #[test]
    fn test_malformed_schemas_render_sparse() {
        let shapes = [
            json!({"name": "a", "input_schema": null}),
            json!({"name": "b", "input_schema": "object"}),
            json!({"name": "c", "input_schema": {"properties": null, "required": null}}),
            json!({"name": "d", "input_schema": {"properties": [], "required": "x"}}),
        ];
        for shape in shapes {
            let xml = build_tools_xml(&[tool(shape)]);
            assert!(xml.contains("<param>None</param>"), "{}", xml);
            assert!(xml.contains("<parameters>None</parameters>"), "{}", xml);
        }

        let mixed = build_tools_xml(&[tool(json!({
            "name": "e",
            "input_schema": {
                "type": "object",
                "properties": {"a": {"type": "string"}},
                "required": ["a", 1, null]
            }
        }))]);
        assert!(mixed.contains("<param>a</param>"));
        assert_eq!(mixed.matches("<param>").count(), 1);
        assert!(mixed.contains("<required>true</required>"));
    }

    #[test]
    fn test_request_with_malformed_tool_still_injects() {
        let request: crate::types::ClaudeRequest = serde_json::from_value(json!({
            "model": "m",
            "messages": [{"role": "user", "content": "hi"}],
            "tools": [
                {"name": "ok", "input_schema": {"properties": {"p": {"type": "string"}}}},
                {"name": "bad", "input_schema": {"properties": null, "required": [1]}}
            ]
        }))
        .unwrap();
        let xml = build_tools_xml(request.tools());
        assert!(xml.contains("<tool id=\"2\">"));
        assert!(xml.contains("<name>bad</name>"));
    }

    #[test]
    fn test_markup_in_metadata_is_escaped() {
        let xml = build_tools_xml(&[tool(json!({
            "name": "x",
            "description": "</tool><tool>",
            "input_schema": {"properties": {"p": {"description": "<b>", "enum": ["<a>"]}}}
        }))]);
        assert!(!xml.contains("</tool><tool>"));
        assert!(xml.contains("&lt;/tool&gt;&lt;tool&gt;"));
        assert!(xml.contains("<type>any</type>"));
        assert!(xml.contains(r#"<enum>["&lt;a&gt;"]</enum>"#));
    }
}

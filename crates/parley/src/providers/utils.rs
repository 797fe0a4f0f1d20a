use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{json, Map, Value};

use super::base::Usage;
use super::errors::{ProviderError, ProviderResult};
use crate::models::message::Message;
use crate::models::role::Role;
use crate::models::tool::{ToolCallRequest, ToolSchema};

lazy_static! {
    static ref VALID_FUNCTION_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Convert internal messages to the OpenAI chat completions message format
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|message| {
            let mut converted = Map::new();
            converted.insert("role".to_string(), json!(message.role));

            match &message.content {
                Some(text) => {
                    converted.insert("content".to_string(), json!(text));
                }
                // assistant turns that only request tools still need the key
                None => {
                    converted.insert("content".to_string(), Value::Null);
                }
            }

            if !message.tool_calls.is_empty() {
                let tool_calls: Vec<Value> = message
                    .tool_calls
                    .iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": call.arguments,
                            }
                        })
                    })
                    .collect();
                converted.insert("tool_calls".to_string(), json!(tool_calls));
            }

            if let Some(id) = &message.tool_call_id {
                converted.insert("tool_call_id".to_string(), json!(id));
            }

            Value::Object(converted)
        })
        .collect()
}

/// Convert tool schemas to OpenAI's function tool specification
pub fn tools_to_openai_spec(tools: &[ToolSchema]) -> ProviderResult<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(ProviderError::InvalidConfig(format!(
                "Duplicate tool name: {}",
                tool.name
            )));
        }
        if !is_valid_function_name(&tool.name) {
            return Err(ProviderError::InvalidConfig(format!(
                "Tool name '{}' must match [a-zA-Z0-9_-]+",
                tool.name
            )));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema(),
            }
        }));
    }

    Ok(result)
}

/// Convert an OpenAI chat completion response to an assistant message.
///
/// Argument blobs are kept exactly as the provider sent them; decoding
/// happens when the tool runs so a bad blob only affects that one call.
pub fn openai_response_to_message(response: &Value) -> ProviderResult<Message> {
    let original = response
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("message"))
        .ok_or_else(|| {
            ProviderError::MalformedResponse(format!("no choices in response: {}", response))
        })?;

    let mut message = Message::assistant();

    if let Some(text) = original.get("content").and_then(Value::as_str) {
        message = message.with_text(text);
    }

    if let Some(tool_calls) = original.get("tool_calls").and_then(Value::as_array) {
        for (index, tool_call) in tool_calls.iter().enumerate() {
            let id = tool_call["id"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("call_{}", index));
            let name = tool_call["function"]["name"]
                .as_str()
                .ok_or_else(|| {
                    ProviderError::MalformedResponse(format!(
                        "tool call {} has no function name",
                        id
                    ))
                })?
                .to_string();
            // some compatible backends send arguments as an object
            let arguments = match &tool_call["function"]["arguments"] {
                Value::String(blob) => blob.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            message = message.with_tool_call(ToolCallRequest::new(id, name, arguments));
        }
    }

    if message.content.is_none() && !message.has_tool_calls() {
        message = message.with_text("");
    }

    Ok(message)
}

pub fn get_openai_usage(data: &Value) -> Usage {
    let Some(usage) = data.get("usage") else {
        return Usage::default();
    };

    let read = |key: &str| usage.get(key).and_then(Value::as_i64).map(|v| v as i32);
    let input_tokens = read("prompt_tokens");
    let output_tokens = read("completion_tokens");
    let total_tokens = read("total_tokens").or_else(|| match (input_tokens, output_tokens) {
        (Some(input), Some(output)) => Some(input + output),
        _ => None,
    });

    Usage::new(input_tokens, output_tokens, total_tokens)
}

pub fn is_valid_function_name(name: &str) -> bool {
    VALID_FUNCTION_NAME.is_match(name)
}

pub fn check_openai_context_length_error(error: &Value) -> Option<ProviderError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ProviderError::ContextLengthExceeded(message))
    } else {
        None
    }
}

/// Messages Anthropic accepts as conversation turns; the system prompt is
/// sent separately
pub fn split_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
    let mut system: Option<String> = None;
    let mut rest = Vec::new();
    for message in messages {
        if message.role == Role::System {
            let text = message.text();
            system = Some(match system {
                Some(existing) => format!("{}\n\n{}", existing, text),
                None => text.to_string(),
            });
        } else {
            rest.push(message);
        }
    }
    (system, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tool::ParameterSchema;

    const OPENAI_TOOL_USE_RESPONSE: &str = r#"{
        "choices": [{
            "role": "assistant",
            "message": {
                "content": null,
                "tool_calls": [{
                    "id": "1",
                    "function": {
                        "name": "example_fn",
                        "arguments": "{\"param\": \"value\"}"
                    }
                }]
            }
        }],
        "usage": {
            "prompt_tokens": 10,
            "completion_tokens": 25,
            "total_tokens": 35
        }
    }"#;

    fn echo_schema(name: &str) -> ToolSchema {
        ToolSchema::new(
            name,
            "Echo the input",
            vec![ParameterSchema {
                name: "input".to_string(),
                json_type: "string".to_string(),
                enum_values: None,
                description: "Test parameter".to_string(),
                required: true,
            }],
        )
    }

    #[test]
    fn test_messages_to_openai_spec() {
        let messages = vec![
            Message::system().with_text("Be brief"),
            Message::user().with_text("Weather in Taipei?"),
            Message::assistant().with_tool_call(ToolCallRequest::new(
                "call_1",
                "get_current_weather",
                r#"{"location":"Taipei"}"#,
            )),
            Message::tool("call_1").with_text("Sunny, 30 celsius"),
        ];

        let spec = messages_to_openai_spec(&messages);

        assert_eq!(spec.len(), 4);
        assert_eq!(spec[0], json!({"role": "system", "content": "Be brief"}));
        assert_eq!(spec[2]["role"], "assistant");
        assert_eq!(spec[2]["content"], Value::Null);
        assert_eq!(spec[2]["tool_calls"][0]["function"]["name"], "get_current_weather");
        assert_eq!(
            spec[2]["tool_calls"][0]["function"]["arguments"],
            r#"{"location":"Taipei"}"#
        );
        assert_eq!(spec[3]["role"], "tool");
        assert_eq!(spec[3]["tool_call_id"], spec[2]["tool_calls"][0]["id"]);
    }

    #[test]
    fn test_tools_to_openai_spec() -> anyhow::Result<()> {
        let spec = tools_to_openai_spec(&[echo_schema("test_tool")])?;
        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["type"], "function");
        assert_eq!(spec[0]["function"]["name"], "test_tool");
        assert_eq!(spec[0]["function"]["parameters"]["required"], json!(["input"]));
        Ok(())
    }

    #[test]
    fn test_tools_to_openai_spec_duplicate() {
        let result = tools_to_openai_spec(&[echo_schema("test_tool"), echo_schema("test_tool")]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Duplicate tool name"));
    }

    #[test]
    fn test_tools_to_openai_spec_invalid_name() {
        assert!(tools_to_openai_spec(&[echo_schema("bad name")]).is_err());
    }

    #[test]
    fn test_is_valid_function_name() {
        assert!(is_valid_function_name("hello-world"));
        assert!(is_valid_function_name("hello_world"));
        assert!(!is_valid_function_name("hello world"));
        assert!(!is_valid_function_name("hello@world"));
    }

    #[test]
    fn test_openai_response_to_message_text() -> anyhow::Result<()> {
        let response = json!({
            "choices": [{
                "message": {"role": "assistant", "content": "Hello there"}
            }]
        });
        let message = openai_response_to_message(&response)?;
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.text(), "Hello there");
        assert!(!message.has_tool_calls());
        Ok(())
    }

    #[test]
    fn test_openai_response_to_message_tool_request() -> anyhow::Result<()> {
        let response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        let message = openai_response_to_message(&response)?;
        assert_eq!(
            message.tool_calls,
            vec![ToolCallRequest::new("1", "example_fn", r#"{"param": "value"}"#)]
        );
        assert_eq!(message.content, None);
        Ok(())
    }

    #[test]
    fn test_malformed_arguments_are_kept_verbatim() -> anyhow::Result<()> {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        response["choices"][0]["message"]["tool_calls"][0]["function"]["arguments"] =
            json!("invalid json {");
        let message = openai_response_to_message(&response)?;
        assert_eq!(message.tool_calls[0].arguments, "invalid json {");
        Ok(())
    }

    #[test]
    fn test_object_arguments_are_encoded() -> anyhow::Result<()> {
        let mut response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        response["choices"][0]["message"]["tool_calls"][0]["function"]["arguments"] =
            json!({"param": "value"});
        let message = openai_response_to_message(&response)?;
        assert_eq!(message.tool_calls[0].arguments, r#"{"param":"value"}"#);
        Ok(())
    }

    #[test]
    fn test_missing_choices_is_malformed() {
        let err = openai_response_to_message(&json!({"id": "x"})).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }

    #[test]
    fn test_get_openai_usage() -> anyhow::Result<()> {
        let response: Value = serde_json::from_str(OPENAI_TOOL_USE_RESPONSE)?;
        assert_eq!(
            get_openai_usage(&response),
            Usage::new(Some(10), Some(25), Some(35))
        );
        assert_eq!(get_openai_usage(&json!({})), Usage::default());
        Ok(())
    }

    #[test]
    fn test_check_openai_context_length_error() {
        let error = json!({
            "code": "context_length_exceeded",
            "message": "This message is too long"
        });
        assert_eq!(
            check_openai_context_length_error(&error),
            Some(ProviderError::ContextLengthExceeded(
                "This message is too long".to_string()
            ))
        );

        let error = json!({"code": "other_error", "message": "Some other error"});
        assert!(check_openai_context_length_error(&error).is_none());
    }

    #[test]
    fn test_split_system() {
        let messages = vec![
            Message::system().with_text("Be brief"),
            Message::user().with_text("hi"),
        ];
        let (system, rest) = split_system(&messages);
        assert_eq!(system.as_deref(), Some("Be brief"));
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].role, Role::User);
    }
}

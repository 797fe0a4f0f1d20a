use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A declarative description of a tool that can be offered to a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    pub description: String,
    /// Parameters the tool accepts, in declaration order
    pub parameters: Vec<ParameterSchema>,
}

/// The contract for a single tool parameter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParameterSchema {
    pub name: String,
    /// JSON schema type name ("string", "integer", "number", ...)
    #[serde(rename = "type")]
    pub json_type: String,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    pub description: String,
    pub required: bool,
}

impl ToolSchema {
    /// Create a new tool schema with the given name and description
    pub fn new<N, D>(name: N, description: D, parameters: Vec<ParameterSchema>) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        ToolSchema {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Names of the parameters that must be supplied, in declaration order
    pub fn required(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Render the parameter contract as a JSON schema object
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut property = Map::new();
            property.insert("type".to_string(), json!(param.json_type));
            if let Some(values) = &param.enum_values {
                property.insert("enum".to_string(), json!(values));
            }
            property.insert("description".to_string(), json!(param.description));
            properties.insert(param.name.clone(), Value::Object(property));
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": self.required(),
        })
    }
}

/// A model-issued request to invoke a tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallRequest {
    /// Identifier unique within one assistant turn
    pub id: String,
    /// The name of the tool to execute
    pub name: String,
    /// The JSON-encoded argument blob exactly as the provider produced it
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new<I, N, A>(id: I, name: N, arguments: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

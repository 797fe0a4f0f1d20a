//! Turn declared tool signatures into the call schemas offered to a model.
use crate::models::tool::{ParameterSchema, ToolSchema};
use crate::tools::{ParamType, ToolRegistry, ToolSignature};

/// Map a declared parameter type onto its JSON schema type name. Anything
/// without a schema equivalent is offered to the model as a string.
pub fn json_type(ty: &ParamType) -> &'static str {
    match ty {
        ParamType::String => "string",
        ParamType::Integer => "integer",
        ParamType::Float => "number",
        ParamType::Boolean => "boolean",
        ParamType::Mapping => "object",
        ParamType::Sequence => "array",
        ParamType::Literal(_) => "string",
        ParamType::Unannotated | ParamType::Other(_) => "string",
    }
}

/// Build the schema for one tool registered under `name`
pub fn tool_schema(name: &str, signature: &ToolSignature) -> ToolSchema {
    let parameters = signature
        .params
        .iter()
        .map(|param| ParameterSchema {
            name: param.name.clone(),
            json_type: json_type(&param.ty).to_string(),
            enum_values: match &param.ty {
                ParamType::Literal(values) => Some(values.clone()),
                _ => None,
            },
            description: param
                .description
                .clone()
                .unwrap_or_else(|| format!("The {} parameter", param.name)),
            required: param.is_required(),
        })
        .collect();

    ToolSchema::new(
        name,
        signature.description.clone().unwrap_or_default(),
        parameters,
    )
}

/// Generate schemas for a sequence of `(registered name, signature)` pairs, in
/// the order given.
pub fn generate<'a, I>(tools: I) -> Vec<ToolSchema>
where
    I: IntoIterator<Item = (&'a str, &'a ToolSignature)>,
{
    tools
        .into_iter()
        .map(|(name, signature)| tool_schema(name, signature))
        .collect()
}

/// Generate schemas for everything in the registry, ordered by tool name
pub fn generate_tool_schemas(registry: &ToolRegistry) -> Vec<ToolSchema> {
    generate(registry.all().map(|(name, tool)| (name, tool.signature())))
}

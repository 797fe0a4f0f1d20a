use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tera::{Context, Error as TeraError, Tera};

use crate::models::tool::ToolSchema;

const DEFAULT_SYSTEM_PROMPT: &str = include_str!("prompts/system.md");

/// Get the path to the prompts directory
fn prompts_dir() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir).join("src").join("prompts")
}

pub fn load_prompt<T: Serialize>(template: &str, context_data: &T) -> Result<String, TeraError> {
    let mut tera = Tera::default();
    tera.add_raw_template("inline_template", template)?;
    let context = Context::from_serialize(context_data)?;
    let rendered = tera.render("inline_template", &context)?;
    Ok(rendered)
}

pub fn load_prompt_file<T: Serialize>(
    template_file: impl Into<PathBuf>,
    context_data: &T,
) -> Result<String, TeraError> {
    let template_path = template_file.into();
    // fall back to the bundled prompts directory
    let file_path = if !template_path.exists() {
        prompts_dir().join(template_path)
    } else {
        template_path
    };

    let template_content = fs::read_to_string(file_path)
        .map_err(|e| TeraError::chain("Failed to read template file", e))?;
    load_prompt(&template_content, context_data)
}

#[derive(Serialize)]
struct SystemPromptContext<'a> {
    tools: &'a [ToolSchema],
}

/// Render the bundled system prompt, listing the tools on offer
pub fn default_system_prompt(tools: &[ToolSchema]) -> Result<String, TeraError> {
    load_prompt(DEFAULT_SYSTEM_PROMPT, &SystemPromptContext { tools })
}

/// Render a system prompt template file with the tools on offer
pub fn system_prompt_file(
    template_file: impl Into<PathBuf>,
    tools: &[ToolSchema],
) -> Result<String, TeraError> {
    load_prompt_file(template_file, &SystemPromptContext { tools })
}

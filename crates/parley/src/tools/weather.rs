use async_trait::async_trait;

use super::{register_tool, Param, ParamType, ToolArgs, ToolFunction, ToolRegistration};
use super::{ToolResult, ToolSignature, ToolSource};

/// A demo weather lookup that always reports the same conditions
pub struct WeatherTool {
    signature: ToolSignature,
}

impl WeatherTool {
    pub fn new() -> Self {
        let signature = ToolSignature::new("get_current_weather")
            .with_description("Get the current weather in a given city")
            .with_param(
                Param::required("location", ParamType::String)
                    .with_description("The city to report on"),
            )
            .with_param(Param::optional(
                "unit",
                ParamType::literal(["celsius", "fahrenheit"]),
                "celsius",
            ));
        Self { signature }
    }
}

impl Default for WeatherTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolFunction for WeatherTool {
    fn signature(&self) -> &ToolSignature {
        &self.signature
    }

    async fn call(&self, args: ToolArgs) -> ToolResult<String> {
        let location = args.str("location")?;
        let unit = args.str("unit")?;
        let temperature = match unit {
            "fahrenheit" => 82,
            _ => 28,
        };
        Ok(format!(
            "It is currently {} degrees in {} (unit: {})",
            temperature, location, unit
        ))
    }
}

/// Tools that need no external services
pub struct DemoTools;

impl ToolSource for DemoTools {
    fn name(&self) -> &str {
        "demo"
    }

    fn tools(&self) -> ToolResult<Vec<ToolRegistration>> {
        Ok(vec![register_tool(WeatherTool::new())])
    }
}

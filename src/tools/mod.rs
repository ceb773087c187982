pub mod temperature;
pub mod weather;

use log::{ info, warn };
use serde_json::{ json, Value as JsonValue };
use std::sync::Arc;
use thiserror::Error;

use crate::llm::chat::ToolDefinition;
use self::temperature::ConvertFahrenheitToCelsius;
use self::weather::Weather;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool '{0}' is not available")]
    UnknownTool(String),
    #[error("Invalid arguments for tool '{tool}': {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A function the model may call mid-generation.
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema of the arguments object.
    fn parameters(&self) -> JsonValue;
    fn execute(&self, arguments: JsonValue) -> Result<JsonValue, ToolError>;
}

#[derive(Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    /// Parses the model's raw argument text. Empty text means no arguments.
    pub fn parse_arguments(tool: &str, raw: &str) -> Result<JsonValue, ToolError> {
        if raw.trim().is_empty() {
            return Ok(json!({}));
        }
        serde_json::from_str(raw).map_err(|source| ToolError::InvalidArguments {
            tool: tool.to_string(),
            source,
        })
    }

    pub fn execute(&self, name: &str, arguments: JsonValue) -> Result<JsonValue, ToolError> {
        let tool = self.tools
            .iter()
            .find(|tool| tool.name() == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        info!("Executing tool '{}' with {}", name, arguments);
        tool.execute(arguments)
    }

    /// Tool failures become an `{ "error": ... }` result so the model can
    /// recover instead of the request failing.
    pub fn execute_or_report(&self, name: &str, arguments: JsonValue) -> JsonValue {
        match self.execute(name, arguments) {
            Ok(result) => result,
            Err(e) => {
                warn!("Tool '{}' failed: {}", name, e);
                json!({ "error": e.to_string() })
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new(vec![Arc::new(Weather), Arc::new(ConvertFahrenheitToCelsius)])
    }
}

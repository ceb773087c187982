use rand::Rng;
use serde::{ Deserialize, Serialize };
use serde_json::{ json, Value as JsonValue };

use super::{ Tool, ToolError };

pub const MIN_TEMPERATURE: i64 = 32;
pub const MAX_TEMPERATURE: i64 = 90;

#[derive(Deserialize)]
struct WeatherArgs {
    location: String,
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct WeatherReport {
    pub location: String,
    pub temperature: i64,
}

/// Placeholder weather source: random Fahrenheit reading for any location.
pub struct Weather;

impl Weather {
    pub fn report(location: &str) -> WeatherReport {
        let temperature = rand::thread_rng().gen_range(MIN_TEMPERATURE..=MAX_TEMPERATURE);
        WeatherReport { location: location.to_string(), temperature }
    }
}

impl Tool for Weather {
    fn name(&self) -> &'static str {
        "weather"
    }

    fn description(&self) -> &'static str {
        "Get the weather in a location (farenheit)"
    }

    fn parameters(&self) -> JsonValue {
        json!({
            "type": "object",
            "properties": {
                "location": {
                    "type": "string",
                    "description": "The location to get the weather for"
                }
            },
            "required": ["location"],
            "additionalProperties": false
        })
    }

    fn execute(&self, arguments: JsonValue) -> Result<JsonValue, ToolError> {
        let args: WeatherArgs = serde_json
            ::from_value(arguments)
            .map_err(|source| ToolError::InvalidArguments { tool: self.name().to_string(), source })?;
        let report = Self::report(&args.location);
        Ok(json!(report))
    }
}

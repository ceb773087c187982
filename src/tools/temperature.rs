use serde::Deserialize;
use serde_json::{ json, Value as JsonValue };

use super::{ Tool, ToolError };

#[derive(Deserialize)]
struct ConvertArgs {
    temperature: f64,
}

/// Largest magnitude at which every integer is exactly representable in `f64`.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// `round((f - 32) * 5/9)`, with halves rounded toward positive infinity.
pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    ((fahrenheit - 32.0) * (5.0 / 9.0) + 0.5).floor()
}

/// Whole results serialize as JSON integers; values beyond the exact
/// integer range stay floats instead of saturating.
fn celsius_json(celsius: f64) -> JsonValue {
    if celsius.abs() <= MAX_SAFE_INTEGER {
        json!(celsius as i64)
    } else {
        json!(celsius)
    }
}

pub struct ConvertFahrenheitToCelsius;

impl Tool for ConvertFahrenheitToCelsius {
    // Misspelling is part of the tool name the model sees.
    fn name(&self) -> &'static str {
        "convertFarenheitToCelsius"
    }

    fn description(&self) -> &'static str {
        "Convert a temperature in farenheit to celsius"
    }

    fn parameters(&self) -> JsonValue {
        json!({
            "type": "object",
            "properties": {
                "temperature": {
                    "type": "number",
                    "description": "The temperature in farenheit to convert"
                }
            },
            "required": ["temperature"],
            "additionalProperties": false
        })
    }

    fn execute(&self, arguments: JsonValue) -> Result<JsonValue, ToolError> {
        let args: ConvertArgs = serde_json
            ::from_value(arguments)
            .map_err(|source| ToolError::InvalidArguments { tool: self.name().to_string(), source })?;
        Ok(json!({ "celsius": celsius_json(fahrenheit_to_celsius(args.temperature)) }))
    }
}

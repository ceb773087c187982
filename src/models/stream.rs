use serde::{ Serialize, Deserialize };
use serde_json::Value as JsonValue;

/// One event of the relay's response stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum StreamPart {
    TextDelta {
        text: String,
    },
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        arguments: JsonValue,
    },
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        result: JsonValue,
    },
    Finish {
        finish_reason: String,
    },
    Error {
        message: String,
    },
}

impl StreamPart {
    /// SSE event name; tool parts are tagged `tool-<name>`. The name comes
    /// from the model, so control characters are replaced with `_` to keep
    /// the event on one line.
    pub fn event_name(&self) -> String {
        match self {
            StreamPart::TextDelta { .. } => "text-delta".to_string(),
            | StreamPart::ToolCall { tool_name, .. }
            | StreamPart::ToolResult { tool_name, .. } => {
                let name: String = tool_name
                    .chars()
                    .map(|c| if c.is_control() { '_' } else { c })
                    .collect();
                format!("tool-{}", name)
            }
            StreamPart::Finish { .. } => "finish".to_string(),
            StreamPart::Error { .. } => "error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_parts_use_camel_case_fields() {
        let part = StreamPart::ToolResult {
            tool_call_id: "call_1".into(),
            tool_name: "convertFarenheitToCelsius".into(),
            result: json!({ "celsius": 100 }),
        };
        assert_eq!(
            serde_json::to_value(&part).unwrap(),
            json!({
                "type": "tool-result",
                "toolCallId": "call_1",
                "toolName": "convertFarenheitToCelsius",
                "result": { "celsius": 100 }
            })
        );
        assert_eq!(part.event_name(), "tool-convertFarenheitToCelsius");
    }

    #[test]
    fn finish_reason_is_camel_case() {
        let part: StreamPart = serde_json
            ::from_str(r#"{"type":"finish","finishReason":"stop"}"#)
            .unwrap();
        assert_eq!(part, StreamPart::Finish { finish_reason: "stop".into() });
        assert_eq!(part.event_name(), "finish");
    }

    #[test]
    fn tool_event_name_stays_on_one_line() {
        let part = StreamPart::ToolCall {
            tool_call_id: "call_1".into(),
            tool_name: "wea\nther\r".into(),
            arguments: json!({}),
        };
        assert_eq!(part.event_name(), "tool-wea_ther_");
    }
}

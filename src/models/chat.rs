use serde::{ Serialize, Deserialize };
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A tool call made by the model, with the result the relay fed back to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_call_id: String,
    pub tool_name: String,
    pub arguments: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    ToolInvocation(ToolInvocation),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<MessagePart>),
}

impl MessageContent {
    /// Concatenated prose of the message, ignoring tool payloads.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) =>
                parts
                    .iter()
                    .filter_map(|part| match part {
                        MessagePart::Text { text } => Some(text.as_str()),
                        MessagePart::ToolInvocation(_) => None,
                    })
                    .collect(),
        }
    }

    pub fn tool_invocations(&self) -> Vec<&ToolInvocation> {
        match self {
            MessageContent::Text(_) => Vec::new(),
            MessageContent::Parts(parts) =>
                parts
                    .iter()
                    .filter_map(|part| match part {
                        MessagePart::ToolInvocation(invocation) => Some(invocation),
                        MessagePart::Text { .. } => None,
                    })
                    .collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: String,
    pub role: Role,
    pub content: MessageContent,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn assistant_parts(parts: Vec<MessagePart>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: MessageContent::Parts(parts),
        }
    }
}

/// Append-only message list. Appending returns a new conversation and leaves
/// every earlier snapshot untouched.
#[derive(Clone, Debug, Default)]
pub struct Conversation {
    messages: Arc<Vec<Message>>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn appended(&self, message: Message) -> Self {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.extend(self.messages.iter().cloned());
        messages.push(message);
        Self { messages: Arc::new(messages) }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_plain_and_structured_content() {
        let body = json!({
            "messages": [
                { "role": "user", "content": "weather in Paris?" },
                {
                    "id": "a1",
                    "role": "assistant",
                    "content": [
                        {
                            "type": "tool-invocation",
                            "toolCallId": "call_1",
                            "toolName": "weather",
                            "arguments": { "location": "Paris" },
                            "result": { "location": "Paris", "temperature": 70 }
                        },
                        { "type": "text", "text": "It is 70F." }
                    ]
                }
            ]
        });

        let request: ChatRequest = serde_json::from_value(body).unwrap();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].id, "");
        assert_eq!(request.messages[0].content.text(), "weather in Paris?");

        let assistant = &request.messages[1];
        assert_eq!(assistant.role, Role::Assistant);
        assert_eq!(assistant.content.text(), "It is 70F.");
        let invocations = assistant.content.tool_invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].tool_name, "weather");
    }

    #[test]
    fn rejects_unknown_role() {
        let body = json!({ "messages": [{ "role": "system", "content": "hi" }] });
        assert!(serde_json::from_value::<ChatRequest>(body).is_err());
    }

    #[test]
    fn appending_keeps_earlier_snapshots() {
        let empty = Conversation::new();
        let one = empty.appended(Message::user("hello"));
        let two = one.appended(Message::assistant("hi"));

        assert!(empty.is_empty());
        assert_eq!(one.len(), 1);
        assert_eq!(two.len(), 2);
        assert_eq!(two.last().map(|m| m.role), Some(Role::Assistant));
        assert_ne!(two.messages()[0].id, two.messages()[1].id);
    }
}

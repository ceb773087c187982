use serde_json::Value as JsonValue;

use super::ClientError;
use crate::models::chat::{ Message, MessagePart, ToolInvocation };
use crate::models::stream::StreamPart;

/// Folds a relay stream into a single assistant message.
#[derive(Debug, Default)]
pub struct ReplyBuilder {
    parts: Vec<MessagePart>,
    finished: bool,
}

impl ReplyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, part: StreamPart) -> Result<(), ClientError> {
        match part {
            StreamPart::TextDelta { text } => {
                match self.parts.last_mut() {
                    Some(MessagePart::Text { text: current }) => current.push_str(&text),
                    _ => self.parts.push(MessagePart::Text { text }),
                }
            }
            StreamPart::ToolCall { tool_call_id, tool_name, arguments } => {
                self.parts.push(
                    MessagePart::ToolInvocation(ToolInvocation {
                        tool_call_id,
                        tool_name,
                        arguments,
                        result: None,
                    })
                );
            }
            StreamPart::ToolResult { tool_call_id, tool_name, result } => {
                match self.pending_invocation(&tool_call_id) {
                    Some(invocation) => {
                        invocation.result = Some(result);
                    }
                    None => {
                        self.parts.push(
                            MessagePart::ToolInvocation(ToolInvocation {
                                tool_call_id,
                                tool_name,
                                arguments: JsonValue::Null,
                                result: Some(result),
                            })
                        );
                    }
                }
            }
            StreamPart::Finish { .. } => {
                self.finished = true;
            }
            StreamPart::Error { message } => {
                return Err(ClientError::Relay(message));
            }
        }
        Ok(())
    }

    fn pending_invocation(&mut self, tool_call_id: &str) -> Option<&mut ToolInvocation> {
        self.parts.iter_mut().rev().find_map(|part| match part {
            MessagePart::ToolInvocation(invocation) if
                invocation.tool_call_id == tool_call_id &&
                invocation.result.is_none()
            => Some(invocation),
            _ => None,
        })
    }

    pub fn finish(self) -> Result<Message, ClientError> {
        if !self.finished {
            return Err(ClientError::Incomplete);
        }
        Ok(Message::assistant_parts(self.parts))
    }
}

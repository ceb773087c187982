use std::fmt;

use crate::models::chat::{ Message, MessageContent, MessagePart, Role };

#[derive(Debug, Clone, PartialEq)]
pub enum RenderedBlock<'a> {
    Prose(&'a str),
    /// Pretty-printed JSON of a tool invocation.
    ToolPayload(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage<'a> {
    pub id: &'a str,
    pub role: Role,
    pub blocks: Vec<RenderedBlock<'a>>,
}

impl RenderedMessage<'_> {
    pub fn label(&self) -> &'static str {
        match self.role {
            Role::User => "User: ",
            Role::Assistant => "AI: ",
        }
    }
}

impl fmt::Display for RenderedMessage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())?;
        for (i, block) in self.blocks.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            match block {
                RenderedBlock::Prose(text) => write!(f, "{}", text)?,
                RenderedBlock::ToolPayload(json) => write!(f, "\n```json\n{}\n```", json)?,
            }
        }
        Ok(())
    }
}

pub fn render_message(message: &Message) -> RenderedMessage<'_> {
    let blocks = match &message.content {
        MessageContent::Text(text) => vec![RenderedBlock::Prose(text.as_str())],
        MessageContent::Parts(parts) =>
            parts
                .iter()
                .map(|part| match part {
                    MessagePart::Text { text } => RenderedBlock::Prose(text.as_str()),
                    MessagePart::ToolInvocation(invocation) =>
                        RenderedBlock::ToolPayload(
                            serde_json
                                ::to_string_pretty(invocation)
                                .unwrap_or_else(|_| invocation.tool_name.clone())
                        ),
                })
                .collect(),
    };

    RenderedMessage { id: &message.id, role: message.role, blocks }
}

/// Lazily renders messages in conversation order.
pub fn render_history(messages: &[Message]) -> impl Iterator<Item = RenderedMessage<'_>> {
    messages.iter().map(render_message)
}

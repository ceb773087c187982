use futures::{ Stream, StreamExt };
use log::{ debug, error, info };
use serde_json::{ json, Value as JsonValue };
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::llm::chat::{ CompletionClient, ModelEvent, ModelMessage, ModelStream, ToolCallRequest, ToolDefinition };
use crate::llm::LlmError;
use crate::models::chat::{ Message, MessageContent, MessagePart, Role };
use crate::models::stream::StreamPart;
use crate::tools::ToolRegistry;

pub const DEFAULT_MAX_STEPS: usize = 5;

pub type PartStream = Pin<Box<dyn Stream<Item = StreamPart> + Send>>;

/// Forwards a conversation to the model and runs the tool round trips it asks
/// for. Holds no per-conversation state.
pub struct Relay {
    chat_client: Arc<dyn CompletionClient>,
    tools: ToolRegistry,
    max_steps: usize,
}

impl Relay {
    pub fn new(chat_client: Arc<dyn CompletionClient>, tools: ToolRegistry, max_steps: usize) -> Self {
        Self {
            chat_client,
            tools,
            max_steps: max_steps.max(1),
        }
    }

    pub fn model(&self) -> String {
        self.chat_client.get_model()
    }

    /// Opens the first model step before returning, so an unreachable or
    /// failing upstream is reported to the caller instead of inside the stream.
    pub async fn stream_reply(&self, messages: &[Message]) -> Result<PartStream, LlmError> {
        let history = to_model_messages(messages);
        let definitions = self.tools.definitions();
        info!("Relaying {} message(s) with {} tool(s)", history.len(), definitions.len());

        let first_step = self.chat_client.stream_chat(&history, &definitions).await.map_err(|e| {
            error!("Model request failed: {}", e);
            e
        })?;

        let (tx, rx) = mpsc::channel(32);
        let steps = StepRunner {
            chat_client: Arc::clone(&self.chat_client),
            tools: self.tools.clone(),
            definitions,
            max_steps: self.max_steps,
            tx,
        };
        tokio::spawn(steps.run(history, first_step));

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

struct StepRunner {
    chat_client: Arc<dyn CompletionClient>,
    tools: ToolRegistry,
    definitions: Vec<ToolDefinition>,
    max_steps: usize,
    tx: mpsc::Sender<StreamPart>,
}

enum StepOutcome {
    Finished(String),
    ToolCalls {
        text: String,
        calls: Vec<ToolCallRequest>,
    },
    Failed(String),
    Disconnected,
}

impl StepRunner {
    async fn run(self, mut history: Vec<ModelMessage>, first_step: ModelStream) {
        let mut step_stream = first_step;
        let mut step = 1;

        loop {
            let (text, calls) = match self.drain_step(step_stream).await {
                StepOutcome::Finished(reason) => {
                    let _ = self.send(StreamPart::Finish { finish_reason: reason }).await;
                    return;
                }
                StepOutcome::Failed(message) => {
                    let _ = self.send(StreamPart::Error { message }).await;
                    return;
                }
                StepOutcome::Disconnected => {
                    debug!("Client went away during step {}", step);
                    return;
                }
                StepOutcome::ToolCalls { text, calls } => (text, calls),
            };

            history.push(ModelMessage::Assistant { content: text, tool_calls: calls.clone() });
            for call in calls {
                let result = match self.invoke(&call).await {
                    Some(result) => result,
                    None => {
                        return;
                    }
                };
                history.push(ModelMessage::Tool {
                    tool_call_id: call.id,
                    content: result.to_string(),
                });
            }

            if step >= self.max_steps {
                info!("Step limit {} reached with tool calls pending", self.max_steps);
                let _ = self.send(StreamPart::Finish { finish_reason: "tool-calls".to_string() }).await;
                return;
            }
            step += 1;

            step_stream = match self.chat_client.stream_chat(&history, &self.definitions).await {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Model request failed at step {}: {}", step, e);
                    let _ = self.send(StreamPart::Error { message: e.to_string() }).await;
                    return;
                }
            };
        }
    }

    async fn drain_step(&self, mut step_stream: ModelStream) -> StepOutcome {
        let mut text = String::new();
        let mut calls = Vec::new();
        let mut finish_reason = "stop".to_string();

        while let Some(event) = step_stream.next().await {
            match event {
                Ok(ModelEvent::TextDelta(delta)) => {
                    text.push_str(&delta);
                    if !self.send(StreamPart::TextDelta { text: delta }).await {
                        return StepOutcome::Disconnected;
                    }
                }
                Ok(ModelEvent::ToolCall(call)) => calls.push(call),
                Ok(ModelEvent::Finish(reason)) => {
                    finish_reason = reason.replace('_', "-");
                }
                Err(e) => {
                    error!("Model stream failed: {}", e);
                    return StepOutcome::Failed(e.to_string());
                }
            }
        }

        if calls.is_empty() {
            StepOutcome::Finished(finish_reason)
        } else {
            StepOutcome::ToolCalls { text, calls }
        }
    }

    /// Emits the call and its result; `None` once the client is gone.
    async fn invoke(&self, call: &ToolCallRequest) -> Option<JsonValue> {
        let (arguments, result) = match ToolRegistry::parse_arguments(&call.name, &call.arguments) {
            Ok(arguments) => {
                let result = self.tools.execute_or_report(&call.name, arguments.clone());
                (arguments, result)
            }
            Err(e) => (JsonValue::String(call.arguments.clone()), json!({ "error": e.to_string() })),
        };

        let call_part = StreamPart::ToolCall {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments,
        };
        if !self.send(call_part).await {
            return None;
        }
        let result_part = StreamPart::ToolResult {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result: result.clone(),
        };
        if !self.send(result_part).await {
            return None;
        }
        Some(result)
    }

    async fn send(&self, part: StreamPart) -> bool {
        self.tx.send(part).await.is_ok()
    }
}

/// Converts client history to the model's format. Tool invocations that carry
/// a result are replayed as a tool-call message followed by the results.
pub fn to_model_messages(messages: &[Message]) -> Vec<ModelMessage> {
    let mut history = Vec::new();
    for message in messages {
        match (message.role, &message.content) {
            (Role::User, content) => history.push(ModelMessage::User(content.text())),
            (Role::Assistant, MessageContent::Text(text)) => {
                history.push(ModelMessage::Assistant {
                    content: text.clone(),
                    tool_calls: Vec::new(),
                });
            }
            (Role::Assistant, MessageContent::Parts(parts)) => push_assistant_parts(&mut history, parts),
        }
    }
    history
}

fn push_assistant_parts(history: &mut Vec<ModelMessage>, parts: &[MessagePart]) {
    let mut text = String::new();
    let mut calls = Vec::new();
    let mut results = Vec::new();

    for part in parts {
        match part {
            MessagePart::Text { text: chunk } => {
                if !calls.is_empty() {
                    flush_tool_round(history, &mut text, &mut calls, &mut results);
                }
                text.push_str(chunk);
            }
            MessagePart::ToolInvocation(invocation) => {
                let Some(result) = &invocation.result else {
                    continue;
                };
                calls.push(ToolCallRequest {
                    id: invocation.tool_call_id.clone(),
                    name: invocation.tool_name.clone(),
                    arguments: invocation.arguments.to_string(),
                });
                results.push(ModelMessage::Tool {
                    tool_call_id: invocation.tool_call_id.clone(),
                    content: result.to_string(),
                });
            }
        }
    }

    if !calls.is_empty() {
        flush_tool_round(history, &mut text, &mut calls, &mut results);
    }
    if !text.is_empty() {
        history.push(ModelMessage::Assistant { content: text, tool_calls: Vec::new() });
    }
}

fn flush_tool_round(
    history: &mut Vec<ModelMessage>,
    text: &mut String,
    calls: &mut Vec<ToolCallRequest>,
    results: &mut Vec<ModelMessage>
) {
    history.push(ModelMessage::Assistant {
        content: std::mem::take(text),
        tool_calls: std::mem::take(calls),
    });
    history.append(results);
}

pub mod openai;

use async_trait::async_trait;
use futures::{ Stream, Future };
use serde_json::Value as JsonValue;
use std::pin::Pin;
use std::sync::Arc;
use super::{ LlmConfig, LlmError };
use self::openai::OpenAIChatClient;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// A message in the model's own conversation format.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelMessage {
    User(String),
    Assistant {
        content: String,
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// Raw JSON text exactly as the model produced it.
    pub arguments: String,
}

#[derive(Clone, Debug)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: JsonValue,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ModelEvent {
    TextDelta(String),
    /// Emitted once the call's arguments are complete.
    ToolCall(ToolCallRequest),
    Finish(String),
}

pub type ModelStream = Pin<Box<dyn Stream<Item = Result<ModelEvent, LlmError>> + Send>>;

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Starts one model step. Errors raised before the first byte of the
    /// stream (unreachable host, non-2xx status) are returned here; later
    /// failures arrive as stream items.
    async fn stream_chat(
        &self,
        messages: &[ModelMessage],
        tools: &[ToolDefinition]
    ) -> Result<ModelStream, LlmError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> String;
}

pub fn create_streaming_response<F, Fut>(response_fn: F) -> ModelStream
    where
        F: FnOnce(mpsc::Sender<Result<ModelEvent, LlmError>>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static
{
    let (tx, rx) = mpsc::channel(32);

    tokio::spawn(async move {
        response_fn(tx).await;
    });

    Box::pin(ReceiverStream::new(rx))
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn CompletionClient>, LlmError> {
    let client = OpenAIChatClient::from_config(config)?;
    Ok(Arc::new(client))
}

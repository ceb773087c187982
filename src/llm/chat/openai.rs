use async_trait::async_trait;
use futures::StreamExt;
use log::{ debug, error, info };
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;

use super::{
    create_streaming_response,
    CompletionClient,
    ModelEvent,
    ModelMessage,
    ModelStream,
    ToolCallRequest,
    ToolDefinition,
};
use crate::llm::sse::SseDecoder;
use crate::llm::{ LlmConfig, LlmError, DEFAULT_CHAT_MODEL };

const CHAT_COMPLETIONS_ROUTE: &str = "/chat/completions";

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
    request_timeout: Option<Duration>,
}

#[derive(Serialize, Debug)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAITool>,
    stream: bool,
}

#[derive(Serialize, Debug)]
struct OpenAIMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Debug)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: &'static str,
    function: OpenAIFunctionCall,
}

#[derive(Serialize, Debug)]
struct OpenAIFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Serialize, Debug)]
struct OpenAITool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: OpenAIFunction,
}

#[derive(Serialize, Debug)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Deserialize, Debug)]
struct OpenAIStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    /// Set when the endpoint fails after the stream has started.
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: OpenAIDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
struct OpenAIDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCallDelta>>,
}

#[derive(Deserialize, Debug)]
struct OpenAIToolCallDelta {
    index: usize,
    id: Option<String>,
    function: Option<OpenAIFunctionDelta>,
}

#[derive(Deserialize, Debug)]
struct OpenAIFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

impl From<&ModelMessage> for OpenAIMessage {
    fn from(message: &ModelMessage) -> Self {
        match message {
            ModelMessage::User(content) =>
                OpenAIMessage {
                    role: "user",
                    content: Some(content.clone()),
                    tool_calls: None,
                    tool_call_id: None,
                },
            ModelMessage::Assistant { content, tool_calls } => {
                let tool_calls = if tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        tool_calls
                            .iter()
                            .map(|call| OpenAIToolCall {
                                id: call.id.clone(),
                                call_type: "function",
                                function: OpenAIFunctionCall {
                                    name: call.name.clone(),
                                    arguments: call.arguments.clone(),
                                },
                            })
                            .collect()
                    )
                };
                OpenAIMessage {
                    role: "assistant",
                    content: Some(content.clone()).filter(|c| !c.is_empty()),
                    tool_calls,
                    tool_call_id: None,
                }
            }
            ModelMessage::Tool { tool_call_id, content } =>
                OpenAIMessage {
                    role: "tool",
                    content: Some(content.clone()),
                    tool_calls: None,
                    tool_call_id: Some(tool_call_id.clone()),
                },
        }
    }
}

/// Folds streamed chunks into model events. Tool call fragments are keyed by
/// their `index` and released as whole calls when the choice finishes.
#[derive(Debug, Default)]
struct StreamState {
    tool_calls: BTreeMap<usize, ToolCallRequest>,
    finished: bool,
}

impl StreamState {
    fn apply(&mut self, chunk: OpenAIStreamResponse) -> Vec<ModelEvent> {
        let mut events = Vec::new();
        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                if !content.is_empty() {
                    events.push(ModelEvent::TextDelta(content));
                }
            }

            for delta in choice.delta.tool_calls.unwrap_or_default() {
                let entry = self.tool_calls.entry(delta.index).or_insert_with(|| ToolCallRequest {
                    id: String::new(),
                    name: String::new(),
                    arguments: String::new(),
                });
                if let Some(id) = delta.id {
                    entry.id = id;
                }
                if let Some(function) = delta.function {
                    if let Some(name) = function.name {
                        entry.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        entry.arguments.push_str(&arguments);
                    }
                }
            }

            if let Some(reason) = choice.finish_reason {
                events.extend(self.drain_tool_calls());
                events.push(ModelEvent::Finish(reason));
                self.finished = true;
            }
        }
        events
    }

    /// Called when the body ends; closes a step that never sent `finish_reason`.
    fn finish(&mut self) -> Vec<ModelEvent> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let mut events = self.drain_tool_calls();
        let reason = if events.is_empty() { "stop" } else { "tool_calls" };
        events.push(ModelEvent::Finish(reason.to_string()));
        events
    }

    fn drain_tool_calls(&mut self) -> Vec<ModelEvent> {
        std::mem::take(&mut self.tool_calls)
            .into_values()
            .map(ModelEvent::ToolCall)
            .collect()
    }
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: String,
        request_timeout: Option<Duration>
    ) -> Result<Self, LlmError> {
        let chat_model = model.unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
                LlmError::InvalidApiKey(e.to_string())
            )?
        );

        let http = HttpClient::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            model: chat_model,
            base_url,
            request_timeout,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;
        let base_url = config.base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        Self::new(api_key, config.completion_model.clone(), base_url, config.request_timeout)
    }

    fn chat_completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with(CHAT_COMPLETIONS_ROUTE) {
            base.to_string()
        } else {
            format!("{}{}", base, CHAT_COMPLETIONS_ROUTE)
        }
    }
}

fn upstream_error_message(error: &serde_json::Value) -> String {
    match error {
        serde_json::Value::String(message) => message.clone(),
        other =>
            other
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
    }
}

/// Decodes one `data:` payload. Error chunks and unparsable chunks end the step.
fn decode_payload(payload: &str, state: &mut StreamState) -> Result<Vec<ModelEvent>, LlmError> {
    if payload == "[DONE]" {
        return Ok(Vec::new());
    }
    let chunk: OpenAIStreamResponse = serde_json::from_str(payload).map_err(|e| {
        debug!("JSON parse error: {} for data: {}", e, payload);
        LlmError::Decode(e)
    })?;
    if let Some(error) = &chunk.error {
        return Err(LlmError::Upstream(upstream_error_message(error)));
    }
    Ok(state.apply(chunk))
}

async fn forward_payload(
    payload: &str,
    state: &mut StreamState,
    tx: &mpsc::Sender<Result<ModelEvent, LlmError>>
) -> bool {
    match decode_payload(payload, state) {
        Ok(events) => {
            for event in events {
                if tx.send(Ok(event)).await.is_err() {
                    return false;
                }
            }
            true
        }
        Err(e) => {
            error!("Model stream failed: {}", e);
            let _ = tx.send(Err(e)).await;
            false
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAIChatClient {
    async fn stream_chat(
        &self,
        messages: &[ModelMessage],
        tools: &[ToolDefinition]
    ) -> Result<ModelStream, LlmError> {
        let url = self.chat_completions_url();
        let req = OpenAIChatRequest {
            model: self.model.clone(),
            messages: messages.iter().map(OpenAIMessage::from).collect(),
            tools: tools
                .iter()
                .map(|tool| OpenAITool {
                    tool_type: "function",
                    function: OpenAIFunction {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect(),
            stream: true,
        };

        info!("Sending {} message(s) to {} ({})", req.messages.len(), url, self.model);
        let mut request = self.http.post(&url).json(&req);
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }
        let resp = request.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        Ok(
            create_streaming_response(move |tx| async move {
                let mut bytes = resp.bytes_stream();
                let mut decoder = SseDecoder::new();
                let mut state = StreamState::default();

                while let Some(chunk_result) = bytes.next().await {
                    match chunk_result {
                        Ok(chunk) => {
                            for payload in decoder.push(&chunk) {
                                if !forward_payload(&payload, &mut state, &tx).await {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            let _ = tx.send(Err(LlmError::Transport(e))).await;
                            return;
                        }
                    }
                }

                for payload in decoder.finish() {
                    if !forward_payload(&payload, &mut state, &tx).await {
                        return;
                    }
                }
                for event in state.finish() {
                    if tx.send(Ok(event)).await.is_err() {
                        return;
                    }
                }
            })
        )
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> String {
        self.base_url.clone()
    }
}

use async_trait::async_trait;
use futures::{ Stream, StreamExt };
use log::debug;
use serde::Deserialize;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use url::Url;

use super::ClientError;
use crate::llm::sse::SseDecoder;
use crate::models::chat::{ ChatRequest, Message };
use crate::models::stream::StreamPart;

pub type PartResults = Pin<Box<dyn Stream<Item = Result<StreamPart, ClientError>> + Send>>;

/// Carries one submission to the relay and yields its stream parts.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn open(&self, messages: &[Message]) -> Result<PartResults, ClientError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct HttpRelayTransport {
    http: reqwest::Client,
    url: Url,
}

impl HttpRelayTransport {
    pub fn new(url: &str) -> Result<Self, ClientError> {
        let url = Url::parse(url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", url, e)))?;
        Ok(Self { http: reqwest::Client::new(), url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl RelayTransport for HttpRelayTransport {
    async fn open(&self, messages: &[Message]) -> Result<PartResults, ClientError> {
        let body = ChatRequest { messages: messages.to_vec() };
        let resp = self.http.post(self.url.clone()).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let body = serde_json
                ::from_str::<ErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or(text);
            return Err(ClientError::Status { status: status.as_u16(), body });
        }

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            let mut bytes = resp.bytes_stream();
            let mut decoder = SseDecoder::new();

            while let Some(chunk) = bytes.next().await {
                let payloads = match chunk {
                    Ok(chunk) => decoder.push(&chunk),
                    Err(e) => {
                        let _ = tx.send(Err(ClientError::Transport(e))).await;
                        return;
                    }
                };
                for payload in payloads {
                    debug!("relay event: {}", payload);
                    let part = serde_json::from_str::<StreamPart>(&payload).map_err(ClientError::from);
                    if tx.send(part).await.is_err() {
                        return;
                    }
                }
            }
            for payload in decoder.finish() {
                let part = serde_json::from_str::<StreamPart>(&payload).map_err(ClientError::from);
                if tx.send(part).await.is_err() {
                    return;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

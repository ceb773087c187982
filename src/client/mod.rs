pub mod render;
pub mod reply;
pub mod terminal;
pub mod transport;

use futures::StreamExt;
use log::{ debug, warn };
use thiserror::Error;

use crate::models::chat::{ Conversation, Message };
use crate::models::stream::StreamPart;
use self::render::RenderedMessage;
use self::reply::ReplyBuilder;
use self::transport::RelayTransport;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid relay URL {0}")]
    InvalidUrl(String),
    #[error("Could not reach the chat relay: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Chat relay returned {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },
    #[error("Chat relay sent an unreadable event: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Relay(String),
    #[error("Chat relay closed the stream before the reply finished")]
    Incomplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    Idle,
    Submitting,
    /// Idle again, with the last reply being an error message.
    Failed,
}

/// Proof that a submission is in flight, carrying the history to send.
#[derive(Debug)]
pub struct PendingSubmission {
    history: Conversation,
}

impl PendingSubmission {
    pub fn messages(&self) -> &[Message] {
        self.history.messages()
    }
}

/// Question given at startup; it is handed out at most once.
#[derive(Debug, Default)]
pub struct AutoSubmit {
    question: Option<String>,
    done: bool,
}

impl AutoSubmit {
    pub fn new(question: Option<String>) -> Self {
        Self { question, done: false }
    }

    pub fn peek(&self) -> Option<&str> {
        if self.done {
            return None;
        }
        self.question.as_deref().filter(|q| !q.trim().is_empty())
    }

    pub fn take(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        let question = self.question.take().filter(|q| !q.trim().is_empty())?;
        self.done = true;
        Some(question)
    }
}

/// Reports the newest message whenever the latest message id changes.
#[derive(Debug, Default)]
pub struct ScrollTracker {
    last_seen: Option<String>,
}

impl ScrollTracker {
    pub fn observe<'a>(&mut self, conversation: &'a Conversation) -> Option<&'a Message> {
        let latest = conversation.last()?;
        if self.last_seen.as_deref() == Some(latest.id.as_str()) {
            return None;
        }
        self.last_seen = Some(latest.id.clone());
        Some(latest)
    }
}

pub struct ChatSession<T: RelayTransport> {
    transport: T,
    conversation: Conversation,
    state: SubmitState,
    auto_submit: AutoSubmit,
}

impl<T: RelayTransport> ChatSession<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            conversation: Conversation::new(),
            state: SubmitState::Idle,
            auto_submit: AutoSubmit::default(),
        }
    }

    pub fn with_initial_question(mut self, question: Option<String>) -> Self {
        self.auto_submit = AutoSubmit::new(question);
        self
    }

    /// Startup question that the next `mount` would submit.
    pub fn pending_question(&self) -> Option<&str> {
        self.auto_submit.peek()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn state(&self) -> SubmitState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == SubmitState::Submitting
    }

    pub fn input_enabled(&self) -> bool {
        !self.is_loading()
    }

    pub fn render_history(&self) -> impl Iterator<Item = RenderedMessage<'_>> {
        render::render_history(self.conversation.messages())
    }

    /// Appends the user turn and enters `Submitting`. Blank input, or input
    /// while another submission is outstanding, is ignored.
    pub fn begin_submit(&mut self, text: &str) -> Option<PendingSubmission> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if self.is_loading() {
            debug!("Submission already in flight; ignoring input");
            return None;
        }

        self.conversation = self.conversation.appended(Message::user(text));
        self.state = SubmitState::Submitting;
        Some(PendingSubmission { history: self.conversation.clone() })
    }

    /// Appends exactly one assistant message for the submission and returns
    /// to idle.
    pub fn finish_submit(
        &mut self,
        _pending: PendingSubmission,
        outcome: Result<Message, ClientError>
    ) -> &Message {
        let (reply, state) = match outcome {
            Ok(reply) => (reply, SubmitState::Idle),
            Err(e) => {
                warn!("Chat submission failed: {}", e);
                (Message::assistant(format!("Sorry, something went wrong: {}", e)), SubmitState::Failed)
            }
        };
        self.conversation = self.conversation.appended(reply);
        self.state = state;
        match self.conversation.last() {
            Some(message) => message,
            None => unreachable!("a message was just appended"),
        }
    }

    pub async fn submit(&mut self, text: &str) -> Option<&Message> {
        self.submit_with(text, |_| {}).await
    }

    /// Like `submit`, calling `on_part` for each stream part as it arrives.
    pub async fn submit_with<F>(&mut self, text: &str, on_part: F) -> Option<&Message>
        where F: FnMut(&StreamPart) + Send
    {
        let pending = self.begin_submit(text)?;
        let outcome = self.exchange(pending.messages(), on_part).await;
        Some(self.finish_submit(pending, outcome))
    }

    /// Submits the startup question on the first mount only.
    pub async fn mount_with<F>(&mut self, on_part: F) -> Option<&Message>
        where F: FnMut(&StreamPart) + Send
    {
        let question = self.auto_submit.take()?;
        self.submit_with(&question, on_part).await
    }

    pub async fn mount(&mut self) -> Option<&Message> {
        self.mount_with(|_| {}).await
    }

    async fn exchange<F>(&self, messages: &[Message], mut on_part: F) -> Result<Message, ClientError>
        where F: FnMut(&StreamPart) + Send
    {
        let mut parts = self.transport.open(messages).await?;
        let mut reply = ReplyBuilder::new();
        while let Some(part) = parts.next().await {
            let part = part?;
            on_part(&part);
            reply.apply(part)?;
        }
        reply.finish()
    }
}

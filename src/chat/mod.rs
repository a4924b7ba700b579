//! Provider-independent chat abstraction.
//!
//! Every provider adapter implements [`Chat`]. The aggregator only ever sees
//! [`ChatRequest`], [`ChatResponse`] and the normalized [`Event`] stream.

pub mod event;
mod model;

pub use event::{channel, Event, EventReceiver, EventSender};
pub use model::{ModelType, UnknownModel};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// A provider-independent chat request.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatRequest {
    pub model: ModelType,
    pub messages: Vec<Message>,
}

impl ChatRequest {
    pub fn new(model: ModelType, messages: Vec<Message>) -> Self {
        Self { model, messages }
    }
}

/// The buffered result of a chat request.
///
/// `content` holds every fragment received, even when `error` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChatResponse {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Capability interface implemented by each provider adapter.
#[async_trait]
pub trait Chat: Send + Sync {
    /// Token budget this provider offers for `model`; `0` means unsupported.
    fn support(&self, model: ModelType) -> usize;

    /// Stream the answer to `request` into `events`.
    ///
    /// Implementations must finish with exactly one terminal event
    /// (`Done` or `Error`), which closes the channel.
    async fn ask_stream(&self, request: &ChatRequest, events: EventSender);

    /// Ask and wait for the whole answer.
    async fn ask(&self, request: &ChatRequest) -> ChatResponse {
        let (tx, rx) = channel();
        let ((), response) = tokio::join!(self.ask_stream(request, tx), rx.into_response());
        response
    }
}

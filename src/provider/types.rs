//! OpenAI-compatible wire types spoken by the chim endpoint.

use serde::{Deserialize, Serialize};

use crate::chat::Message;

/// Sampling temperature sent with every request.
pub const TEMPERATURE: f32 = 1.0;

/// Chat completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest<'a> {
    pub messages: &'a [Message],
    pub temperature: f32,
    pub stream: bool,
    pub model: &'a str,
}

impl<'a> CompletionRequest<'a> {
    /// A streaming request at the fixed temperature.
    pub fn streaming(messages: &'a [Message], model: &'a str) -> Self {
        Self {
            messages,
            temperature: TEMPERATURE,
            stream: true,
            model,
        }
    }
}

/// One streamed `chat.completion.chunk` payload.
///
/// Only the fields the adapter reads are modelled; everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionChunk {
    #[serde(default)]
    pub choices: Option<Vec<ChunkChoice>>,
}

/// A streaming choice delta.
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Option<Delta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Delta content in streaming response.
#[derive(Debug, Clone, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
}

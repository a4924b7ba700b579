//! chim - chat adapter for the chim OpenAI-compatible completion proxy
//!
//! This library translates provider-independent chat requests into chim's
//! wire format and re-emits its streamed replies as normalized events.

pub mod chat;
pub mod config;
pub mod error;
pub mod provider;

pub use chat::{Chat, ChatRequest, ChatResponse, Event, Message, ModelType};
pub use config::Config;
pub use error::{Error, Result};
pub use provider::Chim;

//! Provider adapters.
//!
//! Each adapter turns a [`ChatRequest`](crate::chat::ChatRequest) into its
//! vendor's wire format and re-emits the vendor's reply as normalized events.

mod chim;
pub mod stream;
pub mod types;

pub use chim::{model_name, Chim};
pub use stream::{parse_segment, relay, SegmentSplitter};
pub use types::{CompletionChunk, CompletionRequest};

//! Normalized event channel between a provider adapter and its consumer.
//!
//! An adapter writes [`Event`]s through an [`EventSender`]; the consumer reads
//! them, in order, from the matching [`EventReceiver`]. `Done` and `Error` are
//! terminal: the sender methods that emit them take `self`, so the channel is
//! closed as soon as either is written and nothing can follow.

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::ChatResponse;

/// A single normalized event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A fragment of assistant text, in provider order.
    Message { content: String },
    /// The provider finished; no further events follow.
    Done,
    /// The request failed; no further events follow.
    Error { error: String },
}

impl Event {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::Done | Event::Error { .. })
    }
}

/// Create a connected sender/receiver pair.
///
/// The channel is unbounded so the producer never waits on a slow consumer.
pub fn channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}

/// Write half of an event channel.
#[derive(Debug)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSender {
    /// Emit a message fragment.
    ///
    /// Returns `false` once the receiver has been dropped, so producers can
    /// stop reading from the network.
    pub fn message(&self, content: impl Into<String>) -> bool {
        self.tx
            .send(Event::Message {
                content: content.into(),
            })
            .is_ok()
    }

    /// Emit the completion marker and close the channel.
    pub fn done(self) {
        let _ = self.tx.send(Event::Done);
    }

    /// Emit an error and close the channel.
    pub fn error(self, error: impl Into<String>) {
        let _ = self.tx.send(Event::Error {
            error: error.into(),
        });
    }

    /// Whether the receiver has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Read half of an event channel.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventReceiver {
    /// Receive the next event, or `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// View the remaining events as a `Stream`.
    pub fn into_stream(self) -> impl Stream<Item = Event> + Send + Unpin {
        UnboundedReceiverStream::new(self.rx)
    }

    /// Drain the channel into a single response.
    ///
    /// Message contents are concatenated in arrival order and the first error
    /// is kept. Resolves once the channel is closed.
    pub async fn into_response(mut self) -> ChatResponse {
        let mut response = ChatResponse::default();

        while let Some(event) = self.recv().await {
            match event {
                Event::Message { content } => response.content.push_str(&content),
                Event::Error { error } => {
                    if response.error.is_none() {
                        response.error = Some(error);
                    }
                }
                Event::Done => {}
            }
        }

        response
    }
}

//! Reply streaming task.
//!
//! Each user message gets its own task: it sends the request, decodes the
//! response body and forwards records to the event loop over a channel.
//! Records are forwarded strictly in arrival order. The task ends with
//! exactly one of [`StreamEvent::Finished`], [`StreamEvent::Failed`] or
//! [`StreamEvent::Cancelled`].

use std::pin::pin;
use std::sync::Arc;

use futures::StreamExt;
use orbitron_core::{decode_stream, MalformedLine, Record, StreamError};
use tokio::sync::{mpsc, oneshot};
use tracing::Instrument;
use uuid::Uuid;

use crate::client::ChatTransport;

/// Events from a reply stream.
#[derive(Debug)]
pub enum StreamEvent {
    /// A decoded record, to be applied to the session.
    Record(Record),
    /// A line that was not valid JSON. The stream continues.
    Malformed(MalformedLine),
    /// The request or the body failed. Last event of the stream.
    Failed(String),
    /// The reply was cancelled locally. Last event of the stream.
    Cancelled,
    /// The body ended normally. Last event of the stream.
    Finished,
}

impl StreamEvent {
    /// Whether no further events follow this one.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::Cancelled | Self::Finished)
    }
}

/// Handle to a running reply stream.
///
/// Dropping the handle cancels the stream.
#[derive(Debug)]
pub struct StreamHandle {
    request_id: Uuid,
    cancel: Option<oneshot::Sender<()>>,
}

impl StreamHandle {
    /// Id used to correlate log lines for this reply.
    #[must_use]
    pub const fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Ask the task to stop. Returns `false` if already asked.
    pub fn cancel(&mut self) -> bool {
        match self.cancel.take() {
            Some(tx) => {
                // The task may already be gone; that is fine.
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }
}

/// Spawn a task that sends `message` and streams the reply into `events`.
pub fn spawn(
    transport: Arc<dyn ChatTransport>,
    message: String,
    events: mpsc::Sender<StreamEvent>,
) -> StreamHandle {
    let request_id = Uuid::new_v4();
    let (cancel_tx, cancel_rx) = oneshot::channel();

    let span = tracing::info_span!("reply", request_id = %request_id);
    tokio::spawn(pump(transport, message, events, cancel_rx).instrument(span));

    StreamHandle {
        request_id,
        cancel: Some(cancel_tx),
    }
}

async fn pump(
    transport: Arc<dyn ChatTransport>,
    message: String,
    events: mpsc::Sender<StreamEvent>,
    mut cancel: oneshot::Receiver<()>,
) {
    tracing::info!(chars = message.chars().count(), "Sending message");

    let chunks = tokio::select! {
        biased;
        _ = &mut cancel => {
            tracing::info!("Cancelled before the backend answered");
            let _ = events.send(StreamEvent::Cancelled).await;
            return;
        }
        result = transport.send(&message) => match result {
            Ok(chunks) => chunks,
            Err(e) => {
                tracing::warn!(error = %e, "Chat request failed");
                let _ = events.send(StreamEvent::Failed(e.to_string())).await;
                return;
            }
        },
    };

    let mut items = pin!(decode_stream(chunks));
    let mut records = 0usize;

    let last = loop {
        let item = tokio::select! {
            biased;
            _ = &mut cancel => {
                // Dropping the decoder discards any partial line.
                tracing::info!(records, "Reply cancelled");
                break StreamEvent::Cancelled;
            }
            item = items.next() => item,
        };

        let event = match item {
            Some(Ok(value)) => {
                records += 1;
                StreamEvent::Record(Record::from_value(&value))
            }
            Some(Err(StreamError::Malformed(line))) => {
                tracing::warn!(line = %line.line, reason = %line.reason, "Skipping malformed line");
                StreamEvent::Malformed(line)
            }
            Some(Err(StreamError::Transport(e))) => {
                tracing::warn!(error = %e, records, "Reply stream broke");
                break StreamEvent::Failed(e.to_string());
            }
            None => {
                tracing::info!(records, "Reply complete");
                break StreamEvent::Finished;
            }
        };

        if events.send(event).await.is_err() {
            tracing::debug!("Event loop gone, abandoning reply");
            return;
        }
    };

    let _ = events.send(last).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{Ending, ScriptedTransport};

    async fn collect(rx: &mut mpsc::Receiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = event.is_terminal();
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    #[tokio::test]
    async fn forwards_records_in_order_then_finishes() {
        let transport = ScriptedTransport::body(
            &[
                b"{\"type\":\"message\",\"content\":\"a\"}\n{\"type\":\"mess",
                b"age\",\"content\":\"b\"}\n",
                b"{\"type\":\"clear_desktop\"}",
            ],
            Ending::Close,
        );
        let (tx, mut rx) = mpsc::channel(16);

        let _handle = spawn(transport, "hi".to_string(), tx);
        let events = collect(&mut rx).await;

        assert_eq!(events.len(), 4);
        assert!(matches!(&events[0], StreamEvent::Record(Record::Message { content }) if content == "a"));
        assert!(matches!(&events[1], StreamEvent::Record(Record::Message { content }) if content == "b"));
        assert!(matches!(&events[2], StreamEvent::Record(Record::ClearDesktop)));
        assert!(matches!(events[3], StreamEvent::Finished));
    }

    #[tokio::test]
    async fn malformed_lines_do_not_stop_the_stream() {
        let transport = ScriptedTransport::body(
            &[b"not json\n{\"type\":\"message\",\"content\":\"hi\"}\n"],
            Ending::Close,
        );
        let (tx, mut rx) = mpsc::channel(16);

        let _handle = spawn(transport, "hi".to_string(), tx);
        let events = collect(&mut rx).await;

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], StreamEvent::Malformed(line) if line.line == "not json"));
        assert!(matches!(&events[1], StreamEvent::Record(Record::Message { .. })));
        assert!(matches!(events[2], StreamEvent::Finished));
    }

    #[tokio::test]
    async fn rejected_request_fails() {
        let (tx, mut rx) = mpsc::channel(16);

        let _handle = spawn(ScriptedTransport::rejecting(), "hi".to_string(), tx);
        let events = collect(&mut rx).await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Failed(message) => assert!(message.contains("500")),
            other => panic!("Expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn broken_body_keeps_earlier_records() {
        let transport = ScriptedTransport::body(
            &[b"{\"type\":\"message\",\"content\":\"partial\"}\n{\"type\":"],
            Ending::Break,
        );
        let (tx, mut rx) = mpsc::channel(16);

        let _handle = spawn(transport, "hi".to_string(), tx);
        let events = collect(&mut rx).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], StreamEvent::Record(_)));
        assert!(matches!(&events[1], StreamEvent::Failed(m) if m.contains("upstream reset")));
    }

    #[tokio::test]
    async fn cancel_discards_partial_line() {
        let transport = ScriptedTransport::body(
            &[b"{\"type\":\"message\",\"content\":\"first\"}\n{\"type\":\"message\",\"con"],
            Ending::Hang,
        );
        let (tx, mut rx) = mpsc::channel(16);

        let mut handle = spawn(transport, "hi".to_string(), tx);

        let first = rx.recv().await;
        assert!(matches!(first, Some(StreamEvent::Record(_))));

        assert!(handle.cancel());
        assert!(!handle.cancel());

        let rest = collect(&mut rx).await;
        assert_eq!(rest.len(), 1);
        assert!(matches!(rest[0], StreamEvent::Cancelled));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropping_the_handle_cancels() {
        let transport = ScriptedTransport::body(&[], Ending::Hang);
        let (tx, mut rx) = mpsc::channel(16);

        drop(spawn(transport, "hi".to_string(), tx));

        let events = collect(&mut rx).await;
        assert!(matches!(events.as_slice(), [StreamEvent::Cancelled]));
    }

    #[test]
    fn terminal_events() {
        assert!(StreamEvent::Finished.is_terminal());
        assert!(StreamEvent::Cancelled.is_terminal());
        assert!(StreamEvent::Failed(String::new()).is_terminal());
        assert!(!StreamEvent::Record(Record::ClearDesktop).is_terminal());
    }
}

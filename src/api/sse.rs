//! Server-Sent Events support

use super::wire::{WireAdapter, WireEvent};
use crate::runtime::Subscription;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Translate a subscription into wire events, ending after `conversation-end`
/// or once `shutdown` fires.
///
/// Dropping the stream drops the subscription, which leaves the hub.
pub fn wire_stream(
    subscription: Subscription,
    shutdown: CancellationToken,
) -> impl Stream<Item = WireEvent> {
    stream::unfold(
        (subscription, WireAdapter::new(), false),
        |(mut subscription, mut adapter, finished)| async move {
            if finished {
                return None;
            }
            let event = subscription.recv().await?;
            let wire = adapter.convert(&event);
            let finished = wire.is_terminal();
            if finished {
                tracing::debug!(subscriber = subscription.id(), "Stream reached conversation end");
            }
            Some((wire, (subscription, adapter, finished)))
        },
    )
    .take_until(shutdown.cancelled_owned())
}

/// SSE response carrying one JSON wire event per `data:` line
pub fn sse_stream(
    subscription: Subscription,
    shutdown: CancellationToken,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = wire_stream(subscription, shutdown).map(|wire| Ok(wire_to_sse(&wire)));

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn wire_to_sse(wire: &WireEvent) -> Event {
    match serde_json::to_string(wire) {
        Ok(json) => Event::default().data(json),
        Err(e) => {
            tracing::error!(event = wire.kind(), error = %e, "Failed to serialize wire event");
            Event::default().data(r#"{"type":"error","data":{"error":"serialization failed"}}"#)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::EventHub;
    use crate::state_machine::DomainEvent;

    #[tokio::test]
    async fn test_stream_ends_after_conversation_end() {
        let hub = EventHub::new(16);
        let subscription = hub.subscribe();

        hub.publish(&DomainEvent::HumanMessageAdded {
            content: "hi".to_string(),
        });
        hub.publish(&DomainEvent::ConversationEnd {
            message: "Conversation stopped".to_string(),
            participants: vec![],
            topic: None,
        });
        hub.publish(&DomainEvent::HumanMessageAdded {
            content: "late".to_string(),
        });

        let kinds: Vec<_> = wire_stream(subscription, CancellationToken::new())
            .map(|w| w.kind()).collect().await;
        assert_eq!(kinds, vec!["user-message", "conversation-end"]);
    }

    #[tokio::test]
    async fn test_dropping_stream_unsubscribes() {
        let hub = EventHub::new(16);
        let stream = wire_stream(hub.subscribe(), CancellationToken::new());
        assert_eq!(hub.subscriber_count(), 1);
        drop(stream);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_ends_idle_stream() {
        let hub = EventHub::new(16);
        let shutdown = CancellationToken::new();
        let stream = wire_stream(hub.subscribe(), shutdown.clone());

        let collected = tokio::spawn(stream.collect::<Vec<_>>());
        tokio::task::yield_now().await;
        shutdown.cancel();

        let events = tokio::time::timeout(Duration::from_secs(1), collected)
            .await
            .unwrap()
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(hub.subscriber_count(), 0);
    }
}

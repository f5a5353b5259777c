//! Lifecycle notifications.
//!
//! A transport owns a [`Notifier`]. Each call to `subscribe` registers a
//! listener with its own unbounded queue, so a slow listener never causes
//! another to miss events and every listener sees events in publish order.

use futures_util::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tether_protocol::Packet;
use tokio::sync::mpsc;
use tracing::trace;

use crate::error::TransportError;

/// A notification raised by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The transport finished opening.
    Open,
    /// A packet was decoded from inbound data.
    Packet(Packet),
    /// Something failed.
    Error(TransportError),
    /// The transport closed. Nothing follows it until the next open.
    Close,
}

impl TransportEvent {
    /// Get the event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            TransportEvent::Open => "open",
            TransportEvent::Packet(_) => "packet",
            TransportEvent::Error(_) => "error",
            TransportEvent::Close => "close",
        }
    }
}

/// Identifier of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Receiving end of a subscription.
#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Listener {
    /// Get the listener's identifier.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the listener has been unsubscribed or the
    /// transport dropped, and every queued event has been received.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<TransportEvent> {
        self.rx.try_recv().ok()
    }

    /// Take every queued event.
    pub fn drain(&mut self) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Stream for Listener {
    type Item = TransportEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Observer subject for transport events.
#[derive(Debug, Default)]
pub struct Notifier {
    listeners: Vec<(ListenerId, mpsc::UnboundedSender<TransportEvent>)>,
    next_id: u64,
    sealed: bool,
}

impl Notifier {
    /// Create a notifier with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn subscribe(&mut self) -> Listener {
        let id = ListenerId(self.next_id);
        self.next_id += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners.push((id, tx));
        Listener { id, rx }
    }

    /// Remove a listener.
    ///
    /// Returns `true` if the listener was registered. Events already queued
    /// for it can still be received.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Get the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Check whether a `Close` has been published since the last reset.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Accept events again after a close.
    pub fn reset(&mut self) {
        self.sealed = false;
    }

    /// Deliver an event to every listener.
    ///
    /// Returns `false` without delivering if the notifier is sealed.
    /// Publishing `Close` seals it.
    pub fn publish(&mut self, event: TransportEvent) -> bool {
        if self.sealed {
            return false;
        }
        if matches!(event, TransportEvent::Close) {
            self.sealed = true;
        }

        trace!(event = event.name(), listeners = self.listeners.len(), "Publishing event");
        self.listeners.retain(|(id, tx)| {
            let delivered = tx.send(event.clone()).is_ok();
            if !delivered {
                trace!(listener = id.0, "Pruning dropped listener");
            }
            delivered
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_and_publish() {
        let mut notifier = Notifier::new();
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();
        assert_ne!(a.id(), b.id());

        assert!(notifier.publish(TransportEvent::Open));
        assert!(notifier.publish(TransportEvent::Packet(Packet::pong())));

        for listener in [&mut a, &mut b] {
            assert_eq!(
                listener.drain(),
                vec![TransportEvent::Open, TransportEvent::Packet(Packet::pong())]
            );
        }
    }

    #[test]
    fn test_unsubscribe() {
        let mut notifier = Notifier::new();
        let mut listener = notifier.subscribe();

        assert!(notifier.unsubscribe(listener.id()));
        assert!(!notifier.unsubscribe(listener.id()));

        notifier.publish(TransportEvent::Open);
        assert_eq!(listener.try_recv(), None);
    }

    #[test]
    fn test_dropped_listener_pruned() {
        let mut notifier = Notifier::new();
        let listener = notifier.subscribe();
        let _kept = notifier.subscribe();
        drop(listener);

        notifier.publish(TransportEvent::Open);
        assert_eq!(notifier.listener_count(), 1);
    }

    #[test]
    fn test_close_seals() {
        let mut notifier = Notifier::new();
        let mut listener = notifier.subscribe();

        assert!(notifier.publish(TransportEvent::Close));
        assert!(notifier.is_sealed());
        assert!(!notifier.publish(TransportEvent::Open));
        assert_eq!(listener.drain(), vec![TransportEvent::Close]);

        notifier.reset();
        assert!(notifier.publish(TransportEvent::Open));
        assert_eq!(listener.try_recv(), Some(TransportEvent::Open));
    }

    #[tokio::test]
    async fn test_listener_stream() {
        use futures_util::StreamExt;

        let mut notifier = Notifier::new();
        let listener = notifier.subscribe();
        notifier.publish(TransportEvent::Open);
        notifier.publish(TransportEvent::Close);
        drop(notifier);

        let events: Vec<_> = listener.collect().await;
        assert_eq!(events, vec![TransportEvent::Open, TransportEvent::Close]);
    }
}

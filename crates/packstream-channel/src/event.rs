//! Message and disconnect notifications.
//!
//! Both notifications travel through one [`EventBus`] as a tagged
//! [`ChannelEvent`]. The bus delivers every message to every subscriber and
//! lets through at most one `Disconnected`; anything published afterwards is
//! dropped.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use packstream_frame::{is_transport_closed, FrameError};
use tracing::trace;

/// Why the read side of a channel stopped.
#[derive(Debug, Clone)]
pub enum DisconnectReason {
    /// The source ended on a frame boundary.
    Closed,
    /// The source ended part way through a frame.
    Truncated { expected: u64, received: u64 },
    /// Reading failed; no further messages will arrive.
    Failed(Arc<FrameError>),
}

impl DisconnectReason {
    /// Classify the error that ended a read loop.
    pub fn from_error(err: FrameError) -> Self {
        match err {
            FrameError::ConnectionClosed => DisconnectReason::Closed,
            FrameError::Truncated { expected, received } => {
                DisconnectReason::Truncated { expected, received }
            }
            FrameError::Io(io) if is_transport_closed(&io) => DisconnectReason::Closed,
            other => DisconnectReason::Failed(Arc::new(other)),
        }
    }

    /// Returns true if the peer simply went away on a frame boundary.
    pub fn is_clean(&self) -> bool {
        matches!(self, DisconnectReason::Closed)
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Closed => write!(f, "closed"),
            DisconnectReason::Truncated { expected, received } => {
                write!(f, "truncated ({received} of {expected} bytes)")
            }
            DisconnectReason::Failed(err) => write!(f, "failed: {err}"),
        }
    }
}

/// A notification from a framed channel.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// One fully reassembled inbound message.
    Message(Bytes),
    /// The input side closed. Sent at most once.
    Disconnected(DisconnectReason),
}

/// Handle returned by subscriptions, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(ChannelEvent) + Send + Sync>;

/// Subscriber registry and fan-out for channel events.
pub struct EventBus {
    next_id: AtomicU64,
    handlers: RwLock<Vec<(SubscriptionId, Handler)>>,
    disconnected: AtomicBool,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            handlers: RwLock::new(Vec::new()),
            disconnected: AtomicBool::new(false),
        }
    }

    /// Subscribe to every event.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(ChannelEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        trace!(id = id.0, "subscriber added");
        id
    }

    /// Subscribe to inbound messages only.
    pub fn on_message<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(Bytes) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let ChannelEvent::Message(message) = event {
                handler(message);
            }
        })
    }

    /// Subscribe to the disconnect notification only.
    pub fn on_disconnect<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(DisconnectReason) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let ChannelEvent::Disconnected(reason) = event {
                handler(reason);
            }
        })
    }

    /// Forward every event into a std channel.
    pub fn events(&self) -> std::sync::mpsc::Receiver<ChannelEvent> {
        let (tx, rx) = std::sync::mpsc::channel();
        self.subscribe(move |event| {
            let _ = tx.send(event);
        });
        rx
    }

    /// Forward every event into a tokio channel.
    pub fn events_async(&self) -> tokio::sync::mpsc::UnboundedReceiver<ChannelEvent> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.subscribe(move |event| {
            let _ = tx.send(event);
        });
        rx
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        let removed = handlers.len() != before;
        if removed {
            trace!(id = id.0, "subscriber removed");
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true once the disconnect notification has been delivered.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::SeqCst)
    }

    /// Deliver an event to all current subscribers.
    ///
    /// Returns false if the event was dropped because the channel had already
    /// disconnected.
    pub fn publish(&self, event: ChannelEvent) -> bool {
        let deliver = match &event {
            ChannelEvent::Disconnected(_) => !self.disconnected.swap(true, Ordering::SeqCst),
            ChannelEvent::Message(_) => !self.is_disconnected(),
        };
        if !deliver {
            trace!("event after disconnect dropped");
            return false;
        }

        // Snapshot so handlers may subscribe or unsubscribe while running.
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in handlers {
            handler(event.clone());
        }
        true
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("disconnected", &self.is_disconnected())
            .finish()
    }
}

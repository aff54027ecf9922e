use std::io::{Read, Write};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use packstream_frame::{AsyncFrameReader, FrameConfig, FrameReader};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::error::{ChannelError, Result};
use crate::event::{ChannelEvent, DisconnectReason, EventBus, SubscriptionId};
use crate::writer::ChannelWriter;

const READER_THREAD: &str = "packstream-reader";
const DISPATCH_THREAD: &str = "packstream-dispatch";

/// Events the driver may queue ahead of the dispatcher by default.
pub const DEFAULT_DISPATCH_DEPTH: usize = 64;

/// A duplex byte stream with message-level reads and writes.
///
/// The channel is armed as soon as it is constructed: a driver (a thread for
/// blocking sources, a tokio task for async ones) starts reading the first
/// header immediately and keeps reading until the source closes. Each
/// complete frame becomes one [`ChannelEvent::Message`]; the end of the
/// stream becomes exactly one [`ChannelEvent::Disconnected`].
///
/// Events are handed to subscribers by a separate dispatcher, so the driver is
/// already reading the next frame while a subscriber handles the current one.
/// The queue between them holds at most
/// [`dispatch_depth`](ChannelBuilder::dispatch_depth) events. When it is full
/// the driver stops reading until subscribers catch up.
///
/// Dropping the channel does not stop the driver; closing the source does.
pub struct FramedChannel<W> {
    writer: ChannelWriter<W>,
    bus: Arc<EventBus>,
    driver: Driver,
}

enum Driver {
    Thread {
        reader: thread::JoinHandle<()>,
        dispatcher: thread::JoinHandle<()>,
    },
    Task {
        reader: tokio::task::JoinHandle<()>,
        dispatcher: tokio::task::JoinHandle<()>,
    },
}

impl Driver {
    fn is_finished(&self) -> bool {
        match self {
            Driver::Thread { reader, dispatcher } => {
                reader.is_finished() && dispatcher.is_finished()
            }
            Driver::Task { reader, dispatcher } => reader.is_finished() && dispatcher.is_finished(),
        }
    }
}

impl<W> FramedChannel<W> {
    /// A cloneable handle to the write side.
    pub fn writer(&self) -> ChannelWriter<W> {
        self.writer.clone()
    }

    /// Frame settings shared by both directions.
    pub fn config(&self) -> &FrameConfig {
        self.writer.config()
    }

    /// Subscribe to every event.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(ChannelEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(handler)
    }

    /// Subscribe to inbound messages.
    pub fn on_message<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(Bytes) + Send + Sync + 'static,
    {
        self.bus.on_message(handler)
    }

    /// Subscribe to the disconnect notification.
    pub fn on_disconnect<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(DisconnectReason) + Send + Sync + 'static,
    {
        self.bus.on_disconnect(handler)
    }

    /// Remove a subscriber. Returns false if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Events from now on, as a std receiver.
    pub fn events(&self) -> mpsc::Receiver<ChannelEvent> {
        self.bus.events()
    }

    /// Events from now on, as a tokio receiver.
    pub fn events_async(&self) -> tokio::sync::mpsc::UnboundedReceiver<ChannelEvent> {
        self.bus.events_async()
    }

    /// Returns true once the disconnect notification has been delivered.
    pub fn is_disconnected(&self) -> bool {
        self.bus.is_disconnected()
    }

    /// Returns true once the driver and dispatcher have both exited.
    pub fn is_finished(&self) -> bool {
        self.driver.is_finished()
    }
}

impl<W: Write> FramedChannel<W> {
    /// Send one payload as one frame (blocking). See [`ChannelWriter::write`].
    pub fn write(&self, payload: &[u8]) -> packstream_frame::Result<()> {
        self.writer.write(payload)
    }
}

impl<W: AsyncWrite + Unpin> FramedChannel<W> {
    /// Send one payload as one frame. See [`ChannelWriter::write_async`].
    pub async fn write_async(&self, payload: &[u8]) -> packstream_frame::Result<()> {
        self.writer.write_async(payload).await
    }
}

impl<W: Send + 'static> FramedChannel<W> {
    /// Arm a channel over a blocking source, read on a dedicated thread.
    pub fn spawn<R>(reader: R, writer: W, config: FrameConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        ChannelBuilder::new(config).spawn(reader, writer)
    }

    /// Arm a channel over an async source, read on a tokio task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_async<R>(reader: R, writer: W, config: FrameConfig) -> Result<Self>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        ChannelBuilder::new(config).spawn_async(reader, writer)
    }
}

impl<S> FramedChannel<tokio::io::WriteHalf<S>>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Arm a channel over a single async duplex stream.
    pub fn spawn_duplex(stream: S, config: FrameConfig) -> Result<Self> {
        let (reader, writer) = tokio::io::split(stream);
        Self::spawn_async(reader, writer, config)
    }
}

impl<W> std::fmt::Debug for FramedChannel<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FramedChannel")
            .field("config", self.config())
            .field("bus", &self.bus)
            .finish()
    }
}

/// Configures subscribers before a [`FramedChannel`] is armed.
///
/// Subscribers attached here see every event, including ones that arrive
/// immediately after arming.
#[derive(Debug)]
pub struct ChannelBuilder {
    config: FrameConfig,
    bus: EventBus,
    dispatch_depth: usize,
}

impl ChannelBuilder {
    /// A builder with no subscribers and the default dispatch depth.
    pub fn new(config: FrameConfig) -> Self {
        Self {
            config,
            bus: EventBus::new(),
            dispatch_depth: DEFAULT_DISPATCH_DEPTH,
        }
    }

    /// Maximum number of events queued between the driver and the
    /// dispatcher. Values below 1 are treated as 1.
    pub fn dispatch_depth(mut self, depth: usize) -> Self {
        self.dispatch_depth = depth.max(1);
        self
    }

    /// Attach a handler for every event.
    pub fn subscribe<F>(self, handler: F) -> Self
    where
        F: Fn(ChannelEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(handler);
        self
    }

    /// Attach a handler for inbound messages.
    pub fn on_message<F>(self, handler: F) -> Self
    where
        F: Fn(Bytes) + Send + Sync + 'static,
    {
        self.bus.on_message(handler);
        self
    }

    /// Attach a handler for the disconnect notification.
    pub fn on_disconnect<F>(self, handler: F) -> Self
    where
        F: Fn(DisconnectReason) + Send + Sync + 'static,
    {
        self.bus.on_disconnect(handler);
        self
    }

    /// Arm the channel over a blocking source.
    pub fn spawn<R, W>(self, reader: R, writer: W) -> Result<FramedChannel<W>>
    where
        R: Read + Send + 'static,
        W: Send + 'static,
    {
        let bus = Arc::new(self.bus);
        let (tx, rx) = mpsc::sync_channel::<ChannelEvent>(self.dispatch_depth);

        let dispatch_bus = Arc::clone(&bus);
        let dispatcher = thread::Builder::new()
            .name(DISPATCH_THREAD.to_string())
            .spawn(move || {
                for event in rx {
                    dispatch_bus.publish(event);
                }
            })
            .map_err(|source| ChannelError::Spawn {
                name: DISPATCH_THREAD,
                source,
            })?;

        let mut frames = FrameReader::with_config(reader, self.config);
        let reader = thread::Builder::new()
            .name(READER_THREAD.to_string())
            .spawn(move || loop {
                let event = next_event(frames.read_message());
                if !forward(&tx, event) {
                    break;
                }
            })
            .map_err(|source| ChannelError::Spawn {
                name: READER_THREAD,
                source,
            })?;

        debug!(width = self.config.width.bytes(), "framed channel armed (thread)");
        Ok(FramedChannel {
            writer: ChannelWriter::new(writer, self.config),
            bus,
            driver: Driver::Thread { reader, dispatcher },
        })
    }

    /// Arm the channel over an async source. Must be called from within a
    /// tokio runtime.
    pub fn spawn_async<R, W>(self, reader: R, writer: W) -> Result<FramedChannel<W>>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| ChannelError::NoRuntime)?;
        let bus = Arc::new(self.bus);
        let (tx, mut rx) = tokio::sync::mpsc::channel::<ChannelEvent>(self.dispatch_depth);

        let dispatch_bus = Arc::clone(&bus);
        let dispatcher = runtime.spawn(async move {
            while let Some(event) = rx.recv().await {
                dispatch_bus.publish(event);
            }
        });

        let mut frames = AsyncFrameReader::with_config(reader, self.config);
        let reader = runtime.spawn(async move {
            loop {
                let event = next_event(frames.read_message().await);
                if !forward_async(&tx, event).await {
                    break;
                }
            }
        });

        debug!(width = self.config.width.bytes(), "framed channel armed (task)");
        Ok(FramedChannel {
            writer: ChannelWriter::new(writer, self.config),
            bus,
            driver: Driver::Task { reader, dispatcher },
        })
    }
}

/// Map one read result to the event it produces.
fn next_event(result: packstream_frame::Result<Bytes>) -> ChannelEvent {
    match result {
        Ok(message) => {
            debug!(len = message.len(), "message received");
            ChannelEvent::Message(message)
        }
        Err(err) => {
            let reason = DisconnectReason::from_error(err);
            if reason.is_clean() {
                debug!("input closed");
            } else {
                warn!(%reason, "input ended abnormally");
            }
            ChannelEvent::Disconnected(reason)
        }
    }
}

/// Queue an event for dispatch, waiting while the queue is full. Returns
/// false when the read loop must stop.
fn forward(tx: &mpsc::SyncSender<ChannelEvent>, event: ChannelEvent) -> bool {
    let last = matches!(event, ChannelEvent::Disconnected(_));
    tx.send(event).is_ok() && !last
}

async fn forward_async(tx: &tokio::sync::mpsc::Sender<ChannelEvent>, event: ChannelEvent) -> bool {
    let last = matches!(event, ChannelEvent::Disconnected(_));
    tx.send(event).await.is_ok() && !last
}

//! A bounded FIFO link between one output port and one input port.
//!
//! `hbflow.core.component.Connection` wraps an `asyncio.Queue(capacity)`
//! behind a tiny `new -> linked -> unlinked` state machine built on the
//! `transitions` library. The queue here is `tokio::sync::mpsc`, whose
//! bounded sender already blocks the producer when the queue is full —
//! exactly the backpressure the original's `await queue.put(...)` gives —
//! so no manual blocking logic is needed, only the link/unlink bookkeeping
//! around it.
//!
//! `link_instance.rs` elsewhere in this lineage models a similar
//! point-to-point channel but evicts the oldest entry on overflow instead
//! of blocking the writer. That discipline doesn't fit a connection that
//! must never silently drop packets, so the channel primitive here is a
//! blocking-send one while the surrounding link/unlink shape is kept.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use uuid::Uuid;

use crate::error::ConnectionError;
use crate::ids::Identity;
use crate::packet::Packet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Linked,
    Unlinked,
}

impl ConnectionState {
    fn label(self) -> &'static str {
        match self {
            ConnectionState::New => "new",
            ConnectionState::Linked => "linked",
            ConnectionState::Unlinked => "unlinked",
        }
    }
}

struct ChannelHalves {
    sender: mpsc::Sender<Packet>,
    receiver: AsyncMutex<mpsc::Receiver<Packet>>,
}

struct Inner {
    state: ConnectionState,
    channel: Option<Arc<ChannelHalves>>,
}

/// Descriptive endpoint labels captured at link time, used for logging and
/// display only — the connection does not hold a live reference back to
/// either port, so there is no ownership cycle between `Port` and
/// `Connection`.
#[derive(Debug, Clone, Default)]
pub struct EndpointLabels {
    pub source: Option<String>,
    pub target: Option<String>,
}

pub struct Connection {
    pub id: Uuid,
    pub name: String,
    pub capacity: usize,
    inner: parking_lot::RwLock<Inner>,
    labels: parking_lot::RwLock<EndpointLabels>,
    // Fires independently of `inner.channel` so a pending `get`/`put` —
    // which necessarily holds its own `Arc<ChannelHalves>` clone and thus
    // keeps the `Sender` alive — still observes `unlink` promptly instead
    // of waiting on a sender drop that the waiter itself is preventing.
    closed_tx: watch::Sender<bool>,
}

impl Connection {
    pub fn new(name: Option<String>, capacity: usize) -> Result<Self, ConnectionError> {
        if capacity == 0 {
            return Err(ConnectionError::InvalidCapacity(capacity));
        }
        let identity = Identity::new::<Connection>(name);
        let (closed_tx, _) = watch::channel(false);
        Ok(Self {
            id: identity.id,
            name: identity.name,
            capacity,
            inner: parking_lot::RwLock::new(Inner {
                state: ConnectionState::New,
                channel: None,
            }),
            labels: parking_lot::RwLock::new(EndpointLabels::default()),
            closed_tx,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.read().state
    }

    pub fn labels(&self) -> EndpointLabels {
        self.labels.read().clone()
    }

    /// Open the channel and move `new -> linked`. `source`/`target` are
    /// `"process.port"`-style labels kept only for logging.
    pub fn link(&self, source: String, target: String) -> Result<(), ConnectionError> {
        let mut inner = self.inner.write();
        if inner.state != ConnectionState::New {
            return Err(ConnectionError::AlreadyLinked);
        }
        let (sender, receiver) = mpsc::channel(self.capacity);
        inner.channel = Some(Arc::new(ChannelHalves {
            sender,
            receiver: AsyncMutex::new(receiver),
        }));
        inner.state = ConnectionState::Linked;
        drop(inner);
        *self.labels.write() = EndpointLabels {
            source: Some(source.clone()),
            target: Some(target.clone()),
        };
        tracing::debug!(connection = %self.name, %source, %target, "connection linked");
        Ok(())
    }

    /// Close the channel and move `linked -> unlinked`. Any pending
    /// `get`/`put` calls observe a closed channel and return accordingly.
    pub fn unlink(&self) -> Result<(), ConnectionError> {
        let mut inner = self.inner.write();
        if inner.state != ConnectionState::Linked {
            return Err(ConnectionError::NotUnlinkable(inner.state.label()));
        }
        inner.channel = None;
        inner.state = ConnectionState::Unlinked;
        drop(inner);
        let _ = self.closed_tx.send(true);
        tracing::debug!(connection = %self.name, "connection unlinked");
        Ok(())
    }

    fn channel_handle(&self) -> Option<Arc<ChannelHalves>> {
        let inner = self.inner.read();
        match inner.state {
            ConnectionState::Linked => inner.channel.clone(),
            _ => None,
        }
    }

    /// Enqueue a packet, awaiting a free slot if the queue is full. Resolves
    /// to `NotLinked` immediately if `unlink` fires while waiting for room.
    pub async fn put(&self, packet: Packet) -> Result<(), ConnectionError> {
        let channel = self.channel_handle().ok_or(ConnectionError::NotLinked)?;
        let mut closed = self.closed_tx.subscribe();
        tokio::select! {
            biased;
            result = channel.sender.send(packet) => result.map_err(|_| ConnectionError::NotLinked),
            _ = closed.changed() => Err(ConnectionError::NotLinked),
        }
    }

    /// Dequeue the next packet, or `None` if the connection has been
    /// unlinked while waiting.
    pub async fn get(&self) -> Option<Packet> {
        let channel = self.channel_handle()?;
        let mut closed = self.closed_tx.subscribe();
        tokio::select! {
            biased;
            packet = async { channel.receiver.lock().await.recv().await } => packet,
            _ = closed.changed() => None,
        }
    }

    /// Number of packets currently queued. For diagnostics only — never
    /// exceeds `capacity` by construction.
    pub fn queue_len(&self) -> usize {
        match self.channel_handle() {
            Some(c) => c.receiver.try_lock().map(|r| r.len()).unwrap_or(0),
            None => 0,
        }
    }
}

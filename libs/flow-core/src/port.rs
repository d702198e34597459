//! Named endpoints on a process: `InputPort` receives, `OutputPort` sends.
//!
//! Grounded on `hbflow.core.component.Port`/`InputPort`/`OutputPort`: both
//! kinds share a name, an optional description/display name, an array-size
//! slot (reserved, not yet usable — see `PortError::ArraySizeUnsupported`),
//! and a list of linked connections gated by a "connected" signal. The
//! original uses an `asyncio.Event` for that signal and a `threading`-free
//! single-loop model; here a `tokio::sync::watch<bool>` plays the same role
//! — it stores the current connected/disconnected value so a waiter that
//! arrives after the signal was already set doesn't miss it, which a plain
//! `Notify` would.
//!
//! `read_packet` races every linked connection's `get()` with
//! `futures::future::select_all`, mirroring the original's
//! `asyncio.wait(..., return_when=FIRST_COMPLETED)` over each connection's
//! `get_packet()`. `send_packet` fans a packet out to every linked
//! connection sequentially, as the original's `for cnx in connections:
//! await cnx.put_packet(...)` does — not concurrently, so a single slow or
//! full downstream connection backpressures the rest of the fan-out before
//! later ones are attempted.

use std::sync::Arc;

use futures::future::select_all;
use futures::FutureExt;
use tokio::sync::watch;
use uuid::Uuid;

use crate::connection::Connection;
use crate::error::PortError;
use crate::ids::Identity;
use crate::packet::Packet;

pub struct PortCore {
    pub id: Uuid,
    pub name: String,
    pub owner_name: String,
    pub description: Option<String>,
    pub display_name: Option<String>,
    pub array_size: u32,
    connections: parking_lot::RwLock<Vec<Arc<Connection>>>,
    connected_tx: watch::Sender<bool>,
    connected_rx: watch::Receiver<bool>,
}

impl PortCore {
    fn new(
        owner_name: String,
        name: String,
        description: Option<String>,
        display_name: Option<String>,
        array_size: u32,
    ) -> Result<Self, PortError> {
        if array_size > 1 {
            return Err(PortError::ArraySizeUnsupported(array_size));
        }
        let (connected_tx, connected_rx) = watch::channel(false);
        Ok(Self {
            id: Uuid::new_v4(),
            name,
            owner_name,
            description,
            display_name,
            array_size,
            connections: parking_lot::RwLock::new(Vec::new()),
            connected_tx,
            connected_rx,
        })
    }

    pub fn add_connection(&self, connection: Arc<Connection>) {
        let mut conns = self.connections.write();
        conns.push(connection);
        if conns.len() == 1 {
            let _ = self.connected_tx.send(true);
        }
    }

    pub fn remove_connection(&self, connection_id: Uuid) -> Result<(), PortError> {
        let mut conns = self.connections.write();
        let before = conns.len();
        conns.retain(|c| c.id != connection_id);
        if conns.len() == before {
            return Err(PortError::ConnectionNotFound(connection_id));
        }
        if conns.is_empty() {
            let _ = self.connected_tx.send(false);
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        !self.connections.read().is_empty()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().clone()
    }

    async fn wait_connected(&self) {
        let mut rx = self.connected_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

pub struct InputPort(PortCore);

impl std::ops::Deref for InputPort {
    type Target = PortCore;
    fn deref(&self) -> &PortCore {
        &self.0
    }
}

impl InputPort {
    pub fn new(
        owner_name: impl Into<String>,
        name: impl Into<String>,
        description: Option<String>,
        display_name: Option<String>,
        array_size: u32,
    ) -> Result<Self, PortError> {
        Ok(Self(PortCore::new(
            owner_name.into(),
            name.into(),
            description,
            display_name,
            array_size,
        )?))
    }

    /// Block until at least one connection is linked, then race every
    /// linked connection for the first packet to arrive. If all linked
    /// connections are unlinked concurrently, re-enter the wait instead of
    /// returning a spurious `None`.
    pub async fn read_packet(&self) -> Option<Packet> {
        loop {
            self.0.wait_connected().await;
            let conns = self.0.snapshot();
            if conns.is_empty() {
                continue;
            }
            let futures: Vec<_> = conns.iter().map(|c| c.get().boxed()).collect();
            let (packet, _idx, _rest) = select_all(futures).await;
            match packet {
                Some(p) => return Some(p),
                None => continue,
            }
        }
    }
}

pub struct OutputPort(PortCore);

impl std::ops::Deref for OutputPort {
    type Target = PortCore;
    fn deref(&self) -> &PortCore {
        &self.0
    }
}

impl OutputPort {
    pub fn new(
        owner_name: impl Into<String>,
        name: impl Into<String>,
        description: Option<String>,
        display_name: Option<String>,
        array_size: u32,
    ) -> Result<Self, PortError> {
        Ok(Self(PortCore::new(
            owner_name.into(),
            name.into(),
            description,
            display_name,
            array_size,
        )?))
    }

    /// Sending through an output with no connections is a silent no-op.
    /// Fan-out to multiple connections is sequential: a full or unlinked
    /// connection is logged and skipped rather than aborting the rest.
    pub async fn send_packet(&self, packet: Packet) {
        for conn in self.0.snapshot() {
            if let Err(err) = conn.put(packet.clone()).await {
                tracing::warn!(
                    port = %self.0.name,
                    connection = %conn.name,
                    error = %err,
                    "dropped packet on unlinked connection"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(conn: &Arc<Connection>) {
        conn.link("src.out".into(), "dst.in".into()).unwrap();
    }

    #[tokio::test]
    async fn read_packet_blocks_until_connected_then_returns_first_arrival() {
        let input = InputPort::new("sink", "in", None, None, 1).unwrap_err();
        assert!(matches!(input, PortError::ArraySizeUnsupported(1)));

        let input = InputPort::new("sink", "in", None, None, 0).unwrap();
        let conn = Arc::new(Connection::new(None, 4).unwrap());
        link(&conn);
        input.add_connection(conn.clone());

        let reader = tokio::spawn(async move { input.read_packet().await });
        tokio::task::yield_now().await;
        conn.put(Packet::data(9_i32)).await.unwrap();
        let got = reader.await.unwrap().unwrap();
        match got {
            Packet::Data(d) => assert_eq!(d.downcast_ref::<i32>(), Some(&9)),
            _ => panic!("expected data packet"),
        }
    }

    #[tokio::test]
    async fn read_packet_races_multiple_connections() {
        let input = InputPort::new("sink", "in", None, None, 0).unwrap();
        let a = Arc::new(Connection::new(Some("a".into()), 4).unwrap());
        let b = Arc::new(Connection::new(Some("b".into()), 4).unwrap());
        link(&a);
        link(&b);
        input.add_connection(a.clone());
        input.add_connection(b.clone());

        b.put(Packet::data(1_i32)).await.unwrap();
        let got = input.read_packet().await.unwrap();
        assert_eq!(got.id(), {
            // the only packet in flight came from `b`
            let Packet::Data(d) = got.clone() else {
                panic!("expected data")
            };
            d.id
        });
    }

    #[tokio::test]
    async fn send_with_no_connections_is_a_silent_no_op() {
        let output = OutputPort::new("src", "out", None, None, 0).unwrap();
        output.send_packet(Packet::empty_data()).await;
    }

    #[tokio::test]
    async fn send_fans_out_to_every_linked_connection() {
        let output = OutputPort::new("src", "out", None, None, 0).unwrap();
        let a = Arc::new(Connection::new(Some("a".into()), 2).unwrap());
        let b = Arc::new(Connection::new(Some("b".into()), 2).unwrap());
        link(&a);
        link(&b);
        output.add_connection(a.clone());
        output.add_connection(b.clone());

        let packet = Packet::data(3_i32);
        output.send_packet(packet.clone()).await;

        assert_eq!(a.get().await.unwrap().id(), packet.id());
        assert_eq!(b.get().await.unwrap().id(), packet.id());
    }

    #[tokio::test]
    async fn remove_connection_clears_connected_signal_when_last_one_goes() {
        let input = InputPort::new("sink", "in", None, None, 0).unwrap();
        let conn = Arc::new(Connection::new(None, 1).unwrap());
        link(&conn);
        input.add_connection(conn.clone());
        assert!(input.is_connected());

        input.remove_connection(conn.id).unwrap();
        assert!(!input.is_connected());
    }
}

//! The distinguished built-in component that broadcasts lifecycle commands.
//!
//! Grounded on `hbflow.core.engine.ProcessManager`: one output
//! (`command_out`), one input (`status_in`, reserved — see `DESIGN.md`'s
//! Open Question notes), and a `send_command` that enqueues a
//! `CommandPacket` for every wired process to pick up. It needs no
//! bespoke scheduling: it is spawned through the same `Process::spawn`
//! every other component uses.

use flow_core::{Packet, PacketError, Payload};

use crate::component::{Component, Process};
use crate::port_marker::PortMarker;

pub const COMMAND_OUT: &str = "command_out";
pub const STATUS_IN: &str = "status_in";

pub struct ProcessManager;

impl Component for ProcessManager {
    fn port_spec(&self) -> Vec<PortMarker> {
        vec![
            PortMarker::output(COMMAND_OUT),
            PortMarker::input(STATUS_IN),
        ]
    }
}

/// Broadcast `command` to every process wired to `pm`'s `command_out`.
/// Fails only if `command` is malformed (empty) — an unlinked
/// `command_out` is a silent no-op, per `OutputPort::send_packet`.
pub async fn broadcast(pm: &Process, command: &str, args: Option<Payload>) -> Result<(), PacketError> {
    let packet = Packet::command(command, args)?;
    let port = pm
        .output_port(COMMAND_OUT)
        .expect("ProcessManager always has command_out");
    port.send_packet(packet).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands;
    use flow_core::Connection;
    use std::sync::Arc;

    #[tokio::test]
    async fn broadcast_reaches_every_wired_process() {
        let pm = Process::spawn(Some("pm".into()), Box::new(ProcessManager)).unwrap();
        let conn_a = Arc::new(Connection::new(None, 1).unwrap());
        let conn_b = Arc::new(Connection::new(None, 1).unwrap());
        conn_a.link("pm.command_out".into(), "a._command_in".into()).unwrap();
        conn_b.link("pm.command_out".into(), "b._command_in".into()).unwrap();
        pm.output_port(COMMAND_OUT).unwrap().add_connection(conn_a.clone());
        pm.output_port(COMMAND_OUT).unwrap().add_connection(conn_b.clone());

        broadcast(&pm, commands::START, None).await.unwrap();

        let a = conn_a.get().await.unwrap();
        let b = conn_b.get().await.unwrap();
        match (a, b) {
            (Packet::Command(a), Packet::Command(b)) => {
                assert_eq!(a.command, commands::START);
                assert_eq!(b.command, commands::START);
            }
            _ => panic!("expected command packets"),
        }
    }
}

//! `Component`: the reusable template; `Process`: a live instance of one,
//! running its own dispatch loop and lifecycle state machine.
//!
//! Grounded on `hbflow.core.component.Component` — port materialization
//! from class-level markers, the reserved `_command_in`/`_log_out`/
//! `_status_out` ports, and `_packet_loop`'s five-step dispatch cycle
//! — and on `streamlib-core::stream_processor::StreamProcessor`
//! for the shape of a small, mostly-default-implemented lifecycle trait.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use flow_core::{Identity, InputPort, OutputPort, Packet, Payload, PortError};
use futures::future::{select_all, BoxFuture};
use futures::FutureExt;
use parking_lot::Mutex as SyncMutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::commands;
use crate::port_marker::{PortDirection, PortMarker};
use crate::state::{ComponentState, ComponentStateMachine, ComponentTrigger};

pub const COMMAND_IN: &str = "_command_in";
pub const LOG_OUT: &str = "_log_out";
pub const STATUS_OUT: &str = "_status_out";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Handled,
    Unknown,
}

/// A reusable template: declares ports and reacts to packets. Instantiated
/// as a `Process` by `Process::spawn` (directly) or by a
/// `ComponentConstructor` resolved through a `ComponentRegistry`.
pub trait Component: Send + Sync + 'static {
    /// Ports this component declares beyond the three reserved ones every
    /// process gets automatically. Must be stable across calls on one
    /// instance.
    fn port_spec(&self) -> Vec<PortMarker>;

    /// Named inputs, beyond the mandatory `_command_in`, the dispatch loop
    /// should race on every cycle. The default loop watches only
    /// `_command_in`; richer components override the watch set.
    fn watched_inputs(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Handle a command not recognized by the runtime (`START`/`STOP`/
    /// `SHUTDOWN` are serviced by the dispatch loop itself and never reach
    /// here). Default: every command is unknown.
    fn handle_command<'a>(
        &'a mut self,
        command: &'a str,
        args: Option<Payload>,
    ) -> BoxFuture<'a, CommandOutcome> {
        let _ = args;
        Box::pin(async move { CommandOutcome::Unknown })
    }

    /// React to a data packet arriving on a watched input. Default: no-op.
    fn on_packet<'a>(&'a mut self, port: &'a str, packet: Packet) -> BoxFuture<'a, ()> {
        let _ = (port, packet);
        Box::pin(async move {})
    }
}

/// A live instance of a `Component`: ports, identity, lifecycle state, and
/// a handle to the `tokio` task running its dispatch loop. The boxed
/// `Component` itself lives inside that task, not here — nothing outside
/// the task touches it directly, matching the "only one `onPacket`
/// invocation active per process at a time."
pub struct Process {
    pub identity: Identity,
    pub input_ports: HashMap<String, Arc<InputPort>>,
    pub output_ports: HashMap<String, Arc<OutputPort>>,
    pub state: Arc<ComponentStateMachine>,
    task: SyncMutex<Option<JoinHandle<()>>>,
}

impl Process {
    pub fn id(&self) -> Uuid {
        self.identity.id
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn input_port(&self, name: &str) -> Option<Arc<InputPort>> {
        self.input_ports.get(name).cloned()
    }

    pub fn output_port(&self, name: &str) -> Option<Arc<OutputPort>> {
        self.output_ports.get(name).cloned()
    }

    /// Abort the dispatch-loop task unconditionally. Used only during
    /// `GraphEngine::shutdown`.
    pub fn cancel(&self) {
        if let Some(handle) = self.task.lock().as_ref() {
            handle.abort();
        }
    }

    /// Materialize a process from a boxed component: build its reserved
    /// and declared ports, then spawn its dispatch loop.
    pub fn spawn(name: Option<String>, mut component: Box<dyn Component>) -> Result<Arc<Process>, PortError> {
        let identity = Identity::new::<Process>(name);

        let mut input_ports = HashMap::new();
        let mut output_ports = HashMap::new();

        input_ports.insert(
            COMMAND_IN.to_string(),
            Arc::new(InputPort::new(identity.name.clone(), COMMAND_IN, None, None, 1)?),
        );
        input_ports.insert(
            LOG_OUT.to_string(),
            Arc::new(InputPort::new(identity.name.clone(), LOG_OUT, None, None, 1)?),
        );
        output_ports.insert(
            STATUS_OUT.to_string(),
            Arc::new(OutputPort::new(identity.name.clone(), STATUS_OUT, None, None, 1)?),
        );

        for marker in component.port_spec() {
            match marker.direction {
                PortDirection::Input => {
                    let port = InputPort::new(
                        identity.name.clone(),
                        marker.name,
                        marker.description.map(str::to_string),
                        marker.display_name.map(str::to_string),
                        marker.array_size,
                    )?;
                    input_ports.insert(marker.name.to_string(), Arc::new(port));
                }
                PortDirection::Output => {
                    let port = OutputPort::new(
                        identity.name.clone(),
                        marker.name,
                        marker.description.map(str::to_string),
                        marker.display_name.map(str::to_string),
                        marker.array_size,
                    )?;
                    output_ports.insert(marker.name.to_string(), Arc::new(port));
                }
            }
        }

        let state = Arc::new(ComponentStateMachine::new());
        let process = Arc::new(Process {
            identity: identity.clone(),
            input_ports: input_ports.clone(),
            output_ports,
            state: state.clone(),
            task: SyncMutex::new(None),
        });

        let process_name = identity.name;
        let handle = tokio::spawn(dispatch_loop(process_name, component, state, input_ports));
        *process.task.lock() = Some(handle);

        Ok(process)
    }
}

enum LoopControl {
    Continue,
    Break,
}

/// Block on `_command_in` until a `START` CommandPacket arrives, ignoring
/// anything else that shows up first. The process sits in `new` for this
/// entire wait — `start`/`start_ok` only fire once the broadcast actually
/// lands, not the instant the task is spawned.
async fn await_start_command(command_in: &InputPort, process_name: &str) {
    loop {
        match command_in.read_packet().await {
            Some(Packet::Command(cmd)) if cmd.command == commands::START => return,
            Some(Packet::Command(cmd)) => {
                tracing::warn!(process = %process_name, command = %cmd.command, "ignoring command received before START");
            }
            Some(Packet::Data(_)) => {
                tracing::warn!(process = %process_name, "ignoring data packet received before START");
            }
            None => {
                tracing::warn!(process = %process_name, "spurious wake while awaiting START");
            }
        }
    }
}

/// The per-process packet dispatch loop, wired onto
/// the component state machine:
///
/// idle --(run)--> running --(wait)--> waiting --[blocked in select]--
/// --(run)--> running --(idle)--> idle --(run)--> ...
///
/// `run`'s valid sources are `{idle, waiting}` and `wait` only leaves
/// `running`, so every cycle must pass through `running` twice: once to
/// begin the cycle (before blocking on the next read) and once after a
/// packet arrives (now actively processing it) — the literal reading of
/// a literal transition table once a control-flow is hung on it.
async fn dispatch_loop(
    process_name: String,
    mut component: Box<dyn Component>,
    state: Arc<ComponentStateMachine>,
    input_ports: HashMap<String, Arc<InputPort>>,
) {
    let command_in = input_ports.get(COMMAND_IN).cloned().expect("reserved port");
    await_start_command(&command_in, &process_name).await;
    state.fire(ComponentTrigger::Start).expect("new -> starting");
    state.fire(ComponentTrigger::StartOk).expect("starting -> idle");

    let mut watched: Vec<(String, Arc<InputPort>)> = vec![(COMMAND_IN.to_string(), command_in)];
    for name in component.watched_inputs() {
        match input_ports.get(name) {
            Some(port) => watched.push((name.to_string(), port.clone())),
            None => tracing::warn!(process = %process_name, port = name, "watched input not declared on this component"),
        }
    }

    loop {
        state.fire(ComponentTrigger::Run).expect("idle|waiting -> running (cycle start)");
        state.fire(ComponentTrigger::Wait).expect("running -> waiting");

        let reads: Vec<_> = watched
            .iter()
            .map(|(name, port)| {
                let name = name.clone();
                let port = port.clone();
                async move { (name, port.read_packet().await) }.boxed()
            })
            .collect();
        let ((port_name, packet), _idx, _rest) = select_all(reads).await;

        state.fire(ComponentTrigger::Run).expect("waiting -> running (packet arrived)");

        let control = match packet {
            None => {
                tracing::warn!(process = %process_name, port = %port_name, "spurious wake: no packet");
                LoopControl::Continue
            }
            Some(Packet::Command(cmd)) if port_name == COMMAND_IN => {
                dispatch_command(&mut component, &cmd.command, cmd.args.clone(), &state, &process_name).await
            }
            Some(other) => {
                dispatch_data(&mut component, &port_name, other, &process_name).await;
                LoopControl::Continue
            }
        };

        match control {
            LoopControl::Continue => {
                state.fire(ComponentTrigger::Idle).expect("running -> idle");
            }
            LoopControl::Break => break,
        }
    }
}

async fn dispatch_command(
    component: &mut Box<dyn Component>,
    command: &str,
    args: Option<Payload>,
    state: &ComponentStateMachine,
    process_name: &str,
) -> LoopControl {
    match command {
        commands::START => {
            // The START that actually drove `new -> starting -> idle` was
            // consumed by `await_start_command` before this loop began;
            // a second START reaching the main loop is a harmless
            // re-affirmation.
            LoopControl::Continue
        }
        commands::STOP => {
            state.fire(ComponentTrigger::Stop).expect("running -> stopping");
            state.fire(ComponentTrigger::Stop).expect("stopping -> stopped");
            LoopControl::Break
        }
        commands::SHUTDOWN => {
            if state.current() != ComponentState::Stopped {
                let _ = state.fire(ComponentTrigger::Stop);
                let _ = state.fire(ComponentTrigger::Stop);
            }
            state.force_set(ComponentState::Shutdown);
            LoopControl::Break
        }
        other => {
            let outcome = AssertUnwindSafe(component.handle_command(other, args))
                .catch_unwind()
                .await;
            match outcome {
                Ok(CommandOutcome::Handled) => {}
                Ok(CommandOutcome::Unknown) => {
                    tracing::warn!(process = %process_name, command = other, "unknown command; ignoring");
                }
                Err(_) => {
                    tracing::error!(process = %process_name, command = other, "command handler panicked; continuing");
                }
            }
            LoopControl::Continue
        }
    }
}

async fn dispatch_data(
    component: &mut Box<dyn Component>,
    port_name: &str,
    packet: Packet,
    process_name: &str,
) {
    let outcome = AssertUnwindSafe(component.on_packet(port_name, packet))
        .catch_unwind()
        .await;
    if outcome.is_err() {
        tracing::error!(process = %process_name, port = port_name, "on_packet panicked; continuing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flow_core::Connection;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        seen: Arc<AtomicUsize>,
    }

    impl Component for Echo {
        fn port_spec(&self) -> Vec<PortMarker> {
            vec![PortMarker::input("in"), PortMarker::output("out")]
        }

        fn watched_inputs(&self) -> Vec<&'static str> {
            vec!["in"]
        }

        fn on_packet<'a>(&'a mut self, _port: &'a str, _packet: Packet) -> BoxFuture<'a, ()> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {})
        }
    }

    struct Panicker;

    impl Component for Panicker {
        fn port_spec(&self) -> Vec<PortMarker> {
            vec![PortMarker::input("in")]
        }

        fn watched_inputs(&self) -> Vec<&'static str> {
            vec!["in"]
        }

        fn on_packet<'a>(&'a mut self, _port: &'a str, packet: Packet) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                if let Packet::Data(d) = &packet {
                    if d.downcast_ref::<&str>() == Some(&"boom") {
                        panic!("synthetic handler panic");
                    }
                }
            })
        }
    }

    #[tokio::test]
    async fn reserved_ports_exist_on_every_process() {
        let seen = Arc::new(AtomicUsize::new(0));
        let process = Process::spawn(Some("echo".into()), Box::new(Echo { seen })).unwrap();
        assert!(process.input_port(COMMAND_IN).is_some());
        assert!(process.input_port(LOG_OUT).is_some());
        assert!(process.output_port(STATUS_OUT).is_some());
        assert!(process.input_port("in").is_some());
        assert!(process.output_port("out").is_some());
        process.cancel();
    }

    /// Wires a command connection onto `process` and sends it `START`,
    /// waiting until the process actually leaves `new` before returning.
    async fn start_process(process: &Process) -> Arc<Connection> {
        let cmd_conn = Arc::new(Connection::new(None, 1).unwrap());
        cmd_conn
            .link("pm.command_out".into(), format!("{}.{}", process.name(), COMMAND_IN))
            .unwrap();
        process.input_port(COMMAND_IN).unwrap().add_connection(cmd_conn.clone());
        cmd_conn.put(Packet::command(commands::START, None).unwrap()).await.unwrap();

        for _ in 0..100 {
            tokio::task::yield_now().await;
            if process.state.current() != ComponentState::New {
                break;
            }
        }
        assert_ne!(process.state.current(), ComponentState::New, "process never left `new`");
        cmd_conn
    }

    #[tokio::test]
    async fn process_stays_new_until_start_command_arrives() {
        let seen = Arc::new(AtomicUsize::new(0));
        let process = Process::spawn(Some("echo".into()), Box::new(Echo { seen })).unwrap();

        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
        assert_eq!(process.state.current(), ComponentState::New);
        process.cancel();
    }

    #[tokio::test]
    async fn data_packet_on_watched_input_reaches_on_packet() {
        let seen = Arc::new(AtomicUsize::new(0));
        let process = Process::spawn(Some("echo".into()), Box::new(Echo { seen: seen.clone() })).unwrap();
        start_process(&process).await;

        let conn = Arc::new(Connection::new(None, 2).unwrap());
        conn.link("src.out".into(), "echo.in".into()).unwrap();
        process.input_port("in").unwrap().add_connection(conn.clone());

        conn.put(Packet::data(1_i32)).await.unwrap();
        // Let the dispatch loop run a few turns.
        for _ in 0..20 {
            tokio::task::yield_now().await;
            if seen.load(Ordering::SeqCst) > 0 {
                break;
            }
        }
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        process.cancel();
    }

    #[tokio::test]
    async fn stop_command_transitions_to_stopped_and_ends_the_loop() {
        let seen = Arc::new(AtomicUsize::new(0));
        let process = Process::spawn(Some("echo".into()), Box::new(Echo { seen })).unwrap();
        let cmd_conn = start_process(&process).await;

        cmd_conn.put(Packet::command(commands::STOP, None).unwrap()).await.unwrap();

        for _ in 0..50 {
            tokio::task::yield_now().await;
            if process.state.current() == ComponentState::Stopped {
                break;
            }
        }
        assert_eq!(process.state.current(), ComponentState::Stopped);
    }

    #[tokio::test]
    async fn on_packet_panic_does_not_kill_the_dispatch_loop() {
        let process = Process::spawn(Some("panicker".into()), Box::new(Panicker)).unwrap();
        let cmd_conn = start_process(&process).await;

        let conn = Arc::new(Connection::new(None, 4).unwrap());
        conn.link("src.out".into(), "panicker.in".into()).unwrap();
        process.input_port("in").unwrap().add_connection(conn.clone());

        conn.put(Packet::data("boom")).await.unwrap();
        conn.put(Packet::data("fine")).await.unwrap();

        // The process must still be alive and idle-cycling afterward —
        // the stop command below is only serviced if the loop survived.
        cmd_conn.put(Packet::command(commands::STOP, None).unwrap()).await.unwrap();

        for _ in 0..100 {
            tokio::task::yield_now().await;
            if process.state.current() == ComponentState::Stopped {
                break;
            }
        }
        assert_eq!(process.state.current(), ComponentState::Stopped);
    }
}

//! Resolves a `GraphDescriptor` into a live process network and drives
//! its global lifecycle.
//!
//! Grounded on `hbflow.core.engine.GraphEngine`: `_init_processes` /
//! `_init_connections` / `_init_process_manager` run in that order inside
//! `bind` (the two-phase resolution order — processes, then
//! connections, then the manager — so every cross-reference is
//! name-resolvable by the time it's looked up), and a failed bind rolls
//! back to `unresolved` via `state.unresolve()`. Here the rollback is
//! structural rather than a separate undo step: everything spawned or
//! linked during a `bind` attempt lives in local variables until the
//! whole resolution succeeds, so a failure partway through only has to
//! cancel/unlink what this attempt itself created before returning —
//! `self`'s committed maps are never touched until success.

use std::collections::HashMap;
use std::sync::Arc;

use flow_core::Connection;
use uuid::Uuid;

use crate::commands;
use crate::component::{Component, Process, COMMAND_IN};
use crate::error::{EngineError, GraphError};
use crate::graph::GraphDescriptor;
use crate::process_manager::{self, ProcessManager, COMMAND_OUT};
use crate::registry::ComponentRegistry;
use crate::state::{EngineState, EngineStateMachine, EngineTrigger};

struct ResolvedGraph {
    processes: HashMap<Uuid, Arc<Process>>,
    process_by_name: HashMap<String, Uuid>,
    connections: HashMap<Uuid, Arc<Connection>>,
    process_manager: Arc<Process>,
}

pub struct GraphEngine<R: ComponentRegistry> {
    registry: Arc<R>,
    state: EngineStateMachine,
    processes: parking_lot::RwLock<HashMap<Uuid, Arc<Process>>>,
    process_by_name: parking_lot::RwLock<HashMap<String, Uuid>>,
    connections: parking_lot::RwLock<HashMap<Uuid, Arc<Connection>>>,
    process_manager: parking_lot::RwLock<Option<Arc<Process>>>,
}

impl<R: ComponentRegistry> GraphEngine<R> {
    pub fn new(registry: Arc<R>) -> Self {
        Self {
            registry,
            state: EngineStateMachine::new(),
            processes: parking_lot::RwLock::new(HashMap::new()),
            process_by_name: parking_lot::RwLock::new(HashMap::new()),
            connections: parking_lot::RwLock::new(HashMap::new()),
            process_manager: parking_lot::RwLock::new(None),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state.current()
    }

    pub fn process_count(&self) -> usize {
        self.processes.read().len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }

    pub fn process_by_name(&self, name: &str) -> Option<Arc<Process>> {
        let id = *self.process_by_name.read().get(name)?;
        self.processes.read().get(&id).cloned()
    }

    pub fn connection(&self, id: Uuid) -> Option<Arc<Connection>> {
        self.connections.read().get(&id).cloned()
    }

    /// Convenience: decode a configuration map into a `GraphDescriptor`
    /// (unwrapping an outer `graph:` key if present) and `bind` it.
    pub fn init_from_descriptor(&self, value: serde_yaml::Value) -> Result<(), EngineError> {
        let graph = GraphDescriptor::from_value(value)?;
        self.bind(&graph)
    }

    /// Valid only in `New` or `Shutdown`. On success the engine is
    /// `Resolved` with a fully wired network; on any failure it is
    /// `Unresolved` with nothing from this attempt left behind.
    pub fn bind(&self, graph: &GraphDescriptor) -> Result<(), EngineError> {
        let current = self.state.current();
        if !matches!(current, EngineState::New | EngineState::Unresolved)
            && current != EngineState::Shutdown
        {
            return Err(EngineError::InvalidTransition {
                operation: "bind",
                state: current,
            });
        }

        match self.resolve(graph) {
            Ok(resolved) => {
                *self.processes.write() = resolved.processes;
                *self.process_by_name.write() = resolved.process_by_name;
                *self.connections.write() = resolved.connections;
                *self.process_manager.write() = Some(resolved.process_manager);
                self.state
                    .fire(EngineTrigger::Resolve)
                    .expect("new|unresolved -> resolved");
                Ok(())
            }
            Err(err) => {
                self.state.fire(EngineTrigger::Unresolve);
                Err(err.into())
            }
        }
    }

    fn resolve(&self, graph: &GraphDescriptor) -> Result<ResolvedGraph, GraphError> {
        let mut processes: HashMap<Uuid, Arc<Process>> = HashMap::new();
        let mut process_by_name: HashMap<String, Uuid> = HashMap::new();
        let mut connections: HashMap<Uuid, Arc<Connection>> = HashMap::new();
        let mut connection_names: HashMap<String, Uuid> = HashMap::new();

        macro_rules! rollback_and_return {
            ($err:expr) => {{
                for conn in connections.values() {
                    let _ = conn.unlink();
                }
                for proc in processes.values() {
                    proc.cancel();
                }
                return Err($err);
            }};
        }

        // Phase 1: processes, in declaration order.
        for (process_name, desc) in graph.processes.iter() {
            if process_by_name.contains_key(process_name) {
                rollback_and_return!(GraphError::DuplicateProcess(process_name.clone()));
            }

            if let Some(group) = &desc.group {
                tracing::warn!(process = %process_name, group = %group, "process groups are not implemented yet");
            }

            let constructor = match self.registry.resolve(&desc.component) {
                Ok(c) => c,
                Err(source) => rollback_and_return!(GraphError::ComponentInstantiation {
                    process: process_name.clone(),
                    source,
                }),
            };
            let component: Box<dyn Component> = constructor(process_name);
            let process = match Process::spawn(Some(process_name.clone()), component) {
                Ok(p) => p,
                Err(source) => rollback_and_return!(GraphError::InvalidPortDeclaration {
                    process: process_name.clone(),
                    source,
                }),
            };
            process_by_name.insert(process_name.clone(), process.id());
            processes.insert(process.id(), process);
        }

        // Phase 2: connections, in declaration order.
        for desc in graph.connections.iter() {
            if let Some(name) = &desc.name {
                if connection_names.contains_key(name) {
                    rollback_and_return!(GraphError::DuplicateConnection(name.clone()));
                }
            }

            let source_process = match process_by_name
                .get(&desc.source.process)
                .and_then(|id| processes.get(id))
            {
                Some(p) => p.clone(),
                None => rollback_and_return!(GraphError::UnknownProcess(desc.source.process.clone())),
            };
            let target_process = match process_by_name
                .get(&desc.target.process)
                .and_then(|id| processes.get(id))
            {
                Some(p) => p.clone(),
                None => rollback_and_return!(GraphError::UnknownProcess(desc.target.process.clone())),
            };

            let source_port = match source_process.output_port(&desc.source.port) {
                Some(p) => p,
                None => rollback_and_return!(GraphError::UnknownPort {
                    process: desc.source.process.clone(),
                    port: desc.source.port.clone(),
                }),
            };
            let target_port = match target_process.input_port(&desc.target.port) {
                Some(p) => p,
                None => rollback_and_return!(GraphError::UnknownPort {
                    process: desc.target.process.clone(),
                    port: desc.target.port.clone(),
                }),
            };

            let capacity = desc.capacity.unwrap_or(1);
            if capacity <= 0 {
                rollback_and_return!(GraphError::InvalidCapacity(capacity));
            }

            let connection = match Connection::new(desc.name.clone(), capacity as usize) {
                Ok(c) => Arc::new(c),
                Err(_) => rollback_and_return!(GraphError::InvalidCapacity(capacity)),
            };
            let source_label = format!("{}.{}", desc.source.process, desc.source.port);
            let target_label = format!("{}.{}", desc.target.process, desc.target.port);
            if connection.link(source_label, target_label).is_err() {
                rollback_and_return!(GraphError::InvalidCapacity(capacity));
            }
            source_port.add_connection(connection.clone());
            target_port.add_connection(connection.clone());

            if let Some(name) = &desc.name {
                connection_names.insert(name.clone(), connection.id);
            }
            connections.insert(connection.id, connection);
        }

        // Phase 3: the ProcessManager, wired to every process's command input.
        let pm_component: Box<dyn Component> = Box::new(ProcessManager);
        let pm = match Process::spawn(Some("ProcessManager".to_string()), pm_component) {
            Ok(p) => p,
            Err(source) => rollback_and_return!(GraphError::InvalidPortDeclaration {
                process: "ProcessManager".to_string(),
                source,
            }),
        };
        let pm_command_out = pm
            .output_port(COMMAND_OUT)
            .expect("ProcessManager always has command_out");

        for process in processes.values() {
            let command_in = process
                .input_port(COMMAND_IN)
                .expect("every process has a reserved _command_in");
            let conn = Arc::new(
                Connection::new(None, 1).expect("capacity 1 is always valid"),
            );
            conn.link(
                "ProcessManager.command_out".to_string(),
                format!("{}.{}", process.name(), COMMAND_IN),
            )
            .expect("a freshly constructed connection always links");
            pm_command_out.add_connection(conn.clone());
            command_in.add_connection(conn.clone());
            connections.insert(conn.id, conn);
        }

        Ok(ResolvedGraph {
            processes,
            process_by_name,
            connections,
            process_manager: pm,
        })
    }

    /// Broadcast `START`. Valid in `Resolved` or `Idle`.
    pub async fn start(&self) -> Result<(), EngineError> {
        let current = self.state.current();
        if !matches!(current, EngineState::Resolved | EngineState::Idle) {
            return Err(EngineError::InvalidTransition {
                operation: "start",
                state: current,
            });
        }
        self.broadcast(commands::START).await?;
        self.state.fire(EngineTrigger::Run);
        Ok(())
    }

    /// Broadcast `STOP`. Valid in `Running` or `Idle`.
    pub async fn stop(&self) -> Result<(), EngineError> {
        let current = self.state.current();
        if !matches!(current, EngineState::Running | EngineState::Idle) {
            return Err(EngineError::InvalidTransition {
                operation: "stop",
                state: current,
            });
        }
        self.broadcast(commands::STOP).await?;
        self.state.fire(EngineTrigger::Stop);
        self.state.fire(EngineTrigger::Stop);
        Ok(())
    }

    /// Broadcast `SHUTDOWN`, then cancel every process task, unlink every
    /// connection, and clear the engine's maps — valid only in `Stopped`,
    /// after which a new `bind` is accepted. The broadcast is best-effort:
    /// the teardown that follows happens unconditionally regardless of
    /// whether any process was still alive to receive it.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let current = self.state.current();
        if current != EngineState::Stopped {
            return Err(EngineError::InvalidTransition {
                operation: "shutdown",
                state: current,
            });
        }

        let _ = self.broadcast(commands::SHUTDOWN).await;

        for process in self.processes.write().drain() {
            process.1.cancel();
        }
        self.process_by_name.write().clear();
        for connection in self.connections.write().drain() {
            let _ = connection.1.unlink();
        }
        if let Some(pm) = self.process_manager.write().take() {
            pm.cancel();
        }

        self.state.fire(EngineTrigger::Shutdown);
        Ok(())
    }

    async fn broadcast(&self, command: &str) -> Result<(), EngineError> {
        let pm = self
            .process_manager
            .read()
            .clone()
            .ok_or(EngineError::ProcessManagerMissing)?;
        process_manager::broadcast(&pm, command, None)
            .await
            .map_err(|_| EngineError::ProcessManagerMissing)
    }
}

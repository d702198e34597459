//! Lifecycle state machines for processes and the engine.
//!
//! Modeled the way `streamlib`'s `core` modules model state elsewhere in
//! this lineage (`runtime::state::RuntimeState`,
//! `processors::state::ProcessorState`, `executor::ExecutorState`,
//! `graph::edges::link_state::LinkState`): a plain enum, an explicit
//! transition match, and a thin handle type guarding interior mutability —
//! no external state-machine crate, even though the underlying `hbflow`
//! source uses Python's `transitions` library for exactly this purpose.

use crate::error::TransitionError;

/// States of a live process. `running` means actively
/// processing a packet; `waiting` means blocked in `read_packet`; `idle`
/// means the dispatch loop is alive with no packet in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentState {
    New,
    Starting,
    Waiting,
    Running,
    Idle,
    Stopping,
    Stopped,
    Shutdown,
}

impl std::fmt::Display for ComponentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentTrigger {
    Start,
    StartOk,
    StartKo,
    Run,
    Wait,
    Idle,
    Stop,
    Shutdown,
}

impl std::fmt::Display for ComponentTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl ComponentState {
    fn apply(self, trigger: ComponentTrigger) -> Option<ComponentState> {
        use ComponentState::*;
        use ComponentTrigger::*;
        match (self, trigger) {
            (New, Start) => Some(Starting),
            (Starting, StartOk) => Some(Idle),
            (Starting, StartKo) => Some(Stopped),
            (Idle, Run) | (Waiting, Run) => Some(Running),
            (Running, Wait) => Some(Waiting),
            (Running, Idle) => Some(Idle),
            (Running, Stop) | (Waiting, Stop) => Some(Stopping),
            (Stopping, Stop) => Some(Stopped),
            (Stopped, Shutdown) => Some(Shutdown),
            _ => None,
        }
    }
}

/// A `ComponentState` behind a lock, with the documented transition table
/// enforced on every `fire`.
pub struct ComponentStateMachine(parking_lot::Mutex<ComponentState>);

impl ComponentStateMachine {
    pub fn new() -> Self {
        Self(parking_lot::Mutex::new(ComponentState::New))
    }

    pub fn current(&self) -> ComponentState {
        *self.0.lock()
    }

    pub fn fire(&self, trigger: ComponentTrigger) -> Result<ComponentState, TransitionError> {
        let mut guard = self.0.lock();
        match guard.apply(trigger) {
            Some(next) => {
                *guard = next;
                Ok(next)
            }
            None => Err(TransitionError {
                state: guard.to_string(),
                trigger: trigger.to_string(),
            }),
        }
    }

    /// Force the state without transition validation. Used only by
    /// `GraphEngine::shutdown`, which tears down every process
    /// unconditionally regardless of where each one happened to be in its
    /// own lifecycle.
    pub fn force_set(&self, state: ComponentState) {
        *self.0.lock() = state;
    }
}

impl Default for ComponentStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// States of the `GraphEngine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    New,
    Resolved,
    Unresolved,
    Running,
    Idle,
    Stopping,
    Stopped,
    Shutdown,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineTrigger {
    Resolve,
    Unresolve,
    Run,
    Idle,
    Stop,
    Shutdown,
}

impl EngineState {
    fn apply(self, trigger: EngineTrigger) -> Option<EngineState> {
        use EngineState::*;
        use EngineTrigger::*;
        match (self, trigger) {
            (New, Resolve) | (Unresolved, Resolve) => Some(Resolved),
            // `unresolve` signals a failed `bind`; reachable from either
            // of `bind`'s two valid entry states ("valid only
            // in new or shutdown"), not just `new` as a literal transition
            // table would enumerate — a bind attempted right after a
            // `shutdown` must be able to fail the same way one attempted
            // from `new` can.
            (New, Unresolve) | (Shutdown, Unresolve) => Some(Unresolved),
            (Resolved, Run) | (Idle, Run) => Some(Running),
            (Running, Idle) => Some(Idle),
            (Running, Stop) | (Idle, Stop) => Some(Stopping),
            (Stopping, Stop) => Some(Stopped),
            (Stopped, Shutdown) => Some(Shutdown),
            _ => None,
        }
    }
}

pub struct EngineStateMachine(parking_lot::Mutex<EngineState>);

impl EngineStateMachine {
    pub fn new() -> Self {
        Self(parking_lot::Mutex::new(EngineState::New))
    }

    pub fn current(&self) -> EngineState {
        *self.0.lock()
    }

    pub fn fire(&self, trigger: EngineTrigger) -> Option<EngineState> {
        let mut guard = self.0.lock();
        let next = guard.apply(trigger)?;
        *guard = next;
        Some(next)
    }

    pub fn force_set(&self, state: EngineState) {
        *self.0.lock() = state;
    }
}

impl Default for EngineStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_happy_path_reaches_every_non_terminal_state() {
        let m = ComponentStateMachine::new();
        assert_eq!(m.current(), ComponentState::New);
        assert_eq!(m.fire(ComponentTrigger::Start).unwrap(), ComponentState::Starting);
        assert_eq!(m.fire(ComponentTrigger::StartOk).unwrap(), ComponentState::Idle);
        assert_eq!(m.fire(ComponentTrigger::Run).unwrap(), ComponentState::Running);
        assert_eq!(m.fire(ComponentTrigger::Wait).unwrap(), ComponentState::Waiting);
        assert_eq!(m.fire(ComponentTrigger::Run).unwrap(), ComponentState::Running);
        assert_eq!(m.fire(ComponentTrigger::Idle).unwrap(), ComponentState::Idle);
        assert_eq!(m.fire(ComponentTrigger::Run).unwrap(), ComponentState::Running);
        assert_eq!(m.fire(ComponentTrigger::Stop).unwrap(), ComponentState::Stopping);
        assert_eq!(m.fire(ComponentTrigger::Stop).unwrap(), ComponentState::Stopped);
        assert_eq!(m.fire(ComponentTrigger::Shutdown).unwrap(), ComponentState::Shutdown);
    }

    #[test]
    fn component_start_ko_path_goes_straight_to_stopped() {
        let m = ComponentStateMachine::new();
        m.fire(ComponentTrigger::Start).unwrap();
        assert_eq!(m.fire(ComponentTrigger::StartKo).unwrap(), ComponentState::Stopped);
    }

    #[test]
    fn component_invalid_trigger_is_rejected() {
        let m = ComponentStateMachine::new();
        let err = m.fire(ComponentTrigger::Run).unwrap_err();
        assert_eq!(err.state, "New");
        assert_eq!(err.trigger, "Run");
    }

    #[test]
    fn shutdown_is_terminal() {
        let m = ComponentStateMachine::new();
        m.force_set(ComponentState::Shutdown);
        assert!(m.fire(ComponentTrigger::Start).is_err());
        assert!(m.fire(ComponentTrigger::Run).is_err());
    }

    #[test]
    fn engine_happy_path() {
        let m = EngineStateMachine::new();
        assert_eq!(m.fire(EngineTrigger::Resolve).unwrap(), EngineState::Resolved);
        assert_eq!(m.fire(EngineTrigger::Run).unwrap(), EngineState::Running);
        assert_eq!(m.fire(EngineTrigger::Idle).unwrap(), EngineState::Idle);
        assert_eq!(m.fire(EngineTrigger::Run).unwrap(), EngineState::Running);
        assert_eq!(m.fire(EngineTrigger::Stop).unwrap(), EngineState::Stopping);
        assert_eq!(m.fire(EngineTrigger::Stop).unwrap(), EngineState::Stopped);
        assert_eq!(m.fire(EngineTrigger::Shutdown).unwrap(), EngineState::Shutdown);
    }

    #[test]
    fn engine_failed_bind_from_new_goes_unresolved() {
        let m = EngineStateMachine::new();
        assert_eq!(m.fire(EngineTrigger::Unresolve).unwrap(), EngineState::Unresolved);
        assert_eq!(m.fire(EngineTrigger::Resolve).unwrap(), EngineState::Resolved);
    }
}

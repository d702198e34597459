//! Names of the built-in lifecycle commands every process understands on
//! `_command_in`, broadcast by `ProcessManager`/`GraphEngine`.

pub const START: &str = "START";
pub const STOP: &str = "STOP";
pub const SHUTDOWN: &str = "SHUTDOWN";

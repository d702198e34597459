//! Error types for packet, port and connection primitives.
//!
//! Kept fine-grained and scoped to the concern each type owns, rather than
//! one crate-wide enum — failures in a connection's wiring are a different
//! kind of thing from a malformed command packet, and callers should be able
//! to match on exactly the one they care about.

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("command packet must have a non-empty command name")]
    EmptyCommand,
}

#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("array ports are reserved for future use (requested array_size={0})")]
    ArraySizeUnsupported(u32),

    #[error("connection {0} is not linked to this port")]
    ConnectionNotFound(Uuid),
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection capacity must be at least 1 (got {0})")]
    InvalidCapacity(usize),

    #[error("connection is not linked")]
    NotLinked,

    #[error("connection is already linked")]
    AlreadyLinked,

    #[error("connection cannot be unlinked from state {0:?}")]
    NotUnlinkable(&'static str),
}

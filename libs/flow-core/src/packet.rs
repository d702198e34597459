//! The unit of data that moves between processes.
//!
//! Grounded on `hbflow.core.packet`: a base `Packet` carrying only an id,
//! with `DataPacket`/`CommandPacket` adding payload or command+args. Payload
//! contents are intentionally opaque — typed packet schemas are out of
//! scope — so both carry their payload behind `Arc<dyn Any>`, which also
//! makes a packet cheap to clone when an output port fans a single send out
//! to several linked connections.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::PacketError;

/// An opaque, shareable payload. Cloning a packet clones this handle, not
/// the underlying value.
pub type Payload = Arc<dyn Any + Send + Sync>;

#[derive(Clone)]
pub enum Packet {
    Data(DataPacket),
    Command(CommandPacket),
}

impl Packet {
    pub fn id(&self) -> Uuid {
        match self {
            Packet::Data(p) => p.id,
            Packet::Command(p) => p.id,
        }
    }

    pub fn data(payload: impl Any + Send + Sync) -> Self {
        Packet::Data(DataPacket::new(payload))
    }

    pub fn empty_data() -> Self {
        Packet::Data(DataPacket {
            id: Uuid::new_v4(),
            payload: None,
        })
    }

    pub fn command(
        command: impl Into<String>,
        args: Option<Payload>,
    ) -> Result<Self, PacketError> {
        Ok(Packet::Command(CommandPacket::new(command, args)?))
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Packet::Data(p) => write!(f, "DataPacket({})", p.id),
            Packet::Command(p) => write!(f, "CommandPacket({}, {:?})", p.id, p.command),
        }
    }
}

#[derive(Clone)]
pub struct DataPacket {
    pub id: Uuid,
    pub payload: Option<Payload>,
}

impl DataPacket {
    pub fn new(payload: impl Any + Send + Sync) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload: Some(Arc::new(payload)),
        }
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.payload.as_ref()?.downcast_ref::<T>()
    }
}

#[derive(Clone)]
pub struct CommandPacket {
    pub id: Uuid,
    pub command: String,
    pub args: Option<Payload>,
}

impl CommandPacket {
    pub fn new(command: impl Into<String>, args: Option<Payload>) -> Result<Self, PacketError> {
        let command = command.into();
        if command.is_empty() {
            return Err(PacketError::EmptyCommand);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            command,
            args,
        })
    }
}

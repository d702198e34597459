//! Packet, port and connection primitives for the flow-based process
//! runtime. This crate has no notion of a component, a graph, or a
//! scheduler — it only provides the wiring those higher layers move
//! packets across.

pub mod connection;
pub mod error;
pub mod ids;
pub mod packet;
pub mod port;

pub use connection::{Connection, ConnectionState, EndpointLabels};
pub use error::{ConnectionError, PacketError, PortError};
pub use ids::Identity;
pub use packet::{CommandPacket, DataPacket, Packet, Payload};
pub use port::{InputPort, OutputPort, PortCore};

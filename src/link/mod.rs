//! Serial link to the wearable.
//!
//! This module provides the startup handshake with the microcontroller and
//! line-oriented packet parsing over the serial channel.

pub mod serial;
pub mod types;

// Re-export commonly used types
pub use serial::{open_port, LinkError, SampleSource, SerialChannel, SerialLink};
pub use types::{
    AuxReading, LinkState, PacketParseError, SensorSample, AUX_CHANNELS, MOTION_CHANNELS,
    PACKET_FIELDS,
};

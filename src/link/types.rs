//! Wire-level types for the wearable serial feed.
//!
//! A packet is one CR-terminated ASCII line of comma-separated readings:
//! nine motion channels followed by four auxiliary power channels.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of motion channels per packet (acc1[3], acc2[3], gyro[3]).
pub const MOTION_CHANNELS: usize = 9;

/// Number of auxiliary power channels per packet.
pub const AUX_CHANNELS: usize = 4;

/// Total number of fields in a well-formed packet line.
pub const PACKET_FIELDS: usize = MOTION_CHANNELS + AUX_CHANNELS;

/// Field delimiter inside a packet line.
pub const FIELD_DELIMITER: char = ',';

/// Line terminator emitted by the microcontroller.
pub const LINE_TERMINATOR: u8 = b'\r';

/// Probe byte sent by the host during the handshake.
pub const HANDSHAKE_PROBE: u8 = b'H';

/// Acknowledgment byte expected back from the microcontroller.
pub const HANDSHAKE_ACK: u8 = b'A';

/// Confirmation byte sent once the acknowledgment arrives.
pub const HANDSHAKE_CONFIRM: u8 = b'N';

/// Handshake progress of the serial link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkState {
    Disconnected,
    HandshakeSent,
    Ready,
}

/// Auxiliary power readings carried by every packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AuxReading {
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub energy: f64,
}

impl AuxReading {
    /// Arithmetic mean of a batch of readings, `None` when the batch is empty.
    pub fn mean(readings: &[AuxReading]) -> Option<AuxReading> {
        if readings.is_empty() {
            return None;
        }

        let n = readings.len() as f64;
        let sum = readings.iter().fold(AuxReading::default(), |acc, r| AuxReading {
            voltage: acc.voltage + r.voltage,
            current: acc.current + r.current,
            power: acc.power + r.power,
            energy: acc.energy + r.energy,
        });

        Some(AuxReading {
            voltage: sum.voltage / n,
            current: sum.current / n,
            power: sum.power / n,
            energy: sum.energy / n,
        })
    }
}

/// One parsed packet from the wearable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    /// Motion channels in wire order
    pub motion: [f64; MOTION_CHANNELS],
    /// Auxiliary power channels
    pub aux: AuxReading,
}

impl SensorSample {
    pub fn new(motion: [f64; MOTION_CHANNELS], aux: AuxReading) -> Self {
        Self { motion, aux }
    }

    /// Parse one packet line (terminator optional).
    ///
    /// Only the shape is checked: exactly [`PACKET_FIELDS`] fields, each a
    /// number. Values themselves are not range-checked.
    pub fn parse_line(line: &str) -> Result<Self, PacketParseError> {
        let line = line.trim_matches(|c| c == '\r' || c == '\n');
        let fields: Vec<&str> = line.split(FIELD_DELIMITER).collect();
        if fields.len() != PACKET_FIELDS {
            return Err(PacketParseError::FieldCount {
                expected: PACKET_FIELDS,
                found: fields.len(),
            });
        }

        let mut values = [0.0f64; PACKET_FIELDS];
        for (index, (slot, field)) in values.iter_mut().zip(&fields).enumerate() {
            let field = field.trim();
            *slot = field.parse().map_err(|_| PacketParseError::InvalidNumber {
                index,
                field: field.to_string(),
            })?;
        }

        let mut motion = [0.0f64; MOTION_CHANNELS];
        motion.copy_from_slice(&values[..MOTION_CHANNELS]);

        Ok(Self {
            motion,
            aux: AuxReading {
                voltage: values[MOTION_CHANNELS],
                current: values[MOTION_CHANNELS + 1],
                power: values[MOTION_CHANNELS + 2],
                energy: values[MOTION_CHANNELS + 3],
            },
        })
    }
}

/// A packet line that does not match the expected schema.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PacketParseError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("field {index} is not a number: {field:?}")]
    InvalidNumber { index: usize, field: String },
}

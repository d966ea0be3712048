//! Serial link to the wearable microcontroller.
//!
//! Owns the byte-level handshake and turns the CR-terminated ASCII feed
//! into [`SensorSample`]s. Malformed lines are dropped here and never
//! reach the caller.

use crate::link::types::{
    LinkState, PacketParseError, SensorSample, HANDSHAKE_ACK, HANDSHAKE_CONFIRM, HANDSHAKE_PROBE,
    LINE_TERMINATOR,
};
use serialport::{ClearBuffer, SerialPort};
use std::io::{self, Read, Write};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Bytes pulled from the channel per read call.
const READ_CHUNK: usize = 64;

/// Longest partial line kept while waiting for a terminator. A valid
/// packet is well under this; longer runs are noise (e.g. a baud mismatch).
const MAX_LINE_LEN: usize = 256;

/// Errors raised by the serial link.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to open serial port {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: serialport::Error,
    },

    #[error("serial I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serial channel closed")]
    Closed,
}

/// Byte channel the link runs over.
///
/// Implemented for real serial ports; tests provide in-memory channels.
pub trait SerialChannel: Read + Write {
    /// Drop any bytes pending in the input and output buffers.
    fn discard_buffers(&mut self) -> io::Result<()>;
}

impl SerialChannel for Box<dyn SerialPort> {
    fn discard_buffers(&mut self) -> io::Result<()> {
        self.clear(ClearBuffer::All).map_err(io::Error::from)
    }
}

/// Open the serial port the wearable is attached to.
pub fn open_port(
    path: &str,
    baud_rate: u32,
    timeout: Duration,
) -> Result<Box<dyn SerialPort>, LinkError> {
    serialport::new(path, baud_rate)
        .timeout(timeout)
        .open()
        .map_err(|source| LinkError::Open {
            path: path.to_string(),
            source,
        })
}

/// Anything that yields structurally valid samples, one per call.
pub trait SampleSource {
    /// Block until the next valid sample is available.
    fn read_sample(&mut self) -> Result<SensorSample, LinkError>;
}

/// Handshake state machine and packet reader over a [`SerialChannel`].
pub struct SerialLink<C> {
    channel: C,
    state: LinkState,
    /// Pause between handshake steps
    handshake_interval: Duration,
    /// Bytes read but not yet consumed as a line
    pending: Vec<u8>,
    /// Lines dropped for not matching the packet schema
    malformed_lines: u64,
}

impl<C: SerialChannel> SerialLink<C> {
    /// Wrap a channel. The link starts `Disconnected`.
    pub fn new(channel: C, handshake_interval: Duration) -> Self {
        Self {
            channel,
            state: LinkState::Disconnected,
            handshake_interval,
            pending: Vec::with_capacity(READ_CHUNK * 2),
            malformed_lines: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == LinkState::Ready
    }

    /// Number of lines dropped so far.
    pub fn malformed_lines(&self) -> u64 {
        self.malformed_lines
    }

    /// Synchronize with the microcontroller.
    ///
    /// Sends the probe byte until the acknowledgment comes back, then sends
    /// the confirmation byte. There is no retry limit. Timeouts while waiting
    /// for the response count as "no acknowledgment"; any other I/O failure
    /// is returned.
    pub fn handshake(&mut self) -> Result<(), LinkError> {
        self.reset_buffers()?;

        let mut attempts: u64 = 0;
        loop {
            attempts += 1;
            self.channel.write_all(&[HANDSHAKE_PROBE])?;
            self.channel.flush()?;
            self.state = LinkState::HandshakeSent;
            debug!(attempt = attempts, "handshake request sent");

            let response = self.read_byte()?;
            std::thread::sleep(self.handshake_interval);

            if response == Some(HANDSHAKE_ACK) {
                self.channel.write_all(&[HANDSHAKE_CONFIRM])?;
                self.channel.flush()?;
                std::thread::sleep(self.handshake_interval);
                break;
            }

            debug!(?response, "no acknowledgment, retrying handshake");
            std::thread::sleep(self.handshake_interval);
        }

        self.reset_buffers()?;
        self.state = LinkState::Ready;
        info!(attempts, "serial handshake complete");
        Ok(())
    }

    /// Read one byte, `None` on timeout.
    fn read_byte(&mut self) -> Result<Option<u8>, LinkError> {
        let mut byte = [0u8; 1];
        match self.channel.read(&mut byte) {
            Ok(0) => Err(LinkError::Closed),
            Ok(_) => Ok(Some(byte[0])),
            Err(e) if is_timeout(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn reset_buffers(&mut self) -> Result<(), LinkError> {
        self.pending.clear();
        self.channel.discard_buffers()?;
        Ok(())
    }

    /// Read one raw CR-terminated line, without the terminator.
    ///
    /// A timeout in the middle of a line discards the partial bytes and
    /// reading continues, so this blocks until a full line arrives. A
    /// partial line longer than [`MAX_LINE_LEN`] is dropped as malformed.
    fn read_line(&mut self) -> Result<String, LinkError> {
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == LINE_TERMINATOR) {
                let line: Vec<u8> = self.pending.drain(..=pos).collect();
                return Ok(String::from_utf8_lossy(&line[..pos]).into_owned());
            }
            if self.pending.len() > MAX_LINE_LEN {
                debug!(bytes = self.pending.len(), "no line terminator, dropping oversized line");
                self.pending.clear();
                self.malformed_lines += 1;
            }

            let mut chunk = [0u8; READ_CHUNK];
            match self.channel.read(&mut chunk) {
                Ok(0) => return Err(LinkError::Closed),
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e) if is_timeout(&e) => {
                    if !self.pending.is_empty() {
                        debug!(bytes = self.pending.len(), "read timed out mid-line, dropping partial line");
                        self.pending.clear();
                        self.malformed_lines += 1;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Consume the link and hand back the channel.
    pub fn into_inner(self) -> C {
        self.channel
    }
}

impl<C: SerialChannel> SampleSource for SerialLink<C> {
    fn read_sample(&mut self) -> Result<SensorSample, LinkError> {
        loop {
            let line = self.read_line()?;
            match SensorSample::parse_line(&line) {
                Ok(sample) => return Ok(sample),
                Err(e) => {
                    self.malformed_lines += 1;
                    log_malformed(&line, &e);
                }
            }
        }
    }
}

fn log_malformed(line: &str, error: &PacketParseError) {
    debug!(line = line.trim(), %error, "dropping malformed packet");
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

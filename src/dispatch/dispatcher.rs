//! Secure dispatch of confirmed moves to the remote collector.

use crate::classifier::MoveLabel;
use crate::dispatch::codec::{self, CodecError};
use crate::link::AuxReading;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use thiserror::Error;
use tracing::info;

/// Failure to reach the collector at startup.
#[derive(Debug, Error)]
#[error("failed to connect to collector at {addr}: {source}")]
pub struct ConnectionError {
    pub addr: String,
    #[source]
    pub source: io::Error,
}

/// Open the single outbound connection used for the process lifetime.
pub fn connect(host: &str, port: u16) -> Result<TcpStream, ConnectionError> {
    let addr = format!("{host}:{port}");
    let stream = (host, port)
        .to_socket_addrs()
        .and_then(|mut addrs| {
            addrs
                .next()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address resolved"))
        })
        .and_then(TcpStream::connect)
        .map_err(|source| ConnectionError {
            addr: addr.clone(),
            source,
        })?;
    info!(%addr, "connected to collector");
    Ok(stream)
}

/// A dispatch that could not be completed. Nothing was counted.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to encrypt event: {0}")]
    Encrypt(#[from] CodecError),

    #[error("failed to send event: {0}")]
    Send(#[from] io::Error),
}

/// Dispatch bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchCounters {
    /// Events successfully written to the collector
    pub sent: u64,
    /// Time of the last successful send
    pub last_dispatch_ms: Option<u64>,
    pub process_start_ms: u64,
}

impl DispatchCounters {
    /// Milliseconds between process start and `now_ms`.
    pub fn uptime_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.process_start_ms)
    }
}

/// Result of a dispatch attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The event was written; `sequence` is the new sent count.
    Sent { plaintext: String, sequence: u64 },
    /// A logout arrived before enough moves were sent and was dropped.
    Suppressed { sent: u64, required: u64 },
}

/// Frames, encrypts and writes confirmed moves to a byte sink.
pub struct SecureDispatcher<W> {
    sink: W,
    key: Vec<u8>,
    block_size: usize,
    /// Moves that must be sent before a logout is accepted
    logout_min_sent: u64,
    counters: DispatchCounters,
}

impl<W: Write> SecureDispatcher<W> {
    pub fn new(
        sink: W,
        key: impl Into<Vec<u8>>,
        block_size: usize,
        logout_min_sent: u64,
        process_start_ms: u64,
    ) -> Self {
        Self {
            sink,
            key: key.into(),
            block_size,
            logout_min_sent,
            counters: DispatchCounters {
                process_start_ms,
                ..DispatchCounters::default()
            },
        }
    }

    pub fn counters(&self) -> DispatchCounters {
        self.counters
    }

    /// Whether a logout would be accepted right now.
    pub fn logout_allowed(&self) -> bool {
        self.counters.sent >= self.logout_min_sent
    }

    /// Send one confirmed move with the given power readings.
    ///
    /// A premature logout is reported as [`DispatchOutcome::Suppressed`]
    /// without touching the sink. On error nothing is counted.
    ///
    /// Messages go out back-to-back with no delimiter. If the write fails
    /// after part of a message reached the sink, that fragment stays on the
    /// stream and the retried message follows it, so the collector can no
    /// longer split the stream reliably. The caller should treat repeated
    /// [`DispatchError::Send`] failures as a lost connection.
    pub fn dispatch(
        &mut self,
        label: MoveLabel,
        aux: &AuxReading,
        now_ms: u64,
    ) -> Result<DispatchOutcome, DispatchError> {
        if label.is_logout() && !self.logout_allowed() {
            return Ok(DispatchOutcome::Suppressed {
                sent: self.counters.sent,
                required: self.logout_min_sent,
            });
        }

        let plaintext = codec::format_event(label, aux);
        let message = codec::seal(&plaintext, &self.key, self.block_size)?;
        self.sink.write_all(message.as_bytes())?;
        self.sink.flush()?;

        self.counters.sent += 1;
        self.counters.last_dispatch_ms = Some(now_ms);
        Ok(DispatchOutcome::Sent {
            plaintext,
            sequence: self.counters.sent,
        })
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn into_sink(self) -> W {
        self.sink
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"1234123412341234";

    fn aux() -> AuxReading {
        AuxReading {
            voltage: 5.0,
            current: 0.25,
            power: 1.25,
            energy: 3.5,
        }
    }

    /// Sink that fails every write.
    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_writes_encrypted_event() {
        let mut dispatcher = SecureDispatcher::new(Vec::new(), KEY, 32, 0, 0);

        let outcome = dispatcher.dispatch(MoveLabel::Wipers, &aux(), 1234).unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Sent {
                plaintext: "#wipers|5.00|0.25|1.25|3.50|".to_string(),
                sequence: 1
            }
        );

        let counters = dispatcher.counters();
        assert_eq!(counters.sent, 1);
        assert_eq!(counters.last_dispatch_ms, Some(1234));
        assert_eq!(counters.uptime_ms(1234), 1234);

        let message = String::from_utf8(dispatcher.into_sink()).unwrap();
        assert_eq!(
            codec::open(&message, KEY, 32).unwrap(),
            "#wipers|5.00|0.25|1.25|3.50|"
        );
    }

    #[test]
    fn test_logout_suppressed_until_threshold() {
        let mut dispatcher = SecureDispatcher::new(Vec::new(), KEY, 32, 2, 0);

        let outcome = dispatcher.dispatch(MoveLabel::Logout, &aux(), 10).unwrap();
        assert_eq!(outcome, DispatchOutcome::Suppressed { sent: 0, required: 2 });
        assert!(dispatcher.sink().is_empty());

        dispatcher.dispatch(MoveLabel::Salute, &aux(), 20).unwrap();
        assert!(!dispatcher.logout_allowed());
        dispatcher.dispatch(MoveLabel::Swing, &aux(), 30).unwrap();
        assert!(dispatcher.logout_allowed());

        let outcome = dispatcher.dispatch(MoveLabel::Logout, &aux(), 40).unwrap();
        assert!(matches!(outcome, DispatchOutcome::Sent { sequence: 3, .. }));
    }

    #[test]
    fn test_send_failure_counts_nothing() {
        let mut dispatcher = SecureDispatcher::new(BrokenPipe, KEY, 32, 0, 0);
        let err = dispatcher.dispatch(MoveLabel::Cowboy, &aux(), 5).unwrap_err();
        assert!(matches!(err, DispatchError::Send(_)));
        assert_eq!(dispatcher.counters().sent, 0);
        assert_eq!(dispatcher.counters().last_dispatch_ms, None);
    }

    #[test]
    fn test_bad_key_is_a_dispatch_error() {
        let mut dispatcher = SecureDispatcher::new(Vec::new(), b"short".to_vec(), 32, 0, 0);
        let err = dispatcher.dispatch(MoveLabel::Cowboy, &aux(), 5).unwrap_err();
        assert!(matches!(err, DispatchError::Encrypt(CodecError::KeyLength(5))));
        assert!(dispatcher.sink().is_empty());
    }

    #[test]
    fn test_uptime_counts_from_process_start() {
        let dispatcher = SecureDispatcher::new(Vec::new(), KEY, 32, 0, 500);
        let counters = dispatcher.counters();
        assert_eq!(counters.uptime_ms(1500), 1000);
        assert_eq!(counters.uptime_ms(100), 0);
    }

    #[test]
    fn test_connect_failure() {
        // Port 0 is never connectable.
        let err = connect("127.0.0.1", 0).unwrap_err();
        assert_eq!(err.addr, "127.0.0.1:0");
    }
}

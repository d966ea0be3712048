//! Outbound event path: framing, padding, encryption and transport.

pub mod codec;
pub mod dispatcher;

// Re-export commonly used types
pub use codec::{format_event, open, pad, seal, unpad, CodecError};
pub use dispatcher::{
    connect, ConnectionError, DispatchCounters, DispatchError, DispatchOutcome, SecureDispatcher,
};

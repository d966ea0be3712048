//! Core detection pipeline.
//!
//! This module contains:
//! - Window assembly with overlap carry
//! - Feature extraction from windows
//! - Consensus gating of predictions
//! - Wall-clock pacing

pub mod consensus;
pub mod features;
pub mod pacer;
pub mod windowing;

// Re-export commonly used types
pub use consensus::ConsensusGate;
pub use features::{extract_features, FEATURE_LEN};
pub use pacer::{Clock, ManualClock, Pacer, SystemClock};
pub use windowing::{extract_size, Window, WindowAssembler};

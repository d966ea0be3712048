//! Wearable Move Detector - real-time dance move recognition on the edge.
//!
//! This library reads motion and power samples from a wearable over a
//! serial link, classifies fixed-length windows of them into dance moves,
//! debounces the predictions and sends each confirmed move, encrypted, to
//! a remote collector over TCP.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Wearable Move Detector                      │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐             │
//! │  │ Serial Link │──▶│  Windowing  │──▶│ Classifier  │             │
//! │  │ (handshake) │   │  (overlap)  │   │ (centroid)  │             │
//! │  └─────────────┘   └─────────────┘   └─────────────┘             │
//! │                           │                 │                    │
//! │                           ▼                 ▼                    │
//! │                    ┌─────────────┐   ┌─────────────┐             │
//! │                    │    Pacer    │   │  Consensus  │             │
//! │                    │  (warm-up)  │   │    Gate     │             │
//! │                    └─────────────┘   └─────────────┘             │
//! │                                             │                    │
//! │                                             ▼                    │
//! │                                      ┌─────────────┐             │
//! │                                      │  Dispatch   │──▶ TCP      │
//! │                                      │  (AES-CBC)  │             │
//! │                                      └─────────────┘             │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::atomic::AtomicBool;
//! use wearable_move_detector::{
//!     classifier::CentroidClassifier, config::Config, core::SystemClock, dispatch, link,
//!     Detector,
//! };
//!
//! let config = Config::default();
//! let port = link::open_port(&config.serial.path, config.serial.baud_rate, config.serial.timeout)
//!     .expect("Failed to open serial port");
//! let link = link::SerialLink::new(port, config.serial.handshake_interval);
//! let classifier = CentroidClassifier::load(Path::new("model.json")).expect("Failed to load model");
//! let socket = dispatch::connect("127.0.0.1", 9000).expect("Failed to connect");
//!
//! let mut detector = Detector::new(&config, link, classifier, socket, SystemClock::new());
//! detector.run(&AtomicBool::new(true)).expect("Serial link failed");
//! ```

pub mod classifier;
pub mod config;
pub mod core;
pub mod detector;
pub mod dispatch;
pub mod link;
pub mod stats;

// Re-export key types at crate root for convenience
pub use classifier::{CentroidClassifier, ClassificationError, Classifier, MoveLabel, Prediction};
pub use config::{Config, ConfigError};
pub use crate::core::{ConsensusGate, Pacer, Window, WindowAssembler};
pub use detector::{Detector, StepOutcome};
pub use dispatch::{DispatchError, SecureDispatcher};
pub use link::{LinkError, SensorSample, SerialLink};
pub use stats::SessionStats;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

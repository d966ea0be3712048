//! Consensus gate (debounce) over classifier output.
//!
//! Only confident predictions are recorded. A move is confirmed when the
//! last `consensus_size` recorded labels are identical. Anything older than
//! that tail does not matter, and the record is only cleared once a
//! confirmed move has been dispatched.

use crate::classifier::{MoveLabel, Prediction};

/// Debounces predictions into confirmed moves.
#[derive(Debug, Clone)]
pub struct ConsensusGate {
    /// Predictions at or below this confidence are ignored
    threshold: f64,
    /// Number of trailing identical labels required (K)
    consensus_size: usize,
    /// Confident labels since the last dispatch
    buffer: Vec<MoveLabel>,
}

impl ConsensusGate {
    pub fn new(threshold: f64, consensus_size: usize) -> Self {
        assert!(consensus_size >= 1, "consensus size must be at least 1");
        Self {
            threshold,
            consensus_size,
            buffer: Vec::new(),
        }
    }

    /// Whether a prediction is confident enough to be recorded.
    pub fn accepts(&self, prediction: &Prediction) -> bool {
        prediction.confidence > self.threshold
    }

    /// Record a prediction and report the confirmed move, if any.
    ///
    /// A sub-threshold prediction leaves the record untouched, so it neither
    /// confirms nor interrupts a run. The tail is evaluated on every call:
    /// a confirmation that was not followed by [`clear`](Self::clear) (for
    /// example a failed or suppressed dispatch) is reported again.
    pub fn observe(&mut self, prediction: &Prediction) -> Option<MoveLabel> {
        if self.accepts(prediction) {
            self.buffer.push(prediction.label);
        }
        self.confirmed()
    }

    /// The move confirmed by the current record, if any.
    pub fn confirmed(&self) -> Option<MoveLabel> {
        let k = self.consensus_size;
        if self.buffer.len() < k {
            return None;
        }

        let tail = &self.buffer[self.buffer.len() - k..];
        let first = tail[0];
        tail.iter().all(|&label| label == first).then_some(first)
    }

    /// Forget all recorded labels. Called after a successful dispatch.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn recorded(&self) -> &[MoveLabel] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

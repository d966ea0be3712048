//! Session statistics.
//!
//! Counters describing what the detector did during this run. They are
//! kept in memory only and reported when the session ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Counters for the current detector session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Random identifier for this run, used in log lines
    pub session_id: Uuid,
    /// Valid samples read from the link
    pub samples_read: u64,
    /// Lines dropped by the link for not matching the packet schema
    pub malformed_lines: u64,
    /// Full windows produced by the assembler
    pub windows_assembled: u64,
    /// Windows skipped while the warm-up period was running
    pub warmup_skips: u64,
    /// Windows skipped because the evaluation interval had not elapsed
    pub pacing_skips: u64,
    /// Windows the classifier produced a prediction for
    pub predictions: u64,
    /// Predictions above the confidence threshold
    pub confident_predictions: u64,
    pub classification_failures: u64,
    pub dispatches_sent: u64,
    pub logout_suppressions: u64,
    pub dispatch_failures: u64,
    pub session_start: DateTime<Utc>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            samples_read: 0,
            malformed_lines: 0,
            windows_assembled: 0,
            warmup_skips: 0,
            pacing_skips: 0,
            predictions: 0,
            confident_predictions: 0,
            classification_failures: 0,
            dispatches_sent: 0,
            logout_suppressions: 0,
            dispatch_failures: 0,
            session_start: Utc::now(),
        }
    }

    /// Record a freshly assembled window and the samples read for it.
    pub fn record_window(&mut self, fresh_samples: usize) {
        self.windows_assembled += 1;
        self.samples_read += fresh_samples as u64;
    }

    /// Record samples read while the assembler was still bootstrapping.
    pub fn record_samples(&mut self, count: usize) {
        self.samples_read += count as u64;
    }

    pub fn record_prediction(&mut self, confident: bool) {
        self.predictions += 1;
        if confident {
            self.confident_predictions += 1;
        }
    }

    /// Seconds since the session started.
    pub fn session_duration_secs(&self) -> u64 {
        (Utc::now() - self.session_start).num_seconds().max(0) as u64
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        format!(
            "Session Statistics ({}):\n\
             - Samples read: {}\n\
             - Malformed lines dropped: {}\n\
             - Windows assembled: {}\n\
             - Skipped during warm-up: {}\n\
             - Skipped by pacing: {}\n\
             - Predictions: {} ({} confident)\n\
             - Classification failures: {}\n\
             - Moves dispatched: {}\n\
             - Logouts suppressed: {}\n\
             - Dispatch failures: {}\n\
             - Session duration: {} seconds",
            self.session_id,
            self.samples_read,
            self.malformed_lines,
            self.windows_assembled,
            self.warmup_skips,
            self.pacing_skips,
            self.predictions,
            self.confident_predictions,
            self.classification_failures,
            self.dispatches_sent,
            self.logout_suppressions,
            self.dispatch_failures,
            self.session_duration_secs()
        )
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_counting() {
        let mut stats = SessionStats::new();

        stats.record_samples(128);
        stats.record_window(32);
        stats.record_prediction(true);
        stats.record_prediction(false);

        assert_eq!(stats.samples_read, 160);
        assert_eq!(stats.windows_assembled, 1);
        assert_eq!(stats.predictions, 2);
        assert_eq!(stats.confident_predictions, 1);
    }

    #[test]
    fn test_summary_format() {
        let mut stats = SessionStats::new();
        stats.dispatches_sent = 7;
        let summary = stats.summary();

        assert!(summary.contains("Moves dispatched: 7"));
        assert!(summary.contains("Logouts suppressed"));
        assert!(summary.contains(&stats.session_id.to_string()));
    }

    #[test]
    fn test_sessions_get_distinct_ids() {
        assert_ne!(SessionStats::new().session_id, SessionStats::new().session_id);
    }
}

//! The detection loop.
//!
//! [`Detector`] owns every piece of pipeline state (link, window
//! assembler, classifier, consensus gate, pacer, dispatcher and session
//! statistics) and advances it one window per [`step`](Detector::step).
//! Recoverable failures are logged and absorbed inside a step; only a
//! broken serial link ends the loop.

use crate::classifier::{Classifier, MoveLabel, Prediction};
use crate::config::Config;
use crate::core::{Clock, ConsensusGate, Pacer, WindowAssembler};
use crate::dispatch::{DispatchOutcome, SecureDispatcher};
use crate::link::{LinkError, SerialChannel, SerialLink};
use crate::stats::SessionStats;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// What a single detection cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Samples were read but no full window exists yet.
    Bootstrapping,
    /// A window was assembled during the warm-up period and not classified.
    WarmingUp,
    /// A window was assembled before the evaluation interval elapsed.
    Paced,
    /// The classifier rejected the window.
    ClassificationFailed,
    /// The window was classified but no move is confirmed.
    Pending { prediction: Prediction },
    /// A confirmed move was sent to the collector.
    Dispatched { label: MoveLabel, sequence: u64 },
    /// A confirmed logout was dropped because too few moves were sent.
    LogoutSuppressed,
    /// A confirmed move could not be sent and will be retried.
    DispatchFailed { label: MoveLabel },
}

/// Pipeline context for one detector process.
pub struct Detector<C, M, W, K> {
    link: SerialLink<C>,
    assembler: WindowAssembler,
    classifier: M,
    gate: ConsensusGate,
    pacer: Pacer,
    dispatcher: SecureDispatcher<W>,
    clock: K,
    stats: SessionStats,
}

impl<C, M, W, K> Detector<C, M, W, K>
where
    C: SerialChannel,
    M: Classifier,
    W: Write,
    K: Clock,
{
    /// Assemble a detector. The clock's current reading is taken as
    /// process start for warm-up and pacing.
    ///
    /// `config` is expected to have passed [`Config::validate`].
    pub fn new(config: &Config, link: SerialLink<C>, classifier: M, sink: W, clock: K) -> Self {
        let start_ms = clock.now_ms();
        Self {
            link,
            assembler: WindowAssembler::new(config.window_size, config.extract_size()),
            classifier,
            gate: ConsensusGate::new(config.confidence_threshold, config.consensus_size),
            pacer: Pacer::new(
                config.warmup.as_millis() as u64,
                config.eval_interval().as_millis() as u64,
                start_ms,
            ),
            dispatcher: SecureDispatcher::new(
                sink,
                config.secret_key.as_bytes(),
                config.block_size,
                config.logout_min_sent,
                start_ms,
            ),
            clock,
            stats: SessionStats::new(),
        }
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn link(&self) -> &SerialLink<C> {
        &self.link
    }

    pub fn gate(&self) -> &ConsensusGate {
        &self.gate
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    pub fn assembler(&self) -> &WindowAssembler {
        &self.assembler
    }

    pub fn dispatcher(&self) -> &SecureDispatcher<W> {
        &self.dispatcher
    }

    /// Run one detection cycle.
    ///
    /// Performs the handshake first if the link is not ready. Returns an
    /// error only when the serial link fails.
    pub fn step(&mut self) -> Result<StepOutcome, LinkError> {
        if !self.link.is_ready() {
            self.link.handshake()?;
        }

        let needed = self.assembler.samples_needed();
        let assembled = self.assembler.next_window(&mut self.link);
        self.stats.malformed_lines = self.link.malformed_lines();
        let Some(window) = assembled? else {
            self.stats.record_samples(needed);
            return Ok(StepOutcome::Bootstrapping);
        };
        self.stats.record_window(needed);

        let now = self.clock.now_ms();
        if !self.pacer.warmup_elapsed(now) {
            self.stats.warmup_skips += 1;
            debug!(
                elapsed_ms = now.saturating_sub(self.pacer.process_start_ms()),
                "warming up, window skipped"
            );
            return Ok(StepOutcome::WarmingUp);
        }
        if !self.pacer.eval_ready(now) {
            self.stats.pacing_skips += 1;
            debug!(
                since_last_ms = now.saturating_sub(self.pacer.last_eval_ms()),
                "evaluation paced, window skipped"
            );
            return Ok(StepOutcome::Paced);
        }

        let prediction = match self.classifier.classify(&window) {
            Ok(prediction) => prediction,
            Err(e) => {
                self.stats.classification_failures += 1;
                warn!(error = %e, "classification failed, window dropped");
                return Ok(StepOutcome::ClassificationFailed);
            }
        };
        self.stats.record_prediction(self.gate.accepts(&prediction));
        debug!(
            label = %prediction.label,
            confidence = prediction.confidence,
            "window classified"
        );

        let Some(label) = self.gate.observe(&prediction) else {
            return Ok(StepOutcome::Pending { prediction });
        };

        let aux = window.fresh_aux_mean().unwrap_or_default();
        match self.dispatcher.dispatch(label, &aux, now) {
            Ok(DispatchOutcome::Sent { plaintext, sequence }) => {
                self.stats.dispatches_sent += 1;
                self.gate.clear();
                self.pacer.mark_evaluated(now);
                self.assembler.reset_carry();
                info!(
                    %label,
                    sequence,
                    uptime_ms = self.dispatcher.counters().uptime_ms(now),
                    event = %plaintext,
                    "move dispatched"
                );
                Ok(StepOutcome::Dispatched { label, sequence })
            }
            Ok(DispatchOutcome::Suppressed { sent, required }) => {
                self.stats.logout_suppressions += 1;
                debug!(sent, required, "logout suppressed, too few moves sent");
                Ok(StepOutcome::LogoutSuppressed)
            }
            Err(e) => {
                self.stats.dispatch_failures += 1;
                warn!(%label, error = %e, "dispatch failed, will retry");
                Ok(StepOutcome::DispatchFailed { label })
            }
        }
    }

    /// Step until `running` is cleared or the serial link fails.
    pub fn run(&mut self, running: &AtomicBool) -> Result<(), LinkError> {
        info!(session = %self.stats.session_id, "detector started");
        while running.load(Ordering::SeqCst) {
            self.step()?;
        }
        info!(dispatched = self.stats.dispatches_sent, "detector stopped");
        Ok(())
    }

    /// Consume the detector and hand back its statistics and sink.
    pub fn finish(self) -> (SessionStats, W) {
        (self.stats, self.dispatcher.into_sink())
    }
}

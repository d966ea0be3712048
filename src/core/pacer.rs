//! Wall-clock pacing of evaluations.
//!
//! Two gates: a warm-up period after start during which samples are read
//! but never classified, and a minimum spacing between dispatch-eligible
//! evaluations. Both are pure predicates over explicit timestamps.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Monotonic millisecond clock.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Clock backed by [`Instant`], counting from its creation.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Manually advanced clock for replays and tests. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.set(now_ms);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.set(self.now.get() + delta_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// Warm-up and inter-evaluation spacing.
#[derive(Debug, Clone)]
pub struct Pacer {
    warmup_ms: u64,
    eval_interval_ms: u64,
    process_start_ms: u64,
    /// Time of the last successful dispatch, or process start
    last_eval_ms: u64,
}

impl Pacer {
    pub fn new(warmup_ms: u64, eval_interval_ms: u64, process_start_ms: u64) -> Self {
        Self {
            warmup_ms,
            eval_interval_ms,
            process_start_ms,
            last_eval_ms: process_start_ms,
        }
    }

    /// True once `warmup_ms` have passed since process start.
    pub fn warmup_elapsed(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.process_start_ms) >= self.warmup_ms
    }

    /// True once `eval_interval_ms` have passed since the last evaluation mark.
    pub fn eval_ready(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_eval_ms) >= self.eval_interval_ms
    }

    /// Record a dispatch; the next evaluation waits a full interval.
    pub fn mark_evaluated(&mut self, now_ms: u64) {
        self.last_eval_ms = now_ms;
    }

    pub fn last_eval_ms(&self) -> u64 {
        self.last_eval_ms
    }

    pub fn process_start_ms(&self) -> u64 {
        self.process_start_ms
    }
}

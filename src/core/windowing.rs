//! Window assembly with overlap carry.
//!
//! Samples are collected into fixed-length windows for classification.
//! Consecutive windows overlap: the trailing `N - extract_size` samples of
//! one window become the leading samples of the next, so after the first
//! window only `extract_size` fresh samples are read per cycle.

use crate::link::{AuxReading, LinkError, SampleSource, SensorSample};
use serde::{Deserialize, Serialize};

/// Number of fresh samples read per window once overlap is active.
///
/// Truncates toward zero, so `extract_size(128, 0.75) == 32`.
pub fn extract_size(window_size: usize, overlap: f64) -> usize {
    ((1.0 - overlap) * window_size as f64) as usize
}

/// A fixed-length batch of samples submitted to classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    samples: Vec<SensorSample>,
    /// Leading samples reused from the previous window
    carry_len: usize,
}

impl Window {
    pub fn new(samples: Vec<SensorSample>, carry_len: usize) -> Self {
        debug_assert!(carry_len <= samples.len());
        Self { samples, carry_len }
    }

    pub fn samples(&self) -> &[SensorSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn carry_len(&self) -> usize {
        self.carry_len
    }

    /// Samples read from the link for this window (everything after the carry).
    pub fn fresh_samples(&self) -> &[SensorSample] {
        &self.samples[self.carry_len..]
    }

    /// Mean auxiliary readings over the fresh samples only.
    pub fn fresh_aux_mean(&self) -> Option<AuxReading> {
        let readings: Vec<AuxReading> = self.fresh_samples().iter().map(|s| s.aux).collect();
        AuxReading::mean(&readings)
    }
}

/// Builds successive windows from a [`SampleSource`].
pub struct WindowAssembler {
    /// Samples per window (N)
    window_size: usize,
    /// Fresh samples per window once overlap is active
    extract_size: usize,
    /// Tail of the previous window, reused as the next prefix
    carry: Vec<SensorSample>,
}

impl WindowAssembler {
    /// Create an assembler. `extract_size` must be in `1..=window_size`.
    pub fn new(window_size: usize, extract_size: usize) -> Self {
        assert!(
            extract_size >= 1 && extract_size <= window_size,
            "extract size {extract_size} out of range for window size {window_size}"
        );
        Self {
            window_size,
            extract_size,
            carry: Vec::with_capacity(window_size),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn extract_size(&self) -> usize {
        self.extract_size
    }

    /// Number of samples currently carried into the next window.
    pub fn carry_len(&self) -> usize {
        self.carry.len()
    }

    /// Whether overlap between windows is enabled at all.
    pub fn overlap_enabled(&self) -> bool {
        self.extract_size < self.window_size
    }

    /// How many samples the next call to [`next_window`](Self::next_window) reads.
    pub fn samples_needed(&self) -> usize {
        if self.carry.is_empty() {
            self.window_size
        } else {
            self.extract_size
        }
    }

    /// Read samples and produce the next window.
    ///
    /// Blocks until the required number of valid samples has been read.
    /// Returns `Ok(None)` while the assembled batch is still shorter than
    /// the window size.
    pub fn next_window<S: SampleSource + ?Sized>(
        &mut self,
        source: &mut S,
    ) -> Result<Option<Window>, LinkError> {
        let to_read = self.samples_needed();
        let mut fresh = Vec::with_capacity(to_read);
        for _ in 0..to_read {
            fresh.push(source.read_sample()?);
        }

        let carried = self.overlap_enabled()
            && self.carry.len() == self.window_size - self.extract_size;

        let window = if carried {
            let mut samples = std::mem::take(&mut self.carry);
            let carry_len = samples.len();
            samples.extend(fresh);
            Window::new(samples, carry_len)
        } else {
            Window::new(fresh, 0)
        };

        if window.len() < self.window_size {
            return Ok(None);
        }

        self.carry = if self.overlap_enabled() {
            window.samples()[self.extract_size..].to_vec()
        } else {
            Vec::new()
        };

        Ok(Some(window))
    }

    /// Drop the carried samples; the next window is built from scratch.
    pub fn reset_carry(&mut self) {
        self.carry.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MOTION_CHANNELS;

    /// Yields samples numbered 0, 1, 2, ... in the first motion channel.
    struct CountingSource {
        next: u64,
    }

    impl CountingSource {
        fn new() -> Self {
            Self { next: 0 }
        }
    }

    impl SampleSource for CountingSource {
        fn read_sample(&mut self) -> Result<SensorSample, LinkError> {
            let mut motion = [0.0; MOTION_CHANNELS];
            motion[0] = self.next as f64;
            let aux = AuxReading {
                voltage: self.next as f64,
                ..AuxReading::default()
            };
            self.next += 1;
            Ok(SensorSample::new(motion, aux))
        }
    }

    fn ids(window: &Window) -> Vec<u64> {
        window.samples().iter().map(|s| s.motion[0] as u64).collect()
    }

    #[test]
    fn test_extract_size() {
        assert_eq!(extract_size(128, 0.75), 32);
        assert_eq!(extract_size(128, 0.5), 64);
        assert_eq!(extract_size(64, 0.25), 48);
        assert_eq!(extract_size(64, 0.0), 64);
    }

    #[test]
    fn test_first_window_reads_full_size() {
        let mut assembler = WindowAssembler::new(8, 2);
        let mut source = CountingSource::new();

        assert_eq!(assembler.samples_needed(), 8);
        let window = assembler.next_window(&mut source).unwrap().unwrap();

        assert_eq!(ids(&window), (0..8).collect::<Vec<_>>());
        assert_eq!(window.carry_len(), 0);
        assert_eq!(assembler.carry_len(), 6);
        assert_eq!(assembler.samples_needed(), 2);
    }

    #[test]
    fn test_carried_prefix_matches_previous_tail() {
        for &(n, overlap) in &[(8usize, 0.75f64), (8, 0.5), (8, 0.25), (12, 0.5), (10, 0.5)] {
            let extract = extract_size(n, overlap);
            let mut assembler = WindowAssembler::new(n, extract);
            let mut source = CountingSource::new();

            let mut previous = assembler.next_window(&mut source).unwrap().unwrap();
            for _ in 0..5 {
                let window = assembler.next_window(&mut source).unwrap().unwrap();
                assert_eq!(window.len(), n);
                assert_eq!(window.carry_len(), n - extract);
                assert_eq!(
                    &window.samples()[..n - extract],
                    &previous.samples()[extract..],
                    "n={n} overlap={overlap}"
                );
                assert_eq!(window.fresh_samples().len(), extract);
                previous = window;
            }
        }
    }

    #[test]
    fn test_overlap_disabled_reads_fresh_windows() {
        let mut assembler = WindowAssembler::new(4, 4);
        let mut source = CountingSource::new();

        let first = assembler.next_window(&mut source).unwrap().unwrap();
        let second = assembler.next_window(&mut source).unwrap().unwrap();

        assert!(!assembler.overlap_enabled());
        assert_eq!(ids(&first), vec![0, 1, 2, 3]);
        assert_eq!(ids(&second), vec![4, 5, 6, 7]);
        assert_eq!(second.carry_len(), 0);
        assert_eq!(assembler.carry_len(), 0);
    }

    #[test]
    fn test_reset_carry_restarts_from_scratch() {
        let mut assembler = WindowAssembler::new(4, 1);
        let mut source = CountingSource::new();

        assembler.next_window(&mut source).unwrap();
        assembler.reset_carry();
        assert_eq!(assembler.samples_needed(), 4);

        let window = assembler.next_window(&mut source).unwrap().unwrap();
        assert_eq!(ids(&window), vec![4, 5, 6, 7]);
        assert_eq!(window.carry_len(), 0);
    }

    #[test]
    fn test_fresh_aux_mean_ignores_carry() {
        let mut assembler = WindowAssembler::new(4, 2);
        let mut source = CountingSource::new();

        assembler.next_window(&mut source).unwrap();
        let window = assembler.next_window(&mut source).unwrap().unwrap();

        // Window holds samples 2..6, fresh ones are 4 and 5.
        assert_eq!(ids(&window), vec![2, 3, 4, 5]);
        assert_eq!(window.fresh_aux_mean().unwrap().voltage, 4.5);
    }
}

//! Feature extraction from sample windows.
//!
//! Time-domain statistics are computed per motion channel. Auxiliary power
//! channels never feed the classifier.

use crate::core::windowing::Window;
use crate::link::MOTION_CHANNELS;
use statrs::statistics::Statistics;

/// Statistics computed per motion channel, in feature-vector order.
pub const STATISTICS: [&str; 6] = ["mean", "variance", "max", "min", "offset", "mad"];

/// Length of the feature vector produced by [`extract_features`].
pub const FEATURE_LEN: usize = MOTION_CHANNELS * STATISTICS.len();

/// Normalizes the median absolute deviation to a standard-deviation estimate
/// for normally distributed data.
const MAD_NORMALIZER: f64 = 0.674_489_750_196_081_7;

/// Per-channel statistics of one window.
#[derive(Debug, Clone, Default)]
struct ChannelStats {
    mean: f64,
    variance: f64,
    max: f64,
    min: f64,
    mad: f64,
}

/// Compute the feature vector for a window.
///
/// The layout groups by statistic: all channel means first, then all
/// variances, maxima, minima, offsets (max - min) and MADs.
pub fn extract_features(window: &Window) -> Vec<f64> {
    let stats: Vec<ChannelStats> = (0..MOTION_CHANNELS)
        .map(|channel| {
            let column: Vec<f64> = window.samples().iter().map(|s| s.motion[channel]).collect();
            channel_stats(&column)
        })
        .collect();

    let mut features = Vec::with_capacity(FEATURE_LEN);
    features.extend(stats.iter().map(|s| s.mean));
    features.extend(stats.iter().map(|s| s.variance));
    features.extend(stats.iter().map(|s| s.max));
    features.extend(stats.iter().map(|s| s.min));
    features.extend(stats.iter().map(|s| s.max - s.min));
    features.extend(stats.iter().map(|s| s.mad));
    features
}

fn channel_stats(values: &[f64]) -> ChannelStats {
    if values.is_empty() {
        return ChannelStats::default();
    }

    let variance = if values.len() < 2 {
        0.0
    } else {
        values.iter().population_variance()
    };

    ChannelStats {
        mean: values.iter().mean(),
        variance,
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        mad: median_absolute_deviation(values),
    }
}

/// Median absolute deviation around the median, normalized.
fn median_absolute_deviation(values: &[f64]) -> f64 {
    let center = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    median(&deviations) / MAD_NORMALIZER
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

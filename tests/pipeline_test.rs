//! Integration tests for the full detection pipeline

use std::cell::RefCell;
use std::io::{self, Cursor, Read, Write};
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use wearable_move_detector::classifier::centroid::{CentroidModel, ModelError, Scaler};
use wearable_move_detector::config::SerialConfig;
use wearable_move_detector::core::{ManualClock, FEATURE_LEN};
use wearable_move_detector::dispatch::codec;
use wearable_move_detector::link::{SerialChannel, MOTION_CHANNELS};
use wearable_move_detector::{
    CentroidClassifier, Config, Detector, LinkError, MoveLabel, SerialLink, StepOutcome,
};

const KEY: &[u8] = b"1234123412341234";

/// Motion level that the test model maps to each label.
fn level(label: MoveLabel) -> f64 {
    match label {
        MoveLabel::Wipers => 1.0,
        MoveLabel::Chicken => 10.0,
        MoveLabel::Logout => 20.0,
        _ => 40.0,
    }
}

/// A packet with every motion channel at `label`'s level.
fn packet(label: MoveLabel) -> String {
    let motion = vec![format!("{}", level(label)); MOTION_CHANNELS].join(",");
    format!("{motion},5.0,0.5,2.5,12.0\r")
}

/// Feature vector of a window whose motion channels are all constant `v`.
fn constant_features(v: f64) -> Vec<f64> {
    let n = MOTION_CHANNELS;
    let mut features = Vec::with_capacity(FEATURE_LEN);
    features.extend(std::iter::repeat(v).take(n)); // mean
    features.extend(std::iter::repeat(0.0).take(n)); // variance
    features.extend(std::iter::repeat(v).take(n)); // max
    features.extend(std::iter::repeat(v).take(n)); // min
    features.extend(std::iter::repeat(0.0).take(n)); // offset
    features.extend(std::iter::repeat(0.0).take(n)); // mad
    features
}

fn test_classifier(window_size: usize) -> CentroidClassifier {
    let labels = vec![MoveLabel::Wipers, MoveLabel::Chicken, MoveLabel::Logout];
    let centroids = labels.iter().map(|l| constant_features(level(*l))).collect();
    CentroidClassifier::new(CentroidModel {
        window_size,
        labels,
        scaler: Scaler {
            mean: vec![0.0; FEATURE_LEN],
            scale: vec![1.0; FEATURE_LEN],
        },
        centroids,
        temperature: 0.1,
    })
    .expect("valid test model")
}

/// Serial channel that acknowledges the handshake and then plays back
/// a fixed byte stream. End of stream reads as a closed port.
struct FeedChannel {
    input: Cursor<Vec<u8>>,
}

impl FeedChannel {
    fn new(lines: &[String]) -> Self {
        let mut bytes = b"A".to_vec();
        for line in lines {
            bytes.extend_from_slice(line.as_bytes());
        }
        Self {
            input: Cursor::new(bytes),
        }
    }
}

impl Read for FeedChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for FeedChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SerialChannel for FeedChannel {
    fn discard_buffers(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Collector stand-in that keeps each message written.
#[derive(Clone, Default)]
struct Collector {
    messages: Rc<RefCell<Vec<String>>>,
}

impl Collector {
    fn decoded(&self) -> Vec<String> {
        self.messages
            .borrow()
            .iter()
            .map(|m| codec::open(m, KEY, 32).expect("collector can decode message"))
            .collect()
    }
}

impl Write for Collector {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.messages
            .borrow_mut()
            .push(String::from_utf8_lossy(buf).into_owned());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn test_config(window_size: usize, overlap: f64) -> Config {
    Config {
        window_size,
        overlap,
        warmup: Duration::ZERO,
        eval_interval: Some(Duration::ZERO),
        logout_min_sent: 1,
        serial: SerialConfig {
            handshake_interval: Duration::ZERO,
            ..SerialConfig::default()
        },
        ..Config::default()
    }
}

/// One window's worth of packets per label.
fn windows_of(labels: &[MoveLabel], window_size: usize) -> Vec<String> {
    labels
        .iter()
        .flat_map(|l| std::iter::repeat(packet(*l)).take(window_size))
        .collect()
}

type TestDetector = Detector<FeedChannel, CentroidClassifier, Collector, ManualClock>;

fn build(config: &Config, lines: &[String], clock: ManualClock) -> (TestDetector, Collector) {
    let collector = Collector::default();
    let link = SerialLink::new(FeedChannel::new(lines), Duration::ZERO);
    let detector = Detector::new(
        config,
        link,
        test_classifier(config.window_size),
        collector.clone(),
        clock,
    );
    (detector, collector)
}

#[test]
fn test_consensus_sends_one_move_and_clears() {
    use wearable_move_detector::MoveLabel::{Chicken, Wipers};

    let config = test_config(4, 0.0);
    let lines = windows_of(&[Wipers, Wipers, Chicken], 4);
    let (mut detector, collector) = build(&config, &lines, ManualClock::new(0));

    let result = detector.run(&AtomicBool::new(true));
    assert!(matches!(result, Err(LinkError::Closed)));

    assert_eq!(collector.decoded(), vec!["#wipers|5.00|0.50|2.50|12.00|"]);
    // The lone chicken after the dispatch is not enough for consensus
    assert_eq!(detector.gate().recorded(), &[Chicken]);
    assert_eq!(detector.stats().dispatches_sent, 1);
    assert_eq!(detector.stats().windows_assembled, 3);
}

#[test]
fn test_logout_waits_for_enough_moves() {
    use wearable_move_detector::MoveLabel::{Logout, Wipers};

    let config = test_config(4, 0.0);
    let lines = windows_of(&[Logout, Logout, Wipers, Wipers, Logout, Logout], 4);
    let (mut detector, collector) = build(&config, &lines, ManualClock::new(0));

    let outcomes: Vec<StepOutcome> = (0..6).map(|_| detector.step().unwrap()).collect();
    assert_eq!(outcomes[1], StepOutcome::LogoutSuppressed);
    assert!(matches!(
        outcomes[3],
        StepOutcome::Dispatched {
            label: Wipers,
            sequence: 1
        }
    ));
    assert!(matches!(
        outcomes[5],
        StepOutcome::Dispatched {
            label: Logout,
            sequence: 2
        }
    ));

    let decoded = collector.decoded();
    assert_eq!(decoded.len(), 2);
    assert!(decoded[1].starts_with("#logout|"));
    assert_eq!(detector.stats().logout_suppressions, 1);
}

#[test]
fn test_malformed_lines_are_skipped() {
    use wearable_move_detector::MoveLabel::Chicken;

    let config = test_config(4, 0.0);
    let mut lines = windows_of(&[Chicken, Chicken], 4);
    lines.insert(2, "garbage\r".to_string());
    lines.insert(5, "1,2,3,4,5,6,7,8,9,x,1,1,1\r".to_string());
    lines.insert(0, "\n1,2\r".to_string());
    let (mut detector, collector) = build(&config, &lines, ManualClock::new(0));

    let _ = detector.run(&AtomicBool::new(true));

    assert_eq!(collector.decoded().len(), 1);
    assert!(collector.decoded()[0].starts_with("#chicken|"));
    assert_eq!(detector.stats().malformed_lines, 3);
    assert_eq!(detector.stats().samples_read, 8);
}

#[test]
fn test_warmup_and_pacing_follow_the_clock() {
    use wearable_move_detector::MoveLabel::Wipers;

    let config = Config {
        warmup: Duration::from_millis(1000),
        eval_interval: Some(Duration::from_millis(1500)),
        consensus_size: 1,
        ..test_config(4, 0.0)
    };
    let clock = ManualClock::new(100);
    let lines = windows_of(&[Wipers; 6], 4);
    let (mut detector, collector) = build(&config, &lines, clock.clone());

    assert_eq!(detector.step().unwrap(), StepOutcome::WarmingUp);
    clock.set(1100);
    // Warm-up over, but the first interval runs from start
    assert_eq!(detector.step().unwrap(), StepOutcome::Paced);
    clock.set(1600);
    assert!(matches!(
        detector.step().unwrap(),
        StepOutcome::Dispatched { .. }
    ));
    clock.set(3099);
    assert_eq!(detector.step().unwrap(), StepOutcome::Paced);
    clock.set(3100);
    assert!(matches!(
        detector.step().unwrap(),
        StepOutcome::Dispatched { sequence: 2, .. }
    ));

    assert_eq!(collector.decoded().len(), 2);
    let stats = detector.stats();
    assert_eq!(stats.warmup_skips, 1);
    assert_eq!(stats.pacing_skips, 2);
    assert_eq!(detector.dispatcher().counters().last_dispatch_ms, Some(3100));
}

#[test]
fn test_dispatch_restarts_window_without_carry() {
    use wearable_move_detector::MoveLabel::Chicken;

    let config = test_config(4, 0.5);
    let lines = windows_of(&[Chicken; 4], 4);
    let (mut detector, _collector) = build(&config, &lines, ManualClock::new(0));

    assert!(matches!(detector.step().unwrap(), StepOutcome::Pending { .. }));
    assert_eq!(detector.assembler().samples_needed(), 2);
    assert!(matches!(detector.step().unwrap(), StepOutcome::Dispatched { .. }));
    assert_eq!(detector.assembler().carry_len(), 0);
    assert_eq!(detector.assembler().samples_needed(), 4);
    assert_eq!(detector.stats().samples_read, 6);
}

#[test]
fn test_messages_use_fresh_ivs() {
    use wearable_move_detector::MoveLabel::Wipers;

    let config = Config {
        consensus_size: 1,
        ..test_config(4, 0.0)
    };
    let lines = windows_of(&[Wipers, Wipers], 4);
    let (mut detector, collector) = build(&config, &lines, ManualClock::new(0));

    let _ = detector.run(&AtomicBool::new(true));

    let messages = collector.messages.borrow();
    assert_eq!(messages.len(), 2);
    assert_ne!(messages[0], messages[1]);
    assert_eq!(collector.decoded()[0], collector.decoded()[1]);
}

#[test]
fn test_model_window_must_match_config() {
    let config = test_config(4, 0.0);
    let classifier = test_classifier(8);

    let err = classifier.ensure_window_size(config.window_size).unwrap_err();
    assert!(matches!(
        err,
        ModelError::WindowMismatch {
            model: 8,
            configured: 4
        }
    ));
    assert!(test_classifier(4).ensure_window_size(config.window_size).is_ok());
}

//! Wearable Move Detector CLI
//!
//! Bridges a wearable's serial feed to an encrypted move collector.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wearable_move_detector::{
    classifier::CentroidClassifier,
    config::Config,
    core::SystemClock,
    dispatch::connect,
    link::{open_port, SerialLink},
    Detector, MoveLabel, VERSION,
};

#[derive(Parser)]
#[command(name = "move-detector")]
#[command(version = VERSION)]
#[command(about = "Real-time dance move detector for wearable sensors", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect moves and send them to the collector
    Run {
        /// Collector host
        host: String,

        /// Collector port
        port: u16,

        /// Serial device the wearable is attached to
        #[arg(long)]
        serial: Option<String>,

        /// Serial baud rate
        #[arg(long)]
        baud: Option<u32>,

        /// Centroid model file
        #[arg(long)]
        model: Option<PathBuf>,

        /// Configuration file (defaults to the user config directory)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Log per-window predictions and pacing decisions
        #[arg(long, short)]
        verbose: bool,
    },

    /// Show configuration
    Config {
        /// Write the default configuration to the config file
        #[arg(long)]
        init: bool,

        /// Configuration file (defaults to the user config directory)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List the move labels the detector can send
    Labels,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            host,
            port,
            serial,
            baud,
            model,
            config,
            verbose,
        } => {
            init_tracing(verbose);
            cmd_run(&host, port, serial, baud, model, config)
        }
        Commands::Config { init, config } => cmd_config(init, config),
        Commands::Labels => {
            cmd_labels();
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<(Config, PathBuf)> {
    match path {
        Some(path) => {
            let config = Config::load_from(&path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?;
            Ok((config, path))
        }
        None => {
            let config = Config::load().context("failed to load configuration")?;
            Ok((config, Config::config_path()))
        }
    }
}

fn cmd_run(
    host: &str,
    port: u16,
    serial: Option<String>,
    baud: Option<u32>,
    model: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> anyhow::Result<()> {
    let (mut config, _) = load_config(config_path)?;
    if let Some(path) = serial {
        config.serial.path = path;
    }
    if let Some(baud) = baud {
        config.serial.baud_rate = baud;
    }
    if model.is_some() {
        config.model_path = model;
    }
    config.validate()?;

    let Some(model_path) = config.model_path.clone() else {
        bail!("no classifier model given; pass --model or set model_path in the configuration");
    };

    println!("Wearable Move Detector v{VERSION}");
    println!();
    println!("  Collector: {host}:{port}");
    println!(
        "  Serial: {} @ {} baud",
        config.serial.path, config.serial.baud_rate
    );
    println!("  Model: {}", model_path.display());
    println!(
        "  Window: {} samples, overlap {:.2} ({} fresh per window)",
        config.window_size,
        config.overlap,
        config.extract_size()
    );
    println!(
        "  Consensus: {} predictions above {:.2}",
        config.consensus_size, config.confidence_threshold
    );
    println!(
        "  Warm-up: {:.1}s, evaluation interval: {}ms",
        config.warmup.as_secs_f64(),
        config.eval_interval().as_millis()
    );
    println!("  Logout allowed after {} moves", config.logout_min_sent);
    println!();

    let classifier = CentroidClassifier::load(&model_path)
        .with_context(|| format!("failed to load model from {}", model_path.display()))?;
    classifier
        .ensure_window_size(config.window_size)
        .with_context(|| format!("model {} does not fit the configuration", model_path.display()))?;
    let channel = open_port(
        &config.serial.path,
        config.serial.baud_rate,
        config.serial.timeout,
    )?;
    let socket = connect(host, port)?;

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    println!("Press Ctrl+C to stop");
    println!();

    let link = SerialLink::new(channel, config.serial.handshake_interval);
    let mut detector = Detector::new(&config, link, classifier, socket, SystemClock::new());
    let result = detector.run(&running);

    let (stats, _socket) = detector.finish();
    println!();
    println!("{}", stats.summary());

    result.context("serial link failed")
}

fn cmd_config(init: bool, path: Option<PathBuf>) -> anyhow::Result<()> {
    if init {
        let path = path.unwrap_or_else(Config::config_path);
        Config::default().save_to(&path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let (config, path) = load_config(path)?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {}", path.display());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_labels() {
    for label in MoveLabel::ALL {
        println!("{label}");
    }
}

/// Set up Ctrl+C handler. A second Ctrl+C exits at once, since a cycle
/// may be blocked in a serial read.
fn ctrlc_handler(running: Arc<AtomicBool>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        if !running.swap(false, Ordering::SeqCst) {
            std::process::exit(130);
        }
        eprintln!("Stopping after the current window (Ctrl+C again to exit now)");
    })
    .context("failed to set Ctrl+C handler")
}

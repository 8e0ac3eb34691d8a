//! Myoflex Application
//!
//! Command-line entry point for the EMG gesture pipeline.
//!
//! # Usage
//!
//! ```bash
//! # Replay a recorded session and score it against its labels
//! myoflex replay --config session.toml --input recording.csv
//!
//! # Classify a live serial stream (requires the `usb` feature)
//! myoflex run --config session.toml --port /dev/ttyACM0
//!
//! # Summarize a model bundle
//! myoflex inspect --model hand.json
//!
//! # List serial ports
//! myoflex ports
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use myoflex_native::bridge::{ReplaySource, SampleSource};
use myoflex_native::bundle::{ClassifierParams, ModelBundle};
use myoflex_native::config::SessionConfig;
use myoflex_native::ingest::RecordParser;
use myoflex_native::session::{resolve_model, PredictionEvent, Session};

/// Myoflex EMG gesture classifier
#[derive(Parser, Debug)]
#[command(name = "myoflex")]
#[command(author, version, about = "Real-time EMG gesture classification", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a live serial stream
    Run {
        /// Session configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Model bundle, overriding the config's model_path
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Serial port path (e.g., /dev/ttyACM0 or COM3)
        #[arg(short, long)]
        port: String,

        /// Baud rate
        #[arg(short, long, default_value = "115200")]
        baud: u32,
    },

    /// Replay a recorded session file
    Replay {
        /// Session configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Model bundle, overriding the config's model_path
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Recorded samples (CSV or plotter lines)
        #[arg(short, long)]
        input: PathBuf,

        /// Only print the final report
        #[arg(short, long)]
        quiet: bool,
    },

    /// Summarize a model bundle
    Inspect {
        /// Model bundle (JSON)
        #[arg(short, long)]
        model: PathBuf,
    },

    /// List available serial ports
    Ports,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Myoflex v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run { config, model, port, baud } => run_live(config.as_deref(), model, &port, baud),
        Commands::Replay { config, model, input, quiet } => {
            run_replay(config.as_deref(), model, &input, quiet)
        }
        Commands::Inspect { model } => inspect(&model),
        Commands::Ports => list_ports(),
    }
}

/// Load the session config, or defaults, and apply a model override.
fn load_config(path: Option<&Path>, model: Option<PathBuf>) -> anyhow::Result<SessionConfig> {
    let mut config = match path {
        Some(path) => SessionConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if model.is_some() {
        config.model_path = model;
    }
    Ok(config)
}

fn print_event(event: &PredictionEvent<'_>) {
    match event.truth {
        Some(truth) => println!(
            "{:>8} {:>12} {:<10} {:>10.4} truth={}",
            event.window_index, event.timestamp_us, event.name, event.score, truth
        ),
        None => println!(
            "{:>8} {:>12} {:<10} {:>10.4}",
            event.window_index, event.timestamp_us, event.name, event.score
        ),
    }
}

fn run_session<S: SampleSource>(config: &SessionConfig, source: &mut S, quiet: bool) -> anyhow::Result<()> {
    let model = resolve_model(config)?;
    let mut session = Session::new(&model, config)?;

    let report = session.run(source, |event| {
        if !quiet {
            print_event(event);
        }
    })?;

    println!("{report}");
    if report.deadline.overruns() > 0 {
        warn!(
            "{} windows exceeded the {}us budget",
            report.deadline.overruns(),
            config.deadline_budget_us()
        );
    }
    Ok(())
}

fn run_replay(config: Option<&Path>, model: Option<PathBuf>, input: &Path, quiet: bool) -> anyhow::Result<()> {
    let config = load_config(config, model)?;
    let parser = RecordParser::new(config.channels, config.sample_rate_hz);
    let mut source = ReplaySource::open(input, parser)
        .with_context(|| format!("opening recording {}", input.display()))?;
    run_session(&config, &mut source, quiet)
}

#[cfg(feature = "usb")]
fn run_live(config: Option<&Path>, model: Option<PathBuf>, port: &str, baud: u32) -> anyhow::Result<()> {
    use myoflex_native::bridge::SerialSource;

    let config = load_config(config, model)?;
    let parser = RecordParser::new(config.channels, config.sample_rate_hz);
    let mut source = SerialSource::open(port, baud, parser)?;
    run_session(&config, &mut source, false)
}

#[cfg(not(feature = "usb"))]
fn run_live(_config: Option<&Path>, _model: Option<PathBuf>, port: &str, _baud: u32) -> anyhow::Result<()> {
    anyhow::bail!("cannot open {port}: USB support not enabled. Rebuild with --features usb")
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    let bundle = ModelBundle::load(path)?;

    println!("bundle:        {}", path.display());
    println!("version:       {}", bundle.format_version);
    println!("classifier:    {}", bundle.classifier.kind());
    println!("channels:      {}", bundle.channels);
    println!("feature set:   {}", bundle.feature_set.name());
    println!("zero crossing: {:?}", bundle.zero_crossing);
    println!("features:      {}", bundle.feature_count);
    match &bundle.classifier {
        ClassifierParams::Linear(p) => println!("coefficients:  {} x {}", p.coefficients.len(), bundle.feature_count),
        ClassifierParams::Network(p) => {
            let widths: Vec<String> = p.layers.iter().map(|l| l.weights.len().to_string()).collect();
            println!("layers:        {} -> {}", bundle.feature_count, widths.join(" -> "));
        }
        ClassifierParams::Rules(p) => {
            for rule in &p.rules {
                println!("rule:          {} -> class {}", rule.name, rule.class);
            }
        }
    }
    if !bundle.gate.is_empty() {
        println!("gate:          {} predicates", bundle.gate.len());
    }
    for (id, name) in bundle.class_names.iter().enumerate() {
        println!("class {id:>3}:     {name}");
    }

    // Full validation, so inspect also reports bundles that would not load
    let model = bundle.into_model()?;
    println!("status:        ok ({} features, {} classes)", model.feature_count(), model.classes().len());
    Ok(())
}

fn list_ports() -> anyhow::Result<()> {
    info!("Scanning for serial ports...");

    #[cfg(feature = "usb")]
    match serialport::available_ports() {
        Ok(ports) => {
            if ports.is_empty() {
                info!("  (none found)");
            } else {
                for port in ports {
                    info!("  {} - {:?}", port.port_name, port.port_type);
                }
            }
        }
        Err(e) => {
            warn!("  Error scanning serial ports: {}", e);
        }
    }

    #[cfg(not(feature = "usb"))]
    warn!("USB support not enabled. Rebuild with --features usb");

    Ok(())
}

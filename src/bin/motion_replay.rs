//! `motion_replay`: run recorded pose frames through the analyzer.
//!
//! Reads one JSON pose per line (file or stdin), writes one JSON
//! `FrameMetrics` per line to stdout and finishes with the session summary.
//!
//! ```bash
//! motion_replay session.jsonl --mode precise --athlete-height 1.78
//! ```

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use kinemetrics::pose::parse_replay_line;
use kinemetrics::{AnalysisMode, Config, MotionAnalyzer};

const CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    Fast,
    Balanced,
    Precise,
}

impl From<Mode> for AnalysisMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Fast => AnalysisMode::Fast,
            Mode::Balanced => AnalysisMode::Balanced,
            Mode::Precise => AnalysisMode::Precise,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "motion_replay", version, about = "Replay pose frames through the motion analyzer")]
struct Args {
    /// JSON lines of pose frames. Reads stdin when omitted.
    input: Option<PathBuf>,

    /// TOML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Override `analysis.mode`.
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Athlete height in meters; calibrates from the first upright pose.
    #[arg(long, value_name = "METERS")]
    athlete_height: Option<f32>,

    /// Only print the session summary.
    #[arg(long, default_value_t = false)]
    summary_only: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level_filter = args
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    // stdout はメトリクス専用
    tracing_subscriber::fmt()
        .with_max_level(log_level_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    info!("Motion Replay ({})", env!("GIT_VERSION"));

    let mut config = Config::load_or_default(&args.config);
    if let Some(mode) = args.mode {
        config.analysis.mode = mode.into();
    }
    if let Some(height) = args.athlete_height {
        config.calibration.athlete_height = Some(height);
    }
    config.validate().context("invalid configuration")?;

    info!(
        mode = ?config.analysis.mode,
        pixels_per_meter = config.calibration.pixels_per_meter,
        confidence_threshold = config.analysis.confidence_threshold,
        "analyzer ready"
    );

    let reader: Box<dyn BufRead> = match &args.input {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(io::stdin().lock())),
    };

    let mut analyzer = MotionAnalyzer::new(config);
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut rejected = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read input")?;
        if line.trim().is_empty() {
            continue;
        }
        let (frame, camera_offset) = match parse_replay_line(&line) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(line = index + 1, "skipping frame: {:#}", e);
                rejected += 1;
                continue;
            }
        };

        let metrics = analyzer.process(frame, camera_offset);
        if !args.summary_only {
            serde_json::to_writer(&mut out, &metrics)?;
            writeln!(out)?;
        }
    }

    let summary = analyzer.summary();
    serde_json::to_writer(&mut out, &serde_json::json!({ "summary": summary }))?;
    writeln!(out)?;
    out.flush()?;

    info!(
        frames = summary.frames_processed,
        skipped = summary.frames_skipped,
        rejected,
        distance_m = summary.distance.total,
        max_speed = summary.max_speed,
        "replay finished"
    );
    Ok(())
}

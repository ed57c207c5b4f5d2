/*!
# Lidar Brain

Acquisition and analysis node for a spinning serial rangefinder. Reads
packets from the sensor, assembles one rotation at a time, and reports the
nearest range ahead, spin status and the dominant wall to the robot over UDP.

## Usage

### Live acquisition
```bash
lidarbrain --config lidarbrain.toml run
```

### Without hardware
```bash
lidarbrain run --synthetic
```

### Replay saved snapshots
```bash
lidarbrain replay ./snapshots/20240101_120000 --start 10 --count 5
```

### Inspect one packet
```bash
lidarbrain decode FAA50040FE002200FC014400F803660077808800ABCD
```
*/

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod analysis;
mod capture;
mod config;
mod messaging;
mod source;

use analysis::RotationAnalyzer;
use capture::{LidarPipeline, SourceKind};
use config::AppConfig;
use sweep::export::{list_snapshots, read_snapshot};
use sweep::messages::SensorMessage;
use sweep::{Packet, Rotation};

#[derive(Parser)]
#[command(name = "lidarbrain")]
#[command(about = "Serial lidar acquisition, analysis and robot messaging")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level, including rotation dumps
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire and analyse until Ctrl+C
    Run {
        /// Use fixture packets instead of the serial port
        #[arg(long)]
        synthetic: bool,
    },

    /// Run the analysers over saved snapshot files
    Replay {
        /// Directory holding lidar_snapshot_{n}.dat files
        dir: PathBuf,

        /// First snapshot number to replay
        #[arg(long, default_value = "0")]
        start: u32,

        /// Number of snapshots to replay
        #[arg(long)]
        count: Option<usize>,
    },

    /// Decode one 22-byte packet given as hex
    Decode {
        hex: String,
    },

    /// Generate configuration file
    Config {
        /// Output path for configuration file
        #[arg(short, long, default_value = "lidarbrain.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries messages in some modes, so logs go to stderr
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    match cli.command {
        Commands::Run { synthetic } => {
            let config = load_config(cli.config.as_deref())?;
            let source = if synthetic { SourceKind::Synthetic } else { SourceKind::Serial };
            run_pipeline(config, source)
        }
        Commands::Replay { dir, start, count } => {
            let config = load_config(cli.config.as_deref())?;
            replay_snapshots(&config, &dir, start, count)
        }
        Commands::Decode { hex } => decode_packet(&hex),
        Commands::Config { output } => generate_config_file(output),
    }
}

/// Configuration from file, or defaults when no file was given
fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from_file(path),
        None => Ok(AppConfig::new()),
    }
}

fn run_pipeline(config: AppConfig, source: SourceKind) -> Result<()> {
    match source {
        SourceKind::Serial => tracing::info!("🚀 Starting acquisition on {}", config.serial.port),
        SourceKind::Synthetic => tracing::info!("🚀 Starting acquisition (synthetic)"),
    }

    let mut pipeline = LidarPipeline::new(config, source);

    // Set up Ctrl+C handler
    let running = pipeline.get_running_flag();
    ctrlc::set_handler(move || {
        eprintln!("\n🛑 Received Ctrl+C, shutting down gracefully...");
        running.store(false, std::sync::atomic::Ordering::SeqCst);
    })?;

    pipeline.start().context("Acquisition failed")?;

    tracing::info!("✅ Acquisition completed");
    Ok(())
}

/// Print the messages each snapshot would have produced, one JSON document
/// per line
fn replay_snapshots(config: &AppConfig, dir: &Path, start: u32, count: Option<usize>) -> Result<()> {
    let snapshots = list_snapshots(dir)
        .with_context(|| format!("Failed to list snapshots in {}", dir.display()))?;
    let selected: Vec<_> = snapshots
        .into_iter()
        .filter(|(n, _)| *n >= start)
        .take(count.unwrap_or(usize::MAX))
        .collect();
    if selected.is_empty() {
        bail!("No snapshots from {} in {}", start, dir.display());
    }

    let mut analyzer = RotationAnalyzer::new(config.analysis.range_window, config.analysis.wall);
    for (n, path) in selected {
        let polar = read_snapshot(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let rotation = Rotation::from_polar(polar, 0, &config.analysis.rotation);
        tracing::info!("Snapshot {}: {} points", n, rotation.len());

        for message in analyzer.analyze(&rotation) {
            println!("{}", SensorMessage::lidar(message).encode()?);
        }
    }
    Ok(())
}

fn decode_packet(text: &str) -> Result<()> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = hex::decode(&cleaned).context("Packet is not valid hex")?;
    let packet = Packet::decode(&bytes)?;

    println!("{}", packet);
    print!("{}", packet.as_data());
    if packet.checksum_ok() {
        println!("checksum ok ({:#06x})", packet.checksum());
    } else {
        println!(
            "checksum mismatch: carried {:#06x}, computed {:#06x}",
            packet.checksum(),
            packet.computed_checksum()
        );
    }
    Ok(())
}

/// Generate a default configuration file
fn generate_config_file(output_path: PathBuf) -> Result<()> {
    let config = AppConfig::new();
    config.save_to_file(&output_path)?;

    println!("✅ Generated configuration file: {}", output_path.display());
    println!("📝 Edit the file to customize settings, then run:");
    println!("   lidarbrain --config {} run", output_path.display());

    Ok(())
}

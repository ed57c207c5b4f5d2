/*!
Acquisition and analysis pipeline.

Three threads, connected by crossbeam channels:
1. Acquisition: packet source -> rotations -> bounded event queue
2. Analysis: events -> range at heading, periodic and wall messages
3. Robot link: messages out over UDP, sweep commands back in

The event queue blocks the acquisition thread when analysis falls behind, so
rotations are delayed rather than dropped.
*/

use crate::analysis::{AcquisitionEvent, RotationAnalyzer, SnapshotLog};
use crate::config::AppConfig;
use crate::messaging::run_link;
use crate::source::{open_serial, open_synthetic, PacketSource};
use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, SendError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use sweep::messages::{LidarMessage, RobotCommand, SensorMessage};
use sweep::sync::ReaderStats;
use sweep::{Rotation, RotationConfig};
use tracing::{debug, error, info, warn};

/// Where packets come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Serial,
    Synthetic,
}

/// Acquisition counters, kept across port reopenings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    pub rotations: u64,
    pub empty_rotations: u64,
    pub packets: u64,
    pub skipped_slices: u64,
    pub port_failures: u64,
    pub reader: ReaderStats,
}

impl AcquisitionStats {
    fn absorb(&mut self, reader: ReaderStats) {
        self.reader.packets_read += reader.packets_read;
        self.reader.bytes_skipped += reader.bytes_skipped;
        self.reader.false_markers += reader.false_markers;
        self.reader.checksum_mismatches += reader.checksum_mismatches;
        self.reader.sync_failures += reader.sync_failures;
        self.reader.decode_failures += reader.decode_failures;
    }
}

/// Runs the whole node until the running flag clears
pub struct LidarPipeline {
    config: AppConfig,
    source: SourceKind,
    running: Arc<AtomicBool>,
}

impl LidarPipeline {
    pub fn new(config: AppConfig, source: SourceKind) -> Self {
        Self {
            config,
            source,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Get a reference to the running flag for external control
    pub fn get_running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Start all threads and wait for them to finish
    pub fn start(&mut self) -> Result<()> {
        let (event_tx, event_rx) = bounded::<AcquisitionEvent>(self.config.pipeline.queue_depth);
        let (message_tx, message_rx) = unbounded::<LidarMessage>();
        let (command_tx, command_rx) = bounded::<RobotCommand>(16);

        let mut analyzer = RotationAnalyzer::new(
            self.config.analysis.range_window,
            self.config.analysis.wall,
        );
        if self.config.snapshots.enabled {
            analyzer = analyzer.with_snapshots(SnapshotLog::session(
                &self.config.snapshots.output_directory,
                self.config.snapshots.seconds_per_snapshot,
            )?);
        }

        let link_handle = if self.config.messaging.enabled {
            let messaging = self.config.messaging.clone();
            let running = Arc::clone(&self.running);
            Some(thread::spawn(move || {
                match run_link(messaging, message_rx, command_tx, running) {
                    Ok(_) => {
                        info!("Robot link thread finished successfully");
                        Ok(())
                    }
                    Err(e) => {
                        error!("Robot link thread failed: {:#}", e);
                        Err(e)
                    }
                }
            }))
        } else {
            info!("Robot messaging disabled");
            drop(message_rx);
            drop(command_tx);
            None
        };

        let acquisition = Acquisition {
            config: self.config.clone(),
            kind: self.source,
            running: Arc::clone(&self.running),
        };
        let acquisition_handle = thread::spawn(move || {
            let stats = acquisition.run(event_tx);
            info!("Acquisition thread finished after {} rotations", stats.rotations);
            stats
        });

        let running = Arc::clone(&self.running);
        let messaging_enabled = self.config.messaging.enabled;
        let analysis_handle = thread::spawn(move || {
            analysis_loop(analyzer, event_rx, command_rx, message_tx, running, messaging_enabled)
        });

        acquisition_handle
            .join()
            .map_err(|_| anyhow!("Acquisition thread panicked"))?;
        let analyzed = analysis_handle
            .join()
            .map_err(|_| anyhow!("Analysis thread panicked"))?;
        info!("Analysis thread finished after {} rotations", analyzed);

        if let Some(handle) = link_handle {
            handle
                .join()
                .map_err(|_| anyhow!("Robot link thread panicked"))??;
        }

        Ok(())
    }
}

/// Producer side: owns the packet source
struct Acquisition {
    config: AppConfig,
    kind: SourceKind,
    running: Arc<AtomicBool>,
}

impl Acquisition {
    fn open(&self) -> Result<Box<dyn PacketSource>> {
        match self.kind {
            SourceKind::Serial => Ok(Box::new(open_serial(&self.config.serial)?)),
            SourceKind::Synthetic => Ok(Box::new(open_synthetic(&self.config.serial))),
        }
    }

    fn run(&self, events: Sender<AcquisitionEvent>) -> AcquisitionStats {
        let rotation_config = self.config.analysis.rotation;
        let stats_interval = Duration::from_secs(self.config.pipeline.stats_interval_seconds.max(1));
        let mut stats = AcquisitionStats::default();
        let mut last_report = Instant::now();
        let started = Instant::now();

        'reopen: while self.running.load(Ordering::SeqCst) {
            let mut source = match self.open() {
                Ok(source) => source,
                Err(e) => {
                    warn!("⚠️ {:#}", e);
                    stats.port_failures += 1;
                    if events.send(AcquisitionEvent::Down(format!("{:#}", e))).is_err() {
                        break;
                    }
                    self.pause(self.config.serial.reconnect_delay());
                    continue;
                }
            };

            while self.running.load(Ordering::SeqCst) {
                let event = match source.gather_rotation() {
                    Ok(packets) => self.assemble(&packets, &rotation_config, &mut stats),
                    Err(e) => {
                        warn!("⚠️ Lost {}: {}", source.name(), e);
                        stats.port_failures += 1;
                        stats.absorb(source.stats());
                        let down = AcquisitionEvent::Down(e.to_string());
                        if events.send(down).is_err() {
                            break 'reopen;
                        }
                        self.pause(self.config.serial.reconnect_delay());
                        continue 'reopen;
                    }
                };

                if events.send(event).is_err() {
                    info!("Event channel disconnected - analysis has stopped");
                    stats.absorb(source.stats());
                    break 'reopen;
                }

                if last_report.elapsed() >= stats_interval {
                    report(&stats, source.stats(), started);
                    last_report = Instant::now();
                }
            }
            stats.absorb(source.stats());
        }

        info!("📈 Acquisition final stats:");
        report(&stats, ReaderStats::default(), started);
        stats
    }

    fn assemble(
        &self,
        packets: &[sweep::Packet],
        rotation_config: &RotationConfig,
        stats: &mut AcquisitionStats,
    ) -> AcquisitionEvent {
        if packets.is_empty() {
            stats.empty_rotations += 1;
            debug!("rotation yielded no packets");
            return AcquisitionEvent::Failed;
        }
        stats.rotations += 1;
        stats.packets += packets.len() as u64;
        stats.skipped_slices += (usize::from(sweep::protocol::SLICES_PER_ROTATION) - packets.len()) as u64;
        AcquisitionEvent::Rotation(Arc::new(Rotation::from_packets(packets, rotation_config)))
    }

    /// Sleep, waking early if shutdown is requested
    fn pause(&self, delay: Duration) {
        let until = Instant::now() + delay;
        while self.running.load(Ordering::SeqCst) && Instant::now() < until {
            thread::sleep(Duration::from_millis(50));
        }
    }
}

/// Log acquisition counters; `live` holds the current reader's counts not
/// yet folded into `stats`
fn report(stats: &AcquisitionStats, live: ReaderStats, started: Instant) {
    let elapsed = started.elapsed().as_secs_f64();
    let rate = if elapsed > 0.0 { stats.rotations as f64 / elapsed } else { 0.0 };
    info!(
        "📊 {} rotations ({:.2}/s), {} empty, {} packets, {} skipped slices, {} port failures",
        stats.rotations, rate, stats.empty_rotations, stats.packets, stats.skipped_slices, stats.port_failures
    );
    info!(
        "📊 reader: {} bytes skipped, {} false markers, {} checksum mismatches, {} sync failures, {} decode failures",
        stats.reader.bytes_skipped + live.bytes_skipped,
        stats.reader.false_markers + live.false_markers,
        stats.reader.checksum_mismatches + live.checksum_mismatches,
        stats.reader.sync_failures + live.sync_failures,
        stats.reader.decode_failures + live.decode_failures
    );
}

/// Consumer side: analyse every event and apply robot commands in between.
/// Returns the number of rotations analysed.
fn analysis_loop(
    mut analyzer: RotationAnalyzer,
    events: Receiver<AcquisitionEvent>,
    commands: Receiver<RobotCommand>,
    messages: Sender<LidarMessage>,
    running: Arc<AtomicBool>,
    publish: bool,
) -> u64 {
    let mut publish = publish;

    while running.load(Ordering::SeqCst) || !events.is_empty() {
        for command in commands.try_iter() {
            if let Some(reply) = analyzer.apply_command(command) {
                publish = forward(&messages, reply, publish);
            }
        }

        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                for message in analyzer.handle_event(&event) {
                    publish = forward(&messages, message, publish);
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                info!("Event channel disconnected - acquisition has stopped");
                break;
            }
        }
    }

    analyzer.rotations()
}

/// Hand a message to the robot link, or print it to stdout when there is none
fn forward(messages: &Sender<LidarMessage>, message: LidarMessage, publish: bool) -> bool {
    if publish {
        match messages.send(message) {
            Ok(()) => return true,
            Err(SendError(message)) => {
                warn!("Robot link has stopped, printing messages instead");
                print_message(message);
                return false;
            }
        }
    }
    print_message(message);
    false
}

fn print_message(message: LidarMessage) {
    match SensorMessage::lidar(message).encode() {
        Ok(document) => println!("{}", document),
        Err(e) => error!("Failed to encode message: {}", e),
    }
}

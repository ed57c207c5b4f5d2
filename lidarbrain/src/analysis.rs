/*!
Per-rotation analysis and the robot-facing state that goes with it.
*/

use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use sweep::export::{list_snapshots, snapshot_path, write_snapshot};
use sweep::messages::{LidarMessage, RobotCommand, Status};
use sweep::{find_wall, range_at_heading, HeadingWindow, Rotation, WallConfig};
use tracing::{debug, info, warn};

/// What the acquisition side has to report
#[derive(Debug, Clone)]
pub enum AcquisitionEvent {
    Rotation(std::sync::Arc<Rotation>),
    /// A whole rotation came back empty
    Failed,
    /// The sensor port is unavailable
    Down(String),
}

/// Turns rotations into robot messages
pub struct RotationAnalyzer {
    window: HeadingWindow,
    wall: WallConfig,
    snapshots: Option<SnapshotLog>,
    rotations: u64,
}

impl RotationAnalyzer {
    pub fn new(window: HeadingWindow, wall: WallConfig) -> Self {
        Self {
            window,
            wall,
            snapshots: None,
            rotations: 0,
        }
    }

    pub fn with_snapshots(mut self, snapshots: SnapshotLog) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn window(&self) -> HeadingWindow {
        self.window
    }

    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    /// Messages owed to the robot for one acquisition event
    pub fn handle_event(&mut self, event: &AcquisitionEvent) -> Vec<LidarMessage> {
        match event {
            AcquisitionEvent::Rotation(rotation) => self.analyze(rotation),
            AcquisitionEvent::Failed => vec![LidarMessage::periodic(Status::Error, 0)],
            AcquisitionEvent::Down(reason) => {
                debug!("sensor down: {}", reason);
                vec![LidarMessage::periodic(Status::Down, 0)]
            }
        }
    }

    /// Range at heading, periodic status and wall for one rotation
    pub fn analyze(&mut self, rotation: &Rotation) -> Vec<LidarMessage> {
        self.rotations += 1;
        log_rotation(rotation);

        let hit = range_at_heading(rotation.polar(), &self.window);
        let wall = find_wall(&rotation.cartesian(), &self.wall);
        debug!(
            "rotation {}: range {:?} in [{}, {}), wall {:?}",
            self.rotations, hit, self.window.start, self.window.stop, wall
        );

        if let Some(snapshots) = self.snapshots.as_mut() {
            if let Err(e) = snapshots.record(rotation) {
                warn!("Failed to write snapshot: {:#}", e);
            }
        }

        vec![
            hit.into(),
            LidarMessage::periodic(Status::Ok, rotation.rpm()),
            LidarMessage::wall(&wall),
        ]
    }

    /// Apply a robot command; returns the reply, if one is owed
    pub fn apply_command(&mut self, command: RobotCommand) -> Option<LidarMessage> {
        match command {
            RobotCommand::Sweep(window) => {
                info!("🎯 Range window set to [{}, {})", window.start, window.stop);
                self.window = window;
                None
            }
            RobotCommand::InvalidSweep => {
                warn!("Rejected sweep command with bad bounds");
                Some(LidarMessage::periodic(Status::Badarg, 0))
            }
            RobotCommand::Unknown => {
                debug!("Ignoring unknown robot message");
                None
            }
        }
    }
}

/// Dump a rotation's polar view between BEGIN and END markers
pub fn log_rotation(rotation: &Rotation) {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }
    debug!("BEGIN");
    for point in rotation.polar() {
        debug!("{}, {:.1}", point.heading, point.range);
    }
    debug!("END");
}

/// Writes one snapshot per `seconds_per_snapshot` of rotation time
pub struct SnapshotLog {
    dir: PathBuf,
    seconds_per_snapshot: f64,
    accumulated: f64,
    next_number: u32,
    written: u32,
}

impl SnapshotLog {
    /// Continue numbering after any snapshots already in `dir`
    pub fn open<P: AsRef<Path>>(dir: P, seconds_per_snapshot: f64) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create snapshot directory: {}", dir.display()))?;

        let next_number = list_snapshots(&dir)?
            .last()
            .map(|(n, _)| n + 1)
            .unwrap_or(0);
        if next_number > 0 {
            info!("Found existing snapshots, continuing from {}", next_number);
        }

        Ok(Self {
            dir,
            seconds_per_snapshot,
            accumulated: 0.0,
            next_number,
            written: 0,
        })
    }

    /// New timestamped session directory under `root`
    pub fn session<P: AsRef<Path>>(root: P, seconds_per_snapshot: f64) -> Result<Self> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let dir = root.as_ref().join(timestamp);
        info!("📁 Snapshots will be saved to: {}", dir.display());
        Self::open(dir, seconds_per_snapshot)
    }

    /// Count this rotation's time; write it out once enough has passed
    pub fn record(&mut self, rotation: &Rotation) -> Result<Option<PathBuf>> {
        if let Some(period) = rotation.period() {
            self.accumulated += period.as_secs_f64();
        }
        // the first rotation of a session is always kept
        if self.written > 0 && self.accumulated < self.seconds_per_snapshot {
            return Ok(None);
        }

        let path = snapshot_path(&self.dir, self.next_number);
        write_snapshot(&path, rotation.polar())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("💾 Saved snapshot {}", path.display());

        self.next_number += 1;
        self.written += 1;
        self.accumulated = 0.0;
        Ok(Some(path))
    }
}

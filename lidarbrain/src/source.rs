/*!
Packet sources.

Both the serial port and the synthetic generator are plain byte streams fed
through a [`PacketReader`], so the acquisition thread cannot tell them apart.
*/

use crate::config::SerialConfig;
use anyhow::{Context, Result};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read};
use std::time::{Duration, Instant};
use sweep::protocol::{synthetic_packet, PACKET_SIZE_BYTES, SLICES_PER_ROTATION};
use sweep::sync::ReaderStats;
use sweep::{Packet, PacketReader, SweepError};
use tracing::info;

/// Something that yields one rotation's packets per call
pub trait PacketSource: Send {
    /// Read slices 0..89; failed slices are skipped
    fn gather_rotation(&mut self) -> Result<Vec<Packet>, SweepError>;

    fn stats(&self) -> ReaderStats;

    fn name(&self) -> &str;
}

/// A [`PacketReader`] over any byte stream
pub struct StreamSource<R> {
    reader: PacketReader<R>,
    name: String,
}

impl<R: Read + Send> StreamSource<R> {
    pub fn new(stream: R, reader_config: sweep::SyncConfig, name: impl Into<String>) -> Self {
        Self {
            reader: PacketReader::new(stream, reader_config),
            name: name.into(),
        }
    }
}

impl<R: Read + Send> PacketSource for StreamSource<R> {
    fn gather_rotation(&mut self) -> Result<Vec<Packet>, SweepError> {
        self.reader.gather_rotation()
    }

    fn stats(&self) -> ReaderStats {
        self.reader.stats()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Open the sensor's serial port, 8N1 without flow control
pub fn open_serial(config: &SerialConfig) -> Result<StreamSource<Box<dyn SerialPort>>> {
    let port = serialport::new(&config.port, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(config.read_timeout())
        .open()
        .with_context(|| format!("Failed to open serial port {}", config.port))?;

    info!("🔌 Opened {} at {} baud", config.port, config.baud_rate);
    Ok(StreamSource::new(port, config.sync_config(), config.port.clone()))
}

/// Endless stream of fixture packets, paced like a sensor spinning at the
/// fixture's speed
pub struct SyntheticPort {
    slice: u8,
    block: [u8; PACKET_SIZE_BYTES],
    offset: usize,
    period: Duration,
    rotation_started: Instant,
}

impl SyntheticPort {
    pub fn new() -> Self {
        let block = synthetic_packet(0);
        let rpm = Packet::decode(&block).map(|p| p.rpm()).unwrap_or(0).max(1);
        Self {
            slice: 0,
            block,
            offset: 0,
            period: Duration::from_secs_f64(60.0 / f64::from(rpm)),
            rotation_started: Instant::now(),
        }
    }

    /// Move on to the next slice, sleeping out the rest of the period after
    /// the last one
    fn advance(&mut self) {
        self.slice = (self.slice + 1) % SLICES_PER_ROTATION;
        if self.slice == 0 {
            let elapsed = self.rotation_started.elapsed();
            if elapsed < self.period {
                std::thread::sleep(self.period - elapsed);
            }
            self.rotation_started = Instant::now();
        }
        self.block = synthetic_packet(self.slice);
        self.offset = 0;
    }
}

impl Default for SyntheticPort {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for SyntheticPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.offset == PACKET_SIZE_BYTES {
            self.advance();
        }
        let n = buf.len().min(PACKET_SIZE_BYTES - self.offset);
        buf[..n].copy_from_slice(&self.block[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }
}

/// Fixture packets instead of hardware
pub fn open_synthetic(config: &SerialConfig) -> StreamSource<SyntheticPort> {
    info!("🧪 Using synthetic packet source");
    StreamSource::new(SyntheticPort::new(), config.sync_config(), "synthetic")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_source_yields_full_rotation() {
        let mut source = open_synthetic(&SerialConfig::default());
        let packets = source.gather_rotation().unwrap();

        assert_eq!(packets.len(), 90);
        assert_eq!(packets[0].rpm(), 256);
        assert_eq!(packets[89].index(), 89);
        assert_eq!(source.stats().packets_read, 90);
        assert_eq!(source.name(), "synthetic");
    }

    #[test]
    fn test_synthetic_port_is_paced() {
        let mut source = open_synthetic(&SerialConfig::default());
        source.gather_rotation().unwrap();

        // the second rotation cannot start before the first period is over
        let started = Instant::now();
        source.gather_rotation().unwrap();
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn test_missing_port_fails_to_open() {
        let config = SerialConfig {
            port: "/dev/does-not-exist-lidar".to_string(),
            ..SerialConfig::default()
        };
        assert!(open_serial(&config).is_err());
    }
}

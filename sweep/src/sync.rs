/*!
Byte-stream frame synchronization.

The synchronizer is a small state machine fed one byte at a time. It looks
for a two-byte header `FA, A0+slice`. A marker followed by anything other
than an index byte is not discarded as a pair: the second byte is examined
again as a possible marker, so a false marker never swallows a real one.

[`PacketReader`] owns the byte source and pulls bytes into the state machine
until the expected slice's header is found, bounded by a wall-clock timeout
and a byte limit. Once a rotation has started, a header for any other slice
means the expected slice was lost. That header is held for the slice it
belongs to, so one damaged packet costs one slice and never pulls packets
from the next sweep into the current rotation.
*/

use crate::error::{DecodeError, SweepError, SyncError};
use crate::packet::Packet;
use crate::protocol::{
    header_for_slice, INDEX_OFFSET, MARKER, PACKET_SIZE_BYTES, PAYLOAD_SIZE_BYTES,
    SLICES_PER_ROTATION,
};
use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Synchronization state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSyncState {
    /// Scanning for the marker byte
    WaitingForMarker,
    /// Marker seen, next byte must be an index byte
    MarkerSeen,
    /// Header found, payload follows
    Synchronized,
}

/// Header scanner
pub struct FrameSynchronizer {
    state: FrameSyncState,
    bytes_scanned: usize,
    false_markers: u64,
}

impl FrameSynchronizer {
    pub fn new() -> Self {
        Self {
            state: FrameSyncState::WaitingForMarker,
            bytes_scanned: 0,
            false_markers: 0,
        }
    }

    pub fn state(&self) -> FrameSyncState {
        self.state
    }

    /// Bytes consumed since the last reset
    pub fn bytes_scanned(&self) -> usize {
        self.bytes_scanned
    }

    /// Markers that were not followed by an index byte
    pub fn false_markers(&self) -> u64 {
        self.false_markers
    }

    /// Process one byte. Returns the slice whose header this byte completed.
    pub fn push(&mut self, byte: u8) -> Option<u8> {
        self.bytes_scanned += 1;

        let (state, found) = match self.state {
            FrameSyncState::WaitingForMarker | FrameSyncState::Synchronized => {
                if byte == MARKER {
                    (FrameSyncState::MarkerSeen, None)
                } else {
                    (FrameSyncState::WaitingForMarker, None)
                }
            }
            FrameSyncState::MarkerSeen => match slice_of_index(byte) {
                Some(slice) => (FrameSyncState::Synchronized, Some(slice)),
                None => {
                    self.false_markers += 1;
                    trace!("false marker, got {:#04x} after marker", byte);
                    // the second byte may itself start the real header
                    if byte == MARKER {
                        (FrameSyncState::MarkerSeen, None)
                    } else {
                        (FrameSyncState::WaitingForMarker, None)
                    }
                }
            },
        };

        self.state = state;
        found
    }
}

impl Default for FrameSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Slice number carried by an index byte, if it is one
fn slice_of_index(byte: u8) -> Option<u8> {
    byte.checked_sub(INDEX_OFFSET)
        .filter(|slice| *slice < SLICES_PER_ROTATION)
}

/// Bounds on a single header search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
    /// Give up on a slice after this long without finding its header
    pub timeout: Duration,
    /// Give up on a slice after scanning this many bytes
    pub max_scan_bytes: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            // one rotation at the slowest usable spin is ~300ms
            timeout: Duration::from_millis(500),
            // two full rotations of packets, only reachable on the first slice
            max_scan_bytes: 2 * 90 * PACKET_SIZE_BYTES,
        }
    }
}

/// Reader statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub packets_read: u64,
    pub bytes_skipped: u64,
    pub false_markers: u64,
    pub checksum_mismatches: u64,
    pub sync_failures: u64,
    pub decode_failures: u64,
}

/// Exclusive owner of a byte source, producing one packet per request
pub struct PacketReader<R> {
    source: R,
    config: SyncConfig,
    stats: ReaderStats,
    /// Header already consumed while looking for an earlier slice
    held: Option<u8>,
}

impl<R: Read> PacketReader<R> {
    pub fn new(source: R, config: SyncConfig) -> Self {
        Self {
            source,
            config,
            stats: ReaderStats::default(),
            held: None,
        }
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Give the byte source back
    pub fn into_inner(self) -> R {
        self.source
    }

    /// Scan the source until the header for `slice` has been consumed.
    ///
    /// Slice 0 starts a rotation and skips the headers of any partial sweep.
    /// For later slices, a header for another slice ends the search with
    /// [`SyncError::Missed`] and is kept for the slice it belongs to.
    pub fn synchronize(&mut self, slice: u8) -> Result<(), SyncError> {
        if let Some(found) = self.held.take() {
            if found == slice {
                return Ok(());
            }
            if slice != 0 {
                self.held = Some(found);
                self.stats.sync_failures += 1;
                return Err(SyncError::Missed { slice, found });
            }
            trace!("dropping held header of slice {} at rotation start", found);
        }

        let mut sync = FrameSynchronizer::new();
        let started = Instant::now();
        let mut byte = [0u8; 1];

        let result = loop {
            if sync.bytes_scanned() >= self.config.max_scan_bytes {
                break Err(SyncError::ScanLimit {
                    slice,
                    scanned: sync.bytes_scanned(),
                });
            }
            if started.elapsed() >= self.config.timeout {
                break Err(SyncError::Timeout {
                    slice,
                    waited: started.elapsed(),
                });
            }

            match self.source.read(&mut byte) {
                Ok(0) => break Err(SyncError::EndOfStream { slice }),
                Ok(_) => match sync.push(byte[0]) {
                    Some(found) if found == slice => break Ok(()),
                    Some(found) if slice != 0 => {
                        self.held = Some(found);
                        break Err(SyncError::Missed { slice, found });
                    }
                    _ => {}
                },
                // a transport read timeout just means no byte yet
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => break Err(SyncError::Io(e)),
            }
        };

        self.stats.false_markers += sync.false_markers();
        let header_bytes = if self.held.is_some() || result.is_ok() { 2 } else { 0 };
        self.stats.bytes_skipped += (sync.bytes_scanned() - header_bytes) as u64;
        if let Err(e) = &result {
            self.stats.sync_failures += 1;
            debug!("sync failed: {}", e);
        }
        result
    }

    /// Synchronize on `slice`, read the rest of the block and decode it
    pub fn read_packet(&mut self, slice: u8) -> Result<Packet, SweepError> {
        self.synchronize(slice)?;

        let mut block = [0u8; PACKET_SIZE_BYTES];
        block[..2].copy_from_slice(&header_for_slice(slice));
        let got = self.read_payload(&mut block[2..])?;
        if got < PAYLOAD_SIZE_BYTES {
            self.stats.decode_failures += 1;
            return Err(DecodeError::ShortRead {
                expected: PACKET_SIZE_BYTES,
                got: got + 2,
            }
            .into());
        }

        let packet = Packet::decode(&block).map_err(|e| {
            self.stats.decode_failures += 1;
            e
        })?;

        if !packet.checksum_ok() {
            self.stats.checksum_mismatches += 1;
            debug!(
                "slice {} checksum mismatch: carried {:#06x}, computed {:#06x}",
                slice,
                packet.checksum(),
                packet.computed_checksum()
            );
        }
        self.stats.packets_read += 1;
        Ok(packet)
    }

    /// Read slices 0..89 of one sweep in order.
    ///
    /// A slice whose header is missing or whose block fails to decode is
    /// skipped, so the result may hold fewer than 90 packets. The rotation
    /// ends early when the next sweep's header turns up, or when the source
    /// stays quiet for a whole sync timeout. End of stream and transport
    /// errors are returned.
    pub fn gather_rotation(&mut self) -> Result<Vec<Packet>, SweepError> {
        let mut packets = Vec::with_capacity(usize::from(SLICES_PER_ROTATION));
        for slice in 0..SLICES_PER_ROTATION {
            match self.read_packet(slice) {
                Ok(packet) => packets.push(packet),
                Err(SweepError::Sync(SyncError::Missed { found, .. })) if found < slice => {
                    debug!("sweep cut short at slice {}, next header is slice {}", slice, found);
                    break;
                }
                Err(SweepError::Sync(SyncError::Timeout { waited, .. })) => {
                    debug!("no data for {:?} at slice {}, ending rotation", waited, slice);
                    break;
                }
                Err(e) if e.is_slice_local() => {
                    debug!("skipping slice {}: {}", slice, e);
                }
                Err(e) => return Err(e),
            }
        }
        trace!("gathered {} packets", packets.len());
        Ok(packets)
    }

    /// Fill `buf` until full, end of stream, or the sync timeout elapses.
    fn read_payload(&mut self, buf: &mut [u8]) -> Result<usize, SyncError> {
        let started = Instant::now();
        let mut filled = 0;
        while filled < buf.len() && started.elapsed() < self.config.timeout {
            match self.source.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(SyncError::Io(e)),
            }
        }
        Ok(filled)
    }
}

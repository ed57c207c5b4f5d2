/*!
# Sweep

Range data processing for a spinning serial rangefinder (Neato XV-11 style).
Raw serial bytes become typed packets, packets become one filtered rotation,
and the rotation is reduced to the navigation primitives a robot controller
consumes.

## Core Types

- [`Reading`] - one heading's range/quality sample
- [`Packet`] - one decoded 4-degree slice
- [`Rotation`] - an ordered, deduplicated sweep with polar and cartesian views
- [`Wall`] - the projected result of the wall detector

## Modules

- [`reading`] - per-heading samples and their error/warning flags
- [`packet`] - 22-byte packet decoding and checksum
- [`sync`] - byte-stream frame synchronization and packet reading
- [`rotation`] - rotation assembly
- [`geometry`] - trig conversions, r² and line-fit accumulation
- [`analyzer`] - range-at-heading query
- [`wall`] - recursive colinearity search for wall segments
- [`messages`] - outbound/inbound robot message documents
- [`export`] - flat snapshot format
- [`error`] - common error types
*/

pub mod analyzer;
pub mod error;
pub mod export;
pub mod geometry;
pub mod messages;
pub mod packet;
pub mod reading;
pub mod rotation;
pub mod sync;
pub mod wall;

// Re-export commonly used types
pub use analyzer::{range_at_heading, HeadingWindow, RangeAtHeading};
pub use error::{DecodeError, Result, SweepError, SyncError};
pub use geometry::{PolarPoint, Point2};
pub use packet::Packet;
pub use reading::Reading;
pub use rotation::{Rotation, RotationConfig};
pub use sync::{FrameSynchronizer, PacketReader, SyncConfig};
pub use wall::{find_segment, find_wall, Wall, WallConfig, WallSegment};

/// Version information for the sweep library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol constants
pub mod protocol {
    /// First byte of every packet
    pub const MARKER: u8 = 0xFA;

    /// Offset added to the slice number in the second byte
    pub const INDEX_OFFSET: u8 = 0xA0;

    /// Size of a packet on the wire in bytes
    pub const PACKET_SIZE_BYTES: usize = 22;

    /// Bytes following the two-byte header
    pub const PAYLOAD_SIZE_BYTES: usize = PACKET_SIZE_BYTES - 2;

    /// Number of 4-degree slices in one rotation
    pub const SLICES_PER_ROTATION: u8 = 90;

    /// Readings carried by each packet
    pub const READINGS_PER_PACKET: usize = 4;

    /// Speed is reported in 64ths of an RPM
    pub const SPEED_UNITS_PER_RPM: f64 = 64.0;

    pub const MM_PER_INCH: f64 = 25.4;

    /// Range reported in inches for a reading flagged as error or warning
    pub const DISCARD_RANGE_INCHES: f64 = 777.0;

    /// Body of the synthetic packet fixture, everything after the header
    pub const SYNTHETIC_PAYLOAD_HEX: &str = "0040FE002200FC014400F803660077808800ABCD";

    /// Header byte pair expected for a slice
    pub fn header_for_slice(slice: u8) -> [u8; 2] {
        [MARKER, INDEX_OFFSET.wrapping_add(slice)]
    }

    /// Build the synthetic fixture packet for a slice.
    ///
    /// The fixture stands in for hardware: it decodes exactly like a real
    /// packet with the same index.
    pub fn synthetic_packet(slice: u8) -> [u8; PACKET_SIZE_BYTES] {
        let mut bytes = [0u8; PACKET_SIZE_BYTES];
        bytes[..2].copy_from_slice(&header_for_slice(slice));
        // The payload constant is valid hex of exactly PAYLOAD_SIZE_BYTES bytes
        if let Ok(payload) = hex::decode(SYNTHETIC_PAYLOAD_HEX) {
            bytes[2..].copy_from_slice(&payload);
        }
        bytes
    }
}

/*!
Packet decoding.

A packet is a fixed 22-byte little-endian block covering one 4-degree slice:

```text
FA  A0+i  speed(u16)  [dist(u16) strength(u16)] x 4  checksum(u16)
```
*/

use crate::error::DecodeError;
use crate::protocol::{
    INDEX_OFFSET, MARKER, PACKET_SIZE_BYTES, READINGS_PER_PACKET, SLICES_PER_ROTATION,
    SPEED_UNITS_PER_RPM,
};
use crate::reading::Reading;
use std::fmt;

/// One decoded slice: four consecutive readings and the spin speed
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    index: u8,
    speed_raw: u16,
    readings: [Reading; READINGS_PER_PACKET],
    checksum: u16,
    computed_checksum: u16,
}

impl Packet {
    /// Decode a packet from a framed block.
    ///
    /// A checksum mismatch does not reject the packet; see [`Packet::checksum_ok`].
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < PACKET_SIZE_BYTES {
            return Err(DecodeError::ShortRead {
                expected: PACKET_SIZE_BYTES,
                got: bytes.len(),
            });
        }
        if bytes[0] != MARKER {
            return Err(DecodeError::BadMarker(bytes[0]));
        }
        let index = bytes[1]
            .checked_sub(INDEX_OFFSET)
            .filter(|index| *index < SLICES_PER_ROTATION)
            .ok_or(DecodeError::BadIndex(bytes[1]))?;

        let word = |offset: usize| u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);

        let base_heading = u16::from(index) * READINGS_PER_PACKET as u16;
        let readings = std::array::from_fn(|i| {
            let offset = 4 + i * 4;
            Reading::new(base_heading + i as u16, word(offset), word(offset + 2))
        });

        Ok(Self {
            index,
            speed_raw: word(2),
            readings,
            checksum: word(20),
            computed_checksum: compute_checksum(&bytes[..PACKET_SIZE_BYTES]),
        })
    }

    /// Encode slice data into a wire block with a computed checksum.
    ///
    /// `samples` holds `(distance word, strength)` pairs for the four headings.
    pub fn encode(
        index: u8,
        speed_raw: u16,
        samples: [(u16, u16); READINGS_PER_PACKET],
    ) -> [u8; PACKET_SIZE_BYTES] {
        let mut bytes = [0u8; PACKET_SIZE_BYTES];
        bytes[0] = MARKER;
        bytes[1] = INDEX_OFFSET.wrapping_add(index);
        bytes[2..4].copy_from_slice(&speed_raw.to_le_bytes());
        for (i, (distance, strength)) in samples.iter().enumerate() {
            let offset = 4 + i * 4;
            bytes[offset..offset + 2].copy_from_slice(&distance.to_le_bytes());
            bytes[offset + 2..offset + 4].copy_from_slice(&strength.to_le_bytes());
        }
        let checksum = compute_checksum(&bytes);
        bytes[20..22].copy_from_slice(&checksum.to_le_bytes());
        bytes
    }

    /// Slice index, 0..90
    pub fn index(&self) -> u8 {
        self.index
    }

    /// Spin speed in 64ths of an RPM
    pub fn speed_raw(&self) -> u16 {
        self.speed_raw
    }

    pub fn rpm(&self) -> u32 {
        (f64::from(self.speed_raw) / SPEED_UNITS_PER_RPM).round() as u32
    }

    pub fn readings(&self) -> &[Reading; READINGS_PER_PACKET] {
        &self.readings
    }

    /// Checksum word carried by the packet
    pub fn checksum(&self) -> u16 {
        self.checksum
    }

    /// Checksum computed over the first twenty bytes
    pub fn computed_checksum(&self) -> u16 {
        self.computed_checksum
    }

    /// Informational only; the algorithm has not been validated against
    /// captured hardware data, so a mismatch never rejects a packet.
    pub fn checksum_ok(&self) -> bool {
        self.checksum == self.computed_checksum
    }

    /// The four readings in flat log format
    pub fn as_data(&self) -> String {
        self.readings
            .iter()
            .map(|r| format!("{}, {:.1}\n", r.heading(), r.range_inches()))
            .collect()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.index, self.rpm())?;
        for reading in &self.readings {
            write!(f, " {:.2}", reading.range_inches())?;
        }
        Ok(())
    }
}

/// Fold the ten little-endian words preceding the checksum.
///
/// Each word is added after left-shifting the accumulator, then the result
/// is wrapped around and truncated to 15 bits.
pub fn compute_checksum(bytes: &[u8]) -> u16 {
    let acc = bytes
        .chunks_exact(2)
        .take(10)
        .map(|pair| u32::from(u16::from_le_bytes([pair[0], pair[1]])))
        .fold(0u32, |acc, word| (acc << 1) + word);

    let wrapped = (acc & 0x7FFF) + (acc >> 15);
    (wrapped & 0x7FFF) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::synthetic_packet;
    use approx::assert_relative_eq;

    const FIXTURE: &str = "FAA50040FE002200FC014400F803660077808800ABCD";

    #[test]
    fn test_fixture_decode() {
        let bytes = hex::decode(FIXTURE).unwrap();
        let packet = Packet::decode(&bytes).unwrap();

        assert_eq!(packet.index(), 5);
        assert_eq!(packet.rpm(), 256);

        let headings: Vec<u16> = packet.readings().iter().map(|r| r.heading()).collect();
        assert_eq!(headings, vec![20, 21, 22, 23]);

        let inches: Vec<f64> = packet.readings().iter().map(|r| r.range_inches()).collect();
        assert_relative_eq!(inches[0], 10.0, epsilon = 1e-9);
        assert_relative_eq!(inches[1], 20.0, epsilon = 1e-9);
        assert_relative_eq!(inches[2], 40.0, epsilon = 1e-9);
        assert_eq!(inches[3], 777.0);
        assert!(packet.readings()[3].error());

        assert_eq!(packet.to_string(), "5 256 10.00 20.00 40.00 777.00");
        assert_eq!(packet.as_data(), "20, 10.0\n21, 20.0\n22, 40.0\n23, 777.0\n");
    }

    #[test]
    fn test_synthetic_fixture_matches_hex() {
        let from_hex = Packet::decode(&hex::decode(FIXTURE).unwrap()).unwrap();
        let synthetic = Packet::decode(&synthetic_packet(5)).unwrap();
        assert_eq!(from_hex, synthetic);
    }

    #[test]
    fn test_checksum_mismatch_is_informational() {
        let packet = Packet::decode(&synthetic_packet(0)).unwrap();
        assert_eq!(packet.checksum(), 0xCDAB);
        assert!(!packet.checksum_ok());
    }

    #[test]
    fn test_checksum_fold() {
        // ten words of 1: acc = 2^10 - 1 = 1023, below 15 bits
        let bytes: Vec<u8> = std::iter::repeat([1u8, 0u8]).take(11).flatten().collect();
        assert_eq!(compute_checksum(&bytes), 1023);

        // all ones overflow 15 bits and wrap around
        let bytes = [0xFFu8; 22];
        let acc: u32 = 0xFFFF * ((1 << 10) - 1);
        let expected = (((acc & 0x7FFF) + (acc >> 15)) & 0x7FFF) as u16;
        assert_eq!(compute_checksum(&bytes), expected);
    }

    #[test]
    fn test_encoded_packet_passes_checksum() {
        let bytes = Packet::encode(89, 300 * 64, [(1000, 10), (0x8000, 0), (2000, 5), (3000, 1)]);
        let packet = Packet::decode(&bytes).unwrap();
        assert!(packet.checksum_ok());
        assert_eq!(packet.index(), 89);
        assert_eq!(packet.rpm(), 300);
        assert_eq!(packet.readings()[3].heading(), 359);
    }

    #[test]
    fn test_decode_errors() {
        let bytes = synthetic_packet(5);
        assert_eq!(
            Packet::decode(&bytes[..10]),
            Err(DecodeError::ShortRead { expected: 22, got: 10 })
        );

        let mut bad_marker = bytes;
        bad_marker[0] = 0xFB;
        assert_eq!(Packet::decode(&bad_marker), Err(DecodeError::BadMarker(0xFB)));

        let mut bad_index = bytes;
        bad_index[1] = 0xA0 + 90;
        assert_eq!(Packet::decode(&bad_index), Err(DecodeError::BadIndex(0xFA)));
    }

    #[test]
    fn test_rpm_rounding() {
        let bytes = Packet::encode(0, 64 * 250 + 40, [(0, 0); 4]);
        assert_eq!(Packet::decode(&bytes).unwrap().rpm(), 251);
    }
}

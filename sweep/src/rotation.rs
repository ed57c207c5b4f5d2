/*!
Rotation assembly.

A [`Rotation`] is built once from the packets gathered during one sweep and
is immutable afterwards, so it can be shared between consumers behind an
`Arc` without synchronization.
*/

use crate::geometry::{Point2, PolarPoint};
use crate::packet::Packet;
use crate::protocol::{DISCARD_RANGE_INCHES, SLICES_PER_ROTATION};
use crate::reading::Reading;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Angular window kept by the assembler, half-open `[start, stop)` in
/// signed degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationConfig {
    pub start: i32,
    pub stop: i32,
}

impl RotationConfig {
    pub fn contains(&self, heading: i32) -> bool {
        heading >= self.start && heading < self.stop
    }
}

impl Default for RotationConfig {
    /// -90..=+90, left to right
    fn default() -> Self {
        Self {
            start: -90,
            stop: 91,
        }
    }
}

/// One sweep of readings, ordered by heading and deduplicated
#[derive(Debug, Clone, PartialEq)]
pub struct Rotation {
    view: Vec<PolarPoint>,
    rpm: u32,
    packet_count: usize,
}

impl Rotation {
    /// Assemble a rotation from the packets of one sweep.
    ///
    /// Fewer than the nominal 90 packets is fine; the view just has gaps.
    pub fn from_packets(packets: &[Packet], config: &RotationConfig) -> Self {
        if packets.len() != usize::from(SLICES_PER_ROTATION) {
            debug!(
                "assembling partial rotation: {} of {} packets",
                packets.len(),
                SLICES_PER_ROTATION
            );
        }

        let readings: Vec<Reading> = packets
            .iter()
            .flat_map(|p| p.readings().iter().copied())
            .collect();

        Self {
            view: assemble_view(&readings, config),
            rpm: packets.first().map(Packet::rpm).unwrap_or(0),
            packet_count: packets.len(),
        }
    }

    /// Build a rotation from a polar view, e.g. a snapshot file. The same
    /// window, discard, ordering and dedup rules apply.
    pub fn from_polar(points: Vec<PolarPoint>, rpm: u32, config: &RotationConfig) -> Self {
        let mut view: Vec<PolarPoint> = points
            .into_iter()
            .filter(|p| p.range.is_finite() && p.range < DISCARD_RANGE_INCHES)
            .filter(|p| config.contains(p.heading))
            .collect();
        view.sort_by_key(|p| p.heading);
        view.dedup_by(|later, kept| {
            if later.heading != kept.heading {
                return false;
            }
            if later.range < kept.range {
                kept.range = later.range;
            }
            true
        });
        Self {
            view,
            rpm,
            packet_count: 0,
        }
    }

    /// (heading, range in inches) pairs, ascending heading
    pub fn polar(&self) -> &[PolarPoint] {
        &self.view
    }

    /// Cartesian view, derived from the polar view on every call
    pub fn cartesian(&self) -> Vec<Point2> {
        self.view.iter().map(PolarPoint::to_cartesian).collect()
    }

    /// Spin speed of the first packet, taken as the speed of the whole sweep
    pub fn rpm(&self) -> u32 {
        self.rpm
    }

    /// Packets the rotation was assembled from
    pub fn packet_count(&self) -> usize {
        self.packet_count
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.view.is_empty()
    }

    /// Time one revolution takes at the reported speed
    pub fn period(&self) -> Option<Duration> {
        (self.rpm > 0).then(|| Duration::from_secs_f64(60.0 / f64::from(self.rpm)))
    }
}

/// Sort, filter, window and deduplicate readings into a polar view.
///
/// On a heading collision the nearer reading wins: a near surface occludes
/// anything behind it, so averaging would invent geometry.
fn assemble_view(readings: &[Reading], config: &RotationConfig) -> Vec<PolarPoint> {
    let mut kept: Vec<&Reading> = readings
        .iter()
        .filter(|r| !r.discard())
        .filter(|r| config.contains(r.signed_heading()))
        .collect();
    kept.sort_by_key(|r| r.signed_heading());

    let mut view: Vec<PolarPoint> = Vec::with_capacity(kept.len());
    for reading in kept {
        let point = PolarPoint::new(reading.signed_heading(), reading.range_inches());
        match view.last_mut() {
            Some(last) if last.heading == point.heading => {
                if point.range < last.range {
                    *last = point;
                }
            }
            _ => view.push(point),
        }
    }
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::synthetic_packet;
    use approx::assert_relative_eq;

    /// Packet whose four readings all sit at `mm`
    fn packet_at(index: u8, mm: u16) -> Packet {
        Packet::decode(&Packet::encode(index, 250 * 64, [(mm, 10); 4])).unwrap()
    }

    fn full_rotation(mm: u16) -> Vec<Packet> {
        (0..90).map(|i| packet_at(i, mm)).collect()
    }

    #[test]
    fn test_default_window_left_to_right() {
        let rotation = Rotation::from_packets(&full_rotation(254), &RotationConfig::default());
        let headings: Vec<i32> = rotation.polar().iter().map(|p| p.heading).collect();

        assert_eq!(rotation.len(), 181);
        assert_eq!(headings.first(), Some(&-90));
        assert_eq!(headings.last(), Some(&90));
        assert!(headings.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(rotation.rpm(), 250);
        assert_eq!(rotation.packet_count(), 90);
    }

    #[test]
    fn test_discards_dropped() {
        let packets: Vec<Packet> = (0..90).map(|i| Packet::decode(&synthetic_packet(i)).unwrap()).collect();
        let rotation = Rotation::from_packets(&packets, &RotationConfig::default());
        assert!(rotation.polar().iter().all(|p| p.range < 777.0));
        // every fourth heading carries the error flag in the fixture
        assert!(rotation.polar().iter().all(|p| p.heading.rem_euclid(4) != 3));
    }

    #[test]
    fn test_duplicate_heading_keeps_nearest() {
        let packets = vec![packet_at(2, 2540), packet_at(2, 508), packet_at(2, 1016)];
        let rotation = Rotation::from_packets(&packets, &RotationConfig::default());

        assert_eq!(rotation.len(), 4);
        for point in rotation.polar() {
            assert_relative_eq!(point.range, 20.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_partial_and_empty_input() {
        let rotation = Rotation::from_packets(&[packet_at(0, 254)], &RotationConfig::default());
        assert_eq!(rotation.len(), 4);

        let empty = Rotation::from_packets(&[], &RotationConfig::default());
        assert!(empty.is_empty());
        assert_eq!(empty.rpm(), 0);
        assert_eq!(empty.period(), None);
    }

    #[test]
    fn test_custom_window() {
        let config = RotationConfig { start: -10, stop: 11 };
        let rotation = Rotation::from_packets(&full_rotation(254), &config);
        assert_eq!(rotation.len(), 21);
        assert_eq!(rotation.polar()[0].heading, -10);
    }

    #[test]
    fn test_cartesian_view() {
        let rotation = Rotation::from_packets(&[packet_at(0, 254)], &RotationConfig::default());
        let cart = rotation.cartesian();
        assert_eq!(cart.len(), rotation.len());
        assert_relative_eq!(cart[0].x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(cart[0].y, 0.0, epsilon = 1e-9);
        // heading 1 is slightly to the right
        assert!(cart[1].y < 0.0);
    }

    #[test]
    fn test_period() {
        let rotation = Rotation::from_packets(&[packet_at(0, 254)], &RotationConfig::default());
        assert_relative_eq!(rotation.period().unwrap().as_secs_f64(), 0.24, epsilon = 1e-9);
    }

    #[test]
    fn test_from_polar_sorts_and_dedups() {
        let rotation = Rotation::from_polar(
            vec![
                PolarPoint::new(5, 30.0),
                PolarPoint::new(-5, 12.0),
                PolarPoint::new(5, 20.0),
            ],
            0,
            &RotationConfig::default(),
        );
        assert_eq!(rotation.polar(), &[PolarPoint::new(-5, 12.0), PolarPoint::new(5, 20.0)]);
    }

    #[test]
    fn test_from_polar_applies_window_and_discards() {
        let rotation = Rotation::from_polar(
            vec![
                PolarPoint::new(-120, 30.0),
                PolarPoint::new(-90, 31.0),
                PolarPoint::new(0, 777.0),
                PolarPoint::new(10, f64::NAN),
                PolarPoint::new(90, 32.0),
                PolarPoint::new(91, 33.0),
            ],
            0,
            &RotationConfig::default(),
        );
        assert_eq!(rotation.polar(), &[PolarPoint::new(-90, 31.0), PolarPoint::new(90, 32.0)]);
    }
}

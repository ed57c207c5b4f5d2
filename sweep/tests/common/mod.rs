//! Synthetic field model for scenario tests.
//!
//! A robot stands at a pose among straight wall segments. Casting one ray per
//! whole degree of sensor heading yields the packets the sensor would send,
//! with ranges quantized to whole millimetres like the real device.

#![allow(dead_code)]

use sweep::protocol::{MM_PER_INCH, SLICES_PER_ROTATION};
use sweep::{Packet, Rotation, RotationConfig};

/// Raw distance word for a reading the sensor could not range
const NO_RETURN: u16 = 0x8000;

/// Robot position in inches and heading in degrees, clockwise from +x.
///
/// World frame matches the robot frame at the origin: x forward, y left.
#[derive(Debug, Clone, Copy)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    pub fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// Straight wall between two world points, inches
#[derive(Debug, Clone, Copy)]
pub struct Segment {
    pub a: (f64, f64),
    pub b: (f64, f64),
}

impl Segment {
    pub fn new(a: (f64, f64), b: (f64, f64)) -> Self {
        Self { a, b }
    }

    pub fn length(&self) -> f64 {
        (self.b.0 - self.a.0).hypot(self.b.1 - self.a.1)
    }
}

fn cross(u: (f64, f64), v: (f64, f64)) -> f64 {
    u.0 * v.1 - u.1 * v.0
}

/// Distance along a ray to the nearest wall, if any
pub fn cast(pose: &Pose, sensor_heading: f64, walls: &[Segment]) -> Option<f64> {
    let theta = -(pose.heading + sensor_heading).to_radians();
    let dir = (theta.cos(), theta.sin());

    walls
        .iter()
        .filter_map(|wall| {
            let edge = (wall.b.0 - wall.a.0, wall.b.1 - wall.a.1);
            let denom = cross(dir, edge);
            if denom.abs() < 1e-12 {
                return None;
            }
            let rel = (wall.a.0 - pose.x, wall.a.1 - pose.y);
            let s = cross(rel, edge) / denom;
            let t = cross(rel, dir) / denom;
            (s > 0.0 && (0.0..=1.0).contains(&t)).then_some(s)
        })
        .min_by(|a, b| a.total_cmp(b))
}

/// Wire blocks for one full rotation seen from `pose`
pub fn encode_scan(pose: &Pose, walls: &[Segment], rpm: u16) -> Vec<[u8; 22]> {
    (0..SLICES_PER_ROTATION)
        .map(|index| {
            let mut samples = [(NO_RETURN, 0u16); 4];
            for (k, sample) in samples.iter_mut().enumerate() {
                let heading = f64::from(index) * 4.0 + k as f64;
                if let Some(range) = cast(pose, heading, walls) {
                    let mm = (range * MM_PER_INCH).round();
                    if mm < f64::from(0x3FFF) {
                        *sample = (mm as u16, 200);
                    }
                }
            }
            Packet::encode(index, rpm * 64, samples)
        })
        .collect()
}

/// Decoded packets for one full rotation seen from `pose`
pub fn scan(pose: &Pose, walls: &[Segment], rpm: u16) -> Vec<Packet> {
    encode_scan(pose, walls, rpm)
        .iter()
        .map(|bytes| Packet::decode(bytes).expect("encoded packet decodes"))
        .collect()
}

/// Assembled rotation seen from `pose` with the default window
pub fn rotation_at(pose: &Pose, walls: &[Segment]) -> Rotation {
    Rotation::from_packets(&scan(pose, walls, 250), &RotationConfig::default())
}

/// A wall square across the path, `distance` inches ahead of the origin
pub fn facing_wall(distance: f64) -> Segment {
    Segment::new((distance, 200.0), (distance, -200.0))
}

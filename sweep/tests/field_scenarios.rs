//! End-to-end scenarios: a simulated room goes through packets, rotation
//! assembly and both analysers.

mod common;

use approx::assert_relative_eq;
use common::{encode_scan, facing_wall, rotation_at, Pose, Segment};
use std::io::Cursor;
use sweep::{
    export, find_segment, find_wall, range_at_heading, HeadingWindow, PacketReader, Rotation,
    RotationConfig, SyncConfig, WallConfig,
};
use tempfile::TempDir;

/// Oblique wall from front-left to front-right, about 72 inches long
fn oblique_wall() -> Segment {
    Segment::new((60.0, 40.0), (100.0, -20.0))
}

#[test]
fn range_at_heading_finds_wall_ahead() {
    let rotation = rotation_at(&Pose::origin(), &[facing_wall(120.0)]);
    let hit = range_at_heading(rotation.polar(), &HeadingWindow::default());

    assert_relative_eq!(hit.range, 120.0, epsilon = 1e-9);
    // one degree either side rounds to the same millimetre
    assert!(hit.heading.abs() <= 1, "heading {}", hit.heading);
}

#[test]
fn range_at_heading_tracks_forward_motion() {
    let walls = [facing_wall(120.0)];
    let window = HeadingWindow::default();

    let before = range_at_heading(rotation_at(&Pose::origin(), &walls).polar(), &window);
    let after = range_at_heading(rotation_at(&Pose::new(100.0, 0.0, 0.0), &walls).polar(), &window);

    assert_relative_eq!(before.range - after.range, 100.0, epsilon = 1e-9);
}

#[test]
fn range_at_heading_respects_narrow_window() {
    let rotation = rotation_at(&Pose::origin(), &[facing_wall(120.0)]);
    let window = HeadingWindow::new(30, 41).unwrap();
    let hit = range_at_heading(rotation.polar(), &window);

    assert_eq!(hit.heading, 30);
    assert_relative_eq!(hit.range, 120.0 / 30f64.to_radians().cos(), epsilon = 0.05);
}

#[test]
fn range_at_heading_empty_room_returns_sentinel() {
    let rotation = rotation_at(&Pose::origin(), &[]);
    assert!(rotation.is_empty());
    assert!(range_at_heading(rotation.polar(), &HeadingWindow::default()).is_none());
}

#[test]
fn wall_magnitude_matches_oblique_wall() {
    let wall = oblique_wall();
    let rotation = rotation_at(&Pose::origin(), &[wall]);
    let segment = find_segment(&rotation.cartesian(), &WallConfig::default()).unwrap();

    // endpoints are sampled at whole degrees, so a little is lost at each end
    assert!(segment.magnitude <= wall.length() + 0.1);
    assert!(wall.length() - segment.magnitude < 3.0, "magnitude {}", segment.magnitude);
    assert_eq!(segment.point_count, rotation.len());
}

#[test]
fn wall_projection_in_robot_frame() {
    let rotation = rotation_at(&Pose::origin(), &[oblique_wall()]);
    let wall = find_wall(&rotation.cartesian(), &WallConfig::default());

    // the wall's normal points at -atan(2/3)
    let normal = -(2f64.atan2(3.0).to_degrees());
    assert_relative_eq!(wall.orientation, normal, epsilon = 1.0);
    // midpoint of the wall is (80, 10)
    assert_relative_eq!(wall.heading, -(10f64.atan2(80.0).to_degrees()), epsilon = 2.0);
    assert_relative_eq!(wall.distance, 80f64.hypot(10.0), epsilon = 2.0);
}

#[test]
fn wall_orientation_follows_robot_turn() {
    let walls = [oblique_wall()];
    let config = WallConfig::default();

    let straight = find_wall(&rotation_at(&Pose::origin(), &walls).cartesian(), &config);
    let turned = find_wall(&rotation_at(&Pose::new(0.0, 0.0, 20.0), &walls).cartesian(), &config);

    assert_relative_eq!(straight.orientation - turned.orientation, 20.0, epsilon = 1.0);
}

#[test]
fn wall_detector_is_idempotent() {
    let rotation = rotation_at(&Pose::new(5.0, -3.0, 10.0), &[oblique_wall()]);
    let points = rotation.cartesian();
    let config = WallConfig::default();

    assert_eq!(find_wall(&points, &config), find_wall(&points, &config));
}

#[test]
fn sliver_of_wall_returns_sentinel() {
    // spans three whole-degree headings
    let sliver = Segment::new((100.0, 2.0), (98.0, -3.0));
    let rotation = rotation_at(&Pose::origin(), &[sliver]);

    assert_eq!(rotation.len(), 3);
    assert!(find_wall(&rotation.cartesian(), &WallConfig::default()).is_none());
}

#[test]
fn byte_stream_assembles_same_rotation() {
    let pose = Pose::origin();
    let walls = [oblique_wall(), facing_wall(150.0)];

    let mut stream = vec![0x00, 0xFA, 0x13];
    for block in encode_scan(&pose, &walls, 250) {
        stream.extend_from_slice(&block);
    }

    let mut reader = PacketReader::new(Cursor::new(stream), SyncConfig::default());
    let packets = reader.gather_rotation().unwrap();
    assert_eq!(packets.len(), 90);
    assert_eq!(reader.stats().checksum_mismatches, 0);

    let from_stream = Rotation::from_packets(&packets, &RotationConfig::default());
    assert_eq!(from_stream, rotation_at(&pose, &walls));
    assert_eq!(from_stream.rpm(), 250);
}

#[test]
fn snapshot_replays_to_same_answer() {
    let dir = TempDir::new().unwrap();
    let rotation = rotation_at(&Pose::origin(), &[oblique_wall()]);
    let path = export::snapshot_path(dir.path(), 1);
    export::write_snapshot(&path, rotation.polar()).unwrap();

    let replayed = Rotation::from_polar(
        export::read_snapshot(&path).unwrap(),
        0,
        &RotationConfig::default(),
    );
    let window = HeadingWindow::default();
    let live = range_at_heading(rotation.polar(), &window);
    let again = range_at_heading(replayed.polar(), &window);

    assert_eq!(replayed.len(), rotation.len());
    assert_eq!(live.heading, again.heading);
    assert_relative_eq!(live.range, again.range, epsilon = 0.05);
}

/*!
Flat snapshot format.

One line per reading, ascending heading, one file per rotation:

```text
-90, 144.2
-89, 143.9
```

Files are named `lidar_snapshot_{n}.dat`.
*/

use crate::error::{Result, SweepError};
use crate::geometry::PolarPoint;
use crate::protocol::DISCARD_RANGE_INCHES;
use regex::Regex;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Render a polar view in the flat snapshot format
pub fn format_snapshot(polar: &[PolarPoint]) -> String {
    let mut out = String::with_capacity(polar.len() * 12);
    for point in polar {
        // writing into a String cannot fail
        let _ = writeln!(out, "{}, {:.1}", point.heading, point.range);
    }
    out
}

/// Write one rotation's polar view to `path`
pub fn write_snapshot<P: AsRef<Path>>(path: P, polar: &[PolarPoint]) -> Result<()> {
    std::fs::write(path.as_ref(), format_snapshot(polar))?;
    Ok(())
}

/// Parse snapshot text, dropping blank lines and discard sentinels
pub fn parse_snapshot(text: &str) -> Result<Vec<PolarPoint>> {
    let mut points = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (heading, range) = line
            .split_once(',')
            .ok_or_else(|| SweepError::invalid_snapshot(format!("line {}: missing comma", number + 1)))?;

        // older snapshots wrote headings with one decimal place
        let heading: f64 = heading.trim().parse().map_err(|_| {
            SweepError::invalid_snapshot(format!("line {}: bad heading {:?}", number + 1, heading))
        })?;
        let range: f64 = range.trim().parse().map_err(|_| {
            SweepError::invalid_snapshot(format!("line {}: bad range {:?}", number + 1, range))
        })?;

        let heading = heading.round();
        if !heading.is_finite() || heading <= -180.0 || heading > 180.0 {
            return Err(SweepError::invalid_snapshot(format!(
                "line {}: heading {} outside (-180, 180]",
                number + 1,
                heading
            )));
        }
        if !range.is_finite() || range < 0.0 {
            return Err(SweepError::invalid_snapshot(format!(
                "line {}: bad range {}",
                number + 1,
                range
            )));
        }

        if range < DISCARD_RANGE_INCHES {
            points.push(PolarPoint::new(heading as i32, range));
        }
    }
    Ok(points)
}

/// Read a snapshot file back into a polar view
pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<Vec<PolarPoint>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_snapshot(&text)
}

/// Path of snapshot `n` in `dir`
pub fn snapshot_path<P: AsRef<Path>>(dir: P, n: u32) -> PathBuf {
    dir.as_ref().join(format!("lidar_snapshot_{}.dat", n))
}

/// Extract the snapshot number from a file name
pub fn snapshot_number(path: &Path) -> Result<u32> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"^lidar_snapshot_(\d+)\.dat$").ok())
        .as_ref()
        .ok_or_else(|| SweepError::invalid_snapshot("snapshot name pattern"))?;

    let filename = path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| SweepError::invalid_snapshot("invalid filename"))?;

    pattern
        .captures(filename)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .ok_or_else(|| SweepError::invalid_snapshot(format!("not a snapshot file: {}", filename)))
}

/// Snapshot files in `dir`, sorted by number
pub fn list_snapshots<P: AsRef<Path>>(dir: P) -> Result<Vec<(u32, PathBuf)>> {
    let mut found: Vec<(u32, PathBuf)> = std::fs::read_dir(dir.as_ref())?
        .flatten()
        .map(|entry| entry.path())
        .filter_map(|path| snapshot_number(&path).ok().map(|n| (n, path)))
        .collect();
    found.sort_by_key(|(n, _)| *n);
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format() {
        let polar = vec![PolarPoint::new(-90, 144.26), PolarPoint::new(3, 10.0)];
        assert_eq!(format_snapshot(&polar), "-90, 144.3\n3, 10.0\n");
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = snapshot_path(dir.path(), 1000);
        let polar = vec![PolarPoint::new(-1, 12.5), PolarPoint::new(0, 12.0)];

        write_snapshot(&path, &polar).unwrap();
        assert_eq!(read_snapshot(&path).unwrap(), polar);
    }

    #[test]
    fn test_parse_drops_discards_and_blank_lines() {
        let text = "20, 10.0\n\n23, 777.0\n24.0, 11.5\n";
        assert_eq!(
            parse_snapshot(text).unwrap(),
            vec![PolarPoint::new(20, 10.0), PolarPoint::new(24, 11.5)]
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_snapshot("20 10.0\n").is_err());
        assert!(parse_snapshot("north, 10.0\n").is_err());
    }

    #[test]
    fn test_parse_rejects_headings_outside_rotation() {
        assert!(parse_snapshot("nan, 10.0\n").is_err());
        assert!(parse_snapshot("inf, 10.0\n").is_err());
        assert!(parse_snapshot("-180, 10.0\n").is_err());
        assert!(parse_snapshot("270, 10.0\n").is_err());
        assert!(parse_snapshot("5, NaN\n").is_err());
        assert!(parse_snapshot("5, -inf\n").is_err());
        assert_eq!(parse_snapshot("180, 10.0\n").unwrap(), vec![PolarPoint::new(180, 10.0)]);
    }

    #[test]
    fn test_snapshot_numbers() {
        assert_eq!(snapshot_number(Path::new("/tmp/x/lidar_snapshot_42.dat")).unwrap(), 42);
        assert!(snapshot_number(Path::new("lidar_snapshot_.dat")).is_err());
        assert!(snapshot_number(Path::new("notes.txt")).is_err());
    }

    #[test]
    fn test_list_sorted() {
        let dir = TempDir::new().unwrap();
        for n in [10, 2, 7] {
            write_snapshot(snapshot_path(dir.path(), n), &[]).unwrap();
        }
        std::fs::write(dir.path().join("readme.txt"), "x").unwrap();

        let numbers: Vec<u32> = list_snapshots(dir.path()).unwrap().into_iter().map(|(n, _)| n).collect();
        assert_eq!(numbers, vec![2, 7, 10]);
    }
}

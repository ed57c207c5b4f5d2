/*!
Wall detection by colinearity search.

For every start position a window of `min_window` consecutive points is
tested with r². A qualifying window grows one point at a time while the fit
stays above the threshold; the window at the point of stopping is the
segment for that start. The longest segment over all starts is the wall.

The search is O(n²) in the number of points. A rotation holds at most 181
points after windowing, so this stays cheap; `max_window` caps the growth
loop regardless.
*/

use crate::geometry::{heading_of, normalize_degrees, LineFit, Point2};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Wall detector parameters, passed per call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallConfig {
    /// Points required before a window is considered evidence of a line
    pub min_window: usize,
    /// r² a window must reach to keep growing
    pub threshold: f64,
    /// Upper bound on the number of points in one window
    pub max_window: usize,
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            min_window: 4,
            threshold: 0.7,
            max_window: 360,
        }
    }
}

/// A run of colinear points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WallSegment {
    /// Distance between the first and last point
    pub magnitude: f64,
    pub start: Point2,
    pub end: Point2,
    /// Average of the endpoints, not the centroid
    pub midpoint: Point2,
    /// `end - start`
    pub slope: Point2,
    /// Point of the window nearest the origin
    pub closest: Point2,
    pub point_count: usize,
    pub r_squared: f64,
}

impl WallSegment {
    fn from_window(window: &[Point2], r_squared: f64) -> Option<Self> {
        let (start, end) = (*window.first()?, *window.last()?);
        let closest = window
            .iter()
            .copied()
            .fold(start, |best, p| if p.norm() < best.norm() { p } else { best });

        Some(Self {
            magnitude: start.distance_to(&end),
            start,
            end,
            midpoint: start.midpoint(&end),
            slope: Point2::new(end.x - start.x, end.y - start.y),
            closest,
            point_count: window.len(),
            r_squared,
        })
    }

    /// Project the segment into the robot frame
    pub fn to_wall(&self) -> Wall {
        let raw_orientation = heading_of(self.slope.x, self.slope.y) - 90.0;
        let orientation = if raw_orientation <= -180.0 {
            raw_orientation + 360.0
        } else {
            raw_orientation
        };

        Wall {
            heading: heading_of(self.midpoint.x, self.midpoint.y),
            distance: self.midpoint.norm(),
            orientation: normalize_degrees(orientation),
        }
    }
}

/// Wall description in the robot frame, degrees clockwise positive
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Wall {
    /// Heading of the segment midpoint
    pub heading: f64,
    /// Range to the segment midpoint
    pub distance: f64,
    /// Turn that would face the robot along the wall's normal
    pub orientation: f64,
}

impl Wall {
    /// All-zero result for degenerate input.
    ///
    /// Indistinguishable from a zero-length wall straight ahead.
    pub const NONE: Wall = Wall {
        heading: 0.0,
        distance: 0.0,
        orientation: 0.0,
    };

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

/// Find the longest colinear segment in an ordered point sequence.
///
/// Returns `None` when the input is too short for fewer than two windows to
/// be evaluated, or when no window reaches the threshold.
pub fn find_segment(points: &[Point2], config: &WallConfig) -> Option<WallSegment> {
    let k = config.min_window.max(2);
    if points.len() < k {
        return None;
    }
    let cap = config.max_window.max(k);

    let mut windows_evaluated = 0usize;
    let mut best: Option<WallSegment> = None;

    for start in 0..=points.len() - k {
        let mut fit = LineFit::from_points(&points[start..start + k]);
        let mut end = start + k;
        let mut r2 = fit.r_squared();
        windows_evaluated += 1;

        if r2 < config.threshold {
            continue;
        }

        let limit = points.len().min(start + cap);
        while end < limit {
            fit.push(&points[end]);
            end += 1;
            r2 = fit.r_squared();
            windows_evaluated += 1;
            if r2 < config.threshold {
                break;
            }
        }

        if let Some(segment) = WallSegment::from_window(&points[start..end], r2) {
            if best.map_or(true, |b| segment.magnitude > b.magnitude) {
                best = Some(segment);
            }
        }
    }

    trace!(
        "wall search: {} points, {} windows, best magnitude {:?}",
        points.len(),
        windows_evaluated,
        best.map(|b| b.magnitude)
    );

    if windows_evaluated < 2 {
        return None;
    }
    best
}

/// Find the wall and project it into the robot frame, or [`Wall::NONE`].
///
/// Pure: the same input always yields the same output.
pub fn find_wall(points: &[Point2], config: &WallConfig) -> Wall {
    find_segment(points, config)
        .map(|segment| segment.to_wall())
        .unwrap_or(Wall::NONE)
}

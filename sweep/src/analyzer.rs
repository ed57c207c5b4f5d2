/*!
Nearest-obstacle query over a polar view.
*/

use crate::geometry::PolarPoint;
use serde::{Deserialize, Serialize};

/// Half-open heading window `[start, stop)` in signed degrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingWindow {
    pub start: i32,
    pub stop: i32,
}

impl HeadingWindow {
    /// A window must be non-empty and lie within one revolution
    pub fn new(start: i32, stop: i32) -> Option<Self> {
        let valid = start < stop && start >= -180 && stop <= 181;
        valid.then_some(Self { start, stop })
    }

    pub fn contains(&self, heading: i32) -> bool {
        heading >= self.start && heading < self.stop
    }
}

impl Default for HeadingWindow {
    /// Ten degrees either side of straight ahead
    fn default() -> Self {
        Self { start: -10, stop: 11 }
    }
}

/// Closest hit inside a window
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RangeAtHeading {
    pub heading: i32,
    pub range: f64,
}

impl RangeAtHeading {
    /// The `(0, 0)` result returned when nothing lies in the window.
    ///
    /// Indistinguishable from a real zero-range hit straight ahead.
    pub const NONE: RangeAtHeading = RangeAtHeading {
        heading: 0,
        range: 0.0,
    };

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }
}

/// Find the nearest point whose heading lies in `window`.
///
/// Ties keep the first point in heading order.
pub fn range_at_heading(polar: &[PolarPoint], window: &HeadingWindow) -> RangeAtHeading {
    polar
        .iter()
        .filter(|p| window.contains(p.heading))
        .fold(None, |best: Option<&PolarPoint>, p| match best {
            Some(b) if b.range <= p.range => Some(b),
            _ => Some(p),
        })
        .map(|p| RangeAtHeading {
            heading: p.heading,
            range: p.range,
        })
        .unwrap_or(RangeAtHeading::NONE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(points: &[(i32, f64)]) -> Vec<PolarPoint> {
        points.iter().map(|&(h, r)| PolarPoint::new(h, r)).collect()
    }

    #[test]
    fn test_nearest_in_window() {
        let polar = view(&[(-20, 5.0), (-3, 40.0), (0, 35.5), (4, 36.0), (10, 30.0), (11, 1.0)]);
        let hit = range_at_heading(&polar, &HeadingWindow::default());
        assert_eq!(hit, RangeAtHeading { heading: 10, range: 30.0 });
    }

    #[test]
    fn test_stop_is_exclusive() {
        let polar = view(&[(0, 50.0), (11, 1.0)]);
        let hit = range_at_heading(&polar, &HeadingWindow::default());
        assert_eq!(hit.heading, 0);
    }

    #[test]
    fn test_empty_window_returns_sentinel() {
        let polar = view(&[(-40, 10.0), (40, 10.0)]);
        let hit = range_at_heading(&polar, &HeadingWindow::default());
        assert!(hit.is_none());
        assert!(range_at_heading(&[], &HeadingWindow::default()).is_none());
    }

    #[test]
    fn test_tie_keeps_first() {
        let polar = view(&[(-2, 12.0), (3, 12.0)]);
        assert_eq!(range_at_heading(&polar, &HeadingWindow::default()).heading, -2);
    }

    #[test]
    fn test_window_validation() {
        assert!(HeadingWindow::new(-5, 6).is_some());
        assert!(HeadingWindow::new(6, 6).is_none());
        assert!(HeadingWindow::new(10, -10).is_none());
        assert!(HeadingWindow::new(-200, 0).is_none());
    }
}

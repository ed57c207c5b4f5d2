/*!
Shared numeric helpers.

## Angle convention

Headings are whole degrees with 0 straight ahead and positive values turning
clockwise (to the right), which is also how the robot measures turns. The
cartesian frame is a standard right-handed one with `x` forward and `y` to
the left, so the math angle of a point is the negated heading:

```text
x = r·cos(θ), y = r·sin(θ), θ = -heading
```

Scanning headings in ascending order therefore walks points from left to
right. Every conversion in the crate goes through [`polar_to_cartesian`] and
[`heading_of`].
*/

use serde::{Deserialize, Serialize};

/// A point in the robot-centred cartesian frame, in inches
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Distance to the origin
    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance_to(&self, other: &Point2) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Average of two points
    pub fn midpoint(&self, other: &Point2) -> Point2 {
        Point2::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// A heading/range pair from a rotation's polar view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolarPoint {
    /// Degrees, clockwise positive, in (-180, 180]
    pub heading: i32,
    /// Inches
    pub range: f64,
}

impl PolarPoint {
    pub fn new(heading: i32, range: f64) -> Self {
        Self { heading, range }
    }

    pub fn to_cartesian(&self) -> Point2 {
        polar_to_cartesian(f64::from(self.heading), self.range)
    }
}

/// Convert a heading (degrees, clockwise positive) and range to cartesian
pub fn polar_to_cartesian(heading_deg: f64, range: f64) -> Point2 {
    let theta = (-heading_deg).to_radians();
    Point2::new(range * theta.cos(), range * theta.sin())
}

/// Heading (degrees, clockwise positive) of the direction `(x, y)`
pub fn heading_of(x: f64, y: f64) -> f64 {
    -y.atan2(x).to_degrees()
}

/// Fold an angle in degrees into (-180, 180]
pub fn normalize_degrees(degrees: f64) -> f64 {
    let folded = degrees % 360.0;
    if folded <= -180.0 {
        folded + 360.0
    } else if folded > 180.0 {
        folded - 360.0
    } else {
        folded
    }
}

/// Mean distance of the points to the origin, 0 when empty
pub fn average_distance(points: &[Point2]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    points.iter().map(Point2::norm).sum::<f64>() / points.len() as f64
}

/// Running sums for the coefficient of determination.
///
/// Growing a window by one point is O(1), which keeps the wall search at
/// O(n²) rather than O(n³).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LineFit {
    n: f64,
    sum_x: f64,
    sum_y: f64,
    sum_xy: f64,
    sum_xx: f64,
    sum_yy: f64,
}

impl LineFit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: &[Point2]) -> Self {
        let mut fit = Self::new();
        points.iter().for_each(|p| fit.push(p));
        fit
    }

    pub fn push(&mut self, p: &Point2) {
        self.n += 1.0;
        self.sum_x += p.x;
        self.sum_y += p.y;
        self.sum_xy += p.x * p.y;
        self.sum_xx += p.x * p.x;
        self.sum_yy += p.y * p.y;
    }

    pub fn len(&self) -> usize {
        self.n as usize
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0.0
    }

    /// `(nΣxy − ΣxΣy)² / ((nΣx² − (Σx)²)(nΣy² − (Σy)²))`, 0 if either
    /// denominator factor is zero.
    pub fn r_squared(&self) -> f64 {
        let numerator = self.n * self.sum_xy - self.sum_x * self.sum_y;
        let var_x = self.n * self.sum_xx - self.sum_x * self.sum_x;
        let var_y = self.n * self.sum_yy - self.sum_y * self.sum_y;

        if var_x == 0.0 || var_y == 0.0 {
            return 0.0;
        }
        (numerator * numerator) / (var_x * var_y)
    }
}

/// Coefficient of determination of a point set against a straight line
pub fn r_squared(points: &[Point2]) -> f64 {
    LineFit::from_points(points).r_squared()
}

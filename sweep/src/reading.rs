/*!
Single-heading range samples.

The distance word carries two flag bits above a 14-bit millimeter distance:

```text
bit 15     bit 14        bits 13..0
invalid    strength      distance (mm)
data       warning
```
*/

use crate::protocol::{DISCARD_RANGE_INCHES, MM_PER_INCH};
use serde::{Deserialize, Serialize};
use std::fmt;

const ERROR_MASK: u16 = 0x8000;
const WARNING_MASK: u16 = 0x4000;
const DISTANCE_MASK: u16 = 0x3FFF;

/// One heading's range/quality sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    heading: u16,
    raw_value: u16,
    strength: u16,
}

impl Reading {
    /// Create a reading. Headings wrap into 0..360.
    pub fn new(heading: u16, raw_value: u16, strength: u16) -> Self {
        Self {
            heading: heading % 360,
            raw_value,
            strength,
        }
    }

    /// Heading in whole degrees, 0..360
    pub fn heading(&self) -> u16 {
        self.heading
    }

    /// Heading folded into (-180, 180], negative to the left of forward
    pub fn signed_heading(&self) -> i32 {
        let heading = i32::from(self.heading);
        if heading > 180 {
            heading - 360
        } else {
            heading
        }
    }

    /// Distance word exactly as received, flags included
    pub fn raw_value(&self) -> u16 {
        self.raw_value
    }

    pub fn strength(&self) -> u16 {
        self.strength
    }

    /// The sensor marked the distance as invalid
    pub fn error(&self) -> bool {
        self.raw_value & ERROR_MASK != 0
    }

    /// The sensor reported a signal strength warning
    pub fn warning(&self) -> bool {
        self.raw_value & WARNING_MASK != 0
    }

    /// Flagged readings never contribute geometry
    pub fn discard(&self) -> bool {
        self.error() || self.warning()
    }

    /// Distance in millimeters with the flag bits stripped
    pub fn range_mm(&self) -> u16 {
        self.raw_value & DISTANCE_MASK
    }

    /// Distance in inches, or the 777 sentinel when discarded
    pub fn range_inches(&self) -> f64 {
        if self.discard() {
            DISCARD_RANGE_INCHES
        } else {
            f64::from(self.range_mm()) / MM_PER_INCH
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{:.2}", self.heading, self.range_inches())
    }
}

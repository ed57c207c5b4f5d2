/*!
Robot message documents.

Outbound documents are flat JSON objects. Every one carries `sender` and
`message` next to its own fields; the field names are a wire contract with
the robot controller:

```json
{"sender":"lidar","message":"range at heading","heading":0,"range":42.5}
{"sender":"lidar","message":"periodic","status":"ok","rpm":256}
{"sender":"lidar","message":"wall","status":"ok","heading":12.0,"range":80.1,"orientation":-3.5}
```

Inbound, the robot may narrow the range-at-heading window:

```json
{"sender":"robot","message":"sweep","start":-5,"stop":6}
```
*/

use crate::analyzer::{HeadingWindow, RangeAtHeading};
use crate::error::Result;
use crate::wall::Wall;
use serde::{Deserialize, Serialize};

pub const LIDAR_SENDER: &str = "lidar";
pub const ROBOT_SENDER: &str = "robot";

/// Acquisition status reported to the robot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Ok,
    Error,
    /// Sensor port unavailable
    Down,
    /// The robot sent an unusable command
    Badarg,
}

/// Message body, tagged by the `message` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message")]
pub enum LidarMessage {
    #[serde(rename = "range at heading")]
    RangeAtHeading { heading: i32, range: f64 },

    #[serde(rename = "periodic")]
    Periodic { status: Status, rpm: u32 },

    #[serde(rename = "wall")]
    Wall {
        status: Status,
        heading: f64,
        range: f64,
        orientation: f64,
    },
}

impl LidarMessage {
    pub fn periodic(status: Status, rpm: u32) -> Self {
        Self::Periodic { status, rpm }
    }

    /// Wall report; the degenerate sentinel is reported with error status
    pub fn wall(wall: &Wall) -> Self {
        let status = if wall.is_none() { Status::Error } else { Status::Ok };
        Self::Wall {
            status,
            heading: wall.heading,
            range: wall.distance,
            orientation: wall.orientation,
        }
    }
}

impl From<RangeAtHeading> for LidarMessage {
    fn from(hit: RangeAtHeading) -> Self {
        Self::RangeAtHeading {
            heading: hit.heading,
            range: hit.range,
        }
    }
}

/// A complete document as sent on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorMessage {
    pub sender: String,
    #[serde(flatten)]
    pub body: LidarMessage,
}

impl SensorMessage {
    /// Wrap a body as sent by this sensor
    pub fn lidar(body: LidarMessage) -> Self {
        Self {
            sender: LIDAR_SENDER.to_string(),
            body,
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// A document received from the robot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotMessage {
    pub sender: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<i32>,
}

/// What a robot message asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RobotCommand {
    /// Use this window for range-at-heading queries from now on
    Sweep(HeadingWindow),
    /// A sweep request with missing or out-of-range bounds
    InvalidSweep,
    /// Anything else; ignored
    Unknown,
}

impl RobotMessage {
    pub fn sweep(start: i32, stop: i32) -> Self {
        Self {
            sender: ROBOT_SENDER.to_string(),
            message: "sweep".to_string(),
            start: Some(start),
            stop: Some(stop),
        }
    }

    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn command(&self) -> RobotCommand {
        if self.sender != ROBOT_SENDER || self.message != "sweep" {
            return RobotCommand::Unknown;
        }
        match (self.start, self.stop) {
            (Some(start), Some(stop)) => HeadingWindow::new(start, stop)
                .map(RobotCommand::Sweep)
                .unwrap_or(RobotCommand::InvalidSweep),
            _ => RobotCommand::InvalidSweep,
        }
    }
}

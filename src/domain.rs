use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// one sample from the device, as stored in the readings table
///
/// every channel is optional: a sensor that failed to read on the device
/// sends null and the rest of the sample is still kept.
/// the short names (`temp`, `ax`, `deviceTs`, ...) are what older
/// firmware posts, so they are accepted as aliases on the way in.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Reading {
    /// store-assigned row id (absent on insert)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,

    /// store-assigned insert time (absent on insert)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(alias = "sessionId")]
    pub session_id: String,

    /// device clock in milliseconds
    #[serde(alias = "deviceTs")]
    pub device_ts: i64,

    /// celsius
    #[serde(default, alias = "temp")]
    pub temperature: Option<f64>,
    /// pascal
    #[serde(default)]
    pub pressure: Option<f64>,
    /// relative humidity, percent
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub voc: Option<f64>,

    /// m/s²
    #[serde(default, alias = "ax")]
    pub accel_x: Option<f64>,
    #[serde(default, alias = "ay")]
    pub accel_y: Option<f64>,
    #[serde(default, alias = "az")]
    pub accel_z: Option<f64>,

    /// rad/s
    #[serde(default, alias = "gx")]
    pub gyro_x: Option<f64>,
    #[serde(default, alias = "gy")]
    pub gyro_y: Option<f64>,
    #[serde(default, alias = "gz")]
    pub gyro_z: Option<f64>,

    /// metres
    #[serde(default)]
    pub distance: Option<f64>,
}

impl Reading {
    /// reject a reading before it reaches the store
    pub fn validate(&self) -> Result<()> {
        if self.session_id.trim().is_empty() {
            return Err(Error::Validation("session_id must not be empty".into()));
        }
        if self.device_ts < 0 {
            return Err(Error::Validation("device_ts must not be negative".into()));
        }
        let channels = [
            ("temperature", self.temperature),
            ("pressure", self.pressure),
            ("humidity", self.humidity),
            ("voc", self.voc),
            ("accel_x", self.accel_x),
            ("accel_y", self.accel_y),
            ("accel_z", self.accel_z),
            ("gyro_x", self.gyro_x),
            ("gyro_y", self.gyro_y),
            ("gyro_z", self.gyro_z),
            ("distance", self.distance),
        ];
        for (name, value) in channels {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(Error::Validation(format!("{} must be a finite number", name)));
                }
            }
        }
        Ok(())
    }

    /// all three acceleration axes, if the sample has them
    pub fn acceleration(&self) -> Option<(f64, f64, f64)> {
        Some((self.accel_x?, self.accel_y?, self.accel_z?))
    }

    /// true when not a single channel carries a value
    pub fn is_empty(&self) -> bool {
        [
            self.temperature,
            self.pressure,
            self.humidity,
            self.voc,
            self.accel_x,
            self.accel_y,
            self.accel_z,
            self.gyro_x,
            self.gyro_y,
            self.gyro_z,
            self.distance,
        ]
        .iter()
        .all(Option::is_none)
    }
}

/// a data-collection period, owned by the store
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Session {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub device_id: String,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub stopped_at: Option<String>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.stopped_at.is_none()
    }
}

#[derive(Deserialize, Debug)]
pub struct StartSessionRequest {
    pub device_id: String,
}

#[derive(Deserialize, Debug)]
pub struct StopSessionRequest {
    #[serde(deserialize_with = "string_or_number")]
    pub session_id: String,
}

/// row ids come back as integers or uuids depending on the table definition
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

// ==============================================================================
// client-facing stream schema
// ==============================================================================
// the dashboard expects readings grouped per physical sensor rather than the
// flat row layout the store keeps.

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct SensorUpdate {
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub temperature: Option<f64>,
    pub acceleration: Axes,
    pub gyroscope: Orientation,
    pub bme688: Environment,
    pub ultrasonic: Ultrasonic,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Axes {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

/// gyroscope rates in rad/s about x, y and z
///
/// the dashboard reads them under pitch/roll/yaw, so the names stay even
/// though these are angular rates rather than angles.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Orientation {
    pub pitch: Option<f64>,
    pub roll: Option<f64>,
    pub yaw: Option<f64>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Environment {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure: Option<f64>,
    pub voc: Option<f64>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Ultrasonic {
    pub distance: Option<f64>,
}

impl From<&Reading> for SensorUpdate {
    fn from(r: &Reading) -> Self {
        Self {
            timestamp: r.device_ts,
            session_id: Some(r.session_id.clone()),
            temperature: r.temperature,
            acceleration: Axes { x: r.accel_x, y: r.accel_y, z: r.accel_z },
            gyroscope: Orientation { pitch: r.gyro_x, roll: r.gyro_y, yaw: r.gyro_z },
            bme688: Environment {
                temperature: r.temperature,
                humidity: r.humidity,
                pressure: r.pressure,
                voc: r.voc,
            },
            ultrasonic: Ultrasonic { distance: r.distance },
        }
    }
}

/// messages pushed over the websocket
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StreamMessage {
    /// recent history sent once to a freshly connected client, oldest first
    InitialData(Vec<SensorUpdate>),
    SensorUpdate(SensorUpdate),
    /// inbound text bounced back to the sender
    Echo(String),
}

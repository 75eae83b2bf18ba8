use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AirqError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationId(i64);

impl StationId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for StationId {
    type Err = AirqError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        value
            .trim()
            .parse::<i64>()
            .map(Self)
            .map_err(|_| AirqError::InvalidStationId(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(i64);

impl SensorId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sensor {
    pub id: SensorId,
    pub param_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub province: String,
    pub sensors: Vec<Sensor>,
}

impl Station {
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.province)
    }

    pub fn with_sensors(mut self, sensors: Vec<Sensor>) -> Self {
        self.sensors = sensors;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    pub code: String,
    pub date: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StationRecord {
    pub station_id: StationId,
    pub station_name: String,
    pub sensors: Vec<SensorRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorRecord {
    pub sensor_id: SensorId,
    pub param_name: String,
}

impl From<&Station> for StationRecord {
    fn from(station: &Station) -> Self {
        Self {
            station_id: station.id,
            station_name: station.name.clone(),
            sensors: station.sensors.iter().map(SensorRecord::from).collect(),
        }
    }
}

impl From<&Sensor> for SensorRecord {
    fn from(sensor: &Sensor) -> Self {
        Self {
            sensor_id: sensor.id,
            param_name: sensor.param_name.clone(),
        }
    }
}

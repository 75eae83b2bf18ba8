use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{Measurement, Sensor, SensorId, Station, StationId};
use crate::error::AirqError;

pub const SENSOR_LIST_KEY: &str = "Lista stanowisk pomiarowych dla podanej stacji";
pub const SENSOR_ID_KEY: &str = "Identyfikator stanowiska";
pub const SENSOR_PARAM_KEY: &str = "Wskaźnik";

pub const MEASUREMENT_LIST_KEY: &str = "Lista danych pomiarowych";
pub const MEASUREMENT_CODE_KEY: &str = "Kod stanowiska";
pub const MEASUREMENT_DATE_KEY: &str = "Data";
pub const MEASUREMENT_VALUE_KEY: &str = "Wartość";

#[derive(Debug, Clone, PartialEq)]
pub enum Extraction<T> {
    Missing,
    Empty,
    Found { items: Vec<T>, skipped: usize },
}

impl<T> Extraction<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            Extraction::Found { items, .. } => items,
            Extraction::Missing | Extraction::Empty => Vec::new(),
        }
    }
}

pub fn parse_stations(body: &str) -> Result<Vec<Station>, AirqError> {
    let raw: Value = serde_json::from_str(body)?;
    extract_stations(&raw)
}

pub fn extract_stations(raw: &Value) -> Result<Vec<Station>, AirqError> {
    let items = raw
        .as_array()
        .ok_or_else(|| AirqError::Parse("station list is not a JSON array".to_string()))?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let id = item
                .get("id")
                .and_then(|v| v.as_i64())
                .ok_or(AirqError::MissingField { index, field: "id" })?;
            let name = item
                .get("stationName")
                .and_then(|v| v.as_str())
                .ok_or(AirqError::MissingField {
                    index,
                    field: "stationName",
                })?;
            let province = item
                .pointer("/city/commune/provinceName")
                .and_then(|v| v.as_str())
                .ok_or(AirqError::MissingField {
                    index,
                    field: "city.commune.provinceName",
                })?;
            Ok(Station {
                id: StationId::new(id),
                name: name.to_string(),
                province: province.to_string(),
                sensors: Vec::new(),
            })
        })
        .collect()
}

pub fn parse_sensors(body: &str) -> Result<Extraction<Sensor>, AirqError> {
    let raw: Value = serde_json::from_str(body)?;
    Ok(extract_sensors(&raw))
}

pub fn extract_sensors(raw: &Value) -> Extraction<Sensor> {
    let Some(list) = raw.get(SENSOR_LIST_KEY).and_then(|v| v.as_array()) else {
        return Extraction::Missing;
    };
    if list.is_empty() {
        return Extraction::Empty;
    }

    let mut items = Vec::with_capacity(list.len());
    let mut skipped = 0usize;
    for (index, entry) in list.iter().enumerate() {
        let id = entry.get(SENSOR_ID_KEY).and_then(|v| v.as_i64());
        let param = entry.get(SENSOR_PARAM_KEY).and_then(|v| v.as_str());
        match (id, param) {
            (Some(id), Some(param)) => items.push(Sensor {
                id: SensorId::new(id),
                param_name: param.to_string(),
            }),
            _ => {
                warn!(index, "skipping sensor entry without id or parameter name");
                skipped += 1;
            }
        }
    }
    Extraction::Found { items, skipped }
}

pub fn parse_measurements(body: &str) -> Result<Extraction<Measurement>, AirqError> {
    let raw: Value = serde_json::from_str(body)?;
    Ok(extract_measurements(&raw))
}

pub fn extract_measurements(raw: &Value) -> Extraction<Measurement> {
    let Some(list) = raw.get(MEASUREMENT_LIST_KEY).and_then(|v| v.as_array()) else {
        return Extraction::Missing;
    };
    if list.is_empty() {
        return Extraction::Empty;
    }

    let mut items = Vec::new();
    let mut skipped = 0usize;
    for (index, entry) in list.iter().enumerate() {
        let value = match entry.get(MEASUREMENT_VALUE_KEY) {
            None | Some(Value::Null) => continue,
            Some(value) => value,
        };
        let code = entry.get(MEASUREMENT_CODE_KEY).and_then(|v| v.as_str());
        let date = entry.get(MEASUREMENT_DATE_KEY).and_then(|v| v.as_str());
        match (code, date, value.as_f64()) {
            (Some(code), Some(date), Some(value)) => items.push(Measurement {
                code: code.to_string(),
                date: date.to_string(),
                value,
            }),
            _ => {
                warn!(index, "skipping malformed measurement entry");
                skipped += 1;
            }
        }
    }
    debug!(entries = list.len(), kept = items.len(), "measurements extracted");
    Extraction::Found { items, skipped }
}

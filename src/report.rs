use std::fmt::Write as _;

use crate::domain::{Measurement, Sensor, Station};
use crate::error::AirqError;
use crate::pipeline::Extraction;

pub const NO_SENSORS: &str = "No sensors for this station.";

#[derive(Debug, Clone)]
pub struct Report {
    text: String,
}

impl Report {
    pub fn for_station(station: &Station) -> Self {
        Self {
            text: format!("Data for station {}:\n", station.name),
        }
    }

    pub fn sensor_heading(&mut self, sensor: &Sensor) {
        let _ = write!(
            self.text,
            "\nSensor: {} (ID: {})\n",
            sensor.param_name, sensor.id
        );
    }

    pub fn measurements(&mut self, extraction: &Extraction<Measurement>) {
        match extraction {
            Extraction::Missing => self.line("no measurement list in API response"),
            Extraction::Empty => self.line("no measurement data"),
            Extraction::Found { items, .. } => {
                for measurement in items {
                    self.line(&format_measurement(measurement));
                }
            }
        }
    }

    pub fn fetch_failure(&mut self, err: &AirqError) {
        match err {
            AirqError::HttpStatus { status, .. } if err.is_no_data() => {
                self.line(&format!("no data available (HTTP {status})"));
            }
            AirqError::Parse(message) => {
                self.line(&format!("failed to parse measurement data: {message}"));
            }
            other => self.line(&format!("error: {other}")),
        }
    }

    pub fn note(&mut self, message: &str) {
        let _ = write!(self.text, "\nnote: {message}\n");
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn finish(self) -> String {
        self.text
    }

    fn line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }
}

pub fn format_measurement(measurement: &Measurement) -> String {
    format!(
        "- {}: {:.2} (date: {})",
        measurement.code, measurement.value, measurement.date
    )
}

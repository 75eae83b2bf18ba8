use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

use crate::domain::StationId;

/// Status the GIOS API answers with when a sensor has nothing for the query.
pub const NO_DATA_STATUS: u16 = 400;

#[derive(Debug, Error, Diagnostic)]
pub enum AirqError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}")]
    HttpStatus { status: u16, message: String },

    #[error("empty response for {0}")]
    EmptyResponse(String),

    #[error("failed to parse JSON: {0}")]
    Parse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("document not found: {0}")]
    NotFound(Utf8PathBuf),

    #[error("invalid sensor list response: missing `{0}`")]
    InvalidSensorList(&'static str),

    #[error("station #{index} is missing required field `{field}`")]
    MissingField { index: usize, field: &'static str },

    #[error("unknown station: {0}")]
    UnknownStation(StationId),

    #[error("a report for station {0} is already running")]
    AlreadyRunning(StationId),

    #[error("invalid station id: {0}")]
    InvalidStationId(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to spawn worker: {0}")]
    WorkerSpawn(String),
}

impl AirqError {
    pub fn is_no_data(&self) -> bool {
        matches!(self, AirqError::HttpStatus { status, .. } if *status == NO_DATA_STATUS)
    }

    pub fn is_network(&self) -> bool {
        matches!(
            self,
            AirqError::Transport(_) | AirqError::HttpStatus { .. } | AirqError::EmptyResponse(_)
        )
    }
}

impl From<serde_json::Error> for AirqError {
    fn from(err: serde_json::Error) -> Self {
        AirqError::Parse(err.to_string())
    }
}

use std::fs;
use std::io;

use camino::{Utf8Path, Utf8PathBuf};

use crate::domain::{SensorId, StationId, StationRecord};
use crate::error::AirqError;

/// Document locations under one data root. Writes are plain overwrites:
/// no temp file, no rename, no locking.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: Utf8PathBuf,
}

impl DocumentStore {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn stations_path(&self) -> Utf8PathBuf {
        self.root.join("stations.json")
    }

    pub fn sensors_path(&self) -> Utf8PathBuf {
        self.root.join("sensors.json")
    }

    pub fn station_sensors_path(&self, id: StationId) -> Utf8PathBuf {
        self.root.join("sensors").join(format!("{id}.json"))
    }

    pub fn measurements_path(&self, id: SensorId) -> Utf8PathBuf {
        self.root.join("data").join(format!("{id}.json"))
    }

    pub fn ensure_root(&self) -> Result<(), AirqError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| AirqError::Filesystem(err.to_string()))
    }

    pub fn write(content: &str, location: &Utf8Path) -> Result<(), AirqError> {
        if let Some(parent) = location.parent() {
            if !parent.as_str().is_empty() {
                fs::create_dir_all(parent.as_std_path()).map_err(|err| {
                    AirqError::Filesystem(format!("create {parent}: {err}"))
                })?;
            }
        }
        fs::write(location.as_std_path(), content)
            .map_err(|err| AirqError::Filesystem(format!("write {location}: {err}")))
    }

    pub fn read(location: &Utf8Path) -> Result<String, AirqError> {
        fs::read_to_string(location.as_std_path()).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => AirqError::NotFound(location.to_owned()),
            _ => AirqError::Filesystem(format!("read {location}: {err}")),
        })
    }

    pub fn write_normalized(
        records: &[StationRecord],
        location: &Utf8Path,
    ) -> Result<(), AirqError> {
        let content = serde_json::to_string_pretty(records)?;
        Self::write(&content, location)
    }

    pub fn read_normalized(location: &Utf8Path) -> Result<Vec<StationRecord>, AirqError> {
        let content = Self::read(location)?;
        Ok(serde_json::from_str(&content)?)
    }
}

use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::domain::{Sensor, Station, StationRecord};
use crate::error::AirqError;
use crate::fetch::{FetchClient, measurements_target, sensors_target, stations_target};
use crate::pipeline::{self, Extraction, SENSOR_LIST_KEY};
use crate::report::{NO_SENSORS, Report};
use crate::store::DocumentStore;

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink: Send + Sync {
    fn event(&self, event: ProgressEvent);
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogResult {
    pub stations: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
    pub province: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReloadResult {
    pub stations: Vec<StationRecord>,
    pub without_sensors: usize,
    pub persisted: bool,
}

pub struct App<C: FetchClient> {
    store: DocumentStore,
    client: C,
    catalog: Catalog,
    timeout: Duration,
}

impl<C: FetchClient> App<C> {
    pub fn new(store: DocumentStore, client: C, timeout: Duration) -> Self {
        Self {
            store,
            client,
            catalog: Catalog::new(),
            timeout,
        }
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn load_catalog(&self, sink: &dyn ProgressSink) -> Result<CatalogResult, AirqError> {
        sink.event(ProgressEvent {
            message: "phase=Fetch; station list".to_string(),
            elapsed: None,
        });
        let start = Instant::now();
        let body = self
            .client
            .fetch_to(stations_target(), self.timeout, &self.store.stations_path())
            .inspect_err(|err| error!(error = %err, "station list download failed"))?;
        let stations = pipeline::parse_stations(&body)
            .inspect_err(|err| error!(error = %err, "station list rejected"))?;

        info!(count = stations.len(), "catalog loaded");
        sink.event(ProgressEvent {
            message: format!("phase=Store; {} stations", stations.len()),
            elapsed: Some(start.elapsed()),
        });

        let result = CatalogResult {
            stations: stations
                .iter()
                .map(|station| CatalogEntry {
                    id: station.id.get(),
                    name: station.name.clone(),
                    province: station.province.clone(),
                })
                .collect(),
        };
        self.catalog.install(stations);
        Ok(result)
    }

    pub fn reload_with_sensors(&self, sink: &dyn ProgressSink) -> Result<ReloadResult, AirqError> {
        let content = DocumentStore::read(&self.store.stations_path())?;
        let stations = pipeline::parse_stations(&content)
            .inspect_err(|err| error!(error = %err, "stored station list rejected"))?;
        if stations.is_empty() {
            return Err(AirqError::Parse("station document is empty".to_string()));
        }

        let start = Instant::now();
        let total = stations.len();
        let mut rebuilt = Vec::with_capacity(total);
        let mut without_sensors = 0usize;
        for (position, station) in stations.into_iter().enumerate() {
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Fetch; sensors {}/{total} station {}",
                    position + 1,
                    station.id
                ),
                elapsed: Some(start.elapsed()),
            });
            let sensors = match self.fetch_sensors(&station) {
                Ok(Extraction::Found { items, .. }) => items,
                Ok(Extraction::Empty) => {
                    info!(station = %station.id, "station has no sensors");
                    Vec::new()
                }
                Ok(Extraction::Missing) => {
                    info!(station = %station.id, key = SENSOR_LIST_KEY, "sensor list missing from response");
                    Vec::new()
                }
                Err(err) => {
                    warn!(station = %station.id, error = %err, "failed to fetch sensors");
                    Vec::new()
                }
            };
            if sensors.is_empty() {
                without_sensors += 1;
            }
            rebuilt.push(station.with_sensors(sensors));
        }

        let records: Vec<StationRecord> = rebuilt.iter().map(StationRecord::from).collect();
        let persisted = match DocumentStore::write_normalized(&records, &self.store.sensors_path())
        {
            Ok(()) => true,
            Err(err) => {
                warn!(error = %err, "failed to write sensors document");
                false
            }
        };

        info!(stations = rebuilt.len(), without_sensors, "catalog reloaded with sensors");
        self.catalog.install(rebuilt);
        Ok(ReloadResult {
            stations: records,
            without_sensors,
            persisted,
        })
    }

    pub fn aggregate(&self, station: &Station, sink: &dyn ProgressSink) -> Result<String, AirqError> {
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; sensors for {}", station.label()),
            elapsed: None,
        });
        let (sensors, skipped) = match self.fetch_sensors(station)? {
            Extraction::Found { items, skipped } => (items, skipped),
            Extraction::Empty => return Ok(NO_SENSORS.to_string()),
            Extraction::Missing => return Err(AirqError::InvalidSensorList(SENSOR_LIST_KEY)),
        };

        let mut notes = Vec::new();
        let record = StationRecord::from(&station.clone().with_sensors(sensors.clone()));
        if let Err(err) = DocumentStore::write_normalized(
            std::slice::from_ref(&record),
            &self.store.station_sensors_path(station.id),
        ) {
            warn!(station = %station.id, error = %err, "failed to write station sensors");
            notes.push(format!("could not save sensor list: {err}"));
        }

        let start = Instant::now();
        let mut report = Report::for_station(station);
        for (position, sensor) in sensors.iter().enumerate() {
            sink.event(ProgressEvent {
                message: format!(
                    "phase=Fetch; sensor {}/{} {}",
                    position + 1,
                    sensors.len(),
                    sensor.param_name
                ),
                elapsed: Some(start.elapsed()),
            });
            report.sensor_heading(sensor);

            let body = match self.client.fetch(&measurements_target(sensor.id), self.timeout) {
                Ok(body) => body,
                Err(err) => {
                    warn!(sensor = %sensor.id, error = %err, "measurement download failed");
                    report.fetch_failure(&err);
                    continue;
                }
            };

            let location = self.store.measurements_path(sensor.id);
            if let Err(err) = DocumentStore::write(&body, &location) {
                warn!(sensor = %sensor.id, error = %err, "failed to write measurements");
                notes.push(format!("could not save data for sensor {}: {err}", sensor.id));
            }

            match pipeline::parse_measurements(&body) {
                Ok(extraction) => report.measurements(&extraction),
                Err(err) => {
                    warn!(sensor = %sensor.id, error = %err, "measurement payload rejected");
                    report.fetch_failure(&err);
                }
            }
        }

        if skipped > 0 {
            notes.push(format!(
                "{skipped} sensor entries without id or parameter name were skipped"
            ));
        }
        for note in &notes {
            report.note(note);
        }

        sink.event(ProgressEvent {
            message: format!("phase=Deliver; report for station {}", station.id),
            elapsed: Some(start.elapsed()),
        });
        Ok(report.finish())
    }

    fn fetch_sensors(&self, station: &Station) -> Result<Extraction<Sensor>, AirqError> {
        let body = self.client.fetch(&sensors_target(station.id), self.timeout)?;
        pipeline::parse_sensors(&body)
    }
}

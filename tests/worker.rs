use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::json;

use airq_monitor::app::App;
use airq_monitor::domain::{SensorId, StationId};
use airq_monitor::error::AirqError;
use airq_monitor::fetch::{FetchClient, measurements_target, sensors_target, stations_target};
use airq_monitor::output::JsonOutput;
use airq_monitor::store::DocumentStore;
use airq_monitor::worker::{self, AdmissionPolicy, Delivery, WorkerState};

const WAIT: Duration = Duration::from_secs(10);

/// Serves canned bodies, sleeping before each measurement request so that
/// workers overlap.
struct SlowGios {
    responses: HashMap<String, String>,
    delay: Duration,
    panics_on: Option<String>,
}

impl FetchClient for SlowGios {
    fn fetch(&self, path: &str, _timeout: Duration) -> Result<String, AirqError> {
        if self.panics_on.as_deref() == Some(path) {
            panic!("malformed client state for {path}");
        }
        if path.contains("/getData/") {
            thread::sleep(self.delay);
        }
        self.responses
            .get(path)
            .cloned()
            .ok_or_else(|| AirqError::HttpStatus {
                status: 404,
                message: path.to_string(),
            })
    }
}

fn fixture(delay: Duration) -> SlowGios {
    let mut responses = HashMap::new();
    responses.insert(
        stations_target().to_string(),
        json!([
            {"id": 1, "stationName": "Gdańsk Wyzwolenia", "city": {"commune": {"provinceName": "POMORSKIE"}}},
            {"id": 2, "stationName": "Gdynia Porębskiego", "city": {"commune": {"provinceName": "POMORSKIE"}}},
            {"id": 3, "stationName": "Sopot", "city": {"commune": {"provinceName": "POMORSKIE"}}},
            {"id": 4, "stationName": "Gdańsk Leczkowa", "city": {"commune": {"provinceName": "POMORSKIE"}}}
        ])
        .to_string(),
    );
    for (station, sensor) in [(1, 11), (2, 21)] {
        responses.insert(
            sensors_target(StationId::new(station)),
            json!({"Lista stanowisk pomiarowych dla podanej stacji": [
                {"Identyfikator stanowiska": sensor, "Wskaźnik": "pył zawieszony PM2.5"},
                {"Identyfikator stanowiska": sensor + 1, "Wskaźnik": "benzen"}
            ]})
            .to_string(),
        );
        for id in [sensor, sensor + 1] {
            responses.insert(
                measurements_target(SensorId::new(id)),
                json!({"Lista danych pomiarowych": [
                    {"Kod stanowiska": format!("S{id}"), "Data": "2025-04-01 12:00:00", "Wartość": id as f64 / 2.0}
                ]})
                .to_string(),
            );
        }
    }
    responses.insert(
        sensors_target(StationId::new(4)),
        json!({"unexpected": []}).to_string(),
    );
    SlowGios {
        responses,
        delay,
        panics_on: None,
    }
}

fn app(delay: Duration) -> (tempfile::TempDir, Arc<App<SlowGios>>) {
    app_with(fixture(delay))
}

fn app_with(client: SlowGios) -> (tempfile::TempDir, Arc<App<SlowGios>>) {
    let temp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(temp.path().join("database")).unwrap();
    let app = App::new(DocumentStore::new(root), client, Duration::from_secs(5));
    app.load_catalog(&JsonOutput).unwrap();
    (temp, Arc::new(app))
}

#[test]
fn two_requests_yield_two_complete_deliveries() {
    let (_temp, app) = app(Duration::from_millis(50));
    let (dispatcher, inbox) = worker::bridge(app, Arc::new(JsonOutput), AdmissionPolicy::Unbounded);

    let first = dispatcher.request(StationId::new(1)).unwrap();
    let second = dispatcher.request(StationId::new(2)).unwrap();

    let mut deliveries = vec![
        inbox.recv_timeout(WAIT).unwrap(),
        inbox.recv_timeout(WAIT).unwrap(),
    ];
    first.join().unwrap();
    second.join().unwrap();
    assert!(inbox.try_next().is_none());

    deliveries.sort_by_key(Delivery::station);
    assert_eq!(
        deliveries[0].payload(),
        "Data for station Gdańsk Wyzwolenia:\n\
         \n\
         Sensor: pył zawieszony PM2.5 (ID: 11)\n\
         - S11: 5.50 (date: 2025-04-01 12:00:00)\n\
         \n\
         Sensor: benzen (ID: 12)\n\
         - S12: 6.00 (date: 2025-04-01 12:00:00)\n"
    );
    assert!(deliveries[1].payload().starts_with("Data for station Gdynia Porębskiego:"));
    assert!(deliveries[1].payload().contains("- S21: 10.50"));
    assert!(!deliveries[1].payload().contains("S11"));
}

#[test]
fn same_station_twice_runs_twice_when_unbounded() {
    let (_temp, app) = app(Duration::from_millis(20));
    let (dispatcher, inbox) = worker::bridge(app, Arc::new(JsonOutput), AdmissionPolicy::Unbounded);

    dispatcher.request(StationId::new(1)).unwrap();
    dispatcher.request(StationId::new(1)).unwrap();

    let first = inbox.recv_timeout(WAIT).unwrap();
    let second = inbox.recv_timeout(WAIT).unwrap();
    assert_eq!(first, second);
}

#[test]
fn one_per_station_rejects_while_running() {
    let (_temp, app) = app(Duration::from_millis(300));
    let (dispatcher, inbox) =
        worker::bridge(app, Arc::new(JsonOutput), AdmissionPolicy::OnePerStation);

    let handle = dispatcher.request(StationId::new(1)).unwrap();
    let err = dispatcher.request(StationId::new(1)).unwrap_err();
    assert_matches!(err, AirqError::AlreadyRunning(_));
    let other = dispatcher.request(StationId::new(2)).unwrap();

    assert!(inbox.recv_timeout(WAIT).is_some());
    assert!(inbox.recv_timeout(WAIT).is_some());
    handle.join().unwrap();
    other.join().unwrap();

    let again = dispatcher.request(StationId::new(1)).unwrap();
    assert!(inbox.recv_timeout(WAIT).is_some());
    again.join().unwrap();
}

#[test]
fn unknown_station_is_rejected_synchronously() {
    let (_temp, app) = app(Duration::ZERO);
    let (dispatcher, inbox) = worker::bridge(app, Arc::new(JsonOutput), AdmissionPolicy::Unbounded);

    let err = dispatcher.request(StationId::new(99)).unwrap_err();

    assert_matches!(err, AirqError::UnknownStation(_));
    assert!(inbox.try_next().is_none());
}

#[test]
fn failed_sensor_list_is_delivered_as_error() {
    let (_temp, app) = app(Duration::ZERO);
    let (dispatcher, inbox) = worker::bridge(app, Arc::new(JsonOutput), AdmissionPolicy::Unbounded);

    let handle = dispatcher.request(StationId::new(3)).unwrap();
    let delivery = inbox.recv_timeout(WAIT).unwrap();
    handle.join().unwrap();

    assert_matches!(delivery, Delivery::Failed { .. });
    assert_eq!(delivery.payload(), "Failed to fetch sensors: HTTP 404");
}

#[test]
fn handle_reports_delivered_state() {
    let (_temp, app) = app(Duration::ZERO);
    let (dispatcher, inbox) = worker::bridge(app, Arc::new(JsonOutput), AdmissionPolicy::Unbounded);

    let handle = dispatcher.request(StationId::new(2)).unwrap();
    assert!(inbox.recv_timeout(WAIT).is_some());
    while handle.state() != WorkerState::Delivered {
        thread::yield_now();
    }
    assert_eq!(handle.station(), StationId::new(2));
    handle.join().unwrap();
}

#[test]
fn running_worker_ignores_catalog_reload() {
    let (_temp, app) = app(Duration::from_millis(100));
    let (dispatcher, inbox) =
        worker::bridge(app.clone(), Arc::new(JsonOutput), AdmissionPolicy::Unbounded);

    let handle = dispatcher.request(StationId::new(1)).unwrap();
    app.catalog().install(Vec::new());

    let delivery = inbox.recv_timeout(WAIT).unwrap();
    handle.join().unwrap();
    assert_matches!(delivery, Delivery::Report { .. });
    assert!(delivery.payload().contains("Gdańsk Wyzwolenia"));
}

#[test]
fn sensor_response_without_list_is_delivered_as_error() {
    let (_temp, app) = app(Duration::ZERO);
    let (dispatcher, inbox) = worker::bridge(app, Arc::new(JsonOutput), AdmissionPolicy::Unbounded);

    let handle = dispatcher.request(StationId::new(4)).unwrap();
    let delivery = inbox.recv_timeout(WAIT).unwrap();
    handle.join().unwrap();

    assert_matches!(delivery, Delivery::Failed { .. });
    assert_eq!(
        delivery.payload(),
        "Failed to fetch sensors: invalid sensor list response: missing \
         `Lista stanowisk pomiarowych dla podanej stacji`"
    );
}

#[test]
fn one_per_station_admits_again_only_after_delivery() {
    let (_temp, app) = app(Duration::from_millis(20));
    let (dispatcher, inbox) =
        worker::bridge(app, Arc::new(JsonOutput), AdmissionPolicy::OnePerStation);

    let first = dispatcher.request(StationId::new(1)).unwrap();
    let second = loop {
        match dispatcher.request(StationId::new(1)) {
            Ok(handle) => break handle,
            Err(AirqError::AlreadyRunning(_)) => thread::yield_now(),
            Err(err) => panic!("unexpected error: {err}"),
        }
    };

    assert!(inbox.try_next().is_some());
    assert_eq!(first.state(), WorkerState::Delivered);
    first.join().unwrap();
    assert!(inbox.recv_timeout(WAIT).is_some());
    second.join().unwrap();
}

#[test]
fn panicking_worker_closes_inbox_and_frees_station() {
    let mut client = fixture(Duration::ZERO);
    client.panics_on = Some(sensors_target(StationId::new(2)));
    let (_temp, app) = app_with(client);
    let (dispatcher, inbox) =
        worker::bridge(app, Arc::new(JsonOutput), AdmissionPolicy::OnePerStation);

    let handle = dispatcher.request(StationId::new(2)).unwrap();
    let retry = dispatcher.clone();
    drop(dispatcher);

    assert_matches!(handle.join(), Err(AirqError::WorkerSpawn(_)));
    let again = retry.request(StationId::new(2)).unwrap();
    drop(retry);
    assert!(inbox.recv_timeout(WAIT).is_none());
    assert_matches!(again.join(), Err(AirqError::WorkerSpawn(_)));
}

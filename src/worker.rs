use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::app::{App, ProgressSink};
use crate::domain::StationId;
use crate::error::AirqError;
use crate::fetch::FetchClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AdmissionPolicy {
    #[default]
    Unbounded,
    OnePerStation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Report { station: StationId, text: String },
    Failed { station: StationId, message: String },
}

impl Delivery {
    pub fn station(&self) -> StationId {
        match self {
            Delivery::Report { station, .. } | Delivery::Failed { station, .. } => *station,
        }
    }

    pub fn payload(&self) -> &str {
        match self {
            Delivery::Report { text, .. } => text,
            Delivery::Failed { message, .. } => message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Delivered,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Running,
            _ => WorkerState::Delivered,
        }
    }
}

#[derive(Debug)]
pub struct WorkerHandle {
    station: StationId,
    state: Arc<AtomicU8>,
    thread: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn station(&self) -> StationId {
        self.station
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn join(self) -> Result<(), AirqError> {
        self.thread
            .join()
            .map_err(|_| AirqError::WorkerSpawn(format!("worker for {} panicked", self.station)))
    }
}

pub struct Inbox {
    rx: Receiver<Delivery>,
}

impl Inbox {
    pub fn try_next(&self) -> Option<Delivery> {
        self.rx.try_recv().ok()
    }

    pub fn drain(&self) -> Vec<Delivery> {
        self.rx.try_iter().collect()
    }

    pub fn recv(&self) -> Option<Delivery> {
        self.rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<Delivery> {
        match self.rx.recv_timeout(timeout) {
            Ok(delivery) => Some(delivery),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

pub struct Dispatcher<C: FetchClient + 'static> {
    app: Arc<App<C>>,
    sink: Arc<dyn ProgressSink>,
    tx: Sender<Delivery>,
    policy: AdmissionPolicy,
    in_flight: Arc<Mutex<HashSet<StationId>>>,
}

impl<C: FetchClient + 'static> Clone for Dispatcher<C> {
    fn clone(&self) -> Self {
        Self {
            app: self.app.clone(),
            sink: self.sink.clone(),
            tx: self.tx.clone(),
            policy: self.policy,
            in_flight: self.in_flight.clone(),
        }
    }
}

pub fn bridge<C: FetchClient + 'static>(
    app: Arc<App<C>>,
    sink: Arc<dyn ProgressSink>,
    policy: AdmissionPolicy,
) -> (Dispatcher<C>, Inbox) {
    let (tx, rx) = mpsc::channel();
    let dispatcher = Dispatcher {
        app,
        sink,
        tx,
        policy,
        in_flight: Arc::new(Mutex::new(HashSet::new())),
    };
    (dispatcher, Inbox { rx })
}

impl<C: FetchClient + 'static> Dispatcher<C> {
    pub fn app(&self) -> &Arc<App<C>> {
        &self.app
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    pub fn request(&self, station_id: StationId) -> Result<WorkerHandle, AirqError> {
        let station = self
            .app
            .catalog()
            .find(station_id)
            .ok_or(AirqError::UnknownStation(station_id))?;

        let guard = match self.policy {
            AdmissionPolicy::Unbounded => None,
            AdmissionPolicy::OnePerStation => Some(InFlight::admit(&self.in_flight, station_id)?),
        };

        let state = Arc::new(AtomicU8::new(WorkerState::Idle as u8));
        let worker_state = state.clone();
        let app = self.app.clone();
        let sink = self.sink.clone();
        let tx = self.tx.clone();

        let thread = thread::Builder::new()
            .name(format!("airq-worker-{station_id}"))
            .spawn(move || {
                worker_state.store(WorkerState::Running as u8, Ordering::Release);
                let delivery = match app.aggregate(&station, sink.as_ref()) {
                    Ok(text) => Delivery::Report {
                        station: station.id,
                        text,
                    },
                    Err(err) => {
                        warn!(station = %station.id, error = %err, "report failed");
                        Delivery::Failed {
                            station: station.id,
                            message: format!("Failed to fetch sensors: {err}"),
                        }
                    }
                };
                if tx.send(delivery).is_err() {
                    warn!(station = %station.id, "inbox closed, delivery dropped");
                } else {
                    info!(station = %station.id, "report delivered");
                }
                worker_state.store(WorkerState::Delivered as u8, Ordering::Release);
                drop(guard);
            })
            .map_err(|err| AirqError::WorkerSpawn(err.to_string()))?;

        Ok(WorkerHandle {
            station: station_id,
            state,
            thread,
        })
    }
}

/// Admission slot for one station. Held until the delivery is sent, released
/// on drop also when the worker panics.
struct InFlight {
    set: Arc<Mutex<HashSet<StationId>>>,
    station: StationId,
}

impl InFlight {
    fn admit(set: &Arc<Mutex<HashSet<StationId>>>, station: StationId) -> Result<Self, AirqError> {
        let mut guard = set.lock().unwrap_or_else(PoisonError::into_inner);
        if !guard.insert(station) {
            return Err(AirqError::AlreadyRunning(station));
        }
        Ok(Self {
            set: set.clone(),
            station,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.station);
    }
}

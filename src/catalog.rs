use std::sync::{Arc, Mutex, PoisonError};

use crate::domain::{Station, StationId};

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    current: Arc<Mutex<Arc<Vec<Station>>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, stations: Vec<Station>) {
        let mut guard = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(stations);
    }

    pub fn snapshot(&self) -> Arc<Vec<Station>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn find(&self, id: StationId) -> Option<Station> {
        self.snapshot().iter().find(|station| station.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}

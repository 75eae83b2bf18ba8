use std::time::Duration;

use camino::Utf8Path;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, warn};

use crate::domain::{SensorId, StationId};
use crate::error::AirqError;
use crate::store::DocumentStore;

pub fn stations_target() -> &'static str {
    "/pjp-api/rest/station/findAll?size=500"
}

pub fn sensors_target(id: StationId) -> String {
    format!("/pjp-api/v1/rest/station/sensors/{id}?size=20&page=0")
}

pub fn measurements_target(id: SensorId) -> String {
    format!("/pjp-api/v1/rest/data/getData/{id}?size=500&page=0")
}

pub trait FetchClient: Send + Sync {
    fn fetch(&self, path: &str, timeout: Duration) -> Result<String, AirqError>;

    fn fetch_to(
        &self,
        path: &str,
        timeout: Duration,
        location: &Utf8Path,
    ) -> Result<String, AirqError> {
        let body = self.fetch(path, timeout)?;
        if let Err(err) = DocumentStore::write(&body, location) {
            warn!(%location, error = %err, "failed to persist response body");
        }
        Ok(body)
    }
}

impl<C: FetchClient + ?Sized> FetchClient for std::sync::Arc<C> {
    fn fetch(&self, path: &str, timeout: Duration) -> Result<String, AirqError> {
        (**self).fetch(path, timeout)
    }
}

#[derive(Clone)]
pub struct GiosHttpClient {
    client: Client,
    base_url: String,
}

impl GiosHttpClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AirqError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("airq-monitor/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| AirqError::Transport(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .http1_only()
            .build()
            .map_err(|err| AirqError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, AirqError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "GIOS request failed".to_string());
        Err(AirqError::HttpStatus { status, message })
    }
}

impl FetchClient for GiosHttpClient {
    fn fetch(&self, path: &str, timeout: Duration) -> Result<String, AirqError> {
        let url = self.url(path);
        debug!(%url, "gios.request");
        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .map_err(transport_error)?;
        let response = Self::handle_status(response)?;
        let body = response.text().map_err(transport_error)?;
        if body.is_empty() {
            return Err(AirqError::EmptyResponse(path.to_string()));
        }
        debug!(%url, bytes = body.len(), "gios.response");
        Ok(body)
    }
}

fn transport_error(err: reqwest::Error) -> AirqError {
    if err.is_timeout() {
        AirqError::Transport(format!("timed out: {err}"))
    } else if err.is_connect() {
        AirqError::Transport(format!("connection failed: {err}"))
    } else {
        AirqError::Transport(err.to_string())
    }
}

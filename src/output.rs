use std::io::{self, Write};

use serde::Serialize;

use crate::app::{CatalogResult, ReloadResult};
use crate::worker::Delivery;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_catalog(result: &CatalogResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_reload(result: &ReloadResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_delivery(delivery: &Delivery) -> io::Result<()> {
        let mut stdout = io::stdout();
        stdout.write_all(delivery.payload().as_bytes())?;
        if !delivery.payload().ends_with('\n') {
            stdout.write_all(b"\n")?;
        }
        Ok(())
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl crate::app::ProgressSink for JsonOutput {
    fn event(&self, _event: crate::app::ProgressEvent) {}
}

pub mod app;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod store;
pub mod tui;
pub mod worker;

//! LabLink sensor gateway.
//!
//! relays ESP32 telemetry into a hosted REST datastore, streams the newest
//! reading to dashboards over websocket and summarizes finished experiments.

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod export;
pub mod registry;
pub mod relay;
pub mod store;
pub mod summary;

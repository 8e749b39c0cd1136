//! Core engine for a local emulator of the BigQuery v2 REST API.
//!
//! This crate owns everything between an already-parsed HTTP request and a
//! wire-ready JSON response: SQL translation into the embedded analytical
//! engine's dialect, the on-disk catalog, the async job protocol, and the
//! type/value bridge between engine-native and wire-native representations.
//! It does not bind a socket; [`service::Service`] is the facade a thin HTTP
//! dispatcher (out of scope here) drives.

pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod jobs;
pub mod service;
pub mod translate;
pub mod udf;
pub mod value;
pub mod wire;

pub use config::Config;
pub use error::Error;
pub use service::Service;

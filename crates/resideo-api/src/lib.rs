// resideo-api: Async Rust client for the Resideo / Honeywell Home cloud API

pub mod auth;
pub mod client;
pub mod error;
mod leak_detectors;
mod locations;
pub mod models;
mod thermostats;
pub mod transport;
mod valves;

pub use auth::{StaticToken, TokenSource};
pub use client::ResideoClient;
pub use error::{Error, ErrorClass};
pub use transport::{DEFAULT_BASE_URL, TransportConfig};

//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The HTTP transport to the weather provider and payload normalization
//! - The fetch orchestrator (cache, retry, request de-duplication)
//! - An observable store of the latest fetch state
//!
//! It is used by `weather-cli`, but any front end can drive a
//! [`FetchOrchestrator`] and subscribe to its state.

pub mod cache;
pub mod config;
pub mod error;
pub mod location;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod retry;
pub mod store;
pub mod transport;

pub use config::Config;
pub use error::{ErrorKind, FetchError};
pub use location::{FixedLocation, LocationProvider};
pub use model::{Coordinates, FetchState, Query, QueryKey, WeatherSnapshot};
pub use orchestrator::{FetchOrchestrator, OrchestratorSettings};
pub use store::{QueryStore, StateSubscription};
pub use transport::{OpenWeatherTransport, WeatherTransport, transport_from_config};

use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    Config, Query,
    error::{FetchError, TransportError},
    normalize::RawPayload,
};

pub mod openweather;

pub use openweather::OpenWeatherTransport;

/// One HTTP round-trip to the upstream weather provider.
///
/// Implementations never retry; the orchestrator owns the retry policy.
#[async_trait]
pub trait WeatherTransport: Send + Sync + Debug {
    async fn get(&self, query: &Query) -> Result<RawPayload, TransportError>;
}

/// Construct the OpenWeather transport from validated config.
pub fn transport_from_config(config: &Config) -> Result<OpenWeatherTransport, FetchError> {
    config.validate()?;
    OpenWeatherTransport::with_timeout(
        config.api_key.clone(),
        config.base_url.clone(),
        config.timeout(),
    )
}

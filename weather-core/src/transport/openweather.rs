use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::{
    Query,
    error::{FetchError, TransportError},
    normalize::RawPayload,
};

use super::WeatherTransport;

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Current-weather client for the OpenWeather REST API (`/weather`).
#[derive(Clone)]
pub struct OpenWeatherTransport {
    api_key: String,
    base_url: String,
    http: Client,
}

// Keeps the API key out of debug output and logs.
impl std::fmt::Debug for OpenWeatherTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWeatherTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl OpenWeatherTransport {
    pub fn new(api_key: String, base_url: String) -> Result<Self, FetchError> {
        Self::with_timeout(api_key, base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        api_key: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        if api_key.trim().is_empty() {
            return Err(FetchError::Configuration("API key is empty".to_string()));
        }
        if base_url.trim().is_empty() {
            return Err(FetchError::Configuration("base URL is empty".to_string()));
        }

        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/weather", self.base_url)
    }

    /// Location parameters for the query; city names go out trimmed but
    /// with their original casing.
    fn location_params(query: &Query) -> Vec<(&'static str, String)> {
        match query {
            Query::ByName(name) => vec![("q", name.trim().to_string())],
            Query::ByCoordinates(c) => vec![
                ("lat", c.latitude.to_string()),
                ("lon", c.longitude.to_string()),
            ],
        }
    }
}

#[async_trait]
impl WeatherTransport for OpenWeatherTransport {
    async fn get(&self, query: &Query) -> Result<RawPayload, TransportError> {
        let url = self.endpoint();
        let mut params = Self::location_params(query);

        debug!(%query, %url, "requesting current weather");

        params.push(("appid", self.api_key.clone()));
        params.push(("units", "metric".to_string()));

        let res = self.http.get(&url).query(&params).send().await?;

        let status = res.status();
        if !status.is_success() {
            debug!(%query, status = status.as_u16(), "upstream rejected request");
            return Err(TransportError::Http(status.as_u16()));
        }

        let body = res.text().await?;

        serde_json::from_str(&body)
            .map_err(|e| TransportError::Decode(format!("{e}: {}", truncate_body(&body))))
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

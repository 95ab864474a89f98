use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ErrorKind, FetchError};

/// Decimal places kept when coordinates are turned into a cache key.
/// Two decimal places is roughly one kilometre, enough to absorb GPS jitter.
pub const COORDINATE_PRECISION: i32 = 2;

/// A geographic position as reported by a location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// What the caller wants weather for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Query {
    ByName(String),
    ByCoordinates(Coordinates),
}

impl Query {
    pub fn by_name(city: impl Into<String>) -> Self {
        Query::ByName(city.into())
    }

    pub fn by_coordinates(latitude: f64, longitude: f64) -> Self {
        Query::ByCoordinates(Coordinates::new(latitude, longitude))
    }

    /// Rejects blank city names and coordinates outside the globe.
    pub fn validate(&self) -> Result<(), FetchError> {
        match self {
            Query::ByName(name) if name.trim().is_empty() => Err(FetchError::InvalidQuery(
                "city name must not be empty".to_string(),
            )),
            Query::ByCoordinates(coords) if !coords.is_valid() => {
                Err(FetchError::InvalidQuery(format!(
                    "coordinates out of range: ({}, {})",
                    coords.latitude, coords.longitude
                )))
            }
            _ => Ok(()),
        }
    }

    /// Normalized key used for cache and in-flight lookups.
    pub fn key(&self) -> QueryKey {
        match self {
            Query::ByName(name) => QueryKey::Name(name.trim().to_lowercase()),
            Query::ByCoordinates(coords) => QueryKey::Coordinates {
                lat: round_coordinate(coords.latitude),
                lon: round_coordinate(coords.longitude),
            },
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::ByName(name) => f.write_str(name.trim()),
            Query::ByCoordinates(c) => write!(f, "({:.4}, {:.4})", c.latitude, c.longitude),
        }
    }
}

fn round_coordinate(value: f64) -> i64 {
    let scale = 10f64.powi(COORDINATE_PRECISION);
    (value * scale).round() as i64
}

/// Normalized form of a [`Query`]. Coordinates are stored in fixed-point
/// units of `10^-COORDINATE_PRECISION` degrees so the key can be hashed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Name(String),
    Coordinates { lat: i64, lon: i64 },
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryKey::Name(name) => f.write_str(name),
            QueryKey::Coordinates { lat, lon } => write!(f, "{lat}:{lon}"),
        }
    }
}

/// Current conditions for one place, as shown to the user.
///
/// Only the normalizer builds these; optional fields stay `None` when the
/// provider did not report them rather than defaulting to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub city: String,
    pub description: String,
    /// Degrees Celsius.
    pub temperature: f64,
    pub feels_like: Option<f64>,
    /// Relative humidity, 0..=100.
    pub humidity: Option<u8>,
    /// Metres per second, never negative.
    pub wind_speed: Option<f64>,
    pub icon: Option<String>,
}

/// Lifecycle of the most recently requested fetch.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FetchState {
    #[default]
    Idle,
    Loading(Query),
    Loaded {
        snapshot: WeatherSnapshot,
        fetched_at: DateTime<Utc>,
    },
    Failed {
        error: ErrorKind,
        query: Query,
    },
}

impl FetchState {
    pub fn is_loading(&self) -> bool {
        matches!(self, FetchState::Loading(_))
    }

    pub fn snapshot(&self) -> Option<&WeatherSnapshot> {
        match self {
            FetchState::Loaded { snapshot, .. } => Some(snapshot),
            _ => None,
        }
    }
}

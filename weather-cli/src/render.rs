//! Plain-text rendering of fetch results.

use chrono::{DateTime, Local, Utc};
use weather_core::{ErrorKind, FetchState, Query, WeatherSnapshot};

const UNKNOWN: &str = "—";

fn or_unknown<T>(value: Option<T>, fmt: impl FnOnce(T) -> String) -> String {
    value.map(fmt).unwrap_or_else(|| UNKNOWN.to_string())
}

pub fn render_snapshot(snapshot: &WeatherSnapshot, fetched_at: Option<DateTime<Utc>>) -> String {
    let mut out = format!(
        "{}\n  {}\n  Temperature: {:.1}°C\n  Feels like:  {}\n  Humidity:    {}\n  Wind:        {}",
        snapshot.city,
        snapshot.description,
        snapshot.temperature,
        or_unknown(snapshot.feels_like, |t| format!("{t:.1}°C")),
        or_unknown(snapshot.humidity, |h| format!("{h}%")),
        or_unknown(snapshot.wind_speed, |w| format!("{w:.1} m/s")),
    );

    if let Some(icon) = &snapshot.icon {
        out.push_str(&format!("\n  Icon:        {icon}"));
    }
    if let Some(at) = fetched_at {
        out.push_str(&format!(
            "\n  Updated:     {}",
            at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        ));
    }

    out
}

pub fn render_state(state: &FetchState) -> String {
    match state {
        FetchState::Idle => String::new(),
        FetchState::Loading(query) => format!("Loading weather for {query}..."),
        FetchState::Loaded {
            snapshot,
            fetched_at,
        } => render_snapshot(snapshot, Some(*fetched_at)),
        FetchState::Failed {
            error: ErrorKind::InvalidQuery,
            query: query @ Query::ByCoordinates(_),
        } => format!("{query}: Latitude must be within ±90 and longitude within ±180."),
        FetchState::Failed {
            error: ErrorKind::InvalidQuery,
            ..
        } => "Please enter a city name.".to_string(),
        FetchState::Failed { error, query } => format!("{query}: {}", error.user_message()),
    }
}

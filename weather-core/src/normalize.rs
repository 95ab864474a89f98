//! Maps the provider's JSON payload onto [`WeatherSnapshot`].

use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;

use crate::error::NormalizeError;
use crate::model::WeatherSnapshot;

/// Decoded, provider-shaped response body.
pub type RawPayload = Value;

// Provider shapes. Every field is optional here; `normalize` decides which
// ones are required.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwMain {
    #[serde(deserialize_with = "lenient")]
    temp: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    feels_like: Option<f64>,
    #[serde(deserialize_with = "lenient")]
    humidity: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwWeather {
    #[serde(deserialize_with = "lenient")]
    description: Option<String>,
    #[serde(deserialize_with = "lenient")]
    icon: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwWind {
    #[serde(deserialize_with = "lenient")]
    speed: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OwCurrentResponse {
    #[serde(deserialize_with = "lenient")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    main: Option<OwMain>,
    #[serde(deserialize_with = "lenient")]
    weather: Option<Vec<OwWeather>>,
    #[serde(deserialize_with = "lenient")]
    wind: Option<OwWind>,
}

/// A field of the wrong JSON type reads as absent instead of failing the
/// whole payload.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

/// Build a snapshot from a raw payload.
///
/// `name`, `weather[0].description` and `main.temp` are required. The
/// remaining fields are optional and come back as `None` when absent or out
/// of range, so one odd field never sinks the whole response.
pub fn normalize(raw: &RawPayload) -> Result<WeatherSnapshot, NormalizeError> {
    // A scalar body has none of the required fields.
    let parsed = OwCurrentResponse::deserialize(raw).unwrap_or_default();

    let city = parsed
        .name
        .filter(|s| !s.trim().is_empty())
        .ok_or(NormalizeError::MissingField("name"))?;

    let condition = parsed
        .weather
        .and_then(|list| list.into_iter().next())
        .unwrap_or_default();

    let description = condition
        .description
        .ok_or(NormalizeError::MissingField("weather[0].description"))?;

    let main = parsed.main.unwrap_or_default();

    let temperature = main
        .temp
        .ok_or(NormalizeError::MissingField("main.temp"))?;

    let humidity = main
        .humidity
        .filter(|h| (0.0..=100.0).contains(h))
        .map(|h| h.round() as u8);

    let wind_speed = parsed
        .wind
        .and_then(|w| w.speed)
        .filter(|s| *s >= 0.0);

    let icon = condition.icon.filter(|s| !s.is_empty());

    Ok(WeatherSnapshot {
        city,
        description,
        temperature,
        feels_like: main.feels_like,
        humidity,
        wind_speed,
        icon,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn london() -> Value {
        json!({
            "name": "London",
            "weather": [{ "description": "light rain", "icon": "10d" }],
            "main": { "temp": 15.2, "feels_like": 14.8, "humidity": 82 },
            "wind": { "speed": 3.1 }
        })
    }

    #[test]
    fn normalizes_full_payload() {
        let snapshot = normalize(&london()).expect("payload is well formed");

        assert_eq!(
            snapshot,
            WeatherSnapshot {
                city: "London".to_string(),
                description: "light rain".to_string(),
                temperature: 15.2,
                feels_like: Some(14.8),
                humidity: Some(82),
                wind_speed: Some(3.1),
                icon: Some("10d".to_string()),
            }
        );
    }

    #[test]
    fn optional_fields_are_absent_not_zero() {
        let raw = json!({
            "name": "Reykjavik",
            "weather": [{ "description": "fog" }],
            "main": { "temp": -2 }
        });

        let snapshot = normalize(&raw).expect("required fields present");

        assert_eq!(snapshot.temperature, -2.0);
        assert_eq!(snapshot.feels_like, None);
        assert_eq!(snapshot.humidity, None);
        assert_eq!(snapshot.wind_speed, None);
        assert_eq!(snapshot.icon, None);
    }

    #[test]
    fn out_of_range_optionals_are_dropped() {
        let mut raw = london();
        raw["main"]["humidity"] = json!(140);
        raw["wind"]["speed"] = json!(-1.0);

        let snapshot = normalize(&raw).expect("required fields present");

        assert_eq!(snapshot.humidity, None);
        assert_eq!(snapshot.wind_speed, None);
    }

    #[test]
    fn missing_required_fields_are_named() {
        let cases = [
            ("/name", "name"),
            ("/weather", "weather[0].description"),
            ("/main", "main.temp"),
        ];

        for (pointer, field) in cases {
            let mut raw = london();
            let (parent, leaf) = pointer.rsplit_once('/').expect("pointer has a slash");
            let parent = if parent.is_empty() {
                &mut raw
            } else {
                raw.pointer_mut(parent).expect("parent exists")
            };
            parent.as_object_mut().expect("object").remove(leaf);

            assert_eq!(normalize(&raw), Err(NormalizeError::MissingField(field)));
        }
    }

    #[test]
    fn wrong_types_count_as_missing() {
        let mut raw = london();
        raw["main"]["temp"] = json!("warm");
        assert_eq!(normalize(&raw), Err(NormalizeError::MissingField("main.temp")));

        let mut raw = london();
        raw["weather"] = json!([]);
        assert_eq!(
            normalize(&raw),
            Err(NormalizeError::MissingField("weather[0].description"))
        );

        let mut raw = london();
        raw["name"] = json!("");
        assert_eq!(normalize(&raw), Err(NormalizeError::MissingField("name")));
    }

    #[test]
    fn wrong_typed_optionals_do_not_sink_the_payload() {
        let mut raw = london();
        raw["main"]["feels_like"] = json!("chilly");
        raw["wind"] = json!("breezy");
        raw["weather"][0]["icon"] = json!(10);

        let snapshot = normalize(&raw).expect("required fields present");

        assert_eq!(snapshot.temperature, 15.2);
        assert_eq!(snapshot.feels_like, None);
        assert_eq!(snapshot.wind_speed, None);
        assert_eq!(snapshot.icon, None);
        assert_eq!(snapshot.humidity, Some(82));
    }

    #[test]
    fn scalar_payload_is_missing_name() {
        assert_eq!(
            normalize(&json!("London")),
            Err(NormalizeError::MissingField("name"))
        );
    }

    #[test]
    fn is_deterministic() {
        let raw = london();
        assert_eq!(normalize(&raw), normalize(&raw));
    }
}

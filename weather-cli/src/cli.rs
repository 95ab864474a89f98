use std::sync::Arc;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Text};
use weather_core::{
    Config, Coordinates, FetchError, FetchOrchestrator, FetchState, FixedLocation, Query,
    WeatherSnapshot, transport_from_config,
};

use crate::render::{render_snapshot, render_state};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI")]
pub struct Cli {
    /// Print the result as JSON.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and endpoint.
    Configure,

    /// Show current weather for a city.
    Show {
        /// City name, e.g. "London".
        city: String,
    },

    /// Show current weather at a latitude/longitude.
    Coords {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },

    /// Show current weather at the configured home location.
    Here,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { city } => {
                let orch = build_orchestrator(Config::load()?)?;
                let result = with_progress(&orch, self.json, orch.fetch(Query::ByName(city))).await;
                report(&orch, result, self.json)
            }
            Command::Coords { lat, lon } => {
                let orch = build_orchestrator(Config::load()?)?;
                let query = Query::by_coordinates(lat, lon);
                let result = with_progress(&orch, self.json, orch.fetch(query)).await;
                report(&orch, result, self.json)
            }
            Command::Here => {
                let config = Config::load()?;
                let home = config.home;
                let location = match home {
                    Some(coords) => FixedLocation::new(coords),
                    None => FixedLocation::unavailable(),
                };
                let orch = build_orchestrator(config)?.with_location(Arc::new(location));
                let result =
                    with_progress(&orch, self.json, orch.fetch_current_location()).await;
                if matches!(result, Err(FetchError::LocationUnavailable)) {
                    eprintln!("Hint: add a [home] section with latitude/longitude to your config.");
                }
                report(&orch, result, self.json)
            }
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let base_url = Text::new("API base URL:")
        .with_default(&config.base_url)
        .prompt()
        .context("Failed to read base URL")?;

    let home = Text::new("Home location as `lat,lon` (leave empty to skip):")
        .prompt()
        .context("Failed to read home location")?;

    config.set_api_key(api_key.trim().to_string());
    config.base_url = base_url.trim().to_string();
    if !home.trim().is_empty() {
        config.home = Some(parse_coordinates(&home)?);
    }

    config.validate()?;

    let path = config.save()?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}

fn parse_coordinates(input: &str) -> anyhow::Result<Coordinates> {
    let (lat, lon) = input
        .split_once(',')
        .ok_or_else(|| anyhow!("Expected `lat,lon`, got '{input}'"))?;

    let lat: f64 = lat.trim().parse().context("Invalid latitude")?;
    let lon: f64 = lon.trim().parse().context("Invalid longitude")?;

    Ok(Coordinates::new(lat, lon))
}

fn build_orchestrator(config: Config) -> anyhow::Result<FetchOrchestrator> {
    let transport = transport_from_config(&config)?;
    Ok(FetchOrchestrator::new(Arc::new(transport), &config)?)
}

/// Drive `fetch` while echoing loading states to stderr.
async fn with_progress<F>(orch: &FetchOrchestrator, quiet: bool, fetch: F) -> F::Output
where
    F: std::future::Future,
{
    let mut states = orch.subscribe();
    tokio::pin!(fetch);

    loop {
        tokio::select! {
            result = &mut fetch => return result,
            Some(state) = states.changed() => {
                if !quiet && state.is_loading() {
                    eprintln!("{}", render_state(&state));
                }
            }
        }
    }
}

fn report(
    orch: &FetchOrchestrator,
    result: Result<WeatherSnapshot, FetchError>,
    json: bool,
) -> anyhow::Result<()> {
    let snapshot = match result {
        Ok(snapshot) => snapshot,
        Err(err) => {
            tracing::debug!(error = %err, "fetch failed");
            return Err(anyhow!(err.user_message()));
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let fetched_at = match orch.current_state() {
        FetchState::Loaded { fetched_at, .. } => Some(fetched_at),
        _ => None,
    };
    println!("{}", render_snapshot(&snapshot, fetched_at));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_coordinates() {
        let c = parse_coordinates(" 51.5, -0.12 ").unwrap();
        assert_eq!(c, Coordinates::new(51.5, -0.12));
    }

    #[test]
    fn rejects_bad_coordinates() {
        assert!(parse_coordinates("51.5").is_err());
        assert!(parse_coordinates("north,south").is_err());
    }

    #[test]
    fn cli_parses_negative_coordinates() {
        let cli = Cli::try_parse_from(["weather", "coords", "--lat", "-33.87", "--lon", "151.21"])
            .unwrap();
        assert!(matches!(cli.command, Command::Coords { lat, lon } if lat == -33.87 && lon == 151.21));
    }

    #[test]
    fn cli_parses_show_with_global_flags() {
        let cli = Cli::try_parse_from(["weather", "show", "New York", "--json"]).unwrap();
        assert!(cli.json);
        assert!(matches!(cli.command, Command::Show { ref city } if city == "New York"));
    }
}

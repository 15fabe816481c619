//! Runtime settings.
//!
//! Defaults mirror a 1 Hz simulation serving on port 8000. The binary
//! overlays environment variables on top of the defaults:
//!
//! | Variable               | Setting                          |
//! |------------------------|----------------------------------|
//! | `API_HOST`             | `server.host`                    |
//! | `API_PORT`             | `server.port`                    |
//! | `DATA_UPDATE_INTERVAL` | `simulation.tick_interval` (s)   |
//! | `MAX_HISTORY_SIZE`     | `simulation.history_capacity`    |
//! | `ARINC_RATE_MODE`      | `simulation.rate_mode`           |
//! | `ARINC_WAYPOINTS`      | `simulation.waypoints`           |
//!
//! `ARINC_WAYPOINTS` is a `;`-separated list of `latitude,longitude,altitude`.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::navigation::Waypoint;

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable was set but could not be parsed.
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// How externally commanded rates interact with the per-tick random walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateMode {
    /// Rates are redrawn at random every tick; a commanded rate lasts one tick.
    #[default]
    RandomWalk,
    /// Commanded rates persist until changed again.
    Held,
}

impl FromStr for RateMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random-walk" | "random_walk" => Ok(RateMode::RandomWalk),
            "held" => Ok(RateMode::Held),
            other => Err(format!("expected 'random-walk' or 'held', got '{other}'")),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Keepalive ping period on the push channel.
    pub ws_ping_interval: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            ws_ping_interval: Duration::from_secs(20),
        }
    }
}

/// Simulation and fan-out settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    pub tick_interval: Duration,
    pub history_capacity: usize,
    pub initial_latitude: f64,
    pub initial_longitude: f64,
    pub rate_mode: RateMode,
    /// Per-request timeout for external sink deliveries.
    pub sink_timeout: Duration,
    /// Upper bound on sink deliveries in flight at once.
    pub max_concurrent_sinks: usize,
    /// Frames buffered per subscriber before it is dropped.
    pub subscriber_buffer: usize,
    /// Upper bound on a single socket write to a subscriber.
    pub subscriber_send_timeout: Duration,
    /// Route for the waypoint navigator. Empty leaves the heading uncommanded.
    pub waypoints: Vec<Waypoint>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            history_capacity: 1000,
            initial_latitude: 41.2622,
            initial_longitude: 28.7278,
            rate_mode: RateMode::RandomWalk,
            sink_timeout: Duration::from_secs(10),
            max_concurrent_sinks: 32,
            subscriber_buffer: 16,
            subscriber_send_timeout: Duration::from_secs(2),
            waypoints: Vec::new(),
        }
    }
}

/// All runtime settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub simulation: SimulationSettings,
}

impl Settings {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();

        if let Some(host) = lookup("API_HOST") {
            settings.server.host = host;
        }
        if let Some(port) = parse_var::<u16>(&lookup, "API_PORT")? {
            settings.server.port = port;
        }
        if let Some(secs) = parse_var::<f64>(&lookup, "DATA_UPDATE_INTERVAL")? {
            if !(secs > 0.0 && secs.is_finite()) {
                return Err(invalid("DATA_UPDATE_INTERVAL", &secs.to_string(), "must be positive"));
            }
            settings.simulation.tick_interval = Duration::from_secs_f64(secs);
        }
        if let Some(capacity) = parse_var::<usize>(&lookup, "MAX_HISTORY_SIZE")? {
            if capacity == 0 {
                return Err(invalid("MAX_HISTORY_SIZE", "0", "must be at least 1"));
            }
            settings.simulation.history_capacity = capacity;
        }
        if let Some(mode) = parse_var::<RateMode>(&lookup, "ARINC_RATE_MODE")? {
            settings.simulation.rate_mode = mode;
        }
        if let Some(raw) = lookup("ARINC_WAYPOINTS") {
            settings.simulation.waypoints = raw
                .split(';')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| part.parse::<Waypoint>())
                .collect::<Result<_, _>>()
                .map_err(|reason| invalid("ARINC_WAYPOINTS", &raw, &reason))?;
        }

        Ok(settings)
    }

    /// Socket address string for the HTTP listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(key, &raw, &e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_env_with(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.bind_addr(), "0.0.0.0:8000");
        assert_eq!(settings.simulation.history_capacity, 1000);
        assert_eq!(settings.simulation.tick_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_env_with(lookup(&[
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "9000"),
            ("DATA_UPDATE_INTERVAL", "0.5"),
            ("MAX_HISTORY_SIZE", "50"),
            ("ARINC_RATE_MODE", "held"),
        ]))
        .unwrap();

        assert_eq!(settings.bind_addr(), "127.0.0.1:9000");
        assert_eq!(settings.simulation.tick_interval, Duration::from_millis(500));
        assert_eq!(settings.simulation.history_capacity, 50);
        assert_eq!(settings.simulation.rate_mode, RateMode::Held);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Settings::from_env_with(lookup(&[("API_PORT", "eighty")])).is_err());
        assert!(Settings::from_env_with(lookup(&[("DATA_UPDATE_INTERVAL", "0")])).is_err());
        assert!(Settings::from_env_with(lookup(&[("MAX_HISTORY_SIZE", "0")])).is_err());
        assert!(Settings::from_env_with(lookup(&[("ARINC_RATE_MODE", "sticky")])).is_err());
        assert!(Settings::from_env_with(lookup(&[("ARINC_WAYPOINTS", "42,28")])).is_err());
    }

    #[test]
    fn test_waypoint_route() {
        let settings = Settings::from_env_with(lookup(&[(
            "ARINC_WAYPOINTS",
            "42.0,29.0,35000; 43.5,30.25,30000;",
        )]))
        .unwrap();

        let route = &settings.simulation.waypoints;
        assert_eq!(route.len(), 2);
        assert_eq!(route[1].latitude, 43.5);
        assert_eq!(route[1].altitude, 30_000.0);
    }
}

//! Waypoint following.
//!
//! The navigator is an optional component of the simulator: each tick it
//! looks at the current position and heading and produces a turn-rate
//! command that closes the bearing error to the active waypoint.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::Field;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Maximum commanded turn rate, degrees per second.
pub const MAX_TURN_RATE: f64 = 3.0;

/// Bearing errors at or below this many degrees command a zero turn rate.
pub const HEADING_DEADBAND: f64 = 1.0;

/// Distance at which a waypoint counts as reached, in kilometres.
pub const ARRIVAL_RADIUS_KM: f64 = 0.01;

/// A route point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl FromStr for Waypoint {
    type Err = String;

    /// Parse `latitude,longitude,altitude`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [lat, lon, alt] = parts.as_slice() else {
            return Err(format!("expected latitude,longitude,altitude, got {s:?}"));
        };
        let number = |text: &str| text.parse::<f64>().map_err(|e| format!("{text:?}: {e}"));
        let waypoint = Waypoint {
            latitude: number(*lat)?,
            longitude: number(*lon)?,
            altitude: number(*alt)?,
        };
        if !Field::Latitude.envelope().contains(waypoint.latitude)
            || !Field::Longitude.envelope().contains(waypoint.longitude)
        {
            return Err(format!("position out of range in {s:?}"));
        }
        Ok(waypoint)
    }
}

/// Initial great-circle bearing from point 1 to point 2, degrees in [0, 360).
pub fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let y = dlon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * dlon.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Haversine distance between two points in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1 = lat1.to_radians();
    let lat2 = lat2.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Shortest signed angle from `from` to `to`, in [-180, 180].
pub fn heading_error(from: f64, to: f64) -> f64 {
    let mut diff = to - from;
    if diff > 180.0 {
        diff -= 360.0;
    } else if diff < -180.0 {
        diff += 360.0;
    }
    diff
}

/// Bearing/distance controller over an ordered list of waypoints.
#[derive(Debug, Clone, Default)]
pub struct WaypointNavigator {
    waypoints: Vec<Waypoint>,
    active: usize,
}

impl WaypointNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_waypoint(&mut self, latitude: f64, longitude: f64, altitude: f64) {
        self.waypoints.push(Waypoint {
            latitude,
            longitude,
            altitude,
        });
    }

    pub fn clear_waypoints(&mut self) {
        self.waypoints.clear();
        self.active = 0;
    }

    /// Navigator flying `route` in order.
    pub fn from_route(route: &[Waypoint]) -> Self {
        Self {
            waypoints: route.to_vec(),
            active: 0,
        }
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    /// The waypoint currently being flown to, if the route is not finished.
    pub fn active_waypoint(&self) -> Option<&Waypoint> {
        self.waypoints.get(self.active)
    }

    pub fn is_complete(&self) -> bool {
        self.active >= self.waypoints.len()
    }

    /// Compute the turn-rate command for the current position and heading.
    ///
    /// Returns `None` once the route is exhausted. Advances to the next
    /// waypoint when within [`ARRIVAL_RADIUS_KM`] of the active one.
    pub fn command(&mut self, latitude: f64, longitude: f64, heading: f64) -> Option<f64> {
        let target = *self.active_waypoint()?;

        let bearing = initial_bearing(latitude, longitude, target.latitude, target.longitude);
        let error = heading_error(heading, bearing);

        let rate = if error.abs() > HEADING_DEADBAND {
            error.clamp(-MAX_TURN_RATE, MAX_TURN_RATE)
        } else {
            0.0
        };

        let distance = haversine_km(latitude, longitude, target.latitude, target.longitude);
        if distance < ARRIVAL_RADIUS_KM {
            self.active += 1;
            info!(
                latitude = target.latitude,
                longitude = target.longitude,
                "Waypoint reached"
            );
        }

        Some(rate)
    }
}

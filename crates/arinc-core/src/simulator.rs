//! Flight dynamics simulator.
//!
//! `FlightDynamics` dead-reckons an aircraft forward one tick at a time:
//! integrate position, heading, altitude and airspeed from the current
//! rates, clamp to the operational envelope, apply a bounded random
//! perturbation, then publish a rounded `FlightSample` into a bounded
//! history.

use std::collections::VecDeque;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{RateMode, SimulationSettings};
use crate::model::{round_to, Field, FlightSample};
use crate::navigation::WaypointNavigator;

/// Knots to metres per second.
pub const KNOTS_TO_MPS: f64 = 0.514444;

/// Metres per degree of latitude in the flat-Earth approximation.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Kinematic defaults restored by `reset_position`.
pub const DEFAULT_ALTITUDE: f64 = 35_000.0;
pub const DEFAULT_AIRSPEED: f64 = 450.0;
pub const DEFAULT_HEADING: f64 = 270.0;
pub const DEFAULT_VERTICAL_SPEED: f64 = 0.0;

/// Mutable aircraft state, unrounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicState {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub airspeed: f64,
    pub heading: f64,
    pub vertical_speed: f64,
}

impl KinematicState {
    /// Default cruise state at the given position.
    pub fn at(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude: DEFAULT_ALTITUDE,
            airspeed: DEFAULT_AIRSPEED,
            heading: DEFAULT_HEADING,
            vertical_speed: DEFAULT_VERTICAL_SPEED,
        }
    }

    fn clamp(&mut self) {
        self.latitude = Field::Latitude.envelope().clamp(self.latitude);
        self.longitude = Field::Longitude.envelope().clamp(self.longitude);
        self.altitude = Field::Altitude.envelope().clamp(self.altitude);
        self.airspeed = Field::Airspeed.envelope().clamp(self.airspeed);
        self.heading = Field::Heading.envelope().clamp(self.heading);
        self.vertical_speed = Field::VerticalSpeed.envelope().clamp(self.vertical_speed);
    }
}

/// Rates of change driving the integration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RateParameters {
    /// Degrees per second.
    pub heading_rate: f64,
    /// Feet per minute; becomes the vertical speed.
    pub altitude_rate: f64,
    /// Knots per second.
    pub speed_rate: f64,
}

/// Half-widths of the uniform jitter applied every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perturbation {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub airspeed: f64,
    pub heading: f64,
    pub vertical_speed: f64,
    pub heading_rate: f64,
    pub altitude_rate: f64,
    pub speed_rate: f64,
}

impl Perturbation {
    /// No jitter and no rate redraws; the simulator becomes deterministic.
    pub fn none() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            altitude: 0.0,
            airspeed: 0.0,
            heading: 0.0,
            vertical_speed: 0.0,
            heading_rate: 0.0,
            altitude_rate: 0.0,
            speed_rate: 0.0,
        }
    }
}

impl Default for Perturbation {
    fn default() -> Self {
        Self {
            latitude: 0.001,
            longitude: 0.001,
            altitude: 10.0,
            airspeed: 2.0,
            heading: 0.5,
            vertical_speed: 50.0,
            heading_rate: 1.0,
            altitude_rate: 500.0,
            speed_rate: 5.0,
        }
    }
}

fn jitter(rng: &mut StdRng, bound: f64) -> f64 {
    if bound > 0.0 {
        rng.random_range(-bound..=bound)
    } else {
        0.0
    }
}

/// Dead-reckoning flight simulator with a bounded sample history.
pub struct FlightDynamics {
    state: KinematicState,
    rates: RateParameters,
    rate_mode: RateMode,
    perturbation: Perturbation,
    navigator: Option<WaypointNavigator>,
    history: VecDeque<FlightSample>,
    capacity: usize,
    rng: StdRng,
}

impl FlightDynamics {
    /// Create a simulator seeded from the operating system.
    pub fn new(settings: &SimulationSettings) -> Self {
        Self::with_rng(settings, StdRng::from_os_rng())
    }

    /// Create a simulator with a fixed seed, for reproducible runs.
    pub fn with_seed(settings: &SimulationSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: &SimulationSettings, rng: StdRng) -> Self {
        let capacity = settings.history_capacity.max(1);
        Self {
            state: KinematicState::at(settings.initial_latitude, settings.initial_longitude),
            rates: RateParameters::default(),
            rate_mode: settings.rate_mode,
            perturbation: Perturbation::default(),
            navigator: (!settings.waypoints.is_empty())
                .then(|| WaypointNavigator::from_route(&settings.waypoints)),
            history: VecDeque::with_capacity(capacity),
            capacity,
            rng,
        }
    }

    /// Replace the jitter bounds.
    pub fn with_perturbation(mut self, perturbation: Perturbation) -> Self {
        self.perturbation = perturbation;
        self
    }

    /// Attach a waypoint navigator that commands the heading rate.
    pub fn with_navigator(mut self, navigator: WaypointNavigator) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn navigator(&self) -> Option<&WaypointNavigator> {
        self.navigator.as_ref()
    }

    pub fn navigator_mut(&mut self) -> Option<&mut WaypointNavigator> {
        self.navigator.as_mut()
    }

    pub fn state(&self) -> &KinematicState {
        &self.state
    }

    pub fn rates(&self) -> &RateParameters {
        &self.rates
    }

    pub fn rate_mode(&self) -> RateMode {
        self.rate_mode
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Advance the simulation by `dt` seconds and publish a new sample.
    pub fn advance(&mut self, dt: f64) -> FlightSample {
        if let Some(nav) = self.navigator.as_mut() {
            if let Some(rate) = nav.command(self.state.latitude, self.state.longitude, self.state.heading) {
                self.rates.heading_rate = rate;
            }
        }

        self.integrate(dt);
        self.state.clamp();
        self.perturb();
        self.state.clamp();

        let sample = self.snapshot();
        self.history.push_back(sample.clone());
        while self.history.len() > self.capacity {
            self.history.pop_front();
        }

        debug!(
            latitude = sample.latitude,
            longitude = sample.longitude,
            altitude = sample.altitude,
            heading = sample.heading,
            "Advanced flight state"
        );
        sample
    }

    fn integrate(&mut self, dt: f64) {
        let s = &mut self.state;
        let distance = s.airspeed * KNOTS_TO_MPS * dt;
        let heading = s.heading.to_radians();

        s.latitude += distance * heading.cos() / METERS_PER_DEGREE;
        // uses the freshly updated latitude
        s.longitude += distance * heading.sin() / (METERS_PER_DEGREE * s.latitude.to_radians().cos());

        s.heading = (s.heading + self.rates.heading_rate * dt).rem_euclid(360.0);
        s.altitude += s.vertical_speed / 60.0 * dt;
        s.airspeed += self.rates.speed_rate * dt;
    }

    fn perturb(&mut self) {
        let p = self.perturbation;
        let rng = &mut self.rng;
        let s = &mut self.state;

        s.latitude += jitter(rng, p.latitude);
        s.longitude += jitter(rng, p.longitude);
        s.altitude += jitter(rng, p.altitude);
        s.airspeed += jitter(rng, p.airspeed);
        s.heading += jitter(rng, p.heading);
        s.vertical_speed += jitter(rng, p.vertical_speed);

        if self.rate_mode == RateMode::RandomWalk {
            self.rates.heading_rate = jitter(rng, p.heading_rate);
            self.rates.altitude_rate = jitter(rng, p.altitude_rate);
            self.rates.speed_rate = jitter(rng, p.speed_rate);
        }

        s.vertical_speed = self.rates.altitude_rate;
    }

    fn snapshot(&self) -> FlightSample {
        let s = &self.state;
        let round = |field: Field, v: f64| round_to(v, field.display_precision());
        FlightSample::new(
            round(Field::Latitude, s.latitude),
            round(Field::Longitude, s.longitude),
            round(Field::Altitude, s.altitude),
            round(Field::Airspeed, s.airspeed),
            round(Field::Heading, s.heading),
            round(Field::VerticalSpeed, s.vertical_speed),
            Utc::now(),
        )
    }

    /// Set the rate parameters used by the next integration step.
    pub fn set_rates(&mut self, heading_rate: f64, altitude_rate: f64, speed_rate: f64) {
        self.rates = RateParameters {
            heading_rate,
            altitude_rate,
            speed_rate,
        };
        info!(heading_rate, altitude_rate, speed_rate, "Flight parameters updated");
    }

    /// Move the aircraft and restore default altitude, airspeed, heading and vertical speed.
    pub fn reset_position(&mut self, latitude: f64, longitude: f64) {
        self.state = KinematicState::at(latitude, longitude);
        self.state.clamp();
        info!(latitude, longitude, "Position reset");
    }

    /// Most recently published sample.
    pub fn latest(&self) -> Option<&FlightSample> {
        self.history.back()
    }

    /// Up to `limit` most recent samples, oldest first. `None` returns all.
    pub fn history(&self, limit: Option<usize>) -> Vec<FlightSample> {
        let len = self.history.len();
        let skip = limit.map_or(0, |n| len.saturating_sub(n));
        self.history.iter().skip(skip).cloned().collect()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulationSettings;

    fn quiet(settings: &SimulationSettings) -> FlightDynamics {
        FlightDynamics::with_seed(settings, 7).with_perturbation(Perturbation::none())
    }

    #[test]
    fn test_no_sample_before_first_advance() {
        let sim = FlightDynamics::with_seed(&SimulationSettings::default(), 1);
        assert!(sim.latest().is_none());
        assert!(sim.history(None).is_empty());
    }

    #[test]
    fn test_dead_reckoning_westbound() {
        let settings = SimulationSettings::default();
        let mut sim = quiet(&settings);
        sim.reset_position(41.2622, 28.7278);

        let sample = sim.advance(1.0);

        // 450 kt for one second heading 270: ~231.5 m of westward travel
        let expected_dlon = 450.0 * KNOTS_TO_MPS / (METERS_PER_DEGREE * 41.2622f64.to_radians().cos());
        assert!((sample.longitude - (28.7278 - expected_dlon)).abs() < 2e-6);
        assert!((sample.latitude - 41.2622).abs() < 2e-6);
        assert_eq!(sample.heading, 270.0);
        assert_eq!(sample.altitude, 35_000.0);
        assert_eq!(sample.airspeed, 450.0);
    }

    #[test]
    fn test_reset_then_advance_stays_close() {
        let settings = SimulationSettings::default();
        let mut sim = FlightDynamics::with_seed(&settings, 42);
        sim.reset_position(40.1281, 32.9951);
        sim.set_rates(0.0, 0.0, 0.0);
        let prior_heading = sim.state().heading;

        let sample = sim.advance(1.0);
        let bound = Perturbation::default();

        assert!((sample.heading - prior_heading).abs() <= bound.heading + 0.05);

        // one tick at the reset airspeed, plus jitter
        let max_step_deg = DEFAULT_AIRSPEED * KNOTS_TO_MPS / METERS_PER_DEGREE
            / 40.1281f64.to_radians().cos();
        assert!((sample.latitude - 40.1281).abs() < max_step_deg + bound.latitude + 1e-6);
        assert!((sample.longitude - 32.9951).abs() < max_step_deg + bound.longitude + 1e-6);
    }

    #[test]
    fn test_envelope_holds_under_extreme_rates() {
        let settings = SimulationSettings {
            rate_mode: RateMode::Held,
            ..SimulationSettings::default()
        };
        let mut sim = FlightDynamics::with_seed(&settings, 3);

        for (i, rates) in [
            (1e6, 1e7, 1e5),
            (-1e6, -1e7, -1e5),
            (f64::MAX, f64::MIN, f64::MAX),
        ]
        .iter()
        .enumerate()
        {
            sim.set_rates(rates.0, rates.1, rates.2);
            for _ in 0..50 {
                let sample = sim.advance(1.0 + i as f64);
                assert!(sample.is_within_envelope(), "out of envelope: {sample:?}");
            }
        }
    }

    #[test]
    fn test_envelope_holds_near_pole() {
        let settings = SimulationSettings::default();
        let mut sim = FlightDynamics::with_seed(&settings, 11);
        sim.reset_position(89.9999, 179.9999);
        for _ in 0..200 {
            assert!(sim.advance(1.0).is_within_envelope());
        }
    }

    #[test]
    fn test_history_is_bounded_and_ordered() {
        let settings = SimulationSettings {
            history_capacity: 10,
            ..SimulationSettings::default()
        };
        let mut sim = FlightDynamics::with_seed(&settings, 5);

        let produced: Vec<FlightSample> = (0..25).map(|_| sim.advance(1.0)).collect();

        assert_eq!(sim.history_len(), 10);
        assert_eq!(sim.history(None), produced[15..].to_vec());
        assert_eq!(sim.history(Some(3)), produced[22..].to_vec());
        assert_eq!(sim.history(Some(100)).len(), 10);
        assert_eq!(sim.latest(), produced.last());
    }

    #[test]
    fn test_random_walk_clobbers_external_rates() {
        let settings = SimulationSettings::default();
        let mut sim = FlightDynamics::with_seed(&settings, 9);
        sim.set_rates(0.0, 2000.0, 0.0);
        sim.advance(1.0);

        let rates = sim.rates();
        assert!(rates.altitude_rate.abs() <= Perturbation::default().altitude_rate);
        assert_eq!(sim.state().vertical_speed, rates.altitude_rate);
    }

    #[test]
    fn test_held_rates_persist() {
        let settings = SimulationSettings {
            rate_mode: RateMode::Held,
            ..SimulationSettings::default()
        };
        let mut sim = FlightDynamics::with_seed(&settings, 9);
        sim.set_rates(0.5, 2000.0, 1.0);

        for _ in 0..3 {
            let sample = sim.advance(1.0);
            assert_eq!(sample.vertical_speed, 2000.0);
        }
        assert_eq!(
            *sim.rates(),
            RateParameters {
                heading_rate: 0.5,
                altitude_rate: 2000.0,
                speed_rate: 1.0
            }
        );
    }

    #[test]
    fn test_navigator_turns_toward_waypoint() {
        let settings = SimulationSettings {
            rate_mode: RateMode::Held,
            ..SimulationSettings::default()
        };
        let mut nav = WaypointNavigator::new();
        // due north of the start point, aircraft starts heading west
        nav.add_waypoint(42.5, 28.7278, 35_000.0);
        let mut sim = quiet(&settings).with_navigator(nav);

        let first = sim.advance(1.0);
        assert!((first.heading - 273.0).abs() < 1e-6);

        for _ in 0..60 {
            sim.advance(1.0);
        }
        let heading = sim.latest().unwrap().heading;
        assert!(heading < 5.0 || heading > 355.0, "heading {heading}");
    }

    #[test]
    fn test_route_from_settings_attaches_navigator() {
        let settings = SimulationSettings {
            waypoints: vec!["42.5,28.7278,35000".parse().unwrap()],
            ..SimulationSettings::default()
        };
        let sim = FlightDynamics::with_seed(&settings, 1);
        let nav = sim.navigator().unwrap();
        assert_eq!(nav.active_waypoint().map(|w| w.latitude), Some(42.5));

        let sim = FlightDynamics::with_seed(&SimulationSettings::default(), 1);
        assert!(sim.navigator().is_none());
    }
}

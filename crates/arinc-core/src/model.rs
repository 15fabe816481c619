//! Flight telemetry data model.
//!
//! These types describe one simulated aircraft state:
//! - `Field` enumerates the six transmitted quantities with their envelopes
//! - `FlightSample` is an immutable, envelope-clamped snapshot of all six

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operational envelope of a single field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub min: f64,
    pub max: f64,
    /// Upper bound is excluded from the envelope (heading wraps at 360).
    pub max_exclusive: bool,
}

impl Envelope {
    const fn closed(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            max_exclusive: false,
        }
    }

    const fn half_open(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            max_exclusive: true,
        }
    }

    /// Check whether a value lies inside the envelope. NaN never does.
    pub fn contains(&self, value: f64) -> bool {
        if self.max_exclusive {
            value >= self.min && value < self.max
        } else {
            value >= self.min && value <= self.max
        }
    }

    /// Clamp a value into the envelope. NaN and infinities collapse to the lower bound.
    pub fn clamp(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.min;
        }
        if self.max_exclusive {
            // wrap rather than pin, 360 and 0 are the same direction
            if value >= self.max || value < self.min {
                let span = self.max - self.min;
                let wrapped = (value - self.min).rem_euclid(span) + self.min;
                return if wrapped >= self.max { self.min } else { wrapped };
            }
            value
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

/// One of the six telemetry quantities carried on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Latitude,
    Longitude,
    Altitude,
    Airspeed,
    Heading,
    VerticalSpeed,
}

impl Field {
    /// All fields in transmission order.
    pub const ALL: [Field; 6] = [
        Field::Latitude,
        Field::Longitude,
        Field::Altitude,
        Field::Airspeed,
        Field::Heading,
        Field::VerticalSpeed,
    ];

    /// Snake-case name used on the wire and in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Field::Latitude => "latitude",
            Field::Longitude => "longitude",
            Field::Altitude => "altitude",
            Field::Airspeed => "airspeed",
            Field::Heading => "heading",
            Field::VerticalSpeed => "vertical_speed",
        }
    }

    /// Engineering unit of the field.
    pub fn unit(&self) -> &'static str {
        match self {
            Field::Latitude | Field::Longitude | Field::Heading => "deg",
            Field::Altitude => "ft",
            Field::Airspeed => "kt",
            Field::VerticalSpeed => "ft/min",
        }
    }

    /// Octet label assigned to this field.
    pub fn label(&self) -> u8 {
        match self {
            Field::Latitude => 0x6A,
            Field::Longitude => 0x6B,
            Field::Altitude => 0x6C,
            Field::Airspeed => 0x6D,
            Field::Heading => 0x6E,
            Field::VerticalSpeed => 0x6F,
        }
    }

    /// Look up the field carried under a label.
    pub fn from_label(label: u8) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.label() == label)
    }

    pub fn envelope(&self) -> Envelope {
        match self {
            Field::Latitude => Envelope::closed(-90.0, 90.0),
            Field::Longitude => Envelope::closed(-180.0, 180.0),
            Field::Altitude => Envelope::closed(0.0, 50_000.0),
            Field::Airspeed => Envelope::closed(0.0, 1_000.0),
            Field::Heading => Envelope::half_open(0.0, 360.0),
            Field::VerticalSpeed => Envelope::closed(-10_000.0, 10_000.0),
        }
    }

    /// Multiplier from engineering units to the integer data field.
    pub fn scale(&self) -> f64 {
        match self {
            Field::Latitude | Field::Longitude => 10_000.0,
            Field::Airspeed | Field::Heading => 10.0,
            Field::Altitude | Field::VerticalSpeed => 1.0,
        }
    }

    /// Smallest representable step in engineering units.
    pub fn quantum(&self) -> f64 {
        1.0 / self.scale()
    }

    /// Whether the field carries a sign in the SSM bits.
    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            Field::Latitude | Field::Longitude | Field::VerticalSpeed
        )
    }

    /// Decimal places kept when a sample is published.
    pub fn display_precision(&self) -> i32 {
        match self {
            Field::Latitude | Field::Longitude => 6,
            _ => 1,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// An immutable snapshot of the aircraft's kinematic state.
///
/// Every field is inside its envelope; out-of-range inputs are clamped at
/// construction and never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightSample {
    /// Degrees, [-90, 90]
    pub latitude: f64,
    /// Degrees, [-180, 180]
    pub longitude: f64,
    /// Feet, [0, 50000]
    pub altitude: f64,
    /// Knots, [0, 1000]
    pub airspeed: f64,
    /// Degrees, [0, 360)
    pub heading: f64,
    /// Feet per minute, [-10000, 10000]
    pub vertical_speed: f64,
    pub timestamp: DateTime<Utc>,
}

impl FlightSample {
    /// Build a sample, clamping each field into its envelope.
    pub fn new(
        latitude: f64,
        longitude: f64,
        altitude: f64,
        airspeed: f64,
        heading: f64,
        vertical_speed: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            latitude: Field::Latitude.envelope().clamp(latitude),
            longitude: Field::Longitude.envelope().clamp(longitude),
            altitude: Field::Altitude.envelope().clamp(altitude),
            airspeed: Field::Airspeed.envelope().clamp(airspeed),
            heading: Field::Heading.envelope().clamp(heading),
            vertical_speed: Field::VerticalSpeed.envelope().clamp(vertical_speed),
            timestamp,
        }
    }

    /// Value of one field.
    pub fn get(&self, field: Field) -> f64 {
        match field {
            Field::Latitude => self.latitude,
            Field::Longitude => self.longitude,
            Field::Altitude => self.altitude,
            Field::Airspeed => self.airspeed,
            Field::Heading => self.heading,
            Field::VerticalSpeed => self.vertical_speed,
        }
    }

    /// Iterate `(field, value)` pairs in transmission order.
    pub fn fields(&self) -> impl Iterator<Item = (Field, f64)> + '_ {
        Field::ALL.into_iter().map(move |f| (f, self.get(f)))
    }

    /// Check the envelope invariant on every field.
    pub fn is_within_envelope(&self) -> bool {
        self.fields().all(|(f, v)| f.envelope().contains(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_table() {
        let labels: Vec<u8> = Field::ALL.iter().map(|f| f.label()).collect();
        assert_eq!(labels, vec![0x6A, 0x6B, 0x6C, 0x6D, 0x6E, 0x6F]);

        for field in Field::ALL {
            assert_eq!(Field::from_label(field.label()), Some(field));
        }
        assert_eq!(Field::from_label(0x01), None);
    }

    #[test]
    fn test_sample_is_clamped() {
        let sample = FlightSample::new(95.0, -200.0, -15.0, 1500.0, 361.5, -12_000.0, Utc::now());

        assert_eq!(sample.latitude, 90.0);
        assert_eq!(sample.longitude, -180.0);
        assert_eq!(sample.altitude, 0.0);
        assert_eq!(sample.airspeed, 1000.0);
        assert!((sample.heading - 1.5).abs() < 1e-9);
        assert_eq!(sample.vertical_speed, -10_000.0);
        assert!(sample.is_within_envelope());
    }

    #[test]
    fn test_heading_wraps_into_half_open_range() {
        let env = Field::Heading.envelope();
        assert_eq!(env.clamp(360.0), 0.0);
        assert!((env.clamp(-10.0) - 350.0).abs() < 1e-9);
        assert!(!env.contains(360.0));
        assert!(env.contains(359.9));
    }

    #[test]
    fn test_nan_never_contained() {
        for field in Field::ALL {
            let envelope = field.envelope();
            assert!(!envelope.contains(f64::NAN));
            for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
                assert!(envelope.contains(envelope.clamp(value)), "{field} {value}");
            }
        }
    }

    #[test]
    fn test_infinite_heading_is_stored_in_envelope() {
        let sample = FlightSample::new(0.0, 0.0, 0.0, 0.0, f64::INFINITY, 0.0, Utc::now());
        assert_eq!(sample.heading, 0.0);
        assert!(sample.is_within_envelope());

        let sample = FlightSample::new(0.0, 0.0, 0.0, 0.0, f64::NEG_INFINITY, 0.0, Utc::now());
        assert!(sample.is_within_envelope());
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(41.26221234, 6), 41.262212);
        assert_eq!(round_to(35000.04, 1), 35000.0);
    }

    #[test]
    fn test_sample_serializes_with_snake_case_fields() {
        let sample = FlightSample::new(41.2622, 28.7278, 35000.0, 450.0, 270.0, 0.0, Utc::now());
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["vertical_speed"], 0.0);
        assert!(json["timestamp"].is_string());
    }
}

//! Wire message types.
//!
//! This module defines the JSON documents exchanged with the outside world:
//! - REST responses for the current sample, history and ARINC encoding
//! - The per-tick push message sent to every `/ws` subscriber
//! - The payload POSTed to external sinks, and the sink registry entry
//!
//! ARINC words are rendered as strings: the label as two hex digits, the
//! other fields as fixed-width binary.

use std::collections::BTreeMap;

use arinc_core::FlightSample;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::arinc429::{Arinc429Word, DATA_MASK};
use crate::codec::CodecError;

/// Push message type tag.
pub const FLIGHT_DATA_TYPE: &str = "flight_data";

/// Render a timestamp as ISO 8601 with millisecond precision.
pub fn iso8601(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The six engineering-unit values of a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightData {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub airspeed: f64,
    pub heading: f64,
    pub vertical_speed: f64,
}

impl From<&FlightSample> for FlightData {
    fn from(s: &FlightSample) -> Self {
        Self {
            latitude: s.latitude,
            longitude: s.longitude,
            altitude: s.altitude,
            airspeed: s.airspeed,
            heading: s.heading,
            vertical_speed: s.vertical_speed,
        }
    }
}

/// A sample as returned by the REST API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    #[serde(flatten)]
    pub values: FlightData,
    pub timestamp: String,
}

impl From<&FlightSample> for SampleRecord {
    fn from(s: &FlightSample) -> Self {
        Self {
            values: FlightData::from(s),
            timestamp: iso8601(&s.timestamp),
        }
    }
}

/// One ARINC word as rendered on the wire.
///
/// # Example
/// ```json
/// { "label": "6A", "sdi": "00", "data": "1100100101111001110", "ssm": "11", "parity": "0" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRecord {
    pub label: String,
    pub sdi: String,
    pub data: String,
    pub ssm: String,
    pub parity: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timestamp: Option<String>,
}

impl WordRecord {
    /// Render a word without its timestamp.
    pub fn from_word(word: &Arinc429Word) -> Self {
        Self {
            label: format!("{:02X}", word.label),
            sdi: format!("{:02b}", word.sdi & 0b11),
            data: format!("{:019b}", word.data & DATA_MASK),
            ssm: format!("{:02b}", word.ssm & 0b11),
            parity: format!("{}", word.parity & 1),
            timestamp: None,
        }
    }

    /// Render a word including its timestamp.
    pub fn with_timestamp(word: &Arinc429Word) -> Self {
        Self {
            timestamp: Some(iso8601(&word.timestamp)),
            ..Self::from_word(word)
        }
    }

    /// Key used in the raw map of the ARINC snapshot.
    pub fn raw_key(&self) -> String {
        format!("label_{}", self.label)
    }

    /// Parse the record back into a word.
    ///
    /// The stored parity bit is kept as-is; use
    /// [`Arinc429Word::has_valid_parity`] to check it.
    pub fn to_word(&self) -> Result<Arinc429Word, CodecError> {
        let label = parse_radix(&self.label, 16, 2, "label")?;
        let sdi = parse_radix(&self.sdi, 2, 2, "sdi")?;
        let data = parse_radix(&self.data, 2, 19, "data")?;
        let ssm = parse_radix(&self.ssm, 2, 2, "ssm")?;
        let parity = parse_radix(&self.parity, 2, 1, "parity")?;

        let timestamp = match &self.timestamp {
            Some(ts) => DateTime::parse_from_rfc3339(ts)
                .map_err(|e| CodecError::Malformed(format!("timestamp: {e}")))?
                .with_timezone(&Utc),
            None => Utc::now(),
        };

        Ok(Arinc429Word {
            label: label as u8,
            sdi: sdi as u8,
            data,
            ssm: ssm as u8,
            parity: parity as u8,
            timestamp,
        })
    }
}

fn parse_radix(text: &str, radix: u32, width: usize, name: &str) -> Result<u32, CodecError> {
    if text.len() != width {
        return Err(CodecError::Malformed(format!(
            "{name} must be {width} digits, got {text:?}"
        )));
    }
    u32::from_str_radix(text, radix).map_err(|e| CodecError::Malformed(format!("{name}: {e}")))
}

/// Per-tick message pushed to every live subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: String,
    pub flight_data: FlightData,
    pub arinc_messages: Vec<WordRecord>,
}

impl TelemetryMessage {
    pub fn new(sample: &FlightSample, words: &[Arinc429Word]) -> Self {
        Self {
            kind: FLIGHT_DATA_TYPE.to_string(),
            timestamp: iso8601(&sample.timestamp),
            flight_data: FlightData::from(sample),
            arinc_messages: words.iter().map(WordRecord::from_word).collect(),
        }
    }
}

/// Body POSTed to each enabled external sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkPayload {
    pub timestamp: String,
    pub flight_data: FlightData,
    pub arinc_messages: Vec<WordRecord>,
}

impl SinkPayload {
    pub fn new(sample: &FlightSample, words: &[Arinc429Word]) -> Self {
        Self {
            timestamp: iso8601(&sample.timestamp),
            flight_data: FlightData::from(sample),
            arinc_messages: words.iter().map(WordRecord::from_word).collect(),
        }
    }
}

/// Latest sample together with its ARINC encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArincSnapshot {
    pub flight_data: SampleRecord,
    pub arinc_messages: Vec<WordRecord>,
    /// Words keyed by `label_<label>`.
    pub raw_data: BTreeMap<String, WordRecord>,
}

impl ArincSnapshot {
    pub fn new(sample: &FlightSample, words: &[Arinc429Word]) -> Self {
        let records: Vec<WordRecord> = words.iter().map(WordRecord::with_timestamp).collect();
        let raw_data = records.iter().map(|r| (r.raw_key(), r.clone())).collect();
        Self {
            flight_data: SampleRecord::from(sample),
            arinc_messages: records,
            raw_data,
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// External HTTP sink registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSinkConfig {
    /// Target URL receiving the POST.
    pub url: String,
    /// Nominal send interval in seconds, 1..=3600.
    pub interval: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

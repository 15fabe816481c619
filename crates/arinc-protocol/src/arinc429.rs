//! ARINC 429 word encoding and decoding.
//!
//! Each telemetry field travels as one 32-bit word laid out most significant
//! bit first:
//!
//! ```text
//!  31      24 23 22 21                  3 2  1  0
//! +----------+-----+---------------------+----+---+
//! |  label   | SDI |   data (19 bits)    |SSM | P |
//! +----------+-----+---------------------+----+---+
//! ```
//!
//! The data field holds the scaled magnitude of the value. Signed fields
//! mark negative values with SSM `11`. The parity bit makes the total number
//! of set bits odd.

use arinc_core::{Field, FlightSample};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::codec::CodecError;

/// Width mask of the data field.
pub const DATA_MASK: u32 = 0x7_FFFF;

/// Source/destination identifier used for every word.
pub const SDI_DEFAULT: u8 = 0b00;

/// Sign/status: positive or normal operation.
pub const SSM_POSITIVE: u8 = 0b00;

/// Sign/status: negative value.
pub const SSM_NEGATIVE: u8 = 0b11;

/// One encoded telemetry word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arinc429Word {
    pub label: u8,
    /// 2 bits.
    pub sdi: u8,
    /// 19 bits.
    pub data: u32,
    /// 2 bits.
    pub ssm: u8,
    /// 1 bit.
    pub parity: u8,
    pub timestamp: DateTime<Utc>,
}

/// Parity bit for a 31-bit payload so the full word has odd parity.
pub fn parity_bit(payload: u32) -> u8 {
    if payload.count_ones() % 2 == 0 {
        1
    } else {
        0
    }
}

/// Check that a raw 32-bit word has an odd number of set bits.
pub fn is_valid_word(raw: u32) -> bool {
    raw.count_ones() % 2 == 1
}

impl Arinc429Word {
    /// Assemble a word and compute its parity bit.
    pub fn new(label: u8, sdi: u8, data: u32, ssm: u8, timestamp: DateTime<Utc>) -> Self {
        let mut word = Self {
            label,
            sdi: sdi & 0b11,
            data: data & DATA_MASK,
            ssm: ssm & 0b11,
            parity: 0,
            timestamp,
        };
        word.parity = parity_bit(word.payload_bits());
        word
    }

    /// The 31 bits covered by parity, with bit 0 left clear.
    pub fn payload_bits(&self) -> u32 {
        (self.label as u32) << 24
            | ((self.sdi & 0b11) as u32) << 22
            | (self.data & DATA_MASK) << 3
            | ((self.ssm & 0b11) as u32) << 1
    }

    /// The full 32-bit word.
    pub fn to_bits(&self) -> u32 {
        self.payload_bits() | (self.parity & 1) as u32
    }

    /// Unpack a raw word, rejecting it if parity is even.
    pub fn from_bits(raw: u32, timestamp: DateTime<Utc>) -> Result<Self, CodecError> {
        if !is_valid_word(raw) {
            return Err(CodecError::Parity(raw));
        }
        Ok(Self {
            label: (raw >> 24) as u8,
            sdi: ((raw >> 22) & 0b11) as u8,
            data: (raw >> 3) & DATA_MASK,
            ssm: ((raw >> 1) & 0b11) as u8,
            parity: (raw & 1) as u8,
            timestamp,
        })
    }

    /// Whether the stored parity bit yields an odd-parity word.
    pub fn has_valid_parity(&self) -> bool {
        is_valid_word(self.to_bits())
    }

    /// The field this word's label maps to, if any.
    pub fn field(&self) -> Option<Field> {
        Field::from_label(self.label)
    }
}

/// Encode one field value, stamping the word with the current time.
pub fn encode(field: Field, value: f64) -> Result<Arinc429Word, CodecError> {
    encode_at(field, value, Utc::now())
}

/// Encode one field value with an explicit timestamp.
///
/// Fails with [`CodecError::Range`] when the value is outside the field's
/// envelope, even though callers are expected to clamp first.
pub fn encode_at(
    field: Field,
    value: f64,
    timestamp: DateTime<Utc>,
) -> Result<Arinc429Word, CodecError> {
    if !field.envelope().contains(value) {
        return Err(CodecError::Range { field, value });
    }

    let ssm = if field.is_signed() && value < 0.0 {
        SSM_NEGATIVE
    } else {
        SSM_POSITIVE
    };

    // truncates toward zero
    let magnitude = (value.abs() * field.scale()) as u32;
    if magnitude > DATA_MASK {
        debug!(
            field = field.name(),
            value, magnitude, "Scaled magnitude exceeds 19 bits, high bits dropped"
        );
    }

    Ok(Arinc429Word::new(
        field.label(),
        SDI_DEFAULT,
        magnitude & DATA_MASK,
        ssm,
        timestamp,
    ))
}

/// Encode all six fields of a sample in transmission order.
///
/// A field that fails to encode is logged and left out; the remaining words
/// are still returned.
pub fn encode_all(sample: &FlightSample) -> Vec<Arinc429Word> {
    sample
        .fields()
        .filter_map(|(field, value)| match encode_at(field, value, sample.timestamp) {
            Ok(word) => Some(word),
            Err(e) => {
                warn!(field = field.name(), "Failed to encode field: {}", e);
                None
            }
        })
        .collect()
}

/// Decode a word back to its field and engineering value.
pub fn decode(word: &Arinc429Word) -> Result<(Field, f64), CodecError> {
    let field = word.field().ok_or(CodecError::UnknownLabel(word.label))?;
    let magnitude = (word.data & DATA_MASK) as f64 / field.scale();

    let value = if field.is_signed() && word.ssm == SSM_NEGATIVE {
        -magnitude
    } else {
        magnitude
    };

    Ok((field, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    /// Largest magnitude that survives the 19-bit data field.
    fn representable_max(field: Field) -> f64 {
        let env = field.envelope();
        let limit = DATA_MASK as f64 / field.scale();
        if env.max_exclusive {
            limit.min(env.max - field.quantum())
        } else {
            limit.min(env.max)
        }
    }

    #[test]
    fn test_negative_latitude_example() {
        let word = encode(Field::Latitude, -41.2622).unwrap();

        assert_eq!(word.label, 0x6A);
        assert_eq!(word.sdi, 0b00);
        assert_eq!(word.ssm, SSM_NEGATIVE);
        assert_eq!(word.data, 412_622);
        assert_eq!(format!("{:019b}", word.data), "1100100101111001110");

        // 0x6A has 4 set bits, the data 11, SSM 2: 17 is odd so parity is 0
        assert_eq!(word.parity, 0);
        assert_eq!(word.to_bits().count_ones() % 2, 1);
    }

    #[test]
    fn test_parity_boundaries() {
        for field in Field::ALL {
            let zero = Arinc429Word::new(field.label(), SDI_DEFAULT, 0, SSM_POSITIVE, now());
            assert!(zero.has_valid_parity(), "all-zero data for {field}");
            assert_eq!(
                zero.parity,
                if field.label().count_ones() % 2 == 0 { 1 } else { 0 }
            );

            let ones = Arinc429Word::new(field.label(), SDI_DEFAULT, DATA_MASK, SSM_NEGATIVE, now());
            assert!(ones.has_valid_parity(), "all-one data for {field}");
            // 19 data bits plus 2 SSM bits add an odd count
            assert_eq!(ones.parity, 1 - zero.parity);
        }

        assert_eq!(parity_bit(0), 1);
        assert_eq!(parity_bit(0x7FFF_FFFE), 1);
        assert_eq!(parity_bit(0b10), 0);
    }

    #[test]
    fn test_parity_random_words() {
        let mut rng = StdRng::seed_from_u64(429);
        for _ in 0..1000 {
            let word = Arinc429Word::new(
                rng.random(),
                rng.random_range(0..4),
                rng.random_range(0..=DATA_MASK),
                rng.random_range(0..4),
                now(),
            );
            assert_eq!(word.to_bits().count_ones() % 2, 1, "word {:#010X}", word.to_bits());
        }
    }

    #[test]
    fn test_bit_layout() {
        let ts = now();
        let word = Arinc429Word::new(0x6C, 0b00, 35_000, SSM_POSITIVE, ts);
        let raw = word.to_bits();

        assert_eq!(raw >> 24, 0x6C);
        assert_eq!((raw >> 3) & DATA_MASK, 35_000);
        assert_eq!(Arinc429Word::from_bits(raw, ts).unwrap(), word);
    }

    #[test]
    fn test_from_bits_rejects_even_parity() {
        let raw = encode(Field::Heading, 270.0).unwrap().to_bits() ^ 1;
        assert!(matches!(
            Arinc429Word::from_bits(raw, now()),
            Err(CodecError::Parity(r)) if r == raw
        ));
    }

    #[test]
    fn test_unsigned_fields_ignore_sign_bits() {
        for field in [Field::Altitude, Field::Airspeed, Field::Heading] {
            let word = encode(field, field.envelope().min).unwrap();
            assert_eq!(word.ssm, SSM_POSITIVE);

            let forced = Arinc429Word::new(field.label(), SDI_DEFAULT, 100, SSM_NEGATIVE, now());
            let (_, value) = decode(&forced).unwrap();
            assert!(value > 0.0);
        }
    }

    #[test]
    fn test_signed_fields_set_ssm() {
        assert_eq!(encode(Field::Longitude, -28.7278).unwrap().ssm, SSM_NEGATIVE);
        assert_eq!(encode(Field::Longitude, 28.7278).unwrap().ssm, SSM_POSITIVE);
        assert_eq!(encode(Field::VerticalSpeed, -1500.0).unwrap().ssm, SSM_NEGATIVE);
        assert_eq!(encode(Field::VerticalSpeed, 0.0).unwrap().ssm, SSM_POSITIVE);
    }

    #[test]
    fn test_range_errors() {
        let cases = [
            (Field::Latitude, 90.5),
            (Field::Longitude, -180.01),
            (Field::Altitude, -1.0),
            (Field::Airspeed, 1000.1),
            (Field::Heading, 360.0),
            (Field::VerticalSpeed, 10_001.0),
            (Field::Altitude, f64::NAN),
        ];
        for (field, value) in cases {
            match encode(field, value) {
                Err(CodecError::Range { field: f, .. }) => assert_eq!(f, field),
                other => panic!("expected range error for {field} = {value}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_unknown_label() {
        let word = Arinc429Word::new(0x01, SDI_DEFAULT, 5, SSM_POSITIVE, now());
        assert!(matches!(decode(&word), Err(CodecError::UnknownLabel(0x01))));
    }

    #[test]
    fn test_round_trip_within_quantum() {
        let mut rng = StdRng::seed_from_u64(7);
        for field in Field::ALL {
            let max = representable_max(field);
            let min = if field.is_signed() { -max } else { field.envelope().min };

            let mut values = vec![min, max, 0.0];
            values.extend((0..500).map(|_| rng.random_range(min..=max)));

            for value in values {
                let word = encode(field, value).unwrap();
                let (decoded_field, decoded) = decode(&word).unwrap();
                assert_eq!(decoded_field, field);
                assert!(
                    (decoded - value).abs() <= field.quantum() + 1e-9,
                    "{field}: {value} decoded as {decoded}"
                );
            }
        }
    }

    #[test]
    fn test_wide_magnitudes_are_masked() {
        // 90 degrees scales to 900000, which needs 20 bits
        let word = encode(Field::Latitude, 90.0).unwrap();
        assert_eq!(word.data, 900_000 & DATA_MASK);
        assert!(word.has_valid_parity());
    }

    #[test]
    fn test_encode_all_order_and_timestamp() {
        let sample = FlightSample::new(41.2622, 28.7278, 35000.0, 450.0, 270.0, -500.0, now());
        let words = encode_all(&sample);

        let labels: Vec<u8> = words.iter().map(|w| w.label).collect();
        assert_eq!(labels, vec![0x6A, 0x6B, 0x6C, 0x6D, 0x6E, 0x6F]);
        assert!(words.iter().all(|w| w.timestamp == sample.timestamp));
        assert!(words.iter().all(|w| w.has_valid_parity()));
        assert_eq!(words[5].ssm, SSM_NEGATIVE);
    }

    #[test]
    fn test_encode_all_omits_failed_field() {
        let mut sample = FlightSample::new(41.2622, 28.7278, 35000.0, 450.0, 270.0, 0.0, now());
        // bypass the constructor clamp
        sample.altitude = 60_000.0;

        let words = encode_all(&sample);
        assert_eq!(words.len(), 5);
        assert!(words.iter().all(|w| w.label != Field::Altitude.label()));
    }
}

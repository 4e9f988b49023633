//! Platform-agnostic types for particulate-matter air quality telemetry.
//!
//! This crate provides shared types used by the telemetry store, the HTTP
//! service and the sensor sampler.
//!
//! # Features
//!
//! - Pollutant identifiers and reading attribute names
//! - The reserved device ID guard value
//! - Sort-key timestamp format
//! - SDS011 measurement frame decoding
//! - The payload pushed from samplers to the API
//!
//! # Example
//!
//! ```
//! use airq_types::{ParticulateSample, Pollutant};
//!
//! let frame = [0xAA, 0xC0, 0x55, 0x00, 0x96, 0x00, 0x01, 0x02, 0xEE, 0xAB];
//! let sample = ParticulateSample::from_frame(&frame)?;
//! assert_eq!(sample.pm25(), 8.5);
//! assert_eq!(Pollutant::Pm25.attribute(), "PM25");
//! # Ok::<(), airq_types::ParseError>(())
//! ```

pub mod error;
pub mod types;

pub use error::ParseError;
pub use types::{
    FRAME_COMMAND, FRAME_HEADER, FRAME_LEN, ParticulateSample, Pollutant, RESERVED_DEVICE_ID, ReadingPayload,
    TIMESTAMP_FORMAT, attr, checksum, format_timestamp, parse_timestamp,
};

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn frame(pm25: u16, pm10: u16) -> [u8; FRAME_LEN] {
        let [a, b] = pm25.to_le_bytes();
        let [c, d] = pm10.to_le_bytes();
        let mut bytes = [0xAA, 0xC0, a, b, c, d, 0x01, 0x02, 0x00, 0xAB];
        bytes[8] = checksum(&bytes[2..8]);
        bytes
    }

    // --- Frame decoding tests ---

    #[test]
    fn test_parse_frame_from_valid_bytes() {
        // PM2.5: 85 raw (8.5 µg/m³), PM10: 150 raw (15.0 µg/m³)
        let sample = ParticulateSample::from_frame(&frame(85, 150)).unwrap();

        assert_eq!(sample.pm25_tenths, 85);
        assert_eq!(sample.pm10_tenths, 150);
        assert_eq!(sample.sensor_id, 0x0201);
        assert_eq!(sample.pm25(), 8.5);
        assert_eq!(sample.pm10(), 15.0);
    }

    #[test]
    fn test_parse_frame_uses_high_byte() {
        // 999.9 µg/m³ = 9999 tenths = 0x270F
        let sample = ParticulateSample::from_frame(&frame(9999, 300)).unwrap();
        assert_eq!(sample.pm25(), 999.9);
        assert_eq!(sample.pm10(), 30.0);
    }

    #[test]
    fn test_parse_frame_insufficient_bytes() {
        let result = ParticulateSample::from_frame(&[0xAA, 0xC0, 0x00]);
        assert_eq!(
            result,
            Err(ParseError::InsufficientBytes {
                expected: 10,
                actual: 3
            })
        );
    }

    #[test]
    fn test_parse_frame_bad_header() {
        let mut bytes = frame(10, 20);
        bytes[1] = 0xC5;
        let err = ParticulateSample::from_frame(&bytes).unwrap_err();
        assert_eq!(err, ParseError::InvalidHeader(0xAA, 0xC5));
        assert!(err.to_string().contains("header"));
    }

    #[test]
    fn test_parse_frame_bad_checksum() {
        let mut bytes = frame(10, 20);
        bytes[8] = bytes[8].wrapping_add(1);
        assert!(matches!(
            ParticulateSample::from_frame(&bytes),
            Err(ParseError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_frame_bad_tail() {
        let mut bytes = frame(10, 20);
        bytes[9] = 0x00;
        assert_eq!(
            ParticulateSample::from_frame(&bytes),
            Err(ParseError::InvalidTail(0x00))
        );
    }

    #[test]
    fn test_checksum_wraps() {
        assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
        assert_eq!(checksum(&[]), 0);
    }

    // --- Pollutant tests ---

    #[test]
    fn test_pollutant_from_str() {
        assert_eq!("PM2.5".parse::<Pollutant>().unwrap(), Pollutant::Pm25);
        assert_eq!("pm25".parse::<Pollutant>().unwrap(), Pollutant::Pm25);
        assert_eq!(" PM10 ".parse::<Pollutant>().unwrap(), Pollutant::Pm10);
        assert!(matches!(
            "PM1".parse::<Pollutant>(),
            Err(ParseError::UnknownPollutant(_))
        ));
    }

    #[test]
    fn test_pollutant_display_round_trips() {
        for pollutant in Pollutant::ALL {
            assert_eq!(
                pollutant.to_string().parse::<Pollutant>().unwrap(),
                pollutant
            );
        }
    }

    #[test]
    fn test_pollutant_serde_uses_labels() {
        let json = serde_json::to_string(&Pollutant::Pm25).unwrap();
        assert_eq!(json, "\"PM2.5\"");
        let parsed: Pollutant = serde_json::from_str("\"PM10\"").unwrap();
        assert_eq!(parsed, Pollutant::Pm10);
    }

    // --- Timestamp tests ---

    #[test]
    fn test_format_timestamp() {
        let at = datetime!(2024-01-01 08:30:05.250 UTC);
        assert_eq!(format_timestamp(at).unwrap(), "2024-01-01T08:30:05Z");
    }

    #[test]
    fn test_format_timestamp_converts_to_utc() {
        let at = datetime!(2024-01-01 01:00:00 +2);
        assert_eq!(format_timestamp(at).unwrap(), "2023-12-31T23:00:00Z");
    }

    #[test]
    fn test_parse_timestamp_rejects_other_shapes() {
        for bad in [
            "",
            "2024-01-01",
            "2024-01-01 00:00:00Z",
            "2024-01-01T00:00:00",
            "2024-01-01T00:00:00.000Z",
            "2024-13-01T00:00:00Z",
        ] {
            assert!(
                matches!(parse_timestamp(bad), Err(ParseError::InvalidTimestamp(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_timestamp_round_trip() {
        let parsed = parse_timestamp("2024-06-30T23:59:59Z").unwrap();
        assert_eq!(parsed, datetime!(2024-06-30 23:59:59 UTC));
        assert_eq!(format_timestamp(parsed).unwrap(), "2024-06-30T23:59:59Z");
    }

    // --- Payload tests ---

    #[test]
    fn test_payload_serializes_with_attribute_names() {
        let sample = ParticulateSample::from_frame(&frame(85, 150)).unwrap();
        let payload =
            ReadingPayload::from_sample("office", &sample, datetime!(2024-01-01 00:00:00 UTC))
                .unwrap();

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["DeviceID"], "office");
        assert_eq!(json["Timestamp"], "2024-01-01T00:00:00Z");
        assert_eq!(json["PM25"], 8.5);
        assert_eq!(json["PM10"], 15.0);
    }
}

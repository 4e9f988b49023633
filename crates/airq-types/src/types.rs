//! Core types for particulate-matter telemetry.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::error::ParseError;

/// Attribute names used for stored readings and request payloads.
pub mod attr {
    /// Partition key.
    pub const DEVICE_ID: &str = "DeviceID";
    /// Sort key.
    pub const TIMESTAMP: &str = "Timestamp";
    /// PM2.5 concentration in µg/m³.
    pub const PM25: &str = "PM25";
    /// PM10 concentration in µg/m³.
    pub const PM10: &str = "PM10";
}

/// Device ID shipped in unconfigured sampler firmware.
///
/// Readings carrying this ID are rejected on insert.
pub const RESERVED_DEVICE_ID: &str = "default_device";

/// Particulate-matter pollutant measured by the sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Pollutant {
    /// Fine particles, 2.5 µm and smaller.
    #[cfg_attr(feature = "serde", serde(rename = "PM2.5"))]
    Pm25,
    /// Coarse particles, 10 µm and smaller.
    #[cfg_attr(feature = "serde", serde(rename = "PM10"))]
    Pm10,
}

impl Pollutant {
    /// All pollutants, in classification precedence order.
    pub const ALL: [Pollutant; 2] = [Pollutant::Pm25, Pollutant::Pm10];

    /// Name of the reading attribute holding this pollutant's concentration.
    ///
    /// ```
    /// use airq_types::Pollutant;
    ///
    /// assert_eq!(Pollutant::Pm25.attribute(), "PM25");
    /// assert_eq!(Pollutant::Pm10.attribute(), "PM10");
    /// ```
    #[must_use]
    pub fn attribute(self) -> &'static str {
        match self {
            Pollutant::Pm25 => attr::PM25,
            Pollutant::Pm10 => attr::PM10,
        }
    }

    /// Human-readable label, also used as the classification table key.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
        }
    }
}

impl fmt::Display for Pollutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Pollutant {
    type Err = ParseError;

    /// Accepts both the label (`PM2.5`) and the attribute name (`PM25`),
    /// case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PM2.5" | "PM25" | "PM2_5" => Ok(Pollutant::Pm25),
            "PM10" => Ok(Pollutant::Pm10),
            _ => Err(ParseError::UnknownPollutant(s.to_string())),
        }
    }
}

/// Wire format of the reading sort key.
pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

/// Parse a `YYYY-MM-DDTHH:MM:SSZ` timestamp as a UTC instant.
///
/// ```
/// use airq_types::parse_timestamp;
///
/// assert!(parse_timestamp("2024-01-01T00:00:00Z").is_ok());
/// assert!(parse_timestamp("2024-01-01T00:00:00+01:00").is_err());
/// assert!(parse_timestamp("2024-02-30T00:00:00Z").is_err());
/// ```
pub fn parse_timestamp(s: &str) -> Result<OffsetDateTime, ParseError> {
    PrimitiveDateTime::parse(s, TIMESTAMP_FORMAT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|_| ParseError::InvalidTimestamp(s.to_string()))
}

/// Format an instant as a `YYYY-MM-DDTHH:MM:SSZ` timestamp in UTC.
///
/// Sub-second precision is dropped.
pub fn format_timestamp(at: OffsetDateTime) -> Result<String, time::error::Format> {
    at.to_offset(time::UtcOffset::UTC).format(TIMESTAMP_FORMAT)
}

/// Length of an SDS011 data frame.
pub const FRAME_LEN: usize = 10;

/// First byte of every frame.
pub const FRAME_HEADER: u8 = 0xAA;

/// Command byte of a measurement frame.
pub const FRAME_COMMAND: u8 = 0xC0;

/// Last byte of every frame.
pub const FRAME_TAIL: u8 = 0xAB;

/// One measurement decoded from an SDS011-style laser dust sensor.
///
/// Concentrations are transmitted as little-endian tenths of µg/m³.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParticulateSample {
    /// PM2.5 in tenths of µg/m³.
    pub pm25_tenths: u16,
    /// PM10 in tenths of µg/m³.
    pub pm10_tenths: u16,
    /// Sensor ID bytes from the frame.
    pub sensor_id: u16,
}

impl ParticulateSample {
    /// Decode a measurement frame.
    ///
    /// The byte format is:
    /// - bytes 0-1: header `AA C0`
    /// - bytes 2-3: PM2.5 (u16 LE, divide by 10 for µg/m³)
    /// - bytes 4-5: PM10 (u16 LE, divide by 10 for µg/m³)
    /// - bytes 6-7: sensor ID
    /// - byte 8: checksum (low byte of the sum of bytes 2-7)
    /// - byte 9: tail `AB`
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if the frame is short, or its header,
    /// checksum or tail is wrong.
    #[must_use = "parsing returns a Result that should be handled"]
    pub fn from_frame(data: &[u8]) -> Result<Self, ParseError> {
        use bytes::Buf;

        if data.len() < FRAME_LEN {
            return Err(ParseError::InsufficientBytes {
                expected: FRAME_LEN,
                actual: data.len(),
            });
        }

        if data[0] != FRAME_HEADER || data[1] != FRAME_COMMAND {
            return Err(ParseError::InvalidHeader(data[0], data[1]));
        }

        let expected = checksum(&data[2..8]);
        if data[8] != expected {
            return Err(ParseError::ChecksumMismatch {
                expected,
                actual: data[8],
            });
        }

        if data[9] != FRAME_TAIL {
            return Err(ParseError::InvalidTail(data[9]));
        }

        let mut buf = &data[2..8];
        Ok(Self {
            pm25_tenths: buf.get_u16_le(),
            pm10_tenths: buf.get_u16_le(),
            sensor_id: buf.get_u16_le(),
        })
    }

    /// PM2.5 concentration in µg/m³.
    #[must_use]
    pub fn pm25(&self) -> f64 {
        f64::from(self.pm25_tenths) / 10.0
    }

    /// PM10 concentration in µg/m³.
    #[must_use]
    pub fn pm10(&self) -> f64 {
        f64::from(self.pm10_tenths) / 10.0
    }
}

/// Low byte of the sum of the payload bytes.
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Body of a reading pushed from a sampler to the API.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReadingPayload {
    #[cfg_attr(feature = "serde", serde(rename = "DeviceID"))]
    pub device_id: String,
    #[cfg_attr(feature = "serde", serde(rename = "Timestamp"))]
    pub timestamp: String,
    #[cfg_attr(feature = "serde", serde(rename = "PM25"))]
    pub pm25: f64,
    #[cfg_attr(feature = "serde", serde(rename = "PM10"))]
    pub pm10: f64,
}

impl ReadingPayload {
    /// Build a payload for a sample taken at `at`.
    pub fn from_sample(
        device_id: &str,
        sample: &ParticulateSample,
        at: OffsetDateTime,
    ) -> Result<Self, time::error::Format> {
        Ok(Self {
            device_id: device_id.to_string(),
            timestamp: format_timestamp(at)?,
            pm25: sample.pm25(),
            pm10: sample.pm10(),
        })
    }
}

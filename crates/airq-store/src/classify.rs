//! Air-quality classification of particulate readings.
//!
//! A [`ClassificationTable`] maps a pollutant concentration to a message and a
//! severity code. It is loaded once (from a TOML or JSON file, or the built-in
//! EPA breakpoints) and shared read-only afterwards.
//!
//! Table files are keyed by pollutant label. Each band has a `"min to max"`
//! range, inclusive at both ends:
//!
//! ```toml
//! [["PM2.5"]]
//! range = "0 to 12"
//! message = "Good"
//! code = 1
//!
//! [["PM2.5"]]
//! range = "12 to 35.4"
//! message = "Moderate"
//! code = 2
//! ```
//!
//! Bands are matched in file order and the first match wins, so a boundary
//! shared by two adjoining bands belongs to the earlier one. A value no band
//! covers classifies as `("Unknown", 0)`.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use airq_types::Pollutant;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::codec::decimal_from_str;

/// Message and severity code assigned to a reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub message: String,
    pub code: i64,
}

impl Classification {
    pub fn new(message: impl Into<String>, code: i64) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }

    /// The fallback for values no band covers.
    pub fn unknown() -> Self {
        Self::new("Unknown", 0)
    }
}

/// One concentration band of a pollutant.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    pub min: Decimal,
    pub max: Decimal,
    pub classification: Classification,
}

impl Band {
    /// Whether `value` lies in `[min, max]`.
    pub fn contains(&self, value: Decimal) -> bool {
        self.min <= value && value <= self.max
    }
}

/// Errors raised while loading a classification table.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Failed to read classification table {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse classification table: {0}")]
    Parse(String),
    #[error("Unknown pollutant '{0}' in classification table")]
    UnknownPollutant(String),
    #[error("{pollutant} band {index}: invalid range '{range}', expected 'min to max'")]
    InvalidRange {
        pollutant: Pollutant,
        index: usize,
        range: String,
    },
    #[error("{pollutant} band {index}: minimum {min} exceeds maximum {max}")]
    Inverted {
        pollutant: Pollutant,
        index: usize,
        min: Decimal,
        max: Decimal,
    },
    #[error("{pollutant} band {index}: starts at {min}, before the previous band ends at {previous_max}")]
    Overlap {
        pollutant: Pollutant,
        index: usize,
        min: Decimal,
        previous_max: Decimal,
    },
}

#[derive(Debug, Deserialize)]
struct RawBand {
    range: String,
    message: String,
    code: i64,
}

/// Immutable pollutant → bands lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassificationTable {
    bands: BTreeMap<Pollutant, Vec<Band>>,
}

impl ClassificationTable {
    /// The built-in table: US EPA 24-hour breakpoints, made contiguous.
    pub fn builtin() -> Self {
        fn bands(rows: &[(i64, u32, i64, u32, &str, i64)]) -> Vec<Band> {
            rows.iter()
                .map(|&(min, min_scale, max, max_scale, message, code)| Band {
                    min: Decimal::new(min, min_scale),
                    max: Decimal::new(max, max_scale),
                    classification: Classification::new(message, code),
                })
                .collect()
        }

        let mut table = BTreeMap::new();
        table.insert(
            Pollutant::Pm25,
            bands(&[
                (0, 0, 12, 0, "Good", 1),
                (12, 0, 354, 1, "Moderate", 2),
                (354, 1, 554, 1, "Unhealthy for Sensitive Groups", 3),
                (554, 1, 1504, 1, "Unhealthy", 4),
                (1504, 1, 2504, 1, "Very Unhealthy", 5),
                (2504, 1, 5004, 1, "Hazardous", 6),
            ]),
        );
        table.insert(
            Pollutant::Pm10,
            bands(&[
                (0, 0, 54, 0, "Good", 1),
                (54, 0, 154, 0, "Moderate", 2),
                (154, 0, 254, 0, "Unhealthy for Sensitive Groups", 3),
                (254, 0, 354, 0, "Unhealthy", 4),
                (354, 0, 424, 0, "Very Unhealthy", 5),
                (424, 0, 604, 0, "Hazardous", 6),
            ]),
        );
        Self { bands: table }
    }

    /// Load a table from a `.toml` or `.json` file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| TableError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Parse a TOML table.
    pub fn from_toml_str(s: &str) -> Result<Self, TableError> {
        let raw: HashMap<String, Vec<RawBand>> =
            toml::from_str(s).map_err(|e| TableError::Parse(e.to_string()))?;
        Self::from_raw(raw)
    }

    /// Parse a JSON table.
    pub fn from_json_str(s: &str) -> Result<Self, TableError> {
        let raw: HashMap<String, Vec<RawBand>> =
            serde_json::from_str(s).map_err(|e| TableError::Parse(e.to_string()))?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: HashMap<String, Vec<RawBand>>) -> Result<Self, TableError> {
        let mut bands = BTreeMap::new();

        for (key, rows) in raw {
            let pollutant: Pollutant = key
                .parse()
                .map_err(|_| TableError::UnknownPollutant(key.clone()))?;

            let mut parsed: Vec<Band> = Vec::with_capacity(rows.len());
            for (index, row) in rows.into_iter().enumerate() {
                let (min, max) =
                    parse_range(&row.range).ok_or_else(|| TableError::InvalidRange {
                        pollutant,
                        index,
                        range: row.range.clone(),
                    })?;

                if min > max {
                    return Err(TableError::Inverted {
                        pollutant,
                        index,
                        min,
                        max,
                    });
                }

                if let Some(previous) = parsed.last()
                    && min < previous.max
                {
                    return Err(TableError::Overlap {
                        pollutant,
                        index,
                        min,
                        previous_max: previous.max,
                    });
                }

                parsed.push(Band {
                    min,
                    max,
                    classification: Classification::new(row.message, row.code),
                });
            }

            bands.insert(pollutant, parsed);
        }

        Ok(Self { bands })
    }

    /// Bands configured for a pollutant, in match order.
    pub fn bands(&self, pollutant: Pollutant) -> &[Band] {
        self.bands.get(&pollutant).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Classify a concentration. First matching band wins.
    pub fn classify(&self, pollutant: Pollutant, value: Decimal) -> Classification {
        self.bands(pollutant)
            .iter()
            .find(|band| band.contains(value))
            .map(|band| band.classification.clone())
            .unwrap_or_else(Classification::unknown)
    }

    /// Classify a reading from PM2.5 if present, else PM10.
    ///
    /// Only one pollutant is ever reported, even when both are present.
    pub fn classify_reading(&self, pm25: Option<Decimal>, pm10: Option<Decimal>) -> Classification {
        match (pm25, pm10) {
            (Some(v), _) => self.classify(Pollutant::Pm25, v),
            (None, Some(v)) => self.classify(Pollutant::Pm10, v),
            (None, None) => Classification::unknown(),
        }
    }
}

/// Parse `"min to max"`.
fn parse_range(range: &str) -> Option<(Decimal, Decimal)> {
    let (min, max) = range.split_once(" to ")?;
    Some((decimal_from_str(min).ok()?, decimal_from_str(max).ok()?))
}

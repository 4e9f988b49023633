//! Data models for stored readings.

use airq_types::{Pollutant, RESERVED_DEVICE_ID, attr, parse_timestamp};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::classify::Classification;
use crate::codec::{self, AttributeValue, Item};
use crate::error::{Error, Result};

/// Fields every insert request must carry.
pub const REQUIRED_FIELDS: [&str; 4] = [attr::DEVICE_ID, attr::TIMESTAMP, attr::PM25, attr::PM10];

/// A reading as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub device_id: String,
    pub timestamp: String,
    /// PM2.5 concentration in µg/m³.
    pub pm25: Option<Decimal>,
    /// PM10 concentration in µg/m³.
    pub pm10: Option<Decimal>,
    /// Device-supplied attributes outside the fixed schema.
    pub extra: Item,
}

impl Reading {
    /// Build a reading from a stored item.
    ///
    /// Returns `None` if the item lacks either key attribute. A PM attribute
    /// that is not a number is kept in `extra` untouched.
    pub fn from_item(mut item: Item) -> Option<Self> {
        let device_id = take_string(&mut item, attr::DEVICE_ID)?;
        let timestamp = take_string(&mut item, attr::TIMESTAMP)?;
        let pm25 = take_decimal(&mut item, Pollutant::Pm25.attribute());
        let pm10 = take_decimal(&mut item, Pollutant::Pm10.attribute());

        Some(Self {
            device_id,
            timestamp,
            pm25,
            pm10,
            extra: item,
        })
    }

    /// The stored item form.
    pub fn to_item(&self) -> Item {
        let mut item = self.extra.clone();
        item.insert(
            attr::DEVICE_ID.to_string(),
            AttributeValue::S(self.device_id.clone()),
        );
        item.insert(
            attr::TIMESTAMP.to_string(),
            AttributeValue::S(self.timestamp.clone()),
        );
        if let Some(pm25) = self.pm25 {
            item.insert(attr::PM25.to_string(), AttributeValue::N(pm25));
        }
        if let Some(pm10) = self.pm10 {
            item.insert(attr::PM10.to_string(), AttributeValue::N(pm10));
        }
        item
    }

    /// JSON object for transport, numbers rendered as strings.
    pub fn to_transport(&self) -> Map<String, Value> {
        codec::item_to_transport(&self.to_item())
    }
}

fn take_string(item: &mut Item, name: &str) -> Option<String> {
    match item.remove(name)? {
        AttributeValue::S(s) => Some(s),
        other => {
            item.insert(name.to_string(), other);
            None
        }
    }
}

fn take_decimal(item: &mut Item, name: &str) -> Option<Decimal> {
    match item.remove(name)? {
        AttributeValue::N(d) => Some(d),
        other => {
            item.insert(name.to_string(), other);
            None
        }
    }
}

/// The newest reading of a device with its classification.
#[derive(Debug, Clone, PartialEq)]
pub struct LatestReading {
    pub reading: Reading,
    pub classification: Classification,
}

impl LatestReading {
    /// JSON object for transport, with `Message` and `Code` added.
    pub fn to_transport(&self) -> Map<String, Value> {
        let mut out = self.reading.to_transport();
        out.insert(
            "Message".to_string(),
            Value::String(self.classification.message.clone()),
        );
        out.insert("Code".to_string(), Value::from(self.classification.code));
        out
    }
}

/// A validated insert request.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReading {
    pub device_id: String,
    pub timestamp: String,
    pub pm25: Decimal,
    pub pm10: Decimal,
    pub extra: Item,
}

impl NewReading {
    /// Validate a JSON request payload.
    ///
    /// Checks run in order: reserved device, missing fields, field shape,
    /// timestamp, numeric decode. A field that is `null` counts as missing.
    pub fn from_json(payload: &Value) -> Result<Self> {
        let Value::Object(map) = payload else {
            return Err(Error::InvalidField {
                field: "body".to_string(),
                reason: "expected a JSON object".to_string(),
            });
        };

        if map.get(attr::DEVICE_ID).and_then(Value::as_str) == Some(RESERVED_DEVICE_ID) {
            return Err(Error::InvalidDevice(RESERVED_DEVICE_ID.to_string()));
        }

        let missing: Vec<&'static str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|field| map.get(*field).is_none_or(Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingFields(missing));
        }

        let device_id = non_empty_string(map, attr::DEVICE_ID)?;
        let timestamp = non_empty_string(map, attr::TIMESTAMP)?;

        parse_timestamp(&timestamp).map_err(|e| Error::InvalidTimestamp(e.to_string()))?;

        let pm25 = concentration(map, Pollutant::Pm25.attribute())?;
        let pm10 = concentration(map, Pollutant::Pm10.attribute())?;

        let extra = map
            .iter()
            .filter(|(name, _)| !REQUIRED_FIELDS.contains(&name.as_str()))
            .map(|(name, value)| Ok((name.clone(), codec::encode_value(value)?)))
            .collect::<Result<Item>>()?;

        Ok(Self {
            device_id,
            timestamp,
            pm25,
            pm10,
            extra,
        })
    }

    /// The item to store.
    pub fn into_item(self) -> Item {
        Reading {
            device_id: self.device_id,
            timestamp: self.timestamp,
            pm25: Some(self.pm25),
            pm10: Some(self.pm10),
            extra: self.extra,
        }
        .to_item()
    }
}

fn non_empty_string(map: &Map<String, Value>, field: &str) -> Result<String> {
    match map.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(Error::InvalidField {
            field: field.to_string(),
            reason: "must not be empty".to_string(),
        }),
        _ => Err(Error::InvalidField {
            field: field.to_string(),
            reason: "must be a string".to_string(),
        }),
    }
}

fn concentration(map: &Map<String, Value>, field: &str) -> Result<Decimal> {
    let value = match map.get(field) {
        Some(Value::String(s)) => codec::decimal_from_str(s)?,
        Some(number @ Value::Number(_)) => match codec::encode_value(number)? {
            AttributeValue::N(d) => d,
            _ => return Err(Error::Decode(format!("{field} is not a number"))),
        },
        _ => return Err(Error::Decode(format!("{field} must be a number"))),
    };

    if value.is_sign_negative() && !value.is_zero() {
        return Err(Error::InvalidField {
            field: field.to_string(),
            reason: format!("must not be negative, got {value}"),
        });
    }
    Ok(value)
}

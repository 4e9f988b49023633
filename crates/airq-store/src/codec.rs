//! Exact-decimal codec for reading attributes.
//!
//! Incoming JSON numbers are floats. Storing them as binary floats would drift
//! (`0.1 + 0.2` style), so every number is converted to a [`Decimal`] through
//! its canonical string form: the shortest digits that round-trip the float,
//! keeping one fractional zero for integral values (`15.0`). The decimal is
//! never built from the float's binary value.
//!
//! On the way out, decimals are rendered back to strings, since JSON numbers
//! cannot carry arbitrary precision. A decimal keeps its scale, so the
//! string that went in is the string that comes out:
//!
//! ```
//! use airq_store::codec::{decimal_from_str, transport_string};
//!
//! let stored = decimal_from_str("35.400")?;
//! assert_eq!(transport_string(&stored), "35.400");
//! # Ok::<(), airq_store::Error>(())
//! ```

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// A typed attribute value as held by the range store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    /// String.
    #[serde(rename = "S")]
    S(String),
    /// Exact decimal number.
    #[serde(rename = "N")]
    N(Decimal),
    #[serde(rename = "BOOL")]
    Bool(bool),
    #[serde(rename = "NULL")]
    Null,
    /// List of values.
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
    /// Nested map.
    #[serde(rename = "M")]
    M(BTreeMap<String, AttributeValue>),
}

impl AttributeValue {
    /// The string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    /// The decimal payload, if this is a number.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            AttributeValue::N(d) => Some(*d),
            _ => None,
        }
    }
}

/// A stored item: attribute name to value.
pub type Item = BTreeMap<String, AttributeValue>;

/// Convert a float to an exact decimal via its canonical string form.
///
/// # Errors
///
/// Returns [`Error::Decode`] for NaN, infinities and magnitudes a decimal
/// cannot represent.
pub fn decimal_from_float(value: f64) -> Result<Decimal> {
    if !value.is_finite() {
        return Err(Error::Decode(format!("{value} is not a finite number")));
    }
    // Debug formatting gives the shortest round-trip digits and keeps ".0".
    decimal_from_str(&format!("{value:?}"))
}

/// Parse a decimal string, accepting exponent notation.
///
/// The scale of the input is preserved, so `"8.50"` stays `"8.50"`. Parsing
/// is exact: input with more digits than a decimal holds is rejected rather
/// than rounded, and only a sign, digits, `.` and an exponent are accepted.
pub fn decimal_from_str(s: &str) -> Result<Decimal> {
    let s = s.trim();
    let invalid = |reason: &dyn std::fmt::Display| {
        Error::Decode(format!("'{s}' is not a decimal number: {reason}"))
    };

    if s.is_empty() {
        return Err(invalid(&"empty string"));
    }
    if let Some(c) = s
        .chars()
        .find(|c| !c.is_ascii_digit() && !matches!(c, '+' | '-' | '.' | 'e' | 'E'))
    {
        return Err(invalid(&format!("unexpected character '{c}'")));
    }

    let (mantissa, exponent) = match s.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => {
            let exponent = exponent.parse::<i32>().map_err(|e| invalid(&e))?;
            (mantissa, exponent)
        }
        None => (s, 0),
    };
    let mut value = Decimal::from_str_exact(mantissa).map_err(|e| invalid(&e))?;

    // Shift the scale rather than multiplying so no digits are rounded away.
    let scale = i64::from(value.scale()) - i64::from(exponent);
    if scale >= 0 {
        let scale = u32::try_from(scale).map_err(|e| invalid(&e))?;
        value.set_scale(scale).map_err(|e| invalid(&e))?;
    } else {
        value.set_scale(0).map_err(|e| invalid(&e))?;
        for _ in 0..scale.unsigned_abs() {
            value = value
                .checked_mul(Decimal::TEN)
                .ok_or_else(|| invalid(&"out of range"))?;
        }
    }
    Ok(value)
}

/// Render a decimal for transport.
pub fn transport_string(value: &Decimal) -> String {
    value.to_string()
}

/// Convert a JSON value to an attribute value, recursively.
///
/// Floats go through [`decimal_from_float`]; integers convert exactly.
/// Strings, booleans and nulls pass through.
pub fn encode_value(value: &Value) -> Result<AttributeValue> {
    Ok(match value {
        Value::Null => AttributeValue::Null,
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                AttributeValue::N(Decimal::from(i))
            } else if let Some(u) = n.as_u64() {
                AttributeValue::N(Decimal::from(u))
            } else {
                let f = n
                    .as_f64()
                    .ok_or_else(|| Error::Decode(format!("unsupported number {n}")))?;
                AttributeValue::N(decimal_from_float(f)?)
            }
        }
        Value::Array(values) => {
            AttributeValue::L(values.iter().map(encode_value).collect::<Result<_>>()?)
        }
        Value::Object(map) => AttributeValue::M(encode_map(map)?),
    })
}

/// Convert a JSON object to an item, recursively.
pub fn encode_map(map: &Map<String, Value>) -> Result<Item> {
    map.iter()
        .map(|(k, v)| Ok((k.clone(), encode_value(v)?)))
        .collect()
}

/// Convert an attribute value to JSON for transport.
///
/// Numbers become strings so no precision is lost on the wire.
pub fn to_transport(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::S(s) => Value::String(s.clone()),
        AttributeValue::N(d) => Value::String(transport_string(d)),
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Null => Value::Null,
        AttributeValue::L(values) => Value::Array(values.iter().map(to_transport).collect()),
        AttributeValue::M(map) => Value::Object(item_to_transport(map)),
    }
}

/// Convert a whole item to a JSON object for transport.
pub fn item_to_transport(item: &Item) -> Map<String, Value> {
    item.iter()
        .map(|(k, v)| (k.clone(), to_transport(v)))
        .collect()
}

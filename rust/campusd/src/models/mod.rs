//! Typed shapes of the backend's DTOs. Rows are decoded into these at the
//! API boundary, so a malformed payload fails once, loudly, instead of
//! leaking half-shaped JSON into views.

pub mod academics;
pub mod attendance;
pub mod billing;
pub mod custom_fields;
pub mod diary;
pub mod fees;
pub mod hostel;
pub mod id_cards;
pub mod scheduling;
pub mod schools;
pub mod students;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Record id as the backend sends it: integer ids from the REST API, uuid
/// strings from Supabase tables. Stored as text either way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(String);

impl RecordId {
    #[cfg(test)]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for RecordId {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        // Integer ids round-trip as numbers so patched rows compare equal to
        // freshly fetched ones.
        match self.0.parse::<i64>() {
            Ok(n) if n.to_string() == self.0 => s.serialize_i64(n),
            _ => s.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }
        Ok(match Raw::deserialize(d)? {
            Raw::Int(n) => Self(n.to_string()),
            Raw::Text(s) => Self(s),
        })
    }
}

/// Decodes a list payload and re-encodes it for the cache, so the cache only
/// ever holds rows that matched the typed shape.
pub fn normalize_rows<T>(rows: Vec<serde_json::Value>) -> Result<serde_json::Value, serde_json::Error>
where
    T: serde::de::DeserializeOwned + Serialize,
{
    let typed: Vec<T> = rows
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<_, _>>()?;
    serde_json::to_value(typed)
}

pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

pub fn round_money(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

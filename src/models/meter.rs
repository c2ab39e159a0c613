use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable key identifying one physical meter within an account
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeterIdentifier(String);

impl MeterIdentifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MeterIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MeterIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for MeterIdentifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("Meter identifier cannot be empty".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }
}

/// One entry of the vendor's meter listing.
///
/// Some accounts report the meter number as a JSON number rather than a string.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MeterEntry {
    pub meter_number: RawMeterNumber,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum RawMeterNumber {
    Text(String),
    Number(u64),
}

impl RawMeterNumber {
    pub fn into_identifier(self) -> Option<MeterIdentifier> {
        match self {
            RawMeterNumber::Text(text) => text.parse().ok(),
            RawMeterNumber::Number(number) => Some(MeterIdentifier(number.to_string())),
        }
    }
}

//! Timestamps for time-series datasets.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

use crate::ViewerError;

/// Milliseconds since the Unix epoch, as used in REST paths.
///
/// The server serializes datetimes as (possibly fractional) millisecond numbers; the
/// fractional part is truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn millis(&self) -> i64 {
        self.0
    }

    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.0).single()
    }

    /// Human readable UTC form, e.g. `Mon, 15 Jan 2024 12:00:00 GMT`.
    pub fn to_utc_string(&self) -> String {
        match self.to_datetime() {
            Some(dt) => dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            None => format!("{}ms", self.0),
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Timestamp {
    type Err = ViewerError;

    /// Accepts integer milliseconds or an ISO 8601 datetime.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(ms) = s.parse::<i64>() {
            return Ok(Self(ms));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc).into());
        }
        // Try without timezone (assume UTC)
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
            return Ok(Utc.from_utc_datetime(&ndt).into());
        }
        Err(ViewerError::InvalidTime(s.to_string()))
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Float(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(ms) => Ok(Self(ms)),
            Raw::Float(ms) if ms.is_finite() => Ok(Self(ms.trunc() as i64)),
            Raw::Float(ms) => Err(serde::de::Error::custom(format!(
                "non-finite timestamp {}",
                ms
            ))),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_numeric_forms() {
        let times: Vec<Timestamp> =
            serde_json::from_str("[1705320000000, 1705323600000.0]").unwrap();
        assert_eq!(times, vec![Timestamp(1705320000000), Timestamp(1705323600000)]);
    }

    #[test]
    fn test_deserialize_iso_string() {
        let t: Timestamp = serde_json::from_str(r#""2024-01-15T12:00:00Z""#).unwrap();
        assert_eq!(t, Timestamp(1705320000000));
    }

    #[test]
    fn test_display_is_integer_millis() {
        assert_eq!(Timestamp(1705320000000).to_string(), "1705320000000");
    }

    #[test]
    fn test_utc_string() {
        assert_eq!(
            Timestamp(1705320000000).to_utc_string(),
            "Mon, 15 Jan 2024 12:00:00 GMT"
        );
    }

    #[test]
    fn test_from_str_rejects_garbage() {
        assert!("yesterday".parse::<Timestamp>().is_err());
    }
}

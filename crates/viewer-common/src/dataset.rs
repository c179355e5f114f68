//! Dataset catalog entries and their lazily loaded descriptions.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Unique identifier for a dataset.
///
/// The server numbers datasets by their position in its configuration, but string ids are
/// accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DatasetId(pub String);

impl DatasetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DatasetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl<'de> Deserialize<'de> for DatasetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Self(n.to_string()),
            Raw::Text(s) => Self(s),
        })
    }
}

/// A dataset as listed by `GET /datasets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,

    /// Human-readable name, also used by the times endpoint
    #[serde(default)]
    pub label: String,

    /// Backing driver name reported by the server
    #[serde(default)]
    pub driver: Option<String>,

    /// Filled in by `GET /datasets/{id}`
    #[serde(default)]
    pub description: Option<DatasetDescription>,
}

impl Dataset {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: DatasetId::new(id),
            label: label.into(),
            driver: None,
            description: None,
        }
    }
}

/// Body of `GET /datasets`.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetsResponse {
    pub datasets: Vec<Dataset>,
}

/// Body of `GET /datasets/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescription {
    #[serde(default)]
    pub data_vars: BTreeMap<String, DataVar>,
}

impl DatasetDescription {
    /// First variable in name order, used when nothing has been chosen explicitly.
    pub fn default_var(&self) -> Option<&str> {
        self.data_vars.keys().next().map(String::as_str)
    }
}

/// Per-variable metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataVar {
    /// Attribute pairs in server order. Sent either as `[[k, v], ...]` or as an object.
    #[serde(default, deserialize_with = "deserialize_attrs")]
    pub attrs: Vec<(String, String)>,
}

fn deserialize_attrs<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<(String, String)>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Pairs(Vec<(String, serde_json::Value)>),
        Object(serde_json::Map<String, serde_json::Value>),
    }

    let pairs = match Raw::deserialize(deserializer)? {
        Raw::Pairs(pairs) => pairs,
        Raw::Object(map) => map.into_iter().collect(),
    };
    Ok(pairs
        .into_iter()
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datasets_response_accepts_integer_ids() {
        let json = r#"{"datasets": [{"label": "EIDA50", "driver": "eida50", "id": 0}, {"id": "B"}]}"#;
        let response: DatasetsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.datasets[0].id, DatasetId::new("0"));
        assert_eq!(response.datasets[0].label, "EIDA50");
        assert_eq!(response.datasets[1].id, DatasetId::new("B"));
        assert!(response.datasets[1].description.is_none());
    }

    #[test]
    fn test_description_attrs_as_pairs() {
        let json = r#"{"data_vars": {"air_temperature": {"attrs": [["units", "K"], ["level", 850]]}}}"#;
        let description: DatasetDescription = serde_json::from_str(json).unwrap();
        let var = &description.data_vars["air_temperature"];
        assert_eq!(
            var.attrs,
            vec![
                ("units".to_string(), "K".to_string()),
                ("level".to_string(), "850".to_string())
            ]
        );
        assert_eq!(description.default_var(), Some("air_temperature"));
    }

    #[test]
    fn test_description_attrs_as_object() {
        let json = r#"{"data_vars": {"rain": {"attrs": {"units": "mm"}}}}"#;
        let description: DatasetDescription = serde_json::from_str(json).unwrap();
        assert_eq!(
            description.data_vars["rain"].attrs,
            vec![("units".to_string(), "mm".to_string())]
        );
    }
}

//! Persisted shapes of the containers.
//!
//! Components are written as `{"type": <registered name>, "value": <serde value>}`.
//! A [`UniqueMap`](crate::UniqueMap) is written as
//!
//! ```json
//! {"components": [...], "observers": {"Health": ["on_health"]}, "extra": "fields"}
//! ```
//!
//! and [`PersistedMap`] also accepts the two earlier layouts, a bare keyed
//! mapping under `_components` and a `[components, observers]` pair.

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One component in persisted form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedComponent {
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: Value,
}

/// Observer names per key name
pub type PersistedObservers = IndexMap<String, Vec<String>>;

/// Current persisted layout of a [`UniqueMap`](crate::UniqueMap)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueMapState {
    pub components: Vec<PersistedComponent>,
    #[serde(default)]
    pub observers: PersistedObservers,
    /// Extra fields carried alongside the components, kept verbatim
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

/// Any accepted persisted layout of a [`UniqueMap`](crate::UniqueMap)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PersistedMap {
    Current(UniqueMapState),
    /// Key name to component, without observers
    LegacyMapping {
        #[serde(rename = "_components")]
        components: IndexMap<String, PersistedComponent>,
    },
    /// `[components, observers]`
    LegacyPair(Vec<PersistedComponent>, PersistedObservers),
}

impl PersistedMap {
    /// Convert any accepted layout to the current one
    pub fn normalize(self) -> UniqueMapState {
        match self {
            PersistedMap::Current(state) => state,
            PersistedMap::LegacyMapping { components } => {
                debug!("restoring legacy keyed mapping of {} components", components.len());
                UniqueMapState {
                    components: components.into_values().collect(),
                    observers: PersistedObservers::new(),
                    attributes: Map::new(),
                }
            }
            PersistedMap::LegacyPair(components, observers) => {
                debug!("restoring legacy component/observer pair");
                UniqueMapState {
                    components,
                    observers,
                    attributes: Map::new(),
                }
            }
        }
    }
}

impl From<UniqueMapState> for PersistedMap {
    fn from(state: UniqueMapState) -> Self {
        PersistedMap::Current(state)
    }
}

/// Persisted layout of a [`MultiBag`](crate::MultiBag): the root sequence only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiBagState {
    pub components: Vec<PersistedComponent>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn component(name: &str, value: Value) -> PersistedComponent {
        PersistedComponent {
            type_name: name.to_string(),
            value,
        }
    }

    #[test]
    fn test_detects_current_layout() {
        let state: PersistedMap = serde_json::from_value(json!({
            "components": [{"type": "Health", "value": 3}],
            "observers": {"Health": ["on_health"]},
            "owner": "player"
        }))
        .unwrap();
        let state = state.normalize();
        assert_eq!(state.components, vec![component("Health", json!(3))]);
        assert_eq!(state.observers["Health"], vec!["on_health".to_string()]);
        assert_eq!(state.attributes["owner"], json!("player"));
    }

    #[test]
    fn test_observers_default_to_empty() {
        let state: PersistedMap =
            serde_json::from_value(json!({"components": []})).unwrap();
        assert!(matches!(&state, PersistedMap::Current(s) if s.observers.is_empty()));
    }

    #[test]
    fn test_detects_legacy_mapping() {
        let state: PersistedMap = serde_json::from_value(json!({
            "_components": {
                "Health": {"type": "Health", "value": 3},
                "Name": {"type": "Name", "value": "orc"}
            }
        }))
        .unwrap();
        assert!(matches!(state, PersistedMap::LegacyMapping { .. }));
        let state = state.normalize();
        assert_eq!(
            state.components,
            vec![component("Health", json!(3)), component("Name", json!("orc"))]
        );
        assert!(state.observers.is_empty());
    }

    #[test]
    fn test_detects_legacy_pair() {
        let state: PersistedMap = serde_json::from_value(json!([
            [{"type": "Health", "value": 3}],
            {"Health": ["on_health"]}
        ]))
        .unwrap();
        assert!(matches!(state, PersistedMap::LegacyPair(..)));
        let state = state.normalize();
        assert_eq!(state.components.len(), 1);
        assert_eq!(state.observers.len(), 1);
    }

    #[test]
    fn test_attributes_flatten_on_write() {
        let mut attributes = Map::new();
        attributes.insert("level".to_string(), json!(2));
        let state = MultiBagState {
            components: vec![component("Health", json!(1))],
            attributes,
        };
        assert_eq!(
            serde_json::to_value(&state).unwrap(),
            json!({"components": [{"type": "Health", "value": 1}], "level": 2})
        );
    }
}

//! The declarative graph description `GraphEngine::bind` consumes.
//!
//! Grounded on `hbflow.core.engine.GraphEngine.init_from_dictionary`:
//! a decoded configuration map, optionally wrapped in an outer `graph:`
//! key, deserialized into this struct family. `processes` is an
//! `IndexMap` rather than a `HashMap` because §4.5's resolution algorithm
//! walks "every ProcessDesc in declaration order" — order must survive
//! deserialization, which a `HashMap` does not guarantee.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::GraphError;

#[derive(Debug, Clone, Deserialize)]
pub struct GraphDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub processes: IndexMap<String, ProcessDescriptor>,
    #[serde(default)]
    pub connections: Vec<ConnectionDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessDescriptor {
    pub component: String,
    #[serde(default)]
    pub group: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    pub source: EndpointDescriptor,
    pub target: EndpointDescriptor,
    #[serde(default)]
    pub capacity: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointDescriptor {
    pub process: String,
    pub port: String,
}

impl GraphDescriptor {
    /// Accept either a bare graph map or one wrapped under an outer
    /// `graph:` key, per `init_from_dictionary`'s unwrap rule.
    pub fn from_value(value: serde_yaml::Value) -> Result<Self, GraphError> {
        let unwrapped = match &value {
            serde_yaml::Value::Mapping(map) => map
                .get(serde_yaml::Value::String("graph".to_string()))
                .cloned()
                .unwrap_or(value),
            _ => value,
        };
        serde_yaml::from_value(unwrapped)
            .map_err(|e| GraphError::MalformedDescriptor(e.to_string()))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, GraphError> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(text).map_err(|e| GraphError::MalformedDescriptor(e.to_string()))?;
        Self::from_value(value)
    }
}

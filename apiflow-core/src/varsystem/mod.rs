mod template;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use template::{contains_var, is_valid_key, parse_segments, single_var, substitute, Segment};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Var {
    pub value: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
}

fn default_enabled() -> bool {
    true
}

impl Var {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            enabled: true,
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VarError {
    #[error("invalid variable key: {0:?}")]
    InvalidKey(String),
    #[error("unclosed variable token at offset {offset}")]
    Unclosed { offset: usize },
    #[error("variable not found: {0}")]
    KeyNotFound(String),
}

/// Anything that can answer `{{key}}` lookups.
pub trait VarLookup {
    fn lookup(&self, key: &str) -> Option<String>;
}

/// Key to value map backing environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VarMap(BTreeMap<String, Var>);

impl VarMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, var: Var) -> Option<Var> {
        self.0.insert(key.into(), var)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), Var::new(value));
    }

    pub fn get(&self, key: &str) -> Option<&Var> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Var)> {
        self.0.iter()
    }

    /// Copy of the map keeping only enabled entries.
    pub fn enabled_only(&self) -> VarMap {
        VarMap(
            self.0
                .iter()
                .filter(|(_, v)| v.enabled)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// `current` overrides `global` key by key.
    pub fn merge(global: &VarMap, current: &VarMap) -> VarMap {
        let mut out = global.clone();
        for (k, v) in &current.0 {
            out.0.insert(k.clone(), v.clone());
        }
        out
    }

    pub fn substitute(&self, input: &str) -> Result<String, VarError> {
        substitute(self, input)
    }
}

impl VarLookup for VarMap {
    fn lookup(&self, key: &str) -> Option<String> {
        self.0.get(key).map(|v| v.value.clone())
    }
}

impl<K, V> FromIterator<(K, V)> for VarMap
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        VarMap(
            iter.into_iter()
                .map(|(k, v)| (k.into(), Var::new(v)))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_current() {
        let global: VarMap = [("a", "1"), ("b", "2")].into_iter().collect();
        let current: VarMap = [("b", "20"), ("c", "30")].into_iter().collect();
        let merged = VarMap::merge(&global, &current);
        assert_eq!(merged.lookup("a").as_deref(), Some("1"));
        assert_eq!(merged.lookup("b").as_deref(), Some("20"));
        assert_eq!(merged.lookup("c").as_deref(), Some("30"));
    }

    #[test]
    fn merge_does_not_filter_disabled() {
        let mut global = VarMap::new();
        global.insert(
            "off",
            Var {
                value: "x".into(),
                enabled: false,
                description: String::new(),
            },
        );
        let merged = VarMap::merge(&global, &VarMap::new());
        assert!(merged.get("off").is_some());
        assert!(merged.enabled_only().get("off").is_none());
    }
}

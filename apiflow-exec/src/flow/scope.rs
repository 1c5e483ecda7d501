use std::collections::BTreeMap;

use apiflow_core::varsystem::{VarLookup, VarMap};
use serde_json::{Map, Value as JsonValue};

/// Variables visible to one run: the static environment plus the outputs
/// recorded so far, keyed by node name.
///
/// Lookups try node outputs first, then the environment.
#[derive(Debug, Clone, Default)]
pub struct RunScope {
    env: VarMap,
    nodes: BTreeMap<String, JsonValue>,
    /// `response`, `header`, `body` and `query` of the most recent request.
    last: Map<String, JsonValue>,
}

impl RunScope {
    /// Disabled environment entries are not visible.
    pub fn new(env: &VarMap) -> Self {
        Self {
            env: env.enabled_only(),
            nodes: BTreeMap::new(),
            last: Map::new(),
        }
    }

    pub fn set_node(&mut self, name: impl Into<String>, value: JsonValue) {
        self.nodes.insert(name.into(), value);
    }

    pub fn node(&self, name: &str) -> Option<&JsonValue> {
        self.nodes.get(name)
    }

    /// Record the exchange of the request that just finished.
    pub fn set_last_request(&mut self, queries: JsonValue, response: JsonValue) {
        self.last.clear();
        self.last.insert("header".into(), response["headers"].clone());
        self.last.insert("body".into(), response["body"].clone());
        self.last.insert("query".into(), queries);
        self.last.insert("response".into(), response);
    }

    pub fn env(&self) -> &VarMap {
        &self.env
    }

    pub fn nodes(&self) -> &BTreeMap<String, JsonValue> {
        &self.nodes
    }

    /// Expression root: environment entries and node outputs side by side,
    /// node outputs shadowing same-named entries. Also reachable under `env`
    /// and `node`; the last request's exchange sits under `response`,
    /// `header`, `body` and `query`.
    pub fn root(&self) -> JsonValue {
        let env: Map<String, JsonValue> = self
            .env
            .iter()
            .map(|(k, v)| (k.clone(), JsonValue::String(v.value.clone())))
            .collect();
        let nodes: Map<String, JsonValue> = self
            .nodes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut root = env.clone();
        root.extend(nodes.clone());
        root.extend(self.last.clone());
        root.insert("env".into(), JsonValue::Object(env));
        root.insert("node".into(), JsonValue::Object(nodes));
        JsonValue::Object(root)
    }
}

impl VarLookup for RunScope {
    fn lookup(&self, key: &str) -> Option<String> {
        let mut parts = key.split('.');
        let head = parts.next()?;
        if let Some(mut cur) = self.nodes.get(head) {
            let mut found = true;
            for seg in parts {
                let next = match cur {
                    JsonValue::Object(m) => m.get(seg),
                    JsonValue::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
                    _ => None,
                };
                match next {
                    Some(v) => cur = v,
                    None => {
                        found = false;
                        break;
                    }
                }
            }
            if found {
                return Some(render(cur));
            }
        }
        self.env.lookup(key)
    }
}

fn render(v: &JsonValue) -> String {
    match v {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

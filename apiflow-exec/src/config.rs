use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use apiflow_core::error::{Classify, ErrorKind};
use apiflow_core::types::NodeKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown node kind in node_timeouts_ms: {0}")]
    UnknownKind(String),
}

impl Classify for LoadError {
    fn kind(&self) -> ErrorKind {
        match self {
            LoadError::Io(_) => ErrorKind::Internal,
            _ => ErrorKind::InvalidArgument,
        }
    }
}

/// Runtime knobs. Every field has a default, so an empty document is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub node_timeout_ms: u64,
    /// Per node-kind override, keyed `REQUEST`, `IF`, ... A value of 0 disables the timeout.
    pub node_timeouts_ms: BTreeMap<String, u64>,
    pub http_timeout_ms: u64,
    pub max_response_bytes: usize,
    pub status_buffer: usize,
    pub compress_threshold_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            node_timeout_ms: 60_000,
            node_timeouts_ms: BTreeMap::new(),
            http_timeout_ms: 60_000,
            max_response_bytes: 32 * 1024 * 1024,
            status_buffer: 10,
            compress_threshold_bytes: apiflow_core::compress::DEFAULT_THRESHOLD,
        }
    }
}

impl ExecutorConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self, LoadError> {
        let cfg: Self = serde_yaml::from_str(s)?;
        cfg.validated()
    }

    pub fn from_json_str(s: &str) -> Result<Self, LoadError> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validated()
    }

    /// Load from a file; `.json` is parsed as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    fn validated(self) -> Result<Self, LoadError> {
        if let Some(bad) = self
            .node_timeouts_ms
            .keys()
            .find(|k| NodeKind::parse(k).is_none())
        {
            return Err(LoadError::UnknownKind(bad.clone()));
        }
        Ok(self)
    }

    /// Deadline for one node of `kind`. Loop nodes are unbounded unless
    /// overridden, their bodies being timed node by node.
    pub fn node_timeout(&self, kind: NodeKind) -> Option<Duration> {
        match self.node_timeouts_ms.get(kind.as_str()) {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(*ms)),
            None if kind.is_loop() => None,
            None => Some(Duration::from_millis(self.node_timeout_ms)),
        }
    }

    /// Per-call HTTP deadline, never shorter than the request node timeout.
    pub fn http_timeout(&self) -> Duration {
        let http = Duration::from_millis(self.http_timeout_ms);
        match self.node_timeout(NodeKind::Request) {
            Some(node) => http.max(node),
            None => http,
        }
    }
}

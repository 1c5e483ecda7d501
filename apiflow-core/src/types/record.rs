use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::compress::{self, CompressError, CompressKind};
use crate::error::FlowError;
use crate::ids::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    #[default]
    Unspecified,
    Running,
    Success,
    Failure,
    Canceled,
}

impl ExecutionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionState::Unspecified => "UNSPECIFIED",
            ExecutionState::Running => "RUNNING",
            ExecutionState::Success => "SUCCESS",
            ExecutionState::Failure => "FAILURE",
            ExecutionState::Canceled => "CANCELED",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "RUNNING" => ExecutionState::Running,
            "SUCCESS" => ExecutionState::Success,
            "FAILURE" => ExecutionState::Failure,
            "CANCELED" => ExecutionState::Canceled,
            _ => ExecutionState::Unspecified,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Success | ExecutionState::Failure | ExecutionState::Canceled
        )
    }
}

/// Structural shape of a node output, kept so readers can decode without guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutputKind {
    #[default]
    Unspecified,
    Value,
    Array,
    Map,
}

impl OutputKind {
    pub fn of(value: &JsonValue) -> Self {
        match value {
            JsonValue::Array(_) => OutputKind::Array,
            JsonValue::Object(_) => OutputKind::Map,
            _ => OutputKind::Value,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Unspecified => "UNSPECIFIED",
            OutputKind::Value => "VALUE",
            OutputKind::Array => "ARRAY",
            OutputKind::Map => "MAP",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "VALUE" => OutputKind::Value,
            "ARRAY" => OutputKind::Array,
            "MAP" => OutputKind::Map,
            _ => OutputKind::Unspecified,
        }
    }
}

/// A JSON document as stored on an execution record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionPayload {
    pub data: Vec<u8>,
    pub compress_kind: CompressKind,
}

impl ExecutionPayload {
    pub fn encode(value: &JsonValue, threshold: usize) -> Result<Self, CompressError> {
        let raw = serde_json::to_vec(value)?;
        let (data, compress_kind) = compress::compress_if_smaller(raw, threshold)?;
        Ok(Self {
            data,
            compress_kind,
        })
    }

    pub fn decode(&self) -> Result<JsonValue, CompressError> {
        if self.data.is_empty() {
            return Ok(JsonValue::Null);
        }
        let raw = compress::decompress(self.compress_kind, &self.data)?;
        Ok(serde_json::from_slice(&raw)?)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecution {
    pub id: Id,
    pub node_id: Id,
    pub name: String,
    pub state: ExecutionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<FlowError>,
    #[serde(default)]
    pub input: ExecutionPayload,
    #[serde(default)]
    pub output: ExecutionPayload,
    #[serde(default)]
    pub output_kind: OutputKind,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl NodeExecution {
    pub fn running(node_id: Id, name: impl Into<String>) -> Self {
        Self {
            id: Id::new(),
            node_id,
            name: name.into(),
            state: ExecutionState::Running,
            error: None,
            input: ExecutionPayload::default(),
            output: ExecutionPayload::default(),
            output_kind: OutputKind::Unspecified,
            started_at: Utc::now(),
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleResponse {
    pub id: Id,
    pub example_id: Id,
    pub status: u16,
    #[serde(default)]
    pub body: Vec<u8>,
    #[serde(default)]
    pub body_compress_kind: CompressKind,
    pub duration_ms: i64,
}

impl ExampleResponse {
    /// An empty response row for an example that has never been run.
    pub fn shell(example_id: Id) -> Self {
        Self {
            id: Id::new(),
            example_id,
            status: 0,
            body: Vec::new(),
            body_compress_kind: CompressKind::None,
            duration_ms: 0,
        }
    }

    pub fn decoded_body(&self) -> Result<Vec<u8>, CompressError> {
        compress::decompress(self.body_compress_kind, &self.body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseHeader {
    pub id: Id,
    pub response_id: Id,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionResult {
    pub id: Id,
    pub response_id: Id,
    pub assert_id: Id,
    pub result: bool,
}

use serde::{Deserialize, Serialize};

use crate::ids::Id;
use crate::types::Condition;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    pub id: Id,
    pub workspace_id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_parent_id: Option<Id>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    NoOp,
    Request,
    If,
    For,
    ForEach,
    Js,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::NoOp => "NO_OP",
            NodeKind::Request => "REQUEST",
            NodeKind::If => "IF",
            NodeKind::For => "FOR",
            NodeKind::ForEach => "FOR_EACH",
            NodeKind::Js => "JS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NO_OP" => Some(NodeKind::NoOp),
            "REQUEST" => Some(NodeKind::Request),
            "IF" => Some(NodeKind::If),
            "FOR" => Some(NodeKind::For),
            "FOR_EACH" => Some(NodeKind::ForEach),
            "JS" => Some(NodeKind::Js),
            _ => None,
        }
    }

    pub fn is_loop(&self) -> bool {
        matches!(self, NodeKind::For | NodeKind::ForEach)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Id,
    pub flow_id: Id,
    pub name: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub position_x: f64,
    #[serde(default)]
    pub position_y: f64,
}

impl Node {
    pub fn new(flow_id: Id, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: Id::new(),
            flow_id,
            name: name.into(),
            kind,
            position_x: 0.0,
            position_y: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoOpKind {
    Start,
    Then,
    Else,
    Loop,
    LoopEnd,
}

impl NoOpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoOpKind::Start => "START",
            NoOpKind::Then => "THEN",
            NoOpKind::Else => "ELSE",
            NoOpKind::Loop => "LOOP",
            NoOpKind::LoopEnd => "LOOP_END",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "START" => Some(NoOpKind::Start),
            "THEN" => Some(NoOpKind::Then),
            "ELSE" => Some(NoOpKind::Else),
            "LOOP" => Some(NoOpKind::Loop),
            "LOOP_END" => Some(NoOpKind::LoopEnd),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoOpNodeConfig {
    pub node_id: Id,
    pub kind: NoOpKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestNodeConfig {
    pub node_id: Id,
    pub endpoint_id: Id,
    pub example_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_endpoint_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_example_id: Option<Id>,
    #[serde(default)]
    pub has_request_config: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IfNodeConfig {
    pub node_id: Id,
    pub condition: Condition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorHandling {
    /// Propagate the failure.
    #[default]
    Unspecified,
    Ignore,
    Break,
}

impl ErrorHandling {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorHandling::Unspecified => "UNSPECIFIED",
            ErrorHandling::Ignore => "IGNORE",
            ErrorHandling::Break => "BREAK",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "IGNORE" => ErrorHandling::Ignore,
            "BREAK" => ErrorHandling::Break,
            _ => ErrorHandling::Unspecified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForNodeConfig {
    pub node_id: Id,
    pub iter_count: i64,
    #[serde(default)]
    pub error_handling: ErrorHandling,
    /// Optional break condition, checked before every iteration.
    #[serde(default)]
    pub expression: Condition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForEachNodeConfig {
    pub node_id: Id,
    pub iter_expression: String,
    #[serde(default)]
    pub error_handling: ErrorHandling,
    #[serde(default)]
    pub expression: Condition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Handle {
    #[default]
    Unspecified,
    Then,
    Else,
    Loop,
    LoopEnd,
}

impl Handle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Handle::Unspecified => "UNSPECIFIED",
            Handle::Then => "THEN",
            Handle::Else => "ELSE",
            Handle::Loop => "LOOP",
            Handle::LoopEnd => "LOOP_END",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "THEN" => Handle::Then,
            "ELSE" => Handle::Else,
            "LOOP" => Handle::Loop,
            "LOOP_END" => Handle::LoopEnd,
            _ => Handle::Unspecified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    #[default]
    Unspecified,
    NoOp,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Unspecified => "UNSPECIFIED",
            EdgeKind::NoOp => "NO_OP",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "NO_OP" => EdgeKind::NoOp,
            _ => EdgeKind::Unspecified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: Id,
    pub flow_id: Id,
    pub source_node_id: Id,
    pub target_node_id: Id,
    #[serde(default)]
    pub source_handle: Handle,
    #[serde(default)]
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(flow_id: Id, source: Id, target: Id, handle: Handle) -> Self {
        Self {
            id: Id::new(),
            flow_id,
            source_node_id: source,
            target_node_id: target,
            source_handle: handle,
            kind: EdgeKind::Unspecified,
        }
    }
}

use serde::{Deserialize, Serialize};

use crate::ids::Id;
use crate::types::PartKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefKind {
    Origin,
    Delta,
}

impl RefKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefKind::Origin => "ORIGIN",
            RefKind::Delta => "DELTA",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ORIGIN" => Some(RefKind::Origin),
            "DELTA" => Some(RefKind::Delta),
            _ => None,
        }
    }
}

/// Position of one part inside a delta example, ordered by `(rank, revision)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRow {
    pub example_id: Id,
    pub part_kind: PartKind,
    pub ref_kind: RefKind,
    pub ref_id: Id,
    pub rank: String,
    pub revision: i64,
}

impl OrderRow {
    pub fn new(
        example_id: Id,
        part_kind: PartKind,
        ref_kind: RefKind,
        ref_id: Id,
        rank: impl Into<String>,
    ) -> Self {
        Self {
            example_id,
            part_kind,
            ref_kind,
            ref_id,
            rank: rank.into(),
            revision: 0,
        }
    }

    pub fn sort_key(&self) -> (&str, i64) {
        (self.rank.as_str(), self.revision)
    }
}

/// Per-origin-row override state held by a delta example. `None` fields inherit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRow {
    pub example_id: Id,
    pub part_kind: PartKind,
    pub origin_id: Id,
    #[serde(default)]
    pub suppressed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl StateRow {
    pub fn new(example_id: Id, part_kind: PartKind, origin_id: Id) -> Self {
        Self {
            example_id,
            part_kind,
            origin_id,
            suppressed: false,
            key: None,
            value: None,
            description: None,
            enabled: None,
        }
    }

    pub fn suppress(example_id: Id, part_kind: PartKind, origin_id: Id) -> Self {
        Self {
            suppressed: true,
            ..Self::new(example_id, part_kind, origin_id)
        }
    }

    pub fn override_value(
        example_id: Id,
        part_kind: PartKind,
        origin_id: Id,
        value: impl Into<String>,
    ) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::new(example_id, part_kind, origin_id)
        }
    }

    pub fn has_overrides(&self) -> bool {
        self.key.is_some()
            || self.value.is_some()
            || self.description.is_some()
            || self.enabled.is_some()
    }
}

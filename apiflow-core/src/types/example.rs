use serde::{Deserialize, Serialize};

use crate::compress::CompressKind;
use crate::ids::Id;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: Id,
    pub collection_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<Id>,
    pub name: String,
    pub method: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BodyKind {
    #[default]
    Unspecified,
    FormArray,
    UrlEncoded,
    Raw,
}

impl BodyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyKind::Unspecified => "UNSPECIFIED",
            BodyKind::FormArray => "FORM_ARRAY",
            BodyKind::UrlEncoded => "URL_ENCODED",
            BodyKind::Raw => "RAW",
        }
    }

    /// Unknown tags fall back to `Unspecified`, which builds an empty body.
    pub fn parse(s: &str) -> Self {
        match s {
            "FORM_ARRAY" => BodyKind::FormArray,
            "URL_ENCODED" => BodyKind::UrlEncoded,
            "RAW" => BodyKind::Raw,
            _ => BodyKind::Unspecified,
        }
    }
}

/// A variant of an endpoint. With `version_parent_id` set it is a delta example
/// overlaying that origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub id: Id,
    pub endpoint_id: Id,
    pub collection_id: Id,
    pub name: String,
    #[serde(default)]
    pub body_kind: BodyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_parent_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<Id>,
}

impl Example {
    pub fn is_delta(&self) -> bool {
        self.version_parent_id.is_some()
    }
}

/// Which family of key/value rows a part belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PartKind {
    Header,
    Query,
    Form,
    UrlEncoded,
    Assertion,
}

impl PartKind {
    pub const ALL: [PartKind; 5] = [
        PartKind::Header,
        PartKind::Query,
        PartKind::Form,
        PartKind::UrlEncoded,
        PartKind::Assertion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PartKind::Header => "HEADER",
            PartKind::Query => "QUERY",
            PartKind::Form => "FORM",
            PartKind::UrlEncoded => "URL_ENCODED",
            PartKind::Assertion => "ASSERTION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        PartKind::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

/// Header, query, multipart form field and url-encoded field rows share this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleParam {
    pub id: Id,
    pub example_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_parent_id: Option<Id>,
    pub key: String,
    pub value: String,
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
}

impl ExampleParam {
    pub fn new(example_id: Id, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: Id::new(),
            example_id,
            delta_parent_id: None,
            key: key.into(),
            value: value.into(),
            enabled: true,
            description: String::new(),
        }
    }
}

pub type Header = ExampleParam;
pub type Query = ExampleParam;
pub type FormField = ExampleParam;
pub type UrlEncodedField = ExampleParam;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBody {
    pub id: Id,
    pub example_id: Id,
    #[serde(default)]
    pub data: Vec<u8>,
    #[serde(default)]
    pub compress_kind: CompressKind,
    #[serde(default)]
    pub visualize_mode: VisualizeMode,
}

impl RawBody {
    pub fn empty(example_id: Id) -> Self {
        Self {
            id: Id::new(),
            example_id,
            data: Vec::new(),
            compress_kind: CompressKind::None,
            visualize_mode: VisualizeMode::Unspecified,
        }
    }

    pub fn new(example_id: Id, data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Self::empty(example_id)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VisualizeMode {
    #[default]
    Unspecified,
    Json,
    Html,
    Xml,
    Text,
    Binary,
}

impl VisualizeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisualizeMode::Unspecified => "UNSPECIFIED",
            VisualizeMode::Json => "JSON",
            VisualizeMode::Html => "HTML",
            VisualizeMode::Xml => "XML",
            VisualizeMode::Text => "TEXT",
            VisualizeMode::Binary => "BINARY",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "JSON" => VisualizeMode::Json,
            "HTML" => VisualizeMode::Html,
            "XML" => VisualizeMode::Xml,
            "TEXT" => VisualizeMode::Text,
            "BINARY" => VisualizeMode::Binary,
            _ => VisualizeMode::Unspecified,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub id: Id,
    pub example_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta_parent_id: Option<Id>,
    pub condition: Condition,
    pub enabled: bool,
}

impl Assertion {
    pub fn new(example_id: Id, expression: impl Into<String>) -> Self {
        Self {
            id: Id::new(),
            example_id,
            delta_parent_id: None,
            condition: Condition::new(expression),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Condition {
    pub expression: String,
}

impl Condition {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.expression.trim().is_empty()
    }
}

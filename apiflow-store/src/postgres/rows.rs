use apiflow_core::types::{
    Assertion, AssertionResult, BodyKind, Condition, Edge, EdgeKind, Endpoint, ErrorHandling,
    Example, ExampleParam, ExampleResponse, ExecutionPayload, ExecutionState, Flow,
    ForEachNodeConfig, ForNodeConfig, Handle, IfNodeConfig, Node, NodeExecution, NodeKind,
    NoOpKind, NoOpNodeConfig, OrderRow, OutputKind, PartKind, RawBody, RefKind, RequestNodeConfig,
    ResponseHeader, StateRow, VisualizeMode,
};
use apiflow_core::{CompressKind, FlowError, Id};
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::store::StoreError;

fn id(u: Uuid) -> Id {
    Id::from_uuid(u)
}

fn opt_id(u: Option<Uuid>) -> Option<Id> {
    u.map(Id::from_uuid)
}

fn corrupt(column: &str, value: &str) -> StoreError {
    StoreError::Corrupt(format!("{column} = {value:?}"))
}

fn part_kind(s: &str) -> Result<PartKind, StoreError> {
    PartKind::parse(s).ok_or_else(|| corrupt("part_kind", s))
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EndpointRow {
    pub id: Uuid,
    pub collection_id: Uuid,
    pub folder_id: Option<Uuid>,
    pub name: String,
    pub method: String,
    pub url: String,
}

impl From<EndpointRow> for Endpoint {
    fn from(r: EndpointRow) -> Self {
        Endpoint {
            id: id(r.id),
            collection_id: id(r.collection_id),
            folder_id: opt_id(r.folder_id),
            name: r.name,
            method: r.method,
            url: r.url,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ExampleRow {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub collection_id: Uuid,
    pub name: String,
    pub body_kind: String,
    pub version_parent_id: Option<Uuid>,
    pub prev: Option<Uuid>,
    pub next: Option<Uuid>,
}

impl From<ExampleRow> for Example {
    fn from(r: ExampleRow) -> Self {
        Example {
            id: id(r.id),
            endpoint_id: id(r.endpoint_id),
            collection_id: id(r.collection_id),
            name: r.name,
            body_kind: BodyKind::parse(&r.body_kind),
            version_parent_id: opt_id(r.version_parent_id),
            prev: opt_id(r.prev),
            next: opt_id(r.next),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ParamRow {
    pub id: Uuid,
    pub example_id: Uuid,
    pub delta_parent_id: Option<Uuid>,
    pub key: String,
    pub value: String,
    pub enabled: bool,
    pub description: String,
}

impl From<ParamRow> for ExampleParam {
    fn from(r: ParamRow) -> Self {
        ExampleParam {
            id: id(r.id),
            example_id: id(r.example_id),
            delta_parent_id: opt_id(r.delta_parent_id),
            key: r.key,
            value: r.value,
            enabled: r.enabled,
            description: r.description,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RawBodyRow {
    pub id: Uuid,
    pub example_id: Uuid,
    pub data: Vec<u8>,
    pub compress_kind: String,
    pub visualize_mode: String,
}

impl From<RawBodyRow> for RawBody {
    fn from(r: RawBodyRow) -> Self {
        RawBody {
            id: id(r.id),
            example_id: id(r.example_id),
            data: r.data,
            compress_kind: CompressKind::parse(&r.compress_kind),
            visualize_mode: VisualizeMode::parse(&r.visualize_mode),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AssertionRow {
    pub id: Uuid,
    pub example_id: Uuid,
    pub delta_parent_id: Option<Uuid>,
    pub expression: String,
    pub enabled: bool,
}

impl From<AssertionRow> for Assertion {
    fn from(r: AssertionRow) -> Self {
        Assertion {
            id: id(r.id),
            example_id: id(r.example_id),
            delta_parent_id: opt_id(r.delta_parent_id),
            condition: Condition::new(r.expression),
            enabled: r.enabled,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct OrderDbRow {
    pub example_id: Uuid,
    pub part_kind: String,
    pub ref_kind: String,
    pub ref_id: Uuid,
    pub rank: String,
    pub revision: i64,
}

impl TryFrom<OrderDbRow> for OrderRow {
    type Error = StoreError;

    fn try_from(r: OrderDbRow) -> Result<Self, StoreError> {
        Ok(OrderRow {
            example_id: id(r.example_id),
            part_kind: part_kind(&r.part_kind)?,
            ref_kind: RefKind::parse(&r.ref_kind).ok_or_else(|| corrupt("ref_kind", &r.ref_kind))?,
            ref_id: id(r.ref_id),
            rank: r.rank,
            revision: r.revision,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct StateDbRow {
    pub example_id: Uuid,
    pub part_kind: String,
    pub origin_id: Uuid,
    pub suppressed: bool,
    pub key: Option<String>,
    pub value: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
}

impl TryFrom<StateDbRow> for StateRow {
    type Error = StoreError;

    fn try_from(r: StateDbRow) -> Result<Self, StoreError> {
        Ok(StateRow {
            example_id: id(r.example_id),
            part_kind: part_kind(&r.part_kind)?,
            origin_id: id(r.origin_id),
            suppressed: r.suppressed,
            key: r.key,
            value: r.value,
            description: r.description,
            enabled: r.enabled,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FlowRow {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub version_parent_id: Option<Uuid>,
}

impl From<FlowRow> for Flow {
    fn from(r: FlowRow) -> Self {
        Flow {
            id: id(r.id),
            workspace_id: id(r.workspace_id),
            name: r.name,
            version_parent_id: opt_id(r.version_parent_id),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct NodeRow {
    pub id: Uuid,
    pub flow_id: Uuid,
    pub name: String,
    pub kind: String,
    pub position_x: f64,
    pub position_y: f64,
}

impl TryFrom<NodeRow> for Node {
    type Error = StoreError;

    fn try_from(r: NodeRow) -> Result<Self, StoreError> {
        Ok(Node {
            id: id(r.id),
            flow_id: id(r.flow_id),
            name: r.name,
            kind: NodeKind::parse(&r.kind).ok_or_else(|| corrupt("kind", &r.kind))?,
            position_x: r.position_x,
            position_y: r.position_y,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EdgeRow {
    pub id: Uuid,
    pub flow_id: Uuid,
    pub source_node_id: Uuid,
    pub target_node_id: Uuid,
    pub source_handle: String,
    pub kind: String,
}

impl From<EdgeRow> for Edge {
    fn from(r: EdgeRow) -> Self {
        Edge {
            id: id(r.id),
            flow_id: id(r.flow_id),
            source_node_id: id(r.source_node_id),
            target_node_id: id(r.target_node_id),
            source_handle: Handle::parse(&r.source_handle),
            kind: EdgeKind::parse(&r.kind),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct NoOpRow {
    pub node_id: Uuid,
    pub kind: String,
}

impl TryFrom<NoOpRow> for NoOpNodeConfig {
    type Error = StoreError;

    fn try_from(r: NoOpRow) -> Result<Self, StoreError> {
        Ok(NoOpNodeConfig {
            node_id: id(r.node_id),
            kind: NoOpKind::parse(&r.kind).ok_or_else(|| corrupt("kind", &r.kind))?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RequestNodeRow {
    pub node_id: Uuid,
    pub endpoint_id: Uuid,
    pub example_id: Uuid,
    pub delta_endpoint_id: Option<Uuid>,
    pub delta_example_id: Option<Uuid>,
    pub has_request_config: bool,
}

impl From<RequestNodeRow> for RequestNodeConfig {
    fn from(r: RequestNodeRow) -> Self {
        RequestNodeConfig {
            node_id: id(r.node_id),
            endpoint_id: id(r.endpoint_id),
            example_id: id(r.example_id),
            delta_endpoint_id: opt_id(r.delta_endpoint_id),
            delta_example_id: opt_id(r.delta_example_id),
            has_request_config: r.has_request_config,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct IfNodeRow {
    pub node_id: Uuid,
    pub expression: String,
}

impl From<IfNodeRow> for IfNodeConfig {
    fn from(r: IfNodeRow) -> Self {
        IfNodeConfig {
            node_id: id(r.node_id),
            condition: Condition::new(r.expression),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ForNodeRow {
    pub node_id: Uuid,
    pub iter_count: i64,
    pub error_handling: String,
    pub expression: String,
}

impl From<ForNodeRow> for ForNodeConfig {
    fn from(r: ForNodeRow) -> Self {
        ForNodeConfig {
            node_id: id(r.node_id),
            iter_count: r.iter_count,
            error_handling: ErrorHandling::parse(&r.error_handling),
            expression: Condition::new(r.expression),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ForEachNodeRow {
    pub node_id: Uuid,
    pub iter_expression: String,
    pub error_handling: String,
    pub expression: String,
}

impl From<ForEachNodeRow> for ForEachNodeConfig {
    fn from(r: ForEachNodeRow) -> Self {
        ForEachNodeConfig {
            node_id: id(r.node_id),
            iter_expression: r.iter_expression,
            error_handling: ErrorHandling::parse(&r.error_handling),
            expression: Condition::new(r.expression),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ExecutionRow {
    pub id: Uuid,
    pub node_id: Uuid,
    pub name: String,
    pub state: String,
    pub error: Option<JsonValue>,
    pub input: Vec<u8>,
    pub input_compress_kind: String,
    pub output: Vec<u8>,
    pub output_compress_kind: String,
    pub output_kind: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<ExecutionRow> for NodeExecution {
    type Error = StoreError;

    fn try_from(r: ExecutionRow) -> Result<Self, StoreError> {
        let error = r
            .error
            .map(serde_json::from_value::<FlowError>)
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("execution error json: {e}")))?;
        Ok(NodeExecution {
            id: id(r.id),
            node_id: id(r.node_id),
            name: r.name,
            state: ExecutionState::parse(&r.state),
            error,
            input: ExecutionPayload {
                data: r.input,
                compress_kind: CompressKind::parse(&r.input_compress_kind),
            },
            output: ExecutionPayload {
                data: r.output,
                compress_kind: CompressKind::parse(&r.output_compress_kind),
            },
            output_kind: OutputKind::parse(&r.output_kind),
            started_at: r.started_at,
            completed_at: r.completed_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ResponseRow {
    pub id: Uuid,
    pub example_id: Uuid,
    pub status: i32,
    pub body: Vec<u8>,
    pub body_compress_kind: String,
    pub duration_ms: i64,
}

impl TryFrom<ResponseRow> for ExampleResponse {
    type Error = StoreError;

    fn try_from(r: ResponseRow) -> Result<Self, StoreError> {
        Ok(ExampleResponse {
            id: id(r.id),
            example_id: id(r.example_id),
            status: u16::try_from(r.status).map_err(|_| corrupt("status", &r.status.to_string()))?,
            body: r.body,
            body_compress_kind: CompressKind::parse(&r.body_compress_kind),
            duration_ms: r.duration_ms,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ResponseHeaderRow {
    pub id: Uuid,
    pub response_id: Uuid,
    pub key: String,
    pub value: String,
}

impl From<ResponseHeaderRow> for ResponseHeader {
    fn from(r: ResponseHeaderRow) -> Self {
        ResponseHeader {
            id: id(r.id),
            response_id: id(r.response_id),
            key: r.key,
            value: r.value,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct AssertionResultRow {
    pub id: Uuid,
    pub response_id: Uuid,
    pub assert_id: Uuid,
    pub result: bool,
}

impl From<AssertionResultRow> for AssertionResult {
    fn from(r: AssertionResultRow) -> Self {
        AssertionResult {
            id: id(r.id),
            response_id: id(r.response_id),
            assert_id: id(r.assert_id),
            result: r.result,
        }
    }
}

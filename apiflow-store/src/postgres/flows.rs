use apiflow_core::types::{
    Edge, Flow, ForEachNodeConfig, ForNodeConfig, IfNodeConfig, Node, NodeExecution,
    NoOpNodeConfig, RequestNodeConfig,
};
use apiflow_core::Id;
use sqlx::PgConnection;

use crate::store::StoreError;

use super::rows::{
    EdgeRow, ExecutionRow, FlowRow, ForEachNodeRow, ForNodeRow, IfNodeRow, NodeRow, NoOpRow,
    RequestNodeRow,
};

pub async fn flow(conn: &mut PgConnection, id: Id) -> Result<Flow, StoreError> {
    sqlx::query_as::<_, FlowRow>(
        "SELECT id, workspace_id, name, version_parent_id FROM flows WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(conn)
    .await?
    .map(Flow::from)
    .ok_or_else(|| StoreError::not_found("flow", id))
}

pub async fn nodes(conn: &mut PgConnection, flow_id: Id) -> Result<Vec<Node>, StoreError> {
    let rows = sqlx::query_as::<_, NodeRow>(
        r#"
SELECT id, flow_id, name, kind, position_x, position_y
FROM flow_nodes WHERE flow_id = $1
ORDER BY id ASC
        "#,
    )
    .bind(flow_id.as_uuid())
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(Node::try_from).collect()
}

pub async fn edges(conn: &mut PgConnection, flow_id: Id) -> Result<Vec<Edge>, StoreError> {
    let rows = sqlx::query_as::<_, EdgeRow>(
        r#"
SELECT id, flow_id, source_node_id, target_node_id, source_handle, kind
FROM flow_edges WHERE flow_id = $1
ORDER BY seq ASC
        "#,
    )
    .bind(flow_id.as_uuid())
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(Edge::from).collect())
}

pub async fn noop_node(conn: &mut PgConnection, node_id: Id) -> Result<NoOpNodeConfig, StoreError> {
    sqlx::query_as::<_, NoOpRow>("SELECT node_id, kind FROM flow_node_noop WHERE node_id = $1")
        .bind(node_id.as_uuid())
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| StoreError::not_found("no-op node", node_id))?
        .try_into()
}

pub async fn request_node(
    conn: &mut PgConnection,
    node_id: Id,
) -> Result<RequestNodeConfig, StoreError> {
    sqlx::query_as::<_, RequestNodeRow>(
        r#"
SELECT node_id, endpoint_id, example_id, delta_endpoint_id, delta_example_id, has_request_config
FROM flow_node_request WHERE node_id = $1
        "#,
    )
    .bind(node_id.as_uuid())
    .fetch_optional(conn)
    .await?
    .map(RequestNodeConfig::from)
    .ok_or_else(|| StoreError::not_found("request node", node_id))
}

pub async fn if_node(conn: &mut PgConnection, node_id: Id) -> Result<IfNodeConfig, StoreError> {
    sqlx::query_as::<_, IfNodeRow>("SELECT node_id, expression FROM flow_node_if WHERE node_id = $1")
        .bind(node_id.as_uuid())
        .fetch_optional(conn)
        .await?
        .map(IfNodeConfig::from)
        .ok_or_else(|| StoreError::not_found("if node", node_id))
}

pub async fn for_node(conn: &mut PgConnection, node_id: Id) -> Result<ForNodeConfig, StoreError> {
    sqlx::query_as::<_, ForNodeRow>(
        r#"
SELECT node_id, iter_count, error_handling, expression
FROM flow_node_for WHERE node_id = $1
        "#,
    )
    .bind(node_id.as_uuid())
    .fetch_optional(conn)
    .await?
    .map(ForNodeConfig::from)
    .ok_or_else(|| StoreError::not_found("for node", node_id))
}

pub async fn for_each_node(
    conn: &mut PgConnection,
    node_id: Id,
) -> Result<ForEachNodeConfig, StoreError> {
    sqlx::query_as::<_, ForEachNodeRow>(
        r#"
SELECT node_id, iter_expression, error_handling, expression
FROM flow_node_for_each WHERE node_id = $1
        "#,
    )
    .bind(node_id.as_uuid())
    .fetch_optional(conn)
    .await?
    .map(ForEachNodeConfig::from)
    .ok_or_else(|| StoreError::not_found("for-each node", node_id))
}

pub async fn executions_by_node(
    conn: &mut PgConnection,
    node_id: Id,
) -> Result<Vec<NodeExecution>, StoreError> {
    let rows = sqlx::query_as::<_, ExecutionRow>(
        r#"
SELECT id, node_id, name, state, error, input, input_compress_kind,
       output, output_compress_kind, output_kind, started_at, completed_at
FROM node_executions WHERE node_id = $1
ORDER BY id ASC
        "#,
    )
    .bind(node_id.as_uuid())
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(NodeExecution::try_from).collect()
}

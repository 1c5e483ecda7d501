use apiflow_core::types::{AssertionResult, ExampleResponse, NodeExecution, ResponseHeader};
use apiflow_core::Id;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::store::StoreError;

fn error_json(exec: &NodeExecution) -> Result<Option<serde_json::Value>, StoreError> {
    exec.error
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| StoreError::Other(format!("encode execution error: {e}")))
}

pub async fn insert_execution(conn: &mut PgConnection, exec: &NodeExecution) -> Result<(), StoreError> {
    sqlx::query(
        r#"
INSERT INTO node_executions
  (id, node_id, name, state, error, input, input_compress_kind,
   output, output_compress_kind, output_kind, started_at, completed_at)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(exec.id.as_uuid())
    .bind(exec.node_id.as_uuid())
    .bind(&exec.name)
    .bind(exec.state.as_str())
    .bind(error_json(exec)?)
    .bind(&exec.input.data)
    .bind(exec.input.compress_kind.as_str())
    .bind(&exec.output.data)
    .bind(exec.output.compress_kind.as_str())
    .bind(exec.output_kind.as_str())
    .bind(exec.started_at)
    .bind(exec.completed_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_execution(conn: &mut PgConnection, exec: &NodeExecution) -> Result<(), StoreError> {
    let res = sqlx::query(
        r#"
UPDATE node_executions
SET state = $2, error = $3, input = $4, input_compress_kind = $5,
    output = $6, output_compress_kind = $7, output_kind = $8, completed_at = $9
WHERE id = $1
        "#,
    )
    .bind(exec.id.as_uuid())
    .bind(exec.state.as_str())
    .bind(error_json(exec)?)
    .bind(&exec.input.data)
    .bind(exec.input.compress_kind.as_str())
    .bind(&exec.output.data)
    .bind(exec.output.compress_kind.as_str())
    .bind(exec.output_kind.as_str())
    .bind(exec.completed_at)
    .execute(conn)
    .await?;
    if res.rows_affected() == 0 {
        return Err(StoreError::not_found("execution", exec.id));
    }
    Ok(())
}

pub async fn insert_response(conn: &mut PgConnection, resp: &ExampleResponse) -> Result<(), StoreError> {
    sqlx::query(
        r#"
INSERT INTO example_responses (id, example_id, status, body, body_compress_kind, duration_ms)
VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(resp.id.as_uuid())
    .bind(resp.example_id.as_uuid())
    .bind(i32::from(resp.status))
    .bind(&resp.body)
    .bind(resp.body_compress_kind.as_str())
    .bind(resp.duration_ms)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_response(conn: &mut PgConnection, resp: &ExampleResponse) -> Result<(), StoreError> {
    let res = sqlx::query(
        r#"
UPDATE example_responses
SET status = $2, body = $3, body_compress_kind = $4, duration_ms = $5
WHERE id = $1
        "#,
    )
    .bind(resp.id.as_uuid())
    .bind(i32::from(resp.status))
    .bind(&resp.body)
    .bind(resp.body_compress_kind.as_str())
    .bind(resp.duration_ms)
    .execute(conn)
    .await?;
    if res.rows_affected() == 0 {
        return Err(StoreError::not_found("response", resp.id));
    }
    Ok(())
}

pub async fn insert_response_headers(
    conn: &mut PgConnection,
    headers: &[ResponseHeader],
) -> Result<(), StoreError> {
    if headers.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = headers.iter().map(|h| h.id.as_uuid()).collect();
    let response_ids: Vec<Uuid> = headers.iter().map(|h| h.response_id.as_uuid()).collect();
    let keys: Vec<&str> = headers.iter().map(|h| h.key.as_str()).collect();
    let values: Vec<&str> = headers.iter().map(|h| h.value.as_str()).collect();

    // unnest keeps array order, so `seq` follows receive order.
    sqlx::query(
        r#"
INSERT INTO example_response_headers (id, response_id, key, value)
SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::text[], $4::text[])
        "#,
    )
    .bind(&ids)
    .bind(&response_ids)
    .bind(&keys)
    .bind(&values)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn update_response_headers(
    conn: &mut PgConnection,
    headers: &[ResponseHeader],
) -> Result<(), StoreError> {
    if headers.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = headers.iter().map(|h| h.id.as_uuid()).collect();
    let keys: Vec<&str> = headers.iter().map(|h| h.key.as_str()).collect();
    let values: Vec<&str> = headers.iter().map(|h| h.value.as_str()).collect();

    sqlx::query(
        r#"
UPDATE example_response_headers AS h
SET key = u.key, value = u.value
FROM UNNEST($1::uuid[], $2::text[], $3::text[]) AS u(id, key, value)
WHERE h.id = u.id
        "#,
    )
    .bind(&ids)
    .bind(&keys)
    .bind(&values)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn delete_response_headers(conn: &mut PgConnection, ids: &[Id]) -> Result<(), StoreError> {
    if ids.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = ids.iter().map(Id::as_uuid).collect();
    sqlx::query("DELETE FROM example_response_headers WHERE id = ANY($1)")
        .bind(&ids)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn insert_assertion_results(
    conn: &mut PgConnection,
    results: &[AssertionResult],
) -> Result<(), StoreError> {
    if results.is_empty() {
        return Ok(());
    }
    let ids: Vec<Uuid> = results.iter().map(|r| r.id.as_uuid()).collect();
    let response_ids: Vec<Uuid> = results.iter().map(|r| r.response_id.as_uuid()).collect();
    let assert_ids: Vec<Uuid> = results.iter().map(|r| r.assert_id.as_uuid()).collect();
    let outcomes: Vec<bool> = results.iter().map(|r| r.result).collect();

    sqlx::query(
        r#"
INSERT INTO assertion_results (id, response_id, assert_id, result)
SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::uuid[], $4::bool[])
        "#,
    )
    .bind(&ids)
    .bind(&response_ids)
    .bind(&assert_ids)
    .bind(&outcomes)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn delete_assertion_results(conn: &mut PgConnection, response_id: Id) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM assertion_results WHERE response_id = $1")
        .bind(response_id.as_uuid())
        .execute(conn)
        .await?;
    Ok(())
}

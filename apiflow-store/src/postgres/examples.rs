use apiflow_core::types::{
    Assertion, AssertionResult, Endpoint, Example, ExampleParam, ExampleResponse, OrderRow,
    PartKind, RawBody, ResponseHeader, StateRow,
};
use apiflow_core::Id;
use sqlx::PgConnection;

use crate::store::StoreError;

use super::rows::{
    AssertionResultRow, AssertionRow, EndpointRow, ExampleRow, OrderDbRow, ParamRow, RawBodyRow,
    ResponseHeaderRow, ResponseRow, StateDbRow,
};

pub async fn endpoint_by_id(conn: &mut PgConnection, id: Id) -> Result<Endpoint, StoreError> {
    sqlx::query_as::<_, EndpointRow>(
        r#"
SELECT id, collection_id, folder_id, name, method, url
FROM endpoints WHERE id = $1
        "#,
    )
    .bind(id.as_uuid())
    .fetch_optional(conn)
    .await?
    .map(Endpoint::from)
    .ok_or_else(|| StoreError::not_found("endpoint", id))
}

pub async fn example_by_id(conn: &mut PgConnection, id: Id) -> Result<Example, StoreError> {
    sqlx::query_as::<_, ExampleRow>(
        r#"
SELECT id, endpoint_id, collection_id, name, body_kind, version_parent_id, prev, next
FROM examples WHERE id = $1
        "#,
    )
    .bind(id.as_uuid())
    .fetch_optional(conn)
    .await?
    .map(Example::from)
    .ok_or_else(|| StoreError::not_found("example", id))
}

pub async fn params(
    conn: &mut PgConnection,
    example_id: Id,
    kind: PartKind,
) -> Result<Vec<ExampleParam>, StoreError> {
    let rows = sqlx::query_as::<_, ParamRow>(
        r#"
SELECT id, example_id, delta_parent_id, key, value, enabled, description
FROM example_params
WHERE example_id = $1 AND part_kind = $2
ORDER BY seq ASC
        "#,
    )
    .bind(example_id.as_uuid())
    .bind(kind.as_str())
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(ExampleParam::from).collect())
}

pub async fn delta_row(
    conn: &mut PgConnection,
    example_id: Id,
    kind: PartKind,
    delta_id: Id,
) -> Result<Option<ExampleParam>, StoreError> {
    let row = sqlx::query_as::<_, ParamRow>(
        r#"
SELECT id, example_id, delta_parent_id, key, value, enabled, description
FROM example_params
WHERE example_id = $1 AND part_kind = $2 AND id = $3
        "#,
    )
    .bind(example_id.as_uuid())
    .bind(kind.as_str())
    .bind(delta_id.as_uuid())
    .fetch_optional(conn)
    .await?;
    Ok(row.map(ExampleParam::from))
}

pub async fn raw_body(conn: &mut PgConnection, example_id: Id) -> Result<Option<RawBody>, StoreError> {
    let row = sqlx::query_as::<_, RawBodyRow>(
        r#"
SELECT id, example_id, data, compress_kind, visualize_mode
FROM example_raw_bodies WHERE example_id = $1
        "#,
    )
    .bind(example_id.as_uuid())
    .fetch_optional(conn)
    .await?;
    Ok(row.map(RawBody::from))
}

pub async fn assertions(conn: &mut PgConnection, example_id: Id) -> Result<Vec<Assertion>, StoreError> {
    let rows = sqlx::query_as::<_, AssertionRow>(
        r#"
SELECT id, example_id, delta_parent_id, expression, enabled
FROM example_assertions
WHERE example_id = $1
ORDER BY seq ASC
        "#,
    )
    .bind(example_id.as_uuid())
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(Assertion::from).collect())
}

pub async fn order_rows_asc(
    conn: &mut PgConnection,
    example_id: Id,
    kind: PartKind,
) -> Result<Vec<OrderRow>, StoreError> {
    let rows = sqlx::query_as::<_, OrderDbRow>(
        r#"
SELECT example_id, part_kind, ref_kind, ref_id, rank, revision
FROM overlay_order
WHERE example_id = $1 AND part_kind = $2
ORDER BY rank COLLATE "C" ASC, revision ASC
        "#,
    )
    .bind(example_id.as_uuid())
    .bind(kind.as_str())
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(OrderRow::try_from).collect()
}

pub async fn state_rows(
    conn: &mut PgConnection,
    example_id: Id,
    kind: PartKind,
) -> Result<Vec<StateRow>, StoreError> {
    let rows = sqlx::query_as::<_, StateDbRow>(
        r#"
SELECT example_id, part_kind, origin_id, suppressed, key, value, description, enabled
FROM overlay_state
WHERE example_id = $1 AND part_kind = $2
        "#,
    )
    .bind(example_id.as_uuid())
    .bind(kind.as_str())
    .fetch_all(conn)
    .await?;
    rows.into_iter().map(StateRow::try_from).collect()
}

pub async fn state_row(
    conn: &mut PgConnection,
    example_id: Id,
    kind: PartKind,
    origin_id: Id,
) -> Result<Option<StateRow>, StoreError> {
    let row = sqlx::query_as::<_, StateDbRow>(
        r#"
SELECT example_id, part_kind, origin_id, suppressed, key, value, description, enabled
FROM overlay_state
WHERE example_id = $1 AND part_kind = $2 AND origin_id = $3
        "#,
    )
    .bind(example_id.as_uuid())
    .bind(kind.as_str())
    .bind(origin_id.as_uuid())
    .fetch_optional(conn)
    .await?;
    row.map(StateRow::try_from).transpose()
}

pub async fn response_by_example(
    conn: &mut PgConnection,
    example_id: Id,
) -> Result<Option<ExampleResponse>, StoreError> {
    let row = sqlx::query_as::<_, ResponseRow>(
        r#"
SELECT id, example_id, status, body, body_compress_kind, duration_ms
FROM example_responses WHERE example_id = $1
        "#,
    )
    .bind(example_id.as_uuid())
    .fetch_optional(conn)
    .await?;
    row.map(ExampleResponse::try_from).transpose()
}

pub async fn response_headers(
    conn: &mut PgConnection,
    response_id: Id,
) -> Result<Vec<ResponseHeader>, StoreError> {
    let rows = sqlx::query_as::<_, ResponseHeaderRow>(
        r#"
SELECT id, response_id, key, value
FROM example_response_headers
WHERE response_id = $1
ORDER BY seq ASC
        "#,
    )
    .bind(response_id.as_uuid())
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(ResponseHeader::from).collect())
}

pub async fn assertion_results(
    conn: &mut PgConnection,
    response_id: Id,
) -> Result<Vec<AssertionResult>, StoreError> {
    let rows = sqlx::query_as::<_, AssertionResultRow>(
        r#"
SELECT id, response_id, assert_id, result
FROM assertion_results WHERE response_id = $1
        "#,
    )
    .bind(response_id.as_uuid())
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(AssertionResult::from).collect())
}

use apiflow_core::types::{
    AssertionResult, ExampleParam, ExampleResponse, NodeExecution, OrderRow, PartKind, RefKind,
    ResponseHeader, StateRow,
};
use apiflow_core::Id;
use apiflow_store::{
    ExampleReader, FlowReader, MemoryStore, RecordWriter, Store, StoreError, StoreTx,
};

fn header(response_id: Id, key: &str, value: &str) -> ResponseHeader {
    ResponseHeader {
        id: Id::new(),
        response_id,
        key: key.to_string(),
        value: value.to_string(),
    }
}

#[tokio::test]
async fn committed_writes_become_visible() {
    let store = MemoryStore::new();
    let example_id = Id::new();
    let resp = ExampleResponse::shell(example_id);

    let tx = store.begin_tx().await.unwrap();
    tx.insert_response(&resp).await.unwrap();
    tx.insert_response_headers_bulk(&[header(resp.id, "content-type", "text/plain")])
        .await
        .unwrap();

    // Visible through the transaction, not yet outside it.
    assert!(tx.response_by_example(example_id).await.unwrap().is_some());
    assert!(store.response_by_example(example_id).await.unwrap().is_none());

    tx.commit().await.unwrap();

    let stored = store.response_by_example(example_id).await.unwrap().unwrap();
    assert_eq!(stored.id, resp.id);
    let headers = store.response_headers(resp.id).await.unwrap();
    assert_eq!(headers.len(), 1);
    assert_eq!(headers[0].key, "content-type");
}

#[tokio::test]
async fn rollback_discards_writes() {
    let store = MemoryStore::new();
    let example_id = Id::new();
    let resp = ExampleResponse::shell(example_id);

    let tx = store.begin_tx().await.unwrap();
    tx.insert_response(&resp).await.unwrap();
    tx.rollback().await.unwrap();

    assert!(store.response_by_example(example_id).await.unwrap().is_none());
}

#[tokio::test]
async fn finished_transaction_rejects_further_use() {
    let store = MemoryStore::new();
    let tx = store.begin_tx().await.unwrap();
    tx.commit().await.unwrap();

    assert!(matches!(tx.commit().await, Err(StoreError::TxClosed)));
    assert!(matches!(tx.rollback().await, Err(StoreError::TxClosed)));
    assert!(matches!(
        tx.response_by_example(Id::new()).await,
        Err(StoreError::TxClosed)
    ));
}

#[tokio::test]
async fn failed_commit_leaves_tables_untouched() {
    let store = MemoryStore::new();
    let exec = NodeExecution::running(Id::new(), "req");
    store.insert_execution(&exec).await.unwrap();

    let tx = store.begin_tx().await.unwrap();
    let other = NodeExecution::running(Id::new(), "other");
    tx.insert_execution(&other).await.unwrap();

    // A concurrent writer lands the same row first; replay must fail as a whole.
    store.insert_execution(&other).await.unwrap();
    assert!(tx.commit().await.is_err());

    assert_eq!(store.executions().await.len(), 2);
}

#[tokio::test]
async fn update_of_missing_rows_is_not_found() {
    let store = MemoryStore::new();
    let exec = NodeExecution::running(Id::new(), "req");
    assert!(matches!(
        store.update_execution(&exec).await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store.update_response(&ExampleResponse::shell(Id::new())).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn header_delete_and_result_replace() {
    let store = MemoryStore::new();
    let resp = ExampleResponse::shell(Id::new());
    store.insert_response(&resp).await.unwrap();

    let keep = header(resp.id, "a", "1");
    let gone = header(resp.id, "b", "2");
    store
        .insert_response_headers_bulk(&[keep.clone(), gone.clone()])
        .await
        .unwrap();
    store.delete_response_headers(&[gone.id]).await.unwrap();

    let left = store.response_headers(resp.id).await.unwrap();
    assert_eq!(left, vec![keep]);

    let result = AssertionResult {
        id: Id::new(),
        response_id: resp.id,
        assert_id: Id::new(),
        result: true,
    };
    store.insert_assertion_results_bulk(&[result]).await.unwrap();
    store.delete_assertion_results(resp.id).await.unwrap();
    assert!(store.assertion_results(resp.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn state_row_insert_replaces_same_key() {
    let store = MemoryStore::new();
    let example_id = Id::new();
    let origin_id = Id::new();

    store
        .insert_state_row(StateRow::suppress(example_id, PartKind::Header, origin_id))
        .await;
    store
        .insert_state_row(StateRow::override_value(
            example_id,
            PartKind::Header,
            origin_id,
            "v2",
        ))
        .await;

    let rows = store.state_rows(example_id, PartKind::Header).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].suppressed);
    assert_eq!(rows[0].value.as_deref(), Some("v2"));
}

#[tokio::test]
async fn params_are_scoped_by_kind_and_ordered_rows_sorted() {
    let store = MemoryStore::new();
    let example_id = Id::new();
    let h = ExampleParam::new(example_id, "X-A", "1");
    let q = ExampleParam::new(example_id, "page", "2");
    store.insert_param(PartKind::Header, h.clone()).await;
    store.insert_param(PartKind::Query, q.clone()).await;

    assert_eq!(store.headers_by_example(example_id).await.unwrap(), vec![h.clone()]);
    assert_eq!(store.queries_by_example(example_id).await.unwrap(), vec![q]);
    assert!(store.form_body(example_id).await.unwrap().is_empty());
    assert_eq!(
        store.delta_row(example_id, PartKind::Header, h.id).await.unwrap(),
        Some(h)
    );

    let late = OrderRow::new(example_id, PartKind::Header, RefKind::Origin, Id::new(), "b");
    let early = OrderRow::new(example_id, PartKind::Header, RefKind::Origin, Id::new(), "a");
    store.insert_order_row(late.clone()).await;
    store.insert_order_row(early.clone()).await;
    let rows = store.order_rows_asc(example_id, PartKind::Header).await.unwrap();
    assert_eq!(rows, vec![early, late]);
}

#[tokio::test]
async fn missing_flow_config_is_not_found() {
    let store = MemoryStore::new();
    assert!(matches!(store.flow(Id::new()).await, Err(StoreError::NotFound(_))));
    assert!(matches!(
        store.request_node(Id::new()).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn transaction_copies_only_the_tables_it_writes() {
    let store = MemoryStore::new();
    let example_id = Id::new();
    let resp = ExampleResponse::shell(example_id);

    let tx = store.begin_tx().await.unwrap();
    tx.insert_response_headers_bulk(&[header(resp.id, "etag", "v1")])
        .await
        .unwrap();

    // Responses were never written through the transaction, so it reads them live.
    store.insert_response(&resp).await.unwrap();
    assert_eq!(tx.response_by_example(example_id).await.unwrap().unwrap().id, resp.id);

    // Executions recorded while the transaction is open survive its commit.
    let exec = NodeExecution::running(Id::new(), "req");
    store.insert_execution(&exec).await.unwrap();
    tx.commit().await.unwrap();

    assert_eq!(store.executions_by_node(exec.node_id).await.unwrap().len(), 1);
    assert_eq!(store.response_headers(resp.id).await.unwrap().len(), 1);
    assert!(store.response_by_example(example_id).await.unwrap().is_some());
}

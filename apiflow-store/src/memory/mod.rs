//! In-process store. Used by tests and by embedders that do not need durability.
//!
//! A transaction copies a record table the first time it writes to it and
//! applies its writes to that copy, so reads through the transaction see
//! them. Tables it never writes are read from the shared store. On commit the
//! writes are replayed onto fresh copies of the touched tables, which then
//! replace the shared ones.

mod tables;

use std::collections::BTreeSet;
use std::sync::Arc;

use apiflow_core::types::{
    Assertion, AssertionResult, Edge, Endpoint, Example, ExampleParam, ExampleResponse, Flow,
    ForEachNodeConfig, ForNodeConfig, IfNodeConfig, Node, NodeExecution, NoOpNodeConfig, OrderRow,
    PartKind, RawBody, RequestNodeConfig, ResponseHeader, StateRow,
};
use apiflow_core::Id;
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::store::{ExampleReader, FlowReader, RecordWriter, Store, StoreError, StoreTx};

use tables::{Op, Table, Tables, View};

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&Tables) -> R + Send,
        R: Send,
    {
        let t = self.tables.read().await;
        Ok(f(&t))
    }

    async fn write(&self, op: Op) -> Result<(), StoreError> {
        self.tables.write().await.apply(op)
    }

    pub async fn insert_endpoint(&self, endpoint: Endpoint) {
        self.tables.write().await.endpoints.insert(endpoint.id, endpoint);
    }

    pub async fn insert_example(&self, example: Example) {
        self.tables.write().await.examples.insert(example.id, example);
    }

    pub async fn insert_param(&self, kind: PartKind, param: ExampleParam) {
        self.tables.write().await.params.push((kind, param));
    }

    pub async fn insert_raw_body(&self, body: RawBody) {
        self.tables.write().await.raw_bodies.insert(body.example_id, body);
    }

    pub async fn insert_assertion(&self, assertion: Assertion) {
        self.tables.write().await.assertions.push(assertion);
    }

    pub async fn insert_order_row(&self, row: OrderRow) {
        self.tables.write().await.order_rows.push(row);
    }

    pub async fn insert_state_row(&self, row: StateRow) {
        let mut t = self.tables.write().await;
        t.state_rows.retain(|r| {
            !(r.example_id == row.example_id
                && r.part_kind == row.part_kind
                && r.origin_id == row.origin_id)
        });
        t.state_rows.push(row);
    }

    pub async fn insert_flow(&self, flow: Flow) {
        self.tables.write().await.flows.insert(flow.id, flow);
    }

    pub async fn insert_node(&self, node: Node) {
        self.tables.write().await.nodes.push(node);
    }

    pub async fn insert_edge(&self, edge: Edge) {
        self.tables.write().await.edges.push(edge);
    }

    pub async fn insert_noop_node(&self, cfg: NoOpNodeConfig) {
        self.tables.write().await.noop_nodes.insert(cfg.node_id, cfg);
    }

    pub async fn insert_request_node(&self, cfg: RequestNodeConfig) {
        self.tables.write().await.request_nodes.insert(cfg.node_id, cfg);
    }

    pub async fn insert_if_node(&self, cfg: IfNodeConfig) {
        self.tables.write().await.if_nodes.insert(cfg.node_id, cfg);
    }

    pub async fn insert_for_node(&self, cfg: ForNodeConfig) {
        self.tables.write().await.for_nodes.insert(cfg.node_id, cfg);
    }

    pub async fn insert_for_each_node(&self, cfg: ForEachNodeConfig) {
        self.tables.write().await.for_each_nodes.insert(cfg.node_id, cfg);
    }

    /// Every execution record, in insertion order.
    pub async fn executions(&self) -> Vec<NodeExecution> {
        self.tables.read().await.executions.clone()
    }
}

#[derive(Default)]
struct TxState {
    staged: Tables,
    copied: BTreeSet<Table>,
    ops: Vec<Op>,
}

pub struct MemoryTx {
    base: Arc<RwLock<Tables>>,
    state: Mutex<Option<TxState>>,
}

impl MemoryTx {
    async fn read<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&View<'_>) -> R + Send,
        R: Send,
    {
        let state = self.state.lock().await;
        let st = state.as_ref().ok_or(StoreError::TxClosed)?;
        let base = self.base.read().await;
        Ok(f(&View {
            base: &base,
            staged: &st.staged,
            copied: &st.copied,
        }))
    }

    async fn write(&self, op: Op) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let st = state.as_mut().ok_or(StoreError::TxClosed)?;
        let table = op.table();
        if st.copied.insert(table) {
            st.staged.copy_table(&*self.base.read().await, table);
        }
        st.staged.apply(op.clone())?;
        st.ops.push(op);
        Ok(())
    }
}

macro_rules! memory_services {
    ($ty:ty) => {
        #[async_trait]
        impl ExampleReader for $ty {
            async fn endpoint_by_id(&self, id: Id) -> Result<Endpoint, StoreError> {
                self.read(|t| t.endpoint(id)).await?
            }

            async fn example_by_id(&self, id: Id) -> Result<Example, StoreError> {
                self.read(|t| t.example(id)).await?
            }

            async fn params(
                &self,
                example_id: Id,
                kind: PartKind,
            ) -> Result<Vec<ExampleParam>, StoreError> {
                self.read(|t| t.params(example_id, kind)).await
            }

            async fn raw_body(&self, example_id: Id) -> Result<Option<RawBody>, StoreError> {
                self.read(|t| t.raw_body(example_id)).await
            }

            async fn assertions(&self, example_id: Id) -> Result<Vec<Assertion>, StoreError> {
                self.read(|t| t.assertions(example_id)).await
            }

            async fn order_rows_asc(
                &self,
                example_id: Id,
                kind: PartKind,
            ) -> Result<Vec<OrderRow>, StoreError> {
                self.read(|t| t.order_rows_asc(example_id, kind)).await
            }

            async fn state_rows(
                &self,
                example_id: Id,
                kind: PartKind,
            ) -> Result<Vec<StateRow>, StoreError> {
                self.read(|t| t.state_rows(example_id, kind)).await
            }

            async fn state_row(
                &self,
                example_id: Id,
                kind: PartKind,
                origin_id: Id,
            ) -> Result<Option<StateRow>, StoreError> {
                self.read(|t| t.state_row(example_id, kind, origin_id)).await
            }

            async fn delta_row(
                &self,
                example_id: Id,
                kind: PartKind,
                delta_id: Id,
            ) -> Result<Option<ExampleParam>, StoreError> {
                self.read(|t| t.delta_row(example_id, kind, delta_id)).await
            }

            async fn response_by_example(
                &self,
                example_id: Id,
            ) -> Result<Option<ExampleResponse>, StoreError> {
                self.read(|t| t.response_by_example(example_id)).await
            }

            async fn response_headers(
                &self,
                response_id: Id,
            ) -> Result<Vec<ResponseHeader>, StoreError> {
                self.read(|t| t.response_headers(response_id)).await
            }

            async fn assertion_results(
                &self,
                response_id: Id,
            ) -> Result<Vec<AssertionResult>, StoreError> {
                self.read(|t| t.assertion_results(response_id)).await
            }
        }

        #[async_trait]
        impl RecordWriter for $ty {
            async fn insert_execution(&self, exec: &NodeExecution) -> Result<(), StoreError> {
                self.write(Op::InsertExecution(exec.clone())).await
            }

            async fn update_execution(&self, exec: &NodeExecution) -> Result<(), StoreError> {
                self.write(Op::UpdateExecution(exec.clone())).await
            }

            async fn insert_response(&self, resp: &ExampleResponse) -> Result<(), StoreError> {
                self.write(Op::InsertResponse(resp.clone())).await
            }

            async fn update_response(&self, resp: &ExampleResponse) -> Result<(), StoreError> {
                self.write(Op::UpdateResponse(resp.clone())).await
            }

            async fn insert_response_headers_bulk(
                &self,
                headers: &[ResponseHeader],
            ) -> Result<(), StoreError> {
                self.write(Op::InsertHeaders(headers.to_vec())).await
            }

            async fn update_response_headers_bulk(
                &self,
                headers: &[ResponseHeader],
            ) -> Result<(), StoreError> {
                self.write(Op::UpdateHeaders(headers.to_vec())).await
            }

            async fn delete_response_headers(&self, ids: &[Id]) -> Result<(), StoreError> {
                self.write(Op::DeleteHeaders(ids.to_vec())).await
            }

            async fn insert_assertion_results_bulk(
                &self,
                results: &[AssertionResult],
            ) -> Result<(), StoreError> {
                self.write(Op::InsertResults(results.to_vec())).await
            }

            async fn delete_assertion_results(&self, response_id: Id) -> Result<(), StoreError> {
                self.write(Op::DeleteResults(response_id)).await
            }
        }
    };
}

memory_services!(MemoryStore);
memory_services!(MemoryTx);

#[async_trait]
impl FlowReader for MemoryStore {
    async fn flow(&self, id: Id) -> Result<Flow, StoreError> {
        self.read(|t| t.flow(id)).await?
    }

    async fn nodes(&self, flow_id: Id) -> Result<Vec<Node>, StoreError> {
        self.read(|t| t.nodes(flow_id)).await
    }

    async fn edges(&self, flow_id: Id) -> Result<Vec<Edge>, StoreError> {
        self.read(|t| t.edges(flow_id)).await
    }

    async fn noop_node(&self, node_id: Id) -> Result<NoOpNodeConfig, StoreError> {
        self.read(|t| t.noop_nodes.get(&node_id).cloned())
            .await?
            .ok_or_else(|| StoreError::not_found("no-op node", node_id))
    }

    async fn request_node(&self, node_id: Id) -> Result<RequestNodeConfig, StoreError> {
        self.read(|t| t.request_nodes.get(&node_id).cloned())
            .await?
            .ok_or_else(|| StoreError::not_found("request node", node_id))
    }

    async fn if_node(&self, node_id: Id) -> Result<IfNodeConfig, StoreError> {
        self.read(|t| t.if_nodes.get(&node_id).cloned())
            .await?
            .ok_or_else(|| StoreError::not_found("if node", node_id))
    }

    async fn for_node(&self, node_id: Id) -> Result<ForNodeConfig, StoreError> {
        self.read(|t| t.for_nodes.get(&node_id).cloned())
            .await?
            .ok_or_else(|| StoreError::not_found("for node", node_id))
    }

    async fn for_each_node(&self, node_id: Id) -> Result<ForEachNodeConfig, StoreError> {
        self.read(|t| t.for_each_nodes.get(&node_id).cloned())
            .await?
            .ok_or_else(|| StoreError::not_found("for-each node", node_id))
    }

    async fn executions_by_node(&self, node_id: Id) -> Result<Vec<NodeExecution>, StoreError> {
        self.read(|t| t.executions_by_node(node_id)).await
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin_tx(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        Ok(Box::new(MemoryTx {
            base: Arc::clone(&self.tables),
            state: Mutex::new(Some(TxState::default())),
        }))
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(&self) -> Result<(), StoreError> {
        let st = self.state.lock().await.take().ok_or(StoreError::TxClosed)?;
        let mut base = self.base.write().await;
        // A failing op leaves the shared tables untouched.
        let mut next = Tables::default();
        for &table in &st.copied {
            next.copy_table(&base, table);
        }
        for op in st.ops {
            next.apply(op)?;
        }
        for &table in &st.copied {
            base.take_table(&mut next, table);
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        self.state.lock().await.take().ok_or(StoreError::TxClosed)?;
        Ok(())
    }
}

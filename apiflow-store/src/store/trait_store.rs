use apiflow_core::error::{Classify, ErrorKind};
use apiflow_core::types::{
    Assertion, AssertionResult, Edge, Endpoint, Example, ExampleParam, ExampleResponse, Flow,
    ForEachNodeConfig, ForNodeConfig, IfNodeConfig, Node, NodeExecution, NoOpNodeConfig, OrderRow,
    PartKind, RawBody, RequestNodeConfig, ResponseHeader, StateRow,
};
use apiflow_core::Id;
use async_trait::async_trait;

/// Reads over endpoints, examples and their parts.
///
/// Implemented both by the store itself and by its transactions; inside an
/// open transaction only the transaction's implementation may be used.
#[async_trait]
pub trait ExampleReader: Send + Sync {
    async fn endpoint_by_id(&self, id: Id) -> Result<Endpoint, StoreError>;

    async fn example_by_id(&self, id: Id) -> Result<Example, StoreError>;

    /// Header, query, form or url-encoded rows of an example, in stored order.
    async fn params(&self, example_id: Id, kind: PartKind) -> Result<Vec<ExampleParam>, StoreError>;

    async fn headers_by_example(&self, example_id: Id) -> Result<Vec<ExampleParam>, StoreError> {
        self.params(example_id, PartKind::Header).await
    }

    async fn queries_by_example(&self, example_id: Id) -> Result<Vec<ExampleParam>, StoreError> {
        self.params(example_id, PartKind::Query).await
    }

    async fn form_body(&self, example_id: Id) -> Result<Vec<ExampleParam>, StoreError> {
        self.params(example_id, PartKind::Form).await
    }

    async fn url_body(&self, example_id: Id) -> Result<Vec<ExampleParam>, StoreError> {
        self.params(example_id, PartKind::UrlEncoded).await
    }

    async fn raw_body(&self, example_id: Id) -> Result<Option<RawBody>, StoreError>;

    async fn assertions(&self, example_id: Id) -> Result<Vec<Assertion>, StoreError>;

    /// Overlay order rows of one part kind, by `(rank, revision)` ascending.
    async fn order_rows_asc(&self, example_id: Id, kind: PartKind) -> Result<Vec<OrderRow>, StoreError>;

    async fn state_rows(&self, example_id: Id, kind: PartKind) -> Result<Vec<StateRow>, StoreError>;

    async fn state_row(
        &self,
        example_id: Id,
        kind: PartKind,
        origin_id: Id,
    ) -> Result<Option<StateRow>, StoreError>;

    async fn delta_row(
        &self,
        example_id: Id,
        kind: PartKind,
        delta_id: Id,
    ) -> Result<Option<ExampleParam>, StoreError>;

    async fn response_by_example(&self, example_id: Id) -> Result<Option<ExampleResponse>, StoreError>;

    async fn response_headers(&self, response_id: Id) -> Result<Vec<ResponseHeader>, StoreError>;

    async fn assertion_results(&self, response_id: Id) -> Result<Vec<AssertionResult>, StoreError>;
}

/// Reads over flows, their graph and per-kind node configuration.
#[async_trait]
pub trait FlowReader: Send + Sync {
    async fn flow(&self, id: Id) -> Result<Flow, StoreError>;

    async fn nodes(&self, flow_id: Id) -> Result<Vec<Node>, StoreError>;

    async fn edges(&self, flow_id: Id) -> Result<Vec<Edge>, StoreError>;

    async fn noop_node(&self, node_id: Id) -> Result<NoOpNodeConfig, StoreError>;

    async fn request_node(&self, node_id: Id) -> Result<RequestNodeConfig, StoreError>;

    async fn if_node(&self, node_id: Id) -> Result<IfNodeConfig, StoreError>;

    async fn for_node(&self, node_id: Id) -> Result<ForNodeConfig, StoreError>;

    async fn for_each_node(&self, node_id: Id) -> Result<ForEachNodeConfig, StoreError>;

    /// Execution records of a node, oldest first.
    async fn executions_by_node(&self, node_id: Id) -> Result<Vec<NodeExecution>, StoreError>;
}

#[async_trait]
pub trait RecordWriter: Send + Sync {
    async fn insert_execution(&self, exec: &NodeExecution) -> Result<(), StoreError>;

    async fn update_execution(&self, exec: &NodeExecution) -> Result<(), StoreError>;

    async fn insert_response(&self, resp: &ExampleResponse) -> Result<(), StoreError>;

    async fn update_response(&self, resp: &ExampleResponse) -> Result<(), StoreError>;

    async fn insert_response_headers_bulk(&self, headers: &[ResponseHeader]) -> Result<(), StoreError>;

    async fn update_response_headers_bulk(&self, headers: &[ResponseHeader]) -> Result<(), StoreError>;

    async fn delete_response_headers(&self, ids: &[Id]) -> Result<(), StoreError>;

    async fn insert_assertion_results_bulk(&self, results: &[AssertionResult]) -> Result<(), StoreError>;

    async fn delete_assertion_results(&self, response_id: Id) -> Result<(), StoreError>;
}

/// A write transaction. Reads through it share its connection.
#[async_trait]
pub trait StoreTx: ExampleReader + RecordWriter {
    async fn commit(&self) -> Result<(), StoreError>;

    async fn rollback(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Store: ExampleReader + FlowReader + RecordWriter {
    async fn begin_tx(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("transaction already finished")]
    TxClosed,
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("store error: {0}")]
    Other(String),
}

impl StoreError {
    pub fn not_found(what: &str, id: Id) -> Self {
        StoreError::NotFound(format!("{what} {id}"))
    }
}

impl Classify for StoreError {
    fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            StoreError::TxClosed => ErrorKind::FailedPrecondition,
            StoreError::Corrupt(_) | StoreError::Migrate(_) | StoreError::Other(_) => {
                ErrorKind::Internal
            }
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => StoreError::NotFound(e.to_string()),
            // 42501: insufficient_privilege
            sqlx::Error::Database(db) if db.code().as_deref() == Some("42501") => {
                StoreError::PermissionDenied(db.message().to_string())
            }
            _ => StoreError::Other(e.to_string()),
        }
    }
}

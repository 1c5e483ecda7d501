use apiflow_core::types::{
    Assertion, AssertionResult, Edge, Endpoint, Example, ExampleParam, ExampleResponse, Flow,
    ForEachNodeConfig, ForNodeConfig, IfNodeConfig, Node, NodeExecution, NoOpNodeConfig, OrderRow,
    PartKind, RawBody, RequestNodeConfig, ResponseHeader, StateRow,
};
use apiflow_core::Id;
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tokio::sync::{Mutex, MutexGuard};

use crate::store::{ExampleReader, FlowReader, RecordWriter, Store, StoreError, StoreTx};

use super::examples;
use super::flows;
use super::records;

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn session(&self) -> Result<Session<'_>, StoreError> {
        Ok(Session::Pool(self.pool.acquire().await?))
    }
}

/// An open Postgres transaction. Dropping it without commit rolls back.
pub struct PgTx {
    tx: Mutex<Option<Transaction<'static, Postgres>>>,
}

impl PgTx {
    async fn session(&self) -> Result<Session<'_>, StoreError> {
        Ok(Session::Tx(self.tx.lock().await))
    }
}

/// Connection borrowed for a single call: a pooled one, or the transaction's.
enum Session<'a> {
    Pool(PoolConnection<Postgres>),
    Tx(MutexGuard<'a, Option<Transaction<'static, Postgres>>>),
}

impl Session<'_> {
    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        match self {
            Session::Pool(c) => Ok(&mut **c),
            Session::Tx(g) => (**g).as_mut().map(|t| &mut **t).ok_or(StoreError::TxClosed),
        }
    }
}

macro_rules! pg_services {
    ($ty:ty) => {
        #[async_trait]
        impl ExampleReader for $ty {
            async fn endpoint_by_id(&self, id: Id) -> Result<Endpoint, StoreError> {
                let mut s = self.session().await?;
                examples::endpoint_by_id(s.conn()?, id).await
            }

            async fn example_by_id(&self, id: Id) -> Result<Example, StoreError> {
                let mut s = self.session().await?;
                examples::example_by_id(s.conn()?, id).await
            }

            async fn params(
                &self,
                example_id: Id,
                kind: PartKind,
            ) -> Result<Vec<ExampleParam>, StoreError> {
                let mut s = self.session().await?;
                examples::params(s.conn()?, example_id, kind).await
            }

            async fn raw_body(&self, example_id: Id) -> Result<Option<RawBody>, StoreError> {
                let mut s = self.session().await?;
                examples::raw_body(s.conn()?, example_id).await
            }

            async fn assertions(&self, example_id: Id) -> Result<Vec<Assertion>, StoreError> {
                let mut s = self.session().await?;
                examples::assertions(s.conn()?, example_id).await
            }

            async fn order_rows_asc(
                &self,
                example_id: Id,
                kind: PartKind,
            ) -> Result<Vec<OrderRow>, StoreError> {
                let mut s = self.session().await?;
                examples::order_rows_asc(s.conn()?, example_id, kind).await
            }

            async fn state_rows(
                &self,
                example_id: Id,
                kind: PartKind,
            ) -> Result<Vec<StateRow>, StoreError> {
                let mut s = self.session().await?;
                examples::state_rows(s.conn()?, example_id, kind).await
            }

            async fn state_row(
                &self,
                example_id: Id,
                kind: PartKind,
                origin_id: Id,
            ) -> Result<Option<StateRow>, StoreError> {
                let mut s = self.session().await?;
                examples::state_row(s.conn()?, example_id, kind, origin_id).await
            }

            async fn delta_row(
                &self,
                example_id: Id,
                kind: PartKind,
                delta_id: Id,
            ) -> Result<Option<ExampleParam>, StoreError> {
                let mut s = self.session().await?;
                examples::delta_row(s.conn()?, example_id, kind, delta_id).await
            }

            async fn response_by_example(
                &self,
                example_id: Id,
            ) -> Result<Option<ExampleResponse>, StoreError> {
                let mut s = self.session().await?;
                examples::response_by_example(s.conn()?, example_id).await
            }

            async fn response_headers(
                &self,
                response_id: Id,
            ) -> Result<Vec<ResponseHeader>, StoreError> {
                let mut s = self.session().await?;
                examples::response_headers(s.conn()?, response_id).await
            }

            async fn assertion_results(
                &self,
                response_id: Id,
            ) -> Result<Vec<AssertionResult>, StoreError> {
                let mut s = self.session().await?;
                examples::assertion_results(s.conn()?, response_id).await
            }
        }

        #[async_trait]
        impl RecordWriter for $ty {
            async fn insert_execution(&self, exec: &NodeExecution) -> Result<(), StoreError> {
                let mut s = self.session().await?;
                records::insert_execution(s.conn()?, exec).await
            }

            async fn update_execution(&self, exec: &NodeExecution) -> Result<(), StoreError> {
                let mut s = self.session().await?;
                records::update_execution(s.conn()?, exec).await
            }

            async fn insert_response(&self, resp: &ExampleResponse) -> Result<(), StoreError> {
                let mut s = self.session().await?;
                records::insert_response(s.conn()?, resp).await
            }

            async fn update_response(&self, resp: &ExampleResponse) -> Result<(), StoreError> {
                let mut s = self.session().await?;
                records::update_response(s.conn()?, resp).await
            }

            async fn insert_response_headers_bulk(
                &self,
                headers: &[ResponseHeader],
            ) -> Result<(), StoreError> {
                let mut s = self.session().await?;
                records::insert_response_headers(s.conn()?, headers).await
            }

            async fn update_response_headers_bulk(
                &self,
                headers: &[ResponseHeader],
            ) -> Result<(), StoreError> {
                let mut s = self.session().await?;
                records::update_response_headers(s.conn()?, headers).await
            }

            async fn delete_response_headers(&self, ids: &[Id]) -> Result<(), StoreError> {
                let mut s = self.session().await?;
                records::delete_response_headers(s.conn()?, ids).await
            }

            async fn insert_assertion_results_bulk(
                &self,
                results: &[AssertionResult],
            ) -> Result<(), StoreError> {
                let mut s = self.session().await?;
                records::insert_assertion_results(s.conn()?, results).await
            }

            async fn delete_assertion_results(&self, response_id: Id) -> Result<(), StoreError> {
                let mut s = self.session().await?;
                records::delete_assertion_results(s.conn()?, response_id).await
            }
        }
    };
}

pg_services!(PostgresStore);
pg_services!(PgTx);

#[async_trait]
impl FlowReader for PostgresStore {
    async fn flow(&self, id: Id) -> Result<Flow, StoreError> {
        let mut s = self.session().await?;
        flows::flow(s.conn()?, id).await
    }

    async fn nodes(&self, flow_id: Id) -> Result<Vec<Node>, StoreError> {
        let mut s = self.session().await?;
        flows::nodes(s.conn()?, flow_id).await
    }

    async fn edges(&self, flow_id: Id) -> Result<Vec<Edge>, StoreError> {
        let mut s = self.session().await?;
        flows::edges(s.conn()?, flow_id).await
    }

    async fn noop_node(&self, node_id: Id) -> Result<NoOpNodeConfig, StoreError> {
        let mut s = self.session().await?;
        flows::noop_node(s.conn()?, node_id).await
    }

    async fn request_node(&self, node_id: Id) -> Result<RequestNodeConfig, StoreError> {
        let mut s = self.session().await?;
        flows::request_node(s.conn()?, node_id).await
    }

    async fn if_node(&self, node_id: Id) -> Result<IfNodeConfig, StoreError> {
        let mut s = self.session().await?;
        flows::if_node(s.conn()?, node_id).await
    }

    async fn for_node(&self, node_id: Id) -> Result<ForNodeConfig, StoreError> {
        let mut s = self.session().await?;
        flows::for_node(s.conn()?, node_id).await
    }

    async fn for_each_node(&self, node_id: Id) -> Result<ForEachNodeConfig, StoreError> {
        let mut s = self.session().await?;
        flows::for_each_node(s.conn()?, node_id).await
    }

    async fn executions_by_node(&self, node_id: Id) -> Result<Vec<NodeExecution>, StoreError> {
        let mut s = self.session().await?;
        flows::executions_by_node(s.conn()?, node_id).await
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin_tx(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx {
            tx: Mutex::new(Some(tx)),
        }))
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn commit(&self) -> Result<(), StoreError> {
        let tx = self.tx.lock().await.take().ok_or(StoreError::TxClosed)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&self) -> Result<(), StoreError> {
        let tx = self.tx.lock().await.take().ok_or(StoreError::TxClosed)?;
        tx.rollback().await?;
        Ok(())
    }
}

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Deref;

use apiflow_core::types::{
    Assertion, AssertionResult, Edge, Endpoint, Example, ExampleParam, ExampleResponse, Flow,
    ForEachNodeConfig, ForNodeConfig, IfNodeConfig, Node, NodeExecution, NoOpNodeConfig, OrderRow,
    PartKind, RawBody, RequestNodeConfig, ResponseHeader, StateRow,
};
use apiflow_core::Id;

use crate::store::StoreError;

#[derive(Debug, Clone, Default)]
pub(crate) struct Tables {
    pub endpoints: BTreeMap<Id, Endpoint>,
    pub examples: BTreeMap<Id, Example>,
    pub params: Vec<(PartKind, ExampleParam)>,
    pub raw_bodies: BTreeMap<Id, RawBody>,
    pub assertions: Vec<Assertion>,
    pub order_rows: Vec<OrderRow>,
    pub state_rows: Vec<StateRow>,
    pub flows: BTreeMap<Id, Flow>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub noop_nodes: BTreeMap<Id, NoOpNodeConfig>,
    pub request_nodes: BTreeMap<Id, RequestNodeConfig>,
    pub if_nodes: BTreeMap<Id, IfNodeConfig>,
    pub for_nodes: BTreeMap<Id, ForNodeConfig>,
    pub for_each_nodes: BTreeMap<Id, ForEachNodeConfig>,
    pub executions: Vec<NodeExecution>,
    pub responses: Vec<ExampleResponse>,
    pub response_headers: Vec<ResponseHeader>,
    pub assertion_results: Vec<AssertionResult>,
}

/// A staged write, replayed on commit.
#[derive(Debug, Clone)]
pub(crate) enum Op {
    InsertExecution(NodeExecution),
    UpdateExecution(NodeExecution),
    InsertResponse(ExampleResponse),
    UpdateResponse(ExampleResponse),
    InsertHeaders(Vec<ResponseHeader>),
    UpdateHeaders(Vec<ResponseHeader>),
    DeleteHeaders(Vec<Id>),
    InsertResults(Vec<AssertionResult>),
    DeleteResults(Id),
}

/// The tables a transaction can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Table {
    Executions,
    Responses,
    ResponseHeaders,
    AssertionResults,
}

impl Op {
    pub fn table(&self) -> Table {
        match self {
            Op::InsertExecution(_) | Op::UpdateExecution(_) => Table::Executions,
            Op::InsertResponse(_) | Op::UpdateResponse(_) => Table::Responses,
            Op::InsertHeaders(_) | Op::UpdateHeaders(_) | Op::DeleteHeaders(_) => {
                Table::ResponseHeaders
            }
            Op::InsertResults(_) | Op::DeleteResults(_) => Table::AssertionResults,
        }
    }
}

/// A transaction's reads: tables it has written come from its staged copy,
/// everything else from the shared tables.
pub(crate) struct View<'a> {
    pub base: &'a Tables,
    pub staged: &'a Tables,
    pub copied: &'a BTreeSet<Table>,
}

impl View<'_> {
    fn pick(&self, table: Table) -> &Tables {
        if self.copied.contains(&table) {
            self.staged
        } else {
            self.base
        }
    }

    pub fn response_by_example(&self, example_id: Id) -> Option<ExampleResponse> {
        self.pick(Table::Responses).response_by_example(example_id)
    }

    pub fn response_headers(&self, response_id: Id) -> Vec<ResponseHeader> {
        self.pick(Table::ResponseHeaders).response_headers(response_id)
    }

    pub fn assertion_results(&self, response_id: Id) -> Vec<AssertionResult> {
        self.pick(Table::AssertionResults).assertion_results(response_id)
    }
}

impl Deref for View<'_> {
    type Target = Tables;

    fn deref(&self) -> &Tables {
        self.base
    }
}

fn found<T: Clone>(v: Option<&T>, what: &str, id: Id) -> Result<T, StoreError> {
    v.cloned().ok_or_else(|| StoreError::not_found(what, id))
}

impl Tables {
    pub fn endpoint(&self, id: Id) -> Result<Endpoint, StoreError> {
        found(self.endpoints.get(&id), "endpoint", id)
    }

    pub fn example(&self, id: Id) -> Result<Example, StoreError> {
        found(self.examples.get(&id), "example", id)
    }

    pub fn params(&self, example_id: Id, kind: PartKind) -> Vec<ExampleParam> {
        self.params
            .iter()
            .filter(|(k, p)| *k == kind && p.example_id == example_id)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn raw_body(&self, example_id: Id) -> Option<RawBody> {
        self.raw_bodies.get(&example_id).cloned()
    }

    pub fn assertions(&self, example_id: Id) -> Vec<Assertion> {
        self.assertions
            .iter()
            .filter(|a| a.example_id == example_id)
            .cloned()
            .collect()
    }

    pub fn order_rows_asc(&self, example_id: Id, kind: PartKind) -> Vec<OrderRow> {
        let mut rows: Vec<OrderRow> = self
            .order_rows
            .iter()
            .filter(|r| r.example_id == example_id && r.part_kind == kind)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        rows
    }

    pub fn state_rows(&self, example_id: Id, kind: PartKind) -> Vec<StateRow> {
        self.state_rows
            .iter()
            .filter(|r| r.example_id == example_id && r.part_kind == kind)
            .cloned()
            .collect()
    }

    pub fn state_row(&self, example_id: Id, kind: PartKind, origin_id: Id) -> Option<StateRow> {
        self.state_rows
            .iter()
            .find(|r| r.example_id == example_id && r.part_kind == kind && r.origin_id == origin_id)
            .cloned()
    }

    pub fn delta_row(&self, example_id: Id, kind: PartKind, delta_id: Id) -> Option<ExampleParam> {
        self.params
            .iter()
            .find(|(k, p)| *k == kind && p.example_id == example_id && p.id == delta_id)
            .map(|(_, p)| p.clone())
    }

    pub fn response_by_example(&self, example_id: Id) -> Option<ExampleResponse> {
        self.responses
            .iter()
            .find(|r| r.example_id == example_id)
            .cloned()
    }

    pub fn response_headers(&self, response_id: Id) -> Vec<ResponseHeader> {
        self.response_headers
            .iter()
            .filter(|h| h.response_id == response_id)
            .cloned()
            .collect()
    }

    pub fn assertion_results(&self, response_id: Id) -> Vec<AssertionResult> {
        self.assertion_results
            .iter()
            .filter(|r| r.response_id == response_id)
            .cloned()
            .collect()
    }

    pub fn flow(&self, id: Id) -> Result<Flow, StoreError> {
        found(self.flows.get(&id), "flow", id)
    }

    pub fn nodes(&self, flow_id: Id) -> Vec<Node> {
        self.nodes
            .iter()
            .filter(|n| n.flow_id == flow_id)
            .cloned()
            .collect()
    }

    pub fn edges(&self, flow_id: Id) -> Vec<Edge> {
        self.edges
            .iter()
            .filter(|e| e.flow_id == flow_id)
            .cloned()
            .collect()
    }

    pub fn executions_by_node(&self, node_id: Id) -> Vec<NodeExecution> {
        self.executions
            .iter()
            .filter(|e| e.node_id == node_id)
            .cloned()
            .collect()
    }

    pub fn copy_table(&mut self, from: &Tables, table: Table) {
        match table {
            Table::Executions => self.executions = from.executions.clone(),
            Table::Responses => self.responses = from.responses.clone(),
            Table::ResponseHeaders => self.response_headers = from.response_headers.clone(),
            Table::AssertionResults => self.assertion_results = from.assertion_results.clone(),
        }
    }

    pub fn take_table(&mut self, from: &mut Tables, table: Table) {
        use std::mem::take;
        match table {
            Table::Executions => self.executions = take(&mut from.executions),
            Table::Responses => self.responses = take(&mut from.responses),
            Table::ResponseHeaders => self.response_headers = take(&mut from.response_headers),
            Table::AssertionResults => self.assertion_results = take(&mut from.assertion_results),
        }
    }

    pub fn apply(&mut self, op: Op) -> Result<(), StoreError> {
        match op {
            Op::InsertExecution(exec) => {
                if self.executions.iter().any(|e| e.id == exec.id) {
                    return Err(StoreError::Other(format!("duplicate execution {}", exec.id)));
                }
                self.executions.push(exec);
            }
            Op::UpdateExecution(exec) => {
                let slot = self
                    .executions
                    .iter_mut()
                    .find(|e| e.id == exec.id)
                    .ok_or_else(|| StoreError::not_found("execution", exec.id))?;
                *slot = exec;
            }
            Op::InsertResponse(resp) => {
                if self.responses.iter().any(|r| r.id == resp.id) {
                    return Err(StoreError::Other(format!("duplicate response {}", resp.id)));
                }
                self.responses.push(resp);
            }
            Op::UpdateResponse(resp) => {
                let slot = self
                    .responses
                    .iter_mut()
                    .find(|r| r.id == resp.id)
                    .ok_or_else(|| StoreError::not_found("response", resp.id))?;
                *slot = resp;
            }
            Op::InsertHeaders(headers) => self.response_headers.extend(headers),
            Op::UpdateHeaders(headers) => {
                for h in headers {
                    let slot = self
                        .response_headers
                        .iter_mut()
                        .find(|x| x.id == h.id)
                        .ok_or_else(|| StoreError::not_found("response header", h.id))?;
                    *slot = h;
                }
            }
            Op::DeleteHeaders(ids) => self.response_headers.retain(|h| !ids.contains(&h.id)),
            Op::InsertResults(results) => self.assertion_results.extend(results),
            Op::DeleteResults(response_id) => {
                self.assertion_results.retain(|r| r.response_id != response_id)
            }
        }
        Ok(())
    }
}

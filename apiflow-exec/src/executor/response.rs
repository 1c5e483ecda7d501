use std::collections::{BTreeMap, VecDeque};

use apiflow_core::compress::{self, CompressError};
use apiflow_core::error::{Classify, ErrorKind};
use apiflow_core::expressions::{parse_expression, ExprError};
use apiflow_core::types::{Assertion, AssertionResult, ExampleResponse, ResponseHeader};
use apiflow_core::varsystem::{substitute, VarError, VarLookup};
use apiflow_core::Id;
use serde_json::{json, Value as JsonValue};

use crate::executor::http::HttpResponse;
use crate::executor::request::Dispatched;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("assertion template: {0}")]
    Template(#[from] VarError),
    #[error("assertion: {0}")]
    Parse(#[from] ExprError),
    #[error("response body: {0}")]
    Compress(#[from] CompressError),
}

impl Classify for ProcessError {
    fn kind(&self) -> ErrorKind {
        match self {
            ProcessError::Template(_) | ProcessError::Parse(_) => ErrorKind::InvalidArgument,
            ProcessError::Compress(_) => ErrorKind::Internal,
        }
    }
}

/// Header rows to write so the stored set mirrors the latest response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderOps {
    pub create: Vec<ResponseHeader>,
    pub update: Vec<ResponseHeader>,
    pub delete: Vec<Id>,
}

impl HeaderOps {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

/// Match fresh headers against stored ones by key. Duplicate keys pair up in
/// order; unchanged values produce no operation.
pub fn diff_headers(response_id: Id, prior: &[ResponseHeader], fresh: &[(String, String)]) -> HeaderOps {
    let mut by_key: BTreeMap<&str, VecDeque<&ResponseHeader>> = BTreeMap::new();
    for h in prior {
        by_key.entry(h.key.as_str()).or_default().push_back(h);
    }

    let mut ops = HeaderOps::default();
    for (key, value) in fresh {
        match by_key.get_mut(key.as_str()).and_then(|q| q.pop_front()) {
            Some(old) if old.value == *value => {}
            Some(old) => ops.update.push(ResponseHeader {
                value: value.clone(),
                ..old.clone()
            }),
            None => ops.create.push(ResponseHeader {
                id: Id::new(),
                response_id,
                key: key.clone(),
                value: value.clone(),
            }),
        }
    }
    ops.delete = by_key.into_values().flatten().map(|h| h.id).collect();
    ops
}

/// `{response: {status, body, headers, duration}}`, the root assertions see.
/// The body is parsed as JSON when possible, else kept as text.
pub fn response_root(resp: &HttpResponse, duration_ms: i64) -> JsonValue {
    let body = serde_json::from_slice::<JsonValue>(&resp.body)
        .unwrap_or_else(|_| JsonValue::String(String::from_utf8_lossy(&resp.body).into_owned()));
    let headers: serde_json::Map<String, JsonValue> = resp
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
        .collect();
    json!({
        "response": {
            "status": resp.status,
            "body": body,
            "headers": headers,
            "duration": duration_ms,
        }
    })
}

#[derive(Debug, Clone)]
pub struct ProcessedResponse {
    pub response: ExampleResponse,
    pub header_ops: HeaderOps,
    pub results: Vec<AssertionResult>,
    /// The assertion root, reused as the node's response output.
    pub root: JsonValue,
}

/// Fold a dispatched response into the stored response row, its header
/// operations and one result per enabled assertion.
pub fn process_response<L>(
    dispatched: &Dispatched,
    shell: ExampleResponse,
    prior_headers: &[ResponseHeader],
    assertions: &[Assertion],
    vars: &L,
    compress_threshold: usize,
) -> Result<ProcessedResponse, ProcessError>
where
    L: VarLookup + ?Sized,
{
    let resp = &dispatched.response;
    let duration_ms = i64::try_from(dispatched.duration.as_millis()).unwrap_or(i64::MAX);
    let (body, body_compress_kind) = compress::compress_if_smaller(resp.body.clone(), compress_threshold)?;
    let response = ExampleResponse {
        status: resp.status,
        body,
        body_compress_kind,
        duration_ms,
        ..shell
    };

    let header_ops = diff_headers(response.id, prior_headers, &resp.headers);
    let root = response_root(resp, duration_ms);

    let mut results = Vec::new();
    for a in assertions.iter().filter(|a| a.enabled) {
        let src = substitute(vars, &a.condition.expression)?;
        let expr = parse_expression(&src)?;
        results.push(AssertionResult {
            id: Id::new(),
            response_id: response.id,
            assert_id: a.id,
            result: expr.check(&root),
        });
    }

    Ok(ProcessedResponse {
        response,
        header_ops,
        results,
        root,
    })
}

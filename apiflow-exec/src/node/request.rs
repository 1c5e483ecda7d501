use apiflow_core::error::FlowError;
use apiflow_core::graph::NodeIdx;
use apiflow_core::overlay::{self, OverlayInput, OverlayPart};
use apiflow_core::types::{
    BodyKind, Endpoint, Example, ExampleParam, ExampleResponse, Handle, PartKind,
    RequestNodeConfig,
};
use apiflow_core::Id;
use apiflow_store::{ExampleReader, RecordWriter, Store, StoreError, StoreTx};
use serde_json::{json, Map, Value as JsonValue};

use super::{flow_err, NodeOutcome};
use crate::executor::http::PreparedRequest;
use crate::executor::request::{build_request, send_prepared, RequestParts};
use crate::executor::response::{process_response, ProcessedResponse};
use crate::flow::{RunContext, RunScope};

pub(super) async fn run(
    cfg: &RequestNodeConfig,
    ctx: &RunContext,
    idx: NodeIdx,
    scope: &mut RunScope,
) -> Result<NodeOutcome, FlowError> {
    let store = ctx.store.as_ref();

    // Every read happens before the write transaction opens.
    let endpoint = effective_endpoint(store, cfg).await.map_err(flow_err)?;
    let origin = store.example_by_id(cfg.example_id).await.map_err(flow_err)?;
    let delta = match cfg.delta_example_id {
        Some(id) => Some(store.example_by_id(id).await.map_err(flow_err)?),
        None => None,
    };
    let delta_id = delta.as_ref().map(|d| d.id);

    let example = match &delta {
        Some(d) if d.body_kind != BodyKind::Unspecified => Example {
            body_kind: d.body_kind,
            ..origin.clone()
        },
        _ => origin.clone(),
    };

    let queries = params(store, origin.id, delta_id, PartKind::Query).await?;
    let headers = params(store, origin.id, delta_id, PartKind::Header).await?;
    let form_body = params(store, origin.id, delta_id, PartKind::Form).await?;
    let url_body = params(store, origin.id, delta_id, PartKind::UrlEncoded).await?;

    let raw_body = {
        let base = store.raw_body(origin.id).await.map_err(flow_err)?;
        let over = match delta_id {
            Some(id) => store.raw_body(id).await.map_err(flow_err)?,
            None => None,
        };
        overlay::resolve_raw_body(base, over)
    };

    let assertions = {
        let base = store.assertions(origin.id).await.map_err(flow_err)?;
        match delta_id {
            Some(id) => {
                let own = store.assertions(id).await.map_err(flow_err)?;
                overlaid(store, base, own, id, PartKind::Assertion).await?
            }
            None => base,
        }
    };

    let target = delta_id.unwrap_or(origin.id);
    let prior = store.response_by_example(target).await.map_err(flow_err)?;
    let prior_headers = match &prior {
        Some(r) => store.response_headers(r.id).await.map_err(flow_err)?,
        None => Vec::new(),
    };

    let req = build_request(
        RequestParts {
            endpoint: &endpoint,
            example: &example,
            queries: &queries,
            headers: &headers,
            raw_body: raw_body.as_ref(),
            form_body: &form_body,
            url_body: &url_body,
        },
        &*scope,
    )
    .map_err(flow_err)?;
    let request_json = request_json(&req);

    let dispatched = send_prepared(
        ctx.http.as_ref(),
        req,
        ctx.config.http_timeout(),
        ctx.config.max_response_bytes,
    )
    .await
    .map_err(flow_err)?;

    let had_prior = prior.is_some();
    let shell = prior.unwrap_or_else(|| ExampleResponse::shell(target));
    let processed = process_response(
        &dispatched,
        shell,
        &prior_headers,
        &assertions,
        &*scope,
        ctx.config.compress_threshold_bytes,
    )
    .map_err(flow_err)?;

    let tx = store.begin_tx().await.map_err(flow_err)?;
    if let Err(e) = persist(tx.as_ref(), &processed, had_prior).await {
        if let Err(rb) = tx.rollback().await {
            tracing::warn!(error = %rb, "rollback after failed response write");
        }
        return Err(flow_err(e));
    }
    tx.commit().await.map_err(flow_err)?;

    let name = &ctx.graph.node(idx).name;
    tracing::debug!(
        node = %name,
        status = processed.response.status,
        duration_ms = processed.response.duration_ms,
        assertions = processed.results.len(),
        "request finished"
    );

    let response = processed.root["response"].clone();
    let headers = response["headers"].clone();
    scope.set_last_request(request_json["queries"].clone(), response.clone());
    Ok(NodeOutcome {
        next: ctx.graph.targets(idx, Handle::Unspecified),
        input: json!({ "request": request_json.clone() }),
        output: json!({
            "request": request_json,
            "response": response,
            "headers": headers,
        }),
    })
}

/// The origin endpoint with a delta endpoint's non-empty method and url applied.
async fn effective_endpoint(store: &dyn Store, cfg: &RequestNodeConfig) -> Result<Endpoint, StoreError> {
    let mut endpoint = store.endpoint_by_id(cfg.endpoint_id).await?;
    if let Some(id) = cfg.delta_endpoint_id {
        let delta = store.endpoint_by_id(id).await?;
        if !delta.method.is_empty() {
            endpoint.method = delta.method;
        }
        if !delta.url.is_empty() {
            endpoint.url = delta.url;
        }
    }
    Ok(endpoint)
}

async fn params(
    store: &dyn Store,
    origin: Id,
    delta: Option<Id>,
    kind: PartKind,
) -> Result<Vec<ExampleParam>, FlowError> {
    let base = store.params(origin, kind).await.map_err(flow_err)?;
    match delta {
        Some(id) => {
            let own = store.params(id, kind).await.map_err(flow_err)?;
            overlaid(store, base, own, id, kind).await
        }
        None => Ok(base),
    }
}

async fn overlaid<T: OverlayPart + Send + Sync>(
    store: &dyn Store,
    origin: Vec<T>,
    delta: Vec<T>,
    delta_example_id: Id,
    kind: PartKind,
) -> Result<Vec<T>, FlowError> {
    let order = store.order_rows_asc(delta_example_id, kind).await.map_err(flow_err)?;
    let states = store.state_rows(delta_example_id, kind).await.map_err(flow_err)?;
    overlay::merge(OverlayInput {
        origin: &origin,
        delta: &delta,
        order: &order,
        states: &states,
        delta_example_id,
    })
    .map_err(flow_err)
}

async fn persist(tx: &dyn StoreTx, p: &ProcessedResponse, had_prior: bool) -> Result<(), StoreError> {
    if had_prior {
        tx.update_response(&p.response).await?;
    } else {
        tx.insert_response(&p.response).await?;
    }

    let ops = &p.header_ops;
    if !ops.delete.is_empty() {
        tx.delete_response_headers(&ops.delete).await?;
    }
    if !ops.update.is_empty() {
        tx.update_response_headers_bulk(&ops.update).await?;
    }
    if !ops.create.is_empty() {
        tx.insert_response_headers_bulk(&ops.create).await?;
    }

    tx.delete_assertion_results(p.response.id).await?;
    if !p.results.is_empty() {
        tx.insert_assertion_results_bulk(&p.results).await?;
    }
    Ok(())
}

fn request_json(req: &PreparedRequest) -> JsonValue {
    let headers: Map<String, JsonValue> = req
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
        .collect();
    let queries: Map<String, JsonValue> = req
        .queries
        .iter()
        .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
        .collect();
    json!({
        "method": req.method,
        "url": req.url,
        "headers": headers,
        "queries": queries,
        "body": String::from_utf8_lossy(&req.body),
    })
}

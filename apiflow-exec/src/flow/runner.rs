use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use apiflow_core::error::{ErrorKind, FlowError};
use apiflow_core::graph::{FlowGraph, NodeIdx};
use apiflow_core::types::{ExecutionPayload, ExecutionState, NodeExecution, OutputKind};
use apiflow_core::varsystem::VarMap;
use apiflow_core::Id;
use apiflow_store::{FlowReader, RecordWriter, Store};
use chrono::Utc;
use futures_util::future::BoxFuture;
use tokio::time::Instant;

use crate::cancel::CancelToken;
use crate::config::ExecutorConfig;
use crate::executor::events::{Event, EventSink, NoOpEventSink};
use crate::executor::http::HttpClient;
use crate::flow::scope::RunScope;
use crate::node::{flow_err, NodeImpl, NodeOutcome};

/// Everything a node needs while a run is in flight.
pub struct RunContext {
    pub run_id: Id,
    pub store: Arc<dyn Store>,
    pub http: Arc<dyn HttpClient>,
    pub sink: Arc<dyn EventSink>,
    pub config: ExecutorConfig,
    pub cancel: CancelToken,
    pub graph: FlowGraph,
    nodes: Vec<NodeImpl>,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: Id,
    pub state: ExecutionState,
    /// The error of the node that ended the run, if it did not succeed.
    pub error: Option<FlowError>,
    pub scope: RunScope,
}

/// Executes flows. Cheap to share; each `run` is independent.
pub struct FlowRunner {
    store: Arc<dyn Store>,
    http: Arc<dyn HttpClient>,
    sink: Arc<dyn EventSink>,
    config: ExecutorConfig,
}

impl FlowRunner {
    pub fn new(store: Arc<dyn Store>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            store,
            http,
            sink: Arc::new(NoOpEventSink),
            config: ExecutorConfig::default(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `flow_id` from its START node. Only enabled `env` entries are visible.
    pub async fn run(&self, flow_id: Id, env: &VarMap, cancel: CancelToken) -> RunOutcome {
        let run_id = Id::new();
        tracing::info!(%run_id, %flow_id, "run starting");
        self.sink.emit(Event::RunStarted { run_id, flow_id }).await;

        let mut scope = RunScope::new(env);
        let result = match self.prepare(run_id, flow_id, cancel).await {
            Ok(ctx) => walk(&ctx, vec![ctx.graph.start()], &mut scope, None, None).await,
            Err(e) => Err(e),
        };

        let (state, error) = match result {
            Ok(()) => (ExecutionState::Success, None),
            Err(e) if e.is_canceled() => (ExecutionState::Canceled, Some(e)),
            Err(e) => (ExecutionState::Failure, Some(e)),
        };
        match &error {
            Some(e) => tracing::warn!(%run_id, state = state.as_str(), error = %e, "run finished"),
            None => tracing::info!(%run_id, state = state.as_str(), "run finished"),
        }
        self.sink
            .emit(Event::RunFinished {
                run_id,
                state,
                error: error.clone(),
            })
            .await;

        RunOutcome {
            run_id,
            state,
            error,
            scope,
        }
    }

    async fn prepare(&self, run_id: Id, flow_id: Id, cancel: CancelToken) -> Result<RunContext, FlowError> {
        let store = self.store.as_ref();
        store.flow(flow_id).await.map_err(flow_err)?;
        let nodes = store.nodes(flow_id).await.map_err(flow_err)?;
        let edges = store.edges(flow_id).await.map_err(flow_err)?;

        let mut impls = Vec::with_capacity(nodes.len());
        for node in &nodes {
            impls.push(NodeImpl::load(store, node).await.map_err(flow_err)?);
        }
        let noop_kinds: BTreeMap<Id, _> = nodes
            .iter()
            .zip(&impls)
            .filter_map(|(n, imp)| imp.noop_kind().map(|k| (n.id, k)))
            .collect();
        let graph = FlowGraph::build(nodes, edges, &noop_kinds).map_err(flow_err)?;

        Ok(RunContext {
            run_id,
            store: Arc::clone(&self.store),
            http: Arc::clone(&self.http),
            sink: Arc::clone(&self.sink),
            config: self.config.clone(),
            cancel,
            graph,
            nodes: impls,
        })
    }
}

/// Execute nodes depth first from `start`. Several targets on one handle run
/// in edge order. Reaching `stop_at` ends that path; loop bodies pass their
/// own node so the back edge closes the iteration, and the loop's deadline
/// so every body node is bounded by it.
pub fn walk<'a>(
    ctx: &'a RunContext,
    start: Vec<NodeIdx>,
    scope: &'a mut RunScope,
    stop_at: Option<NodeIdx>,
    deadline: Option<Instant>,
) -> BoxFuture<'a, Result<(), FlowError>> {
    Box::pin(async move {
        let mut stack: Vec<NodeIdx> = start.into_iter().rev().collect();
        while let Some(idx) = stack.pop() {
            if Some(idx) == stop_at {
                continue;
            }
            if ctx.cancel.is_cancelled() {
                return Err(canceled(&ctx.cancel));
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(deadline_exceeded());
            }
            let next = step(ctx, idx, scope, deadline).await?;
            stack.extend(next.into_iter().rev());
        }
        Ok(())
    })
}

/// Run one node: record RUNNING, execute under cancellation and deadline,
/// record the terminal state and bind the output.
///
/// Loop nodes are not raced against cancellation or their deadline here.
/// Their body nodes are, one `step` each, so the innermost running node is
/// the one recorded CANCELED and every started node gets a terminal record.
async fn step(
    ctx: &RunContext,
    idx: NodeIdx,
    scope: &mut RunScope,
    inherited: Option<Instant>,
) -> Result<Vec<NodeIdx>, FlowError> {
    let node = ctx.graph.node(idx);
    let mut exec = NodeExecution::running(node.id, node.name.clone());
    ctx.store.insert_execution(&exec).await.map_err(flow_err)?;
    ctx.sink
        .emit(Event::NodeExecutionStarted {
            run_id: ctx.run_id,
            exec_id: exec.id,
            node_id: node.id,
            name: node.name.clone(),
            at: exec.started_at,
        })
        .await;
    tracing::debug!(run_id = %ctx.run_id, node = %node.name, exec_id = %exec.id, kind = node.kind.as_str(), "node started");

    let own = ctx.config.node_timeout(node.kind).map(|d| Instant::now() + d);
    let deadline = match (own, inherited) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    let result = if node.kind.is_loop() {
        ctx.nodes[idx.0].run(ctx, idx, scope, deadline).await
    } else {
        let fut = ctx.nodes[idx.0].run(ctx, idx, scope, deadline);
        tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(canceled(&ctx.cancel)),
            r = with_deadline(deadline, fut) => r,
        }
    };

    let threshold = ctx.config.compress_threshold_bytes;
    let result = result.and_then(|outcome| {
        let input = ExecutionPayload::encode(&outcome.input, threshold).map_err(flow_err)?;
        let output = ExecutionPayload::encode(&outcome.output, threshold).map_err(flow_err)?;
        Ok((outcome, input, output))
    });

    exec.completed_at = Some(Utc::now());
    match &result {
        Ok((outcome, input, output)) => {
            exec.state = ExecutionState::Success;
            exec.input = input.clone();
            exec.output = output.clone();
            exec.output_kind = OutputKind::of(&outcome.output);
        }
        Err(e) => {
            exec.state = match e.kind {
                ErrorKind::Canceled | ErrorKind::DeadlineExceeded => ExecutionState::Canceled,
                _ => ExecutionState::Failure,
            };
            exec.error = Some(e.clone());
        }
    }

    if let Err(e) = ctx.store.update_execution(&exec).await {
        tracing::warn!(run_id = %ctx.run_id, exec_id = %exec.id, error = %e, "execution record not updated");
    }
    ctx.sink
        .emit(Event::NodeExecutionFinished {
            run_id: ctx.run_id,
            exec_id: exec.id,
            node_id: node.id,
            state: exec.state,
            error: exec.error.clone(),
            output_kind: exec.output_kind,
            completed_at: exec.completed_at.unwrap_or_else(Utc::now),
        })
        .await;
    tracing::debug!(run_id = %ctx.run_id, node = %node.name, exec_id = %exec.id, state = exec.state.as_str(), "node finished");

    let (outcome, _, _) = result?;
    let NodeOutcome { next, output, .. } = outcome;
    if !output.is_null() {
        scope.set_node(node.name.clone(), output.clone());
        ctx.sink
            .emit(Event::VarSet {
                run_id: ctx.run_id,
                name: node.name.clone(),
                value: output,
            })
            .await;
    }
    Ok(next)
}

async fn with_deadline<F>(deadline: Option<Instant>, fut: F) -> Result<NodeOutcome, FlowError>
where
    F: Future<Output = Result<NodeOutcome, FlowError>>,
{
    match deadline {
        Some(d) => tokio::time::timeout_at(d, fut)
            .await
            .unwrap_or_else(|_| Err(deadline_exceeded())),
        None => fut.await,
    }
}

fn deadline_exceeded() -> FlowError {
    FlowError::deadline_exceeded("node did not finish before its deadline")
}

fn canceled(token: &CancelToken) -> FlowError {
    FlowError::canceled(token.reason().unwrap_or_else(|| "run canceled".to_string()))
}

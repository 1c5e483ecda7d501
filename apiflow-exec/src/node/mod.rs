//! Node kinds and their per-run behavior.
//!
//! Each variant owns its configuration; the runner dispatches on the tag and
//! follows whatever `next` the node returns.

mod branch;
mod looping;
mod request;

use apiflow_core::error::{Classify, FlowError};
use apiflow_core::graph::NodeIdx;
use apiflow_core::types::{
    ForEachNodeConfig, ForNodeConfig, Handle, IfNodeConfig, Node, NodeKind, NoOpKind,
    NoOpNodeConfig, RequestNodeConfig,
};
use apiflow_store::{FlowReader, Store, StoreError};
use serde_json::Value as JsonValue;
use tokio::time::Instant;

use crate::flow::{RunContext, RunScope};

#[derive(Debug, Clone)]
pub enum NodeImpl {
    NoOp(NoOpNodeConfig),
    Request(RequestNodeConfig),
    If(IfNodeConfig),
    For(ForNodeConfig),
    ForEach(ForEachNodeConfig),
    /// Kinds this engine cannot execute; running one fails the node.
    Unsupported(NodeKind),
}

/// What a node hands back to the runner.
#[derive(Debug, Clone, Default)]
pub struct NodeOutcome {
    pub next: Vec<NodeIdx>,
    pub input: JsonValue,
    /// Stored on the execution record and, when not null, bound to the node's name.
    pub output: JsonValue,
}

impl NodeImpl {
    /// Fetch the kind-specific configuration of `node`.
    pub async fn load(store: &dyn Store, node: &Node) -> Result<Self, StoreError> {
        Ok(match node.kind {
            NodeKind::NoOp => NodeImpl::NoOp(store.noop_node(node.id).await?),
            NodeKind::Request => NodeImpl::Request(store.request_node(node.id).await?),
            NodeKind::If => NodeImpl::If(store.if_node(node.id).await?),
            NodeKind::For => NodeImpl::For(store.for_node(node.id).await?),
            NodeKind::ForEach => NodeImpl::ForEach(store.for_each_node(node.id).await?),
            NodeKind::Js => NodeImpl::Unsupported(NodeKind::Js),
        })
    }

    pub fn noop_kind(&self) -> Option<NoOpKind> {
        match self {
            NodeImpl::NoOp(cfg) => Some(cfg.kind),
            _ => None,
        }
    }

    /// `deadline` bounds loop bodies; other kinds are bounded by the runner.
    pub async fn run(
        &self,
        ctx: &RunContext,
        idx: NodeIdx,
        scope: &mut RunScope,
        deadline: Option<Instant>,
    ) -> Result<NodeOutcome, FlowError> {
        match self {
            NodeImpl::NoOp(_) => Ok(NodeOutcome {
                next: ctx.graph.targets(idx, Handle::Unspecified),
                ..NodeOutcome::default()
            }),
            NodeImpl::Request(cfg) => request::run(cfg, ctx, idx, scope).await,
            NodeImpl::If(cfg) => branch::run(cfg, ctx, idx, scope),
            NodeImpl::For(cfg) => looping::run_for(cfg, ctx, idx, scope, deadline).await,
            NodeImpl::ForEach(cfg) => looping::run_for_each(cfg, ctx, idx, scope, deadline).await,
            NodeImpl::Unsupported(kind) => Err(FlowError::unsupported(format!(
                "{} nodes cannot be executed",
                kind.as_str()
            ))),
        }
    }
}

pub(crate) fn flow_err<E: Classify>(e: E) -> FlowError {
    e.to_flow_error()
}

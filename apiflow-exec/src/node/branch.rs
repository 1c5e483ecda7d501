use apiflow_core::error::FlowError;
use apiflow_core::expressions::parse_expression;
use apiflow_core::graph::NodeIdx;
use apiflow_core::types::{Handle, IfNodeConfig};
use apiflow_core::varsystem::substitute;
use serde_json::json;

use super::{flow_err, NodeOutcome};
use crate::flow::{RunContext, RunScope};

pub(super) fn run(
    cfg: &IfNodeConfig,
    ctx: &RunContext,
    idx: NodeIdx,
    scope: &RunScope,
) -> Result<NodeOutcome, FlowError> {
    let name = &ctx.graph.node(idx).name;
    for handle in [Handle::Then, Handle::Else] {
        if !ctx.graph.has_handle(idx, handle) {
            return Err(FlowError::failed_precondition(format!(
                "MISSING_HANDLE: {name} has no {} edge",
                handle.as_str()
            )));
        }
    }

    let src = substitute(scope, &cfg.condition.expression).map_err(flow_err)?;
    let taken = parse_expression(&src)
        .and_then(|e| e.eval_bool(&scope.root()))
        .map_err(flow_err)?;
    tracing::debug!(node = %name, condition = %src, taken, "branch");

    let handle = if taken { Handle::Then } else { Handle::Else };
    Ok(NodeOutcome {
        next: ctx.graph.targets(idx, handle),
        input: json!({ "condition": src }),
        output: json!({ "result": taken }),
    })
}

use apiflow_core::error::{ErrorKind, FlowError};
use apiflow_core::expressions::{parse_expression, Value};
use apiflow_core::graph::NodeIdx;
use apiflow_core::types::{Condition, ErrorHandling, ForEachNodeConfig, ForNodeConfig, Handle};
use apiflow_core::varsystem::substitute;
use serde_json::{json, Value as JsonValue};
use tokio::time::Instant;

use super::{flow_err, NodeOutcome};
use crate::flow::{walk, RunContext, RunScope};

pub(super) async fn run_for(
    cfg: &ForNodeConfig,
    ctx: &RunContext,
    idx: NodeIdx,
    scope: &mut RunScope,
    deadline: Option<Instant>,
) -> Result<NodeOutcome, FlowError> {
    let frames = (0..cfg.iter_count.max(0)).map(|i| json!({ "index": i }));
    let lp = Loop {
        ctx,
        idx,
        policy: cfg.error_handling,
        break_when: &cfg.expression,
        deadline,
    };
    let iterations = lp.iterate(scope, frames).await?;
    Ok(NodeOutcome {
        next: ctx.graph.targets(idx, Handle::LoopEnd),
        input: json!({ "iter_count": cfg.iter_count }),
        output: json!({ "iterations": iterations }),
    })
}

pub(super) async fn run_for_each(
    cfg: &ForEachNodeConfig,
    ctx: &RunContext,
    idx: NodeIdx,
    scope: &mut RunScope,
    deadline: Option<Instant>,
) -> Result<NodeOutcome, FlowError> {
    let lp = Loop {
        ctx,
        idx,
        policy: cfg.error_handling,
        break_when: &cfg.expression,
        deadline,
    };

    let (src, entries) = match sequence(scope, &cfg.iter_expression) {
        Ok(found) => found,
        Err(err) => {
            // No sequence, nothing to iterate: any policy other than throw
            // goes straight to LOOP_END.
            lp.tolerate(&err, 0)?;
            (cfg.iter_expression.clone(), Vec::new())
        }
    };
    let total = entries.len();
    let frames = entries
        .into_iter()
        .enumerate()
        .map(|(i, (key, item))| json!({ "item": item, "index": i, "key": key }));

    let iterations = lp.iterate(scope, frames).await?;
    Ok(NodeOutcome {
        next: ctx.graph.targets(idx, Handle::LoopEnd),
        input: json!({ "iter_expression": src, "len": total }),
        output: json!({ "iterations": iterations }),
    })
}

type Entries = Vec<(Option<String>, JsonValue)>;

/// Template and evaluate the iteration source. Arrays yield their items,
/// maps their entries.
fn sequence(scope: &RunScope, expression: &str) -> Result<(String, Entries), FlowError> {
    let src = substitute(scope, expression).map_err(flow_err)?;
    let seq = parse_expression(&src)
        .and_then(|e| e.eval(&scope.root()))
        .map_err(flow_err)?;

    let entries = match seq {
        Value::Array(items) => items.iter().map(|v| (None, v.to_json())).collect(),
        Value::Map(m) => m.iter().map(|(k, v)| (Some(k.clone()), v.to_json())).collect(),
        other => {
            return Err(FlowError::invalid_argument(format!(
                "TYPE_ERROR: cannot iterate over {}",
                other.type_name()
            )))
        }
    };
    Ok((src, entries))
}

fn should_break(scope: &RunScope, break_when: &Condition) -> Result<bool, FlowError> {
    if break_when.is_empty() {
        return Ok(false);
    }
    let src = substitute(scope, &break_when.expression).map_err(flow_err)?;
    parse_expression(&src)
        .and_then(|e| e.eval_bool(&scope.root()))
        .map_err(flow_err)
}

enum Next {
    Continue,
    Stop,
}

struct Loop<'a> {
    ctx: &'a RunContext,
    idx: NodeIdx,
    policy: ErrorHandling,
    break_when: &'a Condition,
    deadline: Option<Instant>,
}

impl Loop<'_> {
    fn name(&self) -> &str {
        &self.ctx.graph.node(self.idx).name
    }

    /// Apply the error policy to a failure raised while iterating.
    /// Cancellation and the loop's own deadline always end the loop.
    fn tolerate(&self, err: &FlowError, iteration: usize) -> Result<Next, FlowError> {
        let expired = err.kind == ErrorKind::DeadlineExceeded
            && self.deadline.is_some_and(|d| Instant::now() >= d);
        if err.is_canceled() || expired {
            return Err(err.clone());
        }
        match self.policy {
            ErrorHandling::Ignore => {
                tracing::debug!(node = %self.name(), iteration, error = %err, "loop failure ignored");
                Ok(Next::Continue)
            }
            ErrorHandling::Break => {
                tracing::debug!(node = %self.name(), iteration, error = %err, "loop failure, breaking");
                Ok(Next::Stop)
            }
            ErrorHandling::Unspecified => Err(err.clone()),
        }
    }

    /// Run the LOOP body once per frame and return how many bodies ran. The
    /// frame is bound to the loop node's name before the break condition is
    /// checked; an iteration whose break condition fails under IGNORE is
    /// skipped.
    async fn iterate<I>(&self, scope: &mut RunScope, frames: I) -> Result<usize, FlowError>
    where
        I: Iterator<Item = JsonValue> + Send,
    {
        let body = self.ctx.graph.targets(self.idx, Handle::Loop);
        let mut done = 0;

        for (iteration, frame) in frames.enumerate() {
            scope.set_node(self.name().to_string(), frame);
            match should_break(scope, self.break_when) {
                Ok(false) => {}
                Ok(true) => {
                    tracing::debug!(node = %self.name(), iteration, "loop break condition met");
                    break;
                }
                Err(err) => match self.tolerate(&err, iteration)? {
                    Next::Continue => continue,
                    Next::Stop => break,
                },
            }

            done += 1;
            let Err(err) = walk(self.ctx, body.clone(), scope, Some(self.idx), self.deadline).await else {
                continue;
            };
            if let Next::Stop = self.tolerate(&err, iteration)? {
                break;
            }
        }
        Ok(done)
    }
}

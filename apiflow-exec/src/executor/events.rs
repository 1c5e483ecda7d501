use std::sync::Arc;

use apiflow_core::error::FlowError;
use apiflow_core::types::{ExecutionState, OutputKind};
use apiflow_core::Id;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::executor::dispatcher::{StatusDispatcher, Topic};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    RunStarted {
        run_id: Id,
        flow_id: Id,
    },
    RunFinished {
        run_id: Id,
        state: ExecutionState,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<FlowError>,
    },
    NodeExecutionStarted {
        run_id: Id,
        exec_id: Id,
        node_id: Id,
        name: String,
        at: DateTime<Utc>,
    },
    NodeExecutionFinished {
        run_id: Id,
        exec_id: Id,
        node_id: Id,
        state: ExecutionState,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<FlowError>,
        output_kind: OutputKind,
        completed_at: DateTime<Utc>,
    },
    VarSet {
        run_id: Id,
        name: String,
        value: serde_json::Value,
    },
}

impl Event {
    pub fn run_id(&self) -> Id {
        match self {
            Event::RunStarted { run_id, .. }
            | Event::RunFinished { run_id, .. }
            | Event::NodeExecutionStarted { run_id, .. }
            | Event::NodeExecutionFinished { run_id, .. }
            | Event::VarSet { run_id, .. } => *run_id,
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: Event);
}

pub struct CompositeEventSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl Default for CompositeEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeEventSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

#[async_trait]
impl EventSink for CompositeEventSink {
    async fn emit(&self, event: Event) {
        for sink in &self.sinks {
            sink.emit(event.clone()).await;
        }
    }
}

/// Forwards every event to the status dispatcher on its run topic, and on the
/// owning user's topic when one is set.
pub struct DispatcherEventSink {
    dispatcher: Arc<StatusDispatcher>,
    user_id: Option<Id>,
}

impl DispatcherEventSink {
    pub fn new(dispatcher: Arc<StatusDispatcher>) -> Self {
        Self {
            dispatcher,
            user_id: None,
        }
    }

    pub fn for_user(dispatcher: Arc<StatusDispatcher>, user_id: Id) -> Self {
        Self {
            dispatcher,
            user_id: Some(user_id),
        }
    }
}

#[async_trait]
impl EventSink for DispatcherEventSink {
    async fn emit(&self, event: Event) {
        if let Some(user) = self.user_id {
            self.dispatcher.publish(Topic::User(user), event.clone());
        }
        self.dispatcher.publish(Topic::Run(event.run_id()), event);
    }
}

/// Logs events through `tracing`.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: Event) {
        match event {
            Event::RunStarted { run_id, flow_id } => {
                tracing::info!(%run_id, %flow_id, "run started");
            }
            Event::RunFinished { run_id, state, error } => match error {
                Some(e) => tracing::warn!(%run_id, state = state.as_str(), error = %e, "run finished"),
                None => tracing::info!(%run_id, state = state.as_str(), "run finished"),
            },
            Event::NodeExecutionStarted {
                run_id,
                exec_id,
                name,
                ..
            } => {
                tracing::debug!(%run_id, %exec_id, node = %name, "node started");
            }
            Event::NodeExecutionFinished {
                run_id,
                exec_id,
                state,
                error,
                ..
            } => match error {
                Some(e) => {
                    tracing::warn!(%run_id, %exec_id, state = state.as_str(), error = %e, "node finished")
                }
                None => tracing::debug!(%run_id, %exec_id, state = state.as_str(), "node finished"),
            },
            Event::VarSet { run_id, name, .. } => {
                tracing::trace!(%run_id, var = %name, "var set");
            }
        }
    }
}

/// One JSON document per line on stdout.
pub struct StdoutEventSink;

#[async_trait]
impl EventSink for StdoutEventSink {
    async fn emit(&self, event: Event) {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "event not serializable"),
        }
    }
}

pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: Event) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let run_id = Id::new();
        let ev = Event::RunFinished {
            run_id,
            state: ExecutionState::Failure,
            error: Some(FlowError::internal("boom")),
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "run_finished");
        assert_eq!(v["state"], "FAILURE");
        assert_eq!(v["error"]["kind"], "INTERNAL");
        assert_eq!(ev.run_id(), run_id);
    }
}

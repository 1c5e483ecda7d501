#![forbid(unsafe_code)]

//! Runtime engine for apiflow flows.
//!
//! The pure pieces (templating, expressions, overlay, graph) live in
//! `apiflow-core`; this crate adds HTTP, persistence through the store
//! contract, scheduling and status streaming.

pub mod cancel;
pub mod config;
pub mod executor;
pub mod flow;
pub mod logging;
pub mod node;

pub use crate::cancel::CancelToken;
pub use crate::config::{ExecutorConfig, LoadError};
pub use crate::executor::{
    Event, EventSink, HttpClient, HttpError, PreparedRequest, ReqwestHttpClient, StatusDispatcher,
    Topic,
};
pub use crate::flow::{FlowRunner, RunOutcome, RunScope};

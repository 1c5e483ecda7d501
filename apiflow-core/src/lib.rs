#![forbid(unsafe_code)]

//! Domain model and pure evaluation logic for apiflow.
//!
//! Nothing in this crate performs I/O; storage lives in `apiflow-store` and the
//! runtime (HTTP, scheduling, status streaming) lives in `apiflow-exec`.

pub mod compress;
pub mod error;
pub mod expressions;
pub mod graph;
pub mod ids;
pub mod overlay;
pub mod types;
pub mod varsystem;

pub use crate::compress::CompressKind;
pub use crate::error::{ErrorKind, FlowError};
pub use crate::expressions::{evaluate, parse_expression, ExprError, Value};
pub use crate::graph::{FlowGraph, GraphError, NodeIdx};
pub use crate::ids::{Id, IdError};
pub use crate::varsystem::{Var, VarError, VarLookup, VarMap};

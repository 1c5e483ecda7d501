mod example;
mod flow;
mod overlay;
mod record;

pub use example::{
    Assertion, BodyKind, Condition, Endpoint, Example, ExampleParam, FormField, Header, PartKind,
    Query, RawBody, UrlEncodedField, VisualizeMode,
};
pub use flow::{
    Edge, EdgeKind, ErrorHandling, Flow, ForEachNodeConfig, ForNodeConfig, Handle, IfNodeConfig,
    Node, NodeKind, NoOpKind, NoOpNodeConfig, RequestNodeConfig,
};
pub use overlay::{OrderRow, RefKind, StateRow};
pub use record::{
    AssertionResult, ExampleResponse, ExecutionPayload, ExecutionState, NodeExecution, OutputKind,
    ResponseHeader,
};

pub mod dispatcher;
pub mod events;
pub mod http;
pub mod request;
pub mod response;

pub use dispatcher::{StatusDispatcher, Topic};
pub use events::{
    CompositeEventSink, DispatcherEventSink, Event, EventSink, NoOpEventSink, StdoutEventSink,
    TracingEventSink,
};
pub use http::{HttpClient, HttpError, HttpResponse, PreparedRequest, ReqwestHttpClient};
pub use request::{build_request, send_prepared, BuildError, Dispatched, RequestParts};
pub use response::{diff_headers, process_response, HeaderOps, ProcessError, ProcessedResponse};

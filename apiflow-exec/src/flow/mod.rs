mod runner;
mod scope;

pub use runner::{walk, FlowRunner, RunContext, RunOutcome};
pub use scope::RunScope;

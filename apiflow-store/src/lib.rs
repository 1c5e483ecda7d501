#![forbid(unsafe_code)]

pub mod memory;
pub mod postgres;
pub mod store;

pub use crate::memory::MemoryStore;
pub use crate::postgres::{run_migrations, PostgresStore};
pub use crate::store::{ExampleReader, FlowReader, RecordWriter, Store, StoreError, StoreTx};

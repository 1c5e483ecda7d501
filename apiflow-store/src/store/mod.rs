mod trait_store;

pub use trait_store::{ExampleReader, FlowReader, RecordWriter, Store, StoreError, StoreTx};

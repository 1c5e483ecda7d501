mod examples;
mod flows;
mod migrate;
mod records;
mod rows;
mod store;

pub use migrate::run_migrations;
pub use store::{PgTx, PostgresStore};

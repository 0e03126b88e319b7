//! ClickHouse storage backend for the event store.

pub mod backend;
pub mod client;
pub mod config;
pub mod health;
pub mod insert;
pub mod query;
pub mod schema;

pub use backend::ClickHouseBackend;
pub use client::ClickHouseClient;
pub use config::ClickHouseConfig;
pub use health::{check_connection, init_schema};
pub use query::*;

//! Micro-batching event store.
//!
//! Events are queued per kind in bounded ring buffers and sent to a
//! [`Backend`] in batches, bounded by size and by age. Failed inserts are
//! retried with linear backoff; a batch that keeps failing is dropped.

pub mod backend;
mod batch;
pub mod config;
pub mod memory;
pub mod metrics;
mod ring;
pub mod rows;
mod store;

#[cfg(test)]
mod fixtures;

pub use backend::{ensure_read_only, Backend, QueryRow};
pub use config::{BackendKind, EventStoreConfig};
pub use memory::{MemoryBackend, MemoryTables};
pub use metrics::{EventStoreMetrics, KindMetrics};
pub use rows::{
    table_name, CustomEventRow, EventContext, FileDownloadRow, OutboundLinkClickRow, RowBatch,
    SessionRow,
};
pub use store::EventStore;

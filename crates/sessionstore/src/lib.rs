//! In-memory session store.
//!
//! Tracks the concurrent sessions of each device, keyed by the path each
//! session currently occupies. Requests that arrive before the session
//! they belong to can wait for it; expired sessions are collected
//! periodically per device using an expiry percentile.

pub mod config;
mod device;
pub mod metrics;
mod store;
mod waiters;

pub use config::SessionStoreConfig;
pub use metrics::SessionStoreMetrics;
pub use store::{GcReport, PageviewMatch, SessionStore};

//! Core types for the analytics ingestion service.
//!
//! This crate provides:
//! - Sessions, events and their kinds
//! - Page/referrer URI normalization
//! - Device fingerprints and salts
//! - User agent classification
//! - Unified error types

pub mod error;
pub mod events;
pub mod fingerprint;
pub mod session;
pub mod uri;
pub mod useragent;

pub use error::*;
pub use events::*;
pub use fingerprint::*;
pub use session::*;
pub use uri::*;
pub use useragent::*;

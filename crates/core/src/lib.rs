//! Core types and shared functionality for tsync.
//!
//! This crate provides:
//! - Named, versioned response caches with SQLite backend
//! - The structured offline store (content, summaries, pending writes)
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub(crate) mod migrations;
pub mod store;

pub use cache::{CacheDb, CachedResponse, NamedCache};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use store::{LazyStore, OfflineStore, PendingWrite, Record, RecordFamily, StoreLocation};

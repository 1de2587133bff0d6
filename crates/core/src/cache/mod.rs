//! SQLite-backed named response caches.
//!
//! This module provides the request→response caches the interceptor reads
//! and writes through. It supports:
//!
//! - Any number of caches addressed by name (`auth-cache-v5`, `api-cache-v5`)
//! - Keys derived from the normalized (method, URL) pair via SHA-256
//! - Wholesale deletion of a cache by name, used for version garbage collection
//! - Cross-cache lookups in cache creation order

pub mod connection;
pub mod hash;
pub mod named;

pub use crate::Error;

pub use connection::CacheDb;
pub use named::{CachedResponse, NamedCache};

//! Client code for tsync.
//!
//! This crate provides the request/response model the engine intercepts,
//! the transport that carries requests to the network, URL resolution
//! against the configured origin, and the connectivity oracle.

pub mod connectivity;
pub mod http;
pub mod origin;
pub mod transport;

pub use connectivity::{Connectivity, ConnectivityMonitor};
pub use http::{CacheMode, Credentials, Request, RequestMode, Response, ResponseKind};
pub use origin::{UrlError, resolve, same_origin};
pub use transport::{HttpTransport, Transport, TransportConfig};

//! Offline-first request interception and sync for tsync.
//!
//! This crate provides:
//! - Request classification and the navigation, read, write and asset strategies
//! - Install/activate lifecycle over versioned named caches
//! - Pending-write replay with an injectable background-sync scheduler
//! - Offline library management and maintenance operations

pub mod clients;
pub(crate) mod context;
pub mod engine;
pub mod interceptor;
pub(crate) mod library;
pub mod lifecycle;
pub(crate) mod maintenance;
pub(crate) mod read_path;
pub mod route;
pub mod sync;
pub(crate) mod write_path;

pub use clients::{ClientHost, Page, PageRegistry};
pub use engine::{Collaborators, Engine};
pub use interceptor::SOURCE_HEADER;
pub use lifecycle::{ActivateReport, InstallReport, LifecycleState};
pub use route::{Route, Router, trailing_id};
pub use sync::{ReplayPlan, SyncCoordinator, SyncHandler, SyncReport, SyncScheduler, SyncTags, plan_replay};

//! `pricelist-client`
//!
//! **Responsibility:** the IO side of the catalog viewer.
//!
//! This crate provides:
//! - The HTTP bindings to the catalog backend
//! - The product store (last fetched snapshot + last error)
//! - Export orchestration and file delivery
//! - The connection health monitor
//! - Client-side persisted state (the cart token)
//!
//! Presentation is left to the caller; [`CatalogSession`] exposes everything a
//! renderer needs.

pub mod api;
pub mod config;
pub mod export;
pub mod health;
pub mod render;
pub mod session;
pub mod storage;
pub mod store;

pub use api::{ApiError, CatalogApi};
pub use config::{ApiUrl, ClientConfig};
pub use export::{
    Delivered, DirectorySink, DownloadSink, ExportCoordinator, ExportError, ExportFormat,
    ExportJob, ExportScope, LogNotifier, Notifier,
};
pub use health::{ConnectionProbe, HealthMonitor, MonitorHandle, ProbeState};
pub use session::{CatalogSession, RowView};
pub use storage::LocalStorage;
pub use store::ProductStore;

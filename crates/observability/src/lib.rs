//! Tracing and logging setup shared by the catalog binaries.

/// Initialize process-wide logging with the format picked from the
/// environment (`PRICELIST_LOG_FORMAT=json|pretty`, JSON by default).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    subscriber::init(subscriber::LogFormat::from_env());
}

/// Subscriber configuration (filters, output format).
pub mod subscriber;

pub use subscriber::LogFormat;

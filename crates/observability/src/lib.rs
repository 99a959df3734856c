//! Tracing/logging setup shared by the binaries.

/// Initialize process-wide logging.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(LogFormat::from_env());
}

/// Subscriber construction (filters, output format).
pub mod tracing;

pub use tracing::LogFormat;

//! Shared ambient stack for the publication fan-out service: the error
//! taxonomy, `slog`-based logging bootstrap, and a `cadence`-backed metrics
//! handle. Every other crate in the workspace depends on this one.

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{InternalError, ReportableError, XpostError};
pub use logging::{init_logging, reset_logging};
pub use metrics::{metrics_from_opts, MetricError, Metrics};

/// Monotonic id generator used for `SyncTask::id`. A simple atomic counter
/// is sufficient: ids only need to be unique within a process's lifetime
/// (`spec.md` SyncTask.id: "monotonically unique").
#[derive(Debug, Default)]
pub struct IdGenerator(std::sync::atomic::AtomicU64);

impl IdGenerator {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1
    }
}

use std::fmt;

use backtrace::Backtrace;
use thiserror::Error;

/// Top-level error type shared by every core crate (engine, scheduler,
/// token lifecycle manager). An outer struct carrying a backtrace and a
/// metric label wraps an inner [`ErrorKind`], so call sites can attach
/// context without losing the taxonomy needed for retry/metrics decisions.
#[derive(Debug)]
pub struct XpostError {
    kind: ErrorKind,
    pub backtrace: Box<Backtrace>,
}

#[derive(Debug, Error)]
enum ErrorKind {
    #[error("platform error ({platform}): {message}")]
    Platform { platform: String, message: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("network error ({platform}): {message}")]
    Network { platform: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("operation not supported: {0}")]
    NotSupported(String),

    #[error("lock already held: {0}")]
    LockHeld(String),

    #[error("queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(std::time::Duration),
}

impl XpostError {
    fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            backtrace: Box::new(Backtrace::new()),
        }
    }

    pub fn platform(platform: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Platform {
            platform: platform.into(),
            message: message.into(),
        })
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database(message.into()))
    }

    pub fn network(platform: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network {
            platform: platform.into(),
            message: message.into(),
        })
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config(message.into()))
    }

    pub fn not_supported(op: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotSupported(op.into()))
    }

    pub fn lock_held(name: impl Into<String>) -> Self {
        Self::new(ErrorKind::LockHeld(name.into()))
    }

    pub fn queue_full(capacity: usize) -> Self {
        Self::new(ErrorKind::QueueFull { capacity })
    }

    pub fn deadline_exceeded(elapsed: std::time::Duration) -> Self {
        Self::new(ErrorKind::DeadlineExceeded(elapsed))
    }

    pub fn is_platform(&self) -> bool {
        matches!(self.kind, ErrorKind::Platform { .. })
    }

    pub fn is_database(&self) -> bool {
        matches!(self.kind, ErrorKind::Database(_))
    }

    pub fn is_network(&self) -> bool {
        matches!(self.kind, ErrorKind::Network { .. })
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self.kind, ErrorKind::NotSupported(_))
    }

    pub fn is_lock_held(&self) -> bool {
        matches!(self.kind, ErrorKind::LockHeld(_))
    }

    pub fn is_queue_full(&self) -> bool {
        matches!(self.kind, ErrorKind::QueueFull { .. })
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self.kind, ErrorKind::DeadlineExceeded(_))
    }

    /// Target platform this error is about, when applicable. Used to tag
    /// `errors_total{target,error_type}`.
    pub fn target_label(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::Platform { platform, .. } | ErrorKind::Network { platform, .. } => {
                Some(platform)
            }
            _ => None,
        }
    }
}

impl fmt::Display for XpostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

impl std::error::Error for XpostError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

/// Errors that carry enough structure for sentry-style reporting and
/// statsd tagging. Implemented by [`XpostError`] and by narrower
/// repository-specific errors further down the stack.
pub trait ReportableError: fmt::Display {
    fn is_sentry_event(&self) -> bool {
        true
    }

    /// `error_type` label for `errors_total{target,error_type}`.
    fn error_type(&self) -> &'static str;

    fn backtrace(&self) -> Option<&Backtrace> {
        None
    }
}

impl ReportableError for XpostError {
    fn is_sentry_event(&self) -> bool {
        // Lock contention and queue backpressure are routine, not incidents.
        !matches!(self.kind, ErrorKind::LockHeld(_) | ErrorKind::QueueFull { .. })
    }

    fn error_type(&self) -> &'static str {
        match &self.kind {
            ErrorKind::Platform { .. } => "platform",
            ErrorKind::Database(_) => "database",
            ErrorKind::Network { .. } => "network",
            ErrorKind::Config(_) => "config",
            ErrorKind::NotSupported(_) => "not_supported",
            ErrorKind::LockHeld(_) => "lock_held",
            ErrorKind::QueueFull { .. } => "queue_full",
            ErrorKind::DeadlineExceeded(_) => "deadline_exceeded",
        }
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        Some(&self.backtrace)
    }
}

/// Types that can manufacture an internal/unexpected error from a free-form
/// message (e.g. a repository implementation that hit an unreachable state).
pub trait InternalError {
    fn internal_error(message: String) -> Self;
}

impl InternalError for XpostError {
    fn internal_error(message: String) -> Self {
        XpostError::database(message)
    }
}

use std::io;

use slog::{slog_o, Drain};
use slog_mozlog_json::MozLogJson;

/// Initializes the process-wide `slog` logger for one of the three
/// long-running components (the sync engine, the scheduler, or the token
/// lifecycle manager), tagging every record with `component` so a shared
/// aggregation pipeline can tell them apart. `json=true` emits MozLog JSON
/// lines (for production log aggregation); otherwise a human-readable
/// terminal format is used.
pub fn init_logging(json: bool, component: &str) -> Result<(), crate::error::XpostError> {
    let logger = if json {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_owned());

        let drain = MozLogJson::new(io::stdout())
            .logger_name(format!("xpost-{component}-{}", env!("CARGO_PKG_VERSION")))
            .msg_type(format!("xpost-{component}:log"))
            .hostname(hostname)
            .build()
            .fuse();
        let drain = slog_envlogger::new(drain);
        let drain = slog_async::Async::new(drain).build().fuse();
        slog::Logger::root(drain, slog_o!("component" => component.to_owned()))
    } else {
        let decorator = slog_term::TermDecorator::new().build();
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog_envlogger::new(drain);
        let drain = slog_async::Async::new(drain).build().fuse();
        slog::Logger::root(drain, slog_o!("component" => component.to_owned()))
    };

    slog_scope::set_global_logger(logger).cancel_reset();
    slog_stdlog::init().ok();
    Ok(())
}

/// Replaces the global logger with a discarding one. Test teardown uses
/// this instead of letting `set_global_logger`'s scope guard run down on
/// its own, which panics if two test threads race to reset it.
pub fn reset_logging() {
    let logger = slog::Logger::root(slog::Discard, slog_o!());
    slog_scope::set_global_logger(logger).cancel_reset();
}

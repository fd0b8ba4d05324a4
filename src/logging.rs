use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::home::AgentHome;

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Route tracing output to daily-rolled files under `<home>/logs`.
///
/// Steady-state runs (scheduled update ticks, boot-triggered agent starts)
/// have no human watching a terminal; the log directory is the only place
/// their failures are visible. Safe to call more than once: only the first
/// call installs the subscriber.
pub fn init(home: &AgentHome) {
    if GUARD.get().is_some() {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let writer = tracing_appender::rolling::daily(home.log_dir(), "outpost");
    let (non_blocking, guard) = tracing_appender::non_blocking(writer);

    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(non_blocking);

    if tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .is_ok()
    {
        let _ = GUARD.set(guard);
    }
}

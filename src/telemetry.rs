//! Tracing initialization for binaries, benches, and debugging sessions.
//!
//! Controlled by `STRATA_TRACE`:
//! - unset → no-op (tracing disabled, zero overhead)
//! - `"stderr"` → JSON spans/events to stderr
//!
//! The engine itself only *emits* `tracing` events (whole-range copies and
//! record writes at trace level); whether anything listens is the caller's
//! choice, and trace output never changes merge semantics.

use tracing_subscriber::EnvFilter;

/// Opaque guard returned by [`init`]. Hold it until exit.
pub struct TelemetryGuard {
    _private: (),
}

/// Initialize tracing based on `STRATA_TRACE`.
///
/// Safe to call when no subscriber should be installed (the common case):
/// with the variable unset this is a no-op.
#[must_use]
pub fn init() -> TelemetryGuard {
    let endpoint = std::env::var("STRATA_TRACE").ok();

    match endpoint.as_deref() {
        None | Some("") => init_noop(),
        Some("stderr") => init_stderr(),
        Some(other) => {
            eprintln!("warning: unsupported STRATA_TRACE value '{other}', tracing disabled");
            init_noop()
        }
    }
}

const fn init_noop() -> TelemetryGuard {
    TelemetryGuard { _private: () }
}

/// JSON spans/events to stderr via tracing-subscriber's JSON formatter.
fn init_stderr() -> TelemetryGuard {
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    TelemetryGuard { _private: () }
}

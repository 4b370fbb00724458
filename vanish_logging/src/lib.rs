//! Log setup shared by the vanish binaries and test suites
//!
//! The library crates emit `log` records under the `vanish` target; the subscriber
//! installed here picks them up through the `tracing-log` bridge.

pub use tracing::{self, debug, error, info, instrument, trace, warn};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::SubscriberBuilder;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// The log target every vanish crate writes under
pub const TARGET: &str = "vanish";

/// Filter applied when `RUST_LOG` is unset or unparsable
pub const DEFAULT_FILTER: &str = "vanish=info";

/// Installs the subscriber and a panic hook that logs the panic then exits. A panicked
/// task would otherwise leave the store half torn down with payloads still resident
pub fn setup_log() {
    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown location".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|msg| msg.to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_default();
        error!(target: TARGET, "Panic at {location}: {payload}");
        std::process::exit(1);
    }));

    setup_log_no_panic_hook()
}

/// Like [`setup_log`], but leaves the panic hook alone. Safe to call more than once
pub fn setup_log_no_panic_hook() {
    setup_log_with_filter(filter_from_env())
}

/// Installs the subscriber with an explicit filter. Later calls are ignored
pub fn setup_log_with_filter(filter: EnvFilter) {
    let _ = SubscriberBuilder::default()
        .with_line_number(true)
        .with_file(true)
        .with_target(true)
        .with_span_events(FmtSpan::NONE)
        .with_env_filter(filter)
        .finish()
        .try_init();
}

fn filter_from_env() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::{info, setup_log_no_panic_hook, setup_log_with_filter, DEFAULT_FILTER, TARGET};
    use tracing_subscriber::EnvFilter;

    #[test]
    fn repeated_setup_is_harmless() {
        setup_log_with_filter(EnvFilter::new(DEFAULT_FILTER));
        setup_log_no_panic_hook();
        info!(target: TARGET, "still logging");
    }
}

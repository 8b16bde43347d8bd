//! Tracing setup

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static TRACING_INIT: Once = Once::new();

/// Default filter when `RUST_LOG` is not set
const DEFAULT_DIRECTIVES: &[&str] = &[
    "sublink_core=debug",
    "sublink=info",
    "hyper_util=off",
    "hyper=off",
    "reqwest=off",
];

/// Initialize the global tracing subscriber. Safe to call more than once.
pub fn init() {
    TRACING_INIT.call_once(|| {
        let mut filter = EnvFilter::from_default_env();
        for directive in DEFAULT_DIRECTIVES {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }

        // A subscriber may already be installed by the embedding application
        let _ = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_target(false)
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

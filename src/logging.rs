//! Opt-in log output for test runs.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the `EnvFilter` directive, e.g. `rpctape=debug`.
pub const LOG_ENV: &str = "RPCTAPE_LOG";

/// Installs a fmt subscriber filtered by `RPCTAPE_LOG` (default `warn`).
///
/// Output goes through the test writer so `cargo test` captures it per test.
/// Safe to call from every test; returns `false` if a global subscriber was
/// already installed.
pub fn init() -> bool {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::init;

    #[test]
    fn init_is_idempotent() {
        init();
        assert!(!init());
    }
}

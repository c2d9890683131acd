//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

/// Install a global `fmt` subscriber filtered by `filter`.
///
/// `RUST_LOG` takes precedence when set. An invalid filter falls back to
/// `info`. Returns `false` if a global subscriber was already installed,
/// so calling this more than once is harmless.
pub fn init_logging(filter: &str) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        init_logging("iol_catalog_core=debug");
        assert!(!init_logging("not a [valid filter"));
    }
}

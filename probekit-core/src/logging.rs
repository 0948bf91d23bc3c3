//! Tracing initialisation for binaries embedding the pipeline

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `RUST_LOG`, else `default_filter`,
/// else `"info"`.
///
/// Only the first call in a process takes effect; later calls are ignored.
pub fn init_tracing(default_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_init_is_harmless() {
        init_tracing(Some("probekit_core=debug"));
        init_tracing(Some("not a [valid filter"));
        init_tracing(None);
        tracing::info!("still logging");
    }
}

use tracing_subscriber::EnvFilter;

/// Initialize tracing from configuration. `RUST_LOG` takes precedence over `logging.level`.
pub fn install_tracing_from_config(cfg: &mqless_config::LoggingSettings) -> anyhow::Result<()> {
    use tracing_subscriber::fmt::time::ChronoUtc;

    let env_filter_str = std::env::var("RUST_LOG").unwrap_or_else(|_| cfg.level.clone());
    let env_filter = EnvFilter::try_new(&env_filter_str)
        .map_err(|e| anyhow::anyhow!("invalid log filter '{env_filter_str}': {e}"))?;

    // The two branches build different subscriber types.
    let installed = if cfg.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_timer(ChronoUtc::rfc_3339())
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_timer(ChronoUtc::rfc_3339())
            .try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

use tracing_subscriber::EnvFilter;

/// Installs a `tracing` subscriber with an `info`-level default, overridable
/// through `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

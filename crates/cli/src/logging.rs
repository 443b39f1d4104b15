//! Logging setup for the CLI binary: console output, `RUST_LOG`-overridable.

pub fn init() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
    .with_writer(std::io::stderr)
    .init();
}

//! Tracing subscriber setup for the CLI. Level comes from RUST_LOG, default
//! info; output goes to stderr so it never mixes with exported data on
//! stdout.

pub fn init(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    // Ignore a second init (tests may race to install a subscriber).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

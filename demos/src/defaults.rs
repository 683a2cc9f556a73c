use tracing_subscriber::{EnvFilter, fmt};

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:9999";
pub const DEFAULT_BLOCKS: usize = 10;

/// Install a stderr subscriber. An explicit `level` wins over `RUST_LOG`.
pub fn init_tracing(level: Option<&str>) {
    let filter = level
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}

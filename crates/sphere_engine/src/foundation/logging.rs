//! Logging utilities

pub use log::{debug, error, info, trace, warn, LevelFilter};

/// Initialize the logging system from `RUST_LOG`, defaulting to `info`
///
/// Safe to call more than once; later calls are ignored.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Initialize the logging system with a fixed level, ignoring `RUST_LOG`
pub fn init_with_level(level: LevelFilter) {
    let _ = env_logger::Builder::new().filter_level(level).try_init();
}

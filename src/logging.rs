//! Logger setup for native and web builds.

use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info",
/// "flow_scene=debug,wgpu=warn"). On wasm32 only `level` is used.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub level: log::Level,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            level: log::Level::Info,
        }
    }
}

static INIT: Once = Once::new();

/// Installs the global logger once; later calls are ignored.
///
/// Native builds use `env_logger` with the configured filter, falling back to
/// `RUST_LOG` and then to `level`. Web builds log to the browser console.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        #[cfg(not(target_arch = "wasm32"))]
        {
            let mut builder = env_logger::Builder::new();
            match config.env_filter {
                Some(filter) => {
                    builder.parse_filters(&filter);
                }
                None => match std::env::var("RUST_LOG") {
                    Ok(filter) => {
                        builder.parse_filters(&filter);
                    }
                    Err(_) => {
                        builder.filter_level(config.level.to_level_filter());
                    }
                },
            }
            if let Err(e) = builder.try_init() {
                log::warn!("keeping the existing logger: {e}");
            }
        }
        #[cfg(target_arch = "wasm32")]
        {
            if let Err(e) = console_log::init_with_level(config.level) {
                log::warn!("keeping the existing logger: {e}");
            }
        }
        log::debug!("logging initialized");
    });
}

use crate::settings::LogLevel;

/// Installs the global logger at `level`; `RUST_LOG` directives take precedence.
///
/// Returns `false` when a logger was already installed, which makes repeated calls harmless.
pub fn init_logging(level: LogLevel) -> bool {
    let installed = env_logger::Builder::new()
        .filter_level(level.into())
        .parse_default_env()
        .format_timestamp_millis()
        .try_init()
        .is_ok();

    if installed {
        log::info!("Proofread logging initialised at {:?}", level);
    }
    installed
}

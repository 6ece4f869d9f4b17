use log::SetLoggerError;
use std::sync::Once;

static LOGGER_INIT: Once = Once::new();

/// Attempt to install `env_logger` as the global logger, filtering at `info` unless `RUST_LOG`
/// says otherwise. Returns an error if some logger has already been installed.
/// Does nothing if the "builtin_env_logger" feature is disabled.
pub fn try_init() -> Result<(), SetLoggerError> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "builtin_env_logger")] {
            env_logger::try_init_from_env(
                env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
            )
        } else {
            Ok(())
        }
    }
}

/// Install the logger at most once per process. Every collector instance calls this during
/// initialization. A host that installed its own logger beforehand keeps it.
pub fn init_once() {
    LOGGER_INIT.call_once(|| match try_init() {
        Ok(_) => debug!("Installed the built-in logger."),
        Err(_) => debug!("A logger was already installed by the host. Using it."),
    });
}

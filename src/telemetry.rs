use tracing_subscriber::EnvFilter;

use crate::config::{ConfigLoadError, LoggingConfig};

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over `cfg.level` when set. Returns `Ok(false)` when a
/// subscriber was already installed, so calling this twice is harmless.
pub fn init_tracing(cfg: &LoggingConfig) -> Result<bool, ConfigLoadError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cfg.level)
            .map_err(|err| ConfigLoadError::Validation(format!("logging.level: {err}")))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true);

    let installed = if cfg.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };
    Ok(installed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_no_op() {
        let cfg = LoggingConfig::default();
        let _ = init_tracing(&cfg).unwrap();
        assert!(!init_tracing(&cfg).unwrap());
    }
}

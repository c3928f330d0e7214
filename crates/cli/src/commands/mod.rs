//! Command implementations.

mod info;
mod replay;
mod simulate;
mod validate;

pub use info::run_info;
pub use replay::run_replay;
pub use simulate::run_simulate;
pub use validate::run_validate;

use std::path::Path;

use config_loader::{ConfigLoader, SyncClientConfig};
use tracing::info;

use crate::error::{CliError, Result};

/// Load the configuration file, or defaults when no path is given
///
/// `delay_ms` overrides the reconciliation delay; the result is validated
/// again after the override.
pub(crate) fn load_config(path: Option<&Path>, delay_ms: Option<f64>) -> Result<SyncClientConfig> {
    let mut config = match path {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()));
            }
            info!(config = %path.display(), "Loading configuration");
            ConfigLoader::load_from_path(path)?
        }
        None => {
            info!("No configuration file given, using defaults");
            SyncClientConfig::default()
        }
    };

    if let Some(delay_ms) = delay_ms {
        info!(delay_ms, "Overriding reconciliation delay from CLI");
        config.reconciliation_delay_ms = delay_ms;
        ConfigLoader::validate(&config)?;
    }

    Ok(config)
}

use std::fs;
use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Load a [`ClientConfig`] from a TOML file.
pub fn load_from_path<P: AsRef<Path>>(p: P) -> Result<ClientConfig> {
    let txt = fs::read_to_string(p)
        .map_err(|e| Error::Usage(format!("failed to read config file: {e}")))?;
    let cfg: ClientConfig =
        toml::from_str(&txt).map_err(|e| Error::Usage(format!("failed to parse config: {e}")))?;

    validate(&cfg)?;

    Ok(cfg)
}

pub(crate) fn validate(cfg: &ClientConfig) -> Result<()> {
    if cfg.poolsize == 0 {
        return Err(Error::Usage("poolsize must be a positive integer".into()));
    }

    if cfg.host.is_some() && cfg.path.is_some() {
        return Err(Error::Usage("host and path are mutually exclusive".into()));
    }

    Ok(())
}

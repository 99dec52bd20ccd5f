use std::fs;
use std::path::Path;

use imgproxy_core::ProxyConfig;
use imgproxy_logging::proxy_info;

use crate::error::AppError;

/// Reads a RON config file, or the defaults when no path is given. The
/// result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<ProxyConfig, AppError> {
    let config = match path {
        None => ProxyConfig::default(),
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|source| AppError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let config: ProxyConfig =
                ron::from_str(&content).map_err(|source| AppError::ConfigParse {
                    path: path.to_path_buf(),
                    source,
                })?;
            proxy_info!("Loaded proxy config from {:?}", path);
            config
        }
    };
    config.validate()?;
    Ok(config)
}

//! Initialize the configuration directory: create ~/.nexuschat, a default config, and the data directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config;

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with `{}` if missing.
/// - Creates the data directory the store will use.
///
/// Returns the resolved data directory.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, b"{}")
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    }

    let (cfg, _) = config::load_config(Some(config_path.to_path_buf()))?;
    let data_dir = config::resolve_data_dir(&cfg, config_path);
    if !data_dir.exists() {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("creating data directory {}", data_dir.display()))?;
        log::info!("created data directory at {}", data_dir.display());
    } else {
        log::debug!("data directory already exists at {}, skipping", data_dir.display());
    }

    Ok(data_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_config_and_data_dir_once() {
        let dir = std::env::temp_dir().join(format!("nexuschat-init-test-{}", uuid::Uuid::new_v4()));
        let config_path = dir.join("config.json");
        let data = init_config_dir(&config_path).unwrap();
        assert_eq!(data, dir.join("data"));
        assert!(data.is_dir());
        assert_eq!(std::fs::read_to_string(&config_path).unwrap(), "{}");

        std::fs::write(&config_path, r#"{"storage":{"dataDir":"other"}}"#).unwrap();
        let data = init_config_dir(&config_path).unwrap();
        assert_eq!(data, dir.join("other"));
        assert!(data.is_dir());
        let _ = std::fs::remove_dir_all(dir);
    }
}

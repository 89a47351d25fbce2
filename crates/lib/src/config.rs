//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.nexuschat/config.json`) and environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Where the local store keeps its records.
    #[serde(default)]
    pub storage: StorageConfig,

    /// AI assistant (Gemini) settings.
    #[serde(default)]
    pub assistant: AssistantConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Data directory. Relative paths are resolved against the config file's parent.
    /// Default: `data` next to the config file.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantConfig {
    /// Gemini model name (default "gemini-2.5-flash").
    pub model: Option<String>,
    /// API key. Overridden by GEMINI_API_KEY or API_KEY env.
    pub api_key: Option<String>,
    /// API base URL (default the public v1beta endpoint).
    pub base_url: Option<String>,
    /// System instruction sent with every request.
    pub system_instruction: Option<String>,
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Resolve the assistant API key: env GEMINI_API_KEY, then API_KEY, then config.
pub fn resolve_api_key(config: &Config) -> Option<String> {
    ["GEMINI_API_KEY", "API_KEY"]
        .iter()
        .find_map(|var| std::env::var(var).ok().as_deref().and_then(non_empty))
        .or_else(|| config.assistant.api_key.as_deref().and_then(non_empty))
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("NEXUSCHAT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".nexuschat").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

fn config_parent(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Resolve the data directory: `storage.dataDir` if set (relative paths resolved against the
/// config file's parent), otherwise the `data` subdirectory next to the config file.
pub fn resolve_data_dir(config: &Config, config_path: &Path) -> PathBuf {
    let parent = config_parent(config_path);
    match &config.storage.data_dir {
        Some(d) if !d.as_os_str().is_empty() => {
            if d.is_absolute() {
                d.clone()
            } else {
                parent.join(d)
            }
        }
        _ => parent.join("data"),
    }
}

/// Load config from the given path, or the default path (or NEXUSCHAT_CONFIG_PATH).
/// Missing file => default config. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_data_dir_default() {
        let config = Config::default();
        let path = Path::new("/home/user/.nexuschat/config.json");
        assert_eq!(
            resolve_data_dir(&config, path),
            PathBuf::from("/home/user/.nexuschat/data")
        );
    }

    #[test]
    fn resolve_data_dir_override_relative() {
        let mut config = Config::default();
        config.storage.data_dir = Some(PathBuf::from("store"));
        let path = Path::new("/home/user/.nexuschat/config.json");
        assert_eq!(
            resolve_data_dir(&config, path),
            PathBuf::from("/home/user/.nexuschat/store")
        );
    }

    #[test]
    fn resolve_data_dir_override_absolute() {
        let mut config = Config::default();
        config.storage.data_dir = Some(PathBuf::from("/var/lib/nexuschat"));
        let path = Path::new("config.json");
        assert_eq!(
            resolve_data_dir(&config, path),
            PathBuf::from("/var/lib/nexuschat")
        );
    }

    #[test]
    fn parses_camel_case_fields() {
        let raw = r#"{"storage":{"dataDir":"d"},"assistant":{"model":"m","apiKey":"k","systemInstruction":"s"}}"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.storage.data_dir, Some(PathBuf::from("d")));
        assert_eq!(config.assistant.model.as_deref(), Some("m"));
        assert_eq!(config.assistant.api_key.as_deref(), Some("k"));
        assert_eq!(config.assistant.system_instruction.as_deref(), Some("s"));
    }

    #[test]
    fn missing_config_file_is_default() {
        let path = std::env::temp_dir()
            .join(format!("nexuschat-config-test-{}", uuid::Uuid::new_v4()))
            .join("config.json");
        let (config, used) = load_config(Some(path.clone())).unwrap();
        assert_eq!(used, path);
        assert!(config.assistant.model.is_none());
    }
}

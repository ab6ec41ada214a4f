// Configuration management for the fts simulator
//
// Cross-platform config stored in:
// - macOS: ~/Library/Application Support/fts/config.json
// - Linux: ~/.config/fts/config.json
// - Windows: %APPDATA%\fts\config.json

use anyhow::{Context, Result};
use fts_core::transport::ble::{DEFAULT_ATT_MTU, DEFAULT_MAX_COMMAND_LEN};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Negotiated ATT MTU of the simulated link
    pub att_mtu: u16,

    /// Fragment cap passed to send_file
    pub fragment_cap: u32,

    /// Packets the simulated radio buffers before refusing more
    pub tx_buffer_slots: usize,

    /// Command length cap (none = packet length)
    pub max_command_len: Option<u16>,

    /// Default tracing filter when RUST_LOG is unset
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            att_mtu: DEFAULT_ATT_MTU,
            fragment_cap: 20,
            tx_buffer_slots: 6,
            max_command_len: Some(DEFAULT_MAX_COMMAND_LEN),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    /// Get the config directory path (cross-platform)
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("fts");

        std::fs::create_dir_all(&config_dir)
            .context("Failed to create config directory")?;

        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file()?)
    }

    /// Load config from `path`, or write and return the default
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config = serde_json::from_str(&contents)
                .context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .context("Failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Set a config value (not persisted)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "att_mtu" => {
                self.att_mtu = value.parse()
                    .context("Invalid MTU")?;
            }
            "fragment_cap" => {
                self.fragment_cap = value.parse()
                    .context("Invalid number")?;
            }
            "tx_buffer_slots" => {
                self.tx_buffer_slots = value.parse()
                    .context("Invalid number")?;
            }
            "max_command_len" => {
                self.max_command_len = if value.is_empty() || value == "none" {
                    None
                } else {
                    Some(value.parse().context("Invalid number")?)
                };
            }
            "log_level" => {
                self.log_level = value.to_string();
            }
            _ => anyhow::bail!("Unknown config key: {}", key),
        }
        self.validate()
    }

    /// Get a config value
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "att_mtu" => Some(self.att_mtu.to_string()),
            "fragment_cap" => Some(self.fragment_cap.to_string()),
            "tx_buffer_slots" => Some(self.tx_buffer_slots.to_string()),
            "max_command_len" => Some(
                self.max_command_len
                    .map_or_else(|| "none".to_string(), |len| len.to_string()),
            ),
            "log_level" => Some(self.log_level.clone()),
            _ => None,
        }
    }

    /// List all config values
    pub fn list(&self) -> Vec<(String, String)> {
        ["att_mtu", "fragment_cap", "tx_buffer_slots", "max_command_len", "log_level"]
            .iter()
            .filter_map(|key| self.get(key).map(|value| (key.to_string(), value)))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.att_mtu < DEFAULT_ATT_MTU {
            anyhow::bail!("att_mtu must be at least {}", DEFAULT_ATT_MTU);
        }
        if self.fragment_cap == 0 {
            anyhow::bail!("fragment_cap must be > 0");
        }
        if self.tx_buffer_slots == 0 {
            anyhow::bail!("tx_buffer_slots must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.att_mtu, 23);
        assert_eq!(config.max_command_len, Some(20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config.att_mtu, deserialized.att_mtu);
        assert_eq!(config.fragment_cap, deserialized.fragment_cap);
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();
        config.set("att_mtu", "247").unwrap();
        config.set("max_command_len", "none").unwrap();

        assert_eq!(config.get("att_mtu").as_deref(), Some("247"));
        assert_eq!(config.get("max_command_len").as_deref(), Some("none"));
        assert!(config.set("att_mtu", "10").is_err());
        assert!(config.set("bogus", "1").is_err());
        assert!(config.get("bogus").is_none());
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());

        let mut changed = config.clone();
        changed.set("fragment_cap", "64").unwrap();
        changed.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.fragment_cap, 64);
    }

    #[test]
    fn test_list_covers_every_key() {
        let config = Config::default();
        assert_eq!(config.list().len(), 5);
    }
}

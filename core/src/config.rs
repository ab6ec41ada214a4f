//! Service configuration
//!
//! Limits the service applies on top of what the transport reports.

use serde::{Deserialize, Serialize};

use crate::FtsError;

/// File transfer service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtsConfig {
    /// Cap on command length below the packet length (`None` = packet length)
    pub max_command_len: Option<u16>,
    /// Largest file accepted by `send_file`
    pub max_file_len: u32,
    /// Fragment cap used by `send_file_default` (`u32::MAX` = full packets)
    pub default_fragment_cap: u32,
}

impl Default for FtsConfig {
    fn default() -> Self {
        Self {
            max_command_len: None,
            max_file_len: u32::MAX,
            default_fragment_cap: u32::MAX,
        }
    }
}

impl FtsConfig {
    /// Create a configuration with default limits
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit commands to `len` bytes
    pub fn with_max_command_len(mut self, len: u16) -> Self {
        self.max_command_len = Some(len);
        self
    }

    /// Limit outbound files to `len` bytes
    pub fn with_max_file_len(mut self, len: u32) -> Self {
        self.max_file_len = len;
        self
    }

    /// Set the fragment cap for `send_file_default`
    pub fn with_default_fragment_cap(mut self, cap: u32) -> Self {
        self.default_fragment_cap = cap;
        self
    }

    /// Command limit for a given packet length
    pub fn command_limit(&self, max_packet_length: u16) -> u16 {
        match self.max_command_len {
            Some(len) => len.min(max_packet_length),
            None => max_packet_length,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), FtsError> {
        if self.max_command_len == Some(0) {
            return Err(FtsError::InvalidConfig(
                "max_command_len must be > 0".to_string(),
            ));
        }
        if self.max_file_len == 0 {
            return Err(FtsError::InvalidConfig("max_file_len must be > 0".to_string()));
        }
        if self.default_fragment_cap == 0 {
            return Err(FtsError::InvalidConfig(
                "default_fragment_cap must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = FtsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_command_len, None);
    }

    #[test]
    fn test_command_limit() {
        let unlimited = FtsConfig::new();
        assert_eq!(unlimited.command_limit(244), 244);

        let capped = FtsConfig::new().with_max_command_len(20);
        assert_eq!(capped.command_limit(244), 20);
        assert_eq!(capped.command_limit(10), 10);
    }

    #[test]
    fn test_invalid_values() {
        assert!(FtsConfig::new().with_max_command_len(0).validate().is_err());
        assert!(FtsConfig::new().with_max_file_len(0).validate().is_err());
        assert!(FtsConfig::new().with_default_fragment_cap(0).validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let config = FtsConfig::new()
            .with_max_command_len(20)
            .with_max_file_len(1 << 20);
        let json = serde_json::to_string(&config).expect("Serialize");
        let back: FtsConfig = serde_json::from_str(&json).expect("Deserialize");
        assert_eq!(back, config);
    }
}

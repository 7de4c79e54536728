//! Configuration loading and management.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use cw_core::RelayConfig;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Relay tunables.
    #[serde(default)]
    pub relay: RelayConfig,
    /// Application labels for the simulated package manager, keyed by package.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // CW_RELAY__QUEUE_CAPACITY=8 sets relay.queue_capacity
        figment = figment.merge(Env::prefixed("CW_").split("__"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for cw.
///
/// On Linux: `~/.config/callwatch`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("callwatch"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_config_path_ends_with_callwatch() {
        let path = dirs_config_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "callwatch");
    }

    #[test]
    fn test_default_config_uses_relay_defaults() {
        let config = Config::default();
        assert_eq!(config.relay.missed_call_category, "missed_call");
        assert_eq!(config.relay.unknown_app_label, "(unknown)");
        assert_eq!(config.relay.queue_capacity, 64);
        assert!(config.labels.is_empty());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("cw.toml");
        std::fs::write(
            &path,
            r#"
[relay]
dialer_package = "com.android.dialer"
queue_capacity = 8

[labels]
"com.whatsapp" = "WhatsApp"
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(
            config.relay.dialer_package.as_deref(),
            Some("com.android.dialer")
        );
        assert_eq!(config.relay.queue_capacity, 8);
        assert_eq!(config.relay.missed_call_category, "missed_call");
        assert_eq!(config.labels["com.whatsapp"], "WhatsApp");
    }
}

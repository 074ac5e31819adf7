// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of VSN Bridge.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;
use vsn_client::VsnModel;

const MIN_SCAN_INTERVAL_SECS: u64 = 10;
const MAX_SCAN_INTERVAL_SECS: u64 = 600;
const MIN_FAILURES_THRESHOLD: u32 = 1;
const MAX_FAILURES_THRESHOLD: u32 = 10;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Datalogger connection settings
    pub device: DeviceConfig,

    /// Polling behaviour
    #[serde(default)]
    pub polling: PollingConfig,

    /// Point mapping table source
    #[serde(default)]
    pub mapping: MappingConfig,
}

/// Connection settings for one VSN datalogger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Base URL, e.g. "http://192.168.1.100"
    pub host: String,

    /// REST username (VSN300 ships with "guest")
    #[serde(default = "default_username")]
    pub username: String,

    /// REST password (empty for guest access)
    #[serde(default)]
    pub password: String,

    /// Pin the model ("VSN300"/"VSN700") to skip auto-detection
    #[serde(default)]
    pub model: Option<VsnModel>,

    /// Some installations expose the API without credentials
    #[serde(default = "default_requires_auth")]
    pub requires_auth: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Seconds between poll cycles
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,

    /// Consecutive failures before the device is reported unreachable
    #[serde(default = "default_failures_threshold")]
    pub failures_threshold: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Local mapping table; the bundled table is used when unset
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_username() -> String {
    "guest".to_owned()
}

fn default_requires_auth() -> bool {
    true
}

fn default_scan_interval() -> u64 {
    60
}

fn default_failures_threshold() -> u32 {
    3
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval(),
            failures_threshold: default_failures_threshold(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate();
        Ok(config)
    }

    /// Clamp out-of-range values instead of refusing to start.
    fn validate(&mut self) {
        let interval = self.polling.scan_interval_secs;
        let clamped = interval.clamp(MIN_SCAN_INTERVAL_SECS, MAX_SCAN_INTERVAL_SECS);
        if clamped != interval {
            warn!("scan_interval_secs {interval} out of range, clamping to {clamped}");
            self.polling.scan_interval_secs = clamped;
        }

        let threshold = self.polling.failures_threshold;
        let clamped = threshold.clamp(MIN_FAILURES_THRESHOLD, MAX_FAILURES_THRESHOLD);
        if clamped != threshold {
            warn!("failures_threshold {threshold} out of range, clamping to {clamped}");
            self.polling.failures_threshold = clamped;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let (_dir, path) = write_config(
            r#"
[device]
host = "http://192.168.1.100"
"#,
        );

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.device.host, "http://192.168.1.100");
        assert_eq!(config.device.username, "guest");
        assert_eq!(config.device.password, "");
        assert!(config.device.requires_auth);
        assert_eq!(config.device.model, None);
        assert_eq!(config.polling.scan_interval_secs, 60);
        assert_eq!(config.polling.failures_threshold, 3);
        assert_eq!(config.mapping.file, None);
    }

    #[test]
    fn full_config_parses() {
        let (_dir, path) = write_config(
            r#"
[device]
host = "http://vsn700.local/"
username = "admin"
password = "secret"
model = "VSN700"
requires_auth = false

[polling]
scan_interval_secs = 120
failures_threshold = 5

[mapping]
file = "/etc/vsn-bridge/mapping.json"
"#,
        );

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.device.model, Some(VsnModel::Vsn700));
        assert!(!config.device.requires_auth);
        assert_eq!(config.polling.scan_interval_secs, 120);
        assert_eq!(config.polling.failures_threshold, 5);
        assert_eq!(
            config.mapping.file.as_deref(),
            Some(Path::new("/etc/vsn-bridge/mapping.json"))
        );
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let (_dir, path) = write_config(
            r#"
[device]
host = "http://192.168.1.100"

[polling]
scan_interval_secs = 5
failures_threshold = 99
"#,
        );

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.polling.scan_interval_secs, 10);
        assert_eq!(config.polling.failures_threshold, 10);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AppConfig::load(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(err.to_string().contains("failed to read config file"));
    }

    #[test]
    fn invalid_model_is_an_error() {
        let (_dir, path) = write_config(
            r#"
[device]
host = "http://192.168.1.100"
model = "VSN999"
"#,
        );
        assert!(AppConfig::load(&path).is_err());
    }
}

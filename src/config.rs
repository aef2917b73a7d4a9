//! Layered dashboard settings.
//!
//! Sources are merged in order, later ones winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`--config`)
//! 3. `METERWATCH_*` environment variables, `__` between nested keys
//!    (e.g. `METERWATCH_CHANNEL__MAX_ATTEMPTS=8`)
//! 4. command-line flags, applied through [`Overrides`]
//!
//! ```toml
//! analysis_days = 30
//!
//! [api]
//! base_url = "http://localhost:8080/api"
//! timeout_ms = 10000
//!
//! [channel]
//! url = "ws://localhost:8080/ws"
//! max_attempts = 5
//! base_delay_ms = 3000
//!
//! [polling]
//! interval_ms = 3000
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};

use meterwatch_client::channel::REALTIME_CHANNEL;
use meterwatch_client::{
    ApiClient, ChannelConfig, SessionConfig, BACKGROUND_POLL_INTERVAL, DEFAULT_BASE_DELAY,
    DEFAULT_BASE_URL, DEFAULT_CHANNEL_URL, DEFAULT_HEARTBEAT, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_POLL_INTERVAL, DEFAULT_PROBE_TIMEOUT, DEFAULT_TIMEOUT,
};

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "METERWATCH";

const DEFAULT_ANALYSIS_DAYS: u32 = 30;

/// Backend REST settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
        }
    }
}

/// Push channel settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub url: String,
    /// Set to false to poll only.
    pub enabled: bool,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub heartbeat_secs: u64,
    pub probe_timeout_ms: u64,
    pub channels: Vec<String>,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_CHANNEL_URL.to_string(),
            enabled: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
            heartbeat_secs: DEFAULT_HEARTBEAT.as_secs(),
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT.as_millis() as u64,
            channels: vec![REALTIME_CHANNEL.to_string()],
        }
    }
}

/// Polling fallback settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_ms: u64,
    pub background_interval_ms: u64,
    /// Use the slower background cadence.
    pub background: bool,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            background_interval_ms: BACKGROUND_POLL_INTERVAL.as_millis() as u64,
            background: false,
        }
    }
}

/// All dashboard settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub channel: ChannelSettings,
    pub polling: PollingSettings,
    /// Look-back window for the analysis overlay.
    pub analysis_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiSettings::default(),
            channel: ChannelSettings::default(),
            polling: PollingSettings::default(),
            analysis_days: DEFAULT_ANALYSIS_DAYS,
        }
    }
}

/// Values taken from the command line. `None` leaves the layered value alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub ws_url: Option<String>,
    pub no_push: bool,
    pub background: bool,
    pub poll_interval: Option<Duration>,
}

impl Settings {
    /// Load defaults, the optional file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, None)
    }

    /// Like [`Settings::load`], reading environment overrides from `env`
    /// instead of the process when it is given.
    pub fn load_from(path: Option<&Path>, env: Option<Map<String, String>>) -> Result<Self> {
        let mut builder = Config::builder().add_source(
            Config::try_from(&Settings::default()).context("failed to encode default settings")?,
        );

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config = builder.build().context("failed to read configuration")?;
        let settings: Settings =
            config.try_deserialize().context("invalid configuration values")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply command-line overrides on top of the layered values.
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(url) = &overrides.api_url {
            self.api.base_url = url.clone();
        }
        if let Some(url) = &overrides.ws_url {
            self.channel.url = url.clone();
        }
        if overrides.no_push {
            self.channel.enabled = false;
        }
        if overrides.background {
            self.polling.background = true;
        }
        if let Some(interval) = overrides.poll_interval {
            let ms = interval.as_millis() as u64;
            if self.polling.background {
                self.polling.background_interval_ms = ms;
            } else {
                self.polling.interval_ms = ms;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.polling.interval_ms > 0, "polling.interval_ms must be positive");
        anyhow::ensure!(
            self.polling.background_interval_ms > 0,
            "polling.background_interval_ms must be positive"
        );
        anyhow::ensure!(self.channel.heartbeat_secs > 0, "channel.heartbeat_secs must be positive");
        anyhow::ensure!(self.analysis_days > 0, "analysis_days must be positive");
        Ok(())
    }

    /// Effective polling cadence.
    pub fn poll_interval(&self) -> Duration {
        let ms = if self.polling.background {
            self.polling.background_interval_ms
        } else {
            self.polling.interval_ms
        };
        Duration::from_millis(ms)
    }

    pub fn api_client(&self) -> Result<ApiClient> {
        ApiClient::builder()
            .base_url(self.api.base_url.clone())
            .timeout(Duration::from_millis(self.api.timeout_ms))
            .build()
            .with_context(|| format!("invalid api.base_url {:?}", self.api.base_url))
    }

    /// Channel settings, or `None` when push delivery is disabled.
    pub fn channel_config(&self) -> Option<ChannelConfig> {
        if !self.channel.enabled {
            return None;
        }
        Some(ChannelConfig {
            url: self.channel.url.clone(),
            max_attempts: self.channel.max_attempts,
            base_delay: Duration::from_millis(self.channel.base_delay_ms),
            heartbeat: Duration::from_secs(self.channel.heartbeat_secs),
            channels: self.channel.channels.clone(),
        })
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            probe_timeout: Duration::from_millis(self.channel.probe_timeout_ms),
            poll_interval: self.poll_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn no_env() -> Option<Map<String, String>> {
        Some(Map::new())
    }

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_defaults_without_sources() {
        let settings = Settings::load_from(None, no_env()).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.poll_interval(), Duration::from_secs(3));
        assert_eq!(settings.channel.channels, vec!["realtime_updates".to_string()]);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let file = toml_file(
            r#"
            analysis_days = 7

            [channel]
            url = "ws://meters.local/ws"
            max_attempts = 8

            [polling]
            interval_ms = 1500
            "#,
        );

        let settings = Settings::load_from(Some(file.path()), no_env()).unwrap();
        assert_eq!(settings.analysis_days, 7);
        assert_eq!(settings.channel.url, "ws://meters.local/ws");
        assert_eq!(settings.channel.max_attempts, 8);
        assert_eq!(settings.channel.base_delay_ms, 3000);
        assert_eq!(settings.poll_interval(), Duration::from_millis(1500));
        assert_eq!(settings.api.base_url, "http://localhost:8080/api");
    }

    #[test]
    fn test_env_overrides_file() {
        let file = toml_file("[channel]\nmax_attempts = 8\n");
        let mut env = Map::new();
        env.insert("METERWATCH_CHANNEL__MAX_ATTEMPTS".to_string(), "2".to_string());
        env.insert("METERWATCH_POLLING__BACKGROUND".to_string(), "true".to_string());

        let settings = Settings::load_from(Some(file.path()), Some(env)).unwrap();
        assert_eq!(settings.channel.max_attempts, 2);
        assert!(settings.polling.background);
        assert_eq!(settings.poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(Settings::load_from(Some(&missing), no_env()).is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let file = toml_file("[polling]\ninterval_ms = 0\n");
        let err = Settings::load_from(Some(file.path()), no_env()).unwrap_err();
        assert!(err.to_string().contains("interval_ms"));
    }

    #[test]
    fn test_cli_overrides_win() {
        let mut settings = Settings::default();
        settings.apply(&Overrides {
            api_url: Some("http://10.0.0.5/api".to_string()),
            ws_url: Some("ws://10.0.0.5/ws".to_string()),
            no_push: true,
            background: false,
            poll_interval: Some(Duration::from_millis(750)),
        });

        assert_eq!(settings.api.base_url, "http://10.0.0.5/api");
        assert_eq!(settings.channel.url, "ws://10.0.0.5/ws");
        assert!(settings.channel_config().is_none());
        assert_eq!(settings.session_config().poll_interval, Duration::from_millis(750));
    }

    #[test]
    fn test_poll_interval_flag_targets_background_cadence() {
        let mut settings = Settings::default();
        settings.apply(&Overrides {
            background: true,
            poll_interval: Some(Duration::from_secs(10)),
            ..Overrides::default()
        });
        assert_eq!(settings.poll_interval(), Duration::from_secs(10));
        assert_eq!(settings.polling.interval_ms, 3000);
    }

    #[test]
    fn test_channel_config_conversion() {
        let settings = Settings::default();
        let channel = settings.channel_config().unwrap();
        assert_eq!(channel, ChannelConfig::default());
        assert_eq!(settings.session_config(), SessionConfig::default());
    }

    #[test]
    fn test_bad_api_url_rejected() {
        let mut settings = Settings::default();
        settings.api.base_url = "ftp://meters".to_string();
        assert!(settings.api_client().is_err());
    }
}

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PortalError, Result};
use crate::types::AppId;

/// Top-level configuration for the LocalSphere portal.
///
/// Loaded from `~/.localsphere/config.toml` by default. Values the hosting
/// environment used to inject as globals (app id, auth token, runtime blob)
/// live in `[environment]` and are resolved once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub carousel: CarouselConfig,
}

impl PortalConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PortalConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PortalError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Resolve the injected environment using the fallback rules:
    ///
    /// 1. `app_id`: configured value, else [`AppId::FALLBACK`]; always sanitized.
    /// 2. `auth_token`: configured value when non-blank, else `None`
    ///    (the session controller then signs in anonymously).
    /// 3. `runtime`: parsed from the JSON blob when present and valid; a
    ///    malformed blob is logged and replaced by defaults derived from
    ///    `[general]`.
    pub fn resolve_environment(&self) -> InjectedEnvironment {
        let raw_app_id = self
            .environment
            .app_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(AppId::FALLBACK);

        let auth_token = self
            .environment
            .initial_auth_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let fallback_runtime = RuntimeConfig {
            database_file: DEFAULT_DATABASE_FILE.to_string(),
            project_id: None,
        };

        let runtime = match self.environment.runtime_config.as_deref() {
            Some(blob) if !blob.trim().is_empty() => {
                match serde_json::from_str::<RuntimeConfig>(blob) {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        warn!(error = %e, "Ignoring malformed runtime config blob");
                        fallback_runtime
                    }
                }
            }
            _ => fallback_runtime,
        };

        InjectedEnvironment {
            app_id: AppId::sanitize(raw_app_id),
            auth_token,
            runtime,
        }
    }
}

/// File name of the message database inside `general.data_dir`.
pub const DEFAULT_DATABASE_FILE: &str = "localsphere.db";

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory holding the message database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP port for the portal server.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.localsphere/data".to_string(),
            log_level: "info".to_string(),
            port: 3040,
        }
    }
}

/// Values a hosting environment injects at load time. All optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Raw application namespace, sanitized before use.
    pub app_id: Option<String>,
    /// Pre-issued identity token; when absent sessions sign in anonymously.
    pub initial_auth_token: Option<String>,
    /// JSON blob describing the backing store (see [`RuntimeConfig`]).
    pub runtime_config: Option<String>,
}

/// Chat widget and responder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Lower bound of the simulated responder latency.
    pub responder_min_latency_ms: u64,
    /// Exclusive upper bound of the simulated responder latency.
    pub responder_max_latency_ms: u64,
    /// Longest accepted input, in characters.
    pub max_message_length: usize,
    /// Buffered snapshots per live subscription.
    pub subscription_buffer: usize,
    /// A session with no requests and no open stream for this long is
    /// unmounted and forgotten.
    pub session_idle_secs: u64,
    /// How often idle sessions are swept.
    pub session_sweep_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            responder_min_latency_ms: 400,
            responder_max_latency_ms: 800,
            max_message_length: 2000,
            subscription_buffer: 32,
            session_idle_secs: 1800,
            session_sweep_secs: 60,
        }
    }
}

impl ChatConfig {
    pub fn responder_latency(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.responder_min_latency_ms),
            Duration::from_millis(self.responder_max_latency_ms),
        )
    }

    /// Idle limit and sweep period. Both are at least one second.
    pub fn session_expiry(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.session_idle_secs.max(1)),
            Duration::from_secs(self.session_sweep_secs.max(1)),
        )
    }
}

/// Hero carousel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CarouselConfig {
    pub interval_secs: u64,
}

impl Default for CarouselConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

/// Backing-store description carried by the runtime config blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Database file name, relative to `general.data_dir` unless absolute.
    #[serde(default = "default_database_file")]
    pub database_file: String,
    /// Optional project label, only logged.
    #[serde(default)]
    pub project_id: Option<String>,
}

fn default_database_file() -> String {
    DEFAULT_DATABASE_FILE.to_string()
}

/// The resolved, explicit replacement for environment-injected globals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectedEnvironment {
    pub app_id: AppId,
    pub auth_token: Option<String>,
    pub runtime: RuntimeConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = PortalConfig::default();
        assert_eq!(config.general.data_dir, "~/.localsphere/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.port, 3040);
        assert_eq!(config.chat.responder_min_latency_ms, 400);
        assert_eq!(config.chat.responder_max_latency_ms, 800);
        assert_eq!(config.chat.session_idle_secs, 1800);
        assert_eq!(config.carousel.interval_secs, 5);
        assert!(config.environment.app_id.is_none());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/srv/portal"
log_level = "debug"
port = 8080

[environment]
app_id = "city hall"
initial_auth_token = "tok-123"

[chat]
responder_min_latency_ms = 0
responder_max_latency_ms = 0
"#;
        let file = create_temp_config(content);
        let config = PortalConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/srv/portal");
        assert_eq!(config.general.port, 8080);
        assert_eq!(config.environment.app_id.as_deref(), Some("city hall"));
        assert_eq!(config.chat.responder_max_latency_ms, 0);
        // Untouched fields keep their defaults.
        assert_eq!(config.chat.max_message_length, 2000);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[general]\nlog_level = \"warn\"\n");
        let config = PortalConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.port, 3040);
        assert_eq!(config.carousel.interval_secs, 5);
    }

    #[test]
    fn test_load_invalid_toml_is_config_error() {
        let file = create_temp_config("[general\nport = ");
        let err = PortalConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, PortalError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = PortalConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.localsphere/data");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = PortalConfig::default();
        config.environment.app_id = Some("portal".into());
        config.save(&path).unwrap();

        let reloaded = PortalConfig::load(&path).unwrap();
        assert_eq!(reloaded.environment.app_id.as_deref(), Some("portal"));
        assert_eq!(reloaded.general.port, config.general.port);
    }

    #[test]
    fn test_resolve_environment_fallbacks() {
        let env = PortalConfig::default().resolve_environment();
        assert_eq!(env.app_id.as_str(), "default-app-id");
        assert!(env.auth_token.is_none());
        assert_eq!(env.runtime.database_file, DEFAULT_DATABASE_FILE);
        assert!(env.runtime.project_id.is_none());
    }

    #[test]
    fn test_resolve_environment_sanitizes_app_id() {
        let mut config = PortalConfig::default();
        config.environment.app_id = Some("city hall/2024".into());
        assert_eq!(config.resolve_environment().app_id.as_str(), "city_hall_2024");
    }

    #[test]
    fn test_resolve_environment_blank_values_fall_back() {
        let mut config = PortalConfig::default();
        config.environment.app_id = Some("   ".into());
        config.environment.initial_auth_token = Some("  ".into());
        let env = config.resolve_environment();
        assert_eq!(env.app_id.as_str(), "default-app-id");
        assert!(env.auth_token.is_none());
    }

    #[test]
    fn test_resolve_environment_keeps_token() {
        let mut config = PortalConfig::default();
        config.environment.initial_auth_token = Some(" tok-9 ".into());
        assert_eq!(
            config.resolve_environment().auth_token.as_deref(),
            Some("tok-9")
        );
    }

    #[test]
    fn test_resolve_environment_parses_runtime_blob() {
        let mut config = PortalConfig::default();
        config.environment.runtime_config =
            Some(r#"{"database_file":"portal.db","project_id":"city-42"}"#.into());
        let env = config.resolve_environment();
        assert_eq!(env.runtime.database_file, "portal.db");
        assert_eq!(env.runtime.project_id.as_deref(), Some("city-42"));
    }

    #[test]
    fn test_resolve_environment_partial_runtime_blob() {
        let mut config = PortalConfig::default();
        config.environment.runtime_config = Some(r#"{"project_id":"p"}"#.into());
        let env = config.resolve_environment();
        assert_eq!(env.runtime.database_file, DEFAULT_DATABASE_FILE);
    }

    #[test]
    fn test_resolve_environment_malformed_runtime_blob() {
        let mut config = PortalConfig::default();
        config.environment.runtime_config = Some("{not json".into());
        let env = config.resolve_environment();
        assert_eq!(env.runtime.database_file, DEFAULT_DATABASE_FILE);
    }

    #[test]
    fn test_responder_latency() {
        let (min, max) = ChatConfig::default().responder_latency();
        assert_eq!(min, Duration::from_millis(400));
        assert_eq!(max, Duration::from_millis(800));
    }

    #[test]
    fn test_session_expiry() {
        let (idle, sweep) = ChatConfig::default().session_expiry();
        assert_eq!(idle, Duration::from_secs(1800));
        assert_eq!(sweep, Duration::from_secs(60));

        let chat = ChatConfig {
            session_idle_secs: 0,
            session_sweep_secs: 0,
            ..ChatConfig::default()
        };
        assert_eq!(chat.session_expiry(), (Duration::from_secs(1), Duration::from_secs(1)));
    }
}

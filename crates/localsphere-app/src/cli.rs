//! CLI argument definitions for the LocalSphere server.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use localsphere_core::config::PortalConfig;

/// LocalSphere: the unified citizen services portal and its chat assistant.
#[derive(Parser, Debug)]
#[command(name = "localsphere", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Data directory for the message database.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Application namespace for stored conversations.
    #[arg(long = "app-id")]
    pub app_id: Option<String>,

    /// Pre-issued identity token; sessions sign in anonymously without one.
    #[arg(long = "auth-token")]
    pub auth_token: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > LOCALSPHERE_CONFIG env var > ~/.localsphere/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("LOCALSPHERE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > LOCALSPHERE_PORT env var > config file value > 3040.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("LOCALSPHERE_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        if config_port != 0 {
            return config_port;
        }
        3040
    }

    /// Fold flags and environment overrides into `config`.
    ///
    /// `[environment]` values follow flag > env var > config file; data dir
    /// and log level are flag-only.
    pub fn apply(&self, config: &mut PortalConfig) {
        config.general.port = self.resolve_port(config.general.port);
        if let Some(ref dir) = self.data_dir {
            config.general.data_dir = dir.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }

        let env = &mut config.environment;
        override_with(&mut env.app_id, self.app_id.clone(), "LOCALSPHERE_APP_ID");
        override_with(
            &mut env.initial_auth_token,
            self.auth_token.clone(),
            "LOCALSPHERE_AUTH_TOKEN",
        );
        override_with(&mut env.runtime_config, None, "LOCALSPHERE_RUNTIME_CONFIG");
    }
}

fn override_with(slot: &mut Option<String>, flag: Option<String>, var: &str) {
    if let Some(value) = flag.or_else(|| std::env::var(var).ok()) {
        *slot = Some(value);
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".localsphere").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".localsphere").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_flags() {
        let args = CliArgs::try_parse_from([
            "localsphere",
            "-c",
            "/tmp/ls.toml",
            "-p",
            "8080",
            "-d",
            "/var/lib/ls",
            "-l",
            "debug",
            "--app-id",
            "city portal",
            "--auth-token",
            "clerk.sig",
        ])
        .unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/ls.toml"));
        assert_eq!(args.resolve_port(3040), 8080);
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_flags_override_config() {
        let args = CliArgs::try_parse_from([
            "localsphere",
            "--port",
            "9000",
            "--data-dir",
            "/srv/data",
            "--app-id",
            "flag-app",
            "--auth-token",
            "flag-user",
        ])
        .unwrap();
        let mut config = PortalConfig::default();
        config.environment.app_id = Some("file-app".into());
        args.apply(&mut config);

        assert_eq!(config.general.port, 9000);
        assert_eq!(config.general.data_dir, "/srv/data");
        assert_eq!(config.environment.app_id.as_deref(), Some("flag-app"));
        assert_eq!(
            config.environment.initial_auth_token.as_deref(),
            Some("flag-user")
        );
    }

    #[test]
    fn test_no_flags_keeps_config_values() {
        let args = CliArgs::try_parse_from(["localsphere"]).unwrap();
        let mut config = PortalConfig::default();
        config.general.log_level = "warn".into();
        args.apply(&mut config);
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.general.data_dir, "~/.localsphere/data");
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(CliArgs::try_parse_from(["localsphere", "--port", "notaport"]).is_err());
    }
}

//! LocalSphere server binary.
//!
//! Loads configuration, resolves the injected environment, opens the
//! message database and serves the portal API.

mod cli;

use std::path::{Path, PathBuf};

use clap::Parser;

use localsphere_api::{start_server, AppState};
use localsphere_core::config::PortalConfig;
use localsphere_storage::Database;

use cli::CliArgs;

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

/// Database file location: absolute names are used as-is, relative ones
/// live in the data directory.
fn database_path(data_dir: &Path, database_file: &str) -> PathBuf {
    let file = Path::new(database_file);
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        data_dir.join(file)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = PortalConfig::load_or_default(&config_file);
    args.apply(&mut config);

    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting LocalSphere v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Environment.
    let environment = config.resolve_environment();
    tracing::info!(
        app_id = %environment.app_id,
        custom_token = environment.auth_token.is_some(),
        project = environment.runtime.project_id.as_deref().unwrap_or("-"),
        "Environment resolved"
    );

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(e.into());
    }
    let db_path = database_path(&data_dir, &environment.runtime.database_file);
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // === API server ===

    let state = AppState::new(config, environment, db);
    let config = state.config.clone();
    tracing::info!("Portal catalog at http://127.0.0.1:{}/portal", config.general.port);
    if let Err(e) = start_server(&config, state).await {
        tracing::error!(error = %e, "API server stopped");
        return Err(e.into());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_data_dir_plain() {
        assert_eq!(resolve_data_dir("/srv/ls"), PathBuf::from("/srv/ls"));
    }

    #[test]
    fn test_resolve_data_dir_expands_home() {
        let resolved = resolve_data_dir("~/.localsphere/data");
        assert!(resolved.ends_with(".localsphere/data"));
        assert!(!resolved.starts_with("~"));
    }

    #[test]
    fn test_database_path() {
        let dir = Path::new("/srv/ls");
        assert_eq!(
            database_path(dir, "localsphere.db"),
            PathBuf::from("/srv/ls/localsphere.db")
        );
        assert_eq!(
            database_path(dir, "/mnt/shared/portal.db"),
            PathBuf::from("/mnt/shared/portal.db")
        );
    }
}

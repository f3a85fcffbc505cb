//! Configuration and credential resolution for rgsync
//!
//! Connection settings are resolved per field, first match wins:
//! 1. Command-line flag (`--host`, `--port`, `--username`, `--password`)
//! 2. `[connection]` table of the config file
//! 3. Environment (`STARROCKS_HOST`, `STARROCKS_PORT`, `STARROCKS_USERNAME`, `STARROCKS_PASSWORD`)
//! 4. Default (port only: 9030)
//!
//! The config file lives at `~/.config/rgsync/config.toml`, or in
//! `RGSYNC_CONFIG_DIR` when set.

use anyhow::{Context, Result, bail};
use rgkit::{ConnectOptions, DEFAULT_PORT, Strategy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::ConnectionArgs;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "RGSYNC_CONFIG_DIR";

pub const ENV_HOST: &str = "STARROCKS_HOST";
pub const ENV_PORT: &str = "STARROCKS_PORT";
pub const ENV_USERNAME: &str = "STARROCKS_USERNAME";
pub const ENV_PASSWORD: &str = "STARROCKS_PASSWORD";

/// Get the rgsync config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = PathBuf::from(shellexpand::tilde(&dir).as_ref());
        log::debug!("Using config dir from {ENV_CONFIG_DIR}: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("rgsync"))
}

// ============================================================================
// Config Schema
// ============================================================================

/// The rgsync configuration file
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RgsyncConfig {
    /// Database connection
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Reconciliation defaults
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcileConfig {
    #[serde(default)]
    pub strategy: Strategy,
}

impl RgsyncConfig {
    /// Load the config from `path`, or from the default location.
    ///
    /// A missing default file yields the default config; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (config_path, explicit) = match path {
            Some(p) => (PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref()), true),
            None => (config_dir()?.join("config.toml"), false),
        };

        if !explicit && !config_path.exists() {
            log::debug!("No config file at {}", config_path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Could not read config file: {}", config_path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", config_path.display()))
    }

    /// Resolve connection options from flags, this config and the environment.
    pub fn connect_options(&self, flags: &ConnectionArgs) -> Result<ConnectOptions> {
        self.connect_options_with_env(flags, |key| std::env::var(key).ok())
    }

    pub fn connect_options_with_env<F>(&self, flags: &ConnectionArgs, env: F) -> Result<ConnectOptions>
    where
        F: Fn(&str) -> Option<String>,
    {
        let conn = &self.connection;
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let host = flags.host.clone().or_else(|| conn.host.clone()).or_else(|| env(ENV_HOST));
        let username = flags
            .username
            .clone()
            .or_else(|| conn.username.clone())
            .or_else(|| env(ENV_USERNAME));
        let password = flags
            .password
            .clone()
            .or_else(|| conn.password.clone())
            .or_else(|| env(ENV_PASSWORD));

        let port = match flags.port.or(conn.port) {
            Some(port) => port,
            None => match env(ENV_PORT) {
                Some(text) => text
                    .trim()
                    .parse()
                    .with_context(|| format!("{ENV_PORT} is not a valid port: {text}"))?,
                None => DEFAULT_PORT,
            },
        };

        let mut missing = Vec::new();
        if host.is_none() {
            missing.push(format!("host (--host, [connection] host, or {ENV_HOST})"));
        }
        if username.is_none() {
            missing.push(format!(
                "username (--username, [connection] username, or {ENV_USERNAME})"
            ));
        }
        if password.is_none() {
            missing.push(format!(
                "password (--password, [connection] password, or {ENV_PASSWORD})"
            ));
        }

        let (Some(host), Some(username), Some(password)) = (host, username, password) else {
            bail!("Missing connection settings:\n  - {}", missing.join("\n  - "));
        };

        Ok(ConnectOptions {
            host,
            port,
            username,
            password,
            connect_timeout: conn.connect_timeout_secs.map(Duration::from_secs),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

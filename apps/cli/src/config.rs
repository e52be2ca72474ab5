//! CLI configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/simpleos-connect/cli.toml`
//! - Windows: `%APPDATA%/simpleos-connect/cli.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use simpleos_connect_protocol::WalletTarget;

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Chain to list authorizations for.
    #[serde(default)]
    pub chain_id: String,

    /// Log in with the first authorization offered.
    #[serde(default)]
    pub login: bool,

    /// Session file; the platform default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_file: Option<PathBuf>,

    /// JSON transaction to submit after logging in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_file: Option<PathBuf>,

    #[serde(default = "default_wallet")]
    pub wallet: WalletTarget,
}

fn default_wallet() -> WalletTarget {
    WalletTarget {
        wallet_name: "SimpleOS".into(),
        protocol: "simpleos".into(),
        url: "http://localhost".into(),
        connection_waiting_time: Duration::from_millis(1000),
        request_waiting_time: Duration::from_millis(500),
    }
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            chain_id: String::new(),
            login: false,
            session_file: None,
            transaction_file: None,
            wallet: default_wallet(),
        }
    }
}

impl CliConfig {
    /// Loads configuration from `path`, writing the defaults there if the
    /// file does not exist yet.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: CliConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let config = CliConfig::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("simpleos-connect")
            .join("cli.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata)
            .join("simpleos-connect")
            .join("cli.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("simpleos-connect")
            .join("cli.toml"))
    }
}

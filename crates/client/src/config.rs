//! Client configuration.
//!
//! Same tolerant loader as the server's: a missing file means defaults, a
//! corrupt file warns and falls back to defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use peershare_protocol::DEFAULT_PORT;

use crate::ClientError;

/// Runtime settings for the client, including the last server used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// Host of the last server connected to.
    pub server_host: String,
    /// Port of the last server connected to.
    pub server_port: u16,
    /// Whether to request compressed transfers. Enabling this disables
    /// resume — see the download state machine.
    pub compression_enabled: bool,
    /// Where downloads land.
    pub download_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_host: String::new(),
            server_port: DEFAULT_PORT,
            compression_enabled: true,
            download_dir: PathBuf::from("."),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from `path`; missing or unparseable files yield
    /// defaults.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        "failed to parse client config, using defaults: {e}"
                    );
                    Self::default()
                }
            },
            Err(e) => {
                warn!(
                    path = %path.display(),
                    "failed to read client config, using defaults: {e}"
                );
                Self::default()
            }
        }
    }

    /// Saves as pretty JSON, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ClientError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

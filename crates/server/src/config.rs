//! Server configuration.
//!
//! JSON on disk with a tolerant loader: a missing file means defaults and a
//! corrupt file warns and falls back to defaults — serving must not die to
//! a typo in a config file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use peershare_protocol::DEFAULT_PORT;

use crate::ServerError;

/// Runtime settings for the file server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
    /// Whether `COMPRESS` requests are honored. When off, compressed
    /// requests are silently served raw.
    pub compression_enabled: bool,
    /// Connection ceiling; arrivals beyond it are refused with
    /// `ERROR: Server busy`.
    pub max_connections: usize,
    /// Folder whose files are registered into the catalog at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_folder: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            compression_enabled: true,
            max_connections: 50,
            shared_folder: None,
        }
    }
}

impl ServerConfig {
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
                        "failed to parse server config, using defaults: {e}"
                    );
                    Self::default()
                }
            },
            Err(e) => {
                warn!(
                    path = %path.display(),
                    "failed to read server config, using defaults: {e}"
                );
                Self::default()
            }
        }
    }

    /// Saves as pretty JSON, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ServerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

//! # Distinct Configuration
//!
//! Optional TOML configuration file. Every field has a default, so an empty
//! or missing file yields a working setup:
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//! body_limit_bytes = 2097152
//! queue_capacity = 1024
//!
//! [storage]
//! database = "distinct.redb"
//!
//! [session]
//! initial_url = "https://rp.example/login"
//! ```
//!
//! Command-line flags override values read from the file.

use distinct_core::DistinctError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Maximum configuration file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DistinctConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body.
    pub body_limit_bytes: usize,
    /// Reports buffered per session before the endpoint waits.
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            body_limit_bytes: crate::api::DEFAULT_BODY_LIMIT,
            queue_capacity: 1024,
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub database: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("distinct.redb"),
        }
    }
}

/// `[session]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// URL the analyzed browser was started with, seeded into new sessions.
    pub initial_url: Option<String>,
}

impl DistinctConfig {
    /// Parse a configuration document.
    pub fn from_toml(source: &str) -> Result<Self, DistinctError> {
        toml::from_str(source)
            .map_err(|e| DistinctError::Serialization(format!("Invalid config: {}", e)))
    }

    /// Load the configuration at `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, DistinctError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let metadata = std::fs::metadata(path).map_err(|e| {
            DistinctError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(DistinctError::Io(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let source = std::fs::read_to_string(path).map_err(|e| {
            DistinctError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        let config = Self::from_toml(&source)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Socket address the server binds to.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = DistinctConfig::from_toml("").expect("parse");
        assert_eq!(config, DistinctConfig::default());
        assert_eq!(config.bind_addr(), "127.0.0.1:3000");
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = DistinctConfig::from_toml(
            r#"
            [server]
            port = 8081

            [session]
            initial_url = "https://rp.example/"
            "#,
        )
        .expect("parse");

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.queue_capacity, 1024);
        assert_eq!(config.storage.database, PathBuf::from("distinct.redb"));
        assert_eq!(
            config.session.initial_url.as_deref(),
            Some("https://rp.example/")
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = DistinctConfig::from_toml("[server]\nworkers = 4\n");
        assert!(matches!(result, Err(DistinctError::Serialization(_))));
    }

    #[test]
    fn load_reads_file() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("distinct.toml");
        std::fs::write(&path, "[storage]\ndatabase = \"runs.redb\"\n").expect("write");

        let config = DistinctConfig::load(Some(&path)).expect("load");
        assert_eq!(config.storage.database, PathBuf::from("runs.redb"));
        assert!(DistinctConfig::load(None).is_ok());
        assert!(matches!(
            DistinctConfig::load(Some(&temp.path().join("missing.toml"))),
            Err(DistinctError::Io(_))
        ));
    }
}

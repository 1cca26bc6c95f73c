//! Configuration System
//!
//! Layered configuration for the store: built-in defaults, a global user file,
//! workspace files and `CTXSTORE__*` environment overrides, merged by the
//! `config` crate into a [`StoreConfig`].

use crate::logging::LoggingConfig;
use crate::schema::{KindDescriptor, Schema};
use crate::store::StorageMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

mod facade;
mod merge;
mod sources;

pub use facade::ConfigLoader;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    /// Identity attribute used by imports that do not name one
    #[serde(default = "default_identity_key")]
    pub default_identity_key: String,

    /// Schema opened by the CLI when `--schema` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_schema: Option<String>,

    /// Schemas registered with every handle built from this config
    #[serde(default)]
    pub schemas: HashMap<String, SchemaConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where and how records are stored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory; each schema gets its own subdirectory
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_mode")]
    pub default_mode: StorageMode,

    /// Flush the engine to disk after every root commit
    #[serde(default)]
    pub flush_on_commit: bool,
}

/// Schema declared in configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub kinds: Vec<KindDescriptor>,
}

impl SchemaConfig {
    pub fn to_schema(&self, name: &str) -> Schema {
        self.kinds
            .iter()
            .cloned()
            .fold(Schema::new(name), Schema::with_kind)
    }
}

fn default_identity_key() -> String {
    "id".to_string()
}

fn default_mode() -> StorageMode {
    StorageMode::Persistent
}

/// Platform data directory for ctxstore, or `.ctxstore/data` when none is known
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "ctxstore")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".ctxstore/data"))
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            default_mode: default_mode(),
            flush_on_commit: false,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            default_identity_key: default_identity_key(),
            default_schema: None,
            schemas: HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Storage(String),
    Schema(String, String),
    Import(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Schema(name, msg) => write!(f, "Schema '{}': {}", name, msg),
            ValidationError::Import(msg) => write!(f, "Import: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl StoreConfig {
    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String, crate::error::StoreError> {
        toml::to_string_pretty(self).map_err(|e| {
            crate::error::StoreError::ConfigError(format!("Failed to render config: {}", e))
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.storage.data_dir.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "Data directory cannot be empty".to_string(),
            ));
        }

        if self.default_identity_key.trim().is_empty() {
            errors.push(ValidationError::Import(
                "default_identity_key cannot be empty".to_string(),
            ));
        }

        for (name, schema) in &self.schemas {
            if schema.kinds.is_empty() {
                errors.push(ValidationError::Schema(
                    name.clone(),
                    "declares no kinds".to_string(),
                ));
            }
            if let Err(e) = schema.to_schema(name).validate() {
                errors.push(ValidationError::Schema(name.clone(), e));
            }
        }

        if let Some(name) = &self.default_schema {
            if !self.schemas.contains_key(name) {
                errors.push(ValidationError::Schema(
                    name.clone(),
                    "default_schema is not declared under [schemas]".to_string(),
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

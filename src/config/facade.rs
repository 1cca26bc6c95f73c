//! Config loading entry points

use super::merge::merge_policy;
use super::sources::{global_file, workspace_file};
use super::StoreConfig;
use config::{ConfigError, Environment, File};
use std::path::{Path, PathBuf};

/// Loads [`StoreConfig`] from its layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence, lowest to highest: defaults, global file, workspace
    /// `config/config.toml`, workspace `config/{CTXSTORE_ENV}.toml`,
    /// `CTXSTORE__SECTION__KEY` environment variables.
    pub fn load(workspace_root: &Path) -> Result<StoreConfig, ConfigError> {
        let builder = merge_policy::builder_with_defaults()?;
        let builder = global_file::add_to_builder(builder)?;
        let builder = workspace_file::add_to_builder(builder, workspace_root)?;
        builder
            .add_source(Environment::with_prefix("CTXSTORE").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Load defaults plus one explicit file
    pub fn load_from_file(path: &Path) -> Result<StoreConfig, ConfigError> {
        merge_policy::builder_with_defaults()?
            .add_source(File::from(path))
            .build()?
            .try_deserialize()
    }

    /// Global config path, if a config home can be determined
    pub fn global_config_path() -> Option<PathBuf> {
        global_file::global_config_path()
    }
}

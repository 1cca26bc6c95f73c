//! Merge rules: the defaults every other source overrides.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError};

/// Create a Config builder with the store defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default(
            "storage.data_dir",
            super::super::default_data_dir().to_string_lossy().into_owned(),
        )?
        .set_default("storage.default_mode", "persistent")?
        .set_default("storage.flush_on_commit", false)?
        .set_default("default_identity_key", "id")
}

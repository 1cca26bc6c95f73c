//! CLI route: single route table and run context. Dispatches to the store and presentation.

use crate::cli::help::{command_name, needs_store};
use crate::cli::parse::{Commands, OutputFormat};
use crate::cli::presentation::{format_records_json, format_records_text, format_schemas_text};
use crate::config::{ConfigLoader, StoreConfig};
use crate::context::SaveOutcome;
use crate::entity::JsonKind;
use crate::error::StoreError;
use crate::ops::{FetchRequest, ImportOptions, SortDescriptor};
use crate::predicate::Predicate;
use crate::store::{StorageMode, StoreHandle};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Runtime context for CLI execution: the loaded config and a store handle.
/// Built from workspace path and optional config path using ConfigLoader only.
pub struct RunContext {
    handle: StoreHandle,
    workspace_root: PathBuf,
    schema_name: Option<String>,
    mode: StorageMode,
}

impl RunContext {
    /// Load configuration and build the handle. The store is opened lazily by
    /// commands that need it.
    pub fn new(
        workspace_root: PathBuf,
        config_path: Option<PathBuf>,
        schema: Option<String>,
        in_memory: bool,
    ) -> Result<Self, StoreError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Self::from_config(config, workspace_root, schema, in_memory)
    }

    /// Build from an already loaded configuration
    pub fn from_config(
        config: StoreConfig,
        workspace_root: PathBuf,
        schema: Option<String>,
        in_memory: bool,
    ) -> Result<Self, StoreError> {
        if let Err(errors) = config.validate() {
            let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(StoreError::ConfigError(messages.join("; ")));
        }
        let mode = if in_memory {
            StorageMode::InMemory
        } else {
            config.storage.default_mode
        };
        let schema_name = schema.or_else(|| config.default_schema.clone());
        Ok(Self {
            handle: StoreHandle::new(config),
            workspace_root,
            schema_name,
            mode,
        })
    }

    pub fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.handle.is_open() {
            return Ok(());
        }
        let name = self.schema_name.as_deref().ok_or_else(|| {
            StoreError::ConfigError(
                "No schema selected: pass --schema or set default_schema in config".to_string(),
            )
        })?;
        if self.handle.registered_schema(name).is_none() {
            return Err(StoreError::ConfigError(format!(
                "Unknown schema '{}' (known: {})",
                name,
                self.handle.schema_names().join(", ")
            )));
        }
        self.handle.open(name, self.mode);
        Ok(())
    }

    fn kind(&self, name: &str) -> Result<JsonKind, StoreError> {
        if self.handle.schema().contains(name) {
            Ok(JsonKind::new(name))
        } else {
            Err(StoreError::ConfigError(format!(
                "Kind '{}' is not declared in schema '{}'",
                name,
                self.handle.schema().name()
            )))
        }
    }

    /// Execute one command and return its printable output
    pub fn execute(&self, command: &Commands) -> Result<String, StoreError> {
        let started = Instant::now();
        let name = command_name(command);
        if needs_store(command) {
            self.ensure_open()?;
        }
        debug!(command = name, "executing command");

        let result = match command {
            Commands::Import { file, kind, id_key } => {
                self.handle_import(file, kind, id_key.clone())
            }
            Commands::Count { kind, filter } => self.handle_count(kind, filter.as_deref()),
            Commands::List {
                kind,
                filter,
                sort,
                desc,
                limit,
                format,
            } => self.handle_list(kind, filter.as_deref(), sort.as_deref(), *desc, *limit, *format),
            Commands::DeleteAll {
                kind,
                keep_attr,
                keep,
            } => self.handle_delete_all(kind, keep_attr.as_deref(), keep),
            Commands::Schemas => Ok(self.handle_schemas()),
            Commands::Config => self.handle.config().to_toml(),
        };

        info!(
            command = name,
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "command finished"
        );
        result
    }

    fn handle_import(
        &self,
        file: &Path,
        kind: &str,
        id_key: Option<String>,
    ) -> Result<String, StoreError> {
        let kind = self.kind(kind)?;
        let raw = std::fs::read_to_string(self.resolve_path(file))
            .map_err(|e| StoreError::StorageError(e.into()))?;
        let json: Value = serde_json::from_str(&raw)
            .map_err(|e| StoreError::MalformedPayload(format!("{}: {}", file.display(), e)))?;

        let mut options = ImportOptions::new();
        if let Some(key) = id_key {
            options = options.identity_key(key);
        }
        let context = self.handle.main_context();
        let imported = if json.is_array() {
            context.import_list_with(&kind, &json, options)?.len()
        } else {
            context.import_object_with(&kind, &json, options)?;
            1
        };
        Ok(format!("Imported {} {} record(s).", imported, kind_name(&kind)))
    }

    fn handle_count(&self, kind: &str, filter: Option<&str>) -> Result<String, StoreError> {
        let kind = self.kind(kind)?;
        let predicate = parse_filter(filter)?;
        let count = self.handle.main_context().count(&kind, predicate)?;
        Ok(count.to_string())
    }

    fn handle_list(
        &self,
        kind: &str,
        filter: Option<&str>,
        sort: Option<&str>,
        desc: bool,
        limit: Option<usize>,
        format: OutputFormat,
    ) -> Result<String, StoreError> {
        let kind = self.kind(kind)?;
        let mut request = FetchRequest::new().with_predicate(parse_filter(filter)?);
        if let Some(attribute) = sort {
            let descriptor = if desc {
                SortDescriptor::desc(attribute)
            } else {
                SortDescriptor::asc(attribute)
            };
            request = request.sorted_by(vec![descriptor]);
        }
        if let Some(limit) = limit {
            request = request.limit(limit);
        }
        let records = self.handle.main_context().fetch(&kind, request)?;
        match format {
            OutputFormat::Text => Ok(format_records_text(kind_name(&kind), &records)),
            OutputFormat::Json => format_records_json(&records),
        }
    }

    fn handle_delete_all(
        &self,
        kind: &str,
        keep_attr: Option<&str>,
        keep: &[String],
    ) -> Result<String, StoreError> {
        let kind = self.kind(kind)?;
        let context = self.handle.main_context();
        let deleted = match keep_attr {
            Some(attribute) => context.delete_all_by_attribute(&kind, attribute, keep)?,
            None => context.delete_all(&kind, None)?,
        };
        let saved = match context.save_to_store()? {
            SaveOutcome::NothingToSave => "nothing to save",
            SaveOutcome::Saved { .. } => "saved",
        };
        Ok(format!(
            "Deleted {} {} record(s) ({}).",
            deleted,
            kind_name(&kind),
            saved
        ))
    }

    fn handle_schemas(&self) -> String {
        let schemas: Vec<_> = self
            .handle
            .schema_names()
            .iter()
            .filter_map(|name| self.handle.registered_schema(name))
            .collect();
        format_schemas_text(&schemas)
    }
}

fn kind_name(kind: &JsonKind) -> &str {
    crate::entity::EntityKind::name(kind)
}

fn parse_filter(filter: Option<&str>) -> Result<Option<Predicate>, StoreError> {
    filter.map(str::parse::<Predicate>).transpose()
}

//! Store handle
//!
//! Owns the engine of one store and the main context bound to it. Handles are
//! cheap to clone; clones share the same engine.

use crate::config::{ConfigLoader, StoreConfig};
use crate::context::{Context, ContextShared};
use crate::error::{fatal, FatalConfiguration, StorageError};
use crate::schema::Schema;
use crate::store::{Backend, Engine, MemoryBackend, SledBackend, StorageMode};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

struct OpenStore {
    schema: Arc<Schema>,
    mode: StorageMode,
    engine: Arc<Engine>,
    main: Context,
    background: Mutex<Option<Context>>,
}

struct HandleInner {
    config: StoreConfig,
    schemas: RwLock<HashMap<String, Arc<Schema>>>,
    state: RwLock<Option<Arc<OpenStore>>>,
}

/// Entry point to a store: open it, then work through its contexts
#[derive(Clone)]
pub struct StoreHandle {
    inner: Arc<HandleInner>,
}

impl StoreHandle {
    /// Build a handle. Schemas declared in `config` are registered right away.
    pub fn new(config: StoreConfig) -> Self {
        let schemas = config
            .schemas
            .iter()
            .map(|(name, schema)| (name.clone(), Arc::new(schema.to_schema(name))))
            .collect();
        Self {
            inner: Arc::new(HandleInner {
                config,
                schemas: RwLock::new(schemas),
                state: RwLock::new(None),
            }),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Make a schema available to `open`. Replaces a schema of the same name.
    pub fn register_schema(&self, schema: Schema) {
        debug!(schema = %schema.name(), kinds = schema.kinds().count(), "registered schema");
        self.inner
            .schemas
            .write()
            .insert(schema.name().to_string(), Arc::new(schema));
    }

    /// Names of the registered schemas, sorted
    pub fn schema_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.schemas.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn registered_schema(&self, name: &str) -> Option<Arc<Schema>> {
        self.inner.schemas.read().get(name).cloned()
    }

    /// Directory a persistent store for `schema_name` lives in
    pub fn store_path(&self, schema_name: &str) -> PathBuf {
        self.inner.config.storage.data_dir.join(schema_name)
    }

    /// Open the store with `schema_name`. A no-op if the handle is already open.
    ///
    /// Unknown schemas, engines that fail to open and on-disk stores written
    /// under another schema are fatal.
    pub fn open(&self, schema_name: &str, mode: StorageMode) {
        let mut state = self.inner.state.write();
        if let Some(open) = state.as_ref() {
            debug!(schema = %open.schema.name(), "store already open");
            return;
        }

        let schema = self
            .registered_schema(schema_name)
            .unwrap_or_else(|| fatal(FatalConfiguration::UnknownSchema(schema_name.to_string())));
        if let Err(message) = schema.validate() {
            fatal(FatalConfiguration::EngineSetup(message));
        }

        let backend: Arc<dyn Backend> = match mode {
            StorageMode::InMemory => Arc::new(MemoryBackend::new()),
            StorageMode::Persistent => {
                let path = self.store_path(schema_name);
                let backend =
                    SledBackend::open(&path, self.inner.config.storage.flush_on_commit)
                        .unwrap_or_else(|e| fatal(FatalConfiguration::EngineSetup(e.to_string())));
                Arc::new(backend)
            }
        };
        bind_schema(backend.as_ref(), schema_name);

        let engine = Engine::new(backend.clone())
            .unwrap_or_else(|e| fatal(FatalConfiguration::EngineSetup(e.to_string())));
        let engine = Arc::new(engine);
        let main = Context::new_main(Arc::new(ContextShared {
            schema: schema.clone(),
            engine: engine.clone(),
            default_identity_key: self.inner.config.default_identity_key.clone(),
        }));

        info!(
            schema = %schema_name,
            mode = ?mode,
            location = %backend.describe(),
            "store opened"
        );
        *state = Some(Arc::new(OpenStore {
            schema,
            mode,
            engine,
            main,
            background: Mutex::new(None),
        }));
    }

    /// Open with the configured default storage mode
    pub fn open_default(&self, schema_name: &str) {
        self.open(schema_name, self.inner.config.storage.default_mode)
    }

    pub fn is_open(&self) -> bool {
        self.inner.state.read().is_some()
    }

    #[track_caller]
    fn require_open(&self) -> Arc<OpenStore> {
        match self.inner.state.read().as_ref() {
            Some(open) => open.clone(),
            None => fatal(FatalConfiguration::StoreNotOpened),
        }
    }

    /// Storage mode of the open store
    #[track_caller]
    pub fn mode(&self) -> StorageMode {
        self.require_open().mode
    }

    /// Schema of the open store
    #[track_caller]
    pub fn schema(&self) -> Arc<Schema> {
        self.require_open().schema.clone()
    }

    /// The root context bound to the engine
    #[track_caller]
    pub fn main_context(&self) -> Context {
        self.require_open().main.clone()
    }

    /// A new context parented to main. Every call creates a distinct context.
    #[track_caller]
    pub fn new_background_context(&self) -> Context {
        self.require_open().main.new_child()
    }

    /// A new context parented to `parent`
    pub fn new_child_context(&self, parent: &Context) -> Context {
        parent.new_child()
    }

    /// Shared background context, created on first use
    #[track_caller]
    pub fn background_context(&self) -> Context {
        let open = self.require_open();
        let mut background = open.background.lock();
        background.get_or_insert_with(|| open.main.new_child()).clone()
    }

    /// Flush and release the engine. The handle can be opened again afterwards;
    /// contexts still held elsewhere fail their next engine access.
    pub fn close(&self) -> Result<(), StorageError> {
        let Some(open) = self.inner.state.write().take() else {
            return Ok(());
        };
        open.engine.shutdown()?;
        info!(schema = %open.schema.name(), "store closed");
        Ok(())
    }
}

fn bind_schema(backend: &dyn Backend, requested: &str) {
    match backend.stored_schema() {
        Ok(Some(stored)) if stored != requested => {
            fatal(FatalConfiguration::SchemaMismatch {
                path: backend.describe(),
                stored,
                requested: requested.to_string(),
            });
        }
        Ok(Some(_)) => {}
        Ok(None) => {
            if let Err(e) = backend.record_schema(requested) {
                fatal(FatalConfiguration::EngineSetup(e.to_string()));
            }
        }
        Err(e) => fatal(FatalConfiguration::EngineSetup(e.to_string())),
    }
}

/// Process-wide handle, configured from the current directory on first use.
///
/// A convenience for application entry points; library code takes a
/// [`StoreHandle`] explicitly.
pub fn shared() -> &'static StoreHandle {
    static SHARED: OnceLock<StoreHandle> = OnceLock::new();
    SHARED.get_or_init(|| {
        let config = std::env::current_dir()
            .map_err(|e| e.to_string())
            .and_then(|dir| ConfigLoader::load(&dir).map_err(|e| e.to_string()))
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to load configuration, using defaults");
                StoreConfig::default()
            });
        StoreHandle::new(config)
    })
}

//! JSON import and identity reconciliation
//!
//! Each JSON object is matched to an existing record through its identity
//! attribute (get-or-create), then handed to the kind's population hook. A
//! list import runs every element on the context's queue in order and finishes
//! with one cascading save of the whole batch.
//!
//! When several records share an identity value, the first one in natural
//! order wins and the others are left untouched.

use crate::context::Context;
use crate::entity::{AttrValue, EntityKind, Record};
use crate::error::{StoreError, StoreResult};
use crate::ops::FetchRequest;
use crate::predicate::Predicate;
use serde_json::{Map, Value};
use std::future::Future;
use tracing::{debug, info};

/// Value of an identity attribute: integers and strings only
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityValue {
    Int(i64),
    Str(String),
}

impl IdentityValue {
    /// Read an identity value out of JSON; floats, booleans and null are rejected
    pub fn from_json(value: &Value) -> Option<Self> {
        match AttrValue::identity_from_json(value)? {
            AttrValue::Int(i) => Some(IdentityValue::Int(i)),
            AttrValue::Str(s) => Some(IdentityValue::Str(s)),
            _ => None,
        }
    }

    /// Typed equality predicate: integers compare numerically, strings as
    /// escaped literals.
    pub fn predicate(&self, attribute: &str) -> Predicate {
        match self {
            IdentityValue::Int(i) => Predicate::eq(attribute, AttrValue::Int(*i)),
            IdentityValue::Str(s) => Predicate::eq(attribute, AttrValue::Str(s.clone())),
        }
    }
}

impl From<IdentityValue> for AttrValue {
    fn from(value: IdentityValue) -> Self {
        match value {
            IdentityValue::Int(i) => AttrValue::Int(i),
            IdentityValue::Str(s) => AttrValue::Str(s),
        }
    }
}

impl From<i64> for IdentityValue {
    fn from(v: i64) -> Self {
        IdentityValue::Int(v)
    }
}

impl From<i32> for IdentityValue {
    fn from(v: i32) -> Self {
        IdentityValue::Int(i64::from(v))
    }
}

impl From<&str> for IdentityValue {
    fn from(v: &str) -> Self {
        IdentityValue::Str(v.to_string())
    }
}

impl From<String> for IdentityValue {
    fn from(v: String) -> Self {
        IdentityValue::Str(v)
    }
}

/// Knobs for [`Context::import_list_with`] and [`Context::import_object_with`]
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// `None` uses the store's default identity key; an empty key always creates
    pub identity_key: Option<String>,
    /// Cascade-save once every element has been imported
    pub save: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            identity_key: None,
            save: true,
        }
    }
}

impl ImportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity_key(mut self, key: impl Into<String>) -> Self {
        self.identity_key = Some(key.into());
        self
    }

    /// Skip identity matching; every element creates a new record
    pub fn always_create(self) -> Self {
        self.identity_key("")
    }

    pub fn save(mut self, save: bool) -> Self {
        self.save = save;
        self
    }
}

/// Elements of one list import, paired with their source objects
struct ImportBatch {
    entries: Vec<(Record, Map<String, Value>)>,
}

impl ImportBatch {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, record: Record, source: Map<String, Value>) {
        self.entries.push((record, source));
    }

    fn into_records(self) -> Vec<Record> {
        self.entries.into_iter().map(|(record, _)| record).collect()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The fields of an object payload; empty and non-object payloads are rejected
fn object_fields(json: &Value) -> StoreResult<Map<String, Value>> {
    match json {
        Value::Null => Err(StoreError::EmptyPayload),
        Value::Object(fields) if fields.is_empty() => Err(StoreError::EmptyPayload),
        Value::Object(fields) => Ok(fields.clone()),
        other => Err(StoreError::MalformedPayload(format!(
            "expected a JSON object, found {}",
            json_type(other)
        ))),
    }
}

impl Context {
    /// The first record of exactly `kind` whose `attribute` equals `value`, or
    /// a new record with that attribute set.
    pub fn get_or_create<K: EntityKind>(
        &self,
        kind: &K,
        attribute: &str,
        value: impl Into<IdentityValue>,
    ) -> StoreResult<Record> {
        self.schema().require_kind(kind.name());
        let kind = kind.name().to_string();
        let attribute = attribute.to_string();
        let value = value.into();
        self.perform_and_wait(move |ctx| {
            ctx.get_or_create_on_queue(&kind, &attribute, value)
                .map(|(record, _)| record)
        })
    }

    /// Like [`Context::get_or_create`]; the flag is set when the record was
    /// inserted by this call.
    fn get_or_create_on_queue(
        &self,
        kind: &str,
        attribute: &str,
        value: IdentityValue,
    ) -> StoreResult<(Record, bool)> {
        let request = FetchRequest::new()
            .with_predicate(Some(value.predicate(attribute)))
            .limit(1)
            .exact_kind();
        let found = self
            .fetch_on_queue(kind, request)
            .map_err(|err| match err {
                StoreError::StorageError(source) => StoreError::ReconciliationFailed {
                    kind: kind.to_string(),
                    attribute: attribute.to_string(),
                    source,
                },
                other => other,
            })?;
        if let Some(existing) = found.into_iter().next() {
            return Ok((existing, false));
        }

        let mut record = self.insert_new(kind);
        record.set(attribute, value);
        self.working().insert(record.clone());
        Ok((record, true))
    }

    /// Import one JSON object without saving
    pub fn import_object<K: EntityKind>(
        &self,
        kind: &K,
        json: &Value,
        identity_key: &str,
    ) -> StoreResult<Record> {
        self.import_object_with(
            kind,
            json,
            ImportOptions::new().identity_key(identity_key).save(false),
        )
    }

    /// Import one JSON object, saving afterwards if `options.save` is set
    pub fn import_object_with<K: EntityKind>(
        &self,
        kind: &K,
        json: &Value,
        options: ImportOptions,
    ) -> StoreResult<Record> {
        self.schema().require_kind(kind.name());
        let fields = object_fields(json)?;
        let kind = kind.clone();
        self.perform_and_wait(move |ctx| {
            let key = ctx.resolve_identity_key(&options);
            let record = ctx.import_fields(&kind, &fields, &key)?;
            if options.save {
                ctx.save_to_store()?;
            }
            Ok(record)
        })
    }

    /// Import a JSON array and save the batch
    pub fn import_list<K: EntityKind>(
        &self,
        kind: &K,
        json: &Value,
        identity_key: &str,
    ) -> StoreResult<Vec<Record>> {
        self.import_list_with(kind, json, ImportOptions::new().identity_key(identity_key))
    }

    /// Import a JSON array.
    ///
    /// Elements are imported in order and the import stops at the first
    /// failing element. Elements imported before the failure stay staged in the
    /// context and are not saved.
    pub fn import_list_with<K: EntityKind>(
        &self,
        kind: &K,
        json: &Value,
        options: ImportOptions,
    ) -> StoreResult<Vec<Record>> {
        self.schema().require_kind(kind.name());
        let items = list_items(json)?;
        let kind = kind.clone();
        self.perform_and_wait(move |ctx| ctx.import_list_on_queue(&kind, items, options))
    }

    /// Async form of [`Context::import_list`]
    pub fn import_list_async<K: EntityKind>(
        &self,
        kind: &K,
        json: Value,
        identity_key: &str,
    ) -> impl Future<Output = StoreResult<Vec<Record>>> + Send + 'static {
        self.schema().require_kind(kind.name());
        let kind = kind.clone();
        let options = ImportOptions::new().identity_key(identity_key);
        self.perform(move |ctx| {
            let items = list_items(&json)?;
            ctx.import_list_on_queue(&kind, items, options)
        })
    }

    fn import_list_on_queue<K: EntityKind>(
        &self,
        kind: &K,
        items: Vec<Value>,
        options: ImportOptions,
    ) -> StoreResult<Vec<Record>> {
        let key = self.resolve_identity_key(&options);
        let mut batch = ImportBatch::with_capacity(items.len());
        for item in &items {
            let fields = object_fields(item)?;
            let record = self.import_fields(kind, &fields, &key)?;
            batch.push(record, fields);
        }
        info!(
            context = %self.label(),
            kind = kind.name(),
            count = batch.entries.len(),
            identity_key = %key,
            "imported list"
        );
        if options.save {
            self.save_to_store()?;
        }
        Ok(batch.into_records())
    }

    fn resolve_identity_key(&self, options: &ImportOptions) -> String {
        options
            .identity_key
            .clone()
            .unwrap_or_else(|| self.default_identity_key().to_string())
    }

    /// Reconcile, populate and stage one object. Runs on this context's queue.
    fn import_fields<K: EntityKind>(
        &self,
        kind: &K,
        fields: &Map<String, Value>,
        identity_key: &str,
    ) -> StoreResult<Record> {
        let (mut record, created) = if identity_key.is_empty() {
            (self.insert_new(kind.name()), true)
        } else {
            let value = fields
                .get(identity_key)
                .and_then(IdentityValue::from_json)
                .ok_or_else(|| StoreError::InvalidIdentityKey {
                    key: identity_key.to_string(),
                })?;
            self.get_or_create_on_queue(kind.name(), identity_key, value)?
        };
        if let Err(err) = kind.populate(&mut record, fields, self) {
            // A record inserted for this object must not outlive the failure
            if created {
                self.working().stage_delete(kind.name(), record.id());
            }
            return Err(err);
        }
        self.stage_update(record.clone())?;
        debug!(
            context = %self.label(),
            kind = kind.name(),
            object = %record.id(),
            "imported object"
        );
        Ok(record)
    }
}

fn list_items(json: &Value) -> StoreResult<Vec<Value>> {
    match json {
        Value::Null => Err(StoreError::EmptyPayload),
        Value::Array(items) if items.is_empty() => Err(StoreError::EmptyPayload),
        Value::Array(items) => Ok(items.clone()),
        other => Err(StoreError::MalformedPayload(format!(
            "expected a JSON array, found {}",
            json_type(other)
        ))),
    }
}

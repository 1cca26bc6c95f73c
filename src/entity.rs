//! Entity model
//!
//! Records are the unit of persistence: a kind name, an object id assigned when
//! the record is first created in a context, and a map of typed attributes.
//! Kinds are described by values implementing [`EntityKind`], which carries the
//! mandatory JSON population hook used by the import algorithm.

use crate::context::Context;
use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Identifier assigned to a record when it is created.
///
/// Ids are allocated from a single counter per open store, so a record keeps its
/// id as it moves from a background context into main and into the engine.
/// Ascending id order is the natural order of every fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(u64);

impl ObjectId {
    pub fn new(raw: u64) -> Self {
        ObjectId(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Big-endian key bytes, so engine iteration order equals natural order
    pub fn to_key(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_key(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; 8] = bytes.try_into().ok()?;
        Some(ObjectId(u64::from_be_bytes(raw)))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Typed attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    /// To-many relationship
    Refs(Vec<ObjectId>),
}

impl AttrValue {
    /// Convert a scalar JSON value. Null, arrays and objects have no attribute form.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(AttrValue::Bool(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(AttrValue::Int)
                .or_else(|| n.as_f64().map(AttrValue::Float)),
            Value::String(s) => Some(AttrValue::Str(s.clone())),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Identity values are restricted to integers and strings
    pub fn identity_from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(AttrValue::Int),
            Value::String(s) => Some(AttrValue::Str(s.clone())),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_refs(&self) -> Option<&[ObjectId]> {
        match self {
            AttrValue::Refs(ids) => Some(ids),
            _ => None,
        }
    }

    /// Plain textual rendering: strings unquoted, integers in decimal
    pub fn render(&self) -> String {
        match self {
            AttrValue::Int(i) => i.to_string(),
            AttrValue::Float(f) => f.to_string(),
            AttrValue::Bool(b) => b.to_string(),
            AttrValue::Str(s) => s.clone(),
            AttrValue::Refs(ids) => ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            AttrValue::Int(i) => Value::from(*i),
            AttrValue::Float(f) => Value::from(*f),
            AttrValue::Bool(b) => Value::from(*b),
            AttrValue::Str(s) => Value::from(s.as_str()),
            AttrValue::Refs(ids) => {
                Value::from(ids.iter().map(|id| id.as_u64()).collect::<Vec<_>>())
            }
        }
    }

    /// Total order used for sorting.
    ///
    /// Values of different types order by type: booleans, then numbers, then
    /// strings, then relationships. Integers and floats compare by numeric
    /// value with NaN placed as [`f64::total_cmp`] places it.
    pub fn sort_cmp(&self, other: &AttrValue) -> Ordering {
        match (self, other) {
            (AttrValue::Int(x), AttrValue::Int(y)) => x.cmp(y),
            (AttrValue::Float(x), AttrValue::Float(y)) => x.total_cmp(y),
            (AttrValue::Int(x), AttrValue::Float(y)) => int_float_cmp(*x, *y),
            (AttrValue::Float(x), AttrValue::Int(y)) => int_float_cmp(*y, *x).reverse(),
            (AttrValue::Bool(x), AttrValue::Bool(y)) => x.cmp(y),
            (AttrValue::Str(x), AttrValue::Str(y)) => x.cmp(y),
            (AttrValue::Refs(x), AttrValue::Refs(y)) => x.cmp(y),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            AttrValue::Bool(_) => 0,
            AttrValue::Int(_) | AttrValue::Float(_) => 1,
            AttrValue::Str(_) => 2,
            AttrValue::Refs(_) => 3,
        }
    }
}

/// Exact comparison of an integer with a float; an integer sorts before an
/// equal float.
fn int_float_cmp(int: i64, float: f64) -> Ordering {
    match (int as f64).total_cmp(&float) {
        // Rounding only ever lands on integral floats, so this is exact
        Ordering::Equal => (int as i128)
            .cmp(&(float as i128))
            .then(Ordering::Less),
        other => other,
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        AttrValue::Int(i64::from(v))
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<Vec<ObjectId>> for AttrValue {
    fn from(v: Vec<ObjectId>) -> Self {
        AttrValue::Refs(v)
    }
}

/// A persisted entity: kind, object id and attributes.
///
/// A `Record` handed out by a context is a snapshot. Mutate it with
/// [`Record::set`] and stage the change with `Context::update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: ObjectId,
    kind: String,
    attributes: BTreeMap<String, AttrValue>,
}

impl Record {
    pub fn new(kind: impl Into<String>, id: ObjectId) -> Self {
        Self {
            id,
            kind: kind.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn get(&self, attribute: &str) -> Option<&AttrValue> {
        self.attributes.get(attribute)
    }

    pub fn get_int(&self, attribute: &str) -> Option<i64> {
        self.get(attribute).and_then(AttrValue::as_int)
    }

    pub fn get_str(&self, attribute: &str) -> Option<&str> {
        self.get(attribute).and_then(AttrValue::as_str)
    }

    pub fn set(&mut self, attribute: impl Into<String>, value: impl Into<AttrValue>) {
        self.attributes.insert(attribute.into(), value.into());
    }

    pub fn remove(&mut self, attribute: &str) -> Option<AttrValue> {
        self.attributes.remove(attribute)
    }

    pub fn attributes(&self) -> &BTreeMap<String, AttrValue> {
        &self.attributes
    }

    /// Names of attributes whose value differs from `base` (added, changed or removed)
    pub fn changed_attributes(&self, base: &Record) -> Vec<String> {
        let mut changed: Vec<String> = self
            .attributes
            .iter()
            .filter(|(key, value)| base.attributes.get(*key) != Some(*value))
            .map(|(key, _)| key.clone())
            .collect();
        changed.extend(
            base.attributes
                .keys()
                .filter(|key| !self.attributes.contains_key(*key))
                .cloned(),
        );
        changed
    }

    /// Copy one attribute (or its absence) from `other`
    pub(crate) fn take_attribute_from(&mut self, other: &Record, attribute: &str) {
        match other.attributes.get(attribute) {
            Some(value) => {
                self.attributes.insert(attribute.to_string(), value.clone());
            }
            None => {
                self.attributes.remove(attribute);
            }
        }
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (key, value) in &self.attributes {
            map.insert(key.clone(), value.to_json());
        }
        Value::Object(map)
    }
}

/// Contract every persisted kind supplies.
///
/// `populate` is the field-population hook run by `import_object` after the
/// record has been reconciled by identity. It may call back into `context`
/// (for example to get-or-create related records); such calls run inline on the
/// context's queue.
pub trait EntityKind: Clone + Send + Sync + 'static {
    /// Kind name as declared in the schema
    fn name(&self) -> &str;

    /// Apply JSON fields to `record`
    fn populate(
        &self,
        record: &mut Record,
        fields: &Map<String, Value>,
        context: &Context,
    ) -> Result<(), StoreError>;
}

/// Kind whose population hook copies every scalar JSON field into an attribute.
///
/// Used where kinds are only known at runtime, such as the CLI.
#[derive(Debug, Clone)]
pub struct JsonKind {
    name: String,
}

impl JsonKind {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl EntityKind for JsonKind {
    fn name(&self) -> &str {
        &self.name
    }

    fn populate(
        &self,
        record: &mut Record,
        fields: &Map<String, Value>,
        _context: &Context,
    ) -> Result<(), StoreError> {
        for (key, value) in fields {
            if let Some(attr) = AttrValue::from_json(value) {
                record.set(key.clone(), attr);
            }
        }
        Ok(())
    }
}

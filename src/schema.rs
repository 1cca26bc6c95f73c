//! Schemas: named sets of entity kinds.
//!
//! A store handle is opened against exactly one schema. Kinds may declare a
//! parent kind; fetches include sub-kinds by default while counts do not.

use crate::error::{fatal, FatalConfiguration};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One kind in a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl KindDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }
}

/// Named collection of kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    name: String,
    kinds: BTreeMap<String, KindDescriptor>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kinds: BTreeMap::new(),
        }
    }

    /// Builder-style kind registration
    pub fn with_kind(mut self, kind: KindDescriptor) -> Self {
        self.kinds.insert(kind.name.clone(), kind);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kinds(&self) -> impl Iterator<Item = &KindDescriptor> {
        self.kinds.values()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Raise a fatal configuration error when `kind` is not declared
    #[track_caller]
    pub fn require_kind(&self, kind: &str) {
        if !self.contains(kind) {
            fatal(FatalConfiguration::UnknownKind {
                schema: self.name.clone(),
                kind: kind.to_string(),
            });
        }
    }

    /// `kind` followed by every kind that descends from it, in name order
    pub fn with_descendants(&self, kind: &str) -> Vec<String> {
        let mut result = vec![kind.to_string()];
        let mut cursor = 0;
        while cursor < result.len() {
            let current = result[cursor].clone();
            for descriptor in self.kinds.values() {
                if descriptor.parent.as_deref() == Some(current.as_str())
                    && !result.contains(&descriptor.name)
                {
                    result.push(descriptor.name.clone());
                }
            }
            cursor += 1;
        }
        result
    }

    /// Check that every declared parent exists and that no kind is its own ancestor
    pub fn validate(&self) -> Result<(), String> {
        for descriptor in self.kinds.values() {
            let mut seen = vec![descriptor.name.as_str()];
            let mut parent = descriptor.parent.as_deref();
            while let Some(name) = parent {
                let Some(next) = self.kinds.get(name) else {
                    return Err(format!(
                        "kind '{}' declares unknown parent '{}'",
                        descriptor.name, name
                    ));
                };
                if seen.contains(&name) {
                    return Err(format!("kind '{}' has a cyclic parent chain", descriptor.name));
                }
                seen.push(name);
                parent = next.parent.as_deref();
            }
        }
        Ok(())
    }
}

//! Reading records
//!
//! All reads go through [`FetchRequest`]: a predicate, sort descriptors, an
//! optional limit and whether sub-kinds are included. Without sort descriptors
//! the limit is pushed down to the engine scan.

use crate::context::Context;
use crate::entity::{AttrValue, EntityKind, ObjectId, Record};
use crate::error::StoreResult;
use crate::predicate::Predicate;
use std::cmp::Ordering;
use std::future::Future;
use tracing::debug;

/// Order records by one attribute
#[derive(Debug, Clone, PartialEq)]
pub struct SortDescriptor {
    pub attribute: String,
    pub ascending: bool,
}

impl SortDescriptor {
    pub fn asc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            ascending: true,
        }
    }

    pub fn desc(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            ascending: false,
        }
    }

    fn compare(&self, a: &Record, b: &Record) -> Ordering {
        // Records without the attribute sort first when ascending
        let ordering = match (a.get(&self.attribute), b.get(&self.attribute)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.sort_cmp(y),
        };
        if self.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }
}

/// Parameters of a fetch
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub predicate: Option<Predicate>,
    pub sort: Vec<SortDescriptor>,
    pub limit: Option<usize>,
    pub include_subkinds: bool,
}

impl Default for FetchRequest {
    fn default() -> Self {
        Self {
            predicate: None,
            sort: Vec::new(),
            limit: None,
            include_subkinds: true,
        }
    }
}

impl FetchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_predicate(mut self, predicate: Option<Predicate>) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn sorted_by(mut self, sort: Vec<SortDescriptor>) -> Self {
        self.sort = sort;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Restrict the fetch to the requested kind
    pub fn exact_kind(mut self) -> Self {
        self.include_subkinds = false;
        self
    }
}

fn sort_records(records: &mut [Record], sort: &[SortDescriptor]) {
    if sort.is_empty() {
        return;
    }
    // Stable sort; ties keep natural (id) order
    records.sort_by(|a, b| {
        sort.iter()
            .map(|descriptor| descriptor.compare(a, b))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

impl Context {
    /// General fetch of `kind` as this context sees it
    pub fn fetch<K: EntityKind>(
        &self,
        kind: &K,
        request: FetchRequest,
    ) -> StoreResult<Vec<Record>> {
        self.schema().require_kind(kind.name());
        let kind = kind.name().to_string();
        self.perform_and_wait(move |ctx| ctx.fetch_on_queue(&kind, request))
    }

    pub(crate) fn fetch_on_queue(
        &self,
        kind: &str,
        request: FetchRequest,
    ) -> StoreResult<Vec<Record>> {
        let kinds = if request.include_subkinds {
            self.schema().with_descendants(kind)
        } else {
            vec![kind.to_string()]
        };
        let pushdown = if request.sort.is_empty() { request.limit } else { None };
        let mut records = self.view_fetch(kinds, request.predicate.clone(), pushdown)?;
        sort_records(&mut records, &request.sort);
        if let Some(limit) = request.limit {
            records.truncate(limit);
        }
        debug!(
            context = %self.label(),
            kind,
            predicate = request.predicate.as_ref().map(|p| p.to_string()),
            results = records.len(),
            "fetched records"
        );
        Ok(records)
    }

    /// First record matching `predicate` in natural order
    pub fn read_first<K: EntityKind>(
        &self,
        kind: &K,
        predicate: Option<Predicate>,
    ) -> StoreResult<Option<Record>> {
        self.read_first_sorted(kind, predicate, Vec::new())
    }

    /// First record matching `predicate` under `sort`
    pub fn read_first_sorted<K: EntityKind>(
        &self,
        kind: &K,
        predicate: Option<Predicate>,
        sort: Vec<SortDescriptor>,
    ) -> StoreResult<Option<Record>> {
        let request = FetchRequest::new()
            .with_predicate(predicate)
            .sorted_by(sort)
            .limit(1);
        Ok(self.fetch(kind, request)?.into_iter().next())
    }

    /// First record whose `attribute` equals `value`
    pub fn read_first_by_attribute<K: EntityKind>(
        &self,
        kind: &K,
        attribute: &str,
        value: impl Into<AttrValue>,
    ) -> StoreResult<Option<Record>> {
        self.read_first(kind, Some(Predicate::eq(attribute, value)))
    }

    pub fn read_all<K: EntityKind>(
        &self,
        kind: &K,
        predicate: Option<Predicate>,
        sort: Vec<SortDescriptor>,
    ) -> StoreResult<Vec<Record>> {
        self.fetch(
            kind,
            FetchRequest::new().with_predicate(predicate).sorted_by(sort),
        )
    }

    /// Records whose `attribute` contains `substring`, ignoring case
    pub fn read_all_by_attribute<K: EntityKind>(
        &self,
        kind: &K,
        attribute: &str,
        substring: &str,
        sort: Vec<SortDescriptor>,
    ) -> StoreResult<Vec<Record>> {
        self.read_all(kind, Some(Predicate::contains_ci(attribute, substring)), sort)
    }

    /// Number of records of exactly `kind` matching `predicate`.
    ///
    /// Only ids are collected; sub-kinds are not counted.
    pub fn count<K: EntityKind>(
        &self,
        kind: &K,
        predicate: Option<Predicate>,
    ) -> StoreResult<usize> {
        self.schema().require_kind(kind.name());
        let kinds = vec![kind.name().to_string()];
        self.perform_and_wait(move |ctx| Ok(ctx.view_ids(kinds, predicate)?.len()))
    }

    /// The record with object id `id`, if this context can see it
    pub fn existing_object<K: EntityKind>(
        &self,
        kind: &K,
        id: ObjectId,
    ) -> StoreResult<Option<Record>> {
        self.schema().require_kind(kind.name());
        let kind = kind.name().to_string();
        self.perform_and_wait(move |ctx| ctx.view_get(&kind, id))
    }

    /// Async form of [`Context::read_all`]
    pub fn read_all_async<K: EntityKind>(
        &self,
        kind: &K,
        predicate: Option<Predicate>,
        sort: Vec<SortDescriptor>,
    ) -> impl Future<Output = StoreResult<Vec<Record>>> + Send + 'static {
        self.schema().require_kind(kind.name());
        let kind = kind.name().to_string();
        let request = FetchRequest::new().with_predicate(predicate).sorted_by(sort);
        self.perform(move |ctx| ctx.fetch_on_queue(&kind, request))
    }
}

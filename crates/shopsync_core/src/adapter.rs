//! Remote adapter contract.

use crate::config::BackendConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::RemoteTransport;
use crate::tree::CategoryTree;
use crate::types::RemoteId;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use shopsync_codec::{Record, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Date format of remote filters.
pub const REMOTE_DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Field holding the last remote modification date.
pub const UPDATED_AT: &str = "updated_at";

/// Formats a date the way remote filters expect it.
pub fn format_remote_date(date: DateTime<Utc>) -> String {
    date.format(REMOTE_DATE_FORMAT).to_string()
}

/// Quantities per remote order line.
pub type ItemQuantities = BTreeMap<RemoteId, f64>;

/// A comparison on one remote field.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSpec {
    /// Equal to.
    Eq(Value),
    /// Not equal to.
    Neq(Value),
    /// Greater than or equal to.
    From(Value),
    /// Less than or equal to.
    To(Value),
    /// One of.
    In(Vec<Value>),
    /// SQL-like pattern, `%` matching any run of characters.
    Like(String),
}

impl FilterSpec {
    /// Operator name on the wire.
    pub fn op(&self) -> &'static str {
        match self {
            FilterSpec::Eq(_) => "eq",
            FilterSpec::Neq(_) => "neq",
            FilterSpec::From(_) => "from",
            FilterSpec::To(_) => "to",
            FilterSpec::In(_) => "in",
            FilterSpec::Like(_) => "like",
        }
    }

    /// Operand on the wire.
    pub fn operand(&self) -> Value {
        match self {
            FilterSpec::Eq(v) | FilterSpec::Neq(v) | FilterSpec::From(v) | FilterSpec::To(v) => {
                v.clone()
            }
            FilterSpec::In(values) => Value::Array(values.clone()),
            FilterSpec::Like(pattern) => Value::Text(pattern.clone()),
        }
    }

    /// Parses an operator and its operand.
    pub fn parse(op: &str, operand: &Value) -> Option<Self> {
        Some(match op {
            "eq" => FilterSpec::Eq(operand.clone()),
            "neq" => FilterSpec::Neq(operand.clone()),
            "from" => FilterSpec::From(operand.clone()),
            "to" => FilterSpec::To(operand.clone()),
            "in" => FilterSpec::In(operand.as_array()?.to_vec()),
            "like" => FilterSpec::Like(operand.as_text()?.to_string()),
            _ => return None,
        })
    }

    /// Evaluates the comparison against a value. Used by in-memory remotes.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            FilterSpec::Eq(expected) => loose_eq(value, expected),
            FilterSpec::Neq(expected) => !loose_eq(value, expected),
            FilterSpec::From(bound) => compare(value, bound).is_some_and(|o| o.is_ge()),
            FilterSpec::To(bound) => compare(value, bound).is_some_and(|o| o.is_le()),
            FilterSpec::In(values) => values.iter().any(|v| loose_eq(value, v)),
            FilterSpec::Like(pattern) => value.as_text().is_some_and(|text| like(text, pattern)),
        }
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    a == b || matches!((a.to_id_string(), b.to_id_string()), (Some(x), Some(y)) if x == y)
}

fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        _ => a.as_float()?.partial_cmp(&b.as_float()?),
    }
}

fn like(text: &str, pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return text == pattern;
    }
    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if !text.starts_with(first) || !text[first.len()..].ends_with(last) {
        return false;
    }
    let mut rest = &text[first.len()..text.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}

/// Remote search filters: remote field to comparisons.
///
/// Encoded on the wire as `{field: {op: operand}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    specs: BTreeMap<String, Vec<FilterSpec>>,
}

impl Filters {
    /// Creates empty filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a comparison.
    pub fn with(mut self, field: impl Into<String>, spec: FilterSpec) -> Self {
        self.specs.entry(field.into()).or_default().push(spec);
        self
    }

    /// Adds an equality comparison.
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, FilterSpec::Eq(value.into()))
    }

    /// Restricts to records modified since `date`.
    pub fn updated_since(self, date: DateTime<Utc>) -> Self {
        self.with(UPDATED_AT, FilterSpec::From(Value::Text(format_remote_date(date))))
    }

    /// Returns true if no comparison is set.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Iterates over `(field, comparisons)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FilterSpec])> {
        self.specs.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Returns true if the record satisfies every comparison.
    pub fn matches(&self, record: &Record) -> bool {
        self.specs.iter().all(|(field, specs)| {
            let value = record.get(field).unwrap_or(&Value::Null);
            specs.iter().all(|spec| spec.matches(value))
        })
    }

    /// Encodes the filters.
    pub fn to_value(&self) -> Value {
        let map = self
            .specs
            .iter()
            .map(|(field, specs)| {
                let ops = specs
                    .iter()
                    .map(|s| (s.op().to_string(), s.operand()))
                    .collect::<BTreeMap<_, _>>();
                (field.clone(), Value::Map(ops))
            })
            .collect::<BTreeMap<_, _>>();
        Value::Map(map)
    }

    /// Decodes filters.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidArgument`] on an unknown operator or a
    /// malformed value.
    pub fn from_value(value: &Value) -> SyncResult<Self> {
        if value.is_null() {
            return Ok(Self::new());
        }
        let fields = value
            .as_map()
            .ok_or_else(|| SyncError::InvalidArgument("filters must be a map".into()))?;
        let mut filters = Self::new();
        for (field, ops) in fields {
            let ops = ops.as_map().ok_or_else(|| {
                SyncError::InvalidArgument(format!("filter on {} must be a map", field))
            })?;
            for (op, operand) in ops {
                let spec = FilterSpec::parse(op, operand).ok_or_else(|| {
                    SyncError::InvalidArgument(format!("bad filter {} on {}", op, field))
                })?;
                filters = filters.with(field.clone(), spec);
            }
        }
        Ok(filters)
    }
}

/// Uniform access to one remote model on one backend.
///
/// Adapters never retry; the job queue owns retries.
pub trait BackendAdapter: Send + Sync {
    /// Remote model name, for diagnostics.
    fn remote_model(&self) -> &str;

    /// Searches remote ids. `from_date` restricts to records updated since.
    fn search(&self, filters: &Filters, from_date: Option<DateTime<Utc>>) -> SyncResult<Vec<RemoteId>>;

    /// Reads one record, optionally in a store view and restricted to
    /// `attributes`.
    fn read(
        &self,
        id: &RemoteId,
        storeview: Option<&RemoteId>,
        attributes: Option<&[String]>,
    ) -> SyncResult<Record>;

    /// Creates a record and returns its remote id.
    fn create(&self, data: Record) -> SyncResult<RemoteId>;

    /// Updates a record.
    fn update(&self, id: &RemoteId, data: Record) -> SyncResult<()>;

    /// Deletes a record.
    fn delete(&self, id: &RemoteId) -> SyncResult<()>;

    /// Searches and reads in one call.
    fn search_read(&self, _filters: &Filters) -> SyncResult<Vec<Record>> {
        Err(SyncError::unsupported(self.remote_model(), "search_read"))
    }

    /// Fetches the category tree below `parent`.
    fn tree(&self, _parent: Option<&RemoteId>, _storeview: Option<&RemoteId>) -> SyncResult<CategoryTree> {
        Err(SyncError::unsupported(self.remote_model(), "tree"))
    }

    /// Lists the images of a record.
    fn images(&self, _id: &RemoteId, _storeview: Option<&RemoteId>) -> SyncResult<Vec<Record>> {
        Err(SyncError::unsupported(self.remote_model(), "images"))
    }

    /// Creates an invoice for an order and returns its remote id.
    fn create_invoice(
        &self,
        _order: &str,
        _items: &ItemQuantities,
        _comment: &str,
        _notify: bool,
        _include_comment: bool,
    ) -> SyncResult<RemoteId> {
        Err(SyncError::unsupported(self.remote_model(), "create_invoice"))
    }

    /// Creates a shipment for an order and returns its remote id.
    fn create_shipment(
        &self,
        _order: &str,
        _items: &ItemQuantities,
        _comment: &str,
        _notify: bool,
        _include_comment: bool,
    ) -> SyncResult<RemoteId> {
        Err(SyncError::unsupported(self.remote_model(), "create_shipment"))
    }
}

/// Builds the adapter of a binding model for a backend.
pub type AdapterFactory =
    Arc<dyn Fn(&BackendConfig, Arc<dyn RemoteTransport>) -> Arc<dyn BackendAdapter> + Send + Sync>;

/// Fetches binary assets such as product images.
pub trait AssetFetcher: Send + Sync {
    /// Downloads the asset at `url`.
    fn fetch(&self, url: &str) -> SyncResult<Vec<u8>>;
}

#[derive(Debug, Default)]
struct MemoryRemote {
    records: BTreeMap<RemoteId, Record>,
    next_id: u64,
    calls: Vec<String>,
    fail_next: Option<SyncError>,
    tree: Option<CategoryTree>,
}

/// An in-memory remote model for testing.
#[derive(Debug)]
pub struct MemoryAdapter {
    model: String,
    inner: RwLock<MemoryRemote>,
}

impl MemoryAdapter {
    /// Creates an empty remote model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            inner: RwLock::new(MemoryRemote::default()),
        }
    }

    /// Stores a record under `id`.
    pub fn insert(&self, id: impl Into<RemoteId>, record: Record) {
        self.inner.write().records.insert(id.into(), record);
    }

    /// Returns a stored record.
    pub fn record(&self, id: &str) -> Option<Record> {
        self.inner.read().records.get(&RemoteId::from(id)).cloned()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// True if no record is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    /// Names of the verbs called so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.inner.read().calls.clone()
    }

    /// Makes the next call fail with `error`.
    pub fn fail_next(&self, error: SyncError) {
        self.inner.write().fail_next = Some(error);
    }

    /// Sets the category tree.
    pub fn set_tree(&self, tree: CategoryTree) {
        self.inner.write().tree = Some(tree);
    }

    fn enter(&self, verb: &str) -> SyncResult<parking_lot::RwLockWriteGuard<'_, MemoryRemote>> {
        let mut inner = self.inner.write();
        inner.calls.push(verb.to_string());
        match inner.fail_next.take() {
            Some(err) => Err(err),
            None => Ok(inner),
        }
    }

    fn missing(&self, id: &RemoteId) -> SyncError {
        SyncError::remote_fault(101, format!("{} {} does not exist", self.model, id))
    }
}

impl BackendAdapter for MemoryAdapter {
    fn remote_model(&self) -> &str {
        &self.model
    }

    fn search(&self, filters: &Filters, from_date: Option<DateTime<Utc>>) -> SyncResult<Vec<RemoteId>> {
        let inner = self.enter("search")?;
        let filters = match from_date {
            Some(date) => filters.clone().updated_since(date),
            None => filters.clone(),
        };
        Ok(inner
            .records
            .iter()
            .filter(|(_, r)| filters.matches(r))
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn read(
        &self,
        id: &RemoteId,
        _storeview: Option<&RemoteId>,
        attributes: Option<&[String]>,
    ) -> SyncResult<Record> {
        let inner = self.enter("read")?;
        let mut record = inner.records.get(id).cloned().ok_or_else(|| self.missing(id))?;
        if let Some(attributes) = attributes {
            record.retain(|field| attributes.iter().any(|a| a == field));
        }
        Ok(record)
    }

    fn create(&self, data: Record) -> SyncResult<RemoteId> {
        let mut inner = self.enter("create")?;
        inner.next_id += 1;
        let id = RemoteId::new(inner.next_id.to_string());
        inner.records.insert(id.clone(), data);
        Ok(id)
    }

    fn update(&self, id: &RemoteId, data: Record) -> SyncResult<()> {
        let mut inner = self.enter("update")?;
        let missing = self.missing(id);
        inner.records.get_mut(id).ok_or(missing)?.merge(data);
        Ok(())
    }

    fn delete(&self, id: &RemoteId) -> SyncResult<()> {
        let mut inner = self.enter("delete")?;
        inner.records.remove(id).ok_or_else(|| self.missing(id))?;
        Ok(())
    }

    fn search_read(&self, filters: &Filters) -> SyncResult<Vec<Record>> {
        let inner = self.enter("search_read")?;
        Ok(inner
            .records
            .values()
            .filter(|r| filters.matches(r))
            .cloned()
            .collect())
    }

    fn tree(&self, _parent: Option<&RemoteId>, _storeview: Option<&RemoteId>) -> SyncResult<CategoryTree> {
        let inner = self.enter("tree")?;
        inner
            .tree
            .clone()
            .ok_or_else(|| SyncError::unsupported(&self.model, "tree"))
    }
}

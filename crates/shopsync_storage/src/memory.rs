//! In-memory local store.

use crate::error::{StorageError, StorageResult};
use crate::id::LocalId;
use crate::store::{Domain, LocalStore};
use parking_lot::RwLock;
use shopsync_codec::{Record, Value};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
struct UniqueConstraint {
    name: String,
    fields: Vec<String>,
}

impl UniqueConstraint {
    /// Key of a row under this constraint, or `None` if any field is null.
    fn key(&self, row: &Record) -> Option<Vec<Value>> {
        self.fields
            .iter()
            .map(|f| row.get(f).filter(|v| !v.is_null()).cloned())
            .collect()
    }
}

#[derive(Debug, Default)]
struct Table {
    next_id: u64,
    rows: BTreeMap<LocalId, Record>,
    translations: HashMap<(LocalId, String), Record>,
    constraints: Vec<UniqueConstraint>,
}

impl Table {
    fn check_unique(&self, model: &str, id: Option<LocalId>, row: &Record) -> StorageResult<()> {
        for constraint in &self.constraints {
            let Some(key) = constraint.key(row) else {
                continue;
            };
            let clash = self
                .rows
                .iter()
                .filter(|(other, _)| Some(**other) != id)
                .any(|(_, other)| constraint.key(other).as_ref() == Some(&key));
            if clash {
                return Err(StorageError::UniqueViolation {
                    model: model.to_string(),
                    constraint: constraint.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// An in-memory local store.
///
/// Suitable for tests and tooling. Each call is atomic; there is no
/// multi-call transaction.
///
/// # Example
///
/// ```rust
/// use shopsync_codec::Record;
/// use shopsync_storage::{Domain, InMemoryStore, LocalStore};
///
/// let store = InMemoryStore::new();
/// let id = store.create("res.partner", Record::new().with("name", "Ada")).unwrap();
/// let found = store.search("res.partner", &Domain::new().eq("name", "Ada")).unwrap();
/// assert_eq!(found, vec![id]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a model.
    pub fn count(&self, model: &str) -> usize {
        self.tables.read().get(model).map_or(0, |t| t.rows.len())
    }

    /// Returns a copy of every record of a model, in id order.
    pub fn dump(&self, model: &str) -> Vec<(LocalId, Record)> {
        self.tables
            .read()
            .get(model)
            .map(|t| t.rows.iter().map(|(id, r)| (*id, r.clone())).collect())
            .unwrap_or_default()
    }
}

impl LocalStore for InMemoryStore {
    fn create(&self, model: &str, values: Record) -> StorageResult<LocalId> {
        let mut tables = self.tables.write();
        let table = tables.entry(model.to_string()).or_default();
        table.check_unique(model, None, &values)?;

        table.next_id += 1;
        let id = LocalId::new(table.next_id);
        table.rows.insert(id, values);
        Ok(id)
    }

    fn read(&self, model: &str, id: LocalId) -> StorageResult<Record> {
        self.tables
            .read()
            .get(model)
            .and_then(|t| t.rows.get(&id))
            .cloned()
            .ok_or_else(|| StorageError::not_found(model, id))
    }

    fn write(&self, model: &str, id: LocalId, values: Record) -> StorageResult<()> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(model)
            .ok_or_else(|| StorageError::not_found(model, id))?;
        let mut row = table
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StorageError::not_found(model, id))?;
        row.merge(values);
        table.check_unique(model, Some(id), &row)?;
        table.rows.insert(id, row);
        Ok(())
    }

    fn unlink(&self, model: &str, id: LocalId) -> StorageResult<()> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(model)
            .ok_or_else(|| StorageError::not_found(model, id))?;
        table
            .rows
            .remove(&id)
            .ok_or_else(|| StorageError::not_found(model, id))?;
        table.translations.retain(|(row, _), _| *row != id);
        Ok(())
    }

    fn search(&self, model: &str, domain: &Domain) -> StorageResult<Vec<LocalId>> {
        Ok(self
            .tables
            .read()
            .get(model)
            .map(|t| {
                t.rows
                    .iter()
                    .filter(|(_, row)| domain.matches(row))
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default())
    }

    fn ensure_unique(&self, model: &str, name: &str, fields: &[&str]) -> StorageResult<()> {
        let mut tables = self.tables.write();
        let table = tables.entry(model.to_string()).or_default();
        if table.constraints.iter().any(|c| c.name == name) {
            return Ok(());
        }

        let constraint = UniqueConstraint {
            name: name.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        };
        let mut seen = Vec::new();
        for row in table.rows.values() {
            if let Some(key) = constraint.key(row) {
                if seen.contains(&key) {
                    return Err(StorageError::UniqueViolation {
                        model: model.to_string(),
                        constraint: name.to_string(),
                    });
                }
                seen.push(key);
            }
        }
        table.constraints.push(constraint);
        Ok(())
    }

    fn write_translation(
        &self,
        model: &str,
        id: LocalId,
        lang: &str,
        values: Record,
    ) -> StorageResult<()> {
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(model)
            .filter(|t| t.rows.contains_key(&id))
            .ok_or_else(|| StorageError::not_found(model, id))?;
        table
            .translations
            .entry((id, lang.to_string()))
            .or_default()
            .merge(values);
        Ok(())
    }

    fn read_translation(&self, model: &str, id: LocalId, lang: &str) -> StorageResult<Record> {
        let tables = self.tables.read();
        let table = tables
            .get(model)
            .filter(|t| t.rows.contains_key(&id))
            .ok_or_else(|| StorageError::not_found(model, id))?;
        Ok(table
            .translations
            .get(&(id, lang.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

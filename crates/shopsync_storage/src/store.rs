//! Local store trait definition.

use crate::error::StorageResult;
use crate::id::LocalId;
use shopsync_codec::{Record, Value};

/// A conjunction of `field == value` conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Domain {
    conditions: Vec<(String, Value)>,
}

impl Domain {
    /// Creates an empty domain, matching every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality condition.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    /// Returns the conditions.
    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    /// Returns true if `record` satisfies every condition.
    ///
    /// An absent field compares equal to null.
    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|(field, expected)| {
            record.get(field).unwrap_or(&Value::Null) == expected
        })
    }
}

/// The host application's record storage, as seen by the synchronizers.
///
/// Records are grouped in named models (`product.category`,
/// `magento.product.category`, ...) and addressed by [`LocalId`].
///
/// # Invariants
///
/// - `create` returns an id never used before in that model
/// - `write` merges the given fields into the stored record
/// - unique constraints are enforced on `create` and `write`; rows where
///   any constrained field is null never conflict
/// - implementations must be `Send + Sync`
pub trait LocalStore: Send + Sync {
    /// Creates a record and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::UniqueViolation`] if a constraint fails.
    fn create(&self, model: &str, values: Record) -> StorageResult<LocalId>;

    /// Reads a record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StorageError::NotFound`] if the record does not exist.
    fn read(&self, model: &str, id: LocalId) -> StorageResult<Record>;

    /// Merges `values` into an existing record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist or a constraint fails.
    fn write(&self, model: &str, id: LocalId, values: Record) -> StorageResult<()>;

    /// Deletes a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist.
    fn unlink(&self, model: &str, id: LocalId) -> StorageResult<()>;

    /// Returns the ids of the records matching `domain`, in id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn search(&self, model: &str, domain: &Domain) -> StorageResult<Vec<LocalId>>;

    /// Declares a unique constraint over `fields`. Declaring the same
    /// constraint twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if existing rows already violate it.
    fn ensure_unique(&self, model: &str, name: &str, fields: &[&str]) -> StorageResult<()>;

    /// Writes translated values of a record for `lang`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist.
    fn write_translation(
        &self,
        model: &str,
        id: LocalId,
        lang: &str,
        values: Record,
    ) -> StorageResult<()>;

    /// Reads the translated values of a record for `lang`.
    ///
    /// # Errors
    ///
    /// Returns an error if the record does not exist.
    fn read_translation(&self, model: &str, id: LocalId, lang: &str) -> StorageResult<Record>;

    /// Reads a record, mapping a missing record to `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store fails.
    fn try_read(&self, model: &str, id: LocalId) -> StorageResult<Option<Record>> {
        match self.read(model, id) {
            Ok(record) => Ok(Some(record)),
            Err(crate::StorageError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

//! Identifier types shared by the synchronizers.

use serde::{Deserialize, Serialize};
use shopsync_codec::Value;
use std::collections::BTreeSet;
use std::fmt;

/// A set of field names, used to narrow a mapping to changed fields.
pub type FieldSet = BTreeSet<String>;

/// Builds a [`FieldSet`] from string slices.
pub fn field_set<I, S>(fields: I) -> FieldSet
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    fields.into_iter().map(Into::into).collect()
}

/// Identifier of a backend configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendId(u64);

impl BackendId {
    /// Creates a backend id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Reads a backend id stored in a record field.
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .as_integer()
            .and_then(|n| u64::try_from(n).ok())
            .filter(|n| *n > 0)
            .map(Self)
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<BackendId> for Value {
    fn from(id: BackendId) -> Self {
        Value::Integer(id.0 as i64)
    }
}

/// Identifier of a record on the remote side.
///
/// Always text. `"0"` is a valid id; an unset id is `Option::None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    /// Creates a remote id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads a remote id from a remote payload value.
    ///
    /// Integers are rendered in decimal; null and empty text are not ids.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.to_id_string().map(Self)
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RemoteId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for RemoteId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<RemoteId> for Value {
    fn from(id: RemoteId) -> Self {
        Value::Text(id.0)
    }
}

impl From<&RemoteId> for Value {
    fn from(id: &RemoteId) -> Self {
        Value::Text(id.0.clone())
    }
}

/// The flavour of a remote platform: a service name and optional version.
///
/// Connectors registered for the unversioned kind serve every version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BackendKind {
    /// Service name, e.g. `magento`.
    pub service: String,
    /// Service version, e.g. `1.7`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl BackendKind {
    /// Creates an unversioned kind.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            version: None,
        }
    }

    /// Creates a versioned kind.
    pub fn versioned(service: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            version: Some(version.into()),
        }
    }

    /// Returns the same service without version.
    pub fn unversioned(&self) -> Self {
        Self::new(self.service.clone())
    }

    /// Service name for messages, e.g. `Magento`.
    pub fn label(&self) -> String {
        let mut chars = self.service.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} {}", self.service, version),
            None => f.write_str(&self.service),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_id_from_value() {
        assert_eq!(RemoteId::from_value(&Value::Integer(0)), Some(RemoteId::from("0")));
        assert_eq!(RemoteId::from_value(&Value::from("100000012")), Some(RemoteId::from("100000012")));
        assert_eq!(RemoteId::from_value(&Value::from("")), None);
        assert_eq!(RemoteId::from_value(&Value::Null), None);
    }

    #[test]
    fn backend_kind_display() {
        assert_eq!(BackendKind::versioned("magento", "1.7").to_string(), "magento 1.7");
        assert_eq!(
            BackendKind::versioned("magento", "1.7").unversioned(),
            BackendKind::new("magento")
        );
        assert_eq!(BackendKind::versioned("magento", "1.7").label(), "Magento");
    }

    #[test]
    fn backend_id_from_value() {
        assert_eq!(BackendId::from_value(&Value::Integer(2)), Some(BackendId::new(2)));
        assert_eq!(BackendId::from_value(&Value::Integer(0)), None);
    }
}

//! Local record identifiers.

use serde::{Deserialize, Serialize};
use shopsync_codec::Value;
use std::fmt;

/// Identifier of a local record, unique within its model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(u64);

impl LocalId {
    /// Creates an id from its raw value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Reads an id stored in a record field. Ids are positive integers.
    pub fn from_value(value: &Value) -> Option<Self> {
        value
            .as_integer()
            .and_then(|n| u64::try_from(n).ok())
            .filter(|n| *n > 0)
            .map(Self)
    }

    /// Converts to the value stored in record fields.
    pub fn to_value(self) -> Value {
        Value::Integer(self.0 as i64)
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<LocalId> for Value {
    fn from(id: LocalId) -> Self {
        id.to_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_roundtrip() {
        let id = LocalId::new(42);
        assert_eq!(LocalId::from_value(&id.to_value()), Some(id));
    }

    #[test]
    fn zero_and_null_are_not_ids() {
        assert_eq!(LocalId::from_value(&Value::Integer(0)), None);
        assert_eq!(LocalId::from_value(&Value::Null), None);
        assert_eq!(LocalId::from_value(&Value::Bool(false)), None);
    }
}

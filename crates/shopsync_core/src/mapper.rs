//! Declarative record mappers.
//!
//! A mapper turns a source record (local view or remote payload) into a
//! partial target record. It combines ordered direct rules (copy `src` to
//! `dst`) with ordered computed mappings (closures returning a partial
//! record or nothing).
//!
//! When a set of changed fields is given, only the rules reachable from
//! those fields run:
//!
//! - a direct rule runs when its source field changed
//! - a computed mapping with a `changed_by` set runs when the sets intersect
//! - a computed mapping without `changed_by` always runs

use crate::environment::Environment;
use crate::error::{SyncError, SyncResult};
use crate::types::FieldSet;
use shopsync_codec::Record;
use std::fmt;
use std::sync::Arc;

/// A computed mapping function.
pub type ComputeFn =
    Arc<dyn Fn(&Record, &Environment<'_>) -> SyncResult<Option<Record>> + Send + Sync>;

/// A direct copy rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectRule {
    /// Source field.
    pub source: String,
    /// Target field.
    pub target: String,
    /// A missing source field is an error.
    pub required: bool,
}

/// A named computed mapping.
#[derive(Clone)]
pub struct ComputedMapping {
    /// Name, for diagnostics.
    pub name: String,
    /// Source fields that trigger the mapping; `None` means always.
    pub changed_by: Option<FieldSet>,
    compute: ComputeFn,
}

impl ComputedMapping {
    fn triggered_by(&self, fields: Option<&FieldSet>) -> bool {
        match (fields, &self.changed_by) {
            (None, _) | (_, None) => true,
            (Some(fields), Some(triggers)) => !fields.is_disjoint(triggers),
        }
    }
}

impl fmt::Debug for ComputedMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedMapping")
            .field("name", &self.name)
            .field("changed_by", &self.changed_by)
            .finish()
    }
}

/// Mapping rule set for one binding model and direction.
#[derive(Debug, Clone, Default)]
pub struct Mapper {
    direct: Vec<DirectRule>,
    computed: Vec<ComputedMapping>,
    schema: Option<FieldSet>,
}

impl Mapper {
    /// Creates an empty mapper.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an optional direct rule.
    pub fn direct(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.direct.push(DirectRule {
            source: source.into(),
            target: target.into(),
            required: false,
        });
        self
    }

    /// Adds a direct rule whose source field must be present.
    pub fn required(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.direct.push(DirectRule {
            source: source.into(),
            target: target.into(),
            required: true,
        });
        self
    }

    /// Adds an unconditional computed mapping.
    pub fn computed<F>(mut self, name: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Record, &Environment<'_>) -> SyncResult<Option<Record>> + Send + Sync + 'static,
    {
        self.computed.push(ComputedMapping {
            name: name.into(),
            changed_by: None,
            compute: Arc::new(compute),
        });
        self
    }

    /// Adds a computed mapping triggered by changes of `fields`.
    pub fn changed_by<F, I, S>(mut self, name: impl Into<String>, fields: I, compute: F) -> Self
    where
        F: Fn(&Record, &Environment<'_>) -> SyncResult<Option<Record>> + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.computed.push(ComputedMapping {
            name: name.into(),
            changed_by: Some(fields.into_iter().map(Into::into).collect()),
            compute: Arc::new(compute),
        });
        self
    }

    /// Restricts the produced keys to `fields`.
    pub fn with_schema<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Direct rules in order.
    pub fn direct_rules(&self) -> &[DirectRule] {
        &self.direct
    }

    /// Computed mappings in registration order.
    pub fn computed_mappings(&self) -> &[ComputedMapping] {
        &self.computed
    }

    /// Maps `source`.
    ///
    /// `fields` narrows the mapping to the rules reachable from those source
    /// fields; `None` maps everything.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Mapping`] when a required source field is
    /// missing or a produced key is outside the schema, and propagates the
    /// errors of computed mappings.
    pub fn convert(
        &self,
        source: &Record,
        fields: Option<&FieldSet>,
        env: &Environment<'_>,
    ) -> SyncResult<Record> {
        let mut result = Record::new();

        for rule in &self.direct {
            if fields.is_some_and(|f| !f.contains(&rule.source)) {
                continue;
            }
            match source.get(&rule.source) {
                Some(value) => {
                    result.insert(rule.target.clone(), value.clone());
                }
                None if rule.required => {
                    return Err(SyncError::mapping(format!(
                        "required field {} is missing",
                        rule.source
                    )));
                }
                None => {}
            }
        }

        for mapping in &self.computed {
            if !mapping.triggered_by(fields) {
                continue;
            }
            if let Some(partial) = (mapping.compute)(source, env)? {
                result.merge(partial);
            }
        }

        if let Some(schema) = &self.schema {
            if let Some(unknown) = result.keys().find(|k| !schema.contains(*k)) {
                return Err(SyncError::mapping(format!(
                    "mapped field {} is not in the target schema",
                    unknown
                )));
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestRuntime;
    use crate::types::field_set;
    use shopsync_codec::Value;

    fn partner_mapper() -> Mapper {
        Mapper::new()
            .direct("email", "email")
            .direct("zip", "postcode")
            .changed_by("names", ["name"], |record, _env| {
                let name = record.text("name").unwrap_or_default();
                Ok(Some(Record::new().with("firstname", name).with("lastname", "-")))
            })
            .computed("website", |_record, _env| {
                Ok(Some(Record::new().with("website_id", 1i64)))
            })
            .computed("nothing", |_record, _env| Ok(None))
    }

    fn partner() -> Record {
        Record::new()
            .with("email", "ada@example.com")
            .with("zip", "1000")
            .with("name", "Ada")
    }

    #[test]
    fn full_mapping() {
        let rt = TestRuntime::new();
        let env = rt.env("magento.res.partner");
        let out = partner_mapper().convert(&partner(), None, &env).unwrap();

        assert_eq!(
            out.keys().collect::<Vec<_>>(),
            vec!["email", "firstname", "lastname", "postcode", "website_id"]
        );
        assert_eq!(out.text("postcode"), Some("1000"));
    }

    #[test]
    fn narrowed_mapping_keeps_reachable_keys() {
        let rt = TestRuntime::new();
        let env = rt.env("magento.res.partner");
        let mapper = partner_mapper();

        let out = mapper
            .convert(&partner(), Some(&field_set(["zip"])), &env)
            .unwrap();
        assert_eq!(out.keys().collect::<Vec<_>>(), vec!["postcode", "website_id"]);

        let out = mapper
            .convert(&partner(), Some(&field_set(["name"])), &env)
            .unwrap();
        assert_eq!(
            out.keys().collect::<Vec<_>>(),
            vec!["firstname", "lastname", "website_id"]
        );
    }

    #[test]
    fn missing_optional_source_is_skipped() {
        let rt = TestRuntime::new();
        let env = rt.env("magento.res.partner");
        let out = Mapper::new()
            .direct("birthday", "dob")
            .convert(&Record::new(), None, &env)
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn missing_required_source_fails() {
        let rt = TestRuntime::new();
        let env = rt.env("magento.res.partner");
        let err = Mapper::new()
            .required("sku", "default_code")
            .convert(&Record::new(), None, &env)
            .unwrap_err();
        assert!(matches!(err, SyncError::Mapping(_)));
    }

    #[test]
    fn later_mappings_overwrite_earlier_keys() {
        let rt = TestRuntime::new();
        let env = rt.env("m");
        let out = Mapper::new()
            .direct("a", "x")
            .computed("first", |_, _| Ok(Some(Record::new().with("x", 1i64))))
            .computed("second", |_, _| Ok(Some(Record::new().with("x", 2i64))))
            .convert(&Record::new().with("a", 0i64), None, &env)
            .unwrap();
        assert_eq!(out.get("x"), Some(&Value::Integer(2)));
    }

    #[test]
    fn schema_rejects_unknown_keys() {
        let rt = TestRuntime::new();
        let env = rt.env("m");
        let mapper = Mapper::new().direct("a", "b").with_schema(["c"]);
        let err = mapper
            .convert(&Record::new().with("a", 1i64), None, &env)
            .unwrap_err();
        assert!(err.to_string().contains("b"));
    }

    #[test]
    fn computed_errors_propagate() {
        let rt = TestRuntime::new();
        let env = rt.env("m");
        let mapper = Mapper::new().computed("parent", |_, _| {
            Err(SyncError::mapping("parent category is not imported"))
        });
        assert!(mapper.convert(&Record::new(), None, &env).is_err());
    }
}

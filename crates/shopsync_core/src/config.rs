//! Backend and connector configuration.

use crate::error::{SyncError, SyncResult};
use crate::types::{BackendId, BackendKind, RemoteId};
use serde::{Deserialize, Serialize};
use shopsync_storage::LocalId;
use std::collections::BTreeSet;
use std::path::Path;

/// Fault code the remote side returns when an invoice already exists.
pub const DEFAULT_INVOICE_EXISTS_FAULT: i64 = 102;

/// Remote fault codes with a documented recovery path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultCodes {
    /// Code of the "invoice already exists" fault.
    #[serde(default = "default_invoice_exists")]
    pub invoice_already_exists: i64,
}

fn default_invoice_exists() -> i64 {
    DEFAULT_INVOICE_EXISTS_FAULT
}

impl Default for FaultCodes {
    fn default() -> Self {
        Self {
            invoice_already_exists: DEFAULT_INVOICE_EXISTS_FAULT,
        }
    }
}

/// A remote store view, the unit of translation on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreView {
    /// Remote id of the store view.
    pub remote_id: RemoteId,
    /// Local language of the store view, if translated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
}

impl StoreView {
    /// Creates a store view.
    pub fn new(remote_id: impl Into<RemoteId>) -> Self {
        Self {
            remote_id: remote_id.into(),
            lang: None,
        }
    }

    /// Sets the language.
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }
}

/// Configuration of one remote backend.
///
/// Immutable during a synchronization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend id, referenced by bindings.
    pub id: BackendId,
    /// Display name.
    pub name: String,
    /// Service flavour.
    pub kind: BackendKind,
    /// Remote location.
    pub location: String,
    /// Remote user.
    #[serde(default)]
    pub username: String,
    /// Remote password.
    #[serde(default)]
    pub password: String,
    /// Local category used when an imported product has none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_category_id: Option<LocalId>,
    /// Store views of the backend.
    #[serde(default)]
    pub storeviews: Vec<StoreView>,
    /// Ask the remote side to mail the customer when a shipment is created.
    #[serde(default)]
    pub send_picking_done_mail: bool,
    /// Ask the remote side to mail the customer when an invoice is created.
    #[serde(default)]
    pub send_invoice_paid_mail: bool,
    /// Recoverable fault codes.
    #[serde(default)]
    pub fault_codes: FaultCodes,
}

impl BackendConfig {
    /// Creates a backend configuration.
    pub fn new(id: BackendId, kind: BackendKind, location: impl Into<String>) -> Self {
        Self {
            id,
            name: format!("{} {}", kind, id),
            kind,
            location: location.into(),
            username: String::new(),
            password: String::new(),
            default_category_id: None,
            storeviews: Vec::new(),
            send_picking_done_mail: false,
            send_invoice_paid_mail: false,
            fault_codes: FaultCodes::default(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the credentials.
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets the default category.
    pub fn with_default_category(mut self, category: LocalId) -> Self {
        self.default_category_id = Some(category);
        self
    }

    /// Adds a store view.
    pub fn with_storeview(mut self, storeview: StoreView) -> Self {
        self.storeviews.push(storeview);
        self
    }

    /// Sets the picking mail flag.
    pub fn with_picking_done_mail(mut self, send: bool) -> Self {
        self.send_picking_done_mail = send;
        self
    }

    /// Sets the invoice mail flag.
    pub fn with_invoice_paid_mail(mut self, send: bool) -> Self {
        self.send_invoice_paid_mail = send;
        self
    }

    /// Sets the "invoice already exists" fault code.
    pub fn with_invoice_exists_fault(mut self, code: i64) -> Self {
        self.fault_codes.invoice_already_exists = code;
        self
    }

    /// Store views that carry a language.
    pub fn translated_storeviews(&self) -> impl Iterator<Item = (&RemoteId, &str)> {
        self.storeviews
            .iter()
            .filter_map(|sv| sv.lang.as_deref().map(|lang| (&sv.remote_id, lang)))
    }

    /// Checks the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] describing the first problem found.
    pub fn validate(&self) -> SyncResult<()> {
        if self.kind.service.is_empty() {
            return Err(SyncError::Config(format!("backend {}: empty service", self.id)));
        }
        if self.location.is_empty() {
            return Err(SyncError::Config(format!("backend {}: empty location", self.id)));
        }
        let mut seen = BTreeSet::new();
        for sv in &self.storeviews {
            if !seen.insert(&sv.remote_id) {
                return Err(SyncError::Config(format!(
                    "backend {}: duplicate store view {}",
                    self.id, sv.remote_id
                )));
            }
        }
        Ok(())
    }
}

/// Top-level connector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Configured backends.
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    /// Base priority of category import jobs.
    #[serde(default = "default_category_priority")]
    pub category_base_priority: u32,
}

fn default_category_priority() -> u32 {
    crate::tree::DEFAULT_BASE_PRIORITY
}

impl ConnectorConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            category_base_priority: default_category_priority(),
        }
    }

    /// Adds a backend.
    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backends.push(backend);
        self
    }

    /// Sets the category base priority.
    pub fn with_category_base_priority(mut self, priority: u32) -> Self {
        self.category_base_priority = priority;
        self
    }

    /// Parses a JSON configuration and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the JSON is malformed or invalid.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    /// Serializes the configuration to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks every backend and id uniqueness.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] describing the first problem found.
    pub fn validate(&self) -> SyncResult<()> {
        let mut ids = BTreeSet::new();
        for backend in &self.backends {
            if !ids.insert(backend.id) {
                return Err(SyncError::Config(format!("duplicate backend id {}", backend.id)));
            }
            backend.validate()?;
        }
        Ok(())
    }

    /// Finds a backend by id.
    pub fn backend(&self, id: BackendId) -> Option<&BackendConfig> {
        self.backends.iter().find(|b| b.id == id)
    }
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn magento(id: u64) -> BackendConfig {
        BackendConfig::new(
            BackendId::new(id),
            BackendKind::versioned("magento", "1.7"),
            "http://shop.example.com",
        )
    }

    #[test]
    fn backend_config_builder() {
        let backend = magento(1)
            .with_name("Demo shop")
            .with_credentials("api", "secret")
            .with_default_category(LocalId::new(4))
            .with_storeview(StoreView::new("1").with_lang("en_US"))
            .with_storeview(StoreView::new("2"))
            .with_invoice_paid_mail(true);

        assert_eq!(backend.name, "Demo shop");
        assert_eq!(backend.username, "api");
        assert_eq!(backend.default_category_id, Some(LocalId::new(4)));
        assert!(backend.send_invoice_paid_mail);
        assert!(!backend.send_picking_done_mail);
        assert_eq!(backend.fault_codes.invoice_already_exists, 102);
        assert_eq!(backend.translated_storeviews().count(), 1);
    }

    #[test]
    fn json_defaults() {
        let json = r#"{
            "backends": [{
                "id": 1,
                "name": "shop",
                "kind": {"service": "magento", "version": "1.7"},
                "location": "http://shop.example.com"
            }]
        }"#;
        let config = ConnectorConfig::from_json(json).unwrap();
        assert_eq!(config.category_base_priority, 10);

        let backend = config.backend(BackendId::new(1)).unwrap();
        assert_eq!(backend.fault_codes.invoice_already_exists, 102);
        assert!(backend.storeviews.is_empty());
    }

    #[test]
    fn json_roundtrip() {
        let config = ConnectorConfig::new()
            .with_backend(magento(1).with_invoice_exists_fault(110))
            .with_category_base_priority(20);
        let parsed = ConnectorConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn duplicate_backend_rejected() {
        let config = ConnectorConfig::new().with_backend(magento(1)).with_backend(magento(1));
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn empty_location_rejected() {
        let backend = BackendConfig::new(BackendId::new(1), BackendKind::new("magento"), "");
        assert!(backend.validate().is_err());
    }

    #[test]
    fn malformed_json_is_config_error() {
        assert!(matches!(
            ConnectorConfig::from_json("{ not json"),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("connector.json");
        let config = ConnectorConfig::new().with_backend(magento(3));
        std::fs::write(&path, config.to_json().unwrap()).unwrap();

        assert_eq!(ConnectorConfig::load(&path).unwrap(), config);
        assert!(ConnectorConfig::load(dir.path().join("missing.json")).is_err());
    }
}

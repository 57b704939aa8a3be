//! Check-config command implementation.

use super::{CliResult, Format};
use serde::Serialize;
use shopsync_core::{BackendConfig, ConnectorConfig, Registry, SyncError};
use shopsync_magento::{magento_registry, MAGENTO_MODELS};
use std::path::Path;
use tracing::debug;

/// Result of a configuration check.
#[derive(Debug, Serialize)]
pub struct ConfigReport {
    /// Configuration file.
    pub path: String,
    /// Base priority of category imports.
    pub category_base_priority: u32,
    /// Checked backends.
    pub backends: Vec<BackendReport>,
}

/// One checked backend.
#[derive(Debug, Serialize)]
pub struct BackendReport {
    /// Backend id.
    pub id: u64,
    /// Display name.
    pub name: String,
    /// Service flavour.
    pub kind: String,
    /// Remote location.
    pub location: String,
    /// Number of store views.
    pub storeviews: usize,
    /// Languages translated through store views.
    pub languages: Vec<String>,
    /// Binding models served on this backend.
    pub connectors: Vec<String>,
}

fn backend_report(registry: &Registry, backend: &BackendConfig) -> CliResult<BackendReport> {
    let connectors: Vec<String> = MAGENTO_MODELS
        .iter()
        .filter(|model| registry.contains(model, &backend.kind))
        .map(|model| model.to_string())
        .collect();
    if connectors.is_empty() {
        return Err(SyncError::Config(format!(
            "backend {} ({}) has no registered connector",
            backend.id, backend.kind
        ))
        .into());
    }
    debug!(backend = %backend.id, connectors = connectors.len(), "backend checked");
    Ok(BackendReport {
        id: backend.id.get(),
        name: backend.name.clone(),
        kind: backend.kind.to_string(),
        location: backend.location.clone(),
        storeviews: backend.storeviews.len(),
        languages: backend
            .translated_storeviews()
            .map(|(_, lang)| lang.to_string())
            .collect(),
        connectors,
    })
}

/// Loads, validates and summarizes a configuration file.
pub fn check(path: &Path) -> CliResult<ConfigReport> {
    let config = ConnectorConfig::load(path)?;
    let registry = magento_registry();
    let backends = config
        .backends
        .iter()
        .map(|backend| backend_report(&registry, backend))
        .collect::<CliResult<Vec<_>>>()?;
    Ok(ConfigReport {
        path: path.display().to_string(),
        category_base_priority: config.category_base_priority,
        backends,
    })
}

/// Runs the check-config command.
pub fn run(path: &Path, format: Format) -> CliResult<()> {
    let report = check(path)?;
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Text => {
            println!("Configuration {}", report.path);
            println!("  category base priority: {}", report.category_base_priority);
            for backend in &report.backends {
                println!();
                println!("Backend {} - {} ({})", backend.id, backend.name, backend.kind);
                println!("  location:   {}", backend.location);
                println!("  storeviews: {}", backend.storeviews);
                if !backend.languages.is_empty() {
                    println!("  languages:  {}", backend.languages.join(", "));
                }
                println!("  connectors: {}", backend.connectors.join(", "));
            }
            println!();
            println!("✓ Configuration is valid");
        }
    }
    Ok(())
}

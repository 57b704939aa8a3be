//! Transport layer abstraction for remote calls.

use crate::config::BackendConfig;
use crate::error::{SyncError, SyncResult};
use shopsync_codec::Value;
use std::sync::Arc;

/// A remote transport performs synchronous remote procedure calls.
///
/// This trait abstracts the wire protocol and authentication, allowing for
/// different implementations (XML-RPC, fakes for testing, etc.).
///
/// Application faults are reported as [`SyncError::RemoteFault`],
/// connection problems as [`SyncError::Transport`].
pub trait RemoteTransport: Send + Sync {
    /// Calls a remote method.
    fn call(&self, method: &str, params: Vec<Value>) -> SyncResult<Value>;
}

/// Opens the transport of a backend.
pub trait TransportProvider: Send + Sync {
    /// Returns a transport connected to `backend`.
    fn connect(&self, backend: &BackendConfig) -> SyncResult<Arc<dyn RemoteTransport>>;
}

impl<F> TransportProvider for F
where
    F: Fn(&BackendConfig) -> SyncResult<Arc<dyn RemoteTransport>> + Send + Sync,
{
    fn connect(&self, backend: &BackendConfig) -> SyncResult<Arc<dyn RemoteTransport>> {
        self(backend)
    }
}

/// A provider handing out the same transport for every backend.
#[derive(Clone)]
pub struct SharedTransport {
    transport: Arc<dyn RemoteTransport>,
}

impl SharedTransport {
    /// Creates a provider for `transport`.
    pub fn new(transport: Arc<dyn RemoteTransport>) -> Self {
        Self { transport }
    }
}

impl TransportProvider for SharedTransport {
    fn connect(&self, _backend: &BackendConfig) -> SyncResult<Arc<dyn RemoteTransport>> {
        Ok(self.transport.clone())
    }
}

/// A transport that is never connected.
#[derive(Debug, Default, Clone, Copy)]
pub struct Disconnected;

impl RemoteTransport for Disconnected {
    fn call(&self, method: &str, _params: Vec<Value>) -> SyncResult<Value> {
        Err(SyncError::transport(format!("not connected, cannot call {}", method)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BackendId, BackendKind};

    #[test]
    fn disconnected_is_retryable() {
        let err = Disconnected.call("catalog_product.info", vec![]).unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("catalog_product.info"));
    }

    #[test]
    fn closure_provider() {
        let provider = |backend: &BackendConfig| -> SyncResult<Arc<dyn RemoteTransport>> {
            if backend.location.starts_with("http") {
                Ok(Arc::new(Disconnected))
            } else {
                Err(SyncError::Config("bad location".into()))
            }
        };
        let good = BackendConfig::new(BackendId::new(1), BackendKind::new("magento"), "http://x");
        let bad = BackendConfig::new(BackendId::new(2), BackendKind::new("magento"), "ftp://x");
        assert!(provider.connect(&good).is_ok());
        assert!(provider.connect(&bad).is_err());
    }
}

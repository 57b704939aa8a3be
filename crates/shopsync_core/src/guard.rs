//! Cycle detection for in-line dependency synchronization.

use crate::error::{SyncError, SyncResult};
use std::cell::RefCell;
use std::collections::BTreeSet;

/// Tracks the records currently being synchronized by one job.
///
/// Dependency imports and exports recurse in-line; entering a record that
/// is already in progress means the dependency chain loops.
#[derive(Debug, Default)]
pub struct SyncGuard {
    in_progress: RefCell<BTreeSet<(String, String)>>,
}

impl SyncGuard {
    /// Creates an empty guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `(model, key)` as in progress until the entry is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::DependencyCycle`] if it is already in progress.
    pub fn enter(&self, model: &str, key: impl Into<String>) -> SyncResult<GuardEntry<'_>> {
        let key = (model.to_string(), key.into());
        if !self.in_progress.borrow_mut().insert(key.clone()) {
            return Err(SyncError::DependencyCycle {
                model: key.0,
                key: key.1,
            });
        }
        Ok(GuardEntry { guard: self, key })
    }

    /// Number of records in progress.
    pub fn depth(&self) -> usize {
        self.in_progress.borrow().len()
    }
}

/// Releases its record when dropped.
#[derive(Debug)]
pub struct GuardEntry<'g> {
    guard: &'g SyncGuard,
    key: (String, String),
}

impl Drop for GuardEntry<'_> {
    fn drop(&mut self) {
        self.guard.in_progress.borrow_mut().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reentry_is_a_cycle() {
        let guard = SyncGuard::new();
        let _outer = guard.enter("magento.product.category", "import 1").unwrap();
        let _inner = guard.enter("magento.product.category", "import 2").unwrap();
        let err = guard.enter("magento.product.category", "import 1").unwrap_err();
        assert!(matches!(err, SyncError::DependencyCycle { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn entries_release_on_drop() {
        let guard = SyncGuard::new();
        {
            let _entry = guard.enter("m", "1").unwrap();
            assert_eq!(guard.depth(), 1);
        }
        assert_eq!(guard.depth(), 0);
        assert!(guard.enter("m", "1").is_ok());
    }
}

//! Delete synchronizer.

use crate::environment::Environment;
use crate::error::{SyncError, SyncResult};
use crate::state::SyncOutcome;
use crate::types::RemoteId;
use tracing::info;

/// Deletes remote records of the model of an environment.
///
/// Works on remote ids only: by the time it runs, the local binding is
/// usually gone.
pub struct DeleteSynchronizer<'e, 'r> {
    env: &'e Environment<'r>,
}

impl<'e, 'r> DeleteSynchronizer<'e, 'r> {
    /// Creates a delete synchronizer.
    pub fn new(env: &'e Environment<'r>) -> Self {
        Self { env }
    }

    /// Deletes `remote_id` on the backend.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Unsupported`] if the model does not allow
    /// deletion, and propagates adapter errors.
    pub fn run(&self, remote_id: &RemoteId) -> SyncResult<SyncOutcome> {
        let env = self.env;
        if !env.connector()?.deleter {
            return Err(SyncError::unsupported(env.model(), "delete"));
        }
        env.adapter()?.delete(remote_id)?;
        info!(model = env.model(), remote = %remote_id, "deleted");
        Ok(SyncOutcome::Done(format!(
            "Record {} deleted on {}",
            remote_id,
            env.backend().kind.label()
        )))
    }
}

//! Synchronizer state machines and outcomes.

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a synchronization did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A skip hook vetoed the export.
    Vetoed,
    /// The mapping produced nothing to send.
    NothingToDo,
    /// The local record is at least as recent as the remote one.
    UpToDate,
}

/// Successful result of a synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The synchronization ran; the message is for operators.
    Done(String),
    /// The synchronization intentionally did nothing.
    Skipped(SkipReason),
}

impl SyncOutcome {
    /// Returns true for a skip.
    pub fn is_skipped(&self) -> bool {
        matches!(self, SyncOutcome::Skipped(_))
    }

    /// Operator message.
    pub fn message(&self) -> String {
        match self {
            SyncOutcome::Done(message) => message.clone(),
            SyncOutcome::Skipped(SkipReason::Vetoed) => "Skipped".to_string(),
            SyncOutcome::Skipped(SkipReason::NothingToDo) => "Nothing to do".to_string(),
            SyncOutcome::Skipped(SkipReason::UpToDate) => "Already up-to-date.".to_string(),
        }
    }
}

/// A synchronizer state.
pub trait Stage: Copy + PartialEq + fmt::Debug {
    /// Initial state.
    const INITIAL: Self;
    /// Failure state, reachable from every non-terminal state.
    const FAILED: Self;

    /// Returns true if `next` may follow `self`.
    fn can_transition_to(&self, next: Self) -> bool;

    /// Returns true for terminal states.
    fn is_terminal(&self) -> bool;
}

/// States of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportState {
    /// Nothing done yet.
    Init,
    /// Dependencies are exported.
    DepsExported,
    /// Data is mapped.
    Mapped,
    /// Data is validated.
    Validated,
    /// The remote record was created.
    Created,
    /// The remote record was updated.
    Updated,
    /// The binding holds the remote id.
    Bound,
    /// Finished.
    Done,
    /// Intentionally nothing done.
    Skipped,
    /// Failed.
    Failed,
}

impl Stage for ExportState {
    const INITIAL: Self = ExportState::Init;
    const FAILED: Self = ExportState::Failed;

    fn can_transition_to(&self, next: Self) -> bool {
        use ExportState::*;
        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Init, Skipped)
                | (Init, DepsExported)
                | (DepsExported, Mapped)
                | (Mapped, Skipped)
                | (Mapped, Validated)
                | (Validated, Created)
                | (Validated, Updated)
                | (Created, Bound)
                | (Updated, Bound)
                | (Bound, Done)
        )
    }

    fn is_terminal(&self) -> bool {
        matches!(self, ExportState::Done | ExportState::Skipped | ExportState::Failed)
    }
}

/// States of an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportState {
    /// Nothing done yet.
    Init,
    /// The remote record is fetched.
    Fetched,
    /// Dependencies are imported.
    DepsImported,
    /// Data is mapped.
    Mapped,
    /// Data is validated.
    Validated,
    /// The local record was created.
    Created,
    /// The local record was updated.
    Updated,
    /// The binding holds the remote id.
    Bound,
    /// After-import steps ran.
    AfterImport,
    /// Finished.
    Done,
    /// The local record is already up to date.
    Skipped,
    /// Failed.
    Failed,
}

impl Stage for ImportState {
    const INITIAL: Self = ImportState::Init;
    const FAILED: Self = ImportState::Failed;

    fn can_transition_to(&self, next: Self) -> bool {
        use ImportState::*;
        if next == Failed {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Init, Fetched)
                | (Fetched, Skipped)
                | (Fetched, DepsImported)
                | (DepsImported, Mapped)
                | (Mapped, Validated)
                | (Validated, Created)
                | (Validated, Updated)
                | (Created, Bound)
                | (Updated, Bound)
                | (Bound, AfterImport)
                | (AfterImport, Done)
        )
    }

    fn is_terminal(&self) -> bool {
        matches!(self, ImportState::Done | ImportState::Skipped | ImportState::Failed)
    }
}

/// The current state of a synchronizer and the states it went through.
#[derive(Debug, Clone)]
pub struct StateTrail<S: Stage> {
    trail: Vec<S>,
}

impl<S: Stage> StateTrail<S> {
    /// Starts in the initial state.
    pub fn new() -> Self {
        Self {
            trail: vec![S::INITIAL],
        }
    }

    /// Current state.
    pub fn current(&self) -> S {
        self.trail.last().copied().unwrap_or(S::INITIAL)
    }

    /// All states, oldest first.
    pub fn history(&self) -> &[S] {
        &self.trail
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidStateTransition`] if `next` may not
    /// follow the current state.
    pub fn advance(&mut self, next: S) -> SyncResult<()> {
        let current = self.current();
        if !current.can_transition_to(next) {
            return Err(SyncError::InvalidStateTransition {
                from: format!("{:?}", current),
                to: format!("{:?}", next),
            });
        }
        self.trail.push(next);
        Ok(())
    }

    /// Marks the run as failed unless it already ended.
    pub fn fail(&mut self) {
        if !self.current().is_terminal() {
            self.trail.push(S::FAILED);
        }
    }
}

impl<S: Stage> Default for StateTrail<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_happy_path() {
        let mut trail = StateTrail::<ExportState>::new();
        for state in [
            ExportState::DepsExported,
            ExportState::Mapped,
            ExportState::Validated,
            ExportState::Created,
            ExportState::Bound,
            ExportState::Done,
        ] {
            trail.advance(state).unwrap();
        }
        assert_eq!(trail.current(), ExportState::Done);
        assert_eq!(trail.history().len(), 7);
    }

    #[test]
    fn export_cannot_skip_mapping() {
        let mut trail = StateTrail::<ExportState>::new();
        trail.advance(ExportState::DepsExported).unwrap();
        let err = trail.advance(ExportState::Created).unwrap_err();
        assert!(matches!(err, SyncError::InvalidStateTransition { .. }));
        assert_eq!(trail.current(), ExportState::DepsExported);
    }

    #[test]
    fn terminal_states_are_final() {
        let mut trail = StateTrail::<ExportState>::new();
        trail.advance(ExportState::Skipped).unwrap();
        assert!(trail.advance(ExportState::Failed).is_err());
        trail.fail();
        assert_eq!(trail.current(), ExportState::Skipped);
    }

    #[test]
    fn import_update_path() {
        let mut trail = StateTrail::<ImportState>::new();
        for state in [
            ImportState::Fetched,
            ImportState::DepsImported,
            ImportState::Mapped,
            ImportState::Validated,
            ImportState::Updated,
            ImportState::Bound,
            ImportState::AfterImport,
            ImportState::Done,
        ] {
            trail.advance(state).unwrap();
        }
        assert!(trail.current().is_terminal());
    }

    #[test]
    fn failure_from_any_running_state() {
        let mut trail = StateTrail::<ImportState>::new();
        trail.advance(ImportState::Fetched).unwrap();
        trail.fail();
        assert_eq!(trail.current(), ImportState::Failed);
    }

    #[test]
    fn outcome_messages() {
        assert!(SyncOutcome::Skipped(SkipReason::Vetoed).is_skipped());
        assert_eq!(SyncOutcome::Done("ok".into()).message(), "ok");
    }
}

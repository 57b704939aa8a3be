//! Session context handed to synchronizers and consumers.

use serde::{Deserialize, Serialize};

/// Actor identity and locale of a synchronization call.
///
/// Travels inside every job request so the job runs with the context of
/// the event that enqueued it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Local user id of the actor.
    pub uid: u64,
    /// Language of the actor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    /// When set, create and write events enqueue no export.
    #[serde(default)]
    pub no_export: bool,
}

impl SessionContext {
    /// Creates a context for a user.
    pub fn new(uid: u64) -> Self {
        Self {
            uid,
            ..Self::default()
        }
    }

    /// Sets the language.
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = Some(lang.into());
        self
    }

    /// Sets the no-export flag.
    pub fn with_no_export(mut self, no_export: bool) -> Self {
        self.no_export = no_export;
        self
    }
}

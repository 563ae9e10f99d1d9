//! Per-client credential storage.

use crate::types::SessionToken;

/// Storage scoped to a single client.
///
/// Holds the session credential and a one-shot error message that survives
/// one redirect. Implementations never share entries between clients.
///
/// # Example
///
/// ```rust,ignore
/// let mut session = MemorySession::default();
/// session.push_error("Error authenticating token");
/// assert_eq!(session.pop_error().as_deref(), Some("Error authenticating token"));
/// assert_eq!(session.pop_error(), None);
/// ```
pub trait SessionStore: Send {
    fn get(&self) -> Option<SessionToken>;

    fn set(&mut self, token: SessionToken);

    /// Remove the credential. Clearing an empty store is a no-op.
    fn clear(&mut self);

    /// Leave a message for the next page this client renders.
    fn push_error(&mut self, message: String);

    /// Take the pending message, removing it in the same step.
    fn pop_error(&mut self) -> Option<String>;
}

/// In-memory store for a single client.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    credential: Option<SessionToken>,
    error: Option<String>,
}

impl MemorySession {
    #[must_use]
    pub fn with_credential(token: SessionToken) -> Self {
        Self {
            credential: Some(token),
            error: None,
        }
    }
}

impl SessionStore for MemorySession {
    fn get(&self) -> Option<SessionToken> {
        self.credential.clone()
    }

    fn set(&mut self, token: SessionToken) {
        self.credential = Some(token);
    }

    fn clear(&mut self) {
        self.credential = None;
    }

    fn push_error(&mut self, message: String) {
        self.error = Some(message);
    }

    fn pop_error(&mut self) -> Option<String> {
        self.error.take()
    }
}

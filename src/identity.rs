//! Contract with the passwordless identity service.

use std::future::Future;

use crate::error::Error;
use crate::types::{SessionToken, UserId};
use crate::user::{TrustedMetadata, User};

/// Result of a login-or-create link request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRequested {
    pub user_id: UserId,
    /// Whether the identity service created a new user for this email.
    pub user_created: bool,
}

/// A live session at the identity service.
#[derive(Debug, Clone)]
pub struct AuthenticatedSession {
    /// Credential to keep for the client; may differ from the one presented.
    pub session_token: SessionToken,
    pub user: User,
}

/// Passwordless identity service.
///
/// The service is the only source of truth for whether a credential is
/// live, so [`validate`](IdentityGateway::validate) is called on every
/// request that needs a user and its answer is never cached.
///
/// # Example
///
/// ```rust,ignore
/// impl IdentityGateway for MyGateway {
///     async fn request_link(&self, email: &str) -> Result<LinkRequested, Error> {
///         self.api.login_or_create(email).await
///     }
///     // ...
/// }
/// ```
pub trait IdentityGateway: Send + Sync + 'static {
    /// Send a login-or-signup link to `email`.
    ///
    /// Logs in an existing identity or creates one; there is no separate
    /// signup call. Any non-success answer is an error.
    fn request_link(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<LinkRequested, Error>> + Send;

    /// Redeem a one-time link token for a session.
    ///
    /// `existing` is a credential the client still holds; the service may
    /// extend it instead of minting a new one.
    fn exchange_link(
        &self,
        token: &str,
        existing: Option<&SessionToken>,
    ) -> impl Future<Output = Result<AuthenticatedSession, Error>> + Send;

    /// Check that `session` is live and return its user.
    fn validate(
        &self,
        session: &SessionToken,
    ) -> impl Future<Output = Result<AuthenticatedSession, Error>> + Send;

    /// Replace the trusted metadata stored for `user_id`.
    fn update_trusted_metadata(
        &self,
        user_id: &UserId,
        metadata: &TrustedMetadata,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

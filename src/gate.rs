//! The per-request gate: session → user → authorization → outcome.
//!
//! Nothing here survives a request except what is written to the
//! [`SessionStore`]. Every request revalidates the credential with the
//! identity service and asks the policy engine again, so revocations and
//! role changes apply immediately.

use std::sync::Arc;

use crate::authz::{
    AuthorizationQuery, DecisionSet, DeniedPair, PolicyEngine, Principal, QueryProfile,
};
use crate::catalog::ResourceCatalog;
use crate::error::Error;
use crate::identity::IdentityGateway;
use crate::profile::push_role;
use crate::session::SessionStore;
use crate::types::UserId;
use crate::user::User;

/// Where a client stands after a gate operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Stage {
    #[display("anonymous")]
    Anonymous,
    #[display("link_requested")]
    LinkRequested,
    #[display("authenticating")]
    Authenticating,
    #[display("authenticated")]
    Authenticated,
    #[display("authorizing")]
    Authorizing,
    #[display("granted")]
    Granted,
    #[display("denied")]
    Denied,
    #[display("logged_out")]
    LoggedOut,
}

/// What to do when the policy engine gives no answer at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PolicyFailureMode {
    /// Drop the credential, same as an explicit denial.
    #[default]
    ForceReauth,
    /// Keep the credential and report the engine as unavailable.
    Degrade,
}

/// Messages shown to the user. None of them say which part of a token or
/// credential was wrong.
pub mod messages {
    pub const MISSING_INPUT: &str = "Email and role are required";
    pub const LINK_REQUEST_FAILED: &str = "Something went wrong sending magic link";
    pub const LINK_EXCHANGE_FAILED: &str = "Error authenticating token";
    pub const SESSION_INVALID: &str = "Session token invalid";
    pub const UNAUTHORIZED: &str = "Unauthorized";
    pub const AUTHORIZATION_UNAVAILABLE: &str =
        "Authorization is temporarily unavailable, please try again";
}

/// Gate failures, each naming the stage it leaves the client in.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("missing form field: {0}")]
    MissingInput(&'static str),

    #[error("link request failed: {0}")]
    LinkRequest(#[source] Error),

    #[error("link callback without token")]
    MissingLinkToken,

    #[error("link exchange failed: {0}")]
    LinkExchange(#[source] Error),

    #[error("no session credential")]
    Unauthenticated,

    #[error("session credential rejected: {0}")]
    SessionInvalid(#[source] Error),

    #[error("resource catalog unavailable: {0}")]
    Catalog(#[source] Error),

    #[error("policy engine denied {} pair(s)", denied.len())]
    Denied { denied: Vec<DeniedPair> },

    #[error("policy engine unavailable: {reason}")]
    PolicyUnavailable {
        reason: String,
        credential_cleared: bool,
    },
}

impl GateError {
    /// The stage the client is left in.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::MissingInput(_)
            | Self::LinkRequest(_)
            | Self::Unauthenticated
            | Self::SessionInvalid(_) => Stage::Anonymous,
            Self::MissingLinkToken | Self::LinkExchange(_) => Stage::LoggedOut,
            Self::Catalog(_) => Stage::Authenticated,
            Self::Denied { .. } => Stage::Denied,
            Self::PolicyUnavailable {
                credential_cleared: true,
                ..
            } => Stage::LoggedOut,
            Self::PolicyUnavailable { .. } => Stage::Authenticated,
        }
    }

    /// Whether the stored credential was dropped.
    #[must_use]
    pub fn credential_cleared(&self) -> bool {
        match self {
            Self::MissingLinkToken
            | Self::LinkExchange(_)
            | Self::SessionInvalid(_)
            | Self::Denied { .. } => true,
            Self::PolicyUnavailable {
                credential_cleared, ..
            } => *credential_cleared,
            _ => false,
        }
    }

    /// Message safe to show the end user.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingInput(_) => messages::MISSING_INPUT,
            Self::LinkRequest(_) => messages::LINK_REQUEST_FAILED,
            Self::MissingLinkToken | Self::LinkExchange(_) => messages::LINK_EXCHANGE_FAILED,
            Self::Unauthenticated | Self::SessionInvalid(_) => messages::SESSION_INVALID,
            Self::Denied { .. } => messages::UNAUTHORIZED,
            Self::PolicyUnavailable {
                credential_cleared: true,
                ..
            } => messages::UNAUTHORIZED,
            Self::Catalog(_) | Self::PolicyUnavailable { .. } => {
                messages::AUTHORIZATION_UNAVAILABLE
            }
        }
    }
}

/// What the landing page should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Landing {
    /// A credential is stored; continue to the resource view.
    Resume,
    /// Show the login form, with the pending error if there was one.
    Anonymous { error: Option<String> },
}

/// A link was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSent {
    pub user_id: UserId,
    pub user_created: bool,
}

/// Successful authorization, with the query and answer for display.
#[derive(Debug, Clone)]
pub struct Granted {
    pub user: User,
    pub query: AuthorizationQuery,
    pub decision: DecisionSet,
}

/// Ties identity, catalog and policy engine into the request state machine.
pub struct RequestGate<I, P, C> {
    identity: Arc<I>,
    policy: Arc<P>,
    catalog: Arc<C>,
    profile: QueryProfile,
    failure_mode: PolicyFailureMode,
}

// Manual Clone: avoid derive adding `I: Clone, P: Clone, C: Clone` bounds.
impl<I, P, C> Clone for RequestGate<I, P, C> {
    fn clone(&self) -> Self {
        Self {
            identity: self.identity.clone(),
            policy: self.policy.clone(),
            catalog: self.catalog.clone(),
            profile: self.profile.clone(),
            failure_mode: self.failure_mode,
        }
    }
}

impl<I, P, C> RequestGate<I, P, C>
where
    I: IdentityGateway,
    P: PolicyEngine,
    C: ResourceCatalog,
{
    #[must_use]
    pub fn new(identity: I, policy: P, catalog: C) -> Self {
        Self {
            identity: Arc::new(identity),
            policy: Arc::new(policy),
            catalog: Arc::new(catalog),
            profile: QueryProfile::default(),
            failure_mode: PolicyFailureMode::default(),
        }
    }

    #[must_use]
    pub fn with_profile(mut self, profile: QueryProfile) -> Self {
        self.profile = profile;
        self
    }

    #[must_use]
    pub fn with_failure_mode(mut self, mode: PolicyFailureMode) -> Self {
        self.failure_mode = mode;
        self
    }

    #[must_use]
    pub fn identity(&self) -> &I {
        &self.identity
    }

    #[must_use]
    pub fn profile(&self) -> &QueryProfile {
        &self.profile
    }

    #[must_use]
    pub fn failure_mode(&self) -> PolicyFailureMode {
        self.failure_mode
    }

    /// Landing page: resume a stored session or show the login form.
    ///
    /// The credential is not validated here; the resource view does that.
    pub fn landing<S: SessionStore>(&self, session: &mut S) -> Landing {
        if session.get().is_some() {
            return Landing::Resume;
        }
        Landing::Anonymous {
            error: session.pop_error(),
        }
    }

    /// `Anonymous → LinkRequested`.
    ///
    /// Sends the link, then records `role` on a best-effort basis. A failed
    /// role update never fails the request.
    ///
    /// # Errors
    ///
    /// [`GateError::MissingInput`] for a blank field, [`GateError::LinkRequest`]
    /// if the identity service refuses.
    pub async fn request_link(&self, email: &str, role: &str) -> Result<LinkSent, GateError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(GateError::MissingInput("email"));
        }
        if role.trim().is_empty() {
            return Err(GateError::MissingInput("role"));
        }

        let requested = self.identity.request_link(email).await.map_err(|e| {
            tracing::error!(error = %e, "Magic link request failed");
            GateError::LinkRequest(e)
        })?;

        push_role(self.identity.as_ref(), &requested.user_id, role).await;

        tracing::info!(
            user_id = %requested.user_id,
            user_created = requested.user_created,
            "Magic link sent"
        );
        Ok(LinkSent {
            user_id: requested.user_id,
            user_created: requested.user_created,
        })
    }

    /// `LinkRequested → Authenticating → Authenticated`.
    ///
    /// Any stored credential is handed to the identity service to refresh.
    /// On failure the credential is dropped and the error is left in the
    /// one-shot slot for the next page.
    ///
    /// # Errors
    ///
    /// [`GateError::MissingLinkToken`] or [`GateError::LinkExchange`].
    pub async fn complete_link<S: SessionStore>(
        &self,
        session: &mut S,
        token: Option<&str>,
    ) -> Result<User, GateError> {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            tracing::warn!("Link callback without token");
            return Err(Self::abandon_link(session, GateError::MissingLinkToken));
        };

        let existing = session.get();
        tracing::debug!(
            stage = %Stage::Authenticating,
            refresh = existing.is_some(),
            "Exchanging link token"
        );

        match self.identity.exchange_link(token, existing.as_ref()).await {
            Ok(authenticated) => {
                session.set(authenticated.session_token);
                tracing::info!(user_id = %authenticated.user.user_id, "Link login successful");
                Ok(authenticated.user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Link token exchange failed");
                Err(Self::abandon_link(session, GateError::LinkExchange(e)))
            }
        }
    }

    fn abandon_link<S: SessionStore>(session: &mut S, error: GateError) -> GateError {
        session.clear();
        session.push_error(error.user_message().to_string());
        error
    }

    /// Stored credential `→ Authenticated`.
    ///
    /// Stores the credential the identity service returns, which may be a
    /// rotated one, so the idle timer restarts on every request.
    ///
    /// # Errors
    ///
    /// [`GateError::Unauthenticated`] with no credential,
    /// [`GateError::SessionInvalid`] (credential dropped) if it was rejected.
    pub async fn authenticate<S: SessionStore>(&self, session: &mut S) -> Result<User, GateError> {
        let Some(token) = session.get() else {
            return Err(GateError::Unauthenticated);
        };

        match self.identity.validate(&token).await {
            Ok(authenticated) => {
                session.set(authenticated.session_token);
                Ok(authenticated.user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session validation failed");
                session.clear();
                Err(GateError::SessionInvalid(e))
            }
        }
    }

    /// `Authenticated → Authorizing → Granted | Denied`.
    ///
    /// An explicit denial always drops the credential. An engine failure
    /// does so only under [`PolicyFailureMode::ForceReauth`].
    ///
    /// # Errors
    ///
    /// [`GateError::Denied`], [`GateError::PolicyUnavailable`] or
    /// [`GateError::Catalog`].
    pub async fn authorize<S: SessionStore>(
        &self,
        session: &mut S,
        user: User,
    ) -> Result<Granted, GateError> {
        let principal = Principal::from_user(&user, &self.profile);
        let resources = self
            .catalog
            .list_accessible_candidates(&principal)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user.user_id, error = %e, "Resource catalog failed");
                GateError::Catalog(e)
            })?;
        let query = AuthorizationQuery::new(principal, resources, &self.profile.actions);

        tracing::debug!(
            stage = %Stage::Authorizing,
            user_id = %user.user_id,
            pairs = query.pairs().count(),
            "Checking resources"
        );

        let decision = match self.policy.check(&query).await {
            Ok(decision) => decision,
            Err(e) => {
                let credential_cleared = self.failure_mode == PolicyFailureMode::ForceReauth;
                tracing::error!(
                    user_id = %user.user_id,
                    error = %e,
                    credential_cleared,
                    "Policy engine unavailable"
                );
                if credential_cleared {
                    session.clear();
                }
                return Err(GateError::PolicyUnavailable {
                    reason: e.to_string(),
                    credential_cleared,
                });
            }
        };

        if !decision.overall_ok(&query) {
            let denied = decision.denied_pairs(&query);
            let listed = denied
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                user_id = %user.user_id,
                denied = %listed,
                validation_failed = decision.has_validation_errors(),
                "Policy engine denied access"
            );
            session.clear();
            return Err(GateError::Denied { denied });
        }

        tracing::info!(user_id = %user.user_id, "Access granted");
        Ok(Granted {
            user,
            query,
            decision,
        })
    }

    /// Resource view: authenticate, then authorize.
    ///
    /// # Errors
    ///
    /// Any error from [`authenticate`](Self::authenticate) or
    /// [`authorize`](Self::authorize).
    pub async fn view<S: SessionStore>(&self, session: &mut S) -> Result<Granted, GateError> {
        let user = self.authenticate(session).await?;
        self.authorize(session, user).await
    }

    /// Any stage `→ LoggedOut`. No identity service call.
    pub fn logout<S: SessionStore>(&self, session: &mut S) -> Stage {
        session.clear();
        Stage::LoggedOut
    }
}

//! In-memory identity service and policy engine for tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::authz::{
    AuthorizationQuery, DecisionSet, Effect, PolicyEngine, PolicyError, ResourceDecision,
};
use crate::error::Error;
use crate::identity::{AuthenticatedSession, IdentityGateway, LinkRequested};
use crate::types::{SessionToken, UserId};
use crate::user::{TrustedMetadata, User};

fn rejected(operation: &'static str) -> Error {
    Error::Provider {
        operation,
        status: Some(401),
        detail: "unauthorized".into(),
    }
}

/// Identity service double. Link tokens are registered up front; sessions
/// are minted on exchange and live until revoked.
#[derive(Default)]
pub(crate) struct MockGateway {
    links: HashMap<String, User>,
    sessions: Mutex<HashMap<String, User>>,
    pushed: Mutex<Vec<(UserId, TrustedMetadata)>>,
    minted: AtomicUsize,
    link_requests: AtomicUsize,
    exchanges: AtomicUsize,
    fail_link_request: bool,
    fail_role_push: bool,
    rotate: bool,
}

impl MockGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_link(mut self, token: &str, user: User) -> Self {
        self.links.insert(token.to_string(), user);
        self
    }

    pub(crate) fn failing_link_request(mut self) -> Self {
        self.fail_link_request = true;
        self
    }

    pub(crate) fn failing_role_push(mut self) -> Self {
        self.fail_role_push = true;
        self
    }

    /// Every successful validation returns a fresh credential.
    pub(crate) fn rotating_sessions(mut self) -> Self {
        self.rotate = true;
        self
    }

    pub(crate) fn pushed_roles(&self) -> Vec<(UserId, TrustedMetadata)> {
        self.pushed.lock().unwrap().clone()
    }

    pub(crate) fn link_requests(&self) -> usize {
        self.link_requests.load(Ordering::SeqCst)
    }

    pub(crate) fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    fn mint(&self, user: &User) -> SessionToken {
        let n = self.minted.fetch_add(1, Ordering::SeqCst);
        let raw = format!("sess-{}-{n}", user.user_id);
        self.sessions
            .lock()
            .unwrap()
            .insert(raw.clone(), user.clone());
        SessionToken::new(raw)
    }

    fn live_user(&self, token: &SessionToken) -> Option<User> {
        self.sessions.lock().unwrap().get(token.expose()).cloned()
    }
}

impl IdentityGateway for MockGateway {
    async fn request_link(&self, email: &str) -> Result<LinkRequested, Error> {
        self.link_requests.fetch_add(1, Ordering::SeqCst);
        if self.fail_link_request {
            return Err(Error::Provider {
                operation: "magic link request",
                status: Some(500),
                detail: "internal".into(),
            });
        }
        Ok(LinkRequested {
            user_id: UserId::from(format!("user-{email}")),
            user_created: true,
        })
    }

    async fn exchange_link(
        &self,
        token: &str,
        existing: Option<&SessionToken>,
    ) -> Result<AuthenticatedSession, Error> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        let user = self
            .links
            .get(token)
            .cloned()
            .ok_or_else(|| rejected("magic link authenticate"))?;

        let session_token = match existing {
            Some(t) if self.live_user(t).is_some() => t.clone(),
            _ => self.mint(&user),
        };
        Ok(AuthenticatedSession {
            session_token,
            user,
        })
    }

    async fn validate(&self, session: &SessionToken) -> Result<AuthenticatedSession, Error> {
        let user = self
            .live_user(session)
            .ok_or_else(|| rejected("session authenticate"))?;

        let session_token = if self.rotate {
            self.sessions.lock().unwrap().remove(session.expose());
            self.mint(&user)
        } else {
            session.clone()
        };
        Ok(AuthenticatedSession {
            session_token,
            user,
        })
    }

    async fn update_trusted_metadata(
        &self,
        user_id: &UserId,
        metadata: &TrustedMetadata,
    ) -> Result<(), Error> {
        if self.fail_role_push {
            return Err(rejected("user update"));
        }
        self.pushed
            .lock()
            .unwrap()
            .push((user_id.clone(), metadata.clone()));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum PolicyBehaviour {
    AllowAll,
    OwnerOnly,
    Unreachable,
}

/// Policy engine double.
pub(crate) struct MockPolicy {
    behaviour: PolicyBehaviour,
}

impl MockPolicy {
    pub(crate) fn allow_all() -> Self {
        Self {
            behaviour: PolicyBehaviour::AllowAll,
        }
    }

    /// Allows every action on resources whose `owner` is the principal.
    pub(crate) fn owner_only() -> Self {
        Self {
            behaviour: PolicyBehaviour::OwnerOnly,
        }
    }

    pub(crate) fn unreachable() -> Self {
        Self {
            behaviour: PolicyBehaviour::Unreachable,
        }
    }
}

impl PolicyEngine for MockPolicy {
    async fn check(&self, query: &AuthorizationQuery) -> Result<DecisionSet, PolicyError> {
        if let PolicyBehaviour::Unreachable = self.behaviour {
            return Err(PolicyError::Unreachable("connection refused".into()));
        }

        let results = query
            .resource_actions
            .iter()
            .map(|ra| {
                let owned = ra.resource.attributes.get("owner") == Some(&query.principal.id);
                let effect = match self.behaviour {
                    PolicyBehaviour::OwnerOnly if !owned => Effect::Deny,
                    _ => Effect::Allow,
                };
                ResourceDecision {
                    resource_id: ra.resource.id.clone(),
                    kind: ra.resource.kind.clone(),
                    actions: ra.actions.iter().map(|a| (a.clone(), effect)).collect(),
                    validation_errors: Vec::new(),
                }
            })
            .collect();

        Ok(DecisionSet {
            request_id: Some("mock-request".into()),
            results,
        })
    }
}

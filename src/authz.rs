//! Authorization queries and the policy engine contract.
//!
//! The query types serialize to the shape the policy engine expects on the
//! wire, so the payload shown to the user is exactly what was checked.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::user::User;

/// Default policy version pinned on every principal.
pub const DEFAULT_POLICY_VERSION: &str = "20210210";

/// Actions checked on every resource unless overridden.
pub const DEFAULT_ACTIONS: [&str; 3] = ["read", "update", "delete"];

/// The authenticated actor in an authorization query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: String,
    pub roles: BTreeSet<String>,
    pub policy_version: String,
    #[serde(rename = "attr")]
    pub attributes: BTreeMap<String, String>,
}

impl Principal {
    /// Principal for `user`, carrying every role the user holds.
    #[must_use]
    pub fn from_user(user: &User, profile: &QueryProfile) -> Self {
        Self {
            id: user.user_id.to_string(),
            roles: user.roles().clone(),
            policy_version: profile.policy_version.clone(),
            attributes: profile.principal_attributes.clone(),
        }
    }
}

/// A catalog entry to be checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resource {
    pub id: String,
    pub kind: String,
    #[serde(rename = "attr")]
    pub attributes: BTreeMap<String, String>,
}

impl Resource {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// A resource together with every action requested on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceAction {
    pub actions: BTreeSet<String>,
    pub resource: Resource,
}

/// Principal plus resource/action pairs, built fresh for each request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthorizationQuery {
    pub principal: Principal,
    #[serde(rename = "resources")]
    pub resource_actions: Vec<ResourceAction>,
}

impl AuthorizationQuery {
    /// Pair every resource with the full action set.
    #[must_use]
    pub fn new(
        principal: Principal,
        resources: Vec<Resource>,
        actions: &BTreeSet<String>,
    ) -> Self {
        let resource_actions = resources
            .into_iter()
            .map(|resource| ResourceAction {
                actions: actions.clone(),
                resource,
            })
            .collect();
        Self {
            principal,
            resource_actions,
        }
    }

    /// Every (kind, resource id, action) triple in the query.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.resource_actions.iter().flat_map(|ra| {
            ra.actions.iter().map(move |action| {
                (
                    ra.resource.kind.as_str(),
                    ra.resource.id.as_str(),
                    action.as_str(),
                )
            })
        })
    }
}

/// Fixed parts of every query: policy version, principal attributes and the
/// action set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryProfile {
    pub policy_version: String,
    pub principal_attributes: BTreeMap<String, String>,
    pub actions: BTreeSet<String>,
}

impl Default for QueryProfile {
    fn default() -> Self {
        Self {
            policy_version: DEFAULT_POLICY_VERSION.into(),
            principal_attributes: BTreeMap::from([("foo".to_string(), "bar".to_string())]),
            actions: DEFAULT_ACTIONS.iter().map(|a| (*a).to_string()).collect(),
        }
    }
}

/// Build the query for `user` over `resources`.
///
/// Performs no authorization logic: roles, actions and resource attributes
/// are copied through as-is.
#[must_use]
pub fn build_query(
    user: &User,
    profile: &QueryProfile,
    resources: Vec<Resource>,
) -> AuthorizationQuery {
    AuthorizationQuery::new(
        Principal::from_user(user, profile),
        resources,
        &profile.actions,
    )
}

/// Verdict for one resource/action pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    #[serde(rename = "EFFECT_ALLOW")]
    Allow,
    #[serde(rename = "EFFECT_DENY")]
    Deny,
    /// Any effect the engine reports that is not an explicit allow or deny.
    #[serde(other, rename = "EFFECT_UNSPECIFIED")]
    Unspecified,
}

/// Engine verdicts for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDecision {
    pub resource_id: String,
    pub kind: String,
    pub actions: BTreeMap<String, Effect>,
    /// Attribute validation failures reported for this resource.
    pub validation_errors: Vec<String>,
}

/// Everything the policy engine answered for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionSet {
    pub request_id: Option<String>,
    pub results: Vec<ResourceDecision>,
}

/// A requested pair that was not explicitly allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeniedPair {
    pub kind: String,
    pub resource_id: String,
    pub action: String,
    /// `None` when the engine returned no verdict for the pair.
    pub effect: Option<Effect>,
}

impl std::fmt::Display for DeniedPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.effect {
            Some(effect) => write!(
                f,
                "{}/{}:{}={effect:?}",
                self.kind, self.resource_id, self.action
            ),
            None => write!(f, "{}/{}:{}=missing", self.kind, self.resource_id, self.action),
        }
    }
}

impl DecisionSet {
    /// Effect reported for `action` on the `kind` resource `resource_id`.
    ///
    /// Every result for that resource must allow the action. The first
    /// result that does not decides the answer; `None` means no verdict.
    #[must_use]
    pub fn effect(&self, kind: &str, resource_id: &str, action: &str) -> Option<Effect> {
        let mut effect = None;
        let matching = self
            .results
            .iter()
            .filter(|r| r.kind == kind && r.resource_id == resource_id);
        for result in matching {
            match result.actions.get(action).copied() {
                Some(Effect::Allow) => effect = Some(Effect::Allow),
                other => return other,
            }
        }
        effect
    }

    /// Whether the engine flagged any resource as failed validation.
    #[must_use]
    pub fn has_validation_errors(&self) -> bool {
        self.results.iter().any(|r| !r.validation_errors.is_empty())
    }

    /// Pairs from `query` that are denied, unspecified or missing.
    #[must_use]
    pub fn denied_pairs(&self, query: &AuthorizationQuery) -> Vec<DeniedPair> {
        query
            .pairs()
            .filter_map(|(kind, resource_id, action)| {
                let effect = self.effect(kind, resource_id, action);
                (effect != Some(Effect::Allow)).then(|| DeniedPair {
                    kind: kind.to_string(),
                    resource_id: resource_id.to_string(),
                    action: action.to_string(),
                    effect,
                })
            })
            .collect()
    }

    /// Access is granted only if every pair in `query` is explicitly
    /// allowed and no resource failed validation.
    #[must_use]
    pub fn overall_ok(&self, query: &AuthorizationQuery) -> bool {
        !self.has_validation_errors() && self.denied_pairs(query).is_empty()
    }
}

/// Why the policy engine produced no decision.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("policy engine unreachable: {0}")]
    Unreachable(String),
    #[error("policy engine error (status {status}): {detail}")]
    Engine { status: u16, detail: String },
    #[error("invalid policy engine response: {0}")]
    Decode(String),
}

/// External policy decision point.
///
/// An `Err` means no decision was made. A decision that denies is an `Ok`
/// whose [`DecisionSet::overall_ok`] is false.
pub trait PolicyEngine: Send + Sync + 'static {
    fn check(
        &self,
        query: &AuthorizationQuery,
    ) -> impl Future<Output = Result<DecisionSet, PolicyError>> + Send;
}

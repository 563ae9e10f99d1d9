//! Local view of the identity service's user record.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// Server-asserted attributes the client cannot assign to itself.
///
/// Written only through [`push_role`](crate::profile::push_role).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedMetadata {
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl TrustedMetadata {
    #[must_use]
    pub fn with_role(role: impl Into<String>) -> Self {
        let mut metadata = Self::default();
        metadata.roles.insert(role.into());
        metadata
    }
}

/// Authenticated user, rebuilt from the identity service on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub trusted_metadata: TrustedMetadata,
}

impl User {
    #[must_use]
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            trusted_metadata: TrustedMetadata::default(),
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.add_role(role);
        self
    }

    pub fn add_role(&mut self, role: impl Into<String>) {
        self.trusted_metadata.roles.insert(role.into());
    }

    #[must_use]
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.trusted_metadata.roles
    }
}

fn null_as_default<'de, D>(deserializer: D) -> Result<TrustedMetadata, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<TrustedMetadata>::deserialize(deserializer)?.unwrap_or_default())
}

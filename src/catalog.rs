//! Source of resources to check for a principal.

use std::future::Future;

use crate::authz::{Principal, Resource};
use crate::error::Error;

/// Read access to the resources a principal may want to see.
///
/// The gate only asks for candidates; whether the principal may act on them
/// is left to the policy engine.
pub trait ResourceCatalog: Send + Sync + 'static {
    fn list_accessible_candidates(
        &self,
        principal: &Principal,
    ) -> impl Future<Output = Result<Vec<Resource>, Error>> + Send;
}

/// Owner id used for the resource the requester does not own.
pub const OTHER_OWNER_ID: &str = "other_user_id";

/// Two demo contacts: `abc123` owned by the requester and `def456` owned by
/// someone else.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticCatalog;

impl ResourceCatalog for StaticCatalog {
    async fn list_accessible_candidates(
        &self,
        principal: &Principal,
    ) -> Result<Vec<Resource>, Error> {
        Ok(vec![
            Resource::new("abc123", "contact").with_attribute("owner", principal.id.clone()),
            Resource::new("def456", "contact").with_attribute("owner", OTHER_OWNER_ID),
        ])
    }
}

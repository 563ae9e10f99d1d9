//! Role propagation back to the identity service.

use crate::identity::IdentityGateway;
use crate::types::UserId;
use crate::user::TrustedMetadata;

/// Record `role` in the user's trusted metadata.
///
/// Best effort: a failed update is logged and dropped.
pub async fn push_role<I: IdentityGateway>(identity: &I, user_id: &UserId, role: &str) {
    let role = role.trim();
    if role.is_empty() {
        tracing::debug!(user_id = %user_id, "No role submitted, skipping role update");
        return;
    }

    let metadata = TrustedMetadata::with_role(role);
    match identity.update_trusted_metadata(user_id, &metadata).await {
        Ok(()) => tracing::info!(user_id = %user_id, role = %role, "Role recorded"),
        Err(e) => {
            tracing::warn!(user_id = %user_id, role = %role, error = %e, "Role update failed")
        }
    }
}

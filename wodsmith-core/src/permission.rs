//! Permission seam consulted before team-scoped writes.

use crate::enums::Permission;
use crate::error::WodsmithResult;
use crate::identity::TeamId;
use async_trait::async_trait;

/// Checks whether the current caller holds a permission on a team.
///
/// Implementations return `ScalingError::Forbidden` (wrapped in
/// [`WodsmithError`](crate::WodsmithError)) when the permission is missing.
#[async_trait]
pub trait PermissionService: Send + Sync {
    async fn require_permission(&self, team_id: TeamId, permission: Permission)
        -> WodsmithResult<()>;
}

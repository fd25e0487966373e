//! Copy-on-write ownership of competition divisions.
//!
//! A competition's divisions are the levels of the scaling group its
//! settings point at. That group may be a shared template, so before any
//! edit the competition gets a group of its own: a fresh one with the
//! default divisions when nothing is configured, or a copy of the template
//! otherwise.
//!
//! # Concurrency
//!
//! Claims for one competition are serialized by a per-competition mutex.
//! The repoint itself is a compare-and-swap on the settings pointer, so a
//! claim racing another process loses cleanly: its copy is deleted and the
//! ownership check runs again against the winner's pointer.

use crate::lock::CompetitionLocks;
use std::sync::Arc;
use wodsmith_core::{
    competition_group_title, Competition, CompetitionId, EntityIdType, EntityType, GroupId,
    Permission, PermissionService, ScalingConfig, ScalingError, ScalingGroup, TeamId,
    WodsmithResult, DEFAULT_DIVISIONS, DIVISIONS_TITLE_MARKER,
};
use wodsmith_storage::{LevelStore, NewLevelSpec, ScalingRepository};

/// Result of [`OwnershipGate::ensure_owned`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnsureOwned {
    pub scaling_group_id: GroupId,
    /// Whether a new group was created by this call.
    pub was_cloned: bool,
}

/// Division configuration state of a competition.
///
/// Derived from the settings pointer and the group it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DivisionState {
    /// No group configured.
    Unconfigured,
    /// Points at a group the competition does not own; the next edit copies it.
    Shared,
    /// Owns its group and nothing was edited since it was created.
    Initialized,
    /// Owns its group and it has been edited.
    Customized,
}

/// Whether `group` is the competition's own copy.
fn owns(competition: &Competition, group: &ScalingGroup) -> bool {
    competition.scaling_group_id() == Some(group.group_id)
        && group.is_owned_by(competition.organizing_team_id)
        && group.title.contains(DIVISIONS_TITLE_MARKER)
}

fn default_specs() -> Vec<NewLevelSpec> {
    DEFAULT_DIVISIONS
        .iter()
        .map(|(label, position)| NewLevelSpec {
            label: (*label).to_string(),
            position: *position,
            team_size: 1,
        })
        .collect()
}

/// Guards competition divisions so edits only ever touch a competition-owned group.
pub struct OwnershipGate {
    store: Arc<LevelStore>,
    repo: Arc<dyn ScalingRepository>,
    permissions: Arc<dyn PermissionService>,
    locks: CompetitionLocks,
    retry_limit: u32,
}

impl OwnershipGate {
    pub fn new(store: Arc<LevelStore>, config: &ScalingConfig) -> Self {
        Self {
            repo: store.repository().clone(),
            permissions: store.permissions().clone(),
            store,
            locks: CompetitionLocks::new(),
            retry_limit: config.clone_retry_limit,
        }
    }

    pub fn locks(&self) -> &CompetitionLocks {
        &self.locks
    }

    async fn competition(&self, competition_id: CompetitionId) -> WodsmithResult<Competition> {
        self.repo
            .competition_get(competition_id)
            .await?
            .ok_or_else(|| {
                ScalingError::not_found(EntityType::Competition, competition_id.as_uuid()).into()
            })
    }

    /// `ManageProgramming` on the team and the team organizes the competition.
    async fn authorize(
        &self,
        competition_id: CompetitionId,
        team_id: TeamId,
    ) -> WodsmithResult<Competition> {
        self.permissions
            .require_permission(team_id, Permission::ManageProgramming)
            .await?;
        let competition = self.competition(competition_id).await?;
        if competition.organizing_team_id != team_id {
            return Err(
                ScalingError::forbidden("Competition does not belong to this team").into(),
            );
        }
        Ok(competition)
    }

    /// Whether `group_id` is the competition's current, competition-owned group.
    ///
    /// A pure read; missing rows make it `false`.
    pub async fn is_owned(
        &self,
        competition_id: CompetitionId,
        group_id: GroupId,
    ) -> WodsmithResult<bool> {
        let Some(competition) = self.repo.competition_get(competition_id).await? else {
            return Ok(false);
        };
        if competition.scaling_group_id() != Some(group_id) {
            return Ok(false);
        }
        Ok(self
            .repo
            .group_get(group_id)
            .await?
            .is_some_and(|group| owns(&competition, &group)))
    }

    pub async fn division_state(
        &self,
        competition_id: CompetitionId,
    ) -> WodsmithResult<DivisionState> {
        let competition = self.competition(competition_id).await?;
        let Some(group_id) = competition.scaling_group_id() else {
            return Ok(DivisionState::Unconfigured);
        };
        let state = match self.repo.group_get(group_id).await? {
            Some(group) if owns(&competition, &group) => {
                if group.updated_at > group.created_at {
                    DivisionState::Customized
                } else {
                    DivisionState::Initialized
                }
            }
            _ => DivisionState::Shared,
        };
        Ok(state)
    }

    /// Make sure the competition edits a group of its own, creating one if needed.
    ///
    /// Returns the group unchanged (and writes nothing) when it is already
    /// owned.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_owned(
        &self,
        competition_id: CompetitionId,
        team_id: TeamId,
    ) -> WodsmithResult<EnsureOwned> {
        self.authorize(competition_id, team_id).await?;
        let guard = self.locks.acquire(competition_id).await;
        let result = self.claim(competition_id).await;
        drop(guard);
        self.locks.prune();
        result
    }

    async fn claim(&self, competition_id: CompetitionId) -> WodsmithResult<EnsureOwned> {
        for attempt in 1..=self.retry_limit {
            let competition = self.competition(competition_id).await?;
            let current = competition.scaling_group_id();

            let template = match current {
                Some(group_id) => {
                    let group = self.repo.group_get(group_id).await?;
                    if let Some(group) = group.as_ref().filter(|g| owns(&competition, g)) {
                        return Ok(EnsureOwned {
                            scaling_group_id: group.group_id,
                            was_cloned: false,
                        });
                    }
                    group
                }
                None => None,
            };

            let created = self
                .create_owned_group(&competition, current, template.as_ref())
                .await?;
            if self
                .repo
                .competition_swap_scaling_group(competition_id, current, created)
                .await?
            {
                tracing::info!(
                    competition_id = %competition_id,
                    group_id = %created,
                    template_id = ?current,
                    "Competition divisions claimed"
                );
                return Ok(EnsureOwned {
                    scaling_group_id: created,
                    was_cloned: true,
                });
            }

            tracing::warn!(
                competition_id = %competition_id,
                attempt,
                "Divisions repoint lost a race, discarding copy"
            );
            self.store.delete_group_unchecked(created).await?;
        }

        Err(ScalingError::internal(format!(
            "Could not claim divisions for competition {} after {} attempts",
            competition_id, self.retry_limit
        ))
        .into())
    }

    /// Configure divisions for a competition that has none, from a template
    /// group or from the defaults.
    #[tracing::instrument(skip(self))]
    pub async fn initialize(
        &self,
        competition_id: CompetitionId,
        team_id: TeamId,
        template_id: Option<GroupId>,
    ) -> WodsmithResult<GroupId> {
        self.authorize(competition_id, team_id).await?;
        let guard = self.locks.acquire(competition_id).await;
        let result = self
            .initialize_locked(competition_id, team_id, template_id)
            .await;
        drop(guard);
        self.locks.prune();
        result
    }

    async fn initialize_locked(
        &self,
        competition_id: CompetitionId,
        team_id: TeamId,
        template_id: Option<GroupId>,
    ) -> WodsmithResult<GroupId> {
        let competition = self.competition(competition_id).await?;
        if competition.scaling_group_id().is_some() {
            return Err(
                ScalingError::conflict("Competition already has divisions configured").into(),
            );
        }

        let template = match template_id {
            Some(template_id) => {
                let group = self.repo.group_get(template_id).await?.ok_or_else(|| {
                    ScalingError::not_found(EntityType::ScalingGroup, template_id.as_uuid())
                })?;
                if !group.is_system() && !group.is_owned_by(team_id) {
                    return Err(ScalingError::forbidden(
                        "Cannot use scaling group from another team",
                    )
                    .into());
                }
                Some(group)
            }
            None => None,
        };

        let created = self
            .create_owned_group(&competition, template_id, template.as_ref())
            .await?;
        if !self
            .repo
            .competition_swap_scaling_group(competition_id, None, created)
            .await?
        {
            self.store.delete_group_unchecked(created).await?;
            return Err(
                ScalingError::conflict("Competition already has divisions configured").into(),
            );
        }

        tracing::info!(
            competition_id = %competition_id,
            group_id = %created,
            template_id = ?template_id,
            "Competition divisions initialized"
        );
        Ok(created)
    }

    /// Create the competition's own group. Levels are copied from `source`
    /// when it has any, otherwise the default divisions are used.
    async fn create_owned_group(
        &self,
        competition: &Competition,
        source: Option<GroupId>,
        template: Option<&ScalingGroup>,
    ) -> WodsmithResult<GroupId> {
        let mut specs: Vec<NewLevelSpec> = match source {
            Some(group_id) => self
                .repo
                .level_list_by_group(group_id)
                .await?
                .into_iter()
                .map(|level| NewLevelSpec {
                    label: level.label,
                    position: level.position,
                    team_size: level.team_size,
                })
                .collect(),
            None => Vec::new(),
        };
        if specs.is_empty() {
            specs = default_specs();
        }

        let description = match template {
            Some(template) => format!("Cloned from {}", template.title),
            None => format!("Divisions for {}", competition.name),
        };

        let created = self
            .store
            .insert_group_unchecked(
                Some(competition.organizing_team_id),
                competition_group_title(&competition.name),
                Some(description),
                &specs,
            )
            .await?;
        Ok(created.group.group_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wodsmith_test_utils::assertions::{assert_conflict, assert_forbidden, assert_same_shape};
    use wodsmith_test_utils::fixtures::Fixture;
    use wodsmith_test_utils::{AllowAllPermissions, DenyAllPermissions};

    fn gate(fixture: &Fixture, permissions: Arc<dyn PermissionService>) -> OwnershipGate {
        let store = Arc::new(LevelStore::new(fixture.repository(), permissions));
        OwnershipGate::new(store, &ScalingConfig::default())
    }

    #[tokio::test]
    async fn test_unconfigured_competition_gets_default_divisions() {
        let fixture = Fixture::new();
        let team = fixture.team("Box", None);
        let comp = fixture.competition("Throwdown", team.team_id, None);
        let gate = gate(&fixture, Arc::new(AllowAllPermissions));

        assert_eq!(
            gate.division_state(comp.competition_id).await.unwrap(),
            DivisionState::Unconfigured
        );
        let owned = gate
            .ensure_owned(comp.competition_id, team.team_id)
            .await
            .unwrap();
        assert!(owned.was_cloned);

        let group = fixture
            .repository()
            .group_get(owned.scaling_group_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(group.title, "Throwdown Divisions");
        assert_eq!(group.description.as_deref(), Some("Divisions for Throwdown"));
        let labels: Vec<_> = fixture
            .levels(owned.scaling_group_id)
            .await
            .into_iter()
            .map(|l| l.label)
            .collect();
        assert_eq!(labels, vec!["Open", "Scaled"]);
        assert_eq!(
            gate.division_state(comp.competition_id).await.unwrap(),
            DivisionState::Initialized
        );
    }

    #[tokio::test]
    async fn test_shared_template_is_cloned_with_fidelity() {
        let fixture = Fixture::new();
        let team = fixture.team("Box", None);
        let template = fixture.system_group("CrossFit Games", &["RX", "Scaled", "Masters"]).await;
        fixture.level(template.group_id, "Teens", 3).await;
        let comp = fixture.competition("Throwdown", team.team_id, Some(template.group_id));
        let gate = gate(&fixture, Arc::new(AllowAllPermissions));

        assert_eq!(
            gate.division_state(comp.competition_id).await.unwrap(),
            DivisionState::Shared
        );
        let owned = gate
            .ensure_owned(comp.competition_id, team.team_id)
            .await
            .unwrap();
        assert!(owned.was_cloned);
        assert_ne!(owned.scaling_group_id, template.group_id);

        let copy = fixture.levels(owned.scaling_group_id).await;
        let original = fixture.levels(template.group_id).await;
        assert_same_shape(&copy, &original);

        let group = fixture
            .repository()
            .group_get(owned.scaling_group_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(group.description.as_deref(), Some("Cloned from CrossFit Games"));
        assert_eq!(group.owner_team_id, Some(team.team_id));
        assert_eq!(
            fixture.competition_group(comp.competition_id).await,
            Some(owned.scaling_group_id)
        );
    }

    #[tokio::test]
    async fn test_ensure_owned_is_idempotent() {
        let fixture = Fixture::new();
        let team = fixture.team("Box", None);
        let template = fixture.system_group("Standard", &["Rx", "Scaled"]).await;
        let comp = fixture.competition("Throwdown", team.team_id, Some(template.group_id));
        let gate = gate(&fixture, Arc::new(AllowAllPermissions));

        let first = gate
            .ensure_owned(comp.competition_id, team.team_id)
            .await
            .unwrap();
        let groups_after_first = fixture.mock().group_count().unwrap();
        let second = gate
            .ensure_owned(comp.competition_id, team.team_id)
            .await
            .unwrap();

        assert!(first.was_cloned);
        assert!(!second.was_cloned);
        assert_eq!(first.scaling_group_id, second.scaling_group_id);
        assert_eq!(fixture.mock().group_count().unwrap(), groups_after_first);
        assert!(gate
            .is_owned(comp.competition_id, first.scaling_group_id)
            .await
            .unwrap());
        assert!(gate.locks().is_empty());
    }

    #[tokio::test]
    async fn test_team_group_without_marker_is_not_owned() {
        let fixture = Fixture::new();
        let team = fixture.team("Box", None);
        let team_group = fixture.team_group(team.team_id, "Box Levels", &["Rx"]).await;
        let comp = fixture.competition("Throwdown", team.team_id, Some(team_group.group_id));
        let gate = gate(&fixture, Arc::new(AllowAllPermissions));

        assert!(!gate
            .is_owned(comp.competition_id, team_group.group_id)
            .await
            .unwrap());
        assert!(!gate
            .is_owned(CompetitionId::now_v7(), team_group.group_id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_foreign_competition_is_forbidden() {
        let fixture = Fixture::new();
        let organizer = fixture.team("Organizer", None);
        let other = fixture.team("Other", None);
        let comp = fixture.competition("Throwdown", organizer.team_id, None);
        let gate = gate(&fixture, Arc::new(AllowAllPermissions));

        assert_forbidden(&gate.ensure_owned(comp.competition_id, other.team_id).await);
        assert_eq!(fixture.mock().group_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_permission_is_forbidden() {
        let fixture = Fixture::new();
        let team = fixture.team("Box", None);
        let comp = fixture.competition("Throwdown", team.team_id, None);
        let gate = gate(&fixture, Arc::new(DenyAllPermissions));

        assert_forbidden(&gate.ensure_owned(comp.competition_id, team.team_id).await);
    }

    #[tokio::test]
    async fn test_missing_competition_is_not_found() {
        let fixture = Fixture::new();
        let team = fixture.team("Box", None);
        let gate = gate(&fixture, Arc::new(AllowAllPermissions));

        let result = gate.ensure_owned(CompetitionId::now_v7(), team.team_id).await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_initialize_from_template_then_conflict() {
        let fixture = Fixture::new();
        let team = fixture.team("Box", None);
        let template = fixture.team_group(team.team_id, "Box Levels", &["Rx", "Scaled"]).await;
        let comp = fixture.competition("Throwdown", team.team_id, None);
        let gate = gate(&fixture, Arc::new(AllowAllPermissions));

        let created = gate
            .initialize(comp.competition_id, team.team_id, Some(template.group_id))
            .await
            .unwrap();
        assert_same_shape(
            &fixture.levels(created).await,
            &fixture.levels(template.group_id).await,
        );

        assert_conflict(&gate.initialize(comp.competition_id, team.team_id, None).await);
    }

    #[tokio::test]
    async fn test_initialize_rejects_foreign_template() {
        let fixture = Fixture::new();
        let team = fixture.team("Box", None);
        let other = fixture.team("Other", None);
        let foreign = fixture.team_group(other.team_id, "Their Levels", &["Rx"]).await;
        let comp = fixture.competition("Throwdown", team.team_id, None);
        let gate = gate(&fixture, Arc::new(AllowAllPermissions));

        assert_forbidden(
            &gate
                .initialize(comp.competition_id, team.team_id, Some(foreign.group_id))
                .await,
        );
        assert_eq!(fixture.competition_group(comp.competition_id).await, None);
    }
}

//! CRUD over scaling groups and levels with team authorization.
//!
//! [`LevelStore`] never touches the cache. Callers that mutate groups visible
//! through [`TieredCache`](crate::TieredCache) invalidate it themselves.

use crate::batch::{autochunk, dedup_ids};
use crate::{GroupUpdate, LevelUpdate, ScalingRepository};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use wodsmith_core::{
    EntityIdType, EntityType, GroupId, IdGenerator, LevelId, Permission, PermissionService,
    ScalingDescription, ScalingError, ScalingGroup, ScalingLevel, StorageError, TeamId,
    UuidV7Generator, WodsmithError, WodsmithResult, WorkoutId,
};

/// Input for [`LevelStore::create_level`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateLevelInput {
    pub group_id: GroupId,
    pub label: String,
    /// Explicit position; appended after the current last level when `None`.
    pub position: Option<i32>,
    /// Athletes per entry; defaults to 1.
    pub team_size: Option<i32>,
}

impl CreateLevelInput {
    pub fn new(group_id: GroupId, label: impl Into<String>) -> Self {
        Self {
            group_id,
            label: label.into(),
            position: None,
            team_size: None,
        }
    }

    pub fn with_position(mut self, position: i32) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_team_size(mut self, team_size: i32) -> Self {
        self.team_size = Some(team_size);
        self
    }
}

/// A level to create alongside a new group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLevelSpec {
    pub label: String,
    pub position: i32,
    pub team_size: i32,
}

/// Input for [`LevelStore::create_group`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateGroupInput {
    pub title: String,
    pub description: Option<String>,
    pub levels: Vec<NewLevelSpec>,
}

/// A group together with its levels ordered by position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupWithLevels {
    pub group: ScalingGroup,
    pub levels: Vec<ScalingLevel>,
}

/// One level's description as submitted for a workout. Blank or missing
/// text removes the description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionInput {
    pub level_id: LevelId,
    pub description: Option<String>,
}

/// A stored description joined with the level it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptionWithLevel {
    pub description: ScalingDescription,
    pub level: ScalingLevel,
}

/// Maps a level of a source workout's group onto the matching level of a
/// remixed workout's group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelMapping {
    pub original_level_id: LevelId,
    pub new_level_id: LevelId,
    pub description: String,
}

/// Result of a destructive operation whose refusals are reported, not raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub success: bool,
    pub error: Option<ScalingError>,
}

impl DeleteOutcome {
    pub fn deleted() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn rejected(error: ScalingError) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }

    /// The refusal message shown to users, if any.
    pub fn message(&self) -> Option<String> {
        self.error.as_ref().map(ScalingError::reason)
    }

    /// Fold a domain refusal into an outcome; storage failures stay errors.
    pub fn from_result(result: WodsmithResult<()>) -> WodsmithResult<Self> {
        match result {
            Ok(()) => Ok(Self::deleted()),
            Err(WodsmithError::Scaling(error)) => Ok(Self::rejected(error)),
            Err(other) => Err(other),
        }
    }
}

/// Authorized CRUD over scaling groups and levels.
pub struct LevelStore {
    repo: Arc<dyn ScalingRepository>,
    permissions: Arc<dyn PermissionService>,
    ids: Arc<dyn IdGenerator>,
}

impl LevelStore {
    pub fn new(repo: Arc<dyn ScalingRepository>, permissions: Arc<dyn PermissionService>) -> Self {
        Self {
            repo,
            permissions,
            ids: Arc::new(UuidV7Generator),
        }
    }

    /// Replace the id generator used for new groups and levels.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn repository(&self) -> &Arc<dyn ScalingRepository> {
        &self.repo
    }

    pub fn permissions(&self) -> &Arc<dyn PermissionService> {
        &self.permissions
    }

    /// Team-owned groups require an actor holding `EditComponents` on the
    /// owning team. System groups are open.
    async fn authorize(&self, actor: Option<TeamId>, group: &ScalingGroup) -> WodsmithResult<()> {
        let Some(owner) = group.owner_team_id else {
            return Ok(());
        };
        let actor = actor.ok_or_else(|| ScalingError::forbidden("Forbidden"))?;
        self.permissions
            .require_permission(actor, Permission::EditComponents)
            .await?;
        if owner != actor {
            return Err(ScalingError::forbidden("Forbidden").into());
        }
        Ok(())
    }

    async fn require_group(&self, group_id: GroupId) -> WodsmithResult<ScalingGroup> {
        self.repo
            .group_get(group_id)
            .await?
            .ok_or_else(|| {
                ScalingError::not_found(EntityType::ScalingGroup, group_id.as_uuid()).into()
            })
    }

    // === Levels ===

    /// Levels of a group ordered by position ascending.
    pub async fn list_levels(&self, group_id: GroupId) -> WodsmithResult<Vec<ScalingLevel>> {
        self.repo.level_list_by_group(group_id).await
    }

    /// Create a level. Without an explicit position it is appended after the
    /// group's current last level.
    pub async fn create_level(
        &self,
        actor: Option<TeamId>,
        input: CreateLevelInput,
    ) -> WodsmithResult<ScalingLevel> {
        let group = self.require_group(input.group_id).await?;
        self.authorize(actor, &group).await?;
        self.insert_level_unchecked(input).await
    }

    /// Create a level without authorization. Used by callers that already
    /// authorized the actor for a wider operation.
    pub async fn insert_level_unchecked(
        &self,
        input: CreateLevelInput,
    ) -> WodsmithResult<ScalingLevel> {
        let team_size = input.team_size.unwrap_or(1);
        validate_team_size(team_size)?;
        let position = match input.position {
            Some(position) => {
                validate_position(position)?;
                position
            }
            None => match self.repo.level_max_position(input.group_id).await? {
                Some(max) => max.checked_add(1).ok_or_else(|| StorageError::InsertFailed {
                    entity_type: EntityType::ScalingLevel,
                    reason: format!("no position left after {}", max),
                })?,
                None => 0,
            },
        };

        let now = chrono::Utc::now();
        let level = ScalingLevel {
            level_id: LevelId::new(self.ids.next_id()),
            group_id: input.group_id,
            label: input.label,
            position,
            team_size,
            created_at: now,
            updated_at: now,
        };
        self.repo.level_insert(&level).await?;
        Ok(level)
    }

    /// Patch a level. Returns `None` when the level or its group is missing.
    pub async fn update_level(
        &self,
        actor: Option<TeamId>,
        level_id: LevelId,
        update: LevelUpdate,
    ) -> WodsmithResult<Option<ScalingLevel>> {
        let Some(level) = self.repo.level_get(level_id).await? else {
            return Ok(None);
        };
        let Some(group) = self.repo.group_get(level.group_id).await? else {
            return Ok(None);
        };
        self.authorize(actor, &group).await?;

        if let Some(team_size) = update.team_size {
            validate_team_size(team_size)?;
        }
        if let Some(position) = update.position {
            validate_position(position)?;
        }

        self.repo.level_update(level_id, update).await.map(Some)
    }

    /// Assign each listed level its index as position. Ids outside the group
    /// are skipped but still consume their index.
    pub async fn reorder(
        &self,
        actor: Option<TeamId>,
        group_id: GroupId,
        ordered_ids: &[LevelId],
    ) -> WodsmithResult<()> {
        let group = self.require_group(group_id).await?;
        self.authorize(actor, &group).await?;
        self.reorder_unchecked(group_id, ordered_ids).await
    }

    /// [`reorder`](Self::reorder) without authorization.
    pub async fn reorder_unchecked(
        &self,
        group_id: GroupId,
        ordered_ids: &[LevelId],
    ) -> WodsmithResult<()> {
        let members: HashSet<LevelId> = self
            .repo
            .level_list_by_group(group_id)
            .await?
            .into_iter()
            .map(|l| l.level_id)
            .collect();

        for (index, level_id) in ordered_ids.iter().enumerate() {
            if !members.contains(level_id) {
                continue;
            }
            let position = i32::try_from(index).map_err(|_| StorageError::UpdateFailed {
                entity_type: EntityType::ScalingLevel,
                id: level_id.as_uuid(),
                reason: format!("position {} out of range", index),
            })?;
            self.repo
                .level_update(
                    *level_id,
                    LevelUpdate {
                        position: Some(position),
                        ..LevelUpdate::default()
                    },
                )
                .await?;
        }
        Ok(())
    }

    /// Delete a level. Refused when registrations reference it or it is the
    /// last level of its group. An already-absent level counts as deleted.
    pub async fn delete_level(
        &self,
        actor: Option<TeamId>,
        level_id: LevelId,
    ) -> WodsmithResult<DeleteOutcome> {
        DeleteOutcome::from_result(self.try_delete_level(actor, level_id).await)
    }

    async fn try_delete_level(
        &self,
        actor: Option<TeamId>,
        level_id: LevelId,
    ) -> WodsmithResult<()> {
        let Some(level) = self.repo.level_get(level_id).await? else {
            return Ok(());
        };
        let Some(group) = self.repo.group_get(level.group_id).await? else {
            return Ok(());
        };
        self.authorize(actor, &group).await?;

        let registered = self.repo.registration_count_for_level(level_id).await?;
        if registered > 0 {
            return Err(ScalingError::conflict(registered_refusal(registered, "level")).into());
        }
        let remaining = self.repo.level_list_by_group(group.group_id).await?.len();
        if remaining <= 1 {
            return Err(ScalingError::conflict(
                "Cannot delete: a scaling group must keep at least one level",
            )
            .into());
        }

        self.repo.level_delete(level_id).await?;
        Ok(())
    }

    /// Levels with the given ids, looked up in parameter-bounded chunks.
    pub async fn levels_by_ids(&self, ids: &[LevelId]) -> WodsmithResult<Vec<ScalingLevel>> {
        let ids = dedup_ids(ids);
        let repo = &self.repo;
        autochunk(&ids, 0, repo.max_query_params(), |batch| async move {
            repo.level_list_by_ids(&batch).await
        })
        .await
    }

    /// Per-workout descriptions of the given levels, looked up in
    /// parameter-bounded chunks.
    pub async fn descriptions_for_levels(
        &self,
        workout_id: WorkoutId,
        level_ids: &[LevelId],
    ) -> WodsmithResult<Vec<ScalingDescription>> {
        let ids = dedup_ids(level_ids);
        let repo = &self.repo;
        autochunk(&ids, 1, repo.max_query_params(), |batch| async move {
            repo.descriptions_for_levels(workout_id, &batch).await
        })
        .await
    }

    // === Descriptions ===

    /// Replace a workout's level descriptions. Text is trimmed and blank
    /// entries are dropped. Returns the number of descriptions stored.
    pub async fn upsert_descriptions(
        &self,
        workout_id: WorkoutId,
        inputs: &[DescriptionInput],
    ) -> WodsmithResult<usize> {
        let rows: Vec<ScalingDescription> = inputs
            .iter()
            .filter_map(|input| {
                let text = input.description.as_deref()?.trim();
                (!text.is_empty()).then(|| ScalingDescription {
                    workout_id,
                    level_id: input.level_id,
                    description: text.to_string(),
                })
            })
            .collect();
        self.repo.description_upsert(workout_id, &rows).await
    }

    /// A workout's descriptions with their levels, ordered by level position.
    /// Descriptions whose level no longer exists are left out.
    pub async fn descriptions_with_levels(
        &self,
        workout_id: WorkoutId,
    ) -> WodsmithResult<Vec<DescriptionWithLevel>> {
        let descriptions = self.repo.description_list_by_workout(workout_id).await?;
        let ids: Vec<LevelId> = descriptions.iter().map(|d| d.level_id).collect();
        let levels: HashMap<LevelId, ScalingLevel> = self
            .levels_by_ids(&ids)
            .await?
            .into_iter()
            .map(|level| (level.level_id, level))
            .collect();

        let mut joined: Vec<DescriptionWithLevel> = descriptions
            .into_iter()
            .filter_map(|description| {
                let level = levels.get(&description.level_id)?.clone();
                Some(DescriptionWithLevel { description, level })
            })
            .collect();
        joined.sort_by_key(|d| d.level.position);
        Ok(joined)
    }

    /// Carry descriptions over to a remixed workout whose group has
    /// different level ids. Existing descriptions of the remix are replaced.
    /// Returns the number of mappings processed.
    pub async fn migrate_descriptions(
        &self,
        remixed_workout_id: WorkoutId,
        mappings: &[LevelMapping],
    ) -> WodsmithResult<usize> {
        let rows: Vec<ScalingDescription> = mappings
            .iter()
            .filter(|mapping| !mapping.description.trim().is_empty())
            .map(|mapping| ScalingDescription {
                workout_id: remixed_workout_id,
                level_id: mapping.new_level_id,
                description: mapping.description.clone(),
            })
            .collect();
        let written = self.repo.description_upsert(remixed_workout_id, &rows).await?;
        tracing::debug!(
            workout_id = %remixed_workout_id,
            mappings = mappings.len(),
            written,
            "Scaling descriptions migrated"
        );
        Ok(mappings.len())
    }

    // === Groups ===

    /// Groups visible to a team: its own plus, optionally, system groups.
    /// System groups come first, then groups are ordered by title.
    pub async fn list_groups(
        &self,
        team_id: TeamId,
        include_system: bool,
    ) -> WodsmithResult<Vec<ScalingGroup>> {
        let mut groups = self.repo.group_list_visible(team_id, include_system).await?;
        groups.sort_by(|a, b| {
            b.is_system()
                .cmp(&a.is_system())
                .then_with(|| a.title.cmp(&b.title))
        });
        Ok(groups)
    }

    /// A group with its levels. Groups owned by another team are forbidden.
    pub async fn get_group_with_levels(
        &self,
        team_id: TeamId,
        group_id: GroupId,
    ) -> WodsmithResult<GroupWithLevels> {
        let group = self.require_group(group_id).await?;
        if !group.is_system() && !group.is_owned_by(team_id) {
            return Err(
                ScalingError::forbidden("Cannot access scaling group from another team").into(),
            );
        }
        let levels = self.repo.level_list_by_group(group_id).await?;
        Ok(GroupWithLevels { group, levels })
    }

    /// Create a team-owned group together with its initial levels.
    pub async fn create_group(
        &self,
        actor: TeamId,
        input: CreateGroupInput,
    ) -> WodsmithResult<GroupWithLevels> {
        self.permissions
            .require_permission(actor, Permission::EditComponents)
            .await?;
        for spec in &input.levels {
            validate_team_size(spec.team_size)?;
            validate_position(spec.position)?;
        }

        self.insert_group_unchecked(Some(actor), input.title, input.description, &input.levels)
            .await
    }

    /// Create a group whose owner and levels are set by the caller, without
    /// an extra permission check. Used by callers that already authorized
    /// the actor for a wider operation.
    pub async fn insert_group_unchecked(
        &self,
        owner_team_id: Option<TeamId>,
        title: String,
        description: Option<String>,
        levels: &[NewLevelSpec],
    ) -> WodsmithResult<GroupWithLevels> {
        let now = chrono::Utc::now();
        let group = ScalingGroup {
            group_id: GroupId::new(self.ids.next_id()),
            title,
            description,
            owner_team_id,
            is_global_default: false,
            created_at: now,
            updated_at: now,
        };
        self.repo.group_insert(&group).await?;

        let mut created = Vec::with_capacity(levels.len());
        for spec in levels {
            let level = ScalingLevel {
                level_id: LevelId::new(self.ids.next_id()),
                group_id: group.group_id,
                label: spec.label.clone(),
                position: spec.position,
                team_size: spec.team_size,
                created_at: now,
                updated_at: now,
            };
            self.repo.level_insert(&level).await?;
            created.push(level);
        }
        wodsmith_core::sort_levels(&mut created);

        Ok(GroupWithLevels {
            group,
            levels: created,
        })
    }

    /// Update a group's title or description. System groups are immutable.
    pub async fn update_group(
        &self,
        actor: TeamId,
        group_id: GroupId,
        update: GroupUpdate,
    ) -> WodsmithResult<ScalingGroup> {
        self.permissions
            .require_permission(actor, Permission::EditComponents)
            .await?;
        let group = self.require_group(group_id).await?;
        if group.is_system() {
            return Err(ScalingError::forbidden("Cannot edit system scaling groups").into());
        }
        if !group.is_owned_by(actor) {
            return Err(
                ScalingError::forbidden("Cannot edit scaling group from another team").into(),
            );
        }
        self.repo.group_update(group_id, update).await
    }

    /// Delete a group and its levels. System groups cannot be deleted and
    /// groups still referenced by workouts, tracks, teams or competitions
    /// are a conflict.
    pub async fn delete_group(&self, actor: TeamId, group_id: GroupId) -> WodsmithResult<()> {
        self.permissions
            .require_permission(actor, Permission::EditComponents)
            .await?;
        let group = self.require_group(group_id).await?;
        if group.is_system() {
            return Err(ScalingError::forbidden("Cannot delete system scaling groups").into());
        }
        if !group.is_owned_by(actor) {
            return Err(
                ScalingError::forbidden("Cannot delete scaling group from another team").into(),
            );
        }
        let references = self.repo.group_reference_count(group_id).await?;
        if references > 0 {
            return Err(ScalingError::conflict(format!(
                "Cannot delete: scaling group is used in {} place(s)",
                references
            ))
            .into());
        }
        self.repo.group_delete(group_id).await?;
        Ok(())
    }

    /// Delete a group without authorization or reference checks.
    pub async fn delete_group_unchecked(&self, group_id: GroupId) -> WodsmithResult<bool> {
        self.repo.group_delete(group_id).await
    }

    /// Set (or clear with `None`) a team's default scaling group.
    pub async fn set_team_default(
        &self,
        team_id: TeamId,
        group_id: Option<GroupId>,
    ) -> WodsmithResult<()> {
        self.permissions
            .require_permission(team_id, Permission::EditComponents)
            .await?;
        if let Some(group_id) = group_id {
            let group = self.require_group(group_id).await?;
            if !group.is_system() && !group.is_owned_by(team_id) {
                return Err(ScalingError::forbidden(
                    "Cannot use scaling group from another team",
                )
                .into());
            }
        }
        self.repo.team_set_default_group(team_id, group_id).await
    }

    /// Flag a system group as the global default. Only one group may hold
    /// the flag; a second is a conflict.
    ///
    /// No team permission is checked: the flag is platform-wide and callers
    /// must restrict this to site administrators.
    pub async fn set_global_default(&self, group_id: GroupId) -> WodsmithResult<()> {
        let group = self.require_group(group_id).await?;
        if !group.is_system() {
            return Err(
                ScalingError::forbidden("Only system scaling groups can be the global default")
                    .into(),
            );
        }
        self.repo.group_set_global_default(group_id).await
    }

    /// Remove the global default flag from a group. Admin only, like
    /// [`set_global_default`](Self::set_global_default).
    pub async fn clear_global_default(&self, group_id: GroupId) -> WodsmithResult<()> {
        self.require_group(group_id).await?;
        self.repo.group_clear_global_default(group_id).await
    }
}

/// Refusal for deleting a level or division athletes are registered in.
pub fn registered_refusal(registered: usize, noun: &str) -> String {
    let athletes = if registered == 1 { "athlete" } else { "athletes" };
    format!(
        "Cannot delete: {} {} registered in this {}",
        registered, athletes, noun
    )
}

fn validate_team_size(team_size: i32) -> Result<(), StorageError> {
    if team_size < 1 {
        return Err(StorageError::InsertFailed {
            entity_type: EntityType::ScalingLevel,
            reason: format!("team size must be at least 1, got {}", team_size),
        });
    }
    Ok(())
}

fn validate_position(position: i32) -> Result<(), StorageError> {
    if position < 0 {
        return Err(StorageError::InsertFailed {
            entity_type: EntityType::ScalingLevel,
            reason: format!("position must not be negative, got {}", position),
        });
    }
    Ok(())
}

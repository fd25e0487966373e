//! Competition division lifecycle.
//!
//! Every write first claims the competition's own group through the
//! [`OwnershipGate`], then edits that group and drops it from the cache.

use crate::ownership::OwnershipGate;
use std::collections::HashMap;
use std::sync::Arc;
use wodsmith_core::{
    CompetitionId, EntityIdType, EntityType, GroupId, LevelId, ScalingError, ScalingLevel, TeamId,
    WodsmithResult,
};
use wodsmith_storage::{
    autochunk, dedup_ids, registered_refusal, CreateLevelInput, DeleteOutcome, GroupUpdate,
    LevelStore, LevelUpdate, ScalingRepository, TieredCache,
};

/// A division with the number of athletes registered in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisionWithCount {
    pub division: ScalingLevel,
    pub registration_count: usize,
}

fn not_in_competition() -> ScalingError {
    ScalingError::forbidden("Division not found in this competition")
}

/// Adds, renames, deletes and reorders competition divisions.
pub struct DivisionManager {
    gate: Arc<OwnershipGate>,
    store: Arc<LevelStore>,
    repo: Arc<dyn ScalingRepository>,
    cache: Arc<TieredCache>,
}

impl DivisionManager {
    pub fn new(gate: Arc<OwnershipGate>, store: Arc<LevelStore>, cache: Arc<TieredCache>) -> Self {
        Self {
            repo: store.repository().clone(),
            gate,
            store,
            cache,
        }
    }

    pub fn gate(&self) -> &Arc<OwnershipGate> {
        &self.gate
    }

    /// Mark the owned group as edited and drop it from both cache tiers.
    ///
    /// The cache is invalidated even when the timestamp bump fails.
    async fn after_write(&self, group_id: GroupId) -> WodsmithResult<()> {
        let touched = self
            .repo
            .group_update(group_id, GroupUpdate::default())
            .await;
        self.cache.invalidate_group(group_id).await;
        touched.map(|_| ())
    }

    /// A division of the owned group, `Forbidden` for anything else.
    async fn owned_division(
        &self,
        group_id: GroupId,
        division_id: LevelId,
    ) -> WodsmithResult<ScalingLevel> {
        match self.repo.level_get(division_id).await? {
            Some(level) if level.group_id == group_id => Ok(level),
            _ => Err(not_in_competition().into()),
        }
    }

    /// Append a division after the current last one.
    #[tracing::instrument(skip(self))]
    pub async fn add_division(
        &self,
        competition_id: CompetitionId,
        team_id: TeamId,
        label: String,
    ) -> WodsmithResult<ScalingLevel> {
        let owned = self.gate.ensure_owned(competition_id, team_id).await?;
        let level = self
            .store
            .insert_level_unchecked(CreateLevelInput::new(owned.scaling_group_id, label))
            .await?;
        self.after_write(owned.scaling_group_id).await?;
        Ok(level)
    }

    /// Rename a division.
    #[tracing::instrument(skip(self))]
    pub async fn update_division(
        &self,
        competition_id: CompetitionId,
        team_id: TeamId,
        division_id: LevelId,
        label: String,
    ) -> WodsmithResult<ScalingLevel> {
        let owned = self.gate.ensure_owned(competition_id, team_id).await?;
        self.owned_division(owned.scaling_group_id, division_id)
            .await?;
        let level = self
            .repo
            .level_update(
                division_id,
                LevelUpdate {
                    label: Some(label),
                    ..LevelUpdate::default()
                },
            )
            .await?;
        self.after_write(owned.scaling_group_id).await?;
        Ok(level)
    }

    /// Delete a division.
    ///
    /// Refused when the division is not in the competition's group, when
    /// athletes of this competition are registered in it, or when it is the
    /// last division. Refusals are reported in the outcome; authorization
    /// and storage failures are returned as errors.
    #[tracing::instrument(skip(self))]
    pub async fn delete_division(
        &self,
        competition_id: CompetitionId,
        team_id: TeamId,
        division_id: LevelId,
    ) -> WodsmithResult<DeleteOutcome> {
        let owned = self.gate.ensure_owned(competition_id, team_id).await?;
        let group_id = owned.scaling_group_id;

        let result = self
            .guarded_delete(competition_id, group_id, division_id)
            .await;
        match &result {
            Ok(()) => self.after_write(group_id).await?,
            Err(e) => tracing::debug!(error = %e, "Division delete refused"),
        }
        DeleteOutcome::from_result(result)
    }

    async fn guarded_delete(
        &self,
        competition_id: CompetitionId,
        group_id: GroupId,
        division_id: LevelId,
    ) -> WodsmithResult<()> {
        self.owned_division(group_id, division_id).await?;

        let registered = self
            .repo
            .registration_count(competition_id, division_id)
            .await?;
        if registered > 0 {
            return Err(
                ScalingError::conflict(registered_refusal(registered, "division")).into(),
            );
        }

        if self.repo.level_list_by_group(group_id).await?.len() <= 1 {
            return Err(ScalingError::conflict(
                "Cannot delete: competition must have at least one division",
            )
            .into());
        }

        self.repo.level_delete(division_id).await?;
        Ok(())
    }

    /// Give each listed division its index as position. Ids outside the
    /// competition's group are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn reorder_divisions(
        &self,
        competition_id: CompetitionId,
        team_id: TeamId,
        ordered_ids: Vec<LevelId>,
    ) -> WodsmithResult<()> {
        let owned = self.gate.ensure_owned(competition_id, team_id).await?;
        self.store
            .reorder_unchecked(owned.scaling_group_id, &ordered_ids)
            .await?;
        self.after_write(owned.scaling_group_id).await
    }

    /// Divisions of a competition in position order with their registration
    /// counts. Empty when no divisions are configured.
    #[tracing::instrument(skip(self))]
    pub async fn list_divisions(
        &self,
        competition_id: CompetitionId,
    ) -> WodsmithResult<Vec<DivisionWithCount>> {
        let competition = self
            .repo
            .competition_get(competition_id)
            .await?
            .ok_or_else(|| {
                ScalingError::not_found(EntityType::Competition, competition_id.as_uuid())
            })?;
        let Some(group_id) = competition.scaling_group_id() else {
            return Ok(Vec::new());
        };
        let Some(cached) = self.cache.get_group(group_id).await? else {
            return Ok(Vec::new());
        };

        let ids: Vec<LevelId> = cached.levels.iter().map(|l| l.level_id).collect();
        let ids = dedup_ids(&ids);
        let repo = &self.repo;
        let counts: HashMap<LevelId, usize> =
            autochunk(&ids, 1, repo.max_query_params(), |batch| async move {
                repo.registration_counts(competition_id, &batch).await
            })
            .await?
            .into_iter()
            .collect();

        Ok(cached
            .levels
            .into_iter()
            .map(|division| DivisionWithCount {
                registration_count: counts.get(&division.level_id).copied().unwrap_or(0),
                division,
            })
            .collect())
    }
}

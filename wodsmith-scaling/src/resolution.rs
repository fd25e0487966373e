//! Scaling group resolution for workouts.
//!
//! The chain is walked in strict priority order and the first link that
//! points at a group wins:
//!
//! 1. the workout's own group,
//! 2. the programming track's group, when a track is given,
//! 3. the team's default group,
//! 4. the single global default group.
//!
//! Levels are never merged across links.

use std::sync::Arc;
use wodsmith_core::{
    EntityIdType, EntityType, GroupId, ResolutionSource, ScalingDescription, ScalingError,
    ScalingLevel, TeamId, TrackId, WodsmithResult, WorkoutId,
};
use wodsmith_storage::{autochunk, dedup_ids, ScalingRepository, TieredCache};

/// Outcome of walking the resolution chain for one workout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub workout_id: WorkoutId,
    /// `None` when no link of the chain points at a group.
    pub scaling_group_id: Option<GroupId>,
    /// Levels ordered by position; empty when unresolved or the group is gone.
    pub levels: Vec<ScalingLevel>,
    pub source: ResolutionSource,
}

impl Resolution {
    fn unresolved(workout_id: WorkoutId) -> Self {
        Self {
            workout_id,
            scaling_group_id: None,
            levels: Vec::new(),
            source: ResolutionSource::Unresolved,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.scaling_group_id.is_some()
    }

    /// The resolved group and its levels, or `NotFound` for an unresolved chain.
    pub fn require_group(self) -> WodsmithResult<(GroupId, Vec<ScalingLevel>)> {
        match self.scaling_group_id {
            Some(group_id) => Ok((group_id, self.levels)),
            None => Err(
                ScalingError::not_found(EntityType::ScalingGroup, self.workout_id.as_uuid()).into(),
            ),
        }
    }
}

/// A resolution together with the workout's per-level descriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWithDescriptions {
    pub resolution: Resolution,
    pub descriptions: Vec<ScalingDescription>,
}

/// Resolves which scaling group applies to a workout.
pub struct ScalingResolver {
    repo: Arc<dyn ScalingRepository>,
    cache: Arc<TieredCache>,
}

impl ScalingResolver {
    pub fn new(repo: Arc<dyn ScalingRepository>, cache: Arc<TieredCache>) -> Self {
        Self { repo, cache }
    }

    /// Walk the chain for `workout_id` as seen by `team_id`.
    ///
    /// A missing workout, track or team row counts as a link without a
    /// pointer. An unresolved chain is a valid result, not an error.
    #[tracing::instrument(skip(self))]
    pub async fn resolve(
        &self,
        workout_id: WorkoutId,
        team_id: TeamId,
        track_id: Option<TrackId>,
    ) -> WodsmithResult<Resolution> {
        let Some((group_id, source)) = self.pointer(workout_id, team_id, track_id).await? else {
            return match self.cache.get_global_default().await? {
                Some(cached) => {
                    tracing::debug!(
                        group_id = %cached.group.group_id,
                        source = ?ResolutionSource::GlobalDefault,
                        "Scaling group resolved"
                    );
                    Ok(Resolution {
                        workout_id,
                        scaling_group_id: Some(cached.group.group_id),
                        levels: cached.levels,
                        source: ResolutionSource::GlobalDefault,
                    })
                }
                None => {
                    tracing::debug!(
                        source = ?ResolutionSource::Unresolved,
                        "Scaling group unresolved"
                    );
                    Ok(Resolution::unresolved(workout_id))
                }
            };
        };

        let levels = match self.cache.get_group(group_id).await? {
            Some(cached) => cached.levels,
            None => {
                tracing::debug!(group_id = %group_id, "Resolved scaling group no longer exists");
                Vec::new()
            }
        };
        tracing::debug!(group_id = %group_id, source = ?source, "Scaling group resolved");

        Ok(Resolution {
            workout_id,
            scaling_group_id: Some(group_id),
            levels,
            source,
        })
    }

    /// First of the workout, track and team default pointers that is set.
    async fn pointer(
        &self,
        workout_id: WorkoutId,
        team_id: TeamId,
        track_id: Option<TrackId>,
    ) -> WodsmithResult<Option<(GroupId, ResolutionSource)>> {
        let workout = self.repo.workout_get(workout_id).await?;
        if let Some(group_id) = workout.and_then(|w| w.scaling_group_id) {
            return Ok(Some((group_id, ResolutionSource::Workout)));
        }

        if let Some(track_id) = track_id {
            let track = self.repo.track_get(track_id).await?;
            if let Some(group_id) = track.and_then(|t| t.scaling_group_id) {
                return Ok(Some((group_id, ResolutionSource::Track)));
            }
        }

        let team = self.repo.team_get(team_id).await?;
        Ok(team
            .and_then(|t| t.default_scaling_group_id)
            .map(|group_id| (group_id, ResolutionSource::TeamDefault)))
    }

    /// [`resolve`](Self::resolve) plus the workout's descriptions of the
    /// resolved levels, looked up in parameter-bounded chunks.
    #[tracing::instrument(skip(self))]
    pub async fn resolve_with_descriptions(
        &self,
        workout_id: WorkoutId,
        team_id: TeamId,
        track_id: Option<TrackId>,
    ) -> WodsmithResult<ResolvedWithDescriptions> {
        let resolution = self.resolve(workout_id, team_id, track_id).await?;
        let level_ids: Vec<_> = resolution.levels.iter().map(|l| l.level_id).collect();
        let level_ids = dedup_ids(&level_ids);

        let repo = &self.repo;
        let descriptions = autochunk(&level_ids, 1, repo.max_query_params(), |batch| async move {
            repo.descriptions_for_levels(workout_id, &batch).await
        })
        .await?;

        Ok(ResolvedWithDescriptions {
            resolution,
            descriptions,
        })
    }
}

//! Wodsmith Storage - Repository Seam, Level Store and Tiered Cache
//!
//! Defines the relational store abstraction the scaling engine reads and
//! writes through, an in-memory implementation for tests and single-node
//! use, chunked batch lookups, the [`LevelStore`] CRUD surface and the
//! [`TieredCache`] that fronts group reads.

pub mod batch;
pub mod cache;
pub mod level_store;
mod mock;

pub use batch::{autochunk, chunk, dedup_ids, SQL_BATCH_SIZE};
pub use cache::{
    CacheEntry, CacheKey, CacheRead, CacheSource, CacheStats, CachedGroup, EdgeError, EdgeStore,
    InMemoryEdgeStore, LmdbEdgeError, LmdbEdgeStore, MemoryTier, TieredCache, TtlClass,
};
pub use level_store::{
    registered_refusal, CreateGroupInput, CreateLevelInput, DeleteOutcome, DescriptionInput,
    DescriptionWithLevel, GroupWithLevels, LevelMapping, LevelStore, NewLevelSpec,
};
pub use mock::MockRepository;

use async_trait::async_trait;
use wodsmith_core::{
    Competition, CompetitionId, GroupId, LevelId, ProgrammingTrack, ScalingDescription,
    ScalingGroup, ScalingLevel, Team, TeamId, TrackId, Workout, WorkoutId, WodsmithResult,
};

// ============================================================================
// UPDATE TYPES
// ============================================================================

/// Update payload for scaling groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupUpdate {
    /// New title
    pub title: Option<String>,
    /// New description; `Some(None)` clears it
    pub description: Option<Option<String>>,
}

/// Update payload for scaling levels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelUpdate {
    /// New label
    pub label: Option<String>,
    /// New position
    pub position: Option<i32>,
    /// New team size
    pub team_size: Option<i32>,
}

impl LevelUpdate {
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.position.is_none() && self.team_size.is_none()
    }
}

// ============================================================================
// REPOSITORY TRAIT
// ============================================================================

/// Relational store seam for scaling groups, levels and the rows that point
/// at them.
///
/// Lookups taking a slice of ids bind one parameter per id. Implementations
/// reject requests binding more than [`max_query_params`](Self::max_query_params)
/// parameters with `StorageError::TooManyParameters`; callers split their
/// input with [`autochunk`].
#[async_trait]
pub trait ScalingRepository: Send + Sync {
    // === Group Operations ===

    /// Insert a new group. A second global default is rejected with a conflict.
    async fn group_insert(&self, group: &ScalingGroup) -> WodsmithResult<()>;

    /// Get a group by ID.
    async fn group_get(&self, id: GroupId) -> WodsmithResult<Option<ScalingGroup>>;

    /// Update a group, returning the stored row.
    async fn group_update(&self, id: GroupId, update: GroupUpdate)
        -> WodsmithResult<ScalingGroup>;

    /// Delete a group and all of its levels. Returns whether a row was removed.
    async fn group_delete(&self, id: GroupId) -> WodsmithResult<bool>;

    /// Groups owned by `team_id`, plus system groups when `include_system` is set.
    async fn group_list_visible(
        &self,
        team_id: TeamId,
        include_system: bool,
    ) -> WodsmithResult<Vec<ScalingGroup>>;

    /// The single group flagged as system-wide fallback.
    async fn group_global_default(&self) -> WodsmithResult<Option<ScalingGroup>>;

    /// Flag `id` as the global default. Conditional on no other group holding the flag.
    async fn group_set_global_default(&self, id: GroupId) -> WodsmithResult<()>;

    /// Clear the global default flag on `id`.
    async fn group_clear_global_default(&self, id: GroupId) -> WodsmithResult<()>;

    /// Number of workouts, tracks, teams and competitions pointing at `id`.
    async fn group_reference_count(&self, id: GroupId) -> WodsmithResult<usize>;

    // === Level Operations ===

    /// Insert a new level.
    async fn level_insert(&self, level: &ScalingLevel) -> WodsmithResult<()>;

    /// Get a level by ID.
    async fn level_get(&self, id: LevelId) -> WodsmithResult<Option<ScalingLevel>>;

    /// Update a level, returning the stored row.
    async fn level_update(&self, id: LevelId, update: LevelUpdate)
        -> WodsmithResult<ScalingLevel>;

    /// Delete a level. Returns whether a row was removed.
    async fn level_delete(&self, id: LevelId) -> WodsmithResult<bool>;

    /// Levels of a group ordered by position ascending.
    async fn level_list_by_group(&self, group_id: GroupId) -> WodsmithResult<Vec<ScalingLevel>>;

    /// Levels with the given ids (bounded lookup).
    async fn level_list_by_ids(&self, ids: &[LevelId]) -> WodsmithResult<Vec<ScalingLevel>>;

    /// Highest position in a group, `None` when the group has no levels.
    async fn level_max_position(&self, group_id: GroupId) -> WodsmithResult<Option<i32>>;

    // === Resolution Chain Rows ===

    /// Get a workout by ID.
    async fn workout_get(&self, id: WorkoutId) -> WodsmithResult<Option<Workout>>;

    /// Get a programming track by ID.
    async fn track_get(&self, id: TrackId) -> WodsmithResult<Option<ProgrammingTrack>>;

    /// Get a team by ID.
    async fn team_get(&self, id: TeamId) -> WodsmithResult<Option<Team>>;

    /// Set or clear a team's default scaling group.
    async fn team_set_default_group(
        &self,
        id: TeamId,
        group_id: Option<GroupId>,
    ) -> WodsmithResult<()>;

    // === Competition Operations ===

    /// Get a competition by ID.
    async fn competition_get(&self, id: CompetitionId) -> WodsmithResult<Option<Competition>>;

    /// Repoint a competition's divisions at `new_group`, only if the current
    /// pointer equals `expected`. Returns whether the swap happened.
    async fn competition_swap_scaling_group(
        &self,
        id: CompetitionId,
        expected: Option<GroupId>,
        new_group: GroupId,
    ) -> WodsmithResult<bool>;

    // === Registration Operations ===

    /// Registrations referencing a level across all competitions.
    async fn registration_count_for_level(&self, level_id: LevelId) -> WodsmithResult<usize>;

    /// Registrations of one competition in one division.
    async fn registration_count(
        &self,
        competition_id: CompetitionId,
        level_id: LevelId,
    ) -> WodsmithResult<usize>;

    /// Registration counts of one competition for several divisions (bounded
    /// lookup, the competition id takes one parameter). Divisions without
    /// registrations are omitted.
    async fn registration_counts(
        &self,
        competition_id: CompetitionId,
        level_ids: &[LevelId],
    ) -> WodsmithResult<Vec<(LevelId, usize)>>;

    // === Description Operations ===

    /// Per-level descriptions of a workout (bounded lookup, the workout id
    /// takes one parameter).
    async fn descriptions_for_levels(
        &self,
        workout_id: WorkoutId,
        level_ids: &[LevelId],
    ) -> WodsmithResult<Vec<ScalingDescription>>;

    /// Every description of one workout, in no particular order.
    async fn description_list_by_workout(
        &self,
        workout_id: WorkoutId,
    ) -> WodsmithResult<Vec<ScalingDescription>>;

    /// Replace all descriptions of a workout with `rows` in one transaction.
    /// Every row must belong to `workout_id`. Returns the number of rows written.
    async fn description_upsert(
        &self,
        workout_id: WorkoutId,
        rows: &[ScalingDescription],
    ) -> WodsmithResult<usize>;

    /// Maximum bound parameters per query.
    fn max_query_params(&self) -> usize;
}

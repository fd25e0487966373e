//! Wodsmith Test Utilities
//!
//! Shared test infrastructure for the scaling engine workspace:
//! - Permission services that allow, deny or grant per team
//! - Edge stores and repository wrappers that fail or count on purpose
//! - A [`fixtures::Fixture`] seeding the in-memory repository
//! - Proptest generators and custom assertions

// Re-export the in-memory repository from its source crate
pub use wodsmith_storage::{MockRepository, ScalingRepository};

// Re-export core types for convenience
pub use wodsmith_core::{
    Competition, CompetitionId, CompetitionSettings, EntityIdType, EntityType, ErrorKind, GroupId,
    LevelId, Permission, PermissionService, ProgrammingTrack, Registration, RegistrationId,
    ScalingConfig, ScalingDescription, ScalingError, ScalingGroup, ScalingLevel, StorageError,
    Team, TeamId, TrackId, WodsmithError, WodsmithResult, Workout, WorkoutId,
};

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use wodsmith_storage::{EdgeError, EdgeStore, GroupUpdate, LevelUpdate};

// ============================================================================
// PERMISSION SERVICES
// ============================================================================

/// Grants every permission on every team.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllPermissions;

#[async_trait]
impl PermissionService for AllowAllPermissions {
    async fn require_permission(
        &self,
        _team_id: TeamId,
        _permission: Permission,
    ) -> WodsmithResult<()> {
        Ok(())
    }
}

/// Denies every permission with `Forbidden`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyAllPermissions;

#[async_trait]
impl PermissionService for DenyAllPermissions {
    async fn require_permission(
        &self,
        _team_id: TeamId,
        permission: Permission,
    ) -> WodsmithResult<()> {
        Err(ScalingError::forbidden(format!("Missing permission: {}", permission)).into())
    }
}

/// Grants only the listed `(team, permission)` pairs.
#[derive(Debug, Clone, Default)]
pub struct GrantedPermissions {
    grants: HashSet<(TeamId, Permission)>,
}

impl GrantedPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, team_id: TeamId, permission: Permission) -> Self {
        self.grants.insert((team_id, permission));
        self
    }
}

#[async_trait]
impl PermissionService for GrantedPermissions {
    async fn require_permission(
        &self,
        team_id: TeamId,
        permission: Permission,
    ) -> WodsmithResult<()> {
        if self.grants.contains(&(team_id, permission)) {
            Ok(())
        } else {
            Err(ScalingError::forbidden(format!("Missing permission: {}", permission)).into())
        }
    }
}

// ============================================================================
// EDGE STORES
// ============================================================================

/// Edge store whose every operation fails with `Unavailable`.
#[derive(Debug, Default)]
pub struct FailingEdgeStore {
    calls: AtomicU64,
}

impl FailingEdgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of operations attempted against the store.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    fn fail<T>(&self) -> Result<T, EdgeError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Err(EdgeError::Unavailable("connection refused".to_string()))
    }
}

#[async_trait]
impl EdgeStore for FailingEdgeStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, EdgeError> {
        self.fail()
    }

    async fn put(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), EdgeError> {
        self.fail()
    }

    async fn delete(&self, _key: &str) -> Result<(), EdgeError> {
        self.fail()
    }

    async fn delete_prefix(&self, _prefix: &str) -> Result<u64, EdgeError> {
        self.fail()
    }
}

// ============================================================================
// COUNTING REPOSITORY
// ============================================================================

/// Handle on a paused `level_list_by_group` call.
///
/// The paused call has already read from the inner store when
/// [`entered`](Self::entered) returns, and hands that result back once
/// [`release`](Self::release) is called.
#[derive(Debug, Clone, Default)]
pub struct ReadPause {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl ReadPause {
    /// Wait until the paused call has read its rows.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the paused call return.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Repository wrapper counting the queries forwarded to the inner store.
///
/// It can also inject faults:
/// - make the next N competition repoints lose their compare-and-swap
///   without writing, as if another process had raced them;
/// - fail the next N group updates;
/// - hold the next level listing between its read and its return.
pub struct CountingRepository {
    inner: Arc<dyn ScalingRepository>,
    calls: DashMap<&'static str, u64>,
    lost_swaps: AtomicUsize,
    failed_group_updates: AtomicUsize,
    level_list_pause: Mutex<Option<ReadPause>>,
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

impl CountingRepository {
    pub fn new(inner: Arc<dyn ScalingRepository>) -> Self {
        Self {
            inner,
            calls: DashMap::new(),
            lost_swaps: AtomicUsize::new(0),
            failed_group_updates: AtomicUsize::new(0),
            level_list_pause: Mutex::new(None),
        }
    }

    /// Make the next `count` calls to `competition_swap_scaling_group` report a lost race.
    pub fn lose_swaps(&self, count: usize) {
        self.lost_swaps.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` calls to `group_update` fail without writing.
    pub fn fail_group_updates(&self, count: usize) {
        self.failed_group_updates.store(count, Ordering::SeqCst);
    }

    /// Hold the next `level_list_by_group` call after it has read its rows.
    pub fn pause_next_level_list(&self) -> ReadPause {
        let pause = ReadPause::default();
        if let Ok(mut slot) = self.level_list_pause.lock() {
            *slot = Some(pause.clone());
        }
        pause
    }

    /// Number of calls made to one repository method.
    pub fn calls(&self, method: &str) -> u64 {
        self.calls.get(method).map(|c| *c.value()).unwrap_or(0)
    }

    /// Number of calls across all methods.
    pub fn total_calls(&self) -> u64 {
        self.calls.iter().map(|c| *c.value()).sum()
    }

    pub fn reset(&self) {
        self.calls.clear();
    }

    fn record(&self, method: &'static str) {
        *self.calls.entry(method).or_insert(0) += 1;
    }
}

#[async_trait]
impl ScalingRepository for CountingRepository {
    async fn group_insert(&self, group: &ScalingGroup) -> WodsmithResult<()> {
        self.record("group_insert");
        self.inner.group_insert(group).await
    }

    async fn group_get(&self, id: GroupId) -> WodsmithResult<Option<ScalingGroup>> {
        self.record("group_get");
        self.inner.group_get(id).await
    }

    async fn group_update(&self, id: GroupId, update: GroupUpdate) -> WodsmithResult<ScalingGroup> {
        self.record("group_update");
        if take_one(&self.failed_group_updates) {
            return Err(StorageError::UpdateFailed {
                entity_type: EntityType::ScalingGroup,
                id: id.as_uuid(),
                reason: "injected failure".to_string(),
            }
            .into());
        }
        self.inner.group_update(id, update).await
    }

    async fn group_delete(&self, id: GroupId) -> WodsmithResult<bool> {
        self.record("group_delete");
        self.inner.group_delete(id).await
    }

    async fn group_list_visible(
        &self,
        team_id: TeamId,
        include_system: bool,
    ) -> WodsmithResult<Vec<ScalingGroup>> {
        self.record("group_list_visible");
        self.inner.group_list_visible(team_id, include_system).await
    }

    async fn group_global_default(&self) -> WodsmithResult<Option<ScalingGroup>> {
        self.record("group_global_default");
        self.inner.group_global_default().await
    }

    async fn group_set_global_default(&self, id: GroupId) -> WodsmithResult<()> {
        self.record("group_set_global_default");
        self.inner.group_set_global_default(id).await
    }

    async fn group_clear_global_default(&self, id: GroupId) -> WodsmithResult<()> {
        self.record("group_clear_global_default");
        self.inner.group_clear_global_default(id).await
    }

    async fn group_reference_count(&self, id: GroupId) -> WodsmithResult<usize> {
        self.record("group_reference_count");
        self.inner.group_reference_count(id).await
    }

    async fn level_insert(&self, level: &ScalingLevel) -> WodsmithResult<()> {
        self.record("level_insert");
        self.inner.level_insert(level).await
    }

    async fn level_get(&self, id: LevelId) -> WodsmithResult<Option<ScalingLevel>> {
        self.record("level_get");
        self.inner.level_get(id).await
    }

    async fn level_update(&self, id: LevelId, update: LevelUpdate) -> WodsmithResult<ScalingLevel> {
        self.record("level_update");
        self.inner.level_update(id, update).await
    }

    async fn level_delete(&self, id: LevelId) -> WodsmithResult<bool> {
        self.record("level_delete");
        self.inner.level_delete(id).await
    }

    async fn level_list_by_group(&self, group_id: GroupId) -> WodsmithResult<Vec<ScalingLevel>> {
        self.record("level_list_by_group");
        let pause = self
            .level_list_pause
            .lock()
            .ok()
            .and_then(|mut slot| slot.take());
        let levels = self.inner.level_list_by_group(group_id).await;
        if let Some(pause) = pause {
            pause.entered.notify_one();
            pause.release.notified().await;
        }
        levels
    }

    async fn level_list_by_ids(&self, ids: &[LevelId]) -> WodsmithResult<Vec<ScalingLevel>> {
        self.record("level_list_by_ids");
        self.inner.level_list_by_ids(ids).await
    }

    async fn level_max_position(&self, group_id: GroupId) -> WodsmithResult<Option<i32>> {
        self.record("level_max_position");
        self.inner.level_max_position(group_id).await
    }

    async fn workout_get(&self, id: WorkoutId) -> WodsmithResult<Option<Workout>> {
        self.record("workout_get");
        self.inner.workout_get(id).await
    }

    async fn track_get(&self, id: TrackId) -> WodsmithResult<Option<ProgrammingTrack>> {
        self.record("track_get");
        self.inner.track_get(id).await
    }

    async fn team_get(&self, id: TeamId) -> WodsmithResult<Option<Team>> {
        self.record("team_get");
        self.inner.team_get(id).await
    }

    async fn team_set_default_group(
        &self,
        id: TeamId,
        group_id: Option<GroupId>,
    ) -> WodsmithResult<()> {
        self.record("team_set_default_group");
        self.inner.team_set_default_group(id, group_id).await
    }

    async fn competition_get(&self, id: CompetitionId) -> WodsmithResult<Option<Competition>> {
        self.record("competition_get");
        self.inner.competition_get(id).await
    }

    async fn competition_swap_scaling_group(
        &self,
        id: CompetitionId,
        expected: Option<GroupId>,
        new_group: GroupId,
    ) -> WodsmithResult<bool> {
        self.record("competition_swap_scaling_group");
        if take_one(&self.lost_swaps) {
            return Ok(false);
        }
        self.inner
            .competition_swap_scaling_group(id, expected, new_group)
            .await
    }

    async fn registration_count_for_level(&self, level_id: LevelId) -> WodsmithResult<usize> {
        self.record("registration_count_for_level");
        self.inner.registration_count_for_level(level_id).await
    }

    async fn registration_count(
        &self,
        competition_id: CompetitionId,
        level_id: LevelId,
    ) -> WodsmithResult<usize> {
        self.record("registration_count");
        self.inner.registration_count(competition_id, level_id).await
    }

    async fn registration_counts(
        &self,
        competition_id: CompetitionId,
        level_ids: &[LevelId],
    ) -> WodsmithResult<Vec<(LevelId, usize)>> {
        self.record("registration_counts");
        self.inner.registration_counts(competition_id, level_ids).await
    }

    async fn descriptions_for_levels(
        &self,
        workout_id: WorkoutId,
        level_ids: &[LevelId],
    ) -> WodsmithResult<Vec<ScalingDescription>> {
        self.record("descriptions_for_levels");
        self.inner.descriptions_for_levels(workout_id, level_ids).await
    }

    async fn description_list_by_workout(
        &self,
        workout_id: WorkoutId,
    ) -> WodsmithResult<Vec<ScalingDescription>> {
        self.record("description_list_by_workout");
        self.inner.description_list_by_workout(workout_id).await
    }

    async fn description_upsert(
        &self,
        workout_id: WorkoutId,
        rows: &[ScalingDescription],
    ) -> WodsmithResult<usize> {
        self.record("description_upsert");
        self.inner.description_upsert(workout_id, rows).await
    }

    fn max_query_params(&self) -> usize {
        self.inner.max_query_params()
    }
}

// ============================================================================
// TRACING
// ============================================================================

/// Install a test subscriber honouring `RUST_LOG`. Safe to call from every test.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for scaling entities.

    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;
    use wodsmith_storage::NewLevelSpec;

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    pub fn arb_group_id() -> impl Strategy<Value = GroupId> {
        arb_uuid().prop_map(GroupId::new)
    }

    pub fn arb_level_id() -> impl Strategy<Value = LevelId> {
        arb_uuid().prop_map(LevelId::new)
    }

    pub fn arb_team_id() -> impl Strategy<Value = TeamId> {
        arb_uuid().prop_map(TeamId::new)
    }

    /// Division or level label.
    pub fn arb_label() -> impl Strategy<Value = String> {
        "[A-Z][a-z]{2,11}( [A-Z][a-z]{1,7})?"
    }

    pub fn arb_team_size() -> impl Strategy<Value = i32> {
        1..=6i32
    }

    /// Between 1 and `max` levels with contiguous positions.
    pub fn arb_level_specs(max: usize) -> impl Strategy<Value = Vec<NewLevelSpec>> {
        prop::collection::vec((arb_label(), arb_team_size()), 1..=max.max(1)).prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(position, (label, team_size))| NewLevelSpec {
                    label,
                    position: position as i32,
                    team_size,
                })
                .collect()
        })
    }

    /// A permutation of `0..len`.
    pub fn arb_permutation(len: usize) -> impl Strategy<Value = Vec<usize>> {
        Just((0..len).collect::<Vec<_>>()).prop_shuffle()
    }

    /// Which links of the resolution chain are set:
    /// `(workout, track, team default, global default)`.
    pub fn arb_chain_links() -> impl Strategy<Value = (bool, bool, bool, bool)> {
        (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>())
    }

    /// A configuration that passes validation.
    pub fn arb_valid_config() -> impl Strategy<Value = ScalingConfig> {
        (1u64..600, 0u64..7200, 1u64..7200, 2usize..1000, 1u32..10).prop_map(
            |(memory, extra_edge, refresh, params, retries)| {
                ScalingConfig::default()
                    .with_memory_ttl(Duration::from_secs(memory))
                    .with_edge_ttl(Duration::from_secs(memory + extra_edge))
                    .with_global_default_refresh(Duration::from_secs(refresh))
                    .with_max_query_params(params)
                    .with_clone_retry_limit(retries)
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Seeding helpers over [`MockRepository`].
    //!
    //! Fixture methods panic when the repository rejects a row; they are
    //! meant for test setup only.

    use super::*;
    use chrono::Utc;

    /// Builder seeding a shared [`MockRepository`].
    #[derive(Clone)]
    pub struct Fixture {
        repo: Arc<MockRepository>,
    }

    impl Default for Fixture {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Fixture {
        pub fn new() -> Self {
            Self::with_repository(MockRepository::new())
        }

        pub fn with_repository(repo: MockRepository) -> Self {
            Self {
                repo: Arc::new(repo),
            }
        }

        pub fn mock(&self) -> Arc<MockRepository> {
            self.repo.clone()
        }

        pub fn repository(&self) -> Arc<dyn ScalingRepository> {
            self.repo.clone()
        }

        async fn group(
            &self,
            title: &str,
            owner_team_id: Option<TeamId>,
            is_global_default: bool,
            labels: &[&str],
        ) -> ScalingGroup {
            let now = Utc::now();
            let group = ScalingGroup {
                group_id: GroupId::now_v7(),
                title: title.to_string(),
                description: None,
                owner_team_id,
                is_global_default,
                created_at: now,
                updated_at: now,
            };
            self.repo
                .group_insert(&group)
                .await
                .expect("fixture group insert should succeed");
            for (position, label) in labels.iter().enumerate() {
                self.level(group.group_id, label, position as i32).await;
            }
            group
        }

        /// Insert a level with team size 1.
        pub async fn level(&self, group_id: GroupId, label: &str, position: i32) -> ScalingLevel {
            let now = Utc::now();
            let level = ScalingLevel {
                level_id: LevelId::now_v7(),
                group_id,
                label: label.to_string(),
                position,
                team_size: 1,
                created_at: now,
                updated_at: now,
            };
            self.repo
                .level_insert(&level)
                .await
                .expect("fixture level insert should succeed");
            level
        }

        /// A public group; levels get positions in slice order.
        pub async fn system_group(&self, title: &str, labels: &[&str]) -> ScalingGroup {
            self.group(title, None, false, labels).await
        }

        /// The public group flagged as global default.
        pub async fn global_default(&self, title: &str, labels: &[&str]) -> ScalingGroup {
            self.group(title, None, true, labels).await
        }

        pub async fn team_group(
            &self,
            team_id: TeamId,
            title: &str,
            labels: &[&str],
        ) -> ScalingGroup {
            self.group(title, Some(team_id), false, labels).await
        }

        pub async fn levels(&self, group_id: GroupId) -> Vec<ScalingLevel> {
            self.repo
                .level_list_by_group(group_id)
                .await
                .expect("fixture level listing should succeed")
        }

        pub fn team(&self, name: &str, default_scaling_group_id: Option<GroupId>) -> Team {
            let team = Team {
                team_id: TeamId::now_v7(),
                name: name.to_string(),
                default_scaling_group_id,
            };
            self.repo
                .insert_team(team.clone())
                .expect("fixture team insert should succeed");
            team
        }

        pub fn workout(&self, name: &str, scaling_group_id: Option<GroupId>) -> Workout {
            let workout = Workout {
                workout_id: WorkoutId::now_v7(),
                name: name.to_string(),
                scaling_group_id,
            };
            self.repo
                .insert_workout(workout.clone())
                .expect("fixture workout insert should succeed");
            workout
        }

        pub fn track(&self, name: &str, scaling_group_id: Option<GroupId>) -> ProgrammingTrack {
            let track = ProgrammingTrack {
                track_id: TrackId::now_v7(),
                name: name.to_string(),
                scaling_group_id,
            };
            self.repo
                .insert_track(track.clone())
                .expect("fixture track insert should succeed");
            track
        }

        /// A competition organized by `team_id`, optionally already pointing at a group.
        pub fn competition(
            &self,
            name: &str,
            team_id: TeamId,
            scaling_group_id: Option<GroupId>,
        ) -> Competition {
            let settings = match scaling_group_id {
                Some(group_id) => CompetitionSettings::with_scaling_group(group_id),
                None => CompetitionSettings::default(),
            };
            let competition = Competition {
                competition_id: CompetitionId::now_v7(),
                name: name.to_string(),
                organizing_team_id: team_id,
                settings,
                updated_at: Utc::now(),
            };
            self.repo
                .insert_competition(competition.clone())
                .expect("fixture competition insert should succeed");
            competition
        }

        pub fn register(
            &self,
            competition_id: CompetitionId,
            division_id: LevelId,
            athlete_name: &str,
        ) -> Registration {
            let registration = Registration {
                registration_id: RegistrationId::now_v7(),
                competition_id,
                division_id,
                athlete_name: athlete_name.to_string(),
                created_at: Utc::now(),
            };
            self.repo
                .insert_registration(registration.clone())
                .expect("fixture registration insert should succeed");
            registration
        }

        pub fn describe(&self, workout_id: WorkoutId, level_id: LevelId, description: &str) {
            self.repo
                .insert_description(ScalingDescription {
                    workout_id,
                    level_id,
                    description: description.to_string(),
                })
                .expect("fixture description insert should succeed");
        }

        pub async fn competition_group(&self, competition_id: CompetitionId) -> Option<GroupId> {
            self.repo
                .competition_get(competition_id)
                .await
                .expect("fixture competition read should succeed")
                .and_then(|c| c.scaling_group_id())
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over scaling results.

    use super::*;

    #[track_caller]
    pub fn assert_kind<T: std::fmt::Debug>(result: &WodsmithResult<T>, expected: ErrorKind) {
        match result {
            Err(e) => assert_eq!(e.kind(), expected, "Wrong error kind for {:?}", e),
            Ok(v) => panic!("Expected {:?} error, got Ok({:?})", expected, v),
        }
    }

    #[track_caller]
    pub fn assert_forbidden<T: std::fmt::Debug>(result: &WodsmithResult<T>) {
        assert_kind(result, ErrorKind::Forbidden);
    }

    #[track_caller]
    pub fn assert_conflict<T: std::fmt::Debug>(result: &WodsmithResult<T>) {
        assert_kind(result, ErrorKind::Conflict);
    }

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &WodsmithResult<T>) {
        assert_kind(result, ErrorKind::NotFound);
    }

    /// Assert levels are sorted and their positions are exactly `0..len`.
    #[track_caller]
    pub fn assert_positions_contiguous(levels: &[ScalingLevel]) {
        let positions: Vec<i32> = levels.iter().map(|l| l.position).collect();
        let expected: Vec<i32> = (0..levels.len() as i32).collect();
        assert_eq!(positions, expected, "Level positions are not contiguous");
    }

    /// Assert two level lists match on label, position and team size.
    #[track_caller]
    pub fn assert_same_shape(actual: &[ScalingLevel], expected: &[ScalingLevel]) {
        let shape = |levels: &[ScalingLevel]| -> Vec<(String, i32, i32)> {
            levels
                .iter()
                .map(|l| (l.label.clone(), l.position, l.team_size))
                .collect()
        };
        assert_eq!(shape(actual), shape(expected), "Level lists differ");
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_fixture_seeds_group_with_levels() {
        let fixture = fixtures::Fixture::new();
        let group = fixture.system_group("Standard", &["Rx", "Scaled"]).await;
        let levels = fixture.levels(group.group_id).await;
        assert_eq!(levels.len(), 2);
        assertions::assert_positions_contiguous(&levels);
    }

    #[tokio::test]
    async fn test_granted_permissions() {
        let team = TeamId::now_v7();
        let perms = GrantedPermissions::new().grant(team, Permission::ManageProgramming);
        assert!(perms
            .require_permission(team, Permission::ManageProgramming)
            .await
            .is_ok());
        assertions::assert_forbidden(
            &perms
                .require_permission(team, Permission::EditComponents)
                .await,
        );
    }

    #[tokio::test]
    async fn test_counting_repository_counts_and_loses_swaps() {
        let fixture = fixtures::Fixture::new();
        let team = fixture.team("Box", None);
        let group = fixture.team_group(team.team_id, "Ours", &["Open"]).await;
        let comp = fixture.competition("Throwdown", team.team_id, None);

        let counting = CountingRepository::new(fixture.repository());
        counting.lose_swaps(1);
        let first = counting
            .competition_swap_scaling_group(comp.competition_id, None, group.group_id)
            .await
            .unwrap();
        let second = counting
            .competition_swap_scaling_group(comp.competition_id, None, group.group_id)
            .await
            .unwrap();
        assert!(!first);
        assert!(second);
        assert_eq!(counting.calls("competition_swap_scaling_group"), 2);
        assert_eq!(counting.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_failing_edge_store_counts_calls() {
        let store = FailingEdgeStore::new();
        assert!(store.get("k").await.is_err());
        assert!(store.delete_prefix("scaling:").await.is_err());
        assert_eq!(store.calls(), 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_config_is_valid(config in generators::arb_valid_config()) {
            prop_assert!(config.validate().is_ok());
        }

        #[test]
        fn prop_level_specs_are_contiguous(specs in generators::arb_level_specs(8)) {
            for (index, spec) in specs.iter().enumerate() {
                prop_assert_eq!(spec.position, index as i32);
                prop_assert!(spec.team_size >= 1);
            }
        }
    }
}

//! In-memory repository for testing and single-node use.

use crate::{GroupUpdate, LevelUpdate, ScalingRepository};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use wodsmith_core::{
    sort_levels, Competition, CompetitionId, EntityIdType, EntityType, GroupId, LevelId,
    ProgrammingTrack, Registration, RegistrationId, ScalingDescription, ScalingError,
    ScalingGroup, ScalingLevel, StorageError, Team, TeamId, TrackId, Workout, WorkoutId,
    WodsmithResult, DEFAULT_MAX_QUERY_PARAMS,
};

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StorageError> {
    lock.read().map_err(|_| StorageError::LockPoisoned)
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, StorageError> {
    lock.write().map_err(|_| StorageError::LockPoisoned)
}

fn already_exists(entity_type: EntityType) -> StorageError {
    StorageError::InsertFailed {
        entity_type,
        reason: "already exists".to_string(),
    }
}

fn global_default_taken() -> ScalingError {
    ScalingError::conflict("a global default scaling group already exists")
}

/// In-memory [`ScalingRepository`].
///
/// Rows outside the scaling tables (workouts, tracks, teams, competitions,
/// registrations, descriptions) are seeded through the `insert_*` helpers.
#[derive(Debug)]
pub struct MockRepository {
    groups: Arc<RwLock<HashMap<GroupId, ScalingGroup>>>,
    levels: Arc<RwLock<HashMap<LevelId, ScalingLevel>>>,
    workouts: Arc<RwLock<HashMap<WorkoutId, Workout>>>,
    tracks: Arc<RwLock<HashMap<TrackId, ProgrammingTrack>>>,
    teams: Arc<RwLock<HashMap<TeamId, Team>>>,
    competitions: Arc<RwLock<HashMap<CompetitionId, Competition>>>,
    registrations: Arc<RwLock<HashMap<RegistrationId, Registration>>>,
    descriptions: Arc<RwLock<HashMap<(WorkoutId, LevelId), ScalingDescription>>>,
    max_query_params: usize,
}

impl Default for MockRepository {
    fn default() -> Self {
        Self {
            groups: Arc::default(),
            levels: Arc::default(),
            workouts: Arc::default(),
            tracks: Arc::default(),
            teams: Arc::default(),
            competitions: Arc::default(),
            registrations: Arc::default(),
            descriptions: Arc::default(),
            max_query_params: DEFAULT_MAX_QUERY_PARAMS,
        }
    }
}

impl MockRepository {
    /// Create a new mock repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the per-query parameter bound.
    pub fn with_max_query_params(mut self, max: usize) -> Self {
        self.max_query_params = max;
        self
    }

    /// Clear all stored data.
    pub fn clear(&self) -> Result<(), StorageError> {
        write(&self.groups)?.clear();
        write(&self.levels)?.clear();
        write(&self.workouts)?.clear();
        write(&self.tracks)?.clear();
        write(&self.teams)?.clear();
        write(&self.competitions)?.clear();
        write(&self.registrations)?.clear();
        write(&self.descriptions)?.clear();
        Ok(())
    }

    pub fn insert_workout(&self, workout: Workout) -> Result<(), StorageError> {
        write(&self.workouts)?.insert(workout.workout_id, workout);
        Ok(())
    }

    pub fn insert_track(&self, track: ProgrammingTrack) -> Result<(), StorageError> {
        write(&self.tracks)?.insert(track.track_id, track);
        Ok(())
    }

    pub fn insert_team(&self, team: Team) -> Result<(), StorageError> {
        write(&self.teams)?.insert(team.team_id, team);
        Ok(())
    }

    pub fn insert_competition(&self, competition: Competition) -> Result<(), StorageError> {
        write(&self.competitions)?.insert(competition.competition_id, competition);
        Ok(())
    }

    pub fn insert_registration(&self, registration: Registration) -> Result<(), StorageError> {
        let mut registrations = write(&self.registrations)?;
        if registrations.contains_key(&registration.registration_id) {
            return Err(already_exists(EntityType::Registration));
        }
        registrations.insert(registration.registration_id, registration);
        Ok(())
    }

    pub fn insert_description(&self, description: ScalingDescription) -> Result<(), StorageError> {
        write(&self.descriptions)?.insert(
            (description.workout_id, description.level_id),
            description,
        );
        Ok(())
    }

    /// Get count of stored groups.
    pub fn group_count(&self) -> Result<usize, StorageError> {
        Ok(read(&self.groups)?.len())
    }

    /// Get count of stored levels.
    pub fn level_count(&self) -> Result<usize, StorageError> {
        Ok(read(&self.levels)?.len())
    }

    fn check_params(&self, count: usize) -> Result<(), StorageError> {
        if count > self.max_query_params {
            return Err(StorageError::TooManyParameters {
                count,
                limit: self.max_query_params,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ScalingRepository for MockRepository {
    // === Group Operations ===

    async fn group_insert(&self, group: &ScalingGroup) -> WodsmithResult<()> {
        let mut groups = write(&self.groups)?;
        if groups.contains_key(&group.group_id) {
            return Err(already_exists(EntityType::ScalingGroup).into());
        }
        if group.is_global_default && groups.values().any(|g| g.is_global_default) {
            return Err(global_default_taken().into());
        }
        groups.insert(group.group_id, group.clone());
        Ok(())
    }

    async fn group_get(&self, id: GroupId) -> WodsmithResult<Option<ScalingGroup>> {
        Ok(read(&self.groups)?.get(&id).cloned())
    }

    async fn group_update(
        &self,
        id: GroupId,
        update: GroupUpdate,
    ) -> WodsmithResult<ScalingGroup> {
        let mut groups = write(&self.groups)?;
        let group = groups.get_mut(&id).ok_or(StorageError::NotFound {
            entity_type: EntityType::ScalingGroup,
            id: id.as_uuid(),
        })?;

        if let Some(title) = update.title {
            group.title = title;
        }
        if let Some(description) = update.description {
            group.description = description;
        }
        group.updated_at = chrono::Utc::now();

        Ok(group.clone())
    }

    async fn group_delete(&self, id: GroupId) -> WodsmithResult<bool> {
        let removed = write(&self.groups)?.remove(&id).is_some();
        if removed {
            write(&self.levels)?.retain(|_, l| l.group_id != id);
        }
        Ok(removed)
    }

    async fn group_list_visible(
        &self,
        team_id: TeamId,
        include_system: bool,
    ) -> WodsmithResult<Vec<ScalingGroup>> {
        let groups = read(&self.groups)?;
        Ok(groups
            .values()
            .filter(|g| g.is_owned_by(team_id) || (include_system && g.is_system()))
            .cloned()
            .collect())
    }

    async fn group_global_default(&self) -> WodsmithResult<Option<ScalingGroup>> {
        let groups = read(&self.groups)?;
        Ok(groups.values().find(|g| g.is_global_default).cloned())
    }

    async fn group_set_global_default(&self, id: GroupId) -> WodsmithResult<()> {
        let mut groups = write(&self.groups)?;
        if !groups.contains_key(&id) {
            return Err(StorageError::NotFound {
                entity_type: EntityType::ScalingGroup,
                id: id.as_uuid(),
            }
            .into());
        }
        if groups
            .values()
            .any(|g| g.is_global_default && g.group_id != id)
        {
            return Err(global_default_taken().into());
        }
        if let Some(group) = groups.get_mut(&id) {
            group.is_global_default = true;
            group.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn group_clear_global_default(&self, id: GroupId) -> WodsmithResult<()> {
        let mut groups = write(&self.groups)?;
        let group = groups.get_mut(&id).ok_or(StorageError::NotFound {
            entity_type: EntityType::ScalingGroup,
            id: id.as_uuid(),
        })?;
        group.is_global_default = false;
        group.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn group_reference_count(&self, id: GroupId) -> WodsmithResult<usize> {
        let workouts = read(&self.workouts)?
            .values()
            .filter(|w| w.scaling_group_id == Some(id))
            .count();
        let tracks = read(&self.tracks)?
            .values()
            .filter(|t| t.scaling_group_id == Some(id))
            .count();
        let teams = read(&self.teams)?
            .values()
            .filter(|t| t.default_scaling_group_id == Some(id))
            .count();
        let competitions = read(&self.competitions)?
            .values()
            .filter(|c| c.scaling_group_id() == Some(id))
            .count();
        Ok(workouts + tracks + teams + competitions)
    }

    // === Level Operations ===

    async fn level_insert(&self, level: &ScalingLevel) -> WodsmithResult<()> {
        if !read(&self.groups)?.contains_key(&level.group_id) {
            return Err(StorageError::InsertFailed {
                entity_type: EntityType::ScalingLevel,
                reason: format!("scaling group {} does not exist", level.group_id),
            }
            .into());
        }
        let mut levels = write(&self.levels)?;
        if levels.contains_key(&level.level_id) {
            return Err(already_exists(EntityType::ScalingLevel).into());
        }
        levels.insert(level.level_id, level.clone());
        Ok(())
    }

    async fn level_get(&self, id: LevelId) -> WodsmithResult<Option<ScalingLevel>> {
        Ok(read(&self.levels)?.get(&id).cloned())
    }

    async fn level_update(
        &self,
        id: LevelId,
        update: LevelUpdate,
    ) -> WodsmithResult<ScalingLevel> {
        let mut levels = write(&self.levels)?;
        let level = levels.get_mut(&id).ok_or(StorageError::NotFound {
            entity_type: EntityType::ScalingLevel,
            id: id.as_uuid(),
        })?;

        if let Some(label) = update.label {
            level.label = label;
        }
        if let Some(position) = update.position {
            level.position = position;
        }
        if let Some(team_size) = update.team_size {
            level.team_size = team_size;
        }
        level.updated_at = chrono::Utc::now();

        Ok(level.clone())
    }

    async fn level_delete(&self, id: LevelId) -> WodsmithResult<bool> {
        Ok(write(&self.levels)?.remove(&id).is_some())
    }

    async fn level_list_by_group(&self, group_id: GroupId) -> WodsmithResult<Vec<ScalingLevel>> {
        let levels = read(&self.levels)?;
        let mut result: Vec<ScalingLevel> = levels
            .values()
            .filter(|l| l.group_id == group_id)
            .cloned()
            .collect();
        sort_levels(&mut result);
        Ok(result)
    }

    async fn level_list_by_ids(&self, ids: &[LevelId]) -> WodsmithResult<Vec<ScalingLevel>> {
        self.check_params(ids.len())?;
        let levels = read(&self.levels)?;
        Ok(ids.iter().filter_map(|id| levels.get(id).cloned()).collect())
    }

    async fn level_max_position(&self, group_id: GroupId) -> WodsmithResult<Option<i32>> {
        let levels = read(&self.levels)?;
        Ok(levels
            .values()
            .filter(|l| l.group_id == group_id)
            .map(|l| l.position)
            .max())
    }

    // === Resolution Chain Rows ===

    async fn workout_get(&self, id: WorkoutId) -> WodsmithResult<Option<Workout>> {
        Ok(read(&self.workouts)?.get(&id).cloned())
    }

    async fn track_get(&self, id: TrackId) -> WodsmithResult<Option<ProgrammingTrack>> {
        Ok(read(&self.tracks)?.get(&id).cloned())
    }

    async fn team_get(&self, id: TeamId) -> WodsmithResult<Option<Team>> {
        Ok(read(&self.teams)?.get(&id).cloned())
    }

    async fn team_set_default_group(
        &self,
        id: TeamId,
        group_id: Option<GroupId>,
    ) -> WodsmithResult<()> {
        let mut teams = write(&self.teams)?;
        let team = teams.get_mut(&id).ok_or(StorageError::NotFound {
            entity_type: EntityType::Team,
            id: id.as_uuid(),
        })?;
        team.default_scaling_group_id = group_id;
        Ok(())
    }

    // === Competition Operations ===

    async fn competition_get(&self, id: CompetitionId) -> WodsmithResult<Option<Competition>> {
        Ok(read(&self.competitions)?.get(&id).cloned())
    }

    async fn competition_swap_scaling_group(
        &self,
        id: CompetitionId,
        expected: Option<GroupId>,
        new_group: GroupId,
    ) -> WodsmithResult<bool> {
        let mut competitions = write(&self.competitions)?;
        let competition = competitions.get_mut(&id).ok_or(StorageError::NotFound {
            entity_type: EntityType::Competition,
            id: id.as_uuid(),
        })?;
        if competition.scaling_group_id() != expected {
            return Ok(false);
        }
        competition.settings = competition.settings.repointed(new_group);
        competition.updated_at = chrono::Utc::now();
        Ok(true)
    }

    // === Registration Operations ===

    async fn registration_count_for_level(&self, level_id: LevelId) -> WodsmithResult<usize> {
        let registrations = read(&self.registrations)?;
        Ok(registrations
            .values()
            .filter(|r| r.division_id == level_id)
            .count())
    }

    async fn registration_count(
        &self,
        competition_id: CompetitionId,
        level_id: LevelId,
    ) -> WodsmithResult<usize> {
        let registrations = read(&self.registrations)?;
        Ok(registrations
            .values()
            .filter(|r| r.competition_id == competition_id && r.division_id == level_id)
            .count())
    }

    async fn registration_counts(
        &self,
        competition_id: CompetitionId,
        level_ids: &[LevelId],
    ) -> WodsmithResult<Vec<(LevelId, usize)>> {
        self.check_params(level_ids.len() + 1)?;
        let registrations = read(&self.registrations)?;
        let mut counts: HashMap<LevelId, usize> = HashMap::new();
        for registration in registrations
            .values()
            .filter(|r| r.competition_id == competition_id && level_ids.contains(&r.division_id))
        {
            *counts.entry(registration.division_id).or_insert(0) += 1;
        }
        Ok(counts.into_iter().collect())
    }

    // === Description Operations ===

    async fn descriptions_for_levels(
        &self,
        workout_id: WorkoutId,
        level_ids: &[LevelId],
    ) -> WodsmithResult<Vec<ScalingDescription>> {
        self.check_params(level_ids.len() + 1)?;
        let descriptions = read(&self.descriptions)?;
        Ok(level_ids
            .iter()
            .filter_map(|level_id| descriptions.get(&(workout_id, *level_id)).cloned())
            .collect())
    }

    async fn description_list_by_workout(
        &self,
        workout_id: WorkoutId,
    ) -> WodsmithResult<Vec<ScalingDescription>> {
        let descriptions = read(&self.descriptions)?;
        Ok(descriptions
            .values()
            .filter(|d| d.workout_id == workout_id)
            .cloned()
            .collect())
    }

    async fn description_upsert(
        &self,
        workout_id: WorkoutId,
        rows: &[ScalingDescription],
    ) -> WodsmithResult<usize> {
        if let Some(stray) = rows.iter().find(|d| d.workout_id != workout_id) {
            return Err(StorageError::InsertFailed {
                entity_type: EntityType::ScalingDescription,
                reason: format!("description belongs to workout {}", stray.workout_id),
            }
            .into());
        }
        let mut descriptions = write(&self.descriptions)?;
        descriptions.retain(|(workout, _), _| *workout != workout_id);
        for row in rows {
            descriptions.insert((workout_id, row.level_id), row.clone());
        }
        Ok(rows.len())
    }

    fn max_query_params(&self) -> usize {
        self.max_query_params
    }
}

//! Entity types for scaling groups, levels and the rows that point at them.

use crate::identity::{
    CompetitionId, GroupId, LevelId, RegistrationId, TeamId, Timestamp, TrackId, WorkoutId,
};
use crate::settings::CompetitionSettings;
use serde::{Deserialize, Serialize};

/// Marker a competition-owned group's title carries.
pub const DIVISIONS_TITLE_MARKER: &str = "Divisions";

/// Labels and positions of the divisions a fresh competition starts with.
pub const DEFAULT_DIVISIONS: [(&str, i32); 2] = [("Open", 0), ("Scaled", 1)];

/// Title given to a group a competition owns.
pub fn competition_group_title(competition_name: &str) -> String {
    format!("{} {}", competition_name, DIVISIONS_TITLE_MARKER)
}

/// A named, ordered set of scaling levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingGroup {
    pub group_id: GroupId,
    pub title: String,
    pub description: Option<String>,
    /// Owning team; `None` marks a public/system group.
    pub owner_team_id: Option<TeamId>,
    /// Whether this is the system-wide fallback group.
    pub is_global_default: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ScalingGroup {
    /// System groups have no owning team and may not be edited by tenants.
    pub fn is_system(&self) -> bool {
        self.owner_team_id.is_none()
    }

    pub fn is_owned_by(&self, team_id: TeamId) -> bool {
        self.owner_team_id == Some(team_id)
    }
}

/// One ordered entry within a group; position 0 is hardest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingLevel {
    pub level_id: LevelId,
    pub group_id: GroupId,
    pub label: String,
    pub position: i32,
    pub team_size: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Sort levels hardest-first, breaking position ties by id so the order is stable.
pub fn sort_levels(levels: &mut [ScalingLevel]) {
    levels.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.level_id.cmp(&b.level_id))
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_id: TeamId,
    pub name: String,
    pub default_scaling_group_id: Option<GroupId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workout {
    pub workout_id: WorkoutId,
    pub name: String,
    pub scaling_group_id: Option<GroupId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgrammingTrack {
    pub track_id: TrackId,
    pub name: String,
    pub scaling_group_id: Option<GroupId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Competition {
    pub competition_id: CompetitionId,
    pub name: String,
    pub organizing_team_id: TeamId,
    pub settings: CompetitionSettings,
    pub updated_at: Timestamp,
}

impl Competition {
    /// The group this competition's divisions currently point at.
    pub fn scaling_group_id(&self) -> Option<GroupId> {
        self.settings.scaling_group_id()
    }
}

/// An athlete's registration in a competition division.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub registration_id: RegistrationId,
    pub competition_id: CompetitionId,
    pub division_id: LevelId,
    pub athlete_name: String,
    pub created_at: Timestamp,
}

/// Per-workout text describing how a level performs the workout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingDescription {
    pub workout_id: WorkoutId,
    pub level_id: LevelId,
    pub description: String,
}

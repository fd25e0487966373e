//! Enum types for scaling entities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Entity type discriminator for error reporting and cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    ScalingGroup,
    ScalingLevel,
    Competition,
    Workout,
    ProgrammingTrack,
    Team,
    Registration,
    ScalingDescription,
}

impl EntityType {
    /// Stable lowercase name used in cache keys and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::ScalingGroup => "scaling_group",
            EntityType::ScalingLevel => "scaling_level",
            EntityType::Competition => "competition",
            EntityType::Workout => "workout",
            EntityType::ProgrammingTrack => "programming_track",
            EntityType::Team => "team",
            EntityType::Registration => "registration",
            EntityType::ScalingDescription => "scaling_description",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Team-scoped permissions consulted before writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Create, edit and delete scaling groups and levels owned by the team.
    EditComponents,
    /// Manage the team's competitions and their divisions.
    ManageProgramming,
}

impl Permission {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Permission::EditComponents => "edit_components",
            Permission::ManageProgramming => "manage_programming",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, PermissionParseError> {
        match s.to_lowercase().as_str() {
            "edit_components" => Ok(Permission::EditComponents),
            "manage_programming" => Ok(Permission::ManageProgramming),
            _ => Err(PermissionParseError(s.to_string())),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for Permission {
    type Err = PermissionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid permission string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionParseError(pub String);

impl fmt::Display for PermissionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid permission: {}", self.0)
    }
}

impl std::error::Error for PermissionParseError {}

/// Which link of the resolution chain produced a scaling group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResolutionSource {
    Workout,
    Track,
    TeamDefault,
    GlobalDefault,
    /// Nothing in the chain pointed at a group.
    Unresolved,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_roundtrip() {
        for p in [Permission::EditComponents, Permission::ManageProgramming] {
            assert_eq!(p.as_db_str().parse::<Permission>().unwrap(), p);
        }
        assert!("admin".parse::<Permission>().is_err());
    }

    #[test]
    fn test_entity_type_display() {
        assert_eq!(EntityType::ScalingGroup.to_string(), "scaling_group");
        assert_eq!(EntityType::ScalingLevel.to_string(), "scaling_level");
    }
}

//! Identity types for scaling entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Entity identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation time.
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 EntityId (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

/// Common surface shared by every strongly-typed identifier.
pub trait EntityIdType: Copy + Eq + std::hash::Hash + fmt::Debug + fmt::Display {
    /// Wrap a raw UUID.
    fn new(id: Uuid) -> Self;

    /// Unwrap to the raw UUID.
    fn as_uuid(&self) -> Uuid;

    /// Generate a fresh timestamp-sortable identifier.
    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }

    /// The all-zero identifier, useful as a sentinel in tests.
    fn nil() -> Self {
        Self::new(Uuid::nil())
    }
}

macro_rules! define_entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl EntityIdType for $name {
            fn new(id: Uuid) -> Self {
                Self(id)
            }

            fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

define_entity_id!(
    /// Identifier of a scaling group.
    GroupId
);
define_entity_id!(
    /// Identifier of a scaling level (a competition "division" when the group
    /// belongs to a competition).
    LevelId
);
define_entity_id!(
    /// Identifier of a team (gym, organizer).
    TeamId
);
define_entity_id!(
    /// Identifier of a competition.
    CompetitionId
);
define_entity_id!(
    /// Identifier of a workout.
    WorkoutId
);
define_entity_id!(
    /// Identifier of a programming track.
    TrackId
);
define_entity_id!(
    /// Identifier of a competition registration.
    RegistrationId
);

/// Source of collision-resistant identifiers for newly created rows.
pub trait IdGenerator: Send + Sync {
    /// Produce the next identifier.
    fn next_id(&self) -> Uuid;
}

/// Default generator backed by UUIDv7.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidV7Generator;

impl IdGenerator for UuidV7Generator {
    fn next_id(&self) -> Uuid {
        new_entity_id()
    }
}

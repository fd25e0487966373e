//! Error types for scaling operations

use crate::EntityType;
use thiserror::Error;
use uuid::Uuid;

/// Storage layer errors raised by repository implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type:?} with id {id}")]
    NotFound { entity_type: EntityType, id: Uuid },

    #[error("Insert failed for {entity_type:?}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    #[error("Update failed for {entity_type:?} with id {id}: {reason}")]
    UpdateFailed {
        entity_type: EntityType,
        id: Uuid,
        reason: String,
    },

    #[error("Query bound {count} parameters, limit is {limit}")]
    TooManyParameters { count: usize, limit: usize },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("Storage backend error: {reason}")]
    Backend { reason: String },
}

/// Domain errors of the scaling engine, following the four-way taxonomy
/// callers render to users.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScalingError {
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: EntityType, id: Uuid },

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Conflict: {reason}")]
    Conflict { reason: String },

    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl ScalingError {
    pub fn not_found(entity_type: EntityType, id: Uuid) -> Self {
        Self::NotFound { entity_type, id }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        Self::Conflict {
            reason: reason.into(),
        }
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal {
            reason: reason.into(),
        }
    }

    /// Human-readable reason without the variant prefix.
    pub fn reason(&self) -> String {
        match self {
            Self::NotFound { entity_type, id } => format!("{} not found: {}", entity_type, id),
            Self::Forbidden { reason } | Self::Conflict { reason } | Self::Internal { reason } => {
                reason.clone()
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Incompatible options: {option_a} and {option_b}")]
    IncompatibleOptions { option_a: String, option_b: String },
}

/// Settings (de)serialization and migration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Malformed competition settings: {reason}")]
    Malformed { reason: String },

    #[error("Unsupported settings schema version {found}, newest known is {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Coarse classification every error maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    Internal,
}

/// Master error type for all Wodsmith scaling errors.
#[derive(Debug, Clone, Error)]
pub enum WodsmithError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Scaling error: {0}")]
    Scaling(#[from] ScalingError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

impl WodsmithError {
    /// Classify this error into the NotFound/Forbidden/Conflict/Internal taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WodsmithError::Scaling(ScalingError::NotFound { .. })
            | WodsmithError::Storage(StorageError::NotFound { .. }) => ErrorKind::NotFound,
            WodsmithError::Scaling(ScalingError::Forbidden { .. }) => ErrorKind::Forbidden,
            WodsmithError::Scaling(ScalingError::Conflict { .. }) => ErrorKind::Conflict,
            _ => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_forbidden(&self) -> bool {
        self.kind() == ErrorKind::Forbidden
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

/// Result type alias for Wodsmith operations.
pub type WodsmithResult<T> = Result<T, WodsmithError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            entity_type: EntityType::ScalingGroup,
            id: Uuid::nil(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Entity not found"));
        assert!(msg.contains("ScalingGroup"));
        assert!(msg.contains("00000000-0000-0000-0000-000000000000"));
    }

    #[test]
    fn test_storage_error_display_too_many_parameters() {
        let err = StorageError::TooManyParameters {
            count: 150,
            limit: 100,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("150"));
        assert!(msg.contains("100"));
    }

    #[test]
    fn test_scaling_error_display_conflict() {
        let err = ScalingError::conflict("Cannot delete: 3 athletes registered in this division");
        let msg = format!("{}", err);
        assert!(msg.starts_with("Conflict"));
        assert!(msg.contains("3 athletes"));
    }

    #[test]
    fn test_error_kind_classification() {
        let not_found: WodsmithError =
            ScalingError::not_found(EntityType::Competition, Uuid::nil()).into();
        assert_eq!(not_found.kind(), ErrorKind::NotFound);

        let storage_missing: WodsmithError = StorageError::NotFound {
            entity_type: EntityType::ScalingLevel,
            id: Uuid::nil(),
        }
        .into();
        assert!(storage_missing.is_not_found());

        let forbidden: WodsmithError = ScalingError::forbidden("wrong team").into();
        assert!(forbidden.is_forbidden());

        let conflict: WodsmithError = ScalingError::conflict("last level").into();
        assert!(conflict.is_conflict());

        let poisoned: WodsmithError = StorageError::LockPoisoned.into();
        assert_eq!(poisoned.kind(), ErrorKind::Internal);

        let internal: WodsmithError = ScalingError::internal("no row returned").into();
        assert_eq!(internal.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_wodsmith_error_from_variants() {
        let storage = WodsmithError::from(StorageError::LockPoisoned);
        assert!(matches!(storage, WodsmithError::Storage(_)));

        let config = WodsmithError::from(ConfigError::InvalidValue {
            field: "memory_ttl".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        });
        assert!(matches!(config, WodsmithError::Config(_)));

        let settings = WodsmithError::from(SettingsError::UnsupportedVersion {
            found: 9,
            supported: 2,
        });
        assert!(matches!(settings, WodsmithError::Settings(_)));
    }
}

//! Typed competition settings.
//!
//! Competitions used to keep their settings in a free-form JSON blob that
//! every read site parsed on its own. [`CompetitionSettings`] replaces that
//! with a versioned record. [`CompetitionSettings::from_json`] accepts both
//! the current encoding and the legacy unversioned blob.

use crate::error::SettingsError;
use crate::identity::GroupId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Newest settings schema this crate writes.
pub const SETTINGS_SCHEMA_VERSION: u32 = 2;

/// Division configuration of a competition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DivisionSettings {
    pub scaling_group_id: GroupId,
}

/// Versioned competition settings.
///
/// Keys owned by other parts of the application are carried through
/// untouched in `extra`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionSettings {
    pub schema_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub divisions: Option<DivisionSettings>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for CompetitionSettings {
    fn default() -> Self {
        Self {
            schema_version: SETTINGS_SCHEMA_VERSION,
            divisions: None,
            extra: Map::new(),
        }
    }
}

impl CompetitionSettings {
    pub fn with_scaling_group(group_id: GroupId) -> Self {
        Self::default().repointed(group_id)
    }

    pub fn scaling_group_id(&self) -> Option<GroupId> {
        self.divisions.map(|d| d.scaling_group_id)
    }

    /// Copy of these settings pointing the divisions at `group_id`.
    pub fn repointed(&self, group_id: GroupId) -> Self {
        Self {
            schema_version: SETTINGS_SCHEMA_VERSION,
            divisions: Some(DivisionSettings {
                scaling_group_id: group_id,
            }),
            extra: self.extra.clone(),
        }
    }

    /// Parse stored settings, migrating the legacy blob when needed.
    ///
    /// Empty input and JSON `null` yield default settings.
    pub fn from_json(raw: &str) -> Result<Self, SettingsError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_str(trimmed).map_err(|e| SettingsError::Malformed {
            reason: e.to_string(),
        })?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, SettingsError> {
        let object = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(object) => object,
            other => {
                return Err(SettingsError::Malformed {
                    reason: format!("expected an object, found {}", other),
                })
            }
        };

        match object.get("schemaVersion").and_then(Value::as_u64) {
            Some(version) => {
                let version = u32::try_from(version).unwrap_or(u32::MAX);
                if version > SETTINGS_SCHEMA_VERSION {
                    return Err(SettingsError::UnsupportedVersion {
                        found: version,
                        supported: SETTINGS_SCHEMA_VERSION,
                    });
                }
                let mut settings: Self = serde_json::from_value(Value::Object(object))
                    .map_err(|e| SettingsError::Malformed {
                        reason: e.to_string(),
                    })?;
                settings.schema_version = SETTINGS_SCHEMA_VERSION;
                Ok(settings)
            }
            None => Self::migrate_legacy(object),
        }
    }

    /// Legacy blobs: `{"divisions": {"scalingGroupId": "<uuid>"}, ...}` with
    /// no version marker. Missing or null pointers mean "unconfigured".
    fn migrate_legacy(mut object: Map<String, Value>) -> Result<Self, SettingsError> {
        let divisions = match object.remove("divisions") {
            None | Some(Value::Null) => None,
            Some(Value::Object(divisions)) => match divisions.get("scalingGroupId") {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) if s.is_empty() => None,
                Some(Value::String(s)) => {
                    let group_id = s.parse::<GroupId>().map_err(|e| SettingsError::Malformed {
                        reason: format!("divisions.scalingGroupId: {}", e),
                    })?;
                    Some(DivisionSettings {
                        scaling_group_id: group_id,
                    })
                }
                Some(other) => {
                    return Err(SettingsError::Malformed {
                        reason: format!("divisions.scalingGroupId: unexpected {}", other),
                    })
                }
            },
            Some(other) => {
                return Err(SettingsError::Malformed {
                    reason: format!("divisions: unexpected {}", other),
                })
            }
        };
        object.remove("schemaVersion");

        Ok(Self {
            schema_version: SETTINGS_SCHEMA_VERSION,
            divisions,
            extra: object,
        })
    }

    pub fn to_json(&self) -> Result<String, SettingsError> {
        serde_json::to_string(self).map_err(|e| SettingsError::Malformed {
            reason: e.to_string(),
        })
    }
}

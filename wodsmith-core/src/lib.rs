//! Wodsmith Core - Scaling Domain Types
//!
//! Data structures shared by the scaling engine crates: typed identifiers,
//! entities, competition settings, errors, configuration and the permission
//! seam. This crate holds no storage or caching logic.

mod config;
mod entities;
mod enums;
mod error;
mod identity;
mod permission;
mod settings;

pub use config::*;
pub use entities::*;
pub use enums::*;
pub use error::*;
pub use identity::*;
pub use permission::PermissionService;
pub use settings::*;

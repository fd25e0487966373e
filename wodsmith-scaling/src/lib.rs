//! Wodsmith Scaling - Resolution, Ownership and Division Lifecycle
//!
//! Sits on top of `wodsmith-storage`:
//!
//! - [`ScalingResolver`] walks the workout, track, team default and global
//!   default chain and returns the winning group's levels through the
//!   [`TieredCache`](wodsmith_storage::TieredCache).
//! - [`OwnershipGate`] gives every competition its own copy of the group its
//!   divisions point at before anything edits it.
//! - [`DivisionManager`] adds, renames, deletes and reorders a competition's
//!   divisions on that owned copy.

pub mod divisions;
pub mod lock;
pub mod ownership;
pub mod resolution;

pub use divisions::{DivisionManager, DivisionWithCount};
pub use lock::CompetitionLocks;
pub use ownership::{DivisionState, EnsureOwned, OwnershipGate};
pub use resolution::{Resolution, ResolvedWithDescriptions, ScalingResolver};

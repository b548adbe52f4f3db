//! Rankguard - Core Logic
//!
//! Group-based permission resolution for game servers. Players are assigned
//! to groups (optionally for a limited time); groups carry ordered allow and
//! deny wildcard patterns; the engine answers permission checks from cache and
//! defers to the host's own permission system whenever a group has no opinion.
//!
//! # Modules
//!
//! - [`permissions`] - pattern compilation, groups, host-override resolution
//! - [`store`] - group and player caches with deduplicated loading
//! - [`storage`] - the persistence contract and an in-memory backend
//! - [`expiry`] - periodic demotion of lapsed ranks
//! - [`engine`] - the [`PermissionEngine`] facade tying it all together

pub mod config;
pub mod duration;
pub mod engine;
pub mod error;
pub mod expiry;
pub mod listeners;
pub mod permissions;
pub mod player;
pub mod storage;
pub mod store;

// Re-export commonly used items
pub use engine::PermissionEngine;
pub use error::{EngineError, EngineResult, StorageError, StorageResult};
pub use expiry::{ExpirySweeper, SweeperHandle};
pub use player::{current_millis, GroupAssignment, PlayerId, PlayerRecord, Rank, RankExpiry};
pub use store::{GroupStore, PlayerStore};

// Re-export permission types
pub use permissions::{
    create_regex_from_input, Decision, FallbackDecision, HostFallback, Matcher, OverrideResolver,
    PatternCache, PatternKind, PermissionGroup,
};

// Re-export storage types
pub use storage::{GroupPermissions, GroupRecord, GroupRow, MemoryStorage, PermissionStorage, PlayerRow};

// Re-export listeners
pub use listeners::{ListenerKey, Listeners, RankExpired};

// Re-export config types
pub use config::{ConfigError, ConfigResult, EngineConfig};

// Re-export duration parsing
pub use duration::{parse_duration_input, DurationParseError};

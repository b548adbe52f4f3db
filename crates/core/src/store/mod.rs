//! Group and player caches
//!
//! Both stores follow the same contract:
//!
//! - `get_cached` never waits on storage and is what permission checks use
//! - `get_or_load` fills the cache asynchronously, with at most one concurrent
//!   storage fetch per key
//! - entries live until explicitly removed; there is no time-based expiry
//!
//! ```text
//! OverrideResolver ─► PlayerStore ─► PlayerRecord ─► GroupStore ─► PermissionGroup
//!                         │                              │
//!                         └──── get_or_load ─────────────┴──► PermissionStorage
//! ```

mod flight;
mod groups;
mod players;

pub use flight::SingleFlight;
pub use groups::GroupStore;
pub use players::PlayerStore;

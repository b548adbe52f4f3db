//! Rank lifecycle events
//!
//! - OnRankExpired: a time-bound rank lapsed and the player was moved back to
//!   the default group

use crate::player::{GroupAssignment, PlayerId, RankExpiry};

/// A player was demoted because their rank lapsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankExpired {
    pub player_id: PlayerId,
    /// The group the player held before the demotion
    pub group: GroupAssignment,
    /// The deadline that passed
    pub expiry: RankExpiry,
}

// Callback types
pub type RankExpiredCallback = Box<dyn Fn(&RankExpired) + Send + Sync>;

//! Permission evaluation for Rankguard
//!
//! Groups hold ordered allow and deny pattern lists. A pattern is a dotted
//! permission name where `*` matches any run of characters, so `chat.*`
//! covers `chat.send` and `chat.color.red`. Matching is case-insensitive and
//! always spans the whole permission name.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   OverrideResolver                        │
//! │   group decision (if set)  ──or──  host fallback          │
//! └──────────────┬───────────────────────────────────────────┘
//!                │ decide(permission)
//!                ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  PermissionGroup                                          │
//! │    memo: permission → Allowed | Denied | Unset            │
//! │    allowed: [pattern, ...]   denied: [pattern, ...]       │
//! └──────────────┬───────────────────────────────────────────┘
//!                │ compile(pattern)
//!                ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  PatternCache (shared): pattern → Matcher                 │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Evaluation Order
//!
//! The allow list is scanned first and the first match grants. Only if no
//! allow pattern matches is the deny list scanned. A permission matched by
//! neither list is `Unset` and the caller decides what that means.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use rankguard_core::permissions::{PatternCache, PermissionGroup};
//!
//! let patterns = Arc::new(PatternCache::new());
//! let vip = PermissionGroup::new(
//!     "vip",
//!     "[VIP] ",
//!     false,
//!     vec!["chat.*".into()],
//!     vec!["chat.admin".into()],
//!     patterns,
//! );
//!
//! assert!(vip.has_permission("chat.color"));
//! assert!(!vip.is_permission_set("build.place"));
//! ```

mod group;
mod pattern;
mod resolver;
mod types;

pub use group::PermissionGroup;
pub use pattern::{create_regex_from_input, Matcher, PatternCache, PatternCacheStats};
pub use resolver::{compose_has, compose_is_set, FallbackDecision, HostFallback, OverrideResolver};
pub use types::{Decision, PatternKind, SEGMENT_SEPARATOR, WILDCARD};

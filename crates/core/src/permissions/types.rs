//! Permission types and constants
//!
//! This module defines the core value types shared by groups, stores and the
//! override resolver.

/// Wildcard character in permission patterns
pub const WILDCARD: char = '*';

/// Segment separator in permission names
pub const SEGMENT_SEPARATOR: char = '.';

/// Which list of a group a pattern belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// Pattern grants matching permissions
    Allow,
    /// Pattern denies matching permissions
    Deny,
}

/// Resolved outcome of scanning a group's patterns for one permission
///
/// A permission is "set" when any pattern matched, and "granted" only when the
/// first match was in the allow list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// First match was in the allow list
    Allowed,
    /// First match was in the deny list
    Denied,
    /// No pattern matched
    Unset,
}

impl Decision {
    /// Whether the permission is granted (implicit deny for [`Decision::Unset`])
    pub fn is_granted(self) -> bool {
        matches!(self, Decision::Allowed)
    }

    /// Whether some pattern had an opinion about the permission
    pub fn is_set(self) -> bool {
        !matches!(self, Decision::Unset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_granted_and_set() {
        assert!(Decision::Allowed.is_granted());
        assert!(Decision::Allowed.is_set());

        assert!(!Decision::Denied.is_granted());
        assert!(Decision::Denied.is_set());

        assert!(!Decision::Unset.is_granted());
        assert!(!Decision::Unset.is_set());
    }
}

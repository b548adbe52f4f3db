//! Wildcard pattern compilation cache
//!
//! Wildcard permissions such as `minecraft.command.*` are converted to
//! case-insensitive, fully anchored regular expressions. The same literal
//! pattern recurs across many groups, so compiled matchers are memoized in a
//! shared [`PatternCache`] that is injected into every group.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use regex::{Regex, RegexBuilder};

use super::types::{SEGMENT_SEPARATOR, WILDCARD};

/// Converts a wildcard permission into its (unanchored) regex source
///
/// Literal dots are escaped and each `*` becomes a greedy `(.*)` group.
///
/// `hello.world.*` -> `hello\.world\.(.*)`
pub fn create_regex_from_input(input: &str) -> String {
    input
        .replace(SEGMENT_SEPARATOR, "\\.")
        .replace(WILDCARD, "(.*)")
}

/// A compiled permission pattern
#[derive(Debug)]
pub enum Matcher {
    /// Wildcard pattern compiled to an anchored regex
    Regex(Regex),
    /// Fallback for patterns whose regex form does not compile
    Literal(String),
}

impl Matcher {
    /// Compile a wildcard pattern, degrading to exact (case-insensitive)
    /// matching if the converted regex is malformed
    pub fn compile(pattern: &str) -> Self {
        let source = create_regex_from_input(pattern);
        match RegexBuilder::new(&format!("^(?:{source})$"))
            .case_insensitive(true)
            .build()
        {
            Ok(regex) => Matcher::Regex(regex),
            Err(e) => {
                tracing::warn!(
                    "Malformed permission pattern {:?}, falling back to literal match: {}",
                    pattern,
                    e
                );
                Matcher::Literal(pattern.to_lowercase())
            }
        }
    }

    /// Whether the whole permission name matches
    pub fn matches(&self, permission: &str) -> bool {
        match self {
            Matcher::Regex(regex) => regex.is_match(permission),
            Matcher::Literal(literal) => permission.to_lowercase() == *literal,
        }
    }

    /// `true` if this matcher is the literal fallback
    pub fn is_literal(&self) -> bool {
        matches!(self, Matcher::Literal(_))
    }
}

/// Shared memo of compiled wildcard patterns
#[derive(Debug, Default)]
pub struct PatternCache {
    patterns: DashMap<String, Arc<Matcher>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PatternCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the compiled matcher for a pattern, compiling it on first use
    pub fn compile(&self, pattern: &str) -> Arc<Matcher> {
        if let Some(matcher) = self.patterns.get(pattern) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Arc::clone(matcher.value());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let compiled = Arc::new(Matcher::compile(pattern));
        // Another thread may have compiled the same pattern meanwhile; keep theirs
        Arc::clone(
            self.patterns
                .entry(pattern.to_string())
                .or_insert(compiled)
                .value(),
        )
    }

    /// Number of distinct patterns compiled
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Check if no pattern has been compiled yet
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Drop every compiled pattern
    pub fn clear(&self) {
        self.patterns.clear();
    }

    /// Get cache statistics
    pub fn stats(&self) -> PatternCacheStats {
        PatternCacheStats {
            size: self.patterns.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Pattern cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternCacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_transformation() {
        assert_eq!(create_regex_from_input("hello.world.*"), r"hello\.world\.(.*)");
        assert_eq!(create_regex_from_input("*"), "(.*)");
        assert_eq!(create_regex_from_input("plain"), "plain");
    }

    #[test]
    fn test_full_string_match() {
        let matcher = Matcher::compile("hello.world");

        assert!(matcher.matches("hello.world"));
        assert!(!matcher.matches("hello.world.extra"));
        assert!(!matcher.matches("say.hello.world"));
        // Escaped dot must not match arbitrary characters
        assert!(!matcher.matches("helloXworld"));
    }

    #[test]
    fn test_wildcard_match() {
        let matcher = Matcher::compile("minecraft.command.*");

        assert!(matcher.matches("minecraft.command.gamemode"));
        assert!(matcher.matches("minecraft.command.a.b.c"));
        assert!(matcher.matches("minecraft.command."));
        assert!(!matcher.matches("minecraft.commands"));
        assert!(!matcher.matches("bukkit.command.gamemode"));
    }

    #[test]
    fn test_case_insensitive() {
        let matcher = Matcher::compile("Minecraft.Command.*");

        assert!(matcher.matches("minecraft.command.TP"));
        assert!(matcher.matches("MINECRAFT.COMMAND.tp"));
    }

    #[test]
    fn test_malformed_pattern_falls_back_to_literal() {
        let matcher = Matcher::compile("broken[pattern");

        assert!(matcher.is_literal());
        assert!(matcher.matches("broken[pattern"));
        assert!(matcher.matches("BROKEN[PATTERN"));
        assert!(!matcher.matches("brokenXpattern"));
    }

    #[test]
    fn test_cache_memoizes() {
        let cache = PatternCache::new();
        assert!(cache.is_empty());

        let first = cache.compile("a.*");
        let second = cache.compile("a.*");
        cache.compile("b.*");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 2);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_separate_caches_are_isolated() {
        let a = PatternCache::new();
        let b = PatternCache::new();

        a.compile("x.*");
        assert_eq!(a.len(), 1);
        assert!(b.is_empty());
    }
}

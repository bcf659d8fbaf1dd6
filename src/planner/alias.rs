//! Collision-free table alias allocation.
//!
//! A child alias is the parent alias followed by the shortest lowercase
//! prefix of the relationship name that is still free:
//!
//! ```text
//!   parent "v", relationships Email, Event, Export
//!     Email  -> ve
//!     Event  -> ve (taken) -> vev
//!     Export -> ve (taken) -> vex
//! ```
//!
//! When every prefix is taken the allocator falls back to the first letter
//! plus a numeric suffix (`ve0`, `ve1`, ...).

use std::collections::HashSet;

use super::{PlanError, PlanResult};

/// Tuning for alias allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasOptions {
    /// Well-known relationship-name prefixes removed before allocation.
    pub strip_prefixes: Vec<String>,
    /// Highest numeric suffix tried by the fallback strategy.
    pub max_numeric_suffix: u32,
}

impl Default for AliasOptions {
    fn default() -> Self {
        Self {
            strip_prefixes: vec!["rel_".to_string()],
            max_numeric_suffix: 999,
        }
    }
}

/// Allocates aliases for one fetch-plan build.
///
/// The used set only grows; an allocator is dropped with the plan it built.
#[derive(Debug, Clone)]
pub struct AliasAllocator {
    used: HashSet<String>,
    options: AliasOptions,
}

impl AliasAllocator {
    /// Create an allocator with `root` already taken.
    pub fn new(root: &str, options: AliasOptions) -> Self {
        let mut used = HashSet::new();
        used.insert(root.to_string());
        Self { used, options }
    }

    pub fn is_used(&self, alias: &str) -> bool {
        self.used.contains(alias)
    }

    /// Aliases handed out so far, including the root.
    pub fn used(&self) -> impl Iterator<Item = &str> {
        self.used.iter().map(String::as_str)
    }

    /// Allocate an alias for `relationship` below `parent`.
    pub fn allocate(&mut self, parent: &str, relationship: &str) -> PlanResult<String> {
        let name = self.strip_prefix(relationship);
        let Some(first) = name.chars().next() else {
            return Err(PlanError::EmptyRelationshipName);
        };

        let lowered: Vec<char> = name.chars().flat_map(char::to_lowercase).collect();
        for len in 1..=lowered.len() {
            let candidate: String = parent
                .chars()
                .chain(lowered[..len].iter().copied())
                .collect();
            if self.claim(&candidate) {
                return Ok(candidate);
            }
        }

        let first: String = first.to_lowercase().collect();
        for suffix in 0..=self.options.max_numeric_suffix {
            let candidate = format!("{}{}{}", parent, first, suffix);
            if self.claim(&candidate) {
                return Ok(candidate);
            }
        }

        tracing::error!(
            parent = parent,
            relationship = relationship,
            "alias space exhausted"
        );
        Err(PlanError::AliasExhausted {
            parent: parent.to_string(),
            relationship: relationship.to_string(),
        })
    }

    fn claim(&mut self, candidate: &str) -> bool {
        if self.used.contains(candidate) {
            false
        } else {
            self.used.insert(candidate.to_string());
            true
        }
    }

    fn strip_prefix<'n>(&self, name: &'n str) -> &'n str {
        for prefix in &self.options.strip_prefixes {
            if let Some(rest) = name.strip_prefix(prefix.as_str()) {
                if !rest.is_empty() {
                    return rest;
                }
            }
        }
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_first_letter() {
        let mut aliases = AliasAllocator::new("v", AliasOptions::default());
        assert_eq!(aliases.allocate("v", "Email").unwrap(), "ve");
        assert_eq!(aliases.allocate("v", "Event").unwrap(), "vev");
        assert_eq!(aliases.allocate("v", "Export").unwrap(), "vex");
    }

    #[test]
    fn test_strips_known_prefix() {
        let mut aliases = AliasAllocator::new("o", AliasOptions::default());
        assert_eq!(aliases.allocate("o", "rel_owner").unwrap(), "oo");
        // A prefix that is the whole name is kept.
        assert_eq!(aliases.allocate("o", "rel_").unwrap(), "or");
    }

    #[test]
    fn test_numeric_fallback() {
        let mut aliases = AliasAllocator::new("a", AliasOptions::default());
        assert_eq!(aliases.allocate("a", "b").unwrap(), "ab");
        assert_eq!(aliases.allocate("a", "b").unwrap(), "ab0");
        assert_eq!(aliases.allocate("a", "B").unwrap(), "ab1");
    }

    #[test]
    fn test_exhaustion() {
        let options = AliasOptions {
            strip_prefixes: vec![],
            max_numeric_suffix: 1,
        };
        let mut aliases = AliasAllocator::new("a", options);
        for _ in 0..3 {
            aliases.allocate("a", "b").unwrap();
        }
        assert!(matches!(
            aliases.allocate("a", "b"),
            Err(PlanError::AliasExhausted { .. })
        ));
    }

    #[test]
    fn test_empty_name() {
        let mut aliases = AliasAllocator::new("a", AliasOptions::default());
        assert!(matches!(
            aliases.allocate("a", ""),
            Err(PlanError::EmptyRelationshipName)
        ));
    }

    #[test]
    fn test_root_is_reserved() {
        let mut aliases = AliasAllocator::new("ab", AliasOptions::default());
        assert!(aliases.is_used("ab"));
        assert_eq!(aliases.allocate("a", "b").unwrap(), "ab0");
    }
}

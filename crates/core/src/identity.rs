//! Process-unique identities for contexts, sharing groups and surfaces.
//!
//! Identities are plain integers handed out by an [`IdentityGenerator`].
//! They are never reused within one generator, so two contexts can be
//! compared by identity even after one of them has been destroyed.

use crate::error::ContextError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a [`RenderingContext`](crate::context::RenderingContext).
///
/// Assigned once at construction and carried through moves unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(u64);

impl ContextId {
    /// Wraps a raw identity value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identity value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Identity of a sharing group.
///
/// Equal to the [`ContextId`] of the first (standalone) context of the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SharingGroupId(u64);

impl SharingGroupId {
    /// Returns the raw identity value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<ContextId> for SharingGroupId {
    fn from(id: ContextId) -> Self {
        Self(id.0)
    }
}

impl fmt::Display for SharingGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

/// Stable identity of a window or off-screen surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceId(u64);

impl SurfaceId {
    /// Wraps a raw identity value supplied by the surface provider.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identity value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// Source of process-unique, monotonically increasing identities.
///
/// Implementations must be safe to call from several threads at once,
/// since contexts may be created concurrently.
pub trait IdentityGenerator: Send + Sync {
    /// Returns the next identity.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::IdentityExhausted`] once the integer range
    /// has been used up.
    fn generate(&self) -> Result<u64, ContextError>;
}

/// Lock-free [`IdentityGenerator`] backed by an atomic counter.
#[derive(Debug)]
pub struct AtomicIdentityGenerator {
    next: AtomicU64,
}

impl AtomicIdentityGenerator {
    /// Creates a generator whose first identity is `1`.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates a generator whose first identity is `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for AtomicIdentityGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityGenerator for AtomicIdentityGenerator {
    fn generate(&self) -> Result<u64, ContextError> {
        // The stored value is the next identity to hand out; u64::MAX marks
        // an exhausted generator.
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
            .map_err(|_| ContextError::IdentityExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn generator_starts_at_one_and_increments() {
        let ids = AtomicIdentityGenerator::new();
        assert_eq!(ids.generate().unwrap(), 1);
        assert_eq!(ids.generate().unwrap(), 2);
        assert_eq!(ids.generate().unwrap(), 3);
    }

    #[test]
    fn generator_reports_exhaustion_instead_of_wrapping() {
        let ids = AtomicIdentityGenerator::starting_at(u64::MAX - 1);
        assert_eq!(ids.generate().unwrap(), u64::MAX - 1);
        assert_eq!(ids.generate(), Err(ContextError::IdentityExhausted));
        assert_eq!(
            ids.generate(),
            Err(ContextError::IdentityExhausted),
            "exhaustion must be sticky"
        );
    }

    #[test]
    fn concurrent_generation_never_repeats() {
        let ids = Arc::new(AtomicIdentityGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || {
                    (0..500)
                        .map(|_| ids.generate().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "identity {id} handed out twice");
            }
        }
        assert_eq!(seen.len(), 8 * 500);
    }

    #[test]
    fn sharing_group_id_derives_from_context_id() {
        let ctx = ContextId::new(7);
        let group = SharingGroupId::from(ctx);
        assert_eq!(group.get(), 7);
    }

    #[test]
    fn display_formats_are_distinguishable() {
        assert_eq!(ContextId::new(3).to_string(), "ctx#3");
        assert_eq!(SharingGroupId::from(ContextId::new(3)).to_string(), "group#3");
        assert_eq!(SurfaceId::new(3).to_string(), "surface#3");
    }
}

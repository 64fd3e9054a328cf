//! Sharing groups: contexts that use one GPU object namespace.
//!
//! Every context holds an `Arc<SharingGroup>`. A context created with a
//! share partner clones the partner's `Arc`, so membership is transitive
//! and the group lives exactly as long as its last member context.
//!
//! Deleting an object frees its name for the whole group, and the driver may
//! hand that name out again. The group keeps a short log of recent
//! deletions so every member can drop cached bindings of deleted names
//! before its next cached bind.

use crate::backend::{ObjectKind, ObjectName};
use crate::identity::SharingGroupId;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Deletions remembered per group. Members further behind than this
/// discard their whole cache instead.
const DELETION_LOG_LEN: usize = 256;

/// Deletions a member has not applied yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Missed {
    Objects(Vec<(ObjectKind, ObjectName)>),
    /// More deletions than the log holds.
    TooMany,
}

#[derive(Debug, Default)]
struct DeletionLog {
    recent: VecDeque<(ObjectKind, ObjectName)>,
}

/// Shared state of one sharing group.
#[derive(Debug)]
pub struct SharingGroup {
    id: SharingGroupId,
    live_objects: AtomicUsize,
    /// Number of deletions recorded so far.
    generation: AtomicU64,
    deletions: Mutex<DeletionLog>,
}

impl SharingGroup {
    pub(crate) fn new(id: SharingGroupId) -> Self {
        Self {
            id,
            live_objects: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
            deletions: Mutex::new(DeletionLog::default()),
        }
    }

    pub fn id(&self) -> SharingGroupId {
        self.id
    }

    /// Number of GPU objects created in this group and not yet deleted.
    pub fn live_objects(&self) -> usize {
        self.live_objects.load(Ordering::Acquire)
    }

    pub(crate) fn object_created(&self) {
        self.live_objects.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn object_deleted(&self) {
        // Saturate: objects adopted through `from_raw` were never counted.
        let _ = self
            .live_objects
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Count of deletions recorded in this group.
    pub(crate) fn deletion_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Logs the deletion of `name` and returns the new generation.
    pub(crate) fn record_deletion(&self, kind: ObjectKind, name: ObjectName) -> u64 {
        let mut log = self.deletions.lock().unwrap_or_else(PoisonError::into_inner);
        if log.recent.len() == DELETION_LOG_LEN {
            log.recent.pop_front();
        }
        log.recent.push_back((kind, name));
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Deletions recorded after generation `seen`, with the generation they
    /// bring the caller up to. `None` if there are none.
    pub(crate) fn deletions_since(&self, seen: u64) -> Option<(u64, Missed)> {
        if self.deletion_generation() == seen {
            return None;
        }
        let log = self.deletions.lock().unwrap_or_else(PoisonError::into_inner);
        // Read under the lock so the count matches the log contents.
        let generation = self.deletion_generation();
        let behind = generation.saturating_sub(seen);
        let missed = match usize::try_from(behind) {
            Ok(behind) if behind <= log.recent.len() => Missed::Objects(
                log.recent
                    .iter()
                    .skip(log.recent.len() - behind)
                    .copied()
                    .collect(),
            ),
            _ => Missed::TooMany,
        };
        Some((generation, missed))
    }
}

impl Drop for SharingGroup {
    fn drop(&mut self) {
        let live = *self.live_objects.get_mut();
        if live > 0 {
            log::warn!(
                "{} destroyed with {live} live object(s); their names are now dangling",
                self.id
            );
        } else {
            log::debug!("{} destroyed", self.id);
        }
    }
}

//! Per-thread record of the current context and surface.
//!
//! The registry exists so `make_current` can skip the driver call when the
//! calling thread already has the requested context and surface current. It
//! holds no ownership: entries name contexts and surfaces by identity only,
//! which is also why moving a [`RenderingContext`](crate::context::RenderingContext)
//! needs no registry update.
//!
//! Each thread reads and writes only its own entry, and the entry goes away
//! when the thread exits. Other threads can still see every entry through
//! [`ContextRegistry::holder_of`], which is how a context current elsewhere
//! is detected.

use crate::identity::{ContextId, SurfaceId};
use crate::thread_slots::ThreadSlots;
use serde::Serialize;
use std::thread::ThreadId;

/// The context and surface current on one thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CurrentBinding {
    pub context: ContextId,
    pub surface: SurfaceId,
}

/// Thread-scoped current-context records, shared by every context of one
/// [`Platform`](crate::context::Platform).
#[derive(Debug, Default)]
pub struct ContextRegistry {
    entries: ThreadSlots<CurrentBinding>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binding current on the calling thread.
    pub fn current(&self) -> Option<CurrentBinding> {
        self.entries.get()
    }

    /// Replaces the calling thread's binding.
    pub fn set_current(&self, binding: CurrentBinding) {
        self.entries.set(binding);
    }

    /// Clears the calling thread's binding, returning what was there.
    pub fn clear_current(&self) -> Option<CurrentBinding> {
        self.entries.take()
    }

    /// Returns `true` if the calling thread has exactly this binding.
    pub fn is_current(&self, context: ContextId, surface: SurfaceId) -> bool {
        self.current() == Some(CurrentBinding { context, surface })
    }

    /// Returns `true` if `context` is current on the calling thread.
    pub fn is_context_current(&self, context: ContextId) -> bool {
        self.current().is_some_and(|b| b.context == context)
    }

    /// Thread on which `context` is current, if any.
    pub fn holder_of(&self, context: ContextId) -> Option<ThreadId> {
        self.entries.find(|binding| binding.context == context)
    }

    /// Drops the entry of another thread.
    ///
    /// Entries of exited threads are removed on their own; this is for a
    /// thread whose driver state was torn down some other way.
    pub fn forget_thread(&self, thread: ThreadId) -> Option<CurrentBinding> {
        self.entries.remove_thread(thread)
    }

    /// Number of threads with a current context.
    pub fn active_threads(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;

    fn binding(context: u64, surface: u64) -> CurrentBinding {
        CurrentBinding {
            context: ContextId::new(context),
            surface: SurfaceId::new(surface),
        }
    }

    #[test]
    fn empty_registry_has_no_current_binding() {
        let registry = ContextRegistry::new();
        assert_eq!(registry.current(), None);
        assert_eq!(registry.active_threads(), 0);
    }

    #[test]
    fn set_then_clear_round_trips() {
        let registry = ContextRegistry::new();
        registry.set_current(binding(1, 10));
        assert!(registry.is_current(ContextId::new(1), SurfaceId::new(10)));
        assert!(!registry.is_current(ContextId::new(1), SurfaceId::new(11)));
        assert!(registry.is_context_current(ContextId::new(1)));

        assert_eq!(registry.clear_current(), Some(binding(1, 10)));
        assert_eq!(registry.current(), None);
    }

    #[test]
    fn entries_are_independent_per_thread() {
        let registry = Arc::new(ContextRegistry::new());
        registry.set_current(binding(1, 10));

        let remote = Arc::clone(&registry);
        let other = thread::spawn(move || {
            assert_eq!(remote.current(), None, "new thread must start empty");
            remote.set_current(binding(2, 20));
            remote.current()
        })
        .join()
        .unwrap();

        assert_eq!(other, Some(binding(2, 20)));
        assert_eq!(registry.current(), Some(binding(1, 10)));
    }

    #[test]
    fn entry_of_exited_thread_is_removed() {
        let registry = Arc::new(ContextRegistry::new());
        let remote = Arc::clone(&registry);
        thread::spawn(move || remote.set_current(binding(3, 30)))
            .join()
            .unwrap();

        assert_eq!(registry.active_threads(), 0);
        assert_eq!(registry.holder_of(ContextId::new(3)), None);
    }

    #[test]
    fn holder_of_finds_the_owning_thread() {
        let registry = Arc::new(ContextRegistry::new());
        let remote = Arc::clone(&registry);
        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let worker = thread::spawn(move || {
            remote.set_current(binding(5, 1));
            ready_tx.send(thread::current().id()).unwrap();
            done_rx.recv().unwrap();
        });
        let remote_thread = ready_rx.recv().unwrap();

        assert_eq!(registry.holder_of(ContextId::new(5)), Some(remote_thread));
        assert_eq!(registry.holder_of(ContextId::new(6)), None);

        assert_eq!(registry.forget_thread(remote_thread), Some(binding(5, 1)));
        assert_eq!(registry.holder_of(ContextId::new(5)), None);

        done_tx.send(()).unwrap();
        worker.join().unwrap();
    }
}

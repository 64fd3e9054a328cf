//! Per-thread slots that are cleared when their thread exits.
//!
//! A [`ThreadSlots`] table holds at most one value per thread. Writing a
//! slot registers the table with a thread-local exit hook; when the thread
//! ends, the hook removes that thread's slot from every table it wrote to
//! that is still alive. Other threads can still read every slot, which is
//! what lets the registry find the thread holding a context.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

type Table<V> = Mutex<HashMap<ThreadId, V>>;

trait Purge: Send + Sync {
    fn purge(&self, thread: ThreadId);
}

impl<V: Send> Purge for Table<V> {
    fn purge(&self, thread: ThreadId) {
        lock(self).remove(&thread);
    }
}

fn lock<V>(table: &Table<V>) -> MutexGuard<'_, HashMap<ThreadId, V>> {
    // Slots are plain data; a panic mid-update leaves a consistent map.
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ExitHook {
    thread: ThreadId,
    tables: Vec<Weak<dyn Purge>>,
}

impl ExitHook {
    fn watch(&mut self, table: Weak<dyn Purge>) {
        self.tables.retain(|t| t.strong_count() > 0);
        if !self.tables.iter().any(|t| Weak::ptr_eq(t, &table)) {
            self.tables.push(table);
        }
    }
}

impl Drop for ExitHook {
    fn drop(&mut self) {
        for table in self.tables.drain(..) {
            if let Some(table) = table.upgrade() {
                table.purge(self.thread);
            }
        }
    }
}

thread_local! {
    static EXIT_HOOK: RefCell<ExitHook> = RefCell::new(ExitHook {
        thread: thread::current().id(),
        tables: Vec::new(),
    });
}

/// One value per thread, dropped automatically at thread exit.
pub(crate) struct ThreadSlots<V> {
    table: Arc<Table<V>>,
}

impl<V: Send + 'static> ThreadSlots<V> {
    pub(crate) fn new() -> Self {
        Self {
            table: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<ThreadId, V>> {
        lock(&self.table)
    }

    /// Stores `value` in the calling thread's slot.
    pub(crate) fn set(&self, value: V) {
        let weak: Weak<dyn Purge> = Arc::<Table<V>>::downgrade(&self.table);
        // Fails only while the thread's locals are being torn down; the slot
        // is still written and `remove_thread` can clear it.
        let _ = EXIT_HOOK.try_with(|hook| hook.borrow_mut().watch(weak));
        self.slots().insert(thread::current().id(), value);
    }

    /// Empties the calling thread's slot, returning what was there.
    pub(crate) fn take(&self) -> Option<V> {
        self.slots().remove(&thread::current().id())
    }

    /// Empties another thread's slot.
    pub(crate) fn remove_thread(&self, thread: ThreadId) -> Option<V> {
        self.slots().remove(&thread)
    }

    /// Returns `true` if the calling thread's slot is filled.
    pub(crate) fn is_set(&self) -> bool {
        self.slots().contains_key(&thread::current().id())
    }

    /// First thread whose slot satisfies `predicate`.
    pub(crate) fn find(&self, predicate: impl Fn(&V) -> bool) -> Option<ThreadId> {
        self.slots()
            .iter()
            .find(|(_, value)| predicate(value))
            .map(|(thread, _)| *thread)
    }

    /// Number of filled slots.
    pub(crate) fn len(&self) -> usize {
        self.slots().len()
    }
}

impl<V: Copy + Send + 'static> ThreadSlots<V> {
    /// Value in the calling thread's slot.
    pub(crate) fn get(&self) -> Option<V> {
        self.slots().get(&thread::current().id()).copied()
    }
}

impl<V: Send + 'static> Default for ThreadSlots<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for ThreadSlots<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ThreadSlots").field(&self.table).finish()
    }
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use wasm_safe_mutex::Mutex;

/// Runtime state owned by a running engine.
///
/// The controller only ever touches the break flag. Everything else about the pool
/// belongs to the engine, including its lifetime.
#[derive(Debug, Default)]
pub struct EnginePool {
    brk: AtomicBool,
}

impl EnginePool {
    /// Creates a pool with the break flag cleared.
    pub fn new() -> EnginePool {
        EnginePool {
            brk: AtomicBool::new(false),
        }
    }

    /// Asks the engine's loop to exit at its next polling opportunity.
    pub fn request_break(&self) {
        self.brk.store(true, Ordering::Release);
    }

    /// Whether a break has been requested.
    ///
    /// Engines poll this from their event loop.
    pub fn break_requested(&self) -> bool {
        self.brk.load(Ordering::Acquire)
    }
}

/// Where an engine publishes its pool so the controller can signal it.
///
/// The slot holds a weak reference. The controller never owns the pool and never
/// keeps it alive; a pool that was never published, was withdrawn, or has already been
/// dropped by its engine all look the same: absent.
#[derive(Debug)]
pub struct PoolSlot {
    pool: Mutex<Weak<EnginePool>>,
}

impl Default for PoolSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolSlot {
    /// Creates an empty slot.
    pub fn new() -> PoolSlot {
        PoolSlot {
            pool: Mutex::new(Weak::new()),
        }
    }

    /// Publishes `pool`, replacing whatever was published before.
    pub fn publish(&self, pool: &Arc<EnginePool>) {
        let weak = Arc::downgrade(pool);
        self.pool.with_mut_sync(|slot| *slot = weak);
    }

    /// Removes the published pool, if any.
    pub fn withdraw(&self) {
        self.pool.with_mut_sync(|slot| *slot = Weak::new());
    }

    /// Whether a live pool is currently published.
    pub fn is_published(&self) -> bool {
        self.pool.with_sync(|slot| slot.strong_count() > 0)
    }

    /// Sets the break flag on the published pool.
    ///
    /// Returns `false` when there was no live pool to signal.
    pub fn signal_break(&self) -> bool {
        self.pool.with_sync(|slot| match slot.upgrade() {
            Some(pool) => {
                pool.request_break();
                true
            }
            None => false,
        })
    }
}

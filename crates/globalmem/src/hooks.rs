//! Readiness hook registry
//!
//! Hooks are kept in a spinlocked list. `notify` clones the list out and
//! calls each hook with no lock held, so a hook may subscribe, unsubscribe
//! or touch the device again.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use globalmem_core::{Readiness, ReadinessHook, SpinLock};

/// Identifier of a registered hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

impl HookId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

pub(crate) struct HookRegistry {
    hooks: SpinLock<Vec<(HookId, Arc<dyn ReadinessHook>)>>,
    next_id: AtomicU64,
}

impl HookRegistry {
    pub(crate) fn new() -> Self {
        Self {
            hooks: SpinLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn subscribe(&self, hook: Arc<dyn ReadinessHook>) -> HookId {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.hooks.lock().push((id, hook));
        id
    }

    /// Returns false if `id` was not registered
    pub(crate) fn unsubscribe(&self, id: HookId) -> bool {
        let mut hooks = self.hooks.lock();
        let before = hooks.len();
        hooks.retain(|(hid, _)| *hid != id);
        hooks.len() != before
    }

    pub(crate) fn notify(&self, event: Readiness) {
        let snapshot: Vec<Arc<dyn ReadinessHook>> = {
            let hooks = self.hooks.lock();
            if hooks.is_empty() {
                return;
            }
            hooks.iter().map(|(_, hook)| Arc::clone(hook)).collect()
        };
        for hook in snapshot {
            hook.on_ready(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.lock().len()
    }
}

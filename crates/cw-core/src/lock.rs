//! Screen lock through the accessibility capability.
//!
//! The capability is only usable while the accessibility service is bound.
//! The slot tracks that binding; callers ask the slot, never the capability.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A bound accessibility capability able to lock the screen.
pub trait ScreenLock: Send + Sync {
    /// Dispatches the lock action. Returns whether the platform accepted it.
    fn lock_screen(&self) -> bool;
}

#[derive(Default)]
pub struct ScreenLockSlot {
    bound: Mutex<Option<Arc<dyn ScreenLock>>>,
}

impl ScreenLockSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Arc<dyn ScreenLock>>> {
        self.bound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Called when the accessibility service binds.
    pub fn connect(&self, capability: Arc<dyn ScreenLock>) {
        *self.lock() = Some(capability);
        tracing::debug!("screen lock capability connected");
    }

    /// Called when the accessibility service unbinds.
    pub fn disconnect(&self) {
        *self.lock() = None;
        tracing::debug!("screen lock capability disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    /// Locks the screen if a capability is bound.
    pub fn lock_screen(&self) -> bool {
        let Some(capability) = self.lock().clone() else {
            tracing::error!("screen lock capability not connected, cannot lock screen");
            return false;
        };
        let locked = capability.lock_screen();
        tracing::debug!(locked, "lock screen action performed");
        locked
    }
}

impl std::fmt::Debug for ScreenLockSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenLockSlot")
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl ScreenLock for Counting {
        fn lock_screen(&self) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            true
        }
    }

    #[test]
    fn test_lock_fails_when_unbound() {
        let slot = ScreenLockSlot::new();
        assert!(!slot.is_connected());
        assert!(!slot.lock_screen());
    }

    #[test]
    fn test_lock_reaches_bound_capability() {
        let slot = ScreenLockSlot::new();
        let capability = Arc::new(Counting::default());
        slot.connect(capability.clone());

        assert!(slot.lock_screen());
        assert!(slot.lock_screen());
        assert_eq!(capability.0.load(Ordering::SeqCst), 2);

        slot.disconnect();
        assert!(!slot.lock_screen());
        assert_eq!(capability.0.load(Ordering::SeqCst), 2);
    }
}

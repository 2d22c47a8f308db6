//! Dirty subsystem markers.
//!
//! A subsystem (`staticroutes`, `gwgroup.<name>`, ...) is marked dirty by
//! whatever mutation needs it reloaded and cleared by the code that performs
//! the reload. Markers live in memory only and reset when the process
//! restarts.

use std::collections::BTreeSet;

use parking_lot::Mutex;

/// Process-wide set of dirty subsystem names.
///
/// Every operation holds the lock for its whole duration, so
/// [`DirtySubsystems::take`] is a true check-and-clear: two callers racing
/// to apply the same subsystem cannot both see it dirty.
#[derive(Debug, Default)]
pub struct DirtySubsystems {
    names: Mutex<BTreeSet<String>>,
}

impl DirtySubsystems {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `name` dirty. Returns `true` if it was clean before.
    pub fn mark(&self, name: &str) -> bool {
        let newly = self.names.lock().insert(name.to_string());
        if newly {
            tracing::debug!(subsystem = name, "Subsystem marked dirty");
        }
        newly
    }

    pub fn is_dirty(&self, name: &str) -> bool {
        self.names.lock().contains(name)
    }

    pub fn clear(&self, name: &str) {
        self.take(name);
    }

    /// Clear `name`, returning whether it was dirty.
    pub fn take(&self, name: &str) -> bool {
        let was_dirty = self.names.lock().remove(name);
        if was_dirty {
            tracing::debug!(subsystem = name, "Subsystem cleared");
        }
        was_dirty
    }

    /// All dirty names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.names.lock().iter().cloned().collect()
    }

    /// Dirty names starting with `prefix`, sorted.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.names
            .lock()
            .iter()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_mark_and_clear() {
        let dirty = DirtySubsystems::new();
        assert!(!dirty.is_dirty("staticroutes"));

        assert!(dirty.mark("staticroutes"));
        assert!(!dirty.mark("staticroutes"));
        assert!(dirty.is_dirty("staticroutes"));

        dirty.clear("staticroutes");
        assert!(!dirty.is_dirty("staticroutes"));
    }

    #[test]
    fn test_take_reports_previous_state() {
        let dirty = DirtySubsystems::new();
        dirty.mark("gwgroup.failover");
        assert!(dirty.take("gwgroup.failover"));
        assert!(!dirty.take("gwgroup.failover"));
    }

    #[test]
    fn test_with_prefix() {
        let dirty = DirtySubsystems::new();
        dirty.mark("gwgroup.wan_failover");
        dirty.mark("staticroutes");
        dirty.mark("gwgroup.lan_balance");

        assert_eq!(
            dirty.with_prefix("gwgroup."),
            vec!["gwgroup.lan_balance", "gwgroup.wan_failover"]
        );
        assert_eq!(dirty.list().len(), 3);
    }

    #[test]
    fn test_concurrent_take_only_one_winner() {
        let dirty = Arc::new(DirtySubsystems::new());
        dirty.mark("staticroutes");
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let dirty = Arc::clone(&dirty);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    if dirty.take("staticroutes") {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(!dirty.is_dirty("staticroutes"));
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Side table marking devices that have an apply outstanding
///
/// Keyed by the address of the device allocation and holding only `Weak`
/// references, so a marker never keeps a device alive. Entries whose device
/// is gone count as absent and are purged on the next acquire.
pub struct InFlightTable<T: ?Sized> {
    entries: HashMap<usize, Weak<T>>,
}

fn address<T: ?Sized>(ptr: *const T) -> usize {
    ptr.cast::<()>() as usize
}

impl<T: ?Sized> InFlightTable<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn contains(&self, device: &Arc<T>) -> bool {
        self.entries
            .get(&address(Arc::as_ptr(device)))
            .is_some_and(|entry| entry.strong_count() > 0)
    }

    /// Marks `device` busy; false if it already was
    pub fn try_acquire(&mut self, device: &Arc<T>) -> bool {
        self.purge();
        if self.contains(device) {
            return false;
        }
        self.entries
            .insert(address(Arc::as_ptr(device)), Arc::downgrade(device));
        true
    }

    /// Clears the marker of the device behind `device`, alive or not
    pub fn release(&mut self, device: &Weak<T>) -> bool {
        self.entries.remove(&address(device.as_ptr())).is_some()
    }

    /// Drops entries whose device no longer exists
    pub fn purge(&mut self) {
        self.entries.retain(|_, entry| entry.strong_count() > 0);
    }

    pub fn len(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ?Sized> Default for InFlightTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

use dashmap::DashMap;
use thiserror::Error;

/// Default entry bound, matching the 1024-entry table the ingress filter
/// ships with.
pub const DEFAULT_ALLOWLIST_CAPACITY: usize = 1024;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowListError {
    /// The table is full and the address is not already present.
    #[error("allow-list is full ({capacity} entries)")]
    CapacityExceeded { capacity: usize },
}

/// Source-address -> permit-flag table.
///
/// The packet fast path only ever calls [`AllowList::lookup`]; `set` and
/// `clear` belong to the out-of-band control plane, which is the sole
/// writer. Readers observe each key's pre- or post-mutation value, never a
/// torn one; no atomicity across keys is promised.
pub struct AllowList {
    entries: DashMap<u32, bool>,
    capacity: usize,
}

impl AllowList {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_ALLOWLIST_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity,
        }
    }

    /// Fast-path read: is this source address explicitly permitted?
    ///
    /// Absent keys are not permitted -- the default posture is deny.
    pub fn lookup(&self, addr: u32) -> bool {
        self.entries.get(&addr).map_or(false, |permit| *permit)
    }

    /// Control plane: insert or update one entry.
    ///
    /// Fails synchronously when the table is at capacity and `addr` is new.
    /// The capacity check and the insert are two steps, but the control
    /// plane is the sole writer, so they do not race each other.
    pub fn set(&self, addr: u32, permitted: bool) -> Result<(), AllowListError> {
        if !self.entries.contains_key(&addr) && self.entries.len() >= self.capacity {
            return Err(AllowListError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.entries.insert(addr, permitted);
        Ok(())
    }

    /// Control plane: remove one entry. Returns whether it was present.
    pub fn clear(&self, addr: u32) -> bool {
        self.entries.remove(&addr).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_key_is_denied() {
        let allow = AllowList::new();
        assert!(!allow.lookup(0xC0A8_0105));
        assert!(allow.is_empty());
    }

    #[test]
    fn test_set_and_clear() {
        let allow = AllowList::new();

        allow.set(0xC0A8_0105, true).unwrap();
        assert!(allow.lookup(0xC0A8_0105));
        assert_eq!(allow.len(), 1);

        // An explicit false entry denies just like an absent one.
        allow.set(0xC0A8_0105, false).unwrap();
        assert!(!allow.lookup(0xC0A8_0105));
        assert_eq!(allow.len(), 1);

        assert!(allow.clear(0xC0A8_0105));
        assert!(!allow.lookup(0xC0A8_0105));
        assert!(!allow.clear(0xC0A8_0105));
    }

    #[test]
    fn test_capacity_is_enforced_for_new_keys_only() {
        let allow = AllowList::with_capacity(2);
        allow.set(1, true).unwrap();
        allow.set(2, true).unwrap();

        assert_eq!(
            allow.set(3, true),
            Err(AllowListError::CapacityExceeded { capacity: 2 })
        );

        // Updating an existing key at capacity still works.
        allow.set(2, false).unwrap();
        assert!(!allow.lookup(2));

        // Clearing frees a slot for a new key.
        assert!(allow.clear(1));
        allow.set(3, true).unwrap();
        assert!(allow.lookup(3));
    }

    #[test]
    fn test_default_capacity() {
        assert_eq!(AllowList::new().capacity(), 1024);
    }
}

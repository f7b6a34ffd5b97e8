use std::collections::HashMap;
use std::sync::Mutex;
use veilpay_core::TimestampMs;

/// Bounded in-memory IP blacklist with per-entry TTL. Entries expire
/// lazily on lookup and insertion.
pub struct Blacklist {
    entries: Mutex<HashMap<String, TimestampMs>>,
    max_entries: usize,
}

impl Blacklist {
    pub fn new(max_entries: usize) -> Self {
        Self { entries: Mutex::new(HashMap::new()), max_entries }
    }

    /// Add `ip` until `now_ms + ttl_ms`. When full, expired entries are
    /// evicted first; if still full the insert is dropped (the list is a
    /// heuristic, not a ledger).
    pub fn add(&self, ip: &str, ttl_ms: i64, now_ms: TimestampMs) {
        let mut entries = self.entries.lock().expect("blacklist mutex poisoned");
        entries.retain(|_, &mut expires| expires > now_ms);
        if entries.len() >= self.max_entries && !entries.contains_key(ip) {
            tracing::warn!(ip = %ip, "blacklist full; entry dropped");
            return;
        }
        entries.insert(ip.to_string(), now_ms + ttl_ms);
    }

    pub fn contains(&self, ip: &str, now_ms: TimestampMs) -> bool {
        let mut entries = self.entries.lock().expect("blacklist mutex poisoned");
        match entries.get(ip) {
            Some(&expires) if expires > now_ms => true,
            Some(_) => {
                entries.remove(ip);
                false
            }
            None => false,
        }
    }

    pub fn len(&self, now_ms: TimestampMs) -> usize {
        let mut entries = self.entries.lock().expect("blacklist mutex poisoned");
        entries.retain(|_, &mut expires| expires > now_ms);
        entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_expire() {
        let bl = Blacklist::new(16);
        bl.add("10.0.0.1", 1_000, 0);
        assert!(bl.contains("10.0.0.1", 500));
        assert!(!bl.contains("10.0.0.1", 1_001));
        // Expired entry is gone, not resurrected.
        assert!(!bl.contains("10.0.0.1", 500));
    }

    #[test]
    fn capacity_is_bounded() {
        let bl = Blacklist::new(2);
        bl.add("a", 10_000, 0);
        bl.add("b", 10_000, 0);
        bl.add("c", 10_000, 0); // dropped
        assert_eq!(bl.len(1), 2);
        assert!(!bl.contains("c", 1));
    }

    #[test]
    fn full_list_reopens_after_expiry() {
        let bl = Blacklist::new(1);
        bl.add("a", 100, 0);
        bl.add("b", 100, 200); // "a" expired; slot free
        assert!(bl.contains("b", 250));
    }
}

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use veilpay_core::{AuthError, TimestampMs};

// ── KeyValueStore ────────────────────────────────────────────────────────────

/// Binary-safe key-value persistence boundary. Keys are ASCII; values are
/// opaque bytes. `scan_prefix` is administrative only.
pub trait KeyValueStore: Send + Sync {
    fn put(&self, key: &str, value: &[u8], ttl_ms: Option<i64>) -> Result<(), AuthError>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AuthError>;
    fn delete(&self, key: &str) -> Result<(), AuthError>;
    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, AuthError>;
}

// ── SledStore ────────────────────────────────────────────────────────────────

/// Stored wrapper carrying the optional expiry alongside the value bytes.
#[derive(serde::Serialize, serde::Deserialize)]
struct StoredValue {
    expires_at: Option<TimestampMs>,
    bytes: Vec<u8>,
}

/// Local secure store backed by sled (pure-Rust, no C dependencies).
///
/// TTLs are enforced lazily: an expired entry is removed on the read that
/// discovers it.
pub struct SledStore {
    tree: sled::Tree,
    _db: sled::Db,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, AuthError> {
        let db = sled::open(path).map_err(storage_err)?;
        let tree = db.open_tree("records").map_err(storage_err)?;
        Ok(Self { tree, _db: db })
    }
}

fn storage_err(e: sled::Error) -> AuthError {
    AuthError::Internal(format!("storage: {e}"))
}

fn codec_err(e: bincode::Error) -> AuthError {
    AuthError::Internal(format!("serialization: {e}"))
}

impl KeyValueStore for SledStore {
    fn put(&self, key: &str, value: &[u8], ttl_ms: Option<i64>) -> Result<(), AuthError> {
        let now = chrono::Utc::now().timestamp_millis();
        let stored = StoredValue {
            expires_at: ttl_ms.map(|ttl| now + ttl),
            bytes: value.to_vec(),
        };
        let bytes = bincode::serialize(&stored).map_err(codec_err)?;
        self.tree.insert(key.as_bytes(), bytes).map_err(storage_err)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AuthError> {
        match self.tree.get(key.as_bytes()).map_err(storage_err)? {
            Some(raw) => {
                let stored: StoredValue = bincode::deserialize(&raw).map_err(codec_err)?;
                if let Some(expires) = stored.expires_at {
                    if chrono::Utc::now().timestamp_millis() > expires {
                        self.tree.remove(key.as_bytes()).map_err(storage_err)?;
                        return Ok(None);
                    }
                }
                Ok(Some(stored.bytes))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> Result<(), AuthError> {
        self.tree.remove(key.as_bytes()).map_err(storage_err)?;
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, AuthError> {
        let mut keys = Vec::new();
        for item in self.tree.scan_prefix(prefix.as_bytes()) {
            let (k, _) = item.map_err(storage_err)?;
            keys.push(String::from_utf8_lossy(&k).into_owned());
        }
        Ok(keys)
    }
}

// ── MemoryCache ──────────────────────────────────────────────────────────────

struct CacheEntry {
    bytes: Vec<u8>,
    expires_at: Option<TimestampMs>,
}

/// Process-wide in-memory cache with per-entry TTL and lazy eviction.
/// Used as the enrollment cache (24 h TTL by default).
pub struct MemoryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    pub fn put(&self, key: &str, bytes: Vec<u8>, ttl_ms: Option<i64>, now_ms: TimestampMs) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.insert(
            key.to_string(),
            CacheEntry { bytes, expires_at: ttl_ms.map(|ttl| now_ms + ttl) },
        );
    }

    pub fn get(&self, key: &str, now_ms: TimestampMs) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        match entries.get(key) {
            Some(e) if e.expires_at.is_none_or(|exp| now_ms <= exp) => Some(e.bytes.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn delete(&self, key: &str) {
        self.entries.lock().expect("cache mutex poisoned").remove(key);
    }

    /// Background sweep dropping every expired entry.
    pub fn prune(&self, now_ms: TimestampMs) {
        self.entries
            .lock()
            .expect("cache mutex poisoned")
            .retain(|_, e| e.expires_at.is_none_or(|exp| now_ms <= exp));
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── MemoryStore ──────────────────────────────────────────────────────────────

/// In-memory `KeyValueStore` used across the workspace's tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (Vec<u8>, Option<TimestampMs>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn put(&self, key: &str, value: &[u8], ttl_ms: Option<i64>) -> Result<(), AuthError> {
        let now = chrono::Utc::now().timestamp_millis();
        self.entries
            .lock()
            .expect("store mutex poisoned")
            .insert(key.to_string(), (value.to_vec(), ttl_ms.map(|t| now + t)));
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AuthError> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut entries = self.entries.lock().expect("store mutex poisoned");
        match entries.get(key) {
            Some((bytes, exp)) if exp.is_none_or(|e| now <= e) => Ok(Some(bytes.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn delete(&self, key: &str) -> Result<(), AuthError> {
        self.entries.lock().expect("store mutex poisoned").remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, AuthError> {
        let entries = self.entries.lock().expect("store mutex poisoned");
        let mut keys: Vec<String> =
            entries.keys().filter(|k| k.starts_with(prefix)).cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(name: &str) -> SledStore {
        let dir = std::env::temp_dir().join(format!("veilpay_store_test_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        SledStore::open(&dir).expect("open temp store")
    }

    // ── SledStore ────────────────────────────────────────────────────────────

    #[test]
    fn sled_put_get_delete_round_trip() {
        let store = temp_store("round_trip");
        store.put("enroll/u1", b"payload", None).unwrap();
        assert_eq!(store.get("enroll/u1").unwrap().as_deref(), Some(&b"payload"[..]));
        store.delete("enroll/u1").unwrap();
        assert_eq!(store.get("enroll/u1").unwrap(), None);
        // Idempotent delete.
        store.delete("enroll/u1").unwrap();
    }

    #[test]
    fn sled_expired_entry_reads_as_absent() {
        let store = temp_store("expired");
        store.put("k", b"v", Some(-1)).unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn sled_scan_prefix_lists_keys() {
        let store = temp_store("scan");
        store.put("enroll/a", b"1", None).unwrap();
        store.put("enroll/b", b"2", None).unwrap();
        store.put("audit/x", b"3", None).unwrap();
        let keys = store.scan_prefix("enroll/").unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.starts_with("enroll/")));
    }

    // ── MemoryCache ──────────────────────────────────────────────────────────

    #[test]
    fn cache_honours_ttl() {
        let cache = MemoryCache::new();
        cache.put("k", vec![1, 2, 3], Some(1_000), 0);
        assert_eq!(cache.get("k", 1_000), Some(vec![1, 2, 3]));
        assert_eq!(cache.get("k", 1_001), None);
        // Lazy eviction removed it.
        assert!(cache.is_empty());
    }

    #[test]
    fn cache_prune_sweeps_expired() {
        let cache = MemoryCache::new();
        cache.put("a", vec![1], Some(100), 0);
        cache.put("b", vec![2], None, 0);
        cache.prune(200);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("b", 200), Some(vec![2]));
    }

    // ── MemoryStore ──────────────────────────────────────────────────────────

    #[test]
    fn memory_store_behaves_like_kv() {
        let store = MemoryStore::new();
        store.put("p/x", b"1", None).unwrap();
        store.put("p/y", b"2", None).unwrap();
        assert_eq!(store.get("p/x").unwrap(), Some(vec![b'1']));
        assert_eq!(store.scan_prefix("p/").unwrap(), vec!["p/x".to_string(), "p/y".to_string()]);
        store.delete("p/x").unwrap();
        assert_eq!(store.get("p/x").unwrap(), None);
    }
}

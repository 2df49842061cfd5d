/*!
 * Keyspace
 *
 * Composes the dictionary and the TTL index behind the operations the
 * command handlers call. Two rules hold everywhere:
 *
 *   - an entry has `expire_at >= 0` exactly when its key sits in the TTL
 *     index with that same deadline;
 *   - any read path that observes an expired entry removes it from both
 *     structures before answering (lazy expiry), so callers never see a
 *     key past its deadline.
 */

use std::time::{SystemTime, UNIX_EPOCH};

use crate::dict::{Dict, Entry, REHASH_BATCH};
use crate::ttl::TtlHeap;
use crate::value::Value;

/// Current Unix time in milliseconds.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[derive(Default)]
pub struct Db {
    dict: Dict,
    ttl: TtlHeap,
}

impl Db {
    pub fn new() -> Self {
        Db::default()
    }

    /// Remove the key from both structures if its deadline has passed.
    /// Returns true when the key was expired and collected.
    fn expire_if_due(&mut self, key: &[u8]) -> bool {
        let expire_at = match self.dict.get(key) {
            Some(entry) => entry.expire_at,
            None => return false,
        };
        if expire_at < 0 || now_ms() < expire_at {
            return false;
        }
        self.ttl.remove(key);
        self.dict.del(key);
        true
    }

    /// Look up an entry for a typed command, applying lazy expiry first.
    pub fn find_entry(&mut self, key: &[u8]) -> Option<&mut Entry> {
        if self.expire_if_due(key) {
            return None;
        }
        self.dict.find(key)
    }

    /// Look up an entry, creating it with `make()` when absent. The caller
    /// has already type-checked any existing entry.
    pub fn find_or_create(&mut self, key: &[u8], make: fn() -> Value) -> Option<&mut Entry> {
        self.expire_if_due(key);
        if !self.dict.contains(key) {
            self.set_object(key, make());
        }
        self.dict.find(key)
    }

    /// String read: absent, expired, and non-string keys all answer None;
    /// the middle case also cleans up.
    pub fn get_string(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        let entry = self.find_entry(key)?;
        match &entry.value {
            Value::Str(s) => Some(s.to_vec()),
            _ => None,
        }
    }

    /// String write. Any TTL on the key is discarded, matching SET
    /// semantics on the wire.
    pub fn set_string(&mut self, key: &[u8], val: &[u8]) {
        self.ttl.remove(key);
        self.dict.set(key, Value::string_from(val));
        if let Some(entry) = self.dict.find(key) {
            entry.expire_at = -1;
        }
    }

    /// Insert or overwrite a value without touching the TTL. Container
    /// handlers use this to create empty lists/hashes/sets/zsets.
    pub fn set_object(&mut self, key: &[u8], value: Value) {
        self.dict.set(key, value);
    }

    pub fn del(&mut self, key: &[u8]) -> bool {
        self.ttl.remove(key);
        self.dict.del(key)
    }

    /// Move a value (deadline included) to a new name, replacing whatever
    /// the destination held. Answers false when the source is absent.
    pub fn rename(&mut self, from: &[u8], to: &[u8]) -> bool {
        if self.expire_if_due(from) {
            return false;
        }
        if from == to {
            return self.dict.contains(from);
        }
        let Some(entry) = self.dict.take(from) else {
            return false;
        };
        self.ttl.remove(from);
        self.ttl.remove(to);
        self.dict.set(to, entry.value);
        if let Some(moved) = self.dict.find(to) {
            moved.expire_at = entry.expire_at;
        }
        if entry.expire_at >= 0 {
            self.ttl.push(to, entry.expire_at);
        }
        true
    }

    pub fn exists(&mut self, key: &[u8]) -> bool {
        if self.expire_if_due(key) {
            return false;
        }
        self.dict.contains(key)
    }

    /// Arm a deadline on an existing key. Answers false when the key is
    /// absent (including just-lazily-expired).
    pub fn set_expire(&mut self, key: &[u8], deadline_ms: i64) -> bool {
        if self.expire_if_due(key) {
            return false;
        }
        let Some(entry) = self.dict.find(key) else {
            return false;
        };
        entry.expire_at = deadline_ms;
        self.ttl.push(key, deadline_ms);
        true
    }

    /// Remaining lifetime in milliseconds: -2 when the key is absent,
    /// -1 when it carries no deadline.
    pub fn ttl_ms(&mut self, key: &[u8]) -> i64 {
        if self.expire_if_due(key) {
            return -2;
        }
        let expire_at = match self.dict.get(key) {
            Some(entry) => entry.expire_at,
            None => return -2,
        };
        if expire_at < 0 {
            return -1;
        }
        expire_at - now_ms()
    }

    /// One bounded active-expiry cycle: pop due keys from the heap and
    /// delete their entries. The heap side is already detached by the pop.
    pub fn active_expire(&mut self, max_work: usize) {
        let now = now_ms();
        for key in self.ttl.pop_expired(now, max_work) {
            self.dict.del(&key);
        }
    }

    /// Snapshot of all keys (expired-but-uncollected ones included, exactly
    /// as the dictionary holds them).
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.dict.keys()
    }

    pub fn len(&self) -> usize {
        self.dict.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }

    /// Advance incremental rehashing; wired to the reactor tick.
    pub fn rehash_step(&mut self) {
        self.dict.rehash_step(REHASH_BATCH);
    }

    /// Number of keys currently tracked by the TTL index.
    pub fn ttl_count(&self) -> usize {
        self.ttl.len()
    }
}

/*!
 * Keyspace Dictionary
 *
 * Separate-chaining hash table with FNV-1a/64 hashing, power-of-two
 * capacities, and incremental rehashing. While a resize is in progress two
 * tables coexist: writes land in the new primary table, reads fall back to
 * the old one, and every mutating call (plus one call per reactor tick)
 * migrates a bounded batch of chains. No single operation ever pays the
 * full O(n) rehash cost.
 */

use crate::value::Value;

/// First allocation is tiny; growth doubles from here.
const INITIAL_CAPACITY: usize = 4;
/// Entries per slot (chain length on average) that triggers a resize.
const MAX_LOAD_FACTOR: f64 = 2.0;
/// Slots migrated per rehash step.
pub const REHASH_BATCH: usize = 128;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a over the key bytes: XOR then multiply, per byte.
#[inline]
pub fn fnv1a64(key: &[u8]) -> u64 {
    let mut h = FNV_OFFSET;
    for &b in key {
        h ^= b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// One key's record. `expire_at` is a Unix-millisecond deadline, -1 when the
/// key never expires. The hash is cached so migration never rehashes.
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Value,
    pub expire_at: i64,
    hash: u64,
}

struct Node {
    entry: Entry,
    next: Option<Box<Node>>,
}

type Chain = Option<Box<Node>>;

struct Table {
    slots: Vec<Chain>,
    mask: u64,
    len: usize,
}

impl Table {
    fn with_capacity(cap: usize) -> Table {
        debug_assert!(cap.is_power_of_two());
        let mut slots = Vec::with_capacity(cap);
        slots.resize_with(cap, || None);
        Table {
            slots,
            mask: (cap - 1) as u64,
            len: 0,
        }
    }

    fn find(&self, key: &[u8], hash: u64) -> Option<&Entry> {
        if self.slots.is_empty() {
            return None;
        }
        let mut node = self.slots[(hash & self.mask) as usize].as_deref();
        while let Some(n) = node {
            if n.entry.hash == hash && n.entry.key == key {
                return Some(&n.entry);
            }
            node = n.next.as_deref();
        }
        None
    }

    fn find_mut(&mut self, key: &[u8], hash: u64) -> Option<&mut Entry> {
        if self.slots.is_empty() {
            return None;
        }
        let mut node = self.slots[(hash & self.mask) as usize].as_deref_mut();
        while let Some(n) = node {
            if n.entry.hash == hash && n.entry.key == key {
                return Some(&mut n.entry);
            }
            node = n.next.as_deref_mut();
        }
        None
    }

    /// Detach and return the matching entry, relinking the chain around it.
    fn unlink(&mut self, key: &[u8], hash: u64) -> Option<Entry> {
        if self.slots.is_empty() {
            return None;
        }
        let mut link = &mut self.slots[(hash & self.mask) as usize];
        loop {
            let found = match link.as_deref() {
                None => return None,
                Some(n) => n.entry.hash == hash && n.entry.key == key,
            };
            if found {
                let mut node = link.take()?;
                *link = node.next.take();
                self.len -= 1;
                return Some(node.entry);
            }
            let node = link.as_deref_mut()?;
            link = &mut node.next;
        }
    }

    /// Push an entry at the head of its chain. The key must not be present.
    fn push(&mut self, entry: Entry) {
        let idx = (entry.hash & self.mask) as usize;
        let node = Box::new(Node {
            entry,
            next: self.slots[idx].take(),
        });
        self.slots[idx] = Some(node);
        self.len += 1;
    }

    fn collect_keys(&self, out: &mut Vec<Vec<u8>>) {
        for slot in &self.slots {
            let mut node = slot.as_deref();
            while let Some(n) = node {
                out.push(n.entry.key.clone());
                node = n.next.as_deref();
            }
        }
    }
}

/// The dictionary proper: a primary table plus, during a resize, the old
/// table being drained.
pub struct Dict {
    primary: Table,
    rehash: Option<Table>,
    /// Next slot of the drain table to migrate.
    rehash_idx: usize,
}

impl Dict {
    pub fn new() -> Self {
        Dict {
            // Capacity 0 here; the real table appears on the first insert.
            primary: Table {
                slots: Vec::new(),
                mask: 0,
                len: 0,
            },
            rehash: None,
            rehash_idx: 0,
        }
    }

    #[inline]
    pub fn is_rehashing(&self) -> bool {
        self.rehash.is_some()
    }

    /// Entries across both tables.
    pub fn len(&self) -> usize {
        self.primary.len + self.rehash.as_ref().map_or(0, |t| t.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Immutable lookup: primary first, then the drain table.
    pub fn get(&self, key: &[u8]) -> Option<&Entry> {
        let h = fnv1a64(key);
        if let Some(entry) = self.primary.find(key, h) {
            return Some(entry);
        }
        self.rehash.as_ref().and_then(|t| t.find(key, h))
    }

    /// Mutable lookup with the same two-table order.
    pub fn find(&mut self, key: &[u8]) -> Option<&mut Entry> {
        let h = fnv1a64(key);
        if self.primary.find(key, h).is_some() {
            return self.primary.find_mut(key, h);
        }
        self.rehash.as_mut().and_then(|t| t.find_mut(key, h))
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Insert or overwrite.
    ///
    /// Overwrites replace the value in place and keep the entry's
    /// `expire_at`; they do not change the size. An entry still sitting in
    /// the drain table is pulled out first so the key never exists in both
    /// tables, and its deadline is carried along.
    pub fn set(&mut self, key: &[u8], value: Value) {
        if self.is_rehashing() {
            self.rehash_step(REHASH_BATCH);
        }

        let h = fnv1a64(key);
        let carried = self
            .rehash
            .as_mut()
            .and_then(|t| t.unlink(key, h))
            .map(|e| e.expire_at);

        if self.primary.slots.is_empty() {
            self.primary = Table::with_capacity(INITIAL_CAPACITY);
        }

        if let Some(entry) = self.primary.find_mut(key, h) {
            entry.value = value;
            return;
        }

        self.primary.push(Entry {
            key: key.to_vec(),
            value,
            expire_at: carried.unwrap_or(-1),
            hash: h,
        });

        let load = self.primary.len as f64 / self.primary.slots.len() as f64;
        if !self.is_rehashing() && load > MAX_LOAD_FACTOR {
            self.start_rehash();
        }
    }

    /// Delete a key from whichever table holds it.
    pub fn del(&mut self, key: &[u8]) -> bool {
        self.take(key).is_some()
    }

    /// Detach a key's entry, returning it (value, deadline and all).
    pub fn take(&mut self, key: &[u8]) -> Option<Entry> {
        if self.is_rehashing() {
            self.rehash_step(REHASH_BATCH);
        }

        let h = fnv1a64(key);
        if let Some(entry) = self.primary.unlink(key, h) {
            return Some(entry);
        }
        self.rehash.as_mut().and_then(|t| t.unlink(key, h))
    }

    /// Snapshot of every key across both tables.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        let mut out = Vec::with_capacity(self.len());
        self.primary.collect_keys(&mut out);
        if let Some(t) = &self.rehash {
            t.collect_keys(&mut out);
        }
        out
    }

    /// Migrate up to `n` slots' worth of chains from the drain table into
    /// the primary. Frees the drain table once it empties.
    pub fn rehash_step(&mut self, n: usize) {
        for _ in 0..n {
            let Some(old) = self.rehash.as_mut() else {
                return;
            };

            // Skip already-drained slots.
            while self.rehash_idx < old.slots.len() && old.slots[self.rehash_idx].is_none() {
                self.rehash_idx += 1;
            }
            if self.rehash_idx >= old.slots.len() {
                self.rehash = None;
                self.rehash_idx = 0;
                return;
            }

            // Move the whole chain, reusing each entry's cached hash.
            let mut node = old.slots[self.rehash_idx].take();
            while let Some(mut n) = node {
                node = n.next.take();
                old.len -= 1;
                let idx = (n.entry.hash & self.primary.mask) as usize;
                n.next = self.primary.slots[idx].take();
                self.primary.slots[idx] = Some(n);
                self.primary.len += 1;
            }
            self.rehash_idx += 1;

            if old.len == 0 {
                self.rehash = None;
                self.rehash_idx = 0;
                return;
            }
        }
    }

    /// Begin a resize: the primary becomes the drain table and a fresh
    /// primary at double capacity takes over.
    fn start_rehash(&mut self) {
        debug_assert!(!self.is_rehashing());
        let new_cap = self.primary.slots.len() * 2;
        let old = std::mem::replace(&mut self.primary, Table::with_capacity(new_cap));
        self.rehash = Some(old);
        self.rehash_idx = 0;
    }
}

impl Default for Dict {
    fn default() -> Self {
        Dict::new()
    }
}

/*!
 * TTL Index
 *
 * Binary min-heap of (key, deadline) pairs plus a key-to-position map, so
 * removing or re-scheduling an arbitrary key is O(log n) instead of a heap
 * scan. The root always carries the earliest deadline; the active-expiry
 * cycle pops from it with a work bound so the reactor never stalls on a
 * burst of simultaneous expirations.
 *
 * Position map and heap move in lockstep: every swap updates both slots'
 * positions, and the two structures always have the same length.
 */

use hashbrown::HashMap;

struct HeapEntry {
    key: Vec<u8>,
    deadline_ms: i64,
}

#[derive(Default)]
pub struct TtlHeap {
    heap: Vec<HeapEntry>,
    pos: HashMap<Vec<u8>, usize>,
}

impl TtlHeap {
    pub fn new() -> Self {
        TtlHeap::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Schedule a key. A key that is already tracked is re-scheduled
    /// in place; each key appears at most once.
    pub fn push(&mut self, key: &[u8], deadline_ms: i64) {
        if self.pos.contains_key(key) {
            self.update(key, deadline_ms);
            return;
        }
        let idx = self.heap.len();
        self.heap.push(HeapEntry {
            key: key.to_vec(),
            deadline_ms,
        });
        self.pos.insert(key.to_vec(), idx);
        self.sift_up(idx);
        debug_assert_eq!(self.heap.len(), self.pos.len());
    }

    /// Drop a key from the index. Unknown keys are a no-op.
    pub fn remove(&mut self, key: &[u8]) {
        let Some(idx) = self.pos.get(key).copied() else {
            return;
        };

        let last = self.heap.len() - 1;
        if idx != last {
            self.swap_entries(idx, last);
        }
        let gone = self.heap.pop();
        if let Some(entry) = gone {
            self.pos.remove(&entry.key);
        }

        // The element swapped into the hole can violate the heap property
        // in either direction; only one of the two sifts will move it.
        if idx < self.heap.len() {
            self.sift_down(idx);
            self.sift_up(idx);
        }
        debug_assert_eq!(self.heap.len(), self.pos.len());
    }

    /// Change a key's deadline in place. Unknown keys become a push.
    pub fn update(&mut self, key: &[u8], deadline_ms: i64) {
        let Some(idx) = self.pos.get(key).copied() else {
            self.push(key, deadline_ms);
            return;
        };
        self.heap[idx].deadline_ms = deadline_ms;
        self.sift_up(idx);
        self.sift_down(idx);
        debug_assert_eq!(self.heap.len(), self.pos.len());
    }

    /// Pop and return keys whose deadline is at or before `now_ms`,
    /// stopping after `max_work` pops.
    pub fn pop_expired(&mut self, now_ms: i64, max_work: usize) -> Vec<Vec<u8>> {
        let mut expired = Vec::new();
        while expired.len() < max_work {
            match self.heap.first() {
                Some(root) if root.deadline_ms <= now_ms => {}
                _ => break,
            }

            let last = self.heap.len() - 1;
            if last > 0 {
                self.swap_entries(0, last);
            }
            if let Some(entry) = self.heap.pop() {
                self.pos.remove(&entry.key);
                expired.push(entry.key);
            }
            if !self.heap.is_empty() {
                self.sift_down(0);
            }
        }
        debug_assert_eq!(self.heap.len(), self.pos.len());
        expired
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.heap[idx].deadline_ms >= self.heap[parent].deadline_ms {
                break;
            }
            self.swap_entries(idx, parent);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        loop {
            let left = 2 * idx + 1;
            let right = 2 * idx + 2;
            let mut smallest = idx;

            if left < self.heap.len()
                && self.heap[left].deadline_ms < self.heap[smallest].deadline_ms
            {
                smallest = left;
            }
            if right < self.heap.len()
                && self.heap[right].deadline_ms < self.heap[smallest].deadline_ms
            {
                smallest = right;
            }
            if smallest == idx {
                break;
            }
            self.swap_entries(idx, smallest);
            idx = smallest;
        }
    }

    fn swap_entries(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        // Both slots changed owners; the position map must follow.
        self.pos.insert(self.heap[a].key.clone(), a);
        self.pos.insert(self.heap[b].key.clone(), b);
    }
}

/*!
 * Sorted-Set Ordered Index
 *
 * A probabilistic skiplist ordered by (score ascending, member ascending,
 * bytewise). Expected O(log n) insert/remove/lookup; rank and range queries
 * walk level 0. Nodes live in an index-linked arena with a free list, so
 * every cross-level link is a plain u32 and the whole structure stays on
 * the safe side of the borrow checker.
 */

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Level 32 would need on the order of 4^32 elements at p = 1/4.
const MAX_LEVEL: usize = 32;
/// Promotion: one-in-four chance per additional level.
const BRANCHING: u32 = 4;
/// Arena index meaning "no node".
const NIL: u32 = u32::MAX;

struct Node {
    member: Vec<u8>,
    score: f64,
    /// One forward link per level this node participates in.
    forward: Vec<u32>,
}

pub struct Skiplist {
    /// nodes[0] is the head sentinel; it carries no member.
    nodes: Vec<Node>,
    /// Recycled arena slots from removed nodes.
    free: Vec<u32>,
    /// Highest level currently in use (1-based).
    level: usize,
    len: usize,
    rng: SmallRng,
}

impl Skiplist {
    pub fn new() -> Self {
        Skiplist {
            nodes: vec![Node {
                member: Vec::new(),
                score: 0.0,
                forward: vec![NIL; MAX_LEVEL],
            }],
            free: Vec::new(),
            level: 1,
            len: 0,
            rng: SmallRng::from_entropy(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert `(member, score)`. The caller guarantees the exact pair is not
    /// already present (the score dict in front of this index enforces it).
    pub fn insert(&mut self, member: Vec<u8>, score: f64) {
        // update[i]: last node at level i that sorts before the new node.
        let mut update = [0u32; MAX_LEVEL];
        let mut x = 0u32;
        for i in (0..self.level).rev() {
            loop {
                let next = self.nodes[x as usize].forward[i];
                if next != NIL && self.precedes(next, score, &member) {
                    x = next;
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        // update[] was zero-initialized, so any level above the old maximum
        // already points at the head sentinel.
        let new_level = self.random_level();
        if new_level > self.level {
            self.level = new_level;
        }

        let idx = self.alloc(member, score, new_level);
        for i in 0..new_level {
            let prev = update[i] as usize;
            let next = self.nodes[prev].forward[i];
            self.nodes[idx as usize].forward[i] = next;
            self.nodes[prev].forward[i] = idx;
        }
        self.len += 1;
    }

    /// Remove the node with exactly `(member, score)`. Returns false if no
    /// such pair exists.
    pub fn remove(&mut self, member: &[u8], score: f64) -> bool {
        let mut update = [0u32; MAX_LEVEL];
        let mut x = 0u32;
        for i in (0..self.level).rev() {
            loop {
                let next = self.nodes[x as usize].forward[i];
                if next != NIL && self.precedes(next, score, member) {
                    x = next;
                } else {
                    break;
                }
            }
            update[i] = x;
        }

        let target = self.nodes[x as usize].forward[0];
        if target == NIL {
            return false;
        }
        {
            let node = &self.nodes[target as usize];
            if node.score != score || node.member != member {
                return false;
            }
        }

        for i in 0..self.level {
            let prev = update[i] as usize;
            if self.nodes[prev].forward[i] != target {
                break;
            }
            let next = self.nodes[target as usize].forward[i];
            self.nodes[prev].forward[i] = next;
        }

        self.release(target);
        self.len -= 1;

        // Drop levels whose only occupant was the removed node.
        while self.level > 1 && self.nodes[0].forward[self.level - 1] == NIL {
            self.level -= 1;
        }
        true
    }

    /// Exact-pair membership test.
    pub fn contains(&self, member: &[u8], score: f64) -> bool {
        let mut x = 0u32;
        for i in (0..self.level).rev() {
            loop {
                let next = self.nodes[x as usize].forward[i];
                if next != NIL && self.precedes(next, score, member) {
                    x = next;
                } else {
                    break;
                }
            }
        }
        let next = self.nodes[x as usize].forward[0];
        if next == NIL {
            return false;
        }
        let node = &self.nodes[next as usize];
        node.score == score && node.member == member
    }

    /// 0-based ascending rank of `(member, score)`, walking level 0.
    pub fn rank(&self, member: &[u8], score: f64) -> Option<usize> {
        let mut x = self.nodes[0].forward[0];
        let mut r = 0;
        while x != NIL {
            let node = &self.nodes[x as usize];
            if node.score == score && node.member == member {
                return Some(r);
            }
            x = node.forward[0];
            r += 1;
        }
        None
    }

    /// Elements between ranks `start` and `stop`, both inclusive, 0-based.
    /// Negative indices count from the end; out-of-range values clamp; an
    /// inverted range after normalization is empty.
    pub fn range_by_rank(&self, start: i64, stop: i64) -> Vec<(Vec<u8>, f64)> {
        let n = self.len as i64;
        let mut start = if start < 0 { start + n } else { start };
        let mut stop = if stop < 0 { stop + n } else { stop };
        if start < 0 {
            start = 0;
        }
        if stop >= n {
            stop = n - 1;
        }
        if start > stop || start >= n {
            return Vec::new();
        }

        let mut out = Vec::with_capacity((stop - start + 1) as usize);
        let mut x = self.nodes[0].forward[0];
        for _ in 0..start {
            x = self.nodes[x as usize].forward[0];
        }
        for _ in start..=stop {
            let node = &self.nodes[x as usize];
            out.push((node.member.clone(), node.score));
            x = node.forward[0];
        }
        out
    }

    /// Does arena node `idx` sort strictly before `(score, member)`?
    #[inline]
    fn precedes(&self, idx: u32, score: f64, member: &[u8]) -> bool {
        let node = &self.nodes[idx as usize];
        node.score < score || (node.score == score && node.member.as_slice() < member)
    }

    /// Geometric level draw: P(level >= k) = (1/4)^(k-1), capped at 32.
    fn random_level(&mut self) -> usize {
        let mut level = 1;
        while level < MAX_LEVEL && self.rng.gen_range(0..BRANCHING) == 0 {
            level += 1;
        }
        level
    }

    fn alloc(&mut self, member: Vec<u8>, score: f64, level: usize) -> u32 {
        let node = Node {
            member,
            score,
            forward: vec![NIL; level],
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx as usize] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                (self.nodes.len() - 1) as u32
            }
        }
    }

    fn release(&mut self, idx: u32) {
        // Leave a hollow node in the slot; the free list hands it back on
        // the next insert.
        let node = &mut self.nodes[idx as usize];
        node.member = Vec::new();
        node.forward = Vec::new();
        self.free.push(idx);
    }
}

impl Default for Skiplist {
    fn default() -> Self {
        Skiplist::new()
    }
}

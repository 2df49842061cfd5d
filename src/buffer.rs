/*!
 * Framed I/O Byte Buffer
 *
 * A contiguous byte region with a read cursor and a write cursor, used for
 * both the incoming and outgoing side of every connection. Consumed space is
 * reclaimed with a 3-tier compaction strategy instead of erase-from-front:
 *
 *   Tier 1: reset both cursors when the buffer drains (O(1))
 *   Tier 2: memmove unread bytes to the front when the tail is too small
 *   Tier 3: compact, then grow the backing storage by doubling
 */

/// Starting capacity for the first allocation. 4 KB matches the per-event
/// read chunk, so a request/response exchange normally never grows past it.
const INITIAL_CAPACITY: usize = 4096;

/// Byte buffer with `[rpos, wpos)` readable and `[wpos, cap)` writable.
///
/// A fresh buffer owns no memory at all; idle connections therefore cost
/// nothing beyond the struct itself. Storage appears on the first
/// `ensure_writable` / `append`.
#[derive(Default)]
pub struct Buffer {
    data: Vec<u8>,
    rpos: usize,
    wpos: usize,
}

impl Buffer {
    pub fn new() -> Self {
        Buffer::default()
    }

    /// Unread bytes, in arrival order.
    #[inline]
    pub fn readable(&self) -> &[u8] {
        &self.data[self.rpos..self.wpos]
    }

    #[inline]
    pub fn readable_len(&self) -> usize {
        self.wpos - self.rpos
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rpos == self.wpos
    }

    /// Contiguous writable tail. Fill it, then call `commit_write` with the
    /// number of bytes actually produced (the `read(2)` into-buffer pattern).
    #[inline]
    pub fn writable_mut(&mut self) -> &mut [u8] {
        let len = self.data.len();
        &mut self.data[self.wpos..len]
    }

    #[inline]
    pub fn writable_len(&self) -> usize {
        self.data.len() - self.wpos
    }

    /// Advance the write cursor after bytes were produced into `writable_mut`.
    #[inline]
    pub fn commit_write(&mut self, n: usize) {
        assert!(n <= self.writable_len(), "commit_write past writable region");
        self.wpos += n;
    }

    /// Consume `n` bytes from the front.
    ///
    /// Tier 1: when the buffer drains completely, both cursors snap back to
    /// zero so the whole capacity is writable again without any copying.
    /// Capacity is never returned to the allocator.
    #[inline]
    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.readable_len(), "consume past readable region");
        self.rpos += n;
        if self.rpos == self.wpos {
            self.rpos = 0;
            self.wpos = 0;
        }
    }

    /// Copy `bytes` into the buffer, growing as needed.
    pub fn append(&mut self, bytes: &[u8]) {
        self.ensure_writable(bytes.len());
        let start = self.wpos;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self.wpos += bytes.len();
    }

    /// Make at least `n` bytes of contiguous writable space available.
    ///
    /// Tier 2: if total capacity minus unread bytes already covers `n`,
    /// shift the unread region to the front and reuse the consumed space.
    /// Tier 3: otherwise compact and double the capacity (starting from
    /// 4096) until the request fits. Unread bytes survive every tier.
    pub fn ensure_writable(&mut self, n: usize) {
        if self.writable_len() >= n {
            return;
        }

        let readable = self.readable_len();

        if self.data.len() >= readable + n {
            // Tier 2: compaction alone is enough.
            self.data.copy_within(self.rpos..self.wpos, 0);
            self.rpos = 0;
            self.wpos = readable;
            return;
        }

        // Tier 3: compact first, then grow.
        self.data.copy_within(self.rpos..self.wpos, 0);
        self.rpos = 0;
        self.wpos = readable;

        let needed = self.wpos + n;
        let mut new_cap = self.data.len().max(INITIAL_CAPACITY);
        while new_cap < needed {
            new_cap *= 2;
        }
        self.data.resize(new_cap, 0);
    }

    /// Total bytes of backing storage currently owned.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }
}

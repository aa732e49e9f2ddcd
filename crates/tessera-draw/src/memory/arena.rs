use crate::error::{DrawError, Result};

use super::handle::MAX_CHUNKS;

/// Position of an element inside an [`Arena`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ArenaIndex {
    pub chunk: u32,
    pub slot: u32,
}

impl ArenaIndex {
    #[inline]
    pub const fn new(chunk: u32, slot: u32) -> Self {
        Self { chunk, slot }
    }
}

/// Chunked, append-only element pool with stable addresses.
///
/// - Every chunk is a `Vec<T>` whose capacity is reserved once and never
///   exceeded, so elements never move while the arena is in use.
/// - `reset()` drops the elements but keeps the chunk storage; the next frame
///   refills the same chunks before allocating new ones.
/// - Chunks are never removed or reordered, only appended or reset.
#[derive(Debug)]
pub struct Arena<T> {
    chunks: Vec<Vec<T>>,
    chunk_len: usize,
    /// Number of chunks handed out since the last reset.
    active: usize,
    /// Live elements across all active chunks.
    len: usize,
}

impl<T> Arena<T> {
    /// Creates an empty arena whose chunks hold `chunk_len` elements.
    pub fn new(chunk_len: usize) -> Self {
        assert!(chunk_len > 0, "arena chunk length must be non-zero");
        Self {
            chunks: Vec::new(),
            chunk_len,
            active: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    /// Number of chunks in use this frame.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.active
    }

    /// Number of chunks with storage, in use or kept for reuse.
    #[inline]
    pub fn reserved_chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of live elements.
    ///
    /// Chunks opened with `allocate_chunk` may leave earlier ones partly
    /// filled, so this is not derived from the chunk count.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes a new chunk current and returns its id.
    ///
    /// Reuses storage kept by a previous `reset()` when available.
    pub fn allocate_chunk(&mut self) -> Result<u32> {
        if self.active >= MAX_CHUNKS as usize {
            return Err(DrawError::HandleSpaceExhausted);
        }

        if self.active == self.chunks.len() {
            let mut storage = Vec::new();
            storage.try_reserve_exact(self.chunk_len).map_err(|_| DrawError::OutOfMemory {
                requested_bytes: self.chunk_len.saturating_mul(std::mem::size_of::<T>()),
            })?;
            self.chunks
                .try_reserve(1)
                .map_err(|_| DrawError::OutOfMemory {
                    requested_bytes: std::mem::size_of::<Vec<T>>(),
                })?;
            self.chunks.push(storage);
            log::debug!(
                "arena<{}>: allocated chunk {} ({} elements)",
                std::any::type_name::<T>(),
                self.active,
                self.chunk_len
            );
        }

        debug_assert!(self.chunks[self.active].is_empty());
        let id = self.active as u32;
        self.active += 1;
        Ok(id)
    }

    /// Stores `value` in the current chunk, opening a new chunk when it is full.
    pub fn alloc(&mut self, value: T) -> Result<ArenaIndex> {
        let needs_chunk = match self.active {
            0 => true,
            n => self.chunks[n - 1].len() == self.chunk_len,
        };
        if needs_chunk {
            self.allocate_chunk()?;
        }

        let chunk = self.active - 1;
        let storage = &mut self.chunks[chunk];
        let slot = storage.len();
        storage.push(value);
        self.len += 1;

        Ok(ArenaIndex::new(chunk as u32, slot as u32))
    }

    /// Index the next `alloc()` will return, without allocating.
    pub fn next_index(&self) -> ArenaIndex {
        match self.active {
            0 => ArenaIndex::new(0, 0),
            n if self.chunks[n - 1].len() == self.chunk_len => ArenaIndex::new(n as u32, 0),
            n => ArenaIndex::new((n - 1) as u32, self.chunks[n - 1].len() as u32),
        }
    }

    #[inline]
    pub fn get(&self, index: ArenaIndex) -> Option<&T> {
        if index.chunk as usize >= self.active {
            return None;
        }
        self.chunks[index.chunk as usize].get(index.slot as usize)
    }

    #[inline]
    pub fn get_mut(&mut self, index: ArenaIndex) -> Option<&mut T> {
        if index.chunk as usize >= self.active {
            return None;
        }
        self.chunks[index.chunk as usize].get_mut(index.slot as usize)
    }

    /// Returns the element at `(chunk, slot)`.
    ///
    /// # Panics
    /// Panics if the address was not allocated since the last reset.
    #[inline]
    pub fn element_at(&self, chunk: u32, slot: u32) -> &T {
        self.get(ArenaIndex::new(chunk, slot))
            .unwrap_or_else(|| panic!("invalid arena address {chunk}:{slot}"))
    }

    /// Mutable variant of [`element_at`](Self::element_at).
    #[inline]
    pub fn element_at_mut(&mut self, chunk: u32, slot: u32) -> &mut T {
        self.get_mut(ArenaIndex::new(chunk, slot))
            .unwrap_or_else(|| panic!("invalid arena address {chunk}:{slot}"))
    }

    /// Live elements of one chunk, in allocation order.
    pub fn chunk(&self, chunk: u32) -> &[T] {
        if chunk as usize >= self.active {
            return &[];
        }
        &self.chunks[chunk as usize]
    }

    /// Iterates live elements in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.chunks[..self.active].iter().flat_map(|c| c.iter())
    }

    /// Iterates live elements mutably in allocation order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.chunks[..self.active].iter_mut().flat_map(|c| c.iter_mut())
    }

    /// Drops all elements; chunk storage is kept for the next frame.
    pub fn reset(&mut self) {
        for storage in &mut self.chunks[..self.active] {
            storage.clear();
        }
        self.active = 0;
        self.len = 0;
    }

    /// Releases chunk storage beyond what the last frame used.
    pub fn shrink_to_active(&mut self) {
        self.chunks.truncate(self.active.max(1).min(self.chunks.len()));
    }
}

use core::fmt;

/// Number of bits used for the slot inside a chunk.
pub const SLOT_BITS: u32 = 9;
/// Number of bits used for the chunk index.
pub const CHUNK_BITS: u32 = 22;

/// Maximum number of slots addressable inside one chunk (`1 << SLOT_BITS`).
pub const MAX_SLOTS_PER_CHUNK: u32 = 1 << SLOT_BITS;
/// Maximum chunk index + 1.
pub const MAX_CHUNKS: u32 = 1 << CHUNK_BITS;

const SLOT_MASK: u32 = MAX_SLOTS_PER_CHUNK - 1;
const CHUNK_MASK: u32 = (MAX_CHUNKS - 1) << SLOT_BITS;
const NEGATIVE_SCALE_BIT: u32 = 1 << 31;

/// Packed 32-bit address of an element stored in an [`Arena`](super::Arena).
///
/// Layout, most significant bit first:
///
/// | bits  | field          |
/// |-------|----------------|
/// | 31    | negative scale |
/// | 9..31 | chunk id       |
/// | 0..9  | slot id        |
///
/// The layout is explicit (no compiler bitfields) so that sorting handles by
/// their raw value groups them by chunk first, then by slot.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, PartialOrd, Ord)]
pub struct ResourceHandle(u32);

impl ResourceHandle {
    /// Handle of the identity ("unit") per-object record, always present.
    pub const UNIT: ResourceHandle = ResourceHandle(0);

    #[inline]
    pub const fn new(chunk: u32, slot: u32, negative_scale: bool) -> Self {
        debug_assert!(chunk < MAX_CHUNKS, "chunk id out of range");
        debug_assert!(slot < MAX_SLOTS_PER_CHUNK, "slot id out of range");
        let sign = if negative_scale { NEGATIVE_SCALE_BIT } else { 0 };
        Self(sign | ((chunk << SLOT_BITS) & CHUNK_MASK) | (slot & SLOT_MASK))
    }

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn chunk(self) -> u32 {
        (self.0 & CHUNK_MASK) >> SLOT_BITS
    }

    #[inline]
    pub const fn slot(self) -> u32 {
        self.0 & SLOT_MASK
    }

    #[inline]
    pub const fn is_negative_scale(self) -> bool {
        self.0 & NEGATIVE_SCALE_BIT != 0
    }

    /// Returns the same address with the negative-scale flag set.
    #[inline]
    pub const fn with_negative_scale(self) -> Self {
        Self(self.0 | NEGATIVE_SCALE_BIT)
    }

    /// Returns the address without the negative-scale flag.
    ///
    /// This is the value exposed to shaders as the resource id.
    #[inline]
    pub const fn without_flags(self) -> Self {
        Self(self.0 & !NEGATIVE_SCALE_BIT)
    }

    /// Advances the slot counter by one.
    ///
    /// Never carries into the chunk field: moving to the next chunk is the
    /// owner's decision (see [`ResourceStore`](crate::draw::ResourceStore)).
    ///
    /// # Panics
    /// Panics if the slot is already the last addressable one.
    #[inline]
    pub fn increment(&mut self) {
        assert!(
            self.slot() + 1 < MAX_SLOTS_PER_CHUNK,
            "ResourceHandle slot overflow; the owning arena must roll over to a new chunk"
        );
        self.0 += 1;
    }
}

/// Builds a handle from its three fields.
#[inline]
pub const fn make_handle(chunk: u32, slot: u32, negative_scale: bool) -> ResourceHandle {
    ResourceHandle::new(chunk, slot, negative_scale)
}

#[inline]
pub const fn chunk_of(handle: ResourceHandle) -> u32 {
    handle.chunk()
}

#[inline]
pub const fn slot_of(handle: ResourceHandle) -> u32 {
    handle.slot()
}

#[inline]
pub const fn is_negative_scale(handle: ResourceHandle) -> bool {
    handle.is_negative_scale()
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceHandle({}:{}", self.chunk(), self.slot())?;
        if self.is_negative_scale() {
            f.write_str(", neg")?;
        }
        f.write_str(")")
    }
}

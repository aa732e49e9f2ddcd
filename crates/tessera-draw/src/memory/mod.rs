//! Frame-lifetime memory.
//!
//! - `Arena`: chunked pool with stable element addresses until `reset()`
//! - `ResourceHandle`: packed (sign, chunk, slot) address into an arena

mod arena;
mod handle;

pub use arena::{Arena, ArenaIndex};
pub use handle::{
    chunk_of, is_negative_scale, make_handle, slot_of, ResourceHandle, CHUNK_BITS, MAX_CHUNKS,
    MAX_SLOTS_PER_CHUNK, SLOT_BITS,
};

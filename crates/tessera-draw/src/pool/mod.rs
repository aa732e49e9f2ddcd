//! Transient texture pool.
//!
//! Render targets that live for a part of a frame are borrowed from a shared
//! pool instead of being owned by each feature. The pool matches on extent,
//! format and usage, and evicts textures nobody used for a few frames.

mod texture_from_pool;
mod texture_pool;

pub use texture_from_pool::TextureFromPool;
pub use texture_pool::{PoolKey, PoolOwner, TexturePool};

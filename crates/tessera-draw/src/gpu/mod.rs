//! Typed wrappers over device objects.
//!
//! Each wrapper starts empty, creates its object on demand (`ensure_*`,
//! `push_update`) and queues it for release when dropped.

mod buffer;
mod fallback;
mod framebuffer;
mod swap_chain;
mod texture;

pub use buffer::{
    DeviceMirror, StorageArrayBuffer, StorageBuffer, StorageVectorBuffer, UniformBuffer, MAX_UNIFORM_BUFFER_BYTES,
};
pub use fallback::FallbackTextures;
pub use framebuffer::Framebuffer;
pub use swap_chain::SwapChain;
pub use texture::Texture;

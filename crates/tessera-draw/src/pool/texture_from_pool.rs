use crate::device::{ResourceDevice, TextureId};
use crate::gpu::Texture;

use super::texture_pool::TexturePool;

/// Transient texture handle lent by a [`TexturePool`].
///
/// Must be released before the pool's frame reset; leaks are reported there.
#[derive(Debug, Default)]
pub struct TextureFromPool {
    id: Option<TextureId>,
}

impl TextureFromPool {
    pub const fn new() -> Self {
        Self { id: None }
    }

    #[inline]
    pub fn id(&self) -> Option<TextureId> {
        self.id
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.id.is_some()
    }

    /// Returns `false` when the pool could not provide a texture.
    pub fn acquire(
        &mut self,
        pool: &mut TexturePool,
        device: &mut (impl ResourceDevice + ?Sized),
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> bool {
        assert!(self.id.is_none(), "pooled texture acquired twice without release");
        self.id = pool.acquire(device, width, height, format, usage);
        self.id.is_some()
    }

    pub fn release(&mut self, pool: &mut TexturePool) {
        if let Some(id) = self.id.take() {
            pool.release(id);
        }
    }

    /// Exchanges the pooled texture with an owned one.
    ///
    /// `owned` keeps the pooled texture past the frame; the pool takes the
    /// previous contents of `owned` as an acquired texture, now referenced by
    /// `pooled`. An invalid `owned` leaves `pooled` empty.
    pub fn swap_with_texture(pooled: &mut TextureFromPool, owned: &mut Texture, pool: &mut TexturePool) {
        let Some(pooled_id) = pooled.id.take() else {
            panic!("swapping a pooled texture that was not acquired");
        };
        let pooled_desc = pool.take_texture_ownership(pooled_id);

        let previous = owned.take();
        owned.adopt(pooled_id, pooled_desc, pool.release_queue());

        if let Some((id, desc)) = previous {
            pool.give_texture_ownership(id, desc);
            pooled.id = Some(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{Extent, RecordingDevice, TextureDimension};

    const FMT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
    const USAGE: wgpu::TextureUsages =
        wgpu::TextureUsages::RENDER_ATTACHMENT.union(wgpu::TextureUsages::TEXTURE_BINDING);

    #[test]
    fn acquire_and_release_go_through_the_pool() {
        let mut dev = RecordingDevice::new();
        let mut pool = TexturePool::new(4);
        let mut tx = TextureFromPool::new();

        assert!(tx.acquire(&mut pool, &mut dev, 32, 32, FMT, USAGE));
        assert_eq!(pool.in_use_count(), 1);
        tx.release(&mut pool);
        assert!(!tx.is_valid());
        assert_eq!(pool.in_use_count(), 0);
    }

    #[test]
    #[should_panic(expected = "acquired twice")]
    fn double_acquire_panics() {
        let mut dev = RecordingDevice::new();
        let mut pool = TexturePool::new(4);
        let mut tx = TextureFromPool::new();
        tx.acquire(&mut pool, &mut dev, 32, 32, FMT, USAGE);
        tx.acquire(&mut pool, &mut dev, 32, 32, FMT, USAGE);
    }

    #[test]
    fn swap_moves_ownership_both_ways() {
        let mut dev = RecordingDevice::new();
        let mut pool = TexturePool::new(4);

        let mut history = Texture::new("history");
        history.ensure_2d(&mut dev, FMT, 16, 16, USAGE, 1);
        let old = history.id().unwrap();

        let mut tx = TextureFromPool::new();
        tx.acquire(&mut pool, &mut dev, 32, 32, FMT, USAGE);
        let fresh = tx.id().unwrap();

        TextureFromPool::swap_with_texture(&mut tx, &mut history, &mut pool);
        assert_eq!(history.id(), Some(fresh));
        assert_eq!(history.extent(), Some(Extent::d2(32, 32)));
        assert_eq!(tx.id(), Some(old));
        assert_eq!(pool.desc(old).map(|d| d.extent), Some(Extent::d2(16, 16)));

        tx.release(&mut pool);
        pool.reset(&mut dev);
        assert_eq!(pool.len(), 1);
        assert!(dev.is_texture_alive(fresh));
    }

    #[test]
    fn swapped_in_layered_texture_only_matches_its_own_shape() {
        let mut dev = RecordingDevice::new();
        let mut pool = TexturePool::new(4);

        let mut owned = Texture::new("layers");
        owned.ensure_2d_array(&mut dev, FMT, 16, 16, 4, USAGE, 3);
        let layered = owned.id().unwrap();

        let mut tx = TextureFromPool::new();
        tx.acquire(&mut pool, &mut dev, 16, 16, FMT, USAGE);
        TextureFromPool::swap_with_texture(&mut tx, &mut owned, &mut pool);
        assert_eq!(tx.id(), Some(layered));
        tx.release(&mut pool);

        let plain = pool.acquire(&mut dev, 16, 16, FMT, USAGE).unwrap();
        assert_ne!(plain, layered);
        let desc = pool.desc(plain).unwrap();
        assert_eq!(desc.dimension, TextureDimension::D2);
        assert_eq!(desc.extent, Extent::d2(16, 16));
        assert_eq!(desc.mip_count, 1);
    }

    #[test]
    fn swap_with_empty_texture_leaves_handle_empty() {
        let mut dev = RecordingDevice::new();
        let mut pool = TexturePool::new(4);
        let mut owned = Texture::new("owned");
        let mut tx = TextureFromPool::new();
        tx.acquire(&mut pool, &mut dev, 8, 8, FMT, USAGE);

        TextureFromPool::swap_with_texture(&mut tx, &mut owned, &mut pool);
        assert!(owned.is_valid());
        assert!(!tx.is_valid());
        assert!(pool.is_empty());

        drop(owned);
        assert_eq!(dev.collect_released(), 1);
    }
}

use crate::device::{Extent, ReleaseQueue, Released, ResourceDevice, TextureDesc, TextureDimension, TextureId};

/// Identifies a consumer of [`TexturePool::query`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PoolOwner(pub u64);

/// Parameters a pooled texture must match to be handed out.
///
/// Textures the pool creates are single-mip 2D. Textures handed over through
/// `give_texture_ownership` keep their own shape and only match requests for
/// that shape.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PoolKey {
    pub dimension: TextureDimension,
    pub extent: Extent,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
    pub mip_count: u32,
}

impl PoolKey {
    pub fn d2(width: u32, height: u32, format: wgpu::TextureFormat, usage: wgpu::TextureUsages) -> Self {
        Self {
            dimension: TextureDimension::D2,
            extent: Extent::d2(width, height),
            format,
            usage,
            mip_count: 1,
        }
    }

    fn desc(&self) -> TextureDesc {
        TextureDesc {
            label: Some("pooled".into()),
            dimension: self.dimension,
            extent: self.extent,
            format: self.format,
            usage: self.usage,
            mip_count: self.mip_count,
        }
    }

    fn of(desc: &TextureDesc) -> Self {
        Self {
            dimension: desc.dimension,
            extent: desc.extent,
            format: desc.format,
            usage: desc.usage,
            mip_count: desc.mip_count,
        }
    }
}

#[derive(Debug)]
struct PooledTexture {
    id: TextureId,
    desc: TextureDesc,
    key: PoolKey,
    /// Lent out through `acquire` and not yet released.
    in_use: bool,
    /// Owners that got this texture through `query` this frame.
    owners: Vec<PoolOwner>,
    used_this_frame: bool,
    idle_frames: u32,
}

impl PooledTexture {
    fn is_free(&self) -> bool {
        !self.in_use && self.owners.is_empty()
    }
}

/// Shared pool of transient textures.
///
/// Contents are undefined on every hand-out. A texture is never lent to a
/// second `acquire` before it is released. Textures unused for
/// `eviction_frames` frames are destroyed at `reset`.
#[derive(Debug)]
pub struct TexturePool {
    textures: Vec<PooledTexture>,
    eviction_frames: u32,
    release: Option<ReleaseQueue>,
}

impl TexturePool {
    pub fn new(eviction_frames: u32) -> Self {
        Self {
            textures: Vec::new(),
            eviction_frames: eviction_frames.max(1),
            release: None,
        }
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Textures currently lent through `acquire`.
    pub fn in_use_count(&self) -> usize {
        self.textures.iter().filter(|t| t.in_use).count()
    }

    pub fn desc(&self, id: TextureId) -> Option<&TextureDesc> {
        self.find(id).map(|i| &self.textures[i].desc)
    }

    // ── lending ───────────────────────────────────────────────────────────

    /// Lends an idle texture matching the key, creating one if none is idle.
    ///
    /// Returns `None` when the device fails to create the texture.
    pub fn acquire(
        &mut self,
        device: &mut (impl ResourceDevice + ?Sized),
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Option<TextureId> {
        let key = PoolKey::d2(width, height, format, usage);
        let index = match self.textures.iter().position(|t| t.key == key && t.is_free()) {
            Some(index) => index,
            None => self.create(device, key)?,
        };
        let entry = &mut self.textures[index];
        entry.in_use = true;
        entry.used_this_frame = true;
        Some(entry.id)
    }

    /// Returns a texture obtained from `acquire`.
    pub fn release(&mut self, id: TextureId) {
        let index = self.find(id);
        let entry = index.map(|i| &mut self.textures[i]);
        match entry {
            Some(entry) if entry.in_use => entry.in_use = false,
            _ => panic!("released a texture that is not acquired from this pool"),
        }
    }

    /// Returns a texture `owner` is not already using this frame.
    ///
    /// Unlike `acquire`, different owners may share one texture for the whole
    /// frame; no release is needed. Ownership is cleared at `reset`.
    pub fn query(
        &mut self,
        device: &mut (impl ResourceDevice + ?Sized),
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        owner: PoolOwner,
    ) -> Option<TextureId> {
        let key = PoolKey::d2(width, height, format, usage);
        let index = match self
            .textures
            .iter()
            .position(|t| t.key == key && !t.in_use && !t.owners.contains(&owner))
        {
            Some(index) => index,
            None => self.create(device, key)?,
        };
        let entry = &mut self.textures[index];
        entry.owners.push(owner);
        entry.used_this_frame = true;
        Some(entry.id)
    }

    // ── ownership transfer ────────────────────────────────────────────────

    /// Removes an acquired texture from the pool; the caller now owns it.
    pub fn take_texture_ownership(&mut self, id: TextureId) -> TextureDesc {
        let index = self.find(id).filter(|&i| self.textures[i].in_use);
        let Some(index) = index else {
            panic!("ownership can only be taken of an acquired pooled texture");
        };
        self.textures.swap_remove(index).desc
    }

    /// Hands an owned texture to the pool, as if it had been acquired.
    pub fn give_texture_ownership(&mut self, id: TextureId, desc: TextureDesc) {
        assert!(self.find(id).is_none(), "texture already belongs to the pool");
        self.textures.push(PooledTexture {
            id,
            key: PoolKey::of(&desc),
            desc,
            in_use: true,
            owners: Vec::new(),
            used_this_frame: true,
            idle_frames: 0,
        });
    }

    pub(crate) fn release_queue(&self) -> Option<ReleaseQueue> {
        self.release.clone()
    }

    // ── frame ─────────────────────────────────────────────────────────────

    /// Ends the frame: clears query owners and evicts long-idle textures.
    ///
    /// Textures still acquired are reported and kept.
    pub fn reset(&mut self, device: &mut (impl ResourceDevice + ?Sized)) {
        let leaked = self.in_use_count();
        if leaked > 0 {
            log::warn!("{leaked} pooled textures still acquired at frame end");
        }

        let eviction_frames = self.eviction_frames;
        let mut evicted = 0;
        self.textures.retain_mut(|t| {
            t.owners.clear();
            if t.used_this_frame || t.in_use {
                t.idle_frames = 0;
            } else {
                t.idle_frames += 1;
            }
            t.used_this_frame = false;

            let evict = t.idle_frames >= eviction_frames;
            if evict {
                device.destroy_texture(t.id);
                evicted += 1;
            }
            !evict
        });
        if evicted > 0 {
            log::debug!("texture pool evicted {evicted} textures, {} left", self.textures.len());
        }
    }

    /// Destroys every pooled texture now.
    pub fn free(&mut self, device: &mut (impl ResourceDevice + ?Sized)) {
        for t in self.textures.drain(..) {
            device.destroy_texture(t.id);
        }
    }

    fn create(&mut self, device: &mut (impl ResourceDevice + ?Sized), key: PoolKey) -> Option<usize> {
        if self.release.is_none() {
            self.release = Some(device.release_queue().clone());
        }
        let desc = key.desc();
        let Some(id) = device.create_texture(&desc) else {
            log::warn!("pooled texture {:?} {:?} could not be created", key.extent, key.format);
            return None;
        };
        log::debug!("texture pool grew to {} ({:?} {:?})", self.textures.len() + 1, key.extent, key.format);
        self.textures.push(PooledTexture {
            id,
            desc,
            key,
            in_use: false,
            owners: Vec::new(),
            used_this_frame: false,
            idle_frames: 0,
        });
        Some(self.textures.len() - 1)
    }

    fn find(&self, id: TextureId) -> Option<usize> {
        self.textures.iter().position(|t| t.id == id)
    }
}

impl Drop for TexturePool {
    fn drop(&mut self) {
        let Some(queue) = &self.release else { return };
        for t in self.textures.drain(..) {
            queue.push(Released::Texture(t.id));
        }
    }
}

use crate::device::{
    ClearValue, Extent, ReleaseQueue, Released, ResourceDevice, TextureDesc, TextureDimension, TextureId,
    TextureViewDesc, TextureViewId,
};

/// Owned device texture, re-created on demand by the `ensure_*` family.
///
/// Views are created lazily and are invalidated whenever the texture is
/// re-created. Dropping the wrapper queues the texture and its views for
/// release.
#[derive(Debug, Default)]
pub struct Texture {
    label: &'static str,
    id: Option<TextureId>,
    desc: Option<TextureDesc>,
    mip_views: Vec<Option<TextureViewId>>,
    layer_views: Vec<Option<TextureViewId>>,
    stencil_view: Option<TextureViewId>,
    release: Option<ReleaseQueue>,
}

impl Texture {
    pub fn new(label: &'static str) -> Self {
        let mut this = Self::default();
        this.label = label;
        this
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.id.is_some()
    }

    #[inline]
    pub fn id(&self) -> Option<TextureId> {
        self.id
    }

    pub fn desc(&self) -> Option<&TextureDesc> {
        self.desc.as_ref()
    }

    pub fn extent(&self) -> Option<Extent> {
        self.desc.as_ref().map(|d| d.extent)
    }

    pub fn format(&self) -> Option<wgpu::TextureFormat> {
        self.desc.as_ref().map(|d| d.format)
    }

    // ── ensure ────────────────────────────────────────────────────────────

    pub fn ensure_1d(
        &mut self,
        device: &mut (impl ResourceDevice + ?Sized),
        format: wgpu::TextureFormat,
        width: u32,
        usage: wgpu::TextureUsages,
        mip_count: u32,
    ) -> bool {
        self.ensure(device, TextureDimension::D1, Extent::new(width, 1, 1), format, usage, mip_count)
    }

    pub fn ensure_1d_array(
        &mut self,
        device: &mut (impl ResourceDevice + ?Sized),
        format: wgpu::TextureFormat,
        width: u32,
        layers: u32,
        usage: wgpu::TextureUsages,
        mip_count: u32,
    ) -> bool {
        self.ensure(device, TextureDimension::D1Array, Extent::new(width, 1, layers), format, usage, mip_count)
    }

    /// Makes sure a 2D texture with these parameters exists.
    ///
    /// Returns `true` only when a texture was (re)created. On creation failure
    /// the wrapper is left invalid and `false` is returned.
    pub fn ensure_2d(
        &mut self,
        device: &mut (impl ResourceDevice + ?Sized),
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        usage: wgpu::TextureUsages,
        mip_count: u32,
    ) -> bool {
        self.ensure(device, TextureDimension::D2, Extent::d2(width, height), format, usage, mip_count)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn ensure_2d_array(
        &mut self,
        device: &mut (impl ResourceDevice + ?Sized),
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        layers: u32,
        usage: wgpu::TextureUsages,
        mip_count: u32,
    ) -> bool {
        self.ensure(device, TextureDimension::D2Array, Extent::new(width, height, layers), format, usage, mip_count)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn ensure_3d(
        &mut self,
        device: &mut (impl ResourceDevice + ?Sized),
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        depth: u32,
        usage: wgpu::TextureUsages,
        mip_count: u32,
    ) -> bool {
        self.ensure(device, TextureDimension::D3, Extent::new(width, height, depth), format, usage, mip_count)
    }

    pub fn ensure_cube(
        &mut self,
        device: &mut (impl ResourceDevice + ?Sized),
        format: wgpu::TextureFormat,
        size: u32,
        usage: wgpu::TextureUsages,
        mip_count: u32,
    ) -> bool {
        self.ensure(device, TextureDimension::Cube, Extent::new(size, size, 6), format, usage, mip_count)
    }

    pub fn ensure_cube_array(
        &mut self,
        device: &mut (impl ResourceDevice + ?Sized),
        format: wgpu::TextureFormat,
        size: u32,
        cubes: u32,
        usage: wgpu::TextureUsages,
        mip_count: u32,
    ) -> bool {
        self.ensure(
            device,
            TextureDimension::CubeArray,
            Extent::new(size, size, 6 * cubes),
            format,
            usage,
            mip_count,
        )
    }

    fn ensure(
        &mut self,
        device: &mut (impl ResourceDevice + ?Sized),
        dimension: TextureDimension,
        extent: Extent,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        mip_count: u32,
    ) -> bool {
        let desc = TextureDesc {
            label: (!self.label.is_empty()).then(|| self.label.to_owned()),
            dimension,
            extent,
            format,
            usage,
            mip_count: mip_count.max(1),
        };
        if self.is_valid() && self.desc.as_ref().is_some_and(|d| d.same_shape(&desc)) {
            return false;
        }

        self.free(device);
        self.release = Some(device.release_queue().clone());
        match device.create_texture(&desc) {
            Some(id) => {
                log::debug!("texture '{}' created: {:?} {:?}", self.label, desc.dimension, desc.extent);
                self.mip_views = vec![None; desc.mip_count as usize];
                self.layer_views = vec![None; if dimension.is_layered() { extent.depth as usize } else { 0 }];
                self.id = Some(id);
                self.desc = Some(desc);
                true
            }
            None => {
                log::warn!("texture '{}' creation failed", self.label);
                false
            }
        }
    }

    // ── views ─────────────────────────────────────────────────────────────

    /// View of a single mip level, every layer included.
    pub fn mip_view(&mut self, device: &mut (impl ResourceDevice + ?Sized), mip: u32) -> Option<TextureViewId> {
        let (id, desc) = self.live()?;
        assert!(mip < desc.mip_count, "mip level {mip} out of range");
        if let Some(view) = self.mip_views[mip as usize] {
            return Some(view);
        }
        let view = device.create_texture_view(&TextureViewDesc {
            texture: id,
            base_mip: mip,
            mip_count: 1,
            base_layer: 0,
            layer_count: layer_count(&desc),
            aspect: wgpu::TextureAspect::All,
        });
        self.mip_views[mip as usize] = view;
        view
    }

    /// View of a single layer, every mip included.
    pub fn layer_view(&mut self, device: &mut (impl ResourceDevice + ?Sized), layer: u32) -> Option<TextureViewId> {
        let (id, desc) = self.live()?;
        assert!(desc.dimension.is_layered(), "layer views require a layered texture");
        assert!(layer < desc.extent.depth, "layer {layer} out of range");
        if let Some(view) = self.layer_views[layer as usize] {
            return Some(view);
        }
        let view = device.create_texture_view(&TextureViewDesc {
            texture: id,
            base_mip: 0,
            mip_count: desc.mip_count,
            base_layer: layer,
            layer_count: 1,
            aspect: wgpu::TextureAspect::All,
        });
        self.layer_views[layer as usize] = view;
        view
    }

    pub fn stencil_view(&mut self, device: &mut (impl ResourceDevice + ?Sized)) -> Option<TextureViewId> {
        let (id, desc) = self.live()?;
        assert!(desc.format.has_stencil_aspect(), "stencil view of a format without stencil");
        if self.stencil_view.is_none() {
            self.stencil_view = device.create_texture_view(&TextureViewDesc {
                texture: id,
                base_mip: 0,
                mip_count: desc.mip_count,
                base_layer: 0,
                layer_count: layer_count(&desc),
                aspect: wgpu::TextureAspect::StencilOnly,
            });
        }
        self.stencil_view
    }

    fn live(&self) -> Option<(TextureId, TextureDesc)> {
        Some((self.id?, self.desc.clone()?))
    }

    // ── content ───────────────────────────────────────────────────────────

    pub fn clear(&self, device: &mut (impl ResourceDevice + ?Sized), value: ClearValue) {
        if let Some(id) = self.id {
            device.clear_texture(id, value);
        }
    }

    pub fn update(&self, device: &mut (impl ResourceDevice + ?Sized), mip: u32, data: &[u8]) {
        if let Some(id) = self.id {
            device.update_texture(id, mip, data);
        }
    }

    pub fn generate_mipmaps(&self, device: &mut (impl ResourceDevice + ?Sized)) {
        if let Some(id) = self.id {
            device.generate_mipmaps(id);
        }
    }

    // ── ownership ─────────────────────────────────────────────────────────

    /// Destroys the texture and its views now.
    pub fn free(&mut self, device: &mut (impl ResourceDevice + ?Sized)) {
        for view in self.take_views() {
            device.destroy_texture_view(view);
        }
        if let Some(id) = self.id.take() {
            device.destroy_texture(id);
        }
        self.desc = None;
    }

    /// Exchanges the device objects of two wrappers. Labels stay in place.
    pub fn swap(a: &mut Texture, b: &mut Texture) {
        std::mem::swap(&mut a.id, &mut b.id);
        std::mem::swap(&mut a.desc, &mut b.desc);
        std::mem::swap(&mut a.mip_views, &mut b.mip_views);
        std::mem::swap(&mut a.layer_views, &mut b.layer_views);
        std::mem::swap(&mut a.stencil_view, &mut b.stencil_view);
        std::mem::swap(&mut a.release, &mut b.release);
    }

    /// Gives up the texture without destroying it. Views are destroyed
    /// through the release queue.
    pub(crate) fn take(&mut self) -> Option<(TextureId, TextureDesc)> {
        let views = self.take_views();
        if let Some(queue) = &self.release {
            for view in views {
                queue.push(Released::TextureView(view));
            }
        }
        let desc = self.desc.take();
        Some((self.id.take()?, desc?))
    }

    /// Adopts an existing texture. The previous one must have been taken.
    pub(crate) fn adopt(&mut self, id: TextureId, desc: TextureDesc, release: Option<ReleaseQueue>) {
        debug_assert!(self.id.is_none(), "adopting over a live texture");
        self.mip_views = vec![None; desc.mip_count as usize];
        self.layer_views = vec![None; if desc.dimension.is_layered() { desc.extent.depth as usize } else { 0 }];
        self.id = Some(id);
        self.desc = Some(desc);
        self.release = self.release.take().or(release);
    }

    fn take_views(&mut self) -> Vec<TextureViewId> {
        let mut views: Vec<_> = self.mip_views.drain(..).flatten().collect();
        views.extend(self.layer_views.drain(..).flatten());
        views.extend(self.stencil_view.take());
        views
    }
}

fn layer_count(desc: &TextureDesc) -> u32 {
    match desc.dimension {
        TextureDimension::D3 => 1,
        _ => desc.extent.depth,
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        let Some(queue) = self.release.clone() else { return };
        for view in self.take_views() {
            queue.push(Released::TextureView(view));
        }
        if let Some(id) = self.id.take() {
            queue.push(Released::Texture(id));
        }
    }
}

use anyhow::{Context, Result};
use slotmap::SlotMap;

use super::traits::{ReleaseQueue, ResourceDevice};
use super::types::*;
use super::{validate, Capabilities};

struct WgpuTexture {
    texture: wgpu::Texture,
    desc: TextureDesc,
}

struct WgpuBuffer {
    buffer: wgpu::Buffer,
    desc: BufferDesc,
}

/// Render attachments of a framebuffer, ready for a render pass descriptor.
pub struct WgpuFramebuffer {
    pub colors: Vec<wgpu::TextureView>,
    pub depth: Option<wgpu::TextureView>,
    pub extent: (u32, u32),
}

/// Resource backend over a wgpu device and queue.
///
/// Owns every texture, view, buffer and framebuffer it creates and hands out
/// slotmap ids. Command replay is left to the embedding renderer, which looks
/// objects up through the accessors.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    caps: Capabilities,
    textures: SlotMap<TextureId, WgpuTexture>,
    views: SlotMap<TextureViewId, wgpu::TextureView>,
    buffers: SlotMap<BufferId, WgpuBuffer>,
    framebuffers: SlotMap<FramebufferId, WgpuFramebuffer>,
    release_queue: ReleaseQueue,
}

impl WgpuDevice {
    /// Wraps an existing device and queue.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let caps = Capabilities::from_wgpu_limits(&device.limits());
        log::debug!("wgpu device capabilities: {caps:?}");
        Self {
            device,
            queue,
            caps,
            textures: SlotMap::with_key(),
            views: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            framebuffers: SlotMap::with_key(),
            release_queue: ReleaseQueue::new(),
        }
    }

    /// Creates a device without a surface. Blocks on adapter and device requests.
    pub fn new_headless() -> Result<Self> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });

            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await
                .context("failed to find a suitable GPU adapter")?;

            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("tessera-draw device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    experimental_features: wgpu::ExperimentalFeatures::disabled(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    trace: wgpu::Trace::Off,
                })
                .await
                .context("failed to create wgpu device/queue")?;

            Ok(Self::new(device, queue))
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn texture(&self, id: TextureId) -> Option<&wgpu::Texture> {
        self.textures.get(id).map(|t| &t.texture)
    }

    pub fn texture_view(&self, id: TextureViewId) -> Option<&wgpu::TextureView> {
        self.views.get(id)
    }

    pub fn buffer(&self, id: BufferId) -> Option<&wgpu::Buffer> {
        self.buffers.get(id).map(|b| &b.buffer)
    }

    pub fn framebuffer(&self, id: FramebufferId) -> Option<&WgpuFramebuffer> {
        self.framebuffers.get(id)
    }

    /// Single mip, single layer view used as a render attachment.
    fn attachment_view(texture: &WgpuTexture, mip: u32, layer: u32) -> wgpu::TextureView {
        let dimension = match texture.desc.dimension {
            TextureDimension::D1 => wgpu::TextureViewDimension::D1,
            TextureDimension::D3 => wgpu::TextureViewDimension::D3,
            _ => wgpu::TextureViewDimension::D2,
        };
        texture.texture.create_view(&wgpu::TextureViewDescriptor {
            label: texture.desc.label.as_deref(),
            dimension: Some(dimension),
            base_mip_level: mip,
            mip_level_count: Some(1),
            base_array_layer: layer,
            array_layer_count: Some(1),
            ..Default::default()
        })
    }

    fn layer_count(desc: &TextureDesc) -> u32 {
        match desc.dimension {
            TextureDimension::D3 => 1,
            _ => desc.extent.depth,
        }
    }

    fn clear_with_render_pass(&self, texture: &WgpuTexture, value: ClearValue) {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("tessera clear encoder"),
        });
        let is_depth = texture.desc.format.is_depth_stencil_format();
        let has_stencil = texture.desc.format.has_stencil_aspect();

        for mip in 0..texture.desc.mip_count {
            for layer in 0..Self::layer_count(&texture.desc) {
                let view = Self::attachment_view(texture, mip, layer);
                if is_depth {
                    let depth_ops = texture.desc.format.has_depth_aspect().then_some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(value.depth),
                        store: wgpu::StoreOp::Store,
                    });
                    let stencil_ops = has_stencil.then_some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(value.stencil),
                        store: wgpu::StoreOp::Store,
                    });
                    drop(encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("tessera depth clear"),
                        color_attachments: &[],
                        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                            view: &view,
                            depth_ops,
                            stencil_ops,
                        }),
                        timestamp_writes: None,
                        occlusion_query_set: None,
                        multiview_mask: None,
                    }));
                } else {
                    let [r, g, b, a] = value.color.map(f64::from);
                    drop(encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("tessera color clear"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                                store: wgpu::StoreOp::Store,
                            },
                            depth_slice: None,
                        })],
                        depth_stencil_attachment: None,
                        timestamp_writes: None,
                        occlusion_query_set: None,
                        multiview_mask: None,
                    }));
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn write_mip(&self, texture: &WgpuTexture, mip: u32, data: &[u8]) -> bool {
        let desc = &texture.desc;
        let Some(block_size) = desc.format.block_copy_size(None) else {
            log::warn!("texture upload unsupported for format {:?}", desc.format);
            return false;
        };
        let (bw, bh) = desc.format.block_dimensions();
        let size = Self::wgpu_extent(desc).mip_level_size(mip, Self::wgpu_dimension(desc.dimension));
        let bytes_per_row = size.width.div_ceil(bw) * block_size;
        let rows = size.height.div_ceil(bh);
        let expected = bytes_per_row as usize * rows as usize * size.depth_or_array_layers as usize;
        if data.len() < expected {
            log::warn!("texture upload too small: {} < {expected} bytes", data.len());
            return false;
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: mip,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &data[..expected],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(rows),
            },
            size,
        );
        true
    }

    fn zero_fill(&self, texture: &WgpuTexture) {
        let Some(block_size) = texture.desc.format.block_copy_size(None) else {
            log::warn!("zero clear unsupported for format {:?}", texture.desc.format);
            return;
        };
        for mip in 0..texture.desc.mip_count {
            let size =
                Self::wgpu_extent(&texture.desc).mip_level_size(mip, Self::wgpu_dimension(texture.desc.dimension));
            let (bw, bh) = texture.desc.format.block_dimensions();
            let len = (size.width.div_ceil(bw) * block_size) as usize
                * size.height.div_ceil(bh) as usize
                * size.depth_or_array_layers as usize;
            self.write_mip(texture, mip, &vec![0; len]);
        }
    }

    fn wgpu_dimension(dimension: TextureDimension) -> wgpu::TextureDimension {
        match dimension {
            TextureDimension::D1 => wgpu::TextureDimension::D1,
            TextureDimension::D3 => wgpu::TextureDimension::D3,
            // 1D arrays are stored as 2D arrays of height 1.
            _ => wgpu::TextureDimension::D2,
        }
    }

    fn wgpu_extent(desc: &TextureDesc) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: desc.extent.width,
            height: desc.extent.height,
            depth_or_array_layers: desc.extent.depth,
        }
    }

    fn buffer_usage(kind: BufferKind) -> wgpu::BufferUsages {
        let base = wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC;
        base | match kind {
            BufferKind::Uniform => wgpu::BufferUsages::UNIFORM,
            BufferKind::Storage => wgpu::BufferUsages::STORAGE,
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::STORAGE,
            BufferKind::Index => wgpu::BufferUsages::INDEX | wgpu::BufferUsages::STORAGE,
            BufferKind::Indirect => wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::STORAGE,
        }
    }
}

impl ResourceDevice for WgpuDevice {
    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    fn release_queue(&self) -> &ReleaseQueue {
        &self.release_queue
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Option<TextureId> {
        if let Err(reason) = validate::texture_desc(&self.caps, desc) {
            log::warn!("texture creation failed ({reason}): {:?}", desc.label);
            return None;
        }
        if desc.dimension == TextureDimension::D1 && desc.mip_count > 1 {
            log::warn!("texture creation failed (1D textures cannot have mips): {:?}", desc.label);
            return None;
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size: Self::wgpu_extent(desc),
            mip_level_count: desc.mip_count,
            sample_count: 1,
            dimension: Self::wgpu_dimension(desc.dimension),
            format: desc.format,
            usage: desc.usage | wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        Some(self.textures.insert(WgpuTexture {
            texture,
            desc: desc.clone(),
        }))
    }

    fn destroy_texture(&mut self, id: TextureId) {
        if let Some(t) = self.textures.remove(id) {
            t.texture.destroy();
        }
    }

    fn create_texture_view(&mut self, desc: &TextureViewDesc) -> Option<TextureViewId> {
        let parent = self.textures.get(desc.texture)?;
        let single_layer = desc.layer_count == 1;
        let dimension = match parent.desc.dimension {
            TextureDimension::D1 => wgpu::TextureViewDimension::D1,
            TextureDimension::D3 => wgpu::TextureViewDimension::D3,
            TextureDimension::D2 => wgpu::TextureViewDimension::D2,
            _ if single_layer => wgpu::TextureViewDimension::D2,
            TextureDimension::Cube if desc.layer_count == 6 => wgpu::TextureViewDimension::Cube,
            TextureDimension::CubeArray if desc.layer_count % 6 == 0 => wgpu::TextureViewDimension::CubeArray,
            _ => wgpu::TextureViewDimension::D2Array,
        };

        let view = parent.texture.create_view(&wgpu::TextureViewDescriptor {
            label: parent.desc.label.as_deref(),
            dimension: Some(dimension),
            aspect: desc.aspect,
            base_mip_level: desc.base_mip,
            mip_level_count: Some(desc.mip_count),
            base_array_layer: desc.base_layer,
            array_layer_count: Some(desc.layer_count),
            ..Default::default()
        });
        Some(self.views.insert(view))
    }

    fn destroy_texture_view(&mut self, id: TextureViewId) {
        self.views.remove(id);
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> Option<BufferId> {
        if desc.size == 0 {
            log::warn!("buffer creation failed: zero size");
            return None;
        }
        let size = desc.size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            size,
            usage: Self::buffer_usage(desc.kind),
            mapped_at_creation: false,
        });
        Some(self.buffers.insert(WgpuBuffer { buffer, desc: *desc }))
    }

    fn destroy_buffer(&mut self, id: BufferId) {
        if let Some(b) = self.buffers.remove(id) {
            b.buffer.destroy();
        }
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Option<FramebufferId> {
        let textures = &self.textures;
        let extent = match validate::framebuffer_desc(desc, |id| textures.get(id).map(|t| &t.desc)) {
            Ok(extent) => extent,
            Err(reason) => {
                log::warn!("framebuffer incomplete: {reason}");
                return None;
            }
        };

        let view_of = |att: &Attachment| {
            textures
                .get(att.texture)
                .map(|t| Self::attachment_view(t, att.mip, att.layer.unwrap_or(0)))
        };
        let depth = match &desc.depth {
            Some(att) => Some(view_of(att)?),
            None => None,
        };
        let colors = desc.colors.iter().map(view_of).collect::<Option<Vec<_>>>()?;

        Some(self.framebuffers.insert(WgpuFramebuffer { colors, depth, extent }))
    }

    fn destroy_framebuffer(&mut self, id: FramebufferId) {
        self.framebuffers.remove(id);
    }

    fn update_buffer(&mut self, id: BufferId, offset: u64, data: &[u8]) {
        let Some(entry) = self.buffers.get(id) else {
            log::warn!("update of unknown buffer {id:?}");
            return;
        };
        assert!(offset + data.len() as u64 <= entry.desc.size, "buffer update out of range");

        let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
        if data.len() % align == 0 {
            self.queue.write_buffer(&entry.buffer, offset, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(data.len().next_multiple_of(align), 0);
            self.queue.write_buffer(&entry.buffer, offset, &padded);
        }
    }

    fn read_buffer(&mut self, id: BufferId, offset: u64, out: &mut [u8]) -> bool {
        let Some(entry) = self.buffers.get(id) else {
            return false;
        };
        if entry.desc.memory != MemoryKind::HostVisible {
            return false;
        }
        let end = offset + out.len() as u64;
        if end > entry.desc.size {
            return false;
        }
        if out.is_empty() {
            return true;
        }

        // Allocated sizes are rounded up, so the aligned window stays in bounds.
        let align = wgpu::COPY_BUFFER_ALIGNMENT;
        let start = offset - offset % align;
        let size = end.next_multiple_of(align) - start;
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tessera readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("tessera readback encoder"),
        });
        encoder.copy_buffer_to_buffer(&entry.buffer, start, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |mapped| {
            let _ = sender.send(mapped);
        });
        if let Err(err) = self.device.poll(wgpu::PollType::wait_indefinitely()) {
            log::warn!("buffer readback of {id:?} failed: {err}");
            return false;
        }
        match receiver.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                log::warn!("buffer readback of {id:?} failed: {err}");
                return false;
            }
            Err(_) => {
                log::warn!("buffer readback of {id:?} never completed");
                return false;
            }
        }

        let skip = (offset - start) as usize;
        {
            let mapped = slice.get_mapped_range();
            out.copy_from_slice(&mapped[skip..skip + out.len()]);
        }
        staging.unmap();
        true
    }

    fn copy_buffer(&mut self, src: BufferId, src_offset: u64, dst: BufferId, dst_offset: u64, size: u64) {
        let (Some(s), Some(d)) = (self.buffers.get(src), self.buffers.get(dst)) else {
            log::warn!("buffer copy between unknown buffers");
            return;
        };
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("tessera copy encoder"),
        });
        let aligned = size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        encoder.copy_buffer_to_buffer(&s.buffer, src_offset, &d.buffer, dst_offset, aligned);
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn update_texture(&mut self, id: TextureId, mip: u32, data: &[u8]) {
        let Some(texture) = self.textures.get(id) else {
            log::warn!("update of unknown texture {id:?}");
            return;
        };
        self.write_mip(texture, mip, data);
    }

    fn clear_texture(&mut self, id: TextureId, value: ClearValue) {
        let Some(texture) = self.textures.get(id) else {
            return;
        };
        let renderable = texture.desc.usage.contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
            && texture.desc.dimension != TextureDimension::D3;

        if renderable {
            self.clear_with_render_pass(texture, value);
        } else if value.color == [0.0; 4] && !texture.desc.format.is_depth_stencil_format() {
            self.zero_fill(texture);
        } else {
            log::warn!(
                "clear of non-renderable texture {:?} to a non-zero value ignored",
                texture.desc.label
            );
        }
    }

    fn generate_mipmaps(&mut self, id: TextureId) {
        // wgpu has no built-in downsampling; renderers fill mips with their own pass.
        log::debug!("generate_mipmaps({id:?}) is a no-op on the wgpu backend");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `None` when the machine has no usable adapter; such tests pass vacuously.
    fn headless() -> Option<WgpuDevice> {
        match WgpuDevice::new_headless() {
            Ok(device) => Some(device),
            Err(err) => {
                eprintln!("no wgpu adapter, skipping: {err:#}");
                None
            }
        }
    }

    fn buffer(device: &mut WgpuDevice, size: u64, memory: MemoryKind) -> BufferId {
        device
            .create_buffer(&BufferDesc {
                kind: BufferKind::Storage,
                size,
                memory,
            })
            .unwrap()
    }

    fn texture_desc(width: u32, height: u32, mip_count: u32) -> TextureDesc {
        TextureDesc {
            label: Some("target".into()),
            dimension: TextureDimension::D2,
            extent: Extent::d2(width, height),
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            mip_count,
        }
    }

    // ── buffers ───────────────────────────────────────────────────────────

    #[test]
    fn host_visible_buffer_reads_back_uploaded_bytes() {
        let Some(mut dev) = headless() else { return };
        let id = buffer(&mut dev, 16, MemoryKind::HostVisible);
        let bytes: Vec<u8> = (1..=16).collect();
        dev.update_buffer(id, 0, &bytes);

        let mut whole = [0u8; 16];
        assert!(dev.read_buffer(id, 0, &mut whole));
        assert_eq!(whole.as_slice(), bytes.as_slice());

        let mut middle = [0u8; 6];
        assert!(dev.read_buffer(id, 5, &mut middle));
        assert_eq!(middle, [6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn reads_observe_device_side_copies() {
        let Some(mut dev) = headless() else { return };
        let src = buffer(&mut dev, 8, MemoryKind::DeviceOnly);
        let dst = buffer(&mut dev, 8, MemoryKind::HostVisible);
        dev.update_buffer(src, 0, &[9, 8, 7, 6, 5, 4, 3, 2]);
        dev.copy_buffer(src, 4, dst, 0, 4);

        let mut out = [0u8; 4];
        assert!(dev.read_buffer(dst, 0, &mut out));
        assert_eq!(out, [5, 4, 3, 2]);
    }

    #[test]
    fn device_only_and_out_of_range_reads_fail() {
        let Some(mut dev) = headless() else { return };
        let local = buffer(&mut dev, 8, MemoryKind::DeviceOnly);
        let visible = buffer(&mut dev, 8, MemoryKind::HostVisible);

        let mut out = [0u8; 4];
        assert!(!dev.read_buffer(local, 0, &mut out));
        assert!(!dev.read_buffer(visible, 6, &mut out));

        dev.destroy_buffer(visible);
        assert!(!dev.read_buffer(visible, 0, &mut out));
    }

    // ── textures ──────────────────────────────────────────────────────────

    #[test]
    fn textures_views_and_framebuffers_are_created() {
        let Some(mut dev) = headless() else { return };
        let tex = dev.create_texture(&texture_desc(32, 16, 2)).unwrap();
        assert_eq!(dev.texture(tex).map(|t| t.mip_level_count()), Some(2));

        let fb = dev
            .create_framebuffer(&FramebufferDesc {
                depth: None,
                colors: vec![Attachment::new(tex).with_mip(1)],
            })
            .unwrap();
        assert_eq!(dev.framebuffer(fb).map(|f| f.extent), Some((16, 8)));

        dev.destroy_framebuffer(fb);
        dev.destroy_texture(tex);
        assert!(dev.texture(tex).is_none());
    }

    #[test]
    fn invalid_texture_descs_are_refused() {
        let Some(mut dev) = headless() else { return };
        assert!(dev.create_texture(&texture_desc(0, 16, 1)).is_none());

        let too_wide = dev.capabilities().max_texture_size + 1;
        assert!(dev.create_texture(&texture_desc(too_wide, 1, 1)).is_none());
    }
}

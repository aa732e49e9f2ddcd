use std::sync::Arc;

use parking_lot::Mutex;

use crate::draw::DrawState;

use super::types::*;
use super::Capabilities;

/// Device object scheduled for destruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Released {
    Texture(TextureId),
    TextureView(TextureViewId),
    Buffer(BufferId),
    Framebuffer(FramebufferId),
}

/// Shared list of device objects dropped without access to the device.
///
/// Wrappers capture a clone at creation and push their ids from `Drop`.
/// [`ResourceDevice::collect_released`] destroys the queued objects.
#[derive(Debug, Clone, Default)]
pub struct ReleaseQueue(Arc<Mutex<Vec<Released>>>);

impl ReleaseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, released: Released) {
        self.0.lock().push(released);
    }

    pub fn drain(&self) -> Vec<Released> {
        std::mem::take(&mut *self.0.lock())
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

/// Object creation, destruction and data transfer.
///
/// Creation never panics on failure; it returns `None` and the caller picks a
/// fallback.
pub trait ResourceDevice {
    fn capabilities(&self) -> &Capabilities;

    /// Queue collected by [`collect_released`](Self::collect_released).
    fn release_queue(&self) -> &ReleaseQueue;

    fn create_texture(&mut self, desc: &TextureDesc) -> Option<TextureId>;
    fn destroy_texture(&mut self, id: TextureId);

    fn create_texture_view(&mut self, desc: &TextureViewDesc) -> Option<TextureViewId>;
    fn destroy_texture_view(&mut self, id: TextureViewId);

    fn create_buffer(&mut self, desc: &BufferDesc) -> Option<BufferId>;
    fn destroy_buffer(&mut self, id: BufferId);

    /// Fails when an attachment is missing or extents disagree.
    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Option<FramebufferId>;
    fn destroy_framebuffer(&mut self, id: FramebufferId);

    fn update_buffer(&mut self, id: BufferId, offset: u64, data: &[u8]);

    /// Copies buffer contents into `out`.
    ///
    /// Returns `false` for device-only buffers and unknown ids.
    fn read_buffer(&mut self, id: BufferId, offset: u64, out: &mut [u8]) -> bool;

    fn copy_buffer(&mut self, src: BufferId, src_offset: u64, dst: BufferId, dst_offset: u64, size: u64);

    /// Replaces the whole content of mip level `mip`.
    fn update_texture(&mut self, id: TextureId, mip: u32, data: &[u8]);

    fn clear_texture(&mut self, id: TextureId, value: ClearValue);

    fn generate_mipmaps(&mut self, id: TextureId);

    /// Destroys everything pushed to the release queue. Returns the count.
    fn collect_released(&mut self) -> usize {
        let released = self.release_queue().drain();
        let count = released.len();
        for item in released {
            match item {
                Released::Texture(id) => self.destroy_texture(id),
                Released::TextureView(id) => self.destroy_texture_view(id),
                Released::Buffer(id) => self.destroy_buffer(id),
                Released::Framebuffer(id) => self.destroy_framebuffer(id),
            }
        }
        if count > 0 {
            log::debug!("collected {count} released device objects");
        }
        count
    }
}

/// Binding and execution primitives issued during replay.
pub trait CommandDevice {
    fn bind_framebuffer(&mut self, framebuffer: FramebufferId);
    fn bind_pipeline(&mut self, pipeline: PipelineId, state: DrawState);
    fn set_state(&mut self, state: DrawState);
    fn set_stencil(&mut self, stencil: StencilState);

    /// Inverts triangle winding, used for negatively scaled objects.
    fn set_front_facing(&mut self, inverted: bool);

    fn bind_texture(&mut self, slot: u32, texture: TextureId, sampler: SamplerState);
    fn bind_image(&mut self, slot: u32, texture: TextureId);
    fn bind_buffer(&mut self, slot: u32, binding: BufferBinding, buffer: BufferId);
    fn push_constant(&mut self, location: u32, value: &UniformValue);

    fn draw(&mut self, geometry: Geometry, args: DrawArgs);
    fn draw_indirect(&mut self, geometry: Geometry, buffer: BufferId, offset: u64);
    fn dispatch(&mut self, groups: [u32; 3]);
    fn dispatch_indirect(&mut self, buffer: BufferId, offset: u64);
    fn barrier(&mut self, flags: BarrierFlags);
    fn clear(&mut self, bits: ClearBits, color: [f32; 4], depth: f32, stencil: u8);
    fn set_select_id(&mut self, id: u32);
}

/// A backend able to both own resources and replay commands.
pub trait Device: ResourceDevice + CommandDevice {}

impl<T: ResourceDevice + CommandDevice> Device for T {}

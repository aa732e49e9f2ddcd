use slotmap::SlotMap;

use crate::draw::DrawState;

use super::traits::{CommandDevice, ReleaseQueue, ResourceDevice};
use super::types::*;
use super::{validate, Capabilities};

/// One call received by a [`RecordingDevice`].
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    BindFramebuffer(FramebufferId),
    BindPipeline { pipeline: PipelineId, state: DrawState },
    SetState(DrawState),
    SetStencil(StencilState),
    SetFrontFacing(bool),
    BindTexture { slot: u32, texture: TextureId, sampler: SamplerState },
    BindImage { slot: u32, texture: TextureId },
    BindBuffer { slot: u32, binding: BufferBinding, buffer: BufferId },
    PushConstant { location: u32, value: UniformValue },
    Draw { geometry: Geometry, args: DrawArgs },
    DrawIndirect { geometry: Geometry, buffer: BufferId, offset: u64 },
    Dispatch([u32; 3]),
    DispatchIndirect { buffer: BufferId, offset: u64 },
    Barrier(BarrierFlags),
    Clear { bits: ClearBits, color: [f32; 4], depth: f32, stencil: u8 },
    SetSelectId(u32),

    UpdateBuffer { buffer: BufferId, offset: u64, len: usize },
    CopyBuffer { src: BufferId, dst: BufferId, size: u64 },
    UpdateTexture { texture: TextureId, mip: u32, len: usize },
    ClearTexture { texture: TextureId, value: ClearValue },
    GenerateMipmaps(TextureId),
}

impl DeviceCall {
    /// Whether this call executes work (draw or dispatch).
    pub fn is_work(&self) -> bool {
        matches!(
            self,
            DeviceCall::Draw { .. }
                | DeviceCall::DrawIndirect { .. }
                | DeviceCall::Dispatch(_)
                | DeviceCall::DispatchIndirect { .. }
        )
    }
}

#[derive(Debug)]
struct RecordedBuffer {
    desc: BufferDesc,
    bytes: Vec<u8>,
}

/// Headless backend that keeps object bookkeeping and logs every call.
///
/// Buffers keep their bytes so host-visible reads return what was written.
/// Textures only keep their descriptor.
#[derive(Debug, Default)]
pub struct RecordingDevice {
    caps: Capabilities,
    textures: SlotMap<TextureId, TextureDesc>,
    views: SlotMap<TextureViewId, TextureViewDesc>,
    buffers: SlotMap<BufferId, RecordedBuffer>,
    framebuffers: SlotMap<FramebufferId, FramebufferDesc>,
    calls: Vec<DeviceCall>,
    fail_creations: u32,
    textures_created: usize,
    buffers_created: usize,
    release_queue: ReleaseQueue,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(caps: Capabilities) -> Self {
        Self {
            caps,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<DeviceCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Makes the next `count` object creations fail.
    pub fn fail_next_creations(&mut self, count: u32) {
        self.fail_creations = count;
    }

    pub fn texture_desc(&self, id: TextureId) -> Option<&TextureDesc> {
        self.textures.get(id)
    }

    pub fn view_desc(&self, id: TextureViewId) -> Option<&TextureViewDesc> {
        self.views.get(id)
    }

    pub fn buffer_desc(&self, id: BufferId) -> Option<&BufferDesc> {
        self.buffers.get(id).map(|b| &b.desc)
    }

    /// Raw contents of a buffer, regardless of its memory kind.
    pub fn buffer_bytes(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(id).map(|b| b.bytes.as_slice())
    }

    pub fn framebuffer_desc(&self, id: FramebufferId) -> Option<&FramebufferDesc> {
        self.framebuffers.get(id)
    }

    pub fn is_texture_alive(&self, id: TextureId) -> bool {
        self.textures.contains_key(id)
    }

    pub fn is_buffer_alive(&self, id: BufferId) -> bool {
        self.buffers.contains_key(id)
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_views(&self) -> usize {
        self.views.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    /// Textures created since construction, destroyed ones included.
    pub fn textures_created(&self) -> usize {
        self.textures_created
    }

    pub fn buffers_created(&self) -> usize {
        self.buffers_created
    }

    fn should_fail(&mut self) -> bool {
        if self.fail_creations > 0 {
            self.fail_creations -= 1;
            return true;
        }
        false
    }
}

impl ResourceDevice for RecordingDevice {
    fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    fn release_queue(&self) -> &ReleaseQueue {
        &self.release_queue
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Option<TextureId> {
        if self.should_fail() {
            log::warn!("texture creation failed (injected): {:?}", desc.label);
            return None;
        }
        if let Err(reason) = validate::texture_desc(&self.caps, desc) {
            log::warn!("texture creation failed ({reason}): {:?}", desc.label);
            return None;
        }
        self.textures_created += 1;
        Some(self.textures.insert(desc.clone()))
    }

    fn destroy_texture(&mut self, id: TextureId) {
        if self.textures.remove(id).is_none() {
            log::warn!("destroy of unknown texture {id:?}");
        }
    }

    fn create_texture_view(&mut self, desc: &TextureViewDesc) -> Option<TextureViewId> {
        if self.should_fail() {
            return None;
        }
        let parent = self.textures.get(desc.texture)?;
        if desc.base_mip + desc.mip_count > parent.mip_count {
            log::warn!("texture view mip range out of bounds");
            return None;
        }
        Some(self.views.insert(*desc))
    }

    fn destroy_texture_view(&mut self, id: TextureViewId) {
        self.views.remove(id);
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> Option<BufferId> {
        if self.should_fail() || desc.size == 0 {
            log::warn!("buffer creation failed: {desc:?}");
            return None;
        }
        self.buffers_created += 1;
        Some(self.buffers.insert(RecordedBuffer {
            desc: *desc,
            bytes: vec![0; desc.size as usize],
        }))
    }

    fn destroy_buffer(&mut self, id: BufferId) {
        if self.buffers.remove(id).is_none() {
            log::warn!("destroy of unknown buffer {id:?}");
        }
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> Option<FramebufferId> {
        if self.should_fail() {
            return None;
        }

        let textures = &self.textures;
        if let Err(reason) = validate::framebuffer_desc(desc, |id| textures.get(id)) {
            log::warn!("framebuffer incomplete: {reason}");
            return None;
        }

        Some(self.framebuffers.insert(desc.clone()))
    }

    fn destroy_framebuffer(&mut self, id: FramebufferId) {
        self.framebuffers.remove(id);
    }

    fn update_buffer(&mut self, id: BufferId, offset: u64, data: &[u8]) {
        let Some(buffer) = self.buffers.get_mut(id) else {
            log::warn!("update of unknown buffer {id:?}");
            return;
        };
        let start = offset as usize;
        let end = start + data.len();
        assert!(end <= buffer.bytes.len(), "buffer update out of range");
        buffer.bytes[start..end].copy_from_slice(data);
        self.calls.push(DeviceCall::UpdateBuffer {
            buffer: id,
            offset,
            len: data.len(),
        });
    }

    fn read_buffer(&mut self, id: BufferId, offset: u64, out: &mut [u8]) -> bool {
        let Some(buffer) = self.buffers.get(id) else {
            return false;
        };
        if buffer.desc.memory != MemoryKind::HostVisible {
            return false;
        }
        let start = offset as usize;
        let Some(src) = buffer.bytes.get(start..start + out.len()) else {
            return false;
        };
        out.copy_from_slice(src);
        true
    }

    fn copy_buffer(&mut self, src: BufferId, src_offset: u64, dst: BufferId, dst_offset: u64, size: u64) {
        let (s, d, n) = (src_offset as usize, dst_offset as usize, size as usize);
        let Some(bytes) = self.buffers.get(src).and_then(|b| b.bytes.get(s..s + n)).map(<[u8]>::to_vec) else {
            log::warn!("buffer copy from invalid source range");
            return;
        };
        let Some(target) = self.buffers.get_mut(dst).and_then(|b| b.bytes.get_mut(d..d + n)) else {
            log::warn!("buffer copy to invalid destination range");
            return;
        };
        target.copy_from_slice(&bytes);
        self.calls.push(DeviceCall::CopyBuffer { src, dst, size });
    }

    fn update_texture(&mut self, id: TextureId, mip: u32, data: &[u8]) {
        if !self.textures.contains_key(id) {
            log::warn!("update of unknown texture {id:?}");
            return;
        }
        self.calls.push(DeviceCall::UpdateTexture {
            texture: id,
            mip,
            len: data.len(),
        });
    }

    fn clear_texture(&mut self, id: TextureId, value: ClearValue) {
        self.calls.push(DeviceCall::ClearTexture { texture: id, value });
    }

    fn generate_mipmaps(&mut self, id: TextureId) {
        self.calls.push(DeviceCall::GenerateMipmaps(id));
    }
}

impl CommandDevice for RecordingDevice {
    fn bind_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.calls.push(DeviceCall::BindFramebuffer(framebuffer));
    }

    fn bind_pipeline(&mut self, pipeline: PipelineId, state: DrawState) {
        self.calls.push(DeviceCall::BindPipeline { pipeline, state });
    }

    fn set_state(&mut self, state: DrawState) {
        self.calls.push(DeviceCall::SetState(state));
    }

    fn set_stencil(&mut self, stencil: StencilState) {
        self.calls.push(DeviceCall::SetStencil(stencil));
    }

    fn set_front_facing(&mut self, inverted: bool) {
        self.calls.push(DeviceCall::SetFrontFacing(inverted));
    }

    fn bind_texture(&mut self, slot: u32, texture: TextureId, sampler: SamplerState) {
        self.calls.push(DeviceCall::BindTexture { slot, texture, sampler });
    }

    fn bind_image(&mut self, slot: u32, texture: TextureId) {
        self.calls.push(DeviceCall::BindImage { slot, texture });
    }

    fn bind_buffer(&mut self, slot: u32, binding: BufferBinding, buffer: BufferId) {
        self.calls.push(DeviceCall::BindBuffer { slot, binding, buffer });
    }

    fn push_constant(&mut self, location: u32, value: &UniformValue) {
        self.calls.push(DeviceCall::PushConstant {
            location,
            value: *value,
        });
    }

    fn draw(&mut self, geometry: Geometry, args: DrawArgs) {
        self.calls.push(DeviceCall::Draw { geometry, args });
    }

    fn draw_indirect(&mut self, geometry: Geometry, buffer: BufferId, offset: u64) {
        self.calls.push(DeviceCall::DrawIndirect { geometry, buffer, offset });
    }

    fn dispatch(&mut self, groups: [u32; 3]) {
        self.calls.push(DeviceCall::Dispatch(groups));
    }

    fn dispatch_indirect(&mut self, buffer: BufferId, offset: u64) {
        self.calls.push(DeviceCall::DispatchIndirect { buffer, offset });
    }

    fn barrier(&mut self, flags: BarrierFlags) {
        self.calls.push(DeviceCall::Barrier(flags));
    }

    fn clear(&mut self, bits: ClearBits, color: [f32; 4], depth: f32, stencil: u8) {
        self.calls.push(DeviceCall::Clear {
            bits,
            color,
            depth,
            stencil,
        });
    }

    fn set_select_id(&mut self, id: u32) {
        self.calls.push(DeviceCall::SetSelectId(id));
    }
}

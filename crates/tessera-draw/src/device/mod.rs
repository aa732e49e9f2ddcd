//! Abstract graphics device.
//!
//! Responsibilities:
//! - define the capability interface the recording layer issues calls against
//!   (`ResourceDevice` for objects, `CommandDevice` for replay)
//! - provide the ids, descriptors and small value types shared with consumers
//! - provide two backends: `RecordingDevice` (headless bookkeeping, used by
//!   tests and tools) and `WgpuDevice` (resources over wgpu)

mod caps;
mod recording;
mod traits;
mod types;
mod validate;
mod wgpu_backend;

pub use caps::Capabilities;
pub use recording::{DeviceCall, RecordingDevice};
pub use traits::{CommandDevice, Device, ReleaseQueue, Released, ResourceDevice};
pub use types::{
    Attachment, BarrierFlags, BatchId, BufferBinding, BufferDesc, BufferId, BufferKind, ClearBits, ClearValue,
    DrawArgs, Extent, FramebufferDesc, FramebufferId, Geometry, MemoryKind, PipelineId, PrimitiveType,
    SamplerState, StencilState, TextureDesc, TextureDimension, TextureId, TextureViewDesc, TextureViewId,
    UniformValue,
};
pub use wgpu_backend::{WgpuDevice, WgpuFramebuffer};

use bytemuck::{Pod, Zeroable};

use crate::device::{BufferDesc, BufferId, BufferKind, MemoryKind, ReleaseQueue, Released, ResourceDevice};
use crate::error::Result;
use crate::memory::{Arena, ResourceHandle};

pub type Mat4 = [[f32; 4]; 4];

pub const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

/// Per-object transform as laid out in the object-matrix uniform block.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ObjectMatrix {
    pub model: Mat4,
    pub model_inverse: Mat4,
}

impl ObjectMatrix {
    pub const IDENTITY: ObjectMatrix = ObjectMatrix {
        model: IDENTITY,
        model_inverse: IDENTITY,
    };

    pub fn from_model(model: Mat4) -> Self {
        Self {
            model,
            model_inverse: invert(&model).unwrap_or_else(|| {
                log::debug!("singular model matrix; using identity inverse");
                IDENTITY
            }),
        }
    }

    /// World-space origin of the object.
    pub fn position(&self) -> [f32; 3] {
        let [x, y, z, _] = self.model[3];
        [x, y, z]
    }
}

/// Per-object attributes as laid out in the object-info uniform block.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ObjectInfos {
    /// Generated-coordinate offset (xyz).
    pub orco_add: [f32; 4],
    /// Generated-coordinate scale (xyz).
    pub orco_mul: [f32; 4],
    pub color: [f32; 4],
    /// Object index, random value, flags, unused.
    pub infos: [f32; 4],
}

impl Default for ObjectInfos {
    fn default() -> Self {
        Self {
            orco_add: [0.0; 4],
            orco_mul: [1.0, 1.0, 1.0, 0.0],
            color: [1.0; 4],
            infos: [0.0; 4],
        }
    }
}

/// Column-major 4x4 inverse. `None` when the matrix is singular.
pub fn invert(m: &Mat4) -> Option<Mat4> {
    let a: [f32; 16] = bytemuck::cast(*m);
    let mut inv = [0.0f32; 16];

    inv[0] = a[5] * a[10] * a[15] - a[5] * a[11] * a[14] - a[9] * a[6] * a[15] + a[9] * a[7] * a[14]
        + a[13] * a[6] * a[11]
        - a[13] * a[7] * a[10];
    inv[4] = -a[4] * a[10] * a[15] + a[4] * a[11] * a[14] + a[8] * a[6] * a[15] - a[8] * a[7] * a[14]
        - a[12] * a[6] * a[11]
        + a[12] * a[7] * a[10];
    inv[8] = a[4] * a[9] * a[15] - a[4] * a[11] * a[13] - a[8] * a[5] * a[15] + a[8] * a[7] * a[13]
        + a[12] * a[5] * a[11]
        - a[12] * a[7] * a[9];
    inv[12] = -a[4] * a[9] * a[14] + a[4] * a[10] * a[13] + a[8] * a[5] * a[14] - a[8] * a[6] * a[13]
        - a[12] * a[5] * a[10]
        + a[12] * a[6] * a[9];
    inv[1] = -a[1] * a[10] * a[15] + a[1] * a[11] * a[14] + a[9] * a[2] * a[15] - a[9] * a[3] * a[14]
        - a[13] * a[2] * a[11]
        + a[13] * a[3] * a[10];
    inv[5] = a[0] * a[10] * a[15] - a[0] * a[11] * a[14] - a[8] * a[2] * a[15] + a[8] * a[3] * a[14]
        + a[12] * a[2] * a[11]
        - a[12] * a[3] * a[10];
    inv[9] = -a[0] * a[9] * a[15] + a[0] * a[11] * a[13] + a[8] * a[1] * a[15] - a[8] * a[3] * a[13]
        - a[12] * a[1] * a[11]
        + a[12] * a[3] * a[9];
    inv[13] = a[0] * a[9] * a[14] - a[0] * a[10] * a[13] - a[8] * a[1] * a[14] + a[8] * a[2] * a[13]
        + a[12] * a[1] * a[10]
        - a[12] * a[2] * a[9];
    inv[2] = a[1] * a[6] * a[15] - a[1] * a[7] * a[14] - a[5] * a[2] * a[15] + a[5] * a[3] * a[14]
        + a[13] * a[2] * a[7]
        - a[13] * a[3] * a[6];
    inv[6] = -a[0] * a[6] * a[15] + a[0] * a[7] * a[14] + a[4] * a[2] * a[15] - a[4] * a[3] * a[14]
        - a[12] * a[2] * a[7]
        + a[12] * a[3] * a[6];
    inv[10] = a[0] * a[5] * a[15] - a[0] * a[7] * a[13] - a[4] * a[1] * a[15] + a[4] * a[3] * a[13]
        + a[12] * a[1] * a[7]
        - a[12] * a[3] * a[5];
    inv[14] = -a[0] * a[5] * a[14] + a[0] * a[6] * a[13] + a[4] * a[1] * a[14] - a[4] * a[2] * a[13]
        - a[12] * a[1] * a[6]
        + a[12] * a[2] * a[5];
    inv[3] = -a[1] * a[6] * a[11] + a[1] * a[7] * a[10] + a[5] * a[2] * a[11] - a[5] * a[3] * a[10]
        - a[9] * a[2] * a[7]
        + a[9] * a[3] * a[6];
    inv[7] = a[0] * a[6] * a[11] - a[0] * a[7] * a[10] - a[4] * a[2] * a[11] + a[4] * a[3] * a[10]
        + a[8] * a[2] * a[7]
        - a[8] * a[3] * a[6];
    inv[11] = -a[0] * a[5] * a[11] + a[0] * a[7] * a[9] + a[4] * a[1] * a[11] - a[4] * a[3] * a[9]
        - a[8] * a[1] * a[7]
        + a[8] * a[3] * a[5];
    inv[15] = a[0] * a[5] * a[10] - a[0] * a[6] * a[9] - a[4] * a[1] * a[10] + a[4] * a[2] * a[9]
        + a[8] * a[1] * a[6]
        - a[8] * a[2] * a[5];

    let det = a[0] * inv[0] + a[1] * inv[4] + a[2] * inv[8] + a[3] * inv[12];
    if det.abs() <= f32::EPSILON * f32::EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    Some(bytemuck::cast(inv.map(|v| v * inv_det)))
}

/// Per-object records addressed by [`ResourceHandle`].
///
/// Matrices and infos live in two arenas sharing one chunk length, so a
/// handle addresses both. Each chunk is uploaded to its own uniform buffer.
/// Handle 0 is the identity record, re-created on every reset.
#[derive(Debug)]
pub struct ResourceStore {
    matrices: Arena<ObjectMatrix>,
    infos: Arena<ObjectInfos>,
    matrix_buffers: Vec<Option<BufferId>>,
    info_buffers: Vec<Option<BufferId>>,
    release: Option<ReleaseQueue>,
}

impl ResourceStore {
    pub fn new(chunk_len: usize) -> Result<Self> {
        let mut store = Self {
            matrices: Arena::new(chunk_len),
            infos: Arena::new(chunk_len),
            matrix_buffers: Vec::new(),
            info_buffers: Vec::new(),
            release: None,
        };
        store.reset()?;
        Ok(store)
    }

    /// Drops every record and re-creates the identity record at handle 0.
    pub fn reset(&mut self) -> Result<()> {
        self.matrices.reset();
        self.infos.reset();
        let unit = self.alloc(ObjectMatrix::IDENTITY, ObjectInfos::default(), false)?;
        debug_assert_eq!(unit, ResourceHandle::UNIT);
        Ok(())
    }

    pub fn alloc(&mut self, matrix: ObjectMatrix, infos: ObjectInfos, negative_scale: bool) -> Result<ResourceHandle> {
        let index = self.matrices.alloc(matrix)?;
        let info_index = self.infos.alloc(infos)?;
        debug_assert_eq!(index, info_index, "resource arenas out of step");
        Ok(ResourceHandle::new(index.chunk, index.slot, negative_scale))
    }

    pub fn matrix(&self, handle: ResourceHandle) -> &ObjectMatrix {
        self.matrices.element_at(handle.chunk(), handle.slot())
    }

    pub fn infos(&self, handle: ResourceHandle) -> &ObjectInfos {
        self.infos.element_at(handle.chunk(), handle.slot())
    }

    /// Number of records, the identity record included.
    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.matrices.chunk_count()
    }

    pub fn matrix_buffer(&self, chunk: u32) -> Option<BufferId> {
        self.matrix_buffers.get(chunk as usize).copied().flatten()
    }

    pub fn info_buffer(&self, chunk: u32) -> Option<BufferId> {
        self.info_buffers.get(chunk as usize).copied().flatten()
    }

    /// Uploads every live chunk to its uniform buffer.
    ///
    /// Buffers are sized for a full chunk and reused across frames; buffers of
    /// chunks no longer in use are destroyed.
    pub fn upload(&mut self, device: &mut (impl ResourceDevice + ?Sized)) {
        if self.release.is_none() {
            self.release = Some(device.release_queue().clone());
        }

        let chunks = self.chunk_count();
        let chunk_len = self.matrices.chunk_len() as u64;

        for (buffers, stride) in [
            (&mut self.matrix_buffers, std::mem::size_of::<ObjectMatrix>() as u64),
            (&mut self.info_buffers, std::mem::size_of::<ObjectInfos>() as u64),
        ] {
            let keep = chunks.min(buffers.len());
            for stale in buffers.drain(keep..).flatten() {
                device.destroy_buffer(stale);
            }
            buffers.resize(chunks, None);
            for slot in buffers.iter_mut().filter(|b| b.is_none()) {
                *slot = device.create_buffer(&BufferDesc {
                    kind: BufferKind::Uniform,
                    size: chunk_len * stride,
                    memory: MemoryKind::DeviceOnly,
                });
                if slot.is_none() {
                    log::warn!("failed to create a per-object uniform buffer");
                }
            }
        }

        for chunk in 0..chunks as u32 {
            if let Some(buf) = self.matrix_buffer(chunk) {
                device.update_buffer(buf, 0, bytemuck::cast_slice(self.matrices.chunk(chunk)));
            }
            if let Some(buf) = self.info_buffer(chunk) {
                device.update_buffer(buf, 0, bytemuck::cast_slice(self.infos.chunk(chunk)));
            }
        }
    }

    /// Destroys every uniform buffer immediately.
    pub fn free(&mut self, device: &mut (impl ResourceDevice + ?Sized)) {
        for id in self.matrix_buffers.drain(..).chain(self.info_buffers.drain(..)).flatten() {
            device.destroy_buffer(id);
        }
    }
}

impl Drop for ResourceStore {
    fn drop(&mut self) {
        let Some(queue) = &self.release else { return };
        for id in self.matrix_buffers.drain(..).chain(self.info_buffers.drain(..)).flatten() {
            queue.push(Released::Buffer(id));
        }
    }
}

use std::ops::{Deref, DerefMut};

use bytemuck::{Pod, Zeroable};

use crate::device::{BufferDesc, BufferId, BufferKind, MemoryKind, ReleaseQueue, Released, ResourceDevice};

/// Largest uniform buffer every backend accepts.
pub const MAX_UNIFORM_BUFFER_BYTES: usize = 16 * 1024;

/// Device buffer owned by a wrapper.
#[derive(Debug)]
struct RawBuffer {
    id: Option<BufferId>,
    desc: BufferDesc,
    release: Option<ReleaseQueue>,
}

impl RawBuffer {
    fn new(kind: BufferKind, memory: MemoryKind) -> Self {
        Self {
            id: None,
            desc: BufferDesc { kind, size: 0, memory },
            release: None,
        }
    }

    /// Returns a buffer of exactly `size` bytes, re-creating it if needed.
    fn ensure(&mut self, device: &mut (impl ResourceDevice + ?Sized), size: u64) -> Option<BufferId> {
        if self.id.is_some() && self.desc.size == size {
            return self.id;
        }
        self.free(device);
        self.release = Some(device.release_queue().clone());
        self.desc.size = size;
        self.id = device.create_buffer(&self.desc);
        if self.id.is_none() {
            log::warn!("{:?} buffer of {size} bytes could not be created", self.desc.kind);
        }
        self.id
    }

    fn write(&mut self, device: &mut (impl ResourceDevice + ?Sized), bytes: &[u8]) -> bool {
        let Some(id) = self.ensure(device, bytes.len() as u64) else {
            return false;
        };
        device.update_buffer(id, 0, bytes);
        true
    }

    fn read(&self, device: &mut (impl ResourceDevice + ?Sized), out: &mut [u8]) -> bool {
        assert!(
            self.desc.memory == MemoryKind::HostVisible,
            "read of a device-only buffer"
        );
        match self.id {
            Some(id) => device.read_buffer(id, 0, out),
            None => false,
        }
    }

    fn free(&mut self, device: &mut (impl ResourceDevice + ?Sized)) {
        if let Some(id) = self.id.take() {
            device.destroy_buffer(id);
        }
    }
}

impl Drop for RawBuffer {
    fn drop(&mut self) {
        if let (Some(queue), Some(id)) = (&self.release, self.id.take()) {
            queue.push(Released::Buffer(id));
        }
    }
}

// ── single value ──────────────────────────────────────────────────────────

/// Host value mirrored into a device buffer.
///
/// The value is edited through `Deref`/`DerefMut`; `push_update` uploads it
/// and `read` downloads it back for host-visible buffers.
#[derive(Debug)]
pub struct DeviceMirror<T: Pod> {
    value: T,
    raw: RawBuffer,
}

impl<T: Pod> DeviceMirror<T> {
    pub fn new(kind: BufferKind, memory: MemoryKind, value: T) -> Self {
        Self {
            value,
            raw: RawBuffer::new(kind, memory),
        }
    }

    pub fn id(&self) -> Option<BufferId> {
        self.raw.id
    }

    /// Uploads the host value, creating the buffer on first use.
    pub fn push_update(&mut self, device: &mut (impl ResourceDevice + ?Sized)) -> bool {
        self.raw.write(device, bytemuck::bytes_of(&self.value))
    }

    /// Replaces the host value with the device contents.
    ///
    /// Panics on device-only buffers.
    pub fn read(&mut self, device: &mut (impl ResourceDevice + ?Sized)) -> bool {
        self.raw.read(device, bytemuck::bytes_of_mut(&mut self.value))
    }

    pub fn free(&mut self, device: &mut (impl ResourceDevice + ?Sized)) {
        self.raw.free(device);
    }
}

impl<T: Pod> Deref for DeviceMirror<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Pod> DerefMut for DeviceMirror<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

/// Uniform block holding one `T`.
///
/// `T` must fit [`MAX_UNIFORM_BUFFER_BYTES`] and be a multiple of 16 bytes;
/// both are checked at compile time.
#[derive(Debug)]
pub struct UniformBuffer<T: Pod>(DeviceMirror<T>);

impl<T: Pod> UniformBuffer<T> {
    const LAYOUT_OK: () = assert!(
        std::mem::size_of::<T>() <= MAX_UNIFORM_BUFFER_BYTES && std::mem::size_of::<T>() % 16 == 0,
        "uniform buffer type must fit the limit and be a multiple of 16 bytes"
    );

    pub fn new(value: T) -> Self {
        let () = Self::LAYOUT_OK;
        Self(DeviceMirror::new(BufferKind::Uniform, MemoryKind::DeviceOnly, value))
    }
}

impl<T: Pod> Default for UniformBuffer<T> {
    fn default() -> Self {
        Self::new(T::zeroed())
    }
}

impl<T: Pod> Deref for UniformBuffer<T> {
    type Target = DeviceMirror<T>;

    fn deref(&self) -> &DeviceMirror<T> {
        &self.0
    }
}

impl<T: Pod> DerefMut for UniformBuffer<T> {
    fn deref_mut(&mut self) -> &mut DeviceMirror<T> {
        &mut self.0
    }
}

/// Storage buffer holding one `T`.
#[derive(Debug)]
pub struct StorageBuffer<T: Pod>(DeviceMirror<T>);

impl<T: Pod> StorageBuffer<T> {
    pub fn new(memory: MemoryKind, value: T) -> Self {
        Self(DeviceMirror::new(BufferKind::Storage, memory, value))
    }
}

impl<T: Pod> Deref for StorageBuffer<T> {
    type Target = DeviceMirror<T>;

    fn deref(&self) -> &DeviceMirror<T> {
        &self.0
    }
}

impl<T: Pod> DerefMut for StorageBuffer<T> {
    fn deref_mut(&mut self) -> &mut DeviceMirror<T> {
        &mut self.0
    }
}

// ── arrays ────────────────────────────────────────────────────────────────

/// Fixed-length storage array, resizable explicitly.
#[derive(Debug)]
pub struct StorageArrayBuffer<T: Pod> {
    data: Vec<T>,
    raw: RawBuffer,
}

impl<T: Pod> StorageArrayBuffer<T> {
    pub fn new(len: usize, memory: MemoryKind) -> Self {
        assert!(len > 0, "storage array length must be positive");
        Self {
            data: vec![T::zeroed(); len],
            raw: RawBuffer::new(BufferKind::Storage, memory),
        }
    }

    pub fn id(&self) -> Option<BufferId> {
        self.raw.id
    }

    /// Changes the element count, keeping the common prefix on host and
    /// device. Returns `true` when the length changed.
    pub fn resize(&mut self, device: &mut (impl ResourceDevice + ?Sized), len: usize) -> bool {
        assert!(len > 0, "storage array length must be positive");
        if len == self.data.len() {
            return false;
        }
        let kept = len.min(self.data.len());
        self.data.resize(len, T::zeroed());

        if let Some(old) = self.raw.id {
            let stride = std::mem::size_of::<T>() as u64;
            let desc = BufferDesc {
                size: len as u64 * stride,
                ..self.raw.desc
            };
            match device.create_buffer(&desc) {
                Some(fresh) => {
                    device.copy_buffer(old, 0, fresh, 0, kept as u64 * stride);
                    device.destroy_buffer(old);
                    self.raw.id = Some(fresh);
                    self.raw.desc = desc;
                }
                None => {
                    log::warn!("storage array resize to {len} elements failed");
                    self.raw.free(device);
                }
            }
        }
        true
    }

    pub fn push_update(&mut self, device: &mut (impl ResourceDevice + ?Sized)) -> bool {
        self.raw.write(device, bytemuck::cast_slice(&self.data))
    }

    pub fn read(&mut self, device: &mut (impl ResourceDevice + ?Sized)) -> bool {
        self.raw.read(device, bytemuck::cast_slice_mut(&mut self.data))
    }

    pub fn free(&mut self, device: &mut (impl ResourceDevice + ?Sized)) {
        self.raw.free(device);
    }
}

impl<T: Pod> Deref for StorageArrayBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T: Pod> DerefMut for StorageArrayBuffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

/// Growable storage array: a logical length over a power-of-two capacity.
///
/// Growth happens on the host; the device buffer follows at `push_update`.
#[derive(Debug)]
pub struct StorageVectorBuffer<T: Pod> {
    array: StorageArrayBuffer<T>,
    len: usize,
}

impl<T: Pod> StorageVectorBuffer<T> {
    pub fn new(capacity: usize, memory: MemoryKind) -> Self {
        Self {
            array: StorageArrayBuffer::new(capacity.max(1), memory),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.array.data.len()
    }

    pub fn id(&self) -> Option<BufferId> {
        self.array.id()
    }

    pub fn append(&mut self, value: T) {
        if self.len == self.capacity() {
            let grown = (self.len + 1).next_power_of_two();
            self.array.data.resize(grown, T::zeroed());
        }
        self.array.data[self.len] = value;
        self.len += 1;
    }

    /// Forgets the elements, keeping the capacity.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn as_slice(&self) -> &[T] {
        &self.array.data[..self.len]
    }

    pub fn push_update(&mut self, device: &mut (impl ResourceDevice + ?Sized)) -> bool {
        self.array.push_update(device)
    }

    pub fn free(&mut self, device: &mut (impl ResourceDevice + ?Sized)) {
        self.array.free(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, RecordingDevice};

    #[repr(C)]
    #[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
    struct Params {
        color: [f32; 4],
        scale: f32,
        _pad: [f32; 3],
    }

    // ── single value ──────────────────────────────────────────────────────

    #[test]
    fn push_update_uploads_the_host_value() {
        let mut dev = RecordingDevice::new();
        let mut ubo = UniformBuffer::<Params>::default();
        assert!(ubo.id().is_none());

        ubo.scale = 2.0;
        assert!(ubo.push_update(&mut dev));
        let bytes = dev.buffer_bytes(ubo.id().unwrap()).unwrap();
        let stored: Params = bytemuck::pod_read_unaligned(bytes);
        assert_eq!(stored.scale, 2.0);
        assert_eq!(dev.buffer_desc(ubo.id().unwrap()).unwrap().kind, BufferKind::Uniform);
    }

    #[test]
    fn repeated_updates_reuse_the_buffer() {
        let mut dev = RecordingDevice::new();
        let mut ubo = UniformBuffer::<Params>::default();
        ubo.push_update(&mut dev);
        ubo.push_update(&mut dev);
        assert_eq!(dev.buffers_created(), 1);
    }

    #[test]
    fn host_visible_storage_reads_back() {
        let mut dev = RecordingDevice::new();
        let mut ssbo = StorageBuffer::new(MemoryKind::HostVisible, [0u32; 4]);
        ssbo.push_update(&mut dev);
        dev.update_buffer(ssbo.id().unwrap(), 4, bytemuck::bytes_of(&7u32));

        assert!(ssbo.read(&mut dev));
        assert_eq!(**ssbo, [0, 7, 0, 0]);
    }

    #[test]
    #[should_panic(expected = "read of a device-only buffer")]
    fn reading_a_uniform_buffer_panics() {
        let mut dev = RecordingDevice::new();
        let mut ubo = UniformBuffer::<Params>::default();
        ubo.push_update(&mut dev);
        ubo.read(&mut dev);
    }

    #[test]
    fn drop_queues_the_buffer_for_release() {
        let mut dev = RecordingDevice::new();
        {
            let mut ubo = UniformBuffer::<Params>::default();
            ubo.push_update(&mut dev);
        }
        assert_eq!(dev.live_buffers(), 1);
        dev.collect_released();
        assert_eq!(dev.live_buffers(), 0);
    }

    // ── arrays ────────────────────────────────────────────────────────────

    #[test]
    fn resize_keeps_the_common_prefix() {
        let mut dev = RecordingDevice::new();
        let mut arr = StorageArrayBuffer::<u32>::new(4, MemoryKind::HostVisible);
        arr.copy_from_slice(&[1, 2, 3, 4]);
        arr.push_update(&mut dev);
        let old = arr.id().unwrap();

        assert!(arr.resize(&mut dev, 2));
        assert_eq!(&arr[..], &[1, 2]);
        assert!(!dev.is_buffer_alive(old));
        assert!(dev.calls().contains(&DeviceCall::CopyBuffer {
            src: old,
            dst: arr.id().unwrap(),
            size: 8,
        }));

        let mut back = [0u32; 2];
        dev.read_buffer(arr.id().unwrap(), 0, bytemuck::cast_slice_mut(&mut back));
        assert_eq!(back, [1, 2]);

        assert!(arr.resize(&mut dev, 3));
        assert_eq!(&arr[..], &[1, 2, 0]);
        assert!(!arr.resize(&mut dev, 3));
    }

    #[test]
    #[should_panic(expected = "must be positive")]
    fn resize_to_zero_panics() {
        let mut dev = RecordingDevice::new();
        let mut arr = StorageArrayBuffer::<u32>::new(4, MemoryKind::DeviceOnly);
        arr.resize(&mut dev, 0);
    }

    #[test]
    fn vector_grows_to_powers_of_two() {
        let mut dev = RecordingDevice::new();
        let mut v = StorageVectorBuffer::<u32>::new(1, MemoryKind::DeviceOnly);
        for i in 0..5 {
            v.append(i);
        }
        assert_eq!(v.len(), 5);
        assert_eq!(v.capacity(), 8);
        assert_eq!(v.as_slice(), &[0, 1, 2, 3, 4]);

        v.push_update(&mut dev);
        assert_eq!(dev.buffer_desc(v.id().unwrap()).unwrap().size, 32);

        v.clear();
        assert!(v.is_empty());
        assert_eq!(v.capacity(), 8);
    }
}

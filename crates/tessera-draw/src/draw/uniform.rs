use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::device::{BufferId, SamplerState, TextureId, UniformValue};
use crate::memory::ArenaIndex;

/// Shared slot read when a binding or command is replayed.
///
/// Lets a binding be recorded before the resource it points at exists; only
/// the value present at replay time matters.
pub struct BindRef<T>(Arc<RwLock<T>>);

impl<T> BindRef<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    pub fn set(&self, value: T) {
        *self.0.write() = value;
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write()
    }

    /// Whether both refer to the same slot.
    pub fn ptr_eq(&self, other: &BindRef<T>) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Copy> BindRef<T> {
    pub fn get(&self) -> T {
        *self.0.read()
    }
}

impl<T> Clone for BindRef<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: Default> Default for BindRef<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for BindRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BindRef").field(&*self.0.read()).finish()
    }
}

/// Payload of a deferred binding.
#[derive(Debug, Clone)]
pub enum UniformBinding {
    /// Constant copied at record time.
    Value(UniformValue),
    /// Constant read at replay time.
    ValueRef(BindRef<UniformValue>),
    Texture {
        texture: TextureId,
        sampler: SamplerState,
    },
    TextureRef {
        texture: BindRef<Option<TextureId>>,
        sampler: SamplerState,
    },
    Image(TextureId),
    ImageRef(BindRef<Option<TextureId>>),
    Block(BufferId),
    BlockRef(BindRef<Option<BufferId>>),
    StorageBlock(BufferId),
    StorageBlockRef(BindRef<Option<BufferId>>),
}

/// A binding and the location it targets.
#[derive(Debug, Clone)]
pub struct Uniform {
    pub location: u32,
    pub binding: UniformBinding,
}

#[derive(Debug)]
pub(crate) struct UniformChunk {
    pub(crate) uniforms: Vec<Uniform>,
    pub(crate) next: Option<ArenaIndex>,
}

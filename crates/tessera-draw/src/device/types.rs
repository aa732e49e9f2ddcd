use bitflags::bitflags;

slotmap::new_key_type! {
    /// Device texture.
    pub struct TextureId;
    /// Non-owning view (mip, layer or aspect subset) of a device texture.
    pub struct TextureViewId;
    /// Device buffer.
    pub struct BufferId;
    /// Set of render attachments.
    pub struct FramebufferId;
}

/// Compiled pipeline (shader + fixed state) owned by the consumer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, PartialOrd, Ord)]
pub struct PipelineId(pub u32);

/// Geometry batch (vertex/index buffers + primitive type) owned by the consumer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, PartialOrd, Ord)]
pub struct BatchId(pub u32);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TextureDimension {
    D1,
    D1Array,
    D2,
    D2Array,
    D3,
    Cube,
    CubeArray,
}

impl TextureDimension {
    /// Whether the texture has individually addressable layers.
    pub const fn is_layered(self) -> bool {
        matches!(
            self,
            TextureDimension::D1Array
                | TextureDimension::D2Array
                | TextureDimension::Cube
                | TextureDimension::CubeArray
        )
    }
}

/// Texture size in texels.
///
/// `depth` is the depth of 3D textures and the layer count of layered ones
/// (cube maps count 6 layers per cube).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32, depth: u32) -> Self {
        Self { width, height, depth }
    }

    pub const fn d2(width: u32, height: u32) -> Self {
        Self::new(width, height, 1)
    }

    /// Size of mip level `mip`, never below one texel.
    pub fn mip(self, mip: u32, dimension: TextureDimension) -> Self {
        let shrink = |v: u32| (v >> mip).max(1);
        match dimension {
            TextureDimension::D3 => Self::new(shrink(self.width), shrink(self.height), shrink(self.depth)),
            TextureDimension::D1 | TextureDimension::D1Array => Self::new(shrink(self.width), self.height, self.depth),
            _ => Self::new(shrink(self.width), shrink(self.height), self.depth),
        }
    }

    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0 || self.depth == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    pub label: Option<String>,
    pub dimension: TextureDimension,
    pub extent: Extent,
    pub format: wgpu::TextureFormat,
    pub usage: wgpu::TextureUsages,
    pub mip_count: u32,
}

impl TextureDesc {
    /// Parameters compared by `ensure_*`. The label is not one of them.
    pub fn same_shape(&self, other: &TextureDesc) -> bool {
        self.dimension == other.dimension
            && self.extent == other.extent
            && self.format == other.format
            && self.usage == other.usage
            && self.mip_count == other.mip_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureViewDesc {
    pub texture: TextureId,
    pub base_mip: u32,
    pub mip_count: u32,
    pub base_layer: u32,
    pub layer_count: u32,
    pub aspect: wgpu::TextureAspect,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferKind {
    Uniform,
    Storage,
    Vertex,
    Index,
    Indirect,
}

/// Where a buffer lives and whether the host may read it back.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MemoryKind {
    /// Device-local; `read_buffer` is unavailable.
    DeviceOnly,
    /// Host-visible; `read_buffer` downloads the contents.
    HostVisible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferDesc {
    pub kind: BufferKind,
    pub size: u64,
    pub memory: MemoryKind,
}

/// One render attachment: a texture mip, optionally a single layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attachment {
    pub texture: TextureId,
    pub mip: u32,
    pub layer: Option<u32>,
}

impl Attachment {
    pub const fn new(texture: TextureId) -> Self {
        Self { texture, mip: 0, layer: None }
    }

    pub const fn with_mip(mut self, mip: u32) -> Self {
        self.mip = mip;
        self
    }

    pub const fn with_layer(mut self, layer: u32) -> Self {
        self.layer = Some(layer);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FramebufferDesc {
    pub depth: Option<Attachment>,
    pub colors: Vec<Attachment>,
}

/// Value written by `clear_texture`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValue {
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: u32,
}

impl ClearValue {
    pub const ZERO: ClearValue = ClearValue {
        color: [0.0; 4],
        depth: 0.0,
        stencil: 0,
    };

    pub const fn color(color: [f32; 4]) -> Self {
        Self {
            color,
            depth: 1.0,
            stencil: 0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.color == [0.0; 4] && self.depth == 0.0 && self.stencil == 0
    }
}

bitflags! {
    /// Sampling parameters attached to a texture binding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SamplerState: u8 {
        const FILTER = 1 << 0;
        const MIPMAP = 1 << 1;
        const REPEAT_S = 1 << 2;
        const REPEAT_T = 1 << 3;
        const REPEAT_R = 1 << 4;
        const CLAMP_BORDER = 1 << 5;
        const COMPARE = 1 << 6;
        const ANISO = 1 << 7;

        const REPEAT = Self::REPEAT_S.bits() | Self::REPEAT_T.bits() | Self::REPEAT_R.bits();
    }
}

bitflags! {
    /// Memory dependencies a barrier must resolve.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BarrierFlags: u16 {
        const VERTEX_ATTRIB = 1 << 0;
        const ELEMENT_ARRAY = 1 << 1;
        const UNIFORM = 1 << 2;
        const TEXTURE_FETCH = 1 << 3;
        const SHADER_IMAGE_ACCESS = 1 << 4;
        const COMMAND = 1 << 5;
        const TEXTURE_UPDATE = 1 << 6;
        const BUFFER_UPDATE = 1 << 7;
        const FRAMEBUFFER = 1 << 8;
        const SHADER_STORAGE = 1 << 9;
    }
}

bitflags! {
    /// Framebuffer aspects affected by a clear command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClearBits: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// How a bound buffer is exposed to the pipeline.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BufferBinding {
    Uniform,
    Storage,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PrimitiveType {
    Points,
    Lines,
    Triangles,
}

/// Source of vertices for a draw.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Geometry {
    Batch(BatchId),
    /// No vertex input; the pipeline generates vertices from their index.
    Procedural(PrimitiveType),
}

/// Ranges of a draw call.
///
/// A `vertex_count` of zero means "every vertex of the batch".
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct DrawArgs {
    pub vertex_first: u32,
    pub vertex_count: u32,
    pub instance_first: u32,
    pub instance_count: u32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct StencilState {
    pub write_mask: u8,
    pub reference: u8,
    pub compare_mask: u8,
}

/// Value pushed to a plain uniform location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int { data: [i32; 4], len: u8 },
    Float { data: [f32; 4], len: u8 },
    Mat4([[f32; 4]; 4]),
}

impl UniformValue {
    /// Builds an integer vector of 1 to 4 components.
    pub fn int(values: &[i32]) -> Self {
        assert!((1..=4).contains(&values.len()), "int uniforms have 1 to 4 components");
        let mut data = [0; 4];
        data[..values.len()].copy_from_slice(values);
        UniformValue::Int {
            data,
            len: values.len() as u8,
        }
    }

    /// Builds a float vector of 1 to 4 components.
    pub fn float(values: &[f32]) -> Self {
        assert!((1..=4).contains(&values.len()), "float uniforms have 1 to 4 components");
        let mut data = [0.0; 4];
        data[..values.len()].copy_from_slice(values);
        UniformValue::Float {
            data,
            len: values.len() as u8,
        }
    }

    pub const fn scalar_int(value: i32) -> Self {
        UniformValue::Int {
            data: [value, 0, 0, 0],
            len: 1,
        }
    }
}

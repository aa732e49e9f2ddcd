use crate::device::Capabilities;
use crate::draw::{ObjectMatrix, MAX_COMMANDS_PER_CHUNK};
use crate::memory::MAX_SLOTS_PER_CHUNK;

/// Sizing and behavior knobs for a recording session.
///
/// The defaults match a backend with a 64 KiB uniform-buffer limit. Use
/// [`DrawConfig::derived_from`] to fit another backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawConfig {
    /// Command slots in every chunk after the first one of a shading group.
    pub command_chunk_len: usize,

    /// Command slots in the first chunk of a shading group.
    ///
    /// Most groups only record a handful of commands.
    pub small_command_chunk_len: usize,

    /// Uniform bindings per uniform chunk.
    pub uniform_chunk_len: usize,

    /// Per-object records per resource chunk.
    ///
    /// One resource chunk maps to one uniform buffer on the device, so this is
    /// bounded by the uniform-buffer byte limit and by the 9-bit slot field of
    /// a resource handle.
    pub resource_chunk_len: usize,

    /// Frames a pooled texture may stay unused before it is destroyed.
    pub pool_eviction_frames: u32,

    /// Reorders chunks made only of plain draws by geometry batch at `finish`.
    pub sort_draw_calls: bool,

    /// Elements processed per draw by the serial data refiner.
    pub refine_batch_len: u32,
}

impl Default for DrawConfig {
    fn default() -> Self {
        Self {
            command_chunk_len: 96,
            small_command_chunk_len: 6,
            uniform_chunk_len: 10,
            resource_chunk_len: 512,
            pool_eviction_frames: 8,
            sort_draw_calls: false,
            refine_batch_len: 2048,
        }
    }
}

impl DrawConfig {
    /// Re-derives the limit-dependent sizes from the backend capabilities.
    pub fn derived_from(mut self, caps: &Capabilities) -> Self {
        let per_ubo = caps.max_uniform_buffer_size as usize / std::mem::size_of::<ObjectMatrix>();
        self.resource_chunk_len = per_ubo.clamp(1, MAX_SLOTS_PER_CHUNK as usize);
        log::debug!(
            "draw config: resource_chunk_len={} (max_uniform_buffer_size={})",
            self.resource_chunk_len,
            caps.max_uniform_buffer_size
        );
        self
    }

    /// Asserts the invariants the recording structures rely on.
    pub fn validate(&self) {
        assert!(
            self.small_command_chunk_len > 0 && self.small_command_chunk_len <= MAX_COMMANDS_PER_CHUNK,
            "small_command_chunk_len must be in 1..={MAX_COMMANDS_PER_CHUNK}"
        );
        assert!(
            self.command_chunk_len > 0 && self.command_chunk_len <= MAX_COMMANDS_PER_CHUNK,
            "command_chunk_len must be in 1..={MAX_COMMANDS_PER_CHUNK}"
        );
        assert!(self.uniform_chunk_len > 0, "uniform_chunk_len must be non-zero");
        assert!(
            self.resource_chunk_len > 0 && self.resource_chunk_len <= MAX_SLOTS_PER_CHUNK as usize,
            "resource_chunk_len must fit in a resource handle slot"
        );
        assert!(self.refine_batch_len > 0, "refine_batch_len must be non-zero");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        DrawConfig::default().validate();
    }

    #[test]
    fn derived_resource_chunk_len_follows_uniform_limit() {
        let caps = Capabilities {
            max_uniform_buffer_size: 16 * 1024,
            ..Capabilities::default()
        };
        let config = DrawConfig::default().derived_from(&caps);
        assert_eq!(config.resource_chunk_len, 128);
    }

    #[test]
    fn derived_resource_chunk_len_is_clamped_to_slot_range() {
        let caps = Capabilities {
            max_uniform_buffer_size: 1 << 20,
            ..Capabilities::default()
        };
        let config = DrawConfig::default().derived_from(&caps);
        assert_eq!(config.resource_chunk_len, 512);
    }

    #[test]
    #[should_panic(expected = "command_chunk_len")]
    fn oversized_command_chunk_is_rejected() {
        DrawConfig {
            command_chunk_len: 200,
            ..DrawConfig::default()
        }
        .validate();
    }
}

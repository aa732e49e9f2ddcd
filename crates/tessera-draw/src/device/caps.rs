/// Backend limits and feature support queried once per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// Largest uniform buffer binding, in bytes.
    pub max_uniform_buffer_size: u32,
    /// Largest work-group count per dispatch, per dimension.
    pub max_work_group_count: [u32; 3],
    /// Largest texture dimension, in texels.
    pub max_texture_size: u32,
    pub compute_shader: bool,
    pub storage_buffer: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            max_uniform_buffer_size: 64 * 1024,
            max_work_group_count: [65535; 3],
            max_texture_size: 16384,
            compute_shader: true,
            storage_buffer: true,
        }
    }
}

impl Capabilities {
    /// Reads capabilities from wgpu device limits.
    pub fn from_wgpu_limits(limits: &wgpu::Limits) -> Self {
        let max_groups = clamp(limits.max_compute_workgroups_per_dimension);
        Self {
            max_uniform_buffer_size: clamp(limits.max_uniform_buffer_binding_size),
            max_work_group_count: [max_groups; 3],
            max_texture_size: clamp(limits.max_texture_dimension_2d),
            compute_shader: max_groups > 0,
            storage_buffer: clamp(limits.max_storage_buffers_per_shader_stage) > 0,
        }
    }

    /// Whether per-frame data refinement can run as a compute dispatch.
    pub fn supports_compute_refine(&self) -> bool {
        self.compute_shader && self.storage_buffer
    }
}

fn clamp<T: TryInto<u32>>(value: T) -> u32 {
    value.try_into().unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downlevel_limits_disable_compute() {
        let caps = Capabilities::from_wgpu_limits(&wgpu::Limits::downlevel_webgl2_defaults());
        assert!(!caps.supports_compute_refine());
        assert!(caps.max_uniform_buffer_size > 0);
    }

    #[test]
    fn default_limits_allow_compute() {
        let caps = Capabilities::from_wgpu_limits(&wgpu::Limits::default());
        assert!(caps.supports_compute_refine());
        assert_eq!(caps.max_uniform_buffer_size, 64 * 1024);
    }
}

use parking_lot::{Mutex, MutexGuard};

use crate::config::DrawConfig;
use crate::device::{Capabilities, Device, TextureId};
use crate::draw::{select_refiner, DataRefiner, DrawData, PassId, RefineJob, ReplayEnv, ShadingGroupId};
use crate::error::Result;
use crate::gpu::FallbackTextures;
use crate::pool::{PoolOwner, TexturePool};

/// Session-wide state shared by every recording: the device, the texture
/// pool, fallback textures and the data refiner picked for the device.
///
/// Locks are always taken device first, then pool or fallbacks.
pub struct RenderContext<D: Device> {
    device: Mutex<D>,
    caps: Capabilities,
    config: DrawConfig,
    pool: Mutex<TexturePool>,
    fallback: Mutex<FallbackTextures>,
    refiner: Box<dyn DataRefiner>,
}

impl<D: Device> RenderContext<D> {
    /// Builds a context, fitting `config` to the device limits.
    pub fn new(device: D, config: DrawConfig) -> Self {
        let caps = device.capabilities().clone();
        let config = config.derived_from(&caps);
        config.validate();
        let refiner = select_refiner(&caps, &config);
        log::info!(
            "render context ready: max_uniform_buffer_size={} max_work_group_count={:?}",
            caps.max_uniform_buffer_size,
            caps.max_work_group_count
        );
        Self {
            device: Mutex::new(device),
            pool: Mutex::new(TexturePool::new(config.pool_eviction_frames)),
            fallback: Mutex::new(FallbackTextures::new()),
            caps,
            config,
            refiner,
        }
    }

    pub fn device(&self) -> MutexGuard<'_, D> {
        self.device.lock()
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn config(&self) -> &DrawConfig {
        &self.config
    }

    pub fn refiner(&self) -> &dyn DataRefiner {
        self.refiner.as_ref()
    }

    // ── frame ─────────────────────────────────────────────────────────────

    /// New recording data sized for this device.
    pub fn create_draw_data(&self) -> Result<DrawData> {
        DrawData::new(self.config.clone(), self.caps.clone())
    }

    pub fn begin_frame(&self, data: &mut DrawData) -> Result<()> {
        data.reset()
    }

    pub fn finish_recording(&self, data: &mut DrawData) {
        data.finish(&mut *self.device.lock());
    }

    pub fn draw_pass(&self, data: &DrawData, pass: PassId) {
        let mut device = self.device.lock();
        let env = self.replay_env(&mut device);
        data.draw_pass(&mut *device, pass, &env);
    }

    pub fn draw_pass_subset(&self, data: &DrawData, pass: PassId, first: ShadingGroupId, last: ShadingGroupId) {
        let mut device = self.device.lock();
        let env = self.replay_env(&mut device);
        data.draw_pass_subset(&mut *device, pass, first, last, &env);
    }

    /// Ends the frame: recycles pooled textures and destroys released objects.
    pub fn end_frame(&self) {
        let mut device = self.device.lock();
        self.pool.lock().reset(&mut *device);
        device.collect_released();
    }

    /// Destroys everything the context owns on the device.
    pub fn free(&self, data: &mut DrawData) {
        let mut device = self.device.lock();
        data.free(&mut *device);
        self.pool.lock().free(&mut *device);
        self.fallback.lock().free(&mut *device);
        device.collect_released();
    }

    fn replay_env(&self, device: &mut D) -> ReplayEnv {
        ReplayEnv {
            fallback_texture: self.fallback.lock().zero(device),
        }
    }

    // ── pool ──────────────────────────────────────────────────────────────

    pub fn acquire_texture(
        &self,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Option<TextureId> {
        let mut device = self.device.lock();
        self.pool.lock().acquire(&mut *device, width, height, format, usage)
    }

    pub fn release_texture(&self, id: TextureId) {
        self.pool.lock().release(id);
    }

    pub fn query_texture(
        &self,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        owner: PoolOwner,
    ) -> Option<TextureId> {
        let mut device = self.device.lock();
        self.pool.lock().query(&mut *device, width, height, format, usage, owner)
    }

    /// Direct pool access, for [`TextureFromPool`](crate::pool::TextureFromPool).
    ///
    /// Do not hold the guard while locking the device.
    pub fn pool(&self) -> MutexGuard<'_, TexturePool> {
        self.pool.lock()
    }

    // ── refine ────────────────────────────────────────────────────────────

    pub fn refine(&self, data: &mut DrawData, pass: PassId, job: &RefineJob) -> Result<ShadingGroupId> {
        self.refiner.record(data, pass, job)
    }
}

use crate::config::DrawConfig;
use crate::device::{Capabilities, ResourceDevice};
use crate::error::Result;
use crate::memory::{Arena, ArenaIndex, ResourceHandle};

use super::command::CommandChunk;
use super::resources::{Mat4, ObjectInfos, ObjectMatrix, ResourceStore};
use super::shgroup::PipelineInfo;
use super::state::DrawState;
use super::uniform::UniformChunk;

const PASS_ARENA_CHUNK: usize = 16;
const GROUP_ARENA_CHUNK: usize = 64;
const COMMAND_ARENA_CHUNK: usize = 64;
const UNIFORM_ARENA_CHUNK: usize = 64;

/// Pass created in the current frame. Ids from earlier frames are rejected.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PassId {
    pub(crate) index: ArenaIndex,
    pub(crate) frame: u32,
}

/// Shading group created in the current frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ShadingGroupId {
    pub(crate) index: ArenaIndex,
    pub(crate) frame: u32,
}

/// Recording lifecycle of one frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Phase {
    /// Passes, groups, commands and bindings may be appended.
    Recording,
    /// Per-object data is uploaded; passes may be replayed any number of times.
    Closed,
}

#[derive(Debug)]
pub(crate) struct PassData {
    pub(crate) name: String,
    pub(crate) state: DrawState,
    pub(crate) first_group: Option<ArenaIndex>,
    pub(crate) last_group: Option<ArenaIndex>,
    /// Pass whose groups are replayed instead of this pass's own.
    pub(crate) original: Option<PassId>,
    /// Pass replayed right after this one.
    pub(crate) next: Option<PassId>,
}

#[derive(Debug)]
pub(crate) struct GroupData {
    pub(crate) pass: PassId,
    pub(crate) pipeline: PipelineInfo,
    pub(crate) parent: Option<ArenaIndex>,
    /// Most recent sub-group, new sub-groups are linked after it.
    pub(crate) last_sub: Option<ArenaIndex>,
    pub(crate) cmd_head: Option<ArenaIndex>,
    pub(crate) cmd_tail: Option<ArenaIndex>,
    pub(crate) uniform_head: Option<ArenaIndex>,
    pub(crate) uniform_tail: Option<ArenaIndex>,
    pub(crate) next: Option<ArenaIndex>,
}

/// Everything recorded for one frame.
///
/// Lifecycle per frame: `reset` → record passes/groups/commands → `finish`
/// → `draw_pass` any number of times. All storage is arena-backed and reused
/// across frames.
#[derive(Debug)]
pub struct DrawData {
    config: DrawConfig,
    caps: Capabilities,
    frame: u32,
    phase: Phase,
    pub(crate) passes: Arena<PassData>,
    pub(crate) groups: Arena<GroupData>,
    pub(crate) commands: Arena<CommandChunk>,
    pub(crate) uniforms: Arena<UniformChunk>,
    pub(crate) resources: ResourceStore,
}

impl DrawData {
    pub fn new(config: DrawConfig, caps: Capabilities) -> Result<Self> {
        config.validate();
        let resources = ResourceStore::new(config.resource_chunk_len)?;
        Ok(Self {
            config,
            caps,
            frame: 0,
            phase: Phase::Recording,
            passes: Arena::new(PASS_ARENA_CHUNK),
            groups: Arena::new(GROUP_ARENA_CHUNK),
            commands: Arena::new(COMMAND_ARENA_CHUNK),
            uniforms: Arena::new(UNIFORM_ARENA_CHUNK),
            resources,
        })
    }

    pub fn config(&self) -> &DrawConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn resources(&self) -> &ResourceStore {
        &self.resources
    }

    /// Starts a new frame. Every id handed out before is invalidated.
    pub fn reset(&mut self) -> Result<()> {
        self.frame = self.frame.wrapping_add(1);
        self.passes.reset();
        self.groups.reset();
        self.commands.reset();
        self.uniforms.reset();
        self.resources.reset()?;
        self.phase = Phase::Recording;
        log::trace!("draw data reset (frame {})", self.frame);
        Ok(())
    }

    /// Closes recording: uploads per-object data and, when enabled, sorts
    /// draw-only chunks by geometry batch.
    pub fn finish(&mut self, device: &mut (impl ResourceDevice + ?Sized)) {
        self.assert_recording();
        self.resources.upload(device);

        if self.config.sort_draw_calls {
            let mut sorted = 0;
            for chunk in self.commands.iter_mut() {
                if chunk.sort_by_batch() {
                    sorted += 1;
                }
            }
            log::trace!("sorted {sorted} draw chunks by batch");
        }

        self.phase = Phase::Closed;
        log::debug!(
            "frame {} closed: {} passes, {} groups, {} command chunks, {} resources",
            self.frame,
            self.passes.len(),
            self.groups.len(),
            self.commands.len(),
            self.resources.len()
        );
    }

    /// Allocates a per-object record and returns its handle.
    pub fn resource_handle_new(&mut self, model_matrix: Mat4, negative_scale: bool) -> Result<ResourceHandle> {
        self.resource_handle_new_with_infos(model_matrix, negative_scale, ObjectInfos::default())
    }

    pub fn resource_handle_new_with_infos(
        &mut self,
        model_matrix: Mat4,
        negative_scale: bool,
        infos: ObjectInfos,
    ) -> Result<ResourceHandle> {
        self.assert_recording();
        self.resources.alloc(ObjectMatrix::from_model(model_matrix), infos, negative_scale)
    }

    /// Destroys device objects owned by the recording data.
    pub fn free(&mut self, device: &mut (impl ResourceDevice + ?Sized)) {
        self.resources.free(device);
    }

    #[track_caller]
    pub(crate) fn assert_recording(&self) {
        assert!(
            self.phase == Phase::Recording,
            "recording is closed for this frame; reset() before recording again"
        );
    }

    #[track_caller]
    pub(crate) fn assert_closed(&self) {
        assert!(
            self.phase == Phase::Closed,
            "replay requested while recording is still open; call finish() first"
        );
    }

    #[track_caller]
    pub(crate) fn pass_data(&self, pass: PassId) -> &PassData {
        assert_eq!(pass.frame, self.frame, "stale pass id from a previous frame");
        self.passes.element_at(pass.index.chunk, pass.index.slot)
    }

    #[track_caller]
    pub(crate) fn pass_data_mut(&mut self, pass: PassId) -> &mut PassData {
        assert_eq!(pass.frame, self.frame, "stale pass id from a previous frame");
        self.passes.element_at_mut(pass.index.chunk, pass.index.slot)
    }

    #[track_caller]
    pub(crate) fn group_data(&self, group: ShadingGroupId) -> &GroupData {
        assert_eq!(group.frame, self.frame, "stale shading group id from a previous frame");
        self.group_at(group.index)
    }

    #[track_caller]
    pub(crate) fn group_data_mut(&mut self, group: ShadingGroupId) -> &mut GroupData {
        assert_eq!(group.frame, self.frame, "stale shading group id from a previous frame");
        self.group_at_mut(group.index)
    }

    pub(crate) fn group_at(&self, index: ArenaIndex) -> &GroupData {
        self.groups.element_at(index.chunk, index.slot)
    }

    pub(crate) fn group_at_mut(&mut self, index: ArenaIndex) -> &mut GroupData {
        self.groups.element_at_mut(index.chunk, index.slot)
    }

    pub(crate) fn group_id(&self, index: ArenaIndex) -> ShadingGroupId {
        ShadingGroupId {
            index,
            frame: self.frame,
        }
    }

    pub(crate) fn pass_id(&self, index: ArenaIndex) -> PassId {
        PassId {
            index,
            frame: self.frame,
        }
    }

    pub(crate) fn command_chunk(&self, index: ArenaIndex) -> &CommandChunk {
        self.commands.element_at(index.chunk, index.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RecordingDevice;

    fn data() -> DrawData {
        DrawData::new(DrawConfig::default(), Capabilities::default()).unwrap()
    }

    #[test]
    fn new_data_is_recording_with_unit_resource() {
        let d = data();
        assert_eq!(d.phase(), Phase::Recording);
        assert_eq!(d.resources().len(), 1);
    }

    #[test]
    fn finish_closes_and_reset_reopens() {
        let mut dev = RecordingDevice::new();
        let mut d = data();
        d.finish(&mut dev);
        assert_eq!(d.phase(), Phase::Closed);

        d.reset().unwrap();
        assert_eq!(d.phase(), Phase::Recording);
        assert_eq!(d.frame(), 1);
    }

    #[test]
    #[should_panic(expected = "recording is closed")]
    fn resource_after_finish_panics() {
        let mut dev = RecordingDevice::new();
        let mut d = data();
        d.finish(&mut dev);
        let _ = d.resource_handle_new(super::super::resources::IDENTITY, false);
    }

    #[test]
    #[should_panic(expected = "stale pass id")]
    fn pass_ids_do_not_survive_reset() {
        let mut d = data();
        let pass = d.create_pass("p", DrawState::DEFAULT).unwrap();
        d.reset().unwrap();
        d.pass_data(pass);
    }
}

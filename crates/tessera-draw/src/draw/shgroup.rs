use crate::device::{
    BarrierFlags, BatchId, BufferId, ClearBits, Geometry, PipelineId, PrimitiveType, SamplerState, StencilState,
    TextureId, UniformValue,
};
use crate::error::{DrawError, Result};
use crate::memory::{ArenaIndex, ResourceHandle};

use super::command::{Command, CommandChunk};
use super::data::{DrawData, GroupData, PassId, ShadingGroupId};
use super::state::DrawState;
use super::uniform::{BindRef, Uniform, UniformBinding, UniformChunk};

/// Locations a pipeline reserves for per-draw data.
///
/// Each `Some` location is filled during replay from the handle of the draw
/// being issued. Locations left `None` are never touched.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct BuiltinLocations {
    /// Int uniform receiving the resource chunk index.
    pub resource_chunk: Option<u32>,
    /// Int uniform receiving the slot within the chunk.
    pub resource_id: Option<u32>,
    pub base_instance: Option<u32>,
    /// Uniform block slot for the chunk's `ObjectMatrix` array.
    pub object_matrix_block: Option<u32>,
    /// Uniform block slot for the chunk's `ObjectInfos` array.
    pub object_info_block: Option<u32>,
    pub model_matrix: Option<u32>,
    pub model_matrix_inverse: Option<u32>,
}

impl BuiltinLocations {
    pub fn is_empty(&self) -> bool {
        *self == BuiltinLocations::default()
    }
}

/// Pipeline bound by a shading group, with its built-in locations.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PipelineInfo {
    pub pipeline: PipelineId,
    pub builtins: BuiltinLocations,
}

impl PipelineInfo {
    pub fn new(pipeline: PipelineId, builtins: BuiltinLocations) -> Self {
        Self { pipeline, builtins }
    }
}

impl From<PipelineId> for PipelineInfo {
    fn from(pipeline: PipelineId) -> Self {
        Self {
            pipeline,
            builtins: BuiltinLocations::default(),
        }
    }
}

/// Iterates the command chunks a group replays.
pub(crate) struct ChunkIter<'a> {
    data: &'a DrawData,
    next: Option<ArenaIndex>,
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = &'a CommandChunk;

    fn next(&mut self) -> Option<&'a CommandChunk> {
        let chunk = self.data.command_chunk(self.next?);
        self.next = chunk.next;
        Some(chunk)
    }
}

/// Iterates the bindings recorded directly on one group.
pub(crate) struct UniformIter<'a> {
    data: &'a DrawData,
    chunk: Option<&'a UniformChunk>,
    slot: usize,
}

impl<'a> Iterator for UniformIter<'a> {
    type Item = &'a Uniform;

    fn next(&mut self) -> Option<&'a Uniform> {
        loop {
            let chunk = self.chunk?;
            if let Some(uniform) = chunk.uniforms.get(self.slot) {
                self.slot += 1;
                return Some(uniform);
            }
            let data = self.data;
            self.chunk = chunk.next.map(|i| data.uniforms.element_at(i.chunk, i.slot));
            self.slot = 0;
        }
    }
}

impl DrawData {
    // ── groups ────────────────────────────────────────────────────────────

    /// Appends a shading group to `pass`.
    ///
    /// Groups replay in creation order. Panics if `pass` is an instance of
    /// another pass.
    pub fn create_shading_group(&mut self, pass: PassId, pipeline: impl Into<PipelineInfo>) -> Result<ShadingGroupId> {
        self.assert_recording();
        assert!(
            self.pass_data(pass).original.is_none(),
            "cannot add shading groups to an aliased pass"
        );

        let index = self.groups.alloc(GroupData {
            pass,
            pipeline: pipeline.into(),
            parent: None,
            last_sub: None,
            cmd_head: None,
            cmd_tail: None,
            uniform_head: None,
            uniform_tail: None,
            next: None,
        })?;

        match self.pass_data(pass).last_group {
            Some(tail) => self.group_at_mut(tail).next = Some(index),
            None => self.pass_data_mut(pass).first_group = Some(index),
        }
        self.pass_data_mut(pass).last_group = Some(index);
        Ok(self.group_id(index))
    }

    /// Creates a group that inherits the bindings of `parent`.
    ///
    /// The sub-group starts with an empty command list. The parent's bindings
    /// are applied first, so bindings recorded on the sub-group override them
    /// for the commands recorded into it. Sub-groups replay right after their
    /// parent and its earlier sub-groups.
    pub fn create_sub_group(&mut self, parent: ShadingGroupId) -> Result<ShadingGroupId> {
        self.assert_recording();
        let (pass, pipeline) = {
            let p = self.group_data(parent);
            (p.pass, p.pipeline)
        };

        let mut anchor = parent.index;
        while let Some(sub) = self.group_at(anchor).last_sub {
            anchor = sub;
        }
        let after = self.group_at(anchor).next;

        let index = self.groups.alloc(GroupData {
            pass,
            pipeline,
            parent: Some(parent.index),
            last_sub: None,
            cmd_head: None,
            cmd_tail: None,
            uniform_head: None,
            uniform_tail: None,
            next: after,
        })?;

        self.group_at_mut(anchor).next = Some(index);
        self.group_data_mut(parent).last_sub = Some(index);
        if after.is_none() {
            self.pass_data_mut(pass).last_group = Some(index);
        }
        Ok(self.group_id(index))
    }

    pub fn shading_group_pass(&self, group: ShadingGroupId) -> PassId {
        self.group_data(group).pass
    }

    pub fn shading_group_pipeline(&self, group: ShadingGroupId) -> PipelineInfo {
        self.group_data(group).pipeline
    }

    /// Whether the group's command list holds no draw.
    pub fn shading_group_is_empty(&self, group: ShadingGroupId) -> bool {
        !self.group_chunks(group.index).any(CommandChunk::has_draw)
    }

    /// Number of commands the group replays.
    pub fn shading_group_command_count(&self, group: ShadingGroupId) -> usize {
        self.group_chunks(group.index).map(CommandChunk::len).sum()
    }

    // ── commands ──────────────────────────────────────────────────────────

    /// Appends one command to the group's list.
    ///
    /// The first chunk of a group is small; later chunks take the full
    /// configured length.
    pub fn append_command(&mut self, group: ShadingGroupId, command: Command) -> Result<()> {
        self.assert_recording();
        let tail = match self.group_data(group).cmd_tail {
            Some(tail) if !self.command_chunk(tail).is_full() => tail,
            previous => {
                let capacity = if previous.is_none() {
                    self.config().small_command_chunk_len
                } else {
                    self.config().command_chunk_len
                };
                let fresh = self.commands.alloc(CommandChunk::with_capacity(capacity)?)?;
                match previous {
                    Some(prev) => self.command_chunk_mut(prev).next = Some(fresh),
                    None => self.group_data_mut(group).cmd_head = Some(fresh),
                }
                self.group_data_mut(group).cmd_tail = Some(fresh);
                fresh
            }
        };

        self.command_chunk_mut(tail).push(command);
        Ok(())
    }

    pub fn draw(&mut self, group: ShadingGroupId, batch: BatchId, handle: ResourceHandle) -> Result<()> {
        self.append_command(group, Command::Draw { batch, handle })
    }

    pub fn draw_range(
        &mut self,
        group: ShadingGroupId,
        batch: BatchId,
        handle: ResourceHandle,
        vertex_first: u32,
        vertex_count: u32,
    ) -> Result<()> {
        self.append_command(
            group,
            Command::DrawRange {
                batch,
                handle,
                vertex_first,
                vertex_count,
            },
        )
    }

    /// Draws `instance_count` instances. A count of zero is recorded but
    /// skipped at replay.
    pub fn draw_instanced(
        &mut self,
        group: ShadingGroupId,
        batch: BatchId,
        handle: ResourceHandle,
        instance_count: u32,
    ) -> Result<()> {
        self.append_command(
            group,
            Command::DrawInstance {
                batch,
                handle,
                instance_count,
            },
        )
    }

    pub fn draw_instanced_range(
        &mut self,
        group: ShadingGroupId,
        batch: BatchId,
        handle: ResourceHandle,
        instance_first: u32,
        instance_count: u32,
    ) -> Result<()> {
        self.append_command(
            group,
            Command::DrawInstanceRange {
                batch,
                handle,
                instance_first,
                instance_count,
            },
        )
    }

    pub fn draw_procedural(
        &mut self,
        group: ShadingGroupId,
        primitive: PrimitiveType,
        handle: ResourceHandle,
        vertex_count: u32,
    ) -> Result<()> {
        self.append_command(
            group,
            Command::DrawProcedural {
                primitive,
                handle,
                vertex_count,
            },
        )
    }

    pub fn draw_procedural_points(&mut self, group: ShadingGroupId, handle: ResourceHandle, points: u32) -> Result<()> {
        self.draw_procedural(group, PrimitiveType::Points, handle, points)
    }

    pub fn draw_procedural_lines(&mut self, group: ShadingGroupId, handle: ResourceHandle, lines: u32) -> Result<()> {
        let vertices = vertex_count(lines, 2)?;
        self.draw_procedural(group, PrimitiveType::Lines, handle, vertices)
    }

    pub fn draw_procedural_triangles(&mut self, group: ShadingGroupId, handle: ResourceHandle, triangles: u32) -> Result<()> {
        let vertices = vertex_count(triangles, 3)?;
        self.draw_procedural(group, PrimitiveType::Triangles, handle, vertices)
    }

    pub fn draw_indirect(
        &mut self,
        group: ShadingGroupId,
        geometry: Geometry,
        handle: ResourceHandle,
        buffer: BufferId,
        offset: u64,
    ) -> Result<()> {
        self.append_command(
            group,
            Command::DrawIndirect {
                geometry,
                handle,
                buffer,
                offset,
            },
        )
    }

    pub fn dispatch(&mut self, group: ShadingGroupId, groups: [u32; 3]) -> Result<()> {
        self.append_command(group, Command::Compute { groups })
    }

    /// Dispatches with group counts read at replay time.
    pub fn dispatch_ref(&mut self, group: ShadingGroupId, groups: &BindRef<[u32; 3]>) -> Result<()> {
        self.append_command(
            group,
            Command::ComputeRef {
                groups: groups.clone(),
            },
        )
    }

    pub fn dispatch_indirect(&mut self, group: ShadingGroupId, buffer: BufferId, offset: u64) -> Result<()> {
        self.append_command(group, Command::ComputeIndirect { buffer, offset })
    }

    /// Splits a dispatch of `total_groups` along x into slices the device
    /// accepts.
    ///
    /// Each slice is a sub-group of `group` that receives its first group
    /// index through the int uniform at `offset_location`. Returns the last
    /// sub-group, or `None` when there is nothing to dispatch.
    pub fn dispatch_split(
        &mut self,
        group: ShadingGroupId,
        total_groups: u32,
        offset_location: u32,
    ) -> Result<Option<ShadingGroupId>> {
        let max = self.capabilities().max_work_group_count[0].max(1);
        let mut offset = 0;
        let mut last = None;
        while offset < total_groups {
            let count = max.min(total_groups - offset);
            let sub = self.create_sub_group(group)?;
            self.uniform_int(sub, offset_location, &[int_offset(offset)?])?;
            self.dispatch(sub, [count, 1, 1])?;
            last = Some(sub);
            offset += count;
        }
        if total_groups > max {
            log::debug!("split dispatch of {total_groups} groups into slices of {max}");
        }
        Ok(last)
    }

    pub fn barrier(&mut self, group: ShadingGroupId, flags: BarrierFlags) -> Result<()> {
        self.append_command(group, Command::Barrier { flags })
    }

    pub fn clear_framebuffer(
        &mut self,
        group: ShadingGroupId,
        bits: ClearBits,
        color: [f32; 4],
        depth: f32,
        stencil: u8,
    ) -> Result<()> {
        self.append_command(
            group,
            Command::Clear {
                bits,
                color,
                depth,
                stencil,
            },
        )
    }

    pub fn state_enable(&mut self, group: ShadingGroupId, state: DrawState) -> Result<()> {
        self.append_command(
            group,
            Command::SetState {
                enable: state,
                disable: DrawState::empty(),
            },
        )
    }

    pub fn state_disable(&mut self, group: ShadingGroupId, state: DrawState) -> Result<()> {
        self.append_command(
            group,
            Command::SetState {
                enable: DrawState::empty(),
                disable: state,
            },
        )
    }

    pub fn stencil_set(&mut self, group: ShadingGroupId, write_mask: u8, reference: u8, compare_mask: u8) -> Result<()> {
        self.append_command(
            group,
            Command::SetStencil(StencilState {
                write_mask,
                reference,
                compare_mask,
            }),
        )
    }

    /// Sets only the reference value, writing and comparing every bit.
    pub fn stencil_mask(&mut self, group: ShadingGroupId, reference: u8) -> Result<()> {
        self.stencil_set(group, 0xFF, reference, 0xFF)
    }

    pub fn select_id(&mut self, group: ShadingGroupId, id: u32) -> Result<()> {
        self.append_command(group, Command::SetSelectId(id))
    }

    // ── bindings ──────────────────────────────────────────────────────────

    /// Appends a binding resolved right before the group's commands replay.
    pub fn bind_uniform(&mut self, group: ShadingGroupId, location: u32, binding: UniformBinding) -> Result<()> {
        self.assert_recording();
        let chunk_len = self.config().uniform_chunk_len;
        let uniform = Uniform { location, binding };

        if let Some(tail) = self.group_data(group).uniform_tail {
            let chunk = self.uniforms.element_at_mut(tail.chunk, tail.slot);
            if chunk.uniforms.len() < chunk_len {
                chunk.uniforms.push(uniform);
                return Ok(());
            }
        }

        let mut uniforms = Vec::new();
        uniforms
            .try_reserve_exact(chunk_len)
            .map_err(|_| DrawError::OutOfMemory {
                requested_bytes: chunk_len * std::mem::size_of::<Uniform>(),
            })?;
        uniforms.push(uniform);
        let fresh = self.uniforms.alloc(UniformChunk { uniforms, next: None })?;

        match self.group_data(group).uniform_tail {
            Some(tail) => self.uniforms.element_at_mut(tail.chunk, tail.slot).next = Some(fresh),
            None => self.group_data_mut(group).uniform_head = Some(fresh),
        }
        self.group_data_mut(group).uniform_tail = Some(fresh);
        Ok(())
    }

    pub fn uniform_value(&mut self, group: ShadingGroupId, location: u32, value: UniformValue) -> Result<()> {
        self.bind_uniform(group, location, UniformBinding::Value(value))
    }

    pub fn uniform_int(&mut self, group: ShadingGroupId, location: u32, values: &[i32]) -> Result<()> {
        self.uniform_value(group, location, UniformValue::int(values))
    }

    pub fn uniform_float(&mut self, group: ShadingGroupId, location: u32, values: &[f32]) -> Result<()> {
        self.uniform_value(group, location, UniformValue::float(values))
    }

    pub fn uniform_mat4(&mut self, group: ShadingGroupId, location: u32, value: [[f32; 4]; 4]) -> Result<()> {
        self.uniform_value(group, location, UniformValue::Mat4(value))
    }

    /// Binds a constant read through `value` at replay time.
    pub fn bind_scalar_ref(&mut self, group: ShadingGroupId, location: u32, value: &BindRef<UniformValue>) -> Result<()> {
        self.bind_uniform(group, location, UniformBinding::ValueRef(value.clone()))
    }

    pub fn bind_texture(&mut self, group: ShadingGroupId, slot: u32, texture: TextureId, sampler: SamplerState) -> Result<()> {
        self.bind_uniform(group, slot, UniformBinding::Texture { texture, sampler })
    }

    /// Binds whatever texture `texture` holds when the group replays.
    pub fn bind_texture_ref(
        &mut self,
        group: ShadingGroupId,
        slot: u32,
        texture: &BindRef<Option<TextureId>>,
        sampler: SamplerState,
    ) -> Result<()> {
        self.bind_uniform(
            group,
            slot,
            UniformBinding::TextureRef {
                texture: texture.clone(),
                sampler,
            },
        )
    }

    pub fn bind_image(&mut self, group: ShadingGroupId, slot: u32, texture: TextureId) -> Result<()> {
        self.bind_uniform(group, slot, UniformBinding::Image(texture))
    }

    pub fn bind_image_ref(&mut self, group: ShadingGroupId, slot: u32, texture: &BindRef<Option<TextureId>>) -> Result<()> {
        self.bind_uniform(group, slot, UniformBinding::ImageRef(texture.clone()))
    }

    pub fn bind_uniform_buffer(&mut self, group: ShadingGroupId, slot: u32, buffer: BufferId) -> Result<()> {
        self.bind_uniform(group, slot, UniformBinding::Block(buffer))
    }

    pub fn bind_buffer_ref(&mut self, group: ShadingGroupId, slot: u32, buffer: &BindRef<Option<BufferId>>) -> Result<()> {
        self.bind_uniform(group, slot, UniformBinding::BlockRef(buffer.clone()))
    }

    pub fn bind_storage_buffer(&mut self, group: ShadingGroupId, slot: u32, buffer: BufferId) -> Result<()> {
        self.bind_uniform(group, slot, UniformBinding::StorageBlock(buffer))
    }

    pub fn bind_storage_buffer_ref(
        &mut self,
        group: ShadingGroupId,
        slot: u32,
        buffer: &BindRef<Option<BufferId>>,
    ) -> Result<()> {
        self.bind_uniform(group, slot, UniformBinding::StorageBlockRef(buffer.clone()))
    }

    // ── internal ──────────────────────────────────────────────────────────

    /// Command chunks recorded into `group`, in link order.
    pub(crate) fn group_chunks(&self, group: ArenaIndex) -> ChunkIter<'_> {
        ChunkIter {
            data: self,
            next: self.group_at(group).cmd_head,
        }
    }

    pub(crate) fn group_uniforms(&self, group: ArenaIndex) -> UniformIter<'_> {
        UniformIter {
            data: self,
            chunk: self
                .group_at(group)
                .uniform_head
                .map(|i| self.uniforms.element_at(i.chunk, i.slot)),
            slot: 0,
        }
    }

    /// `group` and its ancestors, root first.
    pub(crate) fn group_lineage(&self, group: ArenaIndex) -> Vec<ArenaIndex> {
        let mut lineage = vec![group];
        let mut current = group;
        while let Some(parent) = self.group_at(current).parent {
            lineage.push(parent);
            current = parent;
        }
        lineage.reverse();
        lineage
    }

    fn command_chunk_mut(&mut self, index: ArenaIndex) -> &mut CommandChunk {
        self.commands.element_at_mut(index.chunk, index.slot)
    }
}

fn vertex_count(primitives: u32, per_primitive: u32) -> Result<u32> {
    primitives
        .checked_mul(per_primitive)
        .ok_or(DrawError::ValueOutOfRange {
            what: "procedural vertex count",
            value: u64::from(primitives) * u64::from(per_primitive),
        })
}

/// First-element offset as pushed through an int uniform.
pub(crate) fn int_offset(offset: u32) -> Result<i32> {
    i32::try_from(offset).map_err(|_| DrawError::ValueOutOfRange {
        what: "element offset",
        value: u64::from(offset),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DrawConfig;
    use crate::device::Capabilities;

    fn data() -> DrawData {
        DrawData::new(DrawConfig::default(), Capabilities::default()).unwrap()
    }

    fn group(d: &mut DrawData) -> ShadingGroupId {
        let p = d.create_pass("p", DrawState::DEFAULT).unwrap();
        d.create_shading_group(p, PipelineId(7)).unwrap()
    }

    fn select_ids(d: &DrawData, g: ShadingGroupId) -> Vec<u32> {
        d.group_chunks(g.index)
            .flat_map(|c| c.commands().iter())
            .filter_map(|c| match c {
                Command::SetSelectId(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    fn order(d: &DrawData, pass: PassId) -> Vec<ShadingGroupId> {
        let mut out = Vec::new();
        d.foreach_shading_group(pass, |g| out.push(g));
        out
    }

    // ── command lists ─────────────────────────────────────────────────────

    #[test]
    fn first_chunk_is_small_then_full_size() {
        let mut d = data();
        let g = group(&mut d);
        for i in 0..10 {
            d.select_id(g, i).unwrap();
        }
        let caps: Vec<_> = d.group_chunks(g.index).map(|c| c.capacity()).collect();
        assert_eq!(caps, vec![6, 96]);
    }

    #[test]
    fn commands_keep_append_order_across_chunks() {
        let mut d = data();
        let g = group(&mut d);
        for i in 0..200 {
            d.select_id(g, i).unwrap();
        }
        assert_eq!(select_ids(&d, g), (0..200).collect::<Vec<_>>());
        assert_eq!(d.shading_group_command_count(g), 200);
    }

    #[test]
    fn group_without_draw_is_empty() {
        let mut d = data();
        let g = group(&mut d);
        assert!(d.shading_group_is_empty(g));
        d.barrier(g, BarrierFlags::SHADER_STORAGE).unwrap();
        assert!(d.shading_group_is_empty(g));
        d.draw_procedural_triangles(g, ResourceHandle::UNIT, 1).unwrap();
        assert!(!d.shading_group_is_empty(g));
    }

    #[test]
    fn procedural_helpers_scale_vertex_count() {
        let mut d = data();
        let g = group(&mut d);
        d.draw_procedural_points(g, ResourceHandle::UNIT, 4).unwrap();
        d.draw_procedural_lines(g, ResourceHandle::UNIT, 4).unwrap();
        d.draw_procedural_triangles(g, ResourceHandle::UNIT, 4).unwrap();
        let counts: Vec<_> = d
            .group_chunks(g.index)
            .flat_map(|c| c.commands().iter())
            .map(|c| match c {
                Command::DrawProcedural { vertex_count, .. } => *vertex_count,
                _ => 0,
            })
            .collect();
        assert_eq!(counts, vec![4, 8, 12]);
    }

    #[test]
    fn procedural_vertex_overflow_is_an_error() {
        let mut d = data();
        let g = group(&mut d);
        let err = d.draw_procedural_triangles(g, ResourceHandle::UNIT, u32::MAX / 2).unwrap_err();
        assert!(matches!(err, DrawError::ValueOutOfRange { .. }));
        assert!(d.draw_procedural_lines(g, ResourceHandle::UNIT, u32::MAX).is_err());
        assert_eq!(d.shading_group_command_count(g), 0);
    }

    #[test]
    #[should_panic(expected = "recording is closed")]
    fn append_after_finish_panics() {
        let mut dev = crate::device::RecordingDevice::new();
        let mut d = data();
        let g = group(&mut d);
        d.finish(&mut dev);
        let _ = d.select_id(g, 1);
    }

    // ── sub-groups ────────────────────────────────────────────────────────

    #[test]
    fn sub_group_starts_with_an_empty_command_list() {
        let mut d = data();
        let g = group(&mut d);
        d.select_id(g, 1).unwrap();
        let sub = d.create_sub_group(g).unwrap();
        assert!(select_ids(&d, sub).is_empty());
        assert!(d.shading_group_is_empty(sub));
        assert_eq!(d.shading_group_command_count(sub), 0);

        d.select_id(sub, 2).unwrap();
        assert_eq!(select_ids(&d, sub), vec![2]);
        assert_eq!(select_ids(&d, g), vec![1]);
    }

    #[test]
    fn sub_groups_replay_after_parent_in_creation_order() {
        let mut d = data();
        let p = d.create_pass("p", DrawState::DEFAULT).unwrap();
        let a = d.create_shading_group(p, PipelineId(1)).unwrap();
        let b = d.create_shading_group(p, PipelineId(2)).unwrap();
        let a1 = d.create_sub_group(a).unwrap();
        let a2 = d.create_sub_group(a).unwrap();
        let a11 = d.create_sub_group(a1).unwrap();
        let b1 = d.create_sub_group(b).unwrap();

        assert_eq!(order(&d, p), vec![a, a1, a11, a2, b, b1]);
        assert_eq!(d.shading_group_pipeline(a2).pipeline, PipelineId(1));

        let c = d.create_shading_group(p, PipelineId(3)).unwrap();
        assert_eq!(order(&d, p).last(), Some(&c));
    }

    #[test]
    fn lineage_is_root_first() {
        let mut d = data();
        let g = group(&mut d);
        let s = d.create_sub_group(g).unwrap();
        let ss = d.create_sub_group(s).unwrap();
        assert_eq!(d.group_lineage(ss.index), vec![g.index, s.index, ss.index]);
    }

    // ── bindings ──────────────────────────────────────────────────────────

    #[test]
    fn bindings_spill_into_new_chunks_in_order() {
        let mut d = data();
        let g = group(&mut d);
        for loc in 0..25 {
            d.uniform_int(g, loc, &[loc as i32]).unwrap();
        }
        let locations: Vec<_> = d.group_uniforms(g.index).map(|u| u.location).collect();
        assert_eq!(locations, (0..25).collect::<Vec<_>>());
        assert_eq!(d.uniforms.len(), 3);
    }

    #[test]
    fn sub_group_bindings_are_independent() {
        let mut d = data();
        let g = group(&mut d);
        d.uniform_float(g, 0, &[1.0]).unwrap();
        let sub = d.create_sub_group(g).unwrap();
        d.uniform_float(sub, 0, &[2.0]).unwrap();
        assert_eq!(d.group_uniforms(g.index).count(), 1);
        assert_eq!(d.group_uniforms(sub.index).count(), 1);
    }

    // ── dispatch splitting ────────────────────────────────────────────────

    #[test]
    fn dispatch_split_slices_by_work_group_limit() {
        let caps = Capabilities {
            max_work_group_count: [100, 100, 100],
            ..Capabilities::default()
        };
        let mut d = DrawData::new(DrawConfig::default(), caps).unwrap();
        let p = d.create_pass("refine", DrawState::empty()).unwrap();
        let g = d.create_shading_group(p, PipelineId(1)).unwrap();

        let last = d.dispatch_split(g, 250, 3).unwrap().unwrap();
        let subs = order(&d, p);
        assert_eq!(subs.len(), 4);
        assert_eq!(subs[3], last);

        let slices: Vec<_> = subs[1..]
            .iter()
            .map(|s| {
                let offset = match &d.group_uniforms(s.index).next().unwrap().binding {
                    UniformBinding::Value(UniformValue::Int { data, .. }) => data[0],
                    other => panic!("unexpected binding {other:?}"),
                };
                let count = match d.group_chunks(s.index).next().unwrap().commands()[0] {
                    Command::Compute { groups } => groups[0],
                    ref other => panic!("unexpected command {other:?}"),
                };
                (offset, count)
            })
            .collect();
        assert_eq!(slices, vec![(0, 100), (100, 100), (200, 50)]);
    }

    #[test]
    fn dispatch_split_of_zero_records_nothing() {
        let mut d = data();
        let g = group(&mut d);
        assert!(d.dispatch_split(g, 0, 0).unwrap().is_none());
    }

    #[test]
    fn dispatch_split_rejects_offsets_past_i32() {
        let caps = Capabilities {
            max_work_group_count: [1 << 31, 1, 1],
            ..Capabilities::default()
        };
        let mut d = DrawData::new(DrawConfig::default(), caps).unwrap();
        let p = d.create_pass("refine", DrawState::empty()).unwrap();
        let g = d.create_shading_group(p, PipelineId(1)).unwrap();

        let err = d.dispatch_split(g, u32::MAX, 0).unwrap_err();
        assert_eq!(
            err,
            DrawError::ValueOutOfRange {
                what: "element offset",
                value: 1 << 31,
            }
        );
    }
}

use crate::device::{BufferBinding, CommandDevice, DrawArgs, Geometry, PipelineId, TextureId, UniformValue};
use crate::memory::{ArenaIndex, ResourceHandle};

use super::command::{Command, CommandChunk};
use super::data::{DrawData, PassId, ShadingGroupId};
use super::shgroup::PipelineInfo;
use super::state::DrawState;
use super::uniform::UniformBinding;

/// Resources replay falls back to when a by-reference binding is empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayEnv {
    /// Bound in place of a texture reference that is still `None`.
    pub fallback_texture: Option<TextureId>,
}

/// Device-side state tracked while replaying, to skip redundant calls.
#[derive(Debug, Default)]
struct ReplayState {
    bound: Option<(PipelineId, DrawState)>,
    state: DrawState,
    resource_chunk: Option<u32>,
    front_face_inverted: bool,
}

impl DrawData {
    /// Replays every group of `pass`, then the passes linked after it.
    ///
    /// Requires `finish` to have been called for the frame.
    pub fn draw_pass(&self, device: &mut (impl CommandDevice + ?Sized), pass: PassId, env: &ReplayEnv) {
        self.assert_closed();
        let mut state = ReplayState::default();
        let mut current = Some(pass);
        let mut replayed = 0;

        while let Some(p) = current {
            replayed += 1;
            assert!(replayed <= self.passes.len(), "pass links form a cycle");
            debug_assert!(self.pass_groups(p).next().is_some(), "replaying an empty pass");

            log::trace!("replay pass '{}'", self.pass_name(p));
            let groups: Vec<_> = self.pass_groups(p).collect();
            self.replay_groups(device, p, &groups, env, &mut state);
            current = self.pass_data(p).next;
        }
    }

    /// Replays the groups of `pass` from `first` to `last`, both included.
    ///
    /// Linked passes are not followed.
    pub fn draw_pass_subset(
        &self,
        device: &mut (impl CommandDevice + ?Sized),
        pass: PassId,
        first: ShadingGroupId,
        last: ShadingGroupId,
        env: &ReplayEnv,
    ) {
        self.assert_closed();
        let source = self.resolve_original(pass);
        assert!(
            self.group_data(first).pass == source && self.group_data(last).pass == source,
            "subset groups do not belong to the replayed pass"
        );

        let groups: Vec<_> = self.pass_groups(pass).collect();
        let start = groups.iter().position(|&g| g == first.index);
        let end = groups.iter().position(|&g| g == last.index);
        let (Some(start), Some(end)) = (start, end) else {
            unreachable!("groups of a pass are always linked into it");
        };
        assert!(start <= end, "subset end precedes its start");

        let mut state = ReplayState::default();
        self.replay_groups(device, pass, &groups[start..=end], env, &mut state);
    }

    fn replay_groups(
        &self,
        device: &mut (impl CommandDevice + ?Sized),
        pass: PassId,
        groups: &[ArenaIndex],
        env: &ReplayEnv,
        st: &mut ReplayState,
    ) {
        let pass_state = self.pass_data(pass).state;

        for &group in groups {
            if self.group_chunks(group).all(CommandChunk::is_empty) {
                continue;
            }

            let pipeline = self.group_at(group).pipeline;
            if st.bound != Some((pipeline.pipeline, pass_state)) {
                device.bind_pipeline(pipeline.pipeline, pass_state);
                st.bound = Some((pipeline.pipeline, pass_state));
                st.resource_chunk = None;
            } else if st.state != pass_state {
                device.set_state(pass_state);
            }
            st.state = pass_state;

            for ancestor in self.group_lineage(group) {
                for uniform in self.group_uniforms(ancestor) {
                    bind(device, uniform.location, &uniform.binding, env);
                }
            }

            for chunk in self.group_chunks(group) {
                for (slot, command) in chunk.commands().iter().enumerate() {
                    if chunk.kind(slot).is_draw() && is_skipped_draw(command) {
                        log::trace!("skip empty draw");
                        continue;
                    }
                    self.execute(device, &pipeline, command, st);
                }
            }

            if st.front_face_inverted {
                device.set_front_facing(false);
                st.front_face_inverted = false;
            }
        }
    }

    fn execute(
        &self,
        device: &mut (impl CommandDevice + ?Sized),
        pipeline: &PipelineInfo,
        command: &Command,
        st: &mut ReplayState,
    ) {
        let single = |vertex_first, vertex_count| DrawArgs {
            vertex_first,
            vertex_count,
            instance_first: 0,
            instance_count: 1,
        };

        match command {
            Command::Draw { batch, handle } => {
                self.bind_object(device, pipeline, *handle, 0, st);
                device.draw(Geometry::Batch(*batch), single(0, 0));
            }
            Command::DrawRange {
                batch,
                handle,
                vertex_first,
                vertex_count,
            } => {
                self.bind_object(device, pipeline, *handle, 0, st);
                device.draw(Geometry::Batch(*batch), single(*vertex_first, *vertex_count));
            }
            Command::DrawInstance {
                batch,
                handle,
                instance_count,
            } => {
                self.bind_object(device, pipeline, *handle, 0, st);
                device.draw(
                    Geometry::Batch(*batch),
                    DrawArgs {
                        instance_count: *instance_count,
                        ..DrawArgs::default()
                    },
                );
            }
            Command::DrawInstanceRange {
                batch,
                handle,
                instance_first,
                instance_count,
            } => {
                self.bind_object(device, pipeline, *handle, *instance_first, st);
                device.draw(
                    Geometry::Batch(*batch),
                    DrawArgs {
                        instance_first: *instance_first,
                        instance_count: *instance_count,
                        ..DrawArgs::default()
                    },
                );
            }
            Command::DrawProcedural {
                primitive,
                handle,
                vertex_count,
            } => {
                self.bind_object(device, pipeline, *handle, 0, st);
                device.draw(Geometry::Procedural(*primitive), single(0, *vertex_count));
            }
            Command::DrawIndirect {
                geometry,
                handle,
                buffer,
                offset,
            } => {
                self.bind_object(device, pipeline, *handle, 0, st);
                device.draw_indirect(*geometry, *buffer, *offset);
            }
            Command::Compute { groups } => device.dispatch(*groups),
            Command::ComputeRef { groups } => device.dispatch(groups.get()),
            Command::ComputeIndirect { buffer, offset } => device.dispatch_indirect(*buffer, *offset),
            Command::Barrier { flags } => device.barrier(*flags),
            Command::Clear {
                bits,
                color,
                depth,
                stencil,
            } => device.clear(*bits, *color, *depth, *stencil),
            Command::SetState { enable, disable } => {
                st.state = st.state.apply(*enable, *disable);
                device.set_state(st.state);
            }
            Command::SetStencil(stencil) => device.set_stencil(*stencil),
            Command::SetSelectId(id) => device.set_select_id(*id),
        }
    }

    /// Pushes the per-object built-ins of `handle`.
    fn bind_object(
        &self,
        device: &mut (impl CommandDevice + ?Sized),
        pipeline: &PipelineInfo,
        handle: ResourceHandle,
        base_instance: u32,
        st: &mut ReplayState,
    ) {
        let inverted = handle.is_negative_scale();
        if inverted != st.front_face_inverted {
            device.set_front_facing(inverted);
            st.front_face_inverted = inverted;
        }

        let b = &pipeline.builtins;
        if b.is_empty() {
            return;
        }

        let chunk = handle.chunk();
        if st.resource_chunk != Some(chunk) {
            if let (Some(slot), Some(buffer)) = (b.object_matrix_block, self.resources.matrix_buffer(chunk)) {
                device.bind_buffer(slot, BufferBinding::Uniform, buffer);
            }
            if let (Some(slot), Some(buffer)) = (b.object_info_block, self.resources.info_buffer(chunk)) {
                device.bind_buffer(slot, BufferBinding::Uniform, buffer);
            }
            if let Some(location) = b.resource_chunk {
                device.push_constant(location, &UniformValue::scalar_int(chunk as i32));
            }
            st.resource_chunk = Some(chunk);
        }

        if let Some(location) = b.resource_id {
            device.push_constant(location, &UniformValue::scalar_int(handle.slot() as i32));
        }
        if let Some(location) = b.base_instance {
            device.push_constant(location, &UniformValue::scalar_int(base_instance as i32));
        }
        if b.model_matrix.is_some() || b.model_matrix_inverse.is_some() {
            let object = self.resources.matrix(handle);
            if let Some(location) = b.model_matrix {
                device.push_constant(location, &UniformValue::Mat4(object.model));
            }
            if let Some(location) = b.model_matrix_inverse {
                device.push_constant(location, &UniformValue::Mat4(object.model_inverse));
            }
        }
    }
}

fn is_skipped_draw(command: &Command) -> bool {
    matches!(
        command,
        Command::DrawInstance { instance_count: 0, .. }
            | Command::DrawInstanceRange { instance_count: 0, .. }
            | Command::DrawProcedural { vertex_count: 0, .. }
    )
}

fn bind(device: &mut (impl CommandDevice + ?Sized), location: u32, binding: &UniformBinding, env: &ReplayEnv) {
    match binding {
        UniformBinding::Value(value) => device.push_constant(location, value),
        UniformBinding::ValueRef(value) => device.push_constant(location, &value.get()),
        UniformBinding::Texture { texture, sampler } => device.bind_texture(location, *texture, *sampler),
        UniformBinding::TextureRef { texture, sampler } => match texture.get().or(env.fallback_texture) {
            Some(texture) => device.bind_texture(location, texture, *sampler),
            None => log::warn!("texture reference at slot {location} is empty at replay"),
        },
        UniformBinding::Image(texture) => device.bind_image(location, *texture),
        UniformBinding::ImageRef(texture) => match texture.get() {
            Some(texture) => device.bind_image(location, texture),
            None => log::warn!("image reference at slot {location} is empty at replay"),
        },
        UniformBinding::Block(buffer) => device.bind_buffer(location, BufferBinding::Uniform, *buffer),
        UniformBinding::BlockRef(buffer) => match buffer.get() {
            Some(buffer) => device.bind_buffer(location, BufferBinding::Uniform, buffer),
            None => log::warn!("uniform block reference at slot {location} is empty at replay"),
        },
        UniformBinding::StorageBlock(buffer) => device.bind_buffer(location, BufferBinding::Storage, *buffer),
        UniformBinding::StorageBlockRef(buffer) => match buffer.get() {
            Some(buffer) => device.bind_buffer(location, BufferBinding::Storage, buffer),
            None => log::warn!("storage block reference at slot {location} is empty at replay"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DrawConfig;
    use crate::device::{
        BatchId, Capabilities, DeviceCall, Extent, RecordingDevice, ResourceDevice, SamplerState, TextureDesc,
        TextureDimension,
    };
    use crate::draw::resources::IDENTITY;
    use crate::draw::{BindRef, BuiltinLocations};

    fn data() -> DrawData {
        DrawData::new(DrawConfig::default(), Capabilities::default()).unwrap()
    }

    fn dummy_texture(dev: &mut RecordingDevice) -> TextureId {
        dev.create_texture(&TextureDesc {
            label: Some("dummy".into()),
            dimension: TextureDimension::D2,
            extent: Extent::d2(1, 1),
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            mip_count: 1,
        })
        .unwrap()
    }

    fn with_resource_id(pipeline: u32) -> PipelineInfo {
        PipelineInfo::new(
            PipelineId(pipeline),
            BuiltinLocations {
                resource_id: Some(9),
                ..BuiltinLocations::default()
            },
        )
    }

    fn pushed_ints(calls: &[DeviceCall], location: u32) -> Vec<i32> {
        calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::PushConstant {
                    location: l,
                    value: UniformValue::Int { data, .. },
                } if *l == location => Some(data[0]),
                _ => None,
            })
            .collect()
    }

    fn count(calls: &[DeviceCall], pred: impl Fn(&DeviceCall) -> bool) -> usize {
        calls.iter().filter(|&c| pred(c)).count()
    }

    // ── ordering ──────────────────────────────────────────────────────────

    #[test]
    fn end_to_end_binds_once_and_draws_in_handle_order() {
        let mut dev = RecordingDevice::new();
        let tex = dummy_texture(&mut dev);
        let mut d = data();

        let p = d.create_pass("P", DrawState::DEFAULT).unwrap();
        let g = d.create_shading_group(p, with_resource_id(42)).unwrap();
        let h1 = d.resource_handle_new(IDENTITY, false).unwrap();
        let h2 = d.resource_handle_new(IDENTITY, false).unwrap();
        let h3 = d.resource_handle_new(IDENTITY, false).unwrap();
        assert!(h1 < h2 && h2 < h3);
        for h in [h1, h2, h3] {
            d.draw(g, BatchId(0), h).unwrap();
        }
        d.bind_texture(g, 0, tex, SamplerState::FILTER).unwrap();
        d.finish(&mut dev);

        dev.clear_calls();
        d.draw_pass(&mut dev, p, &ReplayEnv::default());
        let calls = dev.take_calls();

        assert_eq!(count(&calls, |c| matches!(c, DeviceCall::BindPipeline { pipeline: PipelineId(42), .. })), 1);
        assert_eq!(count(&calls, |c| matches!(c, DeviceCall::BindTexture { .. })), 1);
        assert_eq!(count(&calls, |c| matches!(c, DeviceCall::Draw { .. })), 3);
        let slots: Vec<i32> = [h1, h2, h3].iter().map(|h| h.slot() as i32).collect();
        assert_eq!(pushed_ints(&calls, 9), slots);

        let bind_at = calls.iter().position(|c| matches!(c, DeviceCall::BindTexture { .. }));
        let draw_at = calls.iter().position(|c| matches!(c, DeviceCall::Draw { .. }));
        assert!(bind_at < draw_at);
    }

    #[test]
    fn commands_replay_in_order_across_a_chunk_boundary() {
        let config = DrawConfig {
            small_command_chunk_len: 96,
            ..DrawConfig::default()
        };
        let mut dev = RecordingDevice::new();
        let mut d = DrawData::new(config, Capabilities::default()).unwrap();
        let p = d.create_pass("p", DrawState::DEFAULT).unwrap();
        let g = d.create_shading_group(p, PipelineId(1)).unwrap();
        for i in 0..97 {
            d.select_id(g, i).unwrap();
        }
        d.finish(&mut dev);
        dev.clear_calls();
        d.draw_pass(&mut dev, p, &ReplayEnv::default());

        let ids: Vec<u32> = dev
            .calls()
            .iter()
            .filter_map(|c| match c {
                DeviceCall::SetSelectId(id) => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(ids, (0..97).collect::<Vec<_>>());
    }

    #[test]
    fn linked_passes_replay_in_sequence() {
        let mut dev = RecordingDevice::new();
        let mut d = data();
        let a = d.create_pass("a", DrawState::DEFAULT).unwrap();
        let b = d.create_pass("b", DrawState::DEFAULT).unwrap();
        for (pass, id) in [(a, 1), (b, 2)] {
            let g = d.create_shading_group(pass, PipelineId(id)).unwrap();
            d.select_id(g, id).unwrap();
        }
        d.link_passes(a, b);
        d.finish(&mut dev);
        dev.clear_calls();
        d.draw_pass(&mut dev, a, &ReplayEnv::default());
        let pipelines: Vec<_> = dev
            .calls()
            .iter()
            .filter_map(|c| match c {
                DeviceCall::BindPipeline { pipeline, .. } => Some(pipeline.0),
                _ => None,
            })
            .collect();
        assert_eq!(pipelines, vec![1, 2]);
    }

    #[test]
    fn subset_replays_only_the_requested_range() {
        let mut dev = RecordingDevice::new();
        let mut d = data();
        let p = d.create_pass("p", DrawState::DEFAULT).unwrap();
        let groups: Vec<_> = (0..4)
            .map(|i| {
                let g = d.create_shading_group(p, PipelineId(i)).unwrap();
                d.select_id(g, i).unwrap();
                g
            })
            .collect();
        d.finish(&mut dev);
        dev.clear_calls();
        d.draw_pass_subset(&mut dev, p, groups[1], groups[2], &ReplayEnv::default());
        let ids: Vec<_> = dev
            .calls()
            .iter()
            .filter_map(|c| match c {
                DeviceCall::SetSelectId(id) => Some(*id),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    #[should_panic(expected = "subset end precedes its start")]
    fn subset_with_reversed_bounds_panics() {
        let mut dev = RecordingDevice::new();
        let mut d = data();
        let p = d.create_pass("p", DrawState::DEFAULT).unwrap();
        let a = d.create_shading_group(p, PipelineId(1)).unwrap();
        let b = d.create_shading_group(p, PipelineId(1)).unwrap();
        d.finish(&mut dev);
        d.draw_pass_subset(&mut dev, p, b, a, &ReplayEnv::default());
    }

    #[test]
    #[should_panic(expected = "call finish() first")]
    fn replay_while_recording_panics() {
        let mut dev = RecordingDevice::new();
        let mut d = data();
        let p = d.create_pass("p", DrawState::DEFAULT).unwrap();
        d.draw_pass(&mut dev, p, &ReplayEnv::default());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "replaying an empty pass")]
    fn replaying_a_pass_without_groups_panics() {
        let mut dev = RecordingDevice::new();
        let mut d = data();
        let p = d.create_pass("p", DrawState::DEFAULT).unwrap();
        d.finish(&mut dev);
        d.draw_pass(&mut dev, p, &ReplayEnv::default());
    }

    // ── pipeline and state ────────────────────────────────────────────────

    #[test]
    fn consecutive_groups_with_one_pipeline_bind_it_once() {
        let mut dev = RecordingDevice::new();
        let mut d = data();
        let p = d.create_pass("p", DrawState::DEFAULT).unwrap();
        for pipeline in [1, 1, 2] {
            let g = d.create_shading_group(p, PipelineId(pipeline)).unwrap();
            d.draw(g, BatchId(0), ResourceHandle::UNIT).unwrap();
        }
        d.finish(&mut dev);
        dev.clear_calls();
        d.draw_pass(&mut dev, p, &ReplayEnv::default());
        assert_eq!(count(dev.calls(), |c| matches!(c, DeviceCall::BindPipeline { .. })), 2);
    }

    #[test]
    fn groups_without_commands_are_skipped() {
        let mut dev = RecordingDevice::new();
        let mut d = data();
        let p = d.create_pass("p", DrawState::DEFAULT).unwrap();
        d.create_shading_group(p, PipelineId(1)).unwrap();
        d.finish(&mut dev);
        dev.clear_calls();
        d.draw_pass(&mut dev, p, &ReplayEnv::default());
        assert!(dev.calls().is_empty());
    }

    #[test]
    fn set_state_commands_apply_on_top_of_pass_state() {
        let mut dev = RecordingDevice::new();
        let mut d = data();
        let p = d.create_pass("p", DrawState::DEFAULT).unwrap();
        let g = d.create_shading_group(p, PipelineId(1)).unwrap();
        d.state_enable(g, DrawState::DEPTH_ALWAYS | DrawState::BLEND_ADD).unwrap();
        d.state_disable(g, DrawState::WRITE_DEPTH).unwrap();
        d.finish(&mut dev);
        dev.clear_calls();
        d.draw_pass(&mut dev, p, &ReplayEnv::default());

        let last = dev.calls().iter().rev().find_map(|c| match c {
            DeviceCall::SetState(s) => Some(*s),
            _ => None,
        });
        assert_eq!(last, Some(DrawState::WRITE_COLOR | DrawState::DEPTH_ALWAYS | DrawState::BLEND_ADD));
    }

    #[test]
    fn empty_instanced_draws_are_skipped() {
        let mut dev = RecordingDevice::new();
        let mut d = data();
        let p = d.create_pass("p", DrawState::DEFAULT).unwrap();
        let g = d.create_shading_group(p, PipelineId(1)).unwrap();
        d.draw_instanced(g, BatchId(0), ResourceHandle::UNIT, 0).unwrap();
        d.draw_instanced(g, BatchId(0), ResourceHandle::UNIT, 3).unwrap();
        d.finish(&mut dev);
        dev.clear_calls();
        d.draw_pass(&mut dev, p, &ReplayEnv::default());
        assert_eq!(count(dev.calls(), |c| matches!(c, DeviceCall::Draw { .. })), 1);
    }

    // ── per-object data ───────────────────────────────────────────────────

    #[test]
    fn chunk_blocks_rebind_only_when_the_chunk_changes() {
        let config = DrawConfig {
            resource_chunk_len: 2,
            ..DrawConfig::default()
        };
        let mut dev = RecordingDevice::new();
        let mut d = DrawData::new(config, Capabilities::default()).unwrap();
        let p = d.create_pass("p", DrawState::DEFAULT).unwrap();
        let builtins = BuiltinLocations {
            resource_chunk: Some(1),
            object_matrix_block: Some(2),
            ..BuiltinLocations::default()
        };
        let g = d.create_shading_group(p, PipelineInfo::new(PipelineId(1), builtins)).unwrap();
        for _ in 0..3 {
            let h = d.resource_handle_new(IDENTITY, false).unwrap();
            d.draw(g, BatchId(0), h).unwrap();
        }
        d.finish(&mut dev);
        dev.clear_calls();
        d.draw_pass(&mut dev, p, &ReplayEnv::default());

        let calls = dev.take_calls();
        assert_eq!(count(&calls, |c| matches!(c, DeviceCall::BindBuffer { slot: 2, .. })), 2);
        assert_eq!(pushed_ints(&calls, 1), vec![0, 1]);
    }

    #[test]
    fn negative_scale_flips_winding_and_restores_it() {
        let mut dev = RecordingDevice::new();
        let mut d = data();
        let p = d.create_pass("p", DrawState::DEFAULT).unwrap();
        let g = d.create_shading_group(p, PipelineId(1)).unwrap();
        let flipped = d.resource_handle_new(IDENTITY, true).unwrap();
        d.draw(g, BatchId(0), flipped).unwrap();
        d.draw(g, BatchId(0), flipped).unwrap();
        d.finish(&mut dev);
        dev.clear_calls();
        d.draw_pass(&mut dev, p, &ReplayEnv::default());

        let faces: Vec<_> = dev
            .calls()
            .iter()
            .filter_map(|c| match c {
                DeviceCall::SetFrontFacing(inverted) => Some(*inverted),
                _ => None,
            })
            .collect();
        assert_eq!(faces, vec![true, false]);
    }

    #[test]
    fn model_matrix_is_pushed_per_draw() {
        let mut dev = RecordingDevice::new();
        let mut d = data();
        let p = d.create_pass("p", DrawState::DEFAULT).unwrap();
        let builtins = BuiltinLocations {
            model_matrix: Some(4),
            ..BuiltinLocations::default()
        };
        let g = d.create_shading_group(p, PipelineInfo::new(PipelineId(1), builtins)).unwrap();
        let mut model = IDENTITY;
        model[3] = [1.0, 2.0, 3.0, 1.0];
        let h = d.resource_handle_new(model, false).unwrap();
        d.draw(g, BatchId(0), h).unwrap();
        d.finish(&mut dev);
        dev.clear_calls();
        d.draw_pass(&mut dev, p, &ReplayEnv::default());

        assert!(dev.calls().contains(&DeviceCall::PushConstant {
            location: 4,
            value: UniformValue::Mat4(model),
        }));
    }

    // ── bindings ──────────────────────────────────────────────────────────

    #[test]
    fn sub_group_bindings_override_parent_bindings() {
        let mut dev = RecordingDevice::new();
        let mut d = data();
        let p = d.create_pass("p", DrawState::DEFAULT).unwrap();
        let g = d.create_shading_group(p, PipelineId(1)).unwrap();
        d.uniform_int(g, 5, &[1]).unwrap();
        d.draw(g, BatchId(0), ResourceHandle::UNIT).unwrap();
        let sub = d.create_sub_group(g).unwrap();
        d.uniform_int(sub, 5, &[2]).unwrap();
        d.draw(sub, BatchId(0), ResourceHandle::UNIT).unwrap();
        d.finish(&mut dev);
        dev.clear_calls();
        d.draw_pass(&mut dev, p, &ReplayEnv::default());

        assert_eq!(pushed_ints(dev.calls(), 5), vec![1, 1, 2]);
        assert_eq!(count(dev.calls(), |c| matches!(c, DeviceCall::Draw { .. })), 2);
    }

    #[test]
    fn binding_only_sub_group_does_not_repeat_parent_draws() {
        let mut dev = RecordingDevice::new();
        let mut d = data();
        let p = d.create_pass("p", DrawState::DEFAULT).unwrap();
        let g = d.create_shading_group(p, PipelineId(1)).unwrap();
        for _ in 0..3 {
            d.draw(g, BatchId(0), ResourceHandle::UNIT).unwrap();
        }
        let sub = d.create_sub_group(g).unwrap();
        d.uniform_int(sub, 5, &[2]).unwrap();
        d.finish(&mut dev);
        dev.clear_calls();
        d.draw_pass(&mut dev, p, &ReplayEnv::default());

        assert_eq!(count(dev.calls(), |c| matches!(c, DeviceCall::Draw { .. })), 3);
        assert!(pushed_ints(dev.calls(), 5).is_empty());
    }

    #[test]
    fn texture_reference_is_resolved_at_replay() {
        let mut dev = RecordingDevice::new();
        let mut d = data();
        let slot: BindRef<Option<TextureId>> = BindRef::default();
        let p = d.create_pass("p", DrawState::DEFAULT).unwrap();
        let g = d.create_shading_group(p, PipelineId(1)).unwrap();
        d.bind_texture_ref(g, 3, &slot, SamplerState::empty()).unwrap();
        d.draw(g, BatchId(0), ResourceHandle::UNIT).unwrap();
        d.finish(&mut dev);

        let tex = dummy_texture(&mut dev);
        slot.set(Some(tex));
        dev.clear_calls();
        d.draw_pass(&mut dev, p, &ReplayEnv::default());
        assert!(dev.calls().contains(&DeviceCall::BindTexture {
            slot: 3,
            texture: tex,
            sampler: SamplerState::empty(),
        }));
    }

    #[test]
    fn empty_texture_reference_uses_the_fallback() {
        let mut dev = RecordingDevice::new();
        let fallback = dummy_texture(&mut dev);
        let mut d = data();
        let slot: BindRef<Option<TextureId>> = BindRef::default();
        let p = d.create_pass("p", DrawState::DEFAULT).unwrap();
        let g = d.create_shading_group(p, PipelineId(1)).unwrap();
        d.bind_texture_ref(g, 0, &slot, SamplerState::FILTER).unwrap();
        d.draw(g, BatchId(0), ResourceHandle::UNIT).unwrap();
        d.finish(&mut dev);

        dev.clear_calls();
        d.draw_pass(&mut dev, p, &ReplayEnv::default());
        assert_eq!(count(dev.calls(), |c| matches!(c, DeviceCall::BindTexture { .. })), 0);

        dev.clear_calls();
        let env = ReplayEnv {
            fallback_texture: Some(fallback),
        };
        d.draw_pass(&mut dev, p, &env);
        assert!(dev.calls().contains(&DeviceCall::BindTexture {
            slot: 0,
            texture: fallback,
            sampler: SamplerState::FILTER,
        }));
    }

    #[test]
    fn dispatch_reference_reads_counts_at_replay() {
        let mut dev = RecordingDevice::new();
        let mut d = data();
        let counts = BindRef::new([1, 1, 1]);
        let p = d.create_pass("compute", DrawState::empty()).unwrap();
        let g = d.create_shading_group(p, PipelineId(1)).unwrap();
        d.dispatch_ref(g, &counts).unwrap();
        d.finish(&mut dev);

        counts.set([8, 4, 1]);
        dev.clear_calls();
        d.draw_pass(&mut dev, p, &ReplayEnv::default());
        assert!(dev.calls().contains(&DeviceCall::Dispatch([8, 4, 1])));
    }
}

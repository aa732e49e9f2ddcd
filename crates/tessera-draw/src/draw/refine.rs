use std::fmt;

use crate::config::DrawConfig;
use crate::device::{BarrierFlags, Capabilities};
use crate::error::Result;
use crate::memory::ResourceHandle;

use super::data::{DrawData, PassId, ShadingGroupId};
use super::shgroup::{int_offset, PipelineInfo};
use super::uniform::Uniform;

/// Per-frame transform of `element_count` elements by a refinement pipeline.
///
/// The pipeline reads its first element index from the int uniform at
/// `offset_location`; `bindings` carry its inputs and outputs.
#[derive(Debug, Clone)]
pub struct RefineJob {
    pub pipeline: PipelineInfo,
    pub element_count: u32,
    /// Elements handled by one compute work group.
    pub local_size: u32,
    pub offset_location: u32,
    pub bindings: Vec<Uniform>,
}

/// Records a refinement job into a pass.
///
/// One implementation is selected per session from the device capabilities;
/// recording code never branches on them itself.
pub trait DataRefiner: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Records `job` as a new shading group of `pass` and returns it.
    fn record(&self, data: &mut DrawData, pass: PassId, job: &RefineJob) -> Result<ShadingGroupId>;
}

fn refine_group(data: &mut DrawData, pass: PassId, job: &RefineJob) -> Result<ShadingGroupId> {
    let group = data.create_shading_group(pass, job.pipeline)?;
    for uniform in &job.bindings {
        data.bind_uniform(group, uniform.location, uniform.binding.clone())?;
    }
    Ok(group)
}

/// Storage buffers and compute dispatches, split to the work group limit.
#[derive(Debug, Default)]
pub struct ComputeRefiner;

impl DataRefiner for ComputeRefiner {
    fn name(&self) -> &'static str {
        "compute"
    }

    fn record(&self, data: &mut DrawData, pass: PassId, job: &RefineJob) -> Result<ShadingGroupId> {
        let group = refine_group(data, pass, job)?;
        let groups = job.element_count.div_ceil(job.local_size.max(1));
        if let Some(last) = data.dispatch_split(group, groups, job.offset_location)? {
            data.barrier(
                last,
                BarrierFlags::SHADER_STORAGE | BarrierFlags::VERTEX_ATTRIB | BarrierFlags::TEXTURE_FETCH,
            )?;
        }
        Ok(group)
    }
}

/// Fallback for devices without compute: one point draw per batch, each
/// writing its elements through the pipeline's outputs.
#[derive(Debug)]
pub struct SerialRefiner {
    pub batch_len: u32,
}

impl DataRefiner for SerialRefiner {
    fn name(&self) -> &'static str {
        "serial"
    }

    fn record(&self, data: &mut DrawData, pass: PassId, job: &RefineJob) -> Result<ShadingGroupId> {
        let group = refine_group(data, pass, job)?;
        let batch_len = self.batch_len.max(1);
        let mut offset = 0;
        while offset < job.element_count {
            let count = batch_len.min(job.element_count - offset);
            let sub = data.create_sub_group(group)?;
            data.uniform_int(sub, job.offset_location, &[int_offset(offset)?])?;
            data.draw_procedural_points(sub, ResourceHandle::UNIT, count)?;
            data.barrier(sub, BarrierFlags::TEXTURE_FETCH | BarrierFlags::VERTEX_ATTRIB)?;
            offset += count;
        }
        Ok(group)
    }
}

/// Picks the refiner the device supports.
pub fn select_refiner(caps: &Capabilities, config: &DrawConfig) -> Box<dyn DataRefiner> {
    let refiner: Box<dyn DataRefiner> = if caps.supports_compute_refine() {
        Box::new(ComputeRefiner)
    } else {
        Box::new(SerialRefiner {
            batch_len: config.refine_batch_len,
        })
    };
    log::info!("data refinement: {}", refiner.name());
    refiner
}
